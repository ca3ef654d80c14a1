//! Redis-backed storage.

use std::sync::{Mutex, MutexGuard};

use redis::{Cmd, Connection, RedisResult, Value};
use tracing::{debug, info};

use crate::error::BackendError;
use crate::op::{Op, Reply};
use crate::Backend;

/// Backend speaking to a single Redis node over one shared connection.
///
/// Atomic batches are sent as a `MULTI`/`EXEC` pipeline, which Redis runs
/// without interleaving other clients' commands. Redis does not roll a
/// transaction back: if one command fails at run time (for example with
/// `WRONGTYPE`), the commands before and after it still take effect and the
/// batch returns an error.
pub struct RedisBackend {
    connection: Mutex<Connection>,
}

impl RedisBackend {
    /// Connect to `url` (e.g. `redis://:secret@localhost:6379/0`).
    ///
    /// When `client_name` is given it is registered with `CLIENT SETNAME` so
    /// the connection is identifiable in `CLIENT LIST`.
    ///
    /// # Errors
    /// Returns [`BackendError::Unavailable`] if the URL is invalid or the
    /// server cannot be reached.
    pub fn connect(url: &str, client_name: Option<&str>) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)?;
        let info = client.get_connection_info();
        info!(addr = %info.addr, db = info.redis.db, "Connecting to redis");

        let mut connection = client.get_connection()?;
        if let Some(name) = client_name {
            redis::cmd("CLIENT")
                .arg("SETNAME")
                .arg(name)
                .query::<()>(&mut connection)?;
        }
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackendError> {
        self.connection
            .lock()
            .map_err(|_| BackendError::Unavailable("redis connection lock poisoned".into()))
    }

    fn query<T: redis::FromRedisValue>(&self, op: &Op) -> Result<T, BackendError> {
        let mut connection = self.lock()?;
        let value = command(op).query(&mut *connection)?;
        Ok(value)
    }
}

/// Escape glob metacharacters so `prefix` matches literally under `KEYS`.
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('*');
    escaped
}

fn command(op: &Op) -> Cmd {
    match op {
        Op::Get { key } => {
            let mut cmd = redis::cmd("GET");
            cmd.arg(key);
            cmd
        }
        Op::Set { key, value } => {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            cmd
        }
        Op::Delete { key } => {
            let mut cmd = redis::cmd("DEL");
            cmd.arg(key);
            cmd
        }
        Op::ListPushFront { key, value } => {
            let mut cmd = redis::cmd("LPUSH");
            cmd.arg(key).arg(value);
            cmd
        }
        Op::ListTrim { key, start, stop } => {
            let mut cmd = redis::cmd("LTRIM");
            cmd.arg(key).arg(*start).arg(*stop);
            cmd
        }
        Op::ListRange { key, start, stop } => {
            let mut cmd = redis::cmd("LRANGE");
            cmd.arg(key).arg(*start).arg(*stop);
            cmd
        }
        Op::ListIndex { key, index } => {
            let mut cmd = redis::cmd("LINDEX");
            cmd.arg(key).arg(*index);
            cmd
        }
        Op::ListLength { key } => {
            let mut cmd = redis::cmd("LLEN");
            cmd.arg(key);
            cmd
        }
        Op::KeysByPrefix { prefix } => {
            let mut cmd = redis::cmd("KEYS");
            cmd.arg(glob_escape(prefix));
            cmd
        }
    }
}

fn reply(op: &Op, value: &Value) -> RedisResult<Reply> {
    Ok(match op {
        Op::Get { .. } | Op::ListIndex { .. } => Reply::from(redis::from_redis_value::<Option<String>>(value)?),
        Op::Set { .. } | Op::ListTrim { .. } => Reply::Ok,
        Op::Delete { .. } | Op::ListPushFront { .. } | Op::ListLength { .. } => {
            Reply::Integer(redis::from_redis_value(value)?)
        }
        Op::ListRange { .. } | Op::KeysByPrefix { .. } => Reply::Values(redis::from_redis_value(value)?),
    })
}

impl Backend for RedisBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.query(&Op::get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.query(&Op::set(key, value))
    }

    fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.query::<i64>(&Op::delete(key)).map(|_| ())
    }

    fn list_push_front(&self, key: &str, value: &str) -> Result<u64, BackendError> {
        self.query(&Op::push_front(key, value))
    }

    fn list_trim(&self, key: &str, start: i64, stop: i64) -> Result<(), BackendError> {
        self.query(&Op::trim(key, start, stop))
    }

    fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, BackendError> {
        self.query(&Op::range(key, start, stop))
    }

    fn list_index(&self, key: &str, index: i64) -> Result<Option<String>, BackendError> {
        self.query(&Op::index(key, index))
    }

    fn list_len(&self, key: &str) -> Result<u64, BackendError> {
        self.query(&Op::length(key))
    }

    fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        self.query(&Op::keys(prefix))
    }

    fn execute_atomic(&self, ops: &[Op]) -> Result<Vec<Reply>, BackendError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            pipe.add_command(command(op));
        }

        let values: Vec<Value> = {
            let mut connection = self.lock()?;
            pipe.query(&mut *connection)?
        };
        if values.len() != ops.len() {
            return Err(BackendError::UnexpectedReply {
                expected: "one reply per queued op",
                found: format!("{} replies for {} ops", values.len(), ops.len()),
            });
        }
        debug!(ops = ops.len(), "Executed atomic batch");

        ops.iter()
            .zip(&values)
            .map(|(op, value)| reply(op, value).map_err(BackendError::from))
            .collect()
    }
}
