use anyhow::{Result, bail};
use serde::Serialize;
use tracing::info;

use reqbot_app::{CaptureInput, NewResponse, ReqbotService};
use reqbot_core::FieldMap;
use reqbot_store::Backend;

use crate::Command;

pub fn run<B: Backend + ?Sized>(command: Command, service: &ReqbotService<B>) -> Result<()> {
    match command {
        Command::Capture {
            bucket,
            method,
            path,
            headers,
            query,
            body,
        } => {
            if bucket.is_empty() {
                bail!("bucket name must not be empty");
            }
            let request = service.capture_request(CaptureInput {
                bucket,
                method,
                path: path.unwrap_or_default(),
                headers: parse_pairs(&headers)?,
                query: parse_pairs(&query)?,
                body,
            })?;
            info!(bucket = request.bucket(), id = %request.id(), "Captured request");
            print_json(&request)
        }

        Command::Bucket { name, limit } => {
            let limit = limit.unwrap_or_else(|| service.capacity());
            print_json(&service.get_bucket(&name, limit)?)
        }

        Command::Buckets => print_json(&service.list_buckets()?),

        Command::Respond {
            body,
            headers,
            tags,
        } => {
            if body.is_empty() {
                bail!("response body must not be empty");
            }
            let response = service.create_response(NewResponse {
                headers: parse_pairs(&headers)?,
                body,
                tags,
            })?;
            info!(id = %response.id(), tags = response.tags().len(), "Stored response");
            print_json(&response)
        }

        Command::Response { id } => match service.get_response(&id)? {
            Some(response) => print_json(&response),
            None => bail!("response {id} not found"),
        },

        Command::Responses => print_json(&service.list_all_responses()?),

        Command::Tag { name } => print_json(&service.get_responses_by_tag(&name)?),

        Command::Tags => print_json(&service.list_tags()?),

        Command::Config => bail!("config is handled before a backend is opened"),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse repeated `name=value` arguments. Later duplicates win.
fn parse_pairs(raw: &[String]) -> Result<FieldMap> {
    let mut fields = FieldMap::new();
    for pair in raw {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("expected name=value, got {pair:?}");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("empty name in {pair:?}");
        }
        fields.insert(name, value);
    }
    Ok(fields)
}
