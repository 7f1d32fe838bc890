use log::warn;
use reqwest::{Client, Response};

use travelbot_logic::{ProviderError, prelude::*};

use crate::config;

pub fn client() -> Result<Client> {
    Client::builder()
        .user_agent(config::USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

pub fn map_request_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unavailable(format!("Request failed: {err}"))
    }
}

pub fn map_parse_error(err: serde_json::Error) -> ProviderError {
    ProviderError::Unavailable(format!("Unexpected response: {err}"))
}

/// Body of a successful response, anything else becomes [ProviderError::Unavailable]
pub async fn read_body(service: &str, resp: Response) -> Result<String, ProviderError> {
    let status = resp.status();
    let body = resp.text().await.map_err(map_request_error)?;

    if status.is_success() {
        Ok(body)
    } else {
        warn!("{service} returned {status}: {body}");
        Err(ProviderError::Unavailable(format!(
            "{service} returned {status}"
        )))
    }
}
