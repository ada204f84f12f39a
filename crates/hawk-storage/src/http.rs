use std::time::Duration;

use hawk_core::StoreError;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

/// Credentials attached to every request a backend client sends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum Auth {
    #[default]
    None,
    Basic {
        username: String,
        password: Option<String>,
    },
    ApiKey(String),
}

impl Auth {
    pub(crate) fn from_parts(
        username: Option<&str>,
        password: Option<&str>,
        api_key: Option<&str>,
    ) -> Self {
        match (api_key, username) {
            (Some(key), _) => Auth::ApiKey(key.to_string()),
            (None, Some(user)) => Auth::Basic {
                username: user.to_string(),
                password: password.map(str::to_string),
            },
            (None, None) => Auth::None,
        }
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, password.as_ref()),
            Auth::ApiKey(key) => {
                request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {key}"))
            }
        }
    }
}

/// Request timeout applied when the config leaves `timeout_secs` unset.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Cap on establishing a TCP/TLS connection, whatever the request timeout.
pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 10;

pub(crate) fn request_timeout(timeout_secs: Option<u64>) -> Duration {
    Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
}

pub(crate) fn build_client(timeout_secs: Option<u64>) -> Result<Client, StoreError> {
    let timeout = request_timeout(timeout_secs);
    Client::builder()
        .user_agent(concat!("hawk/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(timeout.min(Duration::from_secs(CONNECT_TIMEOUT_SECS)))
        .timeout(timeout)
        .build()
        .map_err(StoreError::connection)
}

pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Requests that never reached the backend are connection errors; anything
/// else reqwest reports is a backend fault without a vendor code.
pub(crate) fn transport_err(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() {
        StoreError::connection(err)
    } else {
        StoreError::backend("transport", err.to_string())
    }
}

/// Read an error response body as JSON; non-JSON bodies become `Null`.
pub(crate) async fn error_body(response: Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(Value::Null)
}
