use std::time::Duration;

use url::Url;

use crate::error::VertError;
use crate::net::loader::{ScriptLoader, ScriptRequest};

/// Loads scripts over HTTP (blocking). A script counts as loaded when the
/// server answers with a success status and a readable body.
pub struct HttpScriptLoader {
    client: reqwest::blocking::Client,
}

impl HttpScriptLoader {
    pub fn new() -> Result<Self, VertError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("vert-unit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| VertError::ScriptLoad {
                src: String::new(),
                reason: format!("client error: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl ScriptLoader for HttpScriptLoader {
    fn load(&mut self, request: &ScriptRequest) -> Result<(), VertError> {
        let fail = |reason: String| VertError::ScriptLoad {
            src: request.src.clone(),
            reason,
        };

        let parsed = Url::parse(&request.src).map_err(|e| fail(format!("invalid url: {}", e)))?;

        let mut builder = self.client.get(parsed.as_str()).header("Accept", "*/*");
        if request.crossorigin.is_some() {
            // crossorigin="anonymous": CORS request without credentials.
            builder = builder.header("Sec-Fetch-Mode", "cors");
        }
        let response = builder
            .send()
            .map_err(|e| fail(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("status {}", status.as_u16())));
        }
        let body = response
            .text()
            .map_err(|e| fail(format!("failed to read body: {}", e)))?;
        log::debug!("fetched {} ({} bytes)", request.src, body.len());
        Ok(())
    }
}
