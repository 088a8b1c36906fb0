//! Authenticated GET requests against a provider REST API

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{Error, Result};

pub const USER_AGENT: &str = concat!("relnotes/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over `reqwest::Client` bound to one API base and header set
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client whose every request carries `headers`
    pub fn new(base_url: &str, headers: HeaderMap, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let (endpoint, body) = self.get(path, query, None).await?;
        serde_json::from_str(&body).map_err(|source| Error::Decode { endpoint, source })
    }

    /// GET `path` with an overriding `Accept` header and return the raw body
    pub async fn get_text(&self, path: &str, accept: &'static str) -> Result<String> {
        let (_, body) = self.get(path, &[], Some(accept)).await?;
        Ok(body)
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        accept: Option<&'static str>,
    ) -> Result<(String, String)> {
        let endpoint = format!("{}{}", self.base_url, path);

        let mut request = self.http.get(&endpoint);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(accept) = accept {
            request = request.header(ACCEPT, HeaderValue::from_static(accept));
        }

        tracing::debug!(%endpoint, ?query, "GET");
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::debug!(%endpoint, status, "request failed");
            return Err(Error::HttpRequest { status, endpoint });
        }

        let body = response.text().await?;
        Ok((endpoint, body))
    }
}
