//! Fetching from the network.

use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::prelude::*;

use super::{Request, Response, ResponseType};

/// Something that can fetch a request. Abstracted so tests can run offline.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Fetch `request`. Errors only for transport failures. A non-200 status
    /// is still a response.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// A [`Network`] backed by a real HTTP client.
pub struct ReqwestNetwork {
    client: reqwest::Client,
    origin: Url,
}

impl ReqwestNetwork {
    /// Create a client. Responses whose final URL shares an origin with
    /// `origin` are [`ResponseType::Basic`].
    pub fn new(origin: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, origin })
    }
}

#[async_trait]
impl Network for ReqwestNetwork {
    #[instrument(level = "debug", skip_all, fields(method = %request.method, url = %request.url))]
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("Invalid HTTP method {:?}", request.method))?;
        let response = self
            .client
            .request(method, request.url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", request.url))?;

        let status = response.status().as_u16();
        let response_type = response_type_for(&self.origin, response.url());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", request.url))?
            .to_vec();
        debug!(status, ?response_type, bytes = body.len(), "Fetched");

        Ok(Response {
            status,
            response_type,
            content_type,
            body,
        })
    }
}

/// Classify a response by where it finally came from, after redirects.
fn response_type_for(origin: &Url, final_url: &Url) -> ResponseType {
    if origin.origin() == final_url.origin() {
        ResponseType::Basic
    } else {
        ResponseType::Cors
    }
}
