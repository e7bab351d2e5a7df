//! HTTP(S) fetcher

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::module::source::fetcher::{ByteStream, Fetcher};
use crate::module::source::ModuleAddress;
use crate::module::traits::ModuleError;

/// Plain GET fetcher backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, address: &ModuleAddress) -> Result<reqwest::Response, ModuleError> {
        let url = match address {
            ModuleAddress::Http(url) => url,
            other => {
                return Err(ModuleError::InvalidAddress(format!(
                    "not an http address: {}",
                    other
                )))
            }
        };

        debug!("GET {}", url);
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ModuleError::Fetch(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_stream(&self, address: &ModuleAddress) -> Result<ByteStream, ModuleError> {
        let response = self.get(address).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let length_hint = response.content_length();

        let chunks = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        Ok(ByteStream {
            content_type,
            length_hint,
            chunks: Box::pin(chunks),
        })
    }
}
