//! Byte fetching for module sources
//!
//! Every address can be fetched two ways: as a stream of chunks tagged with
//! the content type the transport reported, or as one complete buffer. Both
//! are read chunk by chunk, so neither holds more than the caller's byte
//! limit in memory.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use tokio_util::io::ReaderStream;
use tracing::debug;

#[cfg(feature = "http")]
use crate::module::source::http::HttpFetcher;
use crate::module::source::ModuleAddress;
use crate::module::traits::ModuleError;

/// Media type accepted by streaming compilation
pub const WASM_CONTENT_TYPE: &str = "application/wasm";

/// Media type reported for anything that is not recognisably wasm
pub const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

/// Chunked body of a fetch
pub type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// A streamed module source
pub struct ByteStream {
    /// Content type reported by the transport, if any
    pub content_type: Option<String>,
    /// Total length, if the transport knows it up front
    pub length_hint: Option<u64>,
    /// Body chunks in transfer order
    pub chunks: ChunkStream,
}

impl ByteStream {
    /// Whether the transport labelled this body as wasm
    pub fn is_wasm(&self) -> bool {
        self.content_type
            .as_deref()
            .map(is_wasm_media_type)
            .unwrap_or(false)
    }

    /// Drain the stream into one buffer, refusing bodies over `limit` bytes
    pub async fn collect(mut self, limit: usize) -> Result<Bytes, ModuleError> {
        if let Some(hint) = self.length_hint {
            if hint > limit as u64 {
                return Err(ModuleError::Fetch(format!(
                    "body is {} bytes, limit is {}",
                    hint, limit
                )));
            }
        }

        let capacity = self.length_hint.map(|h| h as usize).unwrap_or(0);
        let mut buffer = BytesMut::with_capacity(capacity);
        while let Some(chunk) = self.chunks.next().await {
            let chunk = chunk.map_err(|e| ModuleError::Fetch(format!("stream error: {}", e)))?;
            if buffer.len() + chunk.len() > limit {
                return Err(ModuleError::Fetch(format!(
                    "body exceeds limit of {} bytes",
                    limit
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        debug!("Collected {} streamed bytes", buffer.len());
        Ok(buffer.freeze())
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("content_type", &self.content_type)
            .field("length_hint", &self.length_hint)
            .finish_non_exhaustive()
    }
}

/// Compare a content-type header value against `application/wasm`,
/// ignoring parameters and case
pub fn is_wasm_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(WASM_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Source of module bytes
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Open `address` as a chunk stream
    async fn fetch_stream(&self, address: &ModuleAddress) -> Result<ByteStream, ModuleError>;

    /// Fetch `address` into a single buffer of at most `limit` bytes
    ///
    /// The content type is ignored.
    async fn fetch_bytes(&self, address: &ModuleAddress, limit: usize) -> Result<Bytes, ModuleError> {
        self.fetch_stream(address).await?.collect(limit).await
    }
}

/// Local filesystem fetcher
///
/// Files report `application/wasm` when their extension is `.wasm` and
/// `application/octet-stream` otherwise.
#[derive(Debug, Default, Clone)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }

    fn content_type_for(path: &Path) -> &'static str {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("wasm") => WASM_CONTENT_TYPE,
            _ => OCTET_STREAM_CONTENT_TYPE,
        }
    }

    fn path<'a>(address: &'a ModuleAddress) -> Result<&'a Path, ModuleError> {
        match address {
            ModuleAddress::File(path) => Ok(path),
            other => Err(ModuleError::InvalidAddress(format!(
                "not a file address: {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch_stream(&self, address: &ModuleAddress) -> Result<ByteStream, ModuleError> {
        let path = Self::path(address)?;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ModuleError::Fetch(format!("{}: {}", path.display(), e)))?;
        let length_hint = file.metadata().await.ok().map(|m| m.len());

        Ok(ByteStream {
            content_type: Some(Self::content_type_for(path).to_string()),
            length_hint,
            chunks: Box::pin(ReaderStream::new(file)),
        })
    }
}

/// Fetcher dispatching on the address kind
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    files: FileFetcher,
    #[cfg(feature = "http")]
    http: HttpFetcher,
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(not(feature = "http"))]
    fn http_unavailable(address: &ModuleAddress) -> ModuleError {
        ModuleError::InvalidAddress(format!(
            "http support is not enabled, cannot fetch {}",
            address
        ))
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch_stream(&self, address: &ModuleAddress) -> Result<ByteStream, ModuleError> {
        match address {
            ModuleAddress::File(_) => self.files.fetch_stream(address).await,
            #[cfg(feature = "http")]
            ModuleAddress::Http(_) => self.http.fetch_stream(address).await,
            #[cfg(not(feature = "http"))]
            ModuleAddress::Http(_) => Err(Self::http_unavailable(address)),
        }
    }
}
