//! Module source acquisition
//!
//! Resolves addresses and fetches module bytes, streamed or buffered.

pub mod address;
pub mod fetcher;
#[cfg(feature = "http")]
pub mod http;

pub use address::ModuleAddress;
pub use fetcher::{
    is_wasm_media_type, ByteStream, ChunkStream, FileFetcher, Fetcher, SourceFetcher,
    OCTET_STREAM_CONTENT_TYPE, WASM_CONTENT_TYPE,
};
#[cfg(feature = "http")]
pub use http::HttpFetcher;
