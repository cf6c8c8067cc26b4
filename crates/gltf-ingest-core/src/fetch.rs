//! External byte fetching.
//!
//! The session never performs I/O itself. Buffers and images that live
//! outside the document are requested from a [`Fetcher`], which answers
//! with a [`JobHandle`] the driver polls like any decode job.

use crate::error::IngestError;
use crate::scheduler::JobHandle;

pub trait Fetcher: Send + Sync {
    /// Request the bytes of `buffers[index]`. `uri` is already resolved
    /// against the document's base URI.
    fn fetch_buffer(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>>;

    /// Request the encoded bytes of `images[index]`.
    fn fetch_image(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>>;
}

/// Fails every request. Used when a session has no fetcher configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl Fetcher for NoFetcher {
    fn fetch_buffer(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        JobHandle::ready(Err(IngestError::fetch(format!(
            "buffer {}: no fetcher configured for {}",
            index, uri
        ))))
    }

    fn fetch_image(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        JobHandle::ready(Err(IngestError::fetch(format!(
            "image {}: no fetcher configured for {}",
            index, uri
        ))))
    }
}

fn is_absolute(uri: &str) -> bool {
    uri.starts_with('/') || uri.contains("://")
}

/// Join a relative URI onto `base`. Absolute URIs are returned unchanged.
pub fn resolve_uri(base: Option<&str>, uri: &str) -> String {
    match base {
        Some(base) if !base.is_empty() && !is_absolute(uri) => {
            if base.ends_with('/') {
                format!("{}{}", base, uri)
            } else {
                format!("{}/{}", base, uri)
            }
        }
        _ => uri.to_string(),
    }
}

/// The directory part of `uri`, with a trailing `/`. `None` when `uri` has
/// no directory component.
pub fn base_of(uri: &str) -> Option<String> {
    uri.rfind('/').map(|i| uri[..=i].to_string())
}
