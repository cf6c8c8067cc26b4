//! Concrete [`Fetcher`] implementations.
//!
//! [`FileFetcher`] reads from the local file system on the rayon pool and
//! completes the handle from there. [`MemoryFetcher`] answers from an
//! in-memory map and is mostly useful for tests and for assets assembled
//! at runtime.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use gltf_ingest_core::{Fetcher, IngestError, JobHandle};

/// Reads buffers and images from disk.
///
/// URIs arrive already joined onto the session's base URI, so they are
/// interpreted as plain paths. `file://` prefixes and `%XX` escapes are
/// understood; any other scheme fails the request.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root` instead of the working directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Path a URI maps to, or `None` for non-file schemes.
    pub fn path_for(&self, uri: &str) -> Option<PathBuf> {
        let stripped = match uri.strip_prefix("file://") {
            Some(rest) => rest,
            None if uri.contains("://") => return None,
            None => uri,
        };
        let path = PathBuf::from(percent_decode(stripped));
        match &self.root {
            Some(root) if path.is_relative() => Some(root.join(path)),
            _ => Some(path),
        }
    }

    fn read(&self, what: &'static str, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        let Some(path) = self.path_for(uri) else {
            return JobHandle::ready(Err(IngestError::fetch(format!(
                "{} {}: unsupported URI scheme in {}",
                what, index, uri
            ))));
        };

        let (completer, handle) = JobHandle::channel();
        rayon::spawn(move || {
            tracing::trace!("Reading {} {} from {}", what, index, path.display());
            let result = fs::read(&path).map_err(|e| {
                IngestError::fetch(format!("{} {}: {}: {}", what, index, path.display(), e))
            });
            completer.complete(result);
        });
        handle
    }
}

impl Fetcher for FileFetcher {
    fn fetch_buffer(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        self.read("buffer", index, uri)
    }

    fn fetch_image(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        self.read("image", index, uri)
    }
}

/// Decode `%XX` escapes. Malformed escapes are kept verbatim.
pub fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Serves requests from a URI -> bytes map.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(uri, bytes);
        self
    }

    pub fn insert(&mut self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(uri.into(), bytes);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn lookup(&self, what: &str, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        let result = self
            .files
            .get(uri)
            .cloned()
            .ok_or_else(|| IngestError::fetch(format!("{} {}: no entry for {}", what, index, uri)));
        JobHandle::ready(result)
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch_buffer(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        self.lookup("buffer", index, uri)
    }

    fn fetch_image(&self, index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        self.lookup("image", index, uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("my%20model.bin"), "my model.bin");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
        assert_eq!(percent_decode("plain.bin"), "plain.bin");
    }

    #[test]
    fn test_path_for() {
        let fetcher = FileFetcher::with_root("/assets");
        assert_eq!(
            fetcher.path_for("tex/a.png"),
            Some(PathBuf::from("/assets/tex/a.png"))
        );
        assert_eq!(
            fetcher.path_for("file:///tmp/a.bin"),
            Some(PathBuf::from("/tmp/a.bin"))
        );
        assert_eq!(fetcher.path_for("https://example.com/a.bin"), None);
    }

    #[test]
    fn test_unsupported_scheme_fails() {
        let handle = FileFetcher::new().fetch_buffer(0, "https://example.com/a.bin");
        assert!(matches!(handle.join(), Err(IngestError::Fetch(_))));
    }

    #[test]
    fn test_missing_file_fails() {
        let handle = FileFetcher::new().fetch_buffer(1, "/definitely/not/here.bin");
        match handle.join() {
            Err(IngestError::Fetch(msg)) => assert!(msg.starts_with("buffer 1:")),
            other => panic!("unexpected {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new().with_file("a.bin", vec![1, 2, 3]);
        assert_eq!(fetcher.fetch_buffer(0, "a.bin").join().unwrap(), vec![1, 2, 3]);
        assert!(fetcher.fetch_image(0, "b.png").join().is_err());
        assert_eq!(fetcher.len(), 1);
    }
}
