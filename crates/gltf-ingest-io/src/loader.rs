//! Blocking front-end: open a file, run a [`LoadSession`] to completion.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use gltf_ingest_core::{
    Fetcher, IngestError, LoadInput, LoadOutput, LoadSession, MeshDecompressor, Phase,
    SessionConfig, TextureStore,
};

use crate::error::Result;
use crate::fetcher::FileFetcher;

/// Everything a finished session produced.
#[derive(Debug)]
pub struct LoadReport {
    pub phase: Phase,
    /// `None` when the load failed before any primitive was scheduled.
    pub output: Option<LoadOutput>,
    pub errors: Vec<IngestError>,
    pub warnings: Vec<String>,
    pub textures: TextureStore,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.phase == Phase::Done
    }

    /// The output of a fully successful load, or the first recorded error.
    pub fn into_output(self) -> Result<LoadOutput> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error.into());
        }
        self.output
            .ok_or_else(|| IngestError::format("load produced no output").into())
    }
}

/// Loads glTF and GLB files from disk.
///
/// ```ignore
/// use gltf_ingest_io::GltfLoader;
///
/// let report = GltfLoader::new().load_path("scene.gltf")?;
/// if let Some(output) = &report.output {
///     println!("{} primitives", output.primitive_count());
/// }
/// ```
#[derive(Clone)]
pub struct GltfLoader {
    config: SessionConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    decompressor: Option<Arc<dyn MeshDecompressor>>,
}

impl Default for GltfLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GltfLoader {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            fetcher: None,
            decompressor: None,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`FileFetcher`].
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_decompressor(mut self, decompressor: Arc<dyn MeshDecompressor>) -> Self {
        self.decompressor = Some(decompressor);
        self
    }

    /// Read `path` and load it. External URIs resolve against its directory.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<LoadReport> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let base = path
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .filter(|dir| !dir.is_empty());
        tracing::debug!("Loading {} ({} bytes)", path.display(), bytes.len());

        let report = self.load_bytes(bytes, base.as_deref());
        if report.is_success() {
            tracing::info!(
                "Loaded {}: {} primitives",
                path.display(),
                report.output.as_ref().map_or(0, LoadOutput::primitive_count)
            );
        } else {
            tracing::warn!(
                "Load of {} failed with {} error(s)",
                path.display(),
                report.errors.len()
            );
        }
        Ok(report)
    }

    /// Load an in-memory GLB or glTF stream.
    pub fn load_bytes(&self, bytes: Vec<u8>, base_uri: Option<&str>) -> LoadReport {
        let fetcher = self
            .fetcher
            .clone()
            .unwrap_or_else(|| Arc::new(FileFetcher::new()));
        let mut session = LoadSession::new(LoadInput::detect(bytes), self.config.clone())
            .with_fetcher(fetcher);
        if let Some(base) = base_uri {
            session = session.with_base_uri(base);
        }
        if let Some(decompressor) = &self.decompressor {
            session = session.with_decompressor(Arc::clone(decompressor));
        }

        let phase = session.run_to_completion();
        let output = session.take_output();
        let errors = session.errors().to_vec();
        let warnings = session.warnings().to_vec();
        LoadReport {
            phase,
            output,
            errors,
            warnings,
            textures: session.into_texture_host(),
        }
    }
}
