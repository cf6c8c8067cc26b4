//! Load session: the phase state machine driving one glTF/GLB load.
//!
//! ```text
//! ParsingContainer -> ResolvingBuffers -> DecodingJobs -> Assembling -> Done
//!        |                  |                  |              |
//!        +------------------+------------------+--------------+--> Failed
//! ```
//!
//! Container and document errors fail the session immediately. Anything
//! more local (a buffer, an image, a primitive) is recorded and sets the
//! loading-error flag; the session then finishes the current phase, drains
//! whatever is in flight and reports `Failed`, keeping whatever primitives
//! did decode.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::accessor::indices::is_mode_tested;
use crate::buffer::{BufferResolver, ResolvedBuffers};
use crate::compressed::MeshDecompressor;
use crate::data_uri::{decode_data_uri_with_limit, is_data_uri, DEFAULT_MEDIA_TYPE_SCAN};
use crate::defer::{DeferPolicy, NeverDefer};
use crate::error::{IngestError, Result};
use crate::extensions::check_extension_support;
use crate::fetch::{resolve_uri, Fetcher, NoFetcher};
use crate::glb::{is_glb, parse_glb, ChunkRange};
use crate::image::{classify, texture_name, ImageFormat, ImageSource, TextureHandle, TextureHost, TextureStore};
use crate::primitive::{DecodeContext, MeshPrimitiveIndex, Primitive, PrimitiveContext};
use crate::scheduler::{JobHandle, JobPool};
use crate::schema::Document;

// ============================================================================
// Configuration and input
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Worker threads for decode jobs. `None` uses rayon's default.
    pub worker_threads: Option<usize>,
    /// How far into a data URI to look for the media type separator.
    pub max_embedded_uri_len: usize,
    /// Warn when buffers are embedded as base64.
    pub warn_embedded_buffers: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_embedded_uri_len: DEFAULT_MEDIA_TYPE_SCAN,
            warn_embedded_buffers: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum LoadInput {
    Glb(Vec<u8>),
    Gltf(Vec<u8>),
}

impl LoadInput {
    /// GLB when the stream starts with the GLB magic, JSON otherwise.
    pub fn detect(bytes: Vec<u8>) -> Self {
        if is_glb(&bytes) {
            LoadInput::Glb(bytes)
        } else {
            LoadInput::Gltf(bytes)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    ParsingContainer,
    ResolvingBuffers,
    DecodingJobs,
    Assembling,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Everything a finished (or partially finished) load produced.
#[derive(Debug)]
pub struct LoadOutput {
    pub document: Arc<Document>,
    /// One slot per mesh primitive, `None` where the primitive failed.
    pub primitives: Vec<Option<Primitive>>,
    pub mesh_index: MeshPrimitiveIndex,
    /// One slot per image, `None` where the image was skipped or failed.
    pub images: Vec<Option<TextureHandle>>,
}

impl LoadOutput {
    pub fn primitive_count(&self) -> usize {
        self.primitives.iter().flatten().count()
    }

    /// Decoded primitives of one mesh, in order.
    pub fn mesh_primitives(&self, mesh_index: usize) -> impl Iterator<Item = &Primitive> + '_ {
        let range = self.mesh_index.range(mesh_index).unwrap_or(0..0);
        self.primitives.get(range).unwrap_or(&[]).iter().flatten()
    }

    /// Decoded primitives of the mesh instanced by `node_index`.
    pub fn node_primitives(&self, node_index: usize) -> Vec<&Primitive> {
        self.document
            .nodes
            .get(node_index)
            .and_then(|node| node.mesh)
            .map(|mesh| self.mesh_primitives(mesh).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Session
// ============================================================================

enum Step {
    Progressed,
    Blocked,
}

struct PendingImage {
    image_index: usize,
    texture: TextureHandle,
    format: ImageFormat,
    handle: JobHandle<Vec<u8>>,
}

/// Drives one load through its phases.
///
/// Call [`advance`](Self::advance) from the host loop until it returns a
/// terminal phase, or [`run_to_completion`](Self::run_to_completion) to
/// block until done.
pub struct LoadSession<H: TextureHost = TextureStore> {
    config: SessionConfig,
    phase: Phase,
    input: Option<LoadInput>,
    base_uri: Option<String>,

    fetcher: Arc<dyn Fetcher>,
    decompressor: Option<Arc<dyn MeshDecompressor>>,
    defer: Box<dyn DeferPolicy>,
    textures: H,

    document: Option<Arc<Document>>,
    glb: Option<Arc<[u8]>>,
    bin_chunk: Option<ChunkRange>,
    resolver: Option<BufferResolver>,
    buffers: Option<ResolvedBuffers>,
    pool: Option<JobPool>,

    buffer_fetches: Vec<(usize, JobHandle<Vec<u8>>)>,
    view_images: Vec<(usize, usize, ImageFormat)>,
    pending_images: Vec<PendingImage>,
    jobs_scheduled: bool,
    contexts: VecDeque<PrimitiveContext>,

    mesh_index: MeshPrimitiveIndex,
    primitives: Vec<Option<Primitive>>,
    images: Vec<Option<TextureHandle>>,

    loading_error: bool,
    /// A buffer could not be resolved; decoding cannot start.
    buffer_error: bool,
    draining: bool,
    errors: Vec<IngestError>,
    warnings: Vec<String>,
    output: Option<LoadOutput>,
}

impl LoadSession<TextureStore> {
    pub fn new(input: LoadInput, config: SessionConfig) -> Self {
        Self::with_texture_host(input, config, TextureStore::new())
    }
}

impl<H: TextureHost> LoadSession<H> {
    pub fn with_texture_host(input: LoadInput, config: SessionConfig, textures: H) -> Self {
        Self {
            config,
            phase: Phase::ParsingContainer,
            input: Some(input),
            base_uri: None,
            fetcher: Arc::new(NoFetcher),
            decompressor: None,
            defer: Box::new(NeverDefer),
            textures,
            document: None,
            glb: None,
            bin_chunk: None,
            resolver: None,
            buffers: None,
            pool: None,
            buffer_fetches: Vec::new(),
            view_images: Vec::new(),
            pending_images: Vec::new(),
            jobs_scheduled: false,
            contexts: VecDeque::new(),
            mesh_index: MeshPrimitiveIndex::default(),
            primitives: Vec::new(),
            images: Vec::new(),
            loading_error: false,
            buffer_error: false,
            draining: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            output: None,
        }
    }

    /// Base against which relative buffer and image URIs are resolved.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_decompressor(mut self, decompressor: Arc<dyn MeshDecompressor>) -> Self {
        self.decompressor = Some(decompressor);
        self
    }

    pub fn with_defer_policy(mut self, policy: Box<dyn DeferPolicy>) -> Self {
        self.defer = policy;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once any localized failure has been recorded.
    pub fn loading_error(&self) -> bool {
        self.loading_error
    }

    pub fn errors(&self) -> &[IngestError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_deref()
    }

    pub fn textures(&self) -> &H {
        &self.textures
    }

    pub fn into_texture_host(self) -> H {
        self.textures
    }

    /// Output of a terminal session. `None` before that, or when the load
    /// failed before any primitive was scheduled.
    pub fn take_output(&mut self) -> Option<LoadOutput> {
        self.output.take()
    }

    /// Run steps until the session blocks on outstanding work, reaches a
    /// terminal phase, or the deferral policy asks to yield.
    pub fn advance(&mut self) -> Phase {
        self.defer.reset();
        while !self.phase.is_terminal() {
            match self.step() {
                Step::Blocked => break,
                Step::Progressed => {
                    if self.defer.should_defer() {
                        break;
                    }
                }
            }
        }
        self.phase
    }

    /// Drive the session to a terminal phase, blocking on outstanding work.
    pub fn run_to_completion(&mut self) -> Phase {
        loop {
            let phase = self.advance();
            if phase.is_terminal() {
                return phase;
            }
            self.block_on_outstanding();
        }
    }

    fn step(&mut self) -> Step {
        if self.draining {
            return self.step_drain();
        }
        match self.phase {
            Phase::ParsingContainer => self.step_parse(),
            Phase::ResolvingBuffers => self.step_resolve(),
            Phase::DecodingJobs => self.step_decode(),
            Phase::Assembling => self.step_assemble(),
            Phase::Done | Phase::Failed => Step::Blocked,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        tracing::debug!("Load phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn record(&mut self, error: IngestError) {
        self.loading_error = true;
        self.errors.push(error);
    }

    fn record_buffer(&mut self, index: usize, error: IngestError) {
        tracing::error!("Buffer {}: {}", index, error);
        self.buffer_error = true;
        self.record(error);
    }

    /// Container or document failure: nothing is in flight yet.
    fn fail_fatal(&mut self, error: IngestError) -> Step {
        tracing::error!("glTF load failed: {}", error);
        self.record(error);
        self.set_phase(Phase::Failed);
        Step::Progressed
    }

    // ------------------------------------------------------------------------
    // ParsingContainer
    // ------------------------------------------------------------------------

    fn step_parse(&mut self) -> Step {
        let Some(input) = self.input.take() else {
            return self.fail_fatal(IngestError::format("Session has no input"));
        };

        let document = match input {
            LoadInput::Glb(bytes) => match parse_glb(&bytes) {
                Ok(container) => {
                    self.bin_chunk = container.bin_chunk;
                    self.glb = Some(Arc::from(bytes));
                    container.document
                }
                Err(e) => return self.fail_fatal(e),
            },
            LoadInput::Gltf(json) => match Document::from_slice(&json) {
                Ok(document) => document,
                Err(e) => return self.fail_fatal(e),
            },
        };

        match check_extension_support(&document) {
            Ok(unsupported) => self.warnings.extend(
                unsupported
                    .into_iter()
                    .map(|ext| format!("glTF extension {} is not supported", ext)),
            ),
            Err(e) => return self.fail_fatal(e),
        }

        let document = Arc::new(document);
        self.document = Some(document.clone());
        self.start_buffer_loads(&document);
        self.start_image_loads(&document);
        self.set_phase(Phase::ResolvingBuffers);
        Step::Progressed
    }

    fn start_buffer_loads(&mut self, document: &Document) {
        let mut resolver = BufferResolver::new(document.buffers.len());

        for (index, buffer) in document.buffers.iter().enumerate() {
            match &buffer.uri {
                Some(uri) if is_data_uri(uri) => {
                    if self.config.warn_embedded_buffers {
                        tracing::warn!(
                            "Buffer {} is embedded as base64; decoding it is slow",
                            index
                        );
                    }
                    let decoded = decode_data_uri_with_limit(uri, self.config.max_embedded_uri_len)
                        .and_then(|data| resolver.set_bytes(index, data.bytes));
                    if let Err(e) = decoded {
                        self.record_buffer(index, e);
                    }
                }
                Some(uri) => {
                    let uri = resolve_uri(self.base_uri.as_deref(), uri);
                    tracing::debug!("Fetching buffer {} from {}", index, uri);
                    let handle = self.fetcher.fetch_buffer(index, &uri);
                    self.buffer_fetches.push((index, handle));
                }
                None => {
                    let bound = match (index, self.glb.clone(), self.bin_chunk) {
                        (0, Some(glb), Some(chunk)) => resolver.set_glb_binary(glb, chunk),
                        _ => Err(IngestError::format(format!(
                            "Buffer {} has no uri and no GLB binary chunk",
                            index
                        ))),
                    };
                    if let Err(e) = bound {
                        self.record_buffer(index, e);
                    }
                }
            }
        }

        self.resolver = Some(resolver);
    }

    fn start_image_loads(&mut self, document: &Document) {
        self.images = vec![None; document.images.len()];

        for (index, image) in document.images.iter().enumerate() {
            match ImageSource::of(image) {
                Some(ImageSource::Embedded(uri)) => {
                    let data = match decode_data_uri_with_limit(uri, self.config.max_embedded_uri_len) {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::error!("Image {}: {}", index, e);
                            self.record(e);
                            continue;
                        }
                    };
                    let Some(format) = ImageFormat::from_mime_type(&data.mime_type) else {
                        tracing::error!(
                            "Image {}: unknown embedded image type {}",
                            index,
                            data.mime_type
                        );
                        continue;
                    };
                    let texture = self
                        .textures
                        .create_texture(index, &texture_name(image, index));
                    self.upload_image(index, texture, format, data.bytes);
                }
                Some(ImageSource::BufferView(view)) => match classify(image) {
                    Some(format) => self.view_images.push((index, view, format)),
                    None => tracing::error!("Image {}: unknown image format", index),
                },
                Some(ImageSource::External(uri)) => {
                    let Some(format) = classify(image) else {
                        tracing::error!("Image {}: unknown image format for {}", index, uri);
                        continue;
                    };
                    let texture = self
                        .textures
                        .create_texture(index, &texture_name(image, index));
                    let uri = resolve_uri(self.base_uri.as_deref(), uri);
                    tracing::debug!("Fetching image {} from {}", index, uri);
                    let handle = self.fetcher.fetch_image(index, &uri);
                    self.pending_images.push(PendingImage {
                        image_index: index,
                        texture,
                        format,
                        handle,
                    });
                }
                None => tracing::warn!("Image {} has neither uri nor bufferView", index),
            }
        }
    }

    fn upload_image(&mut self, index: usize, texture: TextureHandle, format: ImageFormat, bytes: Vec<u8>) {
        match self.textures.load_image(texture, format, bytes) {
            Ok(()) => self.images[index] = Some(texture),
            Err(e) => tracing::error!("Image {}: {}", index, e),
        }
    }

    // ------------------------------------------------------------------------
    // ResolvingBuffers
    // ------------------------------------------------------------------------

    fn step_resolve(&mut self) -> Step {
        if !self
            .buffer_fetches
            .iter_mut()
            .fold(true, |done, (_, handle)| handle.is_completed() && done)
        {
            return Step::Blocked;
        }

        let Some(mut resolver) = self.resolver.take() else {
            return self.fail_fatal(IngestError::format("Buffer resolver missing"));
        };
        for (index, mut handle) in std::mem::take(&mut self.buffer_fetches) {
            let stored = match handle.take() {
                Some(Ok(bytes)) => resolver.set_bytes(index, bytes),
                Some(Err(e)) => Err(e),
                None => Err(IngestError::fetch("fetch handle already taken")),
            };
            if let Err(e) = stored {
                self.record_buffer(index, e);
            }
        }

        // Image failures are recorded but do not hold back mesh decoding.
        if self.buffer_error {
            return self.begin_drain();
        }
        match resolver.finish() {
            Ok(buffers) => {
                self.buffers = Some(buffers);
                self.set_phase(Phase::DecodingJobs);
                Step::Progressed
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.buffer_error = true;
                self.record(e);
                self.begin_drain()
            }
        }
    }

    // ------------------------------------------------------------------------
    // DecodingJobs
    // ------------------------------------------------------------------------

    fn step_decode(&mut self) -> Step {
        if !self.jobs_scheduled {
            return self.schedule_jobs();
        }

        let progressed = self.poll_images();
        if self.pending_images.is_empty() {
            self.set_phase(Phase::Assembling);
            return Step::Progressed;
        }
        if progressed {
            Step::Progressed
        } else {
            Step::Blocked
        }
    }

    fn schedule_jobs(&mut self) -> Step {
        self.jobs_scheduled = true;
        let Some(document) = self.document.clone() else {
            return self.fail_fatal(IngestError::format("Decoding started without a document"));
        };
        if self.pool.is_none() {
            match JobPool::new(self.config.worker_threads) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => return self.fail_fatal(e),
            }
        }
        let (Some(pool), Some(buffers)) = (self.pool.as_ref(), self.buffers.as_ref()) else {
            return self.fail_fatal(IngestError::format("Decoding started without buffers"));
        };

        for (index, view, format) in std::mem::take(&mut self.view_images) {
            let image = &document.images[index];
            let texture = self
                .textures
                .create_texture(index, &texture_name(image, index));
            let handle = match document.buffer_view(view).and_then(|v| buffers.view(v)) {
                Ok(bytes) => pool.spawn(move || Ok(bytes.to_vec())),
                Err(e) => JobHandle::ready(Err(e)),
            };
            self.pending_images.push(PendingImage {
                image_index: index,
                texture,
                format,
                handle,
            });
        }

        self.mesh_index = MeshPrimitiveIndex::build(&document);
        self.primitives = vec![None; self.mesh_index.total()];

        let ctx = DecodeContext {
            document: &document,
            buffers,
            pool,
            decompressor: self.decompressor.as_ref(),
        };
        let mut slot = 0;
        for (mesh_index, mesh) in document.meshes.iter().enumerate() {
            for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
                if !is_mode_tested(primitive.mode) {
                    let note = format!(
                        "Mesh {} primitive {}: draw mode {} is untested",
                        mesh_index, primitive_index, primitive.mode
                    );
                    tracing::warn!("{}", note);
                    self.warnings.push(note);
                }
                match PrimitiveContext::prepare(&ctx, mesh_index, primitive_index, slot) {
                    Ok(context) => self.contexts.push_back(context),
                    Err(e) => {
                        tracing::error!("Mesh {} primitive {}: {}", mesh_index, primitive_index, e);
                        self.loading_error = true;
                        self.errors.push(e);
                    }
                }
                slot += 1;
            }
        }
        tracing::debug!(
            "Scheduled {} primitives, {} jobs",
            self.contexts.len(),
            pool.jobs_spawned()
        );
        Step::Progressed
    }

    /// Hand finished image bytes to the texture host. Returns whether any
    /// image completed.
    fn poll_images(&mut self) -> bool {
        let mut progressed = false;
        let mut still_pending = Vec::with_capacity(self.pending_images.len());

        for mut pending in std::mem::take(&mut self.pending_images) {
            match pending.handle.take() {
                None => still_pending.push(pending),
                Some(Ok(bytes)) => {
                    progressed = true;
                    self.upload_image(pending.image_index, pending.texture, pending.format, bytes);
                }
                Some(Err(e)) => {
                    progressed = true;
                    tracing::error!("Image {}: {}", pending.image_index, e);
                }
            }
        }

        self.pending_images = still_pending;
        progressed
    }

    // ------------------------------------------------------------------------
    // Assembling
    // ------------------------------------------------------------------------

    fn step_assemble(&mut self) -> Step {
        let Some(front) = self.contexts.front_mut() else {
            return self.finish();
        };
        if !front.is_completed() {
            return Step::Blocked;
        }
        let Some(context) = self.contexts.pop_front() else {
            return Step::Blocked;
        };

        let (mesh_index, primitive_index, slot) =
            (context.mesh_index, context.primitive_index, context.slot);
        match context.assemble() {
            Ok(primitive) => self.primitives[slot] = Some(primitive),
            Err(errors) => {
                for e in errors {
                    tracing::error!("Mesh {} primitive {}: {}", mesh_index, primitive_index, e);
                    self.record(e);
                }
            }
        }
        Step::Progressed
    }

    fn finish(&mut self) -> Step {
        if let Some(buffers) = self.buffers.take() {
            buffers.release();
        }
        self.glb = None;

        let Some(document) = self.document.clone() else {
            return self.fail_fatal(IngestError::format("Session finished without a document"));
        };
        self.output = Some(LoadOutput {
            document,
            primitives: std::mem::take(&mut self.primitives),
            mesh_index: std::mem::take(&mut self.mesh_index),
            images: std::mem::take(&mut self.images),
        });

        if self.loading_error {
            tracing::error!("glTF load finished with {} errors", self.errors.len());
            self.set_phase(Phase::Failed);
        } else {
            self.set_phase(Phase::Done);
        }
        Step::Progressed
    }

    // ------------------------------------------------------------------------
    // Failure draining
    // ------------------------------------------------------------------------

    fn begin_drain(&mut self) -> Step {
        tracing::debug!("Draining in-flight work after failure");
        self.draining = true;
        Step::Progressed
    }

    /// Wait (without blocking) for every outstanding fetch and job, then
    /// release buffers and fail.
    fn step_drain(&mut self) -> Step {
        self.buffer_fetches
            .retain_mut(|(_, handle)| !handle.is_completed());
        self.pending_images
            .retain_mut(|pending| !pending.handle.is_completed());
        self.contexts.retain_mut(|context| !context.is_completed());

        if !self.buffer_fetches.is_empty()
            || !self.pending_images.is_empty()
            || !self.contexts.is_empty()
        {
            return Step::Blocked;
        }

        if let Some(buffers) = self.buffers.take() {
            buffers.release();
        }
        self.resolver = None;
        self.glb = None;
        self.draining = false;
        self.set_phase(Phase::Failed);
        Step::Progressed
    }

    /// Block on the first piece of outstanding work for the current phase.
    fn block_on_outstanding(&mut self) {
        for (_, handle) in &mut self.buffer_fetches {
            if !handle.is_completed() {
                handle.wait();
                return;
            }
        }
        for pending in &mut self.pending_images {
            if !pending.handle.is_completed() {
                pending.handle.wait();
                return;
            }
        }
        for context in &mut self.contexts {
            if !context.is_completed() {
                context.wait();
                return;
            }
        }
    }
}

impl<H: TextureHost> std::fmt::Debug for LoadSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadSession")
            .field("phase", &self.phase)
            .field("loading_error", &self.loading_error)
            .field("errors", &self.errors.len())
            .field("pending_primitives", &self.contexts.len())
            .finish()
    }
}

/// Load an in-memory GLB or glTF stream with default collaborators.
pub fn load_slice(bytes: &[u8]) -> Result<LoadOutput> {
    let mut session = LoadSession::new(LoadInput::detect(bytes.to_vec()), SessionConfig::default());
    session.run_to_completion();
    match session.take_output() {
        Some(output) if !session.loading_error() => Ok(output),
        _ => Err(session
            .errors()
            .first()
            .cloned()
            .unwrap_or_else(|| IngestError::format("load failed"))),
    }
}
