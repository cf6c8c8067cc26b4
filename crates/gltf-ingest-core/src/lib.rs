//! glTF 2.0 ingestion core.
//!
//! Turns a glTF JSON document or a GLB container into engine-ready vertex,
//! index and image data. Accessor decoding runs in parallel on a worker
//! pool; a [`LoadSession`] drives the load through explicit phases so a
//! host loop can interleave it with its own work.
//!
//! # Pipeline
//!
//! | Phase              | Work                                                  |
//! |--------------------|-------------------------------------------------------|
//! | `ParsingContainer` | GLB chunks, JSON document, extension gate             |
//! | `ResolvingBuffers` | GLB binary chunk, data URIs, external fetches         |
//! | `DecodingJobs`     | accessor, compressed mesh and image jobs on the pool  |
//! | `Assembling`       | per-primitive harvest into [`Primitive`] records      |
//!
//! # Loading
//!
//! ```ignore
//! use gltf_ingest_core::{LoadInput, LoadSession, Phase, SessionConfig};
//!
//! let bytes = std::fs::read("model.glb")?;
//! let mut session = LoadSession::new(LoadInput::detect(bytes), SessionConfig::default());
//!
//! // Cooperative: call once per frame.
//! while !session.advance().is_terminal() {
//!     // ... host work ...
//! }
//!
//! let output = session.take_output().expect("load produced output");
//! for prim in output.mesh_primitives(0) {
//!     println!("{} vertices", prim.data.vertex_count());
//! }
//! ```
//!
//! # Collaborators
//!
//! - [`Fetcher`] supplies external buffers and images.
//! - [`MeshDecompressor`] decodes `KHR_draco_mesh_compression` payloads.
//! - [`TextureHost`] receives encoded images.
//! - [`DeferPolicy`] decides when [`LoadSession::advance`] yields.

pub mod accessor;
pub mod buffer;
pub mod compressed;
pub mod data_uri;
pub mod defer;
pub mod error;
pub mod extensions;
pub mod fetch;
pub mod glb;
pub mod image;
pub mod primitive;
pub mod scheduler;
pub mod schema;
pub mod session;

pub use accessor::{decode_accessor, AccessorPlan, AttributeData, ComponentType, Semantic, Topology};
pub use buffer::{BufferResolver, ByteView, ResolvedBuffers};
pub use compressed::MeshDecompressor;
pub use defer::{DeferPolicy, NeverDefer, TimeBudget};
pub use error::{IngestError, Result};
pub use fetch::{Fetcher, NoFetcher};
pub use glb::{parse_glb, write_glb, GlbContainer, GlbLayout};
pub use image::{ImageFormat, TextureHandle, TextureHost, TextureStore};
pub use primitive::{Colors, MeshData, MeshPrimitiveIndex, Primitive};
pub use scheduler::{Completer, JobHandle, JobPool, JobSet};
pub use schema::Document;
pub use session::{load_slice, LoadInput, LoadOutput, LoadSession, Phase, SessionConfig};
