//! File-system front-end for `gltf-ingest`.
//!
//! The core crate never touches the disk. This crate supplies the
//! collaborators and conveniences a desktop tool needs:
//!
//! | Type             | Role                                                  |
//! |------------------|-------------------------------------------------------|
//! | [`FileFetcher`]  | Reads external buffers and images on the rayon pool   |
//! | [`MemoryFetcher`]| Serves buffers and images from an in-memory map       |
//! | [`GltfLoader`]   | Opens a `.gltf`/`.glb` path and loads it to the end   |
//! | [`GltfWriter`]   | Writes decoded primitives back out as GLB or glTF     |
//!
//! # Loading a file
//!
//! ```ignore
//! use gltf_ingest_io::GltfLoader;
//!
//! let report = GltfLoader::new().load_path("models/Duck.gltf")?;
//! for error in &report.errors {
//!     eprintln!("{}", error);
//! }
//! let output = report.into_output()?;
//! ```
//!
//! # Re-encoding
//!
//! ```ignore
//! use gltf_ingest_io::{GltfLoader, GltfWriter};
//!
//! let report = GltfLoader::new().load_path("in.gltf")?;
//! let mut writer = GltfWriter::new();
//! if let Some(output) = &report.output {
//!     writer.add_output(output)?;
//! }
//! writer.add_textures(&report.textures);
//! writer.write_glb("out.glb")?;              // Binary GLB
//! writer.write_gltf_embedded("out.gltf")?;   // Pure text
//! ```

pub mod error;
pub mod fetcher;
pub mod loader;

#[cfg(feature = "writer")]
pub mod gltf_writer;

pub use error::{IoError, Result};
pub use fetcher::{FileFetcher, MemoryFetcher};
#[cfg(feature = "writer")]
pub use gltf_writer::GltfWriter;
pub use loader::{GltfLoader, LoadReport};
