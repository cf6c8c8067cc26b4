//! Primitive assembly.
//!
//! Every mesh primitive gets a [`PrimitiveContext`] holding the jobs that
//! produce its arrays. Once all of them have published, the context is
//! turned into a [`Primitive`], or into the list of errors that sank it.

use std::ops::Range;
use std::sync::Arc;

use crate::accessor::indices::{self, topology_for_mode, Topology};
use crate::accessor::{AccessorPlan, AttributeData, Semantic};
use crate::buffer::ResolvedBuffers;
use crate::compressed::{schedule_decompression, MeshDecompressor};
use crate::error::{IngestError, Result};
use crate::scheduler::{JobHandle, JobPool, JobSet};
use crate::schema::{Document, MeshPrimitive, MODE_LINE_LOOP};

// ============================================================================
// Output types
// ============================================================================

/// Vertex colors in the precision they were stored with.
#[derive(Debug, Clone, PartialEq)]
pub enum Colors {
    Rgba8(Vec<[u8; 4]>),
    RgbaF32(Vec<[f32; 4]>),
}

impl Colors {
    pub fn len(&self) -> usize {
        match self {
            Colors::Rgba8(c) => c.len(),
            Colors::RgbaF32(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Colors as floats in `[0, 1]`.
    pub fn to_f32(&self) -> Vec<[f32; 4]> {
        match self {
            Colors::Rgba8(c) => c
                .iter()
                .map(|px| px.map(|v| v as f32 / 255.0))
                .collect(),
            Colors::RgbaF32(c) => c.clone(),
        }
    }
}

/// Canonical vertex and index arrays of one primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tangents: Option<Vec<[f32; 4]>>,
    pub uv0: Option<Vec<[f32; 2]>>,
    pub uv1: Option<Vec<[f32; 2]>>,
    pub colors: Option<Colors>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Semantics of the attributes present, in glTF naming.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        let mut names = vec!["POSITION"];
        if self.normals.is_some() {
            names.push("NORMAL");
        }
        if self.tangents.is_some() {
            names.push("TANGENT");
        }
        if self.uv0.is_some() {
            names.push("TEXCOORD_0");
        }
        if self.uv1.is_some() {
            names.push("TEXCOORD_1");
        }
        if self.colors.is_some() {
            names.push("COLOR_0");
        }
        names
    }

    /// Every attribute must match the position count and every index must
    /// address a vertex.
    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        let counts = [
            ("NORMAL", self.normals.as_ref().map(Vec::len)),
            ("TANGENT", self.tangents.as_ref().map(Vec::len)),
            ("TEXCOORD_0", self.uv0.as_ref().map(Vec::len)),
            ("TEXCOORD_1", self.uv1.as_ref().map(Vec::len)),
            ("COLOR_0", self.colors.as_ref().map(Colors::len)),
        ];
        for (name, count) in counts {
            if let Some(count) = count {
                if count != n {
                    return Err(IngestError::format(format!(
                        "{} has {} elements but POSITION has {}",
                        name, count, n
                    )));
                }
            }
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(IngestError::format(format!(
                "Index {} out of range for {} vertices",
                bad, n
            )));
        }
        Ok(())
    }
}

/// One decoded drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub mesh_index: usize,
    pub primitive_index: usize,
    pub mesh_name: Option<String>,
    pub data: MeshData,
    pub topology: Topology,
    /// Original glTF draw mode.
    pub mode: u32,
    pub material: Option<usize>,
    /// Decoded through the compressed mesh path.
    pub compressed: bool,
}

// ============================================================================
// Mesh -> primitive prefix sums
// ============================================================================

/// Maps a mesh to its contiguous range in the flat primitive list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshPrimitiveIndex {
    /// `offsets[m]..offsets[m + 1]` is mesh `m`'s range.
    offsets: Vec<usize>,
}

impl MeshPrimitiveIndex {
    pub fn build(document: &Document) -> Self {
        Self::from_counts(document.meshes.iter().map(|m| m.primitives.len()))
    }

    pub fn from_counts(counts: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = vec![0];
        let mut total = 0;
        for count in counts {
            total += count;
            offsets.push(total);
        }
        Self { offsets }
    }

    pub fn mesh_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn total(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn range(&self, mesh_index: usize) -> Option<Range<usize>> {
        let start = *self.offsets.get(mesh_index)?;
        let end = *self.offsets.get(mesh_index + 1)?;
        Some(start..end)
    }

    /// Flat slot of `primitive_index` within `mesh_index`.
    pub fn slot(&self, mesh_index: usize, primitive_index: usize) -> Option<usize> {
        self.range(mesh_index)
            .map(|r| r.start + primitive_index)
            .filter(|&slot| slot < self.offsets[mesh_index + 1])
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Borrowed state needed to schedule a primitive's jobs.
pub struct DecodeContext<'a> {
    pub document: &'a Document,
    pub buffers: &'a ResolvedBuffers,
    pub pool: &'a JobPool,
    pub decompressor: Option<&'a Arc<dyn MeshDecompressor>>,
}

const ATTRIBUTES: [(&str, Semantic); 6] = [
    ("POSITION", Semantic::Position),
    ("NORMAL", Semantic::Normal),
    ("TANGENT", Semantic::Tangent),
    ("TEXCOORD_0", Semantic::TexCoord(0)),
    ("TEXCOORD_1", Semantic::TexCoord(1)),
    ("COLOR_0", Semantic::Color),
];

#[derive(Debug)]
enum PendingGeometry {
    Accessors(JobSet<Semantic, AttributeData>),
    Compressed(JobHandle<MeshData>),
}

/// In-flight decode of one primitive.
#[derive(Debug)]
pub struct PrimitiveContext {
    pub mesh_index: usize,
    pub primitive_index: usize,
    /// Position in the flat primitive list.
    pub slot: usize,
    mesh_name: Option<String>,
    mode: u32,
    material: Option<usize>,
    explicit_indices: bool,
    pending: PendingGeometry,
}

impl PrimitiveContext {
    /// Schedule every job the primitive needs. Planning failures are
    /// recorded as already-failed jobs so the primitive fails at assembly.
    pub fn prepare(
        ctx: &DecodeContext<'_>,
        mesh_index: usize,
        primitive_index: usize,
        slot: usize,
    ) -> Result<Self> {
        let mesh = ctx
            .document
            .meshes
            .get(mesh_index)
            .ok_or_else(|| IngestError::format(format!("Invalid mesh index: {}", mesh_index)))?;
        let primitive = mesh.primitives.get(primitive_index).ok_or_else(|| {
            IngestError::format(format!(
                "Invalid primitive index: {} in mesh {}",
                primitive_index, mesh_index
            ))
        })?;

        let pending = match primitive.draco() {
            Some(draco) => {
                let handle = match ctx
                    .document
                    .buffer_view(draco.buffer_view)
                    .and_then(|view| ctx.buffers.view(view))
                {
                    Ok(bytes) => schedule_decompression(
                        ctx.pool,
                        ctx.decompressor,
                        bytes,
                        draco.attributes.clone(),
                    ),
                    Err(e) => JobHandle::ready(Err(e)),
                };
                PendingGeometry::Compressed(handle)
            }
            None => PendingGeometry::Accessors(schedule_accessors(ctx, primitive)),
        };

        Ok(Self {
            mesh_index,
            primitive_index,
            slot,
            mesh_name: mesh.name.clone(),
            mode: primitive.mode,
            material: primitive.material,
            explicit_indices: primitive.indices.is_some(),
            pending,
        })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.pending, PendingGeometry::Compressed(_))
    }

    /// Non-blocking.
    pub fn is_completed(&mut self) -> bool {
        match &mut self.pending {
            PendingGeometry::Accessors(set) => set.is_completed(),
            PendingGeometry::Compressed(handle) => handle.is_completed(),
        }
    }

    pub fn wait(&mut self) {
        match &mut self.pending {
            PendingGeometry::Accessors(set) => set.wait(),
            PendingGeometry::Compressed(handle) => handle.wait(),
        }
    }

    /// Harvest every job and build the primitive. On failure, returns every
    /// error the primitive's jobs produced.
    pub fn assemble(self) -> std::result::Result<Primitive, Vec<IngestError>> {
        let compressed = self.is_compressed();
        let mut data = match self.pending {
            PendingGeometry::Compressed(handle) => handle.join().map_err(|e| vec![e])?,
            PendingGeometry::Accessors(set) => collect_attributes(set)?,
        };

        if self.mode == MODE_LINE_LOOP && self.explicit_indices {
            if let Some(&first) = data.indices.first() {
                data.indices.push(first);
            }
        }
        data.validate().map_err(|e| vec![e])?;

        Ok(Primitive {
            mesh_index: self.mesh_index,
            primitive_index: self.primitive_index,
            mesh_name: self.mesh_name,
            data,
            topology: topology_for_mode(self.mode),
            mode: self.mode,
            material: self.material,
            compressed,
        })
    }
}

fn schedule_accessors(
    ctx: &DecodeContext<'_>,
    primitive: &MeshPrimitive,
) -> JobSet<Semantic, AttributeData> {
    let mut set = JobSet::new();

    let Some(position) = primitive.attribute("POSITION") else {
        set.push(
            Semantic::Position,
            JobHandle::ready(Err(IngestError::format("Primitive has no POSITION attribute"))),
        );
        return set;
    };

    for (name, semantic) in ATTRIBUTES {
        if let Some(accessor) = primitive.attribute(name) {
            set.push(semantic, spawn_accessor(ctx, accessor, semantic));
        }
    }

    match primitive.indices {
        Some(accessor) => set.push(
            Semantic::Indices,
            spawn_accessor(ctx, accessor, Semantic::Indices),
        ),
        None => {
            let handle = match ctx.document.accessor(position) {
                Ok(accessor) => {
                    let (count, mode) = (accessor.count, primitive.mode);
                    ctx.pool.spawn(move || {
                        Ok(AttributeData::Indices(indices::synthesize(count, mode)))
                    })
                }
                Err(e) => JobHandle::ready(Err(e)),
            };
            set.push(Semantic::Indices, handle);
        }
    }

    set
}

fn spawn_accessor(
    ctx: &DecodeContext<'_>,
    accessor: usize,
    semantic: Semantic,
) -> JobHandle<AttributeData> {
    match AccessorPlan::new(ctx.document, ctx.buffers, accessor, semantic) {
        Ok(plan) => ctx.pool.spawn(move || plan.run()),
        Err(e) => JobHandle::ready(Err(e)),
    }
}

fn collect_attributes(
    set: JobSet<Semantic, AttributeData>,
) -> std::result::Result<MeshData, Vec<IngestError>> {
    let mut data = MeshData::default();
    let mut errors = Vec::new();

    for (semantic, result) in set.harvest() {
        let attribute = match result {
            Ok(attribute) => attribute,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        match (semantic, attribute) {
            (Semantic::Position, AttributeData::Vec3(v)) => data.positions = v,
            (Semantic::Normal, AttributeData::Vec3(v)) => data.normals = Some(v),
            (Semantic::Tangent, AttributeData::Vec4(v)) => data.tangents = Some(v),
            (Semantic::TexCoord(0), AttributeData::Vec2(v)) => data.uv0 = Some(v),
            (Semantic::TexCoord(_), AttributeData::Vec2(v)) => data.uv1 = Some(v),
            (Semantic::Color, AttributeData::Rgba8(v)) => data.colors = Some(Colors::Rgba8(v)),
            (Semantic::Color, AttributeData::RgbaF32(v)) => {
                data.colors = Some(Colors::RgbaF32(v))
            }
            (Semantic::Indices, AttributeData::Indices(v)) => data.indices = v,
            (semantic, other) => errors.push(IngestError::format(format!(
                "{:?} decoded to unexpected {} data",
                semantic,
                other.kind()
            ))),
        }
    }

    if errors.is_empty() {
        Ok(data)
    } else {
        Err(errors)
    }
}
