// glTF/GLB writer for decoded primitives.
//
// Turns the engine-side output of a load back into a self-contained asset:
// every attribute becomes a tightly packed accessor in a single buffer, and
// indices are always written explicitly so a reload reproduces them exactly.
//
// - **GLB** - Binary container (single .glb file)
// - **glTF (embedded)** - Single JSON file with a base64 data URI buffer
//
// # Example
//
// ```ignore
// use gltf_ingest_io::{GltfLoader, GltfWriter};
//
// let report = GltfLoader::new().load_path("in.gltf")?;
// let mut writer = GltfWriter::new();
// writer.add_output(report.output.as_ref().unwrap())?;
// writer.add_textures(&report.textures);
// writer.write_glb("out.glb")?;
// ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gltf_ingest_core::data_uri::encode_data_uri;
use gltf_ingest_core::glb::write_glb;
use gltf_ingest_core::schema::{MODE_LINES, MODE_LINE_STRIP, MODE_POINTS, MODE_TRIANGLES};
use gltf_ingest_core::{Colors, ImageFormat, LoadOutput, Primitive, TextureStore, Topology};
use serde::Serialize;

use crate::error::{IoError, Result};

const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const COMPONENT_FLOAT: u32 = 5126;

const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

// ============================================================================
// glTF JSON Schema for Writing
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GltfRoot {
    asset: Asset,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accessors: Vec<AccessorOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffer_views: Vec<BufferViewOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<BufferOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    meshes: Vec<MeshOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<ImageOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<NodeOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    scenes: Vec<SceneOut>,
}

#[derive(Debug, Serialize)]
struct Asset {
    version: String,
    generator: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessorOut {
    buffer_view: usize,
    component_type: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    normalized: bool,
    count: usize,
    #[serde(rename = "type")]
    accessor_type: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    min: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    max: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferViewOut {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferOut {
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct MeshOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    primitives: Vec<PrimitiveOut>,
}

#[derive(Debug, Clone, Serialize)]
struct PrimitiveOut {
    attributes: BTreeMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    mime_type: &'static str,
    buffer_view: usize,
}

#[derive(Debug, Clone, Serialize)]
struct NodeOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    mesh: usize,
}

#[derive(Debug, Clone, Serialize)]
struct SceneOut {
    nodes: Vec<usize>,
}

// ============================================================================
// Writer
// ============================================================================

/// Collects meshes and images, then serializes them as GLB or glTF.
#[derive(Debug)]
pub struct GltfWriter {
    binary_data: Vec<u8>,
    accessors: Vec<AccessorOut>,
    buffer_views: Vec<BufferViewOut>,
    meshes: Vec<MeshOut>,
    images: Vec<ImageOut>,
    nodes: Vec<NodeOut>,
    generator: String,
}

impl Default for GltfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl GltfWriter {
    pub fn new() -> Self {
        Self {
            binary_data: Vec::new(),
            accessors: Vec::new(),
            buffer_views: Vec::new(),
            meshes: Vec::new(),
            images: Vec::new(),
            nodes: Vec::new(),
            generator: format!("gltf-ingest {}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    /// Add every mesh of a load that has at least one decoded primitive,
    /// each instanced by one root node. Returns the number of meshes written.
    pub fn add_output(&mut self, output: &LoadOutput) -> Result<usize> {
        let mut written = 0;
        for (mesh_index, mesh) in output.document.meshes.iter().enumerate() {
            let primitives: Vec<&Primitive> = output
                .mesh_primitives(mesh_index)
                .filter(|p| p.data.vertex_count() > 0)
                .collect();
            if primitives.is_empty() {
                tracing::warn!("Mesh {} has no decoded primitives, skipping", mesh_index);
                continue;
            }
            let out_index = self.add_mesh(mesh.name.as_deref(), &primitives)?;
            self.nodes.push(NodeOut {
                name: mesh.name.clone(),
                mesh: out_index,
            });
            written += 1;
        }
        Ok(written)
    }

    /// Add one mesh built from `primitives`. Returns its mesh index.
    pub fn add_mesh(&mut self, name: Option<&str>, primitives: &[&Primitive]) -> Result<usize> {
        if primitives.is_empty() {
            return Err(IoError::InvalidMesh("mesh has no primitives".into()));
        }
        let mut out = Vec::with_capacity(primitives.len());
        for prim in primitives {
            out.push(self.push_primitive(prim)?);
        }
        self.meshes.push(MeshOut {
            name: name.map(String::from),
            primitives: out,
        });
        Ok(self.meshes.len() - 1)
    }

    /// Add every loaded texture of `store` as a bufferView image.
    pub fn add_textures(&mut self, store: &TextureStore) {
        for texture in store.iter() {
            if let (Some(format), Some(encoded)) = (texture.format, &texture.encoded) {
                self.add_image(Some(texture.name.as_str()), format, encoded);
            }
        }
    }

    pub fn add_image(&mut self, name: Option<&str>, format: ImageFormat, encoded: &[u8]) -> usize {
        let view = self.push_view(encoded, None);
        self.images.push(ImageOut {
            name: name.map(String::from),
            mime_type: format.mime_type(),
            buffer_view: view,
        });
        self.images.len() - 1
    }

    /// Write as GLB (binary glTF) file.
    pub fn write_glb<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let glb_data = self.to_glb()?;
        fs::write(path, glb_data)?;
        Ok(())
    }

    /// Write as a single glTF JSON file with an embedded base64 buffer.
    pub fn write_gltf_embedded<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_gltf_embedded()?)?;
        Ok(())
    }

    /// Convert to glTF JSON string with embedded base64 data.
    pub fn to_gltf_embedded(&self) -> Result<String> {
        let data_uri = encode_data_uri("application/octet-stream", &self.binary_data);
        let root = self.build_gltf_root(Some(data_uri));
        Ok(serde_json::to_string_pretty(&root)?)
    }

    /// Convert to GLB bytes.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let root = self.build_gltf_root(None);
        let json = serde_json::to_vec(&root)?;
        let bin = (!self.binary_data.is_empty()).then_some(self.binary_data.as_slice());
        Ok(write_glb(&json, bin))
    }

    fn push_primitive(&mut self, prim: &Primitive) -> Result<PrimitiveOut> {
        let data = &prim.data;
        if data.positions.is_empty() {
            return Err(IoError::InvalidMesh(format!(
                "mesh {} primitive {} has no vertices",
                prim.mesh_index, prim.primitive_index
            )));
        }
        let mut attributes = BTreeMap::new();

        let (min, max) = bounds(&data.positions);
        let position = self.push_accessor(
            &float_bytes(&data.positions),
            AccessorLayout::float("VEC3", data.positions.len()),
            Some(TARGET_ARRAY_BUFFER),
        );
        self.accessors[position].min = min;
        self.accessors[position].max = max;
        attributes.insert("POSITION", position);

        if let Some(normals) = &data.normals {
            let index = self.push_float("VEC3", normals);
            attributes.insert("NORMAL", index);
        }
        if let Some(tangents) = &data.tangents {
            let index = self.push_float("VEC4", tangents);
            attributes.insert("TANGENT", index);
        }
        if let Some(uv) = &data.uv0 {
            let index = self.push_float("VEC2", uv);
            attributes.insert("TEXCOORD_0", index);
        }
        if let Some(uv) = &data.uv1 {
            let index = self.push_float("VEC2", uv);
            attributes.insert("TEXCOORD_1", index);
        }
        match &data.colors {
            Some(Colors::Rgba8(colors)) => {
                let bytes: Vec<u8> = colors.iter().flatten().copied().collect();
                let layout = AccessorLayout {
                    component_type: COMPONENT_UNSIGNED_BYTE,
                    normalized: true,
                    accessor_type: "VEC4",
                    count: colors.len(),
                };
                let index = self.push_accessor(&bytes, layout, Some(TARGET_ARRAY_BUFFER));
                attributes.insert("COLOR_0", index);
            }
            Some(Colors::RgbaF32(colors)) => {
                let index = self.push_float("VEC4", colors);
                attributes.insert("COLOR_0", index);
            }
            None => {}
        }

        let indices = if data.indices.is_empty() {
            None
        } else {
            let bytes: Vec<u8> = data.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
            let layout = AccessorLayout {
                component_type: COMPONENT_UNSIGNED_INT,
                normalized: false,
                accessor_type: "SCALAR",
                count: data.indices.len(),
            };
            Some(self.push_accessor(&bytes, layout, Some(TARGET_ELEMENT_ARRAY_BUFFER)))
        };

        let mode = match prim.topology {
            Topology::Triangles => None,
            other => Some(mode_for(other)),
        };

        Ok(PrimitiveOut {
            attributes,
            indices,
            mode,
        })
    }

    fn push_float<const N: usize>(&mut self, accessor_type: &'static str, items: &[[f32; N]]) -> usize {
        self.push_accessor(
            &float_bytes(items),
            AccessorLayout::float(accessor_type, items.len()),
            Some(TARGET_ARRAY_BUFFER),
        )
    }

    fn push_accessor(&mut self, bytes: &[u8], layout: AccessorLayout, target: Option<u32>) -> usize {
        let view = self.push_view(bytes, target);
        self.accessors.push(AccessorOut {
            buffer_view: view,
            component_type: layout.component_type,
            normalized: layout.normalized,
            count: layout.count,
            accessor_type: layout.accessor_type,
            min: Vec::new(),
            max: Vec::new(),
        });
        self.accessors.len() - 1
    }

    /// Append `bytes` at the next 4-byte boundary.
    fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        let padding = (4 - (self.binary_data.len() % 4)) % 4;
        self.binary_data.extend(std::iter::repeat(0u8).take(padding));
        let byte_offset = self.binary_data.len();
        self.binary_data.extend_from_slice(bytes);
        self.buffer_views.push(BufferViewOut {
            buffer: 0,
            byte_offset,
            byte_length: bytes.len(),
            target,
        });
        self.buffer_views.len() - 1
    }

    fn build_gltf_root(&self, buffer_uri: Option<String>) -> GltfRoot {
        let buffers = if self.binary_data.is_empty() {
            Vec::new()
        } else {
            vec![BufferOut {
                byte_length: self.binary_data.len(),
                uri: buffer_uri,
            }]
        };

        let (scene, scenes) = if self.nodes.is_empty() {
            (None, Vec::new())
        } else {
            (
                Some(0),
                vec![SceneOut {
                    nodes: (0..self.nodes.len()).collect(),
                }],
            )
        };

        GltfRoot {
            asset: Asset {
                version: "2.0".to_string(),
                generator: Some(self.generator.clone()),
            },
            accessors: self.accessors.clone(),
            buffer_views: self.buffer_views.clone(),
            buffers,
            meshes: self.meshes.clone(),
            images: self.images.clone(),
            nodes: self.nodes.clone(),
            scene,
            scenes,
        }
    }
}

struct AccessorLayout {
    component_type: u32,
    normalized: bool,
    accessor_type: &'static str,
    count: usize,
}

impl AccessorLayout {
    fn float(accessor_type: &'static str, count: usize) -> Self {
        Self {
            component_type: COMPONENT_FLOAT,
            normalized: false,
            accessor_type,
            count,
        }
    }
}

fn float_bytes<const N: usize>(items: &[[f32; N]]) -> Vec<u8> {
    items.iter().flatten().flat_map(|v| v.to_le_bytes()).collect()
}

fn bounds(positions: &[[f32; 3]]) -> (Vec<f64>, Vec<f64>) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (
        min.iter().map(|&v| v as f64).collect(),
        max.iter().map(|&v| v as f64).collect(),
    )
}

/// Draw mode that reproduces `topology` with explicit indices. Line loops
/// already carry their closing index, so they are written as strips.
fn mode_for(topology: Topology) -> u32 {
    match topology {
        Topology::Points => MODE_POINTS,
        Topology::Lines => MODE_LINES,
        Topology::LineStrip => MODE_LINE_STRIP,
        Topology::Triangles => MODE_TRIANGLES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltf_ingest_core::{load_slice, MeshData};

    fn quad(topology: Topology) -> Primitive {
        Primitive {
            mesh_index: 0,
            primitive_index: 0,
            mesh_name: Some("Quad".into()),
            data: MeshData {
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, -2.0]],
                uv0: Some(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
                colors: Some(Colors::Rgba8(vec![[255, 0, 0, 255]; 4])),
                indices: vec![0, 1, 2, 0, 2, 3],
                ..Default::default()
            },
            topology,
            mode: MODE_TRIANGLES,
            material: None,
            compressed: false,
        }
    }

    #[test]
    fn test_create_glb() {
        let prim = quad(Topology::Triangles);
        let mut writer = GltfWriter::new();
        assert_eq!(writer.add_mesh(Some("Quad"), &[&prim]).unwrap(), 0);

        let glb = writer.to_glb().unwrap();
        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(glb.len() % 4, 0);
    }

    #[test]
    fn test_position_bounds() {
        let (min, max) = bounds(&quad(Topology::Triangles).data.positions);
        assert_eq!(min, vec![0.0, 0.0, -2.0]);
        assert_eq!(max, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_views_are_aligned() {
        let mut writer = GltfWriter::new();
        writer.add_image(None, ImageFormat::Png, &[1, 2, 3]);
        let prim = quad(Topology::Points);
        writer.add_mesh(None, &[&prim]).unwrap();
        assert!(writer.buffer_views.iter().all(|v| v.byte_offset % 4 == 0));
        assert_eq!(writer.buffer_views[1].byte_offset, 4);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let mut writer = GltfWriter::new();
        assert!(matches!(
            writer.add_mesh(None, &[]),
            Err(IoError::InvalidMesh(_))
        ));
        let mut empty = quad(Topology::Triangles);
        empty.data = MeshData::default();
        assert!(writer.add_mesh(None, &[&empty]).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let prim = quad(Topology::Triangles);
        let mut writer = GltfWriter::new();
        writer.add_mesh(Some("Quad"), &[&prim]).unwrap();

        let output = load_slice(&writer.to_glb().unwrap()).unwrap();
        let back = output.mesh_primitives(0).next().unwrap();
        assert_eq!(back.data.positions, prim.data.positions);
        assert_eq!(back.data.uv0, prim.data.uv0);
        assert_eq!(back.data.colors, prim.data.colors);
        assert_eq!(back.data.indices, prim.data.indices);
        assert_eq!(back.topology, Topology::Triangles);
    }

    #[test]
    fn test_embedded_gltf() {
        let prim = quad(Topology::LineStrip);
        let mut writer = GltfWriter::new();
        writer.add_mesh(Some("Quad"), &[&prim]).unwrap();

        let json = writer.to_gltf_embedded().unwrap();
        assert!(json.contains("data:application/octet-stream;base64,"));

        let output = load_slice(json.as_bytes()).unwrap();
        let back = output.mesh_primitives(0).next().unwrap();
        assert_eq!(back.topology, Topology::LineStrip);
        assert_eq!(back.mode, MODE_LINE_STRIP);
        assert_eq!(back.data.indices, prim.data.indices);
    }
}
