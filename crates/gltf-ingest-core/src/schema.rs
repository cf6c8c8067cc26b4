//! Typed glTF 2.0 JSON object model.
//!
//! Only the parts of the schema the decode pipeline and its downstream
//! collaborators consume are modeled. Material parameters are kept as raw
//! JSON values for the material generator to interpret.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::accessor::component::ComponentType;
use crate::error::{IngestError, Result};

// ============================================================================
// Root
// ============================================================================

/// Parsed glTF document. Immutable once parsed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    /// Default scene index (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: None,
        }
    }
}

// ============================================================================
// Binary data references
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Present (and larger than the element size) for interleaved data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Element shape of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub fn num_components(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AccessorType::Scalar => "SCALAR",
            AccessorType::Vec2 => "VEC2",
            AccessorType::Vec3 => "VEC3",
            AccessorType::Vec4 => "VEC4",
            AccessorType::Mat2 => "MAT2",
            AccessorType::Mat3 => "MAT3",
            AccessorType::Mat4 => "MAT4",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    /// `None` means the accessor data is all zeros / synthesized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    /// Raw GL component type. Kept unparsed so an unknown value only fails
    /// the accessor that carries it.
    pub component_type: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub normalized: bool,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: AccessorType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub min: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub max: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Accessor {
    /// Tight size in bytes of one element, or `None` for unknown component types.
    pub fn element_size(&self) -> Option<usize> {
        ComponentType::from_gl(self.component_type)
            .map(|c| c.byte_size() * self.accessor_type.num_components())
    }
}

// ============================================================================
// Meshes
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<MeshPrimitive>,
}

pub const MODE_POINTS: u32 = 0;
pub const MODE_LINES: u32 = 1;
pub const MODE_LINE_LOOP: u32 = 2;
pub const MODE_LINE_STRIP: u32 = 3;
pub const MODE_TRIANGLES: u32 = 4;
pub const MODE_TRIANGLE_STRIP: u32 = 5;
pub const MODE_TRIANGLE_FAN: u32 = 6;

fn default_mode() -> u32 {
    MODE_TRIANGLES
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshPrimitive {
    #[serde(default)]
    pub attributes: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(default = "default_mode")]
    pub mode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PrimitiveExtensions>,
}

impl MeshPrimitive {
    pub fn attribute(&self, semantic: &str) -> Option<usize> {
        self.attributes.get(semantic).copied()
    }

    pub fn draco(&self) -> Option<&DracoExtension> {
        self.extensions
            .as_ref()
            .and_then(|e| e.khr_draco_mesh_compression.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrimitiveExtensions {
    #[serde(
        rename = "KHR_draco_mesh_compression",
        skip_serializing_if = "Option::is_none"
    )]
    pub khr_draco_mesh_compression: Option<DracoExtension>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoExtension {
    pub buffer_view: usize,
    /// glTF semantic to Draco attribute id.
    #[serde(default)]
    pub attributes: BTreeMap<String, usize>,
}

// ============================================================================
// Images, textures, materials
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_factor: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub double_sided: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

// ============================================================================
// Scene graph
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Index into meshes array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    /// 4x4 transformation matrix (column-major).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    /// Rotation quaternion [x, y, z, w].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<usize>,
}

// ============================================================================
// Document lookups
// ============================================================================

impl Document {
    /// Parse a document from UTF-8 JSON bytes.
    pub fn from_slice(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| IngestError::format(format!("JSON serialize error: {}", e)))
    }

    pub fn accessor(&self, index: usize) -> Result<&Accessor> {
        self.accessors
            .get(index)
            .ok_or_else(|| IngestError::format(format!("Invalid accessor index: {}", index)))
    }

    pub fn buffer_view(&self, index: usize) -> Result<&BufferView> {
        self.buffer_views
            .get(index)
            .ok_or_else(|| IngestError::format(format!("Invalid bufferView index: {}", index)))
    }

    /// An accessor is interleaved when its bufferView declares a stride
    /// larger than the tight element size.
    pub fn is_accessor_interleaved(&self, index: usize) -> bool {
        let Some(accessor) = self.accessors.get(index) else {
            return false;
        };
        let Some(view) = accessor.buffer_view.and_then(|v| self.buffer_views.get(v)) else {
            return false;
        };
        match (view.byte_stride, accessor.element_size()) {
            (Some(stride), Some(size)) => stride > size,
            _ => false,
        }
    }
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_gltf_json() {
        let json = r#"{
            "asset": {"version": "2.0"},
            "meshes": [],
            "buffers": [],
            "bufferViews": [],
            "accessors": []
        }"#;

        let doc = Document::from_slice(json.as_bytes()).unwrap();
        assert!(doc.meshes.is_empty());
        assert!(doc.buffers.is_empty());
        assert_eq!(doc.asset.version, "2.0");
    }

    #[test]
    fn test_primitive_defaults() {
        let json = r#"{
            "meshes": [{
                "primitives": [{ "attributes": {"POSITION": 0} }]
            }]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let prim = &doc.meshes[0].primitives[0];
        assert_eq!(prim.mode, MODE_TRIANGLES);
        assert_eq!(prim.attribute("POSITION"), Some(0));
        assert!(prim.indices.is_none());
        assert!(prim.draco().is_none());
    }

    #[test]
    fn test_draco_extension_parsed() {
        let json = r#"{
            "meshes": [{
                "name": "TestMesh",
                "primitives": [{
                    "attributes": {"POSITION": 0},
                    "extensions": {
                        "KHR_draco_mesh_compression": {
                            "bufferView": 3,
                            "attributes": {"POSITION": 0, "NORMAL": 1}
                        }
                    }
                }]
            }]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        let draco = doc.meshes[0].primitives[0].draco().unwrap();
        assert_eq!(draco.buffer_view, 3);
        assert_eq!(draco.attributes.get("NORMAL"), Some(&1));
    }

    #[test]
    fn test_interleaved_detection() {
        let json = r#"{
            "bufferViews": [
                {"buffer": 0, "byteLength": 48, "byteStride": 24},
                {"buffer": 0, "byteLength": 24, "byteStride": 12},
                {"buffer": 0, "byteLength": 24}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3"},
                {"bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC3"},
                {"bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3"},
                {"componentType": 5126, "count": 2, "type": "VEC3"}
            ]
        }"#;
        let doc = Document::from_slice(json.as_bytes()).unwrap();
        assert!(doc.is_accessor_interleaved(0));
        assert!(!doc.is_accessor_interleaved(1), "stride equal to tight size");
        assert!(!doc.is_accessor_interleaved(2));
        assert!(!doc.is_accessor_interleaved(3));
    }

    #[test]
    fn test_invalid_index_lookup() {
        let doc = Document::default();
        assert!(matches!(doc.accessor(0), Err(IngestError::Format(_))));
        assert!(matches!(doc.buffer_view(2), Err(IngestError::Format(_))));
    }
}
