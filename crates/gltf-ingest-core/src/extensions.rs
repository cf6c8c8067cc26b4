//! Extension gate: required vs. used extensions against the supported set.

use std::collections::HashSet;

use lazy_static::lazy_static;

use crate::error::{IngestError, Result};
use crate::schema::Document;

pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";
pub const KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS: &str = "KHR_materials_pbrSpecularGlossiness";
pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";
pub const KHR_TEXTURE_TRANSFORM: &str = "KHR_texture_transform";
pub const KHR_MESH_QUANTIZATION: &str = "KHR_mesh_quantization";

lazy_static! {
    static ref SUPPORTED_EXTENSIONS: HashSet<&'static str> = [
        KHR_DRACO_MESH_COMPRESSION,
        KHR_MATERIALS_PBR_SPECULAR_GLOSSINESS,
        KHR_MATERIALS_UNLIT,
        KHR_TEXTURE_TRANSFORM,
        KHR_MESH_QUANTIZATION,
    ]
    .into_iter()
    .collect();
}

pub fn is_supported(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(extension)
}

/// Validate required and used extensions.
///
/// Fails on the first unsupported required extension. Unsupported used
/// extensions are logged and returned so the caller can surface them.
pub fn check_extension_support(document: &Document) -> Result<Vec<String>> {
    if let Some(ext) = document
        .extensions_required
        .iter()
        .find(|ext| !is_supported(ext))
    {
        tracing::error!("Required glTF extension {} is not supported", ext);
        return Err(IngestError::UnsupportedExtension(ext.clone()));
    }

    let unsupported: Vec<String> = document
        .extensions_used
        .iter()
        .filter(|ext| !is_supported(ext))
        .cloned()
        .collect();
    for ext in &unsupported {
        tracing::warn!("glTF extension {} is not supported", ext);
    }
    Ok(unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(required: &[&str], used: &[&str]) -> Document {
        Document {
            extensions_required: required.iter().map(|s| s.to_string()).collect(),
            extensions_used: used.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_supported_required_passes() {
        let d = doc(&[KHR_DRACO_MESH_COMPRESSION], &[KHR_DRACO_MESH_COMPRESSION]);
        assert!(check_extension_support(&d).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_required_fails() {
        let d = doc(&["EXT_meshopt_compression"], &[]);
        assert_eq!(
            check_extension_support(&d),
            Err(IngestError::UnsupportedExtension("EXT_meshopt_compression".into()))
        );
    }

    #[test]
    fn test_unsupported_used_warns_only() {
        let d = doc(&[], &["EXT_lights_image_based", KHR_MATERIALS_UNLIT]);
        assert_eq!(
            check_extension_support(&d).unwrap(),
            vec!["EXT_lights_image_based".to_string()]
        );
    }
}
