use std::fs;
use std::sync::Arc;

use gltf_ingest_core::{IngestError, Phase, Topology};
use gltf_ingest_io::{GltfLoader, GltfWriter, IoError, MemoryFetcher};
use serde_json::json;
use tempfile::tempdir;

const PNG_STUB: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn triangle_bin() -> Vec<u8> {
    [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

fn external_gltf(buffer_uri: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 36, "uri": buffer_uri}],
        "bufferViews": [{"buffer": 0, "byteLength": 36}],
        "accessors": [{
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"
        }],
        "meshes": [{"name": "Tri", "primitives": [{"attributes": {"POSITION": 0}}]}],
        "images": [{"uri": "textures/albedo.png"}],
        "nodes": [{"mesh": 0}]
    }))
    .unwrap()
}

#[test]
fn test_load_path_resolves_relative_files() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("textures")).unwrap();
    fs::write(dir.path().join("tri data.bin"), triangle_bin()).unwrap();
    fs::write(dir.path().join("textures/albedo.png"), PNG_STUB).unwrap();
    let path = dir.path().join("scene.gltf");
    fs::write(&path, external_gltf("tri%20data.bin")).unwrap();

    let report = GltfLoader::new().load_path(&path).unwrap();
    assert_eq!(report.phase, Phase::Done, "errors: {:?}", report.errors);

    let texture = report.textures.iter().next().unwrap();
    assert_eq!(texture.name, "image_0");
    assert_eq!(texture.encoded.as_deref(), Some(PNG_STUB));

    let output = report.into_output().unwrap();
    assert_eq!(output.primitive_count(), 1);
    let prims = output.node_primitives(0);
    assert_eq!(prims[0].data.indices, vec![2, 1, 0]);
}

#[test]
fn test_missing_external_buffer_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scene.gltf");
    fs::write(&path, external_gltf("missing.bin")).unwrap();

    let report = GltfLoader::new().load_path(&path).unwrap();
    assert_eq!(report.phase, Phase::Failed);
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, IngestError::Fetch(msg) if msg.contains("missing.bin"))));
    assert!(matches!(report.into_output(), Err(IoError::Ingest(_))));
}

#[test]
fn test_load_path_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let result = GltfLoader::new().load_path(dir.path().join("nope.glb"));
    assert!(matches!(result, Err(IoError::Io(_))));
}

#[test]
fn test_memory_fetcher_in_loader() {
    let fetcher = MemoryFetcher::new()
        .with_file("assets/tri.bin", triangle_bin())
        .with_file("assets/textures/albedo.png", PNG_STUB.to_vec());
    let loader = GltfLoader::new().with_fetcher(Arc::new(fetcher));

    let report = loader.load_bytes(external_gltf("tri.bin"), Some("assets"));
    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert_eq!(report.textures.len(), 1);
}

#[test]
fn test_reencode_glb_and_embedded() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("tri.bin"), triangle_bin()).unwrap();
    fs::create_dir(dir.path().join("textures")).unwrap();
    fs::write(dir.path().join("textures/albedo.png"), PNG_STUB).unwrap();
    let source = dir.path().join("scene.gltf");
    fs::write(&source, external_gltf("tri.bin")).unwrap();

    let loader = GltfLoader::new();
    let report = loader.load_path(&source).unwrap();
    let mut writer = GltfWriter::new();
    assert_eq!(writer.add_output(report.output.as_ref().unwrap()).unwrap(), 1);
    writer.add_textures(&report.textures);
    assert_eq!(writer.num_images(), 1);

    let glb_path = dir.path().join("out.glb");
    let gltf_path = dir.path().join("out.gltf");
    writer.write_glb(&glb_path).unwrap();
    writer.write_gltf_embedded(&gltf_path).unwrap();

    for path in [&glb_path, &gltf_path] {
        let again = loader.load_path(path).unwrap();
        assert!(again.is_success(), "{}: {:?}", path.display(), again.errors);
        assert_eq!(again.textures.iter().next().unwrap().encoded.as_deref(), Some(PNG_STUB));

        let output = again.into_output().unwrap();
        let prims = output.node_primitives(0);
        assert_eq!(prims.len(), 1);
        assert_eq!(prims[0].mesh_name.as_deref(), Some("Tri"));
        assert_eq!(prims[0].topology, Topology::Triangles);
        // Written indices are explicit, so the flipped order survives as is.
        assert_eq!(prims[0].data.indices, vec![2, 1, 0]);
        assert_eq!(prims[0].data.positions[1], [1.0, 0.0, 0.0]);
    }
}
