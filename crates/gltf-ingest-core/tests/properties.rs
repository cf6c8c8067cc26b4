//! Property checks for the container codec and accessor conversions.

mod common;

use gltf_ingest_core::accessor::{decode_accessor, AttributeData, Semantic};
use gltf_ingest_core::glb::{parse_glb, read_layout, write_glb, GLB_CHUNK_BIN, GLB_CHUNK_JSON};
use gltf_ingest_core::{BufferResolver, Document, ResolvedBuffers};
use proptest::prelude::*;
use serde_json::json;

fn single_accessor(
    bytes: Vec<u8>,
    component_type: u32,
    normalized: bool,
    ty: &str,
    count: usize,
) -> (Document, ResolvedBuffers) {
    let doc: Document = serde_json::from_value(json!({
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": bytes.len()}],
        "bufferViews": [{"buffer": 0, "byteLength": bytes.len()}],
        "accessors": [{
            "bufferView": 0,
            "componentType": component_type,
            "normalized": normalized,
            "count": count,
            "type": ty
        }]
    }))
    .unwrap();
    let mut resolver = BufferResolver::new(1);
    resolver.set_bytes(0, bytes).unwrap();
    (doc, resolver.finish().unwrap())
}

proptest! {
    #[test]
    fn float_positions_pass_through(values in prop::collection::vec(-1.0e6f32..1.0e6, 3..64)) {
        let count = values.len() / 3;
        let values = &values[..count * 3];
        let (doc, buffers) = single_accessor(common::f32_bytes(values), 5126, false, "VEC3", count);

        let decoded = decode_accessor(&doc, &buffers, 0, Semantic::Position).unwrap();
        let AttributeData::Vec3(positions) = decoded else {
            panic!("expected vec3 output");
        };
        let flat: Vec<f32> = positions.into_iter().flatten().collect();
        prop_assert_eq!(flat, values.to_vec());
    }

    #[test]
    fn normalized_u8_is_raw_over_255(raw in prop::collection::vec(any::<u8>(), 2..96)) {
        let count = raw.len() / 2;
        let raw = raw[..count * 2].to_vec();
        let (doc, buffers) = single_accessor(raw.clone(), 5121, true, "VEC2", count);

        let decoded = decode_accessor(&doc, &buffers, 0, Semantic::TexCoord(0)).unwrap();
        let AttributeData::Vec2(uvs) = decoded else {
            panic!("expected vec2 output");
        };
        for (value, byte) in uvs.into_iter().flatten().zip(raw) {
            prop_assert!((0.0..=1.0).contains(&value));
            prop_assert_eq!(value, byte as f32 / 255.0);
        }
    }

    #[test]
    fn glb_chunk_boundaries_round_trip(
        extra in "[a-z]{0,12}",
        bin in prop::collection::vec(any::<u8>(), 1..128),
    ) {
        let json = serde_json::to_vec(&json!({
            "asset": {"version": "2.0", "generator": extra},
            "buffers": [{"byteLength": bin.len()}]
        }))
        .unwrap();

        let first = write_glb(&json, Some(&bin));
        let container = parse_glb(&first).unwrap();
        let bin_range = container.bin_chunk.unwrap();
        prop_assert_eq!(&first[bin_range.offset..bin_range.end()][..bin.len()], &bin[..]);

        let json_again = container.document.to_json_vec().unwrap();
        let second = write_glb(&json_again, Some(&first[bin_range.offset..bin_range.end()]));

        let a = read_layout(&first).unwrap();
        let b = read_layout(&second).unwrap();
        prop_assert_eq!(a.chunks.len(), 2);
        prop_assert_eq!(a.chunks[0].chunk_type, GLB_CHUNK_JSON);
        prop_assert_eq!(a.chunks[1].chunk_type, GLB_CHUNK_BIN);
        prop_assert_eq!(a.total_length, first.len());
        prop_assert_eq!(b.chunks[1].range.length, a.chunks[1].range.length);
        for chunk in a.chunks.iter().chain(b.chunks.iter()) {
            prop_assert_eq!(chunk.range.offset % 4, 0);
            prop_assert_eq!(chunk.range.length % 4, 0);
        }
    }
}
