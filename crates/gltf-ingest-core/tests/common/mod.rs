//! Shared fixtures: GLB/glTF streams built in memory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use gltf_ingest_core::glb::write_glb;
use gltf_ingest_core::{Fetcher, IngestError, JobHandle};
use serde_json::{json, Value};

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

pub fn glb(json: &Value, bin: &[u8]) -> Vec<u8> {
    write_glb(&serde_json::to_vec(json).unwrap(), Some(bin))
}

/// One mesh, one triangle primitive, positions only, no indices.
pub fn triangle_json() -> Value {
    json!({
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": 36}],
        "bufferViews": [{"buffer": 0, "byteLength": 36}],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}
        ],
        "meshes": [{"name": "tri", "primitives": [{"attributes": {"POSITION": 0}}]}],
        "nodes": [{"mesh": 0}]
    })
}

pub fn triangle_glb() -> Vec<u8> {
    glb(&triangle_json(), &f32_bytes(&TRIANGLE))
}

/// Serves URIs from a map and counts every request.
#[derive(Default)]
pub struct MapFetcher {
    files: HashMap<String, Vec<u8>>,
    pub buffer_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub requested: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, uri: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(uri.to_string(), bytes);
        self
    }

    pub fn calls(&self) -> usize {
        self.buffer_calls.load(Ordering::SeqCst) + self.image_calls.load(Ordering::SeqCst)
    }

    fn serve(&self, uri: &str) -> JobHandle<Vec<u8>> {
        self.requested.lock().unwrap().push(uri.to_string());
        let (completer, handle) = JobHandle::channel();
        let result = self
            .files
            .get(uri)
            .cloned()
            .ok_or_else(|| IngestError::fetch(format!("not found: {}", uri)));
        // Complete from another thread to exercise cross-thread polling.
        std::thread::spawn(move || completer.complete(result));
        handle
    }
}

impl Fetcher for MapFetcher {
    fn fetch_buffer(&self, _index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        self.buffer_calls.fetch_add(1, Ordering::SeqCst);
        self.serve(uri)
    }

    fn fetch_image(&self, _index: usize, uri: &str) -> JobHandle<Vec<u8>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.serve(uri)
    }
}
