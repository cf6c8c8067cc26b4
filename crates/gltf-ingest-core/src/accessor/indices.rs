//! Draw topology and synthesized index buffers.

use crate::schema::{
    MODE_LINES, MODE_LINE_LOOP, MODE_LINE_STRIP, MODE_POINTS, MODE_TRIANGLES,
    MODE_TRIANGLE_FAN, MODE_TRIANGLE_STRIP,
};

/// Primitive topology of decoded geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    Triangles,
}

impl Topology {
    pub fn name(self) -> &'static str {
        match self {
            Topology::Points => "points",
            Topology::Lines => "lines",
            Topology::LineStrip => "line-strip",
            Topology::Triangles => "triangles",
        }
    }
}

/// Map a glTF draw mode onto a topology.
///
/// Strips, fans and unknown modes fall back to a triangle list. Callers
/// report untested modes through [`is_mode_tested`].
pub fn topology_for_mode(mode: u32) -> Topology {
    match mode {
        MODE_POINTS => Topology::Points,
        MODE_LINES => Topology::Lines,
        MODE_LINE_LOOP | MODE_LINE_STRIP => Topology::LineStrip,
        MODE_TRIANGLES => Topology::Triangles,
        MODE_TRIANGLE_STRIP | MODE_TRIANGLE_FAN => Topology::Triangles,
        _ => Topology::Triangles,
    }
}

/// True for draw modes that are decoded without loss.
pub fn is_mode_tested(mode: u32) -> bool {
    mode == MODE_TRIANGLES
}

/// Generate indices for a primitive that has none.
///
/// Triangle lists have each complete triangle reversed to `[3k+2, 3k+1, 3k]`
/// so the winding matches the destination's front-face convention. Line
/// loops get a closing `0`. Everything else is sequential.
pub fn synthesize(vertex_count: usize, mode: u32) -> Vec<u32> {
    let topology = topology_for_mode(mode);
    let mut indices: Vec<u32> = (0..vertex_count as u32).collect();

    match topology {
        Topology::Triangles => {
            for triangle in indices.chunks_exact_mut(3) {
                triangle.swap(0, 2);
            }
        }
        Topology::LineStrip if mode == MODE_LINE_LOOP && vertex_count > 0 => {
            indices.push(0);
        }
        _ => {}
    }

    indices
}
