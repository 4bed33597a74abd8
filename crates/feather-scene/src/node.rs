//! Node categories and per-node geometry buffers.

use ash::vk;
use serde::{Deserialize, Serialize};

/// Coarse kind of a scene-graph node.
///
/// Plugin node types that are not one of the built-in kinds are carried as
/// `Other` with their plugin type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Null,
    Camera,
    Light,
    Mesh,
    Other(u32),
}

impl NodeCategory {
    /// Built-in categories in routing-table order.
    pub const BUILTIN: [NodeCategory; 4] = [
        NodeCategory::Null,
        NodeCategory::Camera,
        NodeCategory::Light,
        NodeCategory::Mesh,
    ];

    /// Slot of a built-in category in a fixed routing table, `None` for `Other`.
    pub fn builtin_index(self) -> Option<usize> {
        match self {
            NodeCategory::Null => Some(0),
            NodeCategory::Camera => Some(1),
            NodeCategory::Light => Some(2),
            NodeCategory::Mesh => Some(3),
            NodeCategory::Other(_) => None,
        }
    }
}

/// GPU buffers uploaded for one drawable node.
///
/// The renderer borrows these handles for the duration of a single bind; it
/// never owns or frees them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryBuffers {
    /// Interleaved vertex data.
    pub vertices: vk::Buffer,
    /// 32-bit triangle-list indices.
    pub indices: vk::Buffer,
    /// Number of indices in `indices`.
    pub index_count: u32,
    /// 32-bit line-list indices, one pair per edge.
    pub edges: vk::Buffer,
    /// Number of indices in `edges`.
    pub edge_count: u32,
}

impl GeometryBuffers {
    /// Number of points drawn by the point pass.
    ///
    /// Points are drawn from the edge-index buffer, so this is always the edge
    /// index count. There is no separate point-index buffer.
    pub fn point_count(&self) -> u32 {
        self.edge_count
    }
}

/// A scene-graph node as handed to the renderer for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Null(GeometryBuffers),
    Camera(GeometryBuffers),
    Light(GeometryBuffers),
    Mesh(GeometryBuffers),
    /// A plugin-provided node type.
    Other {
        type_id: u32,
        geometry: GeometryBuffers,
    },
}

impl Node {
    pub fn category(&self) -> NodeCategory {
        match self {
            Node::Null(_) => NodeCategory::Null,
            Node::Camera(_) => NodeCategory::Camera,
            Node::Light(_) => NodeCategory::Light,
            Node::Mesh(_) => NodeCategory::Mesh,
            Node::Other { type_id, .. } => NodeCategory::Other(*type_id),
        }
    }

    pub fn geometry(&self) -> &GeometryBuffers {
        match self {
            Node::Null(geometry)
            | Node::Camera(geometry)
            | Node::Light(geometry)
            | Node::Mesh(geometry)
            | Node::Other { geometry, .. } => geometry,
        }
    }
}
