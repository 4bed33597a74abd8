//! Scene-graph node model as seen by the renderer.
//!
//! The scene graph itself (fields, connections, plugin loading) lives
//! elsewhere. This crate only carries what the pipeline layer dispatches on:
//! a node's category and the GPU geometry buffers uploaded for it.

mod node;

pub use node::{GeometryBuffers, Node, NodeCategory};
