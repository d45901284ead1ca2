//! Operator graph model
//!
//! - `attr`: order-preserving attribute maps
//! - `tensor`: tensor registry (producer/consumer links, metadata)
//! - `node`: graph nodes
//! - `ir`: the graph itself, editing and analysis
//! - `document`: JSON document form

pub mod attr;
pub mod document;
pub mod ir;
pub mod node;
pub mod tensor;

pub use attr::{AttrValue, Attributes};
pub use document::GraphDocument;
pub use ir::{Graph, GraphStatistics, NewNode};
pub use node::Node;
pub use tensor::{DType, SlotRef, Tensor, TensorInfo, TensorRegistry};
