//! # graphfuse importer
//!
//! Turns framework-native operator descriptors (TensorFlow, ONNX Runtime) into graph nodes
//! with normalized attributes, so fusion rules see one attribute vocabulary whatever the
//! frontend.
//!
//! ```
//! use graphfuse_importer::{import_node, Framework, FrameworkNode, NativeAttr};
//! use graphfuse_compiler::graph::AttrValue;
//!
//! let node = FrameworkNode::new(Framework::OnnxRuntime, "sq", "Squeeze")
//!     .with_inputs(["x"])
//!     .with_outputs(["y"])
//!     .with_attr("axes", NativeAttr::Ints(vec![0, 2]));
//!
//! let imported = import_node(&node)?;
//! assert_eq!(imported.get_attribute("axis"), Some(&AttrValue::Str("0,2".into())));
//! # Ok::<(), graphfuse_importer::ImportError>(())
//! ```

pub mod error;
pub mod framework;
pub mod ops;
pub mod registry;

pub use error::{ImportError, Result};
pub use framework::{Framework, FrameworkGraph, FrameworkNode, NativeAttr};
pub use registry::{global, import_graph, import_node, AttributeImporter, ImporterRegistry};
