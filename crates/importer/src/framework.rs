//! Framework-native node descriptors
//!
//! The shapes a frontend hands over before import: operator type, tensor names, and the
//! framework's own attribute list in declaration order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source framework of a node descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "tensorflow")]
    TensorFlow,
    #[serde(rename = "onnxruntime")]
    OnnxRuntime,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::TensorFlow => f.write_str("tensorflow"),
            Framework::OnnxRuntime => f.write_str("onnxruntime"),
        }
    }
}

/// A framework attribute value, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeAttr {
    Int(i64),
    Ints(Vec<i64>),
    Float(f64),
    Floats(Vec<f64>),
    Str(String),
    Bool(bool),
}

impl NativeAttr {
    pub fn kind(&self) -> &'static str {
        match self {
            NativeAttr::Int(_) => "int",
            NativeAttr::Ints(_) => "ints",
            NativeAttr::Float(_) => "float",
            NativeAttr::Floats(_) => "floats",
            NativeAttr::Str(_) => "str",
            NativeAttr::Bool(_) => "bool",
        }
    }
}

/// One operator as the framework describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkNode {
    pub framework: Framework,
    pub name: String,
    pub op_type: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Attributes as `[name, value]` pairs, in declaration order
    #[serde(default)]
    pub attributes: Vec<(String, NativeAttr)>,
}

impl FrameworkNode {
    pub fn new(framework: Framework, name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            framework,
            name: name.into(),
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: NativeAttr) -> Self {
        self.attributes.push((name.into(), value));
        self
    }

    /// Look up an attribute by name
    pub fn attr(&self, name: &str) -> Option<&NativeAttr> {
        self.attributes.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// The first declared attribute, whatever its name
    pub fn first_attr(&self) -> Option<(&str, &NativeAttr)> {
        self.attributes.first().map(|(key, value)| (key.as_str(), value))
    }
}

/// A whole framework graph, as read by `graphfuse import`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkGraph {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    pub nodes: Vec<FrameworkNode>,
}

impl FrameworkGraph {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
