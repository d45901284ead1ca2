use super::attr::{AttrValue, Attributes};
use serde::{Deserialize, Serialize};

/// A node in the operator graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node name
    pub name: String,
    /// Operation type (e.g., "MatMulWithBias", "Sigmoid")
    pub op_type: String,
    /// Input tensor names, by slot
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Output tensor names, by slot
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Node {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: Attributes::new(),
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

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.set(key, value);
        self
    }

    /// Get attribute by name
    pub fn get_attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Input slot at which this node reads `tensor`, if any
    pub fn input_slot_of(&self, tensor: &str) -> Option<usize> {
        self.inputs.iter().position(|t| t == tensor)
    }
}
