//! Error types for attribute import

use crate::framework::Framework;
use graphfuse_compiler::StructuralError;
use thiserror::Error;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Errors raised while turning framework-native nodes into graph nodes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("Unsupported operator '{op_type}' for {framework}")]
    UnsupportedOperator { framework: Framework, op_type: String },

    #[error("Operator '{op_type}' ({framework}) is missing required attribute '{attr}'")]
    MissingAttribute {
        framework: Framework,
        op_type: String,
        attr: String,
    },

    #[error("Operator '{op_type}' has malformed attribute '{attr}': {reason}")]
    MalformedAttribute {
        op_type: String,
        attr: String,
        reason: String,
    },

    #[error("Importer for '{0}' is already registered")]
    DuplicateImporter(String),

    #[error("Imported graph is invalid: {0}")]
    Graph(#[from] StructuralError),
}

impl ImportError {
    /// Operator type the error is about, if any
    pub fn op_type(&self) -> Option<&str> {
        match self {
            Self::UnsupportedOperator { op_type, .. }
            | Self::MissingAttribute { op_type, .. }
            | Self::MalformedAttribute { op_type, .. } => Some(op_type),
            Self::DuplicateImporter(op_type) => Some(op_type),
            Self::Graph(_) => None,
        }
    }

    /// Attribute the error is about, if any
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::MissingAttribute { attr, .. } | Self::MalformedAttribute { attr, .. } => Some(attr),
            _ => None,
        }
    }
}
