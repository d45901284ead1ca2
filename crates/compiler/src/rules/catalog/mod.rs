//! Built-in fusion rules

mod matmul_with_bias;
mod matmul_with_bias_add;

pub use matmul_with_bias::{gelu, relu, sigmoid, tanh};
pub use matmul_with_bias_add::residual_add;

use super::registry::RuleRegistry;
use super::Rule;
use crate::error::ConfigError;

/// Every built-in rule, in registration order
pub fn builtin_rules() -> Vec<Rule> {
    vec![sigmoid(), tanh(), gelu(), relu(), residual_add()]
}

pub(crate) fn register_catalog(registry: &mut RuleRegistry) -> Result<(), ConfigError> {
    for rule in builtin_rules() {
        registry.register(rule)?;
    }
    Ok(())
}
