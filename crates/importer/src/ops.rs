//! Per-operator attribute importers
//!
//! Each importer normalizes one operator's framework attributes into the keys the fusion
//! rules and backends read. Conversions are deterministic: the same descriptor always yields
//! the same attribute map, in the same key order.

use crate::error::{ImportError, Result};
use crate::framework::{Framework, FrameworkNode, NativeAttr};
use crate::registry::AttributeImporter;
use graphfuse_compiler::graph::Attributes;

/// Join integers as `"a,b,c"`
pub fn join_ints(values: &[i64]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

fn missing(node: &FrameworkNode, attr: &str) -> ImportError {
    ImportError::MissingAttribute {
        framework: node.framework,
        op_type: node.op_type.clone(),
        attr: attr.to_string(),
    }
}

fn malformed(node: &FrameworkNode, attr: &str, reason: impl Into<String>) -> ImportError {
    ImportError::MalformedAttribute {
        op_type: node.op_type.clone(),
        attr: attr.to_string(),
        reason: reason.into(),
    }
}

fn unsupported(node: &FrameworkNode) -> ImportError {
    ImportError::UnsupportedOperator {
        framework: node.framework,
        op_type: node.op_type.clone(),
    }
}

fn ints<'a>(node: &FrameworkNode, attr: &str, value: &'a NativeAttr) -> Result<&'a [i64]> {
    match value {
        NativeAttr::Ints(values) => Ok(values),
        other => Err(malformed(node, attr, format!("expected ints, found {}", other.kind()))),
    }
}

fn int(node: &FrameworkNode, attr: &str, value: &NativeAttr) -> Result<i64> {
    match value {
        NativeAttr::Int(v) => Ok(*v),
        other => Err(malformed(node, attr, format!("expected int, found {}", other.kind()))),
    }
}

fn flag(node: &FrameworkNode, attr: &str, value: &NativeAttr) -> Result<bool> {
    match value {
        NativeAttr::Bool(v) => Ok(*v),
        other => Err(malformed(node, attr, format!("expected bool, found {}", other.kind()))),
    }
}

fn required_ints<'a>(node: &'a FrameworkNode, attr: &str) -> Result<&'a [i64]> {
    let value = node.attr(attr).ok_or_else(|| missing(node, attr))?;
    ints(node, attr, value)
}

fn required_int(node: &FrameworkNode, attr: &str) -> Result<i64> {
    let value = node.attr(attr).ok_or_else(|| missing(node, attr))?;
    int(node, attr, value)
}

/// Squeeze
///
/// TensorFlow keeps `squeeze_dims` as a list, `[]` when absent. ONNX takes the first
/// attribute's axes: one axis becomes an `axis` int, several a comma-joined `axis` string,
/// none no key at all.
pub struct Squeeze;

impl AttributeImporter for Squeeze {
    fn op_type(&self) -> &'static str {
        "Squeeze"
    }

    fn import(&self, node: &FrameworkNode) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        match node.framework {
            Framework::TensorFlow => {
                // absent means the default `[]`: squeeze every size-1 dim
                let dims = match node.attr("squeeze_dims") {
                    Some(value) => ints(node, "squeeze_dims", value)?.to_vec(),
                    None => Vec::new(),
                };
                attrs.set("squeeze_dims", dims);
            }
            Framework::OnnxRuntime => {
                // an empty axis list emits no key rather than `axis = ""`, and a
                // non-ints first attribute is rejected instead of read as empty
                if let Some((name, value)) = node.first_attr() {
                    match ints(node, name, value)? {
                        [] => {}
                        [axis] => attrs.set("axis", *axis),
                        axes => attrs.set("axis", join_ints(axes)),
                    }
                }
            }
        }
        Ok(attrs)
    }
}

/// Unsqueeze (ONNX only): `axes` → comma-joined `axes`
pub struct Unsqueeze;

impl AttributeImporter for Unsqueeze {
    fn op_type(&self) -> &'static str {
        "Unsqueeze"
    }

    fn import(&self, node: &FrameworkNode) -> Result<Attributes> {
        if node.framework != Framework::OnnxRuntime {
            return Err(unsupported(node));
        }
        let mut attrs = Attributes::new();
        attrs.set("axes", join_ints(required_ints(node, "axes")?));
        Ok(attrs)
    }
}

pub struct Softmax;

impl AttributeImporter for Softmax {
    fn op_type(&self) -> &'static str {
        "Softmax"
    }

    fn import(&self, node: &FrameworkNode) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        let Some(value) = node.attr("axis") else {
            return Ok(attrs);
        };
        match node.framework {
            Framework::OnnxRuntime => attrs.set("axis", int(node, "axis", value)?),
            Framework::TensorFlow => match ints(node, "axis", value)? {
                [] => {}
                [axis] => attrs.set("axis", *axis),
                axes => {
                    return Err(malformed(
                        node,
                        "axis",
                        format!("expected at most one axis, found {}", axes.len()),
                    ))
                }
            },
        }
        Ok(attrs)
    }
}

/// Transpose: `perm` → `dst_perm` string
pub struct Transpose;

impl AttributeImporter for Transpose {
    fn op_type(&self) -> &'static str {
        "Transpose"
    }

    fn import(&self, node: &FrameworkNode) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        attrs.set("dst_perm", join_ints(required_ints(node, "perm")?));
        Ok(attrs)
    }
}

pub struct Concat;

impl AttributeImporter for Concat {
    fn op_type(&self) -> &'static str {
        "Concat"
    }

    fn import(&self, node: &FrameworkNode) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        attrs.set("axis", required_int(node, "axis")?);
        Ok(attrs)
    }
}

/// MatMul
///
/// TensorFlow transpose flags become the `src0_perm`/`src1_perm` keys the fusion rules carry
/// onto fused nodes.
pub struct MatMul;

impl AttributeImporter for MatMul {
    fn op_type(&self) -> &'static str {
        "MatMul"
    }

    fn import(&self, node: &FrameworkNode) -> Result<Attributes> {
        let mut attrs = Attributes::new();
        if node.framework == Framework::TensorFlow {
            for (flag_name, key) in [("transpose_a", "src0_perm"), ("transpose_b", "src1_perm")] {
                if let Some(value) = node.attr(flag_name) {
                    if flag(node, flag_name, value)? {
                        attrs.set(key, "1,0");
                    }
                }
            }
        }
        Ok(attrs)
    }
}

/// Operators that carry no attributes
pub struct AttributeFree(pub &'static str);

impl AttributeImporter for AttributeFree {
    fn op_type(&self) -> &'static str {
        self.0
    }

    fn import(&self, _node: &FrameworkNode) -> Result<Attributes> {
        Ok(Attributes::new())
    }
}

pub const ATTRIBUTE_FREE: [&str; 5] = ["Sigmoid", "Tanh", "Relu", "Mul", "AddV2"];

#[cfg(test)]
mod tests {
    use super::*;
    use graphfuse_compiler::graph::AttrValue;

    fn tf(op_type: &str) -> FrameworkNode {
        FrameworkNode::new(Framework::TensorFlow, "n", op_type)
    }

    fn onnx(op_type: &str) -> FrameworkNode {
        FrameworkNode::new(Framework::OnnxRuntime, "n", op_type)
    }

    #[test]
    fn test_join_ints() {
        assert_eq!(join_ints(&[1, 0]), "1,0");
        assert_eq!(join_ints(&[-1]), "-1");
        assert_eq!(join_ints(&[]), "");
    }

    #[test]
    fn test_softmax_axis() {
        let attrs = Softmax.import(&onnx("Softmax").with_attr("axis", NativeAttr::Int(-1))).unwrap();
        assert_eq!(attrs.get("axis"), Some(&AttrValue::Int(-1)));

        let attrs = Softmax.import(&tf("Softmax").with_attr("axis", NativeAttr::Ints(vec![1]))).unwrap();
        assert_eq!(attrs.get("axis"), Some(&AttrValue::Int(1)));

        let attrs = Softmax.import(&tf("Softmax").with_attr("axis", NativeAttr::Ints(vec![]))).unwrap();
        assert!(attrs.is_empty());
        assert!(Softmax.import(&onnx("Softmax")).unwrap().is_empty());
    }

    #[test]
    fn test_softmax_rejects_multiple_axes() {
        let node = tf("Softmax").with_attr("axis", NativeAttr::Ints(vec![0, 1]));
        let err = Softmax.import(&node).unwrap_err();
        assert!(matches!(err, ImportError::MalformedAttribute { ref attr, .. } if attr == "axis"));
    }

    #[test]
    fn test_transpose_perm() {
        let node = onnx("Transpose").with_attr("perm", NativeAttr::Ints(vec![0, 2, 1, 3]));
        let attrs = Transpose.import(&node).unwrap();
        assert_eq!(attrs.get("dst_perm"), Some(&AttrValue::Str("0,2,1,3".into())));

        let err = Transpose.import(&onnx("Transpose")).unwrap_err();
        assert_eq!(err.attribute(), Some("perm"));
    }

    #[test]
    fn test_concat_axis_must_be_int() {
        let node = onnx("Concat").with_attr("axis", NativeAttr::Str("1".into()));
        let err = Concat.import(&node).unwrap_err();
        assert_eq!(
            err,
            ImportError::MalformedAttribute {
                op_type: "Concat".into(),
                attr: "axis".into(),
                reason: "expected int, found str".into(),
            }
        );
    }

    #[test]
    fn test_matmul_transpose_flags() {
        let node = tf("MatMul")
            .with_attr("transpose_a", NativeAttr::Bool(false))
            .with_attr("transpose_b", NativeAttr::Bool(true));
        let attrs = MatMul.import(&node).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("src1_perm"), Some(&AttrValue::Str("1,0".into())));

        let onnx_node = onnx("MatMul").with_attr("transpose_b", NativeAttr::Bool(true));
        assert!(MatMul.import(&onnx_node).unwrap().is_empty());
    }

    #[test]
    fn test_unsqueeze_is_onnx_only() {
        let node = onnx("Unsqueeze").with_attr("axes", NativeAttr::Ints(vec![0, 1]));
        assert_eq!(
            Unsqueeze.import(&node).unwrap().get("axes"),
            Some(&AttrValue::Str("0,1".into()))
        );

        let err = Unsqueeze.import(&tf("Unsqueeze")).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedOperator { framework: Framework::TensorFlow, .. }));
    }
}
