//! Dynamically shaped payload values.
//!
//! Bus signals carry bodies whose shape is only known at runtime. [`Value`]
//! is the tagged tree the bridge works on: every node is a [`Scalar`] leaf, an
//! ordered sequence, a scalar-keyed mapping, or a record of named fields.
//! Transport adapters convert their native representation into this tree
//! before handing an event to a bridge loop.

use std::fmt;

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::UInt(u) => write!(f, "{u}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// A node of a dynamically shaped payload tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Leaf value.
    Scalar(Scalar),
    /// Ordered, zero-indexed sequence.
    Sequence(Vec<Value>),
    /// Key/value entries in arrival order, keyed by scalars.
    Mapping(Vec<(Scalar, Value)>),
    /// Named fields in declaration order.
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Build a [`Value::Record`] from `(name, value)` pairs.
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a [`Value::Mapping`] from `(key, value)` pairs.
    pub fn mapping<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<Scalar>,
    {
        Value::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a [`Value::Sequence`] from anything convertible into values.
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Short name of this node's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Record(_) => "record",
        }
    }
}

/// Canonical string form.
///
/// Scalars render in their natural form with text unquoted. Structured values
/// render deterministically, with nested text quoted so that element
/// boundaries stay readable.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            _ => fmt_nested(self, f),
        }
    }
}

fn fmt_nested(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Scalar(s) => fmt_nested_scalar(s, f),
        Value::Sequence(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_nested(item, f)?;
            }
            f.write_str("]")
        }
        Value::Mapping(entries) => {
            f.write_str("{")?;
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_nested_scalar(key, f)?;
                f.write_str(": ")?;
                fmt_nested(item, f)?;
            }
            f.write_str("}")
        }
        Value::Record(fields) => {
            f.write_str("{")?;
            for (i, (name, item)) in fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}: ")?;
                fmt_nested(item, f)?;
            }
            f.write_str("}")
        }
    }
}

fn fmt_nested_scalar(scalar: &Scalar, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match scalar {
        Scalar::Text(s) => write!(f, "{s:?}"),
        other => write!(f, "{other}"),
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::$variant(<$target>::from(v))
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool as bool,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => Text as String,
    &str => Text as String,
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_render_naturally() {
        assert_eq!(Value::from(87).to_string(), "87");
        assert_eq!(Value::from(19.5).to_string(), "19.5");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(7u32).to_string(), "7");
        assert_eq!(Value::from("on").to_string(), "on");
    }

    #[test]
    fn text_keeps_embedded_quotes() {
        assert_eq!(Value::from("42\"").to_string(), "42\"");
    }

    #[test]
    fn structured_values_render_deterministically() {
        let v = Value::record([
            ("Name", Value::from("bat0")),
            (
                "Levels",
                Value::sequence([Value::from(1), Value::from(2)]),
            ),
            (
                "Props",
                Value::mapping([("on", Value::from(true))]),
            ),
        ]);
        assert_eq!(
            v.to_string(),
            r#"{Name: "bat0", Levels: [1, 2], Props: {"on": true}}"#
        );
    }

    #[test]
    fn kind_names_each_shape() {
        assert_eq!(Value::from(1).kind(), "scalar");
        assert_eq!(Value::Sequence(vec![]).kind(), "sequence");
        assert_eq!(Value::Mapping(vec![]).kind(), "mapping");
        assert_eq!(Value::Record(vec![]).kind(), "record");
    }

    #[test]
    fn integer_widths_collapse_into_signed_and_unsigned() {
        assert_eq!(Scalar::from(-3i16), Scalar::Int(-3));
        assert_eq!(Scalar::from(200u8), Scalar::UInt(200));
        assert_eq!(Value::from(1.5f32), Value::Scalar(Scalar::Float(1.5)));
    }
}
