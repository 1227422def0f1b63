//! Ephemeral parse tree for the text notation. Built during a parse, applied
//! to a view, then dropped; never persisted.

/// One parsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextValue {
    Int(i64),
    Bool(bool),
    /// A bare identifier, e.g. an enum constant.
    Name(String),
    /// Ordered name/value pairs.
    Object(Vec<(String, TextValue)>),
    /// Ordered unnamed values.
    Array(Vec<TextValue>),
}

impl TextValue {
    pub fn as_object(&self) -> Option<&[(String, TextValue)]> {
        match self {
            TextValue::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TextValue]> {
        match self {
            TextValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TextValue::Int(v) => Some(*v),
            TextValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }
}
