//! Error type for text parsing and partial updates.

use bitview::WriteError;
use thiserror::Error;

/// Errors produced while parsing the text notation or applying it to a view.
///
/// Parse-phase variants carry the byte offset into the input where the
/// problem was found. Apply-phase variants name the offending field instead:
/// by then the input has already been fully parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("unexpected character `{ch}` at byte {at}")]
    UnexpectedChar { at: usize, ch: char },
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected token at byte {0}")]
    UnexpectedToken(usize),
    #[error("integer literal at byte {0} does not fit in 64 bits")]
    NumberOverflow(usize),
    #[error("trailing input at byte {0}")]
    TrailingInput(usize),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("`{value}` is not an enum name for field `{field}`")]
    UnknownEnumName { field: String, value: String },
    #[error("field `{0}` expects an object")]
    ExpectedObject(String),
    #[error("field `{0}` expects an array")]
    ExpectedArray(String),
    #[error("field `{0}` expects a plain value")]
    ExpectedScalar(String),
    #[error("too many elements for array field `{0}`")]
    TooManyElements(String),
    #[error("cannot update field `{field}`: {source}")]
    Write {
        field: String,
        #[source]
        source: WriteError,
    },
}
