//! Error types for bit access, field writes, and layout compilation.

use thiserror::Error;

/// Errors produced by the low-level read path in [`crate::bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Requested bit range is beyond the end of the buffer.
    #[error("bit range is beyond the end of the buffer")]
    OutOfBounds,
    /// A single read of more than 64 bits (or zero bits) was requested.
    #[error("read width must be 1..=64 bits")]
    TooManyBits,
}

/// Errors produced when writing through a [`crate::view::ViewMut`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The computed field location falls outside the buffer or the view's
    /// bound range.
    #[error("computed field location falls outside the buffer")]
    OutOfBounds,
    /// A single write of more than 64 bits (or zero bits) was requested.
    #[error("write width must be 1..=64 bits")]
    TooManyBits,
    /// The target is not writable: a composite, a reserved region, or a
    /// virtual field with no declared inverse (or an inverse that is
    /// undefined for the given input).
    #[error("field is not writable")]
    NotWritable,
    /// The target is a conditional field whose presence predicate is false.
    #[error("conditional field is absent")]
    NotPresent,
    /// The target sits below a broken parameter chain or an unresolvable
    /// prerequisite; its location is undefined and storage is withheld.
    #[error("field is withheld by a broken parameter or dependency chain")]
    Withheld,
    /// No member with this name exists in the layout.
    #[error("no field named `{0}`")]
    UnknownField(String),
}

/// Errors produced when compiling an untrusted layout definition
/// (`serde` feature) into a trusted [`crate::layout::StructLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Scalar width is zero or greater than 64 bits.
    #[error("scalar width must be 1..=64 bits, got {0}")]
    InvalidWidth(usize),
    /// An expression references a member at or after the member declaring it.
    #[error("expression in member {at} references member {reference}, which is not strictly earlier")]
    ForwardReference { at: usize, reference: usize },
    /// An expression references a member past the addressable range.
    #[error("expression references member {0}, past the {max} addressable members", max = crate::layout::MAX_FIELD_REFS)]
    ReferenceTooDeep(usize),
    /// An expression references a member that is neither a scalar nor a
    /// virtual field.
    #[error("expression references member {0}, which has no scalar value")]
    NonScalarReference(usize),
    /// An expression references an undeclared parameter.
    #[error("expression references parameter {index}, but only {declared} are declared")]
    UnknownParam { index: usize, declared: usize },
    /// `Input` appears outside a virtual store inverse.
    #[error("`Input` is only meaningful inside a virtual store inverse")]
    StrayInput,
    /// A virtual store targets a member that is not an earlier raw scalar.
    #[error("virtual store in member {at} must target an earlier scalar, got member {target}")]
    InvalidStoreTarget { at: usize, target: usize },
    /// Array stride is smaller than the element size.
    #[error("array stride is smaller than the element size")]
    InvalidArrayStride,
    /// Fixed array count is zero.
    #[error("fixed array count is zero")]
    InvalidArrayCount,
    /// Member name is empty or duplicated within its struct.
    #[error("member name is empty or duplicated: `{0}`")]
    InvalidMemberName(String),
    /// More parameters declared than a view can bind.
    #[error("struct declares {0} parameters, the limit is {max}", max = crate::params::MAX_PARAMS)]
    TooManyParams(usize),
    /// A nested struct member supplies a different number of arguments than
    /// the child declares parameters.
    #[error("member {at} supplies {given} arguments, child declares {declared} parameters")]
    ArgCountMismatch { at: usize, given: usize, declared: usize },
    /// A declared parameter range has min greater than max.
    #[error("parameter `{0}` declares an empty admissible range")]
    EmptyParamRange(String),
}
