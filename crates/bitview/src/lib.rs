//! # bitview
//!
//! Typed, validated field views over raw byte buffers.
//!
//! A [`layout::StructLayout`] describes a wire or on-disk record: named
//! fields with bit offsets and widths, byte order, enum names, nested
//! structs, bit-packed arrays, conditional presence, and values computed
//! from sibling fields or runtime parameters. A [`view::View`] overlays
//! such a layout onto a borrowed byte slice and reads (or, through
//! [`view::ViewMut`], writes) individual fields in place, without copying
//! the buffer into an intermediate representation.
//!
//! Access is bounds-safe by construction: every field carries an `ok()`
//! validity predicate, reads of invalid fields return 0 instead of
//! faulting, and writes outside the buffer are refused. A broken parameter
//! or dependency chain withholds the entire dependent subtree.
//!
//! ## Example
//!
//! ```
//! use bitview::layout::{Member, OffsetSpec, ScalarLayout, StructLayout};
//! use bitview::view::{View, ViewMut};
//!
//! let layout = StructLayout::new(
//!     "header",
//!     vec![
//!         Member::scalar("version", OffsetSpec::Bits(0), ScalarLayout::unsigned(4)),
//!         Member::scalar("length", OffsetSpec::next(), ScalarLayout::unsigned(12)),
//!     ],
//! );
//!
//! let mut data = [0u8; 2];
//! let mut view = ViewMut::new(&layout, &mut data);
//! view.write("version", 4).unwrap();
//! view.write("length", 0x1FF).unwrap();
//!
//! let view = View::new(&layout, &data);
//! assert!(view.ok());
//! assert_eq!(view.read("version"), 4);
//! assert_eq!(view.read("length"), 0x1FF);
//! ```

pub mod bits;
pub mod errors;
pub mod expr;
pub mod layout;
pub mod params;
#[cfg(feature = "serde")]
pub mod serde;
pub mod view;

pub use errors::{LayoutError, ReadError, WriteError};
pub use view::{ArrayRef, FieldRef, View, ViewMut};
