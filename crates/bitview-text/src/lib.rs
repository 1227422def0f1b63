//! Text transcoding for [`bitview`] layouts.
//!
//! Renders a [`bitview::View`] as a small brace-delimited notation and
//! applies edited text back onto a [`bitview::ViewMut`] as a partial merge.
//! The parser is total: any input, however malformed or truncated, produces
//! either a value or an error, never a panic.
//!
//! ```
//! use bitview::layout::{Member, OffsetSpec, ScalarLayout, StructLayout};
//! use bitview::{View, ViewMut};
//! use bitview_text::{parse_text, update_from_text, write_compact, UpdateOptions};
//!
//! let layout = StructLayout::new(
//!     "point",
//!     vec![
//!         Member::scalar("x", OffsetSpec::next(), ScalarLayout::unsigned(8)),
//!         Member::scalar("y", OffsetSpec::next(), ScalarLayout::unsigned(8)),
//!     ],
//! );
//!
//! let mut data = [3u8, 4];
//! assert_eq!(write_compact(&View::new(&layout, &data)), "{ x: 3, y: 4 }");
//!
//! let mut view = ViewMut::new(&layout, &mut data);
//! update_from_text(&mut view, "{ y: 9 }", &UpdateOptions::default()).unwrap();
//! assert_eq!(data, [3, 9]);
//!
//! assert!(parse_text("{ x: ").is_err());
//! ```

pub mod ast;
pub mod errors;
pub mod parse;
pub mod update;
pub mod write;

pub use ast::TextValue;
pub use errors::TextError;
pub use parse::parse_text;
pub use update::{UnknownFields, UpdateOptions, update_from_text};
pub use write::{write_compact, write_pretty};
