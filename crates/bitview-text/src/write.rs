//! Renders a view as text.
//!
//! Two forms share one walk over the layout: [`write_compact`] emits a
//! single line suitable for logs and diffs, [`write_pretty`] emits an
//! indented multi-line form with a hex annotation comment on each raw
//! scalar. Both forms parse back with [`crate::parse_text`].
//!
//! Rendering never fails: absent members and reserved regions are skipped,
//! withheld or out-of-bounds fields render as zero, and arrays whose count
//! cannot be derived render empty.

use bitview::View;
use bitview::layout::{ElementLayout, MemberShape, ScalarLayout};

/// Renders `view` on a single line: `{ a: 1, b: { c: 2 } }`.
pub fn write_compact(view: &View<'_>) -> String {
    let mut out = String::new();
    render_struct(&mut out, view, 0, false);
    out
}

/// Renders `view` indented, one entry per line, with raw scalar values
/// annotated in hex:
///
/// ```text
/// {
///   weight: 40,  # 0x28
///   flags: ACTIVE,  # 0x1
/// }
/// ```
pub fn write_pretty(view: &View<'_>) -> String {
    let mut out = String::new();
    render_struct(&mut out, view, 0, true);
    out.push('\n');
    out
}

fn render_struct(out: &mut String, view: &View<'_>, depth: usize, pretty: bool) {
    let entries: Vec<_> = view
        .fields()
        .filter(|f| f.name().is_some() && f.present())
        .collect();
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push('{');
    for (i, field) in entries.iter().enumerate() {
        let name = field.name().unwrap_or_default();
        if pretty {
            out.push('\n');
            indent(out, depth + 1);
        } else {
            out.push(' ');
        }
        out.push_str(name);
        out.push_str(": ");
        match &field.member().shape {
            MemberShape::Scalar(scalar) => {
                let value = field.read();
                match field.enum_name() {
                    Some(n) => out.push_str(n),
                    None => push_int(out, value, scalar),
                }
                out.push(',');
                if pretty {
                    push_hex_note(out, value, scalar.width_bits);
                }
            }
            MemberShape::Virtual(_) => {
                push_plain_int(out, field.read());
                out.push(',');
            }
            MemberShape::Struct { .. } => {
                if let Some(child) = field.as_struct() {
                    render_struct(out, &child, depth + 1, pretty);
                } else {
                    out.push_str("{}");
                }
                out.push(',');
            }
            MemberShape::Array(_) => {
                render_array(out, field, depth + 1, pretty);
                out.push(',');
            }
        }
        if !pretty && i + 1 == entries.len() {
            // Single-line form closes without the trailing comma.
            out.pop();
        }
    }
    if pretty {
        out.push('\n');
        indent(out, depth);
    } else {
        out.push(' ');
    }
    out.push('}');
}

fn render_array(out: &mut String, field: &bitview::FieldRef<'_>, depth: usize, pretty: bool) {
    let Some(array) = field.as_array() else {
        out.push_str("{}");
        return;
    };
    let count = array.len().unwrap_or(0);
    if count == 0 {
        out.push_str("{}");
        return;
    }
    match array.element_layout() {
        ElementLayout::Scalar(scalar) => {
            // Scalar elements stay on one line in both forms.
            out.push_str("{ ");
            for i in 0..count {
                if i > 0 {
                    out.push_str(", ");
                }
                match array.enum_name(i) {
                    Some(n) => out.push_str(n),
                    None => push_int(out, array.read(i), scalar),
                }
            }
            out.push_str(" }");
        }
        ElementLayout::Struct { .. } => {
            out.push('{');
            for i in 0..count {
                if pretty {
                    out.push('\n');
                    indent(out, depth + 1);
                } else if i > 0 {
                    out.push_str(", ");
                } else {
                    out.push(' ');
                }
                match array.element(i) {
                    Some(child) => render_struct(out, &child, depth + 1, pretty),
                    None => out.push_str("{}"),
                }
                if pretty {
                    out.push(',');
                }
            }
            if pretty {
                out.push('\n');
                indent(out, depth);
            } else {
                out.push(' ');
            }
            out.push('}');
        }
    }
}

fn push_int(out: &mut String, value: i64, scalar: &ScalarLayout) {
    use std::fmt::Write as _;
    if scalar.signed || value >= 0 {
        let _ = write!(out, "{value}");
    } else {
        // An unsigned 64-bit field wide enough to go negative as i64.
        let _ = write!(out, "{:#X}", value as u64);
    }
}

fn push_plain_int(out: &mut String, value: i64) {
    use std::fmt::Write as _;
    let _ = write!(out, "{value}");
}

fn push_hex_note(out: &mut String, value: i64, width_bits: usize) {
    use std::fmt::Write as _;
    let mask = if width_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << width_bits) - 1
    };
    let _ = write!(out, "  # {:#X}", (value as u64) & mask);
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_text;
    use bitview::expr::{BinOp, Expr};
    use bitview::layout::{ArrayLayout, CountSpec, EnumTable, Member, OffsetSpec, StructLayout};

    fn message_layout() -> StructLayout {
        StructLayout::new(
            "message",
            vec![
                Member::scalar(
                    "kind",
                    OffsetSpec::next(),
                    ScalarLayout::unsigned(8)
                        .with_enums(EnumTable::new(vec![(1, "DATA"), (2, "ACK")])),
                ),
                Member::scalar("length", OffsetSpec::next(), ScalarLayout::unsigned(8)),
                Member::array(
                    "payload",
                    OffsetSpec::next(),
                    ArrayLayout {
                        element: ElementLayout::Scalar(ScalarLayout::unsigned(8)),
                        count: CountSpec::Expr(Expr::Field(1)),
                        stride_bits: 8,
                    },
                ),
                Member::nested(
                    "trailer",
                    OffsetSpec::next(),
                    StructLayout::new(
                        "trailer",
                        vec![Member::scalar(
                            "crc",
                            OffsetSpec::next(),
                            ScalarLayout::unsigned(16),
                        )],
                    ),
                    vec![],
                ),
            ],
        )
    }

    #[test]
    fn test_compact_form() {
        let data = [0x01, 0x02, 0xAA, 0xBB, 0x12, 0x34];
        let layout = message_layout();
        let view = View::new(&layout, &data);
        assert_eq!(
            write_compact(&view),
            "{ kind: DATA, length: 2, payload: { 170, 187 }, trailer: { crc: 4660 } }"
        );
    }

    #[test]
    fn test_pretty_form() {
        let data = [0x02, 0x01, 0xFF, 0x00, 0x10];
        let layout = message_layout();
        let view = View::new(&layout, &data);
        let expected = "\
{
  kind: ACK,  # 0x2
  length: 1,  # 0x1
  payload: { 255 },
  trailer: {
    crc: 16,  # 0x10
  },
}
";
        assert_eq!(write_pretty(&view), expected);
    }

    #[test]
    fn test_both_forms_parse_back_equal() {
        let data = [0x01, 0x03, 0x0A, 0x0B, 0x0C, 0xFE, 0xED];
        let layout = message_layout();
        let view = View::new(&layout, &data);
        let compact = parse_text(&write_compact(&view)).unwrap();
        let pretty = parse_text(&write_pretty(&view)).unwrap();
        assert_eq!(compact, pretty);
    }

    #[test]
    fn test_reserved_and_absent_members_are_skipped() {
        let layout = StructLayout::new(
            "framed",
            vec![
                Member::scalar("mode", OffsetSpec::next(), ScalarLayout::unsigned(8)),
                Member::reserved(OffsetSpec::next(), 8),
                Member::scalar("extra", OffsetSpec::next(), ScalarLayout::unsigned(8))
                    .when(Expr::bin(BinOp::Eq, Expr::Field(0), Expr::Const(1))),
            ],
        );
        let data = [0x00, 0x77, 0x55];
        let view = View::new(&layout, &data);
        assert_eq!(write_compact(&view), "{ mode: 0 }");
    }

    #[test]
    fn test_truncated_buffer_renders_zeros() {
        // One byte short of the trailer: rendering must not fail.
        let data = [0x01, 0x01, 0xAA, 0x12];
        let layout = message_layout();
        let view = View::new(&layout, &data);
        assert!(!view.ok());
        let text = write_compact(&view);
        assert!(text.contains("crc: 0"), "{text}");
    }

    #[test]
    fn test_signed_and_wide_values() {
        let layout = StructLayout::new(
            "nums",
            vec![
                Member::scalar("temp", OffsetSpec::next(), ScalarLayout::signed(8)),
                Member::scalar("tag", OffsetSpec::next(), ScalarLayout::unsigned(64)),
            ],
        );
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let view = View::new(&layout, &data);
        assert_eq!(
            write_compact(&view),
            "{ temp: -1, tag: 0xFFFFFFFFFFFFFFFF }"
        );
        assert!(parse_text(&write_compact(&view)).is_ok());
    }
}
