//! Applies parsed text to a mutable view.
//!
//! An update is a partial merge: only the fields named in the text are
//! written, everything else keeps its bytes. The input is parsed in full
//! before any write happens, so a malformed input leaves the buffer
//! untouched. Apply-phase failures are reported where they occur and do not
//! roll back entries already written.

use bitview::ViewMut;
use bitview::layout::{ArrayLayout, ElementLayout, EnumTable, MemberShape};

use crate::ast::TextValue;
use crate::errors::TextError;
use crate::parse::parse_text;

/// What to do with a text entry naming no member of the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFields {
    /// Fail the update.
    #[default]
    Error,
    /// Skip the entry and keep applying the rest.
    Ignore,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub unknown_fields: UnknownFields,
}

/// Parses `text` and writes the named fields into `view`.
pub fn update_from_text(
    view: &mut ViewMut<'_>,
    text: &str,
    options: &UpdateOptions,
) -> Result<(), TextError> {
    let parsed = parse_text(text)?;
    let Some(entries) = parsed.as_object() else {
        return Err(TextError::ExpectedObject(view.layout().name.clone()));
    };
    apply_object(view, entries, options)
}

fn apply_object(
    view: &mut ViewMut<'_>,
    entries: &[(String, TextValue)],
    options: &UpdateOptions,
) -> Result<(), TextError> {
    for (name, value) in entries {
        if view.layout().member_index(name).is_none() {
            match options.unknown_fields {
                UnknownFields::Error => return Err(TextError::UnknownField(name.clone())),
                UnknownFields::Ignore => continue,
            }
        }
        apply_member(view, name, value, options)?;
    }
    Ok(())
}

fn apply_member(
    view: &mut ViewMut<'_>,
    name: &str,
    value: &TextValue,
    options: &UpdateOptions,
) -> Result<(), TextError> {
    let layout = view.layout();
    let shape = match layout.member_index(name) {
        Some(idx) => &layout.members[idx].shape,
        None => return Err(TextError::UnknownField(name.to_string())),
    };
    match shape {
        MemberShape::Scalar(scalar) => {
            let v = scalar_value(name, value, scalar.enums.as_ref())?;
            write_wrapped(view, name, v)
        }
        MemberShape::Virtual(_) => {
            let v = scalar_value(name, value, None)?;
            write_wrapped(view, name, v)
        }
        MemberShape::Struct { .. } => {
            let Some(entries) = value.as_object() else {
                return Err(TextError::ExpectedObject(name.to_string()));
            };
            let mut child = view.child_mut(name).map_err(|source| TextError::Write {
                field: name.to_string(),
                source,
            })?;
            apply_object(&mut child, entries, options)
        }
        MemberShape::Array(array) => apply_array(view, name, array, value, options),
    }
}

fn apply_array(
    view: &mut ViewMut<'_>,
    name: &str,
    array: &ArrayLayout,
    value: &TextValue,
    options: &UpdateOptions,
) -> Result<(), TextError> {
    // `{}` parses as an empty object; accept it as an empty element list.
    let empty: [TextValue; 0] = [];
    let items: &[TextValue] = match value {
        TextValue::Array(items) => items,
        TextValue::Object(entries) if entries.is_empty() => &empty,
        _ => return Err(TextError::ExpectedArray(name.to_string())),
    };
    let count = view
        .as_view()
        .field(name)
        .and_then(|f| f.as_array())
        .and_then(|a| a.len());
    if count.is_some_and(|c| items.len() > c) {
        return Err(TextError::TooManyElements(name.to_string()));
    }
    match &array.element {
        ElementLayout::Scalar(scalar) => {
            for (i, item) in items.iter().enumerate() {
                let v = scalar_value(name, item, scalar.enums.as_ref())?;
                view.write_element(name, i, v)
                    .map_err(|source| TextError::Write {
                        field: name.to_string(),
                        source,
                    })?;
            }
            Ok(())
        }
        ElementLayout::Struct { .. } => {
            for (i, item) in items.iter().enumerate() {
                let Some(entries) = item.as_object() else {
                    return Err(TextError::ExpectedObject(name.to_string()));
                };
                let mut element = view
                    .element_mut(name, i)
                    .map_err(|source| TextError::Write {
                        field: name.to_string(),
                        source,
                    })?;
                apply_object(&mut element, entries, options)?;
            }
            Ok(())
        }
    }
}

fn scalar_value(
    field: &str,
    value: &TextValue,
    enums: Option<&EnumTable>,
) -> Result<i64, TextError> {
    match value {
        TextValue::Int(v) => Ok(*v),
        TextValue::Bool(b) => Ok(*b as i64),
        TextValue::Name(n) => enums
            .and_then(|t| t.value_of(n))
            .ok_or_else(|| TextError::UnknownEnumName {
                field: field.to_string(),
                value: n.clone(),
            }),
        TextValue::Object(_) | TextValue::Array(_) => {
            Err(TextError::ExpectedScalar(field.to_string()))
        }
    }
}

fn write_wrapped(view: &mut ViewMut<'_>, name: &str, value: i64) -> Result<(), TextError> {
    view.write(name, value).map_err(|source| TextError::Write {
        field: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitview::WriteError;
    use bitview::layout::{
        CountSpec, EnumTable, Member, OffsetSpec, ScalarLayout, StructLayout, VirtualLayout,
        VirtualStore,
    };
    use bitview::expr::{BinOp, Expr};

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
    fn test_partial_merge_touches_only_named_fields() {
        let layout = message_layout();
        let mut data = [0x01, 0x02, 0xAA, 0xBB, 0x12, 0x34];
        let mut view = ViewMut::new(&layout, &mut data);
        update_from_text(&mut view, "{ kind: ACK }", &UpdateOptions::default()).unwrap();
        assert_eq!(data, [0x02, 0x02, 0xAA, 0xBB, 0x12, 0x34]);
    }

    #[test]
    fn test_nested_and_array_update() {
        let layout = message_layout();
        let mut data = [0x01, 0x02, 0x00, 0x00, 0x00, 0x00];
        let mut view = ViewMut::new(&layout, &mut data);
        update_from_text(
            &mut view,
            "{ payload: { 0x10, 0x20 }, trailer: { crc: 0xBEEF } }",
            &UpdateOptions::default(),
        )
        .unwrap();
        assert_eq!(data, [0x01, 0x02, 0x10, 0x20, 0xBE, 0xEF]);
    }

    #[test]
    fn test_parse_failure_leaves_buffer_untouched() {
        let layout = message_layout();
        let mut data = [0x01, 0x00, 0x12, 0x34];
        let mut view = ViewMut::new(&layout, &mut data);
        let err = update_from_text(&mut view, "{ kind: 2, oops", &UpdateOptions::default());
        assert_eq!(err.unwrap_err(), TextError::UnexpectedEnd);
        assert_eq!(data, [0x01, 0x00, 0x12, 0x34]);
    }

    #[test]
    fn test_apply_failure_does_not_roll_back() {
        let layout = message_layout();
        let mut data = [0x01, 0x00, 0x12, 0x34];
        let mut view = ViewMut::new(&layout, &mut data);
        let err = update_from_text(
            &mut view,
            "{ kind: 2, bogus: 1 }",
            &UpdateOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, TextError::UnknownField("bogus".to_string()));
        // The entry before the failure was applied.
        assert_eq!(data[0], 0x02);
    }

    #[test]
    fn test_unknown_fields_ignored_on_request() {
        let layout = message_layout();
        let mut data = [0x01, 0x00, 0x12, 0x34];
        let mut view = ViewMut::new(&layout, &mut data);
        let options = UpdateOptions {
            unknown_fields: UnknownFields::Ignore,
        };
        update_from_text(&mut view, "{ bogus: 1, length: 0 }", &options).unwrap();
        assert_eq!(data[1], 0x00);
    }

    #[test]
    fn test_enum_names_and_bools() {
        let layout = StructLayout::new(
            "flags",
            vec![
                Member::scalar(
                    "state",
                    OffsetSpec::next(),
                    ScalarLayout::unsigned(8)
                        .with_enums(EnumTable::new(vec![(0, "IDLE"), (3, "ACTIVE")])),
                ),
                Member::scalar("armed", OffsetSpec::next(), ScalarLayout::unsigned(1)),
            ],
        );
        let mut data = [0x00, 0x00];
        let mut view = ViewMut::new(&layout, &mut data);
        update_from_text(
            &mut view,
            "{ state: ACTIVE, armed: true }",
            &UpdateOptions::default(),
        )
        .unwrap();
        assert_eq!(data, [0x03, 0x80]);

        let mut view = ViewMut::new(&layout, &mut data);
        let err = update_from_text(&mut view, "{ state: BROKEN }", &UpdateOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            TextError::UnknownEnumName {
                field: "state".to_string(),
                value: "BROKEN".to_string(),
            }
        );
    }

    #[test]
    fn test_too_many_array_elements() {
        let layout = message_layout();
        let mut data = [0x01, 0x01, 0x00, 0x00, 0x00];
        let mut view = ViewMut::new(&layout, &mut data);
        let err = update_from_text(
            &mut view,
            "{ payload: { 1, 2, 3 } }",
            &UpdateOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, TextError::TooManyElements("payload".to_string()));
    }

    #[test]
    fn test_shape_mismatches_are_rejected() {
        let layout = message_layout();
        let mut data = [0x01, 0x00, 0x12, 0x34];
        let mut view = ViewMut::new(&layout, &mut data);
        assert_eq!(
            update_from_text(&mut view, "{ trailer: 5 }", &UpdateOptions::default()).unwrap_err(),
            TextError::ExpectedObject("trailer".to_string())
        );
        assert_eq!(
            update_from_text(&mut view, "{ kind: { a: 1 } }", &UpdateOptions::default())
                .unwrap_err(),
            TextError::ExpectedScalar("kind".to_string())
        );
        assert_eq!(
            update_from_text(&mut view, "5", &UpdateOptions::default()).unwrap_err(),
            TextError::ExpectedObject("message".to_string())
        );
    }

    #[test]
    fn test_virtual_field_update_back_solves() {
        // total_bytes = length + 4, stored through length.
        let layout = StructLayout::new(
            "framed",
            vec![
                Member::scalar("length", OffsetSpec::next(), ScalarLayout::unsigned(8)),
                Member::virtual_field(
                    "total_bytes",
                    VirtualLayout {
                        expr: Expr::bin(BinOp::Add, Expr::Field(0), Expr::Const(4)),
                        store: Some(VirtualStore {
                            field: 0,
                            inverse: Expr::bin(BinOp::Sub, Expr::Input, Expr::Const(4)),
                        }),
                    },
                ),
            ],
        );
        let mut data = [0x00];
        let mut view = ViewMut::new(&layout, &mut data);
        update_from_text(&mut view, "{ total_bytes: 10 }", &UpdateOptions::default()).unwrap();
        assert_eq!(data, [0x06]);
    }

    #[test]
    fn test_text_update_produces_exact_bytes() {
        let pair = StructLayout::new(
            "box",
            vec![
                Member::scalar("id", OffsetSpec::next(), ScalarLayout::unsigned(32).little_endian()),
                Member::scalar(
                    "count",
                    OffsetSpec::next(),
                    ScalarLayout::unsigned(32).little_endian(),
                ),
            ],
        );
        let layout = StructLayout::new(
            "header",
            vec![
                Member::scalar(
                    "weight",
                    OffsetSpec::next(),
                    ScalarLayout::unsigned(32).little_endian(),
                ),
                Member::nested("box_a", OffsetSpec::next(), pair.clone(), vec![]),
                Member::nested("box_b", OffsetSpec::next(), pair, vec![]),
            ],
        );
        let mut data = [0u8; 20];
        let mut view = ViewMut::new(&layout, &mut data);
        update_from_text(
            &mut view,
            "{ weight: 40, \
               box_a: { id: 0x1234_5678, count: 0x01_02_03 }, \
               box_b: { id: 0x8765_4321, count: 0xAA_BB_CC } }",
            &UpdateOptions::default(),
        )
        .unwrap();
        assert_eq!(
            data,
            [
                0x28, 0x00, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12, 0x03, 0x02, 0x01, 0x00, 0x21,
                0x43, 0x65, 0x87, 0xCC, 0xBB, 0xAA, 0x00,
            ]
        );
        let text = crate::write_compact(&bitview::View::new(&layout, &data));
        assert_eq!(
            text,
            "{ weight: 40, box_a: { id: 305419896, count: 66051 }, \
             box_b: { id: 2271560481, count: 11189196 } }"
        );
    }

    #[test]
    fn test_write_error_is_surfaced_with_field_name() {
        let layout = message_layout();
        let mut data = [0x01, 0x02, 0x00, 0x00, 0x12];
        let mut view = ViewMut::new(&layout, &mut data);
        // The trailer starts past the end of this short buffer.
        let err = update_from_text(
            &mut view,
            "{ trailer: { crc: 1 } }",
            &UpdateOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TextError::Write {
                field: "crc".to_string(),
                source: WriteError::OutOfBounds,
            }
        );
    }
}
