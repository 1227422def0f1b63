//! Static layout descriptors consumed by [`crate::view::View`].
//!
//! A layout is produced ahead of time by a schema compiler or generated
//! code and is treated as trusted, compile-time-fixed metadata: the runtime
//! does not re-validate it on each access. The checked path for untrusted
//! definitions (e.g. layouts loaded from JSON) is the `serde` feature.

use crate::expr::Expr;
use crate::params::ParamSpec;

/// Expressions may reference only this many leading members of a struct.
/// The bound lets a resolution pass keep already-resolved member values in
/// a fixed-size scratch, so validity checks stay linear and allocation-free.
/// References at or past the bound are unresolvable at runtime; the checked
/// serde path rejects them at compile time.
pub const MAX_FIELD_REFS: usize = 64;

/// Byte/bit addressing scheme of a scalar field. See [`crate::bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Symbolic names for enum-typed scalar values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTable {
    pub entries: Vec<(i64, String)>,
    /// If true, a raw value with no entry makes the field invalid. If false,
    /// any raw value is accepted as an unknown enum instance.
    pub strict: bool,
}

impl EnumTable {
    pub fn new(entries: Vec<(i64, &str)>) -> Self {
        EnumTable {
            entries: entries
                .into_iter()
                .map(|(v, n)| (v, n.to_string()))
                .collect(),
            strict: false,
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, n)| n.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(_, n)| n == name)
            .map(|(v, _)| *v)
    }
}

/// A raw scalar field: width, signedness, byte order, optional enum names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarLayout {
    pub width_bits: usize,
    pub signed: bool,
    pub byte_order: ByteOrder,
    pub enums: Option<EnumTable>,
}

impl ScalarLayout {
    pub fn unsigned(width_bits: usize) -> Self {
        ScalarLayout {
            width_bits,
            signed: false,
            byte_order: ByteOrder::default(),
            enums: None,
        }
    }

    pub fn signed(width_bits: usize) -> Self {
        ScalarLayout {
            signed: true,
            ..Self::unsigned(width_bits)
        }
    }

    pub fn little_endian(mut self) -> Self {
        self.byte_order = ByteOrder::LittleEndian;
        self
    }

    pub fn with_enums(mut self, enums: EnumTable) -> Self {
        self.enums = Some(enums);
        self
    }
}

/// Where a member starts, resolved in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffsetSpec {
    /// Fixed bit offset from the start of the view.
    Bits(u64),
    /// Immediately after the end of the previous present member, plus a gap.
    After { gap_bits: u64 },
    /// Byte offset computed from earlier fields and/or parameters.
    ByteExpr(Expr),
}

impl OffsetSpec {
    /// Fixed byte offset.
    pub fn bytes(n: u64) -> Self {
        OffsetSpec::Bits(n * 8)
    }

    /// Sequential layout with no gap.
    pub fn next() -> Self {
        OffsetSpec::After { gap_bits: 0 }
    }
}

/// How many elements an array holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSpec {
    Fixed(usize),
    /// Computed from earlier fields and/or parameters.
    Expr(Expr),
    /// As many whole strides as fit between the array's offset and the end
    /// of the view's bound range.
    FillToEnd,
}

/// Back-solving rule for a writable virtual field: the raw value stored
/// into `field` is `inverse` evaluated with [`Expr::Input`] bound to the
/// incoming written value (`stored = inverse(value)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualStore {
    pub field: usize,
    pub inverse: Expr,
}

/// A field computed from sibling fields and/or parameters. Occupies no bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualLayout {
    pub expr: Expr,
    /// Present iff the expression is invertible and the field is writable.
    pub store: Option<VirtualStore>,
}

/// Element type of an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementLayout {
    Scalar(ScalarLayout),
    Struct { layout: StructLayout, args: Vec<Expr> },
}

impl ElementLayout {
    /// Minimum bits one element occupies, when statically known.
    pub(crate) fn min_bits(&self) -> u64 {
        match self {
            ElementLayout::Scalar(s) => s.width_bits as u64,
            ElementLayout::Struct { layout, .. } => layout.static_min_bits(),
        }
    }
}

/// A homogeneous, possibly bit-packed sequence. Element `i` occupies the
/// stride slot `[i * stride, (i + 1) * stride)` relative to the array start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayLayout {
    pub element: ElementLayout,
    pub count: CountSpec,
    pub stride_bits: u64,
}

/// What a member is: raw scalar, computed virtual, nested struct, or array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberShape {
    Scalar(ScalarLayout),
    Virtual(VirtualLayout),
    Struct { layout: StructLayout, args: Vec<Expr> },
    Array(ArrayLayout),
}

/// One named (or reserved) member of a struct layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// `None` marks a reserved/skipped region: it still occupies bits and is
    /// bounds-checked, but is never rendered by the text transcoder.
    pub name: Option<String>,
    pub offset: OffsetSpec,
    /// Presence predicate for conditional members; absent members are
    /// excluded from size and from text output.
    pub presence: Option<Expr>,
    pub shape: MemberShape,
}

impl Member {
    pub fn scalar(name: &str, offset: OffsetSpec, scalar: ScalarLayout) -> Self {
        Member {
            name: Some(name.to_string()),
            offset,
            presence: None,
            shape: MemberShape::Scalar(scalar),
        }
    }

    pub fn reserved(offset: OffsetSpec, width_bits: usize) -> Self {
        Member {
            name: None,
            offset,
            presence: None,
            shape: MemberShape::Scalar(ScalarLayout::unsigned(width_bits)),
        }
    }

    pub fn virtual_field(name: &str, virt: VirtualLayout) -> Self {
        Member {
            name: Some(name.to_string()),
            offset: OffsetSpec::next(),
            presence: None,
            shape: MemberShape::Virtual(virt),
        }
    }

    pub fn nested(name: &str, offset: OffsetSpec, layout: StructLayout, args: Vec<Expr>) -> Self {
        Member {
            name: Some(name.to_string()),
            offset,
            presence: None,
            shape: MemberShape::Struct { layout, args },
        }
    }

    pub fn array(name: &str, offset: OffsetSpec, array: ArrayLayout) -> Self {
        Member {
            name: Some(name.to_string()),
            offset,
            presence: None,
            shape: MemberShape::Array(array),
        }
    }

    pub fn when(mut self, presence: Expr) -> Self {
        self.presence = Some(presence);
        self
    }
}

/// An ordered, named set of members plus declared parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructLayout {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub members: Vec<Member>,
}

impl StructLayout {
    pub fn new(name: &str, members: Vec<Member>) -> Self {
        StructLayout {
            name: name.to_string(),
            params: Vec::new(),
            members,
        }
    }

    pub fn with_params(name: &str, params: Vec<ParamSpec>, members: Vec<Member>) -> Self {
        StructLayout {
            name: name.to_string(),
            params,
            members,
        }
    }

    /// Index of the member named `name`.
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.name.as_deref() == Some(name))
    }

    /// Bits any instance occupies at minimum, considering only members whose
    /// placement and size are statically known. Used as the cheap length
    /// pre-check before per-member resolution.
    pub(crate) fn static_min_bits(&self) -> u64 {
        let mut end = 0u64;
        let mut cursor = Some(0u64);
        for member in &self.members {
            if member.presence.is_some() {
                // Conditional members contribute nothing statically, and
                // nothing after them can be placed sequentially.
                cursor = None;
                continue;
            }
            let start = match &member.offset {
                OffsetSpec::Bits(b) => Some(*b),
                OffsetSpec::After { gap_bits } => cursor.map(|c| c.saturating_add(*gap_bits)),
                OffsetSpec::ByteExpr(_) => None,
            };
            let size = match &member.shape {
                MemberShape::Scalar(s) => Some(s.width_bits as u64),
                MemberShape::Virtual(_) => Some(0),
                MemberShape::Struct { layout, .. } => Some(layout.static_min_bits()),
                MemberShape::Array(a) => match a.count {
                    CountSpec::Fixed(n) => Some((n as u64).saturating_mul(a.stride_bits)),
                    _ => None,
                },
            };
            cursor = match (start, size) {
                (Some(start), Some(size)) => {
                    // Saturation makes an overflowing layout unsatisfiable
                    // for any real buffer rather than a fault.
                    let member_end = start.saturating_add(size);
                    end = end.max(member_end);
                    Some(member_end)
                }
                _ => None,
            };
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_table_lookup() {
        let table = EnumTable::new(vec![(0, "IDLE"), (1, "ACTIVE")]);
        assert_eq!(table.name_of(1), Some("ACTIVE"));
        assert_eq!(table.name_of(2), None);
        assert_eq!(table.value_of("IDLE"), Some(0));
        assert_eq!(table.value_of("UNKNOWN"), None);
    }

    #[test]
    fn test_static_min_bits_sequential() {
        let layout = StructLayout::new(
            "header",
            vec![
                Member::scalar("a", OffsetSpec::Bits(0), ScalarLayout::unsigned(16)),
                Member::scalar("b", OffsetSpec::next(), ScalarLayout::unsigned(8)),
                Member::reserved(OffsetSpec::next(), 8),
            ],
        );
        assert_eq!(layout.static_min_bits(), 32);
    }

    #[test]
    fn test_static_min_bits_stops_at_dynamic_offset() {
        let layout = StructLayout::new(
            "sized",
            vec![
                Member::scalar("size", OffsetSpec::Bits(0), ScalarLayout::unsigned(8)),
                Member::scalar(
                    "tail",
                    OffsetSpec::ByteExpr(Expr::Field(0)),
                    ScalarLayout::unsigned(8),
                ),
            ],
        );
        // Only the statically placed prefix counts.
        assert_eq!(layout.static_min_bits(), 8);
    }

    #[test]
    fn test_static_min_bits_saturates_on_extreme_offsets() {
        let layout = StructLayout::new(
            "far",
            vec![Member::scalar(
                "x",
                OffsetSpec::Bits(u64::MAX),
                ScalarLayout::unsigned(8),
            )],
        );
        // An end past the addressable range pins to the maximum, which no
        // buffer can satisfy.
        assert_eq!(layout.static_min_bits(), u64::MAX);
    }

    #[test]
    fn test_static_min_bits_skips_conditionals() {
        let layout = StructLayout::with_params(
            "cond",
            vec![ParamSpec::any("flag")],
            vec![
                Member::scalar("head", OffsetSpec::Bits(0), ScalarLayout::unsigned(8)),
                Member::scalar("opt", OffsetSpec::next(), ScalarLayout::unsigned(32))
                    .when(Expr::Param(0)),
            ],
        );
        assert_eq!(layout.static_min_bits(), 8);
    }

    #[test]
    fn test_member_index_skips_reserved() {
        let layout = StructLayout::new(
            "r",
            vec![
                Member::reserved(OffsetSpec::Bits(0), 8),
                Member::scalar("x", OffsetSpec::next(), ScalarLayout::unsigned(8)),
            ],
        );
        assert_eq!(layout.member_index("x"), Some(1));
        assert_eq!(layout.member_index("missing"), None);
    }
}
