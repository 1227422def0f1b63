//! JSON-deserializable layout definitions.
//!
//! These types describe the *shape* of the binary data a view overlays.
//! They are intended to be constructed from JSON (for example a layout file
//! produced by a schema compiler) and then compiled — with full structural
//! validation — into the trusted [`crate::layout`] types. Direct
//! construction of layout types skips that validation and is reserved for
//! generated code.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::LayoutError;
use crate::expr::{BinOp, Expr};
use crate::layout::{
    ArrayLayout, ByteOrder, CountSpec, ElementLayout, EnumTable, MAX_FIELD_REFS, Member,
    MemberShape, OffsetSpec, ScalarLayout, StructLayout, VirtualLayout, VirtualStore,
};
use crate::params::{MAX_PARAMS, ParamSpec};

/// Byte/bit addressing scheme of a scalar field.
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy)]
pub enum ByteOrderDef {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Symbolic names for enum-typed values, keyed by raw value.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnumTableDef {
    pub entries: HashMap<i64, String>,
    /// If true, values without an entry make the field invalid.
    #[serde(default)]
    pub strict: bool,
}

/// A raw scalar field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScalarDef {
    /// Width in bits, 1..=64.
    pub width_bits: usize,
    /// Whether the value is sign-extended on read.
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub byte_order: ByteOrderDef,
    #[serde(default)]
    pub enums: Option<EnumTableDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum BinOpDef {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// An integer expression over constants, parameters, and earlier fields.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum ExprDef {
    Const(i64),
    Param(usize),
    Field(usize),
    Input,
    Binary(BinOpDef, Box<ExprDef>, Box<ExprDef>),
    Not(Box<ExprDef>),
}

/// Where a member starts.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum OffsetDef {
    /// Fixed bit offset from the start of the view.
    Bits { bits: u64 },
    /// Immediately after the previous member, plus an optional gap.
    After {
        #[serde(default)]
        gap_bits: u64,
    },
    /// Byte offset computed from earlier fields or parameters.
    ByteExpr { expr: ExprDef },
}

impl Default for OffsetDef {
    fn default() -> Self {
        OffsetDef::After { gap_bits: 0 }
    }
}

/// Array element count.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum CountDef {
    Fixed { count: usize },
    Expr { expr: ExprDef },
    /// As many whole strides as fit to the end of the view's range.
    FillToEnd,
}

/// Back-solving rule for a writable virtual field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VirtualStoreDef {
    /// Index of the earlier raw scalar receiving the stored value.
    pub field: usize,
    /// Maps the incoming value (`Input`) to the raw stored value.
    pub inverse: ExprDef,
}

/// A computed field.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VirtualDef {
    pub expr: ExprDef,
    #[serde(default)]
    pub store: Option<VirtualStoreDef>,
}

/// A nested struct member or element, with its parameter arguments.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NestedDef {
    pub layout: StructDef,
    #[serde(default)]
    pub args: Vec<ExprDef>,
}

/// Array element type.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ElementDef {
    Scalar(ScalarDef),
    Struct(NestedDef),
}

/// A homogeneous sequence with constant stride.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArrayDef {
    pub element: Box<ElementDef>,
    pub count: CountDef,
    /// Distance in bits between the start of consecutive elements.
    pub stride_bits: u64,
}

/// What a member is.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ShapeDef {
    Scalar(ScalarDef),
    Virtual(VirtualDef),
    Struct(NestedDef),
    Array(ArrayDef),
}

/// One member of a struct definition.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemberDef {
    /// Omitted for reserved/skipped regions.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub offset: OffsetDef,
    /// Presence predicate for conditional members.
    #[serde(default)]
    pub presence: Option<ExprDef>,
    pub shape: ShapeDef,
}

/// A declared parameter with its inclusive admissible range.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ParamDef {
    pub name: String,
    #[serde(default = "min_default")]
    pub min: i64,
    #[serde(default = "max_default")]
    pub max: i64,
}

fn min_default() -> i64 {
    i64::MIN
}

fn max_default() -> i64 {
    i64::MAX
}

/// Top-level struct definition.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StructDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    pub members: Vec<MemberDef>,
}

impl StructDef {
    /// Validates and compiles this definition into a trusted layout.
    pub fn compile(&self) -> Result<StructLayout, LayoutError> {
        if self.params.len() > MAX_PARAMS {
            return Err(LayoutError::TooManyParams(self.params.len()));
        }
        let mut params = Vec::with_capacity(self.params.len());
        for p in &self.params {
            if p.min > p.max {
                return Err(LayoutError::EmptyParamRange(p.name.clone()));
            }
            params.push(ParamSpec::new(&p.name, p.min, p.max));
        }

        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(self.members.len());
        for (at, m) in self.members.iter().enumerate() {
            if let Some(name) = &m.name {
                if name.is_empty() || !seen.insert(name.clone()) {
                    return Err(LayoutError::InvalidMemberName(name.clone()));
                }
            }
            let ctx = ExprCtx {
                at,
                declared_params: self.params.len(),
                members: &self.members,
            };
            let offset = match &m.offset {
                OffsetDef::Bits { bits } => OffsetSpec::Bits(*bits),
                OffsetDef::After { gap_bits } => OffsetSpec::After { gap_bits: *gap_bits },
                OffsetDef::ByteExpr { expr } => {
                    ctx.check(expr, false)?;
                    OffsetSpec::ByteExpr(expr.into())
                }
            };
            let presence = match &m.presence {
                Some(expr) => {
                    ctx.check(expr, false)?;
                    Some(expr.into())
                }
                None => None,
            };
            let shape = compile_shape(&m.shape, &ctx)?;
            members.push(Member {
                name: m.name.clone(),
                offset,
                presence,
                shape,
            });
        }

        Ok(StructLayout {
            name: self.name.clone(),
            params,
            members,
        })
    }
}

struct ExprCtx<'d> {
    at: usize,
    declared_params: usize,
    members: &'d [MemberDef],
}

impl ExprCtx<'_> {
    /// Walks an expression, rejecting undeclared parameters, references to
    /// members that are not strictly earlier scalars/virtuals, and `Input`
    /// outside a store inverse.
    fn check(&self, expr: &ExprDef, allow_input: bool) -> Result<(), LayoutError> {
        match expr {
            ExprDef::Const(_) => Ok(()),
            ExprDef::Param(i) => {
                if *i >= self.declared_params {
                    return Err(LayoutError::UnknownParam {
                        index: *i,
                        declared: self.declared_params,
                    });
                }
                Ok(())
            }
            ExprDef::Field(i) => {
                if *i >= self.at {
                    return Err(LayoutError::ForwardReference {
                        at: self.at,
                        reference: *i,
                    });
                }
                if *i >= MAX_FIELD_REFS {
                    return Err(LayoutError::ReferenceTooDeep(*i));
                }
                match self.members[*i].shape {
                    ShapeDef::Scalar(_) | ShapeDef::Virtual(_) => Ok(()),
                    _ => Err(LayoutError::NonScalarReference(*i)),
                }
            }
            ExprDef::Input => {
                if allow_input {
                    Ok(())
                } else {
                    Err(LayoutError::StrayInput)
                }
            }
            ExprDef::Binary(_, lhs, rhs) => {
                self.check(lhs, allow_input)?;
                self.check(rhs, allow_input)
            }
            ExprDef::Not(inner) => self.check(inner, allow_input),
        }
    }
}

fn compile_scalar(def: &ScalarDef) -> Result<ScalarLayout, LayoutError> {
    if def.width_bits == 0 || def.width_bits > crate::bits::MAX_WIDTH {
        return Err(LayoutError::InvalidWidth(def.width_bits));
    }
    let enums = def.enums.as_ref().map(|e| {
        let mut entries: Vec<(i64, String)> =
            e.entries.iter().map(|(v, n)| (*v, n.clone())).collect();
        entries.sort();
        EnumTable {
            entries,
            strict: e.strict,
        }
    });
    Ok(ScalarLayout {
        width_bits: def.width_bits,
        signed: def.signed,
        byte_order: def.byte_order.into(),
        enums,
    })
}

fn compile_nested(def: &NestedDef, ctx: &ExprCtx<'_>) -> Result<(StructLayout, Vec<Expr>), LayoutError> {
    let layout = def.layout.compile()?;
    if def.args.len() != layout.params.len() {
        return Err(LayoutError::ArgCountMismatch {
            at: ctx.at,
            given: def.args.len(),
            declared: layout.params.len(),
        });
    }
    let mut args = Vec::with_capacity(def.args.len());
    for arg in &def.args {
        ctx.check(arg, false)?;
        args.push(arg.into());
    }
    Ok((layout, args))
}

fn compile_shape(def: &ShapeDef, ctx: &ExprCtx<'_>) -> Result<MemberShape, LayoutError> {
    match def {
        ShapeDef::Scalar(s) => Ok(MemberShape::Scalar(compile_scalar(s)?)),
        ShapeDef::Virtual(v) => {
            ctx.check(&v.expr, false)?;
            let store = match &v.store {
                None => None,
                Some(s) => {
                    let target_is_raw_scalar = s.field < ctx.at
                        && matches!(ctx.members[s.field].shape, ShapeDef::Scalar(_));
                    if !target_is_raw_scalar {
                        return Err(LayoutError::InvalidStoreTarget {
                            at: ctx.at,
                            target: s.field,
                        });
                    }
                    ctx.check(&s.inverse, true)?;
                    Some(VirtualStore {
                        field: s.field,
                        inverse: (&s.inverse).into(),
                    })
                }
            };
            Ok(MemberShape::Virtual(VirtualLayout {
                expr: (&v.expr).into(),
                store,
            }))
        }
        ShapeDef::Struct(nested) => {
            let (layout, args) = compile_nested(nested, ctx)?;
            Ok(MemberShape::Struct { layout, args })
        }
        ShapeDef::Array(a) => {
            let element = match a.element.as_ref() {
                ElementDef::Scalar(s) => ElementLayout::Scalar(compile_scalar(s)?),
                ElementDef::Struct(nested) => {
                    let (layout, args) = compile_nested(nested, ctx)?;
                    ElementLayout::Struct { layout, args }
                }
            };
            if element.min_bits() > a.stride_bits {
                return Err(LayoutError::InvalidArrayStride);
            }
            let count = match &a.count {
                CountDef::Fixed { count } => {
                    if *count == 0 {
                        return Err(LayoutError::InvalidArrayCount);
                    }
                    CountSpec::Fixed(*count)
                }
                CountDef::Expr { expr } => {
                    ctx.check(expr, false)?;
                    CountSpec::Expr(expr.into())
                }
                CountDef::FillToEnd => CountSpec::FillToEnd,
            };
            Ok(MemberShape::Array(ArrayLayout {
                element,
                count,
                stride_bits: a.stride_bits,
            }))
        }
    }
}

impl From<ByteOrderDef> for ByteOrder {
    fn from(value: ByteOrderDef) -> Self {
        match value {
            ByteOrderDef::BigEndian => ByteOrder::BigEndian,
            ByteOrderDef::LittleEndian => ByteOrder::LittleEndian,
        }
    }
}

impl From<BinOpDef> for BinOp {
    fn from(value: BinOpDef) -> Self {
        match value {
            BinOpDef::Add => BinOp::Add,
            BinOpDef::Sub => BinOp::Sub,
            BinOpDef::Mul => BinOp::Mul,
            BinOpDef::Div => BinOp::Div,
            BinOpDef::Eq => BinOp::Eq,
            BinOpDef::Ne => BinOp::Ne,
            BinOpDef::Lt => BinOp::Lt,
            BinOpDef::Le => BinOp::Le,
            BinOpDef::Gt => BinOp::Gt,
            BinOpDef::Ge => BinOp::Ge,
            BinOpDef::And => BinOp::And,
            BinOpDef::Or => BinOp::Or,
        }
    }
}

impl From<&ExprDef> for Expr {
    fn from(value: &ExprDef) -> Self {
        match value {
            ExprDef::Const(v) => Expr::Const(*v),
            ExprDef::Param(i) => Expr::Param(*i),
            ExprDef::Field(i) => Expr::Field(*i),
            ExprDef::Input => Expr::Input,
            ExprDef::Binary(op, lhs, rhs) => Expr::Binary(
                (*op).into(),
                Box::new(lhs.as_ref().into()),
                Box::new(rhs.as_ref().into()),
            ),
            ExprDef::Not(inner) => Expr::Not(Box::new(inner.as_ref().into())),
        }
    }
}
