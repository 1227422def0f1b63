//! Typed, non-owning views over byte buffers.
//!
//! A [`View`] binds a buffer slice (and bound parameters) to a trusted
//! [`StructLayout`]. Member offsets are resolved strictly in declaration
//! order: fixed, sequential ("after the previous member"), or computed from
//! earlier fields and parameters. Resolution is a single forward pass that
//! keeps the values of already-placed members in a fixed-size scratch
//! ([`Pass`]), so `ok()` is linear in the member count, allocates nothing,
//! and recurses only through nesting depth.
//!
//! Validity ("ok") is strict: a broken parameter binding or an unresolvable
//! prerequisite withholds the entire dependent subtree, even when the raw
//! bytes under it happen to be well-formed. A view never reads or writes
//! outside its bound bit range `[base, limit)`.

use crate::bits;
use crate::errors::WriteError;
use crate::expr::{BinOp, Expr};
use crate::layout::{
    ArrayLayout, CountSpec, ElementLayout, MAX_FIELD_REFS, Member, MemberShape, OffsetSpec,
    ScalarLayout, StructLayout,
};
use crate::params::{MAX_PARAMS, Params};

/// Working state of one forward resolution pass over a view's members.
/// Values of members placed earlier in the pass are retained so dependent
/// expressions resolve in constant time.
#[derive(Debug, Clone, Copy)]
struct Pass {
    /// Resolved values of scalar and virtual members, by index. `None` for
    /// absent, unreadable, composite, or beyond-[`MAX_FIELD_REFS`] members.
    values: [Option<i64>; MAX_FIELD_REFS],
    /// End of the previous present member, for sequential offsets.
    cursor: u64,
    /// Members placed so far; expressions may reference only `0..next`.
    next: usize,
}

impl Pass {
    fn new() -> Self {
        Pass {
            values: [None; MAX_FIELD_REFS],
            cursor: 0,
            next: 0,
        }
    }
}

/// Resolved placement of one member, relative to the view's base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Loc {
    start_bits: u64,
    size_bits: u64,
}

/// Outcome of placing one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placed {
    /// Presence predicate evaluated to false.
    Absent,
    At(Loc),
}

/// A read-only overlay over a byte buffer. Copying is O(1) and yields an
/// independent handle aliasing the same bytes.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    layout: &'a StructLayout,
    data: &'a [u8],
    /// Absolute bit offset of this view's first bit in `data`.
    base_bits: u64,
    /// Absolute bit offset one past this view's bound range.
    limit_bits: u64,
    params: Params,
}

impl<'a> View<'a> {
    /// A view binding no parameters. If `layout` declares parameters, the
    /// resulting view reports `ok() == false` everywhere.
    pub fn new(layout: &'a StructLayout, data: &'a [u8]) -> Self {
        Self::with_params(layout, data, &[])
    }

    /// A view with runtime parameter values matching `layout.params` in
    /// order. A missing or out-of-range value withholds the whole view.
    pub fn with_params(layout: &'a StructLayout, data: &'a [u8], values: &[i64]) -> Self {
        View {
            layout,
            data,
            base_bits: 0,
            limit_bits: data.len() as u64 * 8,
            params: Params::bind(&layout.params, values),
        }
    }

    /// Like [`View::new`], asserting (in debug builds) that the buffer
    /// pointer satisfies a declared minimum alignment. Passing a misaligned
    /// buffer is a contract violation, not a data-dependent failure.
    pub fn new_aligned(layout: &'a StructLayout, data: &'a [u8], align: usize) -> Self {
        debug_assert!(
            align.is_power_of_two() && data.as_ptr().addr() % align == 0,
            "buffer does not satisfy declared alignment {align}"
        );
        Self::new(layout, data)
    }

    pub fn layout(&self) -> &'a StructLayout {
        self.layout
    }

    /// True iff the buffer covers the layout's static minimum prefix, all
    /// parameters are in range, and every required and every present
    /// conditional member is itself ok.
    pub fn ok(&self) -> bool {
        if !self.params.ok() {
            return false;
        }
        if self.avail_bits() < self.layout.static_min_bits() {
            return false;
        }
        let mut pass = Pass::new();
        for j in 0..self.layout.members.len() {
            let Some(placed) = self.step(&mut pass, j) else {
                return false;
            };
            if let Placed::At(loc) = placed {
                if !self.member_ok(&pass, j, loc) {
                    return false;
                }
            }
        }
        true
    }

    /// Total size in bytes: the furthest end offset over all present
    /// members. `None` while a prerequisite is unresolvable.
    pub fn size_in_bytes(&self) -> Option<usize> {
        self.size_bits().map(|b| b.div_ceil(8) as usize)
    }

    /// Accessor for the member named `name`.
    pub fn field(&self, name: &str) -> Option<FieldRef<'a>> {
        self.layout.member_index(name).map(|idx| self.field_at(idx))
    }

    /// Accessor for the member at `index` in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of the layout's declared member range.
    pub fn field_at(&self, index: usize) -> FieldRef<'a> {
        assert!(
            index < self.layout.members.len(),
            "member index {index} out of range"
        );
        FieldRef { view: *self, idx: index }
    }

    /// All members in declaration order, reserved regions included.
    pub fn fields(&self) -> impl Iterator<Item = FieldRef<'a>> + use<'a> {
        let view = *self;
        (0..self.layout.members.len()).map(move |idx| FieldRef { view, idx })
    }

    /// Bounds-safe value of the named field; 0 when absent or invalid.
    pub fn read(&self, name: &str) -> i64 {
        self.field(name).map_or(0, |f| f.read())
    }

    pub fn try_read(&self, name: &str) -> Option<i64> {
        self.field(name)?.try_read()
    }

    /// Presence of a conditional field; unconditional fields are present
    /// whenever their placement resolves.
    pub fn has(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.present())
    }

    pub fn enum_name(&self, name: &str) -> Option<&'a str> {
        self.field(name)?.enum_name()
    }

    fn avail_bits(&self) -> u64 {
        self.limit_bits - self.base_bits
    }

    fn size_bits(&self) -> Option<u64> {
        if !self.params.ok() {
            return None;
        }
        let mut pass = Pass::new();
        let mut end = 0u64;
        for j in 0..self.layout.members.len() {
            if let Placed::At(loc) = self.step(&mut pass, j)? {
                end = end.max(loc.start_bits + loc.size_bits);
            }
        }
        Some(end)
    }

    /// Places member `j`, which must be the next unplaced member of `pass`,
    /// and records its value for later dependent expressions. `None` when a
    /// prerequisite is unresolvable.
    fn step(&self, pass: &mut Pass, j: usize) -> Option<Placed> {
        debug_assert_eq!(j, pass.next);
        let member = &self.layout.members[j];
        let placed = 'placed: {
            if let Some(predicate) = &member.presence {
                if self.eval(pass, predicate, None)? == 0 {
                    break 'placed Placed::Absent;
                }
            }
            let start_bits = match &member.offset {
                OffsetSpec::Bits(b) => *b,
                OffsetSpec::After { gap_bits } => pass.cursor.checked_add(*gap_bits)?,
                OffsetSpec::ByteExpr(expr) => {
                    let bytes = self.eval(pass, expr, None)?;
                    if bytes < 0 {
                        return None;
                    }
                    (bytes as u64).checked_mul(8)?
                }
            };
            let size_bits = self.member_size(pass, member, start_bits)?;
            pass.cursor = start_bits.checked_add(size_bits)?;
            Placed::At(Loc { start_bits, size_bits })
        };
        if j < MAX_FIELD_REFS {
            let value = match placed {
                Placed::Absent => None,
                Placed::At(loc) => match &member.shape {
                    MemberShape::Scalar(s) => self.read_scalar(s, loc.start_bits),
                    MemberShape::Virtual(v) => self.eval(pass, &v.expr, None),
                    _ => None,
                },
            };
            pass.values[j] = value;
        }
        pass.next = j + 1;
        Some(placed)
    }

    /// Resolves members `0..=idx` in declaration order. Returns the finished
    /// pass and the placement of `idx`.
    fn resolve_to(&self, idx: usize) -> Option<(Pass, Placed)> {
        let mut pass = Pass::new();
        let mut placed = Placed::Absent;
        for j in 0..=idx {
            placed = self.step(&mut pass, j)?;
        }
        Some((pass, placed))
    }

    fn place(&self, idx: usize) -> Option<Placed> {
        self.resolve_to(idx).map(|(_, placed)| placed)
    }

    fn member_size(&self, pass: &Pass, member: &Member, start_bits: u64) -> Option<u64> {
        match &member.shape {
            MemberShape::Scalar(s) => Some(s.width_bits as u64),
            MemberShape::Virtual(_) => Some(0),
            MemberShape::Struct { layout, args } => {
                // Size of a nested struct may be data-dependent; resolve it
                // through a provisional child bounded by our own limit.
                let child = self.child_view(pass, layout, args, start_bits, self.avail_bits())?;
                child.size_bits()
            }
            MemberShape::Array(a) => {
                let count = self.array_count(pass, a, start_bits)?;
                (count as u64).checked_mul(a.stride_bits)
            }
        }
    }

    fn array_count(&self, pass: &Pass, array: &ArrayLayout, start_bits: u64) -> Option<usize> {
        match &array.count {
            CountSpec::Fixed(n) => Some(*n),
            CountSpec::Expr(expr) => {
                let n = self.eval(pass, expr, None)?;
                (n >= 0).then_some(n as usize)
            }
            CountSpec::FillToEnd => {
                if array.stride_bits == 0 {
                    return None;
                }
                let abs_start = self.base_bits.checked_add(start_bits)?;
                let room = self.limit_bits.checked_sub(abs_start)?;
                Some((room / array.stride_bits) as usize)
            }
        }
    }

    /// Builds the view for a nested struct member or array element. `None`
    /// only when the layout/arg arity disagrees; an underivable argument
    /// still constructs the child, with a withheld binding.
    fn child_view(
        &self,
        pass: &Pass,
        layout: &'a StructLayout,
        args: &[Expr],
        start_bits: u64,
        size_bits: u64,
    ) -> Option<View<'a>> {
        let base_bits = self.base_bits.checked_add(start_bits)?;
        let limit_bits = self
            .limit_bits
            .min(base_bits.checked_add(size_bits).unwrap_or(self.limit_bits));
        let params = self.bind_child_params(pass, layout, args);
        Some(View {
            layout,
            data: self.data,
            base_bits,
            limit_bits,
            params,
        })
    }

    fn bind_child_params(&self, pass: &Pass, layout: &StructLayout, args: &[Expr]) -> Params {
        if args.len() != layout.params.len() || args.len() > MAX_PARAMS {
            return Params::invalid();
        }
        let mut values = [0i64; MAX_PARAMS];
        for (slot, arg) in values.iter_mut().zip(args) {
            match self.eval(pass, arg, None) {
                Some(v) => *slot = v,
                None => return Params::invalid(),
            }
        }
        Params::bind(&layout.params, &values[..args.len()])
    }

    fn member_ok(&self, pass: &Pass, j: usize, loc: Loc) -> bool {
        if !self.params.ok() {
            return false;
        }
        let member = &self.layout.members[j];
        match &member.shape {
            MemberShape::Scalar(s) => match self.read_scalar(s, loc.start_bits) {
                Some(raw) => match &s.enums {
                    Some(table) if table.strict => table.name_of(raw).is_some(),
                    _ => true,
                },
                None => false,
            },
            MemberShape::Virtual(v) => self.eval(pass, &v.expr, None).is_some(),
            MemberShape::Struct { layout, args } => self
                .child_view(pass, layout, args, loc.start_bits, loc.size_bits)
                .is_some_and(|child| child.ok()),
            MemberShape::Array(a) => self.array_ok(pass, a, loc),
        }
    }

    fn array_ok(&self, pass: &Pass, array: &ArrayLayout, loc: Loc) -> bool {
        let Some(count) = self.array_count(pass, array, loc.start_bits) else {
            return false;
        };
        let Some(abs_start) = self.base_bits.checked_add(loc.start_bits) else {
            return false;
        };
        let Some(total) = (count as u64).checked_mul(array.stride_bits) else {
            return false;
        };
        let in_range = abs_start
            .checked_add(total)
            .is_some_and(|end| end <= self.limit_bits)
            && bits::in_bounds(self.data.len(), abs_start, total);
        if !in_range {
            return false;
        }
        match &array.element {
            ElementLayout::Scalar(s) => match &s.enums {
                Some(table) if table.strict => (0..count).all(|i| {
                    self.read_scalar(s, loc.start_bits + i as u64 * array.stride_bits)
                        .is_some_and(|raw| table.name_of(raw).is_some())
                }),
                _ => true,
            },
            ElementLayout::Struct { layout, args } => (0..count).all(|i| {
                let elem_start = loc.start_bits + i as u64 * array.stride_bits;
                self.child_view(pass, layout, args, elem_start, array.stride_bits)
                    .is_some_and(|child| child.ok())
            }),
        }
    }

    /// Raw scalar read, sign-extended when declared signed. Checks both the
    /// view's bound range and the buffer itself.
    fn read_scalar(&self, s: &ScalarLayout, start_bits: u64) -> Option<i64> {
        let abs = self.base_bits.checked_add(start_bits)?;
        let end = abs.checked_add(s.width_bits as u64)?;
        if end > self.limit_bits {
            return None;
        }
        let raw = bits::read_bits_at(self.data, abs, s.width_bits, s.byte_order).ok()?;
        Some(if s.signed {
            bits::sign_extend(raw, s.width_bits)
        } else {
            // 64-bit unsigned values above i64::MAX wrap for expression
            // purposes.
            raw as i64
        })
    }

    /// Value of member `idx` (scalar or virtual), gated on the whole
    /// dependency chain.
    fn field_value(&self, idx: usize) -> Option<i64> {
        if !self.params.ok() {
            return None;
        }
        let (pass, placed) = self.resolve_to(idx)?;
        let Placed::At(loc) = placed else {
            return None;
        };
        match &self.layout.members[idx].shape {
            MemberShape::Scalar(s) => self.read_scalar(s, loc.start_bits),
            MemberShape::Virtual(v) => self.eval(&pass, &v.expr, None),
            _ => None,
        }
    }

    /// Total evaluation over values already resolved in `pass`. `Field` may
    /// only reference placed members, so evaluation never recurses into
    /// placement, even for hand-built (trusted) layouts with cyclic
    /// references.
    fn eval(&self, pass: &Pass, expr: &Expr, input: Option<i64>) -> Option<i64> {
        match expr {
            Expr::Const(v) => Some(*v),
            Expr::Param(i) => {
                if !self.params.ok() {
                    return None;
                }
                self.params.get(*i)
            }
            Expr::Field(i) => {
                if *i >= pass.next || *i >= MAX_FIELD_REFS {
                    return None;
                }
                pass.values[*i]
            }
            Expr::Input => input,
            Expr::Not(inner) => Some((self.eval(pass, inner, input)? == 0) as i64),
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(pass, lhs, input)?;
                let b = self.eval(pass, rhs, input)?;
                match op {
                    BinOp::Add => a.checked_add(b),
                    BinOp::Sub => a.checked_sub(b),
                    BinOp::Mul => a.checked_mul(b),
                    BinOp::Div => a.checked_div(b),
                    BinOp::Eq => Some((a == b) as i64),
                    BinOp::Ne => Some((a != b) as i64),
                    BinOp::Lt => Some((a < b) as i64),
                    BinOp::Le => Some((a <= b) as i64),
                    BinOp::Gt => Some((a > b) as i64),
                    BinOp::Ge => Some((a >= b) as i64),
                    BinOp::And => Some((a != 0 && b != 0) as i64),
                    BinOp::Or => Some((a != 0 || b != 0) as i64),
                }
            }
        }
    }
}

/// Accessor for a single member of a [`View`].
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    view: View<'a>,
    idx: usize,
}

impl<'a> FieldRef<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.member().name.as_deref()
    }

    /// The member's layout descriptor.
    pub fn member(&self) -> &'a Member {
        &self.view.layout.members[self.idx]
    }

    /// True when the presence predicate holds (or none is declared) and the
    /// member's placement resolves.
    pub fn present(&self) -> bool {
        matches!(self.view.place(self.idx), Some(Placed::At(_)))
    }

    /// True iff the member's bytes are in bounds, its dependency and
    /// parameter chain is intact, and (for strict enum fields) the raw value
    /// maps to a known name. Composites recurse, bounded by nesting depth.
    pub fn ok(&self) -> bool {
        if !self.view.params.ok() {
            return false;
        }
        match self.view.resolve_to(self.idx) {
            Some((pass, Placed::At(loc))) => self.view.member_ok(&pass, self.idx, loc),
            _ => false,
        }
    }

    /// Bounds-safe read: the field's value, or 0 when the field is absent,
    /// out of bounds, or withheld. Never touches memory past the buffer.
    pub fn read(&self) -> i64 {
        self.try_read().unwrap_or(0)
    }

    pub fn try_read(&self) -> Option<i64> {
        self.view.field_value(self.idx)
    }

    /// Symbolic name of the current value for enum-typed fields.
    pub fn enum_name(&self) -> Option<&'a str> {
        let MemberShape::Scalar(s) = &self.member().shape else {
            return None;
        };
        let table = s.enums.as_ref()?;
        table.name_of(self.try_read()?)
    }

    /// Nested struct view. The child is constructed even when its parameter
    /// chain is broken, in which case it reports `ok() == false` throughout.
    pub fn as_struct(&self) -> Option<View<'a>> {
        let layout_ref = self.view.layout;
        let MemberShape::Struct { layout, args } = &layout_ref.members[self.idx].shape else {
            return None;
        };
        match self.view.resolve_to(self.idx) {
            Some((pass, Placed::At(loc))) => {
                self.view
                    .child_view(&pass, layout, args, loc.start_bits, loc.size_bits)
            }
            _ => Some(View {
                layout,
                data: self.view.data,
                base_bits: self.view.base_bits,
                limit_bits: self.view.base_bits,
                params: Params::invalid(),
            }),
        }
    }

    pub fn as_array(&self) -> Option<ArrayRef<'a>> {
        let MemberShape::Array(_) = &self.member().shape else {
            return None;
        };
        match self.view.resolve_to(self.idx) {
            Some((pass, Placed::At(loc))) => {
                let array = self.array_layout();
                let count = self.view.array_count(&pass, array, loc.start_bits);
                Some(ArrayRef {
                    view: self.view,
                    idx: self.idx,
                    start_bits: loc.start_bits,
                    count,
                })
            }
            _ => Some(ArrayRef {
                view: self.view,
                idx: self.idx,
                start_bits: 0,
                count: None,
            }),
        }
    }

    fn array_layout(&self) -> &'a ArrayLayout {
        match &self.view.layout.members[self.idx].shape {
            MemberShape::Array(a) => a,
            _ => unreachable!("checked by caller"),
        }
    }
}

/// Accessor for a homogeneous array member. Element offsets are O(1)
/// arithmetic over the declared stride.
#[derive(Debug, Clone, Copy)]
pub struct ArrayRef<'a> {
    view: View<'a>,
    idx: usize,
    start_bits: u64,
    count: Option<usize>,
}

impl<'a> ArrayRef<'a> {
    /// Element count; `None` while the count expression or the array's
    /// placement is unresolvable.
    pub fn len(&self) -> Option<usize> {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == Some(0)
    }

    pub fn element_layout(&self) -> &'a ElementLayout {
        match &self.view.layout.members[self.idx].shape {
            MemberShape::Array(a) => &a.element,
            _ => unreachable!("ArrayRef only wraps array members"),
        }
    }

    /// Bounds-safe scalar element read; 0 when the element is invalid.
    ///
    /// # Panics
    ///
    /// Panics when `i` is outside the resolved element count: indexing past
    /// the declared range is a contract violation, not a data-dependent
    /// failure.
    pub fn read(&self, i: usize) -> i64 {
        self.check_index(i);
        self.try_read(i).unwrap_or(0)
    }

    pub fn try_read(&self, i: usize) -> Option<i64> {
        self.check_index(i);
        if !self.view.params.ok() {
            return None;
        }
        self.count?;
        let ElementLayout::Scalar(s) = self.element_layout() else {
            return None;
        };
        let stride = self.stride_bits();
        self.view
            .read_scalar(s, self.start_bits + i as u64 * stride)
    }

    /// Symbolic name of a scalar element's value, for enum-typed elements.
    pub fn enum_name(&self, i: usize) -> Option<&'a str> {
        let ElementLayout::Scalar(s) = self.element_layout() else {
            return None;
        };
        let table = s.enums.as_ref()?;
        let value = self.try_read(i)?;
        table.name_of(value)
    }

    /// Nested view of a struct element.
    pub fn element(&self, i: usize) -> Option<View<'a>> {
        self.check_index(i);
        self.count?;
        let ElementLayout::Struct { layout, args } = self.element_layout() else {
            return None;
        };
        let stride = self.stride_bits();
        let (pass, _) = self.view.resolve_to(self.idx)?;
        self.view.child_view(
            &pass,
            layout,
            args,
            self.start_bits + i as u64 * stride,
            stride,
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + use<'a> {
        let this = *self;
        (0..this.count.unwrap_or(0)).map(move |i| this.read(i))
    }

    fn stride_bits(&self) -> u64 {
        match &self.view.layout.members[self.idx].shape {
            MemberShape::Array(a) => a.stride_bits,
            _ => unreachable!("ArrayRef only wraps array members"),
        }
    }

    fn check_index(&self, i: usize) {
        if let Some(count) = self.count {
            assert!(i < count, "array index {i} out of range (len {count})");
        }
    }
}

/// A write-capable view over a mutable byte buffer. Reads go through
/// [`ViewMut::as_view`]; writes are refused unless the computed location is
/// fully inside the bound range, the member is present, and its parameter
/// chain is intact.
#[derive(Debug)]
pub struct ViewMut<'a> {
    layout: &'a StructLayout,
    data: &'a mut [u8],
    base_bits: u64,
    limit_bits: u64,
    params: Params,
}

impl<'a> ViewMut<'a> {
    pub fn new(layout: &'a StructLayout, data: &'a mut [u8]) -> Self {
        Self::with_params(layout, data, &[])
    }

    pub fn with_params(layout: &'a StructLayout, data: &'a mut [u8], values: &[i64]) -> Self {
        let limit_bits = data.len() as u64 * 8;
        ViewMut {
            layout,
            data,
            base_bits: 0,
            limit_bits,
            params: Params::bind(&layout.params, values),
        }
    }

    /// Like [`ViewMut::new`], asserting (in debug builds) that the buffer
    /// pointer satisfies a declared minimum alignment. Passing a misaligned
    /// buffer is a contract violation, not a data-dependent failure.
    pub fn new_aligned(layout: &'a StructLayout, data: &'a mut [u8], align: usize) -> Self {
        debug_assert!(
            align.is_power_of_two() && data.as_ptr().addr() % align == 0,
            "buffer does not satisfy declared alignment {align}"
        );
        Self::new(layout, data)
    }

    pub fn layout(&self) -> &'a StructLayout {
        self.layout
    }

    /// Read-only twin sharing the same placement and validity rules.
    pub fn as_view(&self) -> View<'_> {
        View {
            layout: self.layout,
            data: self.data,
            base_bits: self.base_bits,
            limit_bits: self.limit_bits,
            params: self.params,
        }
    }

    pub fn ok(&self) -> bool {
        self.as_view().ok()
    }

    pub fn size_in_bytes(&self) -> Option<usize> {
        self.as_view().size_in_bytes()
    }

    /// Writes a scalar or writable virtual field. Values wider than the
    /// field truncate to its low bits; negative values store their two's
    /// complement pattern.
    pub fn write(&mut self, name: &str, value: i64) -> Result<(), WriteError> {
        let idx = self
            .layout
            .member_index(name)
            .ok_or_else(|| WriteError::UnknownField(name.to_string()))?;
        self.write_at(idx, value)
    }

    /// Writes the member at `idx`. Virtual fields back-solve through their
    /// declared inverse and store into the underlying raw field.
    pub fn write_at(&mut self, idx: usize, value: i64) -> Result<(), WriteError> {
        if !self.params.ok() {
            return Err(WriteError::Withheld);
        }
        enum Target {
            Store { abs: u64, width: usize, order: crate::layout::ByteOrder },
            Forward { field: usize, raw: i64 },
        }
        let target = {
            let view = self.as_view();
            let (pass, placed) = match view.resolve_to(idx) {
                None => return Err(WriteError::Withheld),
                Some(resolved) => resolved,
            };
            let loc = match placed {
                Placed::Absent => return Err(WriteError::NotPresent),
                Placed::At(loc) => loc,
            };
            match &self.layout.members[idx].shape {
                MemberShape::Scalar(s) => {
                    let abs = view
                        .base_bits
                        .checked_add(loc.start_bits)
                        .ok_or(WriteError::OutOfBounds)?;
                    let end = abs
                        .checked_add(s.width_bits as u64)
                        .ok_or(WriteError::OutOfBounds)?;
                    if end > view.limit_bits {
                        return Err(WriteError::OutOfBounds);
                    }
                    Target::Store {
                        abs,
                        width: s.width_bits,
                        order: s.byte_order,
                    }
                }
                MemberShape::Virtual(v) => {
                    let store = v.store.as_ref().ok_or(WriteError::NotWritable)?;
                    let raw = view
                        .eval(&pass, &store.inverse, Some(value))
                        .ok_or(WriteError::NotWritable)?;
                    Target::Forward { field: store.field, raw }
                }
                _ => return Err(WriteError::NotWritable),
            }
        };
        match target {
            // Store targets are strictly earlier members, so this recursion
            // terminates.
            Target::Forward { field, raw } => self.write_at(field, raw),
            Target::Store { abs, width, order } => {
                bits::write_bits_at(self.data, abs, width, order, value as u64)
            }
        }
    }

    /// Writes one scalar element of the named array. An index at or past
    /// the resolved count is refused as out of bounds.
    pub fn write_element(&mut self, name: &str, i: usize, value: i64) -> Result<(), WriteError> {
        if !self.params.ok() {
            return Err(WriteError::Withheld);
        }
        let layout_ref = self.layout;
        let idx = layout_ref
            .member_index(name)
            .ok_or_else(|| WriteError::UnknownField(name.to_string()))?;
        let MemberShape::Array(array) = &layout_ref.members[idx].shape else {
            return Err(WriteError::NotWritable);
        };
        let ElementLayout::Scalar(s) = &array.element else {
            return Err(WriteError::NotWritable);
        };
        let abs = {
            let view = self.as_view();
            let (pass, placed) = match view.resolve_to(idx) {
                None => return Err(WriteError::Withheld),
                Some(resolved) => resolved,
            };
            let loc = match placed {
                Placed::Absent => return Err(WriteError::NotPresent),
                Placed::At(loc) => loc,
            };
            let count = view
                .array_count(&pass, array, loc.start_bits)
                .ok_or(WriteError::Withheld)?;
            if i >= count {
                return Err(WriteError::OutOfBounds);
            }
            let abs = view
                .base_bits
                .checked_add(loc.start_bits + i as u64 * array.stride_bits)
                .ok_or(WriteError::OutOfBounds)?;
            let end = abs
                .checked_add(s.width_bits as u64)
                .ok_or(WriteError::OutOfBounds)?;
            if end > view.limit_bits {
                return Err(WriteError::OutOfBounds);
            }
            abs
        };
        bits::write_bits_at(self.data, abs, s.width_bits, s.byte_order, value as u64)
    }

    /// Mutable view of a nested struct member.
    pub fn child_mut(&mut self, name: &str) -> Result<ViewMut<'_>, WriteError> {
        let layout_ref = self.layout;
        let idx = layout_ref
            .member_index(name)
            .ok_or_else(|| WriteError::UnknownField(name.to_string()))?;
        let MemberShape::Struct { layout, args } = &layout_ref.members[idx].shape else {
            return Err(WriteError::NotWritable);
        };
        let (base_bits, limit_bits, params) = {
            let view = self.as_view();
            let (pass, placed) = match view.resolve_to(idx) {
                None => return Err(WriteError::Withheld),
                Some(resolved) => resolved,
            };
            let loc = match placed {
                Placed::Absent => return Err(WriteError::NotPresent),
                Placed::At(loc) => loc,
            };
            let child = view
                .child_view(&pass, layout, args, loc.start_bits, loc.size_bits)
                .ok_or(WriteError::Withheld)?;
            (child.base_bits, child.limit_bits, child.params)
        };
        Ok(ViewMut {
            layout,
            data: &mut *self.data,
            base_bits,
            limit_bits,
            params,
        })
    }

    /// Mutable view of one struct element of the named array.
    pub fn element_mut(&mut self, name: &str, i: usize) -> Result<ViewMut<'_>, WriteError> {
        let layout_ref = self.layout;
        let idx = layout_ref
            .member_index(name)
            .ok_or_else(|| WriteError::UnknownField(name.to_string()))?;
        let MemberShape::Array(array) = &layout_ref.members[idx].shape else {
            return Err(WriteError::NotWritable);
        };
        let ElementLayout::Struct { layout, args } = &array.element else {
            return Err(WriteError::NotWritable);
        };
        let (base_bits, limit_bits, params) = {
            let view = self.as_view();
            let (pass, placed) = match view.resolve_to(idx) {
                None => return Err(WriteError::Withheld),
                Some(resolved) => resolved,
            };
            let loc = match placed {
                Placed::Absent => return Err(WriteError::NotPresent),
                Placed::At(loc) => loc,
            };
            let count = view
                .array_count(&pass, array, loc.start_bits)
                .ok_or(WriteError::Withheld)?;
            if i >= count {
                return Err(WriteError::OutOfBounds);
            }
            let elem_start = loc.start_bits + i as u64 * array.stride_bits;
            let child = view
                .child_view(&pass, layout, args, elem_start, array.stride_bits)
                .ok_or(WriteError::Withheld)?;
            (child.base_bits, child.limit_bits, child.params)
        };
        Ok(ViewMut {
            layout,
            data: &mut *self.data,
            base_bits,
            limit_bits,
            params,
        })
    }
}
