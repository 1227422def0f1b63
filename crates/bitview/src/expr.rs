//! Dependency expressions over sibling fields and bound parameters.
//!
//! Expressions drive presence predicates, data-dependent offsets and array
//! counts, virtual field values, and virtual write inverses. Evaluation is
//! total: a broken dependency (invalid field, unbound parameter, division by
//! zero, overflow) yields no value, which the view layer propagates as
//! invalidity. Evaluation itself lives in [`crate::view`].

/// A pure integer expression. Comparisons and logic evaluate to 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A constant.
    Const(i64),
    /// Index into the view's bound parameters.
    Param(usize),
    /// Value of a strictly earlier scalar or virtual member in the same
    /// struct, sign-extended when the member is declared signed.
    Field(usize),
    /// The incoming value being written. Only meaningful inside a
    /// [`crate::layout::VirtualStore`] inverse.
    Input,
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Logical negation: nonzero becomes 0, zero becomes 1.
    Not(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
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

impl Expr {
    pub fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// Calls `f` on this node and every descendant.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Binary(_, lhs, rhs) => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Not(inner) => inner.visit(f),
            _ => {}
        }
    }

    /// True iff the expression contains an [`Expr::Input`] node.
    pub fn uses_input(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Input));
        found
    }
}
