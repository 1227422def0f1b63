//! Runtime parameter declarations and bindings.
//!
//! A parameter binding is fixed at view construction and never mutated,
//! so the same buffer can be viewed with different bindings side by side.
//! An invalid binding (arity mismatch, out-of-range value, underivable
//! child argument) withholds the entire dependent subtree: every field
//! inside reports `ok() == false` regardless of the underlying bytes.

/// Most parameters a single view can bind. Small and fixed so that bindings
/// (and therefore views) stay `Copy` and allocation-free.
pub const MAX_PARAMS: usize = 8;

/// A declared parameter: name plus inclusive admissible range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub min: i64,
    pub max: i64,
}

impl ParamSpec {
    pub fn new(name: &str, min: i64, max: i64) -> Self {
        ParamSpec {
            name: name.to_string(),
            min,
            max,
        }
    }

    /// A parameter admitting any value.
    pub fn any(name: &str) -> Self {
        Self::new(name, i64::MIN, i64::MAX)
    }

    pub fn admits(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Values bound to a view's declared parameters, plus a validity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    values: [i64; MAX_PARAMS],
    len: u8,
    ok: bool,
}

impl Params {
    /// A valid, empty binding (for layouts declaring no parameters).
    pub const EMPTY: Params = Params {
        values: [0; MAX_PARAMS],
        len: 0,
        ok: true,
    };

    /// Binds `values` against `specs`. The binding is invalid when the
    /// arity does not match or any value falls outside its declared range;
    /// the values are still retained so diagnostics can inspect them.
    pub fn bind(specs: &[ParamSpec], values: &[i64]) -> Params {
        let mut p = Params {
            values: [0; MAX_PARAMS],
            len: values.len().min(MAX_PARAMS) as u8,
            ok: specs.len() == values.len() && specs.len() <= MAX_PARAMS,
        };
        for (slot, value) in p.values.iter_mut().zip(values) {
            *slot = *value;
        }
        if p.ok {
            p.ok = specs.iter().zip(values).all(|(s, v)| s.admits(*v));
        }
        p
    }

    /// A binding known to be broken (e.g. a child argument could not be
    /// derived because its source field is itself invalid).
    pub(crate) fn invalid() -> Params {
        Params {
            values: [0; MAX_PARAMS],
            len: 0,
            ok: false,
        }
    }

    /// True iff the binding satisfies every declared range.
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bound value at `index`, whether or not the binding is valid.
    pub fn get(&self, index: usize) -> Option<i64> {
        (index < self.len()).then(|| self.values[index])
    }
}
