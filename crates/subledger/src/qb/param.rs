//! Bound values and their positional numbering.

use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// One value bound to a `$n` placeholder.
///
/// Shared behind an `Arc` so filters and patches can be cloned and re-rendered without
/// copying service names.
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// The value as tokio-postgres expects it in a parameter slice.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `ToSql: Debug`, so SQL traces and test assertions see the actual value.
        f.debug_tuple("Param").field(&self.0).finish()
    }
}

/// Values in binding order.
///
/// `push` returns the placeholder number the value binds to. A list created with
/// [`ParamList::after`] numbers its values after `offset` parameters owned by an
/// enclosing statement, so fragments can be rendered before they are spliced in.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    offset: usize,
    params: Vec<Param>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty list whose first value binds to `$offset + 1`.
    pub fn after(offset: usize) -> Self {
        Self {
            offset,
            params: Vec::new(),
        }
    }

    /// Bind `value`; returns its placeholder number.
    pub fn push<T: ToSql + Send + Sync + 'static>(&mut self, value: T) -> usize {
        self.push_param(Param::new(value))
    }

    /// Bind an already wrapped value; returns its placeholder number.
    pub fn push_param(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.offset + self.params.len()
    }

    /// Number of values held by this list (the offset is not counted).
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Borrow every value for `execute`/`query`.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(Param::as_ref).collect()
    }
}
