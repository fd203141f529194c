use crate::{
    db::query::expr::{DetailExpr, Expr},
    traits::{FieldValue, Model},
    types::{Guid, Timestamp},
    value::Value,
};
use std::{fmt, marker::PhantomData};

///
/// Prop
///
/// Typed handle on a scalar property of `T` holding `V`. A prop reached
/// through lookups (`Lookup::then`) carries the whole path.
///

pub struct Prop<T, V> {
    path: Vec<&'static str>,
    _marker: PhantomData<fn() -> (T, V)>,
}

impl<T, V> Prop<T, V> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            path: vec![name],
            _marker: PhantomData,
        }
    }

    /// Final property name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.path.last().copied().unwrap_or_default()
    }

    /// Full property path from `T`.
    #[must_use]
    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::Member(self.path.iter().map(ToString::to_string).collect())
    }
}

impl<T: Model, V: FieldValue> Prop<T, V> {
    fn with(&self, value: impl Into<V>) -> Value {
        value.into().to_value()
    }

    #[must_use]
    pub fn eq(&self, value: impl Into<V>) -> Expr {
        self.expr().eq(self.with(value))
    }

    #[must_use]
    pub fn ne(&self, value: impl Into<V>) -> Expr {
        self.expr().ne(self.with(value))
    }

    #[must_use]
    pub fn lt(&self, value: impl Into<V>) -> Expr {
        self.expr().lt(self.with(value))
    }

    #[must_use]
    pub fn lte(&self, value: impl Into<V>) -> Expr {
        self.expr().lte(self.with(value))
    }

    #[must_use]
    pub fn gt(&self, value: impl Into<V>) -> Expr {
        self.expr().gt(self.with(value))
    }

    #[must_use]
    pub fn gte(&self, value: impl Into<V>) -> Expr {
        self.expr().gte(self.with(value))
    }

    #[must_use]
    pub fn is_null(&self) -> Expr {
        self.expr().is_null()
    }

    #[must_use]
    pub fn is_not_null(&self) -> Expr {
        self.expr().is_not_null()
    }

    /// Compare against another property of the same model and type.
    #[must_use]
    pub fn eq_prop(&self, other: &Self) -> Expr {
        self.expr().eq(other.expr())
    }

    #[must_use]
    pub fn in_list<I>(&self, values: I) -> Expr
    where
        I: IntoIterator,
        I::Item: Into<V>,
    {
        self.expr()
            .in_list(values.into_iter().map(|v| v.into().to_value()))
    }
}

impl<T: Model> Prop<T, String> {
    #[must_use]
    pub fn starts_with(&self, pattern: &str) -> Expr {
        self.expr().starts_with(pattern)
    }

    #[must_use]
    pub fn ends_with(&self, pattern: &str) -> Expr {
        self.expr().ends_with(pattern)
    }

    #[must_use]
    pub fn contains(&self, pattern: &str) -> Expr {
        self.expr().contains(pattern)
    }
}

impl<T: Model> Prop<T, Timestamp> {
    #[must_use]
    pub fn year(&self) -> Expr {
        self.expr().year()
    }

    #[must_use]
    pub fn month(&self) -> Expr {
        self.expr().month()
    }

    #[must_use]
    pub fn day(&self) -> Expr {
        self.expr().day()
    }

    #[must_use]
    pub fn hour(&self) -> Expr {
        self.expr().hour()
    }
}

impl<T, V> Clone for Prop<T, V> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, V> fmt::Debug for Prop<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Prop").field(&self.path.join(".")).finish()
    }
}

impl<T, V> From<Prop<T, V>> for Expr {
    fn from(p: Prop<T, V>) -> Self {
        p.expr()
    }
}

impl<T, V> From<&Prop<T, V>> for Expr {
    fn from(p: &Prop<T, V>) -> Self {
        p.expr()
    }
}

///
/// Lookup
/// Typed handle on a lookup from `T` to `U`.
///

pub struct Lookup<T, U> {
    path: Vec<&'static str>,
    _marker: PhantomData<fn() -> (T, U)>,
}

impl<T, U> Lookup<T, U> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            path: vec![name],
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.path.last().copied().unwrap_or_default()
    }

    #[must_use]
    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    /// The lookup's key column as an expression.
    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::Member(self.path.iter().map(ToString::to_string).collect())
    }

    /// Navigate to a property of the referenced model.
    #[must_use]
    pub fn then<V>(&self, prop: &Prop<U, V>) -> Prop<T, V> {
        Prop {
            path: self.path.iter().chain(prop.path.iter()).copied().collect(),
            _marker: PhantomData,
        }
    }

    /// Navigate through a further lookup of the referenced model.
    #[must_use]
    pub fn then_lookup<W>(&self, lookup: &Lookup<U, W>) -> Lookup<T, W> {
        Lookup {
            path: self.path.iter().chain(lookup.path.iter()).copied().collect(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn eq(&self, key: Guid) -> Expr {
        self.expr().eq(key)
    }

    #[must_use]
    pub fn is_null(&self) -> Expr {
        self.expr().is_null()
    }

    #[must_use]
    pub fn is_not_null(&self) -> Expr {
        self.expr().is_not_null()
    }
}

impl<T, U> Clone for Lookup<T, U> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, U> fmt::Debug for Lookup<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lookup").field(&self.path.join(".")).finish()
    }
}

///
/// Detail
/// Typed handle on a detail collection of `U` under `T`.
///

pub struct Detail<T, U> {
    name: &'static str,
    _marker: PhantomData<fn() -> (T, U)>,
}

impl<T, U> Detail<T, U> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Start an untyped sub-chain.
    #[must_use]
    pub fn chain(&self) -> DetailExpr {
        super::detail(self.name)
    }

    #[must_use]
    pub fn filter(&self, predicate: impl Into<Expr>) -> DetailExpr {
        self.chain().filter(predicate)
    }

    #[must_use]
    pub fn any(&self) -> Expr {
        self.chain().any()
    }

    #[must_use]
    pub fn any_where(&self, predicate: impl Into<Expr>) -> Expr {
        self.chain().any_where(predicate)
    }

    #[must_use]
    pub fn count(&self) -> Expr {
        self.chain().count()
    }

    #[must_use]
    pub fn count_where(&self, predicate: impl Into<Expr>) -> Expr {
        self.chain().count_where(predicate)
    }

    #[must_use]
    pub fn sum<V>(&self, prop: &Prop<U, V>) -> Expr {
        self.chain().sum(prop)
    }

    #[must_use]
    pub fn min<V>(&self, prop: &Prop<U, V>) -> Expr {
        self.chain().min(prop)
    }

    #[must_use]
    pub fn max<V>(&self, prop: &Prop<U, V>) -> Expr {
        self.chain().max(prop)
    }

    #[must_use]
    pub fn average<V>(&self, prop: &Prop<U, V>) -> Expr {
        self.chain().average(prop)
    }
}

impl<T, U> Clone for Detail<T, U> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, U> Copy for Detail<T, U> {}

impl<T, U> fmt::Debug for Detail<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Detail").field(&self.name).finish()
    }
}
