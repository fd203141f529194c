//! Host-facing expression trees.
//!
//! An `Expr` is untyped: member paths are plain property names, resolved
//! against a model schema only when the expression is compiled. The typed
//! handles in [`typed`] build the same trees with compile-time checks.

mod typed;

#[cfg(test)]
mod tests;

use crate::{
    types::{Decimal, Guid, Timestamp},
    value::Value,
};
use std::{fmt, ops};

// re-exports
pub use typed::{Detail, Lookup, Prop};

///
/// CompareOp
/// Host-level binary comparison.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

///
/// Method
/// Recognized method calls; anything else is kept by name and rejected
/// at compile time.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    StartsWith,
    EndsWith,
    Contains,
    Year,
    Month,
    Day,
    Hour,
    Other(String),
}

impl Method {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "contains" => Self::Contains,
            "year" => Self::Year,
            "month" => Self::Month,
            "day" => Self::Day,
            "hour" => Self::Hour,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Contains => "contains",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Other(name) => name,
        }
    }
}

///
/// DetailCall
/// One link of a detail sub-chain; terminals pick the aggregation.
///

#[derive(Clone, Debug, PartialEq)]
pub enum DetailCall {
    Where(Expr),
    OrderBy(Expr),
    Any(Option<Expr>),
    Count(Option<Expr>),
    Sum(Expr),
    Min(Expr),
    Max(Expr),
    Average(Expr),
    First(Option<Expr>),
}

impl DetailCall {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Where(_) => "where",
            Self::OrderBy(_) => "order_by",
            Self::Any(_) => "any",
            Self::Count(_) => "count",
            Self::Sum(_) => "sum",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Average(_) => "average",
            Self::First(_) => "first",
        }
    }
}

///
/// Expr
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Property path from the model parameter, e.g. `["Account", "Name"]`.
    Member(Vec<String>),
    Const(Value),
    List(Vec<Value>),
    Compare {
        op: CompareOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    And(Box<Self>, Box<Self>),
    Or(Box<Self>, Box<Self>),
    Not(Box<Self>),
    Call {
        target: Box<Self>,
        method: Method,
        args: Vec<Self>,
    },
    Detail {
        path: Vec<String>,
        chain: Vec<DetailCall>,
    },
}

/// Member access by dotted property path.
#[must_use]
pub fn col(path: &str) -> Expr {
    Expr::Member(path.split('.').map(str::to_string).collect())
}

/// Constant value.
#[must_use]
pub fn val(value: impl Into<Value>) -> Expr {
    Expr::Const(value.into())
}

/// Captured list of constants, for `list(..).contains(col(..))`.
#[must_use]
pub fn list<I, V>(values: I) -> Expr
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Expr::List(values.into_iter().map(Into::into).collect())
}

/// Start a detail sub-chain on the dotted detail property path.
#[must_use]
pub fn detail(path: &str) -> DetailExpr {
    DetailExpr {
        path: path.split('.').map(str::to_string).collect(),
        chain: Vec::new(),
    }
}

impl Expr {
    fn compare(self, op: CompareOp, right: impl Into<Self>) -> Self {
        Self::Compare {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    fn method(self, method: Method, args: Vec<Self>) -> Self {
        Self::Call {
            target: Box::new(self),
            method,
            args,
        }
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    #[must_use]
    pub fn eq(self, right: impl Into<Self>) -> Self {
        self.compare(CompareOp::Eq, right)
    }

    #[must_use]
    pub fn ne(self, right: impl Into<Self>) -> Self {
        self.compare(CompareOp::Ne, right)
    }

    #[must_use]
    pub fn lt(self, right: impl Into<Self>) -> Self {
        self.compare(CompareOp::Lt, right)
    }

    #[must_use]
    pub fn lte(self, right: impl Into<Self>) -> Self {
        self.compare(CompareOp::Lte, right)
    }

    #[must_use]
    pub fn gt(self, right: impl Into<Self>) -> Self {
        self.compare(CompareOp::Gt, right)
    }

    #[must_use]
    pub fn gte(self, right: impl Into<Self>) -> Self {
        self.compare(CompareOp::Gte, right)
    }

    #[must_use]
    pub fn is_null(self) -> Self {
        self.eq(Value::Null)
    }

    #[must_use]
    pub fn is_not_null(self) -> Self {
        self.ne(Value::Null)
    }

    /// Membership in a fixed list; sugar for `list(values).contains(self)`.
    #[must_use]
    pub fn in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        list(values).contains(self)
    }

    // ------------------------------------------------------------------
    // Logical
    // ------------------------------------------------------------------

    #[must_use]
    pub fn and(self, right: impl Into<Self>) -> Self {
        Self::And(Box::new(self), Box::new(right.into()))
    }

    #[must_use]
    pub fn or(self, right: impl Into<Self>) -> Self {
        Self::Or(Box::new(self), Box::new(right.into()))
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    // ------------------------------------------------------------------
    // Methods
    // ------------------------------------------------------------------

    #[must_use]
    pub fn starts_with(self, pattern: impl Into<Self>) -> Self {
        self.method(Method::StartsWith, vec![pattern.into()])
    }

    #[must_use]
    pub fn ends_with(self, pattern: impl Into<Self>) -> Self {
        self.method(Method::EndsWith, vec![pattern.into()])
    }

    /// Substring match on text, or membership when `self` is a list.
    #[must_use]
    pub fn contains(self, arg: impl Into<Self>) -> Self {
        self.method(Method::Contains, vec![arg.into()])
    }

    #[must_use]
    pub fn year(self) -> Self {
        self.method(Method::Year, Vec::new())
    }

    #[must_use]
    pub fn month(self) -> Self {
        self.method(Method::Month, Vec::new())
    }

    #[must_use]
    pub fn day(self) -> Self {
        self.method(Method::Day, Vec::new())
    }

    #[must_use]
    pub fn hour(self) -> Self {
        self.method(Method::Hour, Vec::new())
    }

    /// Call a method by name.
    #[must_use]
    pub fn call(self, name: &str, args: Vec<Self>) -> Self {
        self.method(Method::from_name(name), args)
    }

    /// True when the expression references the model parameter.
    #[must_use]
    pub fn is_open(&self) -> bool {
        match self {
            Self::Member(_) | Self::Detail { .. } => true,
            Self::Const(_) | Self::List(_) => false,
            Self::Compare { left, right, .. } | Self::And(left, right) | Self::Or(left, right) => {
                left.is_open() || right.is_open()
            }
            Self::Not(inner) => inner.is_open(),
            Self::Call { target, args, .. } => target.is_open() || args.iter().any(Self::is_open),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(path) => write!(f, "x.{}", path.join(".")),
            Self::Const(v) => write!(f, "{v}"),
            Self::List(values) => {
                let items: Vec<_> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Compare { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Self::And(l, r) => write!(f, "({l} && {r})"),
            Self::Or(l, r) => write!(f, "({l} || {r})"),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::Call {
                target,
                method,
                args,
            } => {
                let args: Vec<_> = args.iter().map(ToString::to_string).collect();
                write!(f, "{target}.{}({})", method.name(), args.join(", "))
            }
            Self::Detail { path, chain } => {
                write!(f, "x.{}", path.join("."))?;
                for call in chain {
                    write!(f, ".{}(..)", call.name())?;
                }
                Ok(())
            }
        }
    }
}

impl ops::BitAnd for Expr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl ops::BitOr for Expr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

impl ops::Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

macro_rules! impl_expr_from_const {
    ( $( $ty:ty ),* $(,)? ) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Self::Const(Value::from(v))
                }
            }
        )*
    };
}

impl_expr_from_const!(bool, i32, i64, &str, String, Decimal, Guid, Timestamp);

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Self::Const(v)
    }
}

///
/// DetailExpr
///
/// Detail sub-chain under construction. Filters accumulate; a terminal
/// (`any`, `count`, `sum`, ...) closes the chain into an `Expr`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct DetailExpr {
    path: Vec<String>,
    chain: Vec<DetailCall>,
}

impl DetailExpr {
    fn push(mut self, call: DetailCall) -> Self {
        self.chain.push(call);
        self
    }

    fn close(self, call: DetailCall) -> Expr {
        let Self { path, mut chain } = self;
        chain.push(call);

        Expr::Detail { path, chain }
    }

    #[must_use]
    pub fn filter(self, predicate: impl Into<Expr>) -> Self {
        self.push(DetailCall::Where(predicate.into()))
    }

    #[must_use]
    pub fn order_by(self, key: impl Into<Expr>) -> Self {
        self.push(DetailCall::OrderBy(key.into()))
    }

    #[must_use]
    pub fn any(self) -> Expr {
        self.close(DetailCall::Any(None))
    }

    #[must_use]
    pub fn any_where(self, predicate: impl Into<Expr>) -> Expr {
        self.close(DetailCall::Any(Some(predicate.into())))
    }

    #[must_use]
    pub fn count(self) -> Expr {
        self.close(DetailCall::Count(None))
    }

    #[must_use]
    pub fn count_where(self, predicate: impl Into<Expr>) -> Expr {
        self.close(DetailCall::Count(Some(predicate.into())))
    }

    #[must_use]
    pub fn sum(self, column: impl Into<Expr>) -> Expr {
        self.close(DetailCall::Sum(column.into()))
    }

    #[must_use]
    pub fn min(self, column: impl Into<Expr>) -> Expr {
        self.close(DetailCall::Min(column.into()))
    }

    #[must_use]
    pub fn max(self, column: impl Into<Expr>) -> Expr {
        self.close(DetailCall::Max(column.into()))
    }

    #[must_use]
    pub fn average(self, column: impl Into<Expr>) -> Expr {
        self.close(DetailCall::Average(column.into()))
    }

    #[must_use]
    pub fn first(self) -> Expr {
        self.close(DetailCall::First(None))
    }
}

/// An unterminated chain; rejected when compiled.
impl From<DetailExpr> for Expr {
    fn from(d: DetailExpr) -> Self {
        Self::Detail {
            path: d.path,
            chain: d.chain,
        }
    }
}
