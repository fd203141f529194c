use crate::{
    db::query::{
        ast::ExpressionNode,
        build::{build_predicate, build_value},
        error::CompileError,
        expr::Expr,
        raw::{ParseContext, RawNode, normalize_predicate, normalize_value},
    },
    model::{ModelSchema, SchemaRegistry},
    obs::sink::{MetricsEvent, record},
    traits::Model,
};
use std::sync::Arc;

///
/// Compiler
///
/// Runs the full pipeline (parse, normalize, build) for expressions over
/// one model type.
///

pub(crate) struct Compiler<'a> {
    registry: &'a SchemaRegistry,
    schema: Arc<ModelSchema>,
}

impl<'a> Compiler<'a> {
    pub const fn new(registry: &'a SchemaRegistry, schema: Arc<ModelSchema>) -> Self {
        Self { registry, schema }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    fn context(&self) -> ParseContext<'a> {
        ParseContext::new(self.registry, Arc::clone(&self.schema))
    }

    /// Compile an expression in filter position.
    pub fn predicate(&self, expr: &Expr) -> Result<ExpressionNode, CompileError> {
        let result = self
            .context()
            .parse(expr)
            .and_then(normalize_predicate)
            .and_then(build_predicate);
        record(MetricsEvent::Compile { ok: result.is_ok() });

        result
    }

    /// Compile an expression in value position.
    pub fn value(&self, expr: &Expr) -> Result<ExpressionNode, CompileError> {
        let result = self
            .context()
            .parse(expr)
            .and_then(normalize_value)
            .and_then(build_value);
        record(MetricsEvent::Compile { ok: result.is_ok() });

        result
    }

    /// Compile an aggregation argument; `numeric` rejects non-numeric columns.
    pub fn aggregate_argument(&self, expr: &Expr, numeric: bool) -> Result<ExpressionNode, CompileError> {
        let column = self.context().aggregate_argument(expr, numeric)?;

        build_value(RawNode::Column(column))
    }
}

/// Compile a standalone filter expression over `T`.
pub fn compile_filter<T: Model>(
    registry: &SchemaRegistry,
    expr: &Expr,
) -> Result<ExpressionNode, CompileError> {
    let schema = registry.schema::<T>()?;

    Compiler::new(registry, schema).predicate(expr)
}
