use crate::value::ValueType;
use std::any::TypeId;

///
/// Property
/// Scalar property mapped onto one wire column.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Property {
    pub name: String,
    pub wire_column: String,
    pub value_type: ValueType,
}

///
/// LookupProperty
///
/// Foreign-key style reference to another model. The key lives in
/// `wire_column` as a Guid; the referenced instance is resolved lazily.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LookupProperty {
    pub name: String,
    pub wire_column: String,
    pub target_schema: String,
    pub(crate) target_type: TypeId,
}

///
/// DetailProperty
///
/// One-to-many child collection. Children reference the master through
/// `link_property`; the master side of the join is the primary key unless
/// `master_column_override` names another master property.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DetailProperty {
    pub name: String,
    pub link_property: String,
    pub target_schema: String,
    pub master_column_override: Option<String>,
    pub(crate) target_type: TypeId,

    // Resolved by the registry once both sides are known.
    pub(crate) link_column: String,
    pub(crate) master_column: String,
}

impl DetailProperty {
    /// Child wire column holding the master reference.
    #[must_use]
    pub fn link_column(&self) -> &str {
        &self.link_column
    }

    /// Master wire column the children point at.
    #[must_use]
    pub fn master_column(&self) -> &str {
        &self.master_column
    }

    /// Reverse-join prefix, e.g. `[OrderLine:Order:Id]`.
    #[must_use]
    pub fn join_path(&self) -> String {
        format!(
            "[{}:{}:{}]",
            self.target_schema, self.link_column, self.master_column
        )
    }
}

///
/// Member
/// Result of resolving one path segment against a schema.
///

#[derive(Clone, Copy, Debug)]
pub enum Member<'a> {
    Scalar(&'a Property),
    Lookup(&'a LookupProperty),
    Detail(&'a DetailProperty),
}

///
/// ModelSchema
///
/// Immutable per-model metadata. Scalar properties come first in declaration
/// order; lookup columns not shadowed by a scalar follow.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ModelSchema {
    pub(crate) model_path: &'static str,
    pub(crate) schema_name: String,
    // Index into `properties`; validated to point at a Guid property.
    pub(crate) primary_key: usize,
    pub(crate) properties: Vec<Property>,
    pub(crate) lookups: Vec<LookupProperty>,
    pub(crate) details: Vec<DetailProperty>,
}

impl ModelSchema {
    /// Rust type path of the declaring model (diagnostics only).
    #[must_use]
    pub const fn model_path(&self) -> &'static str {
        self.model_path
    }

    #[must_use]
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[must_use]
    pub fn lookups(&self) -> &[LookupProperty] {
        &self.lookups
    }

    #[must_use]
    pub fn details(&self) -> &[DetailProperty] {
        &self.details
    }

    /// Primary key property; always a Guid once the schema is validated.
    #[must_use]
    pub fn primary_key(&self) -> &Property {
        &self.properties[self.primary_key]
    }

    /// Wire column of the primary key.
    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.primary_key().wire_column
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&LookupProperty> {
        self.lookups.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn detail(&self, name: &str) -> Option<&DetailProperty> {
        self.details.iter().find(|p| p.name == name)
    }

    /// Resolve one member name; scalars win over lookups of the same name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        if let Some(p) = self.property(name) {
            return Some(Member::Scalar(p));
        }
        if let Some(p) = self.lookup(name) {
            return Some(Member::Lookup(p));
        }

        self.detail(name).map(Member::Detail)
    }

    /// Every loadable wire column with its type, in schema order.
    #[must_use]
    pub fn columns(&self) -> Vec<(&str, ValueType)> {
        let mut out: Vec<(&str, ValueType)> = self
            .properties
            .iter()
            .map(|p| (p.wire_column.as_str(), p.value_type))
            .collect();

        for lookup in &self.lookups {
            if !out.iter().any(|(c, _)| *c == lookup.wire_column) {
                out.push((lookup.wire_column.as_str(), ValueType::Guid));
            }
        }

        out
    }

    /// Wire type of a loadable column.
    #[must_use]
    pub fn column_type(&self, column: &str) -> Option<ValueType> {
        self.columns()
            .into_iter()
            .find_map(|(c, ty)| (c == column).then_some(ty))
    }

    /// Wire column for a scalar or lookup property name.
    #[must_use]
    pub fn column_of(&self, name: &str) -> Option<&str> {
        match self.member(name)? {
            Member::Scalar(p) => Some(&p.wire_column),
            Member::Lookup(p) => Some(&p.wire_column),
            Member::Detail(_) => None,
        }
    }
}
