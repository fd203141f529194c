use crate::{
    model::{DetailProperty, LookupProperty, ModelSchema, Property, ValidationError},
    traits::Model,
    value::ValueType,
};
use std::{any::TypeId, collections::HashSet};

///
/// SchemaBuilder
///
/// Collects one model's declarations. Nothing is validated while
/// declaring; `finish` checks everything local to the model, and the
/// registry checks cross-model references.
///

pub struct SchemaBuilder {
    model_path: &'static str,
    schema_name: String,
    primary_key: Option<String>,
    properties: Vec<Property>,
    lookups: Vec<LookupProperty>,
    details: Vec<DetailProperty>,
}

impl SchemaBuilder {
    pub(crate) fn new(model_path: &'static str, schema_name: impl Into<String>) -> Self {
        Self {
            model_path,
            schema_name: schema_name.into(),
            primary_key: None,
            properties: Vec::new(),
            lookups: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Declare the Guid primary key mapped onto a column of the same name.
    pub fn primary_key(&mut self, name: &str) -> &mut Self {
        self.primary_key_column(name, name)
    }

    /// Declare the Guid primary key with an explicit wire column.
    pub fn primary_key_column(&mut self, name: &str, wire_column: &str) -> &mut Self {
        self.primary_key = Some(name.to_string());
        self.scalar_column(name, wire_column, ValueType::Guid)
    }

    /// Declare a scalar property mapped onto a column of the same name.
    pub fn scalar(&mut self, name: &str, value_type: ValueType) -> &mut Self {
        self.scalar_column(name, name, value_type)
    }

    /// Declare a scalar property with an explicit wire column.
    pub fn scalar_column(
        &mut self,
        name: &str,
        wire_column: &str,
        value_type: ValueType,
    ) -> &mut Self {
        self.properties.push(Property {
            name: name.to_string(),
            wire_column: wire_column.to_string(),
            value_type,
        });
        self
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.scalar(name, ValueType::Text)
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.scalar(name, ValueType::Integer)
    }

    pub fn decimal(&mut self, name: &str) -> &mut Self {
        self.scalar(name, ValueType::Decimal)
    }

    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.scalar(name, ValueType::Boolean)
    }

    pub fn date_time(&mut self, name: &str) -> &mut Self {
        self.scalar(name, ValueType::DateTime)
    }

    pub fn guid(&mut self, name: &str) -> &mut Self {
        self.scalar(name, ValueType::Guid)
    }

    /// Declare a lookup to `U` stored in `wire_column`.
    pub fn lookup<U: Model>(&mut self, name: &str, wire_column: &str) -> &mut Self {
        self.lookups.push(LookupProperty {
            name: name.to_string(),
            wire_column: wire_column.to_string(),
            target_schema: U::SCHEMA_NAME.to_string(),
            target_type: TypeId::of::<U>(),
        });
        self
    }

    /// Declare a detail collection of `U` linked through `link_property` on `U`.
    pub fn detail<U: Model>(&mut self, name: &str, link_property: &str) -> &mut Self {
        self.push_detail::<U>(name, link_property, None)
    }

    /// Declare a detail collection joined on a non-key master property.
    pub fn detail_with_master<U: Model>(
        &mut self,
        name: &str,
        link_property: &str,
        master_property: &str,
    ) -> &mut Self {
        self.push_detail::<U>(name, link_property, Some(master_property.to_string()))
    }

    fn push_detail<U: Model>(
        &mut self,
        name: &str,
        link_property: &str,
        master_column_override: Option<String>,
    ) -> &mut Self {
        self.details.push(DetailProperty {
            name: name.to_string(),
            link_property: link_property.to_string(),
            target_schema: U::SCHEMA_NAME.to_string(),
            master_column_override,
            target_type: TypeId::of::<U>(),
            link_column: String::new(),
            master_column: String::new(),
        });
        self
    }

    /// Validate model-local invariants and freeze the schema.
    pub(crate) fn finish(self) -> Result<ModelSchema, ValidationError> {
        if !is_identifier(&self.schema_name) {
            return Err(ValidationError::InvalidSchemaName {
                model: self.model_path.to_string(),
                name: self.schema_name,
            });
        }
        let schema = self.schema_name.clone();

        // Phase 1: names.
        let mut names = HashSet::new();
        let all_names = self
            .properties
            .iter()
            .map(|p| &p.name)
            .chain(self.lookups.iter().map(|p| &p.name))
            .chain(self.details.iter().map(|p| &p.name));
        for name in all_names {
            if !is_identifier(name) {
                return Err(ValidationError::InvalidPropertyName {
                    schema,
                    name: name.clone(),
                });
            }
            if !names.insert(name.as_str()) {
                return Err(ValidationError::DuplicateProperty {
                    schema,
                    property: name.clone(),
                });
            }
        }

        // Phase 2: scalar wire columns are unique.
        let mut columns = HashSet::new();
        for p in &self.properties {
            if p.wire_column.is_empty() || !columns.insert(p.wire_column.as_str()) {
                return Err(ValidationError::DuplicateColumn {
                    schema,
                    column: p.wire_column.clone(),
                });
            }
        }

        // Phase 3: primary key.
        let Some(pk_name) = self.primary_key else {
            return Err(ValidationError::MissingPrimaryKey { schema });
        };
        let Some(primary_key) = self.properties.iter().position(|p| p.name == pk_name) else {
            return Err(ValidationError::MissingPrimaryKey { schema });
        };
        if self.properties[primary_key].value_type != ValueType::Guid {
            return Err(ValidationError::PrimaryKeyNotGuid {
                schema,
                property: pk_name,
            });
        }

        // Phase 4: lookups may alias a Guid scalar column, nothing else.
        for lookup in &self.lookups {
            let shadow = self
                .properties
                .iter()
                .find(|p| p.wire_column == lookup.wire_column);
            if shadow.is_some_and(|p| p.value_type != ValueType::Guid) {
                return Err(ValidationError::LookupColumnConflict {
                    schema,
                    property: lookup.name.clone(),
                    column: lookup.wire_column.clone(),
                });
            }
        }

        Ok(ModelSchema {
            model_path: self.model_path,
            schema_name: self.schema_name,
            primary_key,
            properties: self.properties,
            lookups: self.lookups,
            details: self.details,
        })
    }
}

/// Build and locally validate the schema of one model.
pub(crate) fn describe<T: Model>() -> Result<ModelSchema, ValidationError> {
    let mut builder = SchemaBuilder::new(std::any::type_name::<T>(), T::SCHEMA_NAME);
    T::describe(&mut builder);

    builder.finish()
}

// ASCII identifier: letter or underscore first, then alphanumerics/underscores.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
