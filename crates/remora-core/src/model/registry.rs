use crate::{
    model::{
        ModelSchema, ValidationError,
        builder::describe,
        schema::{DetailProperty, Member},
    },
    traits::Model,
    value::ValueType,
};
use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    sync::Arc,
};

///
/// RegistryBuilder
///
/// Accumulates model registrations. Local validation happens per model as it
/// is registered; the first failure is held and returned by `build`.
///

#[derive(Default)]
pub struct RegistryBuilder {
    schemas: Vec<(TypeId, ModelSchema)>,
    error: Option<ValidationError>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn register<T: Model>(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }

        let type_id = TypeId::of::<T>();
        if self.schemas.iter().any(|(id, _)| *id == type_id) {
            return self;
        }

        match describe::<T>() {
            Ok(schema) => self.schemas.push((type_id, schema)),
            Err(err) => self.error = Some(err),
        }

        self
    }

    /// Cross-validate every registered schema and freeze the registry.
    pub fn build(self) -> Result<Arc<SchemaRegistry>, ValidationError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut schemas = self.schemas;

        // schema names
        let mut by_name = HashMap::new();
        for (i, (_, schema)) in schemas.iter().enumerate() {
            if by_name.insert(schema.schema_name.clone(), i).is_some() {
                return Err(ValidationError::DuplicateSchemaName {
                    name: schema.schema_name.clone(),
                });
            }
        }

        // lookup targets
        for (_, schema) in &schemas {
            for lookup in &schema.lookups {
                if !schemas.iter().any(|(id, _)| *id == lookup.target_type) {
                    return Err(ValidationError::UnregisteredTarget {
                        schema: schema.schema_name.clone(),
                        property: lookup.name.clone(),
                        target: lookup.target_schema.clone(),
                    });
                }
            }
        }

        // detail joins, resolved against both sides
        let mut resolved = Vec::new();
        for (master_idx, (_, master)) in schemas.iter().enumerate() {
            for (detail_idx, detail) in master.details.iter().enumerate() {
                let Some((_, child)) = schemas.iter().find(|(id, _)| *id == detail.target_type)
                else {
                    return Err(ValidationError::UnregisteredTarget {
                        schema: master.schema_name.clone(),
                        property: detail.name.clone(),
                        target: detail.target_schema.clone(),
                    });
                };
                let (link, master_col) = resolve_join(master, child, detail)?;
                resolved.push((master_idx, detail_idx, link, master_col));
            }
        }
        for (master_idx, detail_idx, link, master_col) in resolved {
            let detail = &mut schemas[master_idx].1.details[detail_idx];
            detail.link_column = link;
            detail.master_column = master_col;
        }

        let by_type = schemas
            .into_iter()
            .map(|(id, schema)| (id, Arc::new(schema)))
            .collect::<HashMap<_, _>>();
        let by_name = by_type
            .iter()
            .map(|(id, schema)| (schema.schema_name.clone(), *id))
            .collect();

        Ok(Arc::new(SchemaRegistry { by_type, by_name }))
    }
}

// Child link column and master column of one detail join.
fn resolve_join(
    master: &ModelSchema,
    child: &ModelSchema,
    detail: &DetailProperty,
) -> Result<(String, String), ValidationError> {
    let link = match child.member(&detail.link_property) {
        Some(Member::Lookup(p)) => p.wire_column.clone(),
        Some(Member::Scalar(p)) if p.value_type == ValueType::Guid => p.wire_column.clone(),
        _ => {
            return Err(ValidationError::UnknownLinkProperty {
                schema: master.schema_name.clone(),
                detail: detail.name.clone(),
                link: detail.link_property.clone(),
            });
        }
    };

    let master_col = match &detail.master_column_override {
        None => master.key_column().to_string(),
        Some(name) => match master.column_of(name) {
            Some(col) => col.to_string(),
            None => {
                return Err(ValidationError::UnknownMasterColumn {
                    schema: master.schema_name.clone(),
                    detail: detail.name.clone(),
                    column: name.clone(),
                });
            }
        },
    };

    Ok((link, master_col))
}

///
/// SchemaRegistry
///
/// Immutable set of validated model schemas, shared by every data context
/// built on it.
///

#[derive(Debug)]
pub struct SchemaRegistry {
    by_type: HashMap<TypeId, Arc<ModelSchema>>,
    by_name: HashMap<String, TypeId>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn schema<T: Model>(&self) -> Result<Arc<ModelSchema>, ValidationError> {
        self.schema_of(TypeId::of::<T>()).ok_or_else(|| {
            ValidationError::UnregisteredModel {
                model: type_name::<T>().to_string(),
            }
        })
    }

    #[must_use]
    pub fn schema_by_name(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.by_name
            .get(name)
            .and_then(|id| self.by_type.get(id))
            .cloned()
    }

    pub(crate) fn schema_of(&self, type_id: TypeId) -> Option<Arc<ModelSchema>> {
        self.by_type.get(&type_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
