use thiserror::Error as ThisError;

///
/// ValidationError
///
/// Malformed model declaration. Raised when the registry is built, never
/// deferred to the first query.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ValidationError {
    #[error("model '{model}' declares invalid schema name '{name}'")]
    InvalidSchemaName { model: String, name: String },

    #[error("schema '{schema}' declares invalid property name '{name}'")]
    InvalidPropertyName { schema: String, name: String },

    #[error("schema '{schema}' declares property '{property}' more than once")]
    DuplicateProperty { schema: String, property: String },

    #[error("schema '{schema}' maps wire column '{column}' more than once")]
    DuplicateColumn { schema: String, column: String },

    #[error("schema '{schema}' has no primary key")]
    MissingPrimaryKey { schema: String },

    #[error("schema '{schema}' primary key '{property}' must be a Guid")]
    PrimaryKeyNotGuid { schema: String, property: String },

    #[error("schema '{schema}' lookup '{property}' shares column '{column}' with a non-Guid property")]
    LookupColumnConflict {
        schema: String,
        property: String,
        column: String,
    },

    #[error("schema name '{name}' is registered by more than one model")]
    DuplicateSchemaName { name: String },

    #[error("model '{model}' is not registered")]
    UnregisteredModel { model: String },

    #[error("schema '{schema}' property '{property}' targets unregistered model '{target}'")]
    UnregisteredTarget {
        schema: String,
        property: String,
        target: String,
    },

    #[error("schema '{schema}' detail '{detail}' links through unknown child property '{link}'")]
    UnknownLinkProperty {
        schema: String,
        detail: String,
        link: String,
    },

    #[error("schema '{schema}' detail '{detail}' overrides master column with unknown property '{column}'")]
    UnknownMasterColumn {
        schema: String,
        detail: String,
        column: String,
    },
}
