use crate::{db::query::CompileError, model::ValidationError, types::Guid};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured runtime error with a stable classification.
/// Provider failures and missing rows are ordinary outcomes and always
/// surface through this type rather than a panic.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured detail; the variant matches `class`.
    pub detail: Option<ErrorDetail>,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a provider-origin failure.
    pub(crate) fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Provider, ErrorOrigin::Provider, message)
    }

    /// Construct a context-origin invalid-state error.
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidState, ErrorOrigin::Context, message)
    }

    /// Construct a not-found error for one keyed row.
    pub fn not_found(schema: impl Into<String>, key: Guid) -> Self {
        let schema = schema.into();

        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Context,
            message: format!("{schema} '{key}' not found"),
            detail: Some(ErrorDetail::NotFound {
                schema,
                key: Some(key),
            }),
        }
    }

    /// Construct a not-found error for a query that returned no rows.
    pub(crate) fn no_rows(schema: impl Into<String>) -> Self {
        let schema = schema.into();

        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Query,
            message: format!("no {schema} rows found"),
            detail: Some(ErrorDetail::NotFound { schema, key: None }),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_compile(&self) -> bool {
        matches!(self.class, ErrorClass::Compile)
    }

    #[must_use]
    pub const fn is_provider(&self) -> bool {
        matches!(self.class, ErrorClass::Provider)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }

    /// Underlying compile error, if any.
    #[must_use]
    pub const fn compile_error(&self) -> Option<&CompileError> {
        match &self.detail {
            Some(ErrorDetail::Compile(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self {
            class: ErrorClass::Compile,
            origin: ErrorOrigin::Query,
            message: err.to_string(),
            detail: Some(ErrorDetail::Compile(err)),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self {
            class: ErrorClass::Validation,
            origin: ErrorOrigin::Schema,
            message: err.to_string(),
            detail: Some(ErrorDetail::Validation(err)),
        }
    }
}

///
/// ErrorDetail
/// Structured detail carried by [`Error`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Compile(CompileError),

    #[error("{0}")]
    Validation(ValidationError),

    #[error("{schema} not found")]
    NotFound { schema: String, key: Option<Guid> },
}

///
/// ErrorClass
/// Runtime error taxonomy.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Compile,
    Validation,
    Provider,
    NotFound,
    InvalidState,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Compile => "compile",
            Self::Validation => "validation",
            Self::Provider => "provider",
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Layer an error was raised in.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Schema,
    Query,
    Provider,
    Context,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "schema",
            Self::Query => "query",
            Self::Provider => "provider",
            Self::Context => "context",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_schema_and_key() {
        let key = Guid::from_u128(7);
        let err = Error::not_found("Contact", key);

        assert!(err.is_not_found());
        assert!(err.message.contains("not found"));
        assert!(err.message.contains(&key.to_string()));
        assert_eq!(
            err.display_with_class(),
            format!("context:not_found: {}", err.message)
        );
    }

    #[test]
    fn compile_errors_convert_with_detail() {
        let err: Error = CompileError::UnknownProperty {
            schema: "Contact".into(),
            property: "Nope".into(),
        }
        .into();

        assert!(err.is_compile());
        assert_eq!(err.origin, ErrorOrigin::Query);
        assert!(matches!(
            err.compile_error(),
            Some(CompileError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn validation_errors_convert_with_schema_origin() {
        let err: Error = ValidationError::MissingPrimaryKey {
            schema: "Contact".into(),
        }
        .into();

        assert_eq!(err.class, ErrorClass::Validation);
        assert_eq!(err.origin, ErrorOrigin::Schema);
    }
}
