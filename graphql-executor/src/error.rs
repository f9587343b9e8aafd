//! Executor errors.
use displaydoc::Display;
use serde_json_bytes::Value;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
pub use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::graphql::Response;
use crate::json_ext::Object;
pub use crate::spec::SpecError;

/// Boxed error type used at resolver boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while picking the operation to run, before any variable is coerced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreparationError {
    #[error("the document does not contain any operation")]
    NoOperation,

    #[error("{}", operation_name_message(.requested, .available))]
    OperationNameMissing {
        /// The name that was requested, if any.
        requested: Option<String>,
        /// The operation names declared in the document, in declaration order.
        available: Vec<String>,
    },

    #[error("no persisted query found for operation '{name}'")]
    UnknownPersistedOperation { name: String },

    #[error("the request contains neither a query nor an operation name")]
    MissingQuery,

    #[error("{kind} operations are not supported by this executor")]
    UnsupportedOperation { kind: String },
}

fn operation_name_message(requested: &Option<String>, available: &[String]) -> String {
    let names = available.join(", ");
    match requested.as_deref() {
        None | Some("") => format!(
            "must provide operation name if query contains multiple operations; available operations: [{names}]"
        ),
        Some(name) => {
            format!("unknown operation named \"{name}\"; available operations: [{names}]")
        }
    }
}

impl ErrorExtension for PreparationError {
    fn extension_code(&self) -> String {
        match self {
            PreparationError::NoOperation => "NO_OPERATION",
            PreparationError::OperationNameMissing { .. } => "OPERATION_NAME_MISSING",
            PreparationError::UnknownPersistedOperation { .. } => "PERSISTED_QUERY_NOT_FOUND",
            PreparationError::MissingQuery => "MISSING_QUERY",
            PreparationError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        match self {
            PreparationError::OperationNameMissing { available, .. } => {
                let mut obj = Object::new();
                obj.insert(
                    "availableOperations",
                    Value::Array(available.iter().map(|n| n.as_str().into()).collect()),
                );
                Some(obj)
            }
            _ => None,
        }
    }
}

/// Errors raised while coercing the variables of an operation.
///
/// `Missing` is the "can't be null" specialisation of an invalid variable: both
/// carry the variable name and its declared type.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    /// Variable "${name}" of required type "{ty}" was not provided or can't be null
    Missing {
        /// Name of the variable, without the `$`.
        name: String,
        /// Declared type in SDL notation.
        ty: String,
    },

    /// Variable "${name}" got invalid value; expected type "{ty}": {reason}
    Invalid {
        /// Name of the variable, without the `$`.
        name: String,
        /// Declared type in SDL notation.
        ty: String,
        /// Why coercion failed.
        reason: String,
    },
}

impl VariableError {
    pub fn name(&self) -> &str {
        match self {
            VariableError::Missing { name, .. } | VariableError::Invalid { name, .. } => name,
        }
    }

    pub fn ty(&self) -> &str {
        match self {
            VariableError::Missing { ty, .. } | VariableError::Invalid { ty, .. } => ty,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            VariableError::Missing { .. } => "can't be null",
            VariableError::Invalid { reason, .. } => reason,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, VariableError::Missing { .. })
    }
}

impl ErrorExtension for VariableError {
    fn extension_code(&self) -> String {
        match self {
            VariableError::Missing { .. } => "VALIDATION_MISSING_VARIABLE",
            VariableError::Invalid { .. } => "VALIDATION_INVALID_TYPE_VARIABLE",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut obj = Object::new();
        obj.insert("name", self.name().into());
        obj.insert("type", self.ty().into());
        Some(obj)
    }
}

/// The error returned by an execution entry point when no result tree could be built.
///
/// Field errors are not represented here: they are collected in
/// [`Response::errors`], except in debug mode where the first one is returned
/// as [`ExecutionError::Field`].
#[derive(Error, Display, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// {0}
    Preparation(#[from] PreparationError),

    /// {0}
    Spec(#[from] SpecError),

    /// the document failed validation
    Validation(Vec<Error>),

    /// invalid variables
    Variables(Vec<VariableError>),

    /// field error: {0}
    Field(Error),
}

impl ExecutionError {
    /// The GraphQL errors describing this failure.
    pub fn to_graphql_errors(&self) -> Vec<Error> {
        match self {
            ExecutionError::Preparation(err) => vec![err.to_graphql_error()],
            ExecutionError::Spec(err) => vec![err.to_graphql_error()],
            ExecutionError::Validation(errors) => errors.clone(),
            ExecutionError::Variables(errors) => {
                errors.iter().map(|err| err.to_graphql_error()).collect()
            }
            ExecutionError::Field(err) => vec![err.clone()],
        }
    }

    /// An error-only response, without `data`.
    pub fn to_response(&self) -> Response {
        Response::from_errors(self.to_graphql_errors())
    }
}

impl From<Vec<VariableError>> for ExecutionError {
    fn from(errors: Vec<VariableError>) -> Self {
        ExecutionError::Variables(errors)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn operation_name_missing_lists_names() {
        let err = PreparationError::OperationNameMissing {
            requested: None,
            available: vec!["A".to_string(), "B".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "must provide operation name if query contains multiple operations; available operations: [A, B]"
        );
        let graphql = err.to_graphql_error();
        assert_eq!(
            graphql.extension_code().as_deref(),
            Some("OPERATION_NAME_MISSING")
        );
        assert_eq!(
            graphql.extensions.get("availableOperations"),
            Some(&json!(["A", "B"]))
        );

        let err = PreparationError::OperationNameMissing {
            requested: Some("C".to_string()),
            available: vec!["A".to_string(), "B".to_string()],
        };
        assert!(err.to_string().starts_with("unknown operation named \"C\""));
    }

    #[test]
    fn missing_variable_is_a_variable_error() {
        let err = VariableError::Missing {
            name: "id".to_string(),
            ty: "Int!".to_string(),
        };
        assert!(err.is_missing());
        assert_eq!(err.name(), "id");
        assert_eq!(err.ty(), "Int!");
        assert_eq!(err.reason(), "can't be null");
        assert_eq!(
            err.to_string(),
            "Variable \"$id\" of required type \"Int!\" was not provided or can't be null"
        );

        let response = ExecutionError::from(vec![err]).to_response();
        assert!(response.data.is_none());
        assert_eq!(
            response.errors[0].extension_code().as_deref(),
            Some("VALIDATION_MISSING_VARIABLE")
        );
    }
}
