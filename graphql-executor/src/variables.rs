//! Coercion of the variables supplied to an operation.

use crate::error::VariableError;
use crate::json_ext::Object;
use crate::spec::InvalidValue;
use crate::spec::OperationDefinition;
use crate::spec::Schema;

/// Coerces `provided` against the variables declared by `operation`.
///
/// Every declared variable is processed before returning, so all errors are
/// reported together. Nullable variables without a value nor a default are not
/// bound at all.
#[tracing::instrument(skip_all, level = "trace")]
pub fn coerce_variables(
    operation: &OperationDefinition,
    schema: &Schema,
    provided: &Object,
) -> Result<Object, Vec<VariableError>> {
    let mut coerced = Object::new();
    let mut errors = Vec::new();

    for definition in &operation.variables {
        let name = definition.name.as_str();
        let value = match (provided.get(name), &definition.default_value) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.evaluate_const(),
            (None, None) if definition.ty.is_non_null() => {
                errors.push(VariableError::Missing {
                    name: name.to_string(),
                    ty: definition.ty.to_string(),
                });
                continue;
            }
            (None, None) => continue,
        };

        match definition.ty.coerce_input(&value, schema) {
            Ok(value) => {
                coerced.insert(name, value);
            }
            Err(InvalidValue::Null) => errors.push(VariableError::Missing {
                name: name.to_string(),
                ty: definition.ty.to_string(),
            }),
            Err(err) => errors.push(VariableError::Invalid {
                name: name.to_string(),
                ty: definition.ty.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    let unknown = provided
        .keys()
        .filter(|key| operation.variable(key.as_str()).is_none())
        .map(|key| key.as_str())
        .collect::<Vec<_>>();
    if !unknown.is_empty() {
        tracing::debug!(
            "Received variable unknown to the operation: {:?}",
            unknown
        );
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}
