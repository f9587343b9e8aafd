use displaydoc::Display;
use thiserror::Error;

use crate::json_ext::Object;
use crate::spec::Field;
use crate::spec::FieldDefinition;
use crate::spec::Schema;

/// Field argument coercion failures.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArgumentError {
    /// argument '{name}' of type '{ty}' is required but was not provided
    Required { name: String, ty: String },
    /// argument '{name}' has an invalid value; expected type '{ty}': {reason}
    Invalid {
        name: String,
        ty: String,
        reason: String,
    },
    /// unknown argument '{name}'
    Unknown { name: String },
}

/// Coerces the arguments of `field` against their definitions.
///
/// An argument bound to an absent variable is treated as not provided, so its
/// default applies.
pub(crate) fn coerce_arguments(
    field: &Field,
    definition: &FieldDefinition,
    variables: &Object,
    schema: &Schema,
) -> Result<Object, ArgumentError> {
    if let Some(unknown) = field
        .arguments
        .iter()
        .find(|argument| !definition.arguments.contains_key(&argument.name))
    {
        return Err(ArgumentError::Unknown {
            name: unknown.name.clone(),
        });
    }

    let mut coerced = Object::new();
    for (name, argument_definition) in &definition.arguments {
        let provided = field
            .arguments
            .iter()
            .find(|argument| &argument.name == name)
            .and_then(|argument| argument.value.evaluate(variables));
        let value = match (provided, &argument_definition.default_value) {
            (Some(value), _) => value,
            (None, Some(default)) => default.evaluate_const(),
            (None, None) if argument_definition.ty.is_non_null() => {
                return Err(ArgumentError::Required {
                    name: name.clone(),
                    ty: argument_definition.ty.to_string(),
                });
            }
            (None, None) => continue,
        };
        let value = argument_definition
            .ty
            .coerce_input(&value, schema)
            .map_err(|err| ArgumentError::Invalid {
                name: name.clone(),
                ty: argument_definition.ty.to_string(),
                reason: err.to_string(),
            })?;
        coerced.insert(name.as_str(), value);
    }
    Ok(coerced)
}
