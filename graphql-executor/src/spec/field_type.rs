use apollo_parser::cst;
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::spec::Schema;
use crate::spec::SpecError;
use crate::spec::TypeDefinition;

/// Why a value could not be coerced to a type.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub enum InvalidValue {
    /// can't be null
    Null,
    /// is not a valid {0}
    NotA(String),
    /// field '{field}' is not defined by type '{ty}'
    UnknownField { field: String, ty: String },
    /// field '{field}' of required type '{ty}' was not provided
    MissingField { field: String, ty: String },
    /// at index {index}: {inner}
    InItem { index: usize, inner: Box<InvalidValue> },
    /// in field '{field}': {inner}
    InField { field: String, inner: Box<InvalidValue> },
}

// Primitives are taken from scalars: https://spec.graphql.org/draft/#sec-Scalars
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Named type {0}
    Named(String),
    /// List type {0}
    List(Box<FieldType>),
    /// Non null type {0}
    NonNull(Box<FieldType>),
    /// String
    String,
    /// Int
    Int,
    /// Float
    Float,
    /// Id
    Id,
    /// Boolean
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Named(ty) => write!(f, "{ty}"),
            FieldType::List(ty) => write!(f, "[{ty}]"),
            FieldType::NonNull(ty) => write!(f, "{ty}!"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Id => write!(f, "ID"),
            FieldType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl FieldType {
    /// Builds a type from a name, mapping the built-in scalars to their own variants.
    pub fn named(name: &str) -> Self {
        match name {
            "String" => Self::String,
            "Int" => Self::Int,
            "Float" => Self::Float,
            "ID" => Self::Id,
            "Boolean" => Self::Boolean,
            _ => Self::Named(name.to_string()),
        }
    }

    /// Coerces an input value (a variable or an evaluated literal) according to the
    /// "input coercion" rules of the GraphQL specification.
    pub fn coerce_input(&self, value: &Value, schema: &Schema) -> Result<Value, InvalidValue> {
        match (self, value) {
            (FieldType::NonNull(_), Value::Null) => Err(InvalidValue::Null),
            (FieldType::NonNull(inner), value) => inner.coerce_input(value, schema),
            // NOTE: graphql's types are all optional by default
            (_, Value::Null) => Ok(Value::Null),
            (FieldType::String, Value::String(_)) => Ok(value.clone()),
            // Spec: https://spec.graphql.org/June2018/#sec-Int
            (FieldType::Int, maybe_int) => maybe_int
                .as_i32()
                .map(|int| Value::from(i64::from(int)))
                .ok_or_else(|| InvalidValue::NotA(self.to_string())),
            // Spec: https://spec.graphql.org/draft/#sec-Float.Input-Coercion
            (FieldType::Float, maybe_float) if maybe_float.is_valid_float_input() => {
                Ok(maybe_float.clone())
            }
            // ID accepts strings and integers, always represented as a string
            (FieldType::Id, Value::String(_)) => Ok(value.clone()),
            (FieldType::Id, Value::Number(number)) if number.is_i64() || number.is_u64() => {
                Ok(Value::String(number.to_string().into()))
            }
            (FieldType::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (FieldType::List(inner), Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    inner
                        .coerce_input(item, schema)
                        .map_err(|err| InvalidValue::InItem {
                            index,
                            inner: Box::new(err),
                        })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            // For coercion from single value to list
            (FieldType::List(inner), value) => {
                Ok(Value::Array(vec![inner.coerce_input(value, schema)?]))
            }
            (FieldType::Named(name), value) => match schema.get(name) {
                Some(TypeDefinition::Scalar(_)) => Ok(value.clone()),
                Some(TypeDefinition::Enum(enum_type)) => match value.as_str() {
                    Some(variant) if enum_type.values.contains(variant) => Ok(value.clone()),
                    _ => Err(InvalidValue::NotA(name.clone())),
                },
                Some(TypeDefinition::InputObject(input_type)) => {
                    let object = value
                        .as_object()
                        .ok_or_else(|| InvalidValue::NotA(name.clone()))?;
                    input_type.coerce(object, schema).map(Value::Object)
                }
                _ => Err(InvalidValue::NotA(name.clone())),
            },
            _ => Err(InvalidValue::NotA(self.to_string())),
        }
    }

    /// Serializes a value returned by a resolver for a leaf type (scalar or enum).
    ///
    /// Wrapper types are handled by the caller, list by list and null by null.
    pub fn coerce_output(&self, value: Value, schema: &Schema) -> Result<Value, InvalidValue> {
        match (self, value) {
            (FieldType::Int, value) => value
                .as_i32()
                .map(|int| Value::from(i64::from(int)))
                .ok_or_else(|| InvalidValue::NotA(self.to_string())),
            (FieldType::Float, value @ Value::Number(_)) => Ok(value),
            (FieldType::String, value @ Value::String(_)) => Ok(value),
            (FieldType::String, Value::Number(number)) => {
                Ok(Value::String(number.to_string().into()))
            }
            (FieldType::String, Value::Bool(boolean)) => {
                Ok(Value::String(boolean.to_string().into()))
            }
            (FieldType::Boolean, value @ Value::Bool(_)) => Ok(value),
            (FieldType::Id, value @ Value::String(_)) => Ok(value),
            (FieldType::Id, Value::Number(number)) if number.is_i64() || number.is_u64() => {
                Ok(Value::String(number.to_string().into()))
            }
            (FieldType::Named(name), value) => match schema.get(name) {
                Some(TypeDefinition::Scalar(_)) => Ok(value),
                Some(TypeDefinition::Enum(enum_type)) => match value.as_str() {
                    Some(variant) if enum_type.values.contains(variant) => Ok(value),
                    _ => Err(InvalidValue::NotA(name.clone())),
                },
                _ => Err(InvalidValue::NotA(name.clone())),
            },
            _ => Err(InvalidValue::NotA(self.to_string())),
        }
    }

    /// return the name of the type on which selections happen
    ///
    /// Example if we get the field `list: [User!]!`, it will return "User"
    pub fn inner_type_name(&self) -> Option<&str> {
        match self {
            FieldType::Named(name) => Some(name.as_str()),
            FieldType::List(inner) | FieldType::NonNull(inner) => inner.inner_type_name(),
            FieldType::String
            | FieldType::Int
            | FieldType::Float
            | FieldType::Id
            | FieldType::Boolean => None,
        }
    }

    pub fn is_builtin_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::Int
                | FieldType::Float
                | FieldType::Id
                | FieldType::Boolean
        )
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, FieldType::NonNull(_))
    }
}

impl crate::spec::InputObjectType {
    pub(crate) fn coerce(&self, object: &Object, schema: &Schema) -> Result<Object, InvalidValue> {
        if let Some(unknown) = object
            .keys()
            .find(|key| !self.fields.contains_key(key.as_str()))
        {
            return Err(InvalidValue::UnknownField {
                field: unknown.as_str().to_string(),
                ty: self.name.clone(),
            });
        }

        let mut coerced = Object::new();
        for (name, field) in &self.fields {
            let value = match (object.get(name.as_str()), &field.default_value) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.evaluate_const(),
                (None, None) if field.ty.is_non_null() => {
                    return Err(InvalidValue::MissingField {
                        field: name.clone(),
                        ty: field.ty.to_string(),
                    });
                }
                (None, None) => continue,
            };
            let value = field
                .ty
                .coerce_input(&value, schema)
                .map_err(|err| InvalidValue::InField {
                    field: name.clone(),
                    inner: Box::new(err),
                })?;
            coerced.insert(name.as_str(), value);
        }
        Ok(coerced)
    }
}

impl TryFrom<cst::Type> for FieldType {
    type Error = SpecError;
    // Spec: https://spec.graphql.org/draft/#sec-Type-References
    fn try_from(ty: cst::Type) -> Result<Self, Self::Error> {
        match ty {
            cst::Type::NamedType(named) => named.try_into(),
            cst::Type::ListType(list) => list.try_into(),
            cst::Type::NonNullType(non_null) => non_null.try_into(),
        }
    }
}

impl TryFrom<cst::NamedType> for FieldType {
    type Error = SpecError;
    // Spec: https://spec.graphql.org/draft/#NamedType
    fn try_from(named: cst::NamedType) -> Result<Self, Self::Error> {
        let name = named
            .name()
            .ok_or_else(|| {
                SpecError::InvalidType(
                    "the node Name is not optional in the GraphQL grammar; qed".to_string(),
                )
            })?
            .text()
            .to_string();
        Ok(FieldType::named(&name))
    }
}

impl TryFrom<cst::ListType> for FieldType {
    type Error = SpecError;

    // Spec: https://spec.graphql.org/draft/#ListType
    fn try_from(list: cst::ListType) -> Result<Self, Self::Error> {
        Ok(Self::List(Box::new(
            list.ty()
                .ok_or_else(|| {
                    SpecError::InvalidType(
                        "node Type is not optional in the GraphQL grammar; qed".to_string(),
                    )
                })?
                .try_into()?,
        )))
    }
}

impl TryFrom<cst::NonNullType> for FieldType {
    type Error = SpecError;

    // Spec: https://spec.graphql.org/draft/#NonNullType
    fn try_from(non_null: cst::NonNullType) -> Result<Self, Self::Error> {
        if let Some(list) = non_null.list_type() {
            Ok(Self::NonNull(Box::new(list.try_into()?)))
        } else if let Some(named) = non_null.named_type() {
            Ok(Self::NonNull(Box::new(named.try_into()?)))
        } else {
            Err(SpecError::InvalidType(
                "either the NamedType node is provided, either the ListType node; qed".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    fn schema() -> Schema {
        Schema::parse(
            r#"
            type Query { a: Int }
            enum Color { RED GREEN }
            scalar Date
            input Filter {
              color: Color!
              limit: Int = 10
              tags: [String!]
            }
            "#,
        )
        .unwrap()
    }

    fn non_null(ty: FieldType) -> FieldType {
        FieldType::NonNull(Box::new(ty))
    }

    #[test]
    fn display_uses_sdl_notation() {
        let ty = non_null(FieldType::List(Box::new(non_null(FieldType::Named(
            "User".to_string(),
        )))));
        assert_eq!(ty.to_string(), "[User!]!");
        assert_eq!(ty.inner_type_name(), Some("User"));
        assert_eq!(FieldType::Id.to_string(), "ID");
    }

    #[test]
    fn scalar_input_coercion() {
        let schema = schema();
        assert_eq!(FieldType::Int.coerce_input(&json!(4.0), &schema), Ok(json!(4)));
        assert_eq!(
            FieldType::Int.coerce_input(&json!("4"), &schema),
            Err(InvalidValue::NotA("Int".to_string()))
        );
        assert_eq!(FieldType::Id.coerce_input(&json!(7), &schema), Ok(json!("7")));
        assert_eq!(
            non_null(FieldType::Boolean).coerce_input(&Value::Null, &schema),
            Err(InvalidValue::Null)
        );
        assert_eq!(
            FieldType::Boolean.coerce_input(&Value::Null, &schema),
            Ok(Value::Null)
        );
        assert_eq!(
            FieldType::Named("Date".to_string()).coerce_input(&json!({"any": 1}), &schema),
            Ok(json!({"any": 1}))
        );
    }

    #[test]
    fn list_input_coercion() {
        let schema = schema();
        let ty = FieldType::List(Box::new(non_null(FieldType::Int)));
        assert_eq!(ty.coerce_input(&json!([1, 2]), &schema), Ok(json!([1, 2])));
        assert_eq!(ty.coerce_input(&json!(3), &schema), Ok(json!([3])));
        let err = ty.coerce_input(&json!([1, null]), &schema).unwrap_err();
        assert_eq!(err.to_string(), "at index 1: can't be null");
    }

    #[test]
    fn input_object_coercion() {
        let schema = schema();
        let ty = FieldType::Named("Filter".to_string());

        assert_eq!(
            ty.coerce_input(&json!({"color": "RED"}), &schema),
            Ok(json!({"color": "RED", "limit": 10}))
        );
        assert_eq!(
            ty.coerce_input(&json!({"color": "BLUE"}), &schema)
                .unwrap_err()
                .to_string(),
            "in field 'color': is not a valid Color"
        );
        assert_eq!(
            ty.coerce_input(&json!({}), &schema).unwrap_err(),
            InvalidValue::MissingField {
                field: "color".to_string(),
                ty: "Color!".to_string()
            }
        );
        assert_eq!(
            ty.coerce_input(&json!({"color": "RED", "other": 1}), &schema)
                .unwrap_err(),
            InvalidValue::UnknownField {
                field: "other".to_string(),
                ty: "Filter".to_string()
            }
        );
    }

    #[test]
    fn output_coercion() {
        let schema = schema();
        assert_eq!(FieldType::String.coerce_output(json!(1), &schema), Ok(json!("1")));
        assert_eq!(FieldType::Id.coerce_output(json!(12), &schema), Ok(json!("12")));
        assert!(FieldType::Int.coerce_output(json!("x"), &schema).is_err());
        assert!(
            FieldType::Named("Color".to_string())
                .coerce_output(json!("PURPLE"), &schema)
                .is_err()
        );
    }
}
