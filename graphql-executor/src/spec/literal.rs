use apollo_parser::cst;
use serde_json_bytes::Value;

use crate::json_ext::Object;
use crate::spec::SpecError;

/// A value as written in the document: an argument, a default value or a directive argument.
///
/// Literals are kept unevaluated so a prepared document can be executed with
/// different variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// A `$variable` reference.
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Literal>),
    /// Input object fields, in document order.
    Object(Vec<(String, Literal)>),
}

impl Literal {
    /// Evaluates the literal against coerced variables.
    ///
    /// Returns `None` only when the literal is a reference to a variable that
    /// has no binding. Inside a list such a reference becomes `null`, inside an
    /// object the field is left out.
    pub fn evaluate(&self, variables: &Object) -> Option<Value> {
        Some(match self {
            Literal::Variable(name) => return variables.get(name.as_str()).cloned(),
            Literal::Int(int) => Value::from(*int),
            Literal::Float(float) => serde_json::Number::from_f64(*float)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::String(string) => Value::String(string.clone().into()),
            Literal::Boolean(boolean) => Value::Bool(*boolean),
            Literal::Null => Value::Null,
            Literal::Enum(name) => Value::String(name.clone().into()),
            Literal::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.evaluate(variables).unwrap_or(Value::Null))
                    .collect(),
            ),
            Literal::Object(fields) => Value::Object(
                fields
                    .iter()
                    .filter_map(|(name, literal)| {
                        literal
                            .evaluate(variables)
                            .map(|value| (name.as_str().into(), value))
                    })
                    .collect(),
            ),
        })
    }

    /// Evaluates a literal that cannot reference variables, such as a default value.
    pub fn evaluate_const(&self) -> Value {
        self.evaluate(&Object::new()).unwrap_or(Value::Null)
    }

    pub(crate) fn from_cst(value: cst::Value) -> Result<Self, SpecError> {
        Ok(match value {
            // Spec: https://spec.graphql.org/draft/#Variable
            cst::Value::Variable(variable) => Literal::Variable(
                variable
                    .name()
                    .ok_or_else(|| {
                        SpecError::InvalidLiteral(
                            "the node Name is not optional in the GraphQL grammar; qed".to_string(),
                        )
                    })?
                    .text()
                    .to_string(),
            ),
            cst::Value::StringValue(string) => Literal::String(String::from(string)),
            cst::Value::FloatValue(float) => {
                let text = float
                    .float_token()
                    .map(|token| token.text().to_string())
                    .unwrap_or_default();
                Literal::Float(
                    text.parse()
                        .map_err(|_| SpecError::InvalidLiteral(format!("invalid float '{text}'")))?,
                )
            }
            cst::Value::IntValue(int) => {
                let text = int
                    .int_token()
                    .map(|token| token.text().to_string())
                    .unwrap_or_default();
                Literal::Int(
                    text.parse()
                        .map_err(|_| SpecError::InvalidLiteral(format!("invalid int '{text}'")))?,
                )
            }
            cst::Value::BooleanValue(boolean) => Literal::Boolean(boolean.true_token().is_some()),
            cst::Value::NullValue(_) => Literal::Null,
            cst::Value::EnumValue(value) => Literal::Enum(
                value
                    .name()
                    .ok_or_else(|| {
                        SpecError::InvalidLiteral(
                            "the node Name is not optional in the GraphQL grammar; qed".to_string(),
                        )
                    })?
                    .text()
                    .to_string(),
            ),
            cst::Value::ListValue(list) => Literal::List(
                list.values()
                    .map(Literal::from_cst)
                    .collect::<Result<_, _>>()?,
            ),
            cst::Value::ObjectValue(object) => Literal::Object(
                object
                    .object_fields()
                    .map(|field| {
                        let name = field
                            .name()
                            .ok_or_else(|| {
                                SpecError::InvalidLiteral(
                                    "the node Name is not optional in the GraphQL grammar; qed".to_string(),
                                )
                            })?
                            .text()
                            .to_string();
                        let value = field.value().ok_or_else(|| {
                            SpecError::InvalidLiteral(format!("missing value for field '{name}'"))
                        })?;
                        Ok((name, Literal::from_cst(value)?))
                    })
                    .collect::<Result<_, SpecError>>()?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    fn variables(value: Value) -> Object {
        match value {
            Value::Object(object) => object,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn evaluates_scalars() {
        let vars = Object::new();
        assert_eq!(Literal::Int(3).evaluate(&vars), Some(json!(3)));
        assert_eq!(Literal::Float(1.5).evaluate(&vars), Some(json!(1.5)));
        assert_eq!(
            Literal::String("a".to_string()).evaluate(&vars),
            Some(json!("a"))
        );
        assert_eq!(Literal::Enum("RED".to_string()).evaluate_const(), json!("RED"));
        assert_eq!(Literal::Null.evaluate(&vars), Some(Value::Null));
    }

    #[test]
    fn absent_variables() {
        let vars = variables(json!({"a": 1}));
        assert_eq!(Literal::Variable("a".to_string()).evaluate(&vars), Some(json!(1)));
        assert_eq!(Literal::Variable("b".to_string()).evaluate(&vars), None);

        let list = Literal::List(vec![
            Literal::Variable("a".to_string()),
            Literal::Variable("b".to_string()),
        ]);
        assert_eq!(list.evaluate(&vars), Some(json!([1, null])));

        let object = Literal::Object(vec![
            ("x".to_string(), Literal::Variable("a".to_string())),
            ("y".to_string(), Literal::Variable("b".to_string())),
        ]);
        assert_eq!(object.evaluate(&vars), Some(json!({"x": 1})));
    }
}
