//! JSON helpers shared by the execution engine: response paths and value checks.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// A path element in a GraphQL response: a field response key or a list index.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index into a list.
    Index(usize),

    /// The response key of a field.
    Key(String),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Index(index) => write!(f, "{index}"),
            PathElement::Key(key) => write!(f, "{key}"),
        }
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

/// A path into the result tree, identifying where a field error happened.
///
/// Serialized as the GraphQL `path` array, e.g. `["hero", "friends", 1, "name"]`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Self {
        Path(Vec::new())
    }

    /// Returns a new path with `element` appended.
    pub fn join(&self, element: impl Into<PathElement>) -> Self {
        let mut elements = Vec::with_capacity(self.0.len() + 1);
        elements.extend(self.0.iter().cloned());
        elements.push(element.into());
        Path(elements)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }
}

impl<T> From<Vec<T>> for Path
where
    T: Into<PathElement>,
{
    fn from(elements: Vec<T>) -> Self {
        Path(elements.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

/// Extension methods on JSON values.
pub trait ValueExt {
    /// Whether the value can be accepted as a GraphQL `Float`.
    fn is_valid_float_input(&self) -> bool;

    /// Returns the value as a 32-bit integer if it represents one exactly.
    fn as_i32(&self) -> Option<i32>;

    /// Equality that also requires object keys to appear in the same order.
    fn eq_and_ordered(&self, other: &Self) -> bool;
}

impl ValueExt for Value {
    fn is_valid_float_input(&self) -> bool {
        // Spec: https://spec.graphql.org/draft/#sec-Float.Input-Coercion
        self.as_f64().map(f64::is_finite).unwrap_or(false)
    }

    fn as_i32(&self) -> Option<i32> {
        if let Some(int) = self.as_i64() {
            return i32::try_from(int).ok();
        }
        if self.is_u64() {
            return self.as_u64().and_then(|int| i32::try_from(int).ok());
        }
        // integral floats such as `1.0` are accepted
        self.as_f64().and_then(|float| {
            if float.fract() == 0.0 && float >= i32::MIN as f64 && float <= i32::MAX as f64 {
                Some(float as i32)
            } else {
                None
            }
        })
    }

    fn eq_and_ordered(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((key_a, value_a), (key_b, value_b))| {
                        key_a.as_str() == key_b.as_str() && value_a.eq_and_ordered(value_b)
                    })
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(value_a, value_b)| value_a.eq_and_ordered(value_b))
            }
            (a, b) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn path_serializes_as_graphql_path() {
        let path = Path::empty().join("hero").join("friends").join(1usize).join("name");
        assert_eq!(
            serde_json::to_string(&path).unwrap(),
            r#"["hero","friends",1,"name"]"#
        );
        assert_eq!(path.to_string(), "/hero/friends/1/name");

        let parsed: Path = serde_json::from_str(r#"["a",0]"#).unwrap();
        assert_eq!(parsed, Path::from(vec![PathElement::from("a"), 0usize.into()]));
    }

    #[test]
    fn int_conversion() {
        assert_eq!(json!(1).as_i32(), Some(1));
        assert_eq!(json!(-2147483648).as_i32(), Some(i32::MIN));
        assert_eq!(json!(2147483648_i64).as_i32(), None);
        assert_eq!(json!(4.0).as_i32(), Some(4));
        assert_eq!(json!(4.5).as_i32(), None);
        assert_eq!(json!("4").as_i32(), None);
    }

    #[test]
    fn ordered_equality() {
        let a = json!({"a": 1, "b": {"c": 2, "d": 3}});
        let b = json!({"b": {"c": 2, "d": 3}, "a": 1});
        assert_eq!(a, b);
        assert!(!a.eq_and_ordered(&b));
        assert!(a.eq_and_ordered(&a.clone()));
    }
}
