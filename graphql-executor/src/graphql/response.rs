use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::graphql::Error;
use crate::json_ext::Object;

/// A GraphQL response.
///
/// `data` is absent when execution never started (preparation, validation or
/// variable errors) and `null` when a non-null error reached the root.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

impl Response {
    /// A response holding only errors.
    pub fn from_errors(errors: Vec<Error>) -> Self {
        Response {
            data: None,
            errors,
            extensions: Object::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn error_only_response_has_no_data_key() {
        let response = Response::from_errors(vec![Error::builder().message("bad").build()]);
        assert_eq!(
            response.to_json().unwrap(),
            r#"{"errors":[{"message":"bad"}]}"#
        );
    }

    #[test]
    fn null_data_is_serialized() {
        let response = Response {
            data: Some(Value::Null),
            ..Default::default()
        };
        assert_eq!(response.to_json().unwrap(), r#"{"data":null}"#);

        let response = Response {
            data: Some(json!({"a": 1})),
            ..Default::default()
        };
        assert!(response.is_ok());
        assert_eq!(response.to_json().unwrap(), r#"{"data":{"a":1}}"#);
    }
}
