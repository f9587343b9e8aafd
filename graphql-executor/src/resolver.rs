//! Field resolvers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::BoxError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// The outcome of a resolver.
pub type FieldResult = Result<Value, FieldError>;

/// Determines the concrete object type of an interface or union value.
pub type TypeResolver = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Everything a resolver gets to compute the value of one field.
#[derive(Clone, Debug)]
pub struct ResolverInfo {
    /// The value the parent field resolved to, or the root value.
    pub parent: Arc<Value>,
    /// Coerced arguments, including defaults.
    pub arguments: Object,
    pub context: Context,
    /// Path of the field in the response.
    pub path: Path,
    pub field_name: String,
    /// The object type the field belongs to.
    pub parent_type: String,
}

impl ResolverInfo {
    /// Deserializes an argument. Returns `Ok(None)` when the argument has no value.
    pub fn argument<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, FieldError> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json_bytes::from_value(value.clone())
                .map(Some)
                .map_err(|err| FieldError::new(format!("invalid argument '{name}': {err}"))),
        }
    }
}

/// An error returned by a resolver.
///
/// The executor adds the field location and response path when turning it into a
/// GraphQL error.
#[derive(Clone, Debug, Default, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FieldError {
    pub message: String,
    pub extensions: Object,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        FieldError {
            message: message.into(),
            extensions: Object::new(),
        }
    }

    pub fn with_extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extensions.insert(key, value.into());
        self
    }
}

impl From<BoxError> for FieldError {
    fn from(err: BoxError) -> Self {
        FieldError::new(err.to_string())
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        FieldError::new(message)
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        FieldError::new(message)
    }
}

/// Computes the value of a field.
///
/// Implemented for any `Fn(ResolverInfo) -> impl Future<Output = FieldResult>`.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, info: ResolverInfo) -> FieldResult;
}

#[async_trait]
impl<F, Fut> Resolver for F
where
    F: Fn(ResolverInfo) -> Fut + Send + Sync,
    Fut: Future<Output = FieldResult> + Send + 'static,
{
    async fn resolve(&self, info: ResolverInfo) -> FieldResult {
        (self)(info).await
    }
}

/// Adapts a blocking function into a resolver running on tokio's blocking thread pool.
pub fn blocking<F>(
    f: F,
) -> impl Fn(ResolverInfo) -> BoxFuture<'static, FieldResult> + Send + Sync + 'static
where
    F: Fn(ResolverInfo) -> FieldResult + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |info| {
        let f = f.clone();
        async move {
            tokio::task::spawn_blocking(move || f(info))
                .await
                .unwrap_or_else(|err| Err(FieldError::new(format!("resolver task failed: {err}"))))
        }
        .boxed()
    }
}

/// Resolves a field that has no registered resolver: reads the property of the
/// same name on the parent object.
pub(crate) fn default_resolve(parent: &Value, field_name: &str) -> Value {
    parent
        .as_object()
        .and_then(|object| object.get(field_name))
        .cloned()
        .unwrap_or(Value::Null)
}
