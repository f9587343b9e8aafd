//! The lookup contract between the executor and an operation-name query store.
use std::sync::Arc;

use crate::spec::Document;
use crate::spec::SpecError;

/// A store of parsed documents keyed by operation name.
///
/// Storage and eviction belong to the implementation. The executor only calls
/// [`QueryCache::fetch`], when a request carries an operation name but no query
/// text.
pub trait QueryCache: Send + Sync {
    /// Returns the document registered under `operation_name`.
    fn fetch(&self, operation_name: &str) -> Option<Arc<Document>>;

    /// Parses `query` and registers it under `operation_name`.
    fn store(&self, operation_name: &str, query: &str) -> Result<(), SpecError>;
}
