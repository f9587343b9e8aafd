//! Static validation hook run once when a document is prepared.
use crate::graphql::Error;
use crate::spec::Document;
use crate::spec::Schema;

/// Checks a document against schema rules before any execution.
///
/// A non-empty result stops execution: the caller gets these errors and no `data`.
pub trait DocumentValidator: Send + Sync {
    fn validate(&self, document: &Document, schema: &Schema) -> Vec<Error>;
}

impl<F> DocumentValidator for F
where
    F: Fn(&Document, &Schema) -> Vec<Error> + Send + Sync,
{
    fn validate(&self, document: &Document, schema: &Schema) -> Vec<Error> {
        self(document, schema)
    }
}
