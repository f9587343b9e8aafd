use std::collections::HashMap;

use apollo_parser::cst;
use indexmap::IndexMap;

use crate::error::PreparationError;
use crate::spec::Definition;
use crate::spec::FragmentDefinition;
use crate::spec::LineIndex;
use crate::spec::OperationDefinition;
use crate::spec::SpecError;

/// The executable definitions of one query text.
///
/// A document is never mutated once built and can be shared between any number of
/// concurrent executions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fragments: HashMap<String, FragmentDefinition>,
    /// Keyed by operation name, the anonymous operation under `""`.
    operations: IndexMap<String, OperationDefinition>,
}

impl Document {
    /// Builds a document from already parsed definitions.
    ///
    /// A definition with the same name as an earlier one replaces it.
    pub fn new(definitions: impl IntoIterator<Item = Definition>) -> Self {
        let mut document = Document::default();
        for definition in definitions {
            match definition {
                Definition::Operation(operation) => {
                    let key = operation.name.clone().unwrap_or_default();
                    document.operations.insert(key, operation);
                }
                Definition::Fragment(fragment) => {
                    document.fragments.insert(fragment.name.clone(), fragment);
                }
            }
        }
        document
    }

    /// Parses query text. Type system definitions are ignored.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn parse(query: &str) -> Result<Self, SpecError> {
        let tree = apollo_parser::Parser::new(query).parse();
        let errors = tree
            .errors()
            .map(|err| format!("{} at index {}", err.message(), err.index()))
            .collect::<Vec<_>>();

        if !errors.is_empty() {
            tracing::debug!("parsing error(s): {}", errors.join(", "));
            return Err(SpecError::ParsingError(errors.join(", ")));
        }

        let index = LineIndex::new(query);
        let definitions = tree
            .document()
            .definitions()
            .filter_map(|definition| match definition {
                // Spec: https://spec.graphql.org/draft/#OperationDefinition
                cst::Definition::OperationDefinition(operation) => Some(
                    OperationDefinition::from_cst(operation, &index).map(Definition::Operation),
                ),
                // Spec: https://spec.graphql.org/draft/#FragmentDefinition
                cst::Definition::FragmentDefinition(fragment) => Some(
                    FragmentDefinition::from_cst(fragment, &index).map(Definition::Fragment),
                ),
                _ => None,
            })
            .collect::<Result<Vec<_>, SpecError>>()?;

        Ok(Document::new(definitions))
    }

    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.get(name)
    }

    pub fn fragments(&self) -> impl Iterator<Item = &FragmentDefinition> {
        self.fragments.values()
    }

    /// Looks an operation up by name. `None` designates the anonymous operation.
    pub fn operation(&self, name: Option<&str>) -> Option<&OperationDefinition> {
        self.operations.get(name.unwrap_or_default())
    }

    /// All operations, in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.operations.values()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Picks the operation to execute.
    ///
    /// A document with a single operation always runs it, whatever name was
    /// requested. An empty document selects nothing. Otherwise the requested name
    /// must match one of the operations.
    pub fn select_operation(
        &self,
        operation_name: Option<&str>,
    ) -> Result<Option<&OperationDefinition>, PreparationError> {
        match self.operation_count() {
            0 => Ok(None),
            1 => Ok(self.operations.values().next()),
            _ => match operation_name.filter(|name| !name.is_empty()) {
                Some(name) if self.operations.contains_key(name) => {
                    Ok(self.operations.get(name))
                }
                _ => Err(PreparationError::OperationNameMissing {
                    requested: operation_name.map(str::to_string),
                    available: self.operations.keys().cloned().collect(),
                }),
            },
        }
    }
}

impl std::str::FromStr for Document {
    type Err = SpecError;

    fn from_str(query: &str) -> Result<Self, Self::Err> {
        Document::parse(query)
    }
}
