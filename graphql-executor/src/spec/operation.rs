use apollo_parser::cst;
use apollo_parser::cst::CstNode;
use serde::Deserialize;
use serde::Serialize;

use crate::graphql::Location;
use crate::spec::FieldType;
use crate::spec::LineIndex;
use crate::spec::Literal;
use crate::spec::Selection;
use crate::spec::SpecError;
use crate::spec::selection::directives_from_cst;
use crate::spec::selection::selection_set_from_cst;
use crate::spec::Directive;

/// The type of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }

    /// Default name of the root type for this kind.
    pub const fn default_type_name(&self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<cst::OperationType> for OperationKind {
    // Spec: https://spec.graphql.org/draft/#OperationType
    fn from(operation_type: cst::OperationType) -> Self {
        if operation_type.mutation_token().is_some() {
            OperationKind::Mutation
        } else if operation_type.subscription_token().is_some() {
            OperationKind::Subscription
        } else {
            OperationKind::Query
        }
    }
}

/// A declared `$variable` of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: FieldType,
    pub default_value: Option<Literal>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    /// `None` for an anonymous operation.
    pub name: Option<String>,
    pub kind: OperationKind,
    /// Declared variables, in declaration order.
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
    pub location: Option<Location>,
}

impl OperationDefinition {
    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub(crate) fn from_cst(
        operation: cst::OperationDefinition,
        index: &LineIndex<'_>,
    ) -> Result<Self, SpecError> {
        let variables = operation
            .variable_definitions()
            .map(|definitions| {
                definitions
                    .variable_definitions()
                    .map(|definition| VariableDefinition::from_cst(definition, index))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(OperationDefinition {
            name: operation.name().map(|name| name.text().to_string()),
            kind: operation
                .operation_type()
                .map(OperationKind::from)
                .unwrap_or(OperationKind::Query),
            variables,
            directives: directives_from_cst(operation.directives(), index)?,
            selection_set: selection_set_from_cst(operation.selection_set(), index)?,
            location: index.node_location(operation.syntax()),
        })
    }
}

impl VariableDefinition {
    fn from_cst(
        definition: cst::VariableDefinition,
        index: &LineIndex<'_>,
    ) -> Result<Self, SpecError> {
        let name = definition
            .variable()
            .and_then(|variable| variable.name())
            .ok_or_else(|| {
                SpecError::ParsingError(
                    "the node Variable is not optional in the GraphQL grammar; qed".to_string(),
                )
            })?
            .text()
            .to_string();
        let ty: FieldType = definition
            .ty()
            .ok_or_else(|| {
                SpecError::InvalidType(format!("missing type for variable '${name}'"))
            })?
            .try_into()?;
        let default_value = definition
            .default_value()
            .and_then(|default| default.value())
            .map(Literal::from_cst)
            .transpose()?;

        Ok(VariableDefinition {
            name,
            ty,
            default_value,
            location: index.node_location(definition.syntax()),
        })
    }
}

/// A named fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
    pub location: Option<Location>,
}

impl FragmentDefinition {
    pub(crate) fn from_cst(
        fragment: cst::FragmentDefinition,
        index: &LineIndex<'_>,
    ) -> Result<Self, SpecError> {
        let name = fragment
            .fragment_name()
            .and_then(|name| name.name())
            .ok_or_else(|| {
                SpecError::ParsingError(
                    "the node FragmentName is not optional in the GraphQL grammar; qed".to_string(),
                )
            })?
            .text()
            .to_string();
        let type_condition = fragment
            .type_condition()
            .and_then(|condition| condition.named_type())
            .and_then(|named| named.name())
            .ok_or_else(|| {
                SpecError::ParsingError(format!(
                    "fragment '{name}' must specify the type it applies to"
                ))
            })?
            .text()
            .to_string();

        Ok(FragmentDefinition {
            name,
            type_condition,
            directives: directives_from_cst(fragment.directives(), index)?,
            selection_set: selection_set_from_cst(fragment.selection_set(), index)?,
            location: index.node_location(fragment.syntax()),
        })
    }
}

/// A top-level executable definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
}
