//! The executable document model and the type system it runs against.

mod document;
mod field_type;
mod literal;
mod operation;
mod schema;
mod selection;

use displaydoc::Display;
pub use document::Document;
pub use field_type::FieldType;
pub use field_type::InvalidValue;
pub use literal::Literal;
pub use operation::Definition;
pub use operation::FragmentDefinition;
pub use operation::OperationDefinition;
pub use operation::OperationKind;
pub use operation::VariableDefinition;
pub use schema::EnumType;
pub use schema::FieldDefinition;
pub use schema::InputObjectType;
pub use schema::InputValueDefinition;
pub use schema::InterfaceType;
pub use schema::ObjectType;
pub use schema::Schema;
pub use schema::TypeDefinition;
pub use schema::UnionType;
pub use selection::Argument;
pub use selection::Directive;
pub use selection::Field;
pub use selection::FragmentSpread;
pub use selection::InlineFragment;
pub use selection::Selection;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::graphql::ErrorExtension;
use crate::graphql::Location;
use crate::json_ext::Object;

pub const TYPENAME: &str = "__typename";

/// GraphQL document and schema construction errors.
#[derive(Error, Debug, Display, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SpecError {
    /// selection processing recursion limit exceeded
    RecursionLimitExceeded,
    /// invalid type error, expected another type than '{0}'
    InvalidType(String),
    /// cannot query field '{0}' on type '{1}'
    InvalidField(String, String),
    /// parsing error: {0}
    ParsingError(String),
    /// invalid literal: {0}
    InvalidLiteral(String),
    /// unknown type '{0}'
    UnknownType(String),
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        match self {
            SpecError::RecursionLimitExceeded => "RECURSION_LIMIT_EXCEEDED",
            SpecError::InvalidType(_) => "INVALID_TYPE",
            SpecError::InvalidField(_, _) => "INVALID_FIELD",
            SpecError::ParsingError(_) => "PARSING_ERROR",
            SpecError::InvalidLiteral(_) => "INVALID_LITERAL",
            SpecError::UnknownType(_) => "UNKNOWN_TYPE",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut obj = Object::new();
        match self {
            SpecError::InvalidType(ty) | SpecError::UnknownType(ty) => {
                obj.insert("type", ty.clone().into());
            }
            SpecError::InvalidField(field, ty) => {
                obj.insert("type", ty.clone().into());
                obj.insert("field", field.clone().into());
            }
            _ => (),
        }

        (!obj.is_empty()).then_some(obj)
    }
}

/// Maps byte offsets of a source text to 1-based line/column locations.
pub(crate) struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(index, _)| index + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    pub(crate) fn location(&self, offset: usize) -> Location {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let start = self.line_starts.get(line).copied().unwrap_or_default();
        let column = self
            .source
            .get(start..offset)
            .map(|text| text.chars().count())
            .unwrap_or_default();
        Location {
            line: (line + 1) as u32,
            column: (column + 1) as u32,
        }
    }

    /// Location of the first significant token of a CST node.
    pub(crate) fn node_location(&self, node: &apollo_parser::SyntaxNode) -> Option<Location> {
        node.descendants_with_tokens()
            .filter_map(|element| element.into_token())
            .find(|token| {
                let text = token.text();
                !(text.trim().is_empty() || text == "," || text.starts_with('#'))
            })
            .map(|token| self.location(u32::from(token.text_range().start()) as usize))
    }
}
