use apollo_parser::cst;
use apollo_parser::cst::CstNode;

use crate::graphql::Location;
use crate::json_ext::Object;
use crate::spec::LineIndex;
use crate::spec::Literal;
use crate::spec::SpecError;

/// A node of a selection set.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
    pub location: Option<Location>,
}

impl Field {
    /// The key under which this field appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub location: Option<Location>,
}

impl Directive {
    /// Evaluates the directive arguments. Arguments bound to an absent variable are left out.
    pub fn evaluate_arguments(&self, variables: &Object) -> Object {
        self.arguments
            .iter()
            .filter_map(|argument| {
                argument
                    .value
                    .evaluate(variables)
                    .map(|value| (argument.name.as_str().into(), value))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub fragment_name: String,
    pub directives: Vec<Directive>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    /// `None` when the fragment has no type condition and applies to the enclosing type.
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
    pub location: Option<Location>,
}

fn name_of(name: Option<cst::Name>) -> Result<String, SpecError> {
    Ok(name
        .ok_or_else(|| {
            SpecError::ParsingError(
                "the node Name is not optional in the GraphQL grammar; qed".to_string(),
            )
        })?
        .text()
        .to_string())
}

pub(crate) fn selection_set_from_cst(
    selection_set: Option<cst::SelectionSet>,
    index: &LineIndex<'_>,
) -> Result<Vec<Selection>, SpecError> {
    selection_set
        .map(|set| {
            set.selections()
                .map(|selection| Selection::from_cst(selection, index))
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

pub(crate) fn arguments_from_cst(
    arguments: Option<cst::Arguments>,
) -> Result<Vec<Argument>, SpecError> {
    arguments
        .map(|arguments| {
            arguments
                .arguments()
                .map(|argument| {
                    let name = name_of(argument.name())?;
                    let value = argument.value().ok_or_else(|| {
                        SpecError::ParsingError(format!("missing value for argument '{name}'"))
                    })?;
                    Ok(Argument {
                        name,
                        value: Literal::from_cst(value)?,
                    })
                })
                .collect::<Result<Vec<_>, SpecError>>()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

pub(crate) fn directives_from_cst(
    directives: Option<cst::Directives>,
    index: &LineIndex<'_>,
) -> Result<Vec<Directive>, SpecError> {
    directives
        .map(|directives| {
            directives
                .directives()
                .map(|directive| {
                    Ok(Directive {
                        name: name_of(directive.name())?,
                        arguments: arguments_from_cst(directive.arguments())?,
                        location: index.node_location(directive.syntax()),
                    })
                })
                .collect::<Result<Vec<_>, SpecError>>()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

impl Selection {
    pub(crate) fn from_cst(
        selection: cst::Selection,
        index: &LineIndex<'_>,
    ) -> Result<Self, SpecError> {
        Ok(match selection {
            // Spec: https://spec.graphql.org/draft/#Field
            cst::Selection::Field(field) => Selection::Field(Field {
                alias: field
                    .alias()
                    .map(|alias| name_of(alias.name()))
                    .transpose()?,
                name: name_of(field.name())?,
                arguments: arguments_from_cst(field.arguments())?,
                directives: directives_from_cst(field.directives(), index)?,
                selection_set: selection_set_from_cst(field.selection_set(), index)?,
                location: index.node_location(field.syntax()),
            }),
            // Spec: https://spec.graphql.org/draft/#FragmentSpread
            cst::Selection::FragmentSpread(spread) => {
                let fragment_name = spread.fragment_name().ok_or_else(|| {
                    SpecError::ParsingError(
                        "the node FragmentName is not optional in the GraphQL grammar; qed".to_string(),
                    )
                })?;
                Selection::FragmentSpread(FragmentSpread {
                    fragment_name: name_of(fragment_name.name())?,
                    directives: directives_from_cst(spread.directives(), index)?,
                    location: index.node_location(spread.syntax()),
                })
            }
            // Spec: https://spec.graphql.org/draft/#InlineFragment
            cst::Selection::InlineFragment(inline) => Selection::InlineFragment(InlineFragment {
                type_condition: inline
                    .type_condition()
                    .and_then(|condition| condition.named_type())
                    .map(|named| name_of(named.name()))
                    .transpose()?,
                directives: directives_from_cst(inline.directives(), index)?,
                selection_set: selection_set_from_cst(inline.selection_set(), index)?,
                location: index.node_location(inline.syntax()),
            }),
        })
    }

    pub fn directives(&self) -> &[Directive] {
        match self {
            Selection::Field(field) => &field.directives,
            Selection::FragmentSpread(spread) => &spread.directives,
            Selection::InlineFragment(inline) => &inline.directives,
        }
    }
}
