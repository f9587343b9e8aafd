//! GraphQL schema: the type definitions an operation runs against, and their resolvers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use apollo_parser::cst;
use derivative::Derivative;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::json_ext::Value;
use crate::resolver::FieldResult;
use crate::resolver::Resolver;
use crate::resolver::ResolverInfo;
use crate::resolver::TypeResolver;
use crate::spec::FieldType;
use crate::spec::Literal;
use crate::spec::OperationKind;
use crate::spec::SpecError;
use crate::spec::TYPENAME;

const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// A GraphQL schema.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Schema {
    types: IndexMap<String, TypeDefinition>,
    root_operations: HashMap<OperationKind, String>,
    #[derivative(Debug = "ignore")]
    type_resolvers: HashMap<String, TypeResolver>,
}

#[derive(Debug, Clone)]
pub enum TypeDefinition {
    Scalar(String),
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    InputObject(InputObjectType),
}

impl TypeDefinition {
    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Scalar(name) => name,
            TypeDefinition::Object(object) => &object.name,
            TypeDefinition::Interface(interface) => &interface.name,
            TypeDefinition::Union(union) => &union.name,
            TypeDefinition::Enum(enum_type) => &enum_type.name,
            TypeDefinition::InputObject(input) => &input.name,
        }
    }

    /// Whether values of this type are serialized directly rather than through a selection set.
    pub fn is_leaf(&self) -> bool {
        matches!(self, TypeDefinition::Scalar(_) | TypeDefinition::Enum(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, TypeDefinition::Interface(_) | TypeDefinition::Union(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectType {
    pub name: String,
    pub implements: IndexSet<String>,
    pub fields: IndexMap<String, FieldDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct InterfaceType {
    pub name: String,
    pub implements: IndexSet<String>,
    pub fields: IndexMap<String, FieldDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct UnionType {
    pub name: String,
    pub members: IndexSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EnumType {
    pub name: String,
    pub values: IndexSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InputObjectType {
    pub name: String,
    pub fields: IndexMap<String, InputValueDefinition>,
}

/// An argument or an input object field.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDefinition {
    pub name: String,
    pub ty: FieldType,
    pub default_value: Option<Literal>,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: FieldType,
    pub arguments: IndexMap<String, InputValueDefinition>,
    #[derivative(Debug = "ignore")]
    pub(crate) resolver: Option<Arc<dyn Resolver>>,
}

impl FieldDefinition {
    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }
}

macro_rules! type_name {
    ($definition:expr) => {
        $definition
            .name()
            .ok_or_else(|| {
                SpecError::ParsingError(
                    "the node Name is not optional in the GraphQL grammar; qed".to_string(),
                )
            })?
            .text()
            .to_string()
    };
}

fn named_types(types: impl Iterator<Item = cst::NamedType>) -> IndexSet<String> {
    types
        .filter_map(|named| named.name())
        .map(|name| name.text().to_string())
        .collect()
}

fn input_values(
    definitions: impl Iterator<Item = cst::InputValueDefinition>,
) -> Result<IndexMap<String, InputValueDefinition>, SpecError> {
    definitions
        .map(|definition| {
            let name = type_name!(definition);
            let ty: FieldType = definition
                .ty()
                .ok_or_else(|| SpecError::InvalidType(format!("missing type for '{name}'")))?
                .try_into()?;
            let default_value = definition
                .default_value()
                .and_then(|default| default.value())
                .map(Literal::from_cst)
                .transpose()?;
            Ok((
                name.clone(),
                InputValueDefinition {
                    name,
                    ty,
                    default_value,
                },
            ))
        })
        .collect()
}

fn fields(
    definition: Option<cst::FieldsDefinition>,
) -> Result<IndexMap<String, FieldDefinition>, SpecError> {
    definition
        .into_iter()
        .flat_map(|fields| fields.field_definitions())
        .map(|field| {
            let name = type_name!(field);
            let ty: FieldType = field
                .ty()
                .ok_or_else(|| SpecError::InvalidType(format!("missing type for field '{name}'")))?
                .try_into()?;
            let arguments = match field.arguments_definition() {
                Some(arguments) => input_values(arguments.input_value_definitions())?,
                None => IndexMap::new(),
            };
            Ok((
                name.clone(),
                FieldDefinition {
                    name,
                    ty,
                    arguments,
                    resolver: None,
                },
            ))
        })
        .collect()
}

impl Schema {
    /// Parses a schema from SDL, including `extend` definitions.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn parse(sdl: &str) -> Result<Self, SpecError> {
        let tree = apollo_parser::Parser::new(sdl).parse();
        let errors = tree
            .errors()
            .map(|err| format!("{} at index {}", err.message(), err.index()))
            .collect::<Vec<_>>();
        if !errors.is_empty() {
            return Err(SpecError::ParsingError(errors.join(", ")));
        }

        let mut schema = Schema {
            types: BUILTIN_SCALARS
                .iter()
                .map(|name| (name.to_string(), TypeDefinition::Scalar(name.to_string())))
                .collect(),
            root_operations: HashMap::new(),
            type_resolvers: HashMap::new(),
        };

        let document = tree.document();
        // definitions first so that extensions may appear before the type they extend
        for definition in document.definitions() {
            schema.add_definition(definition, false)?;
        }
        for definition in document.definitions() {
            schema.add_definition(definition, true)?;
        }

        for kind in [
            OperationKind::Query,
            OperationKind::Mutation,
            OperationKind::Subscription,
        ] {
            if !schema.root_operations.contains_key(&kind)
                && schema.object_type(kind.default_type_name()).is_some()
            {
                schema
                    .root_operations
                    .insert(kind, kind.default_type_name().to_string());
            }
        }

        Ok(schema)
    }

    fn add_definition(
        &mut self,
        definition: cst::Definition,
        extensions: bool,
    ) -> Result<(), SpecError> {
        match (definition, extensions) {
            // Spec: https://spec.graphql.org/draft/#sec-Schema
            (cst::Definition::SchemaDefinition(schema), false) => {
                self.add_root_operations(schema.root_operation_type_definitions())
            }
            (cst::Definition::SchemaExtension(schema), true) => {
                self.add_root_operations(schema.root_operation_type_definitions())
            }
            // Spec: https://spec.graphql.org/draft/#ScalarTypeDefinition
            (cst::Definition::ScalarTypeDefinition(scalar), false) => {
                let name = type_name!(scalar);
                self.types.insert(name.clone(), TypeDefinition::Scalar(name));
            }
            // Spec: https://spec.graphql.org/draft/#ObjectTypeDefinition
            (cst::Definition::ObjectTypeDefinition(object), false) => {
                let name = type_name!(object);
                let object_type = ObjectType {
                    name: name.clone(),
                    implements: object
                        .implements_interfaces()
                        .map(|interfaces| named_types(interfaces.named_types()))
                        .unwrap_or_default(),
                    fields: fields(object.fields_definition())?,
                };
                self.types.insert(name, TypeDefinition::Object(object_type));
            }
            // Spec: https://spec.graphql.org/draft/#sec-Object-Extensions
            (cst::Definition::ObjectTypeExtension(object), true) => {
                let name = type_name!(object);
                match self.types.get_mut(&name) {
                    Some(TypeDefinition::Object(object_type)) => {
                        if let Some(interfaces) = object.implements_interfaces() {
                            object_type
                                .implements
                                .extend(named_types(interfaces.named_types()));
                        }
                        object_type.fields.extend(fields(object.fields_definition())?);
                    }
                    _ => return Err(SpecError::UnknownType(name)),
                }
            }
            // Spec: https://spec.graphql.org/draft/#InterfaceTypeDefinition
            (cst::Definition::InterfaceTypeDefinition(interface), false) => {
                let name = type_name!(interface);
                let interface_type = InterfaceType {
                    name: name.clone(),
                    implements: interface
                        .implements_interfaces()
                        .map(|interfaces| named_types(interfaces.named_types()))
                        .unwrap_or_default(),
                    fields: fields(interface.fields_definition())?,
                };
                self.types
                    .insert(name, TypeDefinition::Interface(interface_type));
            }
            // Spec: https://spec.graphql.org/draft/#sec-Interface-Extensions
            (cst::Definition::InterfaceTypeExtension(interface), true) => {
                let name = type_name!(interface);
                match self.types.get_mut(&name) {
                    Some(TypeDefinition::Interface(interface_type)) => {
                        if let Some(interfaces) = interface.implements_interfaces() {
                            interface_type
                                .implements
                                .extend(named_types(interfaces.named_types()));
                        }
                        interface_type
                            .fields
                            .extend(fields(interface.fields_definition())?);
                    }
                    _ => return Err(SpecError::UnknownType(name)),
                }
            }
            // Spec: https://spec.graphql.org/draft/#UnionTypeDefinition
            (cst::Definition::UnionTypeDefinition(union), false) => {
                let name = type_name!(union);
                let members = union
                    .union_member_types()
                    .map(|members| named_types(members.named_types()))
                    .unwrap_or_default();
                self.types.insert(
                    name.clone(),
                    TypeDefinition::Union(UnionType { name, members }),
                );
            }
            // Spec: https://spec.graphql.org/draft/#sec-Union-Extensions
            (cst::Definition::UnionTypeExtension(union), true) => {
                let name = type_name!(union);
                match self.types.get_mut(&name) {
                    Some(TypeDefinition::Union(union_type)) => {
                        if let Some(members) = union.union_member_types() {
                            union_type.members.extend(named_types(members.named_types()));
                        }
                    }
                    _ => return Err(SpecError::UnknownType(name)),
                }
            }
            // Spec: https://spec.graphql.org/draft/#EnumTypeDefinition
            (cst::Definition::EnumTypeDefinition(enum_definition), false) => {
                let name = type_name!(enum_definition);
                let values = Self::enum_values(enum_definition.enum_values_definition());
                self.types
                    .insert(name.clone(), TypeDefinition::Enum(EnumType { name, values }));
            }
            // Spec: https://spec.graphql.org/draft/#sec-Enum-Extensions
            (cst::Definition::EnumTypeExtension(enum_extension), true) => {
                let name = type_name!(enum_extension);
                match self.types.get_mut(&name) {
                    Some(TypeDefinition::Enum(enum_type)) => enum_type
                        .values
                        .extend(Self::enum_values(enum_extension.enum_values_definition())),
                    _ => return Err(SpecError::UnknownType(name)),
                }
            }
            // Spec: https://spec.graphql.org/draft/#InputObjectTypeDefinition
            (cst::Definition::InputObjectTypeDefinition(input), false) => {
                let name = type_name!(input);
                let fields = match input.input_fields_definition() {
                    Some(definition) => input_values(definition.input_value_definitions())?,
                    None => IndexMap::new(),
                };
                self.types.insert(
                    name.clone(),
                    TypeDefinition::InputObject(InputObjectType { name, fields }),
                );
            }
            // Spec: https://spec.graphql.org/draft/#sec-Input-Object-Extensions
            (cst::Definition::InputObjectTypeExtension(input), true) => {
                let name = type_name!(input);
                match self.types.get_mut(&name) {
                    Some(TypeDefinition::InputObject(input_type)) => {
                        if let Some(definition) = input.input_fields_definition() {
                            input_type
                                .fields
                                .extend(input_values(definition.input_value_definitions())?);
                        }
                    }
                    _ => return Err(SpecError::UnknownType(name)),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn add_root_operations(
        &mut self,
        definitions: impl Iterator<Item = cst::RootOperationTypeDefinition>,
    ) {
        for definition in definitions {
            let type_name = definition
                .named_type()
                .and_then(|named| named.name())
                .map(|name| name.text().to_string());
            if let (Some(operation_type), Some(type_name)) =
                (definition.operation_type(), type_name)
            {
                self.root_operations
                    .insert(OperationKind::from(operation_type), type_name);
            }
        }
    }

    fn enum_values(definition: Option<cst::EnumValuesDefinition>) -> IndexSet<String> {
        definition
            .into_iter()
            .flat_map(|values| values.enum_value_definitions())
            .filter_map(|value| value.enum_value())
            .filter_map(|value| value.name())
            .map(|name| name.text().to_string())
            .collect()
    }

    /// Registers the resolver of `type_name.field_name`.
    ///
    /// Fields without a resolver read the property of the same name on their parent value.
    pub fn register_resolver<F, Fut>(
        &mut self,
        type_name: &str,
        field_name: &str,
        resolver: F,
    ) -> Result<&mut Self, SpecError>
    where
        F: Fn(ResolverInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FieldResult> + Send + 'static,
    {
        self.register_dyn_resolver(type_name, field_name, Arc::new(resolver))
    }

    /// Registers an already boxed resolver, such as a type implementing [`Resolver`].
    pub fn register_dyn_resolver(
        &mut self,
        type_name: &str,
        field_name: &str,
        resolver: Arc<dyn Resolver>,
    ) -> Result<&mut Self, SpecError> {
        let field = match self.types.get_mut(type_name) {
            Some(TypeDefinition::Object(object)) => object.fields.get_mut(field_name),
            Some(_) => return Err(SpecError::InvalidType(type_name.to_string())),
            None => return Err(SpecError::UnknownType(type_name.to_string())),
        }
        .ok_or_else(|| SpecError::InvalidField(field_name.to_string(), type_name.to_string()))?;
        field.resolver = Some(resolver);
        Ok(self)
    }

    /// Registers how the concrete object type of an interface or union value is determined.
    ///
    /// Without one, the value's `__typename` property is used.
    pub fn register_type_resolver<F>(
        &mut self,
        abstract_type: &str,
        resolver: F,
    ) -> Result<&mut Self, SpecError>
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        match self.types.get(abstract_type) {
            Some(definition) if definition.is_abstract() => {}
            Some(_) => return Err(SpecError::InvalidType(abstract_type.to_string())),
            None => return Err(SpecError::UnknownType(abstract_type.to_string())),
        }
        self.type_resolvers
            .insert(abstract_type.to_string(), Arc::new(resolver));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        match self.types.get(name) {
            Some(TypeDefinition::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// The root object type for an operation kind.
    pub fn root_type(&self, kind: OperationKind) -> Option<&ObjectType> {
        self.root_operations
            .get(&kind)
            .and_then(|name| self.object_type(name))
    }

    /// Whether the object type `object_type` is a possible type of `abstract_type`.
    pub fn is_possible_type(&self, abstract_type: &str, object_type: &str) -> bool {
        match self.types.get(abstract_type) {
            Some(TypeDefinition::Interface(_)) => self
                .object_type(object_type)
                .map(|object| object.implements.contains(abstract_type))
                .unwrap_or(false),
            Some(TypeDefinition::Union(union)) => union.members.contains(object_type),
            _ => false,
        }
    }

    /// Runtime type condition check for fragments.
    pub fn does_fragment_type_apply(&self, object_type: &str, type_condition: &str) -> bool {
        object_type == type_condition || self.is_possible_type(type_condition, object_type)
    }

    /// Determines the concrete object type of a value whose declared type is `abstract_type`.
    pub fn resolve_abstract_type(&self, abstract_type: &str, value: &Value) -> Option<String> {
        match self.type_resolvers.get(abstract_type) {
            Some(resolver) => resolver(value),
            None => value
                .as_object()
                .and_then(|object| object.get(TYPENAME))
                .and_then(|typename| typename.as_str())
                .map(str::to_string),
        }
    }
}

impl std::str::FromStr for Schema {
    type Err = SpecError;

    fn from_str(sdl: &str) -> Result<Self, Self::Err> {
        Schema::parse(sdl)
    }
}
