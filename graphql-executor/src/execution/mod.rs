//! Execution of one operation: field collection, resolution and value completion.

mod arguments;
mod strategy;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::Mutex;
pub use strategy::ConcurrentStrategy;
pub use strategy::ExecutionStrategy;
pub use strategy::FieldOutcome;
pub use strategy::SerialStrategy;
use strategy::Propagate;
use tokio::sync::Semaphore;

use crate::configuration::Configuration;
use crate::context::Context;
use crate::directives::DirectiveChain;
use crate::graphql::Error;
use crate::graphql::Location;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::json_ext::Value;
use crate::resolver::FieldError;
use crate::resolver::ResolverInfo;
use crate::resolver::default_resolve;
use crate::spec::Document;
use crate::spec::Field;
use crate::spec::FieldType;
use crate::spec::ObjectType;
use crate::spec::OperationDefinition;
use crate::spec::Schema;
use crate::spec::Selection;
use crate::spec::SpecError;
use crate::spec::TYPENAME;
use crate::spec::TypeDefinition;

type FieldCompletion = Result<Value, Propagate>;

/// Errors recorded while executing, shared by concurrently running fields.
#[derive(Default)]
struct ErrorCollector {
    errors: Mutex<Vec<Error>>,
}

impl ErrorCollector {
    fn push(&self, error: Error) {
        self.errors.lock().push(error);
    }

    fn take(&self) -> Vec<Error> {
        std::mem::take(&mut *self.errors.lock())
    }
}

/// Where `path` points to in the response, as the index of each step in its
/// parent object or list. Steps below a nulled parent sort last.
fn response_position(data: &Value, path: &Path) -> Vec<usize> {
    let mut current = Some(data);
    path.iter()
        .map(|element| {
            let (position, next) = match (element, current) {
                (PathElement::Key(key), Some(Value::Object(object))) => object
                    .iter()
                    .enumerate()
                    .find(|(_, (name, _))| name.as_str() == key.as_str())
                    .map(|(position, (_, value))| (position, Some(value)))
                    .unwrap_or((usize::MAX, None)),
                (PathElement::Index(index), Some(Value::Array(items))) => {
                    (*index, items.get(*index))
                }
                _ => (usize::MAX, None),
            };
            current = next;
            position
        })
        .collect()
}

/// The result tree and the field errors of one run.
#[derive(Debug)]
pub(crate) struct RunOutput {
    pub(crate) data: Value,
    pub(crate) errors: Vec<Error>,
}

/// The state of one execution of an operation.
///
/// A run borrows the shared, immutable document and schema and owns everything
/// that is specific to one call. It is dropped once the call returns.
pub(crate) struct Run<'a> {
    schema: &'a Schema,
    document: &'a Document,
    operation: &'a OperationDefinition,
    root_type: &'a ObjectType,
    variables: Object,
    context: Context,
    directives: &'a DirectiveChain,
    configuration: &'a Configuration,
    root_strategy: Arc<dyn ExecutionStrategy>,
    nested_strategy: Arc<dyn ExecutionStrategy>,
    root_value: Arc<Value>,
    errors: ErrorCollector,
    in_flight: Semaphore,
    aborted: AtomicBool,
}

impl<'a> Run<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        schema: &'a Schema,
        document: &'a Document,
        operation: &'a OperationDefinition,
        root_type: &'a ObjectType,
        variables: Object,
        context: Context,
        directives: &'a DirectiveChain,
        configuration: &'a Configuration,
        root_strategy: Arc<dyn ExecutionStrategy>,
        nested_strategy: Arc<dyn ExecutionStrategy>,
        root_value: Arc<Value>,
    ) -> Self {
        Run {
            schema,
            document,
            operation,
            root_type,
            variables,
            context,
            directives,
            configuration,
            root_strategy,
            nested_strategy,
            root_value,
            errors: ErrorCollector::default(),
            in_flight: Semaphore::new(configuration.max_in_flight_resolvers.max(1)),
            aborted: AtomicBool::new(false),
        }
    }

    pub(crate) async fn execute(self) -> RunOutput {
        let selections = self.operation.selection_set.iter().collect::<Vec<_>>();
        let data = self
            .execute_selection_set(
                self.root_type,
                self.root_value.clone(),
                selections,
                Path::empty(),
                0,
                self.root_strategy.as_ref(),
            )
            .await
            // a non-null violation that reached the root nulls out all data
            .unwrap_or(Value::Null);

        let mut errors = self.errors.take();
        // concurrently executed fields record their errors in completion order
        errors.sort_by_cached_key(|error| {
            let path = error.path.clone().unwrap_or_default();
            (response_position(&data, &path), path.to_string(), error.message.clone())
        });

        RunOutput { data, errors }
    }

    fn record(
        &self,
        message: String,
        location: Option<Location>,
        path: &Path,
        extensions: Object,
    ) {
        tracing::debug!(path = %path, "field error: {}", message);
        if self.configuration.debug {
            self.aborted.store(true, Ordering::SeqCst);
        }
        self.errors.push(Error {
            message,
            locations: location.into_iter().collect(),
            path: Some(path.clone()),
            extensions,
        });
    }

    fn record_with_code(
        &self,
        message: String,
        code: &str,
        location: Option<Location>,
        path: &Path,
    ) {
        let mut extensions = Object::new();
        extensions.insert("code", Value::String(code.to_string().into()));
        self.record(message, location, path, extensions);
    }

    fn record_field_error(&self, error: FieldError, location: Option<Location>, path: &Path) {
        self.record(error.message, location, path, error.extensions);
    }

    /// Groups the fields of a selection set by response key, expanding fragments
    /// whose type condition applies to `object_type`.
    fn collect_fields<'b>(
        &'b self,
        object_type: &ObjectType,
        selections: Vec<&'b Selection>,
        path: &Path,
        visited_fragments: &mut HashSet<&'b str>,
        fields: &mut IndexMap<&'b str, Vec<&'b Field>>,
    ) {
        for selection in selections {
            match self
                .directives
                .include(selection.directives(), &self.variables, &self.context)
            {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    let location = selection
                        .directives()
                        .first()
                        .and_then(|directive| directive.location);
                    self.record_field_error(err, location, path);
                    continue;
                }
            }

            match selection {
                Selection::Field(field) => {
                    fields.entry(field.response_key()).or_default().push(field);
                }
                Selection::FragmentSpread(spread) => {
                    if !visited_fragments.insert(spread.fragment_name.as_str()) {
                        continue;
                    }
                    let Some(fragment) = self.document.fragment(&spread.fragment_name) else {
                        self.record(
                            format!("Unknown fragment \"{}\".", spread.fragment_name),
                            spread.location,
                            path,
                            Object::new(),
                        );
                        continue;
                    };
                    if self
                        .schema
                        .does_fragment_type_apply(&object_type.name, &fragment.type_condition)
                    {
                        self.collect_fields(
                            object_type,
                            fragment.selection_set.iter().collect(),
                            path,
                            visited_fragments,
                            fields,
                        );
                    }
                }
                Selection::InlineFragment(inline) => {
                    let applies = inline
                        .type_condition
                        .as_deref()
                        .map(|condition| {
                            self.schema
                                .does_fragment_type_apply(&object_type.name, condition)
                        })
                        .unwrap_or(true);
                    if applies {
                        self.collect_fields(
                            object_type,
                            inline.selection_set.iter().collect(),
                            path,
                            visited_fragments,
                            fields,
                        );
                    }
                }
            }
        }
    }

    fn execute_selection_set<'b>(
        &'b self,
        object_type: &'b ObjectType,
        parent: Arc<Value>,
        selections: Vec<&'b Selection>,
        path: Path,
        depth: usize,
        strategy: &'b dyn ExecutionStrategy,
    ) -> BoxFuture<'b, FieldCompletion> {
        async move {
            if depth > self.configuration.recursion_limit {
                self.record_with_code(
                    SpecError::RecursionLimitExceeded.to_string(),
                    "RECURSION_LIMIT_EXCEEDED",
                    None,
                    &path,
                );
                return Err(Propagate);
            }

            let mut grouped = IndexMap::new();
            self.collect_fields(
                object_type,
                selections,
                &path,
                &mut HashSet::new(),
                &mut grouped,
            );

            let keys = grouped.keys().copied().collect::<Vec<_>>();
            let work = grouped
                .into_iter()
                .map(|(key, fields)| {
                    self.execute_field(
                        object_type,
                        parent.clone(),
                        fields,
                        path.join(key),
                        depth,
                    )
                    .map(FieldOutcome)
                    .boxed()
                })
                .collect::<Vec<_>>();

            let outcomes = strategy.schedule(work).await;

            let mut object = Object::new();
            for (key, FieldOutcome(outcome)) in keys.into_iter().zip(outcomes) {
                object.insert(key, outcome?);
            }
            Ok(Value::Object(object))
        }
        .boxed()
    }

    fn execute_field<'b>(
        &'b self,
        object_type: &'b ObjectType,
        parent: Arc<Value>,
        fields: Vec<&'b Field>,
        path: Path,
        depth: usize,
    ) -> BoxFuture<'b, FieldCompletion> {
        async move {
            let Some(field) = fields.first().copied() else {
                return Ok(Value::Null);
            };

            if field.name == TYPENAME {
                return Ok(Value::String(object_type.name.clone().into()));
            }

            let Some(definition) = object_type.fields.get(&field.name) else {
                self.record_with_code(
                    format!(
                        "Cannot query field \"{}\" on type \"{}\".",
                        field.name, object_type.name
                    ),
                    "INVALID_FIELD",
                    field.location,
                    &path,
                );
                return Ok(Value::Null);
            };
            let null_or_propagate = || {
                if definition.ty.is_non_null() {
                    Err(Propagate)
                } else {
                    Ok(Value::Null)
                }
            };

            let arguments = match arguments::coerce_arguments(
                field,
                definition,
                &self.variables,
                self.schema,
            ) {
                Ok(arguments) => arguments,
                Err(err) => {
                    self.record_with_code(
                        err.to_string(),
                        "INVALID_ARGUMENT",
                        field.location,
                        &path,
                    );
                    return null_or_propagate();
                }
            };

            let resolved = match &definition.resolver {
                Some(resolver) => {
                    let permit = match self.in_flight.acquire().await {
                        Ok(permit) => permit,
                        Err(err) => {
                            self.record(err.to_string(), field.location, &path, Object::new());
                            return null_or_propagate();
                        }
                    };
                    if self.aborted.load(Ordering::SeqCst) {
                        return null_or_propagate();
                    }
                    if self.context.is_expired() {
                        self.record_with_code(
                            format!("Timed out before resolving field \"{}\".", field.name),
                            "TIMEOUT",
                            field.location,
                            &path,
                        );
                        return null_or_propagate();
                    }
                    let info = ResolverInfo {
                        parent,
                        arguments,
                        context: self.context.clone(),
                        path: path.clone(),
                        field_name: field.name.clone(),
                        parent_type: object_type.name.clone(),
                    };
                    // each resolver runs in its own task so that a blocking or
                    // panicking resolver only affects its own field
                    let resolver = resolver.clone();
                    let resolved = tokio::spawn(async move { resolver.resolve(info).await })
                        .await
                        .unwrap_or_else(|err| {
                            Err(FieldError::new(format!(
                                "Resolver for field \"{}.{}\" failed: {err}",
                                object_type.name, field.name
                            )))
                        });
                    drop(permit);
                    resolved
                }
                None => Ok(default_resolve(&parent, &field.name)),
            };

            let value = match resolved.and_then(|value| {
                self.directives
                    .transform(&field.directives, &self.variables, value, &self.context)
            }) {
                Ok(value) => value,
                Err(err) => {
                    self.record_field_error(err, field.location, &path);
                    return null_or_propagate();
                }
            };

            self.complete_value(
                &definition.ty,
                object_type,
                Arc::from(fields),
                value,
                path,
                depth,
            )
            .await
        }
        .boxed()
    }

    /// Completes a value at a position of type `ty`.
    ///
    /// A nullable position absorbs a propagating null. A non-null position turns a
    /// null into an error and propagates it.
    fn complete_value<'b>(
        &'b self,
        ty: &'b FieldType,
        parent_type: &'b ObjectType,
        fields: Arc<[&'b Field]>,
        value: Value,
        path: Path,
        depth: usize,
    ) -> BoxFuture<'b, FieldCompletion> {
        async move {
            match ty {
                FieldType::NonNull(inner) => {
                    match self
                        .complete_inner(
                            inner,
                            parent_type,
                            fields.clone(),
                            value,
                            path.clone(),
                            depth,
                        )
                        .await
                    {
                        Ok(Value::Null) => {
                            let field_name = fields
                                .first()
                                .map(|field| field.name.as_str())
                                .unwrap_or_default();
                            self.record(
                                format!(
                                    "Cannot return null for non-nullable field {}.{}.",
                                    parent_type.name, field_name
                                ),
                                fields.first().and_then(|field| field.location),
                                &path,
                                Object::new(),
                            );
                            Err(Propagate)
                        }
                        completed => completed,
                    }
                }
                _ => Ok(self
                    .complete_inner(ty, parent_type, fields, value, path, depth)
                    .await
                    .unwrap_or(Value::Null)),
            }
        }
        .boxed()
    }

    async fn complete_inner<'b>(
        &'b self,
        ty: &'b FieldType,
        parent_type: &'b ObjectType,
        fields: Arc<[&'b Field]>,
        value: Value,
        path: Path,
        depth: usize,
    ) -> FieldCompletion {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let location = fields.first().and_then(|field| field.location);

        let type_name = match ty {
            FieldType::NonNull(inner) => {
                return self
                    .complete_value(inner, parent_type, fields, value, path, depth)
                    .await;
            }
            FieldType::List(inner) => {
                let Value::Array(items) = value else {
                    self.record(
                        format!("Expected a list for field of type \"{ty}\"."),
                        location,
                        &path,
                        Object::new(),
                    );
                    return Err(Propagate);
                };
                let work = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        self.complete_value(
                            inner,
                            parent_type,
                            fields.clone(),
                            item,
                            path.join(index),
                            depth,
                        )
                        .map(FieldOutcome)
                        .boxed()
                    })
                    .collect();
                return self
                    .nested_strategy
                    .schedule(work)
                    .await
                    .into_iter()
                    .map(|FieldOutcome(outcome)| outcome)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array);
            }
            builtin if builtin.is_builtin_scalar() => {
                return self.serialize_leaf(ty, value, location, &path);
            }
            FieldType::Named(name) => name.as_str(),
            _ => return Err(Propagate),
        };

        match self.schema.get(type_name) {
            Some(definition) if definition.is_leaf() => {
                self.serialize_leaf(ty, value, location, &path)
            }
            Some(TypeDefinition::Object(object_type)) => {
                self.complete_object(object_type, fields, value, path, depth)
                    .await
            }
            Some(definition) if definition.is_abstract() => {
                let concrete = self
                    .schema
                    .resolve_abstract_type(type_name, &value)
                    .filter(|concrete| self.schema.is_possible_type(type_name, concrete))
                    .and_then(|concrete| self.schema.object_type(&concrete));
                match concrete {
                    Some(object_type) => {
                        self.complete_object(object_type, fields, value, path, depth)
                            .await
                    }
                    None => {
                        self.record(
                            format!(
                                "Abstract type \"{type_name}\" must resolve to an object type at runtime for field \"{}.{}\".",
                                parent_type.name,
                                fields.first().map(|field| field.name.as_str()).unwrap_or_default()
                            ),
                            location,
                            &path,
                            Object::new(),
                        );
                        Err(Propagate)
                    }
                }
            }
            _ => {
                self.record(
                    SpecError::UnknownType(type_name.to_string()).to_string(),
                    location,
                    &path,
                    Object::new(),
                );
                Err(Propagate)
            }
        }
    }

    async fn complete_object<'b>(
        &'b self,
        object_type: &'b ObjectType,
        fields: Arc<[&'b Field]>,
        value: Value,
        path: Path,
        depth: usize,
    ) -> FieldCompletion {
        let selections = fields
            .iter()
            .copied()
            .flat_map(|field| field.selection_set.iter())
            .collect();
        self.execute_selection_set(
            object_type,
            Arc::new(value),
            selections,
            path,
            depth + 1,
            self.nested_strategy.as_ref(),
        )
        .await
    }

    fn serialize_leaf(
        &self,
        ty: &FieldType,
        value: Value,
        location: Option<Location>,
        path: &Path,
    ) -> FieldCompletion {
        ty.coerce_output(value, self.schema).map_err(|err| {
            self.record(
                format!("Cannot serialize value for type \"{ty}\": {err}"),
                location,
                path,
                Object::new(),
            );
            Propagate
        })
    }
}
