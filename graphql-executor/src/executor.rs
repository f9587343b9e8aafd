//! Entry points: prepare a document once, then execute it many times.
//!
//! An [`Executor`] owns everything shared between executions (schema,
//! configuration, directive chain and strategies). [`Executor::prepare`] binds
//! it to a parsed [`Document`] and runs static validation once. Each call to
//! [`PreparedQuery::execute`] then selects the operation, coerces the variables
//! and drives a fresh run over the shared, immutable document.

use std::collections::HashMap;
use std::sync::Arc;

use derivative::Derivative;
use tracing::Instrument;

use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::configuration::StrategyKind;
use crate::context::Context;
use crate::directives::DirectiveChain;
use crate::error::ExecutionError;
use crate::error::PreparationError;
use crate::execution::ConcurrentStrategy;
use crate::execution::ExecutionStrategy;
use crate::execution::Run;
use crate::execution::SerialStrategy;
use crate::graphql::Error;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::query_cache::QueryCache;
use crate::spec::Document;
use crate::spec::OperationKind;
use crate::spec::Schema;
use crate::validation::DocumentValidator;
use crate::variables::coerce_variables;

const OPERATION_KINDS: [OperationKind; 3] = [
    OperationKind::Query,
    OperationKind::Mutation,
    OperationKind::Subscription,
];

/// Executes GraphQL documents against a schema.
///
/// Cloning is cheap: clones share their schema, configuration and hooks.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Executor {
    schema: Arc<Schema>,
    configuration: Arc<Configuration>,
    directives: Arc<DirectiveChain>,
    root_value: Arc<Value>,
    root_strategies: HashMap<OperationKind, Arc<dyn ExecutionStrategy>>,
    nested_strategy: Arc<dyn ExecutionStrategy>,
    #[derivative(Debug = "ignore")]
    validator: Option<Arc<dyn DocumentValidator>>,
    #[derivative(Debug = "ignore")]
    query_cache: Option<Arc<dyn QueryCache>>,
}

/// Builds an [`Executor`].
///
/// Only the schema is required. Strategies not set explicitly follow
/// [`Configuration::strategies`] and [`Configuration::max_concurrency`].
#[derive(Default)]
pub struct ExecutorBuilder {
    schema: Option<Arc<Schema>>,
    configuration: Option<Configuration>,
    directives: Option<DirectiveChain>,
    root_value: Option<Value>,
    root_strategies: HashMap<OperationKind, Arc<dyn ExecutionStrategy>>,
    nested_strategy: Option<Arc<dyn ExecutionStrategy>>,
    validator: Option<Arc<dyn DocumentValidator>>,
    query_cache: Option<Arc<dyn QueryCache>>,
}

impl ExecutorBuilder {
    pub fn schema(mut self, schema: impl Into<Arc<Schema>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Replaces the default chain, which only knows `@skip` and `@include`.
    pub fn directives(mut self, directives: DirectiveChain) -> Self {
        self.directives = Some(directives);
        self
    }

    /// The parent value handed to the resolvers of root fields. Defaults to an empty object.
    pub fn root_value(mut self, root_value: Value) -> Self {
        self.root_value = Some(root_value);
        self
    }

    /// Schedules the root fields of `kind` operations with `strategy`.
    pub fn strategy(
        mut self,
        kind: OperationKind,
        strategy: impl ExecutionStrategy + 'static,
    ) -> Self {
        self.root_strategies.insert(kind, Arc::new(strategy));
        self
    }

    /// Schedules nested selection sets and list items with `strategy`.
    pub fn nested_strategy(mut self, strategy: impl ExecutionStrategy + 'static) -> Self {
        self.nested_strategy = Some(Arc::new(strategy));
        self
    }

    pub fn validator(mut self, validator: impl DocumentValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn query_cache(mut self, query_cache: Arc<dyn QueryCache>) -> Self {
        self.query_cache = Some(query_cache);
        self
    }

    pub fn build(self) -> Result<Executor, ConfigurationError> {
        let schema = self
            .schema
            .ok_or_else(|| ConfigurationError::InvalidConfiguration {
                message: "missing schema",
                error: "an executor needs a schema to execute against".to_string(),
            })?;
        let configuration = self.configuration.unwrap_or_default();

        let mut root_strategies = self.root_strategies;
        for kind in OPERATION_KINDS {
            root_strategies
                .entry(kind)
                .or_insert_with(|| strategy_for(configuration.strategy(kind), &configuration));
        }
        let nested_strategy = self.nested_strategy.unwrap_or_else(|| {
            strategy_for(StrategyKind::Concurrent, &configuration)
        });

        Ok(Executor {
            schema,
            configuration: Arc::new(configuration),
            directives: Arc::new(self.directives.unwrap_or_default()),
            root_value: Arc::new(
                self.root_value
                    .unwrap_or_else(|| Value::Object(Object::new())),
            ),
            root_strategies,
            nested_strategy,
            validator: self.validator,
            query_cache: self.query_cache,
        })
    }
}

fn strategy_for(kind: StrategyKind, configuration: &Configuration) -> Arc<dyn ExecutionStrategy> {
    match kind {
        StrategyKind::Serial => Arc::new(SerialStrategy),
        StrategyKind::Concurrent => {
            Arc::new(ConcurrentStrategy::new(configuration.max_concurrency))
        }
    }
}

impl Executor {
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Binds `document` to this executor, running static validation once.
    pub fn prepare(&self, document: impl Into<Arc<Document>>) -> PreparedQuery {
        let document = document.into();
        let validation_errors = self
            .validator
            .as_ref()
            .map(|validator| validator.validate(&document, &self.schema))
            .unwrap_or_default();
        if !validation_errors.is_empty() {
            tracing::debug!(
                count = validation_errors.len(),
                "document failed validation"
            );
        }

        PreparedQuery {
            executor: self.clone(),
            document,
            validation_errors,
            defaults: None,
        }
    }

    /// Prepares `document` with variables and a context bound at preparation time.
    ///
    /// Each execution still receives its own variables and context; these
    /// defaults are used only when the call-time ones are empty.
    pub fn prepare_with_defaults(
        &self,
        document: impl Into<Arc<Document>>,
        variables: Object,
        context: Context,
    ) -> PreparedQuery {
        tracing::warn!(
            deprecated = "prepare_with_defaults",
            "binding variables or a context at preparation time is deprecated; pass them to `PreparedQuery::execute` instead"
        );
        PreparedQuery {
            defaults: Some(PreparationDefaults { variables, context }),
            ..self.prepare(document)
        }
    }

    /// Executes a transport-level request.
    ///
    /// Without query text, the document is looked up in the query cache by
    /// operation name.
    pub async fn execute_request(
        &self,
        request: Request,
        context: Context,
    ) -> Result<Response, ExecutionError> {
        let Request {
            query,
            operation_name,
            variables,
            ..
        } = request;

        let document = match (query, operation_name.as_deref()) {
            (Some(query), _) => Arc::new(Document::parse(&query)?),
            (None, Some(name)) => self
                .query_cache
                .as_ref()
                .and_then(|cache| cache.fetch(name))
                .ok_or_else(|| PreparationError::UnknownPersistedOperation {
                    name: name.to_string(),
                })?,
            (None, None) => return Err(PreparationError::MissingQuery.into()),
        };

        self.prepare(document)
            .execute(variables, context, operation_name.as_deref())
            .await
    }

    fn root_strategy(&self, kind: OperationKind) -> Arc<dyn ExecutionStrategy> {
        self.root_strategies
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.nested_strategy.clone())
    }
}

#[derive(Clone, Debug)]
struct PreparationDefaults {
    variables: Object,
    context: Context,
}

/// A document bound to an [`Executor`], ready to be executed any number of times.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct PreparedQuery {
    #[derivative(Debug = "ignore")]
    executor: Executor,
    document: Arc<Document>,
    validation_errors: Vec<Error>,
    defaults: Option<PreparationDefaults>,
}

impl PreparedQuery {
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Errors reported by the validator when this query was prepared.
    pub fn validation_errors(&self) -> &[Error] {
        &self.validation_errors
    }

    /// Executes the operation named `operation_name`.
    ///
    /// Field errors are collected into [`Response::errors`] next to partial
    /// data. Validation, operation selection and variable errors return an
    /// [`ExecutionError`] before any resolver runs, as does the first field
    /// error in debug mode.
    ///
    /// Resolvers are spawned as tasks on the current tokio runtime, so this must be
    /// called from within one.
    #[tracing::instrument(skip_all, level = "trace")]
    pub async fn execute(
        &self,
        variables: Object,
        context: Context,
        operation_name: Option<&str>,
    ) -> Result<Response, ExecutionError> {
        if !self.validation_errors.is_empty() {
            return Err(ExecutionError::Validation(self.validation_errors.clone()));
        }
        let (variables, context) = self.call_inputs(variables, context);
        let executor = &self.executor;

        let Some(operation) = self.document.select_operation(operation_name)? else {
            if executor.configuration.require_operation {
                return Err(PreparationError::NoOperation.into());
            }
            return Ok(Response::default());
        };
        let root_type = executor.schema.root_type(operation.kind).ok_or_else(|| {
            PreparationError::UnsupportedOperation {
                kind: operation.kind.to_string(),
            }
        })?;
        let variables = coerce_variables(operation, &executor.schema, &variables)?;

        let span = tracing::info_span!(
            "execute",
            graphql.operation.name = operation.name.as_deref().unwrap_or_default(),
            graphql.operation.kind = operation.kind.as_str(),
        );
        let output = Run::new(
            &executor.schema,
            &self.document,
            operation,
            root_type,
            variables,
            context,
            &executor.directives,
            &executor.configuration,
            executor.root_strategy(operation.kind),
            executor.nested_strategy.clone(),
            executor.root_value.clone(),
        )
        .execute()
        .instrument(span)
        .await;

        let mut errors = output.errors;
        if executor.configuration.debug && !errors.is_empty() {
            return Err(ExecutionError::Field(errors.remove(0)));
        }

        Ok(Response {
            data: Some(output.data),
            errors,
            extensions: Object::new(),
        })
    }

    fn call_inputs(&self, variables: Object, context: Context) -> (Object, Context) {
        let Some(defaults) = &self.defaults else {
            return (variables, context);
        };
        let variables = if variables.is_empty() {
            defaults.variables.clone()
        } else {
            variables
        };
        let context = if context.is_empty() && context.deadline().is_none() {
            defaults.context.clone()
        } else {
            context
        };
        (variables, context)
    }
}
