//! Executor configuration.
//!
//! Can be created through `serde::Deserialize` from YAML or JSON, or inline in
//! Rust code with the builder.

use displaydoc::Display;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::spec::OperationKind;

/// Configuration error.
#[derive(Debug, Error, Display)]
pub enum ConfigurationError {
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_yaml::Error),
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}

/// The configuration of an [`Executor`](crate::Executor).
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Return the first field error as a hard failure instead of collecting it.
    /// Defaults to false
    #[serde(default)]
    pub debug: bool,

    /// Maximum number of sibling fields, or list items, a concurrent strategy
    /// drives at once within one selection set.
    /// Defaults to 32
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum number of resolver invocations in flight during one execution.
    /// Defaults to 256
    #[serde(default = "default_max_in_flight_resolvers")]
    pub max_in_flight_resolvers: usize,

    /// Maximum selection set depth.
    /// Defaults to 512
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,

    /// Execution strategy per operation kind.
    #[serde(default)]
    pub strategies: Strategies,

    /// Fail with an error when the document contains no operation, instead of
    /// returning an empty response.
    /// Defaults to false
    #[serde(default)]
    pub require_operation: bool,
}

fn default_max_concurrency() -> usize {
    32
}

fn default_max_in_flight_resolvers() -> usize {
    256
}

fn default_recursion_limit() -> usize {
    512
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub fn new(
        debug: Option<bool>,
        max_concurrency: Option<usize>,
        max_in_flight_resolvers: Option<usize>,
        recursion_limit: Option<usize>,
        strategies: Option<Strategies>,
        require_operation: Option<bool>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = Self {
            debug: debug.unwrap_or_default(),
            max_concurrency: max_concurrency.unwrap_or_else(default_max_concurrency),
            max_in_flight_resolvers: max_in_flight_resolvers
                .unwrap_or_else(default_max_in_flight_resolvers),
            recursion_limit: recursion_limit.unwrap_or_else(default_recursion_limit),
            strategies: strategies.unwrap_or_default(),
            require_operation: require_operation.unwrap_or_default(),
        };
        configuration.validate()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            debug: false,
            max_concurrency: default_max_concurrency(),
            max_in_flight_resolvers: default_max_in_flight_resolvers(),
            recursion_limit: default_recursion_limit(),
            strategies: Strategies::default(),
            require_operation: false,
        }
    }
}

impl Configuration {
    /// Parses and validates a YAML configuration.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigurationError> {
        let configuration: Configuration =
            serde_yaml::from_str(raw).map_err(ConfigurationError::DeserializeConfigError)?;
        configuration.validate()
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        if self.max_concurrency == 0 {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid max_concurrency",
                error: "must be at least 1".to_string(),
            });
        }
        if self.max_in_flight_resolvers == 0 {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "invalid max_in_flight_resolvers",
                error: "must be at least 1".to_string(),
            });
        }
        Ok(self)
    }

    pub fn strategy(&self, kind: OperationKind) -> StrategyKind {
        match kind {
            OperationKind::Query => self.strategies.query,
            OperationKind::Mutation => self.strategies.mutation,
            OperationKind::Subscription => self.strategies.subscription,
        }
    }
}

/// How the root fields of each operation kind are scheduled.
///
/// Nested selection sets use the concurrent strategy for every kind.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Strategies {
    /// Defaults to concurrent
    #[serde(default = "StrategyKind::concurrent")]
    pub query: StrategyKind,
    /// Defaults to serial
    #[serde(default = "StrategyKind::serial")]
    pub mutation: StrategyKind,
    /// Defaults to concurrent
    #[serde(default = "StrategyKind::concurrent")]
    pub subscription: StrategyKind,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            query: StrategyKind::Concurrent,
            mutation: StrategyKind::Serial,
            subscription: StrategyKind::Concurrent,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Resolve sibling fields one after the other, in selection order.
    Serial,
    /// Resolve sibling fields concurrently.
    Concurrent,
}

impl StrategyKind {
    fn serial() -> Self {
        StrategyKind::Serial
    }

    fn concurrent() -> Self {
        StrategyKind::Concurrent
    }
}
