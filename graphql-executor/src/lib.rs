//! Query preparation and execution core of a GraphQL server runtime.
//!
//! A parsed [`Document`] is prepared once against an [`Executor`] and can then
//! be executed any number of times, concurrently, with different variables and
//! contexts.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(unreachable_pub)]

pub mod json_ext;

mod configuration;
mod context;
pub mod directives;
pub mod error;
mod execution;
mod executor;
pub mod graphql;
mod query_cache;
pub mod resolver;
pub mod spec;
mod validation;
mod variables;

pub use configuration::Configuration;
pub use configuration::Strategies;
pub use configuration::StrategyKind;
pub use context::Context;
pub use directives::DirectiveChain;
pub use directives::DirectiveHandler;
pub use execution::ConcurrentStrategy;
pub use execution::ExecutionStrategy;
pub use execution::FieldOutcome;
pub use execution::SerialStrategy;
pub use executor::Executor;
pub use executor::ExecutorBuilder;
pub use executor::PreparedQuery;
pub use graphql::Request;
pub use graphql::Response;
pub use query_cache::QueryCache;
pub use resolver::FieldError;
pub use resolver::FieldResult;
pub use resolver::Resolver;
pub use resolver::ResolverInfo;
pub use spec::Document;
pub use spec::OperationKind;
pub use spec::Schema;
pub use validation::DocumentValidator;
pub use variables::coerce_variables;
