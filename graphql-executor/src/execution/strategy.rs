//! Scheduling of sibling fields.

use std::fmt::Debug;

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;

use crate::json_ext::Value;

/// The completed value of one field, or the marker that a non-null violation must
/// null out the parent.
///
/// Produced by the executor; strategies only move it around.
#[derive(Debug)]
pub struct FieldOutcome(pub(crate) Result<Value, Propagate>);

/// A null that cannot be stored at the current position and bubbles up to the
/// nearest nullable ancestor. The error has already been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Propagate;

/// Decides how the fields of one selection set get executed.
///
/// `schedule` receives one future per field in selection order and must return the
/// outcomes in that same order, whatever order they complete in.
pub trait ExecutionStrategy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn schedule<'a>(
        &self,
        work: Vec<BoxFuture<'a, FieldOutcome>>,
    ) -> BoxFuture<'a, Vec<FieldOutcome>>;
}

/// Executes fields one after the other. Each field completes, nested selections
/// included, before the next one starts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialStrategy;

impl ExecutionStrategy for SerialStrategy {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn schedule<'a>(
        &self,
        work: Vec<BoxFuture<'a, FieldOutcome>>,
    ) -> BoxFuture<'a, Vec<FieldOutcome>> {
        async move {
            let mut outcomes = Vec::with_capacity(work.len());
            for field in work {
                outcomes.push(field.await);
            }
            outcomes
        }
        .boxed()
    }
}

/// Polls up to `max_concurrency` fields at once.
///
/// Outcomes are buffered back into selection order, so the result does not depend
/// on completion order.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentStrategy {
    max_concurrency: usize,
}

impl ConcurrentStrategy {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }
}

impl ExecutionStrategy for ConcurrentStrategy {
    fn name(&self) -> &'static str {
        "concurrent"
    }

    fn schedule<'a>(
        &self,
        work: Vec<BoxFuture<'a, FieldOutcome>>,
    ) -> BoxFuture<'a, Vec<FieldOutcome>> {
        stream::iter(work)
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .boxed()
    }
}
