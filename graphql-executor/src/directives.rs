//! Directive handlers run before a field or fragment is executed.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::context::Context;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::resolver::FieldError;
use crate::spec::Directive;

/// Behaviour attached to a directive name.
///
/// `include` decides whether the annotated node contributes to the result at
/// all. `transform` runs on a field's resolved value before it is completed.
pub trait DirectiveHandler: Send + Sync + Debug {
    fn include(&self, _arguments: &Object, _context: &Context) -> Result<bool, FieldError> {
        Ok(true)
    }

    fn transform(
        &self,
        _arguments: &Object,
        value: Value,
        _context: &Context,
    ) -> Result<Value, FieldError> {
        Ok(value)
    }
}

fn if_argument(directive: &str, arguments: &Object) -> Result<bool, FieldError> {
    match arguments.get("if") {
        Some(Value::Bool(condition)) => Ok(*condition),
        _ => Err(FieldError::new(format!(
            "directive @{directive} requires a Boolean 'if' argument"
        ))),
    }
}

/// `@skip(if: Boolean!)`
#[derive(Debug, Default)]
pub struct Skip;

impl DirectiveHandler for Skip {
    fn include(&self, arguments: &Object, _context: &Context) -> Result<bool, FieldError> {
        if_argument("skip", arguments).map(|skip| !skip)
    }
}

/// `@include(if: Boolean!)`
#[derive(Debug, Default)]
pub struct Include;

impl DirectiveHandler for Include {
    fn include(&self, arguments: &Object, _context: &Context) -> Result<bool, FieldError> {
        if_argument("include", arguments)
    }
}

/// The directive handlers known to an executor, keyed by directive name.
///
/// Directives without a handler are ignored.
#[derive(Clone, Debug)]
pub struct DirectiveChain {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
}

impl Default for DirectiveChain {
    fn default() -> Self {
        let mut chain = DirectiveChain::empty();
        chain.register("skip", Skip);
        chain.register("include", Include);
        chain
    }
}

impl DirectiveChain {
    /// A chain without the built-in `@skip` and `@include`.
    pub fn empty() -> Self {
        DirectiveChain {
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl DirectiveHandler + 'static,
    ) -> &mut Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Folds the directives of a node in declaration order. The first handler
    /// excluding the node stops the fold.
    pub fn include(
        &self,
        directives: &[Directive],
        variables: &Object,
        context: &Context,
    ) -> Result<bool, FieldError> {
        directives.iter().try_fold(true, |included, directive| {
            if !included {
                return Ok(false);
            }
            match self.handlers.get(&directive.name) {
                Some(handler) => handler.include(&directive.evaluate_arguments(variables), context),
                None => Ok(true),
            }
        })
    }

    /// Applies the `transform` of each directive, in declaration order.
    pub fn transform(
        &self,
        directives: &[Directive],
        variables: &Object,
        value: Value,
        context: &Context,
    ) -> Result<Value, FieldError> {
        directives.iter().try_fold(value, |value, directive| {
            match self.handlers.get(&directive.name) {
                Some(handler) => {
                    handler.transform(&directive.evaluate_arguments(variables), value, context)
                }
                None => Ok(value),
            }
        })
    }
}
