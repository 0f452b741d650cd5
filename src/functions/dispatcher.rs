use super::booking::BookingStore;
use super::function::{DeclaredFunction, FunctionBackends};
use super::query::FormatLimits;
use super::venue::VenueStore;
use crate::error::{AgentError, Result};
use crate::schemas::{ParsedArguments, SchemaRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps declared function names to their bound operations
#[derive(Debug)]
pub struct FunctionDispatcher {
    functions: HashMap<String, DeclaredFunction>,
    backends: FunctionBackends,
}

impl FunctionDispatcher {
    /// Bind every function of `registry` to the given stores
    pub fn new(registry: &SchemaRegistry, venues: Arc<VenueStore>, bookings: Arc<BookingStore>) -> Self {
        let functions = registry
            .functions()
            .map(|spec| (spec.name.clone(), DeclaredFunction::from_spec(spec)))
            .collect();
        Self {
            functions,
            backends: FunctionBackends {
                venues,
                bookings,
                limits: FormatLimits::default(),
            },
        }
    }

    pub fn with_limits(mut self, limits: FormatLimits) -> Self {
        self.backends.limits = limits;
        self
    }

    /// Run a validated call.
    ///
    /// An unbound name here means the registry and dispatcher disagree,
    /// which is a configuration fault rather than agent feedback.
    pub fn dispatch(&self, function_name: &str, arguments: &ParsedArguments) -> Result<String> {
        let function = self
            .functions
            .get(function_name)
            .ok_or_else(|| AgentError::UnknownFunction {
                service: "<dispatcher>".to_string(),
                function: function_name.to_string(),
            })?;

        debug!(
            target: "tod_bench::dispatch",
            function = function_name,
            transactional = function.is_transactional(),
            "dispatching call"
        );
        function.invoke(arguments, &self.backends)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&DeclaredFunction> {
        self.functions.get(name)
    }

    pub fn bookings(&self) -> &BookingStore {
        &self.backends.bookings
    }

    pub fn venues(&self) -> &VenueStore {
        &self.backends.venues
    }
}
