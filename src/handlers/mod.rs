//! Handler capability traits and the per-session registry that dispatches
//! to them (`spec.md` §4.2, §9 "replace reflection with a capability
//! registry").
//!
//! The original Python engine looked up handlers by `(module, class)`
//! strings and used `getattr`/`hasattr` to decide whether a handler could
//! process a command or a DATA chunk. That is not idiomatic Rust and not
//! type-safe, so here a handler statically declares what it can do by
//! implementing one or both of [`CommandHandler`] and [`DataCommandHandler`].

pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::response::Response;
use crate::session::SharedState;

/// A handler that participates in command dispatch (HELO, MAIL, RCPT, ...).
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Processes one command line's already-split verb/argument pair and
    /// produces the next response in the chain. `previous` is the response
    /// produced by the prior handler in this verb's chain, if any — reading
    /// it (never mutating it) is how a handler can short-circuit on a prior
    /// failure.
    async fn handle(
        &self,
        verb: &str,
        argument: &str,
        shared: &mut SharedState,
        previous: Option<&Response>,
    ) -> Response;
}

/// A handler that participates in DATA chunk dispatch.
#[async_trait]
pub trait DataCommandHandler: Send + Sync {
    /// Called once per line yielded by the data reader (`spec.md` §4.5),
    /// after dot-unstuffing. A handler that wants to reject the message
    /// does so from [`DataCommandHandler::handle_data_end`] instead —
    /// `handle_data` itself never produces a response, matching the
    /// original's streaming-sink shape (e.g. the spool handler enforces
    /// its size cap here but only reports the rejection once DATA ends).
    async fn handle_data(&self, line: &[u8], shared: &mut SharedState);

    /// Called once after the terminating `.` line has been consumed.
    async fn handle_data_end(&self, shared: &mut SharedState) -> Response;
}

/// Identifies a handler implementation the way the configuration file does:
/// a stable key independent of where the struct lives in the source tree.
/// Named after the original `module::class` pair for continuity with
/// `spec.md` §5's configuration format, though here it resolves through a
/// compile-time table rather than dynamic import.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerDescriptor {
    pub module: String,
    pub class: String,
}

impl HandlerDescriptor {
    pub fn new(module: impl Into<String>, class: impl Into<String>) -> Self {
        HandlerDescriptor {
            module: module.into(),
            class: class.into(),
        }
    }

    fn key(&self) -> String {
        format!("{}::{}", self.module, self.class)
    }
}

/// A constructed handler, holding whichever capabilities it declared.
#[derive(Clone)]
pub struct HandlerInstance {
    pub command: Option<Arc<dyn CommandHandler>>,
    pub data: Option<Arc<dyn DataCommandHandler>>,
}

pub type Factory = Arc<dyn Fn() -> HandlerInstance + Send + Sync>;

/// Caches constructed handler instances for the lifetime of a session, the
/// same lifetime the Python engine gave its `(module, class)` instance
/// cache in `core/worker.py`. Handlers are stateless enough between
/// sessions that a fresh registry per connection is cheap and keeps the
/// per-session extension slots in [`SharedState`] isolated.
pub struct HandlerRegistry {
    factories: HashMap<String, Factory>,
    cache: HashMap<String, HandlerInstance>,
}

impl HandlerRegistry {
    /// Builds a registry pre-populated with every built-in handler
    /// (`spec.md` §6, supplemented handler list in the ambient-stack
    /// expansion), wired to the given spool/log directories. Deployments
    /// that need custom handlers construct their own table with
    /// [`HandlerRegistry::with_factories`] instead.
    pub fn with_builtins(spool_dir: &str, log_dir: &str) -> Self {
        HandlerRegistry::with_factories(builtin::factory_table(spool_dir, log_dir))
    }

    pub fn with_factories(factories: HashMap<String, Factory>) -> Self {
        HandlerRegistry {
            factories,
            cache: HashMap::new(),
        }
    }

    /// Resolves a descriptor to a constructed (and cached) handler
    /// instance. Returns `None` if the descriptor names a handler the
    /// registry wasn't built with — a configuration error, logged by the
    /// caller rather than panicking mid-session.
    pub fn resolve(&mut self, descriptor: &HandlerDescriptor) -> Option<HandlerInstance> {
        let key = descriptor.key();
        if let Some(instance) = self.cache.get(&key) {
            return Some(instance.clone());
        }
        let factory = self.factories.get(&key)?;
        let instance = factory();
        self.cache.insert(key, instance.clone());
        Some(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_returns_none_for_unknown_descriptor() {
        let mut registry = HandlerRegistry::with_builtins("/var/tmp", "/var/tmp");
        let missing = HandlerDescriptor::new("handlers.nope", "Nope");
        assert!(registry.resolve(&missing).is_none());
    }

    #[test]
    fn resolve_caches_the_same_instance_across_calls() {
        let mut registry = HandlerRegistry::with_builtins("/var/tmp", "/var/tmp");
        let greeting = HandlerDescriptor::new("handlers.greeting", "GreetingHandler");
        let first = registry.resolve(&greeting);
        let second = registry.resolve(&greeting);
        assert!(first.is_some());
        assert!(second.is_some());
    }
}
