//! The verb → handler-chain mapping (`spec.md` §6 "HandlerChainConfig"),
//! grounded on `rsmtpd/core/worker.py`'s YAML-driven command table, ported
//! to `serde_yaml` instead of dynamic `(module, class)` import.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::handlers::HandlerDescriptor;

/// One step in a verb's handler chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub module: String,
    pub class: String,
}

impl ChainEntry {
    pub fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor::new(self.module.clone(), self.class.clone())
    }
}

/// Maps an SMTP verb (or the `__OPEN__`, `__DATA__`, `__DEFAULT__`
/// pseudo-verbs from `spec.md` §4.4) to an ordered list of handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerChainConfig {
    chains: HashMap<String, Vec<ChainEntry>>,
}

impl HandlerChainConfig {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Looks up the chain for `verb`, falling back to `__DEFAULT__` if the
    /// verb has no entry of its own (`spec.md` §4.4 step 3).
    pub fn chain_for(&self, verb: &str) -> &[ChainEntry] {
        self.chains
            .get(verb)
            .or_else(|| self.chains.get("__DEFAULT__"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The safe-by-default configuration: every verb (and `__DATA__`) maps
    /// to `RejectAllHandler`, matching the original's "deny by default"
    /// posture for a server with no chain file supplied (`spec.md` §7
    /// "521 reject-all safety default").
    pub fn reject_all() -> Self {
        let reject = vec![ChainEntry {
            module: "handlers.reject_all".to_string(),
            class: "RejectAllHandler".to_string(),
        }];
        let mut chains = HashMap::new();
        chains.insert("__OPEN__".to_string(), vec![ChainEntry {
            module: "handlers.greeting".to_string(),
            class: "GreetingHandler".to_string(),
        }]);
        chains.insert("__DEFAULT__".to_string(), reject.clone());
        chains.insert("__DATA__".to_string(), reject);
        HandlerChainConfig { chains }
    }
}
