//! Closure Registry
//!
//! Maps closure names to compiled closures. A job's code package lists the
//! names it uses; an operator request names one of them together with the
//! signature it expects, and the registry hands back the closure only when
//! both match.

use super::lambda::{Lambda, LambdaKind, LambdaRef};
use crate::error::{FlameError, FlameResult};

use dashmap::DashMap;
use std::sync::Arc;

pub struct ClosureRegistry {
    closures: DashMap<String, Lambda>,
}

impl ClosureRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a closure under `name`, replacing any previous one.
    ///
    /// Fractions and table names are request parameters, not closures, and
    /// are ignored here.
    pub fn register(&self, name: &str, lambda: Lambda) {
        let Some(kind) = lambda.kind() else {
            tracing::warn!("Refusing to register non-closure parameter as '{}'", name);
            return;
        };

        self.closures.insert(name.to_string(), lambda);
        tracing::debug!("Registered closure: {} ({:?})", name, kind);
    }

    /// Looks up `name` and checks it has the signature `kind`.
    pub fn resolve(&self, name: &str, kind: LambdaKind) -> FlameResult<Lambda> {
        let entry = self
            .closures
            .get(name)
            .ok_or_else(|| FlameError::BadRequest(format!("unknown closure '{}'", name)))?;

        match entry.value().kind() {
            Some(found) if found == kind => Ok(entry.value().clone()),
            found => Err(FlameError::BadRequest(format!(
                "closure '{}' is {:?}, not {:?}",
                name, found, kind
            ))),
        }
    }

    /// Turns a wire reference into a lambda. Named closures must also be
    /// listed in `allowed`, the closure set of the installed package.
    pub fn materialize(&self, reference: &LambdaRef, allowed: &[String]) -> FlameResult<Lambda> {
        match reference {
            LambdaRef::Named { kind, name } => {
                if !allowed.iter().any(|a| a == name) {
                    return Err(FlameError::BadRequest(format!(
                        "closure '{}' is not part of the installed package",
                        name
                    )));
                }
                self.resolve(name, *kind)
            }
            LambdaRef::Fraction(p) => Ok(Lambda::Fraction(*p)),
            LambdaRef::Table(t) => Ok(Lambda::Table(t.clone())),
        }
    }

    /// Returns a sorted list of all registered closure names.
    pub fn list_closures(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .closures
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn has_closure(&self, name: &str) -> bool {
        self.closures.contains_key(name)
    }

    pub fn closure_count(&self) -> usize {
        self.closures.len()
    }
}

impl Default for ClosureRegistry {
    fn default() -> Self {
        Self {
            closures: DashMap::new(),
        }
    }
}
