//! Hook pipeline over query execution phases

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::model::Record;

/// Point in the read pipeline at which a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BeforeProcess,
    AfterWhere,
    AfterOrderBy,
    AfterLimit,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BeforeProcess => "before_process",
            Phase::AfterWhere => "after_where",
            Phase::AfterOrderBy => "after_order_by",
            Phase::AfterLimit => "after_limit",
        }
    }
}

/// Callback receiving the current records and the entity name
pub type HookFn = Rc<dyn Fn(Vec<Record>, &str) -> Vec<Record>>;

/// Handle returned by registration, used to remove a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct Hook {
    id: HookId,
    phase: Phase,
    callback: HookFn,
}

/// Ordered hook registry owned by one `Database`
///
/// Hooks of a phase run in registration order, each consuming the previous
/// hook's output. Hooks of other phases leave the records untouched.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
    next_id: u64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, phase: Phase, callback: F) -> HookId
    where
        F: Fn(Vec<Record>, &str) -> Vec<Record> + 'static,
    {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.hooks.push(Hook {
            id,
            phase,
            callback: Rc::new(callback),
        });
        id
    }

    /// Remove a hook; returns false if it was not registered
    pub fn remove(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|hook| hook.id != id);
        self.hooks.len() != before
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Callbacks registered for `phase`, in registration order
    pub fn for_phase(&self, phase: Phase) -> Vec<HookFn> {
        self.hooks
            .iter()
            .filter(|hook| hook.phase == phase)
            .map(|hook| hook.callback.clone())
            .collect()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|hook| (hook.id, hook.phase)))
            .finish()
    }
}

/// Run every hook of `phase` over `records`
pub fn run_phase(hooks: &[HookFn], records: Vec<Record>, entity: &str) -> Vec<Record> {
    hooks
        .iter()
        .fold(records, |records, hook| hook(records, entity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(n: u64) -> Vec<Record> {
        (1..=n)
            .map(|id| json!({"id": id}).as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_hooks_chain_in_registration_order() {
        let mut registry = HookRegistry::new();
        registry.register(Phase::AfterWhere, |mut records, _| {
            records.truncate(2);
            records
        });
        registry.register(Phase::AfterWhere, |mut records, _| {
            records.reverse();
            records
        });

        let out = run_phase(&registry.for_phase(Phase::AfterWhere), records(3), "users");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], json!(2));
    }

    #[test]
    fn test_other_phase_hooks_do_not_reset_output() {
        let mut registry = HookRegistry::new();
        registry.register(Phase::AfterLimit, |mut records, _| {
            records.pop();
            records
        });
        registry.register(Phase::BeforeProcess, |_, _| Vec::new());

        let out = run_phase(&registry.for_phase(Phase::AfterLimit), records(3), "users");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut registry = HookRegistry::new();
        let first = registry.register(Phase::AfterWhere, |r, _| r);
        registry.register(Phase::AfterLimit, |r, _| r);

        assert!(registry.remove(first));
        assert!(!registry.remove(first));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_hook_receives_entity_name() {
        let mut registry = HookRegistry::new();
        registry.register(Phase::BeforeProcess, |records, entity| {
            if entity == "posts" {
                Vec::new()
            } else {
                records
            }
        });
        let hooks = registry.for_phase(Phase::BeforeProcess);
        assert_eq!(run_phase(&hooks, records(2), "users").len(), 2);
        assert!(run_phase(&hooks, records(2), "posts").is_empty());
    }
}
