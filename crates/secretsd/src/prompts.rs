//! Prompt registry.
//!
//! The store is already unlocked by the user's outer GPG session, so no
//! operation ever needs real user interaction: methods answer `/` in their
//! prompt slot. The prompt type still exists so the facade can hand out
//! working handles; a prompted action runs immediately and `Completed`
//! fires with its result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;
use zbus::zvariant::{OwnedValue, Value};

use crate::paths;

/// Deferred work a prompt would gate; produces the `Completed` result.
pub type PromptAction = Box<dyn FnOnce() -> OwnedValue + Send>;

/// The `Completed` result used for dismissals: an empty string variant.
pub fn empty_result() -> OwnedValue {
    Value::from("")
        .try_to_owned()
        .expect("a string value converts without file descriptors")
}

/// One pending prompt. The action can run at most once; afterwards the
/// prompt only reports that it is spent.
pub struct Prompt {
    id: String,
    path: String,
    action: Mutex<Option<PromptAction>>,
}

impl Prompt {
    fn new(id: String, action: PromptAction) -> Self {
        Self {
            path: paths::prompt(&id),
            id,
            action: Mutex::new(Some(action)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run the deferred action; `None` when already completed or dismissed.
    pub fn complete(&self) -> Option<OwnedValue> {
        let action = self
            .action
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        Some(action())
    }

    /// Drop the action without running it; false when already spent.
    pub fn dismiss(&self) -> bool {
        self.action
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
    }
}

/// Registry of pending prompts, keyed by id.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: RwLock<HashMap<String, Arc<Prompt>>>,
}

impl PromptRegistry {
    /// Allocate a prompt wrapping `action`.
    pub fn create(&self, action: PromptAction) -> Arc<Prompt> {
        let id = format!("p{}", Uuid::new_v4().as_simple());
        let prompt = Arc::new(Prompt::new(id.clone(), action));
        self.prompts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, prompt.clone());
        prompt
    }

    pub fn get(&self, path: &str) -> Option<Arc<Prompt>> {
        let id = paths::parse_prompt(path)?;
        self.prompts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Remove a prompt after completion or dismissal.
    pub fn remove(&self, path: &str) -> Option<Arc<Prompt>> {
        let id = paths::parse_prompt(path)?;
        self.prompts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
    }

    /// Snapshot and clear; used at shutdown.
    pub fn drain(&self) -> Vec<Arc<Prompt>> {
        self.prompts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, p)| p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_runs_exactly_once() {
        let registry = PromptRegistry::default();
        let prompt = registry.create(Box::new(empty_result));

        assert!(prompt.complete().is_some());
        assert!(prompt.complete().is_none());
        assert!(!prompt.dismiss());
    }

    #[test]
    fn dismiss_prevents_completion() {
        let registry = PromptRegistry::default();
        let prompt = registry.create(Box::new(empty_result));

        assert!(prompt.dismiss());
        assert!(prompt.complete().is_none());
    }

    #[test]
    fn registry_resolves_by_path() {
        let registry = PromptRegistry::default();
        let prompt = registry.create(Box::new(empty_result));
        assert!(registry.get(prompt.path()).is_some());
        registry.remove(prompt.path());
        assert!(registry.get(prompt.path()).is_none());
    }
}
