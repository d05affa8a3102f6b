use std::collections::HashMap;
use std::sync::Arc;

use crate::executor::Executor;
use crate::notifier::Notifier;

/// Maps action names to the executor that performs them.
///
/// Built once at startup and then shared immutably. Actions without a
/// dedicated entry go to the fallback executor, if one is set.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
    fallback: Option<Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the executor for an action name, replacing any previous one.
    pub fn register(&mut self, action: impl Into<String>, executor: Arc<dyn Executor>) {
        self.executors.insert(action.into(), executor);
    }

    /// Executor used for actions without a dedicated registration.
    pub fn set_fallback(&mut self, executor: Arc<dyn Executor>) {
        self.fallback = Some(executor);
    }

    pub fn get(&self, action: &str) -> Option<Arc<dyn Executor>> {
        self.executors
            .get(action)
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Sorted list of action names with a dedicated executor.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty() && self.fallback.is_none()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("actions", &self.list())
            .field("fallback", &self.fallback.as_ref().map(|e| e.name().to_owned()))
            .finish()
    }
}

/// Maps channel names to the notifier that delivers to them.
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
    fallback: Option<Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: impl Into<String>, notifier: Arc<dyn Notifier>) {
        self.notifiers.insert(channel.into(), notifier);
    }

    pub fn set_fallback(&mut self, notifier: Arc<dyn Notifier>) {
        self.fallback = Some(notifier);
    }

    pub fn get(&self, channel: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers
            .get(channel)
            .or(self.fallback.as_ref())
            .cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.notifiers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierRegistry")
            .field("channels", &self.list())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
