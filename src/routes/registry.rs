//! Feature modules and the order they mount in.

use super::RouteGroup;
use std::sync::Arc;

pub const DEFAULT_PRIORITY: i32 = 100;

/// A feature that contributes routes to the API listener, the admin listener, or both.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    /// Lower mounts first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn mount_api(&self, group: RouteGroup) -> RouteGroup {
        group
    }

    fn mount_admin(&self, group: RouteGroup) -> RouteGroup {
        group
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    modules: Vec<Arc<dyn Module>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    pub fn with(mut self, module: Arc<dyn Module>) -> Self {
        self.register(module);
        self
    }

    /// Modules by priority; ties keep registration order.
    pub fn ordered(&self) -> Vec<Arc<dyn Module>> {
        let mut modules = self.modules.clone();
        modules.sort_by_key(|m| m.priority());
        modules
    }

    pub fn mount_api(&self, group: RouteGroup) -> RouteGroup {
        self.ordered().iter().fold(group, |g, m| {
            tracing::info!(module = m.name(), "mounting api routes");
            m.mount_api(g)
        })
    }

    pub fn mount_admin(&self, group: RouteGroup) -> RouteGroup {
        self.ordered().iter().fold(group, |g, m| {
            tracing::info!(module = m.name(), "mounting admin routes");
            m.mount_admin(g)
        })
    }
}
