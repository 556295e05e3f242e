//! Route composition: groups that CRUD resources and actions mount onto, the module
//! registry, and the common operational routes.

mod common;
mod registry;

pub use common::common_routes;
pub use registry::{Module, Registry, DEFAULT_PRIORITY};

use crate::action::{self, Action};
use crate::crud::{self, CrudConfig};
use crate::resource::Resource;
use crate::store::Db;
use axum::{routing::MethodRouter, Router};
use serde::{de::DeserializeOwned, Serialize};

/// An axum router plus the storage handle its resources and actions use.
pub struct RouteGroup {
    router: Router,
    db: Db,
}

impl RouteGroup {
    pub fn new(db: Db) -> Self {
        RouteGroup {
            router: Router::new(),
            db,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Mount the generated CRUD endpoints for `T` at `path`.
    pub fn crud<T: Resource>(mut self, path: &str, cfg: CrudConfig<T>) -> Self {
        self.router = crud::mount(self.router, self.db.clone(), path, cfg);
        self
    }

    pub fn action<I, O>(mut self, action: Action<I, O>) -> Self
    where
        I: DeserializeOwned + Default + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.router = action::mount(self.router, self.db.clone(), action);
        self
    }

    /// Plain axum route, for endpoints outside the envelope conventions.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    pub fn merge(mut self, other: RouteGroup) -> Self {
        self.router = self.router.merge(other.router);
        self
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}
