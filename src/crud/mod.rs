//! Declarative CRUD endpoints for a [`Resource`](crate::resource::Resource).
//!
//! A [`CrudConfig`] is built once at mount time and shared by the generated handlers.
//! Every generated endpoint is scoped to the calling principal through the record's
//! owner field.

mod handlers;

pub(crate) use handlers::mount;

use crate::error::BoxError;
use crate::extractors::RequestContext;
use crate::store::{Order, Query};
use std::sync::Arc;

pub type Constructor<T> = Arc<dyn Fn() -> T + Send + Sync>;
pub type BeforeHook<T> = Arc<dyn Fn(&RequestContext, &mut T) -> Result<(), BoxError> + Send + Sync>;
pub type ScopeHook = Arc<dyn Fn(&RequestContext, Query) -> Query + Send + Sync>;
pub type AfterGetHook<T> = Arc<dyn Fn(&RequestContext, &mut T) + Send + Sync>;
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// 128-bit random identifier as 32 lowercase hex chars.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Operations {
    pub create: bool,
    pub list: bool,
    pub get: bool,
    pub update: bool,
    pub delete: bool,
}

impl Operations {
    pub const ALL: Operations = Operations {
        create: true,
        list: true,
        get: true,
        update: true,
        delete: true,
    };

    /// No flag set means every operation.
    pub fn effective(self) -> Operations {
        if self == Operations::default() {
            Operations::ALL
        } else {
            self
        }
    }
}

pub struct CrudHooks<T> {
    pub before_create: Option<BeforeHook<T>>,
    pub before_update: Option<BeforeHook<T>>,
    pub scope_list: Option<ScopeHook>,
    pub after_get: Option<AfterGetHook<T>>,
}

impl<T> Default for CrudHooks<T> {
    fn default() -> Self {
        CrudHooks {
            before_create: None,
            before_update: None,
            scope_list: None,
            after_get: None,
        }
    }
}

pub struct CrudConfig<T> {
    pub(crate) constructor: Constructor<T>,
    pub(crate) operations: Operations,
    pub(crate) hooks: CrudHooks<T>,
    pub(crate) id_field: Option<String>,
    pub(crate) owner_field: Option<String>,
    pub(crate) auto_id: bool,
    pub(crate) id_generator: IdGenerator,
    pub(crate) default_order: Option<Order>,
}

impl<T: Default + 'static> Default for CrudConfig<T> {
    fn default() -> Self {
        CrudConfig {
            constructor: Arc::new(T::default),
            operations: Operations::default(),
            hooks: CrudHooks::default(),
            id_field: None,
            owner_field: None,
            auto_id: true,
            id_generator: Arc::new(new_id),
            default_order: None,
        }
    }
}

impl<T: Default + 'static> CrudConfig<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero value used for binding and as the baseline for partial updates.
    pub fn constructor(mut self, f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.constructor = Arc::new(f);
        self
    }

    /// Enable exactly these operations. `Operations::default()` enables all of them.
    pub fn operations(mut self, operations: Operations) -> Self {
        self.operations = operations;
        self
    }

    pub fn before_create(
        mut self,
        f: impl Fn(&RequestContext, &mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.before_create = Some(Arc::new(f));
        self
    }

    pub fn before_update(
        mut self,
        f: impl Fn(&RequestContext, &mut T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.before_update = Some(Arc::new(f));
        self
    }

    /// Adjust the list query (extra filters, ordering) after owner scoping.
    pub fn scope_list(mut self, f: impl Fn(&RequestContext, Query) -> Query + Send + Sync + 'static) -> Self {
        self.hooks.scope_list = Some(Arc::new(f));
        self
    }

    /// Runs on every record about to be returned.
    pub fn after_get(mut self, f: impl Fn(&RequestContext, &mut T) + Send + Sync + 'static) -> Self {
        self.hooks.after_get = Some(Arc::new(f));
        self
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = Some(name.into());
        self
    }

    pub fn owner_field(mut self, name: impl Into<String>) -> Self {
        self.owner_field = Some(name.into());
        self
    }

    /// Generate identities for records created with a blank one (default on).
    pub fn auto_id(mut self, enabled: bool) -> Self {
        self.auto_id = enabled;
        self
    }

    pub fn id_generator(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_generator = Arc::new(f);
        self
    }

    /// List ordering; without it lists sort by identity, newest first.
    pub fn order_by(mut self, order: Order) -> Self {
        self.default_order = Some(order);
        self
    }
}
