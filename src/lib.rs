//! ezkit: declarative owner-scoped CRUD endpoints and an action pipeline over axum,
//! answering every request with the `{code, msg, data}` envelope.

pub mod accounts;
pub mod action;
pub mod auth;
pub mod case;
pub mod config;
pub mod crud;
pub mod error;
pub mod extractors;
pub mod field;
pub mod middleware;
pub mod resource;
pub mod response;
pub mod routes;
pub mod sql;
pub mod store;

pub use accounts::AccountsModule;
pub use action::{Action, ActionBuilder, Binder};
pub use auth::{
    authenticate, require_auth, Argon2Hasher, AuthGuard, JwtKeys, PasswordHasher, SharedIssuer, SharedVerifier,
    TokenIssuer, TokenVerifier,
};
pub use config::AppConfig;
pub use crud::{new_id, CrudConfig, Operations};
pub use error::{ApiError, BoxError, ConfigError, StoreError};
pub use extractors::{Principal, RequestContext};
pub use middleware::standard_layers;
pub use resource::Resource;
pub use response::{respond, Envelope};
pub use routes::{common_routes, Module, Registry, RouteGroup};
pub use store::{Db, Filter, InMemoryStore, Order, PgStore, Query, Records, Row, Store, Transaction};
