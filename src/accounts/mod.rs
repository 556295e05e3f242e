//! Accounts feature: password login with registration on first use, the caller's
//! profile, and admin user management.

mod actions;
mod model;
mod validation;

pub use actions::{
    ban_user, list_users, login, me, ListUsersOutput, ListUsersQuery, LoginInput, LoginOutput, DEFAULT_PAGE_LIMIT,
    MAX_PAGE_LIMIT,
};
pub use model::{User, UserRow, UserView, ROLE_ADMIN, ROLE_USER, USERS_DDL};
pub use validation::{default_name, validate_login, NAME_MAX_CHARS};

use crate::auth::{PasswordHasher, SharedIssuer};
use crate::routes::{Module, RouteGroup};
use std::sync::Arc;

pub struct AccountsModule {
    issuer: SharedIssuer,
    hasher: Arc<dyn PasswordHasher>,
}

impl AccountsModule {
    pub fn new(issuer: SharedIssuer, hasher: Arc<dyn PasswordHasher>) -> Self {
        AccountsModule { issuer, hasher }
    }
}

impl Module for AccountsModule {
    fn name(&self) -> &str {
        "accounts"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn mount_api(&self, group: RouteGroup) -> RouteGroup {
        group
            .action(login(self.issuer.clone(), self.hasher.clone()))
            .action(me())
    }

    fn mount_admin(&self, group: RouteGroup) -> RouteGroup {
        group.action(list_users()).action(ban_user())
    }
}
