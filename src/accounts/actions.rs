//! Login, profile and user administration endpoints.

use super::model::{User, UserRow, UserView, ROLE_ADMIN, ROLE_USER};
use super::validation::{default_name, validate_login};
use crate::action::{Action, ActionBuilder, Binder};
use crate::auth::{PasswordHasher, SharedIssuer};
use crate::crud::new_id;
use crate::error::{ApiError, BoxError, StoreError};
use crate::extractors::RequestContext;
use crate::response::CODE_SERVER_ERROR;
use crate::store::{Db, Filter, Order, Query, Records, Row};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    /// Used only when the login registers a new account.
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginOutput {
    pub token: String,
    #[serde(rename = "isNew")]
    pub is_new: bool,
    pub user: UserView,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ListUsersQuery {
    pub offset: u64,
    pub limit: i64,
    /// Substring of email or name.
    pub q: Option<String>,
    /// Include banned accounts.
    pub with_deleted: bool,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        ListUsersQuery {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
            q: None,
            with_deleted: false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ListUsersOutput {
    pub total: u64,
    pub items: Vec<UserRow>,
}

/// Accounts that have not been banned.
fn active() -> Filter {
    Filter::new().eq("deleted_at", Value::Null)
}

/// `POST /auth/login`. Unknown emails register on the spot.
///
/// Runs outside a transaction: on PostgreSQL a unique violation aborts the
/// surrounding transaction, and the concurrent-registration recovery needs to read
/// the row the other request created.
pub fn login(issuer: SharedIssuer, hasher: Arc<dyn PasswordHasher>) -> Action<LoginInput, LoginOutput> {
    ActionBuilder::post("/auth/login")
        .bind(Binder::Json)
        .handle(move |_ctx: RequestContext, db: Db, input: LoginInput| {
            let issuer = issuer.clone();
            let hasher = hasher.clone();
            async move { do_login(db, issuer, hasher, input).await.map_err(BoxError::from) }
        })
}

async fn do_login(
    db: Db,
    issuer: SharedIssuer,
    hasher: Arc<dyn PasswordHasher>,
    input: LoginInput,
) -> Result<LoginOutput, ApiError> {
    let input = validate_login(&input)?;
    let users = Records::<User>::new(db);
    let by_email = Filter::new().eq("email", input.email.as_str());

    let (user, is_new) = match users.first(&by_email).await {
        Ok(user) if user.is_banned() => {
            tracing::info!(user_id = %user.id, "banned user tried to log in");
            return Err(ApiError::forbidden("user banned"));
        }
        Ok(user) => {
            if !hasher.verify(&input.password, &user.password_hash) {
                tracing::info!(email = %input.email, "login rejected");
                return Err(ApiError::unauthorized("invalid credentials"));
            }
            (user, false)
        }
        Err(StoreError::NotFound) => {
            let password_hash = hasher
                .hash(&input.password)
                .map_err(|e| ApiError::internal("login failed", e))?;
            let candidate = User {
                id: new_id(),
                email: input.email.clone(),
                name: default_name(&input.email, &input.name),
                password_hash,
                role: ROLE_USER.to_string(),
                created_at: Utc::now(),
                deleted_at: None,
            };
            match users.insert(&candidate).await {
                Ok(user) => {
                    tracing::info!(user_id = %user.id, "registered on first login");
                    (user, true)
                }
                // Another request registered the same email first.
                Err(StoreError::UniqueViolation(_)) => {
                    let user = users
                        .first(&by_email)
                        .await
                        .map_err(|e| ApiError::internal("login failed", e))?;
                    if user.is_banned() {
                        return Err(ApiError::forbidden("user banned"));
                    }
                    (user, true)
                }
                Err(e) => return Err(ApiError::bad_request(e.to_string())),
            }
        }
        Err(e) => return Err(ApiError::internal("db error", e)),
    };

    let token = issuer
        .issue(&user.id, &user.role)
        .map_err(|e| ApiError::internal("issue token failed", e))?;
    if token.is_empty() {
        return Err(ApiError::new(CODE_SERVER_ERROR, "issue token failed"));
    }
    Ok(LoginOutput {
        token,
        is_new,
        user: UserView::from(&user),
    })
}

/// `GET /me`: the caller's own profile. Banned accounts read as missing.
pub fn me() -> Action<(), UserView> {
    ActionBuilder::get("/me")
        .auth(true)
        .handle(|ctx: RequestContext, db: Db, _: ()| async move { do_me(ctx, db).await.map_err(BoxError::from) })
}

async fn do_me(ctx: RequestContext, db: Db) -> Result<UserView, ApiError> {
    let uid = ctx.user_id().ok_or_else(|| ApiError::unauthorized("unauthorized"))?;
    match Records::<User>::new(db).first(&active().eq("id", uid)).await {
        Ok(user) => Ok(UserView::from(&user)),
        Err(StoreError::NotFound) => Err(ApiError::not_found("user not found")),
        Err(e) => Err(ApiError::internal("db error", e)),
    }
}

/// Admin `GET /users`: newest first, optionally searched by email or name. Banned
/// accounts are listed only with `with_deleted=true`.
pub fn list_users() -> Action<ListUsersQuery, ListUsersOutput> {
    ActionBuilder::get("/users")
        .bind(Binder::Query)
        .auth(true)
        .roles([ROLE_ADMIN])
        .handle(|_ctx: RequestContext, db: Db, input: ListUsersQuery| async move {
            do_list_users(db, input).await.map_err(BoxError::from)
        })
}

async fn do_list_users(db: Db, input: ListUsersQuery) -> Result<ListUsersOutput, ApiError> {
    let limit = if input.limit <= 0 || input.limit > MAX_PAGE_LIMIT {
        DEFAULT_PAGE_LIMIT
    } else {
        input.limit
    };
    let mut filter = if input.with_deleted { Filter::new() } else { active() };
    if let Some(q) = input.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        filter = filter.contains(["email", "name"], q);
    }

    let users = Records::<User>::new(db);
    let total = users
        .count(&filter)
        .await
        .map_err(|e| ApiError::internal("count users failed", e))?;
    let query = Query::new(filter)
        .order_by(Order::desc("created_at"))
        .limit(limit as u64)
        .offset(input.offset);
    let items = users
        .find(&query)
        .await
        .map_err(|e| ApiError::internal("list users failed", e))?;
    Ok(ListUsersOutput {
        total,
        items: items.iter().map(UserRow::from).collect(),
    })
}

/// Admin `POST /users/:id/ban`: soft-deletes the account by stamping `deleted_at`.
pub fn ban_user() -> Action<(), Value> {
    ActionBuilder::post("/users/:id/ban")
        .auth(true)
        .roles([ROLE_ADMIN])
        .transaction(true)
        .handle(|ctx: RequestContext, db: Db, _: ()| async move { do_ban(ctx, db).await.map_err(BoxError::from) })
}

async fn do_ban(ctx: RequestContext, db: Db) -> Result<Value, ApiError> {
    let id = ctx.param("id").unwrap_or_default().trim().to_string();
    if id.is_empty() {
        return Err(ApiError::bad_request("missing id"));
    }
    let mut changes = Row::new();
    changes.insert("deleted_at".into(), json!(Utc::now()));
    let banned = Records::<User>::new(db)
        .update(&active().eq("id", id.as_str()), &changes)
        .await
        .map_err(|e| ApiError::internal("ban user failed", e))?;
    if banned == 0 {
        return Err(ApiError::not_found("user not found"));
    }
    tracing::info!(user_id = %id, "user banned");
    Ok(json!({ "id": id }))
}
