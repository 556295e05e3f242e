//! Notes: a private, owner-scoped resource served entirely by the CRUD generator.

use ezkit::{CrudConfig, Module, Order, RequestContext, RouteGroup};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub body: String,
    pub done: bool,
    pub created_at: String,
}

ezkit::impl_resource!(Note, "notes", [id, owner_id, title, body, created_at]);

pub const NOTES_DDL: &str = r#"CREATE TABLE IF NOT EXISTS notes (
    id         VARCHAR(32) PRIMARY KEY,
    owner_id   VARCHAR(32) NOT NULL,
    title      VARCHAR(200) NOT NULL,
    body       TEXT NOT NULL DEFAULT '',
    done       BOOLEAN NOT NULL DEFAULT false,
    created_at VARCHAR(40) NOT NULL
)"#;

fn check_title(_ctx: &RequestContext, note: &mut Note) -> Result<(), ezkit::BoxError> {
    note.title = note.title.trim().to_string();
    if note.title.is_empty() {
        return Err("title is required".into());
    }
    Ok(())
}

pub struct NotesModule;

impl Module for NotesModule {
    fn name(&self) -> &str {
        "notes"
    }

    fn mount_api(&self, group: RouteGroup) -> RouteGroup {
        let cfg = CrudConfig::<Note>::new()
            .before_create(|ctx, note| {
                check_title(ctx, note)?;
                note.created_at = chrono::Utc::now().to_rfc3339();
                Ok(())
            })
            .before_update(check_title)
            .order_by(Order::desc("created_at"));
        group.crud("/notes", cfg)
    }
}
