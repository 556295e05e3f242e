//! The capability a record type implements to be served by the CRUD generator.
//!
//! Instead of inspecting records at runtime, a record declares its storage table and
//! its string-typed fields in declaration order, with by-name access to them. The
//! field resolver (`crate::field`) looks identity and owner fields up through this
//! trait. Fields serialize under their Rust names; those names are the store columns.
//!
//! ```rust,ignore
//! #[derive(Clone, Debug, Default, Serialize, Deserialize)]
//! pub struct Note {
//!     pub id: String,
//!     pub owner_id: String,
//!     pub title: String,
//!     pub done: bool,
//! }
//!
//! ezkit::impl_resource!(Note, "notes", [id, owner_id, title]);
//! ```

use serde::{de::DeserializeOwned, Serialize};

pub trait Resource: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Storage table holding the records.
    const TABLE: &'static str;

    /// Names of the string-typed fields, in declaration order.
    fn string_fields() -> &'static [&'static str];

    fn string_field(&self, name: &str) -> Option<&String>;

    fn string_field_mut(&mut self, name: &str) -> Option<&mut String>;
}

/// Implement [`Resource`] for a struct: table name and its `String` fields in declaration order.
#[macro_export]
macro_rules! impl_resource {
    ($type:ty, $table:expr, [$($field:ident),* $(,)?]) => {
        impl $crate::resource::Resource for $type {
            const TABLE: &'static str = $table;

            fn string_fields() -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            fn string_field(&self, name: &str) -> Option<&String> {
                match name {
                    $(stringify!($field) => Some(&self.$field),)*
                    _ => None,
                }
            }

            fn string_field_mut(&mut self, name: &str) -> Option<&mut String> {
                match name {
                    $(stringify!($field) => Some(&mut self.$field),)*
                    _ => None,
                }
            }
        }
    };
}
