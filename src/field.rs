//! Identity and owner field resolution over [`Resource`] records.

use crate::resource::Resource;

pub const DEFAULT_ID_FIELDS: &[&str] = &["id"];
pub const DEFAULT_OWNER_FIELDS: &[&str] = &["owner_id", "user_id", "uid"];

/// Prioritized field names: the configured name first, then conventional fallbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldCandidates(Vec<String>);

impl FieldCandidates {
    fn with_fallbacks(configured: Option<&str>, fallbacks: &[&str]) -> Self {
        let mut names = Vec::with_capacity(fallbacks.len() + 1);
        if let Some(name) = configured.filter(|n| !n.is_empty()) {
            names.push(name.to_string());
        }
        names.extend(fallbacks.iter().map(|n| n.to_string()));
        FieldCandidates(names)
    }

    pub fn identity(configured: Option<&str>) -> Self {
        Self::with_fallbacks(configured, DEFAULT_ID_FIELDS)
    }

    pub fn owner(configured: Option<&str>) -> Self {
        Self::with_fallbacks(configured, DEFAULT_OWNER_FIELDS)
    }

    /// Highest-priority name.
    pub fn first(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c == name)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// A resolved field: its name and a handle on its value.
pub struct Located<'a> {
    pub name: &'static str,
    pub value: &'a mut String,
}

/// Name of the first string field, in declaration order, that matches any candidate.
pub fn resolve_name<T: Resource>(candidates: &FieldCandidates) -> Option<&'static str> {
    T::string_fields()
        .iter()
        .copied()
        .find(|name| candidates.contains(name))
}

pub fn locate<'a, T: Resource>(record: &'a mut T, candidates: &FieldCandidates) -> Option<Located<'a>> {
    let name = resolve_name::<T>(candidates)?;
    let value = record.string_field_mut(name)?;
    Some(Located { name, value })
}

pub fn read<T: Resource>(record: &T, candidates: &FieldCandidates) -> Option<String> {
    let name = resolve_name::<T>(candidates)?;
    record.string_field(name).cloned()
}

/// Overwrite the resolved field. Returns false when no field matches.
pub fn write<T: Resource>(record: &mut T, candidates: &FieldCandidates, value: impl Into<String>) -> bool {
    match locate(record, candidates) {
        Some(located) => {
            *located.value = value.into();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct Note {
        id: String,
        owner_id: String,
        title: String,
        pages: u32,
    }

    crate::impl_resource!(Note, "notes", [id, owner_id, title]);

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct Ticket {
        key: String,
        user_id: String,
        owner_id: String,
    }

    crate::impl_resource!(Ticket, "tickets", [key, user_id, owner_id]);

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct Orphan {
        id: String,
    }

    crate::impl_resource!(Orphan, "orphans", [id]);

    #[test]
    fn candidates_put_configured_name_first() {
        let c = FieldCandidates::owner(Some("author"));
        assert_eq!(c.names(), &["author", "owner_id", "user_id", "uid"]);
        assert_eq!(FieldCandidates::identity(None).names(), &["id"]);
        assert_eq!(FieldCandidates::identity(Some("")).first(), "id");
    }

    #[test]
    fn reads_and_writes_resolved_fields() {
        let mut note = Note::default();
        assert!(write(&mut note, &FieldCandidates::owner(None), "u1"));
        assert_eq!(note.owner_id, "u1");
        assert_eq!(read(&note, &FieldCandidates::owner(None)).as_deref(), Some("u1"));

        let located = locate(&mut note, &FieldCandidates::identity(None)).unwrap();
        assert_eq!(located.name, "id");
        *located.value = "n1".into();
        assert_eq!(note.id, "n1");
    }

    #[test]
    fn declaration_order_wins_over_candidate_order() {
        // owner_id is the higher-priority candidate, but user_id is declared first.
        assert_eq!(resolve_name::<Ticket>(&FieldCandidates::owner(None)), Some("user_id"));
    }

    #[test]
    fn configured_name_resolves_custom_identity() {
        assert_eq!(resolve_name::<Ticket>(&FieldCandidates::identity(Some("key"))), Some("key"));
        assert_eq!(resolve_name::<Ticket>(&FieldCandidates::identity(None)), None);
    }

    #[test]
    fn missing_field_is_reported() {
        let mut orphan = Orphan::default();
        assert!(!write(&mut orphan, &FieldCandidates::owner(None), "u1"));
        assert!(read(&orphan, &FieldCandidates::owner(None)).is_none());
    }

    #[test]
    fn non_string_fields_are_never_candidates() {
        let c = FieldCandidates::identity(Some("pages"));
        assert_eq!(resolve_name::<Note>(&c), Some("id"));
    }
}
