//! Read-side snapshots
//!
//! Reads never touch the writer: they observe an immutable snapshot
//! published after the most recent commit. A snapshot is either the
//! full pre-state or the full post-state of a transaction, never
//! anything in between.

use serde_json::Value;

use crate::schema::Tables;

/// Immutable view of all committed records.
#[derive(Debug, Default)]
pub struct Snapshot {
    tables: Tables,
}

impl Snapshot {
    pub(crate) fn new(tables: Tables) -> Self {
        Self { tables }
    }

    /// Looks up one record payload by type and id.
    pub fn get(&self, type_name: &str, id: &str) -> Option<&Value> {
        self.tables.get(type_name)?.get(id)
    }

    /// Iterates all records of one type in id order.
    pub fn records<'a>(
        &'a self,
        type_name: &str,
    ) -> Box<dyn Iterator<Item = (&'a String, &'a Value)> + 'a> {
        match self.tables.get(type_name) {
            Some(table) => Box::new(table.iter()),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Number of records of one type.
    pub fn count(&self, type_name: &str) -> usize {
        self.tables.get(type_name).map_or(0, |t| t.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        let mut tables = Tables::new();
        let contacts = tables.entry("contact".to_string()).or_default();
        contacts.insert("a".to_string(), json!({"id": "a"}));
        contacts.insert("b".to_string(), json!({"id": "b"}));
        Snapshot::new(tables)
    }

    #[test]
    fn test_get_present_and_absent() {
        let snapshot = sample();
        assert_eq!(snapshot.get("contact", "a"), Some(&json!({"id": "a"})));
        assert_eq!(snapshot.get("contact", "z"), None);
        assert_eq!(snapshot.get("other", "a"), None);
    }

    #[test]
    fn test_records_of_unknown_type_is_empty() {
        let snapshot = sample();
        assert_eq!(snapshot.records("other").count(), 0);
        assert_eq!(snapshot.count("other"), 0);
    }

    #[test]
    fn test_records_iterates_in_id_order() {
        let snapshot = sample();
        let ids: Vec<&String> = snapshot.records("contact").map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(snapshot.count("contact"), 2);
    }
}
