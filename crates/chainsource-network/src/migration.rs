//! Versioned schema-migration ledger.
//!
//! Account-style chains couple DDL changes to the indexed height. The ledger
//! records each applied migration's `upQueries`/`downQueries` against the
//! height it applied at; a reorganisation that discards those heights must
//! roll the migrations back in exact reverse order of application, before
//! the height itself rolls back.

use serde::{Deserialize, Serialize};

/// One applied migration, coupled to the height it applied at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Indexed height at the time the migration applied.
    pub height: u64,
    pub up_queries: Vec<String>,
    pub down_queries: Vec<String>,
}

/// Ordered ledger of applied migrations, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationLedger {
    records: Vec<MigrationRecord>,
}

impl MigrationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a migration as applied at `height`.
    pub fn record(&mut self, height: u64, up_queries: Vec<String>, down_queries: Vec<String>) {
        self.records.push(MigrationRecord {
            height,
            up_queries,
            down_queries,
        });
    }

    /// Migrations applied at or above `height`, newest first — the exact
    /// reverse of application order, ready for rollback.
    pub fn rollback_set(&self, height: u64) -> Vec<MigrationRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.height >= height)
            .cloned()
            .collect()
    }

    /// Pop the most recently applied migration (rollback step).
    pub fn pop(&mut self) -> Option<MigrationRecord> {
        self.records.pop()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(tag: &str) -> (Vec<String>, Vec<String>) {
        (
            vec![format!("CREATE TABLE {tag}")],
            vec![format!("DROP TABLE {tag}")],
        )
    }

    #[test]
    fn rollback_set_is_reverse_application_order() {
        let mut ledger = MigrationLedger::new();
        let (up_a, down_a) = queries("a");
        let (up_b, down_b) = queries("b");
        let (up_c, down_c) = queries("c");
        ledger.record(10, up_a, down_a);
        ledger.record(20, up_b, down_b);
        ledger.record(30, up_c, down_c);

        let rollback = ledger.rollback_set(20);
        assert_eq!(rollback.len(), 2);
        assert_eq!(rollback[0].height, 30); // newest first
        assert_eq!(rollback[1].height, 20);
        assert_eq!(rollback[0].down_queries, vec!["DROP TABLE c".to_string()]);
    }

    #[test]
    fn rollback_below_all_heights_is_everything() {
        let mut ledger = MigrationLedger::new();
        let (up, down) = queries("x");
        ledger.record(5, up, down);
        assert_eq!(ledger.rollback_set(0).len(), 1);
        assert_eq!(ledger.rollback_set(6).len(), 0);
    }

    #[test]
    fn pop_removes_newest() {
        let mut ledger = MigrationLedger::new();
        let (up_a, down_a) = queries("a");
        let (up_b, down_b) = queries("b");
        ledger.record(1, up_a, down_a);
        ledger.record(2, up_b, down_b);
        assert_eq!(ledger.pop().unwrap().height, 2);
        assert_eq!(ledger.len(), 1);
    }
}
