//! Migration options and the summary returned to the operator

use serde::{Deserialize, Serialize};

/// Flags for one migration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOptions {
    /// Parse and report, but issue no mutating store calls
    #[serde(default)]
    pub dry_run: bool,
    /// Never overwrite a record already present under the same identity key
    #[serde(default)]
    pub skip_existing: bool,
}

/// Counters and errors from a single pass (customers or orders).
///
/// Each pass returns its own value; the orchestrator merges them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassStats {
    pub orders_processed: usize,
    pub customers_processed: usize,
    pub products_processed: usize,
    pub orders_deleted: usize,
    pub errors: Vec<String>,
}

impl PassStats {
    pub fn merge(mut self, other: PassStats) -> Self {
        self.orders_processed += other.orders_processed;
        self.customers_processed += other.customers_processed;
        self.products_processed += other.products_processed;
        self.orders_deleted += other.orders_deleted;
        self.errors.extend(other.errors);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStats {
    pub orders_processed: usize,
    pub customers_processed: usize,
    /// Order items processed
    pub products_processed: usize,
    pub orders_deleted: usize,
    pub errors: Vec<String>,
}

impl From<PassStats> for MigrationStats {
    fn from(pass: PassStats) -> Self {
        Self {
            orders_processed: pass.orders_processed,
            customers_processed: pass.customers_processed,
            products_processed: pass.products_processed,
            orders_deleted: pass.orders_deleted,
            errors: pass.errors,
        }
    }
}

/// Summary of a migration run.
///
/// `success` is false whenever `stats.errors` is non-empty, even if most
/// records were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    pub message: String,
    pub stats: MigrationStats,
}

impl MigrationResult {
    pub fn from_stats(stats: MigrationStats, dry_run: bool) -> Self {
        let base = if dry_run {
            "Dry run completed"
        } else {
            "Migration completed"
        };
        let message = if stats.errors.is_empty() {
            base.to_string()
        } else {
            format!("{} with {} errors", base, stats.errors.len())
        };

        Self {
            success: stats.errors.is_empty(),
            message,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_pass_stats() {
        let customers = PassStats {
            customers_processed: 4,
            errors: vec!["Customer row 2 (0912): boom".to_string()],
            ..Default::default()
        };
        let orders = PassStats {
            orders_processed: 3,
            products_processed: 7,
            orders_deleted: 1,
            ..Default::default()
        };

        let merged = customers.merge(orders);
        assert_eq!(merged.customers_processed, 4);
        assert_eq!(merged.orders_processed, 3);
        assert_eq!(merged.products_processed, 7);
        assert_eq!(merged.orders_deleted, 1);
        assert_eq!(merged.errors.len(), 1);
    }

    #[test]
    fn test_result_json_shape() {
        let stats = MigrationStats {
            orders_processed: 2,
            errors: vec!["Order row 3: store unavailable".to_string()],
            ..Default::default()
        };
        let result = MigrationResult::from_stats(stats, false);
        assert!(!result.success);
        assert_eq!(result.message, "Migration completed with 1 errors");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stats"]["ordersProcessed"], 2);
        assert_eq!(json["stats"]["ordersDeleted"], 0);
        assert!(json["stats"]["errors"].is_array());
    }

    #[test]
    fn test_options_defaults_from_json() {
        let options: MigrationOptions = serde_json::from_str(r#"{"dryRun": true}"#).unwrap();
        assert!(options.dry_run);
        assert!(!options.skip_existing);
    }
}
