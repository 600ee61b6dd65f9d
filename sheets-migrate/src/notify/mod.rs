//! Change notifications back to the spreadsheet side
//!
//! Pushing changes back into the sheet is not implemented; the default
//! notifier only logs what it would send.

use anyhow::Result;
use async_trait::async_trait;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Order,
    Customer,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Order => "order",
            Entity::Customer => "customer",
        }
    }
}

/// What happened to a record that originated in the sheet.
///
/// `row` is the 1-based data row index in the source sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Imported { row: i64, record_id: i64 },
    Deleted { row: i64 },
}

#[async_trait]
pub trait SourceNotifier: Send + Sync {
    async fn notify_source_of_change(&self, entity: Entity, change: &Change) -> Result<()>;
}

/// Logs each change and does nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl SourceNotifier for LogNotifier {
    async fn notify_source_of_change(&self, entity: Entity, change: &Change) -> Result<()> {
        match change {
            Change::Imported { row, record_id } => info!(
                "Sheet row {} imported as {} {}",
                row,
                entity.as_str(),
                record_id
            ),
            Change::Deleted { row } => {
                info!("{} for sheet row {} deleted", entity.as_str(), row)
            }
        }
        Ok(())
    }
}
