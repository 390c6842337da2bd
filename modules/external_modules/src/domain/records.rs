//! Auto-numbered record ids
//!
//! Allocation is optimistic: claim `max + 1` in the ledger, then check that
//! our claim is the earliest holder of that id. Losing a race means deleting
//! our claim and trying again with a freshly computed id. Ids only grow, so
//! the loop needs no cap.

use super::repository::RecordRepository;
use crate::contract::FrameworkError;
use std::sync::Arc;

pub struct RecordAllocator {
    repo: Arc<dyn RecordRepository>,
}

impl RecordAllocator {
    pub fn new(repo: Arc<dyn RecordRepository>) -> Self {
        Self { repo }
    }

    pub async fn add_auto_numbered_record(&self, project_id: i64) -> Result<i64, FrameworkError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let record_id = self
                .repo
                .max_record_id(project_id)
                .await
                .map_err(FrameworkError::internal)?
                .map_or(1, |max| max + 1);

            let row_id = self
                .repo
                .insert(project_id, record_id)
                .await
                .map_err(FrameworkError::internal)?;

            let holders = self
                .repo
                .rows_for(project_id, record_id)
                .await
                .map_err(FrameworkError::internal)?;

            match holders.first() {
                None => {
                    tracing::error!(project_id, record_id, "claimed record id vanished from the ledger");
                    return Err(FrameworkError::Internal);
                }
                Some(first) if *first == row_id => {
                    tracing::debug!(project_id, record_id, attempts, "record id allocated");
                    return Ok(record_id);
                }
                Some(_) => {
                    self.repo
                        .delete_row(row_id)
                        .await
                        .map_err(FrameworkError::internal)?;
                    tracing::debug!(project_id, record_id, attempts, "record id taken concurrently, retrying");
                }
            }
        }
    }
}
