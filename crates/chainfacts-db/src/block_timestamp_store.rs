//! Block timestamp store operations.
//!
//! Block timestamps are immutable once a block is final, so rows are only
//! ever inserted, never updated. Lookups are batched: a single call resolves
//! many block numbers with one `IN (...)` query per batch.

use std::collections::HashMap;

use chainfacts_types::Network;

use crate::error::DbError;
use crate::store::{StorePool, from_db_int, placeholders, to_db_int, value_tuples};

/// Default number of keys per lookup or insert statement.
const DEFAULT_BATCH_SIZE: usize = 500;

/// Operations on the `block_timestamps` table.
pub struct BlockTimestampStore<'a> {
    store: &'a StorePool,
    batch_size: usize,
}

impl<'a> BlockTimestampStore<'a> {
    /// Create a new block timestamp store bound to a store handle.
    pub const fn new(store: &'a StorePool) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size for lookups and inserts.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = if size == 0 { 1 } else { size };
        self
    }

    /// Look up the timestamps of many blocks.
    ///
    /// The result is parallel to `blocks`: position `i` holds the timestamp
    /// of `blocks[i]`, or `None` if that block is not cached. Duplicated
    /// block numbers yield duplicated entries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if a query fails, or
    /// [`DbError::OutOfRange`] if a block number exceeds the column range.
    pub async fn query_timestamps(
        &self,
        network: Network,
        blocks: &[u64],
    ) -> Result<Vec<Option<u64>>, DbError> {
        if blocks.is_empty() {
            return Ok(Vec::new());
        }

        let network_i64 = to_db_int("block_timestamps.network", network.chain_id())?;
        let mut found: HashMap<u64, u64> = HashMap::with_capacity(blocks.len());

        for chunk in blocks.chunks(self.batch_size) {
            let sql = format!(
                "SELECT block_number, block_timestamp FROM block_timestamps \
                 WHERE network = $1 AND block_number IN ({})",
                placeholders(2, chunk.len())
            );
            let mut query = sqlx::query_as::<_, (i64, i64)>(&sql).bind(network_i64);
            for block in chunk {
                query = query.bind(to_db_int("block_timestamps.block_number", *block)?);
            }

            for (block, timestamp) in query.fetch_all(self.store.pool()).await? {
                found.insert(
                    from_db_int("block_timestamps.block_number", block)?,
                    from_db_int("block_timestamps.block_timestamp", timestamp)?,
                );
            }
        }

        tracing::debug!(
            network = network.chain_id(),
            requested = blocks.len(),
            found = found.len(),
            "Queried block timestamps"
        );

        Ok(blocks.iter().map(|block| found.get(block).copied()).collect())
    }

    /// Look up the timestamp of a single block.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if the query fails.
    pub async fn query_timestamp(&self, network: Network, block: u64) -> Result<Option<u64>, DbError> {
        let row: Option<i64> = sqlx::query_scalar(
            r"SELECT block_timestamp FROM block_timestamps
              WHERE network = $1 AND block_number = $2",
        )
        .bind(to_db_int("block_timestamps.network", network.chain_id())?)
        .bind(to_db_int("block_timestamps.block_number", block)?)
        .fetch_optional(self.store.pool())
        .await?;

        row.map(|ts| from_db_int("block_timestamps.block_timestamp", ts))
            .transpose()
    }

    /// Insert `(block_number, timestamp)` pairs, ignoring blocks already stored.
    ///
    /// All batches run in one transaction so either every new row is
    /// committed or none are. Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if an insert fails.
    pub async fn insert_timestamps(
        &self,
        network: Network,
        entries: &[(u64, u64)],
    ) -> Result<u64, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let network_i64 = to_db_int("block_timestamps.network", network.chain_id())?;
        let mut inserted: u64 = 0;
        let _writes = self.store.lock_writes().await;
        let mut tx = self.store.pool().begin().await?;

        for chunk in entries.chunks(self.batch_size) {
            let sql = format!(
                "INSERT INTO block_timestamps (network, block_number, block_timestamp) \
                 VALUES {} ON CONFLICT (network, block_number) DO NOTHING",
                value_tuples(chunk.len(), 3)
            );
            let mut query = sqlx::query(&sql);
            for (block, timestamp) in chunk {
                query = query
                    .bind(network_i64)
                    .bind(to_db_int("block_timestamps.block_number", *block)?)
                    .bind(to_db_int("block_timestamps.block_timestamp", *timestamp)?);
            }
            let result = query.execute(&mut *tx).await?;
            inserted = inserted.saturating_add(result.rows_affected());
        }

        tx.commit().await?;

        tracing::debug!(
            network = network.chain_id(),
            offered = entries.len(),
            inserted,
            "Inserted block timestamps"
        );
        Ok(inserted)
    }
}
