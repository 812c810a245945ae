//! Contract creation block store operations.
//!
//! Addresses are stored as lowercase `0x`-prefixed hex so lookups are
//! insensitive to the checksum casing callers pass in.

use std::collections::HashMap;

use alloy_primitives::Address;
use alloy_primitives::hex;
use chainfacts_types::Network;

use crate::error::DbError;
use crate::store::{StorePool, from_db_int, placeholders, to_db_int, value_tuples};

/// Default number of keys per lookup or insert statement.
const DEFAULT_BATCH_SIZE: usize = 500;

/// Render an address the way it is stored.
fn address_key(address: &Address) -> String {
    hex::encode_prefixed(address)
}

/// Operations on the `contract_creation_blocks` table.
pub struct ContractCreationStore<'a> {
    store: &'a StorePool,
    batch_size: usize,
}

impl<'a> ContractCreationStore<'a> {
    /// Create a new contract creation store bound to a store handle.
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

    /// Look up the creation blocks of many contracts.
    ///
    /// The result is parallel to `addresses`, with `None` for contracts that
    /// are not cached.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if a query fails, or [`DbError::Corrupt`]
    /// if a stored address cannot be parsed.
    pub async fn query_creation_blocks(
        &self,
        network: Network,
        addresses: &[Address],
    ) -> Result<Vec<Option<u64>>, DbError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let network_i64 = to_db_int("contract_creation_blocks.network", network.chain_id())?;
        let mut found: HashMap<Address, u64> = HashMap::with_capacity(addresses.len());

        for chunk in addresses.chunks(self.batch_size) {
            let sql = format!(
                "SELECT address, block_number FROM contract_creation_blocks \
                 WHERE network = $1 AND address IN ({})",
                placeholders(2, chunk.len())
            );
            let mut query = sqlx::query_as::<_, (String, i64)>(&sql).bind(network_i64);
            for address in chunk {
                query = query.bind(address_key(address));
            }

            for (address, block) in query.fetch_all(self.store.pool()).await? {
                let parsed: Address = address.parse().map_err(|e| DbError::Corrupt {
                    column: "contract_creation_blocks.address",
                    message: format!("{address:?}: {e}"),
                })?;
                found.insert(
                    parsed,
                    from_db_int("contract_creation_blocks.block_number", block)?,
                );
            }
        }

        tracing::debug!(
            network = network.chain_id(),
            requested = addresses.len(),
            found = found.len(),
            "Queried contract creation blocks"
        );

        Ok(addresses
            .iter()
            .map(|address| found.get(address).copied())
            .collect())
    }

    /// Look up the creation block of a single contract.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if the query fails.
    pub async fn query_creation_block(
        &self,
        network: Network,
        address: &Address,
    ) -> Result<Option<u64>, DbError> {
        let row: Option<i64> = sqlx::query_scalar(
            r"SELECT block_number FROM contract_creation_blocks
              WHERE network = $1 AND address = $2",
        )
        .bind(to_db_int("contract_creation_blocks.network", network.chain_id())?)
        .bind(address_key(address))
        .fetch_optional(self.store.pool())
        .await?;

        row.map(|block| from_db_int("contract_creation_blocks.block_number", block))
            .transpose()
    }

    /// Insert `(address, block_number)` pairs, ignoring contracts already stored.
    ///
    /// Runs in one transaction. Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Query`] if an insert fails.
    pub async fn insert_creation_blocks(
        &self,
        network: Network,
        entries: &[(Address, u64)],
    ) -> Result<u64, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let network_i64 = to_db_int("contract_creation_blocks.network", network.chain_id())?;
        let mut inserted: u64 = 0;
        let _writes = self.store.lock_writes().await;
        let mut tx = self.store.pool().begin().await?;

        for chunk in entries.chunks(self.batch_size) {
            let sql = format!(
                "INSERT INTO contract_creation_blocks (network, address, block_number) \
                 VALUES {} ON CONFLICT (network, address) DO NOTHING",
                value_tuples(chunk.len(), 3)
            );
            let mut query = sqlx::query(&sql);
            for (address, block) in chunk {
                query = query
                    .bind(network_i64)
                    .bind(address_key(address))
                    .bind(to_db_int("contract_creation_blocks.block_number", *block)?);
            }
            let result = query.execute(&mut *tx).await?;
            inserted = inserted.saturating_add(result.rows_affected());
        }

        tx.commit().await?;

        tracing::debug!(
            network = network.chain_id(),
            offered = entries.len(),
            inserted,
            "Inserted contract creation blocks"
        );
        Ok(inserted)
    }
}
