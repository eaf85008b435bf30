//! Table manager for spawning and managing multiple table actors.

use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use super::{
    config::{TableConfig, TableId},
    handle::{Table, TableServices},
};
use crate::game::{
    entities::{Blinds, Phase},
    errors::{TableError, TableResult},
};

/// Table metadata for discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub id: TableId,
    pub name: String,
    pub phase: Phase,
    pub player_count: usize,
    pub max_players: usize,
    pub blinds: Blinds,
    pub hands_played: u64,
    pub halted: bool,
}

/// Registry of running tables. Tables are independent; the manager only
/// creates, finds and closes them.
#[derive(Debug, Default)]
pub struct TableManager {
    /// Active tables
    tables: RwLock<HashMap<TableId, Arc<Table>>>,
}

impl TableManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and start a table with logging-only collaborators.
    pub async fn create_table(&self, config: TableConfig) -> TableResult<Arc<Table>> {
        self.create_table_with(config, TableServices::default()).await
    }

    /// Create and start a table
    ///
    /// Fails with `InvalidConfig` if the config doesn't validate or the
    /// table id is already taken.
    pub async fn create_table_with(
        &self,
        config: TableConfig,
        services: TableServices,
    ) -> TableResult<Arc<Table>> {
        let table_id = config.table_id;
        let mut tables = self.tables.write().await;
        if tables.contains_key(&table_id) {
            return Err(TableError::InvalidConfig(format!(
                "table {table_id} already exists"
            )));
        }

        let table = Arc::new(Table::with_services(config, services)?);
        table.start().await?;
        tables.insert(table_id, Arc::clone(&table));
        log::info!("Created table {table_id}");
        Ok(table)
    }

    pub async fn get_table(&self, table_id: TableId) -> Option<Arc<Table>> {
        self.tables.read().await.get(&table_id).cloned()
    }

    /// Metadata for every table, ordered by id.
    pub async fn list_tables(&self) -> Vec<TableMetadata> {
        let tables = self.tables.read().await;
        let mut metadata: Vec<TableMetadata> = tables
            .values()
            .map(|table| {
                let state = table.get_state();
                TableMetadata {
                    id: state.table_id,
                    name: state.name.clone(),
                    phase: state.phase,
                    player_count: state.occupied_seats(),
                    max_players: state.max_players,
                    blinds: state.blinds,
                    hands_played: state.hand_number,
                    halted: state.halted.is_some(),
                }
            })
            .collect();
        metadata.sort_by_key(|m| m.id);
        metadata
    }

    /// Stop a table and drop it from the registry. Returns whether it
    /// existed.
    pub async fn close_table(&self, table_id: TableId) -> bool {
        let Some(table) = self.tables.write().await.remove(&table_id) else {
            return false;
        };
        table.stop().await;
        log::info!("Closed table {table_id}");
        true
    }

    /// Stop every table.
    pub async fn close_all(&self) {
        let tables: Vec<Arc<Table>> = self.tables.write().await.drain().map(|(_, t)| t).collect();
        for table in tables {
            table.stop().await;
        }
    }

    pub async fn active_table_count(&self) -> usize {
        self.tables.read().await.len()
    }
}
