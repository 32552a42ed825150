// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the badge data source.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use compass_config::model::StorageConfig;
use compass_core::{
    AdapterType, BadgeSource, ChatMessage, CompassError, ConversationKey, Counterpart,
    HealthStatus, PendingFilter, PluginAdapter, ReadMarker, UserId, Viewer,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// The authoritative store, as seen by badge aggregation and the CLI.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub async fn open(config: &StorageConfig) -> Result<Self, CompassError> {
        let db = Database::open_with_options(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store initialized");
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CompassError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CompassError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl BadgeSource for SqliteStore {
    async fn counterparts(&self, viewer: &Viewer) -> Result<Vec<Counterpart>, CompassError> {
        queries::directory::counterparts(&self.db, viewer).await
    }

    async fn messages_for(
        &self,
        keys: &[ConversationKey],
    ) -> Result<Vec<ChatMessage>, CompassError> {
        queries::messages::messages_for(&self.db, keys).await
    }

    async fn read_markers(
        &self,
        reader: &UserId,
        keys: &[ConversationKey],
    ) -> Result<HashMap<ConversationKey, ReadMarker>, CompassError> {
        queries::read_markers::markers_for(&self.db, reader, keys).await
    }

    async fn count_pending(&self, filter: &PendingFilter) -> Result<u32, CompassError> {
        queries::pending::count_pending(&self.db, filter).await
    }
}
