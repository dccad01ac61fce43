use std::sync::Arc;

use async_trait::async_trait;

use wm_common::{
    config::config_enums::MigrationStatus,
    meta::catalog::{DatabaseModel, PartitionModel, SourceModel, TableModel},
    monitor::scan_progress::ScanProgress,
};

/// last-known source/database/table/partition metadata, written by an
/// external scanner, read by task expansion and the progress aggregator
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert_source(&self, source: SourceModel) -> anyhow::Result<i64>;

    async fn upsert_database(&self, db: DatabaseModel) -> anyhow::Result<i64>;

    async fn upsert_table(&self, table: TableModel) -> anyhow::Result<i64>;

    async fn upsert_partition(&self, partition: PartitionModel) -> anyhow::Result<i64>;

    async fn get_source_by_name(&self, name: &str) -> anyhow::Result<Option<SourceModel>>;

    async fn get_database_by_name(
        &self,
        source_id: i64,
        name: &str,
    ) -> anyhow::Result<Option<DatabaseModel>>;

    async fn get_table(&self, table_id: i64) -> anyhow::Result<Option<TableModel>>;

    async fn get_table_by_name(
        &self,
        db_id: i64,
        name: &str,
    ) -> anyhow::Result<Option<TableModel>>;

    async fn list_databases(&self, source_id: i64) -> anyhow::Result<Vec<DatabaseModel>>;

    async fn list_tables(&self, db_id: i64) -> anyhow::Result<Vec<TableModel>>;

    async fn list_partitions(&self, table_id: i64) -> anyhow::Result<Vec<PartitionModel>>;

    async fn get_partitions(&self, partition_ids: &[i64]) -> anyhow::Result<Vec<PartitionModel>>;

    async fn update_source_status(
        &self,
        source_id: i64,
        status: MigrationStatus,
    ) -> anyhow::Result<()>;

    async fn update_database_status(
        &self,
        db_id: i64,
        status: MigrationStatus,
    ) -> anyhow::Result<()>;

    async fn update_table_status(
        &self,
        table_id: i64,
        status: MigrationStatus,
    ) -> anyhow::Result<()>;

    async fn update_partitions_status(
        &self,
        partition_ids: &[i64],
        status: MigrationStatus,
    ) -> anyhow::Result<()>;

    /// clear the `updated` flags once an incremental batch has consumed them
    async fn clear_updated_flags(
        &self,
        table_ids: &[i64],
        partition_ids: &[i64],
    ) -> anyhow::Result<()>;

    /// distinct (table_id, status) pairs over all partitions
    async fn partition_status_stat(&self) -> anyhow::Result<Vec<(i64, MigrationStatus)>>;

    /// distinct (db_id, status) pairs over all tables
    async fn table_status_stat(&self) -> anyhow::Result<Vec<(i64, MigrationStatus)>>;

    /// distinct (source_id, status) pairs over all databases
    async fn database_status_stat(&self) -> anyhow::Result<Vec<(i64, MigrationStatus)>>;

    /// crash recovery: entities stuck in DOING drop back to INIT
    async fn reset_doing_statuses(&self) -> anyhow::Result<()>;

    fn scan_progress(&self, source_id: i64) -> Arc<ScanProgress>;
}
