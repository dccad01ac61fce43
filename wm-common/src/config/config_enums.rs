use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

#[derive(
    Clone, Copy, Display, EnumString, IntoStaticStr, Debug, PartialEq, Eq, Default, Serialize,
    Deserialize, Hash,
)]
pub enum SourceType {
    #[default]
    #[strum(serialize = "hive")]
    #[serde(rename = "hive")]
    Hive,
    #[strum(serialize = "databricks")]
    #[serde(rename = "databricks")]
    Databricks,
    #[strum(serialize = "jdbc")]
    #[serde(rename = "jdbc")]
    Jdbc,
}

#[derive(
    Clone, Copy, Display, EnumString, IntoStaticStr, Debug, PartialEq, Eq, Default, Serialize,
    Deserialize, Hash,
)]
pub enum JobType {
    #[default]
    #[strum(serialize = "database")]
    #[serde(rename = "database")]
    Database,
    #[strum(serialize = "tables")]
    #[serde(rename = "tables")]
    Tables,
    #[strum(serialize = "partitions")]
    #[serde(rename = "partitions")]
    Partitions,
}

#[derive(
    Clone, Copy, Display, EnumString, IntoStaticStr, Debug, PartialEq, Eq, Default, Serialize,
    Deserialize, Hash,
)]
pub enum TimerType {
    #[default]
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    None,
    #[strum(serialize = "daily")]
    #[serde(rename = "daily")]
    Daily,
    #[strum(serialize = "hourly")]
    #[serde(rename = "hourly")]
    Hourly,
}

/// roll-up status of jobs and catalog entities (source/database/table/partition)
#[derive(
    Clone, Copy, Display, EnumString, IntoStaticStr, Debug, PartialEq, Eq, Default, Serialize,
    Deserialize, Hash,
)]
pub enum MigrationStatus {
    #[default]
    #[strum(serialize = "INIT")]
    #[serde(rename = "INIT")]
    Init,
    #[strum(serialize = "DOING")]
    #[serde(rename = "DOING")]
    Doing,
    #[strum(serialize = "DONE")]
    #[serde(rename = "DONE")]
    Done,
    #[strum(serialize = "FAILED")]
    #[serde(rename = "FAILED")]
    Failed,
    #[strum(serialize = "PART_DONE")]
    #[serde(rename = "PART_DONE")]
    PartDone,
}

#[derive(
    Clone, Copy, Display, EnumString, IntoStaticStr, Debug, PartialEq, Eq, Default, Serialize,
    Deserialize, Hash,
)]
pub enum TaskStatus {
    #[default]
    #[strum(serialize = "INIT")]
    #[serde(rename = "INIT")]
    Init,
    #[strum(serialize = "SCHEMA_DOING")]
    #[serde(rename = "SCHEMA_DOING")]
    SchemaDoing,
    #[strum(serialize = "SCHEMA_DONE")]
    #[serde(rename = "SCHEMA_DONE")]
    SchemaDone,
    #[strum(serialize = "SCHEMA_FAILED")]
    #[serde(rename = "SCHEMA_FAILED")]
    SchemaFailed,
    #[strum(serialize = "DATA_DOING")]
    #[serde(rename = "DATA_DOING")]
    DataDoing,
    #[strum(serialize = "DATA_DONE")]
    #[serde(rename = "DATA_DONE")]
    DataDone,
    #[strum(serialize = "DATA_FAILED")]
    #[serde(rename = "DATA_FAILED")]
    DataFailed,
    #[strum(serialize = "VERIFICATION_DOING")]
    #[serde(rename = "VERIFICATION_DOING")]
    VerificationDoing,
    #[strum(serialize = "VERIFICATION_DONE")]
    #[serde(rename = "VERIFICATION_DONE")]
    VerificationDone,
    #[strum(serialize = "VERIFICATION_FAILED")]
    #[serde(rename = "VERIFICATION_FAILED")]
    VerificationFailed,
    #[strum(serialize = "DONE")]
    #[serde(rename = "DONE")]
    Done,
}

impl TaskStatus {
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            TaskStatus::SchemaFailed | TaskStatus::DataFailed | TaskStatus::VerificationFailed
        )
    }

    pub fn is_doing(&self) -> bool {
        matches!(
            self,
            TaskStatus::SchemaDoing | TaskStatus::DataDoing | TaskStatus::VerificationDoing
        )
    }

    /// terminal until an explicit retry/reset action
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done) || self.is_failed()
    }
}

#[derive(
    Clone, Copy, Display, EnumString, IntoStaticStr, Debug, PartialEq, Eq, Default, Serialize,
    Deserialize, Hash,
)]
pub enum JobBatchStatus {
    #[default]
    #[strum(serialize = "OK")]
    #[serde(rename = "OK")]
    Ok,
    #[strum(serialize = "FAILED")]
    #[serde(rename = "FAILED")]
    Failed,
}
