use strum::{Display, EnumString, IntoStaticStr};

use wm_common::config::config_enums::TaskStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum Phase {
    #[strum(serialize = "schema_copy")]
    Schema,
    #[strum(serialize = "data_copy")]
    Data,
    #[strum(serialize = "verification")]
    Verification,
}

impl Phase {
    pub fn doing_status(&self) -> TaskStatus {
        match self {
            Phase::Schema => TaskStatus::SchemaDoing,
            Phase::Data => TaskStatus::DataDoing,
            Phase::Verification => TaskStatus::VerificationDoing,
        }
    }

    pub fn done_status(&self) -> TaskStatus {
        match self {
            Phase::Schema => TaskStatus::SchemaDone,
            Phase::Data => TaskStatus::DataDone,
            Phase::Verification => TaskStatus::VerificationDone,
        }
    }

    pub fn failed_status(&self) -> TaskStatus {
        match self {
            Phase::Schema => TaskStatus::SchemaFailed,
            Phase::Data => TaskStatus::DataFailed,
            Phase::Verification => TaskStatus::VerificationFailed,
        }
    }
}

/// the phase to dispatch for a task sitting at `status`, None when the
/// pipeline is complete. a `*_DOING` status re-runs its own phase (the
/// previous run was cut short), a `*_FAILED` status re-runs its own phase
/// (an explicit retry re-admits at the current phase).
pub fn next_phase(
    status: TaskStatus,
    schema_only: bool,
    enable_verification: bool,
) -> Option<Phase> {
    match status {
        TaskStatus::Init | TaskStatus::SchemaDoing | TaskStatus::SchemaFailed => {
            Some(Phase::Schema)
        }

        TaskStatus::SchemaDone => {
            if schema_only {
                None
            } else {
                Some(Phase::Data)
            }
        }

        TaskStatus::DataDoing | TaskStatus::DataFailed => Some(Phase::Data),

        TaskStatus::DataDone => {
            if enable_verification {
                Some(Phase::Verification)
            } else {
                None
            }
        }

        TaskStatus::VerificationDoing | TaskStatus::VerificationFailed => {
            Some(Phase::Verification)
        }

        TaskStatus::VerificationDone | TaskStatus::Done => None,
    }
}
