use thiserror::Error;

use crate::battle::flow::BattlePhase;
use crate::battle::scene::Side;
use crate::core::types::UnitId;

#[derive(Error, Debug)]
pub enum BattleError {
    #[error("Invalid battle config: {0}")]
    InvalidConfig(String),

    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Unknown summon template: {0}")]
    UnknownSummon(String),

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("Invalid params for '{kind}' step: {reason}")]
    InvalidStepParams { kind: String, reason: String },

    #[error("{side:?} roster is full ({cap} units)")]
    RosterFull { side: Side, cap: usize },

    #[error("Operation requires {expected:?} phase, battle is in {actual:?}")]
    InvalidPhase {
        expected: BattlePhase,
        actual: BattlePhase,
    },

    #[error("Action submitted for {got} but {expected:?} is the current actor")]
    NotCurrentActor {
        expected: Option<UnitId>,
        got: UnitId,
    },

    #[error("Step task failed: {0}")]
    StepTask(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl BattleError {
    /// Bad content or configuration, as opposed to misuse of the battle protocol.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BattleError::InvalidConfig(_)
                | BattleError::UnknownSkill(_)
                | BattleError::UnknownItem(_)
                | BattleError::UnknownSummon(_)
                | BattleError::UnknownStepType(_)
                | BattleError::InvalidStepParams { .. }
                | BattleError::SerdeError(_)
                | BattleError::TomlError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BattleError>;
