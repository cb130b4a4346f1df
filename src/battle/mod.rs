//! Battle system - turn-based sprite battles on a 3x2 grid per side
//!
//! Each round has two phases:
//! - Command: player units are prompted in on-screen order, one at a time,
//!   under a countdown that auto-defends idle units
//! - Execute: every command (enemy AI included) is sorted by speed + luck
//!   and resolved sequentially, with choreography played between state
//!   changes
//!
//! The scene owns every unit; only the turn controller mutates it.

pub mod action;
pub mod ai;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod events;
pub mod executor;
pub mod flow;
pub mod queue;
pub mod scene;
pub mod timer;
pub mod unit;

// Re-exports for convenient access
pub use action::{ActionKind, BattleAction};
pub use ai::{EnemyStrategy, RandomTargetStrategy};
pub use catalog::{Catalogs, ItemDefinition, SkillDefinition, SkillEffect};
pub use config::{BattleConfig, PositionConfig, StatsConfig, UnitConfig};
pub use constants::*;
pub use events::{BattleEvent, BattleEventType, EventBus, ListenerId};
pub use executor::{
    calculate_damage, ActionExecutor, ActionOutcome, ActionResult, RejectReason, SkipReason,
    UnitEffect,
};
pub use flow::{BattleCommand, BattleFlow, BattleFlowState, BattlePhase, BattleResult};
pub use queue::{sort_action_queue, ActionQueue, ActionQueueItem};
pub use scene::{BattleScene, Side};
pub use timer::CommandTimer;
pub use unit::{DamageReport, GridPosition, Unit, UnitStats};
