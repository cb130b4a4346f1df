//! Battle actions submitted during the command phase

use serde::{Deserialize, Serialize};

use crate::core::types::{ActionId, UnitId};

/// What an action does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Attack,
    Skill,
    Item,
    Defend,
    Escape,
    Summon,
}

/// One unit's command for a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleAction {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub actor_id: UnitId,
    #[serde(default)]
    pub target_ids: Vec<UnitId>,
    #[serde(default)]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    /// Summon template to instantiate
    #[serde(default)]
    pub summon_id: Option<String>,
    /// Actor's `speed + luck` when the action was submitted
    #[serde(default)]
    pub priority: u32,
}

impl BattleAction {
    pub fn new(kind: ActionKind, actor_id: UnitId) -> Self {
        Self {
            id: ActionId::new(),
            kind,
            actor_id,
            target_ids: Vec::new(),
            skill_id: None,
            item_id: None,
            summon_id: None,
            priority: 0,
        }
    }

    pub fn attack(actor_id: UnitId, target_id: UnitId) -> Self {
        Self::new(ActionKind::Attack, actor_id).with_targets(vec![target_id])
    }

    pub fn defend(actor_id: UnitId) -> Self {
        Self::new(ActionKind::Defend, actor_id)
    }

    pub fn escape(actor_id: UnitId) -> Self {
        Self::new(ActionKind::Escape, actor_id)
    }

    pub fn skill(actor_id: UnitId, skill_id: impl Into<String>, targets: Vec<UnitId>) -> Self {
        let mut action = Self::new(ActionKind::Skill, actor_id).with_targets(targets);
        action.skill_id = Some(skill_id.into());
        action
    }

    pub fn item(actor_id: UnitId, item_id: impl Into<String>, targets: Vec<UnitId>) -> Self {
        let mut action = Self::new(ActionKind::Item, actor_id).with_targets(targets);
        action.item_id = Some(item_id.into());
        action
    }

    pub fn summon(actor_id: UnitId, summon_id: impl Into<String>) -> Self {
        let mut action = Self::new(ActionKind::Summon, actor_id);
        action.summon_id = Some(summon_id.into());
        action
    }

    pub fn with_targets(mut self, targets: Vec<UnitId>) -> Self {
        self.target_ids = targets;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}
