//! Skill, item and summon definitions
//!
//! Content authored outside the battle core. Catalogs are injected into the
//! action executor and validated up front, so a broken step list fails while
//! authoring rather than mid-battle.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::config::UnitConfig;
use crate::core::error::{BattleError, Result};
use crate::steps::step::{parse_steps, SkillStep};

/// Stat effect of a skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SkillEffect {
    /// Hit opponent targets; `power` is added to the actor's attack
    Damage { power: u32 },
    /// Restore hp on ally targets
    Heal { power: u32 },
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "mpCost")]
    pub mp_cost: u32,
    #[serde(default)]
    pub effect: SkillEffect,
    #[serde(default)]
    pub steps: Vec<SkillStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "healHp")]
    pub heal_hp: u32,
    #[serde(default, alias = "restoreMp")]
    pub restore_mp: u32,
    /// Flat damage dealt to opponent targets
    #[serde(default)]
    pub damage: u32,
    #[serde(default)]
    pub steps: Vec<SkillStep>,
}

impl ItemDefinition {
    /// True when the item acts on opponents rather than allies
    pub fn is_offensive(&self) -> bool {
        self.damage > 0
    }
}

/// Every definition the executor may resolve actions against
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalogs {
    #[serde(default)]
    pub skills: AHashMap<String, SkillDefinition>,
    #[serde(default)]
    pub items: AHashMap<String, ItemDefinition>,
    /// Summon templates keyed by template id
    #[serde(default)]
    pub summons: AHashMap<String, UnitConfig>,
}

impl Catalogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate catalogs from JSON
    pub fn from_json(contents: &str) -> Result<Self> {
        let catalogs: Catalogs = serde_json::from_str(contents)?;
        catalogs.validate()?;
        Ok(catalogs)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn with_skill(mut self, skill: SkillDefinition) -> Self {
        self.skills.insert(skill.id.clone(), skill);
        self
    }

    pub fn with_item(mut self, item: ItemDefinition) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn with_summon(mut self, template_id: impl Into<String>, template: UnitConfig) -> Self {
        self.summons.insert(template_id.into(), template);
        self
    }

    pub fn skill(&self, id: &str) -> Result<&SkillDefinition> {
        self.skills
            .get(id)
            .ok_or_else(|| BattleError::UnknownSkill(id.to_string()))
    }

    pub fn item(&self, id: &str) -> Result<&ItemDefinition> {
        self.items
            .get(id)
            .ok_or_else(|| BattleError::UnknownItem(id.to_string()))
    }

    pub fn summon(&self, id: &str) -> Result<&UnitConfig> {
        self.summons
            .get(id)
            .ok_or_else(|| BattleError::UnknownSummon(id.to_string()))
    }

    /// Check that every step list parses and every summon template builds.
    pub fn validate(&self) -> Result<()> {
        for skill in self.skills.values() {
            parse_steps(&skill.steps)?;
        }
        for item in self.items.values() {
            parse_steps(&item.steps)?;
        }
        for template in self.summons.values() {
            template.to_unit(true)?;
        }
        Ok(())
    }
}
