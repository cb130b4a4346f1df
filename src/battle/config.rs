//! Battle roster configuration
//!
//! Configs arrive from the editor UI as JSON (or TOML for hand-written
//! fixtures). Two legacy shapes are still accepted and normalized here, at
//! the boundary, so the rest of the crate only sees `Unit`:
//! - `position` as a row-major slot index instead of `{row, col}`
//! - stats without `max_hp` / `max_mp` (the current pool is the maximum)

use std::fs;
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::battle::unit::{GridPosition, Unit, UnitStats};
use crate::core::error::{BattleError, Result};
use crate::core::types::UnitId;
use crate::sprites::{AnimationClip, SpriteSheet};

/// Everything needed to start a battle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BattleConfig {
    #[serde(alias = "playerUnits")]
    pub player_units: Vec<UnitConfig>,
    #[serde(alias = "enemyUnits")]
    pub enemy_units: Vec<UnitConfig>,
    #[serde(default)]
    pub background: Option<String>,
}

/// One combatant as authored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    pub id: UnitId,
    pub name: String,
    /// Informational; the side is decided by which list the unit is in
    #[serde(default, alias = "isPlayer")]
    pub is_player: Option<bool>,
    pub position: PositionConfig,
    pub stats: StatsConfig,
    #[serde(default, alias = "spriteConfig")]
    pub sprite: Option<SpriteSheet>,
    #[serde(default)]
    pub animations: AHashMap<String, AnimationClip>,
}

/// Grid slot, either explicit or as a legacy slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PositionConfig {
    Grid { row: u8, col: u8 },
    Slot(u8),
}

impl PositionConfig {
    pub fn normalize(self) -> GridPosition {
        match self {
            PositionConfig::Grid { row, col } => GridPosition::new(row, col),
            PositionConfig::Slot(slot) => GridPosition::from_slot(slot),
        }
    }
}

impl From<GridPosition> for PositionConfig {
    fn from(pos: GridPosition) -> Self {
        PositionConfig::Grid {
            row: pos.row,
            col: pos.col,
        }
    }
}

/// Stats as authored; maxima are optional
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    pub hp: u32,
    #[serde(default, alias = "maxHp")]
    pub max_hp: Option<u32>,
    #[serde(default)]
    pub mp: u32,
    #[serde(default, alias = "maxMp")]
    pub max_mp: Option<u32>,
    pub speed: u32,
    #[serde(default)]
    pub luck: u32,
    pub attack: u32,
    #[serde(default)]
    pub defense: u32,
}

impl StatsConfig {
    pub fn normalize(&self) -> UnitStats {
        let mut stats = UnitStats {
            hp: self.hp,
            max_hp: self.max_hp.unwrap_or(self.hp),
            mp: self.mp,
            max_mp: self.max_mp.unwrap_or(self.mp),
            speed: self.speed,
            luck: self.luck,
            attack: self.attack,
            defense: self.defense,
        };
        stats.clamp();
        stats
    }
}

impl From<UnitStats> for StatsConfig {
    fn from(stats: UnitStats) -> Self {
        Self {
            hp: stats.hp,
            max_hp: Some(stats.max_hp),
            mp: stats.mp,
            max_mp: Some(stats.max_mp),
            speed: stats.speed,
            luck: stats.luck,
            attack: stats.attack,
            defense: stats.defense,
        }
    }
}

impl UnitConfig {
    /// Build a runtime unit for the given side.
    pub fn to_unit(&self, is_player: bool) -> Result<Unit> {
        self.to_unit_with_id(self.id.clone(), is_player)
    }

    /// Build a runtime unit under a different id (used for summons).
    pub fn to_unit_with_id(&self, id: UnitId, is_player: bool) -> Result<Unit> {
        let position = self.position.normalize();
        if !position.is_valid() {
            return Err(BattleError::InvalidConfig(format!(
                "unit {} has position ({}, {}) outside the 3x2 grid",
                id, position.row, position.col
            )));
        }

        if let Some(declared) = self.is_player {
            if declared != is_player {
                tracing::warn!(
                    "unit {} declares is_player={} but is listed on the other side",
                    id,
                    declared
                );
            }
        }

        if let Some(sheet) = &self.sprite {
            sheet.validate()?;
            let total = sheet.frame_total();
            for (key, clip) in &self.animations {
                clip.validate(total).map_err(|reason| {
                    BattleError::InvalidConfig(format!("unit {} animation '{}' {}", id, key, reason))
                })?;
            }
        }

        let mut unit = Unit::new(id, self.name.clone(), is_player, self.stats.normalize(), position);
        unit.sprite = self.sprite.clone();
        unit.animations = self.animations.clone();
        Ok(unit)
    }
}

impl BattleConfig {
    /// Parse a config from JSON
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Parse a config from TOML
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a config file; `.toml` is parsed as TOML, anything else as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    /// Validate and build both rosters without touching any battle state.
    pub fn build_rosters(&self, max_per_side: usize) -> Result<(Vec<Unit>, Vec<Unit>)> {
        if self.player_units.is_empty() {
            return Err(BattleError::InvalidConfig(
                "battle needs at least one player unit".into(),
            ));
        }
        if self.enemy_units.is_empty() {
            return Err(BattleError::InvalidConfig(
                "battle needs at least one enemy unit".into(),
            ));
        }

        let mut seen_ids = AHashSet::new();
        let players = build_side(&self.player_units, true, max_per_side, &mut seen_ids)?;
        let enemies = build_side(&self.enemy_units, false, max_per_side, &mut seen_ids)?;
        Ok((players, enemies))
    }
}

fn build_side(
    configs: &[UnitConfig],
    is_player: bool,
    max_per_side: usize,
    seen_ids: &mut AHashSet<UnitId>,
) -> Result<Vec<Unit>> {
    let side = if is_player { "player" } else { "enemy" };
    if configs.len() > max_per_side {
        return Err(BattleError::InvalidConfig(format!(
            "{} side has {} units, the limit is {}",
            side,
            configs.len(),
            max_per_side
        )));
    }

    let mut taken = AHashSet::new();
    let mut units = Vec::with_capacity(configs.len());
    for config in configs {
        if !seen_ids.insert(config.id.clone()) {
            return Err(BattleError::InvalidConfig(format!(
                "duplicate unit id {}",
                config.id
            )));
        }

        let unit = config.to_unit(is_player)?;
        if !taken.insert(unit.position) {
            return Err(BattleError::InvalidConfig(format!(
                "{} slot ({}, {}) is used twice",
                side, unit.position.row, unit.position.col
            )));
        }
        units.push(unit);
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_JSON: &str = r#"{
        "playerUnits": [
            {"id": "U1", "name": "Knight", "isPlayer": true, "position": 3,
             "stats": {"hp": 120, "mp": 10, "speed": 20, "luck": 5, "attack": 30, "defense": 10}}
        ],
        "enemyUnits": [
            {"id": "E1", "name": "Slime", "position": {"row": 0, "col": 0},
             "stats": {"hp": 40, "maxHp": 50, "speed": 10, "attack": 8}}
        ],
        "background": "forest"
    }"#;

    #[test]
    fn test_legacy_shapes_normalize() {
        let config = BattleConfig::from_json(LEGACY_JSON).unwrap();
        let (players, enemies) = config.build_rosters(6).unwrap();

        assert_eq!(players[0].position, GridPosition::new(1, 1));
        assert_eq!(players[0].stats.max_hp, 120);
        assert_eq!(players[0].stats.max_mp, 10);
        assert!(players[0].is_player);

        assert_eq!(enemies[0].stats.hp, 40);
        assert_eq!(enemies[0].stats.max_hp, 50);
        assert_eq!(enemies[0].stats.luck, 0);
        assert!(!enemies[0].is_player);
        assert_eq!(config.background.as_deref(), Some("forest"));
    }

    #[test]
    fn test_empty_side_is_invalid() {
        let mut config = BattleConfig::from_json(LEGACY_JSON).unwrap();
        config.enemy_units.clear();
        let err = config.build_rosters(6).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_duplicate_ids_across_sides() {
        let mut config = BattleConfig::from_json(LEGACY_JSON).unwrap();
        config.enemy_units[0].id = UnitId::new("U1");
        assert!(config.build_rosters(6).is_err());
    }

    #[test]
    fn test_out_of_grid_position() {
        let mut config = BattleConfig::from_json(LEGACY_JSON).unwrap();
        config.player_units[0].position = PositionConfig::Grid { row: 3, col: 0 };
        assert!(config.build_rosters(6).is_err());
    }

    #[test]
    fn test_shared_slot_is_invalid() {
        let mut config = BattleConfig::from_json(LEGACY_JSON).unwrap();
        let mut twin = config.player_units[0].clone();
        twin.id = UnitId::new("U2");
        config.player_units.push(twin);
        assert!(config.build_rosters(6).is_err());
    }

    #[test]
    fn test_animation_outside_sheet() {
        let mut config = BattleConfig::from_json(LEGACY_JSON).unwrap();
        config.player_units[0].sprite = Some(SpriteSheet {
            image: "knight.png".into(),
            width: 64,
            height: 64,
            rows: 2,
            cols: 2,
            frame_count: None,
        });
        config.player_units[0].animations.insert(
            "attack".into(),
            AnimationClip {
                start_frame: 2,
                frame_count: 3,
                frame_duration_ms: 100,
                looping: false,
            },
        );
        assert!(config.build_rosters(6).is_err());
    }

    #[test]
    fn test_clip_past_last_frame_index_is_invalid() {
        let mut config = BattleConfig::from_json(LEGACY_JSON).unwrap();
        config.player_units[0].sprite = Some(SpriteSheet {
            image: "knight.png".into(),
            width: 64,
            height: 64,
            rows: 2,
            cols: 2,
            frame_count: None,
        });
        config.player_units[0].animations.insert(
            "idle".into(),
            AnimationClip {
                start_frame: u32::MAX,
                frame_count: 2,
                frame_duration_ms: 100,
                looping: true,
            },
        );
        let err = config.build_rosters(6).unwrap_err();
        assert!(matches!(err, BattleError::InvalidConfig(_)));
    }

    #[test]
    fn test_toml_config() {
        let config = BattleConfig::from_toml(
            r#"
            [[player_units]]
            id = "U1"
            name = "Knight"
            position = { row = 0, col = 0 }
            stats = { hp = 100, speed = 10, attack = 20 }

            [[enemy_units]]
            id = "E1"
            name = "Bat"
            position = 0
            stats = { hp = 30, speed = 15, attack = 6 }
            "#,
        )
        .unwrap();
        assert_eq!(config.player_units.len(), 1);
        assert_eq!(config.enemy_units[0].position.normalize(), GridPosition::new(0, 0));
    }
}
