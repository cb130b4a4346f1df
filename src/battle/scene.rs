//! Battle roster and spatial/state queries
//!
//! The scene exclusively owns every unit. Other components refer to units by
//! id and go through `unit` / `unit_mut` to read or change them.

use serde::{Deserialize, Serialize};

use crate::battle::config::{BattleConfig, UnitConfig};
use crate::battle::unit::{GridPosition, Unit};
use crate::core::error::{BattleError, Result};
use crate::core::types::UnitId;

/// Which side of the field a unit fights on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Player,
    Enemy,
}

impl Side {
    pub fn of(unit: &Unit) -> Self {
        if unit.is_player {
            Side::Player
        } else {
            Side::Enemy
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        }
    }
}

/// Roster container for one battle
#[derive(Debug, Clone)]
pub struct BattleScene {
    player_units: Vec<Unit>,
    enemy_units: Vec<Unit>,
    background: Option<String>,
    canvas_height: f32,
    max_units_per_side: usize,
}

impl BattleScene {
    pub fn new(canvas_height: f32, max_units_per_side: usize) -> Self {
        Self {
            player_units: Vec::new(),
            enemy_units: Vec::new(),
            background: None,
            canvas_height,
            max_units_per_side,
        }
    }

    /// Replace the roster with the config's units.
    ///
    /// All-or-nothing: on error the current roster is left untouched.
    pub fn load_battle_config(&mut self, config: &BattleConfig) -> Result<()> {
        let (players, enemies) = config.build_rosters(self.max_units_per_side)?;
        self.player_units = players;
        self.enemy_units = enemies;
        self.background = config.background.clone();
        tracing::debug!(
            "Scene loaded: {} player units, {} enemy units",
            self.player_units.len(),
            self.enemy_units.len()
        );
        Ok(())
    }

    /// Drop every unit (battle reset)
    pub fn clear(&mut self) {
        self.player_units.clear();
        self.enemy_units.clear();
        self.background = None;
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    pub fn canvas_height(&self) -> f32 {
        self.canvas_height
    }

    pub fn player_units(&self) -> &[Unit] {
        &self.player_units
    }

    pub fn enemy_units(&self) -> &[Unit] {
        &self.enemy_units
    }

    pub fn side_units(&self, side: Side) -> &[Unit] {
        match side {
            Side::Player => &self.player_units,
            Side::Enemy => &self.enemy_units,
        }
    }

    /// All units, players first
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.player_units.iter().chain(self.enemy_units.iter())
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.player_units.iter_mut().chain(self.enemy_units.iter_mut())
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units().find(|u| &u.id == id)
    }

    pub fn unit_mut(&mut self, id: &UnitId) -> Option<&mut Unit> {
        self.units_mut().find(|u| &u.id == id)
    }

    pub fn alive_player_units(&self) -> Vec<&Unit> {
        self.player_units.iter().filter(|u| u.is_alive()).collect()
    }

    pub fn alive_enemy_units(&self) -> Vec<&Unit> {
        self.enemy_units.iter().filter(|u| u.is_alive()).collect()
    }

    pub fn alive_units(&self, side: Side) -> Vec<&Unit> {
        self.side_units(side).iter().filter(|u| u.is_alive()).collect()
    }

    /// Alive opponents of the given unit, in roster order
    pub fn opponents_of(&self, id: &UnitId) -> Vec<&Unit> {
        match self.unit(id) {
            Some(unit) => self.alive_units(Side::of(unit).opponent()),
            None => Vec::new(),
        }
    }

    /// Player units that may be given a command this round, in activation
    /// order: ascending on-screen Y, roster order for equal Y.
    pub fn actionable_player_units(&self) -> Vec<&Unit> {
        let canvas_height = self.canvas_height;
        let mut units: Vec<&Unit> = self.player_units.iter().filter(|u| u.is_alive()).collect();
        // sort_by is stable
        units.sort_by(|a, b| {
            let ay = a.calculate_position(canvas_height).y;
            let by = b.calculate_position(canvas_height).y;
            ay.total_cmp(&by)
        });
        units
    }

    /// Winning side if the battle is decided.
    ///
    /// Enemies are checked first, so a simultaneous wipe of both sides
    /// counts as a player win.
    pub fn check_battle_end(&self) -> Option<Side> {
        if self.enemy_units.iter().all(|u| !u.is_alive()) {
            return Some(Side::Player);
        }
        if self.player_units.iter().all(|u| !u.is_alive()) {
            return Some(Side::Enemy);
        }
        None
    }

    /// First unoccupied grid slot on a side. Dead units keep their slot.
    pub fn free_slot(&self, side: Side) -> Option<GridPosition> {
        let units = self.side_units(side);
        GridPosition::all().find(|pos| units.iter().all(|u| u.position != *pos))
    }

    /// Add a unit built from a template to a side.
    ///
    /// Fails with `RosterFull` when the side is at its cap; the roster is
    /// unchanged in that case.
    pub fn summon_unit(&mut self, side: Side, template: &UnitConfig, id: UnitId) -> Result<&Unit> {
        let cap = self.max_units_per_side;
        if self.side_units(side).len() >= cap {
            return Err(BattleError::RosterFull { side, cap });
        }
        if self.unit(&id).is_some() {
            return Err(BattleError::InvalidConfig(format!(
                "summoned unit id {} is already in use",
                id
            )));
        }
        let position = self.free_slot(side).ok_or(BattleError::RosterFull { side, cap })?;

        let mut unit = template.to_unit_with_id(id, side == Side::Player)?;
        unit.position = position;

        let roster = match side {
            Side::Player => &mut self.player_units,
            Side::Enemy => &mut self.enemy_units,
        };
        roster.push(unit);
        Ok(&roster[roster.len() - 1])
    }

    /// Clear selection and active highlighting on every unit
    pub fn clear_highlights(&mut self) {
        for unit in self.units_mut() {
            unit.set_selected(false);
            unit.set_active(false);
        }
    }

    /// Drop every unit's defend stance
    pub fn clear_defending(&mut self) {
        for unit in self.units_mut() {
            unit.set_defending(false);
        }
    }
}
