//! Combatant runtime state
//!
//! A `Unit` is the single source of truth for one combatant's stats, grid
//! slot and render flags. Stat changes go through `apply_damage` / `heal` /
//! `spend_mp` / `restore_mp` so the `hp <= max_hp` and `mp <= max_mp`
//! invariants hold after every mutation.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::constants::{GRID_COLS, GRID_ROWS};
use crate::core::types::{PixelPosition, UnitId};
use crate::sprites::{AnimationClip, SpriteSheet};

/// Combat statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitStats {
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
    pub speed: u32,
    pub luck: u32,
    pub attack: u32,
    pub defense: u32,
}

impl UnitStats {
    /// Turn-order priority: `speed + luck`
    pub fn priority(&self) -> u32 {
        self.speed.saturating_add(self.luck)
    }

    /// Clamp current pools to their maxima
    pub fn clamp(&mut self) {
        self.hp = self.hp.min(self.max_hp);
        self.mp = self.mp.min(self.max_mp);
    }
}

/// Slot on a side's 3x2 grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: u8,
    pub col: u8,
}

impl GridPosition {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn is_valid(&self) -> bool {
        self.row < GRID_ROWS && self.col < GRID_COLS
    }

    /// Row-major slot index (0..6)
    pub fn slot(&self) -> u8 {
        self.row * GRID_COLS + self.col
    }

    pub fn from_slot(slot: u8) -> Self {
        Self {
            row: slot / GRID_COLS,
            col: slot % GRID_COLS,
        }
    }

    /// Every slot of the grid in row-major order
    pub fn all() -> impl Iterator<Item = GridPosition> {
        (0..GRID_ROWS * GRID_COLS).map(GridPosition::from_slot)
    }
}

/// Outcome of `Unit::apply_damage`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageReport {
    /// HP actually removed
    pub dealt: u32,
    pub remaining_hp: u32,
    /// True only for the hit that took hp to 0
    pub died: bool,
}

/// A combatant on the battle field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub is_player: bool,
    pub stats: UnitStats,
    pub position: GridPosition,

    // Render flags
    pub is_selected: bool,
    pub is_active: bool,
    pub is_defending: bool,

    // Render data, read only for the battle core
    pub sprite: Option<SpriteSheet>,
    pub animations: AHashMap<String, AnimationClip>,
}

impl Unit {
    pub fn new(
        id: UnitId,
        name: impl Into<String>,
        is_player: bool,
        stats: UnitStats,
        position: GridPosition,
    ) -> Self {
        let mut stats = stats;
        stats.clamp();
        Self {
            id,
            name: name.into(),
            is_player,
            stats,
            position,
            is_selected: false,
            is_active: false,
            is_defending: false,
            sprite: None,
            animations: AHashMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.stats.hp > 0
    }

    pub fn priority(&self) -> u32 {
        self.stats.priority()
    }

    /// Pixel position of this unit's slot for a canvas of the given height.
    ///
    /// Rows are `canvas_height / 4` apart starting one spacing from the top.
    /// The back column (`col = 1`) sits further from the center line and is
    /// staggered a quarter spacing lower so the two columns don't overlap.
    /// `x` is measured from the unit's own home edge; renderers mirror it for
    /// the enemy side.
    pub fn calculate_position(&self, canvas_height: f32) -> PixelPosition {
        let spacing = canvas_height / 4.0;
        let row = self.position.row as f32;
        let col = self.position.col as f32;

        let y = spacing * (row + 1.0) + col * spacing * 0.25;
        // Front column is closest to the center line
        let x = spacing * (2.0 - col);
        PixelPosition::new(x, y)
    }

    /// Remove hp, never below zero. Damage to a dead unit is a no-op.
    pub fn apply_damage(&mut self, amount: u32) -> DamageReport {
        if !self.is_alive() {
            return DamageReport {
                dealt: 0,
                remaining_hp: 0,
                died: false,
            };
        }

        let dealt = amount.min(self.stats.hp);
        self.stats.hp -= dealt;

        DamageReport {
            dealt,
            remaining_hp: self.stats.hp,
            died: self.stats.hp == 0,
        }
    }

    /// Restore hp up to `max_hp`, returns the amount actually healed
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.stats.hp;
        self.stats.hp = self.stats.hp.saturating_add(amount).min(self.stats.max_hp);
        self.stats.hp - before
    }

    /// Restore mp up to `max_mp`, returns the amount actually restored
    pub fn restore_mp(&mut self, amount: u32) -> u32 {
        let before = self.stats.mp;
        self.stats.mp = self.stats.mp.saturating_add(amount).min(self.stats.max_mp);
        self.stats.mp - before
    }

    /// Spend mp. Returns false (and changes nothing) if there isn't enough.
    pub fn spend_mp(&mut self, amount: u32) -> bool {
        if self.stats.mp < amount {
            return false;
        }
        self.stats.mp -= amount;
        true
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.is_selected = selected;
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn set_defending(&mut self, defending: bool) {
        self.is_defending = defending;
    }
}
