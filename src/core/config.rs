//! Battle configuration with documented constants
//!
//! Every tunable the turn controller and action executor consult lives here.
//! Settings are passed into constructors explicitly; there is no global copy.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// Tunables for one battle session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleSettings {
    // === COMMAND PHASE ===
    /// Seconds the command phase waits before auto-defending idle units
    ///
    /// The countdown ticks once per second. When it reaches zero every
    /// actionable unit without a submitted action is assigned `defend`.
    pub command_time_limit_secs: u32,

    // === EXECUTE PHASE ===
    /// Pause between two resolved actions (milliseconds)
    ///
    /// Pacing for readability only. Zero is valid and is what tests use.
    pub action_delay_ms: u64,

    // === DAMAGE ===
    /// Floor applied to every damaging hit
    ///
    /// `attack - defense` never goes below this, and neither does the
    /// result after defend mitigation.
    pub min_damage: u32,

    /// Multiplier applied to damage taken by a defending unit
    ///
    /// At 0.5 a defending unit takes half damage (floored, then re-floored
    /// at `min_damage`).
    pub defend_damage_factor: f32,

    // === ESCAPE ===
    /// Probability that an escape attempt succeeds (0.0 to 1.0)
    pub escape_chance: f32,

    // === ROSTER ===
    /// Maximum units on one side, summons included
    ///
    /// Matches the 3x2 slot grid each side is drawn on.
    pub max_units_per_side: usize,

    // === LAYOUT ===
    /// Canvas height used to derive unit pixel positions
    ///
    /// Only affects rendering and command activation order.
    pub canvas_height: f32,

    // === RANDOMNESS ===
    /// Seed for enemy targeting and escape rolls. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            command_time_limit_secs: 60,
            action_delay_ms: 500,
            min_damage: 1,
            defend_damage_factor: 0.5,
            escape_chance: 0.5,
            max_units_per_side: 6,
            canvas_height: 600.0,
            rng_seed: None,
        }
    }
}

impl BattleSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parse settings from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.command_time_limit_secs == 0 {
            return Err("command_time_limit_secs must be at least 1".into());
        }

        if !(0.0..=1.0).contains(&self.defend_damage_factor) {
            return Err(format!(
                "defend_damage_factor ({}) must be within 0.0..=1.0",
                self.defend_damage_factor
            ));
        }

        if !(0.0..=1.0).contains(&self.escape_chance) {
            return Err(format!(
                "escape_chance ({}) must be within 0.0..=1.0",
                self.escape_chance
            ));
        }

        // The grid has 6 slots per side
        if self.max_units_per_side == 0 || self.max_units_per_side > 6 {
            return Err(format!(
                "max_units_per_side ({}) must be within 1..=6",
                self.max_units_per_side
            ));
        }

        if self.canvas_height <= 0.0 {
            return Err("canvas_height must be positive".into());
        }

        Ok(())
    }
}
