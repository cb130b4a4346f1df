//! Battle system constants - fixed layout and pacing values
//!
//! Anything a designer would want to tune per battle lives in
//! `BattleSettings` instead.

// Grid: each side is drawn as 3 rows x 2 columns
pub const GRID_ROWS: u8 = 3;
pub const GRID_COLS: u8 = 2;
pub const MAX_ROSTER_SLOTS: usize = (GRID_ROWS * GRID_COLS) as usize;

// Countdown tick of the command phase
pub const COMMAND_TICK_MS: u64 = 1000;

// Built-in attack choreography (milliseconds / pixels)
pub const ATTACK_LUNGE_MS: u64 = 200;
pub const ATTACK_RETURN_MS: u64 = 200;
pub const ATTACK_LUNGE_DISTANCE: f32 = 40.0;

// Animation keys the core asks the renderer for
pub const ANIM_ATTACK: &str = "attack";
pub const ANIM_HIT: &str = "hit";
pub const ANIM_DEFEND: &str = "defend";
pub const ANIM_DIE: &str = "die";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_matches_roster_cap() {
        assert_eq!(MAX_ROSTER_SLOTS, 6);
    }

    #[test]
    fn test_choreography_is_short() {
        assert!(ATTACK_LUNGE_MS + ATTACK_RETURN_MS < COMMAND_TICK_MS);
    }
}
