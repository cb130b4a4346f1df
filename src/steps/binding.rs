//! Host capabilities the step executor drives
//!
//! The renderer implements `SceneBinding`; the step executor only dispatches
//! to it and awaits the returned futures. Bindings may read unit state for
//! display but never change stats.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{EffectInstanceId, UnitId};

/// Boxed future returned by binding operations
pub type StepFuture<'a, T = ()> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Tween options for `move_unit`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveOptions {
    pub duration: Duration,
    /// Interpret the target as an offset from the current position
    pub relative: bool,
}

/// Playback options for effects
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectOptions {
    pub scale: f32,
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// How a floating number should be styled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageKind {
    Normal,
    Critical,
    Heal,
}

pub trait SceneBinding: Send + Sync {
    // === UNITS ===
    /// Tween a unit to a position; resolves when the tween finishes.
    fn move_unit(&self, unit: &UnitId, x: f32, y: f32, opts: MoveOptions) -> StepFuture<'_>;
    /// Play an animation clip; resolves when one pass finishes.
    fn play_unit_animation(&self, unit: &UnitId, key: &str) -> StepFuture<'_>;
    fn set_unit_position(&self, unit: &UnitId, x: f32, y: f32);
    /// Return a unit to its home slot.
    fn reset_unit_position(&self, unit: &UnitId, duration: Duration) -> StepFuture<'_>;
    fn unit_at_position(&self, x: f32, y: f32) -> Option<UnitId>;

    // === EFFECTS ===
    /// Start an effect at a point; resolves with its instance once it is showing.
    ///
    /// The effect keeps running until it ends on its own or `stop_effect`.
    fn play_effect(
        &self,
        effect: &str,
        x: f32,
        y: f32,
        opts: EffectOptions,
    ) -> StepFuture<'_, EffectInstanceId>;
    fn play_effect_on_unit(
        &self,
        effect: &str,
        unit: &UnitId,
        opts: EffectOptions,
    ) -> StepFuture<'_, EffectInstanceId>;
    fn stop_effect(&self, instance: EffectInstanceId);

    // === CAMERA ===
    fn camera_shake(&self, intensity: f32, duration: Duration) -> StepFuture<'_>;
    fn camera_move(&self, x: f32, y: f32, duration: Duration) -> StepFuture<'_>;
    fn camera_zoom(&self, zoom: f32, duration: Duration) -> StepFuture<'_>;
    fn camera_reset(&self, duration: Duration) -> StepFuture<'_>;
    fn camera_focus(&self, unit: &UnitId, duration: Duration) -> StepFuture<'_>;

    // === BACKGROUND ===
    fn set_background(&self, image: Option<&str>, color: Option<&str>);
    fn fade_background(
        &self,
        image: Option<&str>,
        color: Option<&str>,
        duration: Duration,
    ) -> StepFuture<'_>;

    // === AUDIO ===
    /// Play a sound; resolves when playback has finished.
    fn play_sound(&self, sound: &str, volume: f32) -> StepFuture<'_>;
    fn stop_sound(&self, sound: &str);

    // === HUD ===
    fn show_damage_number(&self, unit: &UnitId, amount: u32, kind: DamageKind);
    fn update_unit_hp(&self, unit: &UnitId, hp: u32, max_hp: u32);
    fn update_unit_mp(&self, unit: &UnitId, mp: u32, max_mp: u32);
}
