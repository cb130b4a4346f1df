//! Headless scene binding
//!
//! Stands in for the canvas renderer: tracks unit positions and running
//! effects, sleeps for every requested duration, and records each call so
//! playback can be inspected. Used by the runner binaries and in tests.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use crate::battle::scene::BattleScene;
use crate::battle::unit::Unit;
use crate::core::types::{EffectInstanceId, PixelPosition, UnitId};
use crate::sprites::animation::{AnimationClip, AnimationPlayer};
use crate::steps::binding::{DamageKind, EffectOptions, MoveOptions, SceneBinding, StepFuture};

/// Width of the canvas relative to its height
pub const CANVAS_ASPECT: f32 = 4.0 / 3.0;

/// Play time assumed for animations the unit has no clip for
pub const DEFAULT_ANIMATION_MS: u64 = 300;

/// Time for an effect to load and appear
pub const EFFECT_START_MS: u64 = 16;

/// Pick radius for `unit_at_position`
const PICK_RADIUS: f32 = 32.0;

/// One recorded binding call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneCall {
    Move { unit: UnitId, x: f32, y: f32, duration_ms: u64 },
    Animation { unit: UnitId, key: String, duration_ms: u64 },
    SetPosition { unit: UnitId, x: f32, y: f32 },
    ResetPosition { unit: UnitId, duration_ms: u64 },
    Effect { effect: String, unit: Option<UnitId>, instance: u64 },
    StopEffect { instance: u64 },
    CameraShake { intensity: f32, duration_ms: u64 },
    CameraMove { x: f32, y: f32, duration_ms: u64 },
    CameraZoom { zoom: f32, duration_ms: u64 },
    CameraReset { duration_ms: u64 },
    CameraFocus { unit: UnitId, duration_ms: u64 },
    Background { image: Option<String>, color: Option<String>, duration_ms: u64 },
    Sound { sound: String, volume: f32 },
    StopSound { sound: String },
    DamageNumber { unit: UnitId, amount: u32, kind: DamageKind },
    Hp { unit: UnitId, hp: u32, max_hp: u32 },
    Mp { unit: UnitId, mp: u32, max_mp: u32 },
}

#[derive(Debug, Default)]
struct HeadlessState {
    home: AHashMap<UnitId, PixelPosition>,
    positions: AHashMap<UnitId, PixelPosition>,
    clips: AHashMap<UnitId, AHashMap<String, AnimationClip>>,
    players: AHashMap<UnitId, AnimationPlayer>,
    next_effect: u64,
    active_effects: AHashSet<EffectInstanceId>,
    background: Option<String>,
    calls: Vec<SceneCall>,
}

#[derive(Debug, Default)]
pub struct HeadlessScene {
    state: Mutex<HeadlessState>,
    sound_ms: u64,
}

/// On-screen position of a unit: enemies are mirrored to the right edge.
pub fn screen_position(unit: &Unit, canvas_height: f32) -> PixelPosition {
    let local = unit.calculate_position(canvas_height);
    if unit.is_player {
        local
    } else {
        PixelPosition::new(canvas_height * CANVAS_ASPECT - local.x, local.y)
    }
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `play_sound` takes this long to finish
    pub fn with_sound_duration(mut self, ms: u64) -> Self {
        self.sound_ms = ms;
        self
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        // A poisoned lock only means a recording panicked mid-push
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: SceneCall) {
        tracing::debug!("scene: {:?}", call);
        self.lock().calls.push(call);
    }

    /// Place every unit of the scene at its home slot and learn its clips.
    pub fn sync_with(&self, scene: &BattleScene) {
        let canvas_height = scene.canvas_height();
        let mut state = self.lock();
        state.background = scene.background().map(str::to_string);
        for unit in scene.units() {
            let pos = screen_position(unit, canvas_height);
            state.home.insert(unit.id.clone(), pos);
            state.positions.entry(unit.id.clone()).or_insert(pos);
            let clips = unit
                .animations
                .iter()
                .map(|(key, clip)| (key.clone(), clip.clone()))
                .collect();
            state.clips.insert(unit.id.clone(), clips);
        }
    }

    pub fn calls(&self) -> Vec<SceneCall> {
        self.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<SceneCall> {
        std::mem::take(&mut self.lock().calls)
    }

    pub fn position_of(&self, unit: &UnitId) -> Option<PixelPosition> {
        self.lock().positions.get(unit).copied()
    }

    /// Sheet frame a unit rests on after its last clip played.
    pub fn sheet_frame_of(&self, unit: &UnitId) -> Option<u32> {
        let state = self.lock();
        let player = state.players.get(unit)?;
        let key = player.current_key.as_deref()?;
        let clip = state.clips.get(unit)?.get(key)?;
        Some(player.sheet_frame(clip))
    }

    pub fn active_effects(&self) -> usize {
        self.lock().active_effects.len()
    }

    pub fn background(&self) -> Option<String> {
        self.lock().background.clone()
    }

    fn start_effect(&self, effect: &str, unit: Option<&UnitId>) -> EffectInstanceId {
        let instance = {
            let mut state = self.lock();
            state.next_effect += 1;
            let instance = EffectInstanceId(state.next_effect);
            state.active_effects.insert(instance);
            instance
        };
        self.record(SceneCall::Effect {
            effect: effect.to_string(),
            unit: unit.cloned(),
            instance: instance.0,
        });
        instance
    }
}

fn sleep_for(duration: Duration) -> StepFuture<'static> {
    Box::pin(tokio::time::sleep(duration))
}

fn ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl SceneBinding for HeadlessScene {
    fn move_unit(&self, unit: &UnitId, x: f32, y: f32, opts: MoveOptions) -> StepFuture<'_> {
        let target = {
            let mut state = self.lock();
            let current = state.positions.get(unit).copied().unwrap_or_default();
            let target = if opts.relative {
                current + PixelPosition::new(x, y)
            } else {
                PixelPosition::new(x, y)
            };
            state.positions.insert(unit.clone(), target);
            target
        };
        self.record(SceneCall::Move {
            unit: unit.clone(),
            x: target.x,
            y: target.y,
            duration_ms: ms(opts.duration),
        });
        sleep_for(opts.duration)
    }

    fn play_unit_animation(&self, unit: &UnitId, key: &str) -> StepFuture<'_> {
        let duration_ms = {
            let mut state = self.lock();
            let HeadlessState { clips, players, .. } = &mut *state;
            match clips.get(unit).and_then(|clips| clips.get(key)) {
                Some(clip) => {
                    let player = players.entry(unit.clone()).or_default();
                    player.restart(key);
                    player.update(clip.duration_ms(), clip);
                    clip.duration_ms()
                }
                None => DEFAULT_ANIMATION_MS,
            }
        };
        self.record(SceneCall::Animation {
            unit: unit.clone(),
            key: key.to_string(),
            duration_ms,
        });
        sleep_for(Duration::from_millis(duration_ms))
    }

    fn set_unit_position(&self, unit: &UnitId, x: f32, y: f32) {
        self.lock()
            .positions
            .insert(unit.clone(), PixelPosition::new(x, y));
        self.record(SceneCall::SetPosition {
            unit: unit.clone(),
            x,
            y,
        });
    }

    fn reset_unit_position(&self, unit: &UnitId, duration: Duration) -> StepFuture<'_> {
        {
            let mut state = self.lock();
            if let Some(home) = state.home.get(unit).copied() {
                state.positions.insert(unit.clone(), home);
            }
        }
        self.record(SceneCall::ResetPosition {
            unit: unit.clone(),
            duration_ms: ms(duration),
        });
        sleep_for(duration)
    }

    fn unit_at_position(&self, x: f32, y: f32) -> Option<UnitId> {
        let point = PixelPosition::new(x, y);
        let state = self.lock();
        state
            .positions
            .iter()
            .map(|(id, pos)| (id, pos.distance(&point)))
            .filter(|(_, distance)| *distance <= PICK_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id.clone())
    }

    fn play_effect(
        &self,
        effect: &str,
        _x: f32,
        _y: f32,
        _opts: EffectOptions,
    ) -> StepFuture<'_, EffectInstanceId> {
        let instance = self.start_effect(effect, None);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(EFFECT_START_MS)).await;
            instance
        })
    }

    fn play_effect_on_unit(
        &self,
        effect: &str,
        unit: &UnitId,
        _opts: EffectOptions,
    ) -> StepFuture<'_, EffectInstanceId> {
        let instance = self.start_effect(effect, Some(unit));
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(EFFECT_START_MS)).await;
            instance
        })
    }

    fn stop_effect(&self, instance: EffectInstanceId) {
        self.lock().active_effects.remove(&instance);
        self.record(SceneCall::StopEffect {
            instance: instance.0,
        });
    }

    fn camera_shake(&self, intensity: f32, duration: Duration) -> StepFuture<'_> {
        self.record(SceneCall::CameraShake {
            intensity,
            duration_ms: ms(duration),
        });
        sleep_for(duration)
    }

    fn camera_move(&self, x: f32, y: f32, duration: Duration) -> StepFuture<'_> {
        self.record(SceneCall::CameraMove {
            x,
            y,
            duration_ms: ms(duration),
        });
        sleep_for(duration)
    }

    fn camera_zoom(&self, zoom: f32, duration: Duration) -> StepFuture<'_> {
        self.record(SceneCall::CameraZoom {
            zoom,
            duration_ms: ms(duration),
        });
        sleep_for(duration)
    }

    fn camera_reset(&self, duration: Duration) -> StepFuture<'_> {
        self.record(SceneCall::CameraReset {
            duration_ms: ms(duration),
        });
        sleep_for(duration)
    }

    fn camera_focus(&self, unit: &UnitId, duration: Duration) -> StepFuture<'_> {
        self.record(SceneCall::CameraFocus {
            unit: unit.clone(),
            duration_ms: ms(duration),
        });
        sleep_for(duration)
    }

    fn set_background(&self, image: Option<&str>, color: Option<&str>) {
        self.lock().background = image.or(color).map(str::to_string);
        self.record(SceneCall::Background {
            image: image.map(str::to_string),
            color: color.map(str::to_string),
            duration_ms: 0,
        });
    }

    fn fade_background(
        &self,
        image: Option<&str>,
        color: Option<&str>,
        duration: Duration,
    ) -> StepFuture<'_> {
        self.lock().background = image.or(color).map(str::to_string);
        self.record(SceneCall::Background {
            image: image.map(str::to_string),
            color: color.map(str::to_string),
            duration_ms: ms(duration),
        });
        sleep_for(duration)
    }

    fn play_sound(&self, sound: &str, volume: f32) -> StepFuture<'_> {
        self.record(SceneCall::Sound {
            sound: sound.to_string(),
            volume,
        });
        sleep_for(Duration::from_millis(self.sound_ms))
    }

    fn stop_sound(&self, sound: &str) {
        self.record(SceneCall::StopSound {
            sound: sound.to_string(),
        });
    }

    fn show_damage_number(&self, unit: &UnitId, amount: u32, kind: DamageKind) {
        self.record(SceneCall::DamageNumber {
            unit: unit.clone(),
            amount,
            kind,
        });
    }

    fn update_unit_hp(&self, unit: &UnitId, hp: u32, max_hp: u32) {
        self.record(SceneCall::Hp {
            unit: unit.clone(),
            hp,
            max_hp,
        });
    }

    fn update_unit_mp(&self, unit: &UnitId, mp: u32, max_mp: u32) {
        self.record(SceneCall::Mp {
            unit: unit.clone(),
            mp,
            max_mp,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_relative_move_updates_position() {
        let scene = HeadlessScene::new();
        let unit = UnitId::new("U1");
        scene.set_unit_position(&unit, 100.0, 50.0);

        let opts = MoveOptions {
            duration: Duration::from_millis(200),
            relative: true,
        };
        scene.move_unit(&unit, 40.0, 0.0, opts).await;

        assert_eq!(scene.position_of(&unit), Some(PixelPosition::new(140.0, 50.0)));
        assert_eq!(scene.unit_at_position(138.0, 52.0), Some(unit));
        assert_eq!(scene.unit_at_position(0.0, 0.0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_effects_tracked_until_stopped() {
        let scene = HeadlessScene::new();
        let first = scene
            .play_effect("spark", 0.0, 0.0, EffectOptions::default())
            .await;
        let second = scene
            .play_effect_on_unit("burn", &UnitId::new("E1"), EffectOptions::default())
            .await;
        assert_ne!(first, second);
        assert_eq!(scene.active_effects(), 2);

        scene.stop_effect(first);
        assert_eq!(scene.active_effects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clip_plays_through_to_last_frame() {
        use crate::battle::config::BattleConfig;
        use serde_json::json;
        use tokio::time::Instant;

        let config: BattleConfig = serde_json::from_value(json!({
            "player_units": [{
                "id": "U1",
                "name": "Knight",
                "position": 0,
                "stats": {"hp": 10, "speed": 1, "attack": 1},
                "sprite": {"image": "knight.png", "width": 128, "height": 64, "rows": 2, "cols": 4},
                "animations": {
                    "attack": {"startFrame": 4, "frameCount": 3, "frameDuration": 80}
                }
            }],
            "enemy_units": [{"id": "E1", "name": "Slime", "position": 0, "stats": {"hp": 10}}]
        }))
        .unwrap();
        let mut battle = BattleScene::new(600.0, 6);
        battle.load_battle_config(&config).unwrap();

        let scene = HeadlessScene::new();
        scene.sync_with(&battle);
        let knight = UnitId::new("U1");
        assert_eq!(scene.sheet_frame_of(&knight), None);

        let start = Instant::now();
        scene.play_unit_animation(&knight, "attack").await;
        assert_eq!(start.elapsed(), Duration::from_millis(240));
        assert_eq!(scene.sheet_frame_of(&knight), Some(6));

        // No clip for this key: default timing, frame untouched
        scene.play_unit_animation(&knight, "cheer").await;
        assert_eq!(start.elapsed(), Duration::from_millis(240 + DEFAULT_ANIMATION_MS));
        assert_eq!(scene.sheet_frame_of(&knight), Some(6));
    }

    #[test]
    fn test_enemies_are_mirrored() {
        use crate::battle::unit::{GridPosition, UnitStats};

        let player = Unit::new("U1".into(), "P", true, UnitStats::default(), GridPosition::new(0, 0));
        let enemy = Unit::new("E1".into(), "E", false, UnitStats::default(), GridPosition::new(0, 0));
        let p = screen_position(&player, 600.0);
        let e = screen_position(&enemy, 600.0);
        assert_eq!(p.y, e.y);
        assert!(e.x > p.x);
    }
}
