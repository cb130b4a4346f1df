//! Declarative skill steps
//!
//! A `SkillStep` is the flat, serializable form authored in the choreography
//! editor: `{"type": "move", "params": {...}}`. Before anything runs it is
//! parsed into a typed `StepOp`; an unknown type or malformed params is a
//! config error.

use ahash::AHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{BattleError, Result};
use crate::core::types::UnitId;

/// One authored instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl SkillStep {
    /// Build a step from a type name and a JSON object of params.
    /// Non-object params are treated as empty.
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: None,
            kind: kind.into(),
            params,
        }
    }

    pub fn wait(delay_ms: u64) -> Self {
        Self::new("wait", serde_json::json!({ "delay": delay_ms }))
    }

    fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            BattleError::InvalidStepParams {
                kind: self.kind.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Parse into a typed operation
    pub fn parse(&self) -> Result<StepOp> {
        let op = match self.kind.as_str() {
            "move" => StepOp::Move(self.params_as()?),
            "damage" => StepOp::Damage(self.params_as()?),
            "effect" => StepOp::Effect(self.params_as()?),
            "wait" => StepOp::Wait(self.params_as()?),
            "camera" => {
                let camera: CameraStep = self.params_as()?;
                if camera.action == CameraAction::Focus && camera.target.is_none() {
                    return Err(BattleError::InvalidStepParams {
                        kind: self.kind.clone(),
                        reason: "focus needs a target".into(),
                    });
                }
                StepOp::Camera(camera)
            }
            "shake" => StepOp::Shake(self.params_as()?),
            "background" => StepOp::Background(self.params_as()?),
            "sound" => StepOp::Sound(self.params_as()?),
            "animation" => StepOp::Animation(self.params_as()?),
            other => return Err(BattleError::UnknownStepType(other.to_string())),
        };
        Ok(op)
    }
}

/// Parse a whole step list, failing on the first bad step
pub fn parse_steps(steps: &[SkillStep]) -> Result<Vec<StepOp>> {
    steps.iter().map(SkillStep::parse).collect()
}

/// Typed form of a `SkillStep`
#[derive(Debug, Clone, PartialEq)]
pub enum StepOp {
    Move(MoveStep),
    Damage(DamageStep),
    Effect(EffectStep),
    Wait(WaitStep),
    Camera(CameraStep),
    Shake(ShakeStep),
    Background(BackgroundStep),
    Sound(SoundStep),
    Animation(AnimationStep),
}

impl StepOp {
    pub fn name(&self) -> &'static str {
        match self {
            StepOp::Move(_) => "move",
            StepOp::Damage(_) => "damage",
            StepOp::Effect(_) => "effect",
            StepOp::Wait(_) => "wait",
            StepOp::Camera(_) => "camera",
            StepOp::Shake(_) => "shake",
            StepOp::Background(_) => "background",
            StepOp::Sound(_) => "sound",
            StepOp::Animation(_) => "animation",
        }
    }
}

fn default_one() -> f32 {
    1.0
}

fn default_intensity() -> f32 {
    5.0
}

fn default_shake_ms() -> u64 {
    300
}

fn default_hit_animation() -> Option<String> {
    Some(crate::battle::constants::ANIM_HIT.to_string())
}

/// Move (or snap, or return home) a unit. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveStep {
    pub unit: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub relative: bool,
    /// Return to the home slot instead of moving to `x, y`
    #[serde(default)]
    pub reset: bool,
}

/// Show a damage (or heal) number and play the hit reaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageStep {
    pub target: String,
    /// Falls back to the amount recorded in the step context
    #[serde(default)]
    pub amount: Option<u32>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub heal: bool,
    #[serde(default = "default_hit_animation")]
    pub animation: Option<String>,
}

/// Play a visual effect on a unit or at a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectStep {
    pub effect: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Stop the effect after this many milliseconds
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default = "default_one")]
    pub scale: f32,
}

/// Pure delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitStep {
    pub delay: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraAction {
    Shake,
    Move,
    Zoom,
    Reset,
    Focus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStep {
    pub action: CameraAction,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_one")]
    pub zoom: f32,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub duration: u64,
}

/// Shorthand for a camera shake
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShakeStep {
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default = "default_shake_ms")]
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundAction {
    #[default]
    Set,
    Fade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundStep {
    #[serde(default)]
    pub action: BackgroundAction,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundAction {
    #[default]
    Play,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundStep {
    pub sound: String,
    #[serde(default = "default_one")]
    pub volume: f32,
    #[serde(default)]
    pub action: SoundAction,
}

/// Play one of the unit's animation clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationStep {
    pub unit: String,
    pub key: String,
}

/// Unit vitals as they stand after an action, for HUD updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vitals {
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
}

/// Binds the symbolic unit references of a step list to concrete units.
///
/// `"actor"` names the acting unit, `"target"` every target; anything else
/// is taken as a literal unit id.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pub actor: Option<UnitId>,
    pub targets: Vec<UnitId>,
    pub amounts: AHashMap<UnitId, u32>,
    pub vitals: AHashMap<UnitId, Vitals>,
}

impl StepContext {
    pub fn new(actor: UnitId, targets: Vec<UnitId>) -> Self {
        Self {
            actor: Some(actor),
            targets,
            ..Default::default()
        }
    }

    pub fn resolve(&self, reference: &str) -> Vec<UnitId> {
        match reference {
            "actor" | "self" => self.actor.iter().cloned().collect(),
            "target" | "targets" => self.targets.clone(),
            id => vec![UnitId::new(id)],
        }
    }

    pub fn amount_for(&self, unit: &UnitId) -> Option<u32> {
        self.amounts.get(unit).copied()
    }

    pub fn vitals_for(&self, unit: &UnitId) -> Option<Vitals> {
        self.vitals.get(unit).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_from_authored_json() {
        let step: SkillStep = serde_json::from_value(json!({
            "id": "lunge",
            "type": "move",
            "params": {"unit": "actor", "x": 40, "y": 0, "duration": 200, "relative": true}
        }))
        .unwrap();

        match step.parse().unwrap() {
            StepOp::Move(m) => {
                assert_eq!(m.unit, "actor");
                assert_eq!(m.duration, 200);
                assert!(m.relative);
                assert!(!m.reset);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let step = SkillStep::new("teleport", json!({}));
        let err = step.parse().unwrap_err();
        assert!(matches!(err, BattleError::UnknownStepType(ref t) if t == "teleport"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_missing_required_param() {
        let step = SkillStep::new("wait", json!({}));
        assert!(matches!(
            step.parse(),
            Err(BattleError::InvalidStepParams { .. })
        ));
    }

    #[test]
    fn test_focus_without_target_fails_to_parse() {
        let step = SkillStep::new("camera", json!({"action": "focus"}));
        let err = step.parse().unwrap_err();
        assert!(matches!(err, BattleError::InvalidStepParams { ref kind, .. } if kind == "camera"));

        let aimed = SkillStep::new("camera", json!({"action": "focus", "target": "actor"}));
        assert!(aimed.parse().is_ok());
    }

    #[test]
    fn test_defaults_fill_in() {
        let shake = SkillStep::new("shake", json!({})).parse().unwrap();
        assert_eq!(
            shake,
            StepOp::Shake(ShakeStep {
                intensity: 5.0,
                duration: 300
            })
        );

        let damage = SkillStep::new("damage", json!({"target": "target"})).parse().unwrap();
        match damage {
            StepOp::Damage(d) => {
                assert_eq!(d.animation.as_deref(), Some("hit"));
                assert_eq!(d.amount, None);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_parse_steps_stops_at_first_bad_step() {
        let steps = vec![SkillStep::wait(10), SkillStep::new("nope", json!({}))];
        assert!(parse_steps(&steps).is_err());
        assert_eq!(parse_steps(&steps[..1]).unwrap().len(), 1);
    }

    #[test]
    fn test_context_resolution() {
        let ctx = StepContext::new(UnitId::new("U1"), vec![UnitId::new("E1"), UnitId::new("E2")]);
        assert_eq!(ctx.resolve("actor"), vec![UnitId::new("U1")]);
        assert_eq!(ctx.resolve("target").len(), 2);
        assert_eq!(ctx.resolve("E9"), vec![UnitId::new("E9")]);
        assert!(StepContext::default().resolve("actor").is_empty());
    }
}
