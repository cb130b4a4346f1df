//! Skill step playback
//!
//! Declarative choreography (`SkillStep`) interpreted against a host-supplied
//! `SceneBinding`, sequentially or concurrently. Used for battle action
//! playback and for previewing choreography outside a battle.

pub mod binding;
pub mod executor;
pub mod headless;
pub mod step;

pub use binding::{DamageKind, EffectOptions, MoveOptions, SceneBinding, StepFuture};
pub use executor::StepExecutor;
pub use headless::{screen_position, HeadlessScene, SceneCall};
pub use step::{parse_steps, SkillStep, StepContext, StepOp, Vitals};
