//! Step interpreter
//!
//! Dispatches parsed steps to the scene binding and sequences them. The
//! executor holds no rendering logic of its own; `wait` is the only step it
//! fulfils itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::core::error::{BattleError, Result};
use crate::steps::binding::{DamageKind, EffectOptions, MoveOptions, SceneBinding};
use crate::steps::step::{
    parse_steps, BackgroundAction, CameraAction, SkillStep, SoundAction, StepContext, StepOp,
};

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[derive(Clone)]
pub struct StepExecutor {
    binding: Arc<dyn SceneBinding>,
}

impl StepExecutor {
    pub fn new(binding: Arc<dyn SceneBinding>) -> Self {
        Self { binding }
    }

    pub fn binding(&self) -> &Arc<dyn SceneBinding> {
        &self.binding
    }

    /// Run one step with no unit bindings
    pub async fn execute_step(&self, step: &SkillStep) -> Result<()> {
        self.execute_step_in(step, &StepContext::default()).await
    }

    pub async fn execute_step_in(&self, step: &SkillStep, ctx: &StepContext) -> Result<()> {
        let op = step.parse()?;
        self.run_op(&op, ctx).await
    }

    /// Run steps one after another; step n+1 starts once step n resolved.
    pub async fn execute_steps(&self, steps: &[SkillStep]) -> Result<()> {
        self.execute_steps_in(steps, &StepContext::default()).await
    }

    /// Sequential playback with unit bindings.
    ///
    /// The whole list is parsed up front, so a bad step fails before any
    /// step has played.
    pub async fn execute_steps_in(&self, steps: &[SkillStep], ctx: &StepContext) -> Result<()> {
        let ops = parse_steps(steps)?;
        for op in &ops {
            self.run_op(op, ctx).await?;
        }
        Ok(())
    }

    /// Start every step at once and resolve when all have settled.
    pub async fn execute_steps_parallel(&self, steps: &[SkillStep]) -> Result<()> {
        self.execute_steps_parallel_in(steps, &StepContext::default())
            .await
    }

    /// Concurrent playback with unit bindings.
    ///
    /// Waits for every step even if one fails, then reports the first
    /// failure. Dropping the returned future aborts the steps still running.
    pub async fn execute_steps_parallel_in(
        &self,
        steps: &[SkillStep],
        ctx: &StepContext,
    ) -> Result<()> {
        let ops = parse_steps(steps)?;
        let ctx = Arc::new(ctx.clone());

        let mut tasks = JoinSet::new();
        for op in ops {
            let executor = self.clone();
            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move { executor.run_op(&op, &ctx).await });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| BattleError::StepTask(e.to_string()))
                .and_then(|result| result);
            if let Err(err) = outcome {
                tracing::warn!("Parallel step failed: {}", err);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run_op(&self, op: &StepOp, ctx: &StepContext) -> Result<()> {
        tracing::debug!("step: {}", op.name());
        let binding = &self.binding;

        match op {
            StepOp::Wait(step) => {
                tokio::time::sleep(millis(step.delay)).await;
            }

            StepOp::Move(step) => {
                for unit in ctx.resolve(&step.unit) {
                    if step.reset {
                        binding
                            .reset_unit_position(&unit, millis(step.duration))
                            .await;
                    } else if step.duration == 0 && !step.relative {
                        binding.set_unit_position(&unit, step.x, step.y);
                    } else {
                        let opts = MoveOptions {
                            duration: millis(step.duration),
                            relative: step.relative,
                        };
                        binding.move_unit(&unit, step.x, step.y, opts).await;
                    }
                }
            }

            StepOp::Damage(step) => {
                let kind = if step.heal {
                    DamageKind::Heal
                } else if step.critical {
                    DamageKind::Critical
                } else {
                    DamageKind::Normal
                };
                for unit in ctx.resolve(&step.target) {
                    let amount = step.amount.or_else(|| ctx.amount_for(&unit)).unwrap_or(0);
                    binding.show_damage_number(&unit, amount, kind);
                    if let Some(vitals) = ctx.vitals_for(&unit) {
                        binding.update_unit_hp(&unit, vitals.hp, vitals.max_hp);
                        binding.update_unit_mp(&unit, vitals.mp, vitals.max_mp);
                    }
                    if let Some(animation) = step.animation.as_deref().filter(|_| !step.heal) {
                        binding.play_unit_animation(&unit, animation).await;
                    }
                }
            }

            StepOp::Effect(step) => {
                let opts = EffectOptions { scale: step.scale };
                let mut instances = Vec::new();
                match &step.target {
                    Some(target) => {
                        for unit in ctx.resolve(target) {
                            let instance = binding
                                .play_effect_on_unit(&step.effect, &unit, opts)
                                .await;
                            instances.push(instance);
                        }
                    }
                    None => {
                        let instance = binding.play_effect(&step.effect, step.x, step.y, opts).await;
                        instances.push(instance);
                    }
                }

                // Effects without a duration run out on their own
                if let Some(duration) = step.duration {
                    tokio::time::sleep(millis(duration)).await;
                    for instance in instances {
                        binding.stop_effect(instance);
                    }
                }
            }

            StepOp::Camera(step) => {
                let duration = millis(step.duration);
                match step.action {
                    CameraAction::Shake => binding.camera_shake(step.intensity, duration).await,
                    CameraAction::Move => binding.camera_move(step.x, step.y, duration).await,
                    CameraAction::Zoom => binding.camera_zoom(step.zoom, duration).await,
                    CameraAction::Reset => binding.camera_reset(duration).await,
                    CameraAction::Focus => {
                        let target = step.target.as_deref().ok_or_else(|| {
                            BattleError::InvalidStepParams {
                                kind: "camera".into(),
                                reason: "focus needs a target".into(),
                            }
                        })?;
                        for unit in ctx.resolve(target) {
                            binding.camera_focus(&unit, duration).await;
                        }
                    }
                }
            }

            StepOp::Shake(step) => {
                binding
                    .camera_shake(step.intensity, millis(step.duration))
                    .await;
            }

            StepOp::Background(step) => match step.action {
                BackgroundAction::Set => {
                    binding.set_background(step.image.as_deref(), step.color.as_deref());
                }
                BackgroundAction::Fade => {
                    binding
                        .fade_background(
                            step.image.as_deref(),
                            step.color.as_deref(),
                            millis(step.duration),
                        )
                        .await;
                }
            },

            StepOp::Sound(step) => match step.action {
                SoundAction::Play => binding.play_sound(&step.sound, step.volume).await,
                SoundAction::Stop => binding.stop_sound(&step.sound),
            },

            StepOp::Animation(step) => {
                for unit in ctx.resolve(&step.unit) {
                    binding.play_unit_animation(&unit, &step.key).await;
                }
            }
        }

        Ok(())
    }
}
