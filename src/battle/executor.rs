//! Action resolution
//!
//! Applies one dequeued `BattleAction` to the scene, then plays its
//! choreography through the step executor. Outcomes are tagged:
//! - `Applied`: the action changed the battle
//! - `Skipped`: the action went stale (actor or targets gone); normal flow
//! - `Rejected`: the action was refused (no MP, full roster, ...)
//!
//! Bad content (unknown skill, item or summon ids) is an error instead, and
//! is raised before any state changes.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::battle::action::{ActionKind, BattleAction};
use crate::battle::catalog::{Catalogs, SkillEffect};
use crate::battle::constants::{
    ANIM_ATTACK, ANIM_DEFEND, ANIM_DIE, ATTACK_LUNGE_DISTANCE, ATTACK_LUNGE_MS, ATTACK_RETURN_MS,
};
use crate::battle::scene::{BattleScene, Side};
use crate::core::config::BattleSettings;
use crate::core::error::{BattleError, Result};
use crate::core::types::UnitId;
use crate::steps::executor::StepExecutor;
use crate::steps::step::{SkillStep, StepContext, Vitals};

/// Stat change dealt to one unit by an action
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitEffect {
    pub unit_id: UnitId,
    pub damage: u32,
    pub healed: u32,
    pub mp_restored: u32,
}

impl UnitEffect {
    /// Number shown over the unit
    pub fn amount(&self) -> u32 {
        if self.damage > 0 {
            self.damage
        } else {
            self.healed
        }
    }
}

/// What an applied action did
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionResult {
    pub escaped: bool,
    /// Units whose hp reached 0 during this action
    pub fainted: Vec<UnitId>,
    pub effects: Vec<UnitEffect>,
    pub mp_spent: u32,
    pub summoned: Option<UnitId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Actor is dead or no longer on the field
    ActorUnavailable,
    /// No living unit left to act on
    NoTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    InsufficientMp,
    RosterFull,
    /// Only the player side can run
    EscapeUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Applied(ActionResult),
    Skipped(SkipReason),
    Rejected(RejectReason),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }

    pub fn escaped(&self) -> bool {
        matches!(self, ActionOutcome::Applied(result) if result.escaped)
    }

    pub fn fainted(&self) -> &[UnitId] {
        match self {
            ActionOutcome::Applied(result) => &result.fainted,
            _ => &[],
        }
    }

    /// Short label for logs and events
    pub fn label(&self) -> String {
        match self {
            ActionOutcome::Applied(_) => "applied".to_string(),
            ActionOutcome::Skipped(reason) => format!("skipped ({:?})", reason),
            ActionOutcome::Rejected(reason) => format!("rejected ({:?})", reason),
        }
    }
}

/// Damage dealt by `attack` against `defense`.
///
/// `max(min_damage, attack - defense)`; a defending target takes that
/// times `defend_damage_factor`, floored, and never less than `min_damage`.
pub fn calculate_damage(settings: &BattleSettings, attack: u32, defense: u32, defending: bool) -> u32 {
    let base = attack.saturating_sub(defense).max(settings.min_damage);
    if defending {
        let reduced = (base as f32 * settings.defend_damage_factor).floor() as u32;
        reduced.max(settings.min_damage)
    } else {
        base
    }
}

pub type ActionStartHook = Box<dyn Fn(&BattleAction) + Send + Sync>;
pub type ActionEndHook = Box<dyn Fn(&BattleAction, &ActionOutcome) + Send + Sync>;

pub struct ActionExecutor {
    settings: BattleSettings,
    catalogs: Arc<Catalogs>,
    steps: StepExecutor,
    rng: ChaCha8Rng,
    summon_counter: u32,
    on_action_start: Option<ActionStartHook>,
    on_action_end: Option<ActionEndHook>,
}

impl ActionExecutor {
    pub fn new(settings: BattleSettings, catalogs: Arc<Catalogs>, steps: StepExecutor) -> Self {
        let rng = match settings.rng_seed {
            // Keep escape rolls on a different stream than enemy targeting
            Some(seed) => ChaCha8Rng::seed_from_u64(seed ^ 0x5EED_E5CA_9E00_0000),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            settings,
            catalogs,
            steps,
            rng,
            summon_counter: 0,
            on_action_start: None,
            on_action_end: None,
        }
    }

    pub fn settings(&self) -> &BattleSettings {
        &self.settings
    }

    pub fn catalogs(&self) -> &Arc<Catalogs> {
        &self.catalogs
    }

    /// Called before each action resolves. Observational only.
    pub fn on_action_start<F>(&mut self, hook: F)
    where
        F: Fn(&BattleAction) + Send + Sync + 'static,
    {
        self.on_action_start = Some(Box::new(hook));
    }

    /// Called after each action resolved without error.
    pub fn on_action_end<F>(&mut self, hook: F)
    where
        F: Fn(&BattleAction, &ActionOutcome) + Send + Sync + 'static,
    {
        self.on_action_end = Some(Box::new(hook));
    }

    /// Resolve one action against the scene and play it back.
    pub async fn execute(
        &mut self,
        scene: &mut BattleScene,
        action: &BattleAction,
    ) -> Result<ActionOutcome> {
        if let Some(hook) = &self.on_action_start {
            hook(action);
        }

        let outcome = self.resolve(scene, action).await?;
        tracing::debug!(
            "{:?} by {} -> {}",
            action.kind,
            action.actor_id,
            outcome.label()
        );

        if let Some(hook) = &self.on_action_end {
            hook(action, &outcome);
        }
        Ok(outcome)
    }

    async fn resolve(
        &mut self,
        scene: &mut BattleScene,
        action: &BattleAction,
    ) -> Result<ActionOutcome> {
        let Some(actor) = scene.unit(&action.actor_id).filter(|u| u.is_alive()) else {
            return Ok(ActionOutcome::Skipped(SkipReason::ActorUnavailable));
        };
        let actor_id = actor.id.clone();
        let side = Side::of(actor);
        let stats = actor.stats;

        match action.kind {
            ActionKind::Attack => {
                let Some(target) = first_opponent(scene, side, &action.target_ids) else {
                    return Ok(ActionOutcome::Skipped(SkipReason::NoTarget));
                };
                let mut result = ActionResult::default();
                self.hit(scene, &target, stats.attack, &mut result);
                self.play(scene, &attack_steps(side), &actor_id, vec![target], &result)
                    .await?;
                Ok(ActionOutcome::Applied(result))
            }

            ActionKind::Defend => {
                if let Some(unit) = scene.unit_mut(&actor_id) {
                    unit.set_defending(true);
                }
                let result = ActionResult::default();
                let steps = vec![animation_step("actor", ANIM_DEFEND)];
                self.play(scene, &steps, &actor_id, Vec::new(), &result)
                    .await?;
                Ok(ActionOutcome::Applied(result))
            }

            ActionKind::Escape => {
                if side != Side::Player {
                    return Ok(ActionOutcome::Rejected(RejectReason::EscapeUnavailable));
                }
                let roll: f32 = self.rng.gen();
                let escaped = roll < self.settings.escape_chance;
                tracing::debug!("{} escape roll {:.3} -> {}", actor_id, roll, escaped);
                Ok(ActionOutcome::Applied(ActionResult {
                    escaped,
                    ..Default::default()
                }))
            }

            ActionKind::Skill => {
                let catalogs = Arc::clone(&self.catalogs);
                let skill = catalogs.skill(action.skill_id.as_deref().unwrap_or_default())?;
                if stats.mp < skill.mp_cost {
                    return Ok(ActionOutcome::Rejected(RejectReason::InsufficientMp));
                }

                let targets = match skill.effect {
                    SkillEffect::Damage { .. } => opponents(scene, side, &action.target_ids),
                    SkillEffect::Heal { .. } => allies(scene, side, &actor_id, &action.target_ids),
                    SkillEffect::None => living(scene, &action.target_ids),
                };
                if targets.is_empty() && skill.effect != SkillEffect::None {
                    return Ok(ActionOutcome::Skipped(SkipReason::NoTarget));
                }

                let mut result = ActionResult {
                    mp_spent: skill.mp_cost,
                    ..Default::default()
                };
                if let Some(unit) = scene.unit_mut(&actor_id) {
                    unit.spend_mp(skill.mp_cost);
                }
                match skill.effect {
                    SkillEffect::Damage { power } => {
                        for target in &targets {
                            self.hit(scene, target, stats.attack.saturating_add(power), &mut result);
                        }
                    }
                    SkillEffect::Heal { power } => {
                        for target in &targets {
                            mend(scene, target, power, 0, &mut result);
                        }
                    }
                    SkillEffect::None => {}
                }

                let heal = matches!(skill.effect, SkillEffect::Heal { .. });
                let steps = steps_or_impact(&skill.steps, heal);
                self.play(scene, &steps, &actor_id, targets, &result).await?;
                Ok(ActionOutcome::Applied(result))
            }

            ActionKind::Item => {
                let catalogs = Arc::clone(&self.catalogs);
                let item = catalogs.item(action.item_id.as_deref().unwrap_or_default())?;

                let mut result = ActionResult::default();
                let targets = if item.is_offensive() {
                    let targets = opponents(scene, side, &action.target_ids);
                    for target in &targets {
                        if let Some(unit) = scene.unit_mut(target) {
                            let report = unit.apply_damage(item.damage);
                            record_damage(&mut result, target, report.dealt, report.died);
                        }
                    }
                    targets
                } else {
                    let targets = allies(scene, side, &actor_id, &action.target_ids);
                    for target in &targets {
                        mend(scene, target, item.heal_hp, item.restore_mp, &mut result);
                    }
                    targets
                };
                if targets.is_empty() {
                    return Ok(ActionOutcome::Skipped(SkipReason::NoTarget));
                }

                let steps = steps_or_impact(&item.steps, !item.is_offensive());
                self.play(scene, &steps, &actor_id, targets, &result).await?;
                Ok(ActionOutcome::Applied(result))
            }

            ActionKind::Summon => {
                let catalogs = Arc::clone(&self.catalogs);
                let template_id = action.summon_id.as_deref().unwrap_or_default();
                let template = catalogs.summon(template_id)?;

                if scene.side_units(side).len() >= self.settings.max_units_per_side {
                    tracing::debug!("{} summon of {} rejected: roster full", actor_id, template_id);
                    return Ok(ActionOutcome::Rejected(RejectReason::RosterFull));
                }

                let id = self.next_summon_id(scene, template_id);
                match scene.summon_unit(side, template, id.clone()) {
                    Ok(_) => {}
                    Err(BattleError::RosterFull { .. }) => {
                        return Ok(ActionOutcome::Rejected(RejectReason::RosterFull));
                    }
                    Err(err) => return Err(err),
                }
                tracing::info!("{} summoned {}", actor_id, id);
                Ok(ActionOutcome::Applied(ActionResult {
                    summoned: Some(id),
                    ..Default::default()
                }))
            }
        }
    }

    fn hit(&self, scene: &mut BattleScene, target: &UnitId, attack: u32, result: &mut ActionResult) {
        let Some(unit) = scene.unit_mut(target) else {
            return;
        };
        let damage = calculate_damage(&self.settings, attack, unit.stats.defense, unit.is_defending);
        let report = unit.apply_damage(damage);
        record_damage(result, target, report.dealt, report.died);
    }

    fn next_summon_id(&mut self, scene: &BattleScene, template_id: &str) -> UnitId {
        loop {
            self.summon_counter += 1;
            let id = UnitId::new(format!("{}#{}", template_id, self.summon_counter));
            if scene.unit(&id).is_none() {
                return id;
            }
        }
    }

    /// Play choreography for a resolved action, then the faint animations.
    async fn play(
        &self,
        scene: &BattleScene,
        steps: &[SkillStep],
        actor: &UnitId,
        targets: Vec<UnitId>,
        result: &ActionResult,
    ) -> Result<()> {
        let mut ctx = StepContext::new(actor.clone(), targets);
        for effect in &result.effects {
            ctx.amounts.insert(effect.unit_id.clone(), effect.amount());
        }
        for id in ctx.targets.iter().chain(std::iter::once(actor)) {
            if let Some(unit) = scene.unit(id) {
                let vitals = Vitals {
                    hp: unit.stats.hp,
                    max_hp: unit.stats.max_hp,
                    mp: unit.stats.mp,
                    max_mp: unit.stats.max_mp,
                };
                ctx.vitals.insert(id.clone(), vitals);
            }
        }

        self.steps.execute_steps_in(steps, &ctx).await?;

        if !result.fainted.is_empty() {
            let faints: Vec<SkillStep> = result
                .fainted
                .iter()
                .map(|id| animation_step(id.as_str(), ANIM_DIE))
                .collect();
            self.steps.execute_steps_parallel_in(&faints, &ctx).await?;
        }
        Ok(())
    }
}

fn record_damage(result: &mut ActionResult, target: &UnitId, dealt: u32, died: bool) {
    result.effects.push(UnitEffect {
        unit_id: target.clone(),
        damage: dealt,
        ..Default::default()
    });
    if died {
        result.fainted.push(target.clone());
    }
}

fn mend(scene: &mut BattleScene, target: &UnitId, hp: u32, mp: u32, result: &mut ActionResult) {
    if let Some(unit) = scene.unit_mut(target) {
        let healed = unit.heal(hp);
        let mp_restored = unit.restore_mp(mp);
        result.effects.push(UnitEffect {
            unit_id: target.clone(),
            healed,
            mp_restored,
            ..Default::default()
        });
    }
}

fn is_living_on(scene: &BattleScene, id: &UnitId, side: Side) -> bool {
    scene
        .unit(id)
        .map_or(false, |u| u.is_alive() && Side::of(u) == side)
}

/// First requested living opponent, else the first living opponent at all
fn first_opponent(scene: &BattleScene, side: Side, requested: &[UnitId]) -> Option<UnitId> {
    let enemy = side.opponent();
    requested
        .iter()
        .find(|id| is_living_on(scene, id, enemy))
        .cloned()
        .or_else(|| scene.alive_units(enemy).first().map(|u| u.id.clone()))
}

/// Requested living opponents, retargeting to one if none are left
fn opponents(scene: &BattleScene, side: Side, requested: &[UnitId]) -> Vec<UnitId> {
    let enemy = side.opponent();
    let targets: Vec<UnitId> = requested
        .iter()
        .filter(|id| is_living_on(scene, id, enemy))
        .cloned()
        .collect();
    if targets.is_empty() {
        first_opponent(scene, side, &[]).into_iter().collect()
    } else {
        targets
    }
}

/// Requested living allies, or the actor itself
fn allies(scene: &BattleScene, side: Side, actor: &UnitId, requested: &[UnitId]) -> Vec<UnitId> {
    let targets: Vec<UnitId> = requested
        .iter()
        .filter(|id| is_living_on(scene, id, side))
        .cloned()
        .collect();
    if targets.is_empty() {
        vec![actor.clone()]
    } else {
        targets
    }
}

fn living(scene: &BattleScene, requested: &[UnitId]) -> Vec<UnitId> {
    requested
        .iter()
        .filter(|id| scene.unit(id).map_or(false, |u| u.is_alive()))
        .cloned()
        .collect()
}

fn animation_step(unit: &str, key: &str) -> SkillStep {
    SkillStep::new("animation", json!({ "unit": unit, "key": key }))
}

/// Built-in attack choreography: lunge, swing, impact, return
fn attack_steps(side: Side) -> Vec<SkillStep> {
    // Enemies face left
    let lunge = match side {
        Side::Player => ATTACK_LUNGE_DISTANCE,
        Side::Enemy => -ATTACK_LUNGE_DISTANCE,
    };
    vec![
        SkillStep::new(
            "move",
            json!({ "unit": "actor", "x": lunge, "y": 0, "duration": ATTACK_LUNGE_MS, "relative": true }),
        ),
        animation_step("actor", ANIM_ATTACK),
        SkillStep::new("damage", json!({ "target": "target" })),
        SkillStep::new(
            "move",
            json!({ "unit": "actor", "reset": true, "duration": ATTACK_RETURN_MS }),
        ),
    ]
}

fn steps_or_impact(steps: &[SkillStep], heal: bool) -> Vec<SkillStep> {
    if steps.is_empty() {
        vec![SkillStep::new("damage", json!({ "target": "target", "heal": heal }))]
    } else {
        steps.to_vec()
    }
}
