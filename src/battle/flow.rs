//! Turn controller
//!
//! Drives a battle through `Init -> Command -> Execute -> Result`:
//! - Command: player units are prompted one at a time in activation order;
//!   a one-second countdown auto-defends whoever is left when it hits zero
//! - Execute: player and enemy actions are queued, sorted by priority and
//!   resolved strictly one after another
//! - Result: terminal until `reset_battle`
//!
//! `BattleFlow` is the single writer of the scene. Hosts either call
//! `submit_action` / `on_timer_tick` themselves or hand a command channel to
//! `drive`.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::battle::action::{ActionKind, BattleAction};
use crate::battle::ai::{EnemyStrategy, RandomTargetStrategy};
use crate::battle::catalog::Catalogs;
use crate::battle::config::BattleConfig;
use crate::battle::events::{BattleEventType, EventBus};
use crate::battle::executor::{ActionExecutor, ActionOutcome};
use crate::battle::queue::ActionQueue;
use crate::battle::scene::{BattleScene, Side};
use crate::battle::timer::CommandTimer;
use crate::core::config::BattleSettings;
use crate::core::error::{BattleError, Result};
use crate::core::types::UnitId;
use crate::steps::binding::SceneBinding;
use crate::steps::executor::StepExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattlePhase {
    #[default]
    Init,
    Command,
    Execute,
    Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleResult {
    Win,
    Lose,
    Escape,
}

/// Coarse battle state, readable by the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleFlowState {
    pub phase: BattlePhase,
    pub turn: u32,
    pub current_actor_index: usize,
    /// Seconds left in the command phase
    pub command_timer: u32,
    /// Set once, when the battle is decided
    pub result: Option<BattleResult>,
}

/// Input accepted by `BattleFlow::drive`
#[derive(Debug, Clone)]
pub enum BattleCommand {
    Submit(BattleAction),
    Reset,
}

enum DriveEvent {
    Tick,
    Command(Option<BattleCommand>),
}

pub struct BattleFlow {
    settings: BattleSettings,
    state: BattleFlowState,
    scene: BattleScene,
    queue: ActionQueue,
    executor: ActionExecutor,
    strategy: Box<dyn EnemyStrategy>,
    timer: CommandTimer,
    events: EventBus,
    /// Activation order snapshot for the current command phase
    command_order: Vec<UnitId>,
    submitted: AHashMap<UnitId, BattleAction>,
}

impl BattleFlow {
    /// Build a controller. Settings and catalogs are validated here.
    pub fn new(
        settings: BattleSettings,
        catalogs: Catalogs,
        binding: Arc<dyn SceneBinding>,
    ) -> Result<Self> {
        settings.validate().map_err(BattleError::InvalidConfig)?;
        catalogs.validate()?;

        let scene = BattleScene::new(settings.canvas_height, settings.max_units_per_side);
        let executor = ActionExecutor::new(
            settings.clone(),
            Arc::new(catalogs),
            StepExecutor::new(binding),
        );
        let strategy = Box::new(RandomTargetStrategy::new(settings.rng_seed));

        Ok(Self {
            settings,
            state: BattleFlowState::default(),
            scene,
            queue: ActionQueue::new(),
            executor,
            strategy,
            timer: CommandTimer::new(),
            events: EventBus::new(),
            command_order: Vec::new(),
            submitted: AHashMap::new(),
        })
    }

    /// Replace the enemy strategy
    pub fn with_strategy(mut self, strategy: impl EnemyStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    // === ACCESSORS ===

    pub fn state(&self) -> &BattleFlowState {
        &self.state
    }

    pub fn phase(&self) -> BattlePhase {
        self.state.phase
    }

    pub fn settings(&self) -> &BattleSettings {
        &self.settings
    }

    pub fn scene(&self) -> &BattleScene {
        &self.scene
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Access to the executor's lifecycle hooks
    pub fn executor_mut(&mut self) -> &mut ActionExecutor {
        &mut self.executor
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Unit whose command is awaited, if in the command phase
    pub fn current_actor(&self) -> Option<&UnitId> {
        if self.state.phase != BattlePhase::Command {
            return None;
        }
        self.command_order.get(self.state.current_actor_index)
    }

    /// Actions recorded so far this command phase
    pub fn submitted_action(&self, unit: &UnitId) -> Option<&BattleAction> {
        self.submitted.get(unit)
    }

    // === TRANSITIONS ===

    fn set_phase(&mut self, phase: BattlePhase) {
        let from = self.state.phase;
        self.state.phase = phase;
        tracing::info!("Battle phase {:?} -> {:?} (turn {})", from, phase, self.state.turn);
        self.events.emit(
            self.state.turn,
            BattleEventType::PhaseChanged { from, to: phase },
            format!("{:?} -> {:?}", from, phase),
        );
    }

    fn expect_phase(&self, expected: BattlePhase) -> Result<()> {
        if self.state.phase != expected {
            return Err(BattleError::InvalidPhase {
                expected,
                actual: self.state.phase,
            });
        }
        Ok(())
    }

    /// Load the roster and open the first command phase.
    ///
    /// Only valid in `Init`. A bad config leaves everything untouched.
    pub fn start_battle(&mut self, config: &BattleConfig) -> Result<()> {
        self.expect_phase(BattlePhase::Init)?;

        let mut scene = BattleScene::new(self.settings.canvas_height, self.settings.max_units_per_side);
        scene.load_battle_config(config)?;
        self.scene = scene;

        self.queue.clear();
        self.state = BattleFlowState {
            turn: 1,
            ..Default::default()
        };

        let player_units = self.scene.player_units().len();
        let enemy_units = self.scene.enemy_units().len();
        tracing::info!("Battle started: {} vs {}", player_units, enemy_units);
        self.events.emit(
            1,
            BattleEventType::BattleStarted {
                player_units,
                enemy_units,
            },
            format!("{} player units vs {} enemy units", player_units, enemy_units),
        );

        self.begin_command_phase();
        Ok(())
    }

    /// Open a command phase for the current turn and arm the countdown.
    fn begin_command_phase(&mut self) {
        self.scene.clear_defending();
        self.scene.clear_highlights();
        self.submitted.clear();
        self.command_order = self
            .scene
            .actionable_player_units()
            .into_iter()
            .map(|u| u.id.clone())
            .collect();

        self.state.current_actor_index = 0;
        self.state.command_timer = self.settings.command_time_limit_secs;
        self.set_phase(BattlePhase::Command);
        self.timer.arm();

        self.events.emit(
            self.state.turn,
            BattleEventType::TurnStarted,
            format!("Turn {}", self.state.turn),
        );
        self.prompt_current_actor();
    }

    fn prompt_current_actor(&mut self) {
        let Some(id) = self.command_order.get(self.state.current_actor_index).cloned() else {
            return;
        };
        if let Some(unit) = self.scene.unit_mut(&id) {
            unit.set_active(true);
            unit.set_selected(true);
        }
        self.events.emit(
            self.state.turn,
            BattleEventType::ActorPrompted { unit_id: id.clone() },
            format!("Awaiting command for {}", id),
        );
    }

    /// Check a submission without recording it
    pub fn validate_submission(&self, action: &BattleAction) -> Result<()> {
        self.expect_phase(BattlePhase::Command)?;

        let expected = self.current_actor();
        if expected != Some(&action.actor_id) {
            return Err(BattleError::NotCurrentActor {
                expected: expected.cloned(),
                got: action.actor_id.clone(),
            });
        }

        let catalogs = self.executor.catalogs();
        match action.kind {
            ActionKind::Skill => {
                catalogs.skill(action.skill_id.as_deref().unwrap_or_default())?;
            }
            ActionKind::Item => {
                catalogs.item(action.item_id.as_deref().unwrap_or_default())?;
            }
            ActionKind::Summon => {
                catalogs.summon(action.summon_id.as_deref().unwrap_or_default())?;
            }
            _ => {}
        }
        Ok(())
    }

    fn record_action(&mut self, mut action: BattleAction, auto: bool) {
        if let Some(unit) = self.scene.unit(&action.actor_id) {
            action.priority = unit.priority();
        }
        let unit_id = action.actor_id.clone();
        self.events.emit(
            self.state.turn,
            BattleEventType::ActionSubmitted {
                unit_id: unit_id.clone(),
                kind: action.kind,
                auto,
            },
            format!("{} chose {:?}", unit_id, action.kind),
        );
        self.submitted.insert(unit_id, action);
    }

    /// Record the current actor's command and prompt the next one.
    ///
    /// Once every actionable unit has a command the execute phase runs to
    /// completion before this returns.
    pub async fn submit_action(&mut self, action: BattleAction) -> Result<()> {
        self.validate_submission(&action)?;

        let actor = action.actor_id.clone();
        self.record_action(action, false);
        if let Some(unit) = self.scene.unit_mut(&actor) {
            unit.set_active(false);
            unit.set_selected(false);
        }

        self.state.current_actor_index += 1;
        if self.state.current_actor_index >= self.command_order.len() {
            self.run_execute_phase().await
        } else {
            self.prompt_current_actor();
            Ok(())
        }
    }

    /// Advance the countdown by one second.
    ///
    /// No-op outside the command phase. At zero every unit without a command
    /// defends and the execute phase runs.
    pub async fn on_timer_tick(&mut self) -> Result<()> {
        if self.state.phase != BattlePhase::Command {
            return Ok(());
        }

        self.state.command_timer = self.state.command_timer.saturating_sub(1);
        self.events.emit(
            self.state.turn,
            BattleEventType::TimerTick {
                remaining: self.state.command_timer,
            },
            format!("{}s left", self.state.command_timer),
        );
        if self.state.command_timer > 0 {
            return Ok(());
        }

        let idle: Vec<UnitId> = self
            .command_order
            .iter()
            .filter(|id| !self.submitted.contains_key(*id))
            .cloned()
            .collect();
        tracing::info!("Command phase timed out, auto-defending {} units", idle.len());
        for id in &idle {
            self.record_action(BattleAction::defend(id.clone()), true);
        }
        self.events.emit(
            self.state.turn,
            BattleEventType::CommandTimeout {
                auto_defended: idle,
            },
            "Command time expired".into(),
        );

        self.run_execute_phase().await
    }

    /// Queue every command for the round and resolve them in order.
    ///
    /// An action whose resolution fails is reported and skipped; the round
    /// carries on with the next queued action.
    async fn run_execute_phase(&mut self) -> Result<()> {
        self.expect_phase(BattlePhase::Command)?;
        self.timer.stop();
        self.set_phase(BattlePhase::Execute);
        self.scene.clear_highlights();
        self.queue.clear();

        let order = std::mem::take(&mut self.command_order);
        for id in &order {
            let Some(action) = self.submitted.remove(id) else {
                continue;
            };
            if let Some(unit) = self.scene.unit(id) {
                self.queue.add_action(action, unit.stats);
            }
        }
        self.command_order = order;

        let enemy_actions: Vec<BattleAction> = self
            .scene
            .alive_enemy_units()
            .into_iter()
            .filter_map(|unit| {
                self.strategy
                    .choose_action(unit, &self.scene)
                    .map(|action| (action, unit.priority()))
            })
            .map(|(action, priority)| action.with_priority(priority))
            .collect();
        for action in enemy_actions {
            if let Some(unit) = self.scene.unit(&action.actor_id) {
                let stats = unit.stats;
                self.queue.add_action(action, stats);
            }
        }

        self.queue.sort();
        self.queue.set_executing(true);
        tracing::debug!("Resolving {} actions", self.queue.len());

        while let Some(item) = self.queue.advance() {
            let action = item.action;
            self.events.emit(
                self.state.turn,
                BattleEventType::ActionStarted {
                    action_id: action.id,
                    unit_id: action.actor_id.clone(),
                    kind: action.kind,
                },
                format!("{} uses {:?}", action.actor_id, action.kind),
            );

            let outcome = match self.executor.execute(&mut self.scene, &action).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!("{:?} by {} failed: {}", action.kind, action.actor_id, err);
                    self.events.emit(
                        self.state.turn,
                        BattleEventType::ActionResolved {
                            action_id: action.id,
                            outcome: "failed".into(),
                        },
                        format!("{:?} by {} failed: {}", action.kind, action.actor_id, err),
                    );
                    continue;
                }
            };
            self.report_outcome(&action, &outcome);

            if outcome.escaped() {
                self.finish(BattleResult::Escape);
                return Ok(());
            }
            if let Some(winner) = self.scene.check_battle_end() {
                let result = match winner {
                    Side::Player => BattleResult::Win,
                    Side::Enemy => BattleResult::Lose,
                };
                self.finish(result);
                return Ok(());
            }

            if self.queue.has_next() && self.settings.action_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.action_delay_ms)).await;
            }
        }

        self.queue.set_executing(false);
        self.state.turn += 1;
        self.begin_command_phase();
        Ok(())
    }

    fn report_outcome(&mut self, action: &BattleAction, outcome: &ActionOutcome) {
        let turn = self.state.turn;
        self.events.emit(
            turn,
            BattleEventType::ActionResolved {
                action_id: action.id,
                outcome: outcome.label(),
            },
            format!("{:?} by {}: {}", action.kind, action.actor_id, outcome.label()),
        );

        let ActionOutcome::Applied(result) = outcome else {
            return;
        };

        for effect in &result.effects {
            if let Some(unit) = self.scene.unit(&effect.unit_id) {
                let (hp, max_hp) = (unit.stats.hp, unit.stats.max_hp);
                let (mp, max_mp) = (unit.stats.mp, unit.stats.max_mp);
                self.events.emit(
                    turn,
                    BattleEventType::HpChanged {
                        unit_id: effect.unit_id.clone(),
                        hp,
                        max_hp,
                    },
                    format!("{} hp {}/{}", effect.unit_id, hp, max_hp),
                );
                if effect.mp_restored > 0 {
                    self.events.emit(
                        turn,
                        BattleEventType::MpChanged {
                            unit_id: effect.unit_id.clone(),
                            mp,
                            max_mp,
                        },
                        format!("{} mp {}/{}", effect.unit_id, mp, max_mp),
                    );
                }
            }
        }

        if result.mp_spent > 0 {
            if let Some(unit) = self.scene.unit(&action.actor_id) {
                let (mp, max_mp) = (unit.stats.mp, unit.stats.max_mp);
                self.events.emit(
                    turn,
                    BattleEventType::MpChanged {
                        unit_id: action.actor_id.clone(),
                        mp,
                        max_mp,
                    },
                    format!("{} mp {}/{}", action.actor_id, mp, max_mp),
                );
            }
        }

        if let Some(summoned) = &result.summoned {
            self.events.emit(
                turn,
                BattleEventType::UnitSummoned {
                    unit_id: summoned.clone(),
                    template: action.summon_id.clone().unwrap_or_default(),
                },
                format!("{} summoned {}", action.actor_id, summoned),
            );
        }

        for fallen in &result.fainted {
            let dropped = self.queue.remove_pending_actions(fallen);
            tracing::debug!("{} fell, {} queued actions dropped", fallen, dropped);
            self.events.emit(
                turn,
                BattleEventType::UnitDied {
                    unit_id: fallen.clone(),
                },
                format!("{} fell", fallen),
            );
        }
    }

    /// Enter the terminal phase. The first result sticks.
    fn finish(&mut self, result: BattleResult) {
        self.timer.stop();
        self.queue.set_executing(false);
        self.scene.clear_highlights();

        let result = *self.state.result.get_or_insert(result);
        self.set_phase(BattlePhase::Result);
        tracing::info!("Battle ended on turn {}: {:?}", self.state.turn, result);
        self.events.emit(
            self.state.turn,
            BattleEventType::BattleEnded { result },
            format!("Battle ended: {:?}", result),
        );
    }

    /// Return to `Init` from any phase, dropping the roster and queue.
    pub fn reset_battle(&mut self) {
        self.timer.stop();
        self.scene.clear();
        self.queue.clear();
        self.submitted.clear();
        self.command_order.clear();
        self.state = BattleFlowState::default();
        tracing::info!("Battle reset");
        self.events
            .emit(0, BattleEventType::BattleReset, "Battle reset".into());
    }

    /// Run the battle from a command channel until it is decided.
    ///
    /// Countdown ticks and commands are multiplexed on the current task.
    /// Rejected submissions are logged and ignored. Returns `None` if the
    /// battle was reset or the channel closed first.
    pub async fn drive(
        &mut self,
        commands: &mut mpsc::Receiver<BattleCommand>,
    ) -> Result<Option<BattleResult>> {
        loop {
            if let Some(result) = self.state.result {
                return Ok(Some(result));
            }

            let next = tokio::select! {
                _ = self.timer.tick() => DriveEvent::Tick,
                command = commands.recv() => DriveEvent::Command(command),
            };

            match next {
                DriveEvent::Tick => self.on_timer_tick().await?,
                DriveEvent::Command(Some(BattleCommand::Submit(action))) => {
                    if let Err(err) = self.validate_submission(&action) {
                        tracing::warn!("Rejected submission from {}: {}", action.actor_id, err);
                        continue;
                    }
                    self.submit_action(action).await?;
                }
                DriveEvent::Command(Some(BattleCommand::Reset)) => {
                    self.reset_battle();
                    return Ok(None);
                }
                DriveEvent::Command(None) => return Ok(None),
            }
        }
    }
}
