//! Battle notifications
//!
//! The turn controller reports everything observable through an `EventBus`.
//! Listeners are plain callbacks registered explicitly; they observe and
//! never steer the battle. The bus also keeps the full history so a finished
//! battle can be inspected or serialized.

use serde::{Deserialize, Serialize};

use crate::battle::action::ActionKind;
use crate::battle::flow::{BattlePhase, BattleResult};
use crate::core::types::{ActionId, UnitId};

/// A single thing that happened during a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleEvent {
    pub turn: u32,
    pub event_type: BattleEventType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BattleEventType {
    BattleStarted { player_units: usize, enemy_units: usize },
    PhaseChanged { from: BattlePhase, to: BattlePhase },
    TurnStarted,
    ActorPrompted { unit_id: UnitId },
    ActionSubmitted { unit_id: UnitId, kind: ActionKind, auto: bool },
    TimerTick { remaining: u32 },
    CommandTimeout { auto_defended: Vec<UnitId> },
    ActionStarted { action_id: ActionId, unit_id: UnitId, kind: ActionKind },
    ActionResolved { action_id: ActionId, outcome: String },
    HpChanged { unit_id: UnitId, hp: u32, max_hp: u32 },
    MpChanged { unit_id: UnitId, mp: u32, max_mp: u32 },
    UnitDied { unit_id: UnitId },
    UnitSummoned { unit_id: UnitId, template: String },
    BattleEnded { result: BattleResult },
    BattleReset,
}

/// Handle returned by `EventBus::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&BattleEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
    history: Vec<BattleEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("history", &self.history.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&BattleEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the listener was not registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, turn: u32, event_type: BattleEventType, description: String) {
        let event = BattleEvent {
            turn,
            event_type,
            description,
        };
        for (_, listener) in &self.listeners {
            listener(&event);
        }
        self.history.push(event);
    }

    pub fn history(&self) -> &[BattleEvent] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
