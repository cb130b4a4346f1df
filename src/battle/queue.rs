//! Round action queue
//!
//! Actions are collected with a snapshot of the actor's stats, sorted once
//! by priority, then drained through a cursor.

use serde::{Deserialize, Serialize};

use crate::battle::action::BattleAction;
use crate::battle::unit::UnitStats;
use crate::core::types::UnitId;

/// A queued action plus the actor's stats at submission time.
///
/// Ordering uses the snapshot, so stat changes during resolution never
/// reorder the rest of the round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionQueueItem {
    pub action: BattleAction,
    pub actor_stats: UnitStats,
}

impl ActionQueueItem {
    pub fn priority(&self) -> u32 {
        self.actor_stats.priority()
    }
}

/// Sort items by descending `speed + luck`.
///
/// Stable: items with equal priority keep their submission order. The input
/// slice is left as is.
pub fn sort_action_queue(items: &[ActionQueueItem]) -> Vec<ActionQueueItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));
    sorted
}

#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    items: Vec<ActionQueueItem>,
    cursor: usize,
    executing: bool,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, action: BattleAction, actor_stats: UnitStats) {
        self.items.push(ActionQueueItem {
            action,
            actor_stats,
        });
    }

    /// Put the queue in execution order
    pub fn sort(&mut self) {
        self.items = sort_action_queue(&self.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn items(&self) -> &[ActionQueueItem] {
        &self.items
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.items.len()
    }

    pub fn current(&self) -> Option<&ActionQueueItem> {
        self.items.get(self.cursor)
    }

    /// Return the current item and move the cursor past it.
    pub fn advance(&mut self) -> Option<ActionQueueItem> {
        let item = self.items.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(item)
    }

    /// Items not yet handed out by `advance`
    pub fn remaining_actions(&self) -> &[ActionQueueItem] {
        &self.items[self.cursor.min(self.items.len())..]
    }

    /// Remove every item of the actor, wherever it sits, and clamp the
    /// cursor to the new length.
    pub fn remove_actor_actions(&mut self, actor_id: &UnitId) {
        self.items.retain(|item| &item.action.actor_id != actor_id);
        if self.cursor > self.items.len() {
            self.cursor = self.items.len();
        }
    }

    /// Remove only the actor's items that have not been handed out yet.
    ///
    /// Already-advanced items stay in place, so the cursor keeps pointing at
    /// the same next item.
    pub fn remove_pending_actions(&mut self, actor_id: &UnitId) -> usize {
        let cursor = self.cursor.min(self.items.len());
        let pending = self.items.split_off(cursor);
        let before = pending.len();
        self.items
            .extend(pending.into_iter().filter(|item| &item.action.actor_id != actor_id));
        before - (self.items.len() - cursor)
    }

    pub fn set_executing(&mut self, executing: bool) {
        self.executing = executing;
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    /// Empty the queue, rewind the cursor, stop executing
    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = 0;
        self.executing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(speed: u32, luck: u32) -> UnitStats {
        UnitStats {
            hp: 10,
            max_hp: 10,
            speed,
            luck,
            ..Default::default()
        }
    }

    fn queue_of(entries: &[(&str, u32)]) -> ActionQueue {
        let mut queue = ActionQueue::new();
        for (id, speed) in entries {
            queue.add_action(BattleAction::defend(UnitId::new(*id)), stats(*speed, 0));
        }
        queue
    }

    fn actor_ids(items: &[ActionQueueItem]) -> Vec<&str> {
        items.iter().map(|i| i.action.actor_id.as_str()).collect()
    }

    #[test]
    fn test_sort_descending_and_stable() {
        let mut queue = queue_of(&[("a", 10), ("b", 30), ("c", 10), ("d", 30)]);
        queue.sort();
        assert_eq!(actor_ids(queue.items()), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_sort_uses_luck() {
        let mut queue = ActionQueue::new();
        queue.add_action(BattleAction::defend(UnitId::new("slow")), stats(10, 20));
        queue.add_action(BattleAction::defend(UnitId::new("fast")), stats(25, 0));
        queue.sort();
        assert_eq!(actor_ids(queue.items()), vec!["slow", "fast"]);
    }

    #[test]
    fn test_advance_until_exhausted() {
        let mut queue = queue_of(&[("a", 1), ("b", 2)]);
        queue.sort();
        assert_eq!(queue.advance().unwrap().action.actor_id.as_str(), "b");
        assert!(queue.has_next());
        assert_eq!(queue.advance().unwrap().action.actor_id.as_str(), "a");
        assert!(!queue.has_next());
        assert!(queue.advance().is_none());
        assert!(queue.advance().is_none());
    }

    #[test]
    fn test_remove_actor_clamps_cursor() {
        let mut queue = queue_of(&[("U1", 3), ("U2", 2), ("U3", 1)]);
        queue.advance();
        queue.advance();
        assert_eq!(queue.cursor(), 2);

        queue.remove_actor_actions(&UnitId::new("U2"));
        assert_eq!(actor_ids(queue.items()), vec!["U1", "U3"]);
        assert_eq!(queue.cursor(), 2);
    }

    #[test]
    fn test_remove_pending_keeps_history() {
        let mut queue = queue_of(&[("U1", 3), ("U2", 2), ("U3", 1), ("U2", 0)]);
        queue.advance();
        queue.advance();

        // U2's first action already ran, only the queued one goes
        let removed = queue.remove_pending_actions(&UnitId::new("U2"));
        assert_eq!(removed, 1);
        assert_eq!(actor_ids(queue.items()), vec!["U1", "U2", "U3"]);
        assert_eq!(queue.current().unwrap().action.actor_id.as_str(), "U3");
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut queue = queue_of(&[("a", 1)]);
        queue.advance();
        queue.set_executing(true);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), 0);
        assert!(!queue.is_executing());
        assert!(queue.remaining_actions().is_empty());
    }
}
