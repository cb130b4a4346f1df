//! Enemy command selection
//!
//! Architecture: trait + default implementation
//! - EnemyStrategy trait defines the interface for swappable behaviour
//! - RandomTargetStrategy attacks a uniformly random living opponent
//!
//! Strategies only read the scene; the turn controller enqueues whatever
//! they return.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::battle::action::BattleAction;
use crate::battle::scene::BattleScene;
use crate::battle::unit::Unit;

/// Trait for enemy AI implementations
pub trait EnemyStrategy: Send {
    /// Pick one action for `actor`; `None` leaves the unit idle this round.
    fn choose_action(&mut self, actor: &Unit, scene: &BattleScene) -> Option<BattleAction>;
}

/// Default strategy: attack a uniformly random living opponent
#[derive(Debug, Clone)]
pub struct RandomTargetStrategy {
    rng: ChaCha8Rng,
}

impl RandomTargetStrategy {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }
}

impl EnemyStrategy for RandomTargetStrategy {
    fn choose_action(&mut self, actor: &Unit, scene: &BattleScene) -> Option<BattleAction> {
        let opponents = scene.opponents_of(&actor.id);
        let target = opponents.choose(&mut self.rng)?;
        Some(BattleAction::attack(actor.id.clone(), target.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::action::ActionKind;
    use crate::battle::config::BattleConfig;

    fn scene() -> BattleScene {
        let config = BattleConfig::from_json(
            r#"{
                "player_units": [
                    {"id": "U1", "name": "A", "position": 0, "stats": {"hp": 10, "speed": 1, "attack": 1}},
                    {"id": "U2", "name": "B", "position": 2, "stats": {"hp": 10, "speed": 1, "attack": 1}}
                ],
                "enemy_units": [
                    {"id": "E1", "name": "C", "position": 0, "stats": {"hp": 10, "speed": 1, "attack": 1}}
                ]
            }"#,
        )
        .unwrap();
        let mut scene = BattleScene::new(600.0, 6);
        scene.load_battle_config(&config).unwrap();
        scene
    }

    #[test]
    fn test_targets_living_player() {
        let mut scene = scene();
        scene.unit_mut(&"U1".into()).unwrap().apply_damage(100);

        let enemy = scene.unit(&"E1".into()).unwrap().clone();
        let mut strategy = RandomTargetStrategy::new(Some(7));
        for _ in 0..20 {
            let action = strategy.choose_action(&enemy, &scene).unwrap();
            assert_eq!(action.kind, ActionKind::Attack);
            assert_eq!(action.target_ids, vec!["U2".into()]);
        }
    }

    #[test]
    fn test_seeded_choice_is_deterministic() {
        let scene = scene();
        let enemy = scene.unit(&"E1".into()).unwrap().clone();
        let picks = |seed| {
            let mut strategy = RandomTargetStrategy::new(Some(seed));
            (0..10)
                .map(|_| strategy.choose_action(&enemy, &scene).unwrap().target_ids)
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }

    #[test]
    fn test_no_opponents_means_no_action() {
        let mut scene = scene();
        for id in ["U1", "U2"] {
            scene.unit_mut(&id.into()).unwrap().apply_damage(100);
        }
        let enemy = scene.unit(&"E1".into()).unwrap().clone();
        assert!(RandomTargetStrategy::new(Some(1)).choose_action(&enemy, &scene).is_none());
    }
}
