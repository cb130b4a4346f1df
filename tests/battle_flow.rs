//! Turn controller integration tests

use std::sync::{Arc, Mutex};

use battle_stage::battle::*;
use battle_stage::core::{BattleError, BattleSettings, UnitId};
use battle_stage::steps::HeadlessScene;
use serde_json::{json, Value};
use tokio::sync::mpsc;

fn unit(id: &str, row: u8, hp: u32, speed: u32, luck: u32, attack: u32) -> Value {
    json!({
        "id": id,
        "name": id,
        "position": {"row": row, "col": 0},
        "stats": {"hp": hp, "speed": speed, "luck": luck, "attack": attack, "defense": 0}
    })
}

fn config(players: Vec<Value>, enemies: Vec<Value>) -> BattleConfig {
    serde_json::from_value(json!({"player_units": players, "enemy_units": enemies})).unwrap()
}

fn settings() -> BattleSettings {
    BattleSettings {
        action_delay_ms: 0,
        rng_seed: Some(11),
        ..Default::default()
    }
}

fn flow_with(catalogs: Catalogs) -> BattleFlow {
    BattleFlow::new(settings(), catalogs, Arc::new(HeadlessScene::new())).unwrap()
}

fn started_actors(flow: &BattleFlow, turn: u32) -> Vec<UnitId> {
    flow.events()
        .history()
        .iter()
        .filter(|e| e.turn == turn)
        .filter_map(|e| match &e.event_type {
            BattleEventType::ActionStarted { unit_id, .. } => Some(unit_id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_faster_unit_acts_first() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 100, 20, 5, 3)],
        vec![unit("E1", 0, 100, 10, 5, 3)],
    ))
    .unwrap();

    flow.submit_action(BattleAction::attack("U1".into(), "E1".into()))
        .await
        .unwrap();

    let order: Vec<&str> = flow
        .queue()
        .items()
        .iter()
        .map(|item| item.action.actor_id.as_str())
        .collect();
    assert_eq!(order, vec!["U1", "E1"]);
    assert_eq!(started_actors(&flow, 1), vec![UnitId::new("U1"), UnitId::new("E1")]);

    // Neither side fell: next round
    assert_eq!(flow.phase(), BattlePhase::Command);
    assert_eq!(flow.state().turn, 2);
    assert_eq!(flow.scene().unit(&"U1".into()).unwrap().stats.hp, 97);
    assert_eq!(flow.scene().unit(&"E1".into()).unwrap().stats.hp, 97);
}

#[tokio::test(start_paused = true)]
async fn test_killing_last_enemy_wins() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 100, 20, 5, 30)],
        vec![unit("E1", 0, 20, 10, 5, 3)],
    ))
    .unwrap();

    flow.submit_action(BattleAction::attack("U1".into(), "E1".into()))
        .await
        .unwrap();

    assert_eq!(flow.scene().check_battle_end(), Some(Side::Player));
    assert_eq!(flow.state().result, Some(BattleResult::Win));
    assert_eq!(flow.phase(), BattlePhase::Result);
    assert!(!flow.is_timer_armed());
    // E1 died before its turn
    assert_eq!(started_actors(&flow, 1), vec![UnitId::new("U1")]);
    assert_eq!(flow.scene().unit(&"U1".into()).unwrap().stats.hp, 100);

    let late = flow
        .submit_action(BattleAction::defend("U1".into()))
        .await
        .unwrap_err();
    assert!(matches!(late, BattleError::InvalidPhase { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_fallen_enemy_loses_its_turn_and_round_continues() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 100, 20, 0, 30)],
        vec![unit("E1", 0, 20, 15, 0, 3), unit("E2", 1, 100, 10, 0, 3)],
    ))
    .unwrap();

    flow.submit_action(BattleAction::attack("U1".into(), "E1".into()))
        .await
        .unwrap();

    // E1 was queued ahead of E2 but fell before acting
    assert_eq!(started_actors(&flow, 1), vec![UnitId::new("U1"), UnitId::new("E2")]);
    assert!(flow
        .queue()
        .items()
        .iter()
        .all(|item| item.action.actor_id != UnitId::new("E1")));
    let died: Vec<UnitId> = flow
        .events()
        .history()
        .iter()
        .filter_map(|e| match &e.event_type {
            BattleEventType::UnitDied { unit_id } => Some(unit_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(died, vec![UnitId::new("E1")]);

    assert_eq!(flow.state().result, None);
    assert_eq!(flow.phase(), BattlePhase::Command);
    assert_eq!(flow.state().turn, 2);
    assert_eq!(flow.scene().unit(&"U1".into()).unwrap().stats.hp, 97);
    assert_eq!(flow.current_actor(), Some(&UnitId::new("U1")));
}

/// Enemy that always casts a skill the catalog does not know
struct UnknownSkillCaster;

impl EnemyStrategy for UnknownSkillCaster {
    fn choose_action(&mut self, actor: &Unit, scene: &BattleScene) -> Option<BattleAction> {
        let target = scene.alive_player_units().first()?.id.clone();
        Some(BattleAction::skill(actor.id.clone(), "meteor", vec![target]))
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_action_does_not_stall_the_round() {
    let mut flow = flow_with(Catalogs::new()).with_strategy(UnknownSkillCaster);
    flow.start_battle(&config(
        vec![unit("U1", 0, 100, 5, 0, 3)],
        vec![unit("E1", 0, 100, 20, 0, 3)],
    ))
    .unwrap();

    flow.submit_action(BattleAction::attack("U1".into(), "E1".into()))
        .await
        .unwrap();

    let failed = flow.events().history().iter().any(|e| {
        matches!(&e.event_type, BattleEventType::ActionResolved { outcome, .. } if outcome == "failed")
    });
    assert!(failed);
    assert_eq!(started_actors(&flow, 1), vec![UnitId::new("E1"), UnitId::new("U1")]);
    assert_eq!(flow.scene().unit(&"U1".into()).unwrap().stats.hp, 100);
    assert_eq!(flow.scene().unit(&"E1".into()).unwrap().stats.hp, 97);

    assert_eq!(flow.phase(), BattlePhase::Command);
    assert_eq!(flow.state().turn, 2);
    assert!(flow.is_timer_armed());

    // The next round still accepts commands and resolves
    flow.submit_action(BattleAction::defend("U1".into()))
        .await
        .unwrap();
    assert_eq!(flow.state().turn, 3);
}

#[test]
fn test_focus_without_target_rejected_when_catalog_loads() {
    let json = r#"{
        "skills": {
            "glare": {
                "id": "glare",
                "name": "Glare",
                "steps": [{"type": "camera", "params": {"action": "focus"}}]
            }
        }
    }"#;
    let err = Catalogs::from_json(json).unwrap_err();
    assert!(matches!(err, BattleError::InvalidStepParams { .. }));
    assert!(err.is_config_error());
}

#[tokio::test(start_paused = true)]
async fn test_result_phase_is_terminal() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 100, 20, 5, 30)],
        vec![unit("E1", 0, 20, 10, 5, 3)],
    ))
    .unwrap();
    flow.submit_action(BattleAction::attack("U1".into(), "E1".into()))
        .await
        .unwrap();
    assert_eq!(flow.phase(), BattlePhase::Result);

    for _ in 0..120 {
        flow.on_timer_tick().await.unwrap();
    }
    let err = flow.start_battle(&config(
        vec![unit("U1", 0, 100, 20, 5, 30)],
        vec![unit("E1", 0, 20, 10, 5, 3)],
    ));
    assert!(matches!(err, Err(BattleError::InvalidPhase { .. })));

    assert_eq!(flow.phase(), BattlePhase::Result);
    assert_eq!(flow.state().result, Some(BattleResult::Win));
    assert!(!flow.is_timer_armed());
    assert_eq!(flow.state().turn, 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_auto_defends_remaining_units() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![
            unit("U1", 0, 100, 5, 0, 2),
            unit("U2", 1, 100, 5, 0, 2),
            unit("U3", 2, 100, 5, 0, 2),
        ],
        vec![unit("E1", 0, 500, 5, 0, 2)],
    ))
    .unwrap();

    flow.submit_action(BattleAction::attack("U1".into(), "E1".into()))
        .await
        .unwrap();
    flow.submit_action(BattleAction::attack("U2".into(), "E1".into()))
        .await
        .unwrap();
    assert_eq!(flow.current_actor(), Some(&UnitId::new("U3")));

    for _ in 0..59 {
        flow.on_timer_tick().await.unwrap();
    }
    assert_eq!(flow.phase(), BattlePhase::Command);
    assert_eq!(flow.state().command_timer, 1);

    flow.on_timer_tick().await.unwrap();

    let timeout = flow
        .events()
        .history()
        .iter()
        .find_map(|e| match &e.event_type {
            BattleEventType::CommandTimeout { auto_defended } => Some(auto_defended.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(timeout, vec![UnitId::new("U3")]);

    let defended = flow.queue().items().iter().any(|item| {
        item.action.actor_id == UnitId::new("U3") && item.action.kind == ActionKind::Defend
    });
    assert!(defended);
    // 3 player actions + 1 enemy action
    assert_eq!(started_actors(&flow, 1).len(), 4);

    assert_eq!(flow.phase(), BattlePhase::Command);
    assert_eq!(flow.state().turn, 2);
    assert_eq!(flow.state().command_timer, 60);
    assert!(flow.is_timer_armed());
}

#[tokio::test(start_paused = true)]
async fn test_turn_increments_by_one() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 1000, 5, 0, 1)],
        vec![unit("E1", 0, 1000, 5, 0, 1)],
    ))
    .unwrap();

    for expected in 1..=5 {
        assert_eq!(flow.state().turn, expected);
        flow.submit_action(BattleAction::defend("U1".into()))
            .await
            .unwrap();
        assert_eq!(flow.state().turn, expected + 1);
        assert_eq!(flow.phase(), BattlePhase::Command);
        // Defend stance does not carry into the new round
        assert!(!flow.scene().unit(&"U1".into()).unwrap().is_defending);
    }
}

#[tokio::test(start_paused = true)]
async fn test_summon_at_cap_is_rejected() {
    let wolf: UnitConfig = serde_json::from_value(json!({
        "id": "wolf",
        "name": "Wolf",
        "position": 0,
        "stats": {"hp": 10, "speed": 1, "attack": 1}
    }))
    .unwrap();
    let mut flow = flow_with(Catalogs::new().with_summon("wolf", wolf));

    let players = (0..6u8)
        .map(|slot| {
            json!({
                "id": format!("U{}", slot + 1),
                "name": "P",
                "position": slot,
                "stats": {"hp": 100, "speed": 10 + slot as u32, "attack": 1}
            })
        })
        .collect();
    flow.start_battle(&config(players, vec![unit("E1", 0, 500, 1, 0, 1)]))
        .unwrap();

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    flow.executor_mut().on_action_end(move |action, outcome| {
        if action.kind == ActionKind::Summon {
            sink.lock().unwrap().push(outcome.clone());
        }
    });

    let first = flow.current_actor().cloned().unwrap();
    flow.submit_action(BattleAction::summon(first, "wolf"))
        .await
        .unwrap();
    while let Some(actor) = flow.current_actor().cloned() {
        if flow.state().turn > 1 {
            break;
        }
        flow.submit_action(BattleAction::defend(actor)).await.unwrap();
    }

    assert_eq!(
        outcomes.lock().unwrap().as_slice(),
        &[ActionOutcome::Rejected(RejectReason::RosterFull)]
    );
    assert_eq!(flow.scene().player_units().len(), 6);
    assert_eq!(flow.phase(), BattlePhase::Command);
}

#[tokio::test(start_paused = true)]
async fn test_summon_fills_free_slot() {
    let wolf: UnitConfig = serde_json::from_value(json!({
        "id": "wolf",
        "name": "Wolf",
        "position": 0,
        "stats": {"hp": 10, "speed": 1, "attack": 1}
    }))
    .unwrap();
    let mut flow = flow_with(Catalogs::new().with_summon("wolf", wolf));
    flow.start_battle(&config(
        vec![unit("U1", 0, 100, 5, 0, 1)],
        vec![unit("E1", 0, 500, 1, 0, 1)],
    ))
    .unwrap();

    flow.submit_action(BattleAction::summon("U1".into(), "wolf"))
        .await
        .unwrap();

    let summoned = flow.scene().unit(&"wolf#1".into()).unwrap();
    assert!(summoned.is_player);
    assert_eq!(summoned.position, GridPosition::new(0, 1));
    assert_eq!(flow.scene().player_units().len(), 2);
    // The summon joins the next command phase
    assert_eq!(flow.current_actor(), Some(&UnitId::new("U1")));
}

#[test]
fn test_bad_config_leaves_flow_in_init() {
    let mut flow = flow_with(Catalogs::new());
    let err = flow
        .start_battle(&config(vec![unit("U1", 0, 10, 1, 0, 1)], Vec::new()))
        .unwrap_err();

    assert!(err.is_config_error());
    assert_eq!(flow.phase(), BattlePhase::Init);
    assert_eq!(flow.state().turn, 0);
    assert!(!flow.is_timer_armed());
    assert_eq!(flow.scene().units().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_after_result() {
    let mut flow = flow_with(Catalogs::new());
    let duel = config(
        vec![unit("U1", 0, 100, 20, 5, 30)],
        vec![unit("E1", 0, 20, 10, 5, 3)],
    );
    flow.start_battle(&duel).unwrap();
    flow.submit_action(BattleAction::attack("U1".into(), "E1".into()))
        .await
        .unwrap();
    assert_eq!(flow.phase(), BattlePhase::Result);

    flow.reset_battle();
    assert_eq!(flow.phase(), BattlePhase::Init);
    assert_eq!(flow.state().result, None);
    assert!(!flow.is_timer_armed());

    // A fresh battle can start after reset
    flow.start_battle(&duel).unwrap();
    assert_eq!(flow.phase(), BattlePhase::Command);
}

#[tokio::test(start_paused = true)]
async fn test_drive_plays_to_victory() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 100, 20, 5, 10)],
        vec![unit("E1", 0, 25, 10, 5, 3)],
    ))
    .unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    // Wrong actor first: logged and ignored
    tx.send(BattleCommand::Submit(BattleAction::defend("E1".into())))
        .await
        .unwrap();
    for _ in 0..3 {
        tx.send(BattleCommand::Submit(BattleAction::attack(
            "U1".into(),
            "E1".into(),
        )))
        .await
        .unwrap();
    }

    let result = flow.drive(&mut rx).await.unwrap();
    assert_eq!(result, Some(BattleResult::Win));
    assert_eq!(flow.state().turn, 3);
    assert!(!flow.is_timer_armed());
}

#[tokio::test(start_paused = true)]
async fn test_drive_times_out_idle_players() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 10, 9, 0, 1)],
        vec![unit("E1", 0, 100, 5, 0, 6)],
    ))
    .unwrap();

    // Keep the sender alive so only the countdown moves the battle
    let (_tx, mut rx) = mpsc::channel::<BattleCommand>(1);
    let result = flow.drive(&mut rx).await.unwrap();

    // U1 is faster, so it defends before each hit: 3 damage a round
    assert_eq!(result, Some(BattleResult::Lose));
    assert_eq!(flow.state().turn, 4);
    let timeouts = flow
        .events()
        .history()
        .iter()
        .filter(|e| matches!(e.event_type, BattleEventType::CommandTimeout { .. }))
        .count();
    assert_eq!(timeouts, 4);
}

#[tokio::test(start_paused = true)]
async fn test_drive_reset_returns_to_init() {
    let mut flow = flow_with(Catalogs::new());
    flow.start_battle(&config(
        vec![unit("U1", 0, 10, 1, 0, 1)],
        vec![unit("E1", 0, 100, 5, 0, 1)],
    ))
    .unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    tx.send(BattleCommand::Reset).await.unwrap();

    assert_eq!(flow.drive(&mut rx).await.unwrap(), None);
    assert_eq!(flow.phase(), BattlePhase::Init);
    assert!(!flow.is_timer_armed());
}
