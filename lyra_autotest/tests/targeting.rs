mod support;

use std::time::Duration;

use lyra_autotest::domain::{RemoteValue, Vec3};
use lyra_autotest::use_cases::AimOutcome;
use serde_json::json;
use support::{ScriptedDriver, pawn, session};

#[tokio::test(start_paused = true)]
async fn player_and_enemy_resolve_by_name_and_type() {
    // Two pawns plus a cue actor whose name also mentions a player.
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 0.0, 0.0, 100.0),
        pawn(2, "Bot_3", 800.0, 0.0, 100.0),
        { "id": 3, "name": "GCNL_Player_Spawn", "type": "GCNL_Spawn_C" },
    ]));
    let mut session = session(driver);

    let player = session.find_player().await.expect("player");
    assert_eq!(player.id, 1);

    let enemy = session
        .try_find_enemy(player.id, Duration::from_secs(1))
        .await
        .expect("enemy");
    assert_eq!(enemy.id, 2);
    assert_eq!(enemy.world, Vec3::new(800.0, 0.0, 100.0));
}

#[tokio::test(start_paused = true)]
async fn decoys_are_never_taken_for_the_player() {
    let driver = ScriptedDriver::from_json(json!([
        { "id": 3, "name": "GCNL_Player_Spawn", "type": "GCNL_Spawn_C" },
        { "id": 4, "name": "Player_Respawn", "type": "W_RespawnTimer_C" },
    ]));
    let mut session = session(driver);

    assert!(session.find_player().await.is_none());
    let err = session
        .wait_for_player(Duration::from_secs(1))
        .await
        .expect_err("no player in a scene of decoys");
    assert_eq!(err.stage(), "find_player");
}

#[tokio::test(start_paused = true)]
async fn controller_match_identifies_an_unnamed_pawn() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(7, "Bot_1", 500.0, 0.0, 100.0),
        pawn(8, "Hero", 0.0, 0.0, 100.0),
        { "id": 20, "name": "LyraPlayerController_0", "type": "LyraPlayerController" },
        { "id": 30, "name": "Controller_1", "type": "LyraBotController" },
    ]))
    .on_call("GetController", |_, target, _| match target {
        7 => Some(RemoteValue::Int(30)),
        8 => Some(RemoteValue::Int(20)),
        _ => None,
    });
    let mut session = session(driver);

    let player = session.find_player().await.expect("player");
    assert_eq!(player.id, 8);

    // The bot-controlled pawn is the only opponent.
    let enemy = session
        .try_find_enemy(8, Duration::from_secs(1))
        .await
        .expect("enemy");
    assert_eq!(enemy.id, 7);
    assert!(session.is_bot_controlled(&enemy).await);
}

#[tokio::test(start_paused = true)]
async fn enemy_on_the_other_team_beats_a_closer_teammate() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 0.0, 0.0, 100.0),
        pawn(2, "Ally_1", 200.0, 0.0, 100.0),
        pawn(3, "Bot_3", 3000.0, 0.0, 100.0),
    ]))
    .on_call("GetTeamId", |_, target, _| match target {
        1 | 2 => Some(RemoteValue::Int(0)),
        3 => Some(RemoteValue::Int(1)),
        _ => None,
    });
    let session = session(driver);

    let enemy = session
        .try_find_enemy(1, Duration::from_secs(1))
        .await
        .expect("enemy");
    assert_eq!(enemy.id, 3);
}

#[tokio::test(start_paused = true)]
async fn no_enemy_times_out_quietly() {
    let driver = ScriptedDriver::from_json(json!([pawn(1, "Player_0", 0.0, 0.0, 100.0)]));
    let session = session(driver);

    assert!(session.try_find_enemy(1, Duration::from_secs(2)).await.is_none());
    let err = session
        .find_enemy_for_aim(1, Duration::from_millis(500), Duration::from_secs(2))
        .await
        .expect_err("only the player exists");
    assert_eq!(err.stage(), "find_enemy");
}

#[tokio::test(start_paused = true)]
async fn aiming_falls_back_to_look_input() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 100.0, 100.0, 100.0),
        pawn(2, "Bot_3", 100.0, 1500.0, 100.0),
        { "id": 20, "name": "LyraPlayerController_0", "type": "LyraPlayerController" },
    ]))
    .on_call("GetController", |_, target, _| (target == 1).then_some(RemoteValue::Int(20)))
    // The controller refuses SetControlRotation on every component.
    .on_call("SetControlRotation", |_, _, _| None)
    .on_call("GetControlRotation", |_, _, _| {
        Some(RemoteValue::Str("(Pitch=0.000000,Yaw=0.000000,Roll=0.000000)".into()))
    })
    .on_call("AddYawInput", |_, _, _| Some(RemoteValue::Unit))
    .on_call("AddPitchInput", |_, _, _| Some(RemoteValue::Unit));
    let mut session = session(driver);

    let player = session.entity_by_id(1).await.expect("player");
    let target = session.entity_by_id(2).await.expect("target");
    let outcome = session.aim_exactly_at_target(&player, &target).await;

    assert_eq!(outcome, AimOutcome::LookInput);
    assert_eq!(session.driver().calls_to("AddYawInput"), 1);
    // Every SetControlRotation candidate was tried before falling back.
    assert_eq!(session.driver().attempts_of("SetControlRotation"), 6);
    assert_eq!(session.driver().calls_to("SetControlRotation"), 0);
}

// Player, enemy and controller, with every aim strategy answering.
fn aim_scene(with_subsystem: bool) -> ScriptedDriver {
    let mut fixture = vec![
        pawn(1, "Player_0", 100.0, 100.0, 100.0),
        pawn(2, "Bot_3", 100.0, 1500.0, 100.0),
        json!({ "id": 20, "name": "LyraPlayerController_0", "type": "LyraPlayerController" }),
    ];
    if with_subsystem {
        fixture.push(json!({ "id": 50, "name": "LyraTestSupportSubsystem_0", "type": "LyraTestSupportSubsystem" }));
    }
    ScriptedDriver::from_json(serde_json::Value::Array(fixture))
        .on_call("GetController", |_, target, _| (target == 1).then_some(RemoteValue::Int(20)))
        .on_call("SetLocalPlayerLookAtWorldPosition", |_, target, _| {
            (target == 50).then_some(RemoteValue::Unit)
        })
        .on_call("SetControlRotation", |_, _, _| Some(RemoteValue::Unit))
        .on_call("GetControlRotation", |_, _, _| {
            Some(RemoteValue::Str("(Pitch=0.000000,Yaw=0.000000,Roll=0.000000)".into()))
        })
        .on_call("AddYawInput", |_, _, _| Some(RemoteValue::Unit))
        .on_call("AddPitchInput", |_, _, _| Some(RemoteValue::Unit))
}

#[tokio::test(start_paused = true)]
async fn subsystem_look_at_takes_the_aim_first() {
    let mut session = session(aim_scene(true));

    let player = session.entity_by_id(1).await.expect("player");
    let target = session.entity_by_id(2).await.expect("target");
    let outcome = session.aim_exactly_at_target(&player, &target).await;

    assert_eq!(outcome, AimOutcome::Subsystem);
    let driver = session.driver();
    assert_eq!(driver.calls_to("SetLocalPlayerLookAtWorldPosition"), 1);
    assert_eq!(driver.attempts_of("SetControlRotation"), 0);
    assert_eq!(driver.attempts_of("AddYawInput"), 0);
}

#[tokio::test(start_paused = true)]
async fn control_rotation_wins_over_look_input() {
    let mut session = session(aim_scene(false));

    let player = session.entity_by_id(1).await.expect("player");
    let target = session.entity_by_id(2).await.expect("target");
    let outcome = session.aim_exactly_at_target(&player, &target).await;

    assert_eq!(outcome, AimOutcome::ControlRotation);
    let driver = session.driver();
    assert_eq!(driver.calls_to("SetControlRotation"), 1);
    assert_eq!(driver.attempts_of("GetControlRotation"), 0);
    assert_eq!(driver.attempts_of("AddYawInput"), 0);
}

#[tokio::test(start_paused = true)]
async fn is_player_controlled_identifies_a_pawn_the_name_rule_would_miss() {
    // The unnamed pawn is listed first and answers IsPlayerControlled.
    let driver = ScriptedDriver::from_json(json!([
        pawn(5, "Hero", 0.0, 0.0, 100.0),
        pawn(1, "Player_0", 400.0, 0.0, 100.0),
    ]))
    .on_call("IsPlayerControlled", |_, target, _| Some(RemoteValue::Bool(target == 5)));
    let mut session = session(driver);

    let player = session.find_player().await.expect("player");
    assert_eq!(player.id, 5);
}

#[tokio::test(start_paused = true)]
async fn is_player_controlled_false_still_leaves_the_name_rule() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(5, "Hero", 0.0, 0.0, 100.0),
        pawn(1, "Player_0", 400.0, 0.0, 100.0),
    ]))
    .on_call("IsPlayerControlled", |_, _, _| Some(RemoteValue::Bool(false)));
    let mut session = session(driver);

    let player = session.find_player().await.expect("player");
    assert_eq!(player.id, 1);
}

// Two unnamed pawns and a controller: no candidate rule can pick either, so
// only the controller and engine fallbacks can name the player.
fn fallback_scene() -> ScriptedDriver {
    ScriptedDriver::from_json(json!([
        pawn(8, "Hero_A", 0.0, 0.0, 100.0),
        pawn(9, "Hero_B", 800.0, 0.0, 100.0),
        { "id": 20, "name": "LyraPlayerController_0", "type": "LyraPlayerController" },
    ]))
}

#[tokio::test(start_paused = true)]
async fn controller_pawn_comes_before_the_static_fallbacks() {
    let driver = fallback_scene()
        .on_call("GetPawn", |_, target, _| (target == 20).then_some(RemoteValue::Int(8)))
        .on_static("GetPlayerPawn", |_, _, _| Some(RemoteValue::Int(9)))
        .on_static("GetLocalPlayerPawnId", |_, _, _| Some(RemoteValue::Int(9)));
    let mut session = session(driver);

    let player = session.find_player().await.expect("player");
    assert_eq!(player.id, 8);
    assert_eq!(session.driver().attempts_of("GetPlayerPawn"), 0);
}

#[tokio::test(start_paused = true)]
async fn gameplay_statics_answers_when_the_controller_has_no_pawn() {
    let driver = fallback_scene()
        .on_static("GetPlayerPawn", |_, _, _| Some(RemoteValue::Int(9)))
        .on_static("GetLocalPlayerPawnId", |_, _, _| Some(RemoteValue::Int(8)));
    let mut session = session(driver);

    let player = session.find_player().await.expect("player");
    assert_eq!(player.id, 9);
    assert!(session.driver().attempts_of("GetPawn") > 0);
    assert_eq!(session.driver().attempts_of("GetLocalPlayerPawnId"), 0);
}

#[tokio::test(start_paused = true)]
async fn engine_query_is_the_last_resort() {
    let driver = fallback_scene()
        // A zero id means "no pawn" and moves on to the next rule.
        .on_static("GetPlayerPawn", |_, _, _| Some(RemoteValue::Int(0)))
        .on_static("GetLocalPlayerPawnId", |_, _, _| Some(RemoteValue::Int(8)));
    let mut session = session(driver);

    let player = session.find_player().await.expect("player");
    assert_eq!(player.id, 8);
    assert!(session.driver().attempts_of("GetPawn") > 0);
    assert!(session.driver().attempts_of("GetPlayerPawn") > 0);
}

#[tokio::test(start_paused = true)]
async fn fallback_that_returns_a_decoy_is_rejected() {
    let driver = ScriptedDriver::from_json(json!([
        { "id": 20, "name": "LyraPlayerController_0", "type": "LyraPlayerController" },
        { "id": 30, "name": "GCNL_Player_Spawn", "type": "GCNL_Spawn_C" },
    ]))
    .on_call("GetPawn", |_, target, _| (target == 20).then_some(RemoteValue::Int(30)));
    let mut session = session(driver);

    assert!(session.find_player().await.is_none());
    assert!(session.driver().calls_to("GetPawn") > 0);
}

#[tokio::test(start_paused = true)]
async fn aiming_at_yourself_is_skipped() {
    let driver = ScriptedDriver::from_json(json!([pawn(1, "Player_0", 100.0, 100.0, 100.0)]));
    let mut session = session(driver);

    let player = session.entity_by_id(1).await.expect("player");
    let outcome = session.aim_exactly_at_target(&player, &player).await;
    assert_eq!(outcome, AimOutcome::Skipped("same object"));
}
