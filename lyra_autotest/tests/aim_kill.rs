mod support;

use lyra_autotest::domain::engagement::TargetingMode;
use lyra_autotest::domain::parse::parse_vector;
use lyra_autotest::domain::{CallArg, Key, KillFailure, RemoteValue, ScenarioError, Vec3};
use serde_json::json;
use support::{Input, ScriptedDriver, World, pawn, session, session_with};

// Teleport by the first vector string argument, the way the location setters take it.
fn teleport(world: &mut World, target: i64, args: &[CallArg]) -> Option<RemoteValue> {
    let Some(CallArg::Str(raw)) = args.first() else {
        return None;
    };
    let point = parse_vector(raw)?;
    let entity = world.entities.iter_mut().find(|e| e.id == target)?;
    entity.world = point;
    Some(RemoteValue::Unit)
}

// A shot always lands on the first bot still in the world.
fn kill_first_bot(world: &mut World) {
    if let Some(id) = world
        .entities
        .iter()
        .find(|e| e.name.starts_with("Bot_"))
        .map(|e| e.id)
    {
        world.remove(id);
    }
}

fn with_screen(mut value: serde_json::Value, x: f32, y: f32) -> serde_json::Value {
    value["x"] = json!(x);
    value["y"] = json!(y);
    value
}

fn mouse_presses(world: &World) -> usize {
    world
        .inputs
        .iter()
        .filter(|i| matches!(i, Input::Press(Key::Mouse0)))
        .count()
}

#[tokio::test(start_paused = true)]
async fn pawn_tracked_kill_is_confirmed_when_the_enemy_disappears() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 0.0, 0.0, 100.0),
        with_screen(pawn(2, "Bot_3", 500.0, 0.0, 100.0), 960.0, 540.0),
    ]))
    .on_call("K2_SetActorLocation", |world, target, call| teleport(world, target, &call.args))
    .on_key(Key::Mouse0, kill_first_bot);
    let mut session = session(driver);

    let report = session.engage_until_kill().await.expect("kill");

    assert_eq!(report.mode, TargetingMode::PawnTracked { player_id: 1 });
    assert_eq!(report.kills, 1);
    assert_eq!(report.fired, 1);
    assert_eq!(session.driver().presses(Key::Mouse0), 1);

    // The player was moved onto the enemy before shooting.
    let world = session.driver().world();
    assert_eq!(world.entity(1).map(|p| p.world), Some(Vec3::new(500.0, 0.0, 100.0)));
    assert!(world.entity(2).is_none());
}

#[tokio::test(start_paused = true)]
async fn pawn_tracked_run_retargets_until_enough_kills() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 0.0, 0.0, 100.0),
        with_screen(pawn(2, "Bot_3", 500.0, 0.0, 100.0), 960.0, 540.0),
        with_screen(pawn(3, "Bot_4", -700.0, 200.0, 100.0), 400.0, 500.0),
    ]))
    .on_key(Key::Mouse0, kill_first_bot);
    let mut session = session_with(driver, &[("ALTTESTER_KILL_KILLS_REQUIRED", "2")]);

    let report = session.engage_until_kill().await.expect("two kills");

    assert_eq!(report.kills, 2);
    assert_eq!(report.fired, 2);
    assert!(session.driver().world().entities.iter().all(|e| !e.name.starts_with("Bot_")));
}

#[tokio::test(start_paused = true)]
async fn last_enemy_dying_early_still_passes() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 0.0, 0.0, 100.0),
        with_screen(pawn(2, "Bot_3", 500.0, 0.0, 100.0), 960.0, 540.0),
    ]))
    .on_key(Key::Mouse0, kill_first_bot);
    let mut session = session_with(driver, &[("ALTTESTER_KILL_KILLS_REQUIRED", "3")]);

    let report = session.engage_until_kill().await.expect("no further target ends the run");
    assert_eq!(report.kills, 1);
}

// Engine positions for a scene without reachable pawns: the player plus
// `enemies` bots lined up on the x axis.
fn positions(enemies: usize) -> RemoteValue {
    let mut raw = String::from("P,0,0,100");
    for i in 0..enemies {
        raw.push_str(&format!("|E,{},0,100", 500 * (i + 1)));
    }
    RemoteValue::Str(raw)
}

fn controller_only_scene() -> ScriptedDriver {
    ScriptedDriver::from_json(json!([
        { "id": 20, "name": "LyraPlayerController_0", "type": "LyraPlayerController" },
    ]))
}

#[tokio::test(start_paused = true)]
async fn controller_only_kill_needs_a_sustained_count_drop() {
    // The combined query aims and fires in-engine; the count drops for good
    // after the second shot.
    let driver = controller_only_scene()
        .on_static("GetEnemyOnlyTestPositionsAsString", |_, _, _| Some(positions(2)))
        .on_static("GetEnemyOnlyPositionsAndAimAt", |world, _, _| {
            let previous = world
                .calls
                .iter()
                .filter(|c| c.ends_with(".GetEnemyOnlyPositionsAndAimAt"))
                .count();
            Some(positions(if previous < 2 { 2 } else { 1 }))
        });
    let mut session = session(driver);

    let report = session.engage_until_kill().await.expect("kill");

    assert_eq!(
        report.mode,
        TargetingMode::ControllerOnly {
            world_id: 20,
            continuous_fire: false,
        }
    );
    assert_eq!(report.kills, 1);
    // Two polls at the starting count, then two consecutive lower polls.
    assert_eq!(report.fired, 4);
    assert_eq!(session.driver().presses(Key::Mouse0), 0);
}

#[tokio::test(start_paused = true)]
async fn controller_only_brief_dip_times_out() {
    // Only the poll right after the first shot sees one enemy fewer.
    let driver = controller_only_scene().on_static("GetEnemyOnlyTestPositionsAsString", |world, _, _| {
        Some(positions(if mouse_presses(world) == 1 { 1 } else { 2 }))
    });
    let mut session = session_with(driver, &[("ALTTESTER_KILL_TIMEOUT_SECS", "5")]);

    let err = session.engage_until_kill().await.expect_err("dip is not a kill");

    match err {
        ScenarioError::KillNotConfirmed { timeout_secs, failure } => {
            assert_eq!(timeout_secs, 5);
            assert_eq!(failure, KillFailure::CountNeverDropped { initial_count: 2 });
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(session.driver().presses(Key::Mouse0) > 2);
}

#[tokio::test(start_paused = true)]
async fn nothing_to_shoot_fails_acquisition() {
    let driver = ScriptedDriver::from_json(json!([pawn(1, "Player_0", 0.0, 0.0, 100.0)]));
    let mut session = session_with(
        driver,
        &[
            ("ALTTESTER_KILL_ENEMY_ATTEMPTS", "1"),
            ("ALTTESTER_KILL_ENEMY_TIMEOUT_SECS", "1"),
        ],
    );

    let err = session.engage_until_kill().await.expect_err("no enemy");
    assert_eq!(err.stage(), "acquire_targets");
}

#[tokio::test(start_paused = true)]
async fn controller_only_run_ends_when_the_last_enemy_dies() {
    // One enemy; from the third combined query on the engine reports only the
    // player. Two kills were asked for but there is nothing left to shoot.
    let driver = controller_only_scene()
        .on_static("GetEnemyOnlyTestPositionsAsString", |_, _, _| Some(positions(1)))
        .on_static("GetEnemyOnlyPositionsAndAimAt", |world, _, _| {
            let previous = world
                .calls
                .iter()
                .filter(|c| c.ends_with(".GetEnemyOnlyPositionsAndAimAt"))
                .count();
            Some(positions(if previous < 2 { 1 } else { 0 }))
        });
    let mut session = session_with(
        driver,
        &[
            ("ALTTESTER_KILL_KILLS_REQUIRED", "2"),
            ("ALTTESTER_KILL_TIMEOUT_SECS", "20"),
        ],
    );

    let report = session.engage_until_kill().await.expect("last enemy down");

    assert_eq!(report.kills, 1);
    assert_eq!(report.fired, 4);
    assert!(report.elapsed < std::time::Duration::from_secs(20));
}

fn subsystem() -> serde_json::Value {
    json!({ "id": 50, "name": "LyraTestSupportSubsystem_0", "type": "LyraTestSupportSubsystem" })
}

#[tokio::test(start_paused = true)]
async fn enemy_still_at_the_origin_is_never_aimed_at_or_shot() {
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 300.0, 0.0, 100.0),
        pawn(2, "Bot_3", 0.0, 0.0, 0.0),
        subsystem(),
    ]))
    .on_call("SetLocalPlayerLookAtWorldPosition", |_, target, _| {
        (target == 50).then_some(RemoteValue::Unit)
    })
    .on_key(Key::Mouse0, kill_first_bot);
    let mut session = session_with(driver, &[("ALTTESTER_KILL_TIMEOUT_SECS", "1")]);

    let err = session.engage_until_kill().await.expect_err("nothing plausible to shoot");

    match err {
        ScenarioError::KillNotConfirmed { failure, .. } => {
            assert_eq!(failure, KillFailure::NoNextTarget { last_enemy_id: 2 });
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.driver().attempts_of("SetLocalPlayerLookAtWorldPosition"), 0);
    assert_eq!(session.driver().presses(Key::Mouse0), 0);
}

#[tokio::test(start_paused = true)]
async fn continuous_fire_only_polls_for_the_kill() {
    // The engine aims and fires on its own once continuous fire is on; the
    // enemy is gone from the next report.
    let driver = ScriptedDriver::from_json(json!([
        { "id": 20, "name": "LyraPlayerController_0", "type": "LyraPlayerController" },
        subsystem(),
    ]))
    .on_call("SetContinuousAimFireEnabled", |_, target, _| {
        (target == 50).then_some(RemoteValue::Unit)
    })
    .on_static("GetEnemyOnlyTestPositionsAsString", |world, _, _| {
        let firing = world
            .calls
            .iter()
            .any(|c| c.ends_with(".SetContinuousAimFireEnabled"));
        Some(positions(if firing { 0 } else { 1 }))
    });
    let mut session = session(driver);

    let report = session.engage_until_kill().await.expect("kill");

    assert_eq!(
        report.mode,
        TargetingMode::ControllerOnly {
            world_id: 20,
            continuous_fire: true,
        }
    );
    assert_eq!(report.kills, 1);
    assert_eq!(report.fired, 0);
    let driver = session.driver();
    assert_eq!(driver.presses(Key::Mouse0), 0);
    assert_eq!(driver.attempts_of("GetEnemyOnlyPositionsAndAimAt"), 0);
    assert_eq!(driver.attempts_of("SetLocalPlayerLookAtWorldPosition"), 0);
}

#[tokio::test(start_paused = true)]
async fn hidden_enemy_is_only_shot_once_force_fire_is_due() {
    // A wall sits in front of the bot at the same screen point.
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 0.0, 0.0, 100.0),
        { "id": 60, "name": "Wall_1", "type": "StaticMeshActor", "x": 960.0, "y": 540.0 },
        with_screen(pawn(2, "Bot_3", 500.0, 0.0, 100.0), 960.0, 540.0),
    ]))
    .on_key(Key::Mouse0, kill_first_bot);
    let mut session = session(driver);

    let report = session.engage_until_kill().await.expect("forced kill");

    assert_eq!(report.kills, 1);
    assert_eq!(report.fired, 1);
    assert!(report.skipped_not_visible > 0);
    // Force fire waits out its full interval.
    assert!(report.elapsed >= std::time::Duration::from_secs(10));
    assert_eq!(session.driver().presses(Key::Mouse0), 1);
}

#[tokio::test(start_paused = true)]
async fn vanished_target_is_replaced_without_counting_a_kill() {
    // Bot_3 leaves the match as soon as we teleport next to it; Bot_4 is
    // picked up by the re-search and is the one that gets shot.
    let driver = ScriptedDriver::from_json(json!([
        pawn(1, "Player_0", 0.0, 0.0, 100.0),
        with_screen(pawn(2, "Bot_3", 500.0, 0.0, 100.0), 960.0, 540.0),
        with_screen(pawn(3, "Bot_4", -700.0, 200.0, 100.0), 400.0, 500.0),
    ]))
    .on_call("K2_SetActorLocation", |world, target, call| {
        world.remove(2);
        teleport(world, target, &call.args)
    })
    .on_key(Key::Mouse0, kill_first_bot);
    let mut session = session(driver);

    let report = session.engage_until_kill().await.expect("kill after re-search");

    assert_eq!(report.kills, 1);
    assert_eq!(report.fired, 1);
    let world = session.driver().world();
    assert!(world.entity(3).is_none());
    assert_eq!(world.entity(1).map(|p| p.world), Some(Vec3::new(-700.0, 200.0, 100.0)));
}
