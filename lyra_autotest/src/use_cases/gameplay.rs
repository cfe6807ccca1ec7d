// Getting into a match and keeping the local player usable for a test:
// entering gameplay, cheats around setup and teardown, teleporting, HUD checks
// and walking toward a target.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::domain::geometry::is_in_combat_range;
use crate::domain::parse::vector_formats;
use crate::domain::{AutomationDriver, CallArg, EntityId, Key, MethodCall, RemoteEntity, ScenarioError, Vec3};
use crate::use_cases::session::Session;

const GAMEPLAY_SCENE_POLL: Duration = Duration::from_millis(500);
const HUD_POLL: Duration = Duration::from_millis(500);
const VISIBILITY_POLL: Duration = Duration::from_millis(150);
const PLAYER_WAIT_CAP: Duration = Duration::from_secs(60);
const POST_LOAD_PLAYER_WINDOW: Duration = Duration::from_secs(30);
const POST_LOAD_PLAYER_POLL: Duration = Duration::from_secs(2);
const MOVE_FRAME: Duration = Duration::from_millis(16);
const STRAFE_GAP: Duration = Duration::from_millis(100);
const HUD_NAMES: &[&str] = &["LyraHUD", "HUD"];
const TELEPORT_MODULES: &[&str] = &["Engine", "LyraGame"];

/// Tuning for [`Session::move_toward_target`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveTowardOptions {
    pub timeout: Duration,
    /// How long W is held per step.
    pub burst: Duration,
    /// Horizontal distance that counts as arrived.
    pub close_enough: f32,
    /// A step that closes less than this counts as stuck.
    pub stuck_threshold: f32,
    pub stuck_bursts_before_strafe: u32,
    pub strafe: Duration,
    pub poll: Duration,
    /// Zero means unbounded.
    pub max_iterations: u32,
}

impl Default for MoveTowardOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            burst: Duration::from_millis(800),
            close_enough: 400.0,
            stuck_threshold: 15.0,
            stuck_bursts_before_strafe: 2,
            strafe: Duration::from_millis(400),
            poll: Duration::from_millis(150),
            max_iterations: 0,
        }
    }
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    /// Gets the local player into a running match. With an aim-test map
    /// configured the map is loaded directly; otherwise the menus are used.
    pub async fn enter_gameplay(&mut self, timeout: Duration, use_menu_only: bool) -> Result<(), ScenarioError> {
        if let Some(map) = self.config.setup.aim_test_map.clone() {
            return self.enter_aim_test_map(&map, timeout).await;
        }

        if use_menu_only || self.config.setup.aim_test_two_players {
            self.go_to_host_with_two_players(Duration::from_secs(15), Duration::from_secs(5))
                .await?;
        } else {
            self.go_to_quick_play(Duration::from_secs(15), Duration::from_secs(6))
                .await?;
        }
        self.wait_for_gameplay_to_start(timeout).await?;

        let scene = self.driver.current_scene().await?;
        if scene.is_empty() {
            return Err(ScenarioError::assertion("enter_gameplay", "no scene after gameplay start"));
        }
        let in_gameplay = scene != self.config.menu.main_menu_scene
            || self.find_player().await.is_some()
            || self.find_hud().await.is_some();
        if !in_gameplay {
            return Err(ScenarioError::assertion(
                "enter_gameplay",
                format!("still on {scene} with no player or HUD"),
            ));
        }
        info!(%scene, "entered gameplay");
        self.pause(Duration::from_millis(1500)).await;
        Ok(())
    }

    async fn enter_aim_test_map(&mut self, map: &str, timeout: Duration) -> Result<(), ScenarioError> {
        let url = match &self.config.setup.aim_test_map_options {
            Some(options) => format!("{map}?{}", options.trim_start_matches('?')),
            None => map.to_string(),
        };
        info!(%url, "loading aim test map");
        self.driver.load_scene(&url).await?;
        self.driver.wait_for_scene(map, timeout).await?;
        let scene = self.driver.current_scene().await?;
        if scene != map {
            return Err(ScenarioError::assertion(
                "enter_gameplay",
                format!("expected scene {map}, got {scene:?}"),
            ));
        }

        self.pause(Duration::from_millis(500)).await;
        self.apply_cheats().await;
        self.ensure_test_cheats(true, 5, Duration::from_secs(1)).await;
        self.pause(Duration::from_secs(1)).await;

        let mut player = self.try_wait_for_player(timeout.min(PLAYER_WAIT_CAP)).await;
        let deadline = Instant::now() + POST_LOAD_PLAYER_WINDOW;
        while player.is_none() && Instant::now() < deadline {
            self.apply_cheats().await;
            player = self.find_player().await;
            if player.is_none() {
                sleep(POST_LOAD_PLAYER_POLL).await;
            }
        }
        match &player {
            Some(p) => info!(id = p.id, name = %p.name, "player ready on aim test map"),
            None => warn!(%map, "no player pawn after loading aim test map"),
        }

        self.pause(Duration::from_secs(2)).await;
        self.apply_cheats().await;
        self.ensure_test_cheats(true, 5, Duration::from_millis(1500)).await;
        self.pause(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn apply_cheats(&mut self) {
        self.set_invincible(true).await;
        self.set_infinite_ammo(true).await;
    }

    /// Cheats on, wait for the player, cheats on again. Returns whether
    /// invincibility is in effect at the end.
    pub async fn setup_in_game_test(&mut self, wait: Duration) -> bool {
        let setup = self.config.setup.clone();
        self.apply_cheats().await;
        self.ensure_test_cheats(true, setup.cheat_attempts, setup.cheat_delay)
            .await;
        self.pause(wait).await;

        for _ in 0..setup.player_wait_iterations {
            if self.find_player().await.is_some() {
                break;
            }
            sleep(setup.player_wait_poll).await;
        }
        self.pause(setup.after_player_wait).await;

        self.apply_cheats().await;
        self.ensure_test_cheats(true, setup.cheat_attempts, setup.cheat_delay)
            .await;
        self.set_invincible(true).await
    }

    pub async fn teardown_in_game_test(&mut self) {
        self.set_invincible(false).await;
        self.set_infinite_ammo(false).await;
    }

    /// Moves the local player pawn to `point`. Both engine vector spellings
    /// are tried before the float overload.
    pub async fn teleport_player_to(&mut self, point: Vec3) -> bool {
        let Some(pawn) = self.find_player().await else {
            debug!("teleport skipped: no player");
            return false;
        };
        let formats = vector_formats(point);
        let components = [
            "Actor",
            "Pawn",
            "Character",
            pawn.type_name.as_str(),
            "LyraCharacter",
        ];
        for component in components.iter().filter(|c| !c.is_empty()) {
            for module in TELEPORT_MODULES {
                let mut calls = Vec::new();
                for format in &formats {
                    calls.push(
                        MethodCall::new(*component, "K2_SetActorLocation", *module)
                            .args([CallArg::Str(format.clone()), CallArg::Bool(false)]),
                    );
                    calls.push(
                        MethodCall::new(*component, "SetActorLocation", *module)
                            .arg(CallArg::Str(format.clone())),
                    );
                }
                calls.push(MethodCall::new(*component, "K2_SetActorLocation", *module).args([
                    CallArg::Float(point.x),
                    CallArg::Float(point.y),
                    CallArg::Float(point.z),
                    CallArg::Bool(false),
                ]));
                if self.first_component_success(pawn.id, &calls).await {
                    debug!(id = pawn.id, ?point, component = *component, "teleported player");
                    return true;
                }
            }
        }
        debug!(id = pawn.id, ?point, "teleport failed on every setter");
        false
    }

    /// Polls until the current scene is set and is not the main menu.
    pub async fn wait_for_gameplay_scene(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.driver.current_scene().await {
                Ok(scene) if !scene.is_empty() && scene != self.config.menu.main_menu_scene => {
                    return true;
                }
                Ok(_) => {}
                Err(err) => debug!(error = %err, "current_scene failed"),
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(GAMEPLAY_SCENE_POLL).await;
        }
    }

    pub async fn wait_for_gameplay_to_start(&self, timeout: Duration) -> Result<(), ScenarioError> {
        if self.wait_for_gameplay_scene(timeout).await {
            return Ok(());
        }
        Err(ScenarioError::timeout(
            "wait_for_gameplay",
            format!("scene never left {} within {}s", self.config.menu.main_menu_scene, timeout.as_secs()),
        ))
    }

    /// First enabled object whose name mentions a HUD.
    pub async fn find_hud(&self) -> Option<RemoteEntity> {
        for name in HUD_NAMES {
            if let Some(hud) = self.find_containing(name, true).await {
                return Some(hud);
            }
        }
        None
    }

    pub async fn wait_for_hud(&self, timeout: Duration) -> Result<RemoteEntity, ScenarioError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(hud) = self.find_hud().await {
                return Ok(hud);
            }
            if Instant::now() >= deadline {
                return Err(ScenarioError::not_found(
                    "wait_for_hud",
                    format!("no object named like {HUD_NAMES:?} within {}s", timeout.as_secs()),
                ));
            }
            sleep(HUD_POLL).await;
        }
    }

    /// The HUD must be enabled and drawn inside a non-empty viewport.
    pub async fn assert_hud_visible(&self, hud: &RemoteEntity) -> Result<(), ScenarioError> {
        if !hud.enabled {
            return Err(ScenarioError::assertion("hud_visible", format!("{} is disabled", hud.name)));
        }
        let viewport = self.driver.screen_size().await?;
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return Err(ScenarioError::assertion(
                "hud_visible",
                format!("empty viewport {}x{}", viewport.width, viewport.height),
            ));
        }
        if !viewport.contains(hud.screen) {
            return Err(ScenarioError::assertion(
                "hud_visible",
                format!(
                    "{} at ({}, {}) is outside the {}x{} viewport",
                    hud.name, hud.screen.x, hud.screen.y, viewport.width, viewport.height
                ),
            ));
        }
        Ok(())
    }

    pub async fn wait_until_target_visible(&self, target: &RemoteEntity, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let Some(fresh) = self.entity_by_id(target.id).await else {
                return false;
            };
            if self.is_target_visible(&fresh).await {
                return true;
            }
            sleep(VISIBILITY_POLL).await;
        }
        false
    }

    /// Walks the player toward `target` in W bursts, steering every frame
    /// and strafing when progress stalls. True once within
    /// `close_enough`; false when either object disappears or time runs out.
    pub async fn move_toward_target(
        &mut self,
        player_id: EntityId,
        target: &RemoteEntity,
        options: MoveTowardOptions,
    ) -> Result<bool, ScenarioError> {
        let deadline = Instant::now() + options.timeout;
        let mut last_distance = f32::MAX;
        let mut stuck = 0u32;
        let mut iterations = 0u32;

        while Instant::now() < deadline {
            if options.max_iterations > 0 && iterations >= options.max_iterations {
                break;
            }
            iterations += 1;

            let (Some(player), Some(goal)) = (
                self.entity_by_id(player_id).await,
                self.entity_by_id(target.id).await,
            ) else {
                return Ok(false);
            };
            let distance = player.world.horizontal_distance(goal.world);
            if distance <= options.close_enough {
                info!(distance, iterations, "reached target");
                return Ok(true);
            }

            if distance >= last_distance - options.stuck_threshold {
                stuck += 1;
            } else {
                stuck = 0;
            }
            last_distance = distance;

            if stuck >= options.stuck_bursts_before_strafe {
                debug!(distance, "stuck; strafing");
                self.hold_key(Key::D, options.strafe).await?;
                sleep(STRAFE_GAP).await;
                self.hold_key(Key::A, options.strafe).await?;
                sleep(STRAFE_GAP).await;
                stuck = 0;
            }

            let frames = (options.burst.as_millis() / MOVE_FRAME.as_millis()).max(1);
            self.driver.key_down(Key::W).await?;
            for _ in 0..frames {
                self.steer_toward(player_id, target.id).await;
                sleep(MOVE_FRAME).await;
            }
            self.driver.key_up(Key::W).await?;
            sleep(options.poll).await;
        }
        Ok(false)
    }

    /// Turns the engine helpers off and goes back to the main menu when the
    /// run ended anywhere else. Never fails.
    pub async fn restore_after_scenario(&mut self) {
        self.set_continuous_aim_fire(false).await;
        self.teardown_in_game_test().await;
        let scene = match self.driver.current_scene().await {
            Ok(scene) => scene,
            Err(err) => {
                debug!(error = %err, "current_scene failed during teardown");
                return;
            }
        };
        if !scene.is_empty() && scene != self.config.menu.main_menu_scene {
            if let Err(err) = self
                .load_main_menu(Duration::from_secs(15), Duration::from_secs(8))
                .await
            {
                warn!(error = %err, "could not return to the main menu");
            }
        }
    }

    async fn hold_key(&self, key: Key, hold: Duration) -> Result<(), ScenarioError> {
        self.driver.key_down(key).await?;
        sleep(hold).await;
        self.driver.key_up(key).await?;
        Ok(())
    }

    async fn steer_toward(&mut self, player_id: EntityId, target_id: EntityId) {
        let (Some(player), Some(target)) = (
            self.entity_by_id(player_id).await,
            self.entity_by_id(target_id).await,
        ) else {
            return;
        };
        let Some(controller) = self.controller_for(&player).await else {
            return;
        };
        let aim_point = self.config.aim.offsets.entity_aim_point(target.world);
        if is_in_combat_range(player.world, aim_point, self.config.aim.max_combat_distance) {
            self.update_look_at_from_to(&controller, player.world, aim_point)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_move_options_stop_at_four_hundred_units() {
        let options = MoveTowardOptions::default();
        assert_eq!(options.close_enough, 400.0);
        assert_eq!(options.max_iterations, 0);
        assert_eq!((options.burst.as_millis() / MOVE_FRAME.as_millis()), 50);
    }
}
