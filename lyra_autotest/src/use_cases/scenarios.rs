// End-to-end checks run against a live game. Each returns Ok when the game
// behaved as expected; failures name the stage that broke.

use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::domain::{AutomationDriver, Key, ScenarioError, Vec3, Viewport};
use crate::use_cases::aim_kill::KillReport;
use crate::use_cases::session::Session;

pub const MAX_VIEWPORT_WIDTH: f32 = 7680.0;
pub const MAX_VIEWPORT_HEIGHT: f32 = 4320.0;
const MOVE_DURATION: Duration = Duration::from_secs(2);
const AFTER_MOVE: Duration = Duration::from_millis(500);
const MOVE_PLAYER_ATTEMPTS: u32 = 8;
const MOVE_PLAYER_RETRY: Duration = Duration::from_secs(2);
// Engine positions must move at least this far for the controller-only check.
const MIN_MOVEMENT: f32 = 20.0;
const SETUP_WAIT: Duration = Duration::from_secs(30);

/// How the movement check was satisfied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementEvidence {
    /// The pawn was still resolvable after moving.
    PawnStillPresent,
    /// Engine-reported player position moved this far.
    EngineDistance(f32),
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    pub async fn game_responds(&self) -> Result<usize, ScenarioError> {
        let elements = self.driver.all_elements(true).await?;
        if elements.is_empty() {
            return Err(ScenarioError::assertion(
                "game_responds",
                "no enabled objects; the app may not be loaded or the driver not connected",
            ));
        }
        Ok(elements.len())
    }

    pub async fn viewport_is_valid(&self) -> Result<Viewport, ScenarioError> {
        let viewport = self.driver.screen_size().await?;
        let width_ok = viewport.width > 0.0 && viewport.width <= MAX_VIEWPORT_WIDTH;
        let height_ok = viewport.height > 0.0 && viewport.height <= MAX_VIEWPORT_HEIGHT;
        if !(width_ok && height_ok) {
            return Err(ScenarioError::assertion(
                "viewport_is_valid",
                format!("viewport {}x{} out of range", viewport.width, viewport.height),
            ));
        }
        Ok(viewport)
    }

    async fn assert_left_main_menu(&self, stage: &'static str) -> Result<String, ScenarioError> {
        let scene = self.driver.current_scene().await?;
        if scene.is_empty() {
            return Err(ScenarioError::assertion(stage, "current scene is empty"));
        }
        if scene == self.config.menu.main_menu_scene {
            return Err(ScenarioError::assertion(stage, format!("still in the main menu ({scene})")));
        }
        Ok(scene)
    }

    pub async fn main_menu_enters_gameplay(&mut self) -> Result<String, ScenarioError> {
        self.go_to_quick_play(Duration::from_secs(15), Duration::from_secs(6))
            .await?;
        self.wait_for_gameplay_to_start(Duration::from_secs(60)).await?;
        self.assert_left_main_menu("main_menu_enters_gameplay").await
    }

    pub async fn hud_is_visible(&mut self) -> Result<(), ScenarioError> {
        self.enter_gameplay(Duration::from_secs(60), false).await?;
        self.setup_in_game_test(SETUP_WAIT).await;
        self.assert_left_main_menu("hud_is_visible").await?;
        let hud = self.wait_for_hud(Duration::from_secs(30)).await?;
        self.assert_hud_visible(&hud).await
    }

    async fn hold_forward(&self) -> Result<(), ScenarioError> {
        self.driver.key_down(Key::W).await?;
        sleep(MOVE_DURATION).await;
        self.driver.key_up(Key::W).await?;
        sleep(AFTER_MOVE).await;
        Ok(())
    }

    /// Holds W for two seconds. With a pawn the pawn must still resolve
    /// afterwards; without one the engine-reported position must move.
    pub async fn player_movement_changes_position(&mut self) -> Result<MovementEvidence, ScenarioError> {
        self.enter_gameplay(Duration::from_secs(60), false).await?;
        self.setup_in_game_test(SETUP_WAIT).await;

        let mut character = None;
        for attempt in 1..=MOVE_PLAYER_ATTEMPTS {
            character = self.find_player().await;
            if character.is_some() || attempt == MOVE_PLAYER_ATTEMPTS {
                break;
            }
            sleep(MOVE_PLAYER_RETRY).await;
        }

        if let Some(character) = character {
            self.hold_forward().await?;
            let after = match self.entity_by_id(character.id).await {
                Some(found) => Some(found),
                None => self.find_player().await,
            };
            if after.is_none() {
                return Err(ScenarioError::assertion(
                    "player_movement",
                    format!("player {} not found after holding W", character.id),
                ));
            }
            return Ok(MovementEvidence::PawnStillPresent);
        }

        let before = self.engine_player_position().await.ok_or_else(|| {
            ScenarioError::not_found("player_movement", "no player pawn and no engine player position")
        })?;
        self.hold_forward().await?;
        let after = self.engine_player_position().await.ok_or_else(|| {
            ScenarioError::not_found("player_movement", "engine returned no player position after moving")
        })?;
        let moved = before.distance(after);
        info!(?before, ?after, moved, "engine player position");
        if moved <= MIN_MOVEMENT {
            return Err(ScenarioError::assertion(
                "player_movement",
                format!("player moved {moved:.1} units; expected more than {MIN_MOVEMENT}"),
            ));
        }
        Ok(MovementEvidence::EngineDistance(moved))
    }

    async fn engine_player_position(&mut self) -> Option<Vec3> {
        self.test_positions_from_engine()
            .await
            .and_then(|positions| positions.player)
    }

    /// Enters a match, waits for it to settle and runs the kill loop.
    pub async fn aim_shoot_kill(&mut self) -> Result<KillReport, ScenarioError> {
        let cfg = self.config.engagement.clone();
        self.enter_gameplay(cfg.gameplay_timeout, false).await?;
        self.pause(cfg.post_load_wait).await;
        self.engage_until_kill().await
    }
}
