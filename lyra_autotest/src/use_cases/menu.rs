// Front-end menu navigation: main menu, start game, host submenu, bot count,
// experience tiles and quick play. Widget names differ between builds, so each
// step tries the configured name first and falls back to name fragments.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::domain::classify::contains_ignore_case;
use crate::domain::tiles::pick_tile;
use crate::domain::{AutomationDriver, Key, RemoteEntity, ScenarioError, ScreenPoint};
use crate::use_cases::session::Session;

const ACTIVATE_KEY_HOLD: Duration = Duration::from_millis(100);
const ACTIVATE_KEYS: [Key; 3] = [Key::Return, Key::Space, Key::JoystickButton0];
const TILE_CONFIRM_GAP: Duration = Duration::from_millis(80);
const TILE_CONFIRM_HOLD: Duration = Duration::from_millis(120);
// Where the start button sits when no widget name matches.
const START_BUTTON_SCREEN_Y: f32 = 0.65;
const MIN_BORDER_BUTTONS: usize = 3;

impl<D> Session<D>
where
    D: AutomationDriver,
{
    /// Taps the widget, then sends every confirm key so both mouse and
    /// gamepad focus paths fire.
    pub async fn activate(&self, widget: &RemoteEntity) -> Result<(), ScenarioError> {
        debug!(id = widget.id, name = %widget.name, "activate");
        self.driver.tap(widget.screen).await?;
        for key in ACTIVATE_KEYS {
            if let Err(err) = self.driver.press_key(key, ACTIVATE_KEY_HOLD).await {
                debug!(key = key.as_str(), error = %err, "confirm key failed");
            }
        }
        Ok(())
    }

    pub async fn dismiss_overlay(&self) {
        if let Err(err) = self.driver.press_key(Key::Escape, ACTIVATE_KEY_HOLD).await {
            debug!(error = %err, "dismiss overlay failed");
        }
        self.pause(self.config.menu.dismiss_overlay).await;
    }

    pub async fn load_main_menu(&self, scene_timeout: Duration, wait_after: Duration) -> Result<(), ScenarioError> {
        let scene = self.config.menu.main_menu_scene.as_str();
        info!(scene, "loading main menu");
        self.driver.load_scene(scene).await?;
        self.driver.wait_for_scene(scene, scene_timeout).await?;
        let current = self.driver.current_scene().await?;
        if current != scene {
            return Err(ScenarioError::assertion(
                "load_main_menu",
                format!("expected {scene}, got {current:?}"),
            ));
        }
        self.pause(wait_after).await;
        Ok(())
    }

    // Play button name candidates in lookup order, without duplicates.
    fn start_button_names(&self) -> Vec<String> {
        let menu = &self.config.menu;
        let mut names: Vec<String> = Vec::new();
        let ordered = menu
            .play_lyra_button
            .iter()
            .chain(std::iter::once(&menu.start_game_button))
            .chain(menu.start_game_fallbacks.iter());
        for name in ordered {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Opens the main menu cards from the title screen. The host button
    /// appearing afterwards is the success condition.
    pub async fn click_start_game_button(&self, timeout: Duration, dismiss_first: bool) -> Result<(), ScenarioError> {
        if dismiss_first {
            self.dismiss_overlay().await;
        }
        let menu = &self.config.menu;
        let name = menu
            .play_lyra_button
            .as_deref()
            .unwrap_or(&menu.start_game_button);

        if let Some(button) = self.wait_for_object(name, timeout, true).await {
            self.activate(&button).await?;
            return self.expect_host_button("start game").await;
        }

        let names = self.start_button_names();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(button) = self.find_by_any_name(&names, true).await {
                info!(name = %button.name, "start button found by fallback name");
                self.activate(&button).await?;
                return self.expect_host_button("start game").await;
            }
            sleep(menu.experience_wait_interval).await;
        }

        warn!(?names, "no start button by name; tapping its usual position");
        self.tap_start_position().await;
        self.expect_host_button("start game (position fallback)").await
    }

    async fn tap_start_position(&self) {
        let viewport = match self.driver.screen_size().await {
            Ok(v) if v.width > 0.0 && v.height > 0.0 => v,
            Ok(_) => return,
            Err(err) => {
                debug!(error = %err, "screen_size failed");
                return;
            }
        };
        let point = ScreenPoint::new(
            (viewport.width / 2.0).floor(),
            (viewport.height * START_BUTTON_SCREEN_Y).floor(),
        );
        if let Err(err) = self.driver.tap(point).await {
            debug!(error = %err, "tap failed; clicking instead");
            if let Err(err) = self.driver.click(point).await {
                debug!(error = %err, "click failed");
            }
        }
    }

    async fn expect_host_button(&self, after: &str) -> Result<(), ScenarioError> {
        let menu = &self.config.menu;
        self.pause(menu.start_game_after_click).await;
        match self
            .wait_for_object(&menu.host_button, menu.wait_for_host_timeout, true)
            .await
        {
            Some(_) => Ok(()),
            None => Err(ScenarioError::assertion(
                "click_start_game",
                format!("{after} did not open the menu cards ({} not found)", menu.host_button),
            )),
        }
    }

    pub async fn click_host_button(&self, timeout: Duration) -> Result<(), ScenarioError> {
        let menu = &self.config.menu;
        let Some(host) = self.wait_for_object(&menu.host_button, timeout, true).await else {
            return Err(ScenarioError::assertion(
                "click_host_button",
                format!("{} not found", menu.host_button),
            ));
        };
        self.activate(&host).await?;
        if self
            .wait_for_object(&menu.submenu_quickplay_button, timeout, true)
            .await
            .is_none()
        {
            return Err(ScenarioError::assertion(
                "click_host_button",
                format!("submenu not open ({} not found)", menu.submenu_quickplay_button),
            ));
        }
        Ok(())
    }

    // Exact-name border widgets, or the substring matches when there are more.
    async fn border_buttons(&self) -> Vec<RemoteEntity> {
        let border = self.config.menu.button_border.as_str();
        let exact = self.find_all_named(border, true).await;
        let containing = self.find_all_containing(border, true).await;
        if containing.len() > exact.len() {
            containing
        } else {
            exact
        }
    }

    /// Taps the middle of the host submenu's bordered buttons.
    pub async fn click_middle_button_border(&self, timeout: Duration, interval: Duration) -> Result<(), ScenarioError> {
        let deadline = Instant::now() + timeout;
        let mut last_count = None;
        while Instant::now() < deadline {
            let buttons = self.border_buttons().await;
            if buttons.len() >= MIN_BORDER_BUTTONS {
                let index = self.config.menu.middle_button_index.min(buttons.len() - 1);
                let middle = &buttons[index];
                debug!(index, id = middle.id, "tapping border button");
                self.driver.tap(middle.screen).await?;
                return Ok(());
            }
            if last_count != Some(buttons.len()) {
                debug!(count = buttons.len(), "waiting for border buttons");
                last_count = Some(buttons.len());
            }
            sleep(interval).await;
        }
        let found = self.border_buttons().await.len();
        Err(ScenarioError::assertion(
            "click_middle_button_border",
            format!(
                "expected at least {MIN_BORDER_BUTTONS} {} widgets within {}s, found {found}",
                self.config.menu.button_border,
                timeout.as_secs()
            ),
        ))
    }

    /// Best-effort bot count selection in the host menu. Every failure is
    /// logged and swallowed.
    pub async fn set_session_bot_count(&self, desired: u32, timeout: Duration) {
        let menu = &self.config.menu;
        let control_name = menu.bot_count_control_name();
        let control = match self.wait_for_object(control_name, timeout, true).await {
            Some(control) => Some(control),
            None => self.find_containing(control_name, true).await,
        };
        if let Some(control) = control {
            if let Err(err) = self.activate(&control).await {
                debug!(error = %err, "bot count control did not activate");
            }
            self.pause(menu.bot_count_after_control).await;
        }

        if desired != 1 {
            return;
        }
        let option = match &menu.bot_count_option_one {
            Some(name) => self.wait_for_object(name, timeout, true).await,
            None => self.first_bot_option(&menu.bot_count_option_one_fallbacks).await,
        };
        match option {
            Some(option) => {
                if let Err(err) = self.activate(&option).await {
                    debug!(error = %err, "bot count option did not activate");
                }
                self.pause(menu.bot_count_after_option).await;
            }
            None => debug!(desired, "no bot count option found"),
        }
    }

    async fn first_bot_option(&self, names: &[String]) -> Option<RemoteEntity> {
        for name in names {
            if let Some(found) = self.find_named(name, true).await {
                return Some(found);
            }
            if let Some(found) = self.find_containing(name, true).await {
                return Some(found);
            }
        }
        None
    }

    /// Widgets that belong to quick play and must never be taken for an
    /// experience tile or launch button.
    pub fn is_quick_play_element(&self, widget: &RemoteEntity) -> bool {
        let menu = &self.config.menu;
        let name = widget.name.as_str();
        name.eq_ignore_ascii_case(menu.quick_play_button_name())
            || name.eq_ignore_ascii_case(&menu.submenu_quickplay_button)
            || menu
                .quick_play_exclude
                .iter()
                .any(|fragment| !fragment.is_empty() && contains_ignore_case(name, fragment))
    }

    async fn experience_tile(&self) -> Option<RemoteEntity> {
        let menu = &self.config.menu;
        let mut widgets: Vec<RemoteEntity> = Vec::new();
        for fragment in menu.experience_tile_names.iter().filter(|n| !n.is_empty()) {
            for widget in self.find_all_containing(fragment, true).await {
                let matches_name = menu
                    .experience_tile_names
                    .iter()
                    .any(|n| contains_ignore_case(&widget.name, n));
                if matches_name && !self.is_quick_play_element(&widget) {
                    widgets.push(widget);
                }
            }
        }
        pick_tile(&widgets, menu.experience_tiles, menu.experience_tile_index).cloned()
    }

    /// Picks the configured experience tile (by position from the left) and
    /// launches it.
    pub async fn click_experience_button(&self, timeout: Duration) -> Result<(), ScenarioError> {
        let menu = &self.config.menu;
        let deadline = Instant::now() + timeout;
        let mut tile = None;
        while tile.is_none() {
            tile = self.experience_tile().await;
            if tile.is_some() || Instant::now() >= deadline {
                break;
            }
            sleep(menu.experience_wait_interval).await;
        }
        let Some(tile) = tile else {
            return Err(ScenarioError::assertion(
                "click_experience_button",
                format!(
                    "no experience tile among {:?} at index {}",
                    menu.experience_tile_names, menu.experience_tile_index
                ),
            ));
        };
        info!(id = tile.id, name = %tile.name, "experience tile");

        self.pause(menu.experience_before_tap).await;
        self.activate(&tile).await?;
        if tile.screen.x > 0.0 && tile.screen.y > 0.0 {
            if let Err(err) = self.driver.tap(tile.screen).await {
                debug!(error = %err, "second tile tap failed");
            }
            sleep(TILE_CONFIRM_GAP).await;
            if let Err(err) = self.driver.press_key(Key::Return, TILE_CONFIRM_HOLD).await {
                debug!(error = %err, "tile confirm key failed");
            }
        }
        self.pause(menu.experience_after_click).await;
        self.click_launch_button().await;
        Ok(())
    }

    async fn click_launch_button(&self) {
        for name in &self.config.menu.launch_button_names {
            let exact = self.find_named(name, true).await;
            let candidate = match exact.filter(|w| !self.is_quick_play_element(w)) {
                Some(widget) => Some(widget),
                None => self
                    .find_containing(name, true)
                    .await
                    .filter(|w| !self.is_quick_play_element(w)),
            };
            if let Some(button) = candidate {
                debug!(name = %button.name, "launch button");
                if let Err(err) = self.activate(&button).await {
                    debug!(error = %err, "launch button did not activate");
                }
                return;
            }
        }
        debug!("no launch button; the tile may have started the match itself");
    }

    pub async fn click_quick_play(&self, timeout: Duration) -> Result<(), ScenarioError> {
        let menu = &self.config.menu;
        self.pause(menu.quick_play_before_wait).await;
        let name = menu.quick_play_button_name();

        if let Some(button) = self.wait_for_object(name, timeout, true).await {
            self.activate(&button).await?;
            self.pause(menu.quick_play_after_click).await;
            return Ok(());
        }

        let names = [name.to_string()];
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(button) = self.find_by_any_name(&names, true).await {
                self.activate(&button).await?;
                self.pause(menu.quick_play_after_click).await;
                return Ok(());
            }
            sleep(menu.quick_play_poll).await;
        }
        Err(ScenarioError::assertion(
            "click_quick_play",
            format!("{name} not found within {}s", timeout.as_secs()),
        ))
    }

    pub async fn go_to_quick_play(&self, scene_timeout: Duration, wait_after_scene: Duration) -> Result<(), ScenarioError> {
        self.load_main_menu(scene_timeout, wait_after_scene).await?;
        self.click_start_game_button(Duration::from_secs(30), true)
            .await?;
        self.pause(self.config.menu.go_quick_play_after_start).await;
        self.click_quick_play(Duration::from_secs(25)).await
    }

    pub async fn go_to_control(&self, scene_timeout: Duration, wait_after_scene: Duration) -> Result<(), ScenarioError> {
        self.load_main_menu(scene_timeout, wait_after_scene).await?;
        self.click_start_game_button(Duration::from_secs(30), true)
            .await?;
        self.click_host_button(Duration::from_secs(15)).await?;
        self.pause(self.config.menu.go_control_after_host).await;
        self.click_middle_button_border(Duration::from_secs(15), Duration::from_millis(500))
            .await
    }

    /// Hosts a match with one bot via the experience tiles.
    pub async fn go_to_host_with_two_players(
        &self,
        scene_timeout: Duration,
        wait_after_scene: Duration,
    ) -> Result<(), ScenarioError> {
        self.load_main_menu(scene_timeout, wait_after_scene).await?;
        self.click_start_game_button(Duration::from_secs(30), false)
            .await?;
        self.click_host_button(Duration::from_secs(15)).await?;
        self.pause(self.config.menu.host_after_click).await;
        self.set_session_bot_count(1, Duration::from_secs(5)).await;
        self.pause(self.config.menu.host_after_bot_count).await;
        self.click_experience_button(Duration::from_secs(10)).await
    }
}
