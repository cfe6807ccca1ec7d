use std::{env, str::FromStr, time::Duration};

use crate::domain::geometry::{AimOffsets, DEFAULT_MAX_COMBAT_DISTANCE, LookInputTuning};
use crate::domain::tiles::TileLayout;

// Runtime configuration read from ALTTESTER_* environment variables.
// Blank values fall back to defaults, as do numbers outside their allowed range.

// Upper bound for any configured wait, so deadlines never overflow `Instant`.
const MAX_WAIT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub app_name: String,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuConfig {
    pub main_menu_scene: String,
    pub play_lyra_button: Option<String>,
    pub start_game_button: String,
    pub start_game_fallbacks: Vec<String>,
    pub start_game_after_click: Duration,
    pub host_button: String,
    pub wait_for_host_timeout: Duration,
    pub button_border: String,
    pub submenu_quickplay_button: String,
    pub middle_button_index: usize,
    pub quick_play_button: Option<String>,
    pub quick_play_button_default: String,
    pub quick_play_before_wait: Duration,
    pub quick_play_after_click: Duration,
    pub quick_play_poll: Duration,
    pub quick_play_exclude: Vec<String>,
    pub experience_tile_index: usize,
    pub experience_tile_names: Vec<String>,
    pub experience_tiles: TileLayout,
    pub experience_after_click: Duration,
    pub experience_before_tap: Duration,
    pub experience_wait_interval: Duration,
    pub launch_button_names: Vec<String>,
    pub bot_count_control: Option<String>,
    pub bot_count_control_default: String,
    pub bot_count_option_one: Option<String>,
    pub bot_count_option_one_fallbacks: Vec<String>,
    pub bot_count_after_control: Duration,
    pub bot_count_after_option: Duration,
    pub host_after_click: Duration,
    pub host_after_bot_count: Duration,
    pub dismiss_overlay: Duration,
    pub go_quick_play_after_start: Duration,
    pub go_control_after_host: Duration,
}

impl MenuConfig {
    pub fn quick_play_button_name(&self) -> &str {
        self.quick_play_button
            .as_deref()
            .unwrap_or(&self.quick_play_button_default)
    }

    pub fn bot_count_control_name(&self) -> &str {
        self.bot_count_control
            .as_deref()
            .unwrap_or(&self.bot_count_control_default)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupConfig {
    /// Loads this map directly instead of walking the menus.
    pub aim_test_map: Option<String>,
    pub aim_test_map_options: Option<String>,
    pub aim_test_two_players: bool,
    pub player_wait_poll: Duration,
    pub player_wait_iterations: u32,
    pub after_player_wait: Duration,
    pub cheat_attempts: u32,
    pub cheat_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AimConfig {
    pub offsets: AimOffsets,
    pub look: LookInputTuning,
    pub max_combat_distance: f32,
    /// Verbose aim diagnostics are logged once every this many frames.
    pub log_every_frames: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngagementConfig {
    pub gameplay_timeout: Duration,
    pub post_load_wait: Duration,
    pub player_fetch_attempts: u32,
    pub player_fetch_interval: Duration,
    pub enemy_find_attempts: u32,
    pub enemy_find_timeout: Duration,
    pub enemy_find_delay: Duration,
    pub engine_position_attempts: u32,
    pub engine_position_delay: Duration,
    pub shoot_timeout: Duration,
    pub tick_interval: Duration,
    pub fire_interval: Duration,
    pub force_fire_interval: Duration,
    pub fire_hold: Duration,
    pub kill_confirm_timeout: Duration,
    pub kill_confirm_poll: Duration,
    pub required_consecutive_polls: u32,
    pub next_enemy_attempts: u32,
    pub next_enemy_timeout: Duration,
    pub next_enemy_delay: Duration,
    pub missing_target_recheck: Duration,
    pub missing_target_search_timeout: Duration,
    /// Engine-reported enemies further than this from our height are ignored
    /// when another candidate is closer in z.
    pub z_band: f32,
    pub kills_required: u32,
    pub scenario_retries: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutotestConfig {
    pub transport: TransportConfig,
    pub menu: MenuConfig,
    pub setup: SetupConfig,
    pub aim: AimConfig,
    pub engagement: EngagementConfig,
}

impl Default for AutotestConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AutotestConfig {
    /// Reads `.env` when present, then the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        Self {
            transport: TransportConfig {
                host: env.string("ALTTESTER_HOST", "127.0.0.1"),
                port: env.parse("ALTTESTER_PORT", 13000, |_| true),
                app_name: env.string("ALTTESTER_APP_NAME", "__default__"),
                connect_timeout: Duration::from_secs(env.parse(
                    "ALTTESTER_CONNECT_TIMEOUT",
                    60,
                    |_| true,
                )),
            },
            menu: MenuConfig {
                main_menu_scene: env.string("ALTTESTER_MAIN_MENU_SCENE", "L_LyraFrontEnd"),
                play_lyra_button: env.optional("ALTTESTER_PLAY_LYRA_BUTTON"),
                start_game_button: env.string("ALTTESTER_START_GAME_BUTTON", "StartGameButton"),
                start_game_fallbacks: env.list(
                    "ALTTESTER_START_GAME_FALLBACKS",
                    "StartGame,PlayLyra,Play Lyra,PrimaryButton,W_StartGame",
                ),
                start_game_after_click: env.millis("ALTTESTER_START_GAME_AFTER_CLICK_MS", 2000),
                host_button: env.string("ALTTESTER_HOST_BUTTON", "HostButton"),
                wait_for_host_timeout: Duration::from_secs(env.parse(
                    "ALTTESTER_WAIT_FOR_HOST_TIMEOUT",
                    10,
                    |v| *v > 0,
                )),
                button_border: env.string("ALTTESTER_BUTTON_BORDER", "ButtonBorder"),
                submenu_quickplay_button: env
                    .string("ALTTESTER_SUBMENU_QUICKPLAY_BUTTON", "QuickplayButton"),
                middle_button_index: env.parse("ALTTESTER_MIDDLE_BUTTON_INDEX", 1, |_| true),
                quick_play_button: env.optional("ALTTESTER_QUICK_PLAY_BUTTON"),
                quick_play_button_default: env
                    .string("ALTTESTER_QUICK_PLAY_BUTTON_DEFAULT", "QuickPlayButton"),
                quick_play_before_wait: env.millis("ALTTESTER_QUICKPLAY_BEFORE_WAIT_MS", 2000),
                quick_play_after_click: env.millis("ALTTESTER_QUICKPLAY_AFTER_CLICK_MS", 1500),
                quick_play_poll: env.positive_millis("ALTTESTER_QUICKPLAY_POLL_MS", 500),
                quick_play_exclude: env.list(
                    "ALTTESTER_QUICKPLAY_EXCLUDE_NAMES",
                    "Quick,Quickplay,Elimination",
                ),
                experience_tile_index: env.parse("ALTTESTER_EXPERIENCE_TILE_INDEX", 1, |_| true),
                experience_tile_names: env
                    .list("ALTTESTER_EXPERIENCE_TILE_NAMES", "Control,Convolution"),
                experience_tiles: TileLayout {
                    band_px: env.parse("ALTTESTER_EXPERIENCE_TILE_X_BAND", 120.0, |v: &f32| {
                        *v > 0.0
                    }),
                    min_screen_y: env.parse(
                        "ALTTESTER_EXPERIENCE_MIN_SCREEN_Y",
                        100.0,
                        |v: &f32| *v >= 0.0,
                    ),
                },
                experience_after_click: env.millis("ALTTESTER_EXPERIENCE_AFTER_CLICK_MS", 1000),
                experience_before_tap: env.millis("ALTTESTER_EXPERIENCE_BEFORE_TAP_MS", 450),
                experience_wait_interval: env
                    .positive_millis("ALTTESTER_EXPERIENCE_WAIT_INTERVAL_MS", 500),
                launch_button_names: env.list(
                    "ALTTESTER_LAUNCH_BUTTON_NAMES",
                    "Launch,Start,StartGame,Play,Confirm,ConfirmButton,PrimaryButton",
                ),
                bot_count_control: env.optional("ALTTESTER_BOT_COUNT_CONTROL"),
                bot_count_control_default: env
                    .string("ALTTESTER_BOT_COUNT_CONTROL_DEFAULT", "CHANGE"),
                bot_count_option_one: env.optional("ALTTESTER_BOT_COUNT_OPTION_ONE"),
                bot_count_option_one_fallbacks: env.list(
                    "ALTTESTER_BOT_COUNT_OPTION_ONE_FALLBACKS",
                    "1,One,Option_1,1 Bot,1 bot",
                ),
                bot_count_after_control: env.millis("ALTTESTER_BOT_COUNT_AFTER_CONTROL_MS", 400),
                bot_count_after_option: env.millis("ALTTESTER_BOT_COUNT_AFTER_OPTION_MS", 200),
                host_after_click: env.millis("ALTTESTER_HOST_AFTER_CLICK_MS", 2000),
                host_after_bot_count: env.millis("ALTTESTER_HOST_AFTER_BOT_COUNT_MS", 500),
                dismiss_overlay: env.millis("ALTTESTER_DISMISS_OVERLAY_MS", 200),
                go_quick_play_after_start: env
                    .millis("ALTTESTER_GO_QUICKPLAY_AFTER_START_MS", 2000),
                go_control_after_host: env.millis("ALTTESTER_GO_CONTROL_AFTER_HOST_MS", 1500),
            },
            setup: SetupConfig {
                aim_test_map: env.optional("ALTTESTER_AIM_TEST_MAP"),
                aim_test_map_options: env.optional("ALTTESTER_AIM_TEST_MAP_OPTIONS"),
                aim_test_two_players: env.flag("ALTTESTER_AIM_TEST_TWO_PLAYERS"),
                player_wait_poll: env.positive_millis("ALTTESTER_SETUP_PLAYER_WAIT_POLL_MS", 500),
                player_wait_iterations: env.parse(
                    "ALTTESTER_SETUP_PLAYER_WAIT_ITERATIONS",
                    40,
                    |v| *v > 0,
                ),
                after_player_wait: env.millis("ALTTESTER_SETUP_AFTER_PLAYER_WAIT_MS", 1500),
                cheat_attempts: env.parse("ALTTESTER_SETUP_CHEAT_ATTEMPTS", 8, |v| *v > 0),
                cheat_delay: env.millis("ALTTESTER_SETUP_CHEAT_DELAY_MS", 3000),
            },
            aim: AimConfig {
                offsets: AimOffsets {
                    target_z: env.parse("ALTTESTER_AIM_TARGET_OFFSET_Z", 135.0, finite),
                    engine_target_z: env.parse(
                        "ALTTESTER_AIM_ENGINE_TARGET_OFFSET_Z",
                        40.0,
                        finite,
                    ),
                    eye_z: env.parse("ALTTESTER_AIM_EYE_OFFSET_Z", 80.0, finite),
                },
                look: LookInputTuning {
                    gain: env.parse("ALTTESTER_AIM_GAIN", 25.0, |v: &f32| *v > 0.0),
                    max_delta_per_call: env.parse(
                        "ALTTESTER_AIM_MAX_DELTA_DEG",
                        15.0,
                        |v: &f32| *v >= 0.0,
                    ),
                    stop_threshold_deg: env.parse(
                        "ALTTESTER_AIM_STOP_THRESHOLD_DEG",
                        0.5,
                        |v: &f32| *v > 0.0,
                    ),
                },
                max_combat_distance: env.parse(
                    "ALTTESTER_AIM_MAX_COMBAT_DISTANCE",
                    DEFAULT_MAX_COMBAT_DISTANCE,
                    |v: &f32| *v > 0.0,
                ),
                log_every_frames: env.parse("ALTTESTER_AIM_LOG_EVERY_FRAMES", 10, |v| *v > 0),
            },
            engagement: EngagementConfig {
                gameplay_timeout: env.secs("ALTTESTER_KILL_GAMEPLAY_TIMEOUT_SECS", 90),
                post_load_wait: env.secs("ALTTESTER_KILL_POST_LOAD_WAIT_SECS", 20),
                player_fetch_attempts: 2,
                player_fetch_interval: Duration::from_secs(2),
                enemy_find_attempts: env.parse("ALTTESTER_KILL_ENEMY_ATTEMPTS", 3, |v| *v > 0),
                enemy_find_timeout: env.secs("ALTTESTER_KILL_ENEMY_TIMEOUT_SECS", 15),
                enemy_find_delay: Duration::from_secs(2),
                engine_position_attempts: env.parse(
                    "ALTTESTER_KILL_ENGINE_POSITION_ATTEMPTS",
                    3,
                    |v| *v > 0,
                ),
                engine_position_delay: Duration::from_secs(4),
                shoot_timeout: env.secs("ALTTESTER_KILL_TIMEOUT_SECS", 180),
                tick_interval: env.positive_millis("ALTTESTER_KILL_TICK_MS", 50),
                fire_interval: env.positive_millis("ALTTESTER_KILL_FIRE_INTERVAL_MS", 120),
                force_fire_interval: env.secs("ALTTESTER_KILL_FORCE_FIRE_SECS", 10),
                fire_hold: Duration::from_millis(80),
                kill_confirm_timeout: Duration::from_secs(2),
                kill_confirm_poll: Duration::from_millis(80),
                required_consecutive_polls: env.parse(
                    "ALTTESTER_KILL_REQUIRED_POLLS",
                    2,
                    |v| *v > 0,
                ),
                next_enemy_attempts: 3,
                next_enemy_timeout: Duration::from_secs(8),
                next_enemy_delay: Duration::from_millis(1500),
                missing_target_recheck: Duration::from_secs(2),
                missing_target_search_timeout: Duration::from_secs(5),
                z_band: env.parse("ALTTESTER_KILL_Z_BAND", 500.0, |v: &f32| *v > 0.0),
                kills_required: env.parse("ALTTESTER_KILL_KILLS_REQUIRED", 1, |v| *v > 0),
                scenario_retries: env.parse("ALTTESTER_KILL_SCENARIO_RETRIES", 2, |_| true),
            },
        }
    }
}

fn finite(v: &f32) -> bool {
    v.is_finite()
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.raw(key)
    }

    fn list(&self, key: &str, default: &str) -> Vec<String> {
        let raw = self.raw(key).unwrap_or_else(|| default.to_string());
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn flag(&self, key: &str) -> bool {
        self.raw(key)
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    fn parse<T, V>(&self, key: &str, default: T, valid: V) -> T
    where
        T: FromStr,
        V: Fn(&T) -> bool,
    {
        self.raw(key)
            .and_then(|v| v.parse::<T>().ok())
            .filter(|v| valid(v))
            .unwrap_or(default)
    }

    fn millis(&self, key: &str, default: u64) -> Duration {
        Duration::from_millis(self.parse(key, default, |v| *v <= MAX_WAIT_SECS * 1000))
    }

    fn positive_millis(&self, key: &str, default: u64) -> Duration {
        Duration::from_millis(self.parse(key, default, |v| (1..=MAX_WAIT_SECS * 1000).contains(v)))
    }

    fn secs(&self, key: &str, default: u64) -> Duration {
        Duration::from_secs(self.parse(key, default, |v| (1..=MAX_WAIT_SECS).contains(v)))
    }
}
