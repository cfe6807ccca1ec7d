// Framework bootstrap for scenario runs: environment, tracing, retries,
// teardown and the per-scenario report line.

use std::{fmt, str::FromStr, sync::Arc};

use thiserror::Error;
use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};

use crate::domain::{AutomationDriver, ScenarioError};
use crate::frameworks::config::AutotestConfig;
use crate::interface_adapters::protocol::ScenarioReportDto;
use crate::use_cases::{KillReport, Session};

/// Loads `.env` when present and initializes logging. Safe to call more than
/// once; only the first subscriber wins.
pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    let installed = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
    };
    if installed.is_err() {
        return;
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Builds a session from the process environment.
pub fn session_from_env<D: AutomationDriver>(driver: D) -> Session<D> {
    init_runtime();
    let config = AutotestConfig::from_env();
    info!(
        host = %config.transport.host,
        port = config.transport.port,
        app = %config.transport.app_name,
        "automation target"
    );
    Session::new(driver, Arc::new(config))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    GameResponds,
    ViewportIsValid,
    MainMenuEntersGameplay,
    HudIsVisible,
    PlayerMovementChangesPosition,
    AimShootKill,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::GameResponds,
        Scenario::ViewportIsValid,
        Scenario::MainMenuEntersGameplay,
        Scenario::HudIsVisible,
        Scenario::PlayerMovementChangesPosition,
        Scenario::AimShootKill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::GameResponds => "game_responds",
            Scenario::ViewportIsValid => "viewport_is_valid",
            Scenario::MainMenuEntersGameplay => "main_menu_enters_gameplay",
            Scenario::HudIsVisible => "hud_is_visible",
            Scenario::PlayerMovementChangesPosition => "player_movement_changes_position",
            Scenario::AimShootKill => "aim_shoot_kill",
        }
    }

    /// Extra attempts after a failure.
    pub fn retries(&self, config: &AutotestConfig) -> u32 {
        match self {
            Scenario::AimShootKill => config.engagement.scenario_retries,
            _ => 0,
        }
    }

    /// Scenarios that leave the main menu need cheats cleared and the menu
    /// restored afterwards.
    pub fn enters_gameplay(&self) -> bool {
        !matches!(self, Scenario::GameResponds | Scenario::ViewportIsValid)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown scenario: {0}")]
pub struct UnknownScenario(pub String);

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownScenario(wanted.to_string()))
    }
}

async fn run_once<D: AutomationDriver>(
    session: &mut Session<D>,
    scenario: Scenario,
) -> Result<Option<KillReport>, ScenarioError> {
    match scenario {
        Scenario::GameResponds => {
            let count = session.game_responds().await?;
            info!(count, "enabled objects");
        }
        Scenario::ViewportIsValid => {
            let viewport = session.viewport_is_valid().await?;
            info!(width = viewport.width, height = viewport.height, "viewport");
        }
        Scenario::MainMenuEntersGameplay => {
            let scene = session.main_menu_enters_gameplay().await?;
            info!(%scene, "left the main menu");
        }
        Scenario::HudIsVisible => session.hud_is_visible().await?,
        Scenario::PlayerMovementChangesPosition => {
            let evidence = session.player_movement_changes_position().await?;
            info!(?evidence, "movement confirmed");
        }
        Scenario::AimShootKill => return session.aim_shoot_kill().await.map(Some),
    }
    Ok(None)
}

/// Runs one scenario with its retries and teardown, and returns the report
/// that was logged for it.
pub async fn run_scenario<D: AutomationDriver>(session: &mut Session<D>, scenario: Scenario) -> ScenarioReportDto {
    let span = info_span!("scenario", name = scenario.as_str());
    async move {
        let started = Instant::now();
        let max_attempts = 1 + scenario.retries(session.config());
        let mut attempts = 0;
        let mut outcome = Ok(None);

        while attempts < max_attempts {
            attempts += 1;
            session.reset();
            outcome = run_once(session, scenario).await;
            if scenario.enters_gameplay() {
                session.restore_after_scenario().await;
            }
            match &outcome {
                Ok(_) => break,
                Err(err) if attempts < max_attempts => {
                    warn!(attempt = attempts, max_attempts, stage = err.stage(), error = %err, "attempt failed; retrying");
                }
                Err(_) => {}
            }
        }

        let report = build_report(scenario, attempts, started, &outcome);
        match serde_json::to_string(&report) {
            Ok(line) => info!(report = %line, "scenario finished"),
            Err(err) => error!(error = %err, "could not serialize scenario report"),
        }
        report
    }
    .instrument(span)
    .await
}

fn build_report(
    scenario: Scenario,
    attempts: u32,
    started: Instant,
    outcome: &Result<Option<KillReport>, ScenarioError>,
) -> ScenarioReportDto {
    let kill = outcome.as_ref().ok().and_then(Option::as_ref);
    let failure = outcome.as_ref().err();
    ScenarioReportDto {
        scenario: scenario.as_str().to_string(),
        passed: outcome.is_ok(),
        attempts,
        elapsed_ms: started.elapsed().as_millis() as u64,
        stage: failure.map(|err| err.stage().to_string()),
        error: failure.map(ToString::to_string),
        kills: kill.map(|k| k.kills),
        fired: kill.map(|k| k.fired),
    }
}

/// Runs `scenarios` in order. Every scenario runs even after a failure.
pub async fn run_all<D: AutomationDriver>(session: &mut Session<D>, scenarios: &[Scenario]) -> Vec<ScenarioReportDto> {
    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        reports.push(run_scenario(session, *scenario).await);
    }
    let passed = reports.iter().filter(|r| r.passed).count();
    info!(passed, total = reports.len(), "run complete");
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_round_trip_and_ignore_case() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.as_str().parse::<Scenario>(), Ok(scenario));
        }
        assert_eq!(" AIM_SHOOT_KILL ".parse::<Scenario>(), Ok(Scenario::AimShootKill));
        assert_eq!(
            "fly".parse::<Scenario>(),
            Err(UnknownScenario("fly".to_string()))
        );
    }

    #[test]
    fn only_the_kill_scenario_retries() {
        let config = AutotestConfig::default();
        assert_eq!(Scenario::AimShootKill.retries(&config), 2);
        assert_eq!(Scenario::HudIsVisible.retries(&config), 0);
        assert!(!Scenario::ViewportIsValid.enters_gameplay());
        assert!(Scenario::PlayerMovementChangesPosition.enters_gameplay());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_outcome_report_names_the_stage() {
        let started = Instant::now();
        let outcome: Result<Option<KillReport>, ScenarioError> =
            Err(ScenarioError::not_found("find_player", "no candidates"));
        let report = build_report(Scenario::HudIsVisible, 1, started, &outcome);
        assert!(!report.passed);
        assert_eq!(report.stage.as_deref(), Some("find_player"));
        assert_eq!(report.error.as_deref(), Some("find_player: no candidates"));
        assert_eq!(report.kills, None);
    }
}
