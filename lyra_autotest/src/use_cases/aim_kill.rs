// The aim, fire and kill-confirmation loop. The targeting mode is picked once
// from what discovery can see: live player and enemy objects, or only the
// positions the engine reports.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::domain::engagement::{AimTarget, FireDecision, FireGate, KillDebounce, KillPhase, TargetingMode, nearest_enemy};
use crate::domain::parse::EnginePositions;
use crate::domain::{AutomationDriver, EntityId, KillFailure, RemoteEntity, ScenarioError, Vec3};
use crate::use_cases::session::{LogThrottle, Session};

const DIAGNOSTIC_EVERY: Duration = Duration::from_secs(5);
const COUNTERS_EVERY: Duration = Duration::from_secs(15);
const NO_TARGET_LOG_EVERY: Duration = Duration::from_secs(2);
const TELEPORT_ATTEMPTS: u32 = 10;
const TELEPORT_RETRY: Duration = Duration::from_millis(300);
const RETARGET_CHEAT_ATTEMPTS: u32 = 3;
const RETARGET_CHEAT_DELAY: Duration = Duration::from_millis(500);
const SETUP_CHEAT_ATTEMPTS: u32 = 6;
const SETUP_CHEAT_DELAY: Duration = Duration::from_millis(1500);

/// What target acquisition found before the loop starts.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub mode: TargetingMode,
    pub player: Option<RemoteEntity>,
    pub enemy: Option<RemoteEntity>,
    pub positions: Option<EnginePositions>,
    pub controller: Option<RemoteEntity>,
}

impl Acquisition {
    /// First point to aim at: the enemy object, else the first reported
    /// enemy position.
    pub fn initial_target(&self) -> AimTarget {
        if let Some(enemy) = &self.enemy {
            return AimTarget::from_entity(enemy);
        }
        let point = self
            .positions
            .as_ref()
            .and_then(|p| p.enemies.first().copied())
            .unwrap_or(Vec3::ZERO);
        AimTarget::at(point)
    }

    pub fn initial_enemy_count(&self) -> usize {
        self.positions.as_ref().map_or(0, |p| p.enemies.len())
    }
}

/// Outcome of a successful engagement.
#[derive(Debug, Clone, PartialEq)]
pub struct KillReport {
    pub mode: TargetingMode,
    pub kills: u32,
    pub fired: u32,
    pub skipped_not_visible: u32,
    pub elapsed: Duration,
}

// Timers for the periodic log lines inside the loop.
struct LoopLogs {
    started: Instant,
    diagnostic: LogThrottle,
    counters: LogThrottle,
    no_target: LogThrottle,
}

impl LoopLogs {
    fn new() -> Self {
        let mut logs = Self {
            started: Instant::now(),
            diagnostic: LogThrottle::new(DIAGNOSTIC_EVERY),
            counters: LogThrottle::new(COUNTERS_EVERY),
            no_target: LogThrottle::new(NO_TARGET_LOG_EVERY),
        };
        // Periodic lines start one interval in, not on the first tick.
        logs.diagnostic.ready();
        logs.counters.ready();
        logs
    }

    fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.started)
    }
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    /// Finds the player and an enemy, falling back to engine positions, and
    /// fixes the targeting mode for the rest of the run.
    pub async fn acquire_targets(&mut self) -> Result<Acquisition, ScenarioError> {
        let cfg = self.config.engagement.clone();
        debug!(phase = KillPhase::Searching.as_str(), "acquiring targets");

        let mut player = None;
        for attempt in 1..=cfg.player_fetch_attempts.max(1) {
            player = self.find_player().await;
            match &player {
                Some(p) => {
                    info!(attempt, id = p.id, name = %p.name, type_name = %p.type_name, "player found");
                    break;
                }
                None => info!(attempt, attempts = cfg.player_fetch_attempts, "player not found"),
            }
            if attempt < cfg.player_fetch_attempts {
                sleep(cfg.player_fetch_interval).await;
            }
        }

        let mut positions = None;
        let mut enemy = None;
        match &player {
            None => {
                positions = self
                    .engine_positions_with_retries(cfg.engine_position_attempts, cfg.engine_position_delay)
                    .await;
                if positions.is_none() {
                    return Err(ScenarioError::not_found(
                        "acquire_targets",
                        format!(
                            "no player pawn and the engine reported no other players after {} attempts",
                            cfg.engine_position_attempts
                        ),
                    ));
                }
            }
            Some(p) => {
                enemy = self
                    .find_enemy_with_retries(p.id, cfg.enemy_find_attempts, cfg.enemy_find_timeout, cfg.enemy_find_delay)
                    .await;
                if enemy.is_none() {
                    positions = self
                        .test_positions_from_engine()
                        .await
                        .filter(|found| !found.enemies.is_empty());
                }
            }
        }

        let mode = match (&player, &enemy) {
            (Some(p), Some(_)) => TargetingMode::PawnTracked { player_id: p.id },
            _ if positions.is_some() => {
                let continuous_fire = self.set_continuous_aim_fire(true).await;
                if continuous_fire {
                    info!("continuous aim+fire enabled; only polling for the kill");
                }
                TargetingMode::ControllerOnly {
                    world_id: self.world_context_id().await,
                    continuous_fire,
                }
            }
            _ => {
                return Err(ScenarioError::not_found(
                    "acquire_targets",
                    "no other player found through object lookup or engine positions",
                ));
            }
        };
        let controller = if mode.is_controller_only() {
            self.player_controller().await
        } else {
            None
        };

        let acquisition = Acquisition {
            mode,
            player,
            enemy,
            positions,
            controller,
        };
        info!(
            ?mode,
            enemy = ?acquisition.enemy.as_ref().map(|e| e.id),
            engine_enemies = acquisition.initial_enemy_count(),
            "targets acquired"
        );
        Ok(acquisition)
    }

    /// Aims and fires until `kills_required` kills are confirmed, no further
    /// target exists, or the shoot timeout expires.
    pub async fn engage_until_kill(&mut self) -> Result<KillReport, ScenarioError> {
        let acquisition = self.acquire_targets().await?;
        let target = acquisition.initial_target();
        let initial_count = acquisition.initial_enemy_count();

        self.ensure_test_cheats(true, SETUP_CHEAT_ATTEMPTS, SETUP_CHEAT_DELAY)
            .await;
        if target.is_plausible() {
            self.teleport_with_retries(target.point).await;
        }

        match acquisition.mode {
            TargetingMode::PawnTracked { player_id } => {
                let Some(enemy) = acquisition.enemy else {
                    return Err(ScenarioError::not_found("engage", "pawn-tracked mode without an enemy"));
                };
                self.engage_pawn_tracked(player_id, enemy).await
            }
            TargetingMode::ControllerOnly {
                world_id,
                continuous_fire,
            } => {
                self.engage_controller_only(
                    acquisition.mode,
                    world_id,
                    continuous_fire,
                    acquisition.controller,
                    initial_count,
                    target,
                )
                .await
            }
        }
    }

    async fn teleport_with_retries(&mut self, point: Vec3) -> bool {
        for attempt in 1..=TELEPORT_ATTEMPTS {
            if self.teleport_player_to(point).await {
                return true;
            }
            if attempt < TELEPORT_ATTEMPTS {
                sleep(TELEPORT_RETRY).await;
            }
        }
        warn!(?point, "could not teleport next to the target");
        false
    }

    async fn engage_controller_only(
        &mut self,
        mode: TargetingMode,
        world_id: EntityId,
        continuous_fire: bool,
        controller: Option<RemoteEntity>,
        initial_count: usize,
        mut target: AimTarget,
    ) -> Result<KillReport, ScenarioError> {
        let cfg = self.config.engagement.clone();
        let offsets = self.config.aim.offsets;
        let deadline = Instant::now() + cfg.shoot_timeout;
        let mut debounce = KillDebounce::new(initial_count, cfg.required_consecutive_polls);
        let mut logs = LoopLogs::new();
        let mut kills = 0;
        let mut fired = 0;

        while Instant::now() < deadline {
            let plausible = target.is_plausible();
            let aim_point = offsets.engine_aim_point(target.point);

            let observed = if continuous_fire {
                self.enemy_only_positions(world_id).await
            } else {
                let mut used_combined = false;
                let mut observed = self.positions_and_aim_at(world_id, aim_point, plausible).await;
                if observed.is_some() {
                    used_combined = true;
                } else {
                    observed = self.enemy_only_positions(world_id).await;
                    let steered = observed.is_some() && self.set_look_at_via_subsystem(aim_point).await;
                    if !steered && plausible {
                        self.aim_at_position_from_camera(controller.as_ref(), target.point)
                            .await;
                    }
                }
                if let Some(positions) = &observed {
                    if let Some(next) =
                        nearest_enemy(&positions.enemies, positions.player, target.point, cfg.z_band)
                    {
                        target = AimTarget::at(next);
                    }
                }
                if plausible {
                    if !used_combined {
                        self.fire(cfg.fire_hold).await?;
                    }
                    fired += 1;
                }
                observed
            };

            if let Some(positions) = &observed {
                let count = positions.enemies.len();
                if debounce.observe(count) {
                    kills += 1;
                    info!(
                        phase = KillPhase::ConfirmingKill.as_str(),
                        initial = debounce.initial(),
                        count,
                        kills,
                        "enemy count dropped; kill confirmed"
                    );
                    let done = kills >= cfg.kills_required;
                    if done || count == 0 {
                        if !done {
                            info!(phase = KillPhase::Done.as_str(), kills, "engine reports no enemies left");
                        }
                        return Ok(KillReport {
                            mode,
                            kills,
                            fired,
                            skipped_not_visible: 0,
                            elapsed: logs.elapsed(),
                        });
                    }
                    debounce = KillDebounce::new(count, cfg.required_consecutive_polls);
                }
            }

            if logs.diagnostic.ready() {
                info!(
                    elapsed_s = logs.elapsed().as_secs(),
                    aim_at = ?target.point,
                    consecutive = debounce.consecutive(),
                    "controller-only diagnostic"
                );
            }
            if logs.counters.ready() {
                info!(fired, "shoot phase");
            }
            sleep(cfg.tick_interval).await;
        }

        Err(ScenarioError::KillNotConfirmed {
            timeout_secs: cfg.shoot_timeout.as_secs(),
            failure: KillFailure::CountNeverDropped {
                initial_count: debounce.initial(),
            },
        })
    }

    async fn engage_pawn_tracked(
        &mut self,
        player_id: EntityId,
        enemy: RemoteEntity,
    ) -> Result<KillReport, ScenarioError> {
        let cfg = self.config.engagement.clone();
        let offsets = self.config.aim.offsets;
        let mode = TargetingMode::PawnTracked { player_id };
        let deadline = Instant::now() + cfg.shoot_timeout;
        let mut target_id = enemy.id;
        let mut target = AimTarget::from_entity(&enemy);
        let mut gate = FireGate::new(cfg.fire_interval, cfg.force_fire_interval, Instant::now());
        let mut logs = LoopLogs::new();
        let mut last_missing_check: Option<Instant> = None;
        let mut controller: Option<RemoteEntity> = None;
        let mut kills = 0;

        while Instant::now() < deadline {
            let now = Instant::now();
            let player = self.entity_by_id(player_id).await;
            let mut current = self.entity_by_id(target_id).await;

            let recheck_due = last_missing_check
                .is_none_or(|at| now.saturating_duration_since(at) >= cfg.missing_target_recheck);
            if current.is_none() && recheck_due {
                last_missing_check = Some(now);
                if let Some(found) = self
                    .try_find_enemy(player_id, cfg.missing_target_search_timeout)
                    .await
                {
                    if found.id != target_id {
                        info!(old = target_id, new = found.id, "target vanished; switching");
                        target_id = found.id;
                        target = AimTarget::from_entity(&found);
                        self.ensure_test_cheats(true, RETARGET_CHEAT_ATTEMPTS, RETARGET_CHEAT_DELAY)
                            .await;
                        self.teleport_player_to(target.point).await;
                        current = Some(found);
                    }
                }
            }

            if controller.is_none() {
                if let Some(p) = &player {
                    controller = self.controller_for(p).await;
                }
            }

            match &current {
                Some(enemy) if player.as_ref().is_some_and(|p| p.id == enemy.id) => {
                    if logs.no_target.ready() {
                        warn!(id = enemy.id, "player and enemy are the same object; not aiming");
                    }
                }
                Some(enemy) if !AimTarget::from_entity(enemy).is_plausible() => {
                    if logs.no_target.ready() {
                        debug!(id = enemy.id, "enemy position not initialized yet; not aiming");
                    }
                }
                Some(enemy) => {
                    target = AimTarget::from_entity(enemy);
                    let aim_point = offsets.entity_aim_point(enemy.world);
                    if !self.set_look_at_via_subsystem(aim_point).await {
                        self.aim_at_enemy_from_camera(enemy).await;
                    }
                }
                None if target.is_plausible() => {
                    if logs.no_target.ready() {
                        debug!(target_id, point = ?target.point, "no live target; aiming at last known position");
                    }
                    let aim_point = offsets.engine_aim_point(target.point);
                    if !self.set_look_at_via_subsystem(aim_point).await {
                        self.aim_at_position_from_camera(controller.as_ref(), target.point)
                            .await;
                    }
                }
                None => {}
            }

            if logs.diagnostic.ready() {
                info!(
                    elapsed_s = logs.elapsed().as_secs(),
                    player = ?player.as_ref().map(|p| (p.id, p.world)),
                    enemy = ?current.as_ref().map(|e| (e.id, e.world)),
                    aim_at = ?target.point,
                    "aim diagnostic"
                );
            }

            if gate.ready(now) {
                let live = current
                    .as_ref()
                    .filter(|enemy| AimTarget::from_entity(enemy).is_plausible());
                let visible = match live {
                    Some(enemy) => self.is_target_visible(enemy).await,
                    None => false,
                };
                if let FireDecision::Fire { forced } = gate.decide(now, visible, live.is_some()) {
                    debug!(phase = KillPhase::Firing.as_str(), forced, target_id, "fire");
                    self.fire(cfg.fire_hold).await?;

                    let destroyed = self
                        .poll_until_target_destroyed(target_id, cfg.kill_confirm_timeout, cfg.kill_confirm_poll)
                        .await
                        || self.entity_by_id(target_id).await.is_none();
                    if destroyed {
                        kills += 1;
                        info!(phase = KillPhase::ConfirmingKill.as_str(), target_id, kills, "kill confirmed");
                        let report = |kills| KillReport {
                            mode,
                            kills,
                            fired: gate.fired,
                            skipped_not_visible: gate.skipped_not_visible,
                            elapsed: logs.elapsed(),
                        };
                        if kills >= cfg.kills_required {
                            return Ok(report(kills));
                        }

                        debug!(phase = KillPhase::Retarget.as_str(), "looking for the next enemy");
                        let Some(next) = self
                            .find_enemy_with_retries(
                                player_id,
                                cfg.next_enemy_attempts,
                                cfg.next_enemy_timeout,
                                cfg.next_enemy_delay,
                            )
                            .await
                        else {
                            info!(phase = KillPhase::Done.as_str(), kills, "no further target");
                            return Ok(report(kills));
                        };
                        target_id = next.id;
                        target = AimTarget::from_entity(&next);
                        self.ensure_test_cheats(true, RETARGET_CHEAT_ATTEMPTS, RETARGET_CHEAT_DELAY)
                            .await;
                        self.teleport_player_to(target.point).await;
                    }
                }
            }

            if logs.counters.ready() {
                info!(fired = gate.fired, skipped_not_visible = gate.skipped_not_visible, "shoot phase");
            }
            sleep(cfg.tick_interval).await;
        }

        Err(ScenarioError::KillNotConfirmed {
            timeout_secs: cfg.shoot_timeout.as_secs(),
            failure: KillFailure::NoNextTarget {
                last_enemy_id: target_id,
            },
        })
    }
}
