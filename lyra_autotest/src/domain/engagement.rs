// Pure state used by the aim/fire/kill loop. Nothing here talks to the driver;
// the loop feeds observations in and acts on the answers.

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::entity::{EntityId, RemoteEntity, Vec3};
use crate::domain::geometry::is_plausible_point;

/// Point to aim at, refreshed from the latest observed enemy position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimTarget {
    pub point: Vec3,
    pub owner: Option<EntityId>,
}

impl AimTarget {
    pub fn at(point: Vec3) -> Self {
        Self { point, owner: None }
    }

    pub fn from_entity(entity: &RemoteEntity) -> Self {
        Self {
            point: entity.world,
            owner: Some(entity.id),
        }
    }

    /// Guards against steering at an uninitialized `(0,0,0)` position.
    pub fn is_plausible(&self) -> bool {
        is_plausible_point(self.point)
    }
}

/// How targets are tracked for the whole engagement. Chosen once, never
/// re-derived mid-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetingMode {
    /// Player and enemy are both live objects; kills are confirmed by the
    /// enemy id disappearing.
    PawnTracked { player_id: EntityId },
    /// Only engine-reported positions are available; kills are confirmed by
    /// the reported enemy count dropping.
    ControllerOnly {
        world_id: EntityId,
        continuous_fire: bool,
    },
}

impl TargetingMode {
    pub fn is_controller_only(&self) -> bool {
        matches!(self, TargetingMode::ControllerOnly { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillPhase {
    Searching,
    Aiming,
    Firing,
    ConfirmingKill,
    Retarget,
    Done,
}

impl KillPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            KillPhase::Searching => "searching",
            KillPhase::Aiming => "aiming",
            KillPhase::Firing => "firing",
            KillPhase::ConfirmingKill => "confirming_kill",
            KillPhase::Retarget => "retarget",
            KillPhase::Done => "done",
        }
    }
}

/// Confirms a kill only after the reported enemy count has stayed below its
/// starting value for `required` consecutive polls.
#[derive(Debug, Clone)]
pub struct KillDebounce {
    initial: usize,
    required: u32,
    consecutive: u32,
    confirmed: bool,
}

impl KillDebounce {
    pub fn new(initial: usize, required: u32) -> Self {
        Self {
            initial,
            required: required.max(1),
            consecutive: 0,
            confirmed: false,
        }
    }

    pub fn initial(&self) -> usize {
        self.initial
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Feeds one successful poll. Returns true once the kill is confirmed and
    /// keeps returning true afterwards.
    pub fn observe(&mut self, count: usize) -> bool {
        if self.confirmed {
            return true;
        }
        if self.initial >= 1 && count < self.initial {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.confirmed = self.consecutive >= self.required;
        self.confirmed
    }
}

/// Closest engine-reported enemy to the player (or to `last` when the engine
/// did not report the player). Enemies within `z_band` of the reference
/// height win over closer ones on other floors.
pub fn nearest_enemy(enemies: &[Vec3], player: Option<Vec3>, last: Vec3, z_band: f32) -> Option<Vec3> {
    let origin = player.unwrap_or(last);
    let in_band: Vec<Vec3> = enemies
        .iter()
        .copied()
        .filter(|e| (e.z - origin.z).abs() <= z_band)
        .collect();
    let pool: &[Vec3] = if in_band.is_empty() { enemies } else { &in_band[..] };
    pool.iter()
        .copied()
        .min_by(|a, b| {
            (*a - origin)
                .length_squared()
                .total_cmp(&(*b - origin).length_squared())
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    /// Still inside the minimum interval since the last shot.
    Cooldown,
    Fire { forced: bool },
    SkipNotVisible,
}

/// Rate limiter for pawn-tracked firing: shots need the target to be visible
/// unless the longer force-fire interval has elapsed.
#[derive(Debug, Clone)]
pub struct FireGate {
    interval: Duration,
    force_interval: Duration,
    last_fire: Instant,
    last_force: Instant,
    pub fired: u32,
    pub skipped_not_visible: u32,
}

impl FireGate {
    pub fn new(interval: Duration, force_interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            force_interval,
            last_fire: started,
            last_force: started,
            fired: 0,
            skipped_not_visible: 0,
        }
    }

    /// Whether a visibility probe is worth doing at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_fire) >= self.interval
    }

    pub fn decide(&mut self, now: Instant, visible: bool, has_target: bool) -> FireDecision {
        if !self.ready(now) {
            return FireDecision::Cooldown;
        }
        let forced = !visible
            && has_target
            && now.saturating_duration_since(self.last_force) >= self.force_interval;
        if forced {
            self.last_force = now;
        }
        if visible || forced {
            self.last_fire = now;
            self.fired += 1;
            FireDecision::Fire { forced }
        } else {
            self.skipped_not_visible += 1;
            FireDecision::SkipNotVisible
        }
    }
}
