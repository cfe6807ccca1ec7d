// Angle math for aiming: direction to pitch/yaw, angle wrapping, and the
// incremental look-input controller.

use crate::domain::entity::Vec3;

pub const PITCH_MIN_DEG: f32 = -89.0;
pub const PITCH_MAX_DEG: f32 = 89.0;

/// Below this distance two points are treated as the same point.
pub const MIN_DIRECTION_LENGTH: f32 = 1e-4;

/// Default upper bound used by [`is_in_combat_range`].
pub const DEFAULT_MAX_COMBAT_DISTANCE: f32 = 50_000.0;

/// View orientation in degrees.
///
/// Pitch stays in `[-89, 89]` so the view can never flip over the pole; yaw
/// stays in `(-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchYaw {
    pub pitch: f32,
    pub yaw: f32,
}

impl PitchYaw {
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self {
            pitch: pitch.clamp(PITCH_MIN_DEG, PITCH_MAX_DEG),
            yaw: normalize_angle(yaw),
        }
    }
}

/// Wraps any finite angle into `(-180, 180]`.
///
/// Values already in range are returned untouched, which keeps the function
/// idempotent even where float rounding near the boundary would otherwise
/// move them.
pub fn normalize_angle(deg: f32) -> f32 {
    if deg > -180.0 && deg <= 180.0 {
        return deg;
    }
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Orientation that looks from `from` towards `to`.
///
/// Returns `None` for (nearly) coincident points instead of producing NaN.
pub fn direction_to_pitch_yaw(from: Vec3, to: Vec3) -> Option<PitchYaw> {
    let delta = to - from;
    let len = delta.length();
    if !len.is_finite() || len < MIN_DIRECTION_LENGTH {
        return None;
    }

    let (dx, dy, dz) = (delta.x / len, delta.y / len, delta.z / len);
    let yaw = dy.atan2(dx).to_degrees();
    let pitch = dz.clamp(-1.0, 1.0).asin().to_degrees();
    Some(PitchYaw::new(pitch, yaw))
}

/// Shortest signed `(yaw, pitch)` error from `current` to `desired`.
pub fn angular_error(current: PitchYaw, desired: PitchYaw) -> (f32, f32) {
    (
        normalize_angle(desired.yaw - current.yaw),
        normalize_angle(desired.pitch - current.pitch),
    )
}

/// Tuning for the incremental "add yaw/pitch input" aim strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookInputTuning {
    /// Multiplier from degrees of error to controller input units.
    pub gain: f32,
    /// Largest error (degrees) corrected per call; `0` disables clamping.
    pub max_delta_per_call: f32,
    /// Both errors below this many degrees count as aimed.
    pub stop_threshold_deg: f32,
}

impl Default for LookInputTuning {
    fn default() -> Self {
        Self {
            gain: 25.0,
            max_delta_per_call: 15.0,
            stop_threshold_deg: 0.5,
        }
    }
}

/// Result of one incremental aim step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookStep {
    /// Within the stop threshold; no input should be sent.
    Aimed,
    /// Input to send through `AddYawInput` / `AddPitchInput`.
    Input { yaw: f32, pitch: f32 },
}

pub fn look_input_step(current: PitchYaw, desired: PitchYaw, tuning: LookInputTuning) -> LookStep {
    let (yaw_err, pitch_err) = angular_error(current, desired);
    if yaw_err.abs() < tuning.stop_threshold_deg && pitch_err.abs() < tuning.stop_threshold_deg {
        return LookStep::Aimed;
    }

    let limit = tuning.max_delta_per_call;
    let clamp = |err: f32| if limit > 0.0 { err.clamp(-limit, limit) } else { err };
    LookStep::Input {
        yaw: clamp(yaw_err) * tuning.gain,
        pitch: clamp(pitch_err) * tuning.gain,
    }
}

/// Vertical offsets added to raw positions before aiming.
///
/// Entity snapshots and engine position strings report different reference
/// points on the character, so each source keeps its own calibrated offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimOffsets {
    /// Added to targets located through object snapshots.
    pub target_z: f32,
    /// Added to targets reported by the engine position query.
    pub engine_target_z: f32,
    /// Added to our own position to approximate the eye point.
    pub eye_z: f32,
}

impl Default for AimOffsets {
    fn default() -> Self {
        Self {
            target_z: 135.0,
            engine_target_z: 40.0,
            eye_z: 80.0,
        }
    }
}

impl AimOffsets {
    pub fn entity_aim_point(&self, world: Vec3) -> Vec3 {
        world.raised(self.target_z)
    }

    pub fn engine_aim_point(&self, world: Vec3) -> Vec3 {
        world.raised(self.engine_target_z)
    }

    pub fn eye_point(&self, world: Vec3) -> Vec3 {
        world.raised(self.eye_z)
    }
}

/// False for the uninitialized `(0,0,0)` point and anything within one unit of it.
pub fn is_plausible_point(point: Vec3) -> bool {
    point.length_squared() > 1.0
}

/// Sanity check before steering towards `target` from `shooter`.
pub fn is_in_combat_range(shooter: Vec3, target: Vec3, max_distance: f32) -> bool {
    let from_origin = (target.x * target.x + target.y * target.y).sqrt();
    if from_origin < 1.0 {
        return false;
    }
    let dist = shooter.distance(target);
    (0.01..=max_distance).contains(&dist)
}
