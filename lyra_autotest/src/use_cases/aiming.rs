// Turning the local player toward a world point. Strategies are tried in a
// fixed order: the test-support subsystem, SetControlRotation, then
// incremental look input. Running out of strategies is reported as an outcome,
// never as an error.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::domain::geometry::{LookStep, PitchYaw, direction_to_pitch_yaw, look_input_step};
use crate::domain::parse::{format_rotator, parse_rotator, parse_vector};
use crate::domain::{
    AutomationDriver, CallArg, DriverError, EntityId, Key, MethodCall, RemoteEntity, Vec3,
};
use crate::use_cases::dispatch::{as_entity_id, by_component, by_pairs};
use crate::use_cases::session::Session;

// Below this our own position is treated as not yet replicated.
const MIN_OWN_POSITION_LENGTH: f32 = 10.0;
const MIN_EYE_TO_TARGET: f32 = 1.0;

/// Which strategy handled an aim request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AimOutcome {
    Subsystem,
    ControlRotation,
    LookInput,
    /// Already within the stop threshold; no input was sent.
    AlreadyAimed,
    Skipped(&'static str),
    /// Every strategy failed.
    Unavailable,
}

impl AimOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AimOutcome::Subsystem => "subsystem",
            AimOutcome::ControlRotation => "set_control_rotation",
            AimOutcome::LookInput => "look_input",
            AimOutcome::AlreadyAimed => "already_aimed",
            AimOutcome::Skipped(reason) => *reason,
            AimOutcome::Unavailable => "unavailable",
        }
    }

    pub fn steered(&self) -> bool {
        matches!(
            self,
            AimOutcome::Subsystem
                | AimOutcome::ControlRotation
                | AimOutcome::LookInput
                | AimOutcome::AlreadyAimed
        )
    }
}

fn controller_components(controller: &RemoteEntity) -> [&str; 3] {
    [controller.type_name.as_str(), "PlayerController", "Controller"]
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    /// Current control rotation: the rotator string when available, the
    /// separate yaw/pitch getters otherwise.
    pub async fn control_rotation(&self, controller: &RemoteEntity) -> Option<PitchYaw> {
        let components = controller_components(controller);
        let as_rotator = by_component(&components, &["Engine"], "GetControlRotation", &[]);
        if let Some(rotation) = self
            .first_component_answer(controller.id, &as_rotator, |v| v.as_str().and_then(parse_rotator))
            .await
        {
            return Some(rotation);
        }

        for component in components {
            if component.is_empty() {
                continue;
            }
            let yaw_call = MethodCall::new(component, "GetControlRotationYaw", "Engine");
            let pitch_call = MethodCall::new(component, "GetControlRotationPitch", "Engine");
            let (Ok(yaw), Ok(pitch)) = (
                self.driver.call_component_method(controller.id, &yaw_call).await,
                self.driver.call_component_method(controller.id, &pitch_call).await,
            ) else {
                continue;
            };
            if let (Some(yaw), Some(pitch)) = (yaw.as_f32(), pitch.as_f32()) {
                return Some(PitchYaw { pitch, yaw });
            }
        }
        None
    }

    pub async fn set_control_rotation(&self, controller: &RemoteEntity, desired: PitchYaw) -> bool {
        let ty = controller.type_name.as_str();
        let rotator = format_rotator(desired.pitch, desired.yaw, 0.0);
        let calls = by_pairs(
            &[
                ("Controller", "Engine"),
                ("PlayerController", "Engine"),
                ("Controller", ""),
                ("PlayerController", ""),
                (ty, "Engine"),
                (ty, ""),
            ],
            "SetControlRotation",
            &[CallArg::Str(rotator)],
        );
        self.first_component_success(controller.id, &calls).await
    }

    /// One proportional look-input step toward `desired`.
    pub async fn apply_look_input(&self, controller: &RemoteEntity, desired: PitchYaw) -> AimOutcome {
        let Some(current) = self.control_rotation(controller).await else {
            return AimOutcome::Unavailable;
        };
        let (yaw, pitch) = match look_input_step(current, desired, self.config.aim.look) {
            LookStep::Aimed => return AimOutcome::AlreadyAimed,
            LookStep::Input { yaw, pitch } => (yaw, pitch),
        };
        for component in controller_components(controller) {
            if component.is_empty() {
                continue;
            }
            let add_yaw = MethodCall::new(component, "AddYawInput", "Engine").arg(CallArg::Float(yaw));
            let add_pitch = MethodCall::new(component, "AddPitchInput", "Engine").arg(CallArg::Float(pitch));
            if self.driver.call_component_method(controller.id, &add_yaw).await.is_err() {
                continue;
            }
            if self.driver.call_component_method(controller.id, &add_pitch).await.is_ok() {
                return AimOutcome::LookInput;
            }
        }
        AimOutcome::Unavailable
    }

    /// SetControlRotation, falling back to look input.
    pub async fn apply_aim(&mut self, controller: &RemoteEntity, desired: PitchYaw) -> AimOutcome {
        if self.set_control_rotation(controller, desired).await {
            return AimOutcome::ControlRotation;
        }
        if !self.look_input_fallback_logged {
            self.look_input_fallback_logged = true;
            info!("SetControlRotation not available; falling back to AddYawInput/AddPitchInput");
        }
        self.apply_look_input(controller, desired).await
    }

    /// Aims from the eye point above `ours` toward `target` (already offset).
    pub async fn update_look_at_from_to(
        &mut self,
        controller: &RemoteEntity,
        ours: Vec3,
        target: Vec3,
    ) -> AimOutcome {
        let eye = self.config.aim.offsets.eye_point(ours);
        let Some(desired) = direction_to_pitch_yaw(eye, target) else {
            return AimOutcome::Skipped("degenerate direction");
        };
        self.apply_aim(controller, desired).await
    }

    /// Controller possessing `pawn`, if the pawn reports one.
    pub async fn controller_from_pawn(&self, pawn: &RemoteEntity) -> Option<RemoteEntity> {
        let calls = by_component(
            &["Pawn", "Character", pawn.type_name.as_str(), "LyraCharacter"],
            &["Engine"],
            "GetController",
            &[],
        );
        for call in &calls {
            let Some(id) = self
                .first_component_answer(pawn.id, std::slice::from_ref(call), as_entity_id)
                .await
            else {
                continue;
            };
            if let Some(controller) = self.entity_by_id(id).await {
                return Some(controller);
            }
        }
        None
    }

    pub async fn controller_for(&mut self, pawn: &RemoteEntity) -> Option<RemoteEntity> {
        match self.controller_from_pawn(pawn).await {
            Some(controller) => Some(controller),
            None => self.player_controller().await,
        }
    }

    /// Aims from `player`'s eye at `target`'s aim point.
    pub async fn aim_exactly_at_target(&mut self, player: &RemoteEntity, target: &RemoteEntity) -> AimOutcome {
        self.aim_frames += 1;
        let every = u64::from(self.config.aim.log_every_frames.max(1));
        let log_frame = self.aim_frames % every == 0;

        if player.id == target.id {
            if log_frame {
                debug!(id = player.id, "aim skipped: player and target are the same object");
            }
            return AimOutcome::Skipped("same object");
        }

        let offsets = self.config.aim.offsets;
        let aim_point = offsets.entity_aim_point(target.world);
        let ours = player.world;
        if ours.length() < MIN_OWN_POSITION_LENGTH {
            if log_frame {
                debug!(id = player.id, "aim skipped: own position near origin");
            }
            return AimOutcome::Skipped("own position near origin");
        }
        let eye = offsets.eye_point(ours);
        let distance = eye.distance(aim_point);
        if distance < MIN_EYE_TO_TARGET {
            if log_frame {
                debug!(?eye, ?aim_point, "aim skipped: eye and target coincide");
            }
            return AimOutcome::Skipped("eye and target coincide");
        }

        let outcome = if self.set_look_at_via_subsystem(aim_point).await {
            AimOutcome::Subsystem
        } else {
            match self.controller_for(player).await {
                Some(controller) => self.update_look_at_from_to(&controller, ours, aim_point).await,
                None => AimOutcome::Skipped("no controller"),
            }
        };

        if log_frame {
            debug!(
                frame = self.aim_frames,
                path = outcome.as_str(),
                player_id = player.id,
                target_id = target.id,
                ?eye,
                ?aim_point,
                distance,
                "aim"
            );
        }
        outcome
    }

    /// Camera world location: the camera manager when reachable, else the
    /// controller's focal location.
    pub async fn camera_location(&self, controller: &RemoteEntity) -> Option<Vec3> {
        let manager_calls = by_component(
            &[controller.type_name.as_str(), "PlayerController"],
            &["Engine", ""],
            "GetPlayerCameraManager",
            &[],
        );
        let manager = match self
            .first_component_answer(controller.id, &manager_calls, as_entity_id)
            .await
        {
            Some(id) => self.resolve_id(id).await,
            None => None,
        };
        if let Some(manager) = manager {
            let calls = by_component(
                &[manager.type_name.as_str(), "PlayerCameraManager"],
                &["Engine", ""],
                "GetCameraLocation",
                &[],
            );
            if let Some(location) = self
                .first_component_answer(manager.id, &calls, |v| v.as_str().and_then(parse_vector))
                .await
            {
                return Some(location);
            }
        }

        let calls = by_component(
            &controller_components(controller),
            &["Engine", ""],
            "GetFocalLocation",
            &[],
        );
        self.first_component_answer(controller.id, &calls, |v| v.as_str().and_then(parse_vector))
            .await
    }

    async fn aim_from_camera(&mut self, controller: &RemoteEntity, target: Vec3) -> AimOutcome {
        let Some(camera) = self.camera_location(controller).await else {
            return AimOutcome::Skipped("no camera location");
        };
        let Some(desired) = direction_to_pitch_yaw(camera, target) else {
            return AimOutcome::Skipped("degenerate direction");
        };
        self.apply_aim(controller, desired).await
    }

    /// Aims the camera at an enemy object's aim point.
    pub async fn aim_at_enemy_from_camera(&mut self, enemy: &RemoteEntity) -> AimOutcome {
        let Some(controller) = self.player_controller().await else {
            return AimOutcome::Skipped("no controller");
        };
        let target = self.config.aim.offsets.entity_aim_point(enemy.world);
        self.aim_from_camera(&controller, target).await
    }

    /// Aims the camera at an engine-reported position.
    pub async fn aim_at_position_from_camera(
        &mut self,
        controller: Option<&RemoteEntity>,
        point: Vec3,
    ) -> AimOutcome {
        let controller = match controller {
            Some(controller) => controller.clone(),
            None => match self.player_controller().await {
                Some(controller) => controller,
                None => return AimOutcome::Skipped("no controller"),
            },
        };
        let target = self.config.aim.offsets.engine_aim_point(point);
        self.aim_from_camera(&controller, target).await
    }

    /// Holds the primary fire button.
    pub async fn fire(&self, hold: Duration) -> Result<(), DriverError> {
        self.driver.press_key(Key::Mouse0, hold).await
    }

    /// True when a hit-test at the target's screen position returns the target.
    pub async fn is_target_visible(&self, target: &RemoteEntity) -> bool {
        self.hit_test_is(target).await
    }

    /// Polls until `id` is absent from the full object list. A failed listing
    /// is not taken as proof of destruction.
    pub async fn poll_until_target_destroyed(&self, id: EntityId, timeout: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match self.driver.all_elements(false).await {
                Ok(elements) if elements.iter().all(|e| e.id != id) => return true,
                Ok(_) => {}
                Err(err) => debug!(id, error = %err, "listing failed while confirming kill"),
            }
            sleep(poll).await;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_steering_outcomes_count_as_aimed() {
        assert!(AimOutcome::Subsystem.steered());
        assert!(AimOutcome::AlreadyAimed.steered());
        assert!(!AimOutcome::Unavailable.steered());
        assert!(!AimOutcome::Skipped("no controller").steered());
        assert_eq!(AimOutcome::Skipped("no controller").as_str(), "no controller");
    }
}
