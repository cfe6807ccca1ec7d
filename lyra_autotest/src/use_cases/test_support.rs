// Engine-side test helpers: the test-support subsystem (look-at, continuous
// aim+fire, cheats) and the static enemy-query fallbacks for the cheats.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::classify::contains_ignore_case;
use crate::domain::{AutomationDriver, CallArg, EntityId, MethodCall, RemoteEntity, Vec3};
use crate::use_cases::dispatch::{as_entity_id, by_component};
use crate::use_cases::session::Session;

const SUBSYSTEM_TYPE: &str = "LyraTestSupportSubsystem";
const SUBSYSTEM_NAMES: &[&str] = &["LyraTestSupportSubsystem", "ULyraTestSupportSubsystem"];
const SUBSYSTEM_DEFAULT_OBJECTS: &[&str] = &[
    "Default__LyraTestSupportSubsystem",
    "Default__ULyraTestSupportSubsystem",
    "LyraTestSupportSubsystem",
    "ULyraTestSupportSubsystem",
];
const SUBSYSTEM_MODULES: &[&str] = &["LyraGame", "Core"];
const QUERY_TYPES: &[&str] = &["LyraTestEnemyQuery", "ULyraTestEnemyQuery"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cheat {
    Invincible,
    InfiniteAmmo,
}

impl Cheat {
    fn method(self) -> &'static str {
        match self {
            Cheat::Invincible => "SetLocalPlayerInvincible",
            Cheat::InfiniteAmmo => "SetLocalPlayerInfiniteAmmo",
        }
    }
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    /// The test-support subsystem object. The cached handle is re-validated
    /// by id before use.
    pub async fn test_support_subsystem(&mut self) -> Option<RemoteEntity> {
        if let Some(cached) = self.subsystem.take() {
            if let Ok(Some(fresh)) = self.driver.find_by_id(cached.id, false).await {
                self.subsystem = Some(fresh.clone());
                return Some(fresh);
            }
            debug!(id = cached.id, "cached subsystem no longer resolves");
        }

        let found = match self.subsystem_by_direct_search().await {
            Some(sub) => Some(sub),
            None => self.subsystem_via_game_instance().await,
        };
        if let Some(sub) = &found {
            debug!(id = sub.id, name = %sub.name, type_name = %sub.type_name, "test-support subsystem found");
        }
        self.subsystem = found.clone();
        found
    }

    async fn subsystem_by_direct_search(&self) -> Option<RemoteEntity> {
        for name in SUBSYSTEM_NAMES {
            for enabled in [false, true] {
                if let Some(found) = self.find_named(name, enabled).await {
                    return Some(found);
                }
                if let Some(found) = self.find_containing(name, enabled).await {
                    return Some(found);
                }
            }
        }
        let all = self.all_elements(false).await;
        let by_type = all.into_iter().find(|o| {
            SUBSYSTEM_NAMES
                .iter()
                .any(|n| contains_ignore_case(&o.type_name, n))
        });
        if by_type.is_some() {
            return by_type;
        }
        for name in SUBSYSTEM_NAMES {
            if let Some(first) = self.find_all_containing(name, false).await.into_iter().next() {
                return Some(first);
            }
        }
        None
    }

    // Class default object -> class id -> world -> game instance -> subsystem.
    async fn subsystem_via_game_instance(&mut self) -> Option<RemoteEntity> {
        let controller = self.player_controller().await?;

        let mut default_object = None;
        for name in SUBSYSTEM_DEFAULT_OBJECTS {
            default_object = self.find_named(name, false).await;
            if default_object.is_some() {
                break;
            }
        }
        let default_object = default_object?;

        let class_id = self
            .single_id(default_object.id, MethodCall::new("Object", "GetClass", "Core"))
            .await?;
        let world_id = self
            .single_id(controller.id, MethodCall::new("PlayerController", "GetWorld", "Engine"))
            .await?;
        let world = self.resolve_id(world_id).await?;
        let instance_id = self
            .single_id(world.id, MethodCall::new("World", "GetGameInstance", "Engine"))
            .await?;
        let instance = self.resolve_id(instance_id).await?;
        let subsystem_id = self
            .single_id(
                instance.id,
                MethodCall::new("GameInstance", "GetSubsystem", "Engine").arg(CallArg::Int(class_id)),
            )
            .await?;
        self.resolve_id(subsystem_id).await
    }

    async fn single_id(&self, target: EntityId, call: MethodCall) -> Option<EntityId> {
        self.first_component_answer(target, std::slice::from_ref(&call), as_entity_id)
            .await
    }

    // Calls `method` on the subsystem; a subsystem that answers nothing is
    // dropped from the cache.
    async fn call_subsystem(&mut self, method: &str, args: &[CallArg]) -> bool {
        let Some(sub) = self.test_support_subsystem().await else {
            return false;
        };
        let calls = by_component(
            &[SUBSYSTEM_TYPE, "ULyraTestSupportSubsystem", sub.type_name.as_str()],
            SUBSYSTEM_MODULES,
            method,
            args,
        );
        if self.first_component_success(sub.id, &calls).await {
            return true;
        }
        debug!(method, "subsystem call failed on every candidate; dropping cache");
        self.subsystem = None;
        false
    }

    /// Asks the subsystem to turn the local player toward `point`.
    pub async fn set_look_at_via_subsystem(&mut self, point: Vec3) -> bool {
        self.call_subsystem(
            "SetLocalPlayerLookAtWorldPosition",
            &[
                CallArg::Float(point.x),
                CallArg::Float(point.y),
                CallArg::Float(point.z),
            ],
        )
        .await
    }

    /// Per-frame aim and fire at the nearest enemy, handled inside the engine.
    pub async fn set_continuous_aim_fire(&mut self, enabled: bool) -> bool {
        let ok = self
            .call_subsystem("SetContinuousAimFireEnabled", &[CallArg::Bool(enabled)])
            .await;
        debug!(enabled, ok, "continuous aim+fire");
        ok
    }

    async fn set_cheat(&mut self, cheat: Cheat, enable: bool) -> bool {
        if self.call_subsystem(cheat.method(), &[CallArg::Bool(enable)]).await {
            return true;
        }
        let world_id = self.world_context_id().await;
        if world_id == 0 {
            return false;
        }
        let mut calls = Vec::new();
        for component in QUERY_TYPES {
            for module in SUBSYSTEM_MODULES {
                calls.push(
                    MethodCall::new(*component, cheat.method(), *module)
                        .args([CallArg::Int(world_id), CallArg::Bool(enable)]),
                );
            }
        }
        self.first_static_success(&calls).await
    }

    pub async fn set_invincible(&mut self, enable: bool) -> bool {
        self.set_cheat(Cheat::Invincible, enable).await
    }

    pub async fn set_infinite_ammo(&mut self, enable: bool) -> bool {
        self.set_cheat(Cheat::InfiniteAmmo, enable).await
    }

    /// Applies (or clears) both cheats, retrying until both stick or the
    /// attempts run out. Returns whether both were applied.
    pub async fn ensure_test_cheats(&mut self, enable: bool, attempts: u32, delay: Duration) -> bool {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            let invincible = self.set_invincible(enable).await;
            let ammo = self.set_infinite_ammo(enable).await;
            if invincible && ammo {
                info!(enable, attempt, "test cheats applied");
                return true;
            }
            debug!(enable, attempt, invincible, ammo, "test cheats not fully applied");
            if attempt < attempts {
                self.pause(delay).await;
            }
        }
        warn!(enable, attempts, "test cheats could not be applied");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheats_map_to_engine_setters() {
        assert_eq!(Cheat::Invincible.method(), "SetLocalPlayerInvincible");
        assert_eq!(Cheat::InfiniteAmmo.method(), "SetLocalPlayerInfiniteAmmo");
    }
}
