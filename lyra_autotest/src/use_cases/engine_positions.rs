// Position queries served by the engine-side test-support module. These work
// even when no player or enemy object is reachable through the object tree.

use std::time::Duration;

use tracing::{debug, info};

use crate::domain::parse::{self, EnginePositions};
use crate::domain::{AutomationDriver, CallArg, EntityId, MethodCall, Vec3};
use crate::use_cases::session::Session;

const ENEMY_QUERY: &str = "LyraTestEnemyQuery";
const ENEMY_QUERY_MODULE: &str = "LyraGame";
const PREVIEW_CHARS: usize = 120;

fn enemy_query(method: &str, world_id: EntityId) -> MethodCall {
    MethodCall::new(ENEMY_QUERY, method, ENEMY_QUERY_MODULE)
        .args([CallArg::Int(world_id), CallArg::Int(0)])
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    // Raw string answer of a static query; None on failure or blank output.
    async fn query_string(&self, call: &MethodCall) -> Option<String> {
        match self.driver.call_static_method(call).await {
            Ok(value) => {
                let raw = value.as_str().unwrap_or_default();
                debug!(%call, answer = %parse::preview(raw, PREVIEW_CHARS), "engine query");
                (!raw.trim().is_empty()).then(|| raw.to_string())
            }
            Err(err) => {
                debug!(%call, error = %err, "engine query failed");
                None
            }
        }
    }

    /// Enemy-only positions (plus the local player) for `world_id`.
    pub async fn enemy_only_positions(&self, world_id: EntityId) -> Option<EnginePositions> {
        if world_id == 0 {
            return None;
        }
        let raw = self
            .query_string(&enemy_query("GetEnemyOnlyTestPositionsAsString", world_id))
            .await?;
        parse::parse_test_positions(&raw)
    }

    /// Every non-local position the engine knows about for `world_id`.
    pub async fn test_positions(&self, world_id: EntityId) -> Option<EnginePositions> {
        if world_id == 0 {
            return None;
        }
        let raw = self
            .query_string(&enemy_query("GetTestPositionsAsString", world_id))
            .await?;
        parse::parse_test_positions(&raw)
    }

    /// Plain `x,y,z|...` enemy list from the oldest query.
    pub async fn enemy_locations_legacy(&self, world_id: EntityId) -> Vec<Vec3> {
        if world_id == 0 {
            return Vec::new();
        }
        match self
            .query_string(&enemy_query("GetEnemyLocationsAsString", world_id))
            .await
        {
            Some(raw) => parse::parse_enemy_locations(&raw),
            None => Vec::new(),
        }
    }

    /// All positions, falling back to the legacy enemy list when the newer
    /// query is missing or empty.
    pub async fn test_positions_from_engine(&mut self) -> Option<EnginePositions> {
        let world_id = self.world_context_id().await;
        if world_id == 0 {
            info!("no world context; cannot query engine positions");
            return None;
        }
        if let Some(positions) = self.test_positions(world_id).await {
            debug!(
                player = positions.player.is_some(),
                enemies = positions.enemies.len(),
                "parsed engine positions"
            );
            return Some(positions);
        }
        let enemies = self.enemy_locations_legacy(world_id).await;
        debug!(count = enemies.len(), "legacy enemy locations");
        (!enemies.is_empty()).then_some(EnginePositions {
            player: None,
            enemies,
        })
    }

    /// Enemy-only positions when any enemy is reported, otherwise
    /// [`Session::test_positions_from_engine`].
    pub async fn enemy_only_positions_from_engine(&mut self) -> Option<EnginePositions> {
        let world_id = self.world_context_id().await;
        if let Some(positions) = self.enemy_only_positions(world_id).await {
            if !positions.enemies.is_empty() {
                return Some(positions);
            }
        }
        self.test_positions_from_engine().await
    }

    /// Steers the local player at `point`, optionally fires, and returns the
    /// positions observed in the same engine frame.
    pub async fn positions_and_aim_at(
        &self,
        world_id: EntityId,
        point: Vec3,
        fire: bool,
    ) -> Option<EnginePositions> {
        if world_id == 0 {
            return None;
        }
        let call = MethodCall::new(ENEMY_QUERY, "GetEnemyOnlyPositionsAndAimAt", ENEMY_QUERY_MODULE).args([
            CallArg::Int(world_id),
            CallArg::Int(0),
            CallArg::Float(point.x),
            CallArg::Float(point.y),
            CallArg::Float(point.z),
            CallArg::Bool(fire),
        ]);
        let raw = self.query_string(&call).await?;
        parse::parse_test_positions(&raw)
    }

    /// Retries [`Session::enemy_only_positions_from_engine`] until at least
    /// one enemy position is reported.
    pub async fn engine_positions_with_retries(
        &mut self,
        attempts: u32,
        delay: Duration,
    ) -> Option<EnginePositions> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(positions) = self.enemy_only_positions_from_engine().await {
                if !positions.enemies.is_empty() {
                    info!(
                        enemies = positions.enemies.len(),
                        attempt,
                        "engine reported other players"
                    );
                    return Some(positions);
                }
            }
            if attempt < attempts {
                info!(attempt, attempts, delay_ms = delay.as_millis() as u64, "no other players from engine yet");
                self.pause(delay).await;
            }
        }
        None
    }
}
