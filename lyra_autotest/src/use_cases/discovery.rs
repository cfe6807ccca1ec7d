use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::domain::classify::{
    self, contains_ignore_case, is_bot_controller_type, is_decoy, is_enemy_character,
    is_primary_character, looks_like_player_by_name,
};
use crate::domain::{
    AutomationDriver, CallArg, EntityId, MethodCall, RemoteEntity, RemoteValue, ScenarioError,
};
use crate::use_cases::dispatch::{as_entity_id, by_component, by_pairs};
use crate::use_cases::session::Session;

const TRY_WAIT_PLAYER_POLL: Duration = Duration::from_millis(200);
const WAIT_PLAYER_POLL: Duration = Duration::from_millis(150);
const ENEMY_POLL: Duration = Duration::from_millis(150);

// Name fragments the shooter builds give to character actors.
const ENEMY_NAME_PATTERNS: &[&str] = &[
    "LyraCharacter",
    "SimpleHeroPawn",
    "SimpleHero",
    "Character",
    "Pawn",
];

const RAW_SAMPLE_PATTERNS: &[&str] = &["Character", "Pawn", "Actor", "Lyra"];
const CONTROLLER_TYPE_PATTERNS: &[&str] = &["LyraPlayerController", "PlayerController", "Controller"];

/// Which rule identified the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSource {
    IsPlayerControlled,
    ControllerMatch,
    NameHeuristic,
    ControllerPawn,
    GameplayStatics,
    EngineQuery,
}

impl PlayerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerSource::IsPlayerControlled => "candidates+is_player_controlled",
            PlayerSource::ControllerMatch => "candidates+controller_match",
            PlayerSource::NameHeuristic => "candidates+name",
            PlayerSource::ControllerPawn => "controller_pawn",
            PlayerSource::GameplayStatics => "gameplay_statics",
            PlayerSource::EngineQuery => "engine_query",
        }
    }
}

// Result of one discovery pass over the scene.
struct PlayerPass {
    found: Option<(RemoteEntity, PlayerSource)>,
    last_candidate: Option<RemoteEntity>,
    candidate_count: usize,
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    /// Character-like objects: enabled first, then including disabled, then a
    /// name search for the primary character type.
    pub async fn character_candidates(&self) -> Vec<RemoteEntity> {
        let enabled = classify::character_candidates(&self.all_elements(true).await);
        if !enabled.is_empty() {
            return enabled;
        }
        let with_disabled = classify::character_candidates(&self.all_elements(false).await);
        if !with_disabled.is_empty() {
            return with_disabled;
        }
        for enabled in [true, false] {
            let named: Vec<RemoteEntity> = self
                .find_all_containing(classify::PRIMARY_CHARACTER_TYPE, enabled)
                .await
                .into_iter()
                .filter(|e| !is_decoy(e))
                .collect();
            if !named.is_empty() {
                return named;
            }
        }
        Vec::new()
    }

    /// The local player controller. A cached handle is re-validated by id and
    /// re-resolved when it no longer exists.
    pub async fn player_controller(&mut self) -> Option<RemoteEntity> {
        if let Some(cached) = self.controller.take() {
            if let Some(fresh) = self.resolve_id(cached.id).await {
                self.controller = Some(fresh.clone());
                return Some(fresh);
            }
            debug!(id = cached.id, "cached controller no longer resolves");
        }
        let found = self.search_player_controller().await;
        if let Some(controller) = &found {
            debug!(
                id = controller.id,
                name = %controller.name,
                type_name = %controller.type_name,
                "player controller resolved"
            );
        }
        self.controller = found.clone();
        found
    }

    async fn search_player_controller(&self) -> Option<RemoteEntity> {
        let is_player_controller = |e: &&RemoteEntity| contains_ignore_case(&e.type_name, "PlayerController");

        for enabled in [true, false] {
            let list = self.find_all_containing("PlayerController", enabled).await;
            if let Some(first) = list.first() {
                return Some(
                    list.iter()
                        .find(is_player_controller)
                        .unwrap_or(first)
                        .clone(),
                );
            }
        }
        for enabled in [true, false] {
            let list = self.find_all_containing("Lyra", enabled).await;
            if let Some(found) = list.iter().find(is_player_controller) {
                return Some(found.clone());
            }
        }
        for enabled in [true, false] {
            let all = self.all_elements(enabled).await;
            let by_type = all.iter().find(|e| {
                !e.type_name.is_empty()
                    && CONTROLLER_TYPE_PATTERNS
                        .iter()
                        .any(|p| contains_ignore_case(&e.type_name, p))
            });
            if let Some(found) = by_type {
                return Some(found.clone());
            }
        }
        None
    }

    // Some(answer) when any IsPlayerControlled candidate call succeeds.
    async fn is_player_controlled(&self, candidate: &RemoteEntity) -> Option<bool> {
        let ty = candidate.type_name.as_str();
        let calls = by_pairs(
            &[
                (ty, "Engine"),
                ("Character", "Engine"),
                ("Pawn", "Engine"),
                (ty, "LyraGame"),
                ("Character", "LyraGame"),
                ("Pawn", "LyraGame"),
            ],
            "IsPlayerControlled",
            &[],
        );
        self.first_component_answer(candidate.id, &calls, |v| v.as_bool())
            .await
    }

    async fn is_controlled_by(&self, pawn: &RemoteEntity, controller_id: EntityId) -> bool {
        let calls = by_component(
            &["Pawn", "Character", pawn.type_name.as_str(), "Actor"],
            &["Engine", "LyraGame", ""],
            "GetController",
            &[],
        );
        self.first_component_answer(pawn.id, &calls, |v| {
            as_entity_id(v).filter(|id| *id == controller_id)
        })
        .await
        .is_some()
    }

    async fn match_candidates(
        &self,
        candidates: &[RemoteEntity],
        controller_id: Option<EntityId>,
    ) -> Option<(RemoteEntity, PlayerSource)> {
        for candidate in candidates {
            if self.is_player_controlled(candidate).await == Some(true) {
                return Some((candidate.clone(), PlayerSource::IsPlayerControlled));
            }
            if let Some(controller_id) = controller_id {
                if self.is_controlled_by(candidate, controller_id).await {
                    return Some((candidate.clone(), PlayerSource::ControllerMatch));
                }
            }
            if looks_like_player_by_name(candidate) {
                return Some((candidate.clone(), PlayerSource::NameHeuristic));
            }
        }
        None
    }

    async fn pawn_via_controller(&mut self) -> Option<RemoteEntity> {
        let Some(controller) = self.player_controller().await else {
            if self.throttles.controller_pawn.ready() {
                debug!("pawn via controller: no controller found");
            }
            return None;
        };

        let mut calls = Vec::new();
        for module in ["LyraGame", "Engine", ""] {
            for component in ["PlayerController", controller.type_name.as_str(), "Controller"] {
                if component.is_empty() {
                    continue;
                }
                for method in ["GetPawn", "GetCharacter"] {
                    calls.push(MethodCall::new(component, method, module));
                }
            }
        }

        for call in &calls {
            let Some(pawn_id) = self
                .first_component_answer(controller.id, std::slice::from_ref(call), as_entity_id)
                .await
            else {
                continue;
            };
            if let Some(pawn) = self.resolve_id(pawn_id).await {
                return Some(pawn);
            }
            if self.throttles.controller_pawn.ready() {
                debug!(%call, pawn_id, "controller returned a pawn id that does not resolve");
            }
        }
        if self.throttles.controller_pawn.ready() {
            debug!(controller = %controller.name, "GetPawn/GetCharacter gave nothing usable");
        }
        None
    }

    /// `World` or `PersistentLevel`, used as the world context for static calls.
    pub async fn world_object(&self) -> Option<RemoteEntity> {
        if let Some(world) = self.find_containing("World", false).await {
            return Some(world);
        }
        self.find_named("PersistentLevel", false).await
    }

    async fn static_context(&mut self) -> Option<RemoteEntity> {
        match self.world_object().await {
            Some(world) => Some(world),
            None => self.player_controller().await,
        }
    }

    async fn pawn_via_gameplay_statics(&mut self) -> Option<RemoteEntity> {
        let context = self.static_context().await?;
        let args = [CallArg::Int(context.id), CallArg::Int(0)];
        for module in ["Engine", ""] {
            for method in ["GetPlayerPawn", "GetPlayerCharacter"] {
                let call = MethodCall::new("GameplayStatics", method, module).args(args.iter().cloned());
                let Some(id) = self
                    .first_static_answer(std::slice::from_ref(&call), as_entity_id)
                    .await
                else {
                    continue;
                };
                if let Some(pawn) = self.resolve_id(id).await {
                    return Some(pawn);
                }
            }
        }
        None
    }

    async fn pawn_via_engine_query(&mut self) -> Option<RemoteEntity> {
        let context = self.static_context().await?;
        let call = MethodCall::new("LyraTestEnemyQuery", "GetLocalPlayerPawnId", "LyraGame")
            .args([CallArg::Int(context.id), CallArg::Int(0)]);
        let id = self
            .first_static_answer(std::slice::from_ref(&call), as_entity_id)
            .await?;
        self.resolve_id(id).await
    }

    async fn player_from_fallbacks(&mut self) -> Option<(RemoteEntity, PlayerSource)> {
        let found = if let Some(pawn) = self.pawn_via_controller().await {
            Some((pawn, PlayerSource::ControllerPawn))
        } else if let Some(pawn) = self.pawn_via_gameplay_statics().await {
            Some((pawn, PlayerSource::GameplayStatics))
        } else {
            self.pawn_via_engine_query()
                .await
                .map(|pawn| (pawn, PlayerSource::EngineQuery))
        };
        match found {
            Some((pawn, source)) if is_decoy(&pawn) => {
                debug!(id = pawn.id, type_name = %pawn.type_name, source = source.as_str(), "rejected decoy player");
                None
            }
            other => other,
        }
    }

    async fn player_pass(&mut self, diagnostics: bool) -> PlayerPass {
        let candidates = self.character_candidates().await;
        let mut pass = PlayerPass {
            found: None,
            last_candidate: candidates.last().cloned(),
            candidate_count: candidates.len(),
        };

        if candidates.is_empty() {
            if diagnostics {
                self.sample_raw_elements().await;
            }
        } else {
            if diagnostics {
                self.dump_candidates(&candidates);
            }
            let controller_id = self.player_controller().await.map(|c| c.id);
            pass.found = self.match_candidates(&candidates, controller_id).await;
            if pass.found.is_some() {
                return pass;
            }
        }

        pass.found = self.player_from_fallbacks().await;
        pass
    }

    fn dump_candidates(&mut self, candidates: &[RemoteEntity]) {
        if !self.throttles.candidates.ready() {
            return;
        }
        debug!(count = candidates.len(), "character candidates");
        for c in candidates.iter().take(10) {
            debug!(id = c.id, name = %c.name, type_name = %c.type_name, "candidate");
        }
    }

    async fn sample_raw_elements(&mut self) {
        if !self.throttles.raw_elements.ready() {
            return;
        }
        debug!("no character candidates; sampling raw elements");
        for pattern in RAW_SAMPLE_PATTERNS {
            let mut list = self.find_all_containing(pattern, true).await;
            if list.is_empty() {
                list = self.find_all_containing(pattern, false).await;
            }
            let sample: Vec<String> = list
                .iter()
                .take(12)
                .map(|o| format!("{}|{}", o.name, o.type_name))
                .collect();
            debug!(pattern, total = list.len(), sample = %sample.join(" ; "), "raw elements");
        }
    }

    /// One discovery pass over every player rule, first match wins.
    pub async fn find_player(&mut self) -> Option<RemoteEntity> {
        let pass = self.player_pass(false).await;
        let (player, source) = pass.found?;
        info!(
            id = player.id,
            name = %player.name,
            type_name = %player.type_name,
            source = source.as_str(),
            "player found"
        );
        Some(player)
    }

    /// Repeats discovery until `timeout`; none when nothing matched.
    pub async fn try_wait_for_player(&mut self, timeout: Duration) -> Option<RemoteEntity> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some((player, source)) = self.player_pass(false).await.found {
                debug!(id = player.id, source = source.as_str(), "player found");
                return Some(player);
            }
            sleep(TRY_WAIT_PLAYER_POLL).await;
        }
        None
    }

    /// Like [`Session::try_wait_for_player`] but fails with a diagnostic that
    /// names the last candidate seen.
    pub async fn wait_for_player(&mut self, timeout: Duration) -> Result<RemoteEntity, ScenarioError> {
        let deadline = Instant::now() + timeout;
        let mut last_candidate: Option<RemoteEntity> = None;
        while Instant::now() < deadline {
            let pass = self.player_pass(true).await;
            if pass.candidate_count > 0 {
                last_candidate = pass.last_candidate;
            }
            if let Some((player, source)) = pass.found {
                info!(
                    id = player.id,
                    name = %player.name,
                    source = source.as_str(),
                    "player found"
                );
                return Ok(player);
            }
            sleep(WAIT_PLAYER_POLL).await;
        }

        let secs = timeout.as_secs_f64();
        let detail = match last_candidate {
            None => format!("no character candidates within {secs}s"),
            Some(c) => format!(
                "no player pawn within {secs}s; last candidate {} ({}) id={}",
                c.name, c.type_name, c.id
            ),
        };
        warn!(%detail, "player not found");
        Err(ScenarioError::not_found("find_player", detail))
    }

    /// Team index of a pawn, directly or through its player state.
    pub async fn team_id(&self, pawn: &RemoteEntity) -> Option<i64> {
        let non_negative = |v: &RemoteValue| v.as_i64().filter(|t| *t >= 0);

        let direct = by_component(
            &["LyraPawn", "LyraCharacter", pawn.type_name.as_str(), "Pawn", "Character"],
            &["LyraGame"],
            "GetTeamId",
            &[],
        );
        if let Some(team) = self.first_component_answer(pawn.id, &direct, non_negative).await {
            return Some(team);
        }

        for component in ["Pawn", "Character", pawn.type_name.as_str()] {
            if component.is_empty() {
                continue;
            }
            let call = MethodCall::new(component, "GetPlayerState", "Engine");
            let Some(state_id) = self
                .first_component_answer(pawn.id, std::slice::from_ref(&call), as_entity_id)
                .await
            else {
                continue;
            };
            let Some(state) = self.entity_by_id(state_id).await else {
                continue;
            };
            let calls = by_component(
                &["LyraPlayerState", state.type_name.as_str(), "PlayerState"],
                &["LyraGame"],
                "GetTeamId",
                &[],
            );
            if let Some(team) = self.first_component_answer(state.id, &calls, non_negative).await {
                return Some(team);
            }
        }
        None
    }

    /// True when the pawn's controller is an AI or bot controller.
    pub async fn is_bot_controlled(&self, pawn: &RemoteEntity) -> bool {
        for component in ["Pawn", "Character", pawn.type_name.as_str(), "LyraCharacter"] {
            if component.is_empty() {
                continue;
            }
            let call = MethodCall::new(component, "GetController", "Engine");
            let Some(controller_id) = self
                .first_component_answer(pawn.id, std::slice::from_ref(&call), as_entity_id)
                .await
            else {
                continue;
            };
            let Some(controller) = self.entity_by_id(controller_id).await else {
                continue;
            };
            if is_bot_controller_type(&controller.type_name) {
                return true;
            }
        }
        false
    }

    // Other team first, then bot-controlled, then any character; primary
    // character type preferred within each group.
    async fn pick_enemy(
        &self,
        list: &[RemoteEntity],
        player_id: EntityId,
        player_team: Option<i64>,
    ) -> Option<RemoteEntity> {
        let candidates: Vec<&RemoteEntity> = list
            .iter()
            .filter(|e| e.id != player_id && is_enemy_character(e))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let prefer_primary = |group: &[&RemoteEntity]| -> Option<RemoteEntity> {
            group
                .iter()
                .find(|e| is_primary_character(e))
                .or_else(|| group.first())
                .map(|e| (*e).clone())
        };

        if let Some(player_team) = player_team {
            let mut other_team = Vec::new();
            for candidate in &candidates {
                if let Some(team) = self.team_id(candidate).await {
                    if team != player_team {
                        other_team.push(*candidate);
                    }
                }
            }
            if let Some(enemy) = prefer_primary(&other_team) {
                return Some(enemy);
            }
        }

        let mut bots = Vec::new();
        for candidate in &candidates {
            if self.is_bot_controlled(candidate).await {
                bots.push(*candidate);
            }
        }
        if let Some(enemy) = prefer_primary(&bots) {
            return Some(enemy);
        }

        prefer_primary(&candidates)
    }

    async fn candidates_excluding(&self, player_id: EntityId) -> Vec<RemoteEntity> {
        for enabled in [true, false] {
            let list: Vec<RemoteEntity> = classify::character_candidates(&self.all_elements(enabled).await)
                .into_iter()
                .filter(|e| e.id != player_id)
                .collect();
            if !list.is_empty() {
                return list;
            }
        }
        Vec::new()
    }

    /// Polls for an opponent of `player_id` until `timeout`.
    pub async fn try_find_enemy(&self, player_id: EntityId, timeout: Duration) -> Option<RemoteEntity> {
        let player_team = match self.entity_by_id(player_id).await {
            Some(player) => self.team_id(&player).await,
            None => None,
        };
        debug!(player_id, ?player_team, "searching for enemy");

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            for pattern in ENEMY_NAME_PATTERNS {
                for enabled in [true, false] {
                    let list = self.find_all_containing(pattern, enabled).await;
                    if let Some(enemy) = self.pick_enemy(&list, player_id, player_team).await {
                        return Some(enemy);
                    }
                }
            }
            let rest = self.candidates_excluding(player_id).await;
            if let Some(enemy) = self.pick_enemy(&rest, player_id, player_team).await {
                return Some(enemy);
            }
            sleep(ENEMY_POLL).await;
        }
        None
    }

    /// Fixed-count outer retry around [`Session::try_find_enemy`].
    pub async fn find_enemy_with_retries(
        &self,
        player_id: EntityId,
        attempts: u32,
        timeout: Duration,
        delay: Duration,
    ) -> Option<RemoteEntity> {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(enemy) = self.try_find_enemy(player_id, timeout).await {
                info!(
                    id = enemy.id,
                    name = %enemy.name,
                    type_name = %enemy.type_name,
                    attempt,
                    "enemy found"
                );
                return Some(enemy);
            }
            debug!(attempt, attempts, "no enemy yet");
            if attempt < attempts {
                self.pause(delay).await;
            }
        }
        None
    }

    /// Enemy whose screen position hit-tests back to itself.
    pub async fn find_visible_enemy(&self, player_id: EntityId, timeout: Duration) -> Option<RemoteEntity> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            for pattern in ENEMY_NAME_PATTERNS {
                let list = self.find_all_containing(pattern, true).await;
                for enemy in list.iter().filter(|e| e.id != player_id && is_enemy_character(e)) {
                    if self.hit_test_is(enemy).await {
                        return Some(enemy.clone());
                    }
                }
            }
            sleep(ENEMY_POLL).await;
        }
        None
    }

    pub(crate) async fn hit_test_is(&self, target: &RemoteEntity) -> bool {
        match self.driver.object_at(target.screen).await {
            Ok(Some(hit)) => hit.id == target.id,
            _ => false,
        }
    }

    /// A visible enemy if one shows up within `visible_timeout`, otherwise any
    /// enemy within the rest of `total_timeout`.
    pub async fn find_enemy_for_aim(
        &self,
        player_id: EntityId,
        visible_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<RemoteEntity, ScenarioError> {
        if let Some(enemy) = self.find_visible_enemy(player_id, visible_timeout).await {
            return Ok(enemy);
        }
        let remaining = total_timeout.saturating_sub(visible_timeout);
        self.try_find_enemy(player_id, remaining).await.ok_or_else(|| {
            ScenarioError::not_found(
                "find_enemy",
                format!(
                    "no enemy pawn within {}s (player id={player_id}); pick an experience that spawns bots",
                    total_timeout.as_secs_f64()
                ),
            )
        })
    }

    /// World id for static test-support queries: the controller's world, the
    /// controller itself, or a world object. 0 when nothing resolves.
    pub async fn world_context_id(&mut self) -> EntityId {
        if let Some(controller) = self.player_controller().await {
            let calls = by_component(
                &["PlayerController", "Controller", controller.type_name.as_str()],
                &["Engine"],
                "GetWorld",
                &[],
            );
            return self
                .first_component_answer(controller.id, &calls, as_entity_id)
                .await
                .unwrap_or(controller.id);
        }
        self.world_object().await.map(|w| w.id).unwrap_or(0)
    }
}
