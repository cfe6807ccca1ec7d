// Substring rules that tell gameplay characters apart from the cue, spawner and
// widget actors that share their type tags. All matching is case-insensitive.

use crate::domain::entity::RemoteEntity;

const DECOY_TYPE_MARKERS: &[&str] = &[
    "Spawner",
    "Spawning",
    "Respawn",
    "Timer",
    "Widget",
    "GCNL_",
    "GCN_",
    "GameplayCue",
    "Niagara",
    "Emitter",
    "Effect",
];

const DECOY_NAME_PREFIXES: &[&str] = &["GCNL_", "GCN_"];

const NON_ENEMY_TYPE_MARKERS: &[&str] = &["Pickup", "W_", "Item", "Weapon", "Ability"];
const NON_ENEMY_NAME_MARKERS: &[&str] = &["Respawn", "Timer"];

const BOT_CONTROLLER_MARKERS: &[&str] = &["Bot", "AIController", "AI_"];

/// Type tag of the primary gameplay character.
pub const PRIMARY_CHARACTER_TYPE: &str = "LyraCharacter";

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

pub fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| contains_ignore_case(haystack, n))
}

/// Visual-effect, UI and spawner actors that must never be treated as characters.
pub fn is_decoy(entity: &RemoteEntity) -> bool {
    contains_any(&entity.type_name, DECOY_TYPE_MARKERS)
        || contains_ignore_case(&entity.name, "Spawning")
        || DECOY_NAME_PREFIXES
            .iter()
            .any(|p| starts_with_ignore_case(&entity.name, p))
}

fn has_character_type(type_name: &str) -> bool {
    contains_ignore_case(type_name, PRIMARY_CHARACTER_TYPE)
        || contains_ignore_case(type_name, "Character")
        || (contains_ignore_case(type_name, "Pawn") && !contains_ignore_case(type_name, "Spawning"))
}

pub fn is_character_candidate(entity: &RemoteEntity) -> bool {
    !entity.type_name.is_empty() && !is_decoy(entity) && has_character_type(&entity.type_name)
}

/// Stricter filter used when picking an opponent: also drops pickups, weapons
/// and ability actors whose tags happen to mention a pawn.
pub fn is_enemy_character(entity: &RemoteEntity) -> bool {
    if entity.type_name.is_empty() || is_decoy(entity) {
        return false;
    }
    if contains_any(&entity.type_name, NON_ENEMY_TYPE_MARKERS)
        || contains_any(&entity.name, NON_ENEMY_NAME_MARKERS)
    {
        return false;
    }
    has_character_type(&entity.type_name)
}

pub fn is_primary_character(entity: &RemoteEntity) -> bool {
    contains_ignore_case(&entity.type_name, PRIMARY_CHARACTER_TYPE)
}

/// Name heuristic for the local player: mentions `Player` and is not a bot.
pub fn looks_like_player_by_name(entity: &RemoteEntity) -> bool {
    let name = entity.name.as_str();
    if name.is_empty() {
        return false;
    }
    if DECOY_NAME_PREFIXES
        .iter()
        .any(|p| starts_with_ignore_case(name, p))
    {
        return false;
    }
    if contains_ignore_case(name, "Bot") || contains_ignore_case(name, "AI") {
        return false;
    }
    contains_ignore_case(name, "Player")
}

pub fn is_bot_controller_type(type_name: &str) -> bool {
    contains_any(type_name, BOT_CONTROLLER_MARKERS)
}

pub fn character_candidates(all: &[RemoteEntity]) -> Vec<RemoteEntity> {
    all.iter()
        .filter(|e| is_character_candidate(e))
        .cloned()
        .collect()
}
