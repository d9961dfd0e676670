use crate::domain::chat::{ConversationTurn, ProjectedTurn, TurnRole};

/// Maps caller-supplied history onto the two roles the generation capability
/// understands. Order and length are preserved.
pub fn project(history: &[ConversationTurn]) -> Vec<ProjectedTurn> {
    history
        .iter()
        .map(|turn| ProjectedTurn { role: role_for(&turn.role), text: turn.content.clone() })
        .collect()
}

fn role_for(raw: &str) -> TurnRole {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("model") || raw.eq_ignore_ascii_case("assistant") {
        TurnRole::Model
    } else {
        TurnRole::User
    }
}
