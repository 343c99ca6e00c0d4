//! Game bootstrap, active-game lookup and participant registration.
//!
//! The draw and reveal services take explicit ids; choosing "the" game is
//! done here and only the HTTP layer calls it.

use santa_core::{Game, Participant, ParticipantId, GIFT_SLOTS};
use uuid::Uuid;

use crate::draw::already_drawn;
use crate::error::CoreError;
use crate::now_millis;
use crate::store::ParticipantStore;

/// The earliest-created game.
pub async fn active_game(store: &dyn ParticipantStore) -> Result<Game, CoreError> {
    store.earliest_game().await?.ok_or(CoreError::GameNotFound)
}

pub async fn create_game(store: &dyn ParticipantStore) -> Result<Game, CoreError> {
    let game = Game {
        id: Uuid::new_v4().to_string(),
        created_at: now_millis(),
        draw_completed: false,
    };
    store.insert_game(game.clone()).await?;
    tracing::info!(game_id = %game.id, "game created");
    Ok(game)
}

/// Returns the active game, creating one when the store has none.
pub async fn ensure_active_game(store: &dyn ParticipantStore) -> Result<Game, CoreError> {
    match store.earliest_game().await? {
        Some(game) => Ok(game),
        None => create_game(store).await,
    }
}

pub async fn register_participant(
    store: &dyn ParticipantStore,
    game_id: &str,
    name: &str,
    gifts: &[String],
) -> Result<ParticipantId, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("name required".into()));
    }
    if gifts.len() > GIFT_SLOTS {
        return Err(CoreError::Validation(format!(
            "at most {GIFT_SLOTS} gift preferences allowed"
        )));
    }

    let game = store
        .find_game(game_id)
        .await?
        .ok_or(CoreError::GameNotFound)?;
    if already_drawn(game.draw_completed, store.has_assignments(game_id).await?) {
        return Err(CoreError::RegistrationClosed);
    }

    let existing = store.participants_for_game(game_id).await?;
    if existing.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
        return Err(CoreError::NameTaken(name.to_string()));
    }

    let mut gift_preferences: [String; GIFT_SLOTS] = Default::default();
    for (slot, gift) in gift_preferences.iter_mut().zip(gifts) {
        *slot = gift.trim().to_string();
    }

    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        game_id: game_id.to_string(),
        name: name.to_string(),
        gift_preferences,
        secret_token: None,
        created_at: now_millis(),
    };
    let id = participant.id.clone();
    store.insert_participant(participant).await?;
    tracing::info!(game_id, participant_id = %id, "participant registered");
    Ok(id)
}

pub async fn list_participants(
    store: &dyn ParticipantStore,
    game_id: &str,
) -> Result<Vec<Participant>, CoreError> {
    if store.find_game(game_id).await?.is_none() {
        return Err(CoreError::GameNotFound);
    }
    Ok(store.participants_for_game(game_id).await?)
}

/// Administrative wipe: the game goes back to an empty, undrawn state.
pub async fn reset_game(store: &dyn ParticipantStore, game_id: &str) -> Result<(), CoreError> {
    if store.find_game(game_id).await?.is_none() {
        return Err(CoreError::GameNotFound);
    }
    store.reset_game(game_id).await?;
    tracing::warn!(game_id = %game_id, "game reset");
    Ok(())
}
