//! The one-time draw: turns a game's registered participants into a complete
//! set of giver/receiver assignments and hands every participant a reveal
//! token.
//!
//! Persistence is three separate store writes (tokens, assignment batch, game
//! flag) with no rollback. A failure part-way leaves the game half drawn;
//! the guard at the start of [`DrawCoordinator::execute`] treats leftover
//! assignment rows as "already drawn" and re-syncs the flag, but never
//! repairs or removes the rows themselves.
//!
//! Two concurrent `execute` calls for the same game can both pass the guard
//! and both persist. Trigger draws from a single controlled action.

use std::collections::HashSet;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use santa_core::{derangement_with_limit, pair_up, Assignment, GameId, MAX_ATTEMPTS};
use serde::Serialize;
use uuid::Uuid;

use crate::error::CoreError;
use crate::store::ParticipantStore;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DrawSummary {
    pub game_id: GameId,
    pub assignments: usize,
}

/// A game counts as drawn when its flag is set or when any assignment row
/// exists for it.
pub fn already_drawn(draw_completed: bool, has_assignments: bool) -> bool {
    draw_completed || has_assignments
}

pub struct DrawCoordinator {
    store: Arc<dyn ParticipantStore>,
    expected_participants: Option<usize>,
    seed: Option<u64>,
    max_attempts: usize,
}

impl DrawCoordinator {
    pub fn new(store: Arc<dyn ParticipantStore>) -> Self {
        Self {
            store,
            expected_participants: None,
            seed: None,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn with_expected_participants(mut self, expected: Option<usize>) -> Self {
        self.expected_participants = expected;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_attempt_limit(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, game_id: &str) -> Result<DrawSummary, CoreError> {
        let game = self
            .store
            .find_game(game_id)
            .await?
            .ok_or(CoreError::GameNotFound)?;

        let has_rows = self.store.has_assignments(game_id).await?;
        if already_drawn(game.draw_completed, has_rows) {
            if !game.draw_completed {
                tracing::warn!("assignments exist but draw flag is unset, syncing flag");
                if let Err(err) = self.store.set_draw_completed(game_id, true).await {
                    tracing::warn!(error = %err, "could not sync draw flag");
                }
            }
            return Err(CoreError::AlreadyDone);
        }

        let participants = self.store.participants_for_game(game_id).await?;
        let found = participants.len();
        if found < 2 {
            return Err(CoreError::InsufficientParticipants { found });
        }
        if let Some(expected) = self.expected_participants {
            if expected != found {
                return Err(CoreError::ParticipantCountMismatch { expected, found });
            }
        }

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let permutation = derangement_with_limit(found, &mut rng, self.max_attempts)?;

        let tokens = issue_tokens(found);
        let assignments: Vec<Assignment> = pair_up(&participants, &permutation)
            .into_iter()
            .map(|(giver_id, receiver_id)| Assignment {
                id: Uuid::new_v4().to_string(),
                game_id: game_id.to_string(),
                giver_id,
                receiver_id,
                revealed: false,
                revealed_at: None,
            })
            .collect();

        for (participant, token) in participants.iter().zip(&tokens) {
            self.store.set_secret_token(&participant.id, token).await?;
        }
        self.store.insert_assignments(assignments).await?;
        self.store.set_draw_completed(game_id, true).await?;

        tracing::info!(participants = found, "draw completed");
        Ok(DrawSummary {
            game_id: game_id.to_string(),
            assignments: found,
        })
    }
}

/// `count` distinct opaque tokens: 128 random bits as 32 hex characters.
fn issue_tokens(count: usize) -> Vec<String> {
    let mut seen = HashSet::with_capacity(count);
    let mut tokens = Vec::with_capacity(count);
    while tokens.len() < count {
        let token = Uuid::new_v4().simple().to_string();
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{FailPoint, FaultyStore};
    use crate::store::MemoryStore;
    use santa_core::{Game, Participant};

    async fn seeded_store(names: &[&str]) -> MemoryStore {
        let store = MemoryStore::default();
        store
            .insert_game(Game {
                id: "g1".into(),
                created_at: 0,
                draw_completed: false,
            })
            .await
            .unwrap();
        for (i, name) in names.iter().enumerate() {
            store
                .insert_participant(Participant {
                    id: format!("p-{name}"),
                    game_id: "g1".into(),
                    name: name.to_string(),
                    gift_preferences: [format!("{name} 1"), format!("{name} 2"), format!("{name} 3")],
                    secret_token: None,
                    created_at: i as u64,
                })
                .await
                .unwrap();
        }
        store
    }

    fn coordinator(store: &MemoryStore) -> DrawCoordinator {
        DrawCoordinator::new(Arc::new(store.clone()))
    }

    #[test]
    fn already_drawn_is_either_signal() {
        assert!(!already_drawn(false, false));
        assert!(already_drawn(true, false));
        assert!(already_drawn(false, true));
        assert!(already_drawn(true, true));
    }

    #[test]
    fn issued_tokens_are_unique_and_opaque() {
        let tokens = issue_tokens(50);
        let unique: HashSet<&String> = tokens.iter().collect();
        assert_eq!(unique.len(), 50);
        assert!(tokens.iter().all(|t| t.len() == 32));
    }

    #[tokio::test]
    async fn six_participants_form_a_derangement() {
        let store = seeded_store(&["A", "B", "C", "D", "E", "F"]).await;
        let summary = coordinator(&store).execute("g1").await.unwrap();
        assert_eq!(summary.assignments, 6);

        let tables = store.snapshot().await;
        assert_eq!(tables.assignments.len(), 6);

        let givers: HashSet<&str> = tables.assignments.iter().map(|a| a.giver_id.as_str()).collect();
        let receivers: HashSet<&str> = tables
            .assignments
            .iter()
            .map(|a| a.receiver_id.as_str())
            .collect();
        let ids: HashSet<&str> = tables.participants.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(givers, ids);
        assert_eq!(receivers, ids);
        assert!(tables.assignments.iter().all(|a| a.giver_id != a.receiver_id));
        assert!(tables.assignments.iter().all(|a| !a.revealed && a.revealed_at.is_none()));

        let tokens: HashSet<&str> = tables
            .participants
            .iter()
            .map(|p| p.secret_token.as_deref().expect("token issued"))
            .collect();
        assert_eq!(tokens.len(), 6);
        assert!(tables.games[0].draw_completed);
    }

    #[tokio::test]
    async fn second_draw_is_already_done_and_changes_nothing() {
        let store = seeded_store(&["A", "B", "C"]).await;
        coordinator(&store).execute("g1").await.unwrap();
        let before = store.snapshot().await;

        let err = coordinator(&store).execute("g1").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyDone));

        let after = store.snapshot().await;
        assert_eq!(before.assignments, after.assignments);
        assert_eq!(before.participants, after.participants);
    }

    #[tokio::test]
    async fn leftover_rows_sync_the_flag() {
        let store = seeded_store(&["A", "B"]).await;
        store
            .insert_assignments(vec![Assignment {
                id: "partial".into(),
                game_id: "g1".into(),
                giver_id: "p-A".into(),
                receiver_id: "p-B".into(),
                revealed: false,
                revealed_at: None,
            }])
            .await
            .unwrap();

        let err = coordinator(&store).execute("g1").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyDone));

        let tables = store.snapshot().await;
        assert!(tables.games[0].draw_completed);
        assert_eq!(tables.assignments.len(), 1);
    }

    #[tokio::test]
    async fn failed_flag_write_is_healed_by_next_draw() {
        let faulty = FaultyStore::new(seeded_store(&["A", "B", "C", "D"]).await);
        faulty.fail(FailPoint::SetDrawCompleted);
        let draw = DrawCoordinator::new(Arc::new(faulty.clone()));

        let err = draw.execute("g1").await.unwrap_err();
        assert!(matches!(err, CoreError::Dependency(_)));
        let tables = faulty.inner.snapshot().await;
        assert_eq!(tables.assignments.len(), 4);
        assert!(!tables.games[0].draw_completed);

        faulty.heal();
        let err = draw.execute("g1").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyDone));
        let healed = faulty.inner.snapshot().await;
        assert!(healed.games[0].draw_completed);
        assert_eq!(healed.assignments, tables.assignments);
    }

    #[tokio::test]
    async fn failed_batch_insert_leaves_game_undrawn() {
        let faulty = FaultyStore::new(seeded_store(&["A", "B", "C"]).await);
        faulty.fail(FailPoint::InsertAssignments);
        let draw = DrawCoordinator::new(Arc::new(faulty.clone()));

        let err = draw.execute("g1").await.unwrap_err();
        assert!(matches!(err, CoreError::Dependency(_)));
        let tables = faulty.inner.snapshot().await;
        assert!(tables.assignments.is_empty());
        assert!(!tables.games[0].draw_completed);
        // Tokens were written before the failure and stay.
        assert!(tables.participants.iter().all(|p| p.secret_token.is_some()));

        faulty.heal();
        draw.execute("g1").await.unwrap();
        assert_eq!(faulty.inner.snapshot().await.assignments.len(), 3);
    }

    #[tokio::test]
    async fn token_write_failure_is_dependency_error() {
        let faulty = FaultyStore::new(seeded_store(&["A", "B"]).await);
        faulty.fail(FailPoint::SetSecretToken);
        let err = DrawCoordinator::new(Arc::new(faulty.clone()))
            .execute("g1")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Dependency(_)));
        assert!(faulty.inner.snapshot().await.assignments.is_empty());
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let store = seeded_store(&["A", "B"]).await;
        let err = coordinator(&store).execute("missing").await.unwrap_err();
        assert!(matches!(err, CoreError::GameNotFound));
    }

    #[tokio::test]
    async fn needs_two_participants() {
        let store = seeded_store(&["A"]).await;
        let err = coordinator(&store).execute("g1").await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientParticipants { found: 1 }));
        assert!(store.snapshot().await.participants[0].secret_token.is_none());
    }

    #[tokio::test]
    async fn expected_count_must_match() {
        let store = seeded_store(&["A", "B", "C"]).await;
        let err = coordinator(&store)
            .with_expected_participants(Some(4))
            .execute("g1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ParticipantCountMismatch { expected: 4, found: 3 }
        ));

        coordinator(&store)
            .with_expected_participants(Some(3))
            .execute("g1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exhausted_attempts_surface_as_algorithmic_failure() {
        let store = seeded_store(&["A", "B", "C"]).await;
        let err = coordinator(&store)
            .with_attempt_limit(0)
            .execute("g1")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AlgorithmicFailure { attempts: 0 }));
        let tables = store.snapshot().await;
        assert!(tables.assignments.is_empty());
        assert!(!tables.games[0].draw_completed);
    }

    #[tokio::test]
    async fn seeded_draws_are_reproducible() {
        let pairs = |tables: crate::store::Tables| {
            tables
                .assignments
                .into_iter()
                .map(|a| (a.giver_id, a.receiver_id))
                .collect::<Vec<_>>()
        };

        let first = seeded_store(&["A", "B", "C", "D", "E"]).await;
        coordinator(&first).with_seed(Some(9)).execute("g1").await.unwrap();
        let second = seeded_store(&["A", "B", "C", "D", "E"]).await;
        coordinator(&second).with_seed(Some(9)).execute("g1").await.unwrap();

        assert_eq!(pairs(first.snapshot().await), pairs(second.snapshot().await));
    }
}
