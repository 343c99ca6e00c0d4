//! Participant store: durable home of games, participants and assignments.
//!
//! The services only talk to [`ParticipantStore`]. Each method is atomic on
//! its own; nothing here spans several calls, so callers must not assume
//! transactional behaviour across a sequence of writes.

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use santa_core::{Assignment, Game, Participant};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} record {id} does not exist")]
    MissingRecord { table: &'static str, id: String },
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ParticipantStore: Send + Sync {
    async fn find_game(&self, game_id: &str) -> Result<Option<Game>, StoreError>;
    /// Earliest game by creation time; ties go to the first inserted.
    async fn earliest_game(&self) -> Result<Option<Game>, StoreError>;
    async fn insert_game(&self, game: Game) -> Result<(), StoreError>;
    async fn set_draw_completed(&self, game_id: &str, completed: bool) -> Result<(), StoreError>;

    async fn find_participant(&self, id: &str) -> Result<Option<Participant>, StoreError>;
    async fn find_participant_by_token(&self, token: &str)
        -> Result<Option<Participant>, StoreError>;
    /// Participants of a game ordered by `created_at`.
    async fn participants_for_game(&self, game_id: &str) -> Result<Vec<Participant>, StoreError>;
    async fn insert_participant(&self, participant: Participant) -> Result<(), StoreError>;
    async fn set_secret_token(&self, participant_id: &str, token: &str) -> Result<(), StoreError>;

    async fn has_assignments(&self, game_id: &str) -> Result<bool, StoreError>;
    async fn assignments_for_game(&self, game_id: &str) -> Result<Vec<Assignment>, StoreError>;
    async fn find_assignment_by_giver(&self, giver_id: &str)
        -> Result<Option<Assignment>, StoreError>;
    async fn insert_assignments(&self, batch: Vec<Assignment>) -> Result<(), StoreError>;
    async fn mark_revealed(&self, assignment_id: &str, at: u64) -> Result<(), StoreError>;

    /// Drops every assignment and participant of the game and clears its
    /// draw flag.
    async fn reset_game(&self, game_id: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tables {
    pub games: Vec<Game>,
    pub participants: Vec<Participant>,
    pub assignments: Vec<Assignment>,
}

/// In-process store. With a persistence path every write rewrites a JSON
/// snapshot of all tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    persist_path: Option<PathBuf>,
}

impl MemoryStore {
    pub async fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Tables>(&bytes)?,
            Err(err) if err.kind() == IoErrorKind::NotFound => Tables::default(),
            Err(err) => return Err(err.into()),
        };
        tracing::info!(
            path = %path.display(),
            games = tables.games.len(),
            participants = tables.participants.len(),
            "loaded store snapshot"
        );
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
            persist_path: Some(path),
        })
    }

    pub async fn snapshot(&self) -> Tables {
        self.tables.read().await.clone()
    }

    async fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        if let Some(path) = &self.persist_path {
            let json = serde_json::to_vec_pretty(tables)?;
            tokio::fs::write(path, json).await?;
        }
        Ok(())
    }

    async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Tables) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut tables = self.tables.write().await;
        // Changes land in memory only once the snapshot is on disk.
        let mut staged = tables.clone();
        let out = f(&mut staged)?;
        self.persist(&staged).await?;
        *tables = staged;
        Ok(out)
    }
}

fn missing(table: &'static str, id: &str) -> StoreError {
    StoreError::MissingRecord {
        table,
        id: id.to_string(),
    }
}

#[async_trait]
impl ParticipantStore for MemoryStore {
    async fn find_game(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.games.iter().find(|g| g.id == game_id).cloned())
    }

    async fn earliest_game(&self) -> Result<Option<Game>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.games.iter().min_by_key(|g| g.created_at).cloned())
    }

    async fn insert_game(&self, game: Game) -> Result<(), StoreError> {
        self.write(move |t| {
            t.games.push(game);
            Ok(())
        })
        .await
    }

    async fn set_draw_completed(&self, game_id: &str, completed: bool) -> Result<(), StoreError> {
        self.write(|t| {
            let game = t
                .games
                .iter_mut()
                .find(|g| g.id == game_id)
                .ok_or_else(|| missing("games", game_id))?;
            game.draw_completed = completed;
            Ok(())
        })
        .await
    }

    async fn find_participant(&self, id: &str) -> Result<Option<Participant>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.participants.iter().find(|p| p.id == id).cloned())
    }

    async fn find_participant_by_token(
        &self,
        token: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .iter()
            .find(|p| p.secret_token.as_deref() == Some(token))
            .cloned())
    }

    async fn participants_for_game(&self, game_id: &str) -> Result<Vec<Participant>, StoreError> {
        let tables = self.tables.read().await;
        let mut participants: Vec<Participant> = tables
            .participants
            .iter()
            .filter(|p| p.game_id == game_id)
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.created_at);
        Ok(participants)
    }

    async fn insert_participant(&self, participant: Participant) -> Result<(), StoreError> {
        self.write(move |t| {
            t.participants.push(participant);
            Ok(())
        })
        .await
    }

    async fn set_secret_token(&self, participant_id: &str, token: &str) -> Result<(), StoreError> {
        self.write(|t| {
            let p = t
                .participants
                .iter_mut()
                .find(|p| p.id == participant_id)
                .ok_or_else(|| missing("participants", participant_id))?;
            p.secret_token = Some(token.to_string());
            Ok(())
        })
        .await
    }

    async fn has_assignments(&self, game_id: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.assignments.iter().any(|a| a.game_id == game_id))
    }

    async fn assignments_for_game(&self, game_id: &str) -> Result<Vec<Assignment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.game_id == game_id)
            .cloned()
            .collect())
    }

    async fn find_assignment_by_giver(
        &self,
        giver_id: &str,
    ) -> Result<Option<Assignment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .iter()
            .find(|a| a.giver_id == giver_id)
            .cloned())
    }

    async fn insert_assignments(&self, batch: Vec<Assignment>) -> Result<(), StoreError> {
        self.write(move |t| {
            t.assignments.extend(batch);
            Ok(())
        })
        .await
    }

    async fn mark_revealed(&self, assignment_id: &str, at: u64) -> Result<(), StoreError> {
        self.write(|t| {
            let a = t
                .assignments
                .iter_mut()
                .find(|a| a.id == assignment_id)
                .ok_or_else(|| missing("assignments", assignment_id))?;
            a.revealed = true;
            a.revealed_at = Some(at);
            Ok(())
        })
        .await
    }

    async fn reset_game(&self, game_id: &str) -> Result<(), StoreError> {
        self.write(|t| {
            let game = t
                .games
                .iter_mut()
                .find(|g| g.id == game_id)
                .ok_or_else(|| missing("games", game_id))?;
            game.draw_completed = false;
            t.assignments.retain(|a| a.game_id != game_id);
            t.participants.retain(|p| p.game_id != game_id);
            Ok(())
        })
        .await
    }
}
