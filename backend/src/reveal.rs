//! Reveal paths.
//!
//! The token path is read-only and repeatable: holding the token is the
//! credential. The identity path trusts the caller-supplied participant id
//! and therefore only answers once per assignment. Two concurrent identity
//! reveals for the same participant can both observe `revealed == false`
//! and both answer; the flag flip itself is idempotent.

use std::sync::Arc;

use santa_core::{Assignment, ReceiverView};

use crate::error::CoreError;
use crate::now_millis;
use crate::store::ParticipantStore;

pub struct RevealGateway {
    store: Arc<dyn ParticipantStore>,
}

impl RevealGateway {
    pub fn new(store: Arc<dyn ParticipantStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn reveal_by_token(&self, token: Option<&str>) -> Result<ReceiverView, CoreError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(CoreError::MissingToken)?;

        let giver = self
            .store
            .find_participant_by_token(token)
            .await?
            .ok_or(CoreError::InvalidToken)?;
        let assignment = self
            .store
            .find_assignment_by_giver(&giver.id)
            .await?
            .ok_or(CoreError::AssignmentNotFound)?;

        tracing::debug!(participant_id = %giver.id, "token reveal");
        self.receiver_of(&assignment).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reveal_by_identity(&self, participant_id: &str) -> Result<ReceiverView, CoreError> {
        let participant_id = participant_id.trim();
        if participant_id.is_empty() {
            return Err(CoreError::MissingParticipantId);
        }

        let giver = self
            .store
            .find_participant(participant_id)
            .await?
            .ok_or(CoreError::ParticipantNotFound)?;
        let assignment = self
            .store
            .find_assignment_by_giver(&giver.id)
            .await?
            .ok_or(CoreError::AssignmentNotFound)?;

        if assignment.revealed {
            return Err(CoreError::AlreadyRevealed { name: giver.name });
        }

        self.store
            .mark_revealed(&assignment.id, now_millis())
            .await
            .map_err(|err| CoreError::UpdateFailed(err.to_string()))?;

        tracing::info!("assignment revealed");
        self.receiver_of(&assignment).await
    }

    async fn receiver_of(&self, assignment: &Assignment) -> Result<ReceiverView, CoreError> {
        let receiver = self
            .store
            .find_participant(&assignment.receiver_id)
            .await?
            .ok_or(CoreError::ReceiverNotFound)?;
        Ok(ReceiverView::from(&receiver))
    }
}
