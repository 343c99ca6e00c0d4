use serde::{Deserialize, Serialize};

mod derangement;

pub use derangement::{
    derangement, derangement_with_limit, derangement_with_rng, DerangementError, MAX_ATTEMPTS,
};

pub type GameId = String;
pub type ParticipantId = String;
pub type AssignmentId = String;

/// Number of gift preferences each participant registers.
pub const GIFT_SLOTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub id: GameId,
    pub created_at: u64,
    pub draw_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub game_id: GameId,
    pub name: String,
    pub gift_preferences: [String; GIFT_SLOTS],
    pub secret_token: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: AssignmentId,
    pub game_id: GameId,
    pub giver_id: ParticipantId,
    pub receiver_id: ParticipantId,
    pub revealed: bool,
    pub revealed_at: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    Unrevealed,
    Revealed,
}

impl Assignment {
    pub fn state(&self) -> RevealState {
        if self.revealed {
            RevealState::Revealed
        } else {
            RevealState::Unrevealed
        }
    }
}

/// What a giver learns about their receiver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiverView {
    pub name: String,
    pub gift_1: String,
    pub gift_2: String,
    pub gift_3: String,
}

impl From<&Participant> for ReceiverView {
    fn from(p: &Participant) -> Self {
        let [gift_1, gift_2, gift_3] = p.gift_preferences.clone();
        Self {
            name: p.name.clone(),
            gift_1,
            gift_2,
            gift_3,
        }
    }
}

/// Pairs each giver with a receiver using a permutation over `participants`.
///
/// `permutation[i]` is the index of the receiver for `participants[i]`.
/// Returns `(giver_id, receiver_id)` pairs in participant order.
pub fn pair_up(
    participants: &[Participant],
    permutation: &[usize],
) -> Vec<(ParticipantId, ParticipantId)> {
    participants
        .iter()
        .zip(permutation)
        .map(|(giver, &r)| (giver.id.clone(), participants[r].id.clone()))
        .collect()
}
