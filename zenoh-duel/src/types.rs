/// Core types for the zenoh-duel library
use serde::{Deserialize, Serialize};

use crate::error::{DuelError, Result};
use crate::name_generator;

/// Check that a string can be used as a single keyexpr chunk
///
/// - Non-empty UTF-8 string
/// - Cannot contain: / * $ ? # @
fn validate_chunk(s: &str) -> std::result::Result<(), String> {
    if s.is_empty() {
        return Err("name cannot be empty".to_string());
    }

    for ch in s.chars() {
        if matches!(ch, '/' | '*' | '$' | '?' | '#' | '@') {
            return Err(format!("'{}' contains invalid character '{}'", s, ch));
        }
    }

    Ok(())
}

/// Unique player identifier
///
/// PlayerId must be a valid single-chunk keyexpr, it is used as the last
/// chunk of the snapshot keyexpr of its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    /// Generate a new player ID with a human-readable name
    /// Uses Markov chain-based name generation with a numeric suffix for uniqueness
    pub fn generate() -> Self {
        PlayerId(name_generator::generate_unique_name())
    }

    /// Create from a specific name (must be keyexpr-compatible)
    pub fn from_name(name: String) -> Result<Self> {
        validate_chunk(&name).map_err(DuelError::InvalidPlayerName)?;
        Ok(PlayerId(name))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlayerId {
    type Error = DuelError;

    fn try_from(value: String) -> Result<Self> {
        PlayerId::from_name(value)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Generate a new keyexpr-safe room ID
    /// Uses base58 encoding of UUID to avoid special characters
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let encoded = bs58::encode(uuid.as_bytes()).into_string();
        // Take first 12 characters, short enough to type on the command line
        RoomId(encoded.chars().take(12).collect())
    }

    /// Create from an existing identifier string
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_chunk(&id).map_err(DuelError::InvalidRoomId)?;
        Ok(RoomId(id))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = DuelError;

    fn try_from(value: String) -> Result<Self> {
        RoomId::parse(value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Created, waiting for a second player
    Waiting,
    /// Both players joined, match running
    Playing,
    /// Match over, winner (if any) recorded
    Finished,
}

impl RoomStatus {
    /// Status transitions only move forward: waiting -> playing -> finished
    pub fn can_transition_to(self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (RoomStatus::Waiting, RoomStatus::Playing)
                | (RoomStatus::Playing, RoomStatus::Finished)
                | (RoomStatus::Waiting, RoomStatus::Finished)
        )
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "waiting"),
            RoomStatus::Playing => write!(f, "playing"),
            RoomStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Room record as kept by a room store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    /// Room identifier
    pub id: RoomId,
    /// Player that created the room
    pub host: PlayerId,
    /// Player that joined the room
    pub guest: Option<PlayerId>,
    /// Current lifecycle status
    pub status: RoomStatus,
    /// Winner, only meaningful once finished
    pub winner: Option<PlayerId>,
    /// Last score reported by the host
    pub host_score: Option<u64>,
    /// Last score reported by the guest
    pub guest_score: Option<u64>,
    /// Creation time, milliseconds since UNIX epoch
    pub created_at_ms: u64,
}

impl RoomState {
    /// Create a new waiting room
    pub fn new(id: RoomId, host: PlayerId, created_at_ms: u64) -> Self {
        Self {
            id,
            host,
            guest: None,
            status: RoomStatus::Waiting,
            winner: None,
            host_score: None,
            guest_score: None,
            created_at_ms,
        }
    }

    /// Move to the next status, rejecting regressions
    pub fn transition(&mut self, next: RoomStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DuelError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Check whether the player takes part in this room
    pub fn has_player(&self, player: &PlayerId) -> bool {
        &self.host == player || self.guest.as_ref() == Some(player)
    }

    /// Get the other player of the room
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        if &self.host == player {
            self.guest.as_ref()
        } else if self.guest.as_ref() == Some(player) {
            Some(&self.host)
        } else {
            None
        }
    }

    /// Get the last score reported by the player
    pub fn score_of(&self, player: &PlayerId) -> Option<u64> {
        if &self.host == player {
            self.host_score
        } else if self.guest.as_ref() == Some(player) {
            self.guest_score
        } else {
            None
        }
    }

    /// Record the score reported by the player; returns false for strangers
    pub fn record_score(&mut self, player: &PlayerId, score: u64) -> bool {
        if &self.host == player {
            self.host_score = Some(score);
            true
        } else if self.guest.as_ref() == Some(player) {
            self.guest_score = Some(score);
            true
        } else {
            false
        }
    }
}

/// Current time in milliseconds since UNIX epoch
pub fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_generation() {
        let id1 = PlayerId::generate();
        let id2 = PlayerId::generate();
        assert!(!id1.as_str().is_empty());
        assert!(!id2.as_str().is_empty());
    }

    #[test]
    fn test_player_id_invalid_characters() {
        assert!(PlayerId::from_name("has/slash".to_string()).is_err());
        assert!(PlayerId::from_name("has*star".to_string()).is_err());
        assert!(PlayerId::from_name("has$dollar".to_string()).is_err());
        assert!(PlayerId::from_name("has?question".to_string()).is_err());
        assert!(PlayerId::from_name("has#hash".to_string()).is_err());
        assert!(PlayerId::from_name("has@at".to_string()).is_err());
        assert!(PlayerId::from_name("".to_string()).is_err());
    }

    #[test]
    fn test_room_id_generation_is_keyexpr_safe() {
        let id = RoomId::generate();
        assert_eq!(id.as_str().len(), 12);
        assert!(RoomId::parse(id.as_str()).is_ok());
        assert_ne!(RoomId::generate(), RoomId::generate());
    }

    #[test]
    fn test_room_id_serde_validates() {
        let ok: RoomId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<RoomId>("\"a/b\"").is_err());
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        let host = PlayerId::from_name("host".to_string()).unwrap();
        let mut room = RoomState::new(RoomId::parse("r1").unwrap(), host, 0);
        assert!(room.transition(RoomStatus::Playing).is_ok());
        assert!(room.transition(RoomStatus::Waiting).is_err());
        assert!(room.transition(RoomStatus::Finished).is_ok());
        assert!(room.transition(RoomStatus::Playing).is_err());
        assert!(room.transition(RoomStatus::Finished).is_err());
        assert_eq!(room.status, RoomStatus::Finished);
    }

    #[test]
    fn test_opponent_and_scores() {
        let host = PlayerId::from_name("host".to_string()).unwrap();
        let guest = PlayerId::from_name("guest".to_string()).unwrap();
        let stranger = PlayerId::from_name("stranger".to_string()).unwrap();
        let mut room = RoomState::new(RoomId::parse("r1").unwrap(), host.clone(), 0);
        assert_eq!(room.opponent_of(&host), None);
        room.guest = Some(guest.clone());
        assert_eq!(room.opponent_of(&host), Some(&guest));
        assert_eq!(room.opponent_of(&guest), Some(&host));
        assert_eq!(room.opponent_of(&stranger), None);

        assert!(room.record_score(&guest, 420));
        assert!(!room.record_score(&stranger, 1));
        assert_eq!(room.score_of(&guest), Some(420));
        assert_eq!(room.score_of(&host), None);
    }
}
