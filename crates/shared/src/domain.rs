use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(BoardId);
id_newtype!(SectionId);
id_newtype!(NoteId);
id_newtype!(RoomId);

const ROOM_ID_LEN: usize = 10;

impl BoardId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl SectionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl NoteId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl RoomId {
    /// Short URL-safe id, suitable for sharing a room link by hand.
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ROOM_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardVisibility {
    #[default]
    Visible,
    Hidden,
}

impl BoardVisibility {
    pub fn toggled(self) -> Self {
        match self {
            Self::Visible => Self::Hidden,
            Self::Hidden => Self::Visible,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Positive,
    Negative,
    Neutral,
    Action,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    #[default]
    Visible,
    Hidden,
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: VoteKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_id: UserId,
    #[serde(default)]
    pub votes: Vec<Vote>,
    #[serde(default)]
    pub status: NoteStatus,
}

impl Note {
    pub fn count_votes(&self, kind: VoteKind) -> usize {
        self.votes.iter().filter(|vote| vote.kind == kind).count()
    }

    pub fn vote_by(&self, user_id: &UserId) -> Option<&Vote> {
        self.votes.iter().find(|vote| &vote.user_id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Section {
    pub fn new(title: impl Into<String>, kind: SectionKind) -> Self {
        Self {
            id: SectionId::generate(),
            title: title.into(),
            kind,
            notes: Vec::new(),
        }
    }

    pub fn note_index(&self, note_id: &NoteId) -> Option<usize> {
        self.notes.iter().position(|note| &note.id == note_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub board_visibility: BoardVisibility,
}

impl Board {
    /// A fresh board carrying the three sections every retrospective starts with.
    pub fn with_default_sections(
        id: BoardId,
        title: impl Into<String>,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            creator_id,
            created_at,
            sections: vec![
                Section::new("What went well", SectionKind::Positive),
                Section::new("What to improve", SectionKind::Negative),
                Section::new("Action Items", SectionKind::Action),
            ],
            board_visibility: BoardVisibility::Visible,
        }
    }

    pub fn is_creator(&self, user_id: &UserId) -> bool {
        &self.creator_id == user_id
    }

    pub fn section_index(&self, section_id: &SectionId) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| &section.id == section_id)
    }

    pub fn note_count(&self) -> usize {
        self.sections.iter().map(|section| section.notes.len()).sum()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.sections.iter().flat_map(|section| section.notes.iter())
    }
}

/// Story points a player may put on the table, besides [`VoteValue::Unsure`].
pub const STORY_POINT_DECK: [u32; 8] = [1, 2, 3, 5, 8, 13, 21, 34];

const UNSURE_SYMBOL: &str = "?";

/// A poker vote: a story-point value or the "?" card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawVoteValue", into = "RawVoteValue")]
pub enum VoteValue {
    Points(u32),
    Unsure,
}

impl VoteValue {
    pub fn points(self) -> Option<u32> {
        match self {
            Self::Points(points) => Some(points),
            Self::Unsure => None,
        }
    }

    pub fn is_in_deck(self) -> bool {
        match self {
            Self::Points(points) => STORY_POINT_DECK.contains(&points),
            Self::Unsure => true,
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Points(points) => write!(f, "{points}"),
            Self::Unsure => f.write_str(UNSURE_SYMBOL),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawVoteValue {
    Points(u32),
    Symbol(String),
}

impl TryFrom<RawVoteValue> for VoteValue {
    type Error = String;

    fn try_from(value: RawVoteValue) -> Result<Self, Self::Error> {
        match value {
            RawVoteValue::Points(points) => Ok(Self::Points(points)),
            RawVoteValue::Symbol(symbol) if symbol == UNSURE_SYMBOL => Ok(Self::Unsure),
            RawVoteValue::Symbol(symbol) => Err(format!("unknown vote symbol '{symbol}'")),
        }
    }
}

impl From<VoteValue> for RawVoteValue {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::Points(points) => Self::Points(points),
            VoteValue::Unsure => Self::Symbol(UNSURE_SYMBOL.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Suit::Spades)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    pub name: String,
    pub user_id: UserId,
    #[serde(default)]
    pub vote: Option<VoteValue>,
    #[serde(default)]
    pub suit: Option<Suit>,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub is_owner: bool,
}

impl PlayerData {
    pub fn new(name: impl Into<String>, user_id: UserId, joined_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            user_id,
            vote: None,
            suit: None,
            joined_at,
            is_owner: false,
        }
    }

    pub fn has_voted(&self) -> bool {
        self.vote.is_some()
    }
}

/// Players are keyed by their durable `user_id`; `name` is only a display attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokerRoom {
    pub id: RoomId,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    #[serde(default)]
    pub revealed: bool,
    #[serde(default)]
    pub players: BTreeMap<UserId, PlayerData>,
}

impl PokerRoom {
    pub fn new(
        id: RoomId,
        owner_id: UserId,
        owner_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut owner = PlayerData::new(owner_name, owner_id.clone(), created_at);
        owner.is_owner = true;
        let mut players = BTreeMap::new();
        players.insert(owner_id.clone(), owner);
        Self {
            id,
            created_at,
            created_by: owner_id,
            revealed: false,
            players,
        }
    }

    pub fn is_owner(&self, user_id: &UserId) -> bool {
        &self.created_by == user_id
    }

    pub fn player_named(&self, name: &str) -> Option<&PlayerData> {
        self.players.values().find(|player| player.name == name)
    }
}
