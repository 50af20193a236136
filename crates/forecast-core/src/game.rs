//! Game state model.
//!
//! A game is an append-only log of [`GameEvent`]s plus a few derived display
//! fields. Every field here is serialized in camelCase because the same JSON
//! travels to clients and is stored verbatim in the snapshot row.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Schema version stamped on every stored snapshot.
pub const CURRENT_VERSION: i32 = 1;

/// Phase label of a game that has not had its first generation yet.
pub const INITIAL_PHASE: &str = "Tutorial";

/// Minimum number of topics in a vote.
pub const MIN_TOPICS: usize = 2;
/// Maximum number of topics in a vote.
pub const MAX_TOPICS: usize = 3;
/// Minimum number of options per topic.
pub const MIN_OPTIONS: usize = 2;
/// Maximum number of options per topic.
pub const MAX_OPTIONS: usize = 4;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// In-game calendar position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDate {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, `1..=12`.
    pub month: u8,
}

impl GameDate {
    /// The date every new game starts on.
    pub const START: Self = Self {
        year: 2026,
        month: 1,
    };

    /// Checks that the month is in range.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if `month` is outside `1..=12`.
    pub fn validate(&self) -> Result<(), String> {
        if (1..=12).contains(&self.month) {
            Ok(())
        } else {
            Err(format!("month {} is out of range 1..=12", self.month))
        }
    }
}

impl fmt::Display for GameDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let month = MONTH_ABBREVIATIONS
            .get(usize::from(self.month).wrapping_sub(1))
            .copied()
            .unwrap_or("???");
        write!(f, "{}-{month}", self.year)
    }
}

/// A headline in the game's news feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEvent {
    /// When the news happened.
    pub date: GameDate,
    /// One-line headline.
    pub headline: String,
    /// Optional longer body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hidden from the player until the post-game reveal.
    #[serde(
        rename = "isHidden",
        alias = "hidden",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hidden: Option<bool>,
}

/// One selectable option within a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicOption {
    /// Option identifier, unique within its topic.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A policy question presented to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The options the player picks from.
    pub options: Vec<TopicOption>,
}

/// A set of topics awaiting the player's choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    /// Topics up for decision.
    pub topics: Vec<Topic>,
}

impl VoteEvent {
    /// Checks topic and option counts.
    ///
    /// # Errors
    ///
    /// Returns a description of the first count that is out of range.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_TOPICS..=MAX_TOPICS).contains(&self.topics.len()) {
            return Err(format!(
                "vote has {} topics, expected {MIN_TOPICS}..={MAX_TOPICS}",
                self.topics.len()
            ));
        }
        for topic in &self.topics {
            if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&topic.options.len()) {
                return Err(format!(
                    "topic {} has {} options, expected {MIN_OPTIONS}..={MAX_OPTIONS}",
                    topic.id,
                    topic.options.len()
                ));
            }
        }
        Ok(())
    }
}

/// Player choices: topic id mapped to the chosen option id.
pub type VoteChoices = BTreeMap<String, String>;

/// The player's answer to the preceding vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteChoicesEvent {
    /// Topic id to option id.
    pub choices: VoteChoices,
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Humanity did not make it.
    Extinction,
    /// Humanity thrived.
    Utopia,
}

impl Outcome {
    /// Wire/storage label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extinction => "EXTINCTION",
            Self::Utopia => "UTOPIA",
        }
    }

    /// Parses the wire/storage label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "EXTINCTION" => Some(Self::Extinction),
            "UTOPIA" => Some(Self::Utopia),
            _ => None,
        }
    }
}

/// Terminal marker of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverEvent {
    /// How the game ended.
    pub outcome: Outcome,
}

/// One entry in the append-only game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    /// A news headline.
    News(NewsEvent),
    /// Topics presented to the player.
    Vote(VoteEvent),
    /// The player's answers.
    VoteChoices(VoteChoicesEvent),
    /// The game ended.
    GameOver(GameOverEvent),
}

/// A labelled statistic in the post-game summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStat {
    /// Icon name.
    pub icon: String,
    /// Stat label.
    pub label: String,
    /// Stat value.
    pub value: String,
}

/// An annotation on one entry of the game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commentary {
    /// Index into `GameState::events`.
    pub target_event_index: i64,
    /// The annotation.
    pub comment: String,
}

/// Post-game summary attached to a finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPayload {
    /// Prose account of the game.
    pub what_happened: String,
    /// Headline statistics.
    pub stats: Vec<SummaryStat>,
    /// Annotations on key moments.
    pub commentary: Vec<Commentary>,
    /// Short shareable text.
    pub share_text: String,
}

/// Complete state of a game at one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Preset the game was started with.
    pub preset_id: String,
    /// Append-only event log.
    pub events: Vec<GameEvent>,
    /// Current phase label.
    pub phase: String,
    /// Current in-game date.
    pub date: GameDate,
    /// Whether a `gameOver` event has been written.
    pub is_game_over: bool,
    /// Post-game summary, once generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryPayload>,
}

impl GameState {
    /// Creates the state of a fresh game.
    #[must_use]
    pub fn new(preset_id: impl Into<String>) -> Self {
        Self {
            preset_id: preset_id.into(),
            events: Vec::new(),
            phase: INITIAL_PHASE.to_owned(),
            date: GameDate::START,
            is_game_over: false,
            summary: None,
        }
    }

    /// Returns the most recent event, if any.
    #[must_use]
    pub fn last_event(&self) -> Option<&GameEvent> {
        self.events.last()
    }

    /// Returns the latest vote that has not been answered yet.
    #[must_use]
    pub fn pending_vote(&self) -> Option<&VoteEvent> {
        for event in self.events.iter().rev() {
            match event {
                GameEvent::Vote(vote) => return Some(vote),
                GameEvent::VoteChoices(_) => return None,
                GameEvent::News(_) | GameEvent::GameOver(_) => {}
            }
        }
        None
    }

    /// Returns the choices of a trailing `voteChoices` event.
    #[must_use]
    pub fn trailing_choices(&self) -> Option<&VoteChoices> {
        match self.last_event() {
            Some(GameEvent::VoteChoices(event)) => Some(&event.choices),
            _ => None,
        }
    }
}
