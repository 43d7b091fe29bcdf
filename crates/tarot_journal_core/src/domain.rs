//! crates/tarot_journal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format,
//! except for the persisted record shapes, which carry serde derives
//! because their wire format is part of the stored-record contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two top-level categories of tarot cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arcana {
    Major,
    Minor,
}

/// One of the four Minor-arcana groupings. Major-arcana cards carry no suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Wands, Suit::Cups, Suit::Swords, Suit::Pentacles];

    /// The lowercase identifier fragment used in the stable card id scheme
    /// (`wands_1`, `cups_14`, ...). Part of the persisted record format.
    pub fn id_fragment(&self) -> &'static str {
        match self {
            Suit::Wands => "wands",
            Suit::Cups => "cups",
            Suit::Swords => "swords",
            Suit::Pentacles => "pentacles",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Suit::Wands => "Wands",
            Suit::Cups => "Cups",
            Suit::Swords => "Swords",
            Suit::Pentacles => "Pentacles",
        }
    }

    pub fn name_cn(&self) -> &'static str {
        match self {
            Suit::Wands => "權杖",
            Suit::Cups => "聖杯",
            Suit::Swords => "寶劍",
            Suit::Pentacles => "錢幣",
        }
    }
}

/// The fixed positional labels of a three-card spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Past,
    Present,
    Future,
}

impl Position {
    /// The spread layout. Draws always fill these positions in this order.
    pub const SPREAD: [Position; 3] = [Position::Past, Position::Present, Position::Future];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Past => "Past",
            Position::Present => "Present",
            Position::Future => "Future",
        }
    }

    pub fn label_cn(&self) -> &'static str {
        match self {
            Position::Past => "過去",
            Position::Present => "現在",
            Position::Future => "未來",
        }
    }
}

/// An immutable catalog entry for one of the 78 cards.
#[derive(Debug, Clone)]
pub struct TarotCard {
    pub id: String,
    pub name: String,
    pub name_cn: String,
    pub arcana: Arcana,
    pub suit: Option<Suit>,
    pub number: u8,
    pub upright_keywords: Vec<String>,
    pub reversed_keywords: Vec<String>,
    pub upright_summary: String,
    pub reversed_summary: String,
    pub image_url: String,
}

impl TarotCard {
    /// The orientation-appropriate summary text.
    pub fn summary(&self, reversed: bool) -> &str {
        if reversed {
            &self.reversed_summary
        } else {
            &self.upright_summary
        }
    }

    pub fn keywords(&self, reversed: bool) -> &[String] {
        if reversed {
            &self.reversed_keywords
        } else {
            &self.upright_keywords
        }
    }
}

/// A card as drawn into a spread: the catalog entry, an orientation, and a
/// positional label. Created once by the draw engine and never mutated.
#[derive(Debug, Clone)]
pub struct DrawnCard {
    pub card: TarotCard,
    pub is_reversed: bool,
    pub position: Position,
}

impl DrawnCard {
    pub fn orientation_cn(&self) -> &'static str {
        if self.is_reversed {
            "逆位"
        } else {
            "正位"
        }
    }

    pub fn summary(&self) -> &str {
        self.card.summary(self.is_reversed)
    }

    /// The compact form stored inside a persisted reading record.
    pub fn to_ref(&self) -> CardRef {
        CardRef {
            card_id: self.card.id.clone(),
            is_reversed: self.is_reversed,
            position: self.position,
        }
    }
}

/// The persisted shape of a drawn card: only the stable card id, the
/// orientation flag, and the position. This shape must remain stable
/// across catalog versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    pub card_id: String,
    pub is_reversed: bool,
    pub position: Position,
}

/// The structured object the interpretation model is required to return.
/// Parsing is strict: a response missing any of these fields is a failure.
#[derive(Debug, Clone, Deserialize)]
pub struct Interpretation {
    /// Narrative interpretation linking the three cards, as rich text.
    pub interpretation: String,
    /// Ordered list of suggested actions.
    pub advice: Vec<String>,
    /// A single closing remark.
    pub closing: String,
}

/// The aggregate root for one question-and-answer session. Immutable once
/// its report is composed, except for the durable id assigned at first save
/// and the export URL attached after a successful export.
#[derive(Debug, Clone)]
pub struct Reading {
    /// Durable identifier, assigned by the repository at first save.
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub question: String,
    pub cards: Vec<DrawnCard>,
    /// Plain-text form of the report, used for previews and search.
    pub report_text: String,
    /// The full rich-text report shown to the user.
    pub report_html: String,
    /// Retrieval URL of the exported document, if an export succeeded.
    pub download_url: Option<String>,
}

/// The payload appended to (or updating) the reading repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingRecord {
    pub user_id: Uuid,
    pub question: String,
    pub cards: Vec<CardRef>,
    pub report_text: String,
    pub report_html: String,
}

/// A reading as reconstructed from the repository.
#[derive(Debug, Clone)]
pub struct StoredReading {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub cards: Vec<CardRef>,
    pub report_text: String,
    pub report_html: String,
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
