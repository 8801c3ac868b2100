use crate::domain_model::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Verse,
    Chapter,
    Book,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScopeKind::Verse => "verse",
            ScopeKind::Chapter => "chapter",
            ScopeKind::Book => "book",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ScopeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verse" => Ok(ScopeKind::Verse),
            "chapter" => Ok(ScopeKind::Chapter),
            "book" => Ok(ScopeKind::Book),
            other => Err(ValidationError::UnknownKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown scope kind: {0}")]
    UnknownKind(String),
    #[error("scope field `{0}` is required")]
    MissingField(&'static str),
    #[error("scope field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: u32 },
    #[error("a {0} scope cannot carry a verse")]
    UnexpectedVerse(ScopeKind),
    #[error("scope field `{field}` contains reserved character `{found}`")]
    ReservedCharacter { field: &'static str, found: char },
}

// separators of the ScopeKey format
const KEY_DELIMITERS: [char; 2] = [':', '|'];

/// A passage a donation or status check targets.
///
/// Equality is structural. A `Scope` is only meaningful once [`Scope::validate`]
/// accepted it; the status layer validates before touching cache or network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub kind: ScopeKind,
    pub lang: String,
    pub source: String,
    pub book_number: u32,
    pub chapter: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verse: Option<u32>,
}

impl Scope {
    pub fn verse(lang: &str, source: &str, book_number: u32, chapter: u32, verse: u32) -> Self {
        Self {
            kind: ScopeKind::Verse,
            lang: lang.to_owned(),
            source: source.to_owned(),
            book_number,
            chapter,
            verse: Some(verse),
        }
    }

    pub fn chapter(lang: &str, source: &str, book_number: u32, chapter: u32) -> Self {
        Self {
            kind: ScopeKind::Chapter,
            lang: lang.to_owned(),
            source: source.to_owned(),
            book_number,
            chapter,
            verse: None,
        }
    }

    pub fn book(lang: &str, source: &str, book_number: u32, chapter: u32) -> Self {
        Self {
            kind: ScopeKind::Book,
            lang: lang.to_owned(),
            source: source.to_owned(),
            book_number,
            chapter,
            verse: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lang.trim().is_empty() {
            return Err(ValidationError::MissingField("lang"));
        }
        if self.source.trim().is_empty() {
            return Err(ValidationError::MissingField("source"));
        }
        for (field, value) in [("lang", &self.lang), ("source", &self.source)] {
            if let Some(found) = value.chars().find(|c| KEY_DELIMITERS.contains(c)) {
                return Err(ValidationError::ReservedCharacter { field, found });
            }
        }
        if self.book_number == 0 {
            return Err(ValidationError::OutOfRange {
                field: "bookNumber",
                value: 0,
            });
        }
        if self.kind != ScopeKind::Book && self.chapter == 0 {
            return Err(ValidationError::OutOfRange {
                field: "chapter",
                value: 0,
            });
        }
        match (self.kind, self.verse) {
            (ScopeKind::Verse, None) => Err(ValidationError::MissingField("verse")),
            (ScopeKind::Verse, Some(0)) => Err(ValidationError::OutOfRange {
                field: "verse",
                value: 0,
            }),
            (ScopeKind::Verse, Some(_)) => Ok(()),
            (kind, Some(_)) => Err(ValidationError::UnexpectedVerse(kind)),
            (_, None) => Ok(()),
        }
    }

    /// True when `other` names the same passage. The verse only counts for verse scopes.
    pub fn same_passage(&self, other: &Scope) -> bool {
        self.kind == other.kind
            && self.lang == other.lang
            && self.source == other.source
            && self.book_number == other.book_number
            && self.chapter == other.chapter
            && (self.kind != ScopeKind::Verse || self.verse == other.verse)
    }
}

/// Canonical cache/registry key for a `(Scope, user)` pair.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(scope: &Scope, user_id: Option<&UserId>) -> Self {
        let verse = match (scope.kind, scope.verse) {
            (ScopeKind::Verse, Some(v)) => v.to_string(),
            _ => "-".to_owned(),
        };
        let user = user_id.map(|u| u.0.as_str()).unwrap_or("anonymous");
        ScopeKey(format!(
            "{}:{}:{}:{}:{}:{}|{}",
            scope.kind, scope.lang, scope.source, scope.book_number, scope.chapter, verse, user
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
