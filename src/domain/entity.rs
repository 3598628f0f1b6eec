// ============================================================
// Layer 3 — Entity Labels and Placeholders
// ============================================================
// Named entities go through two representations:
//
//   EntityLabel  — what the entity IS:  PERSON, PERSON_FEMALE, GPE
//   Placeholder  — which one it is:     PERSON_0, PERSON_1_FEMALE
//
// In token streams a placeholder appears with the ENT_ prefix:
//   "ENT_PERSON_0 met ENT_PERSON_1_FEMALE in ENT_GPE_0 ."
//
// The ordinal is the only all-digit segment that follows the
// kind, so kinds that themselves contain underscores
// (WORK_OF_ART) still parse back unambiguously.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::token::{ENT_PREFIX, JOIN_CHAR};

/// Gender tag appended to PERSON entities when the name lists agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "FEMALE",
            Gender::Male => "MALE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FEMALE" => Some(Gender::Female),
            "MALE" => Some(Gender::Male),
            _ => None,
        }
    }
}

/// Entity type plus optional gender, e.g. `PERSON_FEMALE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityLabel {
    pub kind: String,
    pub gender: Option<Gender>,
}

impl EntityLabel {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), gender: None }
    }

    pub fn with_gender(mut self, gender: Option<Gender>) -> Self {
        self.gender = gender;
        self
    }

    /// Parse the rendered form back (`PERSON_MALE` → PERSON + Male).
    pub fn parse(value: &str) -> Self {
        if let Some((kind, suffix)) = value.rsplit_once(JOIN_CHAR) {
            if let Some(gender) = Gender::parse(suffix) {
                return Self::new(kind).with_gender(Some(gender));
            }
        }
        Self::new(value)
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gender {
            Some(g) => write!(f, "{}{}{}", self.kind, JOIN_CHAR, g.as_str()),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A numbered entity identifier, e.g. `PERSON_0_FEMALE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Placeholder {
    pub kind: String,
    pub ordinal: usize,
    pub gender: Option<Gender>,
}

impl Placeholder {
    pub fn new(label: &EntityLabel, ordinal: usize) -> Self {
        Self {
            kind: label.kind.clone(),
            ordinal,
            gender: label.gender,
        }
    }

    /// The label this placeholder was numbered from
    pub fn label(&self) -> EntityLabel {
        EntityLabel::new(self.kind.clone()).with_gender(self.gender)
    }

    /// The token form used inside sequences: `ENT_PERSON_0`
    pub fn token(&self) -> String {
        format!("{ENT_PREFIX}{self}")
    }

    /// Parse an identifier without the ENT_ prefix (`GPE_2`, `PERSON_0_MALE`).
    pub fn parse(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split(JOIN_CHAR).collect();

        // The ordinal is the last all-digit segment after at least one kind segment
        let ordinal_at = (1..parts.len())
            .rev()
            .find(|&i| !parts[i].is_empty() && parts[i].chars().all(|c| c.is_ascii_digit()))?;

        let ordinal = parts[ordinal_at].parse().ok()?;
        let kind = parts[..ordinal_at].join("_");

        let gender = match &parts[ordinal_at + 1..] {
            [] => None,
            [g] => Some(Gender::parse(g)?),
            _ => return None,
        };

        Some(Self { kind, ordinal, gender })
    }

    /// Parse a sequence token (`ENT_PERSON_0`); `None` for ordinary words.
    pub fn from_token(token: &str) -> Option<Self> {
        token.strip_prefix(ENT_PREFIX).and_then(Self::parse)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, JOIN_CHAR, self.ordinal)?;
        if let Some(g) = self.gender {
            write!(f, "{}{}", JOIN_CHAR, g.as_str())?;
        }
        Ok(())
    }
}
