//! Content-unit types an item can carry.
//!
//! The numeric ids are what clients send in the `type` field of a draft item
//! and what the `course_items.item_type` column stores.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Kind of content body an item holds in the content store.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text = 0,
    Video = 1,
    Question = 2,
}

impl ContentType {
    /// Return the database / wire id.
    pub fn id(self) -> i16 {
        self as i16
    }

    /// Look up a content type by its wire id.
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Text),
            1 => Some(Self::Video),
            2 => Some(Self::Question),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Video => "video",
            Self::Question => "question",
        }
    }
}

impl TryFrom<i16> for ContentType {
    type Error = CoreError;

    fn try_from(id: i16) -> Result<Self, Self::Error> {
        Self::from_id(id)
            .ok_or_else(|| CoreError::Validation(format!("Unknown content type {id}")))
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        for ty in [ContentType::Text, ContentType::Video, ContentType::Question] {
            assert_eq!(ContentType::from_id(ty.id()), Some(ty));
        }
    }

    #[test]
    fn unknown_id_is_a_validation_error() {
        let err = ContentType::try_from(7).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: Unknown content type 7");
    }
}
