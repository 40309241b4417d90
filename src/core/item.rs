//! Values flowing between pipeline stages

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator for [`PipelineItem`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Integer input
    Int,
    /// String produced by a hashing stage
    Text,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// A single value sent through a stage channel.
///
/// Items are moved into the channel on send, so a stage can never touch a
/// value after emitting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineItem {
    /// Integer value (initial pipeline input)
    Int(i64),
    /// String value (output of every hashing stage)
    Text(String),
}

impl PipelineItem {
    /// Kind of this item
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Int(_) => ItemKind::Int,
            Self::Text(_) => ItemKind::Text,
        }
    }

    /// Unwrap an integer, or fail with a type mismatch attributed to `stage`
    pub fn into_int(self, stage: &'static str) -> Result<i64> {
        match self {
            Self::Int(value) => Ok(value),
            other => Err(PipelineError::type_mismatch(stage, ItemKind::Int, other.kind())),
        }
    }

    /// Unwrap a string, or fail with a type mismatch attributed to `stage`
    pub fn into_text(self, stage: &'static str) -> Result<String> {
        match self {
            Self::Text(value) => Ok(value),
            other => Err(PipelineError::type_mismatch(stage, ItemKind::Text, other.kind())),
        }
    }

    /// Borrow the string payload, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Int(_) => None,
        }
    }
}

impl From<i64> for PipelineItem {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for PipelineItem {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for PipelineItem {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for PipelineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Text(value) => write!(f, "{}", value),
        }
    }
}
