//! Engine settings carried in the `engine:` section of a meta model file

use serde::Deserialize;

/// How in-memory data sources generate UIDs for created rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UidGenerator {
    /// Random v4 UUID strings
    #[default]
    Uuid,
    /// Next integer above the current maximum
    Sequence,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting of subsheets (and cross-source filter lookups) per read
    pub max_relation_depth: usize,
    /// Maximum depth of cascading deletes
    pub max_cascade_depth: usize,
    /// Default collector policy for data that cannot be fetched
    pub ignore_unreadable: bool,
    /// UID generation for text UIDs (integer UIDs always use a sequence)
    pub uid_generator: UidGenerator,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_relation_depth: 8,
            max_cascade_depth: 16,
            ignore_unreadable: false,
            uid_generator: UidGenerator::Uuid,
        }
    }
}
