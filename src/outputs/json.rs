//! JSON debug artifact.
//!
//! The briefing is serialized as-is (stories, categories, top stories,
//! source counts) so a run can be inspected or diffed after the fact. The
//! pipeline never reads these files back.

use crate::models::Briefing;

/// Serialize a [`Briefing`] as pretty-printed JSON.
pub fn to_json(briefing: &Briefing) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(briefing)
}
