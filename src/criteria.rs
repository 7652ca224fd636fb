//! Scoring curves applied to candidates before selection.

pub mod recency;
