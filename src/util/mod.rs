//! Assorted helpers
