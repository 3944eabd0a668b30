//! Review scoring and running-statistics engine for moderated
//! build-submission communities.
//!
//! The `workflows::review` module is the heart of the crate: reviewers
//! accept, edit, decline, or purge build submissions, and the engine keeps
//! per-builder point totals and per-reviewer quality/feedback averages
//! consistent through every transition using O(1) incremental updates.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
