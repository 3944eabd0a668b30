//! Build review intake, scoring, and running-statistics engine.
//!
//! A review command arrives with a submission id and reviewer-entered
//! multipliers. Accepting scores the build, persists it, and folds it into
//! the builder's running totals and the reviewer's running averages;
//! editing replays the change as remove-old-then-add-new; purging reverses
//! it; declining records a rejection that only touches reviewer feedback
//! statistics. Rank progression and leaderboards are derived views over
//! the same records.
//!
//! The engine issues a sequence of store calls per operation with no
//! cross-document transaction, so a failure partway can leave aggregates
//! partially updated. Callers receive the error; the `stats` repair
//! functions rebuild aggregates from the source records.

pub mod domain;
pub mod leaderboard;
pub mod memory;
pub mod rank;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod stats;

#[cfg(test)]
mod tests;

pub use domain::{
    BuildKind, Builder, BuilderDelta, BuildingSize, Grade, GuildConfig, GuildId, Rejection,
    ReviewInput, Reviewer, RankTier, Submission, SubmissionId, UserId,
};
pub use leaderboard::{
    BuilderMetric, BuilderTotals, Leaderboard, LeaderboardEntry, ReviewerMetric, ReviewerTotals,
    Scope,
};
pub use rank::{RankProgress, RankUp};
pub use repository::{
    BuilderStore, GuildDirectory, NotifyError, RejectionStore, ReviewEvent, ReviewNotifier,
    ReviewerStore, StoreError, SubmissionStore,
};
pub use router::review_router;
pub use scoring::PointsBreakdown;
pub use service::{DeclineRequest, ReviewError, ReviewOutcome, ReviewService, SubmissionFeedback};
