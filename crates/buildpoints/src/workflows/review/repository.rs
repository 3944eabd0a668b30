//! Storage and collaborator abstractions so the engine can be exercised
//! against any document store. Methods correspond to the point lookups,
//! compound-key fetches, scoped listings, atomic increments, and deletes
//! the engine actually issues; how a store executes them is its business.

use serde::Serialize;

use super::domain::{
    Builder, BuilderDelta, GuildConfig, GuildId, Rejection, Reviewer, Submission, SubmissionId,
    UserId,
};

/// Error enumeration for store failures. The engine never retries; errors
/// surface to the caller of the operation that hit them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Accepted submissions, keyed by submission id.
pub trait SubmissionStore: Send + Sync {
    /// Insert or overwrite; edits reuse the same id.
    fn upsert(&self, submission: Submission) -> Result<(), StoreError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError>;
    fn delete(&self, id: &SubmissionId) -> Result<(), StoreError>;
    fn by_builder(&self, guild: &GuildId, user: &UserId) -> Result<Vec<Submission>, StoreError>;
    fn by_reviewer(&self, guild: &GuildId, user: &UserId) -> Result<Vec<Submission>, StoreError>;
    fn in_guild(&self, guild: &GuildId) -> Result<Vec<Submission>, StoreError>;
}

/// Declined submissions. Same id space as submissions; an id lives in at
/// most one of the two collections. No delete: rejections are terminal.
pub trait RejectionStore: Send + Sync {
    fn insert(&self, rejection: Rejection) -> Result<(), StoreError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<Rejection>, StoreError>;
    fn by_reviewer(&self, guild: &GuildId, user: &UserId) -> Result<Vec<Rejection>, StoreError>;
}

/// Builder running totals, keyed by (user, guild).
pub trait BuilderStore: Send + Sync {
    fn fetch(&self, guild: &GuildId, user: &UserId) -> Result<Option<Builder>, StoreError>;
    /// Atomically add `delta` to the totals, creating a zeroed record
    /// first when none exists. Returns the updated record.
    fn apply(
        &self,
        guild: &GuildId,
        user: &UserId,
        delta: BuilderDelta,
    ) -> Result<Builder, StoreError>;
    fn set_dm_enabled(
        &self,
        guild: &GuildId,
        user: &UserId,
        enabled: bool,
    ) -> Result<(), StoreError>;
    fn in_guild(&self, guild: &GuildId) -> Result<Vec<Builder>, StoreError>;
    fn all(&self) -> Result<Vec<Builder>, StoreError>;
}

/// Reviewer counters and running averages, keyed by (user, guild).
pub trait ReviewerStore: Send + Sync {
    fn fetch(&self, guild: &GuildId, user: &UserId) -> Result<Option<Reviewer>, StoreError>;
    /// Upsert the full record. The engine computes the new counters and
    /// averages; the store only persists them.
    fn save(&self, reviewer: Reviewer) -> Result<(), StoreError>;
    fn in_guild(&self, guild: &GuildId) -> Result<Vec<Reviewer>, StoreError>;
    fn all(&self) -> Result<Vec<Reviewer>, StoreError>;
}

/// Guild configuration lookup, injected per operation instead of living
/// in a process-global map. Implementations load at startup and refresh
/// on their own schedule; reads during request handling are immutable.
pub trait GuildDirectory: Send + Sync {
    fn guild(&self, id: &GuildId) -> Option<GuildConfig>;
}

/// Outbound notification hook for the command layer's DM delivery. The
/// engine emits events; delivery mechanics live outside.
pub trait ReviewNotifier: Send + Sync {
    fn notify(&self, event: ReviewEvent) -> Result<(), NotifyError>;
}

/// Events the engine emits after a state change commits. Notification
/// failure never fails the operation that produced the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReviewEvent {
    Accepted {
        guild: GuildId,
        builder: UserId,
        submission: SubmissionId,
        kind: &'static str,
        points_total: f64,
        feedback: Option<String>,
    },
    Declined {
        guild: GuildId,
        builder: UserId,
        submission: SubmissionId,
        feedback: String,
    },
    Purged {
        guild: GuildId,
        builder: UserId,
        submission: SubmissionId,
    },
    RankUp {
        guild: GuildId,
        builder: UserId,
        rank: String,
        role_id: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

impl ReviewEvent {
    /// Kind tag of the event, mostly for log lines.
    pub const fn label(&self) -> &'static str {
        match self {
            ReviewEvent::Accepted { .. } => "accepted",
            ReviewEvent::Declined { .. } => "declined",
            ReviewEvent::Purged { .. } => "purged",
            ReviewEvent::RankUp { .. } => "rank_up",
        }
    }
}
