use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::review::domain::{
    BuildKind, BuildingSize, Grade, GuildConfig, GuildId, RankTier, Rejection, ReviewInput,
    Submission, SubmissionId, UserId,
};
use crate::workflows::review::memory::{
    MemoryBuilders, MemoryNotifier, MemoryRejections, MemoryReviewers, MemorySubmissions,
    StaticGuildDirectory,
};
use crate::workflows::review::repository::{RejectionStore, StoreError, SubmissionStore};
use crate::workflows::review::{review_router, ReviewService};

pub(super) type MemoryService =
    ReviewService<MemorySubmissions, MemoryRejections, MemoryBuilders, MemoryReviewers, MemoryNotifier>;

pub(super) const GUILD: &str = "guild-main";
pub(super) const OTHER_GUILD: &str = "guild-other";
pub(super) const BUILDER: &str = "member-builder";
pub(super) const REVIEWER: &str = "member-reviewer";

pub(super) fn guild_id() -> GuildId {
    GuildId(GUILD.to_string())
}

pub(super) fn builder_id() -> UserId {
    UserId(BUILDER.to_string())
}

pub(super) fn reviewer_id() -> UserId {
    UserId(REVIEWER.to_string())
}

pub(super) fn submitted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().expect("valid timestamp")
}

pub(super) fn reviewed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid timestamp")
}

pub(super) fn guild_config() -> GuildConfig {
    GuildConfig {
        guild_id: guild_id(),
        name: "Main Build Team".to_string(),
        emoji: "🏛".to_string(),
        ranks: [
            tier("Apprentice", 0.0, "role-1"),
            tier("Builder", 50.0, "role-2"),
            tier("Architect", 200.0, "role-3"),
            tier("Master", 450.0, "role-4"),
            tier("Grandmaster", 800.0, "role-5"),
        ],
    }
}

fn tier(name: &str, points_required: f64, role_id: &str) -> RankTier {
    RankTier {
        name: name.to_string(),
        points_required,
        role_id: role_id.to_string(),
    }
}

/// A large single building reviewed at good quality, split two ways:
/// 10 * 1.5 * 1.0 / 2 = 7.5 points.
pub(super) fn one_input(id: &str) -> ReviewInput {
    ReviewInput {
        submission_id: SubmissionId(id.to_string()),
        guild_id: guild_id(),
        builder: builder_id(),
        reviewer: reviewer_id(),
        kind: BuildKind::One {
            size: BuildingSize::Large,
        },
        quality: Grade::Good,
        complexity: Grade::Standard,
        bonus: 1.0,
        collaborators: 2,
        feedback: Some("Solid detailing on the roof line".to_string()),
        submitted_at: submitted_at(),
        reviewed_at: reviewed_at(),
    }
}

/// A batch of two small and one medium building at standard grades:
/// (2*2 + 1*5) * 1.0 * 1.0 = 9 points, 3 buildings.
pub(super) fn many_input(id: &str) -> ReviewInput {
    ReviewInput {
        kind: BuildKind::Many {
            small: 2,
            medium: 1,
            large: 0,
        },
        quality: Grade::Standard,
        complexity: Grade::Standard,
        collaborators: 1,
        feedback: None,
        ..one_input(id)
    }
}

/// Four kilometres of road at type 1.5 and excellent quality:
/// 1.5 * 4 * 2.0 * 1.0 = 12 points.
pub(super) fn road_input(id: &str) -> ReviewInput {
    ReviewInput {
        kind: BuildKind::Road {
            road_type: 1.5,
            road_kms: 4.0,
        },
        quality: Grade::Excellent,
        complexity: Grade::Standard,
        collaborators: 1,
        ..one_input(id)
    }
}

/// 250 000 square metres of type-2 land at good quality:
/// 250000 * 2 * 1.5 / 100000 = 7.5 points.
pub(super) fn land_input(id: &str) -> ReviewInput {
    ReviewInput {
        kind: BuildKind::Land {
            sqm: 250_000.0,
            land_type: 2.0,
        },
        quality: Grade::Good,
        complexity: Grade::Standard,
        collaborators: 1,
        ..one_input(id)
    }
}

pub(super) struct Harness {
    pub service: Arc<MemoryService>,
    pub submissions: MemorySubmissions,
    pub rejections: MemoryRejections,
    pub builders: MemoryBuilders,
    pub reviewers: MemoryReviewers,
    pub notifier: MemoryNotifier,
}

pub(super) fn harness() -> Harness {
    let submissions = MemorySubmissions::default();
    let rejections = MemoryRejections::default();
    let builders = MemoryBuilders::default();
    let reviewers = MemoryReviewers::default();
    let notifier = MemoryNotifier::default();

    let service = Arc::new(ReviewService::new(
        Arc::new(submissions.clone()),
        Arc::new(rejections.clone()),
        Arc::new(builders.clone()),
        Arc::new(reviewers.clone()),
        Arc::new(notifier.clone()),
    ));

    Harness {
        service,
        submissions,
        rejections,
        builders,
        reviewers,
        notifier,
    }
}

pub(super) fn memory_router(harness: &Harness) -> axum::Router {
    review_router(
        Arc::clone(&harness.service),
        Arc::new(StaticGuildDirectory::with_guilds([guild_config()])),
    )
}

/// Submission store that refuses every call, for failure-path routing
/// tests.
#[derive(Clone)]
pub(super) struct UnavailableSubmissions;

impl SubmissionStore for UnavailableSubmissions {
    fn upsert(&self, _submission: Submission) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("document store offline".to_string()))
    }

    fn fetch(&self, _id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        Err(StoreError::Unavailable("document store offline".to_string()))
    }

    fn delete(&self, _id: &SubmissionId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("document store offline".to_string()))
    }

    fn by_builder(&self, _guild: &GuildId, _user: &UserId) -> Result<Vec<Submission>, StoreError> {
        Err(StoreError::Unavailable("document store offline".to_string()))
    }

    fn by_reviewer(&self, _guild: &GuildId, _user: &UserId) -> Result<Vec<Submission>, StoreError> {
        Err(StoreError::Unavailable("document store offline".to_string()))
    }

    fn in_guild(&self, _guild: &GuildId) -> Result<Vec<Submission>, StoreError> {
        Err(StoreError::Unavailable("document store offline".to_string()))
    }
}

pub(super) fn unavailable_router() -> axum::Router {
    let service = Arc::new(ReviewService::new(
        Arc::new(UnavailableSubmissions),
        Arc::new(MemoryRejections::default()),
        Arc::new(MemoryBuilders::default()),
        Arc::new(MemoryReviewers::default()),
        Arc::new(MemoryNotifier::default()),
    ));
    review_router(
        service,
        Arc::new(StaticGuildDirectory::with_guilds([guild_config()])),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn seed_rejection(store: &MemoryRejections, id: &str, feedback: &str) {
    store
        .insert(Rejection {
            id: SubmissionId(id.to_string()),
            guild_id: guild_id(),
            builder: builder_id(),
            reviewer: reviewer_id(),
            feedback: feedback.to_string(),
            submitted_at: submitted_at(),
            reviewed_at: reviewed_at(),
        })
        .expect("seed rejection");
}

pub(super) fn approx(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}
