use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a submission, taken from the originating message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// Identifier of a guild (one build team's server).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub String);

/// Identifier of a member, builder or reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Size tier for a single-building submission. The tier value doubles as
/// the base point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingSize {
    Small,
    Medium,
    Large,
    Monumental,
}

impl BuildingSize {
    pub const fn base_points(self) -> f64 {
        match self {
            BuildingSize::Small => 2.0,
            BuildingSize::Medium => 5.0,
            BuildingSize::Large => 10.0,
            BuildingSize::Monumental => 20.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            BuildingSize::Small => "small",
            BuildingSize::Medium => "medium",
            BuildingSize::Large => "large",
            BuildingSize::Monumental => "monumental",
        }
    }

    /// Map the raw tier value (2/5/10/20) used by the command layer.
    pub fn from_tier(tier: u32) -> Option<Self> {
        match tier {
            2 => Some(BuildingSize::Small),
            5 => Some(BuildingSize::Medium),
            10 => Some(BuildingSize::Large),
            20 => Some(BuildingSize::Monumental),
            _ => None,
        }
    }
}

/// What was built. Exactly one variant per submission, so kind-specific
/// fields cannot exist without their kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildKind {
    One {
        size: BuildingSize,
    },
    Many {
        small: u32,
        medium: u32,
        large: u32,
    },
    Land {
        sqm: f64,
        land_type: f64,
    },
    Road {
        road_type: f64,
        road_kms: f64,
    },
}

impl BuildKind {
    pub const fn label(&self) -> &'static str {
        match self {
            BuildKind::One { .. } => "one",
            BuildKind::Many { .. } => "many",
            BuildKind::Land { .. } => "land",
            BuildKind::Road { .. } => "road",
        }
    }

    /// Whether two kinds are the same variant, regardless of field values.
    /// Edits may change the numbers but never the variant.
    pub fn same_variant(&self, other: &BuildKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Number of buildings this submission contributes to a builder's
    /// building count. Land and road contribute through their own metrics.
    pub fn building_count(&self) -> u32 {
        match self {
            BuildKind::One { .. } => 1,
            BuildKind::Many {
                small,
                medium,
                large,
            } => small + medium + large,
            BuildKind::Land { .. } | BuildKind::Road { .. } => 0,
        }
    }
}

/// Review multiplier on the fixed 1 / 1.5 / 2 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Standard,
    Good,
    Excellent,
}

impl Grade {
    pub const fn multiplier(self) -> f64 {
        match self {
            Grade::Standard => 1.0,
            Grade::Good => 1.5,
            Grade::Excellent => 2.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Grade::Standard => "standard",
            Grade::Good => "good",
            Grade::Excellent => "excellent",
        }
    }
}

/// Reviewer-entered fields for one review action, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub submission_id: SubmissionId,
    pub guild_id: GuildId,
    pub builder: UserId,
    pub reviewer: UserId,
    pub kind: BuildKind,
    pub quality: Grade,
    pub complexity: Grade,
    pub bonus: f64,
    pub collaborators: u32,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: DateTime<Utc>,
}

/// One accepted build review. `points_total` is always recomputed from
/// the scoring formula, never set by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub guild_id: GuildId,
    pub builder: UserId,
    pub reviewer: UserId,
    pub kind: BuildKind,
    pub quality: Grade,
    pub complexity: Grade,
    pub bonus: f64,
    pub collaborators: u32,
    pub points_total: f64,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: DateTime<Utc>,
}

/// One declined build review. Shares the submission id space; an id is in
/// at most one of the submission or rejection collections. Terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: SubmissionId,
    pub guild_id: GuildId,
    pub builder: UserId,
    pub reviewer: UserId,
    pub feedback: String,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: DateTime<Utc>,
}

/// Per (user, guild) running totals over the user's currently accepted
/// submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Builder {
    pub user: UserId,
    pub guild: GuildId,
    pub points_total: f64,
    pub building_count: u32,
    pub road_kms: f64,
    pub sqm: f64,
    pub dm_enabled: bool,
}

impl Builder {
    pub fn new(user: UserId, guild: GuildId) -> Self {
        Self {
            user,
            guild,
            points_total: 0.0,
            building_count: 0,
            road_kms: 0.0,
            sqm: 0.0,
            dm_enabled: true,
        }
    }
}

/// Signed adjustment applied atomically to a builder's running totals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BuilderDelta {
    pub points: f64,
    pub buildings: i64,
    pub road_kms: f64,
    pub sqm: f64,
}

impl BuilderDelta {
    /// Reverse of this delta, used when a contribution is withdrawn.
    pub fn negated(self) -> Self {
        Self {
            points: -self.points,
            buildings: -self.buildings,
            road_kms: -self.road_kms,
            sqm: -self.sqm,
        }
    }
}

/// Per (user, guild) review counters and running averages.
///
/// `quality_avg` and `complexity_avg` are means over the reviewer's
/// current acceptances; the feedback averages are means over reviews that
/// carried non-empty feedback, acceptances and rejections alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reviewer {
    pub user: UserId,
    pub guild: GuildId,
    pub reviews: u32,
    pub reviews_with_feedback: u32,
    pub acceptances: u32,
    pub rejections: u32,
    pub quality_avg: f64,
    pub complexity_avg: f64,
    pub feedback_chars_avg: f64,
    pub feedback_words_avg: f64,
}

impl Reviewer {
    pub fn new(user: UserId, guild: GuildId) -> Self {
        Self {
            user,
            guild,
            reviews: 0,
            reviews_with_feedback: 0,
            acceptances: 0,
            rejections: 0,
            quality_avg: 0.0,
            complexity_avg: 0.0,
            feedback_chars_avg: 0.0,
            feedback_words_avg: 0.0,
        }
    }
}

/// One rank threshold in a guild's ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankTier {
    pub name: String,
    pub points_required: f64,
    pub role_id: String,
}

/// Read-only guild configuration injected into each operation. Lifecycle
/// (loading, refresh) belongs to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: GuildId,
    pub name: String,
    pub emoji: String,
    pub ranks: [RankTier; 5],
}
