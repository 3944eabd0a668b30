//! Ranked views over builder and reviewer aggregates, per guild or
//! global. Metrics are a closed set so a new aggregate field cannot be
//! forgotten here without the compiler noticing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Builder, GuildId, Reviewer, UserId};

/// Hard cap on ranked entries returned.
pub const MAX_ENTRIES: usize = 50;
/// Entries per display page.
pub const PAGE_SIZE: usize = 10;

/// Which population a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Guild(GuildId),
    Global,
}

/// Builder ranking metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderMetric {
    Points,
    Buildings,
    Roads,
    Land,
}

impl BuilderMetric {
    pub fn value(self, totals: &BuilderTotals) -> f64 {
        match self {
            BuilderMetric::Points => totals.points_total,
            BuilderMetric::Buildings => f64::from(totals.building_count),
            BuilderMetric::Roads => totals.road_kms,
            BuilderMetric::Land => totals.sqm,
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            BuilderMetric::Points => "points",
            BuilderMetric::Buildings => "buildings",
            BuilderMetric::Roads => "km",
            BuilderMetric::Land => "m²",
        }
    }
}

/// Reviewer ranking metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerMetric {
    Reviews,
    Acceptances,
    Rejections,
    FeedbackChars,
    FeedbackWords,
    Quality,
    Complexity,
}

impl ReviewerMetric {
    pub fn value(self, totals: &ReviewerTotals) -> f64 {
        match self {
            ReviewerMetric::Reviews => f64::from(totals.reviews),
            ReviewerMetric::Acceptances => f64::from(totals.acceptances),
            ReviewerMetric::Rejections => f64::from(totals.rejections),
            ReviewerMetric::FeedbackChars => totals.feedback_chars_avg,
            ReviewerMetric::FeedbackWords => totals.feedback_words_avg,
            ReviewerMetric::Quality => totals.quality_avg,
            ReviewerMetric::Complexity => totals.complexity_avg,
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            ReviewerMetric::Reviews => "reviews",
            ReviewerMetric::Acceptances => "accepted reviews",
            ReviewerMetric::Rejections => "rejected reviews",
            ReviewerMetric::FeedbackChars => "characters of feedback on average",
            ReviewerMetric::FeedbackWords => "words of feedback on average",
            ReviewerMetric::Quality => "average quality reviewed",
            ReviewerMetric::Complexity => "average complexity reviewed",
        }
    }
}

/// Builder totals with guild identity stripped, so one value can stand
/// for a single guild or a cross-guild union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuilderTotals {
    pub user: UserId,
    pub points_total: f64,
    pub building_count: u32,
    pub road_kms: f64,
    pub sqm: f64,
}

impl From<Builder> for BuilderTotals {
    fn from(builder: Builder) -> Self {
        Self {
            user: builder.user,
            points_total: builder.points_total,
            building_count: builder.building_count,
            road_kms: builder.road_kms,
            sqm: builder.sqm,
        }
    }
}

/// Reviewer totals with guild identity stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewerTotals {
    pub user: UserId,
    pub reviews: u32,
    pub reviews_with_feedback: u32,
    pub acceptances: u32,
    pub rejections: u32,
    pub quality_avg: f64,
    pub complexity_avg: f64,
    pub feedback_chars_avg: f64,
    pub feedback_words_avg: f64,
}

impl From<Reviewer> for ReviewerTotals {
    fn from(reviewer: Reviewer) -> Self {
        Self {
            user: reviewer.user,
            reviews: reviewer.reviews,
            reviews_with_feedback: reviewer.reviews_with_feedback,
            acceptances: reviewer.acceptances,
            rejections: reviewer.rejections,
            quality_avg: reviewer.quality_avg,
            complexity_avg: reviewer.complexity_avg,
            feedback_chars_avg: reviewer.feedback_chars_avg,
            feedback_words_avg: reviewer.feedback_words_avg,
        }
    }
}

/// Combine two running means whose sample sizes differ. Never the naive
/// average of averages.
fn weighted_mean(avg_a: f64, n_a: u32, avg_b: f64, n_b: u32) -> f64 {
    let total = n_a + n_b;
    if total == 0 {
        0.0
    } else {
        (avg_a * f64::from(n_a) + avg_b * f64::from(n_b)) / f64::from(total)
    }
}

/// Union per-guild builder records into one totals row per user. Builder
/// fields are plain running sums, so the union is addition.
pub fn merge_builders(records: impl IntoIterator<Item = Builder>) -> Vec<BuilderTotals> {
    let mut merged: BTreeMap<String, BuilderTotals> = BTreeMap::new();

    for record in records {
        let entry = merged
            .entry(record.user.0.clone())
            .or_insert_with(|| BuilderTotals {
                user: record.user.clone(),
                points_total: 0.0,
                building_count: 0,
                road_kms: 0.0,
                sqm: 0.0,
            });
        entry.points_total += record.points_total;
        entry.building_count += record.building_count;
        entry.road_kms += record.road_kms;
        entry.sqm += record.sqm;
    }

    merged.into_values().collect()
}

/// Union per-guild reviewer records into one totals row per user.
/// Counters add; averages combine weighted by their contributing counts
/// (acceptances for quality/complexity, feedback-bearing reviews for the
/// feedback statistics).
pub fn merge_reviewers(records: impl IntoIterator<Item = Reviewer>) -> Vec<ReviewerTotals> {
    let mut merged: BTreeMap<String, ReviewerTotals> = BTreeMap::new();

    for record in records {
        let entry = merged
            .entry(record.user.0.clone())
            .or_insert_with(|| ReviewerTotals {
                user: record.user.clone(),
                reviews: 0,
                reviews_with_feedback: 0,
                acceptances: 0,
                rejections: 0,
                quality_avg: 0.0,
                complexity_avg: 0.0,
                feedback_chars_avg: 0.0,
                feedback_words_avg: 0.0,
            });

        entry.quality_avg = weighted_mean(
            entry.quality_avg,
            entry.acceptances,
            record.quality_avg,
            record.acceptances,
        );
        entry.complexity_avg = weighted_mean(
            entry.complexity_avg,
            entry.acceptances,
            record.complexity_avg,
            record.acceptances,
        );
        entry.feedback_chars_avg = weighted_mean(
            entry.feedback_chars_avg,
            entry.reviews_with_feedback,
            record.feedback_chars_avg,
            record.reviews_with_feedback,
        );
        entry.feedback_words_avg = weighted_mean(
            entry.feedback_words_avg,
            entry.reviews_with_feedback,
            record.feedback_words_avg,
            record.reviews_with_feedback,
        );

        entry.reviews += record.reviews;
        entry.reviews_with_feedback += record.reviews_with_feedback;
        entry.acceptances += record.acceptances;
        entry.rejections += record.rejections;
    }

    merged.into_values().collect()
}

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user: UserId,
    pub value: f64,
}

/// Descending ranking capped at [`MAX_ENTRIES`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    fn ranked(mut entries: Vec<LeaderboardEntry>) -> Self {
        entries.sort_by(|a, b| b.value.total_cmp(&a.value));
        entries.truncate(MAX_ENTRIES);
        Self { entries }
    }

    pub fn page(&self, index: usize) -> &[LeaderboardEntry] {
        let start = index * PAGE_SIZE;
        if start >= self.entries.len() {
            return &[];
        }
        let end = (start + PAGE_SIZE).min(self.entries.len());
        &self.entries[start..end]
    }

    pub fn page_count(&self) -> usize {
        self.entries.len().div_ceil(PAGE_SIZE)
    }
}

pub fn rank_builders(totals: Vec<BuilderTotals>, metric: BuilderMetric) -> Leaderboard {
    Leaderboard::ranked(
        totals
            .into_iter()
            .map(|row| LeaderboardEntry {
                value: metric.value(&row),
                user: row.user,
            })
            .collect(),
    )
}

pub fn rank_reviewers(totals: Vec<ReviewerTotals>, metric: ReviewerMetric) -> Leaderboard {
    Leaderboard::ranked(
        totals
            .into_iter()
            .map(|row| LeaderboardEntry {
                value: metric.value(&row),
                user: row.user,
            })
            .collect(),
    )
}
