//! Running-statistics arithmetic: O(1) incremental mean maintenance for
//! reviewer averages, signed delta computation for builder totals, and
//! the full-recompute repair path.
//!
//! Every hot-path update uses the incremental formulas; the recompute
//! functions scan the source records and exist for offline repair and for
//! verifying that the incremental path never drifts.

use super::domain::{BuildKind, Builder, BuilderDelta, GuildId, Reviewer, Submission, UserId};
use super::repository::{RejectionStore, StoreError, SubmissionStore};
use super::scoring;

/// Insert `value` into a running mean currently covering `n` samples.
pub(crate) fn mean_insert(avg: f64, n: u32, value: f64) -> f64 {
    avg + (value - avg) / (f64::from(n) + 1.0)
}

/// Remove `value` from a running mean currently covering `n` samples.
/// Removing the last sample yields 0 rather than a 0/0.
pub(crate) fn mean_remove(avg: f64, n: u32, value: f64) -> f64 {
    if n <= 1 {
        0.0
    } else {
        (avg * f64::from(n) - value) / (f64::from(n) - 1.0)
    }
}

/// Character and word measure of a piece of feedback. Characters count
/// code points, matching how feedback lengths were historically stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FeedbackMeasure {
    pub chars: f64,
    pub words: f64,
}

pub(crate) fn measure_feedback(feedback: &str) -> FeedbackMeasure {
    FeedbackMeasure {
        chars: feedback.chars().count() as f64,
        words: feedback.split_whitespace().count() as f64,
    }
}

fn nonempty(feedback: Option<&str>) -> Option<&str> {
    feedback.map(str::trim).filter(|text| !text.is_empty())
}

/// Fold an acceptance into a reviewer's running statistics. Averages are
/// updated against the pre-update counts, then the counters move.
pub(crate) fn record_acceptance(
    reviewer: &mut Reviewer,
    quality: f64,
    complexity: f64,
    feedback: Option<&str>,
) {
    reviewer.quality_avg = mean_insert(reviewer.quality_avg, reviewer.acceptances, quality);
    reviewer.complexity_avg =
        mean_insert(reviewer.complexity_avg, reviewer.acceptances, complexity);
    reviewer.acceptances += 1;
    reviewer.reviews += 1;

    if let Some(text) = nonempty(feedback) {
        let measure = measure_feedback(text);
        reviewer.feedback_chars_avg = mean_insert(
            reviewer.feedback_chars_avg,
            reviewer.reviews_with_feedback,
            measure.chars,
        );
        reviewer.feedback_words_avg = mean_insert(
            reviewer.feedback_words_avg,
            reviewer.reviews_with_feedback,
            measure.words,
        );
        reviewer.reviews_with_feedback += 1;
    }
}

/// Withdraw a previously recorded acceptance, the exact inverse of
/// [`record_acceptance`]. Used by edits (remove old, add new) and purges.
pub(crate) fn remove_acceptance(
    reviewer: &mut Reviewer,
    quality: f64,
    complexity: f64,
    feedback: Option<&str>,
) {
    reviewer.quality_avg = mean_remove(reviewer.quality_avg, reviewer.acceptances, quality);
    reviewer.complexity_avg =
        mean_remove(reviewer.complexity_avg, reviewer.acceptances, complexity);
    reviewer.acceptances = reviewer.acceptances.saturating_sub(1);
    reviewer.reviews = reviewer.reviews.saturating_sub(1);

    if let Some(text) = nonempty(feedback) {
        let measure = measure_feedback(text);
        reviewer.feedback_chars_avg = mean_remove(
            reviewer.feedback_chars_avg,
            reviewer.reviews_with_feedback,
            measure.chars,
        );
        reviewer.feedback_words_avg = mean_remove(
            reviewer.feedback_words_avg,
            reviewer.reviews_with_feedback,
            measure.words,
        );
        reviewer.reviews_with_feedback = reviewer.reviews_with_feedback.saturating_sub(1);
    }
}

/// Fold a rejection into a reviewer's running statistics. Quality and
/// complexity averages are untouched; rejections carry no grades.
pub(crate) fn record_rejection(reviewer: &mut Reviewer, feedback: &str) {
    reviewer.rejections += 1;
    reviewer.reviews += 1;

    if let Some(text) = nonempty(Some(feedback)) {
        let measure = measure_feedback(text);
        reviewer.feedback_chars_avg = mean_insert(
            reviewer.feedback_chars_avg,
            reviewer.reviews_with_feedback,
            measure.chars,
        );
        reviewer.feedback_words_avg = mean_insert(
            reviewer.feedback_words_avg,
            reviewer.reviews_with_feedback,
            measure.words,
        );
        reviewer.reviews_with_feedback += 1;
    }
}

/// Builder delta for a freshly accepted submission.
pub(crate) fn accept_delta(kind: &BuildKind, points_total: f64) -> BuilderDelta {
    scoring::count_delta(kind, points_total)
}

/// Builder delta for an edit: the difference between the new and old
/// contributions. The count metric deltas follow the kind:
/// Many recomputes from the old tier sums, One never changes its single
/// building, Road and Land take the direct value difference.
pub(crate) fn edit_delta(old: &Submission, new_kind: &BuildKind, new_points: f64) -> BuilderDelta {
    let points = new_points - old.points_total;

    match (new_kind, &old.kind) {
        (BuildKind::Many { .. }, BuildKind::Many { .. }) => BuilderDelta {
            points,
            buildings: i64::from(new_kind.building_count())
                - i64::from(old.kind.building_count()),
            ..BuilderDelta::default()
        },
        (BuildKind::One { .. }, BuildKind::One { .. }) => BuilderDelta {
            points,
            ..BuilderDelta::default()
        },
        (
            BuildKind::Road {
                road_kms: new_kms, ..
            },
            BuildKind::Road {
                road_kms: old_kms, ..
            },
        ) => BuilderDelta {
            points,
            road_kms: new_kms - old_kms,
            ..BuilderDelta::default()
        },
        (BuildKind::Land { sqm: new_sqm, .. }, BuildKind::Land { sqm: old_sqm, .. }) => {
            BuilderDelta {
                points,
                sqm: new_sqm - old_sqm,
                ..BuilderDelta::default()
            }
        }
        // Kind changes are rejected by the service before deltas are
        // computed; fall back to a full swap if one ever slips through.
        _ => {
            let mut delta = scoring::count_delta(new_kind, new_points);
            let old_delta = scoring::count_delta(&old.kind, old.points_total).negated();
            delta.points = points;
            delta.buildings += old_delta.buildings;
            delta.road_kms += old_delta.road_kms;
            delta.sqm += old_delta.sqm;
            delta
        }
    }
}

/// Builder delta reversing a purged submission.
pub(crate) fn purge_delta(submission: &Submission) -> BuilderDelta {
    scoring::count_delta(&submission.kind, submission.points_total).negated()
}

/// Rebuild a reviewer's statistics from the source records. O(n) scan;
/// offline repair and verification only, never the hot path.
pub fn recompute_reviewer<S, J>(
    submissions: &S,
    rejections: &J,
    guild: &GuildId,
    user: &UserId,
) -> Result<Reviewer, StoreError>
where
    S: SubmissionStore + ?Sized,
    J: RejectionStore + ?Sized,
{
    let accepted = submissions.by_reviewer(guild, user)?;
    let rejected = rejections.by_reviewer(guild, user)?;

    let mut reviewer = Reviewer::new(user.clone(), guild.clone());
    for submission in &accepted {
        record_acceptance(
            &mut reviewer,
            submission.quality.multiplier(),
            submission.complexity.multiplier(),
            submission.feedback.as_deref(),
        );
    }
    for rejection in &rejected {
        record_rejection(&mut reviewer, &rejection.feedback);
    }

    Ok(reviewer)
}

/// Rebuild a builder's totals from their current accepted submissions.
/// The `dm_enabled` preference is orthogonal to totals and is preserved
/// from `current` when present.
pub fn recompute_builder<S>(
    submissions: &S,
    guild: &GuildId,
    user: &UserId,
    current: Option<&Builder>,
) -> Result<Builder, StoreError>
where
    S: SubmissionStore + ?Sized,
{
    let accepted = submissions.by_builder(guild, user)?;

    let mut builder = Builder::new(user.clone(), guild.clone());
    if let Some(existing) = current {
        builder.dm_enabled = existing.dm_enabled;
    }

    for submission in &accepted {
        let delta = scoring::count_delta(&submission.kind, submission.points_total);
        builder.points_total += delta.points;
        builder.building_count += delta.buildings as u32;
        builder.road_kms += delta.road_kms;
        builder.sqm += delta.sqm;
    }

    Ok(builder)
}
