use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::domain::{
    Builder, GuildConfig, GuildId, Rejection, ReviewInput, Reviewer, Submission, SubmissionId,
    UserId,
};
use super::leaderboard::{
    self, BuilderMetric, BuilderTotals, Leaderboard, ReviewerMetric, ReviewerTotals, Scope,
};
use super::rank::{self, RankProgress, RankUp};
use super::repository::{
    BuilderStore, NotifyError, RejectionStore, ReviewEvent, ReviewNotifier, ReviewerStore,
    StoreError, SubmissionStore,
};
use super::scoring::{self, PointsBreakdown};
use super::stats;

/// Errors surfaced by review operations. The validation variants are
/// caller-fixable; the consistency variants mean an aggregate record the
/// engine relies on has gone missing and needs a repair pass; store
/// errors pass through untouched.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("you cannot review your own submission")]
    SelfReview,
    #[error("collaborators must be at least 1")]
    ZeroCollaborators,
    #[error("that submission has already been accepted")]
    AlreadyAccepted,
    #[error("that submission has already been rejected")]
    AlreadyRejected,
    #[error("that submission has not been reviewed yet")]
    NotYetReviewed,
    #[error("could not find a submission with that id")]
    UnknownSubmission,
    #[error("the submission kind cannot change on an edit; purge and re-review instead")]
    KindChanged,
    #[error("an edit cannot move a submission to another builder or guild")]
    OwnerChanged,
    #[error("that submission belongs to another guild and cannot be purged from this one")]
    ForeignGuild,
    #[error("decline feedback must not be empty")]
    EmptyFeedback,
    #[error("reviewer record for {user} in guild {guild} is missing; statistics need repair")]
    MissingReviewer { guild: String, user: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReviewError {
    /// True for errors the caller can fix by changing the request.
    pub const fn is_validation(&self) -> bool {
        !matches!(
            self,
            ReviewError::Store(_) | ReviewError::MissingReviewer { .. }
        )
    }
}

/// Result of accepting or editing a review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub breakdown: PointsBreakdown,
    /// Set when this review pushed the builder over a rank threshold.
    pub rank_up: Option<RankUp>,
}

/// Input for declining a submission. Carries the message-derived fields
/// the rejection record stores alongside the reviewer's feedback.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclineRequest {
    pub submission_id: SubmissionId,
    pub guild_id: GuildId,
    pub builder: UserId,
    pub reviewer: UserId,
    pub feedback: String,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: DateTime<Utc>,
}

/// Stored feedback view for a submission id, accepted or rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionFeedback {
    Accepted {
        reviewer: UserId,
        points_total: f64,
        feedback: Option<String>,
    },
    Rejected {
        reviewer: UserId,
        feedback: String,
    },
}

/// Facade composing the stores, scoring formulas, statistics arithmetic,
/// and rank evaluation into the operations the command layer invokes.
pub struct ReviewService<S, J, B, R, N> {
    submissions: Arc<S>,
    rejections: Arc<J>,
    builders: Arc<B>,
    reviewers: Arc<R>,
    notifier: Arc<N>,
}

impl<S, J, B, R, N> ReviewService<S, J, B, R, N>
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
{
    pub fn new(
        submissions: Arc<S>,
        rejections: Arc<J>,
        builders: Arc<B>,
        reviewers: Arc<R>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            submissions,
            rejections,
            builders,
            reviewers,
            notifier,
        }
    }

    /// Accept a first review: score the submission, persist it, fold it
    /// into builder and reviewer statistics, then evaluate rank
    /// progression against the updated totals.
    pub fn accept_review(
        &self,
        guild: &GuildConfig,
        builder_roles: &[String],
        input: ReviewInput,
    ) -> Result<ReviewOutcome, ReviewError> {
        let input = validate_input(input)?;

        if self.submissions.fetch(&input.submission_id)?.is_some() {
            return Err(ReviewError::AlreadyAccepted);
        }
        if self.rejections.fetch(&input.submission_id)?.is_some() {
            return Err(ReviewError::AlreadyRejected);
        }

        let breakdown = scoring::score(&input);
        let submission = to_submission(&input, breakdown.points_total);

        self.submissions.upsert(submission.clone())?;

        let delta = stats::accept_delta(&submission.kind, submission.points_total);
        let builder = self
            .builders
            .apply(&submission.guild_id, &submission.builder, delta)?;

        let mut reviewer = self
            .reviewers
            .fetch(&submission.guild_id, &submission.reviewer)?
            .unwrap_or_else(|| {
                Reviewer::new(submission.reviewer.clone(), submission.guild_id.clone())
            });
        stats::record_acceptance(
            &mut reviewer,
            submission.quality.multiplier(),
            submission.complexity.multiplier(),
            submission.feedback.as_deref(),
        );
        self.reviewers.save(reviewer)?;

        let rank_up = self.evaluate_rank(guild, &builder, builder_roles)?;
        self.notify_acceptance(&submission, &builder, rank_up.as_ref());

        Ok(ReviewOutcome { breakdown, rank_up })
    }

    /// Edit an accepted review in place: adjust builder totals by the
    /// delta and replay the reviewer statistics as remove-old-then-add-new
    /// so same-reviewer edits stay consistent.
    pub fn edit_review(
        &self,
        guild: &GuildConfig,
        builder_roles: &[String],
        input: ReviewInput,
    ) -> Result<ReviewOutcome, ReviewError> {
        let input = validate_input(input)?;

        let original = match self.submissions.fetch(&input.submission_id)? {
            Some(submission) => submission,
            None => {
                if self.rejections.fetch(&input.submission_id)?.is_some() {
                    return Err(ReviewError::AlreadyRejected);
                }
                return Err(ReviewError::NotYetReviewed);
            }
        };

        // Edits re-grade the stored submission; they never reassign it.
        // A changed builder would leave the old owner's totals standing
        // while only the delta reached the new one.
        if input.builder != original.builder || input.guild_id != original.guild_id {
            return Err(ReviewError::OwnerChanged);
        }
        if !original.kind.same_variant(&input.kind) {
            return Err(ReviewError::KindChanged);
        }

        let breakdown = scoring::score(&input);
        let submission = to_submission(&input, breakdown.points_total);

        self.submissions.upsert(submission.clone())?;

        let delta = stats::edit_delta(&original, &submission.kind, submission.points_total);
        let builder = self
            .builders
            .apply(&submission.guild_id, &submission.builder, delta)?;

        // Remove the original review from its reviewer before crediting
        // the editor; when both are the same person the ordering keeps
        // the counts exact.
        self.withdraw_reviewer_stats(&original)?;

        let mut reviewer = self
            .reviewers
            .fetch(&submission.guild_id, &submission.reviewer)?
            .unwrap_or_else(|| {
                Reviewer::new(submission.reviewer.clone(), submission.guild_id.clone())
            });
        stats::record_acceptance(
            &mut reviewer,
            submission.quality.multiplier(),
            submission.complexity.multiplier(),
            submission.feedback.as_deref(),
        );
        self.reviewers.save(reviewer)?;

        let rank_up = self.evaluate_rank(guild, &builder, builder_roles)?;
        self.notify_acceptance(&submission, &builder, rank_up.as_ref());

        Ok(ReviewOutcome { breakdown, rank_up })
    }

    /// Decline a submission. Builder totals are untouched; the rejection
    /// only feeds the reviewer's feedback statistics. A first-time
    /// reviewer gets a zeroed record created on demand.
    pub fn decline_review(&self, request: DeclineRequest) -> Result<(), ReviewError> {
        let feedback = request.feedback.trim().to_string();
        if feedback.is_empty() {
            return Err(ReviewError::EmptyFeedback);
        }
        if request.reviewer == request.builder {
            return Err(ReviewError::SelfReview);
        }

        if self.submissions.fetch(&request.submission_id)?.is_some() {
            return Err(ReviewError::AlreadyAccepted);
        }
        if self.rejections.fetch(&request.submission_id)?.is_some() {
            return Err(ReviewError::AlreadyRejected);
        }

        let rejection = Rejection {
            id: request.submission_id.clone(),
            guild_id: request.guild_id.clone(),
            builder: request.builder.clone(),
            reviewer: request.reviewer.clone(),
            feedback: feedback.clone(),
            submitted_at: request.submitted_at,
            reviewed_at: request.reviewed_at,
        };
        self.rejections.insert(rejection)?;

        let mut reviewer = self
            .reviewers
            .fetch(&request.guild_id, &request.reviewer)?
            .unwrap_or_else(|| Reviewer::new(request.reviewer.clone(), request.guild_id.clone()));
        stats::record_rejection(&mut reviewer, &feedback);
        self.reviewers.save(reviewer)?;

        self.emit(ReviewEvent::Declined {
            guild: request.guild_id,
            builder: request.builder,
            submission: request.submission_id,
            feedback,
        });

        Ok(())
    }

    /// Purge an accepted submission, reversing its effect on builder and
    /// reviewer statistics. The reviewer adjustment reads the reviewer id
    /// off the stored submission and runs before the record is deleted.
    pub fn purge_submission(
        &self,
        id: &SubmissionId,
        requesting_guild: &GuildId,
    ) -> Result<(), ReviewError> {
        let submission = match self.submissions.fetch(id)? {
            Some(submission) => submission,
            None => {
                if self.rejections.fetch(id)?.is_some() {
                    return Err(ReviewError::AlreadyRejected);
                }
                return Err(ReviewError::UnknownSubmission);
            }
        };

        if submission.guild_id != *requesting_guild {
            return Err(ReviewError::ForeignGuild);
        }

        self.withdraw_reviewer_stats(&submission)?;

        let builder = self.builders.apply(
            &submission.guild_id,
            &submission.builder,
            stats::purge_delta(&submission),
        )?;

        self.submissions.delete(id)?;

        if builder.dm_enabled {
            self.emit(ReviewEvent::Purged {
                guild: submission.guild_id,
                builder: submission.builder,
                submission: submission.id,
            });
        }

        Ok(())
    }

    /// Builder ranking for a metric, per guild or merged across guilds.
    pub fn builder_leaderboard(
        &self,
        scope: &Scope,
        metric: BuilderMetric,
    ) -> Result<Leaderboard, ReviewError> {
        let totals = self.builder_rows(scope)?;
        Ok(leaderboard::rank_builders(totals, metric))
    }

    /// Reviewer ranking for a metric, per guild or merged across guilds.
    pub fn reviewer_leaderboard(
        &self,
        scope: &Scope,
        metric: ReviewerMetric,
    ) -> Result<Leaderboard, ReviewError> {
        let totals = self.reviewer_rows(scope)?;
        Ok(leaderboard::rank_reviewers(totals, metric))
    }

    /// Running totals for one builder. Global scope sums the builder's
    /// per-guild records.
    pub fn builder_stats(
        &self,
        user: &UserId,
        scope: &Scope,
    ) -> Result<BuilderTotals, ReviewError> {
        let mut rows = self.builder_rows(scope)?;
        rows.retain(|row| row.user == *user);
        rows.pop().ok_or(ReviewError::Store(StoreError::NotFound))
    }

    /// Running statistics for one reviewer. Global scope merges per-guild
    /// records with sample-size weighting.
    pub fn reviewer_stats(
        &self,
        user: &UserId,
        scope: &Scope,
    ) -> Result<ReviewerTotals, ReviewError> {
        let mut rows = self.reviewer_rows(scope)?;
        rows.retain(|row| row.user == *user);
        rows.pop().ok_or(ReviewError::Store(StoreError::NotFound))
    }

    /// Rank-progress report for one builder.
    pub fn builder_progress(
        &self,
        guild: &GuildConfig,
        user: &UserId,
    ) -> Result<RankProgress, ReviewError> {
        let points = self
            .builders
            .fetch(&guild.guild_id, user)?
            .map(|builder| builder.points_total)
            .unwrap_or(0.0);
        let history = self.submissions.by_builder(&guild.guild_id, user)?;
        Ok(rank::progress(guild, points, &history))
    }

    /// Whole-guild construction totals.
    pub fn guild_progress(&self, guild: &GuildId) -> Result<BuilderTotals, ReviewError> {
        let builders = self.builders.in_guild(guild)?;
        let mut totals = BuilderTotals {
            user: UserId(guild.0.clone()),
            points_total: 0.0,
            building_count: 0,
            road_kms: 0.0,
            sqm: 0.0,
        };
        for row in leaderboard::merge_builders(builders) {
            totals.points_total += row.points_total;
            totals.building_count += row.building_count;
            totals.road_kms += row.road_kms;
            totals.sqm += row.sqm;
        }
        Ok(totals)
    }

    /// Stored feedback for a submission id, whichever collection holds it.
    pub fn submission_feedback(
        &self,
        id: &SubmissionId,
    ) -> Result<SubmissionFeedback, ReviewError> {
        if let Some(submission) = self.submissions.fetch(id)? {
            return Ok(SubmissionFeedback::Accepted {
                reviewer: submission.reviewer,
                points_total: submission.points_total,
                feedback: submission.feedback,
            });
        }
        if let Some(rejection) = self.rejections.fetch(id)? {
            return Ok(SubmissionFeedback::Rejected {
                reviewer: rejection.reviewer,
                feedback: rejection.feedback,
            });
        }
        Err(ReviewError::UnknownSubmission)
    }

    /// Opt a builder in or out of notification DMs.
    pub fn set_dm_preference(
        &self,
        guild: &GuildId,
        user: &UserId,
        enabled: bool,
    ) -> Result<(), ReviewError> {
        self.builders.set_dm_enabled(guild, user, enabled)?;
        Ok(())
    }

    /// Offline repair: rebuild a reviewer's statistics from the source
    /// records and persist the result.
    pub fn repair_reviewer_stats(
        &self,
        guild: &GuildId,
        user: &UserId,
    ) -> Result<Reviewer, ReviewError> {
        let rebuilt = stats::recompute_reviewer(
            self.submissions.as_ref(),
            self.rejections.as_ref(),
            guild,
            user,
        )?;
        self.reviewers.save(rebuilt.clone())?;
        Ok(rebuilt)
    }

    /// Offline repair: rebuild a builder's totals from their accepted
    /// submissions and persist the result.
    pub fn repair_builder_totals(
        &self,
        guild: &GuildId,
        user: &UserId,
    ) -> Result<Builder, ReviewError> {
        let current = self.builders.fetch(guild, user)?;
        let rebuilt =
            stats::recompute_builder(self.submissions.as_ref(), guild, user, current.as_ref())?;
        let delta = super::domain::BuilderDelta {
            points: rebuilt.points_total - current.as_ref().map_or(0.0, |b| b.points_total),
            buildings: i64::from(rebuilt.building_count)
                - i64::from(current.as_ref().map_or(0, |b| b.building_count)),
            road_kms: rebuilt.road_kms - current.as_ref().map_or(0.0, |b| b.road_kms),
            sqm: rebuilt.sqm - current.as_ref().map_or(0.0, |b| b.sqm),
        };
        Ok(self.builders.apply(guild, user, delta)?)
    }

    fn builder_rows(&self, scope: &Scope) -> Result<Vec<BuilderTotals>, ReviewError> {
        let rows = match scope {
            Scope::Guild(guild) => self
                .builders
                .in_guild(guild)?
                .into_iter()
                .map(BuilderTotals::from)
                .collect(),
            Scope::Global => leaderboard::merge_builders(self.builders.all()?),
        };
        Ok(rows)
    }

    fn reviewer_rows(&self, scope: &Scope) -> Result<Vec<ReviewerTotals>, ReviewError> {
        let rows = match scope {
            Scope::Guild(guild) => self
                .reviewers
                .in_guild(guild)?
                .into_iter()
                .map(ReviewerTotals::from)
                .collect(),
            Scope::Global => leaderboard::merge_reviewers(self.reviewers.all()?),
        };
        Ok(rows)
    }

    /// Remove a stored submission's contribution from its reviewer. A
    /// missing reviewer record here is a consistency fault: the stats it
    /// should hold cannot be adjusted, so fail loudly instead of zeroing.
    fn withdraw_reviewer_stats(&self, submission: &Submission) -> Result<(), ReviewError> {
        let mut reviewer = match self
            .reviewers
            .fetch(&submission.guild_id, &submission.reviewer)?
        {
            Some(reviewer) => reviewer,
            None => {
                error!(
                    guild = %submission.guild_id.0,
                    reviewer = %submission.reviewer.0,
                    submission = %submission.id.0,
                    "reviewer record missing while withdrawing review statistics"
                );
                return Err(ReviewError::MissingReviewer {
                    guild: submission.guild_id.0.clone(),
                    user: submission.reviewer.0.clone(),
                });
            }
        };

        stats::remove_acceptance(
            &mut reviewer,
            submission.quality.multiplier(),
            submission.complexity.multiplier(),
            submission.feedback.as_deref(),
        );
        self.reviewers.save(reviewer)?;
        Ok(())
    }

    fn evaluate_rank(
        &self,
        guild: &GuildConfig,
        builder: &Builder,
        held_roles: &[String],
    ) -> Result<Option<RankUp>, ReviewError> {
        let history = self
            .submissions
            .by_builder(&guild.guild_id, &builder.user)?;
        Ok(rank::evaluate(
            guild,
            builder.points_total,
            &history,
            held_roles,
        ))
    }

    fn notify_acceptance(
        &self,
        submission: &Submission,
        builder: &Builder,
        rank_up: Option<&RankUp>,
    ) {
        if let Some(rank_up) = rank_up {
            self.emit(ReviewEvent::RankUp {
                guild: submission.guild_id.clone(),
                builder: submission.builder.clone(),
                rank: rank_up.name.clone(),
                role_id: rank_up.role_id.clone(),
            });
        }

        if builder.dm_enabled {
            self.emit(ReviewEvent::Accepted {
                guild: submission.guild_id.clone(),
                builder: submission.builder.clone(),
                submission: submission.id.clone(),
                kind: submission.kind.label(),
                points_total: submission.points_total,
                feedback: submission.feedback.clone(),
            });
        }
    }

    /// Notification failures are logged and dropped; a DM that cannot be
    /// delivered must not fail the review that triggered it.
    fn emit(&self, event: ReviewEvent) {
        if let Err(NotifyError::Transport(reason)) = self.notifier.notify(event.clone()) {
            warn!(event = event.label(), %reason, "review notification failed");
        }
    }
}

/// Normalize and validate reviewer-entered fields shared by accept and
/// edit: feedback trims to None when blank, collaborators must divide.
fn validate_input(mut input: ReviewInput) -> Result<ReviewInput, ReviewError> {
    if input.reviewer == input.builder {
        return Err(ReviewError::SelfReview);
    }
    if input.collaborators == 0 {
        return Err(ReviewError::ZeroCollaborators);
    }

    input.feedback = input
        .feedback
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(input)
}

fn to_submission(input: &ReviewInput, points_total: f64) -> Submission {
    Submission {
        id: input.submission_id.clone(),
        guild_id: input.guild_id.clone(),
        builder: input.builder.clone(),
        reviewer: input.reviewer.clone(),
        kind: input.kind.clone(),
        quality: input.quality,
        complexity: input.complexity,
        bonus: input.bonus,
        collaborators: input.collaborators,
        points_total,
        feedback: input.feedback.clone(),
        submitted_at: input.submitted_at,
        reviewed_at: input.reviewed_at,
    }
}
