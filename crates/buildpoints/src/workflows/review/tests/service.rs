use super::common::*;
use crate::workflows::review::domain::{BuildKind, BuildingSize, Grade, GuildId, UserId};
use crate::workflows::review::repository::{
    BuilderStore, ReviewEvent, ReviewerStore, SubmissionStore,
};
use crate::workflows::review::service::{DeclineRequest, ReviewError, SubmissionFeedback};
use crate::workflows::review::{BuilderMetric, Scope, SubmissionId};

fn decline_request(id: &str) -> DeclineRequest {
    DeclineRequest {
        submission_id: SubmissionId(id.to_string()),
        guild_id: guild_id(),
        builder: builder_id(),
        reviewer: reviewer_id(),
        feedback: "needs terraforming around the base".to_string(),
        submitted_at: submitted_at(),
        reviewed_at: reviewed_at(),
    }
}

#[test]
fn accepting_scores_and_updates_both_aggregates() {
    let fixture = harness();
    let outcome = fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    assert!(approx(outcome.breakdown.points_total, 7.5));
    assert!(outcome.rank_up.is_none());

    let builder = fixture
        .builders
        .fetch(&guild_id(), &builder_id())
        .expect("fetch")
        .expect("builder record");
    assert!(approx(builder.points_total, 7.5));
    assert_eq!(builder.building_count, 1);

    let reviewer = fixture
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    assert_eq!(reviewer.acceptances, 1);
    assert_eq!(reviewer.reviews_with_feedback, 1);
    assert!(approx(reviewer.quality_avg, 1.5));

    let events = fixture.notifier.events();
    assert!(matches!(events.as_slice(), [ReviewEvent::Accepted { .. }]));
}

#[test]
fn reviewing_your_own_build_is_rejected() {
    let fixture = harness();
    let mut input = one_input("sub-1");
    input.reviewer = input.builder.clone();

    let err = fixture
        .service
        .accept_review(&guild_config(), &[], input)
        .expect_err("self review");

    assert!(matches!(err, ReviewError::SelfReview));
    assert!(err.is_validation());
}

#[test]
fn zero_collaborators_never_reach_the_formula() {
    let fixture = harness();
    let mut input = one_input("sub-1");
    input.collaborators = 0;

    let err = fixture
        .service
        .accept_review(&guild_config(), &[], input)
        .expect_err("zero collaborators");

    assert!(matches!(err, ReviewError::ZeroCollaborators));
}

#[test]
fn accepting_the_same_submission_twice_conflicts() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("first accept");

    let err = fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect_err("duplicate");

    assert!(matches!(err, ReviewError::AlreadyAccepted));
}

#[test]
fn a_rejection_is_terminal_for_accept_and_edit() {
    let fixture = harness();
    fixture
        .service
        .decline_review(decline_request("sub-1"))
        .expect("decline");

    let accept_err = fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect_err("accept after decline");
    assert!(matches!(accept_err, ReviewError::AlreadyRejected));

    let edit_err = fixture
        .service
        .edit_review(&guild_config(), &[], one_input("sub-1"))
        .expect_err("edit after decline");
    assert!(matches!(edit_err, ReviewError::AlreadyRejected));
}

#[test]
fn editing_an_unreviewed_submission_fails() {
    let fixture = harness();

    let err = fixture
        .service
        .edit_review(&guild_config(), &[], one_input("sub-1"))
        .expect_err("nothing to edit");

    assert!(matches!(err, ReviewError::NotYetReviewed));
}

#[test]
fn edits_cannot_change_the_build_kind() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let err = fixture
        .service
        .edit_review(&guild_config(), &[], road_input("sub-1"))
        .expect_err("kind change");

    assert!(matches!(err, ReviewError::KindChanged));
}

#[test]
fn edits_cannot_reassign_the_builder_or_guild() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let mut reassigned = one_input("sub-1");
    reassigned.builder = UserId("member-impostor".to_string());
    let err = fixture
        .service
        .edit_review(&guild_config(), &[], reassigned)
        .expect_err("builder change");
    assert!(matches!(err, ReviewError::OwnerChanged));
    assert!(err.is_validation());

    let mut moved = one_input("sub-1");
    moved.guild_id = GuildId(OTHER_GUILD.to_string());
    let mut other_guild = guild_config();
    other_guild.guild_id = GuildId(OTHER_GUILD.to_string());
    let err = fixture
        .service
        .edit_review(&other_guild, &[], moved)
        .expect_err("guild change");
    assert!(matches!(err, ReviewError::OwnerChanged));

    // The stored submission and the owner's totals are untouched.
    let stored = fixture
        .submissions
        .fetch(&SubmissionId("sub-1".to_string()))
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.builder, builder_id());
    assert_eq!(stored.guild_id, guild_id());

    let builder = fixture
        .builders
        .fetch(&guild_id(), &builder_id())
        .expect("fetch")
        .expect("builder record");
    assert!(approx(builder.points_total, 7.5));
    assert_eq!(builder.building_count, 1);
    assert!(fixture
        .builders
        .fetch(&guild_id(), &UserId("member-impostor".to_string()))
        .expect("fetch")
        .is_none());
}

#[test]
fn editing_applies_the_difference_not_the_total() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");
    fixture
        .service
        .accept_review(&guild_config(), &[], many_input("sub-2"))
        .expect("accept");

    let mut edited = one_input("sub-1");
    edited.quality = Grade::Excellent;
    // 10 * 2.0 * 1.0 / 2 = 10 points now.
    let outcome = fixture
        .service
        .edit_review(&guild_config(), &[], edited)
        .expect("edit");
    assert!(approx(outcome.breakdown.points_total, 10.0));

    let builder = fixture
        .builders
        .fetch(&guild_id(), &builder_id())
        .expect("fetch")
        .expect("builder record");
    // 7.5 + 9, then the edit adds the 2.5 difference.
    assert!(approx(builder.points_total, 19.0));
    assert_eq!(builder.building_count, 4);
}

#[test]
fn editing_twice_equals_one_edit_with_the_final_values() {
    let twice = harness();
    let once = harness();
    for fixture in [&twice, &once] {
        fixture
            .service
            .accept_review(&guild_config(), &[], one_input("sub-1"))
            .expect("accept");
    }

    let mut midway = one_input("sub-1");
    midway.quality = Grade::Excellent;
    twice
        .service
        .edit_review(&guild_config(), &[], midway)
        .expect("first edit");

    let mut fin = one_input("sub-1");
    fin.quality = Grade::Excellent;
    fin.complexity = Grade::Excellent;
    fin.collaborators = 1;
    twice
        .service
        .edit_review(&guild_config(), &[], fin.clone())
        .expect("second edit");
    once.service
        .edit_review(&guild_config(), &[], fin)
        .expect("only edit");

    let double_builder = twice
        .builders
        .fetch(&guild_id(), &builder_id())
        .expect("fetch")
        .expect("builder record");
    let single_builder = once
        .builders
        .fetch(&guild_id(), &builder_id())
        .expect("fetch")
        .expect("builder record");
    assert!(approx(double_builder.points_total, single_builder.points_total));
    assert_eq!(double_builder.building_count, single_builder.building_count);

    let double_reviewer = twice
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    let single_reviewer = once
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    assert_eq!(double_reviewer.acceptances, single_reviewer.acceptances);
    assert_eq!(double_reviewer.reviews, single_reviewer.reviews);
    assert!(approx(double_reviewer.quality_avg, single_reviewer.quality_avg));
    assert!(approx(
        double_reviewer.complexity_avg,
        single_reviewer.complexity_avg
    ));
}

#[test]
fn a_same_reviewer_edit_keeps_the_counters_flat() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let mut edited = one_input("sub-1");
    edited.quality = Grade::Excellent;
    fixture
        .service
        .edit_review(&guild_config(), &[], edited)
        .expect("edit");

    let reviewer = fixture
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    assert_eq!(reviewer.acceptances, 1);
    assert_eq!(reviewer.reviews, 1);
    assert!(approx(reviewer.quality_avg, 2.0));
}

#[test]
fn an_edit_by_a_new_reviewer_moves_the_credit() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let mut edited = one_input("sub-1");
    edited.reviewer = UserId("member-second-reviewer".to_string());
    fixture
        .service
        .edit_review(&guild_config(), &[], edited)
        .expect("edit");

    let original = fixture
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    assert_eq!(original.acceptances, 0);
    assert!(approx(original.quality_avg, 0.0));

    let editor = fixture
        .reviewers
        .fetch(&guild_id(), &UserId("member-second-reviewer".to_string()))
        .expect("fetch")
        .expect("editor record");
    assert_eq!(editor.acceptances, 1);
}

#[test]
fn declining_requires_feedback() {
    let fixture = harness();
    let mut request = decline_request("sub-1");
    request.feedback = "   ".to_string();

    let err = fixture
        .service
        .decline_review(request)
        .expect_err("blank feedback");

    assert!(matches!(err, ReviewError::EmptyFeedback));
}

#[test]
fn declining_creates_the_reviewer_record_on_demand() {
    let fixture = harness();
    fixture
        .service
        .decline_review(decline_request("sub-1"))
        .expect("decline");

    let reviewer = fixture
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    assert_eq!(reviewer.rejections, 1);
    assert_eq!(reviewer.acceptances, 0);
    assert_eq!(reviewer.reviews_with_feedback, 1);

    let builder = fixture.builders.fetch(&guild_id(), &builder_id()).expect("fetch");
    assert!(builder.is_none(), "declines never touch builder totals");

    let events = fixture.notifier.events();
    assert!(matches!(events.as_slice(), [ReviewEvent::Declined { .. }]));
}

#[test]
fn purging_reverses_the_acceptance_completely() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");
    fixture
        .service
        .purge_submission(&SubmissionId("sub-1".to_string()), &guild_id())
        .expect("purge");

    let builder = fixture
        .builders
        .fetch(&guild_id(), &builder_id())
        .expect("fetch")
        .expect("builder record");
    assert!(approx(builder.points_total, 0.0));
    assert_eq!(builder.building_count, 0);

    let reviewer = fixture
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    assert_eq!(reviewer.acceptances, 0);
    assert!(approx(reviewer.quality_avg, 0.0));

    assert!(fixture
        .submissions
        .fetch(&SubmissionId("sub-1".to_string()))
        .expect("fetch")
        .is_none());
}

#[test]
fn purging_then_reaccepting_restores_the_totals() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");
    fixture
        .service
        .accept_review(&guild_config(), &[], many_input("sub-2"))
        .expect("accept");

    fixture
        .service
        .purge_submission(&SubmissionId("sub-2".to_string()), &guild_id())
        .expect("purge");
    fixture
        .service
        .accept_review(&guild_config(), &[], many_input("sub-2"))
        .expect("re-accept");

    let builder = fixture
        .builders
        .fetch(&guild_id(), &builder_id())
        .expect("fetch")
        .expect("builder record");
    assert!(approx(builder.points_total, 16.5));
    assert_eq!(builder.building_count, 4);

    let reviewer = fixture
        .reviewers
        .fetch(&guild_id(), &reviewer_id())
        .expect("fetch")
        .expect("reviewer record");
    assert_eq!(reviewer.acceptances, 2);
    assert_eq!(reviewer.reviews, 2);
    // Qualities 1.5 and 1.0 averaged, same as before the purge.
    assert!(approx(reviewer.quality_avg, 1.25));
    assert_eq!(reviewer.reviews_with_feedback, 1);
}

#[test]
fn purging_from_another_guild_is_forbidden() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let err = fixture
        .service
        .purge_submission(
            &SubmissionId("sub-1".to_string()),
            &GuildId(OTHER_GUILD.to_string()),
        )
        .expect_err("foreign purge");

    assert!(matches!(err, ReviewError::ForeignGuild));
}

#[test]
fn purging_an_unknown_id_distinguishes_rejections() {
    let fixture = harness();
    seed_rejection(&fixture.rejections, "sub-r", "missing depth");

    let rejected = fixture
        .service
        .purge_submission(&SubmissionId("sub-r".to_string()), &guild_id())
        .expect_err("rejected id");
    assert!(matches!(rejected, ReviewError::AlreadyRejected));

    let unknown = fixture
        .service
        .purge_submission(&SubmissionId("sub-x".to_string()), &guild_id())
        .expect_err("unknown id");
    assert!(matches!(unknown, ReviewError::UnknownSubmission));
}

#[test]
fn a_missing_reviewer_record_fails_the_purge_loudly() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");
    // Simulate aggregate loss by re-pointing the stored submission at a
    // reviewer with no record.
    let mut stored = fixture
        .submissions
        .fetch(&SubmissionId("sub-1".to_string()))
        .expect("fetch")
        .expect("stored");
    stored.reviewer = UserId("member-ghost".to_string());
    fixture.submissions.upsert(stored).expect("upsert");

    let err = fixture
        .service
        .purge_submission(&SubmissionId("sub-1".to_string()), &guild_id())
        .expect_err("missing reviewer");

    assert!(matches!(err, ReviewError::MissingReviewer { .. }));
    assert!(!err.is_validation());
}

#[test]
fn disabling_dms_suppresses_acceptance_and_purge_notices() {
    let fixture = harness();
    fixture
        .service
        .set_dm_preference(&guild_id(), &builder_id(), false)
        .expect("preference");

    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");
    fixture
        .service
        .purge_submission(&SubmissionId("sub-1".to_string()), &guild_id())
        .expect("purge");

    assert!(fixture.notifier.events().is_empty());
}

#[test]
fn rank_up_notices_ignore_the_dm_preference() {
    let fixture = harness();
    fixture
        .service
        .set_dm_preference(&guild_id(), &builder_id(), false)
        .expect("preference");

    // One monumental build at excellent grades: 20 * 2 * 2 = 80 points,
    // past the rank-2 threshold.
    let mut input = one_input("sub-1");
    input.kind = BuildKind::One {
        size: BuildingSize::Monumental,
    };
    input.quality = Grade::Excellent;
    input.complexity = Grade::Excellent;
    input.collaborators = 1;

    let outcome = fixture
        .service
        .accept_review(&guild_config(), &[], input)
        .expect("accept");
    assert_eq!(outcome.rank_up.expect("rank up").tier, 2);

    let events = fixture.notifier.events();
    assert!(matches!(events.as_slice(), [ReviewEvent::RankUp { .. }]));
}

#[test]
fn stored_feedback_is_returned_for_both_outcomes() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");
    fixture
        .service
        .decline_review(decline_request("sub-2"))
        .expect("decline");

    match fixture
        .service
        .submission_feedback(&SubmissionId("sub-1".to_string()))
        .expect("accepted feedback")
    {
        SubmissionFeedback::Accepted { points_total, feedback, .. } => {
            assert!(approx(points_total, 7.5));
            assert!(feedback.expect("has feedback").contains("roof line"));
        }
        other => panic!("expected accepted feedback, got {other:?}"),
    }

    match fixture
        .service
        .submission_feedback(&SubmissionId("sub-2".to_string()))
        .expect("rejected feedback")
    {
        SubmissionFeedback::Rejected { feedback, .. } => {
            assert!(feedback.contains("terraforming"));
        }
        other => panic!("expected rejected feedback, got {other:?}"),
    }

    let err = fixture
        .service
        .submission_feedback(&SubmissionId("sub-x".to_string()))
        .expect_err("unknown id");
    assert!(matches!(err, ReviewError::UnknownSubmission));
}

#[test]
fn builder_stats_cover_guild_and_global_scopes() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let mut other = one_input("sub-2");
    other.guild_id = GuildId(OTHER_GUILD.to_string());
    let mut other_guild = guild_config();
    other_guild.guild_id = GuildId(OTHER_GUILD.to_string());
    fixture
        .service
        .accept_review(&other_guild, &[], other)
        .expect("accept elsewhere");

    let local = fixture
        .service
        .builder_stats(&builder_id(), &Scope::Guild(guild_id()))
        .expect("guild stats");
    assert!(approx(local.points_total, 7.5));

    let global = fixture
        .service
        .builder_stats(&builder_id(), &Scope::Global)
        .expect("global stats");
    assert!(approx(global.points_total, 15.0));
    assert_eq!(global.building_count, 2);

    let missing = fixture
        .service
        .builder_stats(&UserId("member-unknown".to_string()), &Scope::Global)
        .expect_err("unknown builder");
    assert!(matches!(missing, ReviewError::Store(_)));
}

#[test]
fn guild_progress_sums_every_builder() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let mut second = many_input("sub-2");
    second.builder = UserId("member-other-builder".to_string());
    fixture
        .service
        .accept_review(&guild_config(), &[], second)
        .expect("accept");

    let totals = fixture.service.guild_progress(&guild_id()).expect("progress");
    assert!(approx(totals.points_total, 16.5));
    assert_eq!(totals.building_count, 4);
}

#[test]
fn leaderboards_rank_by_the_requested_metric() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    let mut second = many_input("sub-2");
    second.builder = UserId("member-other-builder".to_string());
    fixture
        .service
        .accept_review(&guild_config(), &[], second)
        .expect("accept");

    let board = fixture
        .service
        .builder_leaderboard(&Scope::Guild(guild_id()), BuilderMetric::Points)
        .expect("board");
    assert_eq!(board.entries[0].user.0, "member-other-builder");
    assert!(approx(board.entries[0].value, 9.0));

    let by_buildings = fixture
        .service
        .builder_leaderboard(&Scope::Guild(guild_id()), BuilderMetric::Buildings)
        .expect("board");
    assert!(approx(by_buildings.entries[0].value, 3.0));
}

#[test]
fn repairing_builder_totals_fixes_injected_drift() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");

    // Inject drift behind the engine's back.
    fixture
        .builders
        .apply(
            &guild_id(),
            &builder_id(),
            crate::workflows::review::BuilderDelta {
                points: 99.0,
                buildings: 3,
                road_kms: 1.0,
                sqm: 0.0,
            },
        )
        .expect("drift");

    let repaired = fixture
        .service
        .repair_builder_totals(&guild_id(), &builder_id())
        .expect("repair");

    assert!(approx(repaired.points_total, 7.5));
    assert_eq!(repaired.building_count, 1);
    assert!(approx(repaired.road_kms, 0.0));
}

#[test]
fn repairing_reviewer_stats_rebuilds_from_records() {
    let fixture = harness();
    fixture
        .service
        .accept_review(&guild_config(), &[], one_input("sub-1"))
        .expect("accept");
    fixture
        .service
        .decline_review(decline_request("sub-2"))
        .expect("decline");

    // Clobber the aggregate; repair must restore it from the records.
    fixture
        .reviewers
        .save(crate::workflows::review::Reviewer::new(
            reviewer_id(),
            guild_id(),
        ))
        .expect("clobber");

    let repaired = fixture
        .service
        .repair_reviewer_stats(&guild_id(), &reviewer_id())
        .expect("repair");

    assert_eq!(repaired.reviews, 2);
    assert_eq!(repaired.acceptances, 1);
    assert_eq!(repaired.rejections, 1);
    assert!(approx(repaired.quality_avg, 1.5));
}
