use std::sync::Arc;

use buildpoints::error::AppError;
use buildpoints::workflows::review::memory::{
    MemoryBuilders, MemoryNotifier, MemoryRejections, MemoryReviewers, MemorySubmissions,
};
use buildpoints::workflows::review::scoring::format_points;
use buildpoints::workflows::review::{
    BuildKind, BuilderMetric, BuildingSize, DeclineRequest, Grade, GuildConfig, ReviewInput,
    ReviewService, ReviewerMetric, Scope, SubmissionId, UserId,
};
use chrono::Utc;
use clap::Args;

use crate::infra::{default_guilds, DemoReviewService};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Rank the leaderboards across every guild instead of per guild
    #[arg(long)]
    pub(crate) global: bool,
    /// Print the notification events the lifecycle emitted
    #[arg(long)]
    pub(crate) list_events: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let notifier = MemoryNotifier::default();
    let service: DemoReviewService = ReviewService::new(
        Arc::new(MemorySubmissions::default()),
        Arc::new(MemoryRejections::default()),
        Arc::new(MemoryBuilders::default()),
        Arc::new(MemoryReviewers::default()),
        Arc::new(notifier.clone()),
    );

    let guilds = default_guilds();
    let main_guild = &guilds[0];
    let second_guild = &guilds[1];

    println!("Build review lifecycle demo");
    println!("===========================");

    seed_guild(&service, main_guild, "demo")?;
    seed_guild(&service, second_guild, "away")?;

    // Rework one review after a second look.
    let mut edited = review_input(main_guild, "demo-2", "member-juno", "member-lena");
    edited.kind = BuildKind::Many {
        small: 1,
        medium: 2,
        large: 1,
    };
    edited.quality = Grade::Excellent;
    let outcome = service.edit_review(main_guild, &[], edited)?;
    println!(
        "\nEdited demo-2 after a second look: now {} points",
        format_points(outcome.breakdown.points_total)
    );

    // One submission does not make the bar.
    service.decline_review(DeclineRequest {
        submission_id: SubmissionId("demo-5".to_string()),
        guild_id: main_guild.guild_id.clone(),
        builder: UserId("member-noor".to_string()),
        reviewer: UserId("member-lena".to_string()),
        feedback: "Interior is unfinished past the second floor".to_string(),
        submitted_at: Utc::now(),
        reviewed_at: Utc::now(),
    })?;
    println!("Declined demo-5 with feedback");

    // And one turns out to be plagiarized.
    service.purge_submission(&SubmissionId("demo-3".to_string()), &main_guild.guild_id)?;
    println!("Purged demo-3; its statistics are fully reversed");

    let scope = if args.global {
        Scope::Global
    } else {
        Scope::Guild(main_guild.guild_id.clone())
    };
    let scope_label = if args.global { "global" } else { &main_guild.name };

    println!("\nBuilder leaderboard ({scope_label}, points)");
    let board = service.builder_leaderboard(&scope, BuilderMetric::Points)?;
    for (position, entry) in board.entries.iter().enumerate() {
        println!(
            "  {}. {} — {} {}",
            position + 1,
            entry.user.0,
            format_points(entry.value),
            BuilderMetric::Points.unit()
        );
    }

    println!("\nReviewer leaderboard ({scope_label}, average quality)");
    let board = service.reviewer_leaderboard(&scope, ReviewerMetric::Quality)?;
    for (position, entry) in board.entries.iter().enumerate() {
        println!(
            "  {}. {} — {:.2}",
            position + 1,
            entry.user.0,
            entry.value
        );
    }

    let progress = service.builder_progress(main_guild, &UserId("member-ida".to_string()))?;
    println!(
        "\nmember-ida holds {} with {} points",
        progress.current_rank,
        format_points(progress.points_total)
    );
    if let Some(next) = progress.next_rank {
        println!(
            "  next: {} at {} points",
            next.name,
            format_points(next.points_required)
        );
        if let (Some(earned), Some(required)) = (next.quality_points, next.quality_points_required)
        {
            println!(
                "  quality bar: {} of {} points",
                format_points(earned),
                format_points(required)
            );
        }
    }

    let stats = service.reviewer_stats(
        &UserId("member-lena".to_string()),
        &Scope::Guild(main_guild.guild_id.clone()),
    )?;
    println!(
        "\nmember-lena reviewed {} submissions ({} accepted, {} declined), avg quality {:.2}",
        stats.reviews, stats.acceptances, stats.rejections, stats.quality_avg
    );

    if args.list_events {
        println!("\nEmitted events");
        for event in notifier.events() {
            println!(
                "  {}",
                serde_json::to_string(&event).unwrap_or_else(|_| event.label().to_string())
            );
        }
    }

    Ok(())
}

fn seed_guild(
    service: &DemoReviewService,
    guild: &GuildConfig,
    prefix: &str,
) -> Result<(), AppError> {
    let builders = ["member-ida", "member-juno", "member-noor"];
    let kinds = [
        BuildKind::One {
            size: BuildingSize::Large,
        },
        BuildKind::Many {
            small: 2,
            medium: 1,
            large: 1,
        },
        BuildKind::Road {
            road_type: 1.5,
            road_kms: 3.0,
        },
        BuildKind::Land {
            sqm: 400_000.0,
            land_type: 2.0,
        },
    ];

    for (index, kind) in kinds.iter().enumerate() {
        let mut input = review_input(
            guild,
            &format!("{prefix}-{}", index + 1),
            builders[index % builders.len()],
            "member-lena",
        );
        input.kind = kind.clone();
        input.quality = if index % 2 == 0 {
            Grade::Good
        } else {
            Grade::Standard
        };
        service.accept_review(guild, &[], input)?;
    }

    println!(
        "Accepted {} reviews in {} {}",
        kinds.len(),
        guild.emoji,
        guild.name
    );
    Ok(())
}

fn review_input(
    guild: &GuildConfig,
    submission_id: &str,
    builder: &str,
    reviewer: &str,
) -> ReviewInput {
    ReviewInput {
        submission_id: SubmissionId(submission_id.to_string()),
        guild_id: guild.guild_id.clone(),
        builder: UserId(builder.to_string()),
        reviewer: UserId(reviewer.to_string()),
        kind: BuildKind::One {
            size: BuildingSize::Medium,
        },
        quality: Grade::Good,
        complexity: Grade::Standard,
        bonus: 1.0,
        collaborators: 1,
        feedback: Some("Readable massing and clean palette".to_string()),
        submitted_at: Utc::now(),
        reviewed_at: Utc::now(),
    }
}
