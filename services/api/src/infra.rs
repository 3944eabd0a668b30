use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use buildpoints::workflows::review::memory::{
    MemoryBuilders, MemoryNotifier, MemoryRejections, MemoryReviewers, MemorySubmissions,
    StaticGuildDirectory,
};
use buildpoints::workflows::review::{
    GuildConfig, GuildId, NotifyError, RankTier, ReviewEvent, ReviewNotifier, ReviewService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notifier that logs each event instead of delivering a DM; the bot
/// front end owns actual delivery.
#[derive(Default, Clone)]
pub(crate) struct LogNotifier;

impl ReviewNotifier for LogNotifier {
    fn notify(&self, event: ReviewEvent) -> Result<(), NotifyError> {
        info!(event = event.label(), payload = %serde_json::to_string(&event).unwrap_or_default(), "review event");
        Ok(())
    }
}

pub(crate) type ApiReviewService =
    ReviewService<MemorySubmissions, MemoryRejections, MemoryBuilders, MemoryReviewers, LogNotifier>;

pub(crate) type DemoReviewService = ReviewService<
    MemorySubmissions,
    MemoryRejections,
    MemoryBuilders,
    MemoryReviewers,
    MemoryNotifier,
>;

pub(crate) fn api_review_service() -> Arc<ApiReviewService> {
    Arc::new(ReviewService::new(
        Arc::new(MemorySubmissions::default()),
        Arc::new(MemoryRejections::default()),
        Arc::new(MemoryBuilders::default()),
        Arc::new(MemoryReviewers::default()),
        Arc::new(LogNotifier),
    ))
}

/// Seed directory for deployments without an external configuration
/// source. Each guild carries the five-tier ladder the rank evaluator
/// walks.
pub(crate) fn default_guild_directory() -> Arc<StaticGuildDirectory> {
    Arc::new(StaticGuildDirectory::with_guilds(default_guilds()))
}

pub(crate) fn default_guilds() -> Vec<GuildConfig> {
    vec![
        guild(
            "guild-covalent",
            "Covalent Build Collective",
            "⚒",
            [
                ("Initiate", 0.0, "covalent-rank-1"),
                ("Builder", 50.0, "covalent-rank-2"),
                ("Architect", 200.0, "covalent-rank-3"),
                ("Master Builder", 450.0, "covalent-rank-4"),
                ("Luminary", 800.0, "covalent-rank-5"),
            ],
        ),
        guild(
            "guild-terraforge",
            "Terraforge Guild",
            "🏰",
            [
                ("Settler", 0.0, "terraforge-rank-1"),
                ("Artisan", 60.0, "terraforge-rank-2"),
                ("Planner", 220.0, "terraforge-rank-3"),
                ("Overseer", 500.0, "terraforge-rank-4"),
                ("Paragon", 900.0, "terraforge-rank-5"),
            ],
        ),
    ]
}

fn guild(id: &str, name: &str, emoji: &str, ranks: [(&str, f64, &str); 5]) -> GuildConfig {
    GuildConfig {
        guild_id: GuildId(id.to_string()),
        name: name.to_string(),
        emoji: emoji.to_string(),
        ranks: ranks.map(|(name, points_required, role_id)| RankTier {
            name: name.to_string(),
            points_required,
            role_id: role_id.to_string(),
        }),
    }
}
