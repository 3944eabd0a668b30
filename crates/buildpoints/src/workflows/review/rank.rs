//! Rank-progression evaluation. Pure over a builder's point total,
//! submission history, and currently held roles; the caller grants the
//! role and delivers the notification.

use serde::Serialize;

use super::domain::{BuildKind, BuildingSize, GuildConfig, Submission};

/// Quality-point bar for rank 3: points from quality >= 1.5 builds of
/// medium size or larger.
pub const RANK3_QUALITY_POINTS: f64 = 100.0;
/// Quality-point bar for rank 4, same qualifying builds as rank 3.
pub const RANK4_QUALITY_POINTS: f64 = 200.0;
/// Quality-point bar for rank 5: points from quality >= 2 builds of any
/// building size.
pub const RANK5_QUALITY_POINTS: f64 = 400.0;

/// A single rank-up the builder has newly qualified for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankUp {
    /// Ladder position, 1-based (rank 1 is the starting rank and is never
    /// the target of a rank-up).
    pub tier: usize,
    pub name: String,
    pub role_id: String,
}

/// Progress report toward the next rank, for the builder-facing progress
/// query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankProgress {
    pub current_rank: String,
    pub points_total: f64,
    /// None when the builder already sits at the top of the ladder.
    pub next_rank: Option<NextRank>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextRank {
    pub name: String,
    pub points_required: f64,
    /// Present when the next rank also carries a quality-point bar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_points_required: Option<f64>,
}

/// Sum the points a builder has earned from builds at or above a quality
/// floor, optionally restricted to medium-or-larger buildings.
///
/// Single buildings contribute their full stored point total. Batched
/// buildings contribute their qualifying tiers' base points times quality
/// and complexity; bonus and collaborator adjustments deliberately do not
/// apply to the quality bar. Land and road never qualify.
pub fn quality_points(history: &[Submission], min_quality: f64, include_small: bool) -> f64 {
    history
        .iter()
        .filter(|submission| submission.quality.multiplier() >= min_quality)
        .map(|submission| match &submission.kind {
            BuildKind::One { size } => {
                if include_small || size.base_points() >= BuildingSize::Medium.base_points() {
                    submission.points_total
                } else {
                    0.0
                }
            }
            BuildKind::Many {
                small,
                medium,
                large,
            } => {
                let base = if include_small {
                    f64::from(*small) * 2.0 + f64::from(*medium) * 5.0 + f64::from(*large) * 10.0
                } else {
                    f64::from(*medium) * 5.0 + f64::from(*large) * 10.0
                };
                base * submission.quality.multiplier() * submission.complexity.multiplier()
            }
            BuildKind::Land { .. } | BuildKind::Road { .. } => 0.0,
        })
        .sum()
}

/// Whether the quality bar for the given 0-based ladder index is met.
fn quality_bar_met(index: usize, history: &[Submission]) -> bool {
    match index {
        2 => quality_points(history, 1.5, false) >= RANK3_QUALITY_POINTS,
        3 => quality_points(history, 1.5, false) >= RANK4_QUALITY_POINTS,
        4 => quality_points(history, 2.0, true) >= RANK5_QUALITY_POINTS,
        _ => true,
    }
}

/// Evaluate the ladder bottom-up and return the highest rank the builder
/// qualifies for but does not yet hold. Held ranks are skipped, so
/// re-running after a grant is a no-op.
pub fn evaluate(
    config: &GuildConfig,
    points_total: f64,
    history: &[Submission],
    held_roles: &[String],
) -> Option<RankUp> {
    let mut pending = None;

    for (index, tier) in config.ranks.iter().enumerate().skip(1) {
        if points_total < tier.points_required {
            break;
        }
        if !quality_bar_met(index, history) {
            continue;
        }
        if held_roles.contains(&tier.role_id) {
            continue;
        }
        pending = Some(RankUp {
            tier: index + 1,
            name: tier.name.clone(),
            role_id: tier.role_id.clone(),
        });
    }

    pending
}

/// Build the progress report: the highest rank whose requirements are
/// fully met is the current rank, and the following tier (if any) is the
/// target.
pub fn progress(config: &GuildConfig, points_total: f64, history: &[Submission]) -> RankProgress {
    let mut current = 0;
    for (index, tier) in config.ranks.iter().enumerate().skip(1) {
        if points_total >= tier.points_required && quality_bar_met(index, history) {
            current = index;
        } else {
            break;
        }
    }

    let next_rank = config.ranks.get(current + 1).map(|tier| {
        let index = current + 1;
        let (quality_points_earned, bar) = match index {
            2 => (
                Some(quality_points(history, 1.5, false)),
                Some(RANK3_QUALITY_POINTS),
            ),
            3 => (
                Some(quality_points(history, 1.5, false)),
                Some(RANK4_QUALITY_POINTS),
            ),
            4 => (
                Some(quality_points(history, 2.0, true)),
                Some(RANK5_QUALITY_POINTS),
            ),
            _ => (None, None),
        };

        NextRank {
            name: tier.name.clone(),
            points_required: tier.points_required,
            quality_points: quality_points_earned,
            quality_points_required: bar,
        }
    });

    RankProgress {
        current_rank: config.ranks[current].name.clone(),
        points_total,
        next_rank,
    }
}
