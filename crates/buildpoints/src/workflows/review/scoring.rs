//! Pure scoring formulas. All arithmetic stays in `f64` with no rounding;
//! rounding to two decimals happens only when a value is displayed.

use serde::Serialize;

use super::domain::{BuildKind, BuilderDelta, Grade, ReviewInput};

/// Land points divide the raw area product down to a comparable scale.
const LAND_SCALE: f64 = 100_000.0;

/// Breakdown of a scored submission, returned to the command layer so it
/// can show the builder how the total was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsBreakdown {
    pub kind: &'static str,
    pub base_points: f64,
    pub quality: f64,
    pub complexity: f64,
    pub bonus: f64,
    pub collaborators: u32,
    pub points_total: f64,
}

/// Base point value before multipliers. Land has no base tier; its final
/// formula is computed directly in [`points_total`].
pub fn base_points(kind: &BuildKind) -> f64 {
    match kind {
        BuildKind::One { size } => size.base_points(),
        BuildKind::Many {
            small,
            medium,
            large,
        } => f64::from(*small) * 2.0 + f64::from(*medium) * 5.0 + f64::from(*large) * 10.0,
        BuildKind::Road {
            road_type,
            road_kms,
        } => road_type * road_kms,
        BuildKind::Land { .. } => 0.0,
    }
}

/// Final point value for a submission.
pub fn points_total(
    kind: &BuildKind,
    quality: Grade,
    complexity: Grade,
    bonus: f64,
    collaborators: u32,
) -> f64 {
    let collaborators = f64::from(collaborators);
    match kind {
        BuildKind::Land { sqm, land_type } => {
            sqm * land_type * quality.multiplier() * complexity.multiplier() * bonus
                / LAND_SCALE
                / collaborators
        }
        other => {
            base_points(other) * quality.multiplier() * complexity.multiplier() * bonus
                / collaborators
        }
    }
}

/// Secondary count metric contributed to the builder's totals, signed so
/// it can also serve as the removal delta when negated.
pub fn count_delta(kind: &BuildKind, points: f64) -> BuilderDelta {
    match kind {
        BuildKind::One { .. } | BuildKind::Many { .. } => BuilderDelta {
            points,
            buildings: i64::from(kind.building_count()),
            ..BuilderDelta::default()
        },
        BuildKind::Road { road_kms, .. } => BuilderDelta {
            points,
            road_kms: *road_kms,
            ..BuilderDelta::default()
        },
        BuildKind::Land { sqm, .. } => BuilderDelta {
            points,
            sqm: *sqm,
            ..BuilderDelta::default()
        },
    }
}

/// Score a validated review input.
pub fn score(input: &ReviewInput) -> PointsBreakdown {
    let total = points_total(
        &input.kind,
        input.quality,
        input.complexity,
        input.bonus,
        input.collaborators,
    );

    PointsBreakdown {
        kind: input.kind.label(),
        base_points: base_points(&input.kind),
        quality: input.quality.multiplier(),
        complexity: input.complexity.multiplier(),
        bonus: input.bonus,
        collaborators: input.collaborators,
        points_total: total,
    }
}

/// Render a point value with two decimals, trimming a trailing `.00` so
/// whole numbers read naturally.
pub fn format_points(value: f64) -> String {
    let rendered = format!("{value:.2}");
    match rendered.strip_suffix(".00") {
        Some(whole) => whole.to_string(),
        None => rendered,
    }
}
