use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ingredient::IngredientMeasure;

/// Empirical window in which a slush machine produces the intended texture.
pub const STABLE_BRIX_MIN: f64 = 12.0;
pub const STABLE_BRIX_MAX: f64 = 14.0;

/// Midpoint of the stable window; recommendations steer towards it.
const STABLE_BRIX_TARGET: f64 = 13.0;

/// Above this mixture abv the freezing curve becomes unreliable.
const ABV_WARNING_THRESHOLD: f64 = 10.0;

pub const DEFAULT_SYRUP_BRIX: f64 = 65.0;

#[derive(Error, Debug, PartialEq)]
pub enum BrixError {
    #[error("mixture has no ingredients")]
    EmptyMixture,
    #[error("mixture has zero total volume")]
    ZeroVolume,
    #[error("target brix {target} is not reachable with {adjuster}")]
    UnreachableTarget { target: f64, adjuster: &'static str },
}

impl BrixError {
    pub fn kind(&self) -> &'static str {
        match self {
            BrixError::EmptyMixture => "empty_mixture",
            BrixError::ZeroVolume => "zero_volume",
            BrixError::UnreachableTarget { .. } => "unreachable_target",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MixtureSummary {
    pub total_brix: f64,
    pub total_volume_ml: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alcohol_pct: Option<f64>,
    pub is_stable_for_slush: bool,
    pub recommendation: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Water,
    Syrup,
}

#[derive(Debug, Clone, Serialize)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub add_volume_ml: f64,
    pub message: String,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Volume-weighted mixture summary: °Bx, abv, stability verdict and a
/// human-readable recommendation steering towards the stable window.
pub fn calculate(ingredients: &[IngredientMeasure]) -> Result<MixtureSummary, BrixError> {
    if ingredients.is_empty() {
        return Err(BrixError::EmptyMixture);
    }
    let total_volume: f64 = ingredients.iter().map(|i| i.volume_ml).sum();
    if total_volume <= 0.0 {
        return Err(BrixError::ZeroVolume);
    }

    let weighted_brix: f64 = ingredients.iter().map(|i| i.brix * i.volume_ml).sum();
    let total_brix = round2(weighted_brix / total_volume);

    let alcohol_pct = if ingredients.iter().any(|i| i.abv.is_some()) {
        let pure_alcohol: f64 = ingredients
            .iter()
            .map(|i| i.volume_ml * i.abv_or_zero() / 100.0)
            .sum();
        Some(round2(pure_alcohol / total_volume * 100.0))
    } else {
        None
    };

    let is_stable = (STABLE_BRIX_MIN..=STABLE_BRIX_MAX).contains(&total_brix);

    let mut warnings = Vec::new();
    if let Some(abv) = alcohol_pct {
        if abv > ABV_WARNING_THRESHOLD {
            warnings.push(format!(
                "Mixture is {abv:.2}% alcohol; above {ABV_WARNING_THRESHOLD:.0}% the slush may not freeze properly"
            ));
        }
    }

    let recommendation = if is_stable {
        format!("{total_brix:.2} °Bx is inside the stable 12-14 °Bx slush window")
    } else if total_brix < STABLE_BRIX_MIN {
        format!(
            "{total_brix:.2} °Bx is too low for slush; raise the brix by about {:.1} °Bx",
            round1(STABLE_BRIX_TARGET - total_brix)
        )
    } else {
        format!(
            "{total_brix:.2} °Bx is too high for slush; lower the brix by about {:.1} °Bx",
            round1(total_brix - STABLE_BRIX_TARGET)
        )
    };

    Ok(MixtureSummary {
        total_brix,
        total_volume_ml: total_volume,
        alcohol_pct,
        is_stable_for_slush: is_stable,
        recommendation,
        warnings,
    })
}

/// Water or syrup volume needed to bring a mixture to `target` °Bx.
///
/// Water only dilutes (current above target); a syrup of `syrup_brix`
/// only sweetens (current below target, and the syrup must be sweeter
/// than the target itself).
pub fn adjust_to_target(
    ingredients: &[IngredientMeasure],
    target: f64,
    kind: AdjustmentKind,
    syrup_brix: Option<f64>,
) -> Result<Adjustment, BrixError> {
    let summary = calculate(ingredients)?;
    let current = summary.total_brix;
    let volume = summary.total_volume_ml;

    if (current - target).abs() < 0.1 {
        return Ok(Adjustment {
            kind,
            add_volume_ml: 0.0,
            message: format!("Mixture is already at {current:.2} °Bx; no adjustment needed"),
        });
    }

    match kind {
        AdjustmentKind::Water => {
            if current < target {
                return Err(BrixError::UnreachableTarget {
                    target,
                    adjuster: "water",
                });
            }
            let add = round1(volume * (current - target) / target);
            Ok(Adjustment {
                kind,
                add_volume_ml: add,
                message: format!("Add {add:.1} mL of water to reach {target:.1} °Bx"),
            })
        }
        AdjustmentKind::Syrup => {
            let syrup = syrup_brix.unwrap_or(DEFAULT_SYRUP_BRIX);
            if current > target || syrup <= target {
                return Err(BrixError::UnreachableTarget {
                    target,
                    adjuster: "syrup",
                });
            }
            let add = round1(volume * (target - current) / (syrup - target));
            Ok(Adjustment {
                kind,
                add_volume_ml: add,
                message: format!(
                    "Add {add:.1} mL of {syrup:.0} °Bx syrup to reach {target:.1} °Bx"
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ml(name: &str, volume_ml: f64, brix: f64, abv: Option<f64>) -> IngredientMeasure {
        IngredientMeasure {
            name: name.into(),
            volume_ml,
            brix,
            abv,
        }
    }

    #[test]
    fn weighted_mean_matches_hand_computation() {
        // 200 mL @ 59 + 800 mL @ 0 -> 11.80
        let mix = vec![ml("sirup", 200.0, 59.0, None), ml("vand", 800.0, 0.0, None)];
        let summary = calculate(&mix).unwrap();
        assert!((summary.total_brix - 11.80).abs() < 1e-6);
        assert_eq!(summary.total_volume_ml, 1000.0);
        assert!(!summary.is_stable_for_slush);
        assert!(summary.recommendation.contains("1.2"));
        assert!(summary.alcohol_pct.is_none());
    }

    #[test]
    fn alcohol_mixture() {
        // 300@65 + 650@0 + 50@0/40% -> brix 19500/1000 = 19.50, alcohol 2.00
        let mix = vec![
            ml("sirup", 300.0, 65.0, None),
            ml("vand", 650.0, 0.0, None),
            ml("vodka", 50.0, 0.0, Some(40.0)),
        ];
        let summary = calculate(&mix).unwrap();
        assert!((summary.total_brix - 19.50).abs() < 1e-6);
        assert_eq!(summary.alcohol_pct, Some(2.0));
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn high_alcohol_warns() {
        let mix = vec![ml("rom", 500.0, 20.0, Some(40.0)), ml("vand", 500.0, 0.0, None)];
        let summary = calculate(&mix).unwrap();
        assert_eq!(summary.alcohol_pct, Some(20.0));
        assert_eq!(summary.warnings.len(), 1);
    }

    #[test]
    fn empty_mixture_fails() {
        assert_eq!(calculate(&[]).unwrap_err(), BrixError::EmptyMixture);
    }

    #[test]
    fn zero_volume_fails() {
        // Volumes may cancel out after upstream arithmetic; guard anyway.
        let mix = vec![ml("a", 0.0, 10.0, None)];
        assert_eq!(calculate(&mix).unwrap_err(), BrixError::ZeroVolume);
    }

    #[test]
    fn water_adjustment_down_to_target() {
        // 1000 mL @ 11.8, target 11.0 -> 1000*(11.8-11.0)/11.0 = 72.7 mL
        let mix = vec![ml("sirup", 200.0, 59.0, None), ml("vand", 800.0, 0.0, None)];
        let adj = adjust_to_target(&mix, 11.0, AdjustmentKind::Water, None).unwrap();
        assert!((adj.add_volume_ml - 72.7).abs() < 0.05);
        assert!(adj.message.contains("water"));
    }

    #[test]
    fn water_cannot_raise_brix() {
        let mix = vec![ml("sirup", 200.0, 59.0, None), ml("vand", 800.0, 0.0, None)];
        let err = adjust_to_target(&mix, 13.0, AdjustmentKind::Water, None).unwrap_err();
        assert!(matches!(err, BrixError::UnreachableTarget { .. }));
    }

    #[test]
    fn syrup_adjustment_up_to_target() {
        // 1000 mL @ 11.8, target 13.0 with 65 syrup -> 1000*1.2/52 = 23.1 mL
        let mix = vec![ml("sirup", 200.0, 59.0, None), ml("vand", 800.0, 0.0, None)];
        let adj = adjust_to_target(&mix, 13.0, AdjustmentKind::Syrup, None).unwrap();
        assert!((adj.add_volume_ml - 23.1).abs() < 0.05);
    }

    #[test]
    fn syrup_no_sweeter_than_target_fails() {
        let mix = vec![ml("vand", 1000.0, 5.0, None)];
        let err = adjust_to_target(&mix, 70.0, AdjustmentKind::Syrup, Some(65.0)).unwrap_err();
        assert!(matches!(err, BrixError::UnreachableTarget { .. }));
    }

    #[test]
    fn near_target_needs_no_adjustment() {
        let mix = vec![ml("mix", 1000.0, 13.05, None)];
        let adj = adjust_to_target(&mix, 13.0, AdjustmentKind::Water, None).unwrap();
        assert_eq!(adj.add_volume_ml, 0.0);
        assert!(adj.message.contains("no adjustment"));
    }
}
