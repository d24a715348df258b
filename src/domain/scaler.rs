use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::brix::{self, AdjustmentKind, BrixError};
use super::ingredient::IngredientMeasure;
use super::matcher::IngredientRole;

pub const DEFAULT_LOSS_MARGIN_PCT: f64 = 5.0;

#[derive(Error, Debug, PartialEq)]
pub enum ScaleError {
    #[error("target volume must be greater than zero")]
    InvalidTargetVolume,
    #[error("loss margin must be within [0, 100]")]
    InvalidMargin,
}

impl ScaleError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScaleError::InvalidTargetVolume => "invalid_target_volume",
            ScaleError::InvalidMargin => "invalid_margin",
        }
    }
}

/// A recipe ingredient as the scaler sees it: quantity in mL with the
/// catalog's brix/abv readings when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalableIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brix: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abv: Option<f64>,
    #[serde(default)]
    pub role: IngredientRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaledIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub role: IngredientRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaleOutcome {
    pub factor: f64,
    pub target_volume_ml: f64,
    pub loss_margin_pct: f64,
    pub ingredients: Vec<ScaledIngredient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_brix: Option<f64>,
    pub target_brix: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<String>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Scales a recipe to a dispenser volume plus loss margin and reports the
/// resulting °Bx against the recipe's target. Garnish is scaled with the
/// rest but never enters the mixture computation.
pub fn scale_recipe(
    ingredients: &[ScalableIngredient],
    base_volume_ml: f64,
    recipe_target_brix: f64,
    target_volume_ml: f64,
    loss_margin_pct: f64,
) -> Result<ScaleOutcome, ScaleError> {
    if target_volume_ml <= 0.0 || !target_volume_ml.is_finite() {
        return Err(ScaleError::InvalidTargetVolume);
    }
    if !(0.0..=100.0).contains(&loss_margin_pct) {
        return Err(ScaleError::InvalidMargin);
    }

    let factor = target_volume_ml * (1.0 + loss_margin_pct / 100.0) / base_volume_ml;

    let scaled: Vec<ScaledIngredient> = ingredients
        .iter()
        .map(|i| ScaledIngredient {
            name: i.name.clone(),
            quantity: round1(i.quantity * factor),
            unit: i.unit.clone(),
            role: i.role,
        })
        .collect();

    // Unknown brix reads as 0 (water-like) in the mixture, matching how the
    // calculator treats plain water.
    let mixture: Vec<IngredientMeasure> = ingredients
        .iter()
        .zip(scaled.iter())
        .filter(|(orig, _)| orig.role != IngredientRole::Garnish)
        .map(|(orig, s)| IngredientMeasure {
            name: s.name.clone(),
            volume_ml: s.quantity,
            brix: orig.brix.unwrap_or(0.0),
            abv: orig.abv,
        })
        .collect();

    let (result_brix, adjustment) = match brix::calculate(&mixture) {
        Ok(summary) => {
            let result = summary.total_brix;
            let directive = if (result - recipe_target_brix).abs() > 1.0 {
                let kind = if result > recipe_target_brix {
                    AdjustmentKind::Water
                } else {
                    AdjustmentKind::Syrup
                };
                match brix::adjust_to_target(&mixture, recipe_target_brix, kind, None) {
                    Ok(adj) => Some(adj.message),
                    Err(BrixError::UnreachableTarget { .. }) => Some(format!(
                        "Mixture is {result:.2} °Bx but {recipe_target_brix:.1} °Bx cannot be reached by dilution or standard syrup"
                    )),
                    Err(_) => None,
                }
            } else {
                None
            };
            (Some(result), directive)
        }
        Err(_) => (None, None),
    };

    Ok(ScaleOutcome {
        factor,
        target_volume_ml,
        loss_margin_pct,
        ingredients: scaled,
        result_brix,
        target_brix: recipe_target_brix,
        adjustment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ing(name: &str, quantity: f64, brix: Option<f64>, role: IngredientRole) -> ScalableIngredient {
        ScalableIngredient {
            name: name.into(),
            quantity,
            unit: "ml".into(),
            brix,
            abv: None,
            role,
        }
    }

    #[test]
    fn factor_includes_loss_margin() {
        // base 1000, target 2700, margin 5% -> 2.835
        let ingredients = vec![
            ing("sirup", 200.0, Some(65.0), IngredientRole::Required),
            ing("vand", 800.0, Some(0.0), IngredientRole::Required),
        ];
        let out = scale_recipe(&ingredients, 1000.0, 13.0, 2700.0, 5.0).unwrap();
        assert!((out.factor - 2.835).abs() < 1e-9);
        let total: f64 = out.ingredients.iter().map(|i| i.quantity).sum();
        assert!((total - 2835.0).abs() < 0.2);
    }

    #[test]
    fn scaling_preserves_brix_ratio() {
        let ingredients = vec![
            ing("sirup", 200.0, Some(65.0), IngredientRole::Required),
            ing("vand", 800.0, Some(0.0), IngredientRole::Required),
        ];
        let out = scale_recipe(&ingredients, 1000.0, 13.0, 2700.0, 5.0).unwrap();
        // 13.0 °Bx before scaling, so within 1.0 of target after: no directive.
        let result = out.result_brix.unwrap();
        assert!((result - 13.0).abs() <= 1.0, "result was {result}");
        assert!(out.adjustment.is_none());
    }

    #[test]
    fn off_target_mixture_gets_directive() {
        let ingredients = vec![
            ing("sirup", 100.0, Some(65.0), IngredientRole::Required),
            ing("vand", 900.0, Some(0.0), IngredientRole::Required),
        ];
        // 6.5 °Bx against a 13.0 target: needs syrup.
        let out = scale_recipe(&ingredients, 1000.0, 13.0, 2000.0, 0.0).unwrap();
        let directive = out.adjustment.expect("directive expected");
        assert!(directive.contains("syrup"));
    }

    #[test]
    fn garnish_is_scaled_but_not_mixed() {
        let ingredients = vec![
            ing("sirup", 200.0, Some(65.0), IngredientRole::Required),
            ing("vand", 800.0, Some(0.0), IngredientRole::Required),
            ing("citronskive", 10.0, None, IngredientRole::Garnish),
        ];
        let out = scale_recipe(&ingredients, 1000.0, 13.0, 1000.0, 0.0).unwrap();
        assert_eq!(out.ingredients.len(), 3);
        // Garnish excluded: mixture is still 13.0.
        assert!((out.result_brix.unwrap() - 13.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_target_volume() {
        assert_eq!(
            scale_recipe(&[], 1000.0, 13.0, 0.0, 5.0).unwrap_err(),
            ScaleError::InvalidTargetVolume
        );
    }

    #[test]
    fn invalid_margin() {
        assert_eq!(
            scale_recipe(&[], 1000.0, 13.0, 1000.0, -1.0).unwrap_err(),
            ScaleError::InvalidMargin
        );
        assert_eq!(
            scale_recipe(&[], 1000.0, 13.0, 1000.0, 101.0).unwrap_err(),
            ScaleError::InvalidMargin
        );
    }
}
