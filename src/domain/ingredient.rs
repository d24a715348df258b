use serde::{Deserialize, Serialize};

/// One weighted ingredient of a mixture. Volumes are mL, `brix` and `abv`
/// are percentages in [0, 100]. A missing `abv` means a non-alcoholic
/// ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientMeasure {
    pub name: String,
    pub volume_ml: f64,
    pub brix: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abv: Option<f64>,
}

impl IngredientMeasure {
    pub fn validate(&self) -> Result<(), String> {
        if self.volume_ml <= 0.0 || !self.volume_ml.is_finite() {
            return Err(format!("{}: volume_ml must be > 0", self.name));
        }
        if !(0.0..=100.0).contains(&self.brix) {
            return Err(format!("{}: brix must be within [0, 100]", self.name));
        }
        if let Some(abv) = self.abv {
            if !(0.0..=100.0).contains(&abv) {
                return Err(format!("{}: abv must be within [0, 100]", self.name));
            }
        }
        Ok(())
    }

    /// Alcohol percentage, treating an undeclared abv as 0%.
    pub fn abv_or_zero(&self) -> f64 {
        self.abv.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_volume() {
        let m = IngredientMeasure {
            name: "sirup".into(),
            volume_ml: 0.0,
            brix: 65.0,
            abv: None,
        };
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_brix() {
        let m = IngredientMeasure {
            name: "sirup".into(),
            volume_ml: 100.0,
            brix: 120.0,
            abv: None,
        };
        assert!(m.validate().is_err());
    }

    #[test]
    fn missing_abv_is_zero() {
        let m = IngredientMeasure {
            name: "vand".into(),
            volume_ml: 100.0,
            brix: 0.0,
            abv: None,
        };
        assert_eq!(m.abv_or_zero(), 0.0);
    }
}
