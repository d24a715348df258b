use serde::Deserialize;

use super::repo::{NewRecipe, RecipeIngredient};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RecipeBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    #[serde(default = "default_base_volume")]
    pub base_volume_ml: f64,
    #[serde(default = "default_target_brix")]
    pub target_brix: f64,
    #[serde(default)]
    pub contains_alcohol: bool,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub recipe_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub is_published: bool,
    /// Unknown attributes ride along here and are persisted untouched.
    #[serde(default)]
    pub extra: serde_json::Value,
}

fn default_base_volume() -> f64 {
    2700.0
}

fn default_target_brix() -> f64 {
    14.0
}

impl RecipeBody {
    pub fn into_new_recipe(self) -> Result<NewRecipe, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Recipe name is required"));
        }
        if self.base_volume_ml <= 0.0 {
            return Err(ApiError::bad_request("base_volume_ml must be > 0"));
        }
        if !(0.0..=100.0).contains(&self.target_brix) {
            return Err(ApiError::bad_request("target_brix must be within [0, 100]"));
        }
        for ing in &self.ingredients {
            if ing.name.trim().is_empty() {
                return Err(ApiError::bad_request("Ingredient name is required"));
            }
            if ing.quantity <= 0.0 {
                return Err(ApiError::bad_request(format!(
                    "{}: quantity must be > 0",
                    ing.name
                )));
            }
            if let Some(brix) = ing.brix {
                if !(0.0..=100.0).contains(&brix) {
                    return Err(ApiError::bad_request(format!(
                        "{}: brix must be within [0, 100]",
                        ing.name
                    )));
                }
            }
        }
        let extra = if self.extra.is_null() {
            serde_json::json!({})
        } else {
            self.extra
        };
        Ok(NewRecipe {
            name: self.name.trim().to_string(),
            description: self.description,
            image_url: self.image_url,
            base_volume_ml: self.base_volume_ml,
            target_brix: self.target_brix,
            contains_alcohol: self.contains_alcohol,
            color: self.color,
            recipe_type: self.recipe_type,
            tags: self.tags,
            ingredients: self.ingredients,
            steps: self.steps,
            is_free: self.is_free,
            is_published: self.is_published,
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let body: RecipeBody = serde_json::from_value(serde_json::json!({
            "name": "Jordbær Klassisk",
            "ingredients": [
                { "name": "Jordbær sirup", "quantity": 200.0, "unit": "ml" }
            ]
        }))
        .unwrap();
        assert_eq!(body.base_volume_ml, 2700.0);
        assert_eq!(body.target_brix, 14.0);
        let new = body.into_new_recipe().unwrap();
        assert_eq!(new.ingredients.len(), 1);
    }

    #[test]
    fn zero_quantity_rejected() {
        let body: RecipeBody = serde_json::from_value(serde_json::json!({
            "name": "X",
            "ingredients": [
                { "name": "Vand", "quantity": 0.0, "unit": "ml" }
            ]
        }))
        .unwrap();
        assert!(body.into_new_recipe().is_err());
    }

    #[test]
    fn unknown_extra_attributes_survive() {
        let body: RecipeBody = serde_json::from_value(serde_json::json!({
            "name": "X",
            "ingredients": [],
            "extra": { "ph": 3.2, "viscosity_cp": 12 }
        }))
        .unwrap();
        let new = body.into_new_recipe().unwrap();
        assert_eq!(new.extra["ph"], serde_json::json!(3.2));
    }
}
