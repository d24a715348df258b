use serde::Deserialize;
use uuid::Uuid;

use crate::auth::session::Role;
use crate::domain::matcher::normalize_name;

use super::repo::{Recipe, APPROVAL_APPROVED, APPROVAL_PENDING, APPROVAL_REJECTED};

/// Who is asking. Guests have no user id.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub role: Role,
    pub user_id: Option<Uuid>,
}

impl Viewer {
    pub fn guest() -> Viewer {
        Viewer {
            role: Role::Guest,
            user_id: None,
        }
    }

    pub fn is_owner(&self, recipe: &Recipe) -> bool {
        match (self.user_id, recipe.author_id) {
            (Some(me), Some(author)) => me == author,
            _ => false,
        }
    }
}

/// Publication- and role-aware visibility check, applied to every recipe
/// read. Callers turn a `false` into a 404 so private recipes stay cloaked.
pub fn can_view(recipe: &Recipe, viewer: &Viewer) -> bool {
    if viewer.role == Role::Admin || viewer.is_owner(recipe) {
        return true;
    }
    if !recipe.is_published || recipe.approval_status != APPROVAL_APPROVED {
        return false;
    }
    match viewer.role {
        Role::Guest => recipe.is_free,
        Role::Pro | Role::Admin => true,
    }
}

pub fn can_create(role: Role) -> bool {
    role != Role::Guest
}

pub fn can_edit(recipe: &Recipe, viewer: &Viewer) -> bool {
    viewer.role == Role::Admin || viewer.is_owner(recipe)
}

/// Approval state for a freshly created recipe: publishing as a non-admin
/// queues for moderation, everything else is immediately approved.
pub fn initial_approval(role: Role, is_published: bool) -> &'static str {
    if is_published && role != Role::Admin {
        APPROVAL_PENDING
    } else {
        APPROVAL_APPROVED
    }
}

/// Approval state after an edit: an author's edit of a rejected recipe goes
/// back to moderation; approved and pending recipes keep their state.
pub fn approval_after_edit(recipe: &Recipe, viewer: &Viewer) -> &'static str {
    if recipe.approval_status == APPROVAL_REJECTED && viewer.role != Role::Admin {
        APPROVAL_PENDING
    } else if recipe.approval_status == APPROVAL_PENDING {
        APPROVAL_PENDING
    } else {
        APPROVAL_APPROVED
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlcoholFilter {
    None,
    Only,
    #[default]
    Any,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilters {
    #[serde(default)]
    pub alcohol: AlcoholFilter,
    #[serde(rename = "type")]
    pub recipe_type: Option<String>,
    /// Comma-separated; every token must appear in some ingredient name.
    pub include_ingredients: Option<String>,
    /// Comma-separated; no token may appear in any ingredient name.
    pub exclude_ingredients: Option<String>,
}

fn tokens(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(|t| normalize_name(t))
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Listing order: free recipes first, newest first within each group.
/// Mirrors the index the listing query reads in; applied again after
/// in-memory filtering so the contract holds regardless of the fetch.
pub fn listing_order(a: &Recipe, b: &Recipe) -> std::cmp::Ordering {
    b.is_free
        .cmp(&a.is_free)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// All list filters AND-combined, with case-insensitive substring matching
/// on ingredient names.
pub fn matches_filters(recipe: &Recipe, filters: &ListFilters) -> bool {
    match filters.alcohol {
        AlcoholFilter::None if recipe.contains_alcohol => return false,
        AlcoholFilter::Only if !recipe.contains_alcohol => return false,
        _ => {}
    }

    if let Some(wanted) = &filters.recipe_type {
        let wanted = normalize_name(wanted);
        let actual = recipe
            .recipe_type
            .as_deref()
            .map(normalize_name)
            .unwrap_or_default();
        if actual != wanted {
            return false;
        }
    }

    let names: Vec<String> = recipe
        .ingredients
        .iter()
        .map(|i| normalize_name(&i.name))
        .collect();

    for token in tokens(&filters.include_ingredients) {
        if !names.iter().any(|n| n.contains(&token)) {
            return false;
        }
    }
    for token in tokens(&filters.exclude_ingredients) {
        if names.iter().any(|n| n.contains(&token)) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matcher::IngredientRole;
    use crate::recipes::repo::RecipeIngredient;
    use sqlx::types::Json;
    use time::OffsetDateTime;

    fn recipe(names: &[&str], alcohol: bool) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            name: "Test".into(),
            description: String::new(),
            image_url: None,
            base_volume_ml: 2700.0,
            target_brix: 14.0,
            contains_alcohol: alcohol,
            color: None,
            recipe_type: Some("klassisk".into()),
            tags: Json(vec![]),
            ingredients: Json(
                names
                    .iter()
                    .map(|n| RecipeIngredient {
                        name: n.to_string(),
                        category: String::new(),
                        quantity: 100.0,
                        unit: "ml".into(),
                        role: IngredientRole::Required,
                        brix: None,
                    })
                    .collect(),
            ),
            steps: Json(vec![]),
            author_id: None,
            author_name: String::new(),
            rating_avg: 0.0,
            rating_count: 0,
            view_count: 0,
            is_free: true,
            is_published: true,
            approval_status: APPROVAL_APPROVED.into(),
            rejection_reason: None,
            extra: serde_json::json!({}),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn author(mut r: Recipe, author: Uuid) -> Recipe {
        r.author_id = Some(author);
        r
    }

    #[test]
    fn guest_sees_only_free_approved_published() {
        let guest = Viewer::guest();
        let free = recipe(&["Vand"], false);
        assert!(can_view(&free, &guest));

        let mut paid = recipe(&["Vand"], false);
        paid.is_free = false;
        assert!(!can_view(&paid, &guest));

        let mut pending = recipe(&["Vand"], false);
        pending.approval_status = APPROVAL_PENDING.into();
        assert!(!can_view(&pending, &guest));

        let mut private = recipe(&["Vand"], false);
        private.is_published = false;
        assert!(!can_view(&private, &guest));
    }

    #[test]
    fn pro_sees_paid_but_not_others_private() {
        let me = Uuid::new_v4();
        let pro = Viewer {
            role: Role::Pro,
            user_id: Some(me),
        };

        let mut paid = recipe(&["Vand"], false);
        paid.is_free = false;
        assert!(can_view(&paid, &pro));

        let mut private = author(recipe(&["Vand"], false), Uuid::new_v4());
        private.is_published = false;
        assert!(!can_view(&private, &pro));

        let mut own_private = author(recipe(&["Vand"], false), me);
        own_private.is_published = false;
        assert!(can_view(&own_private, &pro));
    }

    #[test]
    fn admin_sees_everything() {
        let admin = Viewer {
            role: Role::Admin,
            user_id: Some(Uuid::new_v4()),
        };
        let mut private = author(recipe(&["Vand"], false), Uuid::new_v4());
        private.is_published = false;
        private.approval_status = APPROVAL_PENDING.into();
        assert!(can_view(&private, &admin));
    }

    #[test]
    fn publish_approval_matrix() {
        assert_eq!(initial_approval(Role::Pro, true), APPROVAL_PENDING);
        assert_eq!(initial_approval(Role::Pro, false), APPROVAL_APPROVED);
        assert_eq!(initial_approval(Role::Admin, true), APPROVAL_APPROVED);
    }

    #[test]
    fn author_edit_of_rejected_requeues() {
        let me = Uuid::new_v4();
        let viewer = Viewer {
            role: Role::Pro,
            user_id: Some(me),
        };
        let mut r = author(recipe(&["Vand"], false), me);
        r.approval_status = APPROVAL_REJECTED.into();
        assert_eq!(approval_after_edit(&r, &viewer), APPROVAL_PENDING);

        r.approval_status = APPROVAL_APPROVED.into();
        assert_eq!(approval_after_edit(&r, &viewer), APPROVAL_APPROVED);
    }

    #[test]
    fn include_filter_requires_every_token() {
        let r = recipe(&["Jordbær sirup", "Vand"], false);
        let filters = ListFilters {
            include_ingredients: Some("jordbær,vand".into()),
            ..Default::default()
        };
        assert!(matches_filters(&r, &filters));

        let filters = ListFilters {
            include_ingredients: Some("jordbær,citron".into()),
            ..Default::default()
        };
        assert!(!matches_filters(&r, &filters));
    }

    #[test]
    fn exclude_filter_rejects_any_token() {
        let r = recipe(&["Jordbær sirup", "Vand"], false);
        let filters = ListFilters {
            exclude_ingredients: Some("citron,jordbær".into()),
            ..Default::default()
        };
        assert!(!matches_filters(&r, &filters));
    }

    #[test]
    fn listing_puts_free_first_then_newest() {
        use time::Duration;
        let now = OffsetDateTime::now_utc();

        let mut old_free = recipe(&["Vand"], false);
        old_free.name = "old free".into();
        old_free.created_at = now - Duration::days(10);

        let mut new_free = recipe(&["Vand"], false);
        new_free.name = "new free".into();
        new_free.created_at = now;

        let mut new_paid = recipe(&["Vand"], false);
        new_paid.name = "new paid".into();
        new_paid.is_free = false;
        new_paid.created_at = now;

        let mut list = vec![old_free, new_paid, new_free];
        list.sort_by(listing_order);
        let names: Vec<&str> = list.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["new free", "old free", "new paid"]);
    }

    #[test]
    fn alcohol_and_type_filters_combine() {
        let r = recipe(&["Rom", "Vand"], true);
        let filters = ListFilters {
            alcohol: AlcoholFilter::None,
            ..Default::default()
        };
        assert!(!matches_filters(&r, &filters));

        let filters = ListFilters {
            alcohol: AlcoholFilter::Only,
            recipe_type: Some("Klassisk".into()),
            include_ingredients: Some("rom".into()),
            ..Default::default()
        };
        assert!(matches_filters(&r, &filters));

        let filters = ListFilters {
            recipe_type: Some("sur".into()),
            ..Default::default()
        };
        assert!(!matches_filters(&r, &filters));
    }
}
