use url::Url;

use super::repo::AffiliateOption;

/// Countries tried in order when the caller's own country has no supplier.
pub const COUNTRY_FALLBACK: [&str; 5] = ["DK", "DE", "FR", "GB", "US"];

pub const UTM_PARAMS: [(&str, &str); 3] = [
    ("utm_source", "slushbook"),
    ("utm_medium", "app"),
    ("utm_campaign", "redirect"),
];

fn serves(option: &AffiliateOption, country: &str) -> bool {
    option.countries.is_empty() || option.countries.iter().any(|c| c == country)
}

/// Picks the redirect target among active options: the caller's country
/// first, then the fallback order, then plain insertion order.
pub fn pick_option<'a>(
    options: &'a [AffiliateOption],
    country: Option<&str>,
) -> Option<&'a AffiliateOption> {
    let requested = country.map(|c| c.trim().to_uppercase());

    if let Some(c) = requested.as_deref() {
        if let Some(opt) = options.iter().find(|o| serves(o, c)) {
            return Some(opt);
        }
    }
    for c in COUNTRY_FALLBACK {
        if let Some(opt) = options.iter().find(|o| serves(o, c)) {
            return Some(opt);
        }
    }
    options.first()
}

/// Appends the canonical UTM parameters, keeping any existing query string
/// and never duplicating a key the URL already carries.
pub fn decorate_url(raw: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(raw)?;
    let existing: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in UTM_PARAMS {
            if !existing.iter().any(|k| k == key) {
                pairs.append_pair(key, value);
            }
        }
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn option(url: &str, countries: &[&str]) -> AffiliateOption {
        AffiliateOption {
            id: Uuid::new_v4(),
            mapping_id: Uuid::new_v4(),
            supplier: String::new(),
            title: String::new(),
            url: url.to_string(),
            status: "active".into(),
            countries: Json(countries.iter().map(|c| c.to_string()).collect()),
            clicks: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn shop_options() -> Vec<AffiliateOption> {
        vec![
            option("https://power.dk/produkt/123", &["DK"]),
            option("https://amazon.com/dp/123", &["US"]),
            option("https://argos.co.uk/p/123", &["GB"]),
        ]
    }

    #[test]
    fn no_country_falls_back_to_dk_first() {
        let options = shop_options();
        let picked = pick_option(&options, None).unwrap();
        assert!(picked.url.contains("power.dk"));
    }

    #[test]
    fn requested_country_wins() {
        let options = shop_options();
        let picked = pick_option(&options, Some("US")).unwrap();
        assert!(picked.url.contains("amazon.com"));
        let picked = pick_option(&options, Some("gb")).unwrap();
        assert!(picked.url.contains("argos.co.uk"));
    }

    #[test]
    fn unserved_country_uses_fallback_order() {
        let options = shop_options();
        let picked = pick_option(&options, Some("FR")).unwrap();
        assert!(picked.url.contains("power.dk"));
    }

    #[test]
    fn empty_country_list_serves_everyone() {
        let options = vec![option("https://global.example/x", &[])];
        let picked = pick_option(&options, Some("JP")).unwrap();
        assert!(picked.url.contains("global.example"));
    }

    #[test]
    fn exotic_options_fall_back_to_insertion_order() {
        let options = vec![option("https://shop.jp/x", &["JP"])];
        let picked = pick_option(&options, Some("SE")).unwrap();
        assert!(picked.url.contains("shop.jp"));
    }

    #[test]
    fn no_options_picks_nothing() {
        assert!(pick_option(&[], Some("DK")).is_none());
    }

    #[test]
    fn utm_params_are_appended() {
        let url = decorate_url("https://power.dk/produkt/123").unwrap();
        assert!(url.starts_with("https://power.dk/produkt/123?"));
        assert!(url.contains("utm_source=slushbook"));
        assert!(url.contains("utm_medium=app"));
        assert!(url.contains("utm_campaign=redirect"));
    }

    #[test]
    fn existing_query_string_is_preserved() {
        let url = decorate_url("https://power.dk/produkt/123?ref=abc").unwrap();
        assert!(url.contains("ref=abc"));
        assert!(url.contains("utm_source=slushbook"));
    }

    #[test]
    fn existing_utm_keys_are_not_duplicated() {
        let url = decorate_url("https://power.dk/p?utm_source=partner").unwrap();
        assert_eq!(url.matches("utm_source").count(), 1);
        assert!(url.contains("utm_source=partner"));
        assert!(url.contains("utm_medium=app"));
    }
}
