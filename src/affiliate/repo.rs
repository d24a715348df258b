use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

pub const OPTION_ACTIVE: &str = "active";
pub const OPTION_BROKEN: &str = "broken";
pub const OPTION_PENDING: &str = "pending";

/// A logical product; the slug is its public id in /go/{slug} links.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AffiliateMapping {
    pub id: Uuid,
    pub slug: String,
    pub product_name: String,
    pub keywords: Json<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ean: Option<String>,
    pub created_at: OffsetDateTime,
}

/// One concrete supplier URL under a mapping. An empty country list means
/// the supplier ships everywhere.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AffiliateOption {
    pub id: Uuid,
    pub mapping_id: Uuid,
    pub supplier: String,
    pub title: String,
    pub url: String,
    pub status: String,
    pub countries: Json<Vec<String>>,
    pub clicks: i64,
    pub created_at: OffsetDateTime,
}

const MAPPING_COLUMNS: &str = "id, slug, product_name, keywords, ean, created_at";
const OPTION_COLUMNS: &str =
    "id, mapping_id, supplier, title, url, status, countries, clicks, created_at";

pub async fn find_mapping_by_slug(
    db: &PgPool,
    slug: &str,
) -> anyhow::Result<Option<AffiliateMapping>> {
    let row = sqlx::query_as::<_, AffiliateMapping>(&format!(
        "SELECT {MAPPING_COLUMNS} FROM affiliate_mappings WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn list_mappings(db: &PgPool) -> anyhow::Result<Vec<AffiliateMapping>> {
    let rows = sqlx::query_as::<_, AffiliateMapping>(&format!(
        "SELECT {MAPPING_COLUMNS} FROM affiliate_mappings ORDER BY created_at DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[derive(Debug, Deserialize)]
pub struct MappingBody {
    pub slug: String,
    pub product_name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub ean: Option<String>,
}

/// Creates or refreshes a mapping keyed by slug.
pub async fn upsert_mapping(db: &PgPool, body: &MappingBody) -> anyhow::Result<AffiliateMapping> {
    let row = sqlx::query_as::<_, AffiliateMapping>(&format!(
        r#"
        INSERT INTO affiliate_mappings (slug, product_name, keywords, ean)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (slug) DO UPDATE
        SET product_name = EXCLUDED.product_name,
            keywords = EXCLUDED.keywords,
            ean = EXCLUDED.ean
        RETURNING {MAPPING_COLUMNS}
        "#
    ))
    .bind(&body.slug)
    .bind(&body.product_name)
    .bind(Json(&body.keywords))
    .bind(&body.ean)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn delete_mapping(db: &PgPool, id: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM affiliate_mappings WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

/// Options for a mapping in insertion order; filter by status in the caller
/// when only active ones matter.
pub async fn list_options(db: &PgPool, mapping_id: Uuid) -> anyhow::Result<Vec<AffiliateOption>> {
    let rows = sqlx::query_as::<_, AffiliateOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM affiliate_options WHERE mapping_id = $1 ORDER BY position ASC"
    ))
    .bind(mapping_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn active_options(db: &PgPool, mapping_id: Uuid) -> anyhow::Result<Vec<AffiliateOption>> {
    let rows = sqlx::query_as::<_, AffiliateOption>(&format!(
        r#"
        SELECT {OPTION_COLUMNS} FROM affiliate_options
        WHERE mapping_id = $1 AND status = $2
        ORDER BY position ASC
        "#
    ))
    .bind(mapping_id)
    .bind(OPTION_ACTIVE)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn all_active_options(db: &PgPool) -> anyhow::Result<Vec<AffiliateOption>> {
    let rows = sqlx::query_as::<_, AffiliateOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM affiliate_options WHERE status = $1 ORDER BY position ASC"
    ))
    .bind(OPTION_ACTIVE)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[derive(Debug, Deserialize)]
pub struct OptionBody {
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub countries: Vec<String>,
    pub status: Option<String>,
}

pub async fn insert_option(
    db: &PgPool,
    mapping_id: Uuid,
    body: &OptionBody,
) -> anyhow::Result<AffiliateOption> {
    let countries: Vec<String> = body
        .countries
        .iter()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    let row = sqlx::query_as::<_, AffiliateOption>(&format!(
        r#"
        INSERT INTO affiliate_options (mapping_id, supplier, title, url, status, countries)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {OPTION_COLUMNS}
        "#
    ))
    .bind(mapping_id)
    .bind(&body.supplier)
    .bind(&body.title)
    .bind(&body.url)
    .bind(body.status.as_deref().unwrap_or(OPTION_ACTIVE))
    .bind(Json(countries))
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn set_option_status(db: &PgPool, id: Uuid, status: &str) -> anyhow::Result<u64> {
    let res = sqlx::query("UPDATE affiliate_options SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_option(db: &PgPool, id: Uuid) -> anyhow::Result<u64> {
    let res = sqlx::query("DELETE FROM affiliate_options WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
