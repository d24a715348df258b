use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Allowed CORS origins; empty list means permissive (local dev).
    pub cors_origins: Vec<String>,
    /// Where /go/{mapping} lands when a mapping has no active options.
    pub affiliate_fallback_url: Option<String>,
    pub cdn_endpoint: String,
    pub cdn_api_key: String,
    pub click_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let affiliate_fallback_url = std::env::var("AFFILIATE_FALLBACK_URL").ok();
        let cdn_endpoint =
            std::env::var("CDN_ENDPOINT").unwrap_or_else(|_| "https://cdn.slushbook.app".into());
        let cdn_api_key = std::env::var("CDN_API_KEY").unwrap_or_default();
        let click_queue_capacity = std::env::var("CLICK_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1024);
        Ok(Self {
            database_url,
            cors_origins,
            affiliate_fallback_url,
            cdn_endpoint,
            cdn_api_key,
            click_queue_capacity,
        })
    }
}
