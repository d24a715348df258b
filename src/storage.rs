use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Client for the hosted image CDN. Handlers only see this trait so tests
/// can swap in a fake.
#[async_trait]
pub trait ImageCdn: Send + Sync {
    /// Uploads one image and returns its public URL.
    async fn upload(&self, filename: &str, body: Bytes, content_type: &str)
        -> anyhow::Result<String>;
}

pub struct CdnClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl CdnClient {
    pub fn new(http: reqwest::Client, endpoint: &str, api_key: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ImageCdn for CdnClient {
    async fn upload(
        &self,
        filename: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let part = reqwest::multipart::Part::bytes(body.to_vec())
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let resp = self
            .http
            .post(format!("{}/upload", self.endpoint))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(Duration::from_secs(20))
            .send()
            .await?
            .error_for_status()?;

        #[derive(serde::Deserialize)]
        struct UploadResponse {
            url: String,
        }
        let parsed: UploadResponse = resp.json().await?;
        Ok(parsed.url)
    }
}

/// In-memory stand-in used by `AppState::fake`.
pub struct FakeCdn;

#[async_trait]
impl ImageCdn for FakeCdn {
    async fn upload(&self, filename: &str, _body: Bytes, _ct: &str) -> anyhow::Result<String> {
        Ok(format!("https://fake.cdn.local/{filename}"))
    }
}
