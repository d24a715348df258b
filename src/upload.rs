use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::session::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::storage::ImageCdn;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Room for the multipart framing around the image itself.
const BODY_LIMIT_BYTES: usize = MAX_IMAGE_BYTES + 64 * 1024;
const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload/image", post(upload_image))
        // axum caps request bodies at 2 MB out of the box, below the image cap.
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    url: String,
}

fn validate_image(content_type: &str, len: usize) -> ApiResult<()> {
    if !ALLOWED_TYPES.contains(&content_type) {
        return Err(ApiError::bad_request(format!(
            "unsupported image type {content_type}"
        )));
    }
    if len == 0 {
        return Err(ApiError::bad_request("image is empty"));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(ApiError::bad_request("image exceeds 5 MB"));
    }
    Ok(())
}

/// Validates and pushes one image to the CDN, returning its public URL.
async fn store_image(cdn: &dyn ImageCdn, content_type: &str, body: Bytes) -> ApiResult<String> {
    validate_image(content_type, body.len())?;
    let extension = content_type.rsplit('/').next().unwrap_or("bin");
    let filename = format!("{}.{extension}", Uuid::new_v4().simple());
    let url = cdn.upload(&filename, body, content_type).await?;
    Ok(url)
}

/// Accepts a multipart form with one `image` part. Guests cannot upload.
#[instrument(skip(state, auth, multipart))]
async fn upload_image(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    if auth.user.role() == Role::Guest {
        return Err(ApiError::Forbidden);
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("bad multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("image part needs a content type"))?;
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed reading image: {e}")))?;

        let url = store_image(state.cdn.as_ref(), &content_type, body).await?;
        info!(user_id = %auth.user.id, %url, "image uploaded");
        return Ok(Json(UploadResponse { url }));
    }

    Err(ApiError::bad_request("missing image part"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FakeCdn;

    #[test]
    fn body_limit_covers_the_image_cap() {
        assert!(BODY_LIMIT_BYTES > MAX_IMAGE_BYTES);
    }

    #[tokio::test]
    async fn mid_size_image_is_accepted() {
        // 3 MB sits above axum's 2 MB default and below the 5 MB cap.
        let body = Bytes::from(vec![0u8; 3 * 1024 * 1024]);
        let url = store_image(&FakeCdn, "image/webp", body).await.unwrap();
        assert!(url.starts_with("https://fake.cdn.local/"));
        assert!(url.ends_with(".webp"));
    }

    #[tokio::test]
    async fn oversized_image_is_rejected() {
        let body = Bytes::from(vec![0u8; MAX_IMAGE_BYTES + 1]);
        let err = store_image(&FakeCdn, "image/png", body).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected() {
        let body = Bytes::from_static(b"<svg/>");
        let err = store_image(&FakeCdn, "image/svg+xml", body)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn empty_image_is_rejected() {
        let err = store_image(&FakeCdn, "image/jpeg", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }
}
