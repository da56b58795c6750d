use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;

use crate::errors::StoryboardError;

/// Binary asset collaborator. A failed upload is reported once and never
/// retried here.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Stores `bytes` under `path` and returns a durable URL.
    async fn upload(
        &self,
        bytes: Bytes,
        path: &str,
        content_type: &str,
    ) -> Result<String, StoryboardError>;
}

/// Object key for a newly uploaded shot visual.
pub fn shot_visual_path(project_id: &str, shot_id: &str, timestamp_ms: i64) -> String {
    format!("projects/{project_id}/shots/{shot_id}_{timestamp_ms}")
}

/// S3 / MinIO backend. URLs are path-style under `public_base_url`.
pub struct S3AssetStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3AssetStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(
        &self,
        bytes: Bytes,
        path: &str,
        content_type: &str,
    ) -> Result<String, StoryboardError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoryboardError::external("upload", format!("S3 upload failed: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, path);
        Ok(self.url_for(path))
    }
}
