// src/storage.rs
//
// Object storage for uploaded file bytes. S3-compatible; custom endpoints
// (MinIO, Beget) are supported through the config. The stored object is
// owned by the upload row's lifecycle: deleting the row deletes the object.

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::ApiError;

#[derive(Clone)]
pub struct Storage {
    client: S3Client,
    bucket: String,
}

impl Storage {
    pub async fn from_config(config: &StorageConfig) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Key layout: `uploads/<user_id>/<uuid><ext>`. The uuid keeps keys
    /// unique regardless of the declared filename.
    pub fn make_key(user_id: i32, extension: &str) -> String {
        format!("uploads/{}/{}{}", user_id, Uuid::new_v4(), extension)
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ApiError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("put {key}: {e}")))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, ApiError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("get {key}: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| ApiError::Storage(format!("read {key}: {e}")))?;

        Ok(data.into_bytes().to_vec())
    }

    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("delete {key}: {e}")))?;
        Ok(())
    }
}
