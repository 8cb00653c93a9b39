use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier},
    Client as S3Client,
};
use bytes::Bytes;

use crate::{
    config::{Config, ConfigError},
    error::ApiError,
    storage::{ObjectStore, StoredObject},
};

/// S3 caps `DeleteObjects` at this many keys per call.
const DELETE_BATCH: usize = 1000;

pub struct S3Store {
    client: S3Client,
    bucket: String,
    key_prefix: Option<String>,
}

impl S3Store {
    pub async fn new(cfg: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let bucket = cfg
            .s3_bucket
            .clone()
            .ok_or(ConfigError::Missing("S3_BUCKET"))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.s3_region.clone()));

        if let Some(endpoint) = &cfg.s3_endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access), Some(secret)) = (&cfg.s3_access_key, &cfg.s3_secret_key) {
            let creds = Credentials::new(access, secret, None, None, "env");
            loader = loader.credentials_provider(creds);
        }

        let shared = loader.load().await;
        let mut s3_config = aws_sdk_s3::config::Builder::from(&shared);
        if cfg.s3_force_path_style {
            s3_config = s3_config.force_path_style(true);
        }
        let client = S3Client::from_conf(s3_config.build());

        Ok(Self {
            client,
            bucket,
            key_prefix: cfg.s3_key_prefix.clone(),
        })
    }

    pub async fn ensure_bucket(&self) -> Result<(), Box<dyn std::error::Error>> {
        let head = self.client.head_bucket().bucket(&self.bucket).send().await;
        if head.is_err() {
            tracing::info!(bucket = %self.bucket, "creating bucket");
            self.client
                .create_bucket()
                .bucket(&self.bucket)
                .send()
                .await?;
        }
        Ok(())
    }

    fn full_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ApiError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, ApiError> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_key())
                {
                    return Ok(None);
                }
                return Err(ApiError::Storage(err.to_string()));
            }
        };

        let content_type = resp
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let etag = resp.e_tag().map(str::to_string);

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?
            .into_bytes();

        Ok(Some(StoredObject {
            bytes,
            content_type,
            etag,
        }))
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), ApiError> {
        for chunk in keys.chunks(DELETE_BATCH) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(self.full_key(key)).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ApiError::Storage(e.to_string()))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| ApiError::Storage(e.to_string()))?;

            let out = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| ApiError::Storage(e.to_string()))?;

            for failed in out.errors() {
                tracing::warn!(
                    "failed to delete object {}: {}",
                    failed.key().unwrap_or("<unknown>"),
                    failed.message().unwrap_or("no message")
                );
            }
        }
        Ok(())
    }
}
