//! S3 object store backend (supports AWS S3 and S3-compatible services via endpoint)

use crate::core::manifest::ModuleMetadata;
use crate::core::service::ServiceError;
use crate::storage::{LocatorStyle, ObjectAttributes, ObjectStore, StorageConfig, ARCHIVE_CONTENT_TYPE};
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTimeFormat};
use aws_sdk_s3::types::MetadataDirective;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const OWNER_KEY: &str = "owner";
const TEAM_KEY: &str = "team";

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    locator_style: LocatorStyle,
    presign_expiry: Duration,
}

impl S3ObjectStore {
    /// Build the client from the AWS default credential chain
    pub async fn new(config: &StorageConfig) -> Self {
        use aws_config::meta::region::RegionProviderChain;
        use aws_config::Region;

        let region = if config.region.is_empty() {
            "us-east-1".to_string()
        } else {
            config.region.clone()
        };

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(RegionProviderChain::first_try(Region::new(region.clone())));

        // Custom endpoint for S3-compatible services
        if let Some(endpoint_url) = &config.endpoint {
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            region,
            endpoint: config.endpoint.clone(),
            locator_style: config.locator_style,
            presign_expiry: config.presign_expiry,
        }
    }

    fn object_metadata(metadata: &ModuleMetadata) -> HashMap<String, String> {
        HashMap::from([
            (OWNER_KEY.to_string(), metadata.owner.clone()),
            (TEAM_KEY.to_string(), metadata.team.clone()),
        ])
    }

    fn go_getter_locator(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!(
                "s3::{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                key
            ),
            None => format!(
                "s3::https://s3-{}.amazonaws.com/{}/{}",
                self.region, self.bucket, key
            ),
        }
    }
}

/// Map AWS SDK errors to user-friendly error messages
fn map_s3_error<E: ProvideErrorMetadata + std::error::Error>(err: &E) -> String {
    match err.code() {
        Some("NoSuchKey") | Some("NotFound") => "Object not found".to_string(),
        Some("NoSuchBucket") => "Bucket not found".to_string(),
        Some("AccessDenied") => "Access denied".to_string(),
        Some(code) => format!("S3 error {}: {}", code, err.message().unwrap_or_default()),
        None => format!("S3 error: {}", err),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        metadata: &ModuleMetadata,
        fail_if_exists: bool,
    ) -> Result<(), ServiceError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(ARCHIVE_CONTENT_TYPE)
            .set_metadata(Some(Self::object_metadata(metadata)));

        if fail_if_exists {
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => {
                debug!("Uploaded s3://{}/{} ({} bytes)", self.bucket, key, data.len());
                Ok(())
            }
            Err(e) => match e.code() {
                // 412 when the key exists, 409 when a concurrent conditional write won
                Some("PreconditionFailed") | Some("ConditionalRequestConflict") => {
                    Err(ServiceError::ObjectConflict(key.to_string()))
                }
                _ => Err(ServiceError::Storage(format!(
                    "Failed to upload to S3: {}",
                    map_s3_error(&e)
                ))),
            },
        }
    }

    async fn get_attributes(&self, key: &str) -> Result<ObjectAttributes, ServiceError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    ServiceError::NotFound(key.to_string())
                } else {
                    ServiceError::Storage(format!(
                        "Failed to read object attributes from S3: {}",
                        map_s3_error(&e)
                    ))
                }
            })?;

        let stored = output.metadata();
        let lookup = |name: &str| {
            stored
                .and_then(|m| m.get(name))
                .cloned()
                .unwrap_or_default()
        };

        Ok(ObjectAttributes {
            key: key.to_string(),
            size: output.content_length().unwrap_or_default().max(0) as u64,
            metadata: ModuleMetadata {
                owner: lookup(OWNER_KEY),
                team: lookup(TEAM_KEY),
            },
            updated_at: output
                .last_modified()
                .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()),
        })
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                ServiceError::Storage(format!("Failed to list S3 objects: {}", map_s3_error(&e)))
            })?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        Ok(keys)
    }

    async fn update_attributes(
        &self,
        key: &str,
        metadata: &ModuleMetadata,
    ) -> Result<ObjectAttributes, ServiceError> {
        self.get_attributes(key).await?;

        // A self-copy with REPLACE rewrites metadata, the body is copied server side
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(format!("{}/{}", self.bucket, key))
            .metadata_directive(MetadataDirective::Replace)
            .content_type(ARCHIVE_CONTENT_TYPE)
            .set_metadata(Some(Self::object_metadata(metadata)))
            .send()
            .await
            .map_err(|e| {
                ServiceError::Storage(format!(
                    "Failed to update S3 object metadata: {}",
                    map_s3_error(&e)
                ))
            })?;

        info!("Updated metadata of s3://{}/{}", self.bucket, key);
        self.get_attributes(key).await
    }

    async fn locator_for(
        &self,
        key: &str,
        _attributes: &ObjectAttributes,
    ) -> Result<String, ServiceError> {
        match self.locator_style {
            LocatorStyle::GoGetter => Ok(self.go_getter_locator(key)),
            LocatorStyle::Presigned => {
                let presigning = PresigningConfig::expires_in(self.presign_expiry)
                    .map_err(|e| ServiceError::Config(format!("Invalid presign expiry: {}", e)))?;
                let request = self
                    .client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .presigned(presigning)
                    .await
                    .map_err(|e| {
                        ServiceError::Storage(format!(
                            "Failed to presign download URL: {}",
                            map_s3_error(&e)
                        ))
                    })?;
                Ok(request.uri().to_string())
            }
        }
    }

    async fn check_ready(&self) -> Result<(), ServiceError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                ServiceError::StorageUnavailable(format!(
                    "Bucket '{}' is not reachable: {}",
                    self.bucket,
                    map_s3_error(&e)
                ))
            })?;
        info!("S3 bucket '{}' is reachable", self.bucket);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn store(endpoint: Option<&str>) -> S3ObjectStore {
        let config = StorageConfig {
            storage_type: "s3".to_string(),
            bucket: "modules".to_string(),
            region: "eu-west-1".to_string(),
            endpoint: endpoint.map(str::to_string),
            locator_style: LocatorStyle::GoGetter,
            ..Default::default()
        };
        S3ObjectStore::new(&config).await
    }

    #[tokio::test]
    async fn test_go_getter_locator_aws() {
        let store = store(None).await;
        assert_eq!(
            store.go_getter_locator("a/b/c/a-b-c-1.0.0.tar.gz"),
            "s3::https://s3-eu-west-1.amazonaws.com/modules/a/b/c/a-b-c-1.0.0.tar.gz"
        );
    }

    #[tokio::test]
    async fn test_go_getter_locator_custom_endpoint() {
        let store = store(Some("http://minio.local:9000/")).await;
        assert_eq!(
            store.go_getter_locator("a/b/c/a-b-c-1.0.0.tar.gz"),
            "s3::http://minio.local:9000/modules/a/b/c/a-b-c-1.0.0.tar.gz"
        );
    }

    #[test]
    fn test_object_metadata_keys() {
        let metadata = S3ObjectStore::object_metadata(&ModuleMetadata {
            owner: "alice".to_string(),
            team: "platform".to_string(),
        });
        assert_eq!(metadata.get("owner").unwrap(), "alice");
        assert_eq!(metadata.get("team").unwrap(), "platform");
    }
}
