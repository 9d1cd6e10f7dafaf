use super::ArchiveSink;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use fetcher_core::config::ArchiveConfig;
use fetcher_core::{Error, Result};
use tracing::{debug, instrument};

pub struct S3Sink {
    client: S3Client,
    bucket: String,
}

impl S3Sink {
    pub async fn new(config: &ArchiveConfig) -> Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            config_loader = config_loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(profile) = &config.aws_profile {
            config_loader = config_loader.profile_name(profile);
        }

        let sdk_config = config_loader.load().await;

        Ok(Self {
            client: S3Client::new(&sdk_config),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl ArchiveSink for S3Sink {
    #[instrument(skip(self, body), fields(bucket = %self.bucket, bytes = body.len()))]
    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                let details = match e {
                    aws_sdk_s3::error::SdkError::ServiceError(ref err) => {
                        format!("S3 service error: {:?}", err.err())
                    }
                    _ => format!("S3 request failed: {}", e),
                };
                Error::Archive {
                    key: key.to_string(),
                    details,
                }
            })?;

        debug!(key, "Wrote archive object");
        Ok(())
    }
}
