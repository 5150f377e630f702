//! Export destinations: a local directory or an object store bucket

use crate::error::{Error, Result};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where export files are written
#[derive(Clone)]
pub enum ExportDestination {
    /// Directory on disk, created on first use
    Local { dir: PathBuf },
    /// Object store bucket or container with a key prefix
    Remote {
        store: Arc<dyn ObjectStore>,
        scheme: String,
        bucket: String,
        prefix: String,
    },
}

impl fmt::Debug for ExportDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Split `bucket/some/prefix/` into bucket and trimmed prefix
fn split_bucket(rest: &str) -> (&str, String) {
    match rest.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix.trim_matches('/').to_string()),
        None => (rest, String::new()),
    }
}

impl ExportDestination {
    /// Parse a destination
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible, `R2_ENDPOINT_URL`)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - anything else, optionally `file://`, is a local directory
    ///
    /// Credentials come from the usual provider environment variables.
    pub fn parse(location: &str) -> Result<Self> {
        let Some((scheme, rest)) = location.split_once("://") else {
            return Ok(Self::local(location));
        };
        let (bucket, prefix) = split_bucket(rest);
        if bucket.is_empty() && scheme != "file" {
            return Err(Error::config(format!("Missing bucket in '{location}'")));
        }

        let store: Arc<dyn ObjectStore> = match scheme {
            "file" => return Ok(Self::local(rest)),
            "s3" | "r2" => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if scheme == "r2" {
                    if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                        builder = builder.with_endpoint(endpoint);
                    }
                }
                Arc::new(builder.build().map_err(|e| {
                    Error::config(format!("Failed to create {scheme} client: {e}"))
                })?)
            }
            "gs" => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?,
            ),
            "az" => Arc::new(
                MicrosoftAzureBuilder::from_env()
                    .with_container_name(bucket)
                    .build()
                    .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?,
            ),
            other => {
                return Err(Error::config(format!(
                    "Unsupported output scheme '{other}' (expected s3, r2, gs, az or file)"
                )))
            }
        };

        Ok(Self::Remote {
            store,
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            prefix,
        })
    }

    pub fn local(dir: impl AsRef<Path>) -> Self {
        Self::Local {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Location for logs and reports
    pub fn describe(&self) -> String {
        match self {
            Self::Local { dir } => dir.display().to_string(),
            Self::Remote {
                scheme,
                bucket,
                prefix,
                ..
            } if prefix.is_empty() => format!("{scheme}://{bucket}"),
            Self::Remote {
                scheme,
                bucket,
                prefix,
                ..
            } => format!("{scheme}://{bucket}/{prefix}"),
        }
    }

    /// Write `data` as `file_name` and return where it landed
    pub async fn write(&self, file_name: &str, data: Bytes) -> Result<String> {
        match self {
            Self::Local { dir } => {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    Error::output(format!("Failed to create directory {}: {e}", dir.display()))
                })?;
                let path = dir.join(file_name);
                tokio::fs::write(&path, &data).await.map_err(|e| {
                    Error::output(format!("Failed to write {}: {e}", path.display()))
                })?;
                debug!("Wrote {} bytes to {}", data.len(), path.display());
                Ok(path.display().to_string())
            }
            Self::Remote { store, prefix, .. } => {
                let key = if prefix.is_empty() {
                    ObjectPath::from(file_name)
                } else {
                    ObjectPath::from(format!("{prefix}/{file_name}"))
                };
                let size = data.len();
                store
                    .put(&key, data.into())
                    .await
                    .map_err(|e| Error::output(format!("Failed to write {key}: {e}")))?;
                let location = format!("{}/{file_name}", self.describe());
                debug!("Wrote {} bytes to {}", size, location);
                Ok(location)
            }
        }
    }
}
