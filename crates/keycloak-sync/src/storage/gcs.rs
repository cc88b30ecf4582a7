use super::{ObjectStorage, StorageError};
use reqwest::{Client, StatusCode, Url};
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Google Cloud Storage media downloads through the JSON API.
pub struct GcsStorage {
    endpoint: Url,
    access_token: Option<String>,
    http: Client,
    runtime: Runtime,
}

impl GcsStorage {
    pub fn new(access_token: Option<String>) -> Result<Self, StorageError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, access_token)
    }

    pub fn with_endpoint(
        endpoint: &str,
        access_token: Option<String>,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| StorageError::Transport(format!("{endpoint}: {err}")))?;
        let runtime = Runtime::new().map_err(|err| StorageError::Runtime(err.to_string()))?;
        Ok(Self {
            endpoint,
            access_token,
            http: Client::new(),
            runtime,
        })
    }

    fn media_url(&self, bucket: &str, object: &str) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Transport(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", object]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

impl std::fmt::Debug for GcsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStorage")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl ObjectStorage for GcsStorage {
    fn download(
        &self,
        bucket: &str,
        remote_path: &str,
        destination: &Path,
    ) -> Result<(), StorageError> {
        let url = self.media_url(bucket, remote_path)?;
        debug!(%url, "downloading object");

        let bytes = self.runtime.block_on(async {
            let mut request = self.http.get(url);
            if let Some(token) = &self.access_token {
                request = request.bearer_auth(token);
            }
            let response = request
                .send()
                .await
                .map_err(|err| StorageError::Transport(err.to_string()))?;

            match response.status() {
                status if status.is_success() => response
                    .bytes()
                    .await
                    .map_err(|err| StorageError::Transport(err.to_string())),
                StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    object: remote_path.to_string(),
                }),
                status => Err(StorageError::Request {
                    object: remote_path.to_string(),
                    status: status.as_u16(),
                }),
            }
        })?;

        std::fs::write(destination, &bytes).map_err(|source| StorageError::Io {
            path: destination.to_path_buf(),
            source,
        })
    }
}
