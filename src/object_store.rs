//! Object storage access for uploaded documents.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::aws::sigv4::{sign_request, uri_encode, AwsCredentials};
use crate::errors::DocumentLoadError;

/// Read access to stored document bytes, keyed by storage key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, DocumentLoadError>;
}

/// S3-backed object store using signed `GetObject` requests.
pub struct S3ObjectStore {
    client: reqwest::Client,
    bucket: String,
    region: String,
    creds: AwsCredentials,
}

impl S3ObjectStore {
    pub fn new(bucket: String, region: String, creds: AwsCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket,
            region,
            creds,
        }
    }

    fn host(&self) -> String {
        format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, DocumentLoadError> {
        let host = self.host();
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        let path = format!("/{}", encoded_key);

        let signed = sign_request(
            "GET",
            &host,
            &path,
            "",
            &[],
            b"",
            "s3",
            &self.region,
            &self.creds,
            Utc::now(),
        );

        let fetch_err = |detail: String| DocumentLoadError::Fetch {
            key: key.to_string(),
            detail,
        };

        let mut req = self
            .client
            .get(format!("https://{}{}", host, path))
            .header("Authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256);

        if let Some(ref token) = signed.security_token {
            req = req.header("x-amz-security-token", token);
        }

        let resp = req.send().await.map_err(|e| fetch_err(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(fetch_err(format!(
                "S3 GetObject failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let bytes = resp.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Map-backed object store for tests.
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, DocumentLoadError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| DocumentLoadError::Fetch {
                key: key.to_string(),
                detail: "no such object".to_string(),
            })
    }
}
