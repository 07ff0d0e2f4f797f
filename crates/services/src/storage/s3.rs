//! S3-compatible object store (AWS S3, MinIO) using path-style URLs and
//! Signature Version 4 signed GETs.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use hmac::{Hmac, Mac};
use koe_config::StorageSettings;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{ObjectStore, StorageError};

type HmacSha256 = Hmac<Sha256>;

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

pub struct S3ObjectStore {
    client: Client,
    endpoint: String,
    host: String,
    bucket: String,
    region: String,
    access_key: String,
    secret_key: String,
}

impl S3ObjectStore {
    pub fn new(settings: &StorageSettings) -> Self {
        let endpoint = settings.endpoint.trim_end_matches('/').to_string();
        let host = endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(endpoint.as_str())
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            client: Client::new(),
            endpoint,
            host,
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            access_key: settings.access_key.clone(),
            secret_key: settings.secret_key.clone(),
        }
    }

    fn canonical_uri(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("/{}/{}", urlencoding::encode(&self.bucket), encoded.join("/"))
    }

    fn authorization(
        &self,
        canonical_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, String), StorageError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let scope = format!("{date_stamp}/{}/s3/aws4_request", self.region);

        let canonical_request = format!(
            "GET\n{canonical_uri}\n\nhost:{}\nx-amz-content-sha256:{UNSIGNED_PAYLOAD}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{UNSIGNED_PAYLOAD}",
            self.host
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&self.secret_key, &date_stamp, &self.region, "s3")?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        let header = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.access_key
        );
        Ok((header, amz_date))
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| StorageError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn signing_key(
    secret: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<u64, StorageError> {
        let canonical_uri = self.canonical_uri(key);
        let (authorization, amz_date) = self.authorization(&canonical_uri, Utc::now())?;
        let url = format!("{}{canonical_uri}", self.endpoint);
        debug!(%url, "Fetching object");

        let response = self
            .client
            .get(&url)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", UNSIGNED_PAYLOAD)
            .header("Authorization", authorization)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {}
            404 => return Err(StorageError::NotFound(key.to_string())),
            status => {
                return Err(StorageError::Status {
                    status,
                    key: key.to_string(),
                });
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    fn backend_name(&self) -> &str {
        "s3"
    }
}
