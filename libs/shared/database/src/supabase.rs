use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DatabaseError {
    /// Connection failures, timeouts and overloaded upstreams are worth retrying by the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            DatabaseError::Unavailable(_) => true,
            DatabaseError::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DatabaseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DatabaseError::Decode(e.to_string())
        } else if e.is_builder() {
            DatabaseError::InvalidRequest(e.to_string())
        } else {
            DatabaseError::Unavailable(e.to_string())
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| DatabaseError::InvalidRequest(format!("Invalid API key header: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|e| DatabaseError::InvalidRequest(format!("Invalid authorization header: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        Self::check_status(response).await?
            .json::<T>()
            .await
            .map_err(DatabaseError::from)
    }

    /// Exact row count for a PostgREST query, read from `Content-Range` so `max-rows` does not cap it.
    pub async fn count(&self, path: &str) -> Result<u64, DatabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Counting rows for {}", url);

        let mut headers = self.get_headers()?;
        headers.insert(HeaderName::from_static("prefer"), HeaderValue::from_static("count=exact"));

        let response = self.client.head(&url)
            .headers(headers)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let range = response.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DatabaseError::Decode("Missing Content-Range header".to_string()))?;

        content_range_total(range)
            .ok_or_else(|| DatabaseError::Decode(format!("Unexpected Content-Range: {}", range)))
    }

    /// Upload raw bytes to a storage bucket and return the object path within the bucket.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Uploading {} bytes to storage bucket {}", bytes.len(), bucket);

        let mut headers = self.get_headers()?;
        let mime = HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        headers.insert(CONTENT_TYPE, mime);
        headers.insert(HeaderName::from_static("x-upsert"), HeaderValue::from_static("false"));

        let response = self.client.post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(object_path.to_string())
    }

    pub async fn delete_object(&self, bucket: &str, object_path: &str) -> Result<(), DatabaseError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Deleting object from storage bucket {}", bucket);

        let response = self.client.delete(&url)
            .headers(self.get_headers()?)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DatabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        error!("API error ({}): {}", status, error_text);

        Err(match status.as_u16() {
            404 => DatabaseError::NotFound(error_text),
            code => DatabaseError::Api { status: code, message: error_text },
        })
    }

    pub fn get_public_url(&self, bucket: &str, object_path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, object_path)
    }
}

/// Encode a value for use in a PostgREST filter (`column=eq.{value}`).
pub fn filter_value(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Total from a PostgREST `Content-Range` value such as `0-24/3573` or `*/0`.
pub fn content_range_total(range: &str) -> Option<u64> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}
