use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::{filter_value, SupabaseClient};

use crate::{TokenDocument, TokenError, TokenStatus};

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_by_token_number(&self, token_number: &str) -> Result<Option<TokenDocument>, TokenError>;

    /// The patient's most recently generated Active token for `date`.
    async fn find_latest_active_for_patient(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<TokenDocument>, TokenError>;

    /// Active tokens in the same hospital, department and day generated strictly before `token`.
    async fn count_active_before(&self, token: &TokenDocument) -> Result<u64, TokenError>;
}

/// `tokens` table through PostgREST.
pub struct SupabaseTokenStore {
    supabase: SupabaseClient,
}

impl SupabaseTokenStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn first(&self, path: &str) -> Result<Option<TokenDocument>, TokenError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None).await?;

        match rows.into_iter().next() {
            Some(row) => {
                let token = serde_json::from_value(row)
                    .map_err(|e| TokenError::StoreError(format!("Malformed token row: {}", e)))?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TokenStore for SupabaseTokenStore {
    async fn find_by_token_number(&self, token_number: &str) -> Result<Option<TokenDocument>, TokenError> {
        debug!("Looking up token {}", token_number);

        let path = format!(
            "/rest/v1/tokens?token_number=eq.{}&limit=1",
            filter_value(token_number)
        );
        self.first(&path).await
    }

    async fn find_latest_active_for_patient(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<TokenDocument>, TokenError> {
        debug!("Looking up active token for patient {} on {}", patient_id, date);

        let path = format!(
            "/rest/v1/tokens?patient_id=eq.{}&date=eq.{}&status=eq.{}&order=generated_at.desc&limit=1",
            filter_value(patient_id),
            date.format("%Y-%m-%d"),
            TokenStatus::Active.as_str()
        );
        self.first(&path).await
    }

    async fn count_active_before(&self, token: &TokenDocument) -> Result<u64, TokenError> {
        let path = format!(
            "/rest/v1/tokens?select=token_number&hospital_name=eq.{}&department=eq.{}&date=eq.{}&status=eq.{}&generated_at=lt.{}",
            filter_value(&token.hospital_name),
            filter_value(&token.department),
            token.date.format("%Y-%m-%d"),
            TokenStatus::Active.as_str(),
            filter_value(&token.generated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        );

        let ahead = self.supabase.count(&path).await?;
        debug!("{} active tokens ahead of {}", ahead, token.token_number);
        Ok(ahead)
    }
}

/// Tokens keyed by token number, for development and tests.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<String, TokenDocument>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, token: TokenDocument) {
        self.tokens.write().await.insert(token.token_number.clone(), token);
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn find_by_token_number(&self, token_number: &str) -> Result<Option<TokenDocument>, TokenError> {
        Ok(self.tokens.read().await.get(token_number).cloned())
    }

    async fn find_latest_active_for_patient(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<TokenDocument>, TokenError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .values()
            .filter(|t| t.patient_id == patient_id && t.date == date && t.is_active())
            .max_by_key(|t| t.generated_at)
            .cloned())
    }

    async fn count_active_before(&self, token: &TokenDocument) -> Result<u64, TokenError> {
        let tokens = self.tokens.read().await;
        let ahead = tokens
            .values()
            .filter(|t| t.is_active() && t.same_partition(token) && t.generated_at < token.generated_at)
            .count();
        Ok(ahead as u64)
    }
}
