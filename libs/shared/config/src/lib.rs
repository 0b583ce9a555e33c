use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_ATTACHMENT_BUCKET: &str = "emergency-documents";
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_AVERAGE_CONSULT_MINUTES: i64 = 10;
/// One day per patient is already far beyond any real consultation.
pub const MAX_AVERAGE_CONSULT_MINUTES: i64 = 24 * 60;
pub const DEFAULT_QUEUE_MAX_CAS_RETRIES: u32 = 8;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub enum QueueBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub redis_url: Option<String>,
    pub queue_backend: QueueBackend,
    pub field_encryption_key: Option<String>,
    pub attachment_bucket: String,
    pub max_attachment_bytes: usize,
    pub average_consult_minutes: i64,
    pub queue_max_cas_retries: u32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.is_empty());

        let queue_backend = match env::var("QUEUE_BACKEND").ok().as_deref() {
            Some("redis") => QueueBackend::Redis,
            Some("memory") => QueueBackend::Memory,
            Some(other) => {
                warn!("Unknown QUEUE_BACKEND '{}', falling back to default", other);
                Self::default_backend(&redis_url)
            }
            None => Self::default_backend(&redis_url),
        };

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            redis_url,
            queue_backend,
            field_encryption_key: env::var("FIELD_ENCRYPTION_KEY").ok().or_else(|| {
                warn!("FIELD_ENCRYPTION_KEY not set, emergency reasons will be stored in plaintext");
                None
            }),
            attachment_bucket: env::var("ATTACHMENT_BUCKET")
                .unwrap_or_else(|_| DEFAULT_ATTACHMENT_BUCKET.to_string()),
            max_attachment_bytes: parse_or("MAX_ATTACHMENT_BYTES", DEFAULT_MAX_ATTACHMENT_BYTES),
            average_consult_minutes: consult_minutes_or_default(env::var("AVERAGE_CONSULT_MINUTES").ok().as_deref()),
            queue_max_cas_retries: parse_or("QUEUE_MAX_CAS_RETRIES", DEFAULT_QUEUE_MAX_CAS_RETRIES),
            port: parse_or("PORT", DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    fn default_backend(redis_url: &Option<String>) -> QueueBackend {
        if redis_url.is_some() {
            QueueBackend::Redis
        } else {
            warn!("REDIS_URL not set, using in-memory queue store");
            QueueBackend::Memory
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }

    pub fn is_encryption_configured(&self) -> bool {
        self.field_encryption_key.as_deref().map_or(false, |k| !k.is_empty())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            redis_url: None,
            queue_backend: QueueBackend::Memory,
            field_encryption_key: None,
            attachment_bucket: DEFAULT_ATTACHMENT_BUCKET.to_string(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            average_consult_minutes: DEFAULT_AVERAGE_CONSULT_MINUTES,
            queue_max_cas_retries: DEFAULT_QUEUE_MAX_CAS_RETRIES,
            port: DEFAULT_PORT,
        }
    }
}

/// Accepts 0..=MAX_AVERAGE_CONSULT_MINUTES; anything else warns and falls back to the default.
pub fn consult_minutes_or_default(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return DEFAULT_AVERAGE_CONSULT_MINUTES;
    };

    match raw.trim().parse::<i64>() {
        Ok(minutes) if (0..=MAX_AVERAGE_CONSULT_MINUTES).contains(&minutes) => minutes,
        _ => {
            warn!(
                "AVERAGE_CONSULT_MINUTES must be between 0 and {}, got '{}', using default {}",
                MAX_AVERAGE_CONSULT_MINUTES, raw, DEFAULT_AVERAGE_CONSULT_MINUTES
            );
            DEFAULT_AVERAGE_CONSULT_MINUTES
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
