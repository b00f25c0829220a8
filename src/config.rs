use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// `postgres://…`, `http(s)://…` (PostgREST) or `memory://`
    pub store_url: String,
    pub store_key: String,
    pub store_timeout_seconds: u64,
    pub store_max_connections: u32,
    pub session_secret: String,
    pub session_ttl_seconds: u64,
    pub faculty_cache_ttl_seconds: u64,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            store_url: required_any(&["STORE_URL", "SUPABASE_URL"])?,
            store_key: required_any(&["STORE_KEY", "SUPABASE_KEY"])?,
            store_timeout_seconds: env::var("STORE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "15".into())
                .parse()?,
            store_max_connections: env::var("STORE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            session_secret: match env::var("SESSION_SECRET").ok().filter(|s| !s.is_empty()) {
                Some(secret) => secret,
                None => {
                    tracing::warn!("SESSION_SECRET not set, sessions will not survive a restart");
                    random_secret()
                }
            },
            session_ttl_seconds: env::var("SESSION_TTL_SECONDS")
                .unwrap_or_else(|_| "43200".into())
                .parse()?,
            faculty_cache_ttl_seconds: env::var("FACULTY_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
        })
    }

    /// Config for tests and local runs against the in-memory store.
    pub fn in_memory() -> Self {
        Self {
            store_url: "memory://".into(),
            store_key: "local".into(),
            store_timeout_seconds: 15,
            store_max_connections: 1,
            session_secret: random_secret(),
            session_ttl_seconds: 3600,
            faculty_cache_ttl_seconds: 30,
            host: "127.0.0.1".into(),
            port: 0,
            app_base_url: "http://localhost".into(),
        }
    }
}

/// First non-empty value among `keys`, so the hosted-store variable names keep working.
fn required_any(keys: &[&str]) -> anyhow::Result<String> {
    keys.iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
        .ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", keys[0]))
}

fn random_secret() -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}
