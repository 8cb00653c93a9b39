use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use crate::util::IdScheme;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing env var {0}")]
    Missing(&'static str),
    #[error("invalid env var {0}: {1}")]
    Invalid(&'static str, String),
}

/// Which implementation backs a store binding. `Disabled` leaves the binding
/// absent; handlers that need it answer with a configuration error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Postgres,
    S3,
    Disabled,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "postgres" => Ok(Backend::Postgres),
            "s3" => Ok(Backend::S3),
            "none" | "disabled" => Ok(Backend::Disabled),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub metadata_backend: Backend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub metadata_namespace: String,
    pub object_backend: Backend,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_bucket: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_force_path_style: bool,
    pub s3_create_bucket: bool,
    pub s3_key_prefix: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub id_scheme: IdScheme,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid("BIND_ADDR", e.to_string()))?;

        let database_url = env::var("DATABASE_URL").ok();
        let metadata_backend = match env::var("METADATA_BACKEND").ok() {
            Some(raw) => parse_backend("METADATA_BACKEND", &raw)?,
            None if database_url.is_some() => Backend::Postgres,
            None => Backend::Memory,
        };
        if metadata_backend == Backend::S3 {
            return Err(ConfigError::Invalid(
                "METADATA_BACKEND",
                "s3 cannot hold artist metadata".to_string(),
            ));
        }
        if metadata_backend == Backend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let metadata_namespace =
            env::var("METADATA_NAMESPACE").unwrap_or_else(|_| "artists".to_string());

        let s3_bucket = env::var("S3_BUCKET").ok();
        let object_backend = match env::var("OBJECT_BACKEND").ok() {
            Some(raw) => parse_backend("OBJECT_BACKEND", &raw)?,
            None if s3_bucket.is_some() => Backend::S3,
            None => Backend::Memory,
        };
        if object_backend == Backend::Postgres {
            return Err(ConfigError::Invalid(
                "OBJECT_BACKEND",
                "postgres cannot hold image objects".to_string(),
            ));
        }
        if object_backend == Backend::S3 && s3_bucket.is_none() {
            return Err(ConfigError::Missing("S3_BUCKET"));
        }

        let s3_endpoint = env::var("S3_ENDPOINT").ok();
        let s3_region = env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_access_key = env::var("S3_ACCESS_KEY_ID").ok();
        let s3_secret_key = env::var("S3_SECRET_ACCESS_KEY").ok();
        let s3_force_path_style = env_bool("S3_FORCE_PATH_STYLE", true);
        let s3_create_bucket = env_bool("S3_CREATE_BUCKET", true);
        let s3_key_prefix = env::var("S3_KEY_PREFIX").ok().filter(|p| !p.is_empty());

        let static_dir = env::var("STATIC_DIR").map(PathBuf::from).ok();

        let id_scheme = match env::var("ARTIST_ID_SCHEME").ok() {
            Some(raw) => raw
                .parse::<IdScheme>()
                .map_err(|e| ConfigError::Invalid("ARTIST_ID_SCHEME", e))?,
            None => IdScheme::Timestamp,
        };

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES").ok() {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| ConfigError::Invalid("MAX_UPLOAD_BYTES", e.to_string()))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            bind_addr,
            metadata_backend,
            database_url,
            db_max_connections,
            metadata_namespace,
            object_backend,
            s3_endpoint,
            s3_region,
            s3_bucket,
            s3_access_key,
            s3_secret_key,
            s3_force_path_style,
            s3_create_bucket,
            s3_key_prefix,
            static_dir,
            id_scheme,
            max_upload_bytes,
        })
    }
}

fn parse_backend(key: &'static str, raw: &str) -> Result<Backend, ConfigError> {
    raw.parse::<Backend>()
        .map_err(|e| ConfigError::Invalid(key, e))
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert_eq!(" Postgres ".parse::<Backend>().unwrap(), Backend::Postgres);
        assert_eq!("s3".parse::<Backend>().unwrap(), Backend::S3);
        assert_eq!("none".parse::<Backend>().unwrap(), Backend::Disabled);
        assert!("redis".parse::<Backend>().is_err());
    }

    #[test]
    fn invalid_backend_names_the_variable() {
        let err = parse_backend("OBJECT_BACKEND", "tape").unwrap_err();
        assert!(err.to_string().contains("OBJECT_BACKEND"));
    }
}
