use std::time::Duration;

use serde_json::Value;

use crate::error::{EtudeError, EtudeResult};

/// Pluggable JSON codec used by [`Context`](crate::Context) for body decoding
/// and JSON/JSONP responses.
///
/// Both functions work on [`serde_json::Value`]; typed values are converted
/// to and from `Value` around the call.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    pub encode: fn(&Value) -> Result<Vec<u8>, serde_json::Error>,
    pub decode: fn(&[u8]) -> Result<Value, serde_json::Error>,
}

impl JsonCodec {
    /// Compact `serde_json` encoding.
    pub fn standard() -> Self {
        JsonCodec {
            encode: |v| serde_json::to_vec(v),
            decode: |b| serde_json::from_slice(b),
        }
    }

    /// Indented `serde_json` encoding, handy in development.
    pub fn pretty() -> Self {
        JsonCodec {
            encode: |v| serde_json::to_vec_pretty(v),
            decode: |b| serde_json::from_slice(b),
        }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        JsonCodec::standard()
    }
}

/// Router configuration.
///
/// Construct with struct update syntax over [`Config::default`], or load it
/// from `ETUDE_*` environment variables with [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Codec behind `bind_json`, `json` and `jsonp`.
    pub json: JsonCodec,

    /// Value of the `Server` response header. `None` disables the header.
    pub server_header: Option<String>,

    /// Largest accepted request body in bytes (default: 4 MiB).
    /// `0` disables the check.
    pub max_request_body_size: usize,

    /// When `false`, routes and request paths are lowercased before matching.
    pub case_sensitive: bool,

    /// When `false`, a trailing `/` is ignored, so `/foo` and `/foo/`
    /// reach the same route.
    pub strict_routing: bool,

    /// Percent-decode paths before matching.
    pub unescape_path: bool,

    /// Log every registered route when the router is built.
    pub print_routes: bool,

    /// Time allowed for a client to send the request head.
    pub read_timeout: Option<Duration>,

    /// Time allowed for producing a response once the request is read.
    pub write_timeout: Option<Duration>,

    /// How long a keep-alive connection may sit with no request in flight
    /// before it is closed. Busy connections are never cut.
    pub idle_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            json: JsonCodec::standard(),
            server_header: Some("Etude".to_string()),
            max_request_body_size: 4 * 1024 * 1024,
            case_sensitive: true,
            strict_routing: false,
            unescape_path: false,
            print_routes: true,
            read_timeout: None,
            write_timeout: None,
            idle_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    ///
    /// Unset variables keep their [`Default`] value; values that fail to
    /// parse are reported as [`EtudeError::Config`].
    pub fn from_env() -> EtudeResult<Self> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        let defaults = Config::default();
        Ok(Config {
            json: defaults.json,
            server_header: match std::env::var("ETUDE_SERVER_HEADER") {
                Ok(v) if v.is_empty() => None,
                Ok(v) => Some(v),
                Err(_) => defaults.server_header,
            },
            max_request_body_size: env_parse("ETUDE_MAX_BODY_SIZE")?
                .unwrap_or(defaults.max_request_body_size),
            case_sensitive: env_flag("ETUDE_CASE_SENSITIVE")?.unwrap_or(defaults.case_sensitive),
            strict_routing: env_flag("ETUDE_STRICT_ROUTING")?.unwrap_or(defaults.strict_routing),
            unescape_path: env_flag("ETUDE_UNESCAPE_PATH")?.unwrap_or(defaults.unescape_path),
            print_routes: env_flag("ETUDE_PRINT_ROUTES")?.unwrap_or(defaults.print_routes),
            read_timeout: env_parse("ETUDE_READ_TIMEOUT_SECS")?.map(Duration::from_secs),
            write_timeout: env_parse("ETUDE_WRITE_TIMEOUT_SECS")?.map(Duration::from_secs),
            idle_timeout: env_parse("ETUDE_IDLE_TIMEOUT_SECS")?.map(Duration::from_secs),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> EtudeResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EtudeError::Config(format!("{} has an invalid value: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

fn env_flag(key: &str) -> EtudeResult<Option<bool>> {
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw)
            .map(Some)
            .ok_or_else(|| EtudeError::Config(format!("{} is not a boolean: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
