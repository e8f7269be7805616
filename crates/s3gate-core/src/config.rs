//! Gateway configuration.
//!
//! Provides [`GatewayConfig`], loaded from environment variables by
//! [`GatewayConfig::from_env`]. Integer settings are clamped into a fixed
//! range so a bad value can never disable admission control entirely.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Gateway configuration.
///
/// # Examples
///
/// ```
/// use s3gate_core::config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:8080");
/// assert_eq!(config.max_list_num, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Bind address (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Log level filter used when `RUST_LOG` is not set.
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Global in-flight request ceiling.
    #[builder(default = 100)]
    pub max_request_num: usize,

    /// In-flight ceiling for listings.
    #[builder(default = 2)]
    pub max_list_num: usize,

    /// In-flight ceiling for object reads.
    #[builder(default = 50)]
    pub max_get_obj_num: usize,

    /// In-flight ceiling for writes; also the size of the small-upload token pool.
    #[builder(default = 50)]
    pub max_create_obj_num: usize,

    /// Seconds a small upload waits for a pool token.
    #[builder(default = 60)]
    pub object_timeout_secs: u64,

    /// Bodies smaller than this many bytes take the pooled synchronous path.
    #[builder(default = 2 * 1024 * 1024)]
    pub sync_file_min: u64,

    /// Maximum serialized size of user metadata, in bytes.
    #[builder(default = 2000)]
    pub metadata_size_limit: usize,

    /// Whether `Content-MD5` headers are verified.
    #[builder(default = true)]
    pub integrity_check: bool,

    /// Directory for staged multipart parts.
    #[builder(default = std::env::temp_dir())]
    pub cache_dir: PathBuf,

    /// Parts at or below this size stay in memory.
    #[builder(default = 524_288)]
    pub staging_memory_limit: usize,

    /// Caller identities registered with the backend at startup.
    #[builder(default)]
    pub identities: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default | Range |
    /// |----------|---------|-------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` | |
    /// | `LOG_LEVEL` | `info` | |
    /// | `MAX_REQUEST_NUM` | `100` | 10..=1000 |
    /// | `MAX_LIST_NUM` | `2` | 1..=10 |
    /// | `MAX_GET_OBJ_NUM` | `50` | 20..=100 |
    /// | `MAX_CREATE_OBJ_NUM` | `50` | 20..=500 |
    /// | `OBJECT_TIMEOUT_SECS` | `60` | 10..=300 |
    /// | `SYNC_FILE_MIN` | `2097152` | 1 MiB..=10 MiB |
    /// | `METADATA_SIZE_LIMIT` | `2000` | 0..=65536 |
    /// | `INTEGRITY_CHECK` | `true` | |
    /// | `CACHE_DIR` | system temp dir | |
    /// | `STAGING_MEMORY_LIMIT` | `524288` | 0..=64 MiB |
    /// | `GATEWAY_IDENTITIES` | empty | comma-separated |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        const MIB: u64 = 1024 * 1024;

        let mut config = Self::default();
        let range = |name: &str, min: u64, max: u64, default: u64| {
            get_range_int(lookup(name).as_deref(), min, max, default)
        };

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        config.max_request_num = to_usize(range("MAX_REQUEST_NUM", 10, 1000, 100));
        config.max_list_num = to_usize(range("MAX_LIST_NUM", 1, 10, 2));
        config.max_get_obj_num = to_usize(range("MAX_GET_OBJ_NUM", 20, 100, 50));
        config.max_create_obj_num = to_usize(range("MAX_CREATE_OBJ_NUM", 20, 500, 50));
        config.object_timeout_secs = range("OBJECT_TIMEOUT_SECS", 10, 300, 60);
        config.sync_file_min = range("SYNC_FILE_MIN", MIB, 10 * MIB, 2 * MIB);
        config.metadata_size_limit = to_usize(range("METADATA_SIZE_LIMIT", 0, 65_536, 2000));
        config.staging_memory_limit =
            to_usize(range("STAGING_MEMORY_LIMIT", 0, 64 * MIB, 524_288));
        if let Some(v) = lookup("INTEGRITY_CHECK") {
            config.integrity_check = parse_bool(&v);
        }
        if let Some(v) = lookup("CACHE_DIR").filter(|v| !v.is_empty()) {
            config.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("GATEWAY_IDENTITIES") {
            config.identities = v
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect();
        }

        config
    }
}

/// Parse an integer setting, falling back to `default` when absent or
/// unparseable and clamping into `[min, max]` otherwise.
#[must_use]
pub fn get_range_int(value: Option<&str>, min: u64, max: u64, default: u64) -> u64 {
    match value.map(str::trim).and_then(|v| v.parse::<u64>().ok()) {
        Some(n) => n.clamp(min, max),
        None => default,
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_should_create_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.gateway_listen, "0.0.0.0:8080");
        assert_eq!(config.max_request_num, 100);
        assert_eq!(config.max_list_num, 2);
        assert_eq!(config.max_get_obj_num, 50);
        assert_eq!(config.max_create_obj_num, 50);
        assert_eq!(config.object_timeout_secs, 60);
        assert_eq!(config.sync_file_min, 2_097_152);
        assert_eq!(config.metadata_size_limit, 2000);
        assert!(config.integrity_check);
    }

    #[test]
    fn test_should_clamp_out_of_range_values() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("MAX_LIST_NUM", "500"),
            ("MAX_GET_OBJ_NUM", "1"),
            ("OBJECT_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.max_list_num, 10);
        assert_eq!(config.max_get_obj_num, 20);
        assert_eq!(config.object_timeout_secs, 10);
    }

    #[test]
    fn test_should_fall_back_on_unparseable_values() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("MAX_CREATE_OBJ_NUM", "lots"),
            ("INTEGRITY_CHECK", "no"),
            ("CACHE_DIR", "/var/cache/s3gate"),
            ("GATEWAY_IDENTITIES", "alice, bob,,"),
        ]));
        assert_eq!(config.max_create_obj_num, 50);
        assert_eq!(config.identities, vec!["alice".to_owned(), "bob".to_owned()]);
        assert!(!config.integrity_check);
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/s3gate"));
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = GatewayConfig::builder()
            .gateway_listen("127.0.0.1:9000".into())
            .max_list_num(1)
            .integrity_check(false)
            .build();
        assert_eq!(config.gateway_listen, "127.0.0.1:9000");
        assert_eq!(config.max_list_num, 1);
        assert!(!config.integrity_check);
        assert_eq!(config.max_create_obj_num, 50);
    }

    #[test]
    fn test_should_serialize_to_camel_case_json() {
        let json = serde_json::to_string(&GatewayConfig::default()).expect("test serialization");
        assert!(json.contains("gatewayListen"));
        assert!(json.contains("syncFileMin"));
    }

    #[test]
    fn test_should_parse_range_int() {
        assert_eq!(get_range_int(None, 1, 10, 2), 2);
        assert_eq!(get_range_int(Some(" 7 "), 1, 10, 2), 7);
        assert_eq!(get_range_int(Some("0"), 1, 10, 2), 1);
        assert_eq!(get_range_int(Some("-3"), 1, 10, 2), 2);
    }
}
