use std::fmt;

use hawk_storage::{CouchbaseConfig, ElasticsearchConfig};
use serde::{Deserialize, Serialize};

/// Service configuration: which backend to use and how chatty to be.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Backend selection, tagged by `kind`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Couchbase(CouchbaseConfig),
    Elasticsearch(ElasticsearchConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Couchbase(CouchbaseConfig::default())
    }
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Couchbase(_) => "couchbase",
            StoreConfig::Elasticsearch(_) => "elasticsearch",
        }
    }
}

/// Verbosity for the service's own log output. Accepts either case.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[serde(alias = "TRACE")]
    Trace,
    #[serde(alias = "DEBUG")]
    Debug,
    #[serde(alias = "INFO")]
    Info,
    #[default]
    #[serde(alias = "WARN")]
    Warn,
    #[serde(alias = "ERROR")]
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_couchbase_and_warn() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.store, StoreConfig::Couchbase(CouchbaseConfig::default()));
        assert_eq!(cfg.log_level, LogLevel::Warn);
        assert_eq!(cfg.store.kind(), "couchbase");
    }

    #[test]
    fn parses_elasticsearch_store_with_defaults_filled_in() {
        let cfg: ServiceConfig = toml::from_str(
            r#"
            log_level = "DEBUG"
            [store]
            kind = "elasticsearch"
            url = "http://search:9200"
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(
            cfg.store,
            StoreConfig::Elasticsearch(ElasticsearchConfig {
                url: "http://search:9200".into(),
                ..ElasticsearchConfig::default()
            })
        );
    }

    #[test]
    fn parses_couchbase_store() {
        let cfg: ServiceConfig = toml::from_str(
            r#"
            [store]
            kind = "couchbase"
            hosts = ["https://cb1.internal", "https://cb2.internal"]
            bucket = "hawk"
            username = "svc"
            password = "pw"
            timeout_secs = 5
            "#,
        )
        .expect("parse");

        assert_eq!(
            cfg.store,
            StoreConfig::Couchbase(CouchbaseConfig {
                hosts: vec!["https://cb1.internal".into(), "https://cb2.internal".into()],
                bucket: "hawk".into(),
                username: Some("svc".into()),
                password: Some("pw".into()),
                timeout_secs: Some(5),
                ..CouchbaseConfig::default()
            })
        );
        assert_eq!(cfg.log_level, LogLevel::Warn);
    }

    #[test]
    fn rejects_unknown_store_kind() {
        let err = toml::from_str::<ServiceConfig>(
            r#"
            [store]
            kind = "redis"
            "#,
        )
        .expect_err("unknown kind");
        assert!(err.to_string().contains("redis"), "{err}");
    }
}
