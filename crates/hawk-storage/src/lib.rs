//! Vendor storage adapters for Hawk credentials.
//! Both backends are reached over their HTTP APIs with `reqwest`.

pub mod couchbase;
pub mod elasticsearch;
mod http;

pub use couchbase::{CouchbaseAdapter, CouchbaseConfig, CouchbaseConnection, CouchbaseConnector};
pub use elasticsearch::{ElasticsearchAdapter, ElasticsearchConfig};
