pub mod http_client;
pub mod k8s_api;
pub mod request_metrics;

pub use http_client::*;
pub use k8s_api::*;
pub use request_metrics::*;
