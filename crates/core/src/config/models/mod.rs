pub mod addon;
pub mod app_config;
pub mod cluster;
pub mod http;
pub mod placement;

// Re-export main types for easier imports
pub use addon::AddonConfig;
pub use app_config::AppConfig;
pub use cluster::ClusterConfig;
pub use http::{HttpConfig, RetryConfig};
pub use placement::PlacementConfig;
