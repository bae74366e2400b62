pub mod config;
pub mod errors;
pub mod executor_registry;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::*;
pub use errors::*;
pub use executor_registry::*;
pub use logging::*;
pub use models::*;
pub use traits::*;
