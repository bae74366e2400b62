pub mod http_client;
pub mod task_executor;

pub use http_client::*;
pub use task_executor::*;
