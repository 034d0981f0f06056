pub mod backoff;
pub mod shutdown;

pub use backoff::ExponentialBackoff;
pub use shutdown::shutdown_requested;
