mod backoff;
pub use backoff::BackoffConfig;
