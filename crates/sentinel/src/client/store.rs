//! Store trait — abstract interface for the key-value store.

use std::future::Future;
use std::pin::Pin;

use crate::store::StoreError;

pub trait StoreOps: Send + Sync {
    /// Create or overwrite `key`, expiring after `ttl_secs`.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Refresh the TTL of an existing directory.
    fn refresh_dir<'a>(
        &'a self,
        path: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}
