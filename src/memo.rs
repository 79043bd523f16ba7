//! Memoization Wrapper
//!
//! Runs a compute operation only when the cache has no usable result for
//! its params, then writes the result back.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{canonical_params, CacheStore};

/// Returns the cached result for `params`, or computes and caches it.
///
/// Compute errors are returned unchanged. Cache read and write-back
/// failures are logged and never reach the caller. Params that canonicalize
/// to nothing bypass the cache.
pub fn cache_anything<P, T, E, F>(
    store: &CacheStore,
    params: &P,
    ttl: Option<Duration>,
    compute: F,
) -> Result<T, E>
where
    P: Serialize + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T, E>,
{
    let Some(params) = canonical_params(params) else {
        return compute();
    };

    if let Some(hit) = try_load(store, &params) {
        return Ok(hit);
    }

    let value = compute()?;
    write_back(store, &params, &value, ttl);
    Ok(value)
}

/// Async variant of [`cache_anything`].
pub async fn cache_anything_async<P, T, E, F, Fut>(
    store: &CacheStore,
    params: &P,
    ttl: Option<Duration>,
    compute: F,
) -> Result<T, E>
where
    P: Serialize + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let Some(params) = canonical_params(params) else {
        return compute().await;
    };

    if let Some(hit) = try_load(store, &params) {
        return Ok(hit);
    }

    let value = compute().await?;
    write_back(store, &params, &value, ttl);
    Ok(value)
}

fn try_load<T: DeserializeOwned>(store: &CacheStore, params: &str) -> Option<T> {
    match store.load_json(params) {
        Ok(value) => {
            debug!("memo hit");
            Some(value)
        }
        Err(e) if e.is_miss() => None,
        Err(e) => {
            warn!(error = %e, "Cached result unusable, recomputing");
            None
        }
    }
}

fn write_back<T: Serialize>(store: &CacheStore, params: &str, value: &T, ttl: Option<Duration>) {
    if let Err(e) = store.set_json(params, value, ttl) {
        warn!(error = %e, "Failed to cache computed result");
    }
}
