/// Get-or-compute against a write-once memo such as [`DetailCache`].
///
/// If the key is present the cached value is returned. Otherwise the block is
/// awaited, and a successful value is stored before being returned. Errors are
/// propagated with `?` and nothing is cached for them.
///
/// # Arguments
/// * `$cache`: A cache exposing async `get(&key)` and `put(key, value)`.
/// * `$key`: The key to look up and store under.
/// * `$block`: A future producing `AppResult<T>` on a miss.
///
/// # Example
/// ```rust,ignore
/// let movie = memoized!(cache, movie_id, async {
///     api.movie_details(&token, &movie_id).await
/// });
/// ```
///
/// [`DetailCache`]: crate::services::detail_cache::DetailCache
#[macro_export]
macro_rules! memoized {
    ($cache:expr, $key:expr, $block:expr) => {{
        if let Some(cached) = $cache.get(&$key).await {
            tracing::trace!(key = %$key, "Memo hit");
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.put($key.clone(), value.clone()).await;
            Ok(value)
        }
    }};
}
