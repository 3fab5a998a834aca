//! One-shot Redis operations.
//!
//! Each function opens its own connection from `config`, runs a single
//! command and drops the connection before returning.

use common::config::RedisConfig;
use common::errors::AppResult;

use crate::client::create_redis_client;
use crate::command::ListEnd;
use crate::store::{render, KvStore};

/// Value of `key`, or `None` if it does not exist.
pub async fn get_value(config: &RedisConfig, key: &str) -> AppResult<Option<String>> {
    let mut store = create_redis_client(config).await?;
    let value = store
        .get(key)
        .await
        .inspect_err(|e| tracing::error!(key, error = %e, "Failed to get value"))?;
    value
        .map(|bytes| render(&bytes, config.decode_responses))
        .transpose()
}

/// Sets `key`, optionally expiring after `expire_secs`.
pub async fn set_value(
    config: &RedisConfig,
    key: &str,
    value: &str,
    expire_secs: Option<u64>,
) -> AppResult<bool> {
    let mut store = create_redis_client(config).await?;
    store
        .set(key, value, expire_secs)
        .await
        .inspect_err(|e| tracing::error!(key, error = %e, "Failed to set value"))
}

/// Deletes `keys` and returns how many existed.
pub async fn delete_keys(config: &RedisConfig, keys: &[String]) -> AppResult<u64> {
    let mut store = create_redis_client(config).await?;
    store
        .del(keys)
        .await
        .inspect_err(|e| tracing::error!(?keys, error = %e, "Failed to delete keys"))
}

/// Keys matching a glob-style `pattern`.
pub async fn list_keys(config: &RedisConfig, pattern: &str) -> AppResult<Vec<String>> {
    let mut store = create_redis_client(config).await?;
    let keys = store
        .keys(pattern)
        .await
        .inspect_err(|e| tracing::error!(pattern, error = %e, "Failed to list keys"))?;
    render_all(keys, config.decode_responses)
}

/// All field/value pairs of the hash at `key`.
pub async fn get_hash(config: &RedisConfig, key: &str) -> AppResult<Vec<(String, String)>> {
    let mut store = create_redis_client(config).await?;
    let pairs = store
        .hgetall(key)
        .await
        .inspect_err(|e| tracing::error!(key, error = %e, "Failed to get hash"))?;
    pairs
        .into_iter()
        .map(|(field, value)| {
            Ok((
                render(&field, config.decode_responses)?,
                render(&value, config.decode_responses)?,
            ))
        })
        .collect()
}

/// One field of the hash at `key`.
pub async fn get_hash_field(
    config: &RedisConfig,
    key: &str,
    field: &str,
) -> AppResult<Option<String>> {
    let mut store = create_redis_client(config).await?;
    let value = store
        .hget(key, field)
        .await
        .inspect_err(|e| tracing::error!(key, field, error = %e, "Failed to get hash field"))?;
    value
        .map(|bytes| render(&bytes, config.decode_responses))
        .transpose()
}

/// Sets one hash field; `true` when the field is new.
pub async fn set_hash(config: &RedisConfig, key: &str, field: &str, value: &str) -> AppResult<bool> {
    let mut store = create_redis_client(config).await?;
    store
        .hset(key, field, value)
        .await
        .inspect_err(|e| tracing::error!(key, field, error = %e, "Failed to set hash field"))
}

/// Elements `start..=stop` of the list at `key`; negative indices count from the end.
pub async fn get_list(
    config: &RedisConfig,
    key: &str,
    start: isize,
    stop: isize,
) -> AppResult<Vec<String>> {
    let mut store = create_redis_client(config).await?;
    let values = store
        .lrange(key, start, stop)
        .await
        .inspect_err(|e| tracing::error!(key, error = %e, "Failed to get list"))?;
    render_all(values, config.decode_responses)
}

/// Pushes `values` onto the list at `key` and returns the new length.
pub async fn push_to_list(
    config: &RedisConfig,
    key: &str,
    values: &[String],
    end: ListEnd,
) -> AppResult<u64> {
    let mut store = create_redis_client(config).await?;
    store
        .push(key, values, end)
        .await
        .inspect_err(|e| tracing::error!(key, error = %e, "Failed to push to list"))
}

fn render_all(values: Vec<Vec<u8>>, decode_responses: bool) -> AppResult<Vec<String>> {
    values
        .iter()
        .map(|bytes| render(bytes, decode_responses))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::errors::AppError;

    fn unreachable() -> RedisConfig {
        RedisConfig {
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout_secs: 2,
            ..RedisConfig::default()
        }
    }

    #[tokio::test]
    async fn test_operations_report_connection_errors() {
        let config = unreachable();
        assert!(matches!(
            get_value(&config, "k").await,
            Err(AppError::RedisConnection(_))
        ));
        assert!(matches!(
            push_to_list(&config, "l", &["a".to_string()], ListEnd::Right).await,
            Err(AppError::RedisConnection(_))
        ));
    }

    #[test]
    fn test_render_all_strict() {
        let values = vec![b"a".to_vec(), vec![0xff]];
        assert!(render_all(values.clone(), true).is_err());
        assert_eq!(render_all(values, false).unwrap(), vec!["a", "\u{fffd}"]);
    }
}
