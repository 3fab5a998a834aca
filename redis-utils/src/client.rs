//! Redis connection factory.

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use common::config::RedisConfig;
use common::errors::{AppError, AppResult};

use crate::store::RedisStore;

/// Opens a connection described by `config` and checks it with `PING`.
///
/// The whole handshake runs under the configured connect timeout. Failures
/// are logged with the endpoint and returned as `AppError::RedisConnection`;
/// nothing is retried.
pub async fn create_redis_client(config: &RedisConfig) -> AppResult<RedisStore> {
    let limit = config.connect_timeout();
    let result = match tokio::time::timeout(limit, connect(config)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::RedisConnection(format!(
            "timed out after {}s",
            limit.as_secs()
        ))),
    };

    match &result {
        Ok(_) => tracing::debug!(
            host = %config.host,
            port = config.port,
            db = config.db,
            "Connected to Redis"
        ),
        Err(e) => tracing::error!(
            host = %config.host,
            port = config.port,
            db = config.db,
            error = %e,
            "Failed to connect to Redis"
        ),
    }
    result
}

async fn connect(config: &RedisConfig) -> AppResult<RedisStore> {
    let info = ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            password: config.password.clone(),
            ..Default::default()
        },
    };

    let client = redis::Client::open(info).map_err(connection_error)?;
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(connection_error)?;
    redis::cmd("PING")
        .query_async::<String>(&mut conn)
        .await
        .map_err(connection_error)?;

    Ok(RedisStore::new(conn))
}

fn connection_error(error: redis::RedisError) -> AppError {
    AppError::RedisConnection(error.to_string())
}
