//! Key-value store seam.
//!
//! [`KvStore`] covers the commands the tool supports. Values come back as raw
//! bytes; [`render`] turns them into text according to `decode_responses`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, Value};

use common::errors::{AppError, AppResult};

use crate::command::ListEnd;

/// Operations of the key-value store.
#[async_trait]
pub trait KvStore: Send {
    async fn get(&mut self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Returns whether the server acknowledged the write.
    async fn set(&mut self, key: &str, value: &str, expire_secs: Option<u64>) -> AppResult<bool>;

    /// Returns the number of keys removed.
    async fn del(&mut self, keys: &[String]) -> AppResult<u64>;

    async fn keys(&mut self, pattern: &str) -> AppResult<Vec<Vec<u8>>>;

    async fn hget(&mut self, key: &str, field: &str) -> AppResult<Option<Vec<u8>>>;

    /// Field/value pairs in server order.
    async fn hgetall(&mut self, key: &str) -> AppResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Returns `true` when the field did not exist before.
    async fn hset(&mut self, key: &str, field: &str, value: &str) -> AppResult<bool>;

    async fn lrange(&mut self, key: &str, start: isize, stop: isize) -> AppResult<Vec<Vec<u8>>>;

    /// Returns the list length after the push.
    async fn push(&mut self, key: &str, values: &[String], end: ListEnd) -> AppResult<u64>;
}

/// Renders a stored value as text.
///
/// With `decode_responses` a value that is not UTF-8 is an error; without it
/// invalid sequences are replaced.
pub fn render(bytes: &[u8], decode_responses: bool) -> AppResult<String> {
    if decode_responses {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| AppError::RedisOperation("response is not valid UTF-8".into()))
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// [`KvStore`] over one multiplexed Redis connection.
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

fn operation_error(error: RedisError) -> AppError {
    AppError::RedisOperation(error.to_string())
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&mut self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.conn.get(key).await.map_err(operation_error)
    }

    async fn set(&mut self, key: &str, value: &str, expire_secs: Option<u64>) -> AppResult<bool> {
        let reply: Value = match expire_secs {
            Some(seconds) => self.conn.set_ex(key, value, seconds).await,
            None => self.conn.set(key, value).await,
        }
        .map_err(operation_error)?;
        Ok(match reply {
            Value::Okay => true,
            Value::SimpleString(status) => status == "OK",
            _ => false,
        })
    }

    async fn del(&mut self, keys: &[String]) -> AppResult<u64> {
        self.conn.del(keys.to_vec()).await.map_err(operation_error)
    }

    async fn keys(&mut self, pattern: &str) -> AppResult<Vec<Vec<u8>>> {
        self.conn.keys(pattern).await.map_err(operation_error)
    }

    async fn hget(&mut self, key: &str, field: &str) -> AppResult<Option<Vec<u8>>> {
        self.conn.hget(key, field).await.map_err(operation_error)
    }

    async fn hgetall(&mut self, key: &str) -> AppResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.conn.hgetall(key).await.map_err(operation_error)
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> AppResult<bool> {
        let created: i64 = self
            .conn
            .hset(key, field, value)
            .await
            .map_err(operation_error)?;
        Ok(created == 1)
    }

    async fn lrange(&mut self, key: &str, start: isize, stop: isize) -> AppResult<Vec<Vec<u8>>> {
        self.conn
            .lrange(key, start, stop)
            .await
            .map_err(operation_error)
    }

    async fn push(&mut self, key: &str, values: &[String], end: ListEnd) -> AppResult<u64> {
        let length: u64 = match end {
            ListEnd::Left => self.conn.lpush(key, values.to_vec()).await,
            ListEnd::Right => self.conn.rpush(key, values.to_vec()).await,
        }
        .map_err(operation_error)?;
        Ok(length)
    }
}
