//! Command dispatcher.
//!
//! Executes one [`Command`] against a [`KvStore`] and writes the
//! human-readable result lines.

use std::io::Write;

use common::errors::AppResult;

use crate::command::Command;
use crate::store::{render, KvStore};

/// Runs commands against a store.
pub struct Dispatcher<S> {
    store: S,
    decode_responses: bool,
}

impl<S: KvStore> Dispatcher<S> {
    pub fn new(store: S, decode_responses: bool) -> Self {
        Self {
            store,
            decode_responses,
        }
    }

    /// Parses `name`/`args` and executes the command.
    ///
    /// Usage errors are returned before the store is touched.
    pub async fn run<W: Write>(&mut self, name: &str, args: &[String], out: &mut W) -> AppResult<()> {
        let command = Command::parse(name, args)?;
        self.execute(&command, out).await
    }

    /// Executes a parsed command, logging failures with the command name.
    pub async fn execute<W: Write>(&mut self, command: &Command, out: &mut W) -> AppResult<()> {
        let result = self.execute_inner(command, out).await;
        if let Err(e) = &result {
            tracing::error!(command = command.name(), error = %e, "Failed to execute command");
        }
        result
    }

    /// Releases the store.
    pub fn into_inner(self) -> S {
        self.store
    }

    async fn execute_inner<W: Write>(&mut self, command: &Command, out: &mut W) -> AppResult<()> {
        match command {
            Command::Get { key } => {
                let value = self.store.get(key).await?;
                self.write_optional(out, value.as_deref())?;
            }
            Command::Set {
                key,
                value,
                expire_secs,
            } => {
                let ok = self.store.set(key, value, *expire_secs).await?;
                writeln!(out, "{}", if ok { "OK" } else { "Failed" })?;
            }
            Command::Del { keys } => {
                let deleted = self.store.del(keys).await?;
                writeln!(out, "Deleted {} key(s)", deleted)?;
            }
            Command::Keys { pattern } => {
                for key in self.store.keys(pattern).await? {
                    writeln!(out, "{}", self.text(&key)?)?;
                }
            }
            Command::HGet { key, field } => {
                let value = self.store.hget(key, field).await?;
                self.write_optional(out, value.as_deref())?;
            }
            Command::HGetAll { key } => {
                let pairs = self.store.hgetall(key).await?;
                if pairs.is_empty() {
                    writeln!(out, "(empty hash)")?;
                }
                for (field, value) in pairs {
                    writeln!(out, "{}: {}", self.text(&field)?, self.text(&value)?)?;
                }
            }
            Command::HSet { key, field, value } => {
                let created = self.store.hset(key, field, value).await?;
                let verb = if created { "Created" } else { "Updated" };
                writeln!(out, "{} field '{}'", verb, field)?;
            }
            Command::LRange { key, start, stop } => {
                let values = self.store.lrange(key, *start, *stop).await?;
                self.write_lrange(out, *start, &values)?;
            }
            Command::Push { key, values, end } => {
                let length = self.store.push(key, values, *end).await?;
                writeln!(out, "List length after push: {}", length)?;
            }
        }
        Ok(())
    }

    // Widened so a start near isize::MAX cannot overflow.
    fn write_lrange<W: Write>(&self, out: &mut W, start: isize, values: &[Vec<u8>]) -> AppResult<()> {
        for (offset, value) in values.iter().enumerate() {
            let index = start as i128 + offset as i128;
            writeln!(out, "{}: {}", index, self.text(value)?)?;
        }
        Ok(())
    }

    fn write_optional<W: Write>(&self, out: &mut W, value: Option<&[u8]>) -> AppResult<()> {
        match value {
            Some(bytes) => writeln!(out, "{}", self.text(bytes)?)?,
            None => writeln!(out, "(nil)")?,
        }
        Ok(())
    }

    fn text(&self, bytes: &[u8]) -> AppResult<String> {
        render(bytes, self.decode_responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::errors::AppError;

    use crate::store::memory::MemoryStore;

    async fn run(dispatcher: &mut Dispatcher<MemoryStore>, line: &[&str]) -> AppResult<String> {
        let args: Vec<String> = line[1..].iter().map(|a| a.to_string()).collect();
        let mut out = Vec::new();
        dispatcher.run(line[0], &args, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn dispatcher() -> Dispatcher<MemoryStore> {
        Dispatcher::new(MemoryStore::default(), true)
    }

    #[tokio::test]
    async fn test_get_missing_key_prints_nil() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, &["get", "missing"]).await.unwrap(), "(nil)\n");
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, &["set", "greeting", "hello"]).await.unwrap(), "OK\n");
        assert_eq!(run(&mut d, &["get", "greeting"]).await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_set_with_expiry() {
        let mut d = dispatcher();
        run(&mut d, &["set", "session", "abc", "EX", "10"]).await.unwrap();
        assert_eq!(d.into_inner().expiry.get("session"), Some(&10));
    }

    #[tokio::test]
    async fn test_del_counts_removed_keys() {
        let mut d = dispatcher();
        run(&mut d, &["set", "a", "1"]).await.unwrap();
        run(&mut d, &["rpush", "b", "x"]).await.unwrap();
        assert_eq!(
            run(&mut d, &["del", "a", "b", "c"]).await.unwrap(),
            "Deleted 2 key(s)\n"
        );
    }

    #[tokio::test]
    async fn test_keys_lists_matches() {
        let mut d = dispatcher();
        run(&mut d, &["set", "user:1", "a"]).await.unwrap();
        run(&mut d, &["set", "user:2", "b"]).await.unwrap();
        run(&mut d, &["set", "other", "c"]).await.unwrap();
        assert_eq!(run(&mut d, &["keys", "user:*"]).await.unwrap(), "user:1\nuser:2\n");
    }

    #[tokio::test]
    async fn test_hset_created_then_updated() {
        let mut d = dispatcher();
        assert_eq!(
            run(&mut d, &["hset", "h", "f", "1"]).await.unwrap(),
            "Created field 'f'\n"
        );
        assert_eq!(
            run(&mut d, &["hset", "h", "f", "2"]).await.unwrap(),
            "Updated field 'f'\n"
        );
        assert_eq!(run(&mut d, &["hget", "h", "f"]).await.unwrap(), "2\n");
        assert_eq!(run(&mut d, &["hget", "h", "nope"]).await.unwrap(), "(nil)\n");
    }

    #[tokio::test]
    async fn test_hgetall() {
        let mut d = dispatcher();
        assert_eq!(run(&mut d, &["hgetall", "h"]).await.unwrap(), "(empty hash)\n");
        run(&mut d, &["hset", "h", "name", "alice"]).await.unwrap();
        run(&mut d, &["hset", "h", "age", "30"]).await.unwrap();
        assert_eq!(
            run(&mut d, &["hgetall", "h"]).await.unwrap(),
            "name: alice\nage: 30\n"
        );
    }

    #[tokio::test]
    async fn test_lrange_default_bounds() {
        let mut d = dispatcher();
        assert_eq!(
            run(&mut d, &["rpush", "l", "a", "b", "c"]).await.unwrap(),
            "List length after push: 3\n"
        );
        assert_eq!(run(&mut d, &["lrange", "l"]).await.unwrap(), "0: a\n1: b\n2: c\n");
    }

    #[tokio::test]
    async fn test_lrange_indices_start_at_start() {
        let mut d = dispatcher();
        run(&mut d, &["rpush", "l", "a", "b", "c"]).await.unwrap();
        assert_eq!(run(&mut d, &["lrange", "l", "1", "2"]).await.unwrap(), "1: b\n2: c\n");
    }

    #[tokio::test]
    async fn test_lrange_start_at_max_index() {
        let mut d = dispatcher();
        run(&mut d, &["rpush", "l", "a"]).await.unwrap();
        let max = isize::MAX.to_string();
        assert_eq!(run(&mut d, &["lrange", "l", max.as_str()]).await.unwrap(), "");
    }

    #[test]
    fn test_lrange_index_does_not_overflow() {
        let mut out = Vec::new();
        dispatcher()
            .write_lrange(&mut out, isize::MAX, &[b"a".to_vec(), b"b".to_vec()])
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{}: a\n{}: b\n", isize::MAX, isize::MAX as i128 + 1)
        );
    }

    #[tokio::test]
    async fn test_lpush_then_rpush_order() {
        let mut d = dispatcher();
        run(&mut d, &["lpush", "l", "a", "b"]).await.unwrap();
        run(&mut d, &["rpush", "l", "c", "d"]).await.unwrap();
        assert_eq!(
            run(&mut d, &["lrange", "l"]).await.unwrap(),
            "0: b\n1: a\n2: c\n3: d\n"
        );
    }

    #[tokio::test]
    async fn test_usage_errors_leave_store_untouched() {
        let mut d = dispatcher();
        run(&mut d, &["set", "k", "v"]).await.unwrap();
        run(&mut d, &["hset", "h", "f", "v"]).await.unwrap();
        run(&mut d, &["rpush", "l", "a"]).await.unwrap();
        let before = d.store.clone();

        let invalid: &[&[&str]] = &[
            &["get"],
            &["get", "k", "extra"],
            &["set", "k"],
            &["set", "k", "v2", "EX"],
            &["set", "k", "v2", "EX", "never"],
            &["del"],
            &["keys"],
            &["hget", "h"],
            &["hgetall"],
            &["hset", "h", "f"],
            &["lrange"],
            &["lrange", "l", "0", "-1", "9"],
            &["lpush", "l"],
            &["rpush", "l"],
            &["flushdb"],
        ];
        for line in invalid {
            let mut out = Vec::new();
            let args: Vec<String> = line[1..].iter().map(|a| a.to_string()).collect();
            let err = d.run(line[0], &args, &mut out).await.unwrap_err();
            assert!(matches!(err, AppError::Usage(_)), "{:?}", line);
            assert!(out.is_empty());
        }

        assert_eq!(d.store, before);
    }

    #[tokio::test]
    async fn test_non_utf8_value_when_decoding() {
        let mut store = MemoryStore::default();
        store.strings.insert("bin".into(), vec![0xff, 0x00]);

        let mut strict = Dispatcher::new(store.clone(), true);
        assert!(matches!(
            run(&mut strict, &["get", "bin"]).await,
            Err(AppError::RedisOperation(_))
        ));

        let mut lossy = Dispatcher::new(store, false);
        assert_eq!(run(&mut lossy, &["get", "bin"]).await.unwrap(), "\u{fffd}\0\n");
    }
}
