//! Commands accepted by the Redis tool.
//!
//! Arity and argument types are checked here, before any connection exists,
//! so a usage error never touches the store.

use common::errors::{AppError, AppResult};

/// Which end of a list a push goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Left,
    Right,
}

/// A validated Redis command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        /// Expiry in seconds, from `EX <seconds>`.
        expire_secs: Option<u64>,
    },
    Del {
        keys: Vec<String>,
    },
    Keys {
        pattern: String,
    },
    HGet {
        key: String,
        field: String,
    },
    HGetAll {
        key: String,
    },
    HSet {
        key: String,
        field: String,
        value: String,
    },
    LRange {
        key: String,
        start: isize,
        stop: isize,
    },
    Push {
        key: String,
        values: Vec<String>,
        end: ListEnd,
    },
}

impl Command {
    /// Builds a command from its name and positional arguments.
    ///
    /// # Errors
    /// Returns `AppError::Usage` for an unknown name, a wrong argument count
    /// or an argument that does not parse.
    pub fn parse(name: &str, args: &[String]) -> AppResult<Self> {
        match (name, args) {
            ("get", [key]) => Ok(Command::Get { key: key.clone() }),
            ("get", _) => usage("GET command requires exactly one key"),

            ("set", [key, value]) => Ok(Command::Set {
                key: key.clone(),
                value: value.clone(),
                expire_secs: None,
            }),
            ("set", [key, value, option, seconds]) => {
                if !option.eq_ignore_ascii_case("EX") {
                    return usage(&format!("Unsupported SET option: {}", option));
                }
                let expire_secs = seconds
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| {
                        AppError::Usage(format!("Invalid expiration time: {}", seconds))
                    })?;
                Ok(Command::Set {
                    key: key.clone(),
                    value: value.clone(),
                    expire_secs: Some(expire_secs),
                })
            }
            ("set", _) => usage("SET command requires key and value, optionally followed by EX <seconds>"),

            ("del", []) => usage("DEL command requires at least one key"),
            ("del", keys) => Ok(Command::Del {
                keys: keys.to_vec(),
            }),

            ("keys", [pattern]) => Ok(Command::Keys {
                pattern: pattern.clone(),
            }),
            ("keys", _) => usage("KEYS command requires exactly one pattern"),

            ("hget", [key, field]) => Ok(Command::HGet {
                key: key.clone(),
                field: field.clone(),
            }),
            ("hget", _) => usage("HGET command requires exactly key and field"),

            ("hgetall", [key]) => Ok(Command::HGetAll { key: key.clone() }),
            ("hgetall", _) => usage("HGETALL command requires exactly one key"),

            ("hset", [key, field, value]) => Ok(Command::HSet {
                key: key.clone(),
                field: field.clone(),
                value: value.clone(),
            }),
            ("hset", _) => usage("HSET command requires exactly key, field and value"),

            ("lrange", [key, rest @ ..]) if rest.len() <= 2 => {
                let start = match rest.first() {
                    Some(raw) => index(raw, "start")?,
                    None => 0,
                };
                let stop = match rest.get(1) {
                    Some(raw) => index(raw, "end")?,
                    None => -1,
                };
                Ok(Command::LRange {
                    key: key.clone(),
                    start,
                    stop,
                })
            }
            ("lrange", _) => usage("LRANGE command requires key and optionally start and stop"),

            ("lpush" | "rpush", [key, values @ ..]) if !values.is_empty() => Ok(Command::Push {
                key: key.clone(),
                values: values.to_vec(),
                end: if name == "lpush" {
                    ListEnd::Left
                } else {
                    ListEnd::Right
                },
            }),
            ("lpush" | "rpush", _) => usage(&format!(
                "{} command requires key and at least one value",
                name.to_uppercase()
            )),

            (other, _) => usage(&format!("Unsupported command: {}", other)),
        }
    }

    /// Command name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "get",
            Command::Set { .. } => "set",
            Command::Del { .. } => "del",
            Command::Keys { .. } => "keys",
            Command::HGet { .. } => "hget",
            Command::HGetAll { .. } => "hgetall",
            Command::HSet { .. } => "hset",
            Command::LRange { .. } => "lrange",
            Command::Push {
                end: ListEnd::Left, ..
            } => "lpush",
            Command::Push {
                end: ListEnd::Right,
                ..
            } => "rpush",
        }
    }
}

fn usage<T>(message: &str) -> AppResult<T> {
    Err(AppError::Usage(message.to_string()))
}

fn index(raw: &str, which: &str) -> AppResult<isize> {
    raw.parse()
        .map_err(|_| AppError::Usage(format!("Invalid {} index: {}", which, raw)))
}
