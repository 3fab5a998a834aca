//! Command-line definition.

use clap::Parser;

use common::config::RedisOverrides;

/// Run one command against Redis.
#[derive(Debug, Parser)]
#[command(name = "redis-utils", version, about, allow_negative_numbers = true)]
pub struct Cli {
    /// Command to execute: get, set, del, keys, hget, hgetall, hset, lrange, lpush, rpush
    pub command: String,

    /// Command arguments
    pub args: Vec<String>,

    /// Redis host
    #[arg(long)]
    pub host: Option<String>,

    /// Redis port
    #[arg(long)]
    pub port: Option<u16>,

    /// Redis database index
    #[arg(long)]
    pub db: Option<i64>,

    /// Redis password
    #[arg(long)]
    pub password: Option<String>,

    /// Log output format: plain (default) or json.
    #[arg(long, default_value = "plain", value_parser = ["plain", "json"])]
    pub log_format: String,
}

impl Cli {
    /// Connection flags given on the command line.
    pub fn overrides(&self) -> RedisOverrides {
        RedisOverrides {
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            password: self.password.clone(),
        }
    }
}
