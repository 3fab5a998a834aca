//! Redis utility library.
//!
//! - `client`: ping-validated connections
//! - `command`: command-line commands and their arity rules
//! - `dispatcher`: runs a command and prints the result lines
//! - `ops`: one-shot operations that open and release their own connection
//! - `store`: the key-value store seam and its Redis implementation

pub mod client;
pub mod command;
pub mod dispatcher;
pub mod ops;
pub mod store;

pub use client::create_redis_client;
pub use command::{Command, ListEnd};
pub use dispatcher::Dispatcher;
pub use store::{KvStore, RedisStore};
