//! Redis 命令行工具
//!
//! 用法：redis-utils <command> [args...] [--host] [--port] [--db] [--password]

mod cli;

use std::process::ExitCode;

use clap::Parser;
use common::config::{load_env_file, RedisConfig};
use common::errors::AppResult;
use common::telemetry::init_tracing;
use redis_utils::{create_redis_client, Command, Dispatcher};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // 优先加载 .env 文件，不覆盖已有环境变量
    let env_file = load_env_file();

    let cli = Cli::parse();

    // 初始化日志追踪（输出到 stderr）
    init_tracing(cli.log_format.parse().unwrap_or_default());
    env_file.log();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // 先校验命令参数，参数错误时不建立连接
    let command = Command::parse(&cli.command, &cli.args)?;

    let config = RedisConfig::from_env()?.with_overrides(cli.overrides());
    let store = create_redis_client(&config).await?;

    let mut dispatcher = Dispatcher::new(store, config.decode_responses);
    let mut stdout = std::io::stdout().lock();
    dispatcher.execute(&command, &mut stdout).await
}
