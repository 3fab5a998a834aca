//! SQL 命令行工具
//!
//! 提供以下子命令：
//! - query：执行 SQL 查询
//! - list-tables：列出数据库中的表
//! - describe-table：查看表结构

mod cli;
mod handlers;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use common::config::load_env_file;
use common::telemetry::init_tracing;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // 优先加载 .env 文件，不覆盖已有环境变量
    let env_file = load_env_file();

    let cli = Cli::parse();

    // 初始化日志追踪（输出到 stderr）
    init_tracing(cli.log_format.parse().unwrap_or_default());
    env_file.log();

    let Some(command) = cli.command else {
        // 未指定子命令时打印帮助
        if let Err(e) = Cli::command().print_help() {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    let mut stdout = std::io::stdout().lock();
    match handlers::dispatch(command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
