pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod resolver;
pub mod rpc;
pub mod search;
pub mod types;
pub mod ui;
pub mod utils;

use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::net::TcpStream;

use config::Config;
use error::Result;
use rpc::{CancelToken, JsonRpcClient};
use search::{SearchArgs, SearchCommand};
use types::SearchSummary;
use ui::JsonLinesUi;

#[derive(Parser, Debug)]
#[command(name = "chat-search", version)]
#[command(about = "Search message history within a chat conversation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Run without an authenticated networked session
    #[arg(long, global = true)]
    pub standalone: bool,

    /// Log progress to stderr (honours RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all logs
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search via regex within a conversation
    Search(SearchArgs),
}

/// 执行命令；`has_tty` 为启动时探测的 stdin 是否为终端
pub fn run(cli: Cli, has_tty: bool) -> Result<SearchSummary> {
    run_with_config(cli, Config::from_env()?, has_tty)
}

/// 使用给定配置执行；`--standalone` 覆盖配置
pub fn run_with_config(cli: Cli, mut config: Config, has_tty: bool) -> Result<SearchSummary> {
    if cli.standalone {
        config.standalone = true;
    }

    match cli.command {
        Commands::Search(args) => {
            // 参数校验和闸门都在建立连接之前
            let command = SearchCommand::parse_argv(&args, has_tty)?;
            let state = command.check_gate(config.mode())?;

            let stream = TcpStream::connect(&config.rpc_addr)?;
            if !config.rpc_timeout.is_zero() {
                stream.set_read_timeout(Some(config.rpc_timeout))?;
            }
            tracing::debug!(addr = %config.rpc_addr, "rpc_connected");

            let reader = BufReader::new(stream.try_clone()?);
            let cancel = CancelToken::new();
            let mut client = JsonRpcClient::with_cancel(reader, stream, cancel.clone());

            command.execute(state, &mut client, Box::new(JsonLinesUi::stdout()), &cancel)
        }
    }
}
