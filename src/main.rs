use chat_search::{run, Cli};
use clap::Parser;
use std::io::{self, IsTerminal};

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    // 只探测一次，后续解析会话时决定能否交互
    let has_tty = io::stdin().is_terminal();

    match run(cli, has_tty) {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            let response = e.to_response();
            match serde_json::to_string_pretty(&response) {
                Ok(output) => eprintln!("{}", output),
                Err(_) => eprintln!("{}", e),
            }
            std::process::exit(e.exit_code());
        }
    }
}
