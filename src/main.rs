use anyhow::Result;
use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;

use sudoku_arena::SudokuServer;

/// Multiplayer Sudoku session server.
#[derive(Debug, Parser)]
#[command(name = "sudoku_arena", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5555)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logger();
    let args = Args::parse();
    info!("Sudoku Arena starting...");

    let server = SudokuServer::bind(&args.host, args.port).await?;
    server
        .run(async {
            // Ctrl-c flips the accept loop into its shutdown path.
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received");
        })
        .await?;

    Ok(())
}

fn setup_logger() {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .init();
}
