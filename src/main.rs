use clap::Parser;
use tokio::net::TcpListener;
use wsecho::{server, Options};

/// Minimal WebSocket echo server
///
/// Listens on 0.0.0.0:8080. Plain HTTP GETs get a short HTML page; WebSocket clients
/// get every text message they send echoed back.
#[derive(Parser)]
#[command(author, version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: log::Level,

    /// Drop connections that send a frame with a larger payload, in bytes
    #[arg(long)]
    max_payload_read: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    simple_logger::init_with_level(cli.log_level)?;

    let mut options = Options::default();
    if let Some(size) = cli.max_payload_read {
        options = options.with_max_payload_read(size);
    }

    let listener = TcpListener::bind(server::DEFAULT_ADDR).await?;
    server::serve(listener, options).await;

    Ok(())
}
