use anyhow::Result;
use axum::Router;
use clap::Parser;
use search_core::search::Searcher;
use search_core::tokenizer::Analyzer;
use std::io;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use server::{build_app, run_shell};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Read queries from stdin instead of serving HTTP; an empty line ends the session
    #[arg(long, default_value_t = false)]
    interactive: bool,
    /// Disable English stemming; must match how the index was built
    #[arg(long, default_value_t = false)]
    no_stem: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let args = Args::parse();
    let analyzer = Analyzer { stem: !args.no_stem, ..Analyzer::default() };

    if args.interactive {
        let searcher = Searcher::open(&args.index, Box::new(analyzer))?;
        let stdin = io::stdin();
        return run_shell(&searcher, stdin.lock(), io::stdout());
    }

    let app: Router = build_app(&args.index, analyzer)?;
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
