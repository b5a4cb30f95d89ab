mod cli;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli::run() {
        cli::RunOutcome::Serve(config) => {
            if let Err(err) = remind::serve(config).await {
                tracing::error!("server error: {err}");
                std::process::exit(1);
            }
        }
        cli::RunOutcome::Agent(config) => {
            if let Err(err) = remind::agent::run(config).await {
                tracing::error!("agent error: {err}");
                std::process::exit(1);
            }
        }
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    }
}
