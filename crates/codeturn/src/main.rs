use codeturn::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CodeturnError> {
    let config = ServerConfig::load()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        levels = %config.levels_path.display(),
        interpreter = %config.eval.interpreter,
        "starting codeturn"
    );

    let evaluator = PythonEvaluator::new(config.eval.eval_config());
    let server = CodeturnServer::builder()
        .config(config)
        .build(evaluator)
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("ctrl-c received");
        })
        .await
}
