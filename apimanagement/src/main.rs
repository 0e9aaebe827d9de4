use apimanagement::ApiManagementProvider;
use tfplug::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries the plugin handshake; logs go to stderr.
    let level = std::env::var("TF_LOG")
        .map(|l| l.to_ascii_lowercase())
        .ok()
        .filter(|l| matches!(l.as_str(), "trace" | "debug" | "info" | "warn" | "error"))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tfplug::serve(ApiManagementProvider::new(), ServerConfig::from_env()).await?;
    Ok(())
}
