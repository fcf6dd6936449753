// Benchmark server entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults on first run, applying PORT override)
// 3. Load the dataset (forward operator, sinogram, phantom)
// 4. Build the model registry (four posterior variants + exact solution)
// 5. Run the HTTP serving loop until terminated

use tomobench::bridge;
use tomobench::config;
use tomobench::ct;
use tomobench::data;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Benchmark server starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {}x{} image, {} angles, noise std {}",
        config.grid.size, config.grid.size, config.grid.num_angles, config.noise.std
    );

    // 3. Load the dataset
    info!("Loading dataset...");
    let dataset = data::load_dataset(&config).context("failed to load dataset")?;
    info!(
        "Loaded operator with {} entries, sinogram of {} values",
        dataset.operator.nnz(),
        dataset.sinogram.len()
    );

    // 4. Build the model registry
    let registry = Arc::new(ct::build_registry(dataset, &config.priors));
    info!("Registered models: {}", registry.names().join(", "));

    // 5. Run the HTTP serving loop
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid server address {}:{}",
                config.server.bind, config.server.port
            )
        })?;

    bridge::server::serve(addr, registry)
        .await
        .context("server loop failed")?;

    Ok(())
}

/// Initialize tracing to stderr, filtered by RUST_LOG when set.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tomobench=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {e}"))?;

    Ok(())
}
