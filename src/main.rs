use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use confkeeper::{ConfigStore, MemoryCluster, Result, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Push one configuration key's value, read from a file, into the store.
///
/// Exit code 0 on success, 1 on any failure (argument, I/O or write error),
/// with the error printed to stderr.
#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    init_observability();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 2 {
        eprintln!("usage: confkeeper $configKey $configFile");
        return ExitCode::from(1);
    }

    match push_value(&args[0], Path::new(&args[1])).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("confkeeper: {e}");
            ExitCode::from(1)
        }
    }
}

async fn push_value(key: &str, file: &Path) -> Result<()> {
    let settings = Settings::load(None)?;
    let value = tokio::fs::read_to_string(file).await?;

    let cluster = MemoryCluster::new();
    cluster.ensure(&settings.store.path)?;

    let store = ConfigStore::open(Arc::new(cluster.connector()), &settings).await?;
    store.set(key, &value).await?;
    info!(%key, bytes = value.len(), "configuration value stored");
    store.shutdown().await;
    Ok(())
}

fn init_observability() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
