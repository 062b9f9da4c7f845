use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use ursrv_config::{RuntimeConfig, ServerConfig, StorageBackend};

/// Usage reporting server
#[derive(Parser)]
#[command(name = "ursrv")]
#[command(version)]
#[command(about = "Collects daily usage reports and serves dashboard tables", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Directory for stored reports (filesystem backend only)
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    apply_cli_overrides(&mut config, &cli)?;
    config.validate().context("Invalid configuration")?;

    // run_with_config calls this again; installation is idempotent
    ursrv::init_tracing(&config);

    display_startup_info(&config);

    ursrv::run_with_config(config).await
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) -> Result<()> {
    if let Some(port) = cli.port {
        let server = config.server.get_or_insert_with(ServerConfig::default);
        server.listen_addr = format!("0.0.0.0:{}", port);
    }

    if let Some(dir) = &cli.data_dir {
        if config.storage.backend != StorageBackend::Fs {
            anyhow::bail!(
                "--data-dir flag only works with filesystem backend, but backend is '{}'.\n\
                Either remove --data-dir flag or set backend to 'fs' in config file.",
                config.storage.backend
            );
        }

        let fs_config = config.storage.fs.get_or_insert_with(Default::default);
        fs_config.path = dir.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        let server = config.server.get_or_insert_with(ServerConfig::default);
        server.log_level = level.clone();
    }

    Ok(())
}

fn display_startup_info(config: &RuntimeConfig) {
    use tracing::info;

    let Some(server) = config.server.as_ref() else {
        return;
    };

    info!("╭─────────────────────────────────────────────────");
    info!("│ ursrv v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Listen address: http://{}", server.listen_addr);
    info!("│ Storage backend: {}", config.storage.backend);

    match config.storage.backend {
        StorageBackend::Fs => {
            if let Some(fs) = &config.storage.fs {
                info!("│ Data directory: {}", fs.path);
            }
        }
        StorageBackend::S3 => {
            if let Some(s3) = &config.storage.s3 {
                info!("│ S3 bucket: {}", s3.bucket);
                info!("│ S3 region: {}", s3.region);
            }
        }
    }

    info!("│ Log level: {}", server.log_level);
    info!("│ Cache TTL: {}s", config.cache.ttl_secs);
    info!("│ Debug payload logging: {}", server.debug);
    info!("╰─────────────────────────────────────────────────");
}
