use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use syncwatch::config::{ClientConfig, FolderFilter, WatchConfig};
use syncwatch::syncthing::client::SyncthingClient;
use syncwatch::watcher::service::WatcherService;
use syncwatch::{SyncWatchError, SyncWatchResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Watches Syncthing folders and requests targeted rescans on change.
#[derive(Debug, Parser)]
#[command(name = "syncwatch", version)]
struct Args {
    /// Logging level, 1 (warnings) to 4 (trace). `RUST_LOG` takes precedence.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=4))]
    verbosity: u8,

    /// Syncthing GUI address; `http://` is assumed without a scheme.
    #[arg(long, env = "SYNCWATCH_TARGET", default_value = "127.0.0.1:8384")]
    target: String,

    #[arg(long, env = "SYNCWATCH_API_KEY")]
    api: Option<String>,

    #[arg(long, env = "SYNCWATCH_USER")]
    user: Option<String>,

    #[arg(long, env = "SYNCWATCH_PASSWORD")]
    password: Option<String>,

    /// File holding a CSRF token, last line wins.
    #[arg(long)]
    csrf: Option<PathBuf>,

    /// Read the API key from stdin.
    #[arg(long, conflicts_with = "password_stdin")]
    api_stdin: bool,

    /// Read the password from stdin.
    #[arg(long)]
    password_stdin: bool,

    /// Comma-separated folder ids to watch (all by default).
    #[arg(long, value_delimiter = ',')]
    folders: Vec<String>,

    /// Comma-separated folder ids not to watch.
    #[arg(long, value_delimiter = ',', conflicts_with = "folders")]
    skip_folders: Vec<String>,

    /// Seconds Syncthing's own periodic rescan is delayed; 0 disables.
    #[arg(long, default_value_t = 3600)]
    delay_scan: u64,

    /// File changes in one directory before the whole directory is scanned.
    #[arg(long, default_value_t = 256)]
    dir_vs_files: usize,

    /// Tracked changes before falling back to a full folder scan.
    #[arg(long, default_value_t = 5000)]
    max_files: usize,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn read_stdin_line() -> SyncWatchResult<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> SyncWatchResult<()> {
    let args = Args::parse();
    init_tracing(args.verbosity);

    let mut client_config = ClientConfig::default().with_target(&args.target);
    client_config.api_key = args.api;
    client_config.user = args.user;
    client_config.password = args.password;
    if args.api_stdin {
        client_config.api_key = Some(read_stdin_line()?);
    }
    if args.password_stdin {
        client_config.password = Some(read_stdin_line()?);
    }
    if let Some(csrf) = &args.csrf {
        client_config = client_config.with_csrf_file(csrf)?;
    }
    let retry_interval = client_config.config_sync_timeout;

    let watch_config = WatchConfig {
        dir_vs_files: args.dir_vs_files,
        max_tracked: args.max_files,
        delay_scan: Some(Duration::from_secs(args.delay_scan)).filter(|d| !d.is_zero()),
        ..WatchConfig::default()
    };
    let filter = FolderFilter::from_lists(args.folders, args.skip_folders)?;

    let client = SyncthingClient::new(client_config)?.with_delay_scan(watch_config.delay_scan);
    client.wait_until_ready().await?;

    let mut service = WatcherService::create(Arc::new(client), watch_config, filter, retry_interval);

    let shutdown = service.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("exiting");
            shutdown.cancel();
        }
    });

    let report = match service.refresh().await {
        Ok(report) => report,
        Err(SyncWatchError::Cancelled) => return service.shutdown().await,
        Err(e) => {
            service.shutdown().await?;
            return Err(e);
        }
    };
    if report.started.is_empty() {
        error!(failed = ?report.failed, "no folders to be watched");
        return Err(SyncWatchError::Config("no folders to be watched".to_string()));
    }

    service.run().await
}
