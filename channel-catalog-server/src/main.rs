//! channel-catalog-server: keeps a channel catalog in sync with a tuner backend.
//!
//! Periodically pulls the service list from Mirakurun or EDCB, resolves
//! channel numbers and stores the result in SQLite, and serves the catalog
//! over a small HTTP API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use channel_catalog::{EpgService, NumberingTables};
use clap::Parser;
use log::{error, info};

mod catalog;
mod database;
mod jikkyo;
mod logging;
mod scheduler;
mod source;
mod web;

use catalog::ChannelUpdater;
use jikkyo::{HttpStatusProvider, StatusProvider};
use scheduler::{UpdateScheduler, UpdateSchedulerConfig};
use source::{BackendKind, EdcbSettingDirectory, EdcbSource, MirakurunSource, ServiceSource};

const DEFAULT_CONFIG_FILE: &str = "channel-catalog.toml";
const DEFAULT_DATABASE: &str = "channel-catalog.db";
const DEFAULT_MIRAKURUN_URL: &str = "http://127.0.0.1:40772";
const DEFAULT_WEB_LISTEN: &str = "0.0.0.0:7000";
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 3600;
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;

/// channel-catalog-server - Channel catalog for Mirakurun / EDCB backends
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Path to the database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Tuner backend: mirakurun or edcb
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Mirakurun base URL
    #[arg(long)]
    mirakurun_url: Option<String>,

    /// EDCB Setting directory containing ChSet5.txt
    #[arg(long)]
    edcb_setting_dir: Option<PathBuf>,

    /// Address for the web API to listen on
    #[arg(long)]
    web_listen: Option<SocketAddr>,

    /// Seconds between catalog updates
    #[arg(long)]
    update_interval: Option<u64>,

    /// Directory where log files are stored
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Number of days to keep log files
    #[arg(long)]
    log_retention_days: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run a single update pass and exit
    #[arg(long)]
    once: bool,
}

/// Configuration file format.
#[derive(Debug, serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    general: GeneralSection,
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    logging: LoggingSection,
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    edcb: EdcbSection,
    #[serde(default)]
    jikkyo: JikkyoSection,
    #[serde(default)]
    numbering: NumberingTables,
}

#[derive(Debug, serde::Deserialize, Default)]
struct GeneralSection {
    backend: Option<BackendKind>,
    mirakurun_url: Option<String>,
    edcb_setting_dir: Option<String>,
    update_interval: Option<u64>,
    /// Seconds
    fetch_timeout: Option<u64>,
}

#[derive(Debug, serde::Deserialize, Default)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, serde::Deserialize, Default)]
struct LoggingSection {
    log_dir: Option<String>,
    retention_days: Option<u64>,
    level: Option<String>,
}

#[derive(Debug, serde::Deserialize, Default)]
struct ServerSection {
    web_listen: Option<String>,
}

#[derive(Debug, serde::Deserialize, Default)]
struct EdcbSection {
    /// Stand-in for EDCB's schedule-derived service list
    #[serde(default)]
    remote_control_keys: Vec<EpgService>,
}

#[derive(Debug, serde::Deserialize, Default)]
struct JikkyoSection {
    /// Status pass is disabled when unset
    status_url: Option<String>,
    timeout: Option<u64>,
}

/// Where the service list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BackendSettings {
    Mirakurun { url: String },
    Edcb {
        setting_dir: PathBuf,
        remote_control_keys: Vec<EpgService>,
    },
}

/// Command line merged over the config file.
#[derive(Debug)]
struct Settings {
    backend: BackendSettings,
    database: PathBuf,
    web_listen: SocketAddr,
    update_interval_secs: u64,
    fetch_timeout: Duration,
    log_dir: PathBuf,
    log_retention_days: u64,
    log_level: Option<String>,
    jikkyo_status_url: Option<String>,
    jikkyo_timeout: Duration,
    numbering: NumberingTables,
}

impl Settings {
    /// Command line takes precedence over the config file.
    fn resolve(args: &Args, file: ConfigFile) -> Result<Self, String> {
        let kind = args
            .backend
            .or(file.general.backend)
            .unwrap_or(BackendKind::Mirakurun);
        let backend = match kind {
            BackendKind::Mirakurun => BackendSettings::Mirakurun {
                url: args
                    .mirakurun_url
                    .clone()
                    .or(file.general.mirakurun_url)
                    .unwrap_or_else(|| DEFAULT_MIRAKURUN_URL.to_string()),
            },
            BackendKind::Edcb => BackendSettings::Edcb {
                setting_dir: args
                    .edcb_setting_dir
                    .clone()
                    .or_else(|| file.general.edcb_setting_dir.map(PathBuf::from))
                    .ok_or("EDCB backend requires --edcb-setting-dir or general.edcb_setting_dir")?,
                remote_control_keys: file.edcb.remote_control_keys,
            },
        };

        let web_listen = match args.web_listen {
            Some(addr) => addr,
            None => file
                .server
                .web_listen
                .as_deref()
                .unwrap_or(DEFAULT_WEB_LISTEN)
                .parse::<SocketAddr>()
                .map_err(|e| format!("Invalid server.web_listen: {}", e))?,
        };

        Ok(Self {
            backend,
            database: args
                .database
                .clone()
                .or_else(|| file.database.path.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            web_listen,
            update_interval_secs: args
                .update_interval
                .or(file.general.update_interval)
                .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS),
            fetch_timeout: file
                .general
                .fetch_timeout
                .map(Duration::from_secs)
                .unwrap_or(source::DEFAULT_FETCH_TIMEOUT),
            log_dir: args
                .log_dir
                .clone()
                .or_else(|| file.logging.log_dir.map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            log_retention_days: args
                .log_retention_days
                .or(file.logging.retention_days)
                .unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
            log_level: file.logging.level,
            jikkyo_status_url: file.jikkyo.status_url,
            jikkyo_timeout: file
                .jikkyo
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(source::DEFAULT_FETCH_TIMEOUT),
            numbering: file.numbering,
        })
    }
}

fn load_config(path: &PathBuf) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

fn build_source(settings: &Settings) -> Result<Arc<dyn ServiceSource>, Box<dyn std::error::Error>> {
    let source: Arc<dyn ServiceSource> = match &settings.backend {
        BackendSettings::Mirakurun { url } => {
            Arc::new(MirakurunSource::new(url.clone(), settings.fetch_timeout)?)
        }
        BackendSettings::Edcb {
            setting_dir,
            remote_control_keys,
        } => Arc::new(EdcbSource::new(
            Box::new(EdcbSettingDirectory::new(setting_dir).with_remote_control_keys(remote_control_keys.clone())),
            settings.fetch_timeout,
        )),
    };
    Ok(source)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    });
    let file_config = if let Some(config_path) = &config_path {
        match load_config(config_path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", config_path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e);
            }
        }
    } else {
        ConfigFile::default()
    };

    let settings = Settings::resolve(&args, file_config)?;

    logging::init_logging(
        &settings.log_dir,
        settings.log_retention_days,
        args.verbose,
        settings.log_level.as_deref(),
    )?;

    info!("channel-catalog-server starting...");
    match &settings.backend {
        BackendSettings::Mirakurun { url } => info!("  Backend: Mirakurun ({})", url),
        BackendSettings::Edcb { setting_dir, .. } => info!("  Backend: EDCB ({})", setting_dir.display()),
    }
    info!("  Database: {:?}", settings.database);

    let db = match database::Database::open(&settings.database) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };
    let db = db.into_handle();

    let source = build_source(&settings)?;
    let updater = Arc::new(ChannelUpdater::new(db.clone(), source, settings.numbering.clone()));

    let status_provider: Option<Arc<dyn StatusProvider>> = match &settings.jikkyo_status_url {
        Some(url) => {
            info!("  Jikkyo status: {}", url);
            Some(Arc::new(HttpStatusProvider::new(url.clone(), settings.jikkyo_timeout)?))
        }
        None => None,
    };

    let scheduler = Arc::new(UpdateScheduler::new(
        updater,
        status_provider,
        UpdateSchedulerConfig {
            update_interval_secs: settings.update_interval_secs,
        },
    ));

    if args.once {
        if let Err(e) = scheduler.trigger_update().await {
            error!("Channel update failed: {}", e);
            return Err(e.into());
        }
        return Ok(());
    }

    info!(
        "Starting channel update scheduler (interval: {}s)",
        settings.update_interval_secs
    );
    let _scheduler_handle = Arc::clone(&scheduler).start();

    let web_state = web::WebState::new(db, Some(Arc::clone(&scheduler)));
    tokio::select! {
        result = web::start_web_server(settings.web_listen, web_state) => {
            if let Err(e) = result {
                error!("Web API error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            scheduler.stop().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_config(toml_text: &str) -> ConfigFile {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(&Args::default(), ConfigFile::default()).unwrap();
        assert_eq!(
            settings.backend,
            BackendSettings::Mirakurun {
                url: DEFAULT_MIRAKURUN_URL.to_string()
            }
        );
        assert_eq!(settings.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(settings.update_interval_secs, DEFAULT_UPDATE_INTERVAL_SECS);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(5));
        assert_eq!(settings.numbering, NumberingTables::default());
        assert!(settings.jikkyo_status_url.is_none());
    }

    #[test]
    fn test_config_file() {
        let file = parse_config(
            r#"
            [general]
            backend = "edcb"
            edcb_setting_dir = "/opt/EDCB/Setting"
            update_interval = 600

            [edcb]
            remote_control_keys = [
                { network_id = 32736, service_id = 1024, remote_control_key_id = 1 },
            ]

            [server]
            web_listen = "127.0.0.1:7010"

            [jikkyo]
            status_url = "http://127.0.0.1:9000/status"

            [numbering]
            bs_defunct_service_ids = [238]
            "#,
        );
        let settings = Settings::resolve(&Args::default(), file).unwrap();

        assert_eq!(
            settings.backend,
            BackendSettings::Edcb {
                setting_dir: PathBuf::from("/opt/EDCB/Setting"),
                remote_control_keys: vec![EpgService {
                    network_id: 32736,
                    service_id: 1024,
                    remote_control_key_id: 1,
                }],
            }
        );
        assert_eq!(settings.update_interval_secs, 600);
        assert_eq!(settings.web_listen, "127.0.0.1:7010".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.numbering.bs_defunct_service_ids, vec![238]);
        // Unlisted tables keep their defaults
        assert_eq!(
            settings.numbering.bs_subchannels,
            NumberingTables::default().bs_subchannels
        );
    }

    #[test]
    fn test_command_line_takes_precedence() {
        let file = parse_config(
            r#"
            [general]
            backend = "edcb"
            update_interval = 600
            "#,
        );
        let args = Args {
            backend: Some(BackendKind::Mirakurun),
            mirakurun_url: Some("http://tuner:40772".to_string()),
            update_interval: Some(60),
            ..Default::default()
        };
        let settings = Settings::resolve(&args, file).unwrap();

        assert_eq!(
            settings.backend,
            BackendSettings::Mirakurun {
                url: "http://tuner:40772".to_string()
            }
        );
        assert_eq!(settings.update_interval_secs, 60);
    }

    #[test]
    fn test_edcb_requires_setting_dir() {
        let args = Args {
            backend: Some(BackendKind::Edcb),
            ..Default::default()
        };
        assert!(Settings::resolve(&args, ConfigFile::default()).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["channel-catalog-server", "--backend", "edcb", "--once"]).unwrap();
        assert_eq!(args.backend, Some(BackendKind::Edcb));
        assert!(args.once);
    }
}
