//! CLI argument parser.
//!
//! Provides one-shot commands for exercising the controller and the catalog
//! without a client attached, plus the `--daemon` switch.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{DaemonConfig, StorageKind};

/// Cache storage backends selectable on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageArg {
    /// In-process caches, lost on exit
    Memory,
    /// Caches persisted under the cache directory
    #[default]
    Disk,
}

impl From<StorageArg> for StorageKind {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::Memory => StorageKind::Memory,
            StorageArg::Disk => StorageKind::Disk,
        }
    }
}

/// music-dna-daemon: offline cache controller and hover audio player
#[derive(Parser, Debug)]
#[command(name = "music-dna-daemon")]
#[command(about = "Offline cache controller and hover audio player for Canadian Music DNA")]
#[command(version)]
pub struct Cli {
    /// Precache the static files and activate
    #[arg(long)]
    pub install: bool,

    /// Run one URL through the fetch handler
    #[arg(long, value_name = "URL")]
    pub fetch: Option<String>,

    /// Request destination for --fetch (document, script, image, ...)
    #[arg(long, default_value = "")]
    pub destination: String,

    /// Resolve the audio preview for a discovery method
    #[arg(long, value_name = "METHOD")]
    pub resolve: Option<String>,

    /// Age group for --resolve (18-34, 35-54, 55+)
    #[arg(long, default_value = "18-34")]
    pub age_group: String,

    /// Origin served by the controller
    #[arg(long)]
    pub origin: Option<String>,

    /// Cache version suffix
    #[arg(long)]
    pub cache_version: Option<String>,

    /// Cache storage backend
    #[arg(long, value_enum)]
    pub storage: Option<StorageArg>,

    /// Directory for disk caches
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Local directory mirroring the site's public assets
    #[arg(long)]
    pub asset_root: Option<PathBuf>,

    /// Run in daemon mode (JSON-RPC over stdio)
    #[arg(long)]
    pub daemon: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if a one-shot command was given (and not daemon mode).
    pub fn is_cli_mode(&self) -> bool {
        !self.daemon && (self.install || self.fetch.is_some() || self.resolve.is_some())
    }

    /// Returns true if running in daemon mode.
    pub fn is_daemon_mode(&self) -> bool {
        self.daemon
    }

    /// Applies command-line overrides on top of a configuration.
    pub fn apply_to(&self, config: &mut DaemonConfig) {
        if let Some(ref origin) = self.origin {
            config.origin = origin.clone();
        }
        if let Some(ref version) = self.cache_version {
            config.cache_version = version.clone();
        }
        if let Some(storage) = self.storage {
            config.storage = storage.into();
        }
        if let Some(ref dir) = self.cache_dir {
            config.cache_path = Some(dir.clone());
        }
        if let Some(ref root) = self.asset_root {
            config.asset_root = Some(root.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("music-dna-daemon").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn no_args_is_neither_mode() {
        let cli = parse(&[]);
        assert!(!cli.is_cli_mode());
        assert!(!cli.is_daemon_mode());
        assert_eq!(cli.age_group, "18-34");
    }

    #[test]
    fn cli_mode_detection() {
        assert!(parse(&["--install"]).is_cli_mode());
        assert!(parse(&["--fetch", "http://localhost:5173/"]).is_cli_mode());
        assert!(parse(&["--resolve", "Radio", "--age-group", "55+"]).is_cli_mode());

        let daemon = parse(&["--daemon", "--install"]);
        assert!(!daemon.is_cli_mode());
        assert!(daemon.is_daemon_mode());
    }

    #[test]
    fn overrides_apply_to_config() {
        let cli = parse(&[
            "--origin",
            "https://musicdna.example",
            "--storage",
            "memory",
            "--cache-dir",
            "/tmp/caches",
            "--asset-root",
            "/srv/public",
            "--cache-version",
            "v2",
        ]);
        let mut config = DaemonConfig::new();
        cli.apply_to(&mut config);

        assert_eq!(config.origin, "https://musicdna.example");
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/caches")));
        assert_eq!(config.asset_root, Some(PathBuf::from("/srv/public")));
        assert_eq!(config.static_cache_name(), "static-v2");
    }

    #[test]
    fn absent_overrides_keep_config() {
        let mut config = DaemonConfig::new();
        parse(&[]).apply_to(&mut config);
        assert_eq!(config.origin, crate::config::DEFAULT_ORIGIN);
        assert_eq!(config.storage, StorageKind::Disk);
    }

    #[test]
    fn storage_arg_default() {
        assert_eq!(StorageArg::default(), StorageArg::Disk);
        assert_eq!(StorageKind::from(StorageArg::Memory), StorageKind::Memory);
    }
}
