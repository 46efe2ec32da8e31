use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::cli::Cli;
use crate::http::Timeouts;
use crate::paths::store_file_path;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for one run, resolved from flags, environment, and defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub api_base: String,
    pub concurrency: usize,
    pub timeouts: Timeouts,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let store_path = match &cli.file {
            Some(path) => path.clone(),
            None => store_file_path()?,
        };
        let read = Duration::from_secs(cli.timeout_secs.max(1));
        Ok(Self {
            store_path,
            api_base: cli.api_base.clone(),
            concurrency: cli.concurrency.max(1),
            timeouts: Timeouts {
                connect: CONNECT_TIMEOUT.min(read),
                read,
            },
        })
    }
}
