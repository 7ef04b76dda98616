use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "bank_simulator", about = "Replays a banking operation script")]
pub struct Args {
    /// CSV script with columns op,actor,account,to,amount,name
    pub script: PathBuf,

    /// How long an operation waits for an account lock before giving up
    #[arg(long, default_value_t = 5000)]
    pub lock_timeout_ms: u64,

    /// Username of the administrator created at startup
    #[arg(long, default_value = "admin")]
    pub admin: String,

    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub lock_timeout: Duration,
    pub bootstrap_admin: String,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(5000),
            bootstrap_admin: "admin".to_string(),
            log_level: Level::INFO,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            lock_timeout: Duration::from_millis(args.lock_timeout_ms),
            bootstrap_admin: args.admin.clone(),
            log_level: args.log_level,
        }
    }
}
