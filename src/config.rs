//! Command line and environment configuration.

use crate::address::{AddressTranslator, ChainParams};
use bitcoincore_rpc::Auth;
use clap::{ArgAction, Parser};
use log::LevelFilter;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT: &str = "data/all.csv";
pub const DEFAULT_BATCH_SIZE: NonZeroU64 = match NonZeroU64::new(100) {
    Some(x) => x,
    None => panic!("zero batch size"),
};

#[derive(Parser, Debug)]
#[command(about = "Export per-block AuxPoW metadata of a merge-mined chain to CSV")]
pub struct Args {
    #[arg(long, env = "AUXPOW_RPC_HOST", default_value = "127.0.0.1")]
    pub rpc_host: String,
    #[arg(long, env = "AUXPOW_RPC_PORT", default_value_t = 8336)]
    pub rpc_port: u16,
    #[arg(long, env = "AUXPOW_RPC_USER", default_value = "user")]
    pub rpc_user: String,
    #[arg(
        long,
        env = "AUXPOW_RPC_PASSWORD",
        default_value = "password",
        hide_env_values = true
    )]
    pub rpc_password: String,
    /// Cookie file of the node; takes precedence over user/password
    #[arg(long, env = "AUXPOW_RPC_COOKIE")]
    pub rpc_cookie: Option<PathBuf>,
    /// Heights fetched per RPC batch
    #[arg(long, env = "AUXPOW_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: NonZeroU64,
    /// Output CSV; overwritten if it exists
    #[arg(short, long, env = "AUXPOW_OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
    /// Retries of a failed RPC batch
    #[arg(long, env = "AUXPOW_RETRIES", default_value_t = 3)]
    pub retries: u32,
    /// Delay before the first retry; doubled for each further one
    #[arg(
        long,
        env = "AUXPOW_RETRY_DELAY",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub retry_delay: Duration,
    /// Abort on malformed AuxPoW data instead of writing an empty field
    #[arg(long, env = "AUXPOW_STRICT")]
    pub strict: bool,
    /// Chain the node serves
    #[arg(long, default_value = "namecoin")]
    pub source_chain: ChainParams,
    /// Address format written to the `address` column
    #[arg(long, default_value = "bitcoin")]
    pub target_chain: ChainParams,
    /// `-v`: debug, `-vv`: trace
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(long, env = "AUXPOW_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub auth: Auth,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub batch_size: NonZeroU64,
    pub output: PathBuf,
    pub retries: u32,
    pub retry_delay: Duration,
    pub strict: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            output: PathBuf::from(DEFAULT_OUTPUT),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            strict: false,
        }
    }
}

impl Args {
    pub fn rpc_config(&self) -> RpcConfig {
        let auth = match &self.rpc_cookie {
            Some(cookie) => Auth::CookieFile(cookie.clone()),
            None => Auth::UserPass(self.rpc_user.clone(), self.rpc_password.clone()),
        };
        RpcConfig {
            url: format!("http://{}:{}", self.rpc_host, self.rpc_port),
            auth,
        }
    }

    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            batch_size: self.batch_size,
            output: self.output.clone(),
            retries: self.retries,
            retry_delay: self.retry_delay,
            strict: self.strict,
        }
    }

    pub fn translator(&self) -> AddressTranslator {
        AddressTranslator::new(self.source_chain, self.target_chain)
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
