use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use events::{GroupId, UserId};
use hub::{RegistryMode, Settings};
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

/// Initial group membership for the in-process group store, written as
/// `<group>=<user>,<user>;<group>=<user>` (e.g. `42=1,2;7=3`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupSeed(pub Vec<(GroupId, Vec<UserId>)>);

impl FromStr for GroupSeed {
    type Err = String;

    fn from_str(seed: &str) -> Result<Self, Self::Err> {
        let mut groups = Vec::new();
        for entry in seed.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (group, members) = entry
                .split_once('=')
                .ok_or_else(|| format!("expected <group>=<members>, got {entry:?}"))?;
            let group_id: GroupId = group
                .trim()
                .parse()
                .map_err(|_| format!("invalid group id {group:?}"))?;
            let members = members
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(|m| m.parse::<UserId>().map_err(|_| format!("invalid user id {m:?}")))
                .collect::<Result<Vec<_>, _>>()?;
            groups.push((group_id, members));
        }
        Ok(GroupSeed(groups))
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Shared HMAC secret used to verify session tokens (HS256).
    #[arg(long, env, hide_env_values = true)]
    jwt_secret: String,

    /// Which connection registry implementation to run.
    #[arg(
        long,
        env,
        default_value_t = RegistryMode::Actor,
        value_parser = clap::builder::PossibleValuesParser::new(["lock", "actor", "LOCK", "ACTOR"])
            .map(|s| s.parse::<RegistryMode>().unwrap()),
        )]
    pub registry_mode: RegistryMode,

    /// Milliseconds a single write to one connection may take before that connection is dropped
    #[arg(long, env, default_value_t = 2000)]
    pub write_timeout_ms: u64,

    /// Seconds a new connection has to send its authentication frame
    #[arg(long, env, default_value_t = 10)]
    pub auth_timeout_secs: u64,

    /// Number of outbound frames buffered per connection
    #[arg(long, env, default_value_t = 64)]
    pub outbound_buffer: usize,

    /// Seconds between keep-alive pings; 0 disables pings
    #[arg(long, env, default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// Group membership loaded into the in-process group store at start-up, e.g. `42=1,2;7=3`
    #[arg(long, env)]
    pub group_seed: Option<GroupSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    /// Connection handling settings for the hub.
    pub fn hub_settings(&self) -> Settings {
        Settings {
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            auth_timeout: Duration::from_secs(self.auth_timeout_secs),
            outbound_buffer: self.outbound_buffer.max(1),
            ping_interval: match self.ping_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}
