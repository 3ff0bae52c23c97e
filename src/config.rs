// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ORDER_API_URL: &str =
    "https://api.stocksdeveloper.in/trading/placeRegularOrder";
pub const DEFAULT_MARKET_API_URL: &str = "https://apiconnect.angelbroking.com";

/// Fan-out service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Account directory endpoints
    pub accounts: AccountsConfig,

    /// Order gateway credentials
    pub broker: BrokerConfig,

    /// Market venue session and lookups
    pub market: MarketConfig,

    /// Risk management configuration
    pub risk: RiskConfig,

    /// Persisted state locations
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Active account list endpoint
    pub users_url: String,

    /// Margin lookup endpoint, queried as `{margin_url}/{accountId}`
    pub margin_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Order placement endpoint
    pub order_url: String,

    /// API key
    pub api_key: String,

    /// Timeout for every remote call, in milliseconds
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub base_url: String,
    pub api_key: String,
    pub client_code: String,
    pub password: String,

    /// Base32 TOTP secret; a fresh code is derived at every login
    pub totp_secret: String,

    /// Exchange segment used for symbol search (e.g., "NSE")
    pub exchange: String,

    /// Calls per request when the session must be refreshed
    pub max_auth_attempts: u32,
}

/// Risk management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Funds below which an account is not given option trades
    pub option_min_funds: Decimal,

    /// Stop-loss monitor polling period, in milliseconds
    pub monitor_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub ledger_path: String,
    pub token_cache_path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

fn required(name: &str) -> AppResult<String> {
    env::var(name)
        .map_err(|_| AppError::Config(format!("Missing {} environment variable", name)))
}

fn or_default<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from the JSON file named by `CONFIG_FILE`, or from the environment
    pub fn load() -> AppResult<Self> {
        dotenv().ok();

        Self::load_from(env::var("CONFIG_FILE").ok().as_deref())
    }

    fn load_from(config_file: Option<&str>) -> AppResult<Self> {
        match config_file.map(str::trim) {
            Some(path) if !path.is_empty() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let accounts = AccountsConfig {
            users_url: required("USERS_URL")?,
            margin_url: env::var("MARGIN_URL").ok().filter(|v| !v.is_empty()),
        };

        let broker = BrokerConfig {
            order_url: env::var("ORDER_API_URL")
                .unwrap_or_else(|_| DEFAULT_ORDER_API_URL.to_string()),
            api_key: required("STOCKS_DEVELOPER_API_KEY")?,
            http_timeout_ms: or_default("HTTP_TIMEOUT_MS", defaults.broker.http_timeout_ms),
        };

        let market = MarketConfig {
            base_url: env::var("MARKET_API_URL")
                .unwrap_or_else(|_| DEFAULT_MARKET_API_URL.to_string()),
            api_key: required("SMARTAPI_KEY")?,
            client_code: required("SMARTAPI_USER")?,
            password: required("SMARTAPI_PASS")?,
            totp_secret: required("TOTP_SECRET")?,
            exchange: env::var("MARKET_EXCHANGE")
                .unwrap_or_else(|_| defaults.market.exchange.clone()),
            max_auth_attempts: or_default(
                "AUTH_MAX_ATTEMPTS",
                defaults.market.max_auth_attempts,
            ),
        };

        let risk = RiskConfig {
            option_min_funds: or_default("OPTION_MIN_FUNDS", defaults.risk.option_min_funds),
            monitor_poll_ms: or_default("MONITOR_POLL_MS", defaults.risk.monitor_poll_ms),
        };

        let storage = StorageConfig {
            ledger_path: env::var("LEDGER_PATH").unwrap_or(defaults.storage.ledger_path),
            token_cache_path: env::var("TOKEN_CACHE_PATH")
                .unwrap_or(defaults.storage.token_cache_path),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: or_default("LOG_TO_FILE", false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            accounts,
            broker,
            market,
            risk,
            storage,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.broker.http_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.risk.monitor_poll_ms.max(1))
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| AppError::Config(format!("Failed to open log file: {}", e)))?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        // Initialize the logger
        builder
            .try_init()
            .map_err(|e| AppError::Config(format!("Failed to initialize logger: {}", e)))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: AccountsConfig {
                users_url: "http://localhost:8080/accounts".to_string(),
                margin_url: None,
            },
            broker: BrokerConfig {
                order_url: DEFAULT_ORDER_API_URL.to_string(),
                api_key: "".to_string(),
                http_timeout_ms: 10_000,
            },
            market: MarketConfig {
                base_url: DEFAULT_MARKET_API_URL.to_string(),
                api_key: "".to_string(),
                client_code: "".to_string(),
                password: "".to_string(),
                totp_secret: "".to_string(),
                exchange: "NSE".to_string(),
                max_auth_attempts: 3,
            },
            risk: RiskConfig {
                option_min_funds: Decimal::new(100_000, 0),
                monitor_poll_ms: 1_000,
            },
            storage: StorageConfig {
                ledger_path: "open_trades.json".to_string(),
                token_cache_path: "symbol_tokens.json".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
