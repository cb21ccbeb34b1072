use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::classifier::Branch;
use crate::error::AppError;
use crate::sheets::{ServiceAccountKey, SheetsCredentials};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub collections: CollectionConfig,
    pub sheets: Option<SheetsConfig>,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    /// Attempts made for each conversation upsert before giving up.
    pub write_attempts: u32,
}

/// Collection name per branch. Tabs in the export spreadsheet share these names.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionConfig {
    pub ecommerce: String,
    pub static_leads: String,
    pub digital_marketing: String,
    pub unknown: String,
}

/// Google Sheets export target
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub credentials: SheetsCredentials,
    pub base_url: String,
}

/// Export job configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub run_on_startup: bool,
    pub auto_create_tabs: bool,
    pub branches: Vec<Branch>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration for the Sheets client
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: match env::var("PORT") {
                Ok(p) => p.trim().parse().map_err(|_| AppError::Config {
                    message: format!("PORT must be a valid port number, got '{}'", p),
                })?,
                Err(_) => 5000,
            },
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/leads.db".to_string()),
            ),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5),
            connect_timeout_ms: env_or("DATABASE_CONNECT_TIMEOUT_MS", 30000),
            write_attempts: env_or("STORE_WRITE_ATTEMPTS", 3u32).max(1),
        };

        let defaults = CollectionConfig::default();
        let collections = CollectionConfig {
            ecommerce: env_nonempty("COLLECTION_ECOMMERCE").unwrap_or(defaults.ecommerce),
            static_leads: env_nonempty("COLLECTION_STATIC").unwrap_or(defaults.static_leads),
            digital_marketing: env_nonempty("COLLECTION_DIGITAL_MARKETING")
                .unwrap_or(defaults.digital_marketing),
            unknown: env_nonempty("COLLECTION_UNKNOWN").unwrap_or(defaults.unknown),
        };

        let credentials = sheets_credentials(
            env_nonempty("SHEETS_ACCESS_TOKEN"),
            env_nonempty("GOOGLE_CREDENTIALS"),
        )?;
        let sheets = match (env_nonempty("SHEETS_SPREADSHEET_ID"), credentials) {
            (Some(spreadsheet_id), Some(credentials)) => Some(SheetsConfig {
                spreadsheet_id,
                credentials,
                base_url: env::var("SHEETS_BASE_URL")
                    .unwrap_or_else(|_| "https://sheets.googleapis.com".to_string()),
            }),
            _ => None,
        };

        let branches = match env_nonempty("EXPORT_BRANCHES") {
            Some(list) => parse_branch_list(&list)?,
            None => Branch::ALL.to_vec(),
        };

        let export = ExportConfig {
            enabled: env_bool("EXPORT_ENABLED", true),
            interval_secs: env_or("EXPORT_INTERVAL_SECS", 60u64).max(1),
            run_on_startup: env_bool("EXPORT_RUN_ON_STARTUP", true),
            auto_create_tabs: env_bool("EXPORT_AUTO_CREATE_TABS", true),
            branches,
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", 30000),
        };

        Ok(Config {
            server,
            database,
            collections,
            sheets,
            export,
            logging,
            request,
        })
    }
}

/// Resolve Sheets credentials. An explicit access token wins over the service
/// account key, which may be given inline as JSON or as a path to the key file.
pub fn sheets_credentials(
    access_token: Option<String>,
    google_credentials: Option<String>,
) -> Result<Option<SheetsCredentials>, AppError> {
    if let Some(token) = access_token {
        return Ok(Some(SheetsCredentials::AccessToken(token)));
    }
    let Some(value) = google_credentials else {
        return Ok(None);
    };

    let json = if value.starts_with('{') {
        value
    } else {
        std::fs::read_to_string(&value).map_err(|e| AppError::Config {
            message: format!("GOOGLE_CREDENTIALS: cannot read key file '{}': {}", value, e),
        })?
    };

    let key = ServiceAccountKey::from_json(&json).map_err(|e| AppError::Config {
        message: format!("GOOGLE_CREDENTIALS: invalid service account key: {}", e),
    })?;
    Ok(Some(SheetsCredentials::ServiceAccount(key)))
}

/// Parse a comma-separated list of branch slugs or collection names.
pub fn parse_branch_list(list: &str) -> Result<Vec<Branch>, AppError> {
    let mut branches = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let branch: Branch = item.parse().map_err(|e| AppError::Config {
            message: format!("EXPORT_BRANCHES: {}", e),
        })?;
        if !branches.contains(&branch) {
            branches.push(branch);
        }
    }
    Ok(branches)
}

impl CollectionConfig {
    /// Collection name for a branch.
    pub fn name(&self, branch: Branch) -> &str {
        match branch {
            Branch::ECommerceLeads => &self.ecommerce,
            Branch::StaticLeads => &self.static_leads,
            Branch::DigitalMarketing4999 => &self.digital_marketing,
            Branch::UnknownLeads => &self.unknown,
        }
    }

    /// Reverse lookup from a configured collection name.
    pub fn branch_for(&self, collection: &str) -> Option<Branch> {
        Branch::ALL
            .into_iter()
            .find(|b| self.name(*b).eq_ignore_ascii_case(collection))
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            ecommerce: Branch::ECommerceLeads.default_collection().to_string(),
            static_leads: Branch::StaticLeads.default_collection().to_string(),
            digital_marketing: Branch::DigitalMarketing4999.default_collection().to_string(),
            unknown: Branch::UnknownLeads.default_collection().to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/leads.db"),
            max_connections: 5,
            connect_timeout_ms: 30000,
            write_attempts: 3,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            run_on_startup: true,
            auto_create_tabs: true,
            branches: Branch::ALL.to_vec(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30000 }
    }
}
