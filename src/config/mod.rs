use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection string for the job store and ledger.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Override for the anonymous API token sent to the feed.
    /// The built-in default can expire; production should set this.
    #[serde(default)]
    pub ably_anon_token: Option<String>,

    /// Override for the device id header sent to the feed.
    #[serde(default)]
    pub ably_device_id: Option<String>,

    /// Override for the app version header sent to the feed.
    #[serde(default)]
    pub ably_app_version: Option<String>,

    /// Override for the User-Agent header sent to the feed.
    #[serde(default)]
    pub ably_user_agent: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://data/harvest.db".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
