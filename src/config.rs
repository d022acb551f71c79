use crate::platforms::Platform;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use url::Url;

pub const ENV_PREFIX: &str = "CREATORBOARD_";
const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_SECRET_PREFIX: &str = "change-me";

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("refusing to run in production with default secrets: {}", .0.join(", "))]
    DefaultSecrets(Vec<&'static str>),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub auth: AuthConfig,
    pub http: HttpConfig,
    pub tokens: TokenConfig,
    pub sync: SyncConfig,
    pub scoring: ScoringConfig,
    pub providers: ProvidersConfig,
}

impl Config {
    /// Defaults, then `config.toml` (or `$CREATORBOARD_CONFIG`), then env vars.
    /// The result is validated before it is returned.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(format!("{ENV_PREFIX}CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Production must not run with any of the shipped placeholder secrets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_production() {
            return Ok(());
        }
        let defaults = self.default_secrets();
        if defaults.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::DefaultSecrets(defaults))
        }
    }

    /// Names of secrets still set to a placeholder (or left empty).
    pub fn default_secrets(&self) -> Vec<&'static str> {
        [
            ("auth.jwt_secret", &self.auth.jwt_secret),
            ("auth.cookie_secret", &self.auth.cookie_secret),
            ("auth.encryption_key", &self.auth.encryption_key),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty() || v.starts_with(DEFAULT_SECRET_PREFIX))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_production(&self) -> bool {
        self.basic.environment.eq_ignore_ascii_case("production")
    }

    /// `redirect_uri` registered with each platform.
    pub fn redirect_uri(&self, platform: Platform) -> String {
        format!(
            "{}/api/auth/{}/callback",
            self.basic.public_url.trim_end_matches('/'),
            platform.as_str()
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    pub database_url: String,
    pub environment: String,
    /// Externally reachable base URL of this service.
    pub public_url: String,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub body_limit_kb: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            database_url: "sqlite://data.db".to_string(),
            environment: "development".to_string(),
            public_url: "http://localhost:8000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            body_limit_kb: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub cookie_name: String,
    /// Master secret for the private OAuth state cookies.
    pub cookie_secret: String,
    pub insecure_cookie: bool,
    /// Symmetric key material for stored platform tokens.
    pub encryption_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-jwt-secret".to_string(),
            jwt_ttl_hours: 24 * 7,
            cookie_name: "auth-token".to_string(),
            cookie_secret: "change-me-cookie-secret".to_string(),
            insecure_cookie: false,
            encryption_key: "change-me-encryption-key".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub proxy: Option<Url>,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout_secs: 5,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Tokens expiring within this window are refreshed before use.
    pub refresh_margin_secs: i64,
    pub refresh_per_minute: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: 5 * 60,
            refresh_per_minute: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub run_on_startup: bool,
    pub interval_secs: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    /// Upper bound on pages fetched per connection and pass.
    pub max_pages: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_on_startup: false,
            interval_secs: 6 * 60 * 60,
            batch_size: 5,
            batch_delay_ms: 2_000,
            max_pages: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub window_days: i64,
    pub view_weight: f64,
    pub engagement_weight: f64,
    pub engagement_rate_factor: f64,
    pub engagement_cap: f64,
    pub growth_cap: f64,
    pub approval_weight: f64,
    pub completeness_weight: f64,
    pub youtube_multiplier: f64,
    pub twitch_multiplier: f64,
    pub facebook_multiplier: f64,
    pub other_multiplier: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            view_weight: 0.1,
            engagement_weight: 0.5,
            engagement_rate_factor: 10.0,
            engagement_cap: 100.0,
            growth_cap: 100.0,
            approval_weight: 0.7,
            completeness_weight: 0.3,
            youtube_multiplier: 1.0,
            twitch_multiplier: 0.8,
            facebook_multiplier: 0.6,
            other_multiplier: 0.5,
        }
    }
}

impl ScoringConfig {
    pub fn multiplier(&self, platform: &str) -> f64 {
        match Platform::parse(platform) {
            Some(Platform::Youtube) => self.youtube_multiplier,
            Some(Platform::Twitch) => self.twitch_multiplier,
            Some(Platform::Facebook) => self.facebook_multiplier,
            None => self.other_multiplier,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub youtube: ProviderConfig,
    pub twitch: ProviderConfig,
    pub facebook: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            youtube: ProviderConfig {
                client_id: String::new(),
                client_secret: String::new(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                api_base: "https://www.googleapis.com/youtube/v3".to_string(),
                scopes: vec![
                    "https://www.googleapis.com/auth/youtube.readonly".to_string(),
                    "https://www.googleapis.com/auth/userinfo.profile".to_string(),
                ],
            },
            twitch: ProviderConfig {
                client_id: String::new(),
                client_secret: String::new(),
                auth_url: "https://id.twitch.tv/oauth2/authorize".to_string(),
                token_url: "https://id.twitch.tv/oauth2/token".to_string(),
                api_base: "https://api.twitch.tv/helix".to_string(),
                scopes: vec!["user:read:email".to_string()],
            },
            facebook: ProviderConfig {
                client_id: String::new(),
                client_secret: String::new(),
                auth_url: "https://www.facebook.com/v18.0/dialog/oauth".to_string(),
                token_url: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
                api_base: "https://graph.facebook.com/v18.0".to_string(),
                scopes: vec![
                    "public_profile".to_string(),
                    "pages_show_list".to_string(),
                    "pages_read_engagement".to_string(),
                    "pages_read_user_content".to_string(),
                ],
            },
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, platform: Platform) -> &ProviderConfig {
        match platform {
            Platform::Youtube => &self.youtube,
            Platform::Twitch => &self.twitch,
            Platform::Facebook => &self.facebook,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
    pub scopes: Vec<String>,
}
