//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then `CHATRELAY_*` environment variables.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CHATRELAY_";

/// System instruction seeded into every new conversation
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI assistant developed and powered by DevEvil Universe";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub system_prompt: String,

    // Completion API (OpenAI-compatible)
    pub completion_api_key: Option<String>,
    pub completion_base_url: String,
    pub completion_model: String,
    pub completion_max_tokens: u32,

    // Image inference API
    pub image_api_key: Option<String>,
    pub image_api_url: String,
    pub image_timeout_ms: u64,

    // File-transfer server hosting generated images
    pub ftp_host: String,
    pub ftp_user: String,
    pub ftp_password: String,
    pub ftp_port: u16,
    pub ftp_secure: bool,
    /// Public URL prefix under which uploaded files are served
    pub public_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5500)),
            allowed_origins: vec![
                "http://localhost".to_string(),
                "https://example.com".to_string(),
            ],
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            completion_api_key: None,
            completion_base_url: "https://api.x.ai/v1".to_string(),
            completion_model: "grok-2-1212".to_string(),
            completion_max_tokens: 1024,
            image_api_key: None,
            image_api_url:
                "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-dev"
                    .to_string(),
            image_timeout_ms: 10_000,
            ftp_host: String::new(),
            ftp_user: String::new(),
            ftp_password: String::new(),
            ftp_port: 21,
            ftp_secure: true,
            public_base_url: "https://localhost".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// The provider stack used by [`Config::load`]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Deadline for the image inference call
    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }
}
