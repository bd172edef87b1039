use clap::Parser;
use std::time::Duration;

use crate::quota::QuotaLimits;
use crate::upstream::{DEFAULT_API_URL, DEFAULT_MODEL};

// CLI argument structure; every option can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "phrase-gateway")]
#[command(about = "Metered phrase generation gateway with session login")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    // Password that unlocks the premium tier
    #[arg(long, env = "ACCESS_PASSWORD", default_value = "family2024", hide_env_values = true)]
    pub access_password: String,

    // Upstream API key; generation fails until it is set
    #[arg(long, env = "CLAUDE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "CLAUDE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[arg(long, env = "CLAUDE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = 1000)]
    pub max_tokens: u32,

    // Upstream request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub upstream_timeout: u64,

    // Lifetime generations per IP without login
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub free_limit: u32,

    // Daily generations per session token
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    pub premium_limit: u32,

    // Session store ceiling; crossing it evicts the oldest half
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(2..))]
    pub max_sessions: u64,
}

impl Args {
    pub fn limits(&self) -> QuotaLimits {
        QuotaLimits {
            free: self.free_limit,
            premium: self.premium_limit,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }
}
