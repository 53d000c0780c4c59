use std::env;

/// Per-IP rate limits in requests per minute. See `rate_limit.rs` for tiers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Settlement currency for every intent, fixed per deployment.
    pub currency: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("DARKROOM_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        // Stripe credentials are required outside dev mode; in dev mode we
        // fall back to placeholders so the server can start without a Stripe
        // account (the webhook endpoint will reject everything).
        let stripe_secret_key = match env::var("STRIPE_SECRET_KEY") {
            Ok(v) => v,
            Err(_) if dev_mode => "sk_test_placeholder".to_string(),
            Err(_) => panic!("STRIPE_SECRET_KEY must be set"),
        };
        let stripe_webhook_secret = match env::var("STRIPE_WEBHOOK_SECRET") {
            Ok(v) => v,
            Err(_) if dev_mode => "whsec_placeholder".to_string(),
            Err(_) => panic!("STRIPE_WEBHOOK_SECRET must be set"),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "darkroom.db".to_string()),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            stripe_secret_key,
            stripe_webhook_secret,
            rate_limit: RateLimitConfig {
                strict_rpm: env_rpm("RATE_LIMIT_STRICT_RPM", 10),
                standard_rpm: env_rpm("RATE_LIMIT_STANDARD_RPM", 30),
                relaxed_rpm: env_rpm("RATE_LIMIT_RELAXED_RPM", 60),
            },
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_rpm(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
