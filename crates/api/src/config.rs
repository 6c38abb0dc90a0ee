//! Process configuration, read from environment variables at startup.

/// SMTP transport settings. An empty `email` downgrades the mailer to a
/// logging no-op.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent → in-memory stores (dev/test).
    pub database_url: Option<String>,
    /// Shared secret for the HMAC trust path.
    pub jwt_secret: Option<String>,
    /// Remote key-set endpoint for the asymmetric trust path.
    pub jwks_url: Option<String>,
    pub port: u16,
    pub smtp: SmtpConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env_opt("JWT_SECRET");
        if jwt_secret.is_none() {
            tracing::warn!("JWT_SECRET is missing; token verification will rely on JWKS only");
        }

        Self {
            database_url: env_opt("DATABASE_URL"),
            jwt_secret,
            jwks_url: env_opt("JWKS_URL"),
            port: env_or("PORT", "8080").parse().unwrap_or(8080),
            smtp: SmtpConfig {
                host: env_or("SMTP_HOST", "smtp.gmail.com"),
                port: env_or("SMTP_PORT", "587").parse().unwrap_or(587),
                email: env_or("SMTP_EMAIL", ""),
                password: env_or("SMTP_PASSWORD", ""),
            },
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}
