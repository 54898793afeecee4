use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};

/// Runtime configuration, read once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub session_key: Vec<u8>,
    pub public_base_url: String,
    pub email_api_key: Option<String>,
    pub email_from: String,
    /// Required suffix for check-in emails, e.g. "@example.com".
    /// None disables the domain policy.
    pub checkin_email_domain: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL missing")?;

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{port}")
        });

        let session_key_b64 =
            std::env::var("SESSION_KEY").context("SESSION_KEY missing")?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64)
            .map_err(|_| anyhow!("SESSION_KEY must be base64"))?;
        if session_key.len() < 32 {
            return Err(anyhow!("SESSION_KEY must decode to at least 32 bytes"));
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_key,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            email_api_key: std::env::var("EMAIL_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "checkin@teampulse.local".to_string()),
            checkin_email_domain: std::env::var("CHECKIN_EMAIL_DOMAIN")
                .ok()
                .map(|d| if d.starts_with('@') { d } else { format!("@{d}") }),
            admin_email: std::env::var("ADMIN_EMAIL").ok(),
            admin_password: std::env::var("ADMIN_PASSWORD").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn domain_gets_at_prefix() {
        // mirrors the normalization in from_env without touching the process env
        let normalize = |d: &str| {
            if d.starts_with('@') {
                d.to_string()
            } else {
                format!("@{d}")
            }
        };
        assert_eq!(normalize("example.com"), "@example.com");
        assert_eq!(normalize("@example.com"), "@example.com");
    }
}
