use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use arosa_db::DEFAULT_READER_POOL_SIZE;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub db_readers: usize,
    pub jwt_secret: String,
    pub media_dir: PathBuf,
    pub public_url: String,
    pub default_photo: String,
    pub plantnet_url: String,
    pub plantnet_api_key: String,
    /// Accounts promoted to admin at start-up.
    pub admin_emails: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("AROSA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("AROSA_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("AROSA_HOST", "0.0.0.0");
        let port: u16 = var("AROSA_PORT", "3000")
            .parse()
            .context("AROSA_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("AROSA_HOST/AROSA_PORT do not form a socket address")?;

        let db_readers = match get("AROSA_DB_READERS") {
            Some(raw) => raw.parse().context("AROSA_DB_READERS must be a number")?,
            None => DEFAULT_READER_POOL_SIZE,
        };

        let public_url = var("AROSA_PUBLIC_URL", &format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let default_photo = var(
            "AROSA_DEFAULT_PHOTO",
            &format!("{}/media/profilepictures/default_pp.png", public_url),
        );

        Ok(Self {
            addr,
            db_path: var("AROSA_DB_PATH", "arosa.db").into(),
            db_readers,
            jwt_secret,
            media_dir: var("AROSA_MEDIA_DIR", "./media").into(),
            public_url,
            default_photo,
            plantnet_url: var("AROSA_PLANTNET_URL", "https://my-api.plantnet.org"),
            plantnet_api_key: var("AROSA_PLANTNET_API_KEY", ""),
            admin_emails: var("AROSA_ADMIN_EMAILS", "")
                .split(',')
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}
