use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// SQLite file plus blobs on local disk, served by this process.
    Local { db_path: PathBuf, storage_dir: PathBuf },
    /// Hosted row/object service.
    Hosted { url: String, api_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    /// Base URL clients use to reach this server; prefixes local blob URLs.
    pub public_url: String,
    pub backend: BackendKind,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let host = get("KEEPSAKE_HOST", "0.0.0.0");
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("KEEPSAKE_HOST must be an IP address, got '{}'", host))?;
        let port: u16 = get("KEEPSAKE_PORT", "3000")
            .parse()
            .context("KEEPSAKE_PORT must be a port number")?;
        let addr = SocketAddr::new(ip, port);

        let backend = match get("KEEPSAKE_BACKEND", "local").as_str() {
            "local" => BackendKind::Local {
                db_path: PathBuf::from(get("KEEPSAKE_DB_PATH", "keepsake.db")),
                storage_dir: PathBuf::from(get("KEEPSAKE_STORAGE_DIR", "./storage")),
            },
            "hosted" => BackendKind::Hosted {
                url: var("KEEPSAKE_HOSTED_URL")
                    .context("KEEPSAKE_HOSTED_URL is required for the hosted backend")?,
                api_key: var("KEEPSAKE_HOSTED_KEY")
                    .context("KEEPSAKE_HOSTED_KEY is required for the hosted backend")?,
            },
            other => bail!("KEEPSAKE_BACKEND must be 'local' or 'hosted', got '{}'", other),
        };

        Ok(Self {
            addr,
            public_url: get("KEEPSAKE_PUBLIC_URL", "http://localhost:3000"),
            backend,
        })
    }
}
