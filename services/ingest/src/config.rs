use crate::loader::{Tables, DEFAULT_CHUNK_SIZE};
use crate::pg::is_identifier;
use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: String,
    pub tables: Tables,
    pub chunk_size: usize,
    pub max_connections: u32,
}

impl Config {
    /// `DB_URL` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let db_url = std::env::var("DB_URL").context("DB_URL env var missing")?;
        Self::from_lookup(db_url, |key| std::env::var(key).ok())
    }

    /// Used by dry runs, which never connect.
    pub fn without_db() -> Result<Self> {
        Self::from_lookup(String::new(), |key| std::env::var(key).ok())
    }

    fn from_lookup(db_url: String, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Tables::default();
        let tables = Tables {
            summary: var("SUMMARY_TABLE").unwrap_or(defaults.summary),
            monthly: var("MONTHLY_TABLE").unwrap_or(defaults.monthly),
        };
        for name in [&tables.summary, &tables.monthly] {
            if !is_identifier(name) {
                bail!("Invalid table name: {:?}", name);
            }
        }

        Ok(Self {
            db_url,
            tables,
            chunk_size: var("INSERT_CHUNK_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(5),
        })
    }
}
