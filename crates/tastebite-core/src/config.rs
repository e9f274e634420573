use std::env;

use anyhow::{Context, Result};

pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub struct DatabaseConfig {
    pub url: String,
}

pub fn load() -> Result<Config> {
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .context("PORT must be a valid port number")?;
    let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    Ok(Config {
        server: ServerConfig { host, port },
        database: DatabaseConfig { url },
    })
}
