use anyhow::Result;

use crate::{aliases::DbPool, config::Config, db};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self> {
        let db_pool = db::create_pool(&config.database.url).await?;
        Ok(Self { db_pool })
    }
}
