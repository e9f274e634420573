use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tastebite_core::app_error::{AppError, StdResponse};
use uuid::Uuid;

use crate::api::ApiUrls;

#[derive(Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
}

/// Resolves a bearer token against the session provider.
pub async fn get_current_session(client: &Client, token: &str) -> Result<SessionUser> {
    let url = ApiUrls::get_session_service_url();
    let session: StdResponse<SessionUser, String> = client
        .get(format!("{}/sessions/current", url))
        .bearer_auth(token)
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("SessionService".into()))?
        .json()
        .await
        .context("Failed to parse JSON")?;

    match session.data {
        Some(session) => Ok(session),
        None => Err(anyhow::anyhow!("Session not found")),
    }
}
