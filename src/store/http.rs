//! HTTP client for the location store backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::LocationStore;
use crate::config::StoreConfig;
use crate::error::{SpotError, SpotResult};
use crate::models::{CreateOutcome, LocationRecord, NewStudySpot};

/// `{message, error}` body sent with store failures
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: Option<String>,
}

/// Location store reached over HTTP
#[derive(Clone)]
pub struct HttpLocationStore {
    client: Client,
    locations_url: Url,
    create_url: Url,
}

impl HttpLocationStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url).context("Invalid store base URL")?;
        // Without a trailing slash `join` would replace the last path segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            locations_url: base.join("locations")?,
            create_url: base.join("createstudyspot")?,
        })
    }
}

#[async_trait]
impl LocationStore for HttpLocationStore {
    async fn fetch_all(&self) -> SpotResult<Vec<LocationRecord>> {
        let response = self.client.get(self.locations_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(rejection(status, &text));
        }

        let records: Vec<LocationRecord> = response.json().await?;
        debug!("Fetched {} locations", records.len());
        Ok(records)
    }

    async fn create(&self, spot: &NewStudySpot) -> SpotResult<CreateOutcome> {
        let response = self
            .client
            .post(self.create_url.clone())
            .json(spot)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let outcome = create_outcome(status, &text)?;

        match &outcome {
            CreateOutcome::Created { .. } => info!("Created study spot '{}'", spot.key),
            CreateOutcome::AlreadyExists { .. } => {
                warn!("Study spot '{}' already exists", spot.key)
            }
        }
        Ok(outcome)
    }
}

/// Map the store's answer to a creation request
fn create_outcome(status: StatusCode, body: &str) -> SpotResult<CreateOutcome> {
    match status {
        StatusCode::CREATED => Ok(CreateOutcome::Created {
            message: success_message(body)?,
        }),
        // The backend answers 200 when the key is taken
        StatusCode::OK => Ok(CreateOutcome::AlreadyExists {
            message: success_message(body)?,
        }),
        _ => Err(rejection(status, body)),
    }
}

fn success_message(body: &str) -> SpotResult<String> {
    if body.trim().is_empty() {
        return Ok(String::new());
    }
    let body: MessageBody = serde_json::from_str(body)
        .map_err(|e| SpotError::InvalidResponse(format!("store reply: {}", e)))?;
    Ok(body.message.unwrap_or_default())
}

fn rejection(status: StatusCode, body: &str) -> SpotError {
    SpotError::StoreRejected {
        status: status.as_u16(),
        message: rejection_message(status, body),
    }
}

/// Human-readable reason from a failed store reply
fn rejection_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            error: Some(error),
        }) => format!("{}: {}", message, error),
        Ok(ErrorBody {
            message: Some(message),
            error: None,
        }) => message,
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        _ => body.to_string(),
    }
}
