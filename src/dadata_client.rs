use crate::config::Config;
use crate::dadata_models::{FindPartyRequest, PartyData, SuggestionsResponse};
use crate::enrichment::{CompanyLookup, CompanyRecord};
use crate::errors::{AppError, EnrichmentError};
use crate::models::ClientStatus;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate};
use std::str::FromStr;
use std::time::Duration;

/// Client for the DaData company directory (`findById/party`).
#[derive(Clone)]
pub struct DaDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DaDataClient {
    /// Creates a client from the application configuration.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_settings(
            config.dadata_base_url.clone(),
            config.dadata_api_key.clone(),
            config.dadata_timeout,
        )
    }

    /// Creates a client with an explicit endpoint, key and timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the suggestions API, without trailing slash.
    /// * `api_key` - API token; `None` makes every lookup fail with `NotConfigured`.
    /// * `timeout` - Bound on the whole request, including reading the body.
    pub fn with_settings(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create DaData client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetches the company card for `inn`.
    ///
    /// # Returns
    ///
    /// * `Result<PartyData, EnrichmentError>` - The first suggestion, or `NoMatch` when there is none.
    pub async fn find_party(&self, inn: &str) -> Result<PartyData, EnrichmentError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EnrichmentError::NotConfigured)?;

        let url = format!("{}/findById/party", self.base_url);
        tracing::info!("Looking up company by INN {} in DaData", inn);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", api_key))
            .header("Accept", "application/json")
            .json(&FindPartyRequest { query: inn })
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!("DaData returned {} for INN {}", status, inn);
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body: SuggestionsResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                EnrichmentError::Timeout
            } else {
                EnrichmentError::Decode(e.to_string())
            }
        })?;

        let suggestion = body
            .suggestions
            .into_iter()
            .next()
            .ok_or_else(|| EnrichmentError::NoMatch(inn.to_string()))?;

        tracing::info!(
            "DaData match for INN {}: {}",
            inn,
            suggestion.value.as_deref().unwrap_or("<unnamed>")
        );
        Ok(suggestion.data)
    }
}

#[async_trait]
impl CompanyLookup for DaDataClient {
    async fn find_by_inn(&self, inn: &str) -> Result<CompanyRecord, EnrichmentError> {
        self.find_party(inn).await.map(map_party)
    }
}

fn request_error(err: reqwest::Error) -> EnrichmentError {
    if err.is_timeout() {
        EnrichmentError::Timeout
    } else {
        EnrichmentError::Transport(err.to_string())
    }
}

/// Maps a DaData company card onto client fields.
pub fn map_party(data: PartyData) -> CompanyRecord {
    let name = data.name.unwrap_or_default();
    let address = data.address.unwrap_or_default();
    let state = data.state.unwrap_or_default();

    let okved = non_empty(data.okved).or_else(|| {
        let entries = data
            .okveds
            .filter(|e| !e.is_empty())
            .or(data.okved_detailed)
            .unwrap_or_default();
        let main = entries
            .iter()
            .position(|e| e.main == Some(true))
            .unwrap_or(0);
        entries.into_iter().nth(main).and_then(|e| non_empty(e.code))
    });

    CompanyRecord {
        full_name: non_empty(name.full_with_opf).or_else(|| non_empty(name.full)),
        short_name: non_empty(name.short_with_opf).or_else(|| non_empty(name.short)),
        inn: non_empty(data.inn),
        kpp: non_empty(data.kpp),
        ogrn: non_empty(data.ogrn),
        address: non_empty(address.unrestricted_value).or_else(|| non_empty(address.value)),
        okved,
        reg_date: state.registration_date.and_then(registration_date),
        authorized_capital: data.capital.and_then(|c| c.value).and_then(capital_amount),
        status: status_from_state(state.status.as_deref()),
    }
}

/// Company state to client status.
///
/// A company in liquidation is treated as reorganized until it is struck off.
pub fn status_from_state(state: Option<&str>) -> ClientStatus {
    match state {
        Some("LIQUIDATED") => ClientStatus::Liquidated,
        Some("LIQUIDATING") | Some("REORGANIZING") => ClientStatus::Reorganized,
        _ => ClientStatus::Active,
    }
}

fn registration_date(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

fn capital_amount(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        return None;
    }
    BigDecimal::from_str(&format!("{:.2}", value)).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
