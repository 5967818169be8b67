/// Enrichment of client payloads from an external company directory.
///
/// The directory is reached through the [`CompanyLookup`] trait so request
/// handling never depends on a concrete provider:
/// 1. Decide whether a create payload qualifies (`should_enrich`)
/// 2. Look the tax id up (`CompanyLookup::find_by_inn`)
/// 3. Fill the fields the caller left unset (`fill_missing`)
use crate::errors::EnrichmentError;
use crate::models::{ClientPayload, ClientStatus, DataSource};
use crate::validation::{
    normalize_capital, validate_kpp, validate_max_chars, validate_ogrn, FULL_NAME_MAX,
    OKVED_MAX, SHORT_NAME_MAX,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

/// Company details returned by a directory, already mapped onto client fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyRecord {
    pub full_name: Option<String>,
    pub short_name: Option<String>,
    pub inn: Option<String>,
    pub kpp: Option<String>,
    pub ogrn: Option<String>,
    pub address: Option<String>,
    pub okved: Option<String>,
    pub reg_date: Option<NaiveDate>,
    pub authorized_capital: Option<BigDecimal>,
    pub status: ClientStatus,
}

/// Lookup of a company by national tax id.
///
/// One attempt per call; implementations map every failure onto
/// [`EnrichmentError`].
#[async_trait]
pub trait CompanyLookup: Send + Sync {
    async fn find_by_inn(&self, inn: &str) -> Result<CompanyRecord, EnrichmentError>;
}

/// Whether a create payload should be completed from the directory.
///
/// Requires a tax id, a source marked for enrichment and at least one
/// descriptive field left unset. Returns the tax id to look up.
pub fn should_enrich<'a>(payload: &'a ClientPayload, source: &DataSource) -> Option<&'a str> {
    if !source.triggers_enrichment() {
        return None;
    }
    let inn = payload
        .inn
        .as_ref()
        .and_then(|v| v.as_deref())
        .filter(|v| !v.trim().is_empty())?;

    let missing = text_unset(&payload.full_name)
        || text_unset(&payload.short_name)
        || text_unset(&payload.kpp)
        || text_unset(&payload.ogrn)
        || text_unset(&payload.address)
        || text_unset(&payload.okved)
        || value_unset(&payload.reg_date)
        || value_unset(&payload.authorized_capital)
        || text_unset(&payload.status);

    missing.then_some(inn)
}

/// Copies directory values into the fields the caller left unset.
///
/// `inn` and `data_source` are never touched.
pub fn fill_missing(payload: &mut ClientPayload, record: &CompanyRecord) {
    fill_text(&mut payload.full_name, &record.full_name);
    fill_text(&mut payload.short_name, &record.short_name);
    fill_text(&mut payload.kpp, &record.kpp);
    fill_text(&mut payload.ogrn, &record.ogrn);
    fill_text(&mut payload.address, &record.address);
    fill_text(&mut payload.okved, &record.okved);
    fill_value(&mut payload.reg_date, &record.reg_date);
    fill_value(&mut payload.authorized_capital, &record.authorized_capital);
    fill_text(
        &mut payload.status,
        &Some(record.status.as_str().to_string()),
    );
}

/// Drops directory values that would not pass client field validation.
///
/// Returns the names of the discarded fields. Individual entrepreneurs, for
/// instance, carry a 15-digit OGRNIP that the `ogrn` field does not accept.
pub fn discard_invalid(record: &mut CompanyRecord) -> Vec<&'static str> {
    let mut dropped = Vec::new();
    check_text(&mut record.full_name, "full_name", &mut dropped, |v| {
        validate_max_chars(v, FULL_NAME_MAX)
    });
    check_text(&mut record.short_name, "short_name", &mut dropped, |v| {
        validate_max_chars(v, SHORT_NAME_MAX)
    });
    check_text(&mut record.kpp, "kpp", &mut dropped, validate_kpp);
    check_text(&mut record.ogrn, "ogrn", &mut dropped, validate_ogrn);
    check_text(&mut record.okved, "okved", &mut dropped, |v| {
        validate_max_chars(v, OKVED_MAX)
    });

    if let Some(capital) = record.authorized_capital.take() {
        match normalize_capital(&capital) {
            Ok(normalized) => record.authorized_capital = Some(normalized),
            Err(_) => dropped.push("authorized_capital"),
        }
    }
    dropped
}

fn check_text<F>(
    value: &mut Option<String>,
    field: &'static str,
    dropped: &mut Vec<&'static str>,
    check: F,
) where
    F: Fn(&str) -> Result<(), String>,
{
    if value.as_deref().is_some_and(|v| check(v).is_err()) {
        *value = None;
        dropped.push(field);
    }
}

fn text_unset(value: &Option<Option<String>>) -> bool {
    match value {
        None | Some(None) => true,
        Some(Some(s)) => s.trim().is_empty(),
    }
}

fn value_unset<T>(value: &Option<Option<T>>) -> bool {
    matches!(value, None | Some(None))
}

fn fill_text(target: &mut Option<Option<String>>, source: &Option<String>) {
    if !text_unset(target) {
        return;
    }
    if let Some(value) = source.as_ref().filter(|v| !v.trim().is_empty()) {
        *target = Some(Some(value.clone()));
    }
}

fn fill_value<T: Clone>(target: &mut Option<Option<T>>, source: &Option<T>) {
    if !value_unset(target) {
        return;
    }
    if let Some(value) = source {
        *target = Some(Some(value.clone()));
    }
}
