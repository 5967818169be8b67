//! Field-format checks for client payloads.
//!
//! Identifier rules are length and character-class only; no control-digit
//! algorithms are applied.

use crate::errors::FieldErrors;
use crate::models::{ClientFields, ClientPayload, ClientStatus};
use bigdecimal::BigDecimal;
use regex::Regex;
use std::sync::LazyLock;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const INN_OR_OGRN_REQUIRED: &str = "Either INN or OGRN must be provided.";

pub const FULL_NAME_MAX: usize = 500;
pub const SHORT_NAME_MAX: usize = 255;
pub const OKVED_MAX: usize = 100;
pub const DATA_SOURCE_NAME_MAX: usize = 255;

/// NUMERIC(20, 2)
const CAPITAL_DECIMAL_PLACES: i64 = 2;
const CAPITAL_WHOLE_DIGITS: u64 = 18;

static INN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$|^[0-9]{12}$").expect("valid INN pattern"));
static KPP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{9}$").expect("valid KPP pattern"));
static OGRN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13}$").expect("valid OGRN pattern"));

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Tax id: 10 or 12 ASCII digits.
pub fn validate_inn(value: &str) -> Result<(), String> {
    if !is_digits(value) {
        return Err("INN must contain only digits.".to_string());
    }
    if !INN_PATTERN.is_match(value) {
        return Err("INN must be 10 or 12 digits long.".to_string());
    }
    Ok(())
}

/// Registration reason code: exactly 9 ASCII digits.
pub fn validate_kpp(value: &str) -> Result<(), String> {
    if value.chars().count() != 9 {
        return Err("KPP must be exactly 9 digits long.".to_string());
    }
    if !KPP_PATTERN.is_match(value) {
        return Err("KPP must contain only digits.".to_string());
    }
    Ok(())
}

/// State registration number: exactly 13 ASCII digits.
pub fn validate_ogrn(value: &str) -> Result<(), String> {
    if !is_digits(value) {
        return Err("OGRN must contain only digits.".to_string());
    }
    if !OGRN_PATTERN.is_match(value) {
        return Err("OGRN must be exactly 13 digits long.".to_string());
    }
    Ok(())
}

pub fn validate_max_chars(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            max
        ));
    }
    Ok(())
}

/// Checks an amount against NUMERIC(20, 2) and rescales it to 2 places.
pub fn normalize_capital(value: &BigDecimal) -> Result<BigDecimal, String> {
    if *value < BigDecimal::from(0) {
        return Err("Ensure this value is greater than or equal to 0.".to_string());
    }
    let (_, scale) = value.normalized().as_bigint_and_exponent();
    if scale > CAPITAL_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            CAPITAL_DECIMAL_PLACES
        ));
    }
    let whole = value.with_scale(0);
    if whole != BigDecimal::from(0) && whole.digits() > CAPITAL_WHOLE_DIGITS {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            CAPITAL_WHOLE_DIGITS
        ));
    }
    Ok(value.with_scale(CAPITAL_DECIMAL_PLACES))
}

pub fn validate_data_source_name(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("This field may not be blank.".to_string());
    }
    validate_max_chars(value, DATA_SOURCE_NAME_MAX)
}

/// How absent payload fields are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Absent fields take their defaults.
    Create,
    /// Full update: absent fields are cleared to their defaults.
    Replace,
    /// Partial update: absent fields keep their current values.
    Patch,
}

/// Applies `payload` over `base`, validating every supplied field.
///
/// For [`WriteMode::Create`] and [`WriteMode::Replace`] the caller passes a
/// `base` holding only the resolved data source (and any bookkeeping it wants
/// to keep); for [`WriteMode::Patch`] it passes the stored record. All field
/// errors, including those found while reading the body, are collected
/// before returning.
pub fn build_fields(
    payload: &ClientPayload,
    base: ClientFields,
    mode: WriteMode,
) -> Result<ClientFields, FieldErrors> {
    let mut errors = payload.type_errors.clone();
    let mut fields = base;
    if mode != WriteMode::Patch {
        let keep = ClientFields {
            data_source: fields.data_source,
            last_checked_at: fields.last_checked_at,
            ..ClientFields::default()
        };
        fields = keep;
    }

    apply_text(&mut fields.full_name, &payload.full_name, "full_name", &mut errors, |v| {
        validate_max_chars(v, FULL_NAME_MAX)
    });
    apply_text(&mut fields.short_name, &payload.short_name, "short_name", &mut errors, |v| {
        validate_max_chars(v, SHORT_NAME_MAX)
    });
    apply_text(&mut fields.inn, &payload.inn, "inn", &mut errors, validate_inn);
    apply_text(&mut fields.kpp, &payload.kpp, "kpp", &mut errors, validate_kpp);
    apply_text(&mut fields.ogrn, &payload.ogrn, "ogrn", &mut errors, validate_ogrn);
    apply_text(&mut fields.address, &payload.address, "address", &mut errors, |_| Ok(()));
    apply_text(&mut fields.okved, &payload.okved, "okved", &mut errors, |v| {
        validate_max_chars(v, OKVED_MAX)
    });

    if let Some(reg_date) = &payload.reg_date {
        fields.reg_date = *reg_date;
    }

    if let Some(capital) = &payload.authorized_capital {
        fields.authorized_capital = match capital {
            None => None,
            Some(amount) => match normalize_capital(amount) {
                Ok(normalized) => Some(normalized),
                Err(message) => {
                    errors.add("authorized_capital", message);
                    None
                }
            },
        };
    }

    match &payload.status {
        None => {}
        Some(None) => errors.add("status", NOT_NULL),
        Some(Some(raw)) => match raw.parse::<ClientStatus>() {
            Ok(status) => fields.status = status,
            Err(e) => errors.add("status", e.to_string()),
        },
    }

    // Object-level rule only once the individual fields are sound.
    if errors.is_empty() && is_blank(&fields.inn) && is_blank(&fields.ogrn) {
        errors.add("inn", INN_OR_OGRN_REQUIRED);
        errors.add("ogrn", INN_OR_OGRN_REQUIRED);
    }

    if errors.is_empty() {
        Ok(fields)
    } else {
        Err(errors)
    }
}

fn apply_text<F>(
    target: &mut Option<String>,
    supplied: &Option<Option<String>>,
    field: &str,
    errors: &mut FieldErrors,
    check: F,
) where
    F: Fn(&str) -> Result<(), String>,
{
    match supplied {
        None => {}
        Some(None) => *target = None,
        Some(Some(value)) => match check(value) {
            Ok(()) => *target = Some(value.clone()),
            Err(message) => errors.add(field, message),
        },
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
