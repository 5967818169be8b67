use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use crate::errors::FieldErrors;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

/// DataSource name that switches on enrichment from the company directory.
pub const ENRICHMENT_SOURCE_NAME: &str = "DaData";

// ============ Database Models ============

/// Lifecycle status of a legal entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    Liquidated,
    Reorganized,
}

impl ClientStatus {
    pub const ALL: [ClientStatus; 3] = [
        ClientStatus::Active,
        ClientStatus::Liquidated,
        ClientStatus::Reorganized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Liquidated => "liquidated",
            ClientStatus::Reorganized => "reorganized",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" is not a valid choice.", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ClientStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for ClientStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Named origin of client data.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct DataSource {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    /// Whether clients created against this source are enriched by tax id.
    pub fn triggers_enrichment(&self) -> bool {
        self.name.trim().eq_ignore_ascii_case(ENRICHMENT_SOURCE_NAME)
    }
}

/// A legal entity as stored and returned by the API.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Client {
    pub id: i64,
    /// Full legal name.
    pub full_name: Option<String>,
    pub short_name: Option<String>,
    /// Tax id (INN), 10 or 12 digits.
    pub inn: Option<String>,
    /// Registration reason code (KPP), 9 digits.
    pub kpp: Option<String>,
    /// State registration number (OGRN), 13 digits.
    pub ogrn: Option<String>,
    /// Registered address.
    pub address: Option<String>,
    /// Primary activity classification code (OKVED).
    pub okved: Option<String>,
    pub reg_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "10000.00")]
    pub authorized_capital: Option<BigDecimal>,
    #[sqlx(try_from = "String")]
    pub status: ClientStatus,
    /// Id of the referenced DataSource.
    pub data_source: i64,
    /// Name of the referenced DataSource (read-only).
    pub data_source_name: String,
    /// When the record was last verified against the enrichment provider.
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The writable column set of a client, already validated.
///
/// Stores persist it as-is; bookkeeping timestamps are managed by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientFields {
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
    pub data_source: i64,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl ClientFields {
    /// An empty field set pointing at `data_source`.
    pub fn new(data_source: i64) -> Self {
        Self {
            data_source,
            ..Self::default()
        }
    }
}

impl From<&Client> for ClientFields {
    fn from(client: &Client) -> Self {
        Self {
            full_name: client.full_name.clone(),
            short_name: client.short_name.clone(),
            inn: client.inn.clone(),
            kpp: client.kpp.clone(),
            ogrn: client.ogrn.clone(),
            address: client.address.clone(),
            okved: client.okved.clone(),
            reg_date: client.reg_date,
            authorized_capital: client.authorized_capital.clone(),
            status: client.status,
            data_source: client.data_source,
            last_checked_at: client.last_checked_at,
        }
    }
}

// ============ API Request/Response Models ============

/// Request body for create, full update and partial update of a client.
///
/// Every field is `None` when absent and `Some(None)` when sent as `null`.
/// Values of the wrong JSON type are not fatal: they are left out and
/// reported in `type_errors` under the field name, next to the format
/// errors found later. Read-only fields (`id`, `data_source_name`,
/// timestamps) and unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(from = "Map<String, Value>")]
pub struct ClientPayload {
    #[schema(value_type = Option<String>)]
    pub full_name: Option<Option<String>>,
    #[schema(value_type = Option<String>)]
    pub short_name: Option<Option<String>>,
    #[schema(value_type = Option<String>, example = "7707083893")]
    pub inn: Option<Option<String>>,
    #[schema(value_type = Option<String>, example = "773601001")]
    pub kpp: Option<Option<String>>,
    #[schema(value_type = Option<String>, example = "1027700132195")]
    pub ogrn: Option<Option<String>>,
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    #[schema(value_type = Option<String>, example = "64.19")]
    pub okved: Option<Option<String>>,
    #[schema(value_type = Option<String>, format = Date, example = "2002-08-16")]
    pub reg_date: Option<Option<NaiveDate>>,
    /// JSON string or number; at most 2 decimal places.
    #[schema(value_type = Option<String>, example = "10000.00")]
    pub authorized_capital: Option<Option<BigDecimal>>,
    #[schema(value_type = Option<ClientStatus>)]
    pub status: Option<Option<String>>,
    /// Id of an existing DataSource. Required on create and full update.
    #[schema(value_type = Option<i64>)]
    pub data_source: Option<Option<i64>>,
    /// Fields whose JSON value had an unusable type or format.
    #[serde(skip)]
    pub type_errors: FieldErrors,
}

impl From<Map<String, Value>> for ClientPayload {
    fn from(mut body: Map<String, Value>) -> Self {
        let mut errors = FieldErrors::new();
        let mut field = |name: &str, parse: fn(Value) -> Result<String, String>| {
            take_field(&mut body, name, &mut errors, parse)
        };
        let full_name = field("full_name", parse_text);
        let short_name = field("short_name", parse_text);
        let inn = field("inn", parse_text);
        let kpp = field("kpp", parse_text);
        let ogrn = field("ogrn", parse_text);
        let address = field("address", parse_text);
        let okved = field("okved", parse_text);
        let status = field("status", parse_choice);

        Self {
            full_name,
            short_name,
            inn,
            kpp,
            ogrn,
            address,
            okved,
            status,
            reg_date: take_field(&mut body, "reg_date", &mut errors, parse_date),
            authorized_capital: take_field(
                &mut body,
                "authorized_capital",
                &mut errors,
                parse_decimal,
            ),
            data_source: take_field(&mut body, "data_source", &mut errors, parse_pk),
            type_errors: errors,
        }
    }
}

/// Removes `name` from the body and parses it; failures are recorded and
/// the field is treated as absent.
fn take_field<T>(
    body: &mut Map<String, Value>,
    name: &str,
    errors: &mut FieldErrors,
    parse: fn(Value) -> Result<T, String>,
) -> Option<Option<T>> {
    match body.remove(name)? {
        Value::Null => Some(None),
        value => match parse(value) {
            Ok(parsed) => Some(Some(parsed)),
            Err(message) => {
                errors.add(name, message);
                None
            }
        },
    }
}

/// Strings as-is; numbers by their JSON text.
fn parse_text(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err("Not a valid string.".to_string()),
    }
}

/// Any scalar is compared against the choices by its text.
fn parse_choice(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn parse_date(value: Value) -> Result<NaiveDate, String> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| {
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".to_string()
        })
}

/// Decimal from a JSON string or number.
///
/// Numbers are read from their shortest decimal text so `12345.67` stays
/// `12345.67` rather than the nearest binary fraction.
fn parse_decimal(value: Value) -> Result<BigDecimal, String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    BigDecimal::from_str(&text).map_err(|_| "A valid number is required.".to_string())
}

/// Primary key from an integer or an integer string.
fn parse_pk(value: Value) -> Result<i64, String> {
    let parsed = match &value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        let kind = match value {
            Value::Bool(_) => "bool",
            Value::Number(_) => "float",
            Value::String(_) => "str",
            Value::Array(_) => "list",
            Value::Object(_) => "dict",
            Value::Null => "null",
        };
        format!("Incorrect type. Expected pk value, received {}.", kind)
    })
}

/// Request body for creating a data source.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct DataSourcePayload {
    #[schema(example = "DaData")]
    pub name: Option<String>,
}

/// Query string of list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// 1-based page number; omit to receive every record.
    pub page: Option<String>,
}

/// Offset/limit window applied by stores when listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
}

/// List envelope shared by the collection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(ClientList = ListResponse<Client>, DataSourceList = ListResponse<DataSource>)]
pub struct ListResponse<T> {
    /// Total number of records, independent of paging.
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Health check body.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
