use serde::{Deserialize, Serialize};

/// Body of `POST /findById/party`.
#[derive(Debug, Serialize)]
pub struct FindPartyRequest<'a> {
    /// INN or OGRN to look up.
    pub query: &'a str,
}

/// Response envelope; an empty `suggestions` list means no match.
#[derive(Debug, Deserialize)]
pub struct SuggestionsResponse {
    #[serde(default)]
    pub suggestions: Vec<PartySuggestion>,
}

#[derive(Debug, Deserialize)]
pub struct PartySuggestion {
    /// Display name, usually the short name with legal form.
    pub value: Option<String>,
    pub data: PartyData,
}

/// Company card. Every attribute is optional in practice.
#[derive(Debug, Default, Deserialize)]
pub struct PartyData {
    pub inn: Option<String>,
    pub kpp: Option<String>,
    pub ogrn: Option<String>,
    pub name: Option<PartyName>,
    pub address: Option<PartyAddress>,
    /// Main activity code.
    pub okved: Option<String>,
    pub okveds: Option<Vec<OkvedEntry>>,
    /// Older cards carry the activity list under this key instead.
    pub okved_detailed: Option<Vec<OkvedEntry>>,
    pub state: Option<PartyState>,
    pub capital: Option<PartyCapital>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartyName {
    pub full_with_opf: Option<String>,
    pub short_with_opf: Option<String>,
    pub full: Option<String>,
    pub short: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartyAddress {
    pub value: Option<String>,
    pub unrestricted_value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OkvedEntry {
    pub main: Option<bool>,
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartyState {
    /// ACTIVE, LIQUIDATING, LIQUIDATED, BANKRUPT, REORGANIZING.
    pub status: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub registration_date: Option<i64>,
    pub liquidation_date: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartyCapital {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<f64>,
}
