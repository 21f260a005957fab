//! Typed rows produced by one ingestion run.
//!
//! Serialized names match the columns of the persisted tables.

use serde::Serialize;

/// Column names of the summary table, in insert order.
pub const SUMMARY_COLUMNS: [&str; 9] = [
    "Vendedor",
    "No_cliente",
    "Cliente",
    "Familia",
    "Tipo",
    "Acum_ac",
    "Acum_aa",
    "Per_acum",
    "Crescimento",
];

/// Column names of the monthly table, in insert order.
pub const MONTHLY_COLUMNS: [&str; 7] = [
    "Vendedor",
    "No_cliente",
    "Cliente",
    "Familia",
    "Tipo",
    "Mes",
    "Valor",
];

/// Who sold what to whom. Missing fields are empty strings, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdentityFields {
    #[serde(rename = "Vendedor")]
    pub salesperson: String,
    #[serde(rename = "No_cliente")]
    pub customer_id: String,
    #[serde(rename = "Cliente")]
    pub customer_name: String,
    #[serde(rename = "Familia")]
    pub product_family: String,
    #[serde(rename = "Tipo")]
    pub kind: String,
}

/// Year-to-date figures for one input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    #[serde(flatten)]
    pub identity: IdentityFields,
    #[serde(rename = "Acum_ac")]
    pub accumulated_current: f64,
    #[serde(rename = "Acum_aa")]
    pub accumulated_prior: f64,
    #[serde(rename = "Per_acum")]
    pub percent_of_target: f64,
    /// Defined iff `accumulated_prior > 0`.
    #[serde(rename = "Crescimento")]
    pub growth: Option<f64>,
}

/// One month of one input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRecord {
    #[serde(flatten)]
    pub identity: IdentityFields,
    #[serde(rename = "Mes")]
    pub month: String,
    #[serde(rename = "Valor")]
    pub value: f64,
}
