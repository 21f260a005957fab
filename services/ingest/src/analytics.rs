//! Dashboard aggregations over persisted rows: totals, monthly trend,
//! rankings, heatmap and customer KPIs.

use crate::growth::growth;
use crate::records::{MonthlyRecord, SummaryRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Calendar order of the month labels the export uses.
pub const MONTHS_PT: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

pub const MONTH_NAMES_FULL: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
    "Outubro", "Novembro", "Dezembro",
];

/// 0-based calendar position of a month label, short or full name.
pub fn month_order(label: &str) -> Option<usize> {
    MONTHS_PT
        .iter()
        .position(|m| m.eq_ignore_ascii_case(label))
        .or_else(|| {
            let lower = label.to_lowercase();
            MONTH_NAMES_FULL
                .iter()
                .position(|m| m.to_lowercase() == lower || (lower == "marco" && *m == "Março"))
        })
}

// =============================================================================
// FILTERS
// =============================================================================

/// Dashboard filters. An empty list means "everything".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub vendedores: Vec<String>,
    #[serde(default)]
    pub clientes: Vec<String>,
    #[serde(default)]
    pub familias: Vec<String>,
    #[serde(default)]
    pub tipo: Option<String>,
    /// Only applies to monthly rows.
    #[serde(default)]
    pub meses: Vec<String>,
}

fn allowed(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|v| v == value)
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.vendedores.is_empty()
            && self.clientes.is_empty()
            && self.familias.is_empty()
            && self.tipo.is_none()
            && self.meses.is_empty()
    }

    pub fn matches_summary(&self, row: &SummaryRecord) -> bool {
        let id = &row.identity;
        allowed(&self.vendedores, &id.salesperson)
            && allowed(&self.clientes, &id.customer_name)
            && allowed(&self.familias, &id.product_family)
            && self.tipo.as_deref().map_or(true, |t| t == id.kind)
    }

    pub fn matches_monthly(&self, row: &MonthlyRecord) -> bool {
        let id = &row.identity;
        allowed(&self.vendedores, &id.salesperson)
            && allowed(&self.clientes, &id.customer_name)
            && allowed(&self.familias, &id.product_family)
            && self.tipo.as_deref().map_or(true, |t| t == id.kind)
            && allowed(&self.meses, &row.month)
    }
}

// =============================================================================
// TOTALS AND TREND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub accumulated_current: f64,
    pub accumulated_prior: f64,
    pub growth: Option<f64>,
}

pub fn totals(rows: &[SummaryRecord]) -> Totals {
    let accumulated_current = rows.iter().map(|r| r.accumulated_current).sum();
    let accumulated_prior = rows.iter().map(|r| r.accumulated_prior).sum();
    Totals {
        accumulated_current,
        accumulated_prior,
        growth: growth(accumulated_current, accumulated_prior),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthPoint {
    pub month: String,
    pub value: f64,
}

/// Sum per month label, in calendar order. Unrecognised labels go last, in
/// the order they were first seen.
pub fn monthly_trend(rows: &[MonthlyRecord]) -> Vec<MonthPoint> {
    let mut points: Vec<MonthPoint> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.month.as_str()).or_insert_with(|| {
            points.push(MonthPoint {
                month: row.month.clone(),
                value: 0.0,
            });
            points.len() - 1
        });
        points[slot].value += row.value;
    }

    // Stable sort keeps first-seen order among unknown labels.
    points.sort_by_key(|p| month_order(&p.month).unwrap_or(usize::MAX));
    points
}

/// Family x month pivot of monthly values.
pub fn heatmap(rows: &[MonthlyRecord]) -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut pivot: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows {
        *pivot
            .entry(row.identity.product_family.clone())
            .or_default()
            .entry(row.month.clone())
            .or_insert(0.0) += row.value;
    }
    pivot
}

// =============================================================================
// RANKINGS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Vendedor,
    Cliente,
    Familia,
    Tipo,
}

impl Dimension {
    fn key<'a>(&self, id: &'a crate::records::IdentityFields) -> &'a str {
        match self {
            Dimension::Vendedor => &id.salesperson,
            Dimension::Cliente => &id.customer_name,
            Dimension::Familia => &id.product_family,
            Dimension::Tipo => &id.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity {
    pub name: String,
    /// Salesperson of the first row seen, for customer rankings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salesperson: Option<String>,
    pub accumulated_current: f64,
    pub accumulated_prior: f64,
    pub growth: Option<f64>,
    /// Percent of the current total across all ranked entities.
    pub share: f64,
    pub rows: usize,
}

/// Group by `dimension`, sorted by current total, largest first.
pub fn ranking(rows: &[SummaryRecord], dimension: Dimension, limit: Option<usize>) -> Vec<RankedEntity> {
    let mut ranked: Vec<RankedEntity> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let name = dimension.key(&row.identity);
        let slot = *index.entry(name).or_insert_with(|| {
            ranked.push(RankedEntity {
                name: name.to_string(),
                salesperson: (dimension == Dimension::Cliente)
                    .then(|| row.identity.salesperson.clone()),
                accumulated_current: 0.0,
                accumulated_prior: 0.0,
                growth: None,
                share: 0.0,
                rows: 0,
            });
            ranked.len() - 1
        });
        let entry = &mut ranked[slot];
        entry.accumulated_current += row.accumulated_current;
        entry.accumulated_prior += row.accumulated_prior;
        entry.rows += 1;
    }

    let total: f64 = ranked.iter().map(|r| r.accumulated_current).sum();
    for entry in &mut ranked {
        entry.growth = growth(entry.accumulated_current, entry.accumulated_prior);
        entry.share = if total > 0.0 {
            entry.accumulated_current / total * 100.0
        } else {
            0.0
        };
    }

    ranked.sort_by(|a, b| b.accumulated_current.total_cmp(&a.accumulated_current));
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

// =============================================================================
// ENTITY DETAIL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownItem {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySeries {
    pub series: Vec<MonthPoint>,
    pub breakdown: Vec<BreakdownItem>,
}

/// Monthly series of one salesperson, customer or family, with a breakdown
/// by family (salesperson/customer) or by customer (family).
pub fn entity_series(rows: &[MonthlyRecord], dimension: Dimension, name: &str) -> EntitySeries {
    let matching: Vec<MonthlyRecord> = rows
        .iter()
        .filter(|r| dimension.key(&r.identity) == name)
        .cloned()
        .collect();

    let breakdown_by = match dimension {
        Dimension::Familia => Dimension::Cliente,
        _ => Dimension::Familia,
    };

    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for row in &matching {
        *sums.entry(breakdown_by.key(&row.identity)).or_insert(0.0) += row.value;
    }
    let mut breakdown: Vec<BreakdownItem> = sums
        .into_iter()
        .map(|(name, value)| BreakdownItem {
            name: name.to_string(),
            value,
        })
        .collect();
    breakdown.sort_by(|a, b| b.value.total_cmp(&a.value));

    EntitySeries {
        series: monthly_trend(&matching),
        breakdown,
    }
}

// =============================================================================
// CUSTOMER KPIS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveCustomers {
    pub current: usize,
    pub prior: usize,
    pub growth: Option<f64>,
}

/// Distinct customers with sales in the current and in the prior period.
pub fn active_customers(rows: &[SummaryRecord]) -> ActiveCustomers {
    let mut current = BTreeSet::new();
    let mut prior = BTreeSet::new();
    for row in rows {
        if row.accumulated_current > 0.0 {
            current.insert(row.identity.customer_name.as_str());
        }
        if row.accumulated_prior > 0.0 {
            prior.insert(row.identity.customer_name.as_str());
        }
    }
    ActiveCustomers {
        current: current.len(),
        prior: prior.len(),
        growth: growth(current.len() as f64, prior.len() as f64),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageTicket {
    pub current: f64,
    pub prior: f64,
    pub growth: Option<f64>,
}

/// Per-customer totals over customers active in the current period. The prior
/// average only counts those that also sold in the prior period.
pub fn average_ticket(rows: &[SummaryRecord]) -> AverageTicket {
    let mut per_customer: HashMap<&str, (f64, f64)> = HashMap::new();
    for row in rows.iter().filter(|r| r.accumulated_current > 0.0) {
        let entry = per_customer
            .entry(row.identity.customer_name.as_str())
            .or_insert((0.0, 0.0));
        entry.0 += row.accumulated_current;
        entry.1 += row.accumulated_prior;
    }

    let active = per_customer.len();
    let with_prior = per_customer.values().filter(|(_, p)| *p > 0.0).count();
    let total_current: f64 = per_customer.values().map(|(c, _)| c).sum();
    let total_prior: f64 = per_customer.values().map(|(_, p)| p).sum();

    let current = if active > 0 { total_current / active as f64 } else { 0.0 };
    let prior = if with_prior > 0 { total_prior / with_prior as f64 } else { 0.0 };
    AverageTicket {
        current,
        prior,
        growth: growth(current, prior),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concentration {
    pub customers: usize,
    pub top_count: usize,
    pub top_sales: f64,
    /// Percent of current sales held by the top 20% of customers.
    pub share: f64,
}

pub fn concentration(rows: &[SummaryRecord]) -> Concentration {
    let mut per_customer: HashMap<&str, f64> = HashMap::new();
    for row in rows.iter().filter(|r| r.accumulated_current > 0.0) {
        *per_customer
            .entry(row.identity.customer_name.as_str())
            .or_insert(0.0) += row.accumulated_current;
    }

    let mut sales: Vec<f64> = per_customer.into_values().collect();
    sales.sort_by(|a, b| b.total_cmp(a));

    let customers = sales.len();
    let top_count = (customers as f64 * 0.2).ceil() as usize;
    let total: f64 = sales.iter().sum();
    let top_sales: f64 = sales.iter().take(top_count).sum();

    Concentration {
        customers,
        top_count,
        top_sales,
        share: if total > 0.0 { top_sales / total * 100.0 } else { 0.0 },
    }
}

// =============================================================================
// FILTER OPTIONS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub vendedores: Vec<String>,
    pub clientes: Vec<String>,
    pub familias: Vec<String>,
    pub tipos: Vec<String>,
}

/// Sorted distinct non-empty values for each filterable field.
pub fn filter_options(rows: &[SummaryRecord]) -> FilterOptions {
    FilterOptions {
        vendedores: distinct(rows.iter().map(|r| r.identity.salesperson.as_str())),
        clientes: distinct(rows.iter().map(|r| r.identity.customer_name.as_str())),
        familias: distinct(rows.iter().map(|r| r.identity.product_family.as_str())),
        tipos: distinct(rows.iter().map(|r| r.identity.kind.as_str())),
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
