//! Splits each raw row into identity, year-to-date and monthly figures, and
//! melts the monthly columns into one record per (row, month).
//!
//! Column roles are positional: the first five columns identify the row and
//! are kept as text, every later column is a number. Which logical field a
//! column holds is decided by its label, resolved once per file.

use crate::error::{ReadError, RowWarning, SkipReason};
use crate::growth::growth;
use crate::normalize::{capitalize, clean_text, header_key, parse_locale_cell};
use crate::reader::{RawRow, RawTable};
use crate::records::{IdentityFields, MonthlyRecord, SummaryRecord};
use tracing::{debug, info, warn};

/// Leading columns that are never parsed as numbers.
pub const IDENTITY_COLUMNS: usize = 5;

// Accepted spellings per field, as folded header keys. Earlier entries win.
const SALESPERSON_KEYS: &[&str] = &["vendedor", "vendedora", "comercial", "salesperson"];
const CUSTOMER_ID_KEYS: &[&str] = &[
    "no_cliente",
    "n_cliente",
    "num_cliente",
    "numero_cliente",
    "cod_cliente",
    "codigo_cliente",
    "customer_id",
];
const CUSTOMER_NAME_KEYS: &[&str] = &["cliente", "nome_cliente", "customer_name", "customer"];
const FAMILY_KEYS: &[&str] = &["familia", "familia_produto", "product_family", "family"];
const TYPE_KEYS: &[&str] = &["tipo", "tipo_cliente", "type"];
const CURRENT_KEYS: &[&str] = &["acum_ac"];
const PRIOR_KEYS: &[&str] = &["acum_aa"];
const PERCENT_KEYS: &[&str] = &["per_acum", "perc_acum", "pct_acum"];

/// A month column and the label its values are filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyColumn {
    pub index: usize,
    pub month: String,
}

/// Where each logical field lives in this particular file.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    pub width: usize,
    pub salesperson: Option<usize>,
    pub customer_id: Option<usize>,
    pub customer_name: Option<usize>,
    pub product_family: Option<usize>,
    pub kind: Option<usize>,
    pub accumulated_current: Option<usize>,
    pub accumulated_prior: Option<usize>,
    pub percent_of_target: Option<usize>,
    pub monthly: Vec<MonthlyColumn>,
}

impl ColumnPlan {
    pub fn from_headers(headers: &[String]) -> Result<Self, ReadError> {
        if headers.len() < IDENTITY_COLUMNS {
            return Err(ReadError::TooFewColumns {
                found: headers.len(),
            });
        }

        let cleaned: Vec<String> = headers.iter().map(|h| clean_text(h)).collect();
        let keys: Vec<String> = cleaned.iter().map(|h| header_key(h)).collect();

        let mut monthly = Vec::new();
        for (index, label) in cleaned.iter().enumerate() {
            let Some(month) = monthly_label(label) else {
                continue;
            };
            if index < IDENTITY_COLUMNS {
                return Err(ReadError::MonthlyColumnInIdentityRange {
                    column: label.clone(),
                    position: index + 1,
                });
            }
            monthly.push(MonthlyColumn { index, month });
        }

        Ok(Self {
            width: headers.len(),
            salesperson: find_key(&keys, SALESPERSON_KEYS, 0),
            customer_id: find_key(&keys, CUSTOMER_ID_KEYS, 0),
            customer_name: find_key(&keys, CUSTOMER_NAME_KEYS, 0),
            product_family: find_key(&keys, FAMILY_KEYS, 0),
            kind: find_key(&keys, TYPE_KEYS, 0),
            accumulated_current: find_key(&keys, CURRENT_KEYS, IDENTITY_COLUMNS),
            accumulated_prior: find_key(&keys, PRIOR_KEYS, IDENTITY_COLUMNS),
            percent_of_target: find_key(&keys, PERCENT_KEYS, IDENTITY_COLUMNS),
            monthly,
        })
    }
}

/// First candidate (in candidate order) present among `keys[from..]`.
fn find_key(keys: &[String], candidates: &[&str], from: usize) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        keys.iter()
            .enumerate()
            .skip(from)
            .find(|(_, key)| key.as_str() == *candidate)
            .map(|(idx, _)| idx)
    })
}

/// Month label for a current-period month column ("JAN_ac" -> "Jan"), or
/// `None` for any other column. Accumulated columns ("Acum_ac") are not months.
pub fn monthly_label(label: &str) -> Option<String> {
    let lower = label.to_lowercase();
    if !lower.contains("_ac") || lower.contains("acum") {
        return None;
    }

    let stripped = if lower.ends_with("_ac") {
        &label[..label.len() - 3]
    } else {
        label
    };
    Some(capitalize(stripped.trim()))
}

/// A cell after position-based normalization.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
        }
    }

    fn number(&self) -> f64 {
        match self {
            Cell::Number(n) => *n,
            Cell::Text(_) => 0.0,
        }
    }
}

fn clean_row(row: &RawRow, width: usize) -> Vec<Cell> {
    (0..width)
        .map(|idx| {
            if idx < IDENTITY_COLUMNS {
                Cell::Text(clean_text(row.get(idx)))
            } else {
                Cell::Number(parse_locale_cell(row.cells.get(idx).map(String::as_str)))
            }
        })
        .collect()
}

/// Records produced from one file.
#[derive(Debug, Clone, Default)]
pub struct Reshaped {
    pub summary: Vec<SummaryRecord>,
    pub monthly: Vec<MonthlyRecord>,
    pub monthly_columns: usize,
    /// Skipped rows, in file order.
    pub warnings: Vec<RowWarning>,
}

/// Classify and melt every row of `table`. A bad row is skipped with a
/// warning; only a header that cannot be planned fails the whole table.
pub fn reshape(table: &RawTable) -> Result<Reshaped, ReadError> {
    let plan = ColumnPlan::from_headers(&table.headers)?;
    info!(
        columns = plan.width,
        monthly = plan.monthly.len(),
        months = ?plan.monthly.iter().map(|m| m.month.as_str()).collect::<Vec<_>>(),
        "resolved column plan"
    );
    debug!(?plan, "column plan detail");

    let mut out = Reshaped {
        summary: Vec::with_capacity(table.rows.len()),
        monthly: Vec::with_capacity(table.rows.len() * plan.monthly.len()),
        monthly_columns: plan.monthly.len(),
        warnings: table.warnings.clone(),
    };

    for row in &table.rows {
        match classify_row(&plan, row) {
            Ok((summary, monthly)) => {
                out.summary.push(summary);
                out.monthly.extend(monthly);
            }
            Err(reason) => {
                warn!(line = row.line, %reason, "skipping row");
                out.warnings.push(RowWarning {
                    line: row.line,
                    reason,
                });
            }
        }
    }

    out.warnings.sort_by_key(|w| w.line);
    Ok(out)
}

/// One row to its summary record and its monthly records.
pub fn classify_row(
    plan: &ColumnPlan,
    row: &RawRow,
) -> Result<(SummaryRecord, Vec<MonthlyRecord>), SkipReason> {
    if row.cells.iter().all(|c| c.trim().is_empty()) {
        return Err(SkipReason::EmptyRow);
    }

    if let Some(last) = row.cells.iter().rposition(|c| !c.trim().is_empty()) {
        if last >= plan.width {
            return Err(SkipReason::ExtraCells {
                expected: plan.width,
                found: last + 1,
            });
        }
    }

    let cells = clean_row(row, plan.width);
    let text = |idx: Option<usize>| idx.map(|i| cells[i].text()).unwrap_or_default();
    let number = |idx: Option<usize>| idx.map(|i| cells[i].number()).unwrap_or(0.0);

    let identity = IdentityFields {
        salesperson: text(plan.salesperson),
        customer_id: text(plan.customer_id),
        customer_name: text(plan.customer_name),
        product_family: text(plan.product_family),
        kind: text(plan.kind),
    };

    let accumulated_current = number(plan.accumulated_current);
    let accumulated_prior = number(plan.accumulated_prior);

    let monthly = plan
        .monthly
        .iter()
        .map(|col| MonthlyRecord {
            identity: identity.clone(),
            month: col.month.clone(),
            value: cells[col.index].number(),
        })
        .collect();

    let summary = SummaryRecord {
        identity,
        accumulated_current,
        accumulated_prior,
        percent_of_target: number(plan.percent_of_target),
        growth: growth(accumulated_current, accumulated_prior),
    };

    Ok((summary, monthly))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_csv;

    const HEADER: &str = "Vendedor,No_cliente,Cliente,Familia,Tipo,Acum_ac,Acum_aa,Jan_ac,Fev_ac";

    fn reshape_csv(csv: &str) -> Reshaped {
        let table = read_csv(csv.as_bytes(), b',').unwrap();
        reshape(&table).unwrap()
    }

    /// Table built without going through the codepage decoder.
    fn table(headers: &str, rows: &[&str]) -> RawTable {
        RawTable {
            headers: headers.split(',').map(str::to_string).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, r)| RawRow {
                    line: i + 2,
                    cells: r.split(',').map(str::to_string).collect(),
                })
                .collect(),
            warnings: Vec::new(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -------------------------------------------------------------------------
    // END TO END
    // -------------------------------------------------------------------------

    #[test]
    fn test_single_row_summary_and_months() {
        let csv = format!(
            "{}\nAna,1,ACME,Bebidas,B2B,\"1.200,50\",\"1.000,00\",\"600,00\",\"600,50\"\n",
            HEADER
        );
        let out = reshape_csv(&csv);

        assert_eq!(out.summary.len(), 1);
        let s = &out.summary[0];
        assert_eq!(s.identity.salesperson, "Ana");
        assert_eq!(s.identity.customer_id, "1");
        assert_eq!(s.identity.customer_name, "ACME");
        assert_eq!(s.identity.product_family, "Bebidas");
        assert_eq!(s.identity.kind, "B2B");
        assert_eq!(s.accumulated_current, 1200.50);
        assert_eq!(s.accumulated_prior, 1000.00);
        assert_eq!(s.percent_of_target, 0.0);
        assert!(approx(s.growth.unwrap(), 20.05));

        assert_eq!(out.monthly.len(), 2);
        assert_eq!(out.monthly[0].month, "Jan");
        assert_eq!(out.monthly[0].value, 600.00);
        assert_eq!(out.monthly[1].month, "Fev");
        assert_eq!(out.monthly[1].value, 600.50);
        assert_eq!(out.monthly[1].identity, s.identity);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_reshape_determinism() {
        let csv = format!(
            "{}\nAna,1,ACME,Bebidas,B2B,\"1.200,50\",\"1.000,00\",\"600,00\",\"600,50\"\nRui,2,Beta,Vinhos,B2C,10,0,5,5\n",
            HEADER
        );
        let a = reshape_csv(&csv);
        for _ in 0..10 {
            let b = reshape_csv(&csv);
            assert_eq!(a.summary, b.summary);
            assert_eq!(a.monthly, b.monthly);
        }
    }

    // -------------------------------------------------------------------------
    // FAN-OUT
    // -------------------------------------------------------------------------

    #[test]
    fn test_row_count_and_month_fan_out() {
        let mut csv = format!("{},Mar_ac\n", HEADER);
        for i in 0..7 {
            csv.push_str(&format!("V{},{},C{},F,T,1,1,1,1,1\n", i, i, i));
        }
        let out = reshape_csv(&csv);
        assert_eq!(out.monthly_columns, 3);
        assert_eq!(out.summary.len(), 7);
        assert_eq!(out.monthly.len(), 7 * 3);
    }

    #[test]
    fn test_no_monthly_columns() {
        let csv = "Vendedor,No_cliente,Cliente,Familia,Tipo,Acum_ac,Acum_aa\nAna,1,ACME,B,T,5,4\n";
        let out = reshape_csv(csv);
        assert_eq!(out.summary.len(), 1);
        assert!(out.monthly.is_empty());
    }

    // -------------------------------------------------------------------------
    // GROWTH
    // -------------------------------------------------------------------------

    #[test]
    fn test_growth_undefined_without_prior() {
        let csv = format!("{}\nAna,1,ACME,B,T,\"500,00\",0,0,0\n", HEADER);
        let out = reshape_csv(&csv);
        assert_eq!(out.summary[0].growth, None);
    }

    #[test]
    fn test_growth_negative() {
        let csv = format!("{}\nAna,1,ACME,B,T,80,100,0,0\n", HEADER);
        let out = reshape_csv(&csv);
        assert_eq!(out.summary[0].growth, Some(-20.0));
    }

    // -------------------------------------------------------------------------
    // IDENTITY FIELDS
    // -------------------------------------------------------------------------

    #[test]
    fn test_identity_alternate_spellings() {
        let out = reshape(&table(
            "VENDEDOR,Nº cliente,cliente,Família,tipo,acum_ac,ACUM_AA,Per_acum",
            &["Ana,7,ACME,Bebidas,B2B,10,5,87"],
        ))
        .unwrap();
        let s = &out.summary[0];
        assert_eq!(s.identity.salesperson, "Ana");
        assert_eq!(s.identity.customer_id, "7");
        assert_eq!(s.identity.customer_name, "ACME");
        assert_eq!(s.identity.product_family, "Bebidas");
        assert_eq!(s.identity.kind, "B2B");
        assert_eq!(s.accumulated_current, 10.0);
        assert_eq!(s.accumulated_prior, 5.0);
        assert_eq!(s.percent_of_target, 87.0);
    }

    #[test]
    fn test_identity_mojibake_header_and_values() {
        // "Fam\u{fffd}lia" is how "Família" arrives from some exports.
        let out = reshape(&table(
            "Vendedor,No_cliente,Cliente,Fam\u{fffd}lia,Tipo,Acum_ac",
            &[" Jo¢o ,1,Caf€,Bebidas,B2B,1"],
        ))
        .unwrap();
        let s = &out.summary[0];
        assert_eq!(s.identity.salesperson, "Jooo");
        assert_eq!(s.identity.customer_name, "Cafe");
        assert_eq!(s.identity.product_family, "Bebidas");
    }

    #[test]
    fn test_missing_identity_fields_are_empty() {
        let csv = "A,B,C,D,E,Acum_ac,Acum_aa\nx,y,z,w,v,10,5\n";
        let out = reshape_csv(csv);
        assert_eq!(out.summary.len(), 1);
        assert_eq!(out.summary[0].identity, IdentityFields::default());
        assert_eq!(out.summary[0].accumulated_current, 10.0);
    }

    #[test]
    fn test_missing_metric_columns_default_to_zero() {
        let csv = "Vendedor,No_cliente,Cliente,Familia,Tipo,Outro\nAna,1,ACME,B,T,9\n";
        let out = reshape_csv(csv);
        let s = &out.summary[0];
        assert_eq!(s.accumulated_current, 0.0);
        assert_eq!(s.accumulated_prior, 0.0);
        assert_eq!(s.percent_of_target, 0.0);
        assert_eq!(s.growth, None);
    }

    #[test]
    fn test_identity_columns_not_number_parsed() {
        let csv = format!("{}\nAna,\"1.234,5\",ACME,B,T,0,0,0,0\n", HEADER);
        let out = reshape_csv(&csv);
        assert_eq!(out.summary[0].identity.customer_id, "1.234,5");
    }

    #[test]
    fn test_garbage_numbers_become_zero() {
        let csv = format!("{}\nAna,1,ACME,B,T,abc,,n/a,\n", HEADER);
        let out = reshape_csv(&csv);
        assert_eq!(out.summary[0].accumulated_current, 0.0);
        assert_eq!(out.monthly[0].value, 0.0);
        assert_eq!(out.monthly[1].value, 0.0);
    }

    #[test]
    fn test_short_row_is_padded_not_skipped() {
        let csv = format!("{}\nAna,1,ACME\n", HEADER);
        let out = reshape_csv(&csv);
        assert_eq!(out.summary.len(), 1);
        assert_eq!(out.summary[0].identity.product_family, "");
        assert_eq!(out.monthly.len(), 2);
    }

    // -------------------------------------------------------------------------
    // MONTH COLUMNS
    // -------------------------------------------------------------------------

    #[test]
    fn test_monthly_label_rules() {
        assert_eq!(monthly_label("Jan_ac"), Some("Jan".to_string()));
        assert_eq!(monthly_label("FEV_AC"), Some("Fev".to_string()));
        assert_eq!(monthly_label("setembro_ac"), Some("Setembro".to_string()));
        assert_eq!(monthly_label("Acum_ac"), None);
        assert_eq!(monthly_label("Per_acum"), None);
        assert_eq!(monthly_label("Jan_aa"), None);
        assert_eq!(monthly_label("Vendedor"), None);
    }

    #[test]
    fn test_monthly_label_without_trailing_suffix() {
        // Detected as a month column, but only a trailing suffix is stripped.
        assert_eq!(monthly_label("jan_ac_2024"), Some("Jan_ac_2024".to_string()));
    }

    #[test]
    fn test_prior_year_months_are_not_melted() {
        let csv = "Vendedor,No_cliente,Cliente,Familia,Tipo,Acum_ac,Acum_aa,Jan_ac,Jan_aa\nAna,1,A,B,T,1,1,2,3\n";
        let out = reshape_csv(csv);
        assert_eq!(out.monthly.len(), 1);
        assert_eq!(out.monthly[0].value, 2.0);
    }

    // -------------------------------------------------------------------------
    // HEADER SHAPE
    // -------------------------------------------------------------------------

    #[test]
    fn test_too_few_columns_fails() {
        let table = read_csv(b"Vendedor,Cliente,Acum_ac\nAna,ACME,1\n", b',').unwrap();
        assert!(matches!(
            reshape(&table),
            Err(ReadError::TooFewColumns { found: 3 })
        ));
    }

    #[test]
    fn test_monthly_column_in_identity_range_fails() {
        let table = read_csv(
            b"Vendedor,Jan_ac,Cliente,Familia,Tipo,Acum_ac\nAna,1,ACME,B,T,1\n",
            b',',
        )
        .unwrap();
        match reshape(&table) {
            Err(ReadError::MonthlyColumnInIdentityRange { column, position }) => {
                assert_eq!(column, "Jan_ac");
                assert_eq!(position, 2);
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.summary.len())),
        }
    }

    #[test]
    fn test_plan_resolves_once_from_headers() {
        let headers: Vec<String> = HEADER.split(',').map(str::to_string).collect();
        let plan = ColumnPlan::from_headers(&headers).unwrap();
        assert_eq!(plan.salesperson, Some(0));
        assert_eq!(plan.customer_id, Some(1));
        assert_eq!(plan.customer_name, Some(2));
        assert_eq!(plan.accumulated_current, Some(5));
        assert_eq!(plan.accumulated_prior, Some(6));
        assert_eq!(plan.percent_of_target, None);
        assert_eq!(
            plan.monthly,
            vec![
                MonthlyColumn { index: 7, month: "Jan".into() },
                MonthlyColumn { index: 8, month: "Fev".into() },
            ]
        );
    }

    // -------------------------------------------------------------------------
    // ROW-LEVEL FAILURES
    // -------------------------------------------------------------------------

    #[test]
    fn test_blank_row_skipped_with_warning() {
        let csv = format!("{}\n,,,,,,,,\nAna,1,A,B,T,1,1,1,1\n", HEADER);
        let out = reshape_csv(&csv);
        assert_eq!(out.summary.len(), 1);
        assert_eq!(out.monthly.len(), 2);
        assert_eq!(
            out.warnings,
            vec![RowWarning { line: 2, reason: SkipReason::EmptyRow }]
        );
    }

    #[test]
    fn test_row_with_extra_cells_skipped() {
        // Unquoted comma in the customer name shifts every later column.
        let csv = format!(
            "{}\nAna,1,ACME, Lda,B,T,1,1,1,1\nRui,2,Beta,B,T,1,1,1,1\n",
            HEADER
        );
        let out = reshape_csv(&csv);
        assert_eq!(out.summary.len(), 1);
        assert_eq!(out.summary[0].identity.salesperson, "Rui");
        assert_eq!(
            out.warnings,
            vec![RowWarning {
                line: 2,
                reason: SkipReason::ExtraCells { expected: 9, found: 10 }
            }]
        );
    }

    #[test]
    fn test_trailing_blank_cells_tolerated() {
        let csv = format!("{}\nAna,1,A,B,T,1,1,1,1,,\n", HEADER);
        let out = reshape_csv(&csv);
        assert_eq!(out.summary.len(), 1);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_bad_rows_do_not_abort_batch() {
        let mut csv = format!("{}\n", HEADER);
        for i in 0..5 {
            csv.push_str(&format!("V{},1,C,F,T,1,1,1,1\n", i));
            csv.push_str(",,,,,,,,\n");
        }
        let out = reshape_csv(&csv);
        assert_eq!(out.summary.len(), 5);
        assert_eq!(out.monthly.len(), 5 * 2);
        assert_eq!(out.warnings.len(), 5);
        assert!(out.warnings.windows(2).all(|w| w[0].line < w[1].line));
    }
}
