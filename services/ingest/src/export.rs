//! Writes the cleaned tables back out as UTF-8 CSV.

use crate::records::{IdentityFields, MonthlyRecord, SummaryRecord, MONTHLY_COLUMNS, SUMMARY_COLUMNS};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};

/// `<stem>_<YYYY-MM-DD>.csv`
pub fn dated_file_name(stem: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", stem, date.format("%Y-%m-%d"))
}

fn identity_cells(id: &IdentityFields) -> [&str; 5] {
    [
        &id.salesperson,
        &id.customer_id,
        &id.customer_name,
        &id.product_family,
        &id.kind,
    ]
}

pub fn write_summary_csv<W: Write>(out: W, rows: &[SummaryRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(SUMMARY_COLUMNS)?;
    for row in rows {
        let mut record: Vec<String> = identity_cells(&row.identity)
            .iter()
            .map(|s| s.to_string())
            .collect();
        record.push(row.accumulated_current.to_string());
        record.push(row.accumulated_prior.to_string());
        record.push(row.percent_of_target.to_string());
        record.push(row.growth.map(|g| g.to_string()).unwrap_or_default());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_monthly_csv<W: Write>(out: W, rows: &[MonthlyRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(MONTHLY_COLUMNS)?;
    for row in rows {
        let mut record: Vec<String> = identity_cells(&row.identity)
            .iter()
            .map(|s| s.to_string())
            .collect();
        record.push(row.month.clone());
        record.push(row.value.to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write both tables into `dir`, named after their tables and `date`.
/// Returns the two paths written.
pub fn export_tables(
    dir: &Path,
    summary_stem: &str,
    monthly_stem: &str,
    summary: &[SummaryRecord],
    monthly: &[MonthlyRecord],
    date: NaiveDate,
) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export dir {}", dir.display()))?;

    let summary_path = dir.join(dated_file_name(summary_stem, date));
    let file = std::fs::File::create(&summary_path)
        .with_context(|| format!("Failed to create {}", summary_path.display()))?;
    write_summary_csv(file, summary)?;

    let monthly_path = dir.join(dated_file_name(monthly_stem, date));
    let file = std::fs::File::create(&monthly_path)
        .with_context(|| format!("Failed to create {}", monthly_path.display()))?;
    write_monthly_csv(file, monthly)?;

    Ok((summary_path, monthly_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> IdentityFields {
        IdentityFields {
            salesperson: "Ana".into(),
            customer_id: "C001".into(),
            customer_name: "ACME, Lda".into(),
            product_family: "Bebidas".into(),
            kind: "B2B".into(),
        }
    }

    #[test]
    fn test_dated_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(dated_file_name("vendas_resumo", date), "vendas_resumo_2024-03-07.csv");
    }

    #[test]
    fn test_summary_csv_quotes_and_blank_growth() {
        let rows = vec![
            SummaryRecord {
                identity: identity(),
                accumulated_current: 1234.56,
                accumulated_prior: 0.0,
                percent_of_target: 87.0,
                growth: None,
            },
            SummaryRecord {
                identity: identity(),
                accumulated_current: 120.0,
                accumulated_prior: 100.0,
                percent_of_target: 0.0,
                growth: Some(20.0),
            },
        ];
        let mut buf = Vec::new();
        write_summary_csv(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Vendedor,No_cliente,Cliente,Familia,Tipo,Acum_ac,Acum_aa,Per_acum,Crescimento"
        );
        assert_eq!(lines[1], "Ana,C001,\"ACME, Lda\",Bebidas,B2B,1234.56,0,87,");
        assert_eq!(lines[2], "Ana,C001,\"ACME, Lda\",Bebidas,B2B,120,100,0,20");
    }

    #[test]
    fn test_monthly_csv() {
        let rows = vec![MonthlyRecord {
            identity: identity(),
            month: "Jan".into(),
            value: 10.5,
        }];
        let mut buf = Vec::new();
        write_monthly_csv(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Vendedor,No_cliente,Cliente,Familia,Tipo,Mes,Valor\nAna,C001,\"ACME, Lda\",Bebidas,B2B,Jan,10.5\n"
        );
    }

    #[test]
    fn test_export_tables_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        let (summary_path, monthly_path) =
            export_tables(&out, "vendas_resumo", "vendas_mensais", &[], &[], date).unwrap();

        assert!(summary_path.ends_with("vendas_resumo_2024-01-31.csv"));
        assert!(monthly_path.ends_with("vendas_mensais_2024-01-31.csv"));
        let header = std::fs::read_to_string(&monthly_path).unwrap();
        assert_eq!(header, "Vendedor,No_cliente,Cliente,Familia,Tipo,Mes,Valor\n");
    }
}
