//! Sales export ingestion: read a CSV or workbook export, clean every cell,
//! split each row into a year-to-date summary and one record per month, and
//! replace the two persisted tables with the result.

pub mod analytics;
pub mod config;
pub mod error;
pub mod export;
pub mod growth;
pub mod loader;
pub mod normalize;
pub mod pg;
pub mod reader;
pub mod records;
pub mod reshape;

pub use error::{LoadError, ReadError, RowWarning, SkipReason};
pub use loader::{replace_all, SalesStore, Tables};
pub use reader::{ReadOptions, SourceFormat};
pub use records::{IdentityFields, MonthlyRecord, SummaryRecord};
pub use reshape::Reshaped;

use std::path::Path;

/// What one run produced, for the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub summary_rows: usize,
    pub monthly_rows: usize,
    pub monthly_columns: usize,
    pub warnings: Vec<RowWarning>,
}

impl Reshaped {
    pub fn report(&self) -> IngestReport {
        IngestReport {
            summary_rows: self.summary.len(),
            monthly_rows: self.monthly.len(),
            monthly_columns: self.monthly_columns,
            warnings: self.warnings.clone(),
        }
    }
}

/// Read and reshape an in-memory file.
pub fn ingest_bytes(
    bytes: &[u8],
    format: SourceFormat,
    options: &ReadOptions,
) -> Result<Reshaped, ReadError> {
    let table = reader::read_table(bytes, format, options)?;
    reshape::reshape(&table)
}

/// Read and reshape a file on disk.
pub async fn ingest_file(
    path: &Path,
    format: SourceFormat,
    options: &ReadOptions,
) -> Result<Reshaped, ReadError> {
    let table = reader::read_file(path, format, options).await?;
    reshape::reshape(&table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::MemoryStore;

    const EXPORT: &str = "Vendedor;No_cliente;Cliente;Familia;Tipo;Acum_ac;Acum_aa;Per_acum;Jan_ac;Fev_ac\n\
                          Ana;C001;ACME;Bebidas;B2B;1.234,56;1.000,00;87;600,00;634,56\n\
                          ;;;;;;;;;\n\
                          Rui;C002;Beta;Vinhos;B2C;50;0;;25;25\n";

    fn options() -> ReadOptions {
        ReadOptions { delimiter: b';' }
    }

    #[test]
    fn test_ingest_bytes_report() {
        let out = ingest_bytes(EXPORT.as_bytes(), SourceFormat::Csv, &options()).unwrap();
        let report = out.report();

        assert_eq!(report.summary_rows, 2);
        assert_eq!(report.monthly_rows, 4);
        assert_eq!(report.monthly_columns, 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].line, 3);
        assert_eq!(report.warnings[0].reason, SkipReason::EmptyRow);

        assert_eq!(out.summary[0].accumulated_current, 1234.56);
        assert!((out.summary[0].growth.unwrap() - 23.456).abs() < 1e-9);
        assert_eq!(out.summary[1].growth, None);
        assert_eq!(out.monthly[1].month, "Fev");
        assert_eq!(out.monthly[1].value, 634.56);
    }

    #[test]
    fn test_ingest_bytes_rejects_empty() {
        let err = ingest_bytes(b"  \n", SourceFormat::Csv, &options()).unwrap_err();
        assert!(matches!(err, ReadError::Empty));
    }

    #[tokio::test]
    async fn test_ingest_file_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        tokio::fs::write(&path, EXPORT).await.unwrap();

        let out = ingest_file(&path, SourceFormat::Csv, &options()).await.unwrap();
        let store = MemoryStore::default();
        let tables = Tables::default();
        let loaded = replace_all(&store, &tables, &out.summary, &out.monthly, 1)
            .await
            .unwrap();

        assert_eq!(loaded.summary_chunks, 2);
        assert_eq!(loaded.monthly_chunks, 4);
        let summary = store.summary.lock().unwrap();
        assert_eq!(summary["vendas_resumo"], out.summary);
        let monthly = store.monthly.lock().unwrap();
        assert_eq!(monthly["vendas_mensais"].len(), 4);
    }
}
