//! PostgreSQL store for summary and monthly rows.

use crate::analytics::Filters;
use crate::error::LoadError;
use crate::loader::SalesStore;
use crate::records::{IdentityFields, MonthlyRecord, SummaryRecord, MONTHLY_COLUMNS, SUMMARY_COLUMNS};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

/// Plain SQL identifier: ASCII letter or underscore first, then letters,
/// digits or underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_ident(name: &str) -> Result<String, sqlx::Error> {
    if is_identifier(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(sqlx::Error::Protocol(format!("invalid table name {:?}", name)))
    }
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn fetch_summary(
        &self,
        table: &str,
        filters: &Filters,
    ) -> Result<Vec<SummaryRecord>, LoadError> {
        let query_err = |source: sqlx::Error| LoadError::Query {
            table: table.to_string(),
            source,
        };

        let mut qb = select_from(table, &SUMMARY_COLUMNS).map_err(query_err)?;
        push_identity_filters(&mut qb, filters);
        qb.push(" ORDER BY id");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(query_err)?;
        debug!(table, rows = rows.len(), "fetched summary rows");

        rows.iter()
            .map(|row| -> Result<SummaryRecord, sqlx::Error> {
                Ok(SummaryRecord {
                    identity: identity_from_row(row)?,
                    accumulated_current: row.try_get("Acum_ac")?,
                    accumulated_prior: row.try_get("Acum_aa")?,
                    percent_of_target: row.try_get("Per_acum")?,
                    growth: row.try_get("Crescimento")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)
    }

    pub async fn fetch_monthly(
        &self,
        table: &str,
        filters: &Filters,
    ) -> Result<Vec<MonthlyRecord>, LoadError> {
        let query_err = |source: sqlx::Error| LoadError::Query {
            table: table.to_string(),
            source,
        };

        let mut qb = select_from(table, &MONTHLY_COLUMNS).map_err(query_err)?;
        push_identity_filters(&mut qb, filters);
        if !filters.meses.is_empty() {
            qb.push(" AND \"Mes\" = ANY(")
                .push_bind(filters.meses.clone())
                .push(")");
        }
        qb.push(" ORDER BY id");

        let rows = qb.build().fetch_all(&self.pool).await.map_err(query_err)?;
        debug!(table, rows = rows.len(), "fetched monthly rows");

        rows.iter()
            .map(|row| -> Result<MonthlyRecord, sqlx::Error> {
                Ok(MonthlyRecord {
                    identity: identity_from_row(row)?,
                    month: text(row, "Mes")?,
                    value: row.try_get("Valor")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)
    }
}

fn select_from(table: &str, columns: &[&str]) -> Result<QueryBuilder<'static, Postgres>, sqlx::Error> {
    Ok(QueryBuilder::new(format!(
        "SELECT {} FROM {} WHERE TRUE",
        column_list(columns),
        quote_ident(table)?
    )))
}

fn push_identity_filters(qb: &mut QueryBuilder<'static, Postgres>, filters: &Filters) {
    for (column, values) in [
        ("Vendedor", &filters.vendedores),
        ("Cliente", &filters.clientes),
        ("Familia", &filters.familias),
    ] {
        if !values.is_empty() {
            qb.push(format!(" AND \"{}\" = ANY(", column))
                .push_bind(values.clone())
                .push(")");
        }
    }
    if let Some(tipo) = &filters.tipo {
        qb.push(" AND \"Tipo\" = ").push_bind(tipo.clone());
    }
}

/// Text columns may hold NULL when rows were written by other tools.
fn text(row: &PgRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn identity_from_row(row: &PgRow) -> Result<IdentityFields, sqlx::Error> {
    Ok(IdentityFields {
        salesperson: text(row, "Vendedor")?,
        customer_id: text(row, "No_cliente")?,
        customer_name: text(row, "Cliente")?,
        product_family: text(row, "Familia")?,
        kind: text(row, "Tipo")?,
    })
}

impl SalesStore for PgStore {
    async fn delete_all(&self, table: &str) -> Result<(), sqlx::Error> {
        let sql = format!("DELETE FROM {}", quote_ident(table)?);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        debug!(table, deleted = result.rows_affected(), "table cleared");
        Ok(())
    }

    async fn insert_summary(&self, table: &str, rows: &[SummaryRecord]) -> Result<(), sqlx::Error> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            quote_ident(table)?,
            column_list(&SUMMARY_COLUMNS)
        ));
        qb.push_values(rows, |mut b, row| {
            push_identity(&mut b, &row.identity);
            b.push_bind(row.accumulated_current)
                .push_bind(row.accumulated_prior)
                .push_bind(row.percent_of_target)
                .push_bind(row.growth);
        });
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_monthly(&self, table: &str, rows: &[MonthlyRecord]) -> Result<(), sqlx::Error> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            quote_ident(table)?,
            column_list(&MONTHLY_COLUMNS)
        ));
        qb.push_values(rows, |mut b, row| {
            push_identity(&mut b, &row.identity);
            b.push_bind(row.month.clone()).push_bind(row.value);
        });
        qb.build().execute(&self.pool).await?;
        Ok(())
    }
}

fn push_identity(b: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>, id: &IdentityFields) {
    b.push_bind(id.salesperson.clone())
        .push_bind(id.customer_id.clone())
        .push_bind(id.customer_name.clone())
        .push_bind(id.product_family.clone())
        .push_bind(id.kind.clone());
}
