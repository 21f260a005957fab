//! API Service - read-only dashboard API over the sales tables
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /resumo - Accumulated totals and growth
//! - GET /mensal - Monthly trend in calendar order
//! - GET /ranking/{vendedores|clientes|familias|tipos} - Rankings by current total
//! - GET /heatmap - Family x month values
//! - GET /kpis - Customer KPIs
//! - GET /entidade - Monthly series and breakdown for one entity
//! - GET /filtros - Values available for each filter
//!
//! Every data endpoint accepts the filters `vendedores`, `clientes`,
//! `familias` (comma-separated), `tipo` and `meses` (comma-separated).

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ingest::analytics::{self, Dimension, Filters};
use ingest::config::Config;
use ingest::pg::PgStore;
use ingest::{LoadError, Tables};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// State
// ============================================================================

struct AppState {
    store: PgStore,
    tables: Tables,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct KpisResponse {
    totals: analytics::Totals,
    active_customers: analytics::ActiveCustomers,
    average_ticket: analytics::AverageTicket,
    concentration: analytics::Concentration,
    by_type: Vec<analytics::RankedEntity>,
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize, Default)]
struct FilterQuery {
    vendedores: Option<String>,
    clientes: Option<String>,
    familias: Option<String>,
    tipo: Option<String>,
    meses: Option<String>,
}

impl FilterQuery {
    fn to_filters(&self) -> Filters {
        Filters {
            vendedores: split_list(self.vendedores.as_deref()),
            clientes: split_list(self.clientes.as_deref()),
            familias: split_list(self.familias.as_deref()),
            tipo: self
                .tipo
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            meses: split_list(self.meses.as_deref()),
        }
    }
}

#[derive(Deserialize)]
struct RankingQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct EntityQuery {
    dimensao: String,
    nome: String,
}

/// `"Ana, Rui,,"` -> `["Ana", "Rui"]`
fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Singular or plural Portuguese dimension name.
fn parse_dimension(value: &str) -> Option<Dimension> {
    match value.trim().to_lowercase().as_str() {
        "vendedor" | "vendedores" => Some(Dimension::Vendedor),
        "cliente" | "clientes" => Some(Dimension::Cliente),
        "familia" | "familias" | "família" | "famílias" => Some(Dimension::Familia),
        "tipo" | "tipos" => Some(Dimension::Tipo),
        _ => None,
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn store_error(e: LoadError) -> Response {
    error!(error = %e, "store read failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn resumo_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterQuery>,
) -> Response {
    match state
        .store
        .fetch_summary(&state.tables.summary, &params.to_filters())
        .await
    {
        Ok(rows) => Json(analytics::totals(&rows)).into_response(),
        Err(e) => store_error(e),
    }
}

async fn mensal_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterQuery>,
) -> Response {
    match state
        .store
        .fetch_monthly(&state.tables.monthly, &params.to_filters())
        .await
    {
        Ok(rows) => Json(analytics::monthly_trend(&rows)).into_response(),
        Err(e) => store_error(e),
    }
}

async fn ranking_handler(
    State(state): State<Arc<AppState>>,
    Path(dimensao): Path<String>,
    Query(ranking): Query<RankingQuery>,
    Query(params): Query<FilterQuery>,
) -> Response {
    let Some(dimension) = parse_dimension(&dimensao) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Unknown ranking '{}'", dimensao),
        );
    };

    match state
        .store
        .fetch_summary(&state.tables.summary, &params.to_filters())
        .await
    {
        Ok(rows) => Json(analytics::ranking(&rows, dimension, ranking.limit)).into_response(),
        Err(e) => store_error(e),
    }
}

async fn heatmap_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterQuery>,
) -> Response {
    match state
        .store
        .fetch_monthly(&state.tables.monthly, &params.to_filters())
        .await
    {
        Ok(rows) => Json(analytics::heatmap(&rows)).into_response(),
        Err(e) => store_error(e),
    }
}

async fn kpis_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterQuery>,
) -> Response {
    let rows = match state
        .store
        .fetch_summary(&state.tables.summary, &params.to_filters())
        .await
    {
        Ok(rows) => rows,
        Err(e) => return store_error(e),
    };

    Json(KpisResponse {
        totals: analytics::totals(&rows),
        active_customers: analytics::active_customers(&rows),
        average_ticket: analytics::average_ticket(&rows),
        concentration: analytics::concentration(&rows),
        by_type: analytics::ranking(&rows, Dimension::Tipo, None),
    })
    .into_response()
}

async fn entidade_handler(
    State(state): State<Arc<AppState>>,
    Query(entity): Query<EntityQuery>,
    Query(params): Query<FilterQuery>,
) -> Response {
    let dimension = match parse_dimension(&entity.dimensao) {
        Some(Dimension::Tipo) | None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "dimensao must be vendedor, cliente or familia",
            )
        }
        Some(d) => d,
    };

    match state
        .store
        .fetch_monthly(&state.tables.monthly, &params.to_filters())
        .await
    {
        Ok(rows) => Json(analytics::entity_series(&rows, dimension, &entity.nome)).into_response(),
        Err(e) => store_error(e),
    }
}

async fn filtros_handler(State(state): State<Arc<AppState>>) -> Response {
    match state
        .store
        .fetch_summary(&state.tables.summary, &Filters::default())
        .await
    {
        Ok(rows) => Json(analytics::filter_options(&rows)).into_response(),
        Err(e) => store_error(e),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    println!("=== Sales Dashboard API ===");
    println!("Connecting to database...");

    let store = PgStore::connect(&config.db_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;

    println!("Database connected");

    let state = Arc::new(AppState {
        store,
        tables: config.tables,
    });

    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/resumo", get(resumo_handler))
        .route("/mensal", get(mensal_handler))
        .route("/ranking/:dimensao", get(ranking_handler))
        .route("/heatmap", get(heatmap_handler))
        .route("/kpis", get(kpis_handler))
        .route("/entidade", get(entidade_handler))
        .route("/filtros", get(filtros_handler))
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET /health");
    println!("  GET /resumo");
    println!("  GET /mensal");
    println!("  GET /ranking/{{vendedores|clientes|familias|tipos}}?limit=");
    println!("  GET /heatmap");
    println!("  GET /kpis");
    println!("  GET /entidade?dimensao=&nome=");
    println!("  GET /filtros");
    println!("Filters: ?vendedores=&clientes=&familias=&tipo=&meses=");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("Ana, Rui,,")), vec!["Ana", "Rui"]);
        assert!(split_list(Some("  ")).is_empty());
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_filter_query_to_filters() {
        let query = FilterQuery {
            vendedores: Some("Ana,Rui".into()),
            tipo: Some(" ".into()),
            meses: Some("Jan,Fev".into()),
            ..FilterQuery::default()
        };
        let filters = query.to_filters();
        assert_eq!(filters.vendedores, vec!["Ana", "Rui"]);
        assert!(filters.clientes.is_empty());
        assert_eq!(filters.tipo, None);
        assert_eq!(filters.meses, vec!["Jan", "Fev"]);
    }

    #[test]
    fn test_empty_query_is_no_filter() {
        assert!(FilterQuery::default().to_filters().is_empty());
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("vendedores"), Some(Dimension::Vendedor));
        assert_eq!(parse_dimension("Cliente"), Some(Dimension::Cliente));
        assert_eq!(parse_dimension("famílias"), Some(Dimension::Familia));
        assert_eq!(parse_dimension("tipos"), Some(Dimension::Tipo));
        assert_eq!(parse_dimension("produtos"), None);
    }
}
