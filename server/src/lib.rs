use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wikindex_core::persist::IndexPaths;
use wikindex_core::query::{LookupOptions, QueryEngine, SearchHit, SearchOutcome};
use wikindex_core::tokenizer::Normalizer;
use wikindex_core::DocNum;

/// Options shared by every binary that opens an index for querying.
#[derive(clap::Args, Debug, Clone)]
pub struct EngineArgs {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    pub index: String,
    /// Stopword list used at build time (built-in English list if omitted)
    #[arg(long)]
    pub stopwords: Option<String>,
    /// Match block lines by substring instead of exact key
    #[arg(long)]
    pub substring_match: bool,
    /// Treat keys in the first block as missing
    #[arg(long)]
    pub skip_first_block: bool,
}

impl EngineArgs {
    pub fn open(&self) -> Result<QueryEngine> {
        let normalizer = match &self.stopwords {
            Some(path) => Normalizer::from_stopword_file(path)?,
            None => Normalizer::default(),
        };
        let options = LookupOptions {
            substring_match: self.substring_match,
            skip_first_block: self.skip_first_block,
        };
        QueryEngine::open(IndexPaths::new(&self.index), normalizer, options)
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: &'static str,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_num: DocNum,
    pub title: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
}

/// Internal failures surface as 500 with the error chain in the body.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %format!("{:#}", self.0), "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        AppError(e.into())
    }
}

pub fn build_app(engine: QueryEngine) -> Router {
    let state = AppState { engine: Arc::new(engine) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_num", get(doc_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let k = params.k.clamp(1, 100);
    let engine = state.engine.clone();
    let q = params.q.clone();
    // block lookups read files
    let outcome = tokio::task::spawn_blocking(move || engine.search_top(&q, k)).await??;
    Ok(Json(SearchResponse {
        query: params.q,
        mode: outcome.query.mode(),
        took_s: outcome.elapsed.as_secs_f64(),
        total_hits: outcome.total_hits,
        results: outcome.hits,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_num): Path<DocNum>,
) -> Result<Response, AppError> {
    if doc_num >= state.engine.num_docs() {
        return Ok((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))).into_response());
    }
    let engine = state.engine.clone();
    let title = tokio::task::spawn_blocking(move || engine.title(doc_num)).await??;
    Ok(Json(DocResponse { doc_num, title }).into_response())
}

/// Batch output for one query: a `doc_num, title` line per hit, the elapsed
/// seconds, then a blank line.
pub fn write_outcome<W: Write>(out: &mut W, outcome: &SearchOutcome) -> std::io::Result<()> {
    for hit in &outcome.hits {
        writeln!(out, "{}, {}", hit.doc_num, hit.title)?;
    }
    writeln!(out, "{:.2}", outcome.elapsed.as_secs_f64())?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wikindex_core::query::Query;

    #[test]
    fn batch_output_layout() {
        let outcome = SearchOutcome {
            query: Query::Simple(vec!["cat".into()]),
            hits: vec![
                SearchHit { doc_num: 4, title: "cat".into(), score: 2.0 },
                SearchHit { doc_num: 0, title: "lion".into(), score: 1.0 },
            ],
            total_hits: 2,
            elapsed: Duration::from_millis(1234),
        };
        let mut buf = Vec::new();
        write_outcome(&mut buf, &outcome).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "4, cat\n0, lion\n1.23\n\n");
    }
}
