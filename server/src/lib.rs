use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderValue, StatusCode}, routing::get, Json, Router};
use search_core::search::{SearchResults, Searcher};
use search_core::source::read_source;
use search_core::tokenizer::Analyzer;
use search_core::{DocId, IndexError};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    /// Query text, optionally carrying control tags such as `[AND]` or `[FIELD=T]`
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    #[serde(flatten)]
    pub results: SearchResults,
}

#[derive(Clone)]
pub struct AppState {
    pub searcher: Arc<Searcher>,
}

/// Loads the index and builds the HTTP router. Missing artifacts fail here, before serving.
pub fn build_app(index_dir: &str, analyzer: Analyzer) -> Result<Router> {
    let searcher = Searcher::open(index_dir, Box::new(analyzer))?;
    Ok(router(Arc::new(searcher)))
}

pub fn router(searcher: Arc<Searcher>) -> Router {
    let app_state = AppState { searcher };
    let cors = cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref());

    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// CORS for a comma-separated origin list (the `CORS_ALLOW_ORIGIN` value); any origin when unset or unparsable.
pub fn cors_layer(allow_origin: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allow_origin
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let meta = state.searcher.meta();
    Json(serde_json::json!({
        "status": "ok",
        "num_docs": meta.num_docs,
        "num_terms": meta.num_terms,
        "created_at": meta.created_at,
    }))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let searcher = state.searcher.clone();
    let q = params.q.clone();
    // postings reads and snippet source reads are blocking file I/O
    let outcome = tokio::task::spawn_blocking(move || searcher.search(&q))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    match outcome {
        Ok(results) => Ok(Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), results })),
        Err(e) => {
            log_search_error(&params.q, &e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn log_search_error(query: &str, e: &IndexError) {
    if e.is_corruption() {
        tracing::error!(query, error = %e, "index corruption, query aborted");
    } else {
        tracing::error!(query, error = %e, "search failed");
    }
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<serde_json::Value>, StatusCode> {
    let meta = state.searcher.doc(doc_id).ok_or(StatusCode::NOT_FOUND)?;
    let mut obj = serde_json::json!(meta);
    if let Ok(src) = read_source(std::path::Path::new(&meta.path)) {
        obj["title"] = serde_json::Value::String(src.title);
        obj["abstract"] = serde_json::Value::String(src.abstract_text);
        obj["claims"] = serde_json::Value::String(src.claims);
    }
    Ok(Json(obj))
}

/// Renders results the way the interactive shell prints them.
pub fn format_results(results: &SearchResults) -> String {
    let mut out = String::new();
    out.push_str("RESULT:\n");
    out.push_str(&format!("  query terms: {:?}\n", results.query_terms));
    out.push_str(&format!("  {} documents found\n", results.total));
    if results.hits.is_empty() {
        return out;
    }
    out.push_str(&format!("  top {}:\n", results.hits.len()));
    for hit in &results.hits {
        out.push_str(&format!("{} {:.2}\n", hit.filename, hit.score));
        for snippet in &hit.snippets {
            out.push_str(&format!("    {snippet}\n"));
        }
        for c in &hit.explanation {
            out.push_str(&format!("    {} +{:.4}\n", c.term, c.score));
        }
    }
    out
}

/// Reads queries line by line until an empty line or end of input.
///
/// A failing query is logged and reported as zero results; the session continues.
pub fn run_shell<R: BufRead, W: Write>(searcher: &Searcher, input: R, mut out: W) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let query = line.trim();
        if query.is_empty() {
            break;
        }
        match searcher.search(query) {
            Ok(results) => out.write_all(format_results(&results).as_bytes())?,
            Err(e) => {
                log_search_error(query, &e);
                writeln!(out, "RESULT:\n  0 documents found")?;
            }
        }
        out.flush()?;
    }
    Ok(())
}
