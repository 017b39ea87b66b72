use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use search_core::builder::build_index;
use search_core::search::Searcher;
use search_core::tokenizer::Analyzer;
use serde_json::Value;
use axum::routing::get;
use server::{build_app, cors_layer, router, run_shell};
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn build_tiny_index() -> (TempDir, TempDir) {
    let corpus = tempdir().unwrap();
    let docs = [
        ("a.json", "Rust compiler backend", "a systems language toolchain", "compiler passes"),
        ("b.json", "Garden hose", "watering plants", "a rust resistant coupling"),
    ];
    for (name, title, abs, claims) in docs {
        let json = serde_json::json!({ "dataset": { "invention_title": title, "abstract": abs, "claims": claims } });
        fs::write(corpus.path().join(name), json.to_string()).unwrap();
    }
    let out = tempdir().unwrap();
    build_index(corpus.path(), out.path(), &Analyzer::default()).unwrap();
    (corpus, out)
}

fn app(index: &TempDir) -> Router {
    let searcher = Searcher::open(index.path(), Box::new(Analyzer::default())).unwrap();
    router(Arc::new(searcher))
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (_corpus, index) = build_tiny_index();
    let (status, json) = call(app(&index), "/search?q=rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"].as_u64().unwrap(), 2);
    assert_eq!(json["mode"], "OR");
    let arr = json["hits"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    // title match outranks a claims match
    assert_eq!(arr[0]["filename"], "a.json");
    assert_eq!(arr[1]["filename"], "b.json");
    assert!(arr[0]["snippets"][0]["text"].as_str().unwrap().contains("<<Rust>>"));
}

#[tokio::test]
async fn field_tags_pass_through_the_query_string() {
    let (_corpus, index) = build_tiny_index();
    let (status, json) = call(app(&index), "/search?q=%5BFIELD%3DC%5Drust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"].as_u64().unwrap(), 1);
    assert_eq!(json["hits"][0]["filename"], "b.json");
}

#[tokio::test]
async fn doc_endpoint_returns_metadata_and_text() {
    let (_corpus, index) = build_tiny_index();
    let (status, json) = call(app(&index), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filename"], "b.json");
    assert_eq!(json["title"], "Garden hose");

    let (status, _) = call(app(&index), "/doc/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn shell_stops_at_empty_line() {
    let (_corpus, index) = build_tiny_index();
    let searcher = Searcher::open(index.path(), Box::new(Analyzer::default())).unwrap();
    let input = Cursor::new("[AND]rust compiler\n\nrust\n");
    let mut out = Vec::new();
    run_shell(&searcher, input, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.matches("RESULT:").count(), 1);
    assert!(text.contains("1 documents found"));
    assert!(text.contains("a.json"));
}

#[test]
fn shell_reports_corruption_as_no_results() {
    let (_corpus, index) = build_tiny_index();
    let searcher = Searcher::open(index.path(), Box::new(Analyzer::default())).unwrap();
    fs::OpenOptions::new().write(true).open(index.path().join("postings.bin")).unwrap().set_len(0).unwrap();
    let mut out = Vec::new();
    run_shell(&searcher, Cursor::new("rust\n"), &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("0 documents found"));
}

#[tokio::test]
async fn build_app_serves_index_metadata_on_health() {
    let (_corpus, index) = build_tiny_index();
    let app = build_app(index.path().to_str().unwrap(), Analyzer::default()).unwrap();
    let (status, json) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["num_docs"].as_u64().unwrap(), 2);
    assert!(json["num_terms"].as_u64().unwrap() > 0);
}

#[test]
fn build_app_fails_without_index() {
    let empty = tempdir().unwrap();
    assert!(build_app(empty.path().to_str().unwrap(), Analyzer::default()).is_err());
}

#[tokio::test]
async fn search_on_corrupt_postings_is_server_error() {
    let (_corpus, index) = build_tiny_index();
    let app = app(&index);
    fs::OpenOptions::new().write(true).open(index.path().join("postings.bin")).unwrap().set_len(0).unwrap();
    let (status, _) = call(app, "/search?q=rust").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn cors_allows_listed_origins_only() {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(cors_layer(Some("http://a.example, http://b.example")));
    let allowed = Request::get("/").header("origin", "http://b.example").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "http://b.example");

    let denied = Request::get("/").header("origin", "http://c.example").body(Body::empty()).unwrap();
    let resp = app.oneshot(denied).await.unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    let open = Router::new().route("/", get(|| async { "ok" })).layer(cors_layer(None));
    let req = Request::get("/").header("origin", "http://c.example").body(Body::empty()).unwrap();
    let resp = open.oneshot(req).await.unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
