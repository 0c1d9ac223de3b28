use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;
use wikindex_core::config::BuildConfig;
use wikindex_core::persist::IndexPaths;
use wikindex_core::pipeline::build_index;
use wikindex_core::query::{LookupOptions, QueryEngine};
use wikindex_core::tokenizer::Normalizer;
use wikindex_core::RawDocument;

fn build_tiny_index(dir: &std::path::Path) -> IndexPaths {
    let page = |title: &str, text: &str| RawDocument { doc_id: String::new(), title: title.into(), text: text.into() };
    let docs = vec![
        page("Rust", "rust is a systems programming language"),
        page("Learning", "learning rust takes time"),
        page("Python", "python is a scripting language"),
    ];
    let paths = IndexPaths::new(dir);
    let config = BuildConfig { batch_size: 2, block_lines: 3, ..BuildConfig::default() };
    build_index(&paths, config, Normalizer::default(), docs.into_iter().map(Ok)).unwrap();
    paths
}

fn app(paths: IndexPaths) -> Router {
    let engine = QueryEngine::open(paths, Normalizer::default(), LookupOptions::default()).unwrap();
    server::build_app(engine)
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let app = app(build_tiny_index(dir.path()));

    let (status, body) = call(app, "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["mode"], "simple");
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    // title match outweighs the body-only hit
    assert_eq!(arr[0]["doc_num"].as_u64().unwrap(), 0);
    assert_eq!(arr[0]["title"], "rust");
    assert_eq!(arr[1]["doc_num"].as_u64().unwrap(), 1);
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn k_truncates_but_total_hits_does_not() {
    let dir = tempdir().unwrap();
    let app = app(build_tiny_index(dir.path()));

    let (_, body) = call(app, "/search?q=language&k=1").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
    assert_eq!(json["total_hits"], 2);
}

#[tokio::test]
async fn field_query_over_http() {
    let dir = tempdir().unwrap();
    let app = app(build_tiny_index(dir.path()));

    let (status, body) = call(app, "/search?q=t:python").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["mode"], "field");
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["doc_num"].as_u64().unwrap(), 2);
}

#[tokio::test]
async fn doc_lookup_and_health() {
    let dir = tempdir().unwrap();
    let app = app(build_tiny_index(dir.path()));

    let (status, body) = call(app.clone(), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["doc_num"], 1);
    assert_eq!(json["title"], "learning");

    let (status, _) = call(app.clone(), "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}
