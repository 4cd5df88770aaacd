use axum::extract::{Path as AxumPath, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use minijinja::value::Value as MiniValue;
use minijinja::Environment;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use url::form_urlencoded;

use crate::config::AtlasConfig;
use crate::dataset;
use crate::dataset::PaperRecord;
use crate::display;
use crate::embedder::QueryEmbedder;
use crate::knn_index::{KnnIndex, Neighbor};
use crate::themes;
use crate::themes::ClusterThemes;

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long = "port", default_value_t = 5000, help = "port to serve on")]
    pub port: u16,
    #[arg(
        short = 'r',
        long = "num_results",
        help = "default number of neighbors returned per query (overrides config)"
    )]
    pub num_results: Option<usize>,
}

/// Everything the dashboard serves from. Loaded once at startup and shared
/// read-only; per-request work is limited to recomputing display attributes.
pub struct DashboardData {
    pub records: Vec<PaperRecord>,
    pub embedding_dim: usize,
    pub themes_by_k: HashMap<usize, ClusterThemes>,
    pub knn_index: KnnIndex,
}

impl DashboardData {
    pub fn cluster_counts(&self) -> Vec<usize> {
        let mut counts: Vec<usize> = self.themes_by_k.keys().copied().collect();
        counts.sort_unstable();
        counts
    }
}

#[derive(Clone)]
pub struct AppState {
    data: Arc<DashboardData>,
    embedder: Option<Arc<QueryEmbedder>>,
    default_cluster_count: usize,
    default_num_results: usize,
}

pub fn load_dashboard_data(config: &AtlasConfig) -> Result<DashboardData, String> {
    println!("loading dataset from {}", config.dataset_path);
    let dataset = dataset::load_dataset(
        Path::new(&config.dataset_path),
        Path::new(&config.embeddings_path),
        Path::new(&config.embeddings_json_path),
    )?;

    let themes_dir = Path::new(&config.themes_dir);
    let counts = themes::available_cluster_counts(themes_dir);
    if counts.is_empty() {
        return Err(format!(
            "No cluster theme artifacts found in {}",
            themes_dir.display()
        ));
    }
    let mut themes_by_k = HashMap::new();
    for &k in &counts {
        let cluster_themes = themes::load_cluster_themes(themes_dir, k)?;
        cluster_themes.validate_record_count(dataset.len())?;
        themes_by_k.insert(k, cluster_themes);
    }
    println!(
        "loaded cluster themes for K in {counts:?} over {} records",
        dataset.len()
    );

    println!("building neighbor index over {} embeddings...", dataset.len());
    let knn_index = KnnIndex::build(&dataset.embeddings)?;

    Ok(DashboardData {
        embedding_dim: dataset.embedding_dim(),
        records: dataset.records,
        themes_by_k,
        knn_index,
    })
}

fn build_template_env(templates_dir: &str) -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("tojson", |value: MiniValue| {
        let encoded = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
        MiniValue::from_safe_string(encoded)
    });
    env.set_loader(minijinja::path_loader(templates_dir));
    env
}

pub async fn run_with_args(
    args: ServeArgs,
    config: AtlasConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = Arc::new(load_dashboard_data(&config)?);

    let embedder = QueryEmbedder::from_env().map(Arc::new);
    match &embedder {
        Some(embedder) => println!(
            "free-text search enabled with embedding model {}",
            embedder.model()
        ),
        None => println!(
            "no embedding endpoint configured; free-text search is disabled"
        ),
    }

    let default_cluster_count = initial_cluster_count(&data, config.default_cluster_count);
    let state = AppState {
        data,
        embedder,
        default_cluster_count,
        default_num_results: args.num_results.unwrap_or(config.default_num_results).max(1),
    };
    let env = build_template_env(&config.templates_dir);

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/meta", get(meta))
        .route("/api/points", get(points))
        .route("/api/select/:index", get(select))
        .nest_service("/static", ServeDir::new(config.static_dir.clone()))
        .with_state((state, Arc::new(env)));

    let addr = format!("0.0.0.0:{}", args.port);
    println!("starting paper-atlas server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Falls back to the smallest available K when the configured default has no
/// precomputed artifact.
fn initial_cluster_count(data: &DashboardData, configured: usize) -> usize {
    if data.themes_by_k.contains_key(&configured) {
        return configured;
    }
    data.cluster_counts().first().copied().unwrap_or(configured)
}

async fn index(
    State((state, env)): State<(AppState, Arc<Environment<'static>>)>,
) -> axum::response::Response {
    let context = json!({
        "record_count": state.data.records.len(),
        "cluster_counts": state.data.cluster_counts(),
        "default_cluster_count": state.default_cluster_count,
        "default_num_results": state.default_num_results,
        "search_enabled": state.embedder.is_some(),
    });
    let template = match env.get_template("dashboard.html") {
        Ok(template) => template,
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    };
    match template.render(&context) {
        Ok(rendered) => Html(rendered).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn health() -> axum::response::Response {
    Json(json!({ "status": "ok" })).into_response()
}

async fn meta(
    State((state, _env)): State<(AppState, Arc<Environment<'static>>)>,
) -> axum::response::Response {
    Json(json!({
        "records": state.data.records.len(),
        "embedding_dim": state.data.embedding_dim,
        "cluster_counts": state.data.cluster_counts(),
        "default_cluster_count": state.default_cluster_count,
        "default_num_results": state.default_num_results,
        "search_enabled": state.embedder.is_some(),
    }))
    .into_response()
}

async fn points(
    State((state, _env)): State<(AppState, Arc<Environment<'static>>)>,
    RawQuery(query): RawQuery,
) -> axum::response::Response {
    let query_map = parse_query(query);
    let k = match parse_usize_param(&query_map, "clusters") {
        Ok(value) => value.unwrap_or(state.default_cluster_count),
        Err(err) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": err }))).into_response()
        }
    };
    let num_results = match parse_usize_param(&query_map, "results") {
        Ok(value) => value.unwrap_or(state.default_num_results).max(1),
        Err(err) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": err }))).into_response()
        }
    };
    let q = first_param(&query_map, "q").unwrap_or_default();

    let Some(cluster_themes) = state.data.themes_by_k.get(&k) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("No cluster theme artifact for K={k}"),
                "cluster_counts": state.data.cluster_counts(),
            })),
        )
            .into_response();
    };

    let query_text = q.trim();
    let (matches, search_error) = if query_text.is_empty() {
        (Vec::new(), None)
    } else {
        match &state.embedder {
            None => (
                Vec::new(),
                Some("No embedding endpoint configured; showing base clusters only.".to_string()),
            ),
            Some(embedder) => {
                match run_search(embedder, &state.data.knn_index, query_text, num_results).await {
                    Ok(matches) => (matches, None),
                    Err(err) => {
                        eprintln!("search failed for {query_text:?}: {err}");
                        (Vec::new(), Some(err))
                    }
                }
            }
        }
    };

    Json(points_payload(
        &state.data,
        cluster_themes,
        &matches,
        search_error,
    ))
    .into_response()
}

async fn run_search(
    embedder: &QueryEmbedder,
    index: &KnnIndex,
    query: &str,
    k: usize,
) -> Result<Vec<Neighbor>, String> {
    let vector = embedder.embed(query).await?;
    index.search(&vector, k)
}

fn points_payload(
    data: &DashboardData,
    cluster_themes: &ClusterThemes,
    matches: &[Neighbor],
    search_error: Option<String>,
) -> Value {
    let attributes = display::attributes_for(
        &cluster_themes.assignments,
        &cluster_themes.themes,
        Some(matches),
    );
    let points: Vec<Value> = data
        .records
        .iter()
        .zip(attributes.iter())
        .map(|(record, attr)| {
            json!({
                "x": record.x,
                "y": record.y,
                "title": record.title,
                "color": attr.color,
                "size": attr.size,
                "alpha": attr.alpha,
                "theme": attr.theme,
            })
        })
        .collect();
    json!({
        "points": points,
        "matches": matches,
        "search_error": search_error,
    })
}

async fn select(
    State((state, _env)): State<(AppState, Arc<Environment<'static>>)>,
    AxumPath(index): AxumPath<usize>,
    RawQuery(query): RawQuery,
) -> axum::response::Response {
    let query_map = parse_query(query);
    let k = match parse_usize_param(&query_map, "clusters") {
        Ok(value) => value.unwrap_or(state.default_cluster_count),
        Err(err) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": err }))).into_response()
        }
    };
    let Some(cluster_themes) = state.data.themes_by_k.get(&k) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("No cluster theme artifact for K={k}") })),
        )
            .into_response();
    };
    let attributes = display::attributes_for(
        &cluster_themes.assignments,
        &cluster_themes.themes,
        None,
    );
    match display::selection_panel(&state.data.records, &attributes, index) {
        Some(panel) => Json(panel).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("No record at index {index}") })),
        )
            .into_response(),
    }
}

fn parse_query(raw: Option<String>) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    let Some(raw) = raw else { return map };
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        map.entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    map
}

fn first_param(map: &HashMap<String, Vec<String>>, key: &str) -> Option<String> {
    map.get(key).and_then(|values| values.first()).cloned()
}

fn parse_usize_param(
    map: &HashMap<String, Vec<String>>,
    key: &str,
) -> Result<Option<usize>, String> {
    match first_param(map, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("Invalid value for {key}: {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> DashboardData {
        let records = vec![
            PaperRecord {
                title: "Paper A".to_string(),
                abstract_text: "About A.".to_string(),
                url: "https://example.com/a".to_string(),
                x: 0.0,
                y: 0.0,
            },
            PaperRecord {
                title: "Paper B".to_string(),
                abstract_text: "About B.".to_string(),
                url: "https://example.com/b".to_string(),
                x: 1.0,
                y: 1.0,
            },
            PaperRecord {
                title: "Paper C".to_string(),
                abstract_text: "About C.".to_string(),
                url: "https://example.com/c".to_string(),
                x: 2.0,
                y: 2.0,
            },
        ];
        let embeddings = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.7, 0.7],
        ];
        let mut themes_by_k = HashMap::new();
        themes_by_k.insert(
            10,
            ClusterThemes {
                themes: (0..10).map(|i| format!("theme {i}")).collect(),
                assignments: vec![0, 1, 1],
            },
        );
        DashboardData {
            embedding_dim: 2,
            knn_index: KnnIndex::build(&embeddings).expect("build index"),
            records,
            themes_by_k,
        }
    }

    #[test]
    fn parse_query_collects_repeated_keys() {
        let map = parse_query(Some("q=attention&clusters=30&tag=a&tag=b".to_string()));
        assert_eq!(first_param(&map, "q"), Some("attention".to_string()));
        assert_eq!(map.get("tag").map(Vec::len), Some(2));
        assert_eq!(parse_usize_param(&map, "clusters"), Ok(Some(30)));
        assert_eq!(parse_usize_param(&map, "results"), Ok(None));
        assert!(parse_usize_param(&map, "q").is_err());
    }

    #[test]
    fn initial_cluster_count_prefers_configured_value() {
        let data = sample_data();
        assert_eq!(initial_cluster_count(&data, 10), 10);
        assert_eq!(initial_cluster_count(&data, 30), 10);
    }

    #[test]
    fn points_payload_base_view() {
        let data = sample_data();
        let cluster_themes = &data.themes_by_k[&10];
        let payload = points_payload(&data, cluster_themes, &[], None);
        let points = payload["points"].as_array().expect("points array");
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["title"], "Paper A");
        assert_eq!(points[0]["theme"], "theme 0");
        assert_eq!(points[1]["theme"], "theme 1");
        for point in points {
            assert_eq!(point["alpha"], 1.0);
            assert_eq!(point["size"], display::DEFAULT_POINT_SIZE);
        }
        assert_eq!(points[1]["color"], points[2]["color"]);
        assert!(payload["search_error"].is_null());
        assert_eq!(payload["matches"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn points_payload_highlights_matches() {
        let data = sample_data();
        let cluster_themes = &data.themes_by_k[&10];
        let matches = vec![Neighbor {
            index: 2,
            distance: 0.01,
        }];
        let payload = points_payload(&data, cluster_themes, &matches, None);
        let points = payload["points"].as_array().expect("points array");
        assert_eq!(points[2]["color"], display::HIGHLIGHT_COLOR);
        assert_eq!(points[2]["alpha"], 1.0);
        assert_eq!(points[2]["size"], display::HIGHLIGHT_POINT_SIZE);
        assert_eq!(points[0]["alpha"], display::DIMMED_ALPHA);
        assert_eq!(points[1]["alpha"], display::DIMMED_ALPHA);
        assert_eq!(payload["matches"][0]["index"], 2);
    }

    #[test]
    fn points_payload_carries_search_error() {
        let data = sample_data();
        let cluster_themes = &data.themes_by_k[&10];
        let payload = points_payload(
            &data,
            cluster_themes,
            &[],
            Some("embedding endpoint unreachable".to_string()),
        );
        assert_eq!(payload["search_error"], "embedding endpoint unreachable");
        let points = payload["points"].as_array().expect("points array");
        assert_eq!(points[0]["alpha"], 1.0);
    }
}
