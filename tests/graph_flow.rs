//! End-to-end graph ingestion and retrieval tests.
//!
//! Drives the full HTTP surface over the in-memory store with the local
//! extraction provider: submit an entry, let extraction derive entities
//! and relations, and query everything back.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use engram::api::{self, AppState, Claims, TokenValidator};
use engram::config::{AuthConfig, ExtractionConfig, OpenAiSettings};
use engram::llm::ProviderRegistry;
use engram::pipeline::ExtractionPipeline;
use engram::services::{EntityService, EntryIngestionService, SearchService};
use engram::storage::{EntityStore, InMemoryGraphStore, RelationStore, StoreHealth};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "an-integration-test-secret-of-32b!!";

struct TestApp {
    store: Arc<InMemoryGraphStore>,
    router: Router,
    token: String,
}

fn build_app(extraction: ExtractionConfig) -> TestApp {
    let store = Arc::new(InMemoryGraphStore::new());
    let entities: Arc<dyn EntityStore> = Arc::clone(&store) as Arc<dyn EntityStore>;
    let relations: Arc<dyn RelationStore> = Arc::clone(&store) as Arc<dyn RelationStore>;

    let allow_fallback = extraction.allow_fallback;
    let registry = Arc::new(ProviderRegistry::new(extraction));
    let pipeline = Arc::new(ExtractionPipeline::new(registry, allow_fallback));

    let auth = AuthConfig {
        jwt_secret: Some(SECRET.to_string()),
        issuer: None,
        audience: None,
    };

    let state = AppState {
        ingestion: Arc::new(EntryIngestionService::new(
            Arc::clone(&entities),
            Arc::clone(&relations),
            pipeline,
            allow_fallback,
        )),
        entities: Arc::new(EntityService::new(
            Arc::clone(&entities),
            Arc::clone(&relations),
        )),
        search: Arc::new(SearchService::new(Arc::clone(&entities))),
        health: Arc::clone(&store) as Arc<dyn StoreHealth>,
        auth: Arc::new(TokenValidator::new(&auth).expect("validator")),
    };

    TestApp {
        store,
        router: api::router(state),
        token: mint_token(),
    }
}

fn local_app(allow_fallback: bool) -> TestApp {
    build_app(ExtractionConfig {
        allow_fallback,
        ..ExtractionConfig::default()
    })
}

fn mint_token() -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: "user-1".to_string(),
        email: Some("tester@example.com".to_string()),
        exp: usize::try_from(now + 3600).unwrap(),
        iat: usize::try_from(now).unwrap(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token")
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn post_json(app: &TestApp, path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(app: &TestApp, path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .body(Body::empty())
        .expect("request")
}

fn entity_names(list: &Value) -> Vec<String> {
    list["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter_map(|item| item["name"].as_str().map(ToString::to_string))
        .collect()
}

fn entities_with_label(list: &Value, label: &str) -> usize {
    list["items"]
        .as_array()
        .expect("items")
        .iter()
        .filter(|item| {
            item["system_labels"]
                .as_array()
                .is_some_and(|labels| labels.iter().any(|l| l == label))
        })
        .count()
}

#[tokio::test]
async fn test_deferred_ingestion_builds_subgraph() {
    // E1: default deferred mode; fallback enabled so ingestion defers.
    let app = local_app(true);

    let (status, body) = send(
        &app,
        post_json(
            &app,
            "/graph/entries",
            &json!({"text": "Brian met Yoli at Twilight Florist."}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    let entry_id = body["entry_id"].as_str().expect("entry_id").to_string();

    // Background extraction completes shortly after the response.
    let mut waited = Duration::ZERO;
    while app.store.relation_count() == 0 && waited < Duration::from_secs(3) {
        tokio::time::sleep(Duration::from_millis(25)).await;
        waited += Duration::from_millis(25);
    }

    let (status, list) = send(&app, get(&app, "/graph/entities?limit=100")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(entities_with_label(&list, "PERSON") >= 1);
    assert!(entities_with_label(&list, "ORGANIZATION") >= 1);

    // Every derived entity hangs off the entry through a MENTIONS edge.
    let (status, relations) =
        send(&app, get(&app, &format!("/graph/entities/{entry_id}/relations"))).await;
    assert_eq!(status, StatusCode::OK);
    let relations = relations.as_array().expect("relations").clone();
    assert_eq!(relations.len(), 3);
    for relation in &relations {
        assert_eq!(relation["relationType"], "MENTIONS");
        let target = relation["target"].as_str().expect("target");
        let (status, _) = send(&app, get(&app, &format!("/graph/entities/{target}"))).await;
        assert_eq!(status, StatusCode::OK, "edge target must be a stored id");
    }
}

#[tokio::test]
async fn test_synchronous_ingestion_is_immediately_visible() {
    // E2: process_synchronously returns `processed` with results in place.
    let app = local_app(true);

    let (status, body) = send(
        &app,
        post_json(
            &app,
            "/graph/entries",
            &json!({
                "text": "Brian met Yoli at Twilight Florist.",
                "process_synchronously": true
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processed");

    let (status, list) = send(&app, get(&app, "/graph/entities?limit=100")).await;
    assert_eq!(status, StatusCode::OK);
    let names = entity_names(&list);
    assert!(names.contains(&"Brian".to_string()));
    assert!(names.contains(&"Yoli".to_string()));
    assert!(names.contains(&"Twilight Florist".to_string()));
    assert_eq!(list["total"].as_u64().unwrap() as usize, names.len());
}

#[tokio::test]
async fn test_cloud_provider_without_key_falls_back_silently() {
    // E3: configured cloud provider, no API key: extraction silently uses
    // the local heuristic.
    let app = build_app(ExtractionConfig {
        provider: "openai".to_string(),
        openai: OpenAiSettings {
            api_key: None,
            ..OpenAiSettings::default()
        },
        ..ExtractionConfig::default()
    });

    let (status, body) = send(
        &app,
        post_json(
            &app,
            "/graph/entries",
            &json!({
                "text": "Brian met Yoli at Twilight Florist.",
                "process_synchronously": true
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processed");
    assert!(app.store.entity_count() > 1, "derived entities must appear");
}

#[tokio::test]
async fn test_text_and_semantic_search() {
    // E4 + E5 after a synchronous ingestion.
    let app = local_app(true);
    send(
        &app,
        post_json(
            &app,
            "/graph/entries",
            &json!({
                "text": "Brian met Yoli at Twilight Florist.",
                "process_synchronously": true
            }),
        ),
    )
    .await;

    let (status, results) = send(
        &app,
        post_json(&app, "/graph/search/text", &json!({"query": "Twilight"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().expect("results").clone();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["name"], "Twilight Florist");

    let (status, semantic) = send(
        &app,
        post_json(
            &app,
            "/graph/search/semantic",
            &json!({"query": "Twilight"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(semantic["strategy"], "text-proxy");
    assert_eq!(
        semantic["results"].as_array().expect("results")[0]["name"],
        "Twilight Florist"
    );
}

#[tokio::test]
async fn test_bad_relation_type_leaves_store_unchanged() {
    // E6 at the repository seam.
    use engram::models::{ContentBlock, Entity, Relation, SystemLabel};

    let store = InMemoryGraphStore::new();
    let a = store
        .upsert(
            &Entity::new()
                .with_system_labels(vec![SystemLabel::Entry])
                .with_content(ContentBlock::text("x"))
                .validated()
                .unwrap(),
        )
        .await
        .unwrap();
    let b = store
        .upsert(
            &Entity::new()
                .with_name("Brian")
                .validated()
                .unwrap(),
        )
        .await
        .unwrap();

    let bad = Relation::new(a.id_str(), b.id_str(), "bad-type");
    assert!(store.create(&bad).await.is_err());
    assert_eq!(store.relation_count(), 0);
}

#[tokio::test]
async fn test_sync_provider_failure_surfaces_as_bad_gateway() {
    // Ollama pointed at a dead port, fallback disabled: synchronous
    // ingestion must return 502, but the entry node itself persists.
    let app = build_app(ExtractionConfig {
        provider: "ollama".to_string(),
        allow_fallback: false,
        ollama: engram::config::OllamaSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            max_retries: 1,
            ..engram::config::OllamaSettings::default()
        },
        ..ExtractionConfig::default()
    });

    let (status, body) = send(
        &app,
        post_json(
            &app,
            "/graph/entries",
            &json!({"text": "Brian met Yoli.", "process_synchronously": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["detail"].as_str().unwrap().contains("extraction provider"));
    assert_eq!(app.store.entity_count(), 1, "the entry node is persisted");
    assert_eq!(app.store.relation_count(), 0);
}

#[tokio::test]
async fn test_auth_is_required() {
    let app = local_app(true);

    let request = Request::builder()
        .method("GET")
        .uri("/graph/entities")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].as_str().unwrap().contains("Authorization"));

    let request = Request::builder()
        .method("GET")
        .uri("/graph/entities")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // /health stays public.
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "healthy");
}

#[tokio::test]
async fn test_validation_and_not_found_mapping() {
    let app = local_app(true);

    let (status, _) = send(&app, post_json(&app, "/graph/entries", &json!({"text": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(&app, "/graph/search/text", &json!({"query": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(
            &app,
            "/graph/search/text",
            &json!({"query": "x", "limit": 500}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        get(&app, "/graph/entities/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submitter_email_lands_in_entry_metadata() {
    let app = local_app(true);

    let (_, body) = send(
        &app,
        post_json(
            &app,
            "/graph/entries",
            &json!({"text": "A quiet evening.", "process_synchronously": true}),
        ),
    )
    .await;
    let entry_id = body["entry_id"].as_str().unwrap();

    let (status, entity) = send(&app, get(&app, &format!("/graph/entities/{entry_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entity["metadata"]["submitted_by"], "tester@example.com");
}
