//! End-to-end pipeline tests against a local sharing-server stub.
//!
//! The stub answers the vending exchange with newline-delimited JSON records
//! and serves a small Parquet audit log at the signed location.

use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use datafusion::arrow::array::{Array, ArrayRef, StringArray, StructArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::ArrowWriter;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use specter_client::{
    BrokerError, ClientConfig, DataFusionExecutor, LocationBroker, Pipeline, PipelineError,
    QueryExecutor, SharingBroker, SinkOutcome,
};
use specter_core::{MonitorQuery, QueryScope, SearchFilters};

const TOKEN: &str = "test-token";

#[derive(Clone)]
struct StubState {
    base_url: String,
    with_files: bool,
    parquet: Arc<Vec<u8>>,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn query_handler(
    State(state): State<StubState>,
    Path((share, schema, table)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {TOKEN}").as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "invalid bearer token").into_response();
    }
    state
        .requests
        .lock()
        .unwrap()
        .push((format!("{share}.{schema}.{table}"), body));

    let mut lines = vec![
        json!({"protocol": {"minReaderVersion": 1}}),
        json!({"metaData": {"id": "audit", "format": {"provider": "parquet"}}}),
    ];
    if state.with_files {
        lines.push(json!({"file": {"url": "", "id": "empty"}}));
        lines.push(json!({"file": {
            "url": format!("{}/data.parquet?sig=abc", state.base_url),
            "id": "part-0"
        }}));
    }
    let body: String = lines.iter().map(|line| format!("{line}\n")).collect();
    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response()
}

async fn object_handler(State(state): State<StubState>) -> Vec<u8> {
    state.parquet.as_ref().clone()
}

fn audit_parquet() -> Vec<u8> {
    let user_identity = StructArray::from(vec![(
        Arc::new(Field::new("email", DataType::Utf8, true)),
        Arc::new(StringArray::from(vec!["a@b.com", "c@d.com", "a@b.com"])) as ArrayRef,
    )]);
    let schema = Arc::new(Schema::new(vec![
        Field::new("event_time", DataType::Utf8, true),
        Field::new("user_identity", user_identity.data_type().clone(), true),
        Field::new("service_name", DataType::Utf8, true),
        Field::new("action_name", DataType::Utf8, true),
        Field::new("source_ip_address", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        Arc::clone(&schema),
        vec![
            Arc::new(StringArray::from(vec![
                "2024-10-09T10:00:00",
                "2024-10-09T11:00:00",
                "2024-09-01T09:00:00",
            ])),
            Arc::new(user_identity),
            Arc::new(StringArray::from(vec![
                "unityCatalog",
                "unityCatalog",
                "accounts",
            ])),
            Arc::new(StringArray::from(vec!["deleteTable", "deleteTable", "login"])),
            Arc::new(StringArray::from(vec!["10.0.0.1", "10.0.0.2", "10.0.0.1"])),
        ],
    )
    .unwrap();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buf
}

struct Stub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn spawn_stub(with_files: bool) -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        base_url: format!("http://{addr}"),
        with_files,
        parquet: Arc::new(audit_parquet()),
        requests: Arc::clone(&requests),
    };
    let app = Router::new()
        .route(
            "/shares/{share}/schemas/{schema}/tables/{table}/query",
            post(query_handler),
        )
        .route("/data.parquet", get(object_handler))
        .with_state(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Stub { addr, requests }
}

fn write_profile(dir: &FsPath, endpoint: &str, token: &str) -> PathBuf {
    let path = dir.join("config.share");
    let profile = json!({
        "shareCredentialsVersion": 1,
        "bearerToken": token,
        "endpoint": endpoint,
        "expirationTime": "2099-01-01T00:00:00Z"
    });
    std::fs::write(&path, profile.to_string()).unwrap();
    path
}

fn pipeline(profile_path: PathBuf) -> Pipeline<Vec<u8>> {
    let config = ClientConfig {
        profile_path,
        ..ClientConfig::default()
    };
    let broker: Arc<dyn LocationBroker> = Arc::new(SharingBroker::new(&config).unwrap());
    let executor: Arc<dyn QueryExecutor> = Arc::new(DataFusionExecutor::new(&config).unwrap());
    Pipeline::new(config, broker, executor, Vec::new())
}

#[tokio::test]
async fn search_renders_matching_rows() {
    let stub = spawn_stub(true).await;
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(dir.path(), &format!("http://{}/", stub.addr), TOKEN);
    let mut pipeline = pipeline(profile);

    let filters = SearchFilters {
        user: Some("a@b.com".to_string()),
        action: Some("deleteTable".to_string()),
        ..SearchFilters::default()
    };
    let outcome = pipeline.search(&filters, None).await.unwrap();
    assert_eq!(outcome, SinkOutcome::Rendered { rows: 1 });

    let output = String::from_utf8(pipeline.into_output()).unwrap();
    assert_eq!(
        output,
        "------\n\
         event_time: 2024-10-09T10:00:00\n\
         user_identity: email: a@b.com\n\
         service_name: unityCatalog\n\
         action_name: deleteTable\n\
         source_ip_address: 10.0.0.1\n\
         ------\n"
    );

    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (scope, body) = &requests[0];
    assert_eq!(scope, &QueryScope::default().to_string());
    assert_eq!(
        body,
        &json!({
            "predicateHints": [
                "user_identity.email = 'a@b.com'",
                "action_name = 'deleteTable'"
            ],
            "limitHint": 1000
        })
    );
}

#[tokio::test]
async fn search_exports_csv() {
    let stub = spawn_stub(true).await;
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(dir.path(), &format!("http://{}", stub.addr), TOKEN);
    let mut pipeline = pipeline(profile);

    let base = dir.path().join("audit_results");
    let filters = SearchFilters {
        source_ip: Some("10.0.0.1".to_string()),
        date: Some("2024-10-01".to_string()),
        ..SearchFilters::default()
    };
    let outcome = pipeline
        .search(&filters, Some(base.to_str().unwrap()))
        .await
        .unwrap();
    let path = dir.path().join("audit_results.csv");
    assert_eq!(
        outcome,
        SinkOutcome::Exported {
            path: path.clone(),
            rows: 1
        }
    );

    let csv = std::fs::read_to_string(&path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("event_time,user_identity,service_name,action_name,source_ip_address")
    );
    assert_eq!(
        lines.next(),
        Some("2024-10-09T10:00:00,email: a@b.com,unityCatalog,deleteTable,10.0.0.1")
    );
    assert_eq!(lines.next(), None);
}

static GROUPED: &[MonitorQuery] = &[
    MonitorQuery {
        name: "actions",
        description: "Event count per action.",
        sql: "SELECT action_name, COUNT(*) AS events FROM read_parquet(S3_PRESIGNED_URL) \
              GROUP BY action_name ORDER BY action_name",
    },
    MonitorQuery {
        name: "sources",
        description: "Distinct source addresses.",
        sql: "SELECT DISTINCT source_ip_address FROM read_parquet(S3_PRESIGNED_URL) \
              ORDER BY source_ip_address",
    },
];

#[tokio::test]
async fn monitor_batch_runs_every_query_with_fresh_exchange() {
    let stub = spawn_stub(true).await;
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(dir.path(), &format!("http://{}", stub.addr), TOKEN);
    let mut pipeline = pipeline(profile).with_catalog(GROUPED);

    let outcomes = pipeline.monitor(0, None).await.unwrap();
    assert_eq!(
        outcomes,
        vec![
            SinkOutcome::Rendered { rows: 2 },
            SinkOutcome::Rendered { rows: 2 }
        ]
    );

    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|(_, body)| body == &json!({"limitHint": 1000})));

    let output = String::from_utf8(pipeline.into_output()).unwrap();
    assert!(output.contains("action_name: deleteTable\nevents: 2\n"));
    assert!(output.contains("source_ip_address: 10.0.0.2\n"));
}

#[tokio::test]
async fn rejected_token_is_status_error() {
    let stub = spawn_stub(true).await;
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(dir.path(), &format!("http://{}", stub.addr), "wrong");
    let mut pipeline = pipeline(profile);

    let filters = SearchFilters {
        user: Some("a@b.com".to_string()),
        ..SearchFilters::default()
    };
    let err = pipeline.search(&filters, None).await.unwrap_err();
    match err {
        PipelineError::Broker(BrokerError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid bearer token");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(pipeline.into_output().is_empty());
}

#[tokio::test]
async fn response_without_files_is_no_location() {
    let stub = spawn_stub(false).await;
    let dir = tempfile::tempdir().unwrap();
    let profile = write_profile(dir.path(), &format!("http://{}", stub.addr), TOKEN);
    let mut pipeline = pipeline(profile);

    let err = pipeline.monitor(1, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Broker(BrokerError::NoLocationFound)
    ));
}

#[tokio::test]
async fn missing_profile_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = pipeline(dir.path().join("absent.share"));

    let filters = SearchFilters {
        service: Some("unityCatalog".to_string()),
        ..SearchFilters::default()
    };
    let err = pipeline.search(&filters, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert!(err.to_string().starts_with("config error: "));
}
