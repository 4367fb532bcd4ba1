use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use camp_db::testing::TestDb;
use camp_server::{app, AppConfig, AppState};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: TestDb,
    env_file: PathBuf,
    _env_dir: TempDir,
}

async fn setup_with(maintenance_mode: bool) -> TestApp {
    let db = TestDb::new().await;
    camp_db::seed::seed_defaults(&db.pool).await.unwrap();

    let env_dir = tempfile::tempdir().unwrap();
    let env_file = env_dir.path().join(".env");
    std::fs::write(&env_file, "CAMP_SEED=true\nMAINTENANCE_MODE=false\n").unwrap();

    let config = AppConfig {
        env_file: env_file.clone(),
        maintenance_mode,
        ..Default::default()
    };

    TestApp {
        router: app(AppState::new(db.pool.clone(), config)),
        db,
        env_file,
        _env_dir: env_dir,
    }
}

async fn setup() -> TestApp {
    setup_with(false).await
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_raw(method, uri, body.map(|value| value.to_string()))
            .await
    }

    async fn send_raw(&self, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(raw) => {
                builder = builder.header("content-type", "application/json");
                Body::from(raw)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    async fn id_by_name(&self, uri: &str, name: &str) -> String {
        let (_, list) = self.get(uri).await;
        list.as_array()
            .unwrap()
            .iter()
            .find(|item| item["name"] == name)
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn register(&self, name: &str, tests: &[&str]) -> (String, String) {
        let mut selected = Vec::new();
        for test in tests {
            selected.push(self.id_by_name("/api/test-types", test).await);
        }
        let (status, body) = self
            .post(
                "/api/registration",
                json!({
                    "name": name,
                    "gender": "female",
                    "age": 52,
                    "contactNumber": "11999990000",
                    "selectedTests": selected,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        (
            body["registrationId"].as_str().unwrap().to_string(),
            body["patientId"].as_str().unwrap().to_string(),
        )
    }

    async fn registration_status(&self, registration_id: &str) -> String {
        let (_, body) = self.get(&format!("/api/registration/{registration_id}")).await;
        body["status"].as_str().unwrap().to_string()
    }
}

const RBS: &str = "Random Blood Sugar (RBS)";
const FBS: &str = "Fasting Blood Sugar (FBS)";

#[tokio::test]
async fn health_reports_database() {
    let app = setup().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "camp-server");
}

#[tokio::test]
async fn results_complete_registration_workflow() {
    let app = setup().await;
    let (registration_id, patient_id) = app.register("Maria", &[RBS, FBS]).await;
    assert!(patient_id.starts_with('R'));
    assert_eq!(patient_id.len(), 8);

    let (_, lookup) = app.get(&format!("/api/registration/{patient_id}")).await;
    assert_eq!(lookup["id"], registration_id.as_str());
    assert_eq!(lookup["registrationTests"].as_array().unwrap().len(), 2);

    let rbs = app.id_by_name("/api/test-types", RBS).await;
    let fbs = app.id_by_name("/api/test-types", FBS).await;

    let (status, first) = app
        .post(
            "/api/test-results",
            json!({"registrationId": registration_id, "testTypeId": rbs, "result": "110"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["status"], "normal");
    assert_eq!(app.registration_status(&registration_id).await, "registered");

    let (_, pending) = app.get("/api/test-results/pending").await;
    assert_eq!(pending["pendingResults"].as_array().unwrap().len(), 1);

    let (status, duplicate) = app
        .post(
            "/api/test-results",
            json!({"registrationId": registration_id, "testTypeId": rbs, "result": "115"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{duplicate}");

    let (status, second) = app
        .post(
            "/api/test-results",
            json!({
                "registrationId": registration_id,
                "testTypeId": fbs,
                "result": "180",
                "status": "abnormal",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{second}");
    assert_eq!(app.registration_status(&registration_id).await, "tests_done");

    let (status, updated) = app
        .put(
            "/api/test-results",
            json!({
                "registrationId": registration_id,
                "testTypeId": fbs,
                "result": "95",
                "status": "normal",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["result"], "95");

    let (_, listed) = app
        .get(&format!("/api/test-results?registrationId={registration_id}&limit=1"))
        .await;
    assert_eq!(listed["pagination"]["total"], 2);
    assert_eq!(listed["pagination"]["totalPages"], 2);
    assert_eq!(listed["testResults"].as_array().unwrap().len(), 1);

    let (status, _) = app.get("/api/test-results?status=weird").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for result in [&first, &second] {
        let id = result["id"].as_str().unwrap();
        let (status, _) = app.delete(&format!("/api/test-results/{id}")).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(app.registration_status(&registration_id).await, "registered");
}

#[tokio::test]
async fn registration_rejects_unknown_tests_and_missing_name() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/api/registration",
            json!({"name": "Ana", "selectedTests": ["nao-existe"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("nao-existe"));

    let (status, _) = app.post("/api/registration", json!({"name": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/registration/desconhecido").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn medicine_issue_moves_stock_and_status() {
    let app = setup().await;
    let (registration_id, _) = app.register("João", &[]).await;
    let ibuprofen = app.id_by_name("/api/medicines", "Ibuprofen").await;

    let (status, body) = app
        .post(
            "/api/medicine-issues",
            json!({"registrationId": registration_id, "medicineId": ibuprofen, "quantity": 51}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["available"], 50);
    assert_eq!(body["requested"], 51);
    assert_eq!(app.registration_status(&registration_id).await, "registered");

    let (status, issued) = app
        .post(
            "/api/medicine-issues",
            json!({
                "registrationId": registration_id,
                "medicineId": ibuprofen,
                "quantity": 10,
                "dosage": "1x ao dia",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{issued}");
    assert_eq!(issued["medicine"]["stock"], 40);
    assert_eq!(app.registration_status(&registration_id).await, "medicines_issued");

    let issue_id = issued["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .put(
            &format!("/api/medicine-issues/{issue_id}"),
            json!({"quantity": 15}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, medicine) = app.get(&format!("/api/medicines/{ibuprofen}")).await;
    assert_eq!(medicine["stock"], 35);

    let (_, listed) = app
        .get(&format!("/api/medicine-issues?registrationId={registration_id}"))
        .await;
    assert_eq!(listed["medicineIssues"].as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&format!("/api/medicine-issues/{issue_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, medicine) = app.get(&format!("/api/medicines/{ibuprofen}")).await;
    assert_eq!(medicine["stock"], 50);

    let (status, _) = app.get(&format!("/api/medicine-issues/{issue_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn settings_post_conflicts_put_upserts() {
    let app = setup().await;

    let (status, _) = app
        .post("/api/settings", json!({"key": "camp_name", "value": "Outro"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, created) = app
        .post(
            "/api/settings",
            json!({"key": "theme", "value": "dark", "category": "ui"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["category"], "ui");

    let (status, updated) = app
        .put("/api/settings", json!({"key": "theme", "value": "light"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["value"], "light");
    assert_eq!(updated["category"], "ui");

    let (_, single) = app.get("/api/settings?key=theme").await;
    assert_eq!(single["value"], "light");

    let (status, batch) = app
        .send(
            Method::PATCH,
            "/api/settings",
            Some(json!({"settings": {"low_stock_threshold": 60}, "updatedBy": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["settings"][0]["category"], "medical");

    let (_, grouped) = app.get("/api/settings").await;
    assert_eq!(grouped["settings"]["medical"]["low_stock_threshold"], "60");
    assert_eq!(grouped["settings"]["general"]["camp_name"], "Medical Camp");

    // estoque abaixo de 60 (estrito)
    let (_, report) = app.get("/api/reports?type=medicines").await;
    let low: Vec<&str> = report["lowStockMedicines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert!(low.contains(&"Ibuprofen"));
    assert!(!low.contains(&"Omeprazole"));

    let (status, _) = app.delete("/api/settings/theme").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/settings/theme").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn qr_code_and_scan() {
    let app = setup().await;
    let (registration_id, patient_id) = app.register("Clara", &[RBS]).await;

    let (status, first) = app.get(&format!("/api/qr/{registration_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["qrValue"], patient_id.as_str());
    assert!(first["qrCode"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));

    let (_, second) = app.get(&format!("/api/qr/{registration_id}")).await;
    assert_eq!(first["qrCode"], second["qrCode"]);

    let (status, scanned) = app.get(&format!("/api/scan?qr={patient_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scanned["scannedValue"], patient_id.as_str());
    assert_eq!(scanned["patient"]["name"], "Clara");
    assert_eq!(
        scanned["patient"]["registrations"][0]["registrationTests"]
            .as_array()
            .unwrap()
            .len(),
        1
    );

    let (status, _) = app.get("/api/scan").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/qr/nao-existe").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patient_search_and_update() {
    let app = setup().await;
    let (_, patient_id) = app.register("Beatriz Nunes", &[]).await;

    let (_, found) = app.get("/api/patients/search?q=nunes").await;
    assert_eq!(found["patients"].as_array().unwrap().len(), 1);

    let (status, updated) = app
        .put(
            &format!("/api/patients/{patient_id}"),
            json!({"weight": 70.5, "bloodPressure": "130/85"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["patient"]["weight"], 70.5);
    assert_eq!(updated["patient"]["name"], "Beatriz Nunes");
}

#[tokio::test]
async fn satisfaction_and_reports() {
    let app = setup().await;

    let (status, _) = app
        .post("/api/satisfaction", json!({"rating": 5, "feedback": "Excelente"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post("/api/satisfaction", json!({"rating": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, ratings) = app.get("/api/satisfaction").await;
    assert_eq!(ratings.as_array().unwrap().len(), 1);

    let (status, report) = app.get("/api/reports?type=satisfaction").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["satisfactionStats"]["totalRatings"], 1);

    let (_, overview) = app.get("/api/reports").await;
    assert!(overview["summary"]["totalPatients"].is_number());

    let (status, _) = app.get("/api/reports?type=finance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/reports?type=tests&startDate=ontem").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .get("/api/reports?type=patients&startDate=2025-01-01&endDate=2025-01-31")
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_input_gets_json_400() {
    let app = setup().await;

    let (status, body) = app
        .post("/api/satisfaction", json!({ "rating": "abc" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("rating"));

    let (status, body) = app
        .send_raw(Method::POST, "/api/medicines", Some("{not json".to_string()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/test-results?page=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.post("/api/test-types", json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, ratings) = app.get("/api/satisfaction").await;
    assert!(ratings.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_type_in_use_cannot_be_deleted() {
    let app = setup().await;
    app.register("Paulo", &[RBS]).await;
    let rbs = app.id_by_name("/api/test-types", RBS).await;

    let (status, _) = app.delete(&format!("/api/test-types/{rbs}")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/test-types", json!({"name": RBS, "requiresResult": true}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn maintenance_mode_blocks_api() {
    let app = setup_with(true).await;

    let (status, body) = app.get("/api/medicines").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/maintenance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maintenanceMode"], true);

    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/maintenance/disable").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maintenanceMode"], false);
    let content = std::fs::read_to_string(&app.env_file).unwrap();
    assert!(content.contains("MAINTENANCE_MODE=false"));
    assert!(content.contains("CAMP_SEED=true"));

    // continua bloqueado até reiniciar
    let (status, _) = app.get("/api/medicines").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn maintenance_toggle_rewrites_env_file() {
    let app = setup().await;

    let (status, body) = app
        .post("/api/maintenance", json!({"maintenanceMode": true}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let content = std::fs::read_to_string(&app.env_file).unwrap();
    assert_eq!(content.matches("MAINTENANCE_MODE=").count(), 1);
    assert!(content.contains("MAINTENANCE_MODE=true"));

    let (status, _) = app.post("/api/maintenance", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
        .fetch_one(&app.db.pool)
        .await
        .unwrap();
    assert_eq!(count, 8);
}
