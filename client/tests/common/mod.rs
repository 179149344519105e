//! In-process stub of the prediction backend

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use rockblast::logic::config::ClientConfig;
use rockblast::logic::gateway::ApiClient;
use rockblast::logic::prediction::PredictionService;
use rockblast::logic::recents::RecentsCache;
use rockblast::logic::session::Session;
use rockblast::logic::storage::LocalStore;

pub const TOKEN: &str = "tok-1";
pub const PASSWORD: &str = "secret";

#[derive(Default)]
pub struct StubState {
    pub records: BTreeMap<String, Value>,
    pub settings: Option<Value>,
    pub fail_settings: bool,
    pub fail_history: bool,
    /// When false, `PUT /api/account` answers 404
    pub account_route: bool,
    pub last_authorization: Option<String>,
    pub account_updates: Vec<(String, Value)>,
    pub logged_out_all: bool,
    pub account_deleted: bool,
}

pub type Shared = Arc<Mutex<StubState>>;

type Reply = (StatusCode, Json<Value>);
type Handled = Result<Json<Value>, Reply>;

pub struct StubServer {
    pub url: String,
    pub state: Shared,
}

pub async fn spawn() -> StubServer {
    let state: Shared = Arc::default();

    let app = Router::new()
        .route("/api/signin", post(signin))
        .route("/api/signup", post(signup))
        .route("/api/profile", get(profile))
        .route("/api/predict", post(predict))
        .route("/api/data/:id", get(fetch).put(update).delete(remove))
        .route("/api/predictions/history", get(history))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/account", put(update_account).delete(delete_account))
        .route("/api/update-profile", put(update_profile))
        .route("/api/user/data/export", get(export_data))
        .route("/api/logout/all-devices", post(logout_all))
        .route("/api/broken", get(broken))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubServer {
        url: format!("http://{}", addr),
        state,
    }
}

/// Services wired to a stub server over an in-memory store
pub struct Harness {
    pub server: StubServer,
    pub store: Arc<LocalStore>,
    pub session: Arc<Session>,
    pub api: Arc<ApiClient>,
}

impl Harness {
    pub async fn new(signed_in: bool) -> Self {
        let server = spawn().await;
        Self::over(server, Arc::new(LocalStore::in_memory()), signed_in)
    }

    pub fn over(server: StubServer, store: Arc<LocalStore>, signed_in: bool) -> Self {
        let session = Arc::new(Session::restore(store.clone()));
        if signed_in {
            session.authenticate(TOKEN).unwrap();
        }
        let config = ClientConfig::default().with_api_url(server.url.clone());
        let api = Arc::new(ApiClient::new(&config, session.clone()).unwrap());

        Self {
            server,
            store,
            session,
            api,
        }
    }

    pub fn predictions(&self) -> PredictionService {
        PredictionService::new(self.api.clone(), Arc::new(RecentsCache::new(self.store.clone())))
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, StubState> {
        self.server.state.lock()
    }
}

fn error(status: StatusCode, detail: &str) -> Reply {
    (status, Json(json!({ "detail": detail })))
}

fn authorize(state: &Shared, headers: &HeaderMap) -> Result<(), Reply> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().last_authorization = auth.clone();

    let expected = format!("Bearer {}", TOKEN);
    if auth.as_deref() == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
    }
}

fn ucs(inputs: &Value) -> f64 {
    inputs.get("UCS (MPa)").and_then(Value::as_f64).unwrap_or(0.0)
}

fn predictions_for(inputs: &Value) -> Value {
    let ucs = ucs(inputs);
    json!({
        "Fragmentation_Size (cm)": {"SVR": ucs / 6.0, "XGBoost": ucs / 5.0, "Random Forest": ucs / 4.0},
        "Powder_Factor": {"SVR": 0.5, "XGBoost": 0.55, "Random Forest": 0.6}
    })
}

fn structured(id: &str, inputs: &Value) -> Value {
    json!({ "id": id, "input_data": inputs, "predictions": predictions_for(inputs) })
}

async fn signin(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Handled {
    state.lock().last_authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if body["password"] == PASSWORD {
        Ok(Json(json!({ "access_token": TOKEN, "token_type": "bearer" })))
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "Incorrect email or password"))
    }
}

async fn signup(Json(body): Json<Value>) -> Handled {
    if body["username"].as_str().unwrap_or_default().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Username already registered"));
    }
    Ok(Json(json!({ "access_token": TOKEN })))
}

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> Handled {
    authorize(&state, &headers)?;
    Ok(Json(json!({
        "username": "ana",
        "email": "ana@example.com",
        "firstName": "Ana",
        "created_at": "2024-01-01T00:00:00Z"
    })))
}

async fn predict(State(state): State<Shared>, headers: HeaderMap, Json(mut body): Json<Value>) -> Handled {
    authorize(&state, &headers)?;

    if ucs(&body) <= 0.0 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [
                {"loc": ["body", "UCS (MPa)"], "msg": "must be greater than 0", "type": "value_error"}
            ]})),
        ));
    }

    let id = body["id"].as_str().unwrap_or_default().to_string();
    let mut state = state.lock();
    body["created_at"] = json!(format!("2024-03-01T08:{:02}:00Z", state.records.len()));
    state.records.insert(id.clone(), body.clone());

    Ok(Json(structured(&id, &body)))
}

async fn fetch(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Handled {
    authorize(&state, &headers)?;

    if id == "no-data" {
        return Ok(Json(json!({ "id": "no-data", "Rock_Type": "Granite", "UCS (MPa)": 100 })));
    }

    match state.lock().records.get(&id) {
        Some(inputs) => Ok(Json(json!({ "result": structured(&id, inputs) }))),
        None => Err(error(StatusCode::NOT_FOUND, "Prediction not found")),
    }
}

/// Answers in the flat `<model>_<metric>` shape
async fn update(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(fields): Json<Value>,
) -> Handled {
    authorize(&state, &headers)?;

    let mut state = state.lock();
    let Some(stored) = state.records.get_mut(&id) else {
        return Err(error(StatusCode::NOT_FOUND, "Prediction not found"));
    };
    if let (Some(stored), Some(fields)) = (stored.as_object_mut(), fields.as_object()) {
        for (key, value) in fields {
            stored.insert(key.clone(), value.clone());
        }
    }

    let mut flat = stored.clone();
    let ucs = ucs(&flat);
    flat["SVR_Fragmentation_Size (cm)"] = json!(ucs / 6.0);
    flat["XGBoost_Fragmentation_Size (cm)"] = json!(ucs / 5.0);
    flat["Random_Forest_Fragmentation_Size (cm)"] = json!(ucs / 4.0);
    Ok(Json(flat))
}

async fn remove(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Handled {
    authorize(&state, &headers)?;
    match state.lock().records.remove(&id) {
        Some(_) => Ok(Json(json!({ "message": "Prediction deleted" }))),
        None => Err(error(StatusCode::NOT_FOUND, "Prediction not found")),
    }
}

async fn history(State(state): State<Shared>, headers: HeaderMap) -> Handled {
    authorize(&state, &headers)?;
    let state = state.lock();
    if state.fail_history {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "database offline"));
    }

    let items: Vec<Value> = state
        .records
        .iter()
        .map(|(id, inputs)| json!({ "result": structured(id, inputs) }))
        .collect();
    Ok(Json(Value::Array(items)))
}

async fn get_settings(State(state): State<Shared>, headers: HeaderMap) -> Handled {
    authorize(&state, &headers)?;
    let state = state.lock();
    if state.fail_settings {
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, "settings store offline"));
    }
    Ok(Json(state.settings.clone().unwrap_or_else(|| json!({}))))
}

async fn put_settings(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Handled {
    authorize(&state, &headers)?;
    let mut state = state.lock();
    if state.fail_settings {
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, "settings store offline"));
    }
    state.settings = Some(body);
    Ok(Json(json!({ "message": "Settings saved" })))
}

async fn update_account(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Handled {
    authorize(&state, &headers)?;
    let mut state = state.lock();
    if !state.account_route {
        return Err(error(StatusCode::NOT_FOUND, "Not Found"));
    }
    state.account_updates.push(("/api/account".to_string(), body));
    Ok(Json(json!({ "message": "Account updated" })))
}

async fn update_profile(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Handled {
    authorize(&state, &headers)?;
    state
        .lock()
        .account_updates
        .push(("/api/update-profile".to_string(), body));
    Ok(Json(json!({ "message": "Profile updated" })))
}

async fn delete_account(State(state): State<Shared>, headers: HeaderMap) -> Handled {
    authorize(&state, &headers)?;
    state.lock().account_deleted = true;
    Ok(Json(json!({ "message": "Account deleted" })))
}

async fn export_data(State(state): State<Shared>, headers: HeaderMap) -> Handled {
    authorize(&state, &headers)?;
    let state = state.lock();
    Ok(Json(json!({
        "user": { "username": "ana", "email": "ana@example.com" },
        "predictions": state.records.values().cloned().collect::<Vec<_>>(),
        "settings": state.settings,
    })))
}

async fn logout_all(State(state): State<Shared>, headers: HeaderMap) -> Handled {
    authorize(&state, &headers)?;
    state.lock().logged_out_all = true;
    Ok(Json(json!({})))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream down")
}
