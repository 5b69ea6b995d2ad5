//! Simulated todo service.
//!
//! Runs a handful of requests (list, fetch, create, a missing todo and one
//! that is cancelled by a timeout) through `request-telemetry` and writes
//! every record to stdout as a JSON line. Diagnostics go to stderr.
//!
//! ```text
//! LOG_LEVEL=info SERVICE_NAME=todo-demo cargo run -p telemetry-demo
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use request_telemetry::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const NODE: &str = "todo/handler.rs";
const SUCCESS_CODE: &str = "20000";

// =============================================================================
// Todo store
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Todo {
    id: u32,
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct CreateTodo {
    name: String,
    description: String,
}

#[derive(Debug, thiserror::Error)]
enum TodoError {
    #[error("todo {0} not found")]
    NotFound(u32),

    #[error("invalid todo payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl TodoError {
    fn status(&self) -> u16 {
        match self {
            TodoError::NotFound(_) => 404,
            TodoError::InvalidPayload(_) => 400,
            TodoError::Telemetry(_) => 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TodoStore {
    todos: Arc<RwLock<BTreeMap<u32, Todo>>>,
}

impl TodoStore {
    async fn seeded(count: u32) -> Self {
        let store = Self::default();
        {
            let mut todos = store.todos.write().await;
            for id in 1..=count {
                todos.insert(
                    id,
                    Todo {
                        id,
                        name: format!("todo {}", id),
                        description: format!("generated todo number {}", id),
                    },
                );
            }
        }
        store
    }

    async fn list(&self, page: usize, limit: usize) -> Value {
        let todos = self.todos.read().await;
        let data: Vec<&Todo> = todos
            .values()
            .skip(page.saturating_sub(1) * limit)
            .take(limit)
            .collect();
        json!({"data": data, "total": todos.len(), "page": page, "pageSize": limit})
    }

    async fn get(&self, id: u32) -> Result<Todo, TodoError> {
        self.todos
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TodoError::NotFound(id))
    }

    async fn insert(&self, input: CreateTodo) -> Todo {
        let mut todos = self.todos.write().await;
        let id = todos.keys().next_back().copied().unwrap_or(0) + 1;
        let todo = Todo {
            id,
            name: input.name,
            description: input.description,
        };
        todos.insert(id, todo.clone());
        todo
    }
}

// =============================================================================
// Routing
// =============================================================================

/// Runs one handler inside request telemetry and records its outcome.
async fn route<F, Fut>(emitter: &EventEmitter, request: RequestSnapshot, cmd: &'static str, handler: F)
where
    F: FnOnce(DetailRecorder, SummaryRecorder) -> Fut,
    Fut: Future<Output = Result<Value, TodoError>>,
{
    let telemetry = RequestTelemetry::from_request(request, emitter);
    let scope = telemetry.scope().clone();

    let recorded = telemetry
        .instrument(|detail, summary| async move {
            match handler(detail.clone(), summary).await {
                Ok(data) => {
                    scope.record_response(
                        ResponseSnapshot::new(200).with_header("content-type", "application/json"),
                    );
                    detail.add_response_success(NODE, cmd, SUCCESS_CODE, &data)
                }
                Err(e) => {
                    scope.record_response(ResponseSnapshot::new(e.status()));
                    detail.add_response_error(NODE, cmd, ErrorInfo::from_error(&e))
                }
            }
        })
        .await;

    if let Err(e) = recorded {
        tracing::warn!(cmd = %cmd, error = %e, "Telemetry call rejected");
    }
}

fn get_request(path: &str) -> RequestSnapshot {
    RequestSnapshot::new("GET", format!("/api{}", path))
        .with_base_url("/api", path)
        .with_header("host", "localhost:3000")
        .with_header("user-agent", "telemetry-demo/0.1")
        .with_remote_addr("127.0.0.1")
}

// =============================================================================
// Main
// =============================================================================

fn init_logging(config: &TelemetryConfig) {
    let default_level = LevelFilter::from(config.level.to_tracing_level());
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TelemetryConfig::from_env()?;
    init_logging(&config);

    let mut emitter = EventEmitter::new(&config, WriterSink::stdout());
    emitter.add_default_meta("app", "todo-demo");
    emitter.info("todo service started", &json!({"todos": 20}));

    let store = TodoStore::seeded(20).await;

    // List with pagination.
    let request = get_request("/todo?page=2&limit=3")
        .with_header("x-transaction-id", "demo-list-1")
        .with_query(json!({"page": 2, "limit": 3}));
    let query = request.query.clone();
    route(&emitter, request, "Get Todos", |detail, summary| {
        let store = store.clone();
        async move {
            detail.add_detail(NODE, "Get Todos", &())?;
            detail.add_request_query(NODE, "query", &query)?;
            let page = query["page"].as_u64().unwrap_or(1) as usize;
            let limit = query["limit"].as_u64().unwrap_or(10) as usize;
            let data = store.list(page, limit).await;
            summary.add_success_block(NODE, "list", SUCCESS_CODE, "success")?;
            Ok::<_, TodoError>(data)
        }
    })
    .await;

    // Fetch one todo.
    route(&emitter, get_request("/todo/3"), "Get Todo", |detail, _summary| {
        let store = store.clone();
        async move {
            detail.add_request_params(NODE, "params", &json!({"id": "3"}))?;
            let todo = store.get(3).await?;
            Ok::<_, TodoError>(serde_json::to_value(todo)?)
        }
    })
    .await;

    // Missing todo.
    route(&emitter, get_request("/todo/404"), "Get Todo", |detail, _summary| {
        let store = store.clone();
        async move {
            detail.add_request_params(NODE, "params", &json!({"id": "404"}))?;
            let todo = store.get(404).await?;
            Ok::<_, TodoError>(serde_json::to_value(todo)?)
        }
    })
    .await;

    // Create with sensitive fields.
    let body = json!({
        "name": "call the bank",
        "description": "account 123-456-789",
        "owner": {"email": "somchai@mail.com", "mobileNo": "0812345678", "password": "hunter2"}
    });
    let request = RequestSnapshot::new("POST", "/api/todo")
        .with_base_url("/api", "/todo")
        .with_header("host", "localhost:3000")
        .with_header("x-forwarded-for", "203.0.113.7")
        .with_header("x-location", "Bangkok")
        .with_body(body.clone());
    route(&emitter, request, "Create Todo", |detail, _summary| {
        let store = store.clone();
        async move {
            detail.set_sensitive_masking([("description", "[private]")])?;
            detail.add_request_body(NODE, "todo", &body)?;
            let input: CreateTodo = serde_json::from_value(body)?;
            let todo = store.insert(input).await;
            Ok::<_, TodoError>(serde_json::to_value(todo)?)
        }
    })
    .await;

    // Client gives up before the handler finishes.
    let slow = route(&emitter, get_request("/todo/slow"), "Slow Todo", |detail, _summary| async move {
        detail.add_message(NODE, "waiting on a slow dependency")?;
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, TodoError>(json!({}))
    });
    if tokio::time::timeout(Duration::from_millis(50), slow).await.is_err() {
        tracing::info!("Slow request cancelled by timeout");
    }

    Ok(())
}
