//! In-memory entity store
//!
//! Reference [`OperationDispatcher`] backing the batch gateway binary and the
//! test suites. Entities are JSON objects keyed by `u64` inside named entity
//! sets. Writes made inside a transaction scope are staged in an overlay and
//! only become visible to other callers on commit.

mod path;


use crate::core::batch::BatchError;
use crate::core::traits::{
    OperationDispatcher, OperationRequest, OperationResponse, TransactionScope,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use path::{PathError, ResourcePath};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use url::Url;
use uuid::Uuid;

type Overlay = BTreeMap<(String, u64), Option<Value>>;

#[derive(Debug, Default)]
struct StoreState {
    committed: HashMap<String, BTreeMap<u64, Value>>,
    next_keys: HashMap<String, u64>,
    overlays: HashMap<Uuid, Overlay>,
}

impl StoreState {
    fn get(&self, set: &str, key: u64, scope: Option<Uuid>) -> Option<&Value> {
        if let Some(staged) = scope
            .and_then(|id| self.overlays.get(&id))
            .and_then(|overlay| overlay.get(&(set.to_string(), key)))
        {
            return staged.as_ref();
        }
        self.committed.get(set).and_then(|entities| entities.get(&key))
    }

    fn list(&self, set: &str, scope: Option<Uuid>) -> Vec<Value> {
        let mut view = self.committed.get(set).cloned().unwrap_or_default();
        if let Some(overlay) = scope.and_then(|id| self.overlays.get(&id)) {
            for ((staged_set, key), staged) in overlay {
                if staged_set != set {
                    continue;
                }
                match staged {
                    Some(value) => view.insert(*key, value.clone()),
                    None => view.remove(key),
                };
            }
        }
        view.into_values().collect()
    }

    fn write(&mut self, set: &str, key: u64, value: Option<Value>, scope: Option<Uuid>) {
        if let Some(overlay) = scope.and_then(|id| self.overlays.get_mut(&id)) {
            overlay.insert((set.to_string(), key), value);
            return;
        }
        apply(&mut self.committed, set.to_string(), key, value);
    }

    /// Keys come from one counter per set, so a rollback leaves gaps
    fn allocate_key(&mut self, set: &str) -> u64 {
        let next = self.next_keys.entry(set.to_string()).or_insert(1);
        let key = *next;
        *next += 1;
        key
    }
}

fn apply(
    committed: &mut HashMap<String, BTreeMap<u64, Value>>,
    set: String,
    key: u64,
    value: Option<Value>,
) {
    let entities = committed.entry(set).or_default();
    match value {
        Some(value) => {
            entities.insert(key, value);
        }
        None => {
            entities.remove(&key);
        }
    }
}

/// In-memory dispatcher over a fixed catalog of entity sets
#[derive(Debug)]
pub struct InMemoryStore {
    service_root: Url,
    entity_sets: HashSet<String>,
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new<I, S>(service_root: Url, entity_sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service_root: crate::core::batch::normalize_service_root(service_root),
            entity_sets: entity_sets.into_iter().map(Into::into).collect(),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Seed a committed entity, returning its key
    pub fn insert(&self, set: &str, value: Value) -> u64 {
        let mut state = self.state.lock();
        let key = state.allocate_key(set);
        let entity = with_key(value, key);
        apply(&mut state.committed, set.to_string(), key, Some(entity));
        key
    }

    /// Committed entity, as seen outside any transaction
    pub fn entity(&self, set: &str, key: u64) -> Option<Value> {
        self.state.lock().get(set, key, None).cloned()
    }

    /// Number of committed entities in a set
    pub fn count(&self, set: &str) -> usize {
        self.state
            .lock()
            .committed
            .get(set)
            .map_or(0, BTreeMap::len)
    }

    /// Number of transaction scopes that are still open
    pub fn open_transactions(&self) -> usize {
        self.state.lock().overlays.len()
    }

    fn location(&self, set: &str, key: u64) -> Result<Url, BatchError> {
        self.service_root
            .join(&format!("{}({})", set, key))
            .map_err(|e| BatchError::dispatch(e.to_string()))
    }

    fn handle(
        &self,
        request: &OperationRequest,
        scope: Option<Uuid>,
    ) -> Result<OperationResponse, BatchError> {
        let path = match ResourcePath::parse(&request.url, &self.service_root) {
            Ok(path) => path,
            Err(PathError::NotFound) => return Ok(error_response(404, "Resource not found")),
            Err(PathError::InvalidKey(key)) => {
                return Ok(error_response(400, &format!("Invalid key '{}'", key)));
            }
        };
        if !self.entity_sets.contains(path.set()) {
            return Ok(error_response(404, &format!("Unknown entity set '{}'", path.set())));
        }
        if let ResourcePath::Navigation { target, .. } = &path {
            if !self.entity_sets.contains(target) {
                return Ok(error_response(404, &format!("Unknown entity set '{}'", target)));
            }
        }

        let mut state = self.state.lock();
        if let Some(id) = scope {
            if !state.overlays.contains_key(&id) {
                return Err(BatchError::dispatch(format!("unknown transaction scope {}", id)));
            }
        }

        match (request.method.as_str(), &path) {
            ("GET", ResourcePath::Collection { set }) => {
                json_response(200, &json!({ "value": state.list(set, scope) }))
            }
            ("GET", ResourcePath::Entity { set, key }) => match state.get(set, *key, scope) {
                Some(entity) => json_response(200, entity),
                None => Ok(not_found(set, *key)),
            },
            ("GET", ResourcePath::Navigation { set, key, target }) => {
                if state.get(set, *key, scope).is_none() {
                    return Ok(not_found(set, *key));
                }
                let link = link_field(set);
                let children: Vec<Value> = state
                    .list(target, scope)
                    .into_iter()
                    .filter(|child| child.get(&link) == Some(&json!(key)))
                    .collect();
                json_response(200, &json!({ "value": children }))
            }
            ("POST", ResourcePath::Collection { set }) => {
                let Some(fields) = parse_object(&request.body) else {
                    return Ok(invalid_body());
                };
                self.create(&mut state, set, fields, scope)
            }
            ("POST", ResourcePath::Navigation { set, key, target }) => {
                let Some(mut fields) = parse_object(&request.body) else {
                    return Ok(invalid_body());
                };
                if state.get(set, *key, scope).is_none() {
                    return Ok(not_found(set, *key));
                }
                fields.insert(link_field(set), json!(key));
                self.create(&mut state, target, fields, scope)
            }
            ("PUT", ResourcePath::Entity { set, key }) => {
                let Some(fields) = parse_object(&request.body) else {
                    return Ok(invalid_body());
                };
                if state.get(set, *key, scope).is_none() {
                    return Ok(not_found(set, *key));
                }
                state.write(set, *key, Some(with_key(Value::Object(fields), *key)), scope);
                Ok(OperationResponse::new(204))
            }
            ("PATCH" | "MERGE", ResourcePath::Entity { set, key }) => {
                let Some(fields) = parse_object(&request.body) else {
                    return Ok(invalid_body());
                };
                let Some(mut entity) = state.get(set, *key, scope).cloned() else {
                    return Ok(not_found(set, *key));
                };
                if let Value::Object(existing) = &mut entity {
                    existing.extend(fields);
                }
                state.write(set, *key, Some(with_key(entity, *key)), scope);
                Ok(OperationResponse::new(204))
            }
            ("DELETE", ResourcePath::Entity { set, key }) => {
                if state.get(set, *key, scope).is_none() {
                    return Ok(not_found(set, *key));
                }
                state.write(set, *key, None, scope);
                Ok(OperationResponse::new(204))
            }
            (method, _) => Ok(error_response(
                405,
                &format!("Method {} is not allowed on this resource", method),
            )),
        }
    }

    fn create(
        &self,
        state: &mut StoreState,
        set: &str,
        fields: Map<String, Value>,
        scope: Option<Uuid>,
    ) -> Result<OperationResponse, BatchError> {
        let key = state.allocate_key(set);
        let entity = with_key(Value::Object(fields), key);
        state.write(set, key, Some(entity.clone()), scope);

        let location = self.location(set, key)?;
        debug!(set = set, key = key, "Entity created");
        Ok(json_response(201, &entity)?.with_header("Location", location.as_str()))
    }
}

#[async_trait]
impl OperationDispatcher for InMemoryStore {
    async fn begin(&self) -> Result<TransactionScope, BatchError> {
        let scope = TransactionScope::new();
        self.state
            .lock()
            .overlays
            .insert(scope.id(), Overlay::default());
        Ok(scope)
    }

    async fn dispatch(
        &self,
        request: &OperationRequest,
        scope: Option<&TransactionScope>,
    ) -> Result<OperationResponse, BatchError> {
        self.handle(request, scope.map(TransactionScope::id))
    }

    async fn commit(&self, scope: TransactionScope) -> Result<(), BatchError> {
        let mut state = self.state.lock();
        let overlay = state
            .overlays
            .remove(&scope.id())
            .ok_or_else(|| BatchError::dispatch(format!("unknown transaction scope {}", scope.id())))?;

        let writes = overlay.len();
        for ((set, key), value) in overlay {
            apply(&mut state.committed, set, key, value);
        }
        debug!(scope = %scope.id(), writes = writes, "Transaction committed");
        Ok(())
    }

    async fn rollback(&self, scope: TransactionScope) -> Result<(), BatchError> {
        let discarded = self
            .state
            .lock()
            .overlays
            .remove(&scope.id())
            .map_or(0, |overlay| overlay.len());
        debug!(scope = %scope.id(), writes = discarded, "Transaction rolled back");
        Ok(())
    }
}

fn link_field(set: &str) -> String {
    format!("{}Id", set)
}

fn with_key(mut value: Value, key: u64) -> Value {
    if let Value::Object(fields) = &mut value {
        fields.insert("Id".to_string(), json!(key));
    }
    value
}

fn parse_object(body: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(fields)) => Some(fields),
        _ => None,
    }
}

fn json_response(status: u16, value: &Value) -> Result<OperationResponse, BatchError> {
    let body = serde_json::to_vec(value).map_err(|e| BatchError::dispatch(e.to_string()))?;
    Ok(OperationResponse::new(status)
        .with_header("Content-Type", "application/json")
        .with_body(body))
}

fn error_response(status: u16, message: &str) -> OperationResponse {
    let body = json!({ "error": { "code": status.to_string(), "message": message } });
    OperationResponse::new(status)
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string())
}

fn not_found(set: &str, key: u64) -> OperationResponse {
    error_response(404, &format!("{}({}) does not exist", set, key))
}

fn invalid_body() -> OperationResponse {
    error_response(400, "Request body must be a JSON object")
}
