//! In-memory collaborator used by the engine's tests

#![allow(clippy::unwrap_used, reason = "test code")]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::client::{ApiEnvelope, IntakeBackend, ReferenceListing};
use crate::constants::{EXTENSION, IDENTITY, TYPE_SELECTOR};
use crate::error::{Error, Result};
use crate::ids::{ReferenceId, SubjectId, TenantId};
use crate::schema::EntityName;

const FIRST_ASSIGNED_IDENTITY: u64 = 100;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    FetchSchema(EntityName),
    FetchAggregate,
    UpdateAggregate(Value),
    AddReference(Map<String, Value>),
    UpdateReference(ReferenceId, Map<String, Value>),
    DeleteReference(ReferenceId),
    ListReferences,
}

#[derive(Default)]
struct State {
    schemas:            HashMap<EntityName, Value>,
    schema_delay:       Duration,
    aggregate:          Value,
    aggregate_failures: VecDeque<u16>,
    update_failure:     Option<u16>,
    update_envelope:    Option<Value>,
    listing_override:   Option<Value>,
    listing_failure:    Option<u16>,
    add_failure:        Option<u16>,
    references:         BTreeMap<ReferenceId, Map<String, Value>>,
    next_identity:      u64,
    calls:              Vec<BackendCall>,
}

/// Scriptable [`IntakeBackend`] that records every call in order
pub struct MockBackend {
    state: Mutex<State>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                aggregate: json!({}),
                next_identity: FIRST_ASSIGNED_IDENTITY,
                ..State::default()
            }),
        }
    }

    pub fn set_schema(&self, entity: EntityName, raw: Value) {
        self.state.lock().unwrap().schemas.insert(entity, raw);
    }

    /// Delay every schema fetch, on the tokio clock
    pub fn set_schema_delay(&self, delay: Duration) {
        self.state.lock().unwrap().schema_delay = delay;
    }

    pub fn set_aggregate(&self, aggregate: Value) {
        self.state.lock().unwrap().aggregate = aggregate;
    }

    /// Fail the next aggregate fetches with these statuses, in order
    pub fn script_aggregate_failures(&self, statuses: &[u16]) {
        self.state
            .lock()
            .unwrap()
            .aggregate_failures
            .extend(statuses.iter().copied());
    }

    pub fn fail_aggregate_updates(&self, status: u16) {
        self.state.lock().unwrap().update_failure = Some(status);
    }

    /// Answer aggregate updates with this envelope under a 200 status
    pub fn reply_to_aggregate_updates(&self, envelope: Value) {
        self.state.lock().unwrap().update_envelope = Some(envelope);
    }

    /// Serve this raw payload from the reference listing
    pub fn set_listing(&self, raw: Value) {
        self.state.lock().unwrap().listing_override = Some(raw);
    }

    pub fn fail_listing(&self, status: u16) {
        self.state.lock().unwrap().listing_failure = Some(status);
    }

    pub fn fail_adds(&self, status: u16) {
        self.state.lock().unwrap().add_failure = Some(status);
    }

    /// Put a reference into the remote store under `identity`
    pub fn seed_reference(&self, identity: ReferenceId, fields: Value) {
        let fields = fields.as_object().cloned().unwrap_or_default();
        self.state.lock().unwrap().references.insert(identity, fields);
    }

    /// Stored fields of one remote reference
    pub fn remote_reference(&self, identity: ReferenceId) -> Option<Map<String, Value>> {
        self.state.lock().unwrap().references.get(&identity).cloned()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn schema_fetches(&self, entity: EntityName) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| **call == BackendCall::FetchSchema(entity))
            .count()
    }

    fn record(&self, call: BackendCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn status_error<T>(status: u16, message: &str) -> Result<T> {
    Err(Error::persistence(status, message).into())
}

#[async_trait]
impl IntakeBackend for MockBackend {
    async fn fetch_schema(&self, entity: EntityName, _tenant: TenantId) -> Result<Value> {
        self.record(BackendCall::FetchSchema(entity));
        let (delay, schema) = {
            let state = self.state.lock().unwrap();
            (state.schema_delay, state.schemas.get(&entity).cloned())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        schema.map_or_else(|| status_error(404, "schema not found"), Ok)
    }

    async fn fetch_aggregate(&self, _subject: SubjectId, _tenant: TenantId) -> Result<Value> {
        self.record(BackendCall::FetchAggregate);
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.aggregate_failures.pop_front() {
            return status_error(status, "aggregate unavailable");
        }
        Ok(state.aggregate.clone())
    }

    async fn update_aggregate(&self, _subject: SubjectId, payload: &Value) -> Result<Value> {
        self.record(BackendCall::UpdateAggregate(payload.clone()));
        let (failure, envelope) = {
            let state = self.state.lock().unwrap();
            (state.update_failure, state.update_envelope.clone())
        };
        if let Some(status) = failure {
            return status_error(status, "aggregate update rejected");
        }
        match envelope {
            Some(raw) => serde_json::from_value::<ApiEnvelope>(raw)
                .unwrap()
                .into_data("update aggregate", 200),
            None => Ok(json!({})),
        }
    }

    async fn add_reference(
        &self,
        _subject: SubjectId,
        reference: &Map<String, Value>,
    ) -> Result<Option<ReferenceId>> {
        self.record(BackendCall::AddReference(reference.clone()));
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.add_failure {
            return status_error(status, "reference add rejected");
        }
        let identity = ReferenceId(state.next_identity);
        state.next_identity += 1;
        state.references.insert(identity, reference.clone());
        Ok(Some(identity))
    }

    async fn update_reference(
        &self,
        _subject: SubjectId,
        identity: ReferenceId,
        updates: &Map<String, Value>,
    ) -> Result<()> {
        self.record(BackendCall::UpdateReference(identity, updates.clone()));
        let mut state = self.state.lock().unwrap();
        let Some(stored) = state.references.get_mut(&identity) else {
            return status_error(404, "reference not found");
        };
        stored.extend(updates.clone());
        Ok(())
    }

    async fn delete_reference(&self, _subject: SubjectId, identity: ReferenceId) -> Result<()> {
        self.record(BackendCall::DeleteReference(identity));
        match self.state.lock().unwrap().references.remove(&identity) {
            Some(_) => Ok(()),
            None => status_error(404, "reference not found"),
        }
    }

    async fn list_references(&self, _subject: SubjectId) -> Result<ReferenceListing> {
        self.record(BackendCall::ListReferences);
        let state = self.state.lock().unwrap();
        if let Some(status) = state.listing_failure {
            return status_error(status, "reference listing unavailable");
        }
        if let Some(raw) = state.listing_override.clone() {
            drop(state);
            return ReferenceListing::from_value(raw);
        }
        let references: Vec<Value> = state
            .references
            .iter()
            .map(|(identity, fields)| {
                let mut item = Map::new();
                item.insert(IDENTITY.to_string(), json!(identity));
                let (type_selector, extension): (Map<String, Value>, Map<String, Value>) = fields
                    .clone()
                    .into_iter()
                    .partition(|(key, _)| key == TYPE_SELECTOR);
                item.extend(type_selector);
                item.insert(EXTENSION.to_string(), Value::Object(extension));
                Value::Object(item)
            })
            .collect();
        drop(state);
        ReferenceListing::from_value(json!({ "references": references }))
    }
}
