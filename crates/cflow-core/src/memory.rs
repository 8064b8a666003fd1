//! In-memory record and workflow stores
//!
//! Generic keyed stores for embedding the pipeline without a database.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::data_model::{DataSourceFilter, SourceRecord, SourceType};
use crate::error::{CflowError, Result};
use crate::providers::{RecordStore, WorkflowRequest, WorkflowStore};

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<SourceRecord>>,
    persisted: RwLock<HashMap<String, (String, Value)>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SourceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            persisted: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, record: SourceRecord) {
        self.records.write().await.push(record);
    }

    /// Look up a persisted entity by id, returning its kind and payload
    pub async fn persisted(&self, id: &str) -> Option<(String, Value)> {
        self.persisted.read().await.get(id).cloned()
    }

    pub async fn persisted_count(&self) -> usize {
        self.persisted.read().await.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch(&self, source_type: SourceType, filter: &DataSourceFilter) -> Result<Vec<SourceRecord>> {
        if filter.source_type != source_type {
            return Err(CflowError::Store(format!(
                "filter for {} used to fetch {}",
                filter.source_type, source_type
            )));
        }

        let records = self.records.read().await;
        let mut matched: Vec<SourceRecord> = records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn persist(&self, kind: &str, entity: Value) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.persisted
            .write()
            .await
            .insert(id.clone(), (kind.to_string(), entity));
        Ok(id)
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<String, WorkflowRequest>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, workflow_id: &str) -> Option<WorkflowRequest> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create_workflow(&self, request: WorkflowRequest) -> Result<String> {
        if request.steps.is_empty() {
            return Err(CflowError::Workflow("workflow needs at least one step".into()));
        }
        let id = format!("wf-{}", uuid::Uuid::new_v4());
        self.workflows.write().await.insert(id.clone(), request);
        Ok(id)
    }
}
