//! Common test utilities
//!
//! In-memory fakes for the three seams of the reconciler (Kubernetes store,
//! GCS provider, event recorder) plus builders for `Bucket` resources.

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use gcs_bucket_operator::config::ControllerConfig;
use gcs_bucket_operator::constants::{BUCKET_ANNOTATION, BUCKET_FINALIZER, BUCKET_OWNER_LABEL};
use gcs_bucket_operator::controller::reconciler::{
    reconcile_key, BucketStore, ReconcileOutcome, Reconciler, ReconcilerError, ResourceKey,
};
use gcs_bucket_operator::crd::Bucket;
use gcs_bucket_operator::observability::events::EventPublisher;
use gcs_bucket_operator::provider::{BucketAttrs, BucketProvider, NewBucket};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

// ============================================================================
// Resource builders
// ============================================================================

/// Builder for `Bucket` test resources in the `default` namespace
#[derive(Debug, Clone)]
pub struct BucketBuilder {
    resource_name: String,
    bucket_name: String,
    remove_on_delete: bool,
    finalizer: bool,
    deleting: bool,
    bucket_ref: Option<String>,
    annotation: Option<String>,
}

impl BucketBuilder {
    /// A resource whose metadata.name and spec.name are both `name`
    pub fn new(name: &str) -> Self {
        Self {
            resource_name: name.to_string(),
            bucket_name: name.to_string(),
            remove_on_delete: false,
            finalizer: false,
            deleting: false,
            bucket_ref: None,
            annotation: None,
        }
    }

    pub fn bucket_name(mut self, name: &str) -> Self {
        self.bucket_name = name.to_string();
        self
    }

    pub fn remove_on_delete(mut self) -> Self {
        self.remove_on_delete = true;
        self
    }

    pub fn with_finalizer(mut self) -> Self {
        self.finalizer = true;
        self
    }

    pub fn deleting(mut self) -> Self {
        self.deleting = true;
        self
    }

    /// Bound through both status and annotation
    pub fn bound_to(mut self, name: &str) -> Self {
        self.bucket_ref = Some(name.to_string());
        self.annotation = Some(name.to_string());
        self
    }

    /// Only the annotation marker, as left by early operator releases
    pub fn annotated_with(mut self, name: &str) -> Self {
        self.annotation = Some(name.to_string());
        self
    }

    pub fn build(self) -> Bucket {
        let mut metadata = json!({
            "name": self.resource_name,
            "namespace": "default",
            "resourceVersion": "1",
        });
        if self.finalizer {
            metadata["finalizers"] = json!([BUCKET_FINALIZER]);
        }
        if self.deleting {
            metadata["deletionTimestamp"] = json!("2026-01-01T00:00:00Z");
        }
        if let Some(annotation) = &self.annotation {
            let mut annotations = serde_json::Map::new();
            annotations.insert(BUCKET_ANNOTATION.to_string(), json!(annotation));
            metadata["annotations"] = serde_json::Value::Object(annotations);
        }

        let mut status = json!({});
        if let Some(bucket_ref) = &self.bucket_ref {
            status["gcsBucketRef"] = json!(bucket_ref);
        }

        serde_json::from_value(json!({
            "apiVersion": "storage.bucket-operator.dev/v1alpha1",
            "kind": "Bucket",
            "metadata": metadata,
            "spec": {
                "name": self.bucket_name,
                "project": "p1",
                "location": "us",
                "storageClass": "STANDARD",
                "removeOnDelete": self.remove_on_delete,
            },
            "status": status,
        }))
        .expect("test Bucket must deserialize")
    }
}

pub fn key(name: &str) -> ResourceKey {
    ResourceKey::new("default", name)
}

// ============================================================================
// Fake Kubernetes store
// ============================================================================

/// In-memory API server
///
/// Mirrors the finalizer contract: an object that is being deleted disappears
/// as soon as an update leaves it without finalizers.
#[derive(Debug, Default)]
pub struct FakeStore {
    objects: Mutex<HashMap<ResourceKey, Bucket>>,
    updates: AtomicUsize,
    fail_gets: AtomicBool,
    fail_updates: AtomicBool,
}

impl FakeStore {
    pub fn with(bucket: Bucket) -> Self {
        let store = Self::default();
        store.insert(bucket);
        store
    }

    pub fn insert(&self, bucket: Bucket) {
        self.objects
            .lock()
            .unwrap()
            .insert(ResourceKey::from_bucket(&bucket), bucket);
    }

    pub fn stored(&self, key: &ResourceKey) -> Option<Bucket> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BucketStore for FakeStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Bucket>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(anyhow!("the server is currently unable to handle the request"));
        }
        Ok(self.stored(key))
    }

    async fn update(&self, bucket: &Bucket) -> Result<Bucket> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(anyhow!(
                "Operation cannot be fulfilled on buckets: the object has been modified"
            ));
        }
        self.updates.fetch_add(1, Ordering::SeqCst);

        let key = ResourceKey::from_bucket(bucket);
        let released = bucket.is_being_deleted()
            && bucket.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        let mut objects = self.objects.lock().unwrap();
        if released {
            objects.remove(&key);
        } else {
            objects.insert(key, bucket.clone());
        }
        Ok(bucket.clone())
    }
}

// ============================================================================
// Fake GCS provider
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Get(String),
    Create(NewBucket),
    Delete(String),
}

/// In-memory GCS with call recording and failure injection
#[derive(Debug, Default)]
pub struct FakeProvider {
    buckets: Mutex<HashMap<String, BucketAttrs>>,
    calls: Mutex<Vec<ProviderCall>>,
    fail_get: AtomicBool,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl FakeProvider {
    /// Seed a remote bucket, optionally carrying an owner label
    pub fn add_bucket(&self, name: &str, owner: Option<&str>) {
        let labels = owner
            .map(|o| BTreeMap::from([(BUCKET_OWNER_LABEL.to_string(), o.to_string())]))
            .unwrap_or_default();
        self.buckets.lock().unwrap().insert(
            name.to_string(),
            BucketAttrs {
                name: name.to_string(),
                location: Some("US".to_string()),
                storage_class: Some("STANDARD".to_string()),
                labels,
            },
        );
    }

    pub fn remote(&self, name: &str) -> Option<BucketAttrs> {
        self.buckets.lock().unwrap().get(name).cloned()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change remote state
    pub fn mutations(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, ProviderCall::Get(_)))
            .collect()
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BucketProvider for FakeProvider {
    async fn get_bucket_attrs(&self, name: &str) -> Result<Option<BucketAttrs>> {
        self.record(ProviderCall::Get(name.to_string()));
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(anyhow!("HTTP 503 (status: 503 Service Unavailable): backend error"));
        }
        Ok(self.remote(name))
    }

    async fn create_bucket(&self, bucket: &NewBucket) -> Result<()> {
        self.record(ProviderCall::Create(bucket.clone()));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(anyhow!("GCS API error: quota exceeded (code: 429)"));
        }
        self.buckets.lock().unwrap().insert(
            bucket.name.clone(),
            BucketAttrs {
                name: bucket.name.clone(),
                location: Some(bucket.location.clone()),
                storage_class: Some(bucket.storage_class.clone()),
                labels: bucket.labels.clone(),
            },
        );
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.record(ProviderCall::Delete(name.to_string()));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(anyhow!(
                "GCS API error: The bucket you tried to delete is not empty. (code: 409)"
            ));
        }
        self.buckets.lock().unwrap().remove(name);
        Ok(())
    }
}

// ============================================================================
// Recording event publisher
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub action: String,
}

#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.warning)
            .map(|e| e.reason)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        _note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            action: action.to_string(),
        });
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A reconciler wired to fakes, seeded with one resource
pub struct Harness {
    pub store: Arc<FakeStore>,
    pub provider: Arc<FakeProvider>,
    pub events: Arc<RecordingEvents>,
    pub reconciler: Arc<Reconciler>,
    pub key: ResourceKey,
}

impl Harness {
    pub fn new(bucket: Bucket) -> Self {
        let key = ResourceKey::from_bucket(&bucket);
        let store = Arc::new(FakeStore::with(bucket));
        let provider = Arc::new(FakeProvider::default());
        let events = Arc::new(RecordingEvents::default());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            provider.clone(),
            events.clone(),
            ControllerConfig::default(),
        ));
        Self {
            store,
            provider,
            events,
            reconciler,
            key,
        }
    }

    pub async fn reconcile(&self) -> Result<ReconcileOutcome, ReconcilerError> {
        reconcile_key(&self.reconciler, &self.key).await
    }

    pub fn stored(&self) -> Option<Bucket> {
        self.store.stored(&self.key)
    }
}
