//! In-memory stand-ins for the store, source and sink.

use crate::archive::ArchiveSink;
use crate::ingest::RecordSource;
use crate::model::{Watermark, Window};
use crate::store::WatermarkStore;
use async_trait::async_trait;
use bytes::Bytes;
use fetcher_core::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Watermark>>,
    appends: AtomicUsize,
    fail_reads: AtomicBool,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn with(entries: Vec<Watermark>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<Watermark> {
        self.entries.lock().unwrap().clone()
    }

    pub fn latest_entry(&self) -> Option<Watermark> {
        self.entries().into_iter().max_by_key(|w| w.to_date)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn latest(&self) -> Result<Option<Watermark>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(self.latest_entry())
    }

    async fn append(&self, watermark: &Watermark) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(sqlx::Error::PoolClosed));
        }
        self.entries.lock().unwrap().push(*watermark);
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeSource {
    response: std::result::Result<Vec<Value>, String>,
    requested: Mutex<Vec<Window>>,
}

impl FakeSource {
    pub fn returning(elements: Vec<Value>) -> Self {
        Self {
            response: Ok(elements),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(details: &str) -> Self {
        Self {
            response: Err(details.to_string()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<Window> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch_window(&self, window: &Window) -> Result<Vec<Value>> {
        self.requested.lock().unwrap().push(*window);
        self.response.clone().map_err(Error::source_unavailable)
    }

    fn source_id(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct MemorySink {
    objects: Mutex<BTreeMap<String, Bytes>>,
    writes: AtomicUsize,
    fail: AtomicBool,
}

impl MemorySink {
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveSink for MemorySink {
    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Archive {
                key: key.to_string(),
                details: "bucket unreachable".into(),
            });
        }
        self.objects.lock().unwrap().insert(key.to_string(), body);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
