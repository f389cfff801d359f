//! Storage mocks for exercising failure paths.

use async_trait::async_trait;
use bytes::Bytes;
use reel_storage::{
    AppendHandle, FilesystemBackend, MediaStore, ObjectMeta, ReadHandle, StorageError,
    StorageResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const DISARMED: usize = usize::MAX;

/// Failures to inject into a [`FaultyBackend`], shared with the test body.
#[allow(dead_code)]
pub struct FaultPlan {
    failing_opens: AtomicUsize,
    writes_before_failure: AtomicUsize,
    opens: AtomicUsize,
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self {
            failing_opens: AtomicUsize::new(0),
            writes_before_failure: AtomicUsize::new(DISARMED),
            opens: AtomicUsize::new(0),
        }
    }
}

#[allow(dead_code)]
impl FaultPlan {
    /// Fail the next `n` calls to `open_append`.
    pub fn fail_next_opens(&self, n: usize) {
        self.failing_opens.store(n, Ordering::SeqCst);
    }

    /// Let `n` more writes through, then fail exactly one.
    pub fn fail_write_after(&self, n: usize) {
        self.writes_before_failure.store(n, Ordering::SeqCst);
    }

    /// Number of append handles successfully opened.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn take_open_failure(&self) -> bool {
        self.failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn take_write_failure(&self) -> bool {
        let previous =
            self.writes_before_failure
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                    DISARMED => None,
                    0 => Some(DISARMED),
                    n => Some(n - 1),
                });
        previous == Ok(0)
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::Io(std::io::Error::other(format!("injected {what} failure")))
}

/// Filesystem backend that fails opens and writes on demand.
#[allow(dead_code)]
pub struct FaultyBackend {
    inner: FilesystemBackend,
    plan: Arc<FaultPlan>,
}

#[allow(dead_code)]
impl FaultyBackend {
    pub fn new(inner: FilesystemBackend, plan: Arc<FaultPlan>) -> Self {
        Self { inner, plan }
    }
}

#[async_trait]
impl MediaStore for FaultyBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn open_append(&self, key: &str) -> StorageResult<Box<dyn AppendHandle>> {
        if self.plan.take_open_failure() {
            return Err(injected("open"));
        }
        let inner = self.inner.open_append(key).await?;
        self.plan.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FaultyAppend {
            inner,
            plan: self.plan.clone(),
        }))
    }

    async fn open_read(&self, key: &str) -> StorageResult<Box<dyn ReadHandle>> {
        self.inner.open_read(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}

struct FaultyAppend {
    inner: Box<dyn AppendHandle>,
    plan: Arc<FaultPlan>,
}

#[async_trait]
impl AppendHandle for FaultyAppend {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        if self.plan.take_write_failure() {
            return Err(injected("write"));
        }
        self.inner.write(data).await
    }

    async fn close(self: Box<Self>) -> StorageResult<u64> {
        self.inner.close().await
    }
}
