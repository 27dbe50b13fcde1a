//! Test doubles shared by the service and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use cnd_core::codec::encrypt_payload;
use cnd_core::{
    BatchProcessor, CnlPackage, DebridBackend, Downstream, DownstreamError, ErrorPolicy,
    LinkResolver, ResolveError, ResolvedLink, Submission,
};
use cnd_storage::{Cache, CacheBackend, CacheError, ScanPage};

use crate::service::{PackageService, ServiceConfig};

pub const JK: &str = r#"function f(){ return "31323334353637383930313233343536"; }"#;

/// Maps `http://a/<x>` to `https://dl/<x>`; links containing "bad" fail.
pub struct FakeDebrid {
    pub calls: AtomicUsize,
}

#[async_trait]
impl DebridBackend for FakeDebrid {
    fn name(&self) -> &str {
        "realdebrid"
    }

    async fn unrestrict(&self, link: &str) -> Result<ResolvedLink, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if link.contains("bad") {
            return Err(ResolveError::Api {
                service: "Real-Debrid".into(),
                message: "hoster_unsupported".into(),
                code: Some(16),
            });
        }
        Ok(ResolvedLink {
            download: link.replace("http://a/", "https://dl/"),
            filename: None,
            filesize: Some(1),
        })
    }
}

/// Records submissions; fails when `fail` is set.
#[derive(Default)]
pub struct FakeDownstream {
    pub fail: bool,
    pub received: Mutex<Vec<Submission>>,
}

#[async_trait]
impl Downstream for FakeDownstream {
    async fn submit(&self, submission: &Submission) -> Result<(), DownstreamError> {
        self.received.lock().push(submission.clone());
        if self.fail {
            Err(DownstreamError::Status(503))
        } else {
            Ok(())
        }
    }
}

/// Cache backend whose every operation fails, as an unreachable Redis would.
#[derive(Default)]
pub struct FailingBackend {
    pub calls: AtomicUsize,
}

impl FailingBackend {
    fn fail<T>(&self) -> cnd_storage::Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Config("connection refused".into()))
    }
}

#[async_trait]
impl CacheBackend for FailingBackend {
    fn kind(&self) -> &'static str {
        "failing"
    }

    async fn set(&self, _: &str, _: String, _: Option<Duration>) -> cnd_storage::Result<()> {
        self.fail()
    }

    async fn get(&self, _: &str) -> cnd_storage::Result<Option<String>> {
        self.fail()
    }

    async fn delete(&self, _: &str) -> cnd_storage::Result<()> {
        self.fail()
    }

    async fn exists(&self, _: &str) -> cnd_storage::Result<bool> {
        self.fail()
    }

    async fn keys(&self, _: &str) -> cnd_storage::Result<Vec<String>> {
        self.fail()
    }

    async fn scan(&self, _: &str, _: u64, _: usize) -> cnd_storage::Result<ScanPage> {
        self.fail()
    }
}

pub struct Harness {
    pub service: PackageService,
    pub debrid: Arc<FakeDebrid>,
    pub downstream: Arc<FakeDownstream>,
}

pub fn harness_with(policy: ErrorPolicy, downstream: FakeDownstream) -> Harness {
    harness_with_cache(policy, downstream, Cache::in_memory())
}

pub fn harness_with_cache(
    policy: ErrorPolicy,
    downstream: FakeDownstream,
    cache: Cache,
) -> Harness {
    let debrid = Arc::new(FakeDebrid {
        calls: AtomicUsize::new(0),
    });
    let downstream = Arc::new(downstream);
    let batch = BatchProcessor::new(LinkResolver::new(debrid.clone())).with_policy(policy);
    let service = PackageService::new(
        batch,
        cache,
        downstream.clone(),
        ServiceConfig::default(),
    );
    Harness {
        service,
        debrid,
        downstream,
    }
}

pub fn harness() -> Harness {
    harness_with(ErrorPolicy::Continue, FakeDownstream::default())
}

/// A CNL package carrying `links` encrypted under [`JK`].
pub fn submission_for(links: &str, package: &str) -> CnlPackage {
    CnlPackage::new(encrypt_payload(links, JK).unwrap(), JK)
        .with_package(package)
        .with_source("s")
        .with_passwords("")
}
