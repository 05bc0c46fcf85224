// src/core/jobs/test_support.rs

//! Fakes for exercising handlers and the dispatcher without touching the
//! network or the process table.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use url::Url;

use crate::config::JobSettings;
use crate::core::client::{ApiClient, FetchedBody};
use crate::core::error::JobError;
use crate::core::models::{UpdateEvent, WhoisRecord};
use crate::core::runner::{LineStream, ToolRunner};
use crate::core::store::SubdomainStore;

/// Replays scripted output and records every invocation.
#[derive(Default)]
pub struct FakeRunner {
    pub lines: Vec<Result<String, JobError>>,
    pub delay: Duration,
    pub bounded: Option<Result<String, JobError>>,
    pub calls: AtomicUsize,
    pub invocations: Mutex<Vec<(String, Vec<String>)>>,
    /// When each scripted line was handed out.
    pub produced_at: Arc<Mutex<Vec<Instant>>>,
}

impl FakeRunner {
    pub fn streaming(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| Ok(l.to_string())).collect(),
            ..Default::default()
        }
    }

    pub fn bounded(result: Result<String, JobError>) -> Self {
        Self { bounded: Some(result), ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, program: &str, args: &[String]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations.lock().unwrap().push((program.to_string(), args.to_vec()));
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    fn run_streaming(&self, program: &str, args: &[String]) -> LineStream {
        self.record(program, args);
        let lines = self.lines.clone();
        let delay = self.delay;
        let produced_at = self.produced_at.clone();
        Box::pin(async_stream::stream! {
            for line in lines {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                produced_at.lock().unwrap().push(Instant::now());
                yield line;
            }
        })
    }

    async fn run_bounded(
        &self,
        program: &str,
        args: &[String],
        _limit: Duration,
    ) -> Result<String, JobError> {
        self.record(program, args);
        self.bounded.clone().unwrap_or_else(|| Ok(String::new()))
    }
}

/// Answers lookups from canned values and counts outbound calls.
#[derive(Default)]
pub struct FakeClient {
    pub response: Option<Result<FetchedBody, JobError>>,
    pub whois: Option<Result<WhoisRecord, JobError>>,
    pub calls: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn with_body(status: u16, body: &str) -> Self {
        Self {
            response: Some(Ok(FetchedBody { status, body: body.to_string() })),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiClient for FakeClient {
    async fn fetch_text(&self, url: &Url, _timeout: Duration) -> Result<FetchedBody, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        self.response
            .clone()
            .unwrap_or_else(|| Err(JobError::NetworkFailure("no canned response".into())))
    }

    async fn fetch_whois(&self, domain: &str) -> Result<WhoisRecord, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(format!("whois:{domain}"));
        self.whois
            .clone()
            .unwrap_or_else(|| Err(JobError::ProtocolFailure("no canned record".into())))
    }
}

/// A store in a scratch directory that lives as long as the returned guard.
pub fn temp_store() -> (TempDir, SubdomainStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SubdomainStore::open(dir.path().join("recon.db")).unwrap();
    (dir, store)
}

pub fn settings() -> JobSettings {
    JobSettings::default()
}

/// Collects every event still queued once all senders are gone.
pub async fn drain(mut rx: mpsc::Receiver<UpdateEvent>) -> Vec<UpdateEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
