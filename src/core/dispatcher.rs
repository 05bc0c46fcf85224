// src/core/dispatcher.rs

//! Turns client requests into running jobs.
//!
//! Every job walks `received -> validating -> {rejected | running} ->
//! {completed | failed}` inside its own task. Rejected and failed jobs send
//! exactly one error event to their origin; nothing a job does can reach the
//! server loop or another job.

use std::sync::Arc;

use tracing::{Instrument, error, info, info_span, warn};

use crate::config::JobSettings;
use crate::core::client::ApiClient;
use crate::core::emitter::Emitter;
use crate::core::error::JobError;
use crate::core::jobs::{HandlerTable, JobContext, default_handlers};
#[cfg(test)]
use crate::core::jobs::JobHandler;
use crate::core::models::{JobRequest, Target, UpdateEvent};
use crate::core::runner::ToolRunner;
use crate::core::store::SubdomainStore;

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The target failed validation; nothing external was touched.
    Rejected,
    Completed,
    Failed(JobError),
    /// The origin was already gone when the job would have started.
    Abandoned,
    /// The handler panicked; the origin got an error event anyway.
    Panicked,
}

#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HandlerTable>,
    runner: Arc<dyn ToolRunner>,
    client: Arc<dyn ApiClient>,
    store: SubdomainStore,
    settings: Arc<JobSettings>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.len())
            .field("store", &self.store.path())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        client: Arc<dyn ApiClient>,
        store: SubdomainStore,
        settings: JobSettings,
    ) -> Self {
        Self {
            handlers: Arc::new(default_handlers()),
            runner,
            client,
            store,
            settings: Arc::new(settings),
        }
    }

    /// Replaces the handler for `handler.kind()`.
    #[cfg(test)]
    pub fn with_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        Arc::make_mut(&mut self.handlers).insert(handler.kind(), handler);
        self
    }

    /// Starts a job on its own task and returns immediately.
    ///
    /// The returned handle resolves to the outcome; dropping it detaches the job.
    pub fn dispatch<E>(&self, request: JobRequest, origin: E) -> tokio::task::JoinHandle<JobOutcome>
    where
        E: Emitter + Clone + 'static,
    {
        let this = self.clone();
        let kind = request.kind;

        tokio::spawn(async move {
            // The job runs one level down so a panic surfaces here as a JoinError.
            let worker = {
                let this = this.clone();
                let origin = origin.clone();
                tokio::spawn(async move { this.run_job(request, &origin).await })
            };

            match worker.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%kind, error = %e, "Job task died.");
                    origin.send(UpdateEvent::error(kind, format!("Unexpected error: {e}"))).await;
                    JobOutcome::Panicked
                }
            }
        })
    }

    /// Runs one job to completion on the current task.
    pub async fn run_job(&self, request: JobRequest, origin: &dyn Emitter) -> JobOutcome {
        let kind = request.kind;
        let raw = request.raw_target.unwrap_or_default();
        let span = info_span!("job", %kind, target = %raw);

        async move {
            info!("Job received.");

            let target = match Target::parse(&raw, kind.grammar()) {
                Ok(target) => target,
                Err(e) => {
                    warn!(reason = %e, "Job rejected.");
                    origin.send(UpdateEvent::error(kind, kind.rejection_message())).await;
                    return JobOutcome::Rejected;
                }
            };

            if !origin.is_connected() {
                info!("Origin left before the job started.");
                return JobOutcome::Abandoned;
            }

            let Some(handler) = self.handlers.get(&kind) else {
                error!("No handler registered.");
                origin.send(UpdateEvent::error(kind, format!("Unsupported job: {kind}"))).await;
                return JobOutcome::Failed(JobError::ExternalToolFailure(format!("no handler for {kind}")));
            };

            let ctx = JobContext {
                emitter: origin,
                runner: self.runner.as_ref(),
                client: self.client.as_ref(),
                store: &self.store,
                settings: &self.settings,
            };

            match handler.handle(&target, &ctx).await {
                Ok(()) => {
                    info!("Job completed.");
                    JobOutcome::Completed
                }
                Err(e) => {
                    warn!(error = %e, "Job failed.");
                    origin.send(UpdateEvent::error(kind, e.to_string())).await;
                    JobOutcome::Failed(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}
