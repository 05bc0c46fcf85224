// src/core/jobs/ip_lookup_job.rs

use async_trait::async_trait;
use tracing::{info, warn};

use super::{JobContext, JobHandler};
use crate::core::error::JobError;
use crate::core::models::{JobKind, Target, UpdateEvent};

/// Geolocates an IPv4 address through the configured lookup service.
pub struct IpLookupJob;

#[async_trait]
impl JobHandler for IpLookupJob {
    fn kind(&self) -> JobKind {
        JobKind::IpLookup
    }

    async fn handle(&self, target: &Target, ctx: &JobContext<'_>) -> Result<(), JobError> {
        let url = ctx
            .settings
            .geoip_url
            .join(target.as_str())
            .map_err(|e| JobError::NetworkFailure(format!("cannot build lookup URL: {e}")))?;
        info!(ip = %target, %url, "Starting IP lookup.");

        let fetched = ctx.client.fetch_text(&url, ctx.settings.http_timeout).await?;
        // Unlike the certificate search, an error status here means no usable answer.
        if !fetched.is_success() {
            warn!(ip = %target, status = fetched.status, "Lookup service returned an error status.");
            return Err(JobError::NetworkFailure(format!(
                "{} response from {url}",
                fetched.status
            )));
        }

        ctx.emitter.send(UpdateEvent::data(JobKind::IpLookup, fetched.body)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::emitter::SessionHandle;
    use crate::core::jobs::test_support::{FakeClient, FakeRunner, drain, settings, temp_store};

    #[tokio::test]
    async fn forwards_the_body_verbatim() {
        let body = r#"{"status":"success","country":"United States","query":"8.8.8.8"}"#;
        let runner = FakeRunner::default();
        let client = FakeClient::with_body(200, body);
        let (_dir, store) = temp_store();
        let settings = settings();
        let (session, rx) = SessionHandle::channel(8);

        let ctx = JobContext {
            emitter: &session,
            runner: &runner,
            client: &client,
            store: &store,
            settings: &settings,
        };
        IpLookupJob.handle(&Target::ipv4("8.8.8.8").unwrap(), &ctx).await.unwrap();
        drop(session);

        assert_eq!(*client.urls.lock().unwrap(), vec!["http://ip-api.com/json/8.8.8.8"]);
        assert_eq!(drain(rx).await, vec![UpdateEvent::data(JobKind::IpLookup, body)]);
    }

    #[tokio::test]
    async fn error_status_is_a_network_failure() {
        let runner = FakeRunner::default();
        let client = FakeClient::with_body(503, "unavailable");
        let (_dir, store) = temp_store();
        let settings = settings();
        let (session, rx) = SessionHandle::channel(8);

        let ctx = JobContext {
            emitter: &session,
            runner: &runner,
            client: &client,
            store: &store,
            settings: &settings,
        };
        let err = IpLookupJob.handle(&Target::ipv4("8.8.8.8").unwrap(), &ctx).await.unwrap_err();
        drop(session);

        assert!(matches!(err, JobError::NetworkFailure(m) if m.starts_with("503")));
        assert!(drain(rx).await.is_empty());
    }
}
