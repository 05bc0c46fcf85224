// src/core/jobs/cert_search_job.rs

use async_trait::async_trait;
use tracing::info;

use super::{JobContext, JobHandler};
use crate::core::error::JobError;
use crate::core::models::{JobKind, Target, UpdateEvent};

/// Queries certificate transparency logs for every name under a domain.
/// The JSON answer is forwarded untouched, whatever its status.
pub struct CertSearchJob;

#[async_trait]
impl JobHandler for CertSearchJob {
    fn kind(&self) -> JobKind {
        JobKind::CertSearch
    }

    async fn handle(&self, target: &Target, ctx: &JobContext<'_>) -> Result<(), JobError> {
        let mut url = ctx.settings.crtsh_url.clone();
        url.query_pairs_mut()
            .append_pair("q", &format!("%.{}", target.as_str()))
            .append_pair("output", "json");
        info!(domain = %target, %url, "Searching certificate transparency logs.");

        let fetched = ctx.client.fetch_text(&url, ctx.settings.http_timeout).await?;
        info!(domain = %target, status = fetched.status, bytes = fetched.body.len(), "Certificate search finished.");
        ctx.emitter.send(UpdateEvent::data(JobKind::CertSearch, fetched.body)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::emitter::SessionHandle;
    use crate::core::jobs::test_support::{FakeClient, FakeRunner, drain, settings, temp_store};

    #[tokio::test]
    async fn queries_wildcard_and_passes_error_bodies_through() {
        let runner = FakeRunner::default();
        let client = FakeClient::with_body(502, "<html>Bad Gateway</html>");
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
        CertSearchJob.handle(&Target::domain("example.com").unwrap(), &ctx).await.unwrap();
        drop(session);

        assert_eq!(
            *client.urls.lock().unwrap(),
            vec!["https://crt.sh/?q=%25.example.com&output=json"]
        );
        assert_eq!(
            drain(rx).await,
            vec![UpdateEvent::data(JobKind::CertSearch, "<html>Bad Gateway</html>")]
        );
    }

    #[tokio::test]
    async fn network_failure_is_returned() {
        let runner = FakeRunner::default();
        let client = FakeClient::default();
        let (_dir, store) = temp_store();
        let settings = settings();
        let (session, _rx) = SessionHandle::channel(8);

        let ctx = JobContext {
            emitter: &session,
            runner: &runner,
            client: &client,
            store: &store,
            settings: &settings,
        };
        let err = CertSearchJob.handle(&Target::domain("example.com").unwrap(), &ctx).await;
        assert!(matches!(err, Err(JobError::NetworkFailure(_))));
    }
}
