// src/core/jobs/mod.rs

// One module per job kind. Each exposes a unit struct implementing `JobHandler`.
pub mod cert_search_job;
pub mod ip_lookup_job;
pub mod ping_job;
pub mod port_scan_job;
pub mod subdomain_job;
pub mod whois_job;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::config::JobSettings;
use crate::core::client::ApiClient;
use crate::core::emitter::Emitter;
use crate::core::error::JobError;
use crate::core::models::{JobKind, Target};
use crate::core::runner::{LineStream, ToolRunner};
use crate::core::store::SubdomainStore;

use self::cert_search_job::CertSearchJob;
use self::ip_lookup_job::IpLookupJob;
use self::ping_job::PingJob;
use self::port_scan_job::PortScanJob;
use self::subdomain_job::SubdomainJob;
use self::whois_job::WhoisJob;

/// Everything a handler may touch while it runs.
pub struct JobContext<'a> {
    pub emitter: &'a dyn Emitter,
    pub runner: &'a dyn ToolRunner,
    pub client: &'a dyn ApiClient,
    pub store: &'a SubdomainStore,
    pub settings: &'a JobSettings,
}

/// One reconnaissance operation.
///
/// Handlers send their data events through `ctx.emitter` as results arrive.
/// Returning `Err` makes the dispatcher send the single error event, so a
/// handler never reports its own failure.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn handle(&self, target: &Target, ctx: &JobContext<'_>) -> Result<(), JobError>;
}

pub type HandlerTable = HashMap<JobKind, Arc<dyn JobHandler>>;

/// The dispatch table used by the server: one handler per job kind.
pub fn default_handlers() -> HandlerTable {
    let handlers: [Arc<dyn JobHandler>; 6] = [
        Arc::new(PingJob),
        Arc::new(IpLookupJob),
        Arc::new(WhoisJob),
        Arc::new(CertSearchJob),
        Arc::new(PortScanJob),
        Arc::new(SubdomainJob),
    ];
    handlers.into_iter().map(|h| (h.kind(), h)).collect()
}

/// Waits for the next line of tool output.
///
/// Returns `None` at end of output, and also as soon as the origin session goes
/// away; the caller then drops the stream, which kills the tool.
pub(crate) async fn next_line(
    lines: &mut LineStream,
    emitter: &dyn Emitter,
) -> Option<Result<String, JobError>> {
    tokio::select! {
        item = lines.next() => item,
        _ = emitter.closed() => {
            debug!("Origin disconnected, abandoning tool output.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_kind_has_exactly_one_handler() {
        let table = default_handlers();
        assert_eq!(table.len(), JobKind::iter().count());
        for kind in JobKind::iter() {
            assert_eq!(table[&kind].kind(), kind);
        }
    }
}
