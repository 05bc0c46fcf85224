// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// --- Job Kinds ---

/// The reconnaissance operations a client can request.
///
/// The serialized name is the event stem shared by the inbound request
/// (`start_<stem>`) and the outbound update channel (`<stem>_update`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum JobKind {
    Ping,
    #[strum(serialize = "iplookup")]
    IpLookup,
    Whois,
    #[strum(serialize = "crtsh")]
    CertSearch,
    #[strum(serialize = "openports")]
    PortScan,
    #[strum(serialize = "subfinder")]
    SubdomainEnum,
}

/// Which validator grammar a job kind's target must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetGrammar {
    Domain,
    Ipv4,
}

impl JobKind {
    /// Maps an inbound event name such as `start_ping` to its job kind.
    pub fn from_start_event(event: &str) -> Option<Self> {
        event.strip_prefix("start_").and_then(|stem| stem.parse().ok())
    }

    #[cfg(test)]
    pub fn start_event(&self) -> String {
        format!("start_{}", self.as_ref())
    }

    /// Name of the outbound channel carrying this kind's updates.
    pub fn update_event(&self) -> String {
        format!("{}_update", self.as_ref())
    }

    /// The request field holding the raw target.
    pub fn input_field(&self) -> &'static str {
        match self {
            JobKind::IpLookup => "ipAddress",
            _ => "domain",
        }
    }

    pub fn grammar(&self) -> TargetGrammar {
        match self {
            JobKind::IpLookup => TargetGrammar::Ipv4,
            _ => TargetGrammar::Domain,
        }
    }

    /// The error text sent back when the target fails validation.
    pub fn rejection_message(&self) -> &'static str {
        match self {
            JobKind::Ping => "Invalid domain format",
            JobKind::IpLookup => "Invalid IP address format",
            _ => "Invalid domain",
        }
    }
}

// --- Targets ---

pub use crate::core::validator::Target;

// --- Requests ---

/// A raw frame received from a client session.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A job request extracted from an inbound frame, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub raw_target: Option<String>,
}

impl JobRequest {
    #[cfg(test)]
    pub fn new(kind: JobKind, raw_target: impl Into<String>) -> Self {
        Self { kind, raw_target: Some(raw_target.into()) }
    }

    /// Returns `None` when the frame does not name a known job.
    pub fn from_frame(frame: &InboundFrame) -> Option<Self> {
        let kind = JobKind::from_start_event(&frame.event)?;
        let raw_target = frame
            .data
            .get(kind.input_field())
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Some(Self { kind, raw_target })
    }
}

// --- Update Events ---

/// What a single update carries. Serializes as `{"data": ..}`,
/// `{"subdomain": ..}` or `{"error": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePayload {
    Data(String),
    Subdomain(String),
    Error(String),
}

/// One unit of streamed result or error delivered to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEvent {
    pub kind: JobKind,
    pub payload: UpdatePayload,
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    event: String,
    data: &'a UpdatePayload,
}

impl UpdateEvent {
    pub fn data(kind: JobKind, data: impl Into<String>) -> Self {
        Self { kind, payload: UpdatePayload::Data(data.into()) }
    }

    pub fn subdomain(kind: JobKind, subdomain: impl Into<String>) -> Self {
        Self { kind, payload: UpdatePayload::Subdomain(subdomain.into()) }
    }

    pub fn error(kind: JobKind, message: impl Into<String>) -> Self {
        Self { kind, payload: UpdatePayload::Error(message.into()) }
    }

    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        matches!(self.payload, UpdatePayload::Error(_))
    }

    /// Renders the event as the JSON text frame sent over the socket.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(&OutboundFrame {
            event: self.kind.update_event(),
            data: &self.payload,
        })
    }
}

// --- Persistence ---

/// A subdomain discovered by the enumeration job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubdomainRecord {
    pub org_name: String,
    pub domain: String,
    pub subdomain: String,
    pub discovered_at: DateTime<Utc>,
}

// --- WHOIS ---

/// Structured WHOIS answer, as parsed from the registry and registrar responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WhoisRecord {
    pub domain_name: Option<String>,
    pub registrar: Option<String>,
    pub whois_server: Option<String>,
    pub referral_url: Option<String>,
    pub updated_date: Vec<String>,
    pub creation_date: Vec<String>,
    pub expiration_date: Vec<String>,
    pub name_servers: Vec<String>,
    pub status: Vec<String>,
    pub emails: Vec<String>,
    pub dnssec: Option<String>,
    pub name: Option<String>,
    pub org: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub registrant_postal_code: Option<String>,
    pub country: Option<String>,
}
