// src/core/whois.rs

//! A small WHOIS (RFC 3912) client.
//!
//! Lookups start at the IANA root server, follow its `refer:` line to the
//! registry for the TLD, and then follow the registry's
//! `Registrar WHOIS Server:` line once for thick registrar data.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::error::JobError;
use crate::core::models::WhoisRecord;

pub const WHOIS_PORT: u16 = 43;

/// Upper bound on a single response; registries answer in a few kilobytes.
const MAX_RESPONSE_BYTES: u64 = 1 << 20;

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").unwrap());

// Registries phrase "no such domain" in many ways.
static RE_NO_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:no match for|not found|no data found|no entries found|domain not found|status:\s*free)")
        .unwrap()
});

#[derive(Debug, Clone)]
pub struct WhoisClient {
    root_server: String,
    port: u16,
    timeout: Duration,
}

impl WhoisClient {
    pub fn new(root_server: impl Into<String>, timeout: Duration) -> Self {
        Self { root_server: root_server.into(), port: WHOIS_PORT, timeout }
    }

    /// Overrides the TCP port used for every server in the referral chain.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Looks up `domain` and returns the parsed record.
    pub async fn lookup(&self, domain: &str) -> Result<WhoisRecord, JobError> {
        info!(domain, root = %self.root_server, "Starting WHOIS lookup.");

        let root_response = self.query(&self.root_server, domain).await?;
        let (registry, mut text) = match find_referral(&root_response) {
            Some(registry) => {
                debug!(%registry, "Following root referral.");
                let answer = self.query(&registry, domain).await?;
                (registry, answer)
            }
            None => (self.root_server.clone(), root_response),
        };

        let registrar = find_registrar_server(&text)
            .filter(|server| !server.eq_ignore_ascii_case(&registry));
        if let Some(registrar) = registrar {
            debug!(%registrar, "Following registrar referral.");
            match self.query(&registrar, domain).await {
                Ok(thick) => {
                    text.push('\n');
                    text.push_str(&thick);
                }
                // The registry answer is already usable on its own.
                Err(e) => warn!(%registrar, error = %e, "Registrar WHOIS query failed."),
            }
        }

        if RE_NO_MATCH.is_match(&text) {
            return Err(JobError::ProtocolFailure(format!("No match for \"{domain}\"")));
        }

        let record = parse_record(&text);
        if record.domain_name.is_none() {
            return Err(JobError::ProtocolFailure(format!(
                "no WHOIS record could be parsed for {domain}"
            )));
        }
        info!(domain, registrar = ?record.registrar, "WHOIS lookup finished.");
        Ok(record)
    }

    /// Sends one query to `server` and reads the whole answer.
    async fn query(&self, server: &str, domain: &str) -> Result<String, JobError> {
        let exchange = async {
            let mut stream = TcpStream::connect((server, self.port)).await?;
            stream.write_all(format!("{domain}\r\n").as_bytes()).await?;
            let mut bytes = Vec::new();
            (&mut stream).take(MAX_RESPONSE_BYTES).read_to_end(&mut bytes).await?;
            Ok::<_, std::io::Error>(bytes)
        };

        let bytes = timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                JobError::ProtocolFailure(format!(
                    "{server} did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| JobError::ProtocolFailure(format!("{server}: {e}")))?;

        if bytes.is_empty() {
            return Err(JobError::ProtocolFailure(format!("{server} returned an empty response")));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// The registry server named by an IANA answer (`refer:` or `whois:`).
fn find_referral(text: &str) -> Option<String> {
    fields(text)
        .find(|(key, value)| (key == "refer" || key == "whois") && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn find_registrar_server(text: &str) -> Option<String> {
    fields(text)
        .find(|(key, value)| key == "registrar whois server" && !value.is_empty())
        .map(|(_, value)| strip_scheme(value).to_string())
}

fn strip_scheme(server: &str) -> &str {
    let server = server
        .strip_prefix("whois://")
        .or_else(|| server.strip_prefix("rwhois://"))
        .unwrap_or(server);
    server.trim_end_matches('/')
}

/// Iterates `key: value` lines with lowercased keys, skipping comments.
fn fields(text: &str) -> impl Iterator<Item = (String, &str)> {
    text.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
            return None;
        }
        let (key, value) = line.split_once(':')?;
        Some((key.trim().to_ascii_lowercase(), value.trim()))
    })
}

/// Builds a record from one or more concatenated WHOIS answers.
/// For single-valued fields the first occurrence wins.
pub fn parse_record(text: &str) -> WhoisRecord {
    let mut record = WhoisRecord::default();

    for (key, value) in fields(text) {
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "domain name" | "domain" => set_once(&mut record.domain_name, value.to_ascii_lowercase()),
            "registrar" | "sponsoring registrar" | "registrar name" => {
                set_once(&mut record.registrar, value.to_string())
            }
            "registrar whois server" | "whois server" => {
                set_once(&mut record.whois_server, strip_scheme(value).to_string())
            }
            "registrar url" | "referral url" => set_once(&mut record.referral_url, value.to_string()),
            "updated date" | "last updated" | "last-update" | "changed" => {
                push_unique(&mut record.updated_date, value)
            }
            "creation date" | "created" | "registered" | "domain registration date" => {
                push_unique(&mut record.creation_date, value)
            }
            "registry expiry date"
            | "registrar registration expiration date"
            | "expiration date"
            | "expiry date"
            | "expires"
            | "paid-till" => push_unique(&mut record.expiration_date, value),
            "name server" | "nserver" | "nameserver" => {
                let host = value.split_whitespace().next().unwrap_or(value);
                push_unique(&mut record.name_servers, &host.to_ascii_lowercase())
            }
            "domain status" | "status" => {
                // Drop the trailing ICANN explanation URL.
                let status = value.split_whitespace().next().unwrap_or(value);
                push_unique(&mut record.status, status)
            }
            "dnssec" => set_once(&mut record.dnssec, value.to_string()),
            "registrant name" => set_once(&mut record.name, value.to_string()),
            "registrant organization" | "registrant organisation" | "org" => {
                set_once(&mut record.org, value.to_string())
            }
            "registrant street" => set_once(&mut record.address, value.to_string()),
            "registrant city" => set_once(&mut record.city, value.to_string()),
            "registrant state/province" => set_once(&mut record.state, value.to_string()),
            "registrant postal code" => set_once(&mut record.registrant_postal_code, value.to_string()),
            "registrant country" | "country" => set_once(&mut record.country, value.to_string()),
            _ => {}
        }
    }

    for m in RE_EMAIL.find_iter(text) {
        push_unique(&mut record.emails, &m.as_str().to_ascii_lowercase());
    }

    record
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    const IANA_ANSWER: &str = "\
% IANA WHOIS server
% for more information on IANA, visit http://www.iana.org

refer:        127.0.0.1

domain:       COM
organisation: VeriSign Global Registry Services
";

    const REGISTRY_ANSWER: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Registrar URL: http://res-dom.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Registrar Abuse Contact Email: abuse@iana.org
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
   DNSSEC: signedDelegation
>>> Last update of whois database: 2024-09-01T00:00:00Z <<<
";

    /// Serves canned answers in order, one per connection.
    async fn serve(answers: Vec<String>) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut queries = Vec::new();
            for answer in answers {
                let (socket, _) = listener.accept().await.unwrap();
                let (read, mut write) = socket.into_split();
                let mut line = String::new();
                BufReader::new(read).read_line(&mut line).await.unwrap();
                queries.push(line);
                write.write_all(answer.as_bytes()).await.unwrap();
                write.shutdown().await.unwrap();
            }
            queries
        });
        (port, handle)
    }

    #[test]
    fn parses_registry_fields() {
        let record = parse_record(REGISTRY_ANSWER);
        assert_eq!(record.domain_name.as_deref(), Some("example.com"));
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(record.whois_server.as_deref(), Some("whois.iana.org"));
        assert_eq!(record.creation_date, vec!["1995-08-14T04:00:00Z"]);
        assert_eq!(record.expiration_date, vec!["2025-08-13T04:00:00Z"]);
        assert_eq!(record.name_servers, vec!["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(record.status, vec!["clientDeleteProhibited", "clientTransferProhibited"]);
        assert_eq!(record.emails, vec!["abuse@iana.org"]);
        assert_eq!(record.dnssec.as_deref(), Some("signedDelegation"));
    }

    #[test]
    fn repeated_answers_do_not_duplicate_lists() {
        let doubled = format!("{REGISTRY_ANSWER}\n{REGISTRY_ANSWER}");
        let record = parse_record(&doubled);
        assert_eq!(record.name_servers.len(), 2);
        assert_eq!(record.status.len(), 2);
        assert_eq!(record.emails.len(), 1);
    }

    #[test]
    fn referral_lines() {
        assert_eq!(find_referral(IANA_ANSWER).as_deref(), Some("127.0.0.1"));
        assert_eq!(find_referral("% nothing here\n"), None);
        assert_eq!(
            find_registrar_server("Registrar WHOIS Server: whois://whois.example-registrar.com/")
                .as_deref(),
            Some("whois.example-registrar.com")
        );
    }

    #[tokio::test]
    async fn follows_the_root_referral() {
        // Root, then registry, then the registrar it names.
        let registry = REGISTRY_ANSWER.replace("whois.iana.org", "localhost");
        let (port, server) =
            serve(vec![IANA_ANSWER.into(), registry, REGISTRY_ANSWER.into()]).await;

        let client = WhoisClient::new("127.0.0.1", Duration::from_secs(5)).with_port(port);
        let record = client.lookup("example.com").await.unwrap();

        let queries = server.await.unwrap();
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|q| q == "example.com\r\n"));
        assert_eq!(record.domain_name.as_deref(), Some("example.com"));
        assert_eq!(record.name_servers.len(), 2);
    }

    #[tokio::test]
    async fn no_match_is_a_protocol_failure() {
        let (port, _server) = serve(vec!["No match for \"NOPE-NOPE.COM\".\r\n".into()]).await;
        let client = WhoisClient::new("127.0.0.1", Duration::from_secs(5)).with_port(port);
        let err = client.lookup("nope-nope.com").await.unwrap_err();
        assert!(matches!(err, JobError::ProtocolFailure(m) if m.contains("No match")));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_protocol_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = WhoisClient::new("127.0.0.1", Duration::from_secs(2)).with_port(port);
        assert!(matches!(
            client.lookup("example.com").await,
            Err(JobError::ProtocolFailure(_))
        ));
    }
}
