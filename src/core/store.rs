// src/core/store.rs

//! Append-only log of discovered subdomains, kept in SQLite.
//!
//! A connection is opened for every operation and closed when it returns, so
//! no handle outlives the call that needed it. Inserts run on tokio's blocking
//! pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tokio::task::spawn_blocking;
use tracing::{debug, info};

use crate::core::error::JobError;
use crate::core::models::SubdomainRecord;

/// How long a writer waits for another job's insert to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS subdomains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        org_name TEXT,
        domain TEXT,
        subdomain TEXT,
        discovered_at TIMESTAMP
    )";

#[derive(Debug, Clone)]
pub struct SubdomainStore {
    path: PathBuf,
}

impl SubdomainStore {
    /// Opens the store at `path`, creating the file and schema if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JobError> {
        let store = Self { path: path.into() };
        if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                JobError::StoreFailure(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        store.init()?;
        info!(path = %store.path.display(), "Subdomain store ready.");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the table if it does not exist yet. Safe to call repeatedly.
    pub fn init(&self) -> Result<(), JobError> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Appends one discovery. Each call is a single atomic insert.
    pub async fn append_subdomain(
        &self,
        org_name: &str,
        domain: &str,
        subdomain: &str,
        discovered_at: DateTime<Utc>,
    ) -> Result<(), JobError> {
        let record = SubdomainRecord {
            org_name: org_name.to_string(),
            domain: domain.to_string(),
            subdomain: subdomain.to_string(),
            discovered_at,
        };
        let store = self.clone();

        spawn_blocking(move || store.insert(&record))
            .await
            .map_err(|e| JobError::StoreFailure(format!("insert task failed: {e}")))?
    }

    fn insert(&self, record: &SubdomainRecord) -> Result<(), JobError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO subdomains (org_name, domain, subdomain, discovered_at) VALUES (?1, ?2, ?3, ?4)",
            params![record.org_name, record.domain, record.subdomain, record.discovered_at],
        )?;
        debug!(subdomain = %record.subdomain, domain = %record.domain, "Stored subdomain.");
        Ok(())
    }

    fn connect(&self) -> Result<Connection, JobError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    #[cfg(test)]
    pub(crate) fn all_records(&self) -> Result<Vec<SubdomainRecord>, JobError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT org_name, domain, subdomain, discovered_at FROM subdomains ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubdomainRecord {
                org_name: row.get(0)?,
                domain: row.get(1)?,
                subdomain: row.get(2)?,
                discovered_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
