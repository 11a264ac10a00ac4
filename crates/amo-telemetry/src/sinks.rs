// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telemetry sinks: structured log lines, an append-only SQLite routing log,
//! and a sink that discards everything.

use std::sync::Arc;

use amo_config::{SinkKind, TelemetryConfig};
use amo_core::{AmoError, TelemetryRecord, TelemetrySink};
use async_trait::async_trait;
use tracing::info;

/// Emits one structured `amo.route` log line per record.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn write(&self, record: &TelemetryRecord) -> Result<(), AmoError> {
        info!(
            target: "amo.route",
            session_id = %record.session_id,
            intent = %record.intent,
            requested_tier = %record.requested_tier,
            effective_tier = %record.effective_tier,
            reason = %record.reason_code,
            fallback_applied = record.fallback_applied,
            message_length = record.message_length,
            decision_us = record.decision_time.as_micros() as u64,
            response_ms = record.response_time.map(|d| d.as_millis() as u64),
            outcome = %record.outcome,
            cancelled = record.cancelled,
            "routing decision"
        );
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl TelemetrySink for NoopSink {
    fn name(&self) -> &str {
        "none"
    }

    async fn write(&self, _record: &TelemetryRecord) -> Result<(), AmoError> {
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into AmoError::Storage.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> AmoError {
    AmoError::Storage {
        source: Box::new(e),
    }
}

const ROUTING_LOG_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS routing_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    intent TEXT NOT NULL,
    requested_tier TEXT NOT NULL,
    effective_tier TEXT NOT NULL,
    reason_code TEXT NOT NULL,
    fallback_applied INTEGER NOT NULL,
    message_length INTEGER NOT NULL,
    decision_ms REAL NOT NULL,
    response_ms REAL,
    completed INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    cancelled INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_routing_log_session ON routing_log(session_id);
CREATE INDEX IF NOT EXISTS idx_routing_log_recorded ON routing_log(recorded_at);";

/// Append-only routing log backed by SQLite.
///
/// All operations go through the single tokio-rusqlite background thread.
pub struct SqliteSink {
    conn: tokio_rusqlite::Connection,
}

impl SqliteSink {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn open(path: &str) -> Result<Self, AmoError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| AmoError::Storage {
                source: Box::new(e),
            })?;
        Self::with_connection(conn).await
    }

    /// Wrap an existing connection, creating the schema if needed.
    pub async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self, AmoError> {
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(ROUTING_LOG_SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        Ok(Self { conn })
    }

    /// Number of rows in the routing log.
    pub async fn count(&self) -> Result<u64, AmoError> {
        self.conn
            .call(|conn| -> Result<u64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM routing_log", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)
    }

    /// Rows for one session as `(effective_tier, reason_code, outcome)`, oldest first.
    pub async fn session_rows(
        &self,
        session_id: &str,
    ) -> Result<Vec<(String, String, String)>, AmoError> {
        let session_id = session_id.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<(String, String, String)>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT effective_tier, reason_code, outcome FROM routing_log \
                     WHERE session_id = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![session_id], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl TelemetrySink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write(&self, record: &TelemetryRecord) -> Result<(), AmoError> {
        let session_id = record.session_id.to_string();
        let intent = record.intent.to_string();
        let requested_tier = record.requested_tier.to_string();
        let effective_tier = record.effective_tier.to_string();
        let reason_code = record.reason_code.to_string();
        let fallback_applied = record.fallback_applied;
        let message_length = record.message_length as i64;
        let decision_ms = record.decision_time.as_secs_f64() * 1000.0;
        let response_ms = record.response_time.map(|d| d.as_secs_f64() * 1000.0);
        let completed = record.completed;
        let outcome = record.outcome.to_string();
        let cancelled = record.cancelled;
        let recorded_at = record
            .recorded_at
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO routing_log (session_id, intent, requested_tier, \
                     effective_tier, reason_code, fallback_applied, message_length, \
                     decision_ms, response_ms, completed, outcome, cancelled, recorded_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    rusqlite::params![
                        session_id,
                        intent,
                        requested_tier,
                        effective_tier,
                        reason_code,
                        fallback_applied,
                        message_length,
                        decision_ms,
                        response_ms,
                        completed,
                        outcome,
                        cancelled,
                        recorded_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Build the sink selected by the telemetry configuration.
pub async fn build_sink(config: &TelemetryConfig) -> Result<Arc<dyn TelemetrySink>, AmoError> {
    match config.sink {
        SinkKind::Tracing => Ok(Arc::new(TracingSink)),
        SinkKind::Disabled => Ok(Arc::new(NoopSink)),
        SinkKind::Sqlite => {
            let path = config
                .database_path
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| {
                    AmoError::Config("telemetry.database_path is required for the sqlite sink".into())
                })?;
            Ok(Arc::new(SqliteSink::open(path).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amo_core::{ReasonCode, TerminalState, Tier};
    use amo_test_utils::sample_record;

    #[tokio::test]
    async fn sqlite_sink_appends_rows() {
        let conn = tokio_rusqlite::Connection::open_in_memory().await.unwrap();
        let sink = SqliteSink::with_connection(conn).await.unwrap();

        let mut failed = sample_record("s1");
        failed.effective_tier = Tier::Standard;
        failed.reason_code = ReasonCode::ProviderFallback;
        failed.fallback_applied = true;
        failed.response_time = None;
        failed.completed = false;
        failed.outcome = TerminalState::Failed;

        sink.write(&sample_record("s1")).await.unwrap();
        sink.write(&failed).await.unwrap();
        sink.write(&sample_record("s2")).await.unwrap();

        assert_eq!(sink.count().await.unwrap(), 3);
        let rows = sink.session_rows("s1").await.unwrap();
        assert_eq!(
            rows,
            vec![
                ("light".into(), "normal".into(), "completed".into()),
                ("standard".into(), "provider_fallback".into(), "failed".into()),
            ]
        );
    }

    #[tokio::test]
    async fn sqlite_sink_reopens_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routing.db");
        let path = path.to_str().unwrap();

        let sink = SqliteSink::open(path).await.unwrap();
        sink.write(&sample_record("s1")).await.unwrap();
        drop(sink);

        let reopened = SqliteSink::open(path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn build_sink_follows_config() {
        let tracing_sink = build_sink(&TelemetryConfig::default()).await.unwrap();
        assert_eq!(tracing_sink.name(), "tracing");

        let config = TelemetryConfig {
            sink: SinkKind::Disabled,
            ..TelemetryConfig::default()
        };
        assert_eq!(build_sink(&config).await.unwrap().name(), "none");

        let config = TelemetryConfig {
            sink: SinkKind::Sqlite,
            database_path: None,
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            build_sink(&config).await,
            Err(AmoError::Config(_))
        ));
    }

    #[tokio::test]
    async fn tracing_and_noop_sinks_accept_records() {
        assert!(TracingSink.write(&sample_record("s1")).await.is_ok());
        assert!(NoopSink.write(&sample_record("s1")).await.is_ok());
    }
}
