use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde::Serialize;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Conversation, SummaryResult, SummarySource};
use crate::render::parse_json;
use crate::services::ResultSink;

use super::schema::SCHEMA;

const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageAction {
    Transfer,
    Summarize,
}

impl UsageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageAction::Transfer => "transfer",
            UsageAction::Summarize => "summarize",
        }
    }
}

/// A saved summary together with the conversation it was made from.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub conversation: Conversation,
    pub summary: String,
    pub source: SummarySource,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStat {
    pub action: String,
    pub key: String,
    pub count: i64,
    pub last_used: DateTime<Utc>,
}

pub struct Repository {
    conn: Connection,
    max_history: usize,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            max_history: DEFAULT_MAX_HISTORY,
        })
    }

    /// History beyond `max` entries is dropped oldest first on every save.
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    // History operations

    pub async fn save_history(
        &self,
        conversation: &Conversation,
        summary: &SummaryResult,
    ) -> Result<i64> {
        let conversation_json = serde_json::to_string(conversation)?;
        let platform = conversation.platform.as_str();
        let url = conversation.url.clone();
        let message_count = conversation.total_messages() as i64;
        let text = summary.text.clone();
        let source = summary.source.as_str();
        let keep = self.max_history as i64;

        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    r#"INSERT INTO history
                       (platform, url, message_count, conversation, summary, source)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![platform, url, message_count, conversation_json, text, source],
                )?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "DELETE FROM history WHERE id NOT IN
                     (SELECT id FROM history ORDER BY id DESC LIMIT ?1)",
                    params![keep],
                )?;
                tx.commit()?;
                Ok(id)
            })
            .await?;

        tracing::debug!("Saved history entry {} ({} messages)", id, message_count);
        Ok(id)
    }

    /// Newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let limit = limit as i64;
        let entries = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, conversation, summary, source, saved_at FROM history
                     ORDER BY id DESC LIMIT ?1",
                )?;
                let entries = stmt
                    .query_map(params![limit], history_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM history WHERE id = ?1", params![id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn clear(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute("DELETE FROM history", [])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Usage statistics

    pub async fn record_usage(&self, action: UsageAction, key: &str) -> Result<()> {
        let action = action.as_str();
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO usage_stats (action, key, count) VALUES (?1, ?2, 1)
                       ON CONFLICT(action, key) DO UPDATE SET
                           count = count + 1,
                           last_used = datetime('now')"#,
                    params![action, key],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn usage_stats(&self) -> Result<Vec<UsageStat>> {
        let stats = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT action, key, count, last_used FROM usage_stats
                     ORDER BY action, count DESC, key",
                )?;
                let stats = stmt
                    .query_map([], usage_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }
}

#[async_trait]
impl ResultSink for Repository {
    async fn save_result(
        &self,
        conversation: &Conversation,
        summary: &SummaryResult,
    ) -> Result<()> {
        self.save_history(conversation, summary).await?;
        self.record_usage(UsageAction::Summarize, summary.source.as_str())
            .await
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(row
        .get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now))
}

fn history_from_row(row: &Row) -> rusqlite::Result<HistoryEntry> {
    let json: String = row.get(1)?;
    let conversation = parse_json(&json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(HistoryEntry {
        id: row.get(0)?,
        conversation,
        summary: row.get(2)?,
        source: SummarySource::parse(&row.get::<_, String>(3)?),
        saved_at: timestamp_at(row, 4)?,
    })
}

fn usage_from_row(row: &Row) -> rusqlite::Result<UsageStat> {
    Ok(UsageStat {
        action: row.get(0)?,
        key: row.get(1)?,
        count: row.get(2)?,
        last_used: timestamp_at(row, 3)?,
    })
}
