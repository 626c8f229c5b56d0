pub const SCHEMA: &str = r#"
-- history table
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    platform TEXT NOT NULL,
    url TEXT NOT NULL,
    message_count INTEGER NOT NULL,
    conversation TEXT NOT NULL,
    summary TEXT NOT NULL,
    source TEXT NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_history_saved_at ON history(saved_at DESC);

-- usage_stats table
CREATE TABLE IF NOT EXISTS usage_stats (
    action TEXT NOT NULL,
    key TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    last_used TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (action, key)
);
"#;
