//! Database schema.
//!
//! Columns are only ever added; there is no migration framework.

use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS wallpapers (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    source_url TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    downloaded_at INTEGER NOT NULL,
    last_used_at INTEGER NOT NULL,
    use_count INTEGER NOT NULL DEFAULT 1 CHECK (use_count >= 1),
    categories TEXT NOT NULL,
    purity TEXT NOT NULL,
    resolution TEXT,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    rating INTEGER NOT NULL DEFAULT 0 CHECK (rating BETWEEN 0 AND 5)
);

CREATE TABLE IF NOT EXISTS wallpaper_tags (
    wallpaper_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (wallpaper_id, tag),
    FOREIGN KEY (wallpaper_id) REFERENCES wallpapers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS usage_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallpaper_id TEXT NOT NULL,
    used_at INTEGER NOT NULL,
    FOREIGN KEY (wallpaper_id) REFERENCES wallpapers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS view_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    current_wallpaper_id TEXT REFERENCES wallpapers(id) ON DELETE SET NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wallpapers_hash ON wallpapers(content_hash);
CREATE INDEX IF NOT EXISTS idx_wallpapers_last_used ON wallpapers(last_used_at);
CREATE INDEX IF NOT EXISTS idx_wallpapers_favorite ON wallpapers(is_favorite);
CREATE INDEX IF NOT EXISTS idx_usage_history_wallpaper_id ON usage_history(wallpaper_id);
CREATE INDEX IF NOT EXISTS idx_usage_history_used_at ON usage_history(used_at);
CREATE INDEX IF NOT EXISTS idx_wallpaper_tags_tag ON wallpaper_tags(tag);
";

/// Create tables and indices if they don't exist
pub(crate) fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
