// [libs/infra/ledger/src/schema.rs]
/*!
 * Structural synchronization for the work ledger.
 *
 * Three strata, applied in order on every `open`:
 *   1. solidify  — base tables, created if absent.
 *   2. evolve    — `ALTER TABLE ADD COLUMN` for each column added since the
 *                  first release, tolerating "duplicate column name" as the
 *                  expected steady-state outcome.
 *   3. harden    — acceleration indexes.
 *
 * The `tiles` table additionally carries its own rebuild migration, since a
 * `pubkey`-qualified uniqueness constraint can't be bolted on with `ALTER
 * TABLE ADD COLUMN` alone.
 */

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::errors::{LedgerError, Result};

const TACTICAL_TABLES: &[(&str, &str)] = &[
    (
        "TABLE_RANGESETS",
        r#"
        CREATE TABLE IF NOT EXISTS rangesets(
          id              INTEGER PRIMARY KEY,
          name            TEXT UNIQUE NOT NULL,
          min_dec         TEXT NOT NULL,
          max_dec         TEXT NOT NULL,
          chunk_bits      INTEGER NOT NULL,
          next_index      TEXT DEFAULT '0',
          created_ts      TEXT NOT NULL,
          cfg_fingerprint TEXT,
          notes           TEXT
        );
    "#,
    ),
    (
        "TABLE_CHUNKS",
        r#"
        CREATE TABLE IF NOT EXISTS chunks(
          id           INTEGER PRIMARY KEY,
          rangeset_id  INTEGER NOT NULL,
          chunk_index  TEXT NOT NULL,
          start_dec    TEXT NOT NULL,
          end_dec      TEXT NOT NULL,
          status       TEXT NOT NULL CHECK(status IN ('queued','running','done','found','aborted','stalled')),
          claimed_ts   TEXT NOT NULL,
          started_ts   TEXT,
          finished_ts  TEXT,
          mk_s_now     REAL,
          mk_s_avg     REAL,
          dead         INTEGER,
          dp           INTEGER,
          expected_ops TEXT,
          nthreads     INTEGER,
          pubkey       TEXT,
          m_factor     REAL,
          dp_forced    INTEGER,
          band_min_dec TEXT,
          band_max_dec TEXT,
          output       TEXT,
          UNIQUE(rangeset_id, chunk_index)
        );
    "#,
    ),
];

const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_TILES_BY_CHUNK", "CREATE INDEX IF NOT EXISTS tiles_by_chunk ON tiles(chunk_id);"),
    (
        "IDX_TILES_BY_STATUS",
        "CREATE INDEX IF NOT EXISTS tiles_by_status ON tiles(pubkey, status, level);",
    ),
];

/// Runs the full migration sequence. Safe to call on every process start —
/// every step is idempotent.
pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|e| LedgerError::Connection(e.to_string()))?;

    info!("ledger schema: solidifying base strata");
    solidify_base_strata(conn)?;

    debug!("ledger schema: evolving rangesets/chunks columns");
    evolve_rangesets(conn)?;
    evolve_chunks(conn)?;

    debug!("ledger schema: migrating tiles table");
    migrate_tiles(conn)?;

    debug!("ledger schema: hardening indexes");
    harden_indexes(conn)?;

    Ok(())
}

fn solidify_base_strata(conn: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!(identifier, "solidifying table");
        conn.execute_batch(sql)
            .map_err(|e| LedgerError::Migration(format!("{identifier}: {e}")))?;
    }
    Ok(())
}

fn add_column_if_missing(conn: &Connection, identifier: &str, sql: &str) -> Result<()> {
    match conn.execute(sql, []) {
        Ok(_) => {
            debug!(identifier, "applied evolutionary column");
            Ok(())
        }
        Err(e) => {
            let message = e.to_string();
            if message.contains("duplicate column name") {
                Ok(())
            } else {
                warn!(identifier, %message, "evolutionary column rejected");
                Err(LedgerError::Migration(format!("{identifier}: {message}")))
            }
        }
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let found = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(std::result::Result::ok)
        .any(|name| name == column);
    Ok(found)
}

fn evolve_rangesets(conn: &Connection) -> Result<()> {
    if !has_column(conn, "rangesets", "next_index")? {
        add_column_if_missing(
            conn,
            "RANGESET_NEXT_INDEX",
            "ALTER TABLE rangesets ADD COLUMN next_index TEXT DEFAULT '0'",
        )?;
    }
    if !has_column(conn, "rangesets", "created_ts")? {
        add_column_if_missing(conn, "RANGESET_CREATED_TS", "ALTER TABLE rangesets ADD COLUMN created_ts TEXT")?;
        conn.execute(
            "UPDATE rangesets SET created_ts=?1 WHERE created_ts IS NULL",
            [crate::util::utc_now_iso()],
        )?;
    }
    if !has_column(conn, "rangesets", "cfg_fingerprint")? {
        add_column_if_missing(
            conn,
            "RANGESET_FINGERPRINT",
            "ALTER TABLE rangesets ADD COLUMN cfg_fingerprint TEXT",
        )?;
        conn.execute(
            "UPDATE rangesets SET cfg_fingerprint = 'min:' || min_dec || '|max:' || max_dec || '|bits:' || chunk_bits \
             WHERE cfg_fingerprint IS NULL",
            [],
        )?;
    }
    Ok(())
}

fn evolve_chunks(conn: &Connection) -> Result<()> {
    const NEEDED: &[(&str, &str)] = &[
        ("claimed_ts", "TEXT"),
        ("started_ts", "TEXT"),
        ("finished_ts", "TEXT"),
        ("mk_s_now", "REAL"),
        ("mk_s_avg", "REAL"),
        ("dead", "INTEGER"),
        ("dp", "INTEGER"),
        ("expected_ops", "TEXT"),
        ("nthreads", "INTEGER"),
        ("pubkey", "TEXT"),
        ("m_factor", "REAL"),
        ("dp_forced", "INTEGER"),
        ("band_min_dec", "TEXT"),
        ("band_max_dec", "TEXT"),
        ("output", "TEXT"),
    ];
    for (name, typ) in NEEDED {
        if !has_column(conn, "chunks", name)? {
            add_column_if_missing(
                conn,
                &format!("CHUNK_{}", name.to_uppercase()),
                &format!("ALTER TABLE chunks ADD COLUMN {name} {typ}"),
            )?;
        }
    }
    Ok(())
}

fn table_sql(conn: &Connection, name: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |row| row.get(0),
    )
    .map(Some)
    .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e.into()) })
}

const TILES_SHAPE: &str = r#"
  id           INTEGER PRIMARY KEY,
  pubkey       TEXT,
  level        INTEGER NOT NULL,
  start_hex    TEXT NOT NULL,
  status       TEXT NOT NULL CHECK(status IN ('running','done','found')),
  lease_ts     TEXT NOT NULL,
  rangeset_id  INTEGER,
  chunk_id     INTEGER,
  UNIQUE(pubkey, level, start_hex)
"#;

fn migrate_tiles(conn: &Connection) -> Result<()> {
    let exists = table_sql(conn, "tiles")?.is_some();
    if !exists {
        conn.execute_batch(&format!("CREATE TABLE IF NOT EXISTS tiles({TILES_SHAPE});"))?;
        return Ok(());
    }

    let needs_pubkey = !has_column(conn, "tiles", "pubkey")?;
    let sql = table_sql(conn, "tiles")?.unwrap_or_default();
    let normalized = sql.replace('\n', " ").replace("  ", " ");
    let has_unique_per_pubkey = normalized.contains("UNIQUE(pubkey, level, start_hex)");

    if !needs_pubkey && has_unique_per_pubkey {
        return Ok(());
    }

    info!("ledger schema: rebuilding tiles table to add pubkey-qualified uniqueness");
    conn.execute_batch("BEGIN IMMEDIATE;")?;
    let result = (|| -> Result<()> {
        conn.execute_batch("DROP TABLE IF EXISTS tiles_new;")?;
        conn.execute_batch(&format!("CREATE TABLE tiles_new({TILES_SHAPE});"))?;
        conn.execute_batch(
            "INSERT OR IGNORE INTO tiles_new(id, pubkey, level, start_hex, status, lease_ts, rangeset_id, chunk_id)
             SELECT t.id,
                    (SELECT c.pubkey FROM chunks c WHERE c.id = t.chunk_id) AS pubkey,
                    t.level, t.start_hex, t.status, t.lease_ts, t.rangeset_id, t.chunk_id
             FROM tiles t;",
        )?;
        conn.execute_batch("DROP TABLE tiles; ALTER TABLE tiles_new RENAME TO tiles;")?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")?;
            Ok(())
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK;")?;
            Err(e)
        }
    }
}

fn harden_indexes(conn: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!(identifier, "hardening index");
        conn.execute_batch(sql)
            .map_err(|e| LedgerError::Migration(format!("{identifier}: {e}")))?;
    }
    Ok(())
}

/// Returns the set of `status` values currently admitted by the `chunks`
/// table's `CHECK` constraint, read back from `sqlite_master`.
///
/// A hand-maintained constant would drift silently the day the constraint is
/// edited without updating this file; reading the live constraint keeps the
/// two in lockstep by construction.
pub fn allowed_chunk_statuses(conn: &Connection) -> Result<std::collections::HashSet<String>> {
    let sql = table_sql(conn, "chunks")?.unwrap_or_default();
    let re_start = match sql.to_ascii_uppercase().find("CHECK") {
        Some(i) => i,
        None => return Ok(default_statuses()),
    };
    let window = &sql[re_start..];
    let open = match window.find('(') {
        Some(i) => i,
        None => return Ok(default_statuses()),
    };
    // Find the matching close paren for the outer CHECK(...) group, then the
    // inner IN(...) list nested within it.
    let inner = match window[open..].find("IN") {
        Some(_) => window,
        None => return Ok(default_statuses()),
    };
    let list_open = match inner.find('(').map(|i| inner[i + 1..].find('(').map(|j| i + 1 + j)) {
        Some(Some(i)) => i,
        _ => return Ok(default_statuses()),
    };
    let list_close = match window[list_open..].find(')') {
        Some(i) => list_open + i,
        None => return Ok(default_statuses()),
    };
    let raw = &window[list_open + 1..list_close];
    let vals: std::collections::HashSet<String> = raw
        .split(',')
        .map(|v| v.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if vals.is_empty() {
        Ok(default_statuses())
    } else {
        Ok(vals)
    }
}

fn default_statuses() -> std::collections::HashSet<String> {
    ["queued", "running", "done", "found", "aborted", "stalled", "error"]
        .into_iter()
        .map(String::from)
        .collect()
}
