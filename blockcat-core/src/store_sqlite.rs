use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::debug;

use crate::domain::{
    AggregatedNode, BlockStatus, BlockedUrl, CategoryId, CategoryRow, Counts, NodeGroup,
};
use crate::error::{CategoryError, Result};
use crate::path::{CategoryPath, LookupKey, MAX_DEPTH};
use crate::query::NodeQuery;
use crate::store::{BlockStatusView, CategoryStore, OpenParams, UrlCategoryIndex};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY,
        display_name TEXT NOT NULL,
        name1 TEXT,
        name2 TEXT,
        name3 TEXT,
        name4 TEXT,
        name5 TEXT,
        name6 TEXT,
        name7 TEXT,
        name8 TEXT,
        name9 TEXT,
        name10 TEXT,
        blocked_url_count INTEGER NOT NULL DEFAULT 0 CHECK (blocked_url_count >= 0),
        block_count INTEGER NOT NULL DEFAULT 0 CHECK (block_count >= 0)
    );

    CREATE INDEX IF NOT EXISTS idx_categories_prefix ON categories(name1, name2, name3);

    CREATE TABLE IF NOT EXISTS urls (
        url_id INTEGER PRIMARY KEY,
        url TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS url_categories (
        url_id INTEGER NOT NULL REFERENCES urls(url_id),
        category_id INTEGER NOT NULL,
        PRIMARY KEY (url_id, category_id)
    );

    CREATE INDEX IF NOT EXISTS idx_url_categories_category ON url_categories(category_id);

    -- latest result per url per reporting network
    CREATE TABLE IF NOT EXISTS url_latest_status (
        url_id INTEGER NOT NULL REFERENCES urls(url_id),
        network_name TEXT NOT NULL,
        status TEXT NOT NULL,
        PRIMARY KEY (url_id, network_name)
    );
"#;

// id, display_name, then segment columns at indices 2..=11
const ROW_COLUMNS: &str =
    "id, display_name, name1, name2, name3, name4, name5, name6, name7, name8, name9, name10";

fn occupied(i: usize) -> String {
    format!("TRIM(COALESCE(name{i}, '')) <> ''")
}

fn vacant(i: usize) -> String {
    format!("TRIM(COALESCE(name{i}, '')) = ''")
}

/// `name{i} = ?` for every segment of the scope, with matching arguments.
fn scope_conditions(scope: &LookupKey) -> (Vec<String>, Vec<String>) {
    scope
        .segments()
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("name{} = ?", i + 1), v.clone()))
        .unzip()
}

fn path_at(row: &Row<'_>, first: usize) -> rusqlite::Result<CategoryPath> {
    let mut raw: [Option<String>; MAX_DEPTH] = Default::default();
    for (i, slot) in raw.iter_mut().enumerate() {
        *slot = row.get(first + i)?;
    }
    Ok(CategoryPath::from_raw(raw))
}

fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let v: i64 = row.get(idx)?;
    u64::try_from(v).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, v))
}

fn category_row(row: &Row<'_>) -> rusqlite::Result<CategoryRow> {
    Ok(CategoryRow {
        id: CategoryId(row.get(0)?),
        display_name: row.get(1)?,
        path: path_at(row, 2)?,
        blocked_url_count: count_at(row, 12)?,
        block_count: count_at(row, 13)?,
    })
}

/// SQLite reports `SUM` overflow as a plain failure; surface it as a data problem.
fn sum_error(err: rusqlite::Error, prefix: &LookupKey) -> CategoryError {
    let overflow = matches!(
        &err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("integer overflow")
    );
    if overflow {
        CategoryError::CountOverflow(prefix.to_string())
    } else {
        CategoryError::Storage(err)
    }
}

fn to_sql_count(v: u64) -> Result<i64> {
    i64::try_from(v).map_err(|_| CategoryError::InvalidInput(format!("count {v} out of range")))
}

fn insert_into(conn: &Connection, row: &CategoryRow) -> Result<()> {
    row.validate()?;
    let mut values = Vec::with_capacity(MAX_DEPTH + 4);
    values.push(Value::Integer(row.id.0));
    values.push(Value::Text(row.display_name.clone()));
    for i in 1..=MAX_DEPTH {
        values.push(match row.path.segment(i) {
            Some(s) => Value::Text(s.to_string()),
            None => Value::Null,
        });
    }
    values.push(Value::Integer(to_sql_count(row.blocked_url_count)?));
    values.push(Value::Integer(to_sql_count(row.block_count)?));

    let sql = format!(
        "INSERT OR REPLACE INTO categories ({ROW_COLUMNS}, blocked_url_count, block_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

pub struct SqliteCategoryStore {
    conn: Mutex<Connection>,
}

impl SqliteCategoryStore {
    pub fn open(params: &OpenParams) -> Result<Self> {
        let conn = Connection::open(&params.db_path)?;
        conn.busy_timeout(params.busy_timeout)?;
        Self::from_connection(conn)
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&OpenParams {
            db_path: path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_secs(5),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CategoryError::StorageLock)
    }

    /// Insert or replace one category row. Rejects empty or gapped paths.
    pub fn insert_row(&self, row: &CategoryRow) -> Result<()> {
        insert_into(&*self.conn()?, row)
    }

    /// Insert or replace a batch in one transaction; nothing is written if any row fails.
    pub fn insert_rows(&self, rows: &[CategoryRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for row in rows {
            insert_into(&tx, row)?;
        }
        tx.commit()?;
        debug!(rows = rows.len(), "inserted category batch");
        Ok(())
    }

    /// Attach `url` to a leaf category, creating the URL record if needed.
    pub fn link_url(&self, url: &str, category: CategoryId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("INSERT OR IGNORE INTO urls (url) VALUES (?1)", params![url])?;
        conn.execute(
            "INSERT OR IGNORE INTO url_categories (url_id, category_id)
             SELECT url_id, ?2 FROM urls WHERE url = ?1",
            params![url, category.0],
        )?;
        Ok(())
    }

    /// Overwrite the latest status of `url` on `network`.
    pub fn record_status(&self, url: &str, network: &str, status: BlockStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("INSERT OR IGNORE INTO urls (url) VALUES (?1)", params![url])?;
        conn.execute(
            "INSERT OR REPLACE INTO url_latest_status (url_id, network_name, status)
             SELECT url_id, ?2, ?3 FROM urls WHERE url = ?1",
            params![url, network, status.as_str()],
        )?;
        Ok(())
    }

    pub fn rows(&self) -> Result<Vec<CategoryRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ROW_COLUMNS}, blocked_url_count, block_count FROM categories ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], category_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn url_links(&self) -> Result<Vec<(String, CategoryId)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT u.url, uc.category_id FROM url_categories uc
             JOIN urls u ON u.url_id = uc.url_id
             ORDER BY uc.category_id, u.url",
        )?;
        let links = stmt
            .query_map([], |row| Ok((row.get(0)?, CategoryId(row.get(1)?))))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    /// `(url, network, status)` triples; statuses outside the known vocabulary are skipped.
    pub fn latest_statuses(&self) -> Result<Vec<(String, String, BlockStatus)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT u.url, s.network_name, s.status FROM url_latest_status s
             JOIN urls u ON u.url_id = s.url_id
             ORDER BY u.url, s.network_name",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(raw.len());
        for (url, network, status) in raw {
            match status.parse::<BlockStatus>() {
                Ok(s) => out.push((url, network, s)),
                Err(_) => debug!(%url, %network, %status, "skipping unknown status"),
            }
        }
        Ok(out)
    }
}

impl CategoryStore for SqliteCategoryStore {
    fn load(&self, id: CategoryId) -> Result<Option<CategoryRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {ROW_COLUMNS}, blocked_url_count, block_count
                     FROM categories WHERE id = ?1"
                ),
                params![id.0],
                category_row,
            )
            .optional()?;
        Ok(row)
    }

    fn group_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeGroup>> {
        let depth = query.group_depth();
        let (mut conds, args) = scope_conditions(query.scope());
        conds.push(occupied(depth));
        let exact = query
            .terminal_segment()
            .map(vacant)
            .unwrap_or_else(|| "1".to_string());
        let partition = (1..=depth)
            .map(|i| format!("name{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = conds.join(" AND ");
        let keep_unmaterialized = if query.materialized_only() { 0 } else { 1 };

        // Window totals cover the whole group; the representative is the first
        // materialized row by (display_name, id), else the first row of the group.
        let sql = format!(
            "WITH scoped AS (
                SELECT {ROW_COLUMNS}, blocked_url_count, block_count, ({exact}) AS is_exact
                FROM categories
                WHERE {where_clause}
            ),
            ranked AS (
                SELECT *,
                    SUM(blocked_url_count) OVER grp AS blocked_url_total,
                    SUM(block_count) OVER grp AS block_total,
                    SUM(is_exact) OVER grp AS materialized,
                    ROW_NUMBER() OVER (
                        PARTITION BY {partition}
                        ORDER BY is_exact DESC, display_name, id
                    ) AS rn
                FROM scoped
                WINDOW grp AS (PARTITION BY {partition})
            )
            SELECT {ROW_COLUMNS}, blocked_url_total, block_total, materialized
            FROM ranked
            WHERE rn = 1 AND (is_exact = 1 OR {keep_unmaterialized})
            ORDER BY display_name, id"
        );
        debug!(scope = %query.scope(), depth, "grouping category rows");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let groups = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let key = path_at(row, 2)?.lookup_key().truncated(depth);
                Ok(NodeGroup {
                    node: AggregatedNode {
                        id: CategoryId(row.get(0)?),
                        display_name: row.get(1)?,
                        name: key.name().unwrap_or_default().to_string(),
                        key,
                        totals: Counts {
                            blocked_url_count_total: count_at(row, 12)?,
                            block_count_total: count_at(row, 13)?,
                        },
                    },
                    materialized_rows: count_at(row, 14)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| sum_error(e, query.scope()))?;
        Ok(groups)
    }

    fn sum_counts(&self, prefix: &LookupKey) -> Result<Counts> {
        let (conds, args) = scope_conditions(prefix);
        let where_clause = if conds.is_empty() {
            "1 = 1".to_string()
        } else {
            conds.join(" AND ")
        };
        let sql = format!(
            "SELECT COALESCE(SUM(blocked_url_count), 0), COALESCE(SUM(block_count), 0)
             FROM categories WHERE {where_clause}"
        );
        debug!(prefix = %prefix, "summing category counts");

        let conn = self.conn()?;
        let counts = conn
            .query_row(&sql, params_from_iter(args.iter()), |row| {
                Ok(Counts {
                    blocked_url_count_total: count_at(row, 0)?,
                    block_count_total: count_at(row, 1)?,
                })
            })
            .map_err(|e| sum_error(e, prefix))?;
        Ok(counts)
    }
}

impl UrlCategoryIndex for SqliteCategoryStore {
    fn urls_in(&self, leaf: CategoryId) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT u.url FROM urls u
             JOIN url_categories uc ON uc.url_id = u.url_id
             WHERE uc.category_id = ?1
             ORDER BY u.url",
        )?;
        let urls = stmt
            .query_map(params![leaf.0], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(urls)
    }
}

impl BlockStatusView for SqliteCategoryStore {
    fn blocking_networks(&self, leaf: CategoryId) -> Result<Vec<BlockedUrl>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT u.url, COUNT(DISTINCT s.network_name) FROM urls u
             JOIN url_categories uc ON uc.url_id = u.url_id
             JOIN url_latest_status s ON s.url_id = u.url_id
             WHERE uc.category_id = ?1 AND s.status = 'blocked'
             GROUP BY u.url
             ORDER BY u.url",
        )?;
        let blocked = stmt
            .query_map(params![leaf.0], |row| {
                Ok(BlockedUrl {
                    url: row.get(0)?,
                    networks: count_at(row, 1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, segs: &[&str]) -> CategoryRow {
        CategoryRow {
            id: CategoryId(id),
            display_name: segs.join("/"),
            path: CategoryPath::from_segments(segs.iter().copied()).unwrap(),
            blocked_url_count: 1,
            block_count: 2,
        }
    }

    #[test]
    fn insert_and_load_round_trip() {
        let store = SqliteCategoryStore::in_memory().unwrap();
        let r = row(7, &["News", "Politics"]);
        store.insert_row(&r).unwrap();

        assert_eq!(store.load(CategoryId(7)).unwrap(), Some(r));
        assert_eq!(store.load(CategoryId(8)).unwrap(), None);
    }

    #[test]
    fn rejects_gapped_and_empty_paths() {
        let store = SqliteCategoryStore::in_memory().unwrap();
        let mut raw: [Option<String>; MAX_DEPTH] = Default::default();
        raw[0] = Some("News".into());
        raw[2] = Some("Elections".into());
        let gapped = CategoryRow {
            path: CategoryPath::from_raw(raw),
            ..row(1, &["News"])
        };
        assert!(matches!(
            store.insert_row(&gapped),
            Err(CategoryError::InvalidInput(_))
        ));

        let empty = CategoryRow {
            path: CategoryPath::default(),
            ..row(2, &["News"])
        };
        assert!(store.insert_row(&empty).is_err());
        assert!(store.rows().unwrap().is_empty());
    }

    #[test]
    fn blank_columns_count_as_absent() {
        let store = SqliteCategoryStore::in_memory().unwrap();
        store.insert_row(&row(1, &["News"])).unwrap();
        store
            .conn()
            .unwrap()
            .execute("UPDATE categories SET name2 = '  ' WHERE id = 1", [])
            .unwrap();

        let top = store
            .group_nodes(&NodeQuery::children_of(&LookupKey::root()).unwrap())
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].node.key, LookupKey::new(["News"]).unwrap());
    }

    #[test]
    fn unknown_statuses_are_skipped() {
        let store = SqliteCategoryStore::in_memory().unwrap();
        store
            .record_status("http://a.example", "NetA", BlockStatus::Blocked)
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO url_latest_status (url_id, network_name, status)
                 SELECT url_id, 'NetB', 'mystery' FROM urls",
                [],
            )
            .unwrap();

        let statuses = store.latest_statuses().unwrap();
        assert_eq!(
            statuses,
            vec![(
                "http://a.example".to_string(),
                "NetA".to_string(),
                BlockStatus::Blocked
            )]
        );
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let store = SqliteCategoryStore::in_memory().unwrap();
        let mut raw: [Option<String>; MAX_DEPTH] = Default::default();
        raw[1] = Some("Politics".into());
        let gapped = CategoryRow {
            path: CategoryPath::from_raw(raw),
            ..row(2, &["News"])
        };

        assert!(store.insert_rows(&[row(1, &["News"]), gapped]).is_err());
        assert!(store.rows().unwrap().is_empty());

        store
            .insert_rows(&[row(1, &["News"]), row(2, &["News", "Politics"])])
            .unwrap();
        assert_eq!(store.rows().unwrap().len(), 2);
    }

    #[test]
    fn overflowing_sums_are_not_storage_failures() {
        let store = SqliteCategoryStore::in_memory().unwrap();
        let half = crate::domain::MAX_COUNT / 2 + 1;
        for (id, segs) in [(1, ["News", "Politics"]), (2, ["News", "Sport"])] {
            store
                .insert_row(&CategoryRow {
                    blocked_url_count: half,
                    ..row(id, &segs)
                })
                .unwrap();
        }

        let news = LookupKey::new(["News"]).unwrap();
        let err = store.sum_counts(&news).unwrap_err();
        assert!(matches!(err, CategoryError::CountOverflow(_)), "{err}");
        assert!(!err.is_storage());
        let err = store
            .group_nodes(&NodeQuery::node(&news).unwrap())
            .unwrap_err();
        assert!(matches!(err, CategoryError::CountOverflow(_)), "{err}");
    }

    #[test]
    fn node_lookup_falls_back_to_deeper_rows() {
        let store = SqliteCategoryStore::in_memory().unwrap();
        store.insert_row(&row(5, &["News", "Sport"])).unwrap();
        store.insert_row(&row(4, &["News", "Politics"])).unwrap();

        let news = LookupKey::new(["News"]).unwrap();
        let groups = store.group_nodes(&NodeQuery::node(&news).unwrap()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].materialized_rows, 0);
        // display names are "News/Politics" and "News/Sport"
        assert_eq!(groups[0].node.id, CategoryId(4));
        assert_eq!(groups[0].node.key, news);
        assert_eq!(groups[0].node.totals.block_count_total, 4);

        let top = store
            .group_nodes(&NodeQuery::children_of(&LookupKey::root()).unwrap())
            .unwrap();
        assert!(top.is_empty());
    }
}
