//! SQLite link store.
//!
//! One `links` table, one row per edge. Rows are looked up from either side
//! through a pair of indexes, and NULL tenant columns mean "host".
//! Blocking SQLite calls run on tokio's blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use idlink_core::{IdentityRef, Link, LinkError, Result, TenantContext};

use crate::{is_visible, leads_to_excluded, LinkStore};

const SELECT_COLUMNS: &str =
    "SELECT id, source_tenant_id, source_user_id, target_tenant_id, target_user_id FROM links";

/// SQLite-backed [`LinkStore`].
#[derive(Clone)]
pub struct SqliteLinkStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLinkStore {
    /// Open or create a link database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Storage`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(LinkError::storage)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Storage`] if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(LinkError::storage)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| LinkError::Storage("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(LinkError::storage)?
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS links (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            source_tenant_id TEXT,
            source_user_id TEXT NOT NULL,
            target_tenant_id TEXT,
            target_user_id TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_user_id, source_tenant_id);
        CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_user_id, target_tenant_id);
        ",
    )
    .map_err(LinkError::storage)
}

/// Columns as stored, before UUID parsing.
struct RawLink {
    id: String,
    source_tenant_id: Option<String>,
    source_user_id: String,
    target_tenant_id: Option<String>,
    target_user_id: String,
}

impl RawLink {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_tenant_id: row.get(1)?,
            source_user_id: row.get(2)?,
            target_tenant_id: row.get(3)?,
            target_user_id: row.get(4)?,
        })
    }

    fn into_link(self) -> Result<Link> {
        Ok(Link::new(
            parse_uuid(&self.id)?,
            IdentityRef::new(
                self.source_tenant_id.as_deref().map(parse_uuid).transpose()?,
                parse_uuid(&self.source_user_id)?,
            ),
            IdentityRef::new(
                self.target_tenant_id.as_deref().map(parse_uuid).transpose()?,
                parse_uuid(&self.target_user_id)?,
            ),
        ))
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| LinkError::Storage(format!("corrupt id '{raw}': {e}")))
}

fn tenant_param(identity: &IdentityRef) -> Option<String> {
    identity.tenant_id.map(|t| t.to_string())
}

fn query_links(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Link>> {
    let mut stmt = conn.prepare(sql).map_err(LinkError::storage)?;
    let raw = stmt
        .query_map(params, RawLink::from_row)
        .map_err(LinkError::storage)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(LinkError::storage)?;
    raw.into_iter().map(RawLink::into_link).collect()
}

fn ensure_visible(scope: &TenantContext, link: &Link) -> Result<()> {
    if is_visible(scope, link) {
        Ok(())
    } else {
        tracing::warn!(link = %link.id, "rejected link outside tenant scope");
        Err(LinkError::Storage(format!(
            "link {} is outside the current tenant scope",
            link.id
        )))
    }
}

#[async_trait]
impl LinkStore for SqliteLinkStore {
    async fn find_direct(
        &self,
        scope: &TenantContext,
        identity: &IdentityRef,
        excluding: &[IdentityRef],
    ) -> Result<Vec<Link>> {
        let scope = *scope;
        let identity = *identity;
        let excluding = excluding.to_vec();
        self.with_conn(move |conn| {
            let sql = format!(
                "{SELECT_COLUMNS}
                 WHERE (source_user_id = ?2 AND source_tenant_id IS ?1)
                    OR (target_user_id = ?2 AND target_tenant_id IS ?1)
                 ORDER BY seq"
            );
            let links = query_links(
                conn,
                &sql,
                params![tenant_param(&identity), identity.user_id.to_string()],
            )?;
            Ok(links
                .into_iter()
                .filter(|l| is_visible(&scope, l))
                .filter(|l| !leads_to_excluded(l, &identity, &excluding))
                .collect())
        })
        .await
    }

    async fn find(
        &self,
        scope: &TenantContext,
        a: &IdentityRef,
        b: &IdentityRef,
    ) -> Result<Option<Link>> {
        let scope = *scope;
        let (a, b) = (*a, *b);
        self.with_conn(move |conn| {
            let sql = format!(
                "{SELECT_COLUMNS}
                 WHERE (source_user_id = ?2 AND source_tenant_id IS ?1
                        AND target_user_id = ?4 AND target_tenant_id IS ?3)
                    OR (source_user_id = ?4 AND source_tenant_id IS ?3
                        AND target_user_id = ?2 AND target_tenant_id IS ?1)
                 ORDER BY seq"
            );
            let links = query_links(
                conn,
                &sql,
                params![
                    tenant_param(&a),
                    a.user_id.to_string(),
                    tenant_param(&b),
                    b.user_id.to_string()
                ],
            )?;
            Ok(links.into_iter().find(|l| is_visible(&scope, l)))
        })
        .await
    }

    async fn insert(&self, scope: &TenantContext, link: &Link) -> Result<()> {
        ensure_visible(scope, link)?;
        let link = link.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO links
                 (id, source_tenant_id, source_user_id, target_tenant_id, target_user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    link.id.to_string(),
                    tenant_param(&link.source),
                    link.source.user_id.to_string(),
                    tenant_param(&link.target),
                    link.target.user_id.to_string(),
                ],
            )
            .map_err(LinkError::storage)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, scope: &TenantContext, link: &Link) -> Result<()> {
        ensure_visible(scope, link)?;
        let id = link.id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM links WHERE id = ?1", params![id])
                .map_err(LinkError::storage)?;
            Ok(())
        })
        .await
    }

    async fn list(&self, scope: &TenantContext) -> Result<Vec<Link>> {
        let scope = *scope;
        self.with_conn(move |conn| {
            let sql = format!("{SELECT_COLUMNS} ORDER BY seq");
            let links = query_links(conn, &sql, params![])?;
            Ok(links.into_iter().filter(|l| is_visible(&scope, l)).collect())
        })
        .await
    }

    async fn count(&self, scope: &TenantContext) -> Result<u64> {
        if scope.is_filtered() {
            return Ok(self.list(scope).await?.len() as u64);
        }
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))
                .map_err(LinkError::storage)?;
            Ok(count as u64)
        })
        .await
    }
}
