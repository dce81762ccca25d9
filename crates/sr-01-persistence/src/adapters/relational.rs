//! # Relational Storage Adapter
//!
//! SQL implementation of [`PersistenceProvider`] on sea-orm. Postgres in
//! production, SQLite for development and tests.
//!
//! ## Schema
//!
//! ```text
//! relay_store(tenant_name, bucket, entry_key BLOB, entry_value BLOB)
//!   PRIMARY KEY (tenant_name, bucket, entry_key)
//! ```
//!
//! Keys are stored as bytes so range comparisons are bytewise on every
//! backend, matching the embedded store. Every statement is scoped to the
//! tenant the provider was opened for.
//!
//! Each logical operation is one statement or one short transaction; the
//! database provides isolation, so there is no process-wide lock.

use crate::domain::{expiry_key, Bucket, StoreError};
use crate::ports::{BackendKind, PersistenceProvider, StoredEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sea_orm::sea_query::{
    Alias, ColumnDef, Expr, Index, OnConflict, Order, Query, SelectStatement, SimpleExpr, Table,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, DeriveIden,
    QueryResult, StatementBuilder, TransactionTrait,
};
use std::time::Duration;
use tracing::{debug, info};

#[derive(DeriveIden, Clone, Copy)]
enum RelayStore {
    Table,
    TenantName,
    Bucket,
    EntryKey,
    EntryValue,
}

/// Connection pool options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_ms: 10_000,
            acquire_timeout_ms: 30_000,
        }
    }
}

impl PoolConfig {
    /// Single connection; SQLite test databases serialize writers anyway.
    pub fn for_testing() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            connect_timeout_ms: 5_000,
            acquire_timeout_ms: 5_000,
        }
    }
}

/// sea-orm backed provider scoped to one tenant.
pub struct RelationalStore {
    conn: Mutex<Option<DatabaseConnection>>,
    tenant: String,
}

fn db_err(e: DbErr) -> StoreError {
    StoreError::io(format!("SQL error: {e}"))
}

async fn exec<C, S>(conn: &C, stmt: &S) -> Result<u64, StoreError>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    let result = conn.execute(backend.build(stmt)).await.map_err(db_err)?;
    Ok(result.rows_affected())
}

async fn query_one<C, S>(conn: &C, stmt: &S) -> Result<Option<QueryResult>, StoreError>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    conn.query_one(backend.build(stmt)).await.map_err(db_err)
}

async fn query_all<C, S>(conn: &C, stmt: &S) -> Result<Vec<QueryResult>, StoreError>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let backend = conn.get_database_backend();
    conn.query_all(backend.build(stmt)).await.map_err(db_err)
}

impl RelationalStore {
    /// Connect, then create the schema if it is missing.
    pub async fn connect(url: &str, tenant: &str, pool: &PoolConfig) -> Result<Self, StoreError> {
        let mut options = ConnectOptions::new(url.to_owned());
        options
            .max_connections(pool.max_connections)
            .min_connections(pool.min_connections)
            .connect_timeout(Duration::from_millis(pool.connect_timeout_ms))
            .acquire_timeout(Duration::from_millis(pool.acquire_timeout_ms))
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| StoreError::Open {
                message: format!("Failed to connect to database: {e}"),
            })?;

        let create = Table::create()
            .table(RelayStore::Table)
            .if_not_exists()
            .col(ColumnDef::new(RelayStore::TenantName).string().not_null())
            .col(ColumnDef::new(RelayStore::Bucket).string().not_null())
            .col(ColumnDef::new(RelayStore::EntryKey).blob().not_null())
            .col(ColumnDef::new(RelayStore::EntryValue).blob().not_null())
            .primary_key(
                Index::create()
                    .col(RelayStore::TenantName)
                    .col(RelayStore::Bucket)
                    .col(RelayStore::EntryKey),
            )
            .to_owned();
        exec(&conn, &create).await.map_err(|e| StoreError::Open {
            message: format!("Failed to create schema: {e}"),
        })?;

        info!(
            "[sr-01] Relational store ready ({:?}) for tenant {}",
            conn.get_database_backend(),
            tenant
        );

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            tenant: tenant.to_string(),
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Pool handles are cheap clones; the mutex only guards open/closed.
    fn conn(&self) -> Result<DatabaseConnection, StoreError> {
        self.conn.lock().clone().ok_or(StoreError::Closed)
    }

    fn scope(&self, bucket: Bucket) -> [SimpleExpr; 2] {
        [
            Expr::col(RelayStore::TenantName).eq(self.tenant.as_str()),
            Expr::col(RelayStore::Bucket).eq(bucket.as_str()),
        ]
    }

    fn scoped_select(&self, bucket: Bucket) -> SelectStatement {
        let mut select = Query::select();
        select.from(RelayStore::Table);
        for cond in self.scope(bucket) {
            select.and_where(cond);
        }
        select
    }

    async fn insert<C: ConnectionTrait>(
        &self,
        conn: &C,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        on_conflict: OnConflict,
    ) -> Result<u64, StoreError> {
        let insert = Query::insert()
            .into_table(RelayStore::Table)
            .columns([
                RelayStore::TenantName,
                RelayStore::Bucket,
                RelayStore::EntryKey,
                RelayStore::EntryValue,
            ])
            .values_panic([
                self.tenant.as_str().into(),
                bucket.as_str().into(),
                key.as_bytes().to_vec().into(),
                value.to_vec().into(),
            ])
            .on_conflict(on_conflict)
            .to_owned();
        exec(conn, &insert).await
    }

    fn upsert() -> OnConflict {
        OnConflict::columns([
            RelayStore::TenantName,
            RelayStore::Bucket,
            RelayStore::EntryKey,
        ])
        .update_column(RelayStore::EntryValue)
        .to_owned()
    }

    fn keep_existing() -> OnConflict {
        OnConflict::columns([
            RelayStore::TenantName,
            RelayStore::Bucket,
            RelayStore::EntryKey,
        ])
        .do_nothing()
        .to_owned()
    }
}

fn entry_from_row(row: &QueryResult) -> Result<StoredEntry, StoreError> {
    let key: Vec<u8> = row.try_get("", "entry_key").map_err(db_err)?;
    let value: Vec<u8> = row.try_get("", "entry_value").map_err(db_err)?;
    Ok(StoredEntry {
        key: String::from_utf8_lossy(&key).into_owned(),
        value,
    })
}

#[async_trait]
impl PersistenceProvider for RelationalStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn put(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let Some(ts) = expires_at else {
            self.insert(&conn, bucket, key, value, Self::upsert()).await?;
            return Ok(());
        };

        let tx = conn.begin().await.map_err(db_err)?;
        self.insert(&tx, bucket, key, value, Self::upsert()).await?;
        self.insert(
            &tx,
            Bucket::Expiry,
            &expiry_key(ts, key),
            key.as_bytes(),
            Self::upsert(),
        )
        .await?;
        tx.commit().await.map_err(db_err)
    }

    async fn put_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let tx = conn.begin().await.map_err(db_err)?;

        let inserted = self
            .insert(&tx, bucket, key, value, Self::keep_existing())
            .await?
            > 0;
        if inserted {
            if let Some(ts) = expires_at {
                self.insert(
                    &tx,
                    Bucket::Expiry,
                    &expiry_key(ts, key),
                    key.as_bytes(),
                    Self::upsert(),
                )
                .await?;
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(inserted)
    }

    async fn get_if_present(
        &self,
        bucket: Bucket,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn()?;
        let select = self
            .scoped_select(bucket)
            .column(RelayStore::EntryValue)
            .and_where(Expr::col(RelayStore::EntryKey).eq(key.as_bytes().to_vec()))
            .to_owned();

        match query_one(&conn, &select).await? {
            Some(row) => Ok(Some(row.try_get("", "entry_value").map_err(db_err)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let conn = self.conn()?;
        let mut delete = Query::delete();
        delete.from_table(RelayStore::Table);
        for cond in self.scope(bucket) {
            delete.and_where(cond);
        }
        delete.and_where(
            Expr::col(RelayStore::EntryKey).is_in(keys.iter().map(|k| k.as_bytes().to_vec())),
        );
        exec(&conn, &delete).await?;
        Ok(())
    }

    async fn delete_range(
        &self,
        bucket: Bucket,
        upper_bound: &str,
    ) -> Result<Vec<StoredEntry>, StoreError> {
        let conn = self.conn()?;
        let bound = upper_bound.as_bytes().to_vec();
        let tx = conn.begin().await.map_err(db_err)?;

        let select = self
            .scoped_select(bucket)
            .columns([RelayStore::EntryKey, RelayStore::EntryValue])
            .and_where(Expr::col(RelayStore::EntryKey).lte(bound.clone()))
            .order_by(RelayStore::EntryKey, Order::Asc)
            .to_owned();
        let removed = query_all(&tx, &select)
            .await?
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        if !removed.is_empty() {
            let mut delete = Query::delete();
            delete.from_table(RelayStore::Table);
            for cond in self.scope(bucket) {
                delete.and_where(cond);
            }
            delete.and_where(Expr::col(RelayStore::EntryKey).lte(bound));
            exec(&tx, &delete).await?;
        }

        tx.commit().await.map_err(db_err)?;
        if !removed.is_empty() {
            debug!("[sr-01] Removed {} entries from {}", removed.len(), bucket);
        }
        Ok(removed)
    }

    async fn total_size(&self, bucket: Bucket) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let select = self
            .scoped_select(bucket)
            .expr_as(
                Expr::cust("SUM(LENGTH(entry_key) + LENGTH(entry_value))"),
                Alias::new("total"),
            )
            .to_owned();

        let total: Option<i64> = match query_one(&conn, &select).await? {
            Some(row) => row.try_get("", "total").map_err(db_err)?,
            None => None,
        };
        Ok(total.unwrap_or(0).max(0) as u64)
    }

    async fn purge_bucket(&self, bucket: Bucket) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let mut delete = Query::delete();
        delete.from_table(RelayStore::Table);
        for cond in self.scope(bucket) {
            delete.and_where(cond);
        }
        let removed = exec(&conn, &delete).await?;
        debug!("[sr-01] Purged {} rows from {}", removed, bucket);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().await.map_err(db_err)?;
        info!("[sr-01] Relational store closed");
        Ok(())
    }
}
