//! Transaction helpers that make row-level isolation the default path.
//!
//! Every user-scoped read or write goes through [`with_user_scope`]: open a
//! transaction, set the per-connection "current user" config the store's
//! row-level policies key off, run the closure, commit. Admin-mode access
//! uses [`with_admin_scope`], which skips the `SET LOCAL` and relies on a
//! separate pool/role that the declared schema exempts from those policies.
//!
//! Neither helper issues any DDL — the policies themselves are applied out
//! of band when the schema is created (§1, explicitly out of scope here).

use std::future::Future;

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::ErrorKind;
use crate::types::UserId;

/// Two physically separate pools: one that always runs under a row-level
/// policy keyed off the caller's `UserId`, one that bypasses it entirely.
/// Kept as two pools (rather than one pool plus a boolean) so an admin-mode
/// bug can never accidentally reuse a connection still scoped to a user.
#[derive(Clone)]
pub struct Store {
    pub user_scoped: PgPool,
    pub admin: PgPool,
}

impl Store {
    pub async fn connect(cfg: &crate::config::DatabaseConfig) -> crate::error::Result<Self> {
        let user_scoped = PgPool::connect(&cfg.url)
            .await
            .map_err(|e| ErrorKind::Store(e.to_string()))?;
        let admin_url = cfg.admin_url.as_deref().unwrap_or(&cfg.url);
        let admin = PgPool::connect(admin_url)
            .await
            .map_err(|e| ErrorKind::Store(e.to_string()))?;
        Ok(Self { user_scoped, admin })
    }
}

/// Run `f` inside a transaction with `app.current_user_id` set to `user_id`
/// for the lifetime of the transaction, then commit. Any error (from `f` or
/// from the transaction machinery) rolls back implicitly when `tx` is
/// dropped without a commit.
pub async fn with_user_scope<'a, F, Fut, T>(
    pool: &PgPool,
    user_id: UserId,
    f: F,
) -> crate::error::Result<T>
where
    F: FnOnce(Transaction<'a, Postgres>) -> Fut,
    Fut: Future<Output = crate::error::Result<(Transaction<'a, Postgres>, T)>>,
{
    let mut tx = pool.begin().await.map_err(|e| ErrorKind::Store(e.to_string()))?;
    sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| ErrorKind::Store(e.to_string()))?;

    let (tx, value) = f(tx).await?;
    tx.commit().await.map_err(|e| ErrorKind::Store(e.to_string()))?;
    Ok(value)
}

/// Run `f` inside a transaction on the admin pool, which the declared schema
/// exempts from row-level policies. Used only by `labtrace-admin`.
pub async fn with_admin_scope<'a, F, Fut, T>(pool: &PgPool, f: F) -> crate::error::Result<T>
where
    F: FnOnce(Transaction<'a, Postgres>) -> Fut,
    Fut: Future<Output = crate::error::Result<(Transaction<'a, Postgres>, T)>>,
{
    let tx = pool.begin().await.map_err(|e| ErrorKind::Store(e.to_string()))?;
    let (tx, value) = f(tx).await?;
    tx.commit().await.map_err(|e| ErrorKind::Store(e.to_string()))?;
    Ok(value)
}
