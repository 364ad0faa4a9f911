//! Postgres-backed [`store::dao::ResourceDao`] for [`Dinosaur`] (spec §4.5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_lib::context::RequestContext;
use common_lib::meta::Meta;
use common_lib::pagination::{ListArguments, Paging};
use common_lib::SvcError;
use store::dao::{self, FilterOp, ResourceDao};
use store::Transaction;

use crate::{Dinosaur, KIND};

const ALLOWED_FIELDS: &[&str] = &["id", "species", "created_at", "updated_at"];

fn no_txn() -> SvcError {
    SvcError::general_error("no open transaction for dinosaurs DAO operation")
}

fn row_to_dinosaur(row: (String, String, DateTime<Utc>, DateTime<Utc>)) -> Dinosaur {
    Dinosaur {
        meta: Meta {
            id: row.0,
            created_at: row.2,
            updated_at: row.3,
        },
        species: row.1,
    }
}

pub struct PgDinosaurDao;

impl PgDinosaurDao {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PgDinosaurDao {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceDao<Dinosaur> for PgDinosaurDao {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Dinosaur, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let row: (String, String, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            "SELECT id, species, created_at, updated_at FROM dinosaurs WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, id, e))?;
        Ok(row_to_dinosaur(row))
    }

    async fn create(&self, ctx: &RequestContext, resource: Dinosaur) -> Result<Dinosaur, SvcError> {
        let meta = Meta::new_created(resource.meta.id);
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        sqlx::query(
            "INSERT INTO dinosaurs (id, species, created_at, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&meta.id)
        .bind(&resource.species)
        .bind(meta.created_at)
        .bind(meta.updated_at)
        .execute(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, &meta.id, e))?;
        Ok(Dinosaur {
            meta,
            species: resource.species,
        })
    }

    async fn replace(&self, ctx: &RequestContext, resource: Dinosaur) -> Result<Dinosaur, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let row: (String, String, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            r#"
            UPDATE dinosaurs SET species = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, species, created_at, updated_at
            "#,
        )
        .bind(&resource.meta.id)
        .bind(&resource.species)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, &resource.meta.id, e))?;
        Ok(row_to_dinosaur(row))
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        // Idempotent at the DAO layer (spec §9 Open Question): a nonexistent
        // id is not an error, regardless of affected-row count.
        sqlx::query("DELETE FROM dinosaurs WHERE id = $1")
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(|e| store::error::classify_sqlx_error(KIND, id, e))?;
        Ok(())
    }

    async fn find_by_ids(&self, ctx: &RequestContext, ids: &[String]) -> Result<Vec<Dinosaur>, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let rows: Vec<(String, String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, species, created_at, updated_at FROM dinosaurs WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, "find_by_ids", e))?;
        Ok(rows.into_iter().map(row_to_dinosaur).collect())
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        args: &ListArguments,
    ) -> Result<(Vec<Dinosaur>, Paging), SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;

        let order_by = dao::order_by_clause(args.order_by.as_deref(), ALLOWED_FIELDS, "id");

        let (where_clause, bind_value): (String, Option<String>) = match &args.search {
            Some(search) => {
                let filter = dao::parse_search(search, ALLOWED_FIELDS)?;
                match filter.op {
                    FilterOp::Eq => (
                        format!("WHERE {} = $1", filter.field),
                        filter.values.first().cloned(),
                    ),
                    FilterOp::In => {
                        return list_in_filter(conn, &filter.field, &filter.values, args, &order_by).await;
                    }
                }
            }
            None => (String::new(), None),
        };

        let total: i64 = match &bind_value {
            Some(v) => {
                sqlx::query_scalar(&format!("SELECT count(*) FROM dinosaurs {}", where_clause))
                    .bind(v)
                    .fetch_one(&mut **conn)
                    .await
            }
            None => {
                sqlx::query_scalar("SELECT count(*) FROM dinosaurs").fetch_one(&mut **conn).await
            }
        }
        .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

        let sql = format!(
            "SELECT id, species, created_at, updated_at FROM dinosaurs {} {} LIMIT $2 OFFSET $3",
            where_clause, order_by
        );
        let rows: Vec<(String, String, DateTime<Utc>, DateTime<Utc>)> = match &bind_value {
            Some(v) => {
                sqlx::query_as(&sql)
                    .bind(v)
                    .bind(args.size() as i64)
                    .bind(args.offset() as i64)
                    .fetch_all(&mut **conn)
                    .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT id, species, created_at, updated_at FROM dinosaurs {} LIMIT $1 OFFSET $2",
                    order_by
                ))
                .bind(args.size() as i64)
                .bind(args.offset() as i64)
                .fetch_all(&mut **conn)
                .await
            }
        }
        .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

        Ok((
            rows.into_iter().map(row_to_dinosaur).collect(),
            Paging::new(args, total as u64),
        ))
    }
}

async fn list_in_filter(
    conn: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    field: &str,
    values: &[String],
    args: &ListArguments,
    order_by: &str,
) -> Result<(Vec<Dinosaur>, Paging), SvcError> {
    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT count(*) FROM dinosaurs WHERE {} = ANY($1)",
        field
    ))
    .bind(values)
    .fetch_one(&mut **conn)
    .await
    .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

    let sql = format!(
        "SELECT id, species, created_at, updated_at FROM dinosaurs WHERE {} = ANY($1) {} LIMIT $2 OFFSET $3",
        field, order_by
    );
    let rows: Vec<(String, String, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(&sql)
        .bind(values)
        .bind(args.size() as i64)
        .bind(args.offset() as i64)
        .fetch_all(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

    Ok((
        rows.into_iter().map(row_to_dinosaur).collect(),
        Paging::new(args, total as u64),
    ))
}
