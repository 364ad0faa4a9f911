//! Postgres-backed [`store::dao::ResourceDao`] for [`Fossil`] (spec §4.5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_lib::context::RequestContext;
use common_lib::meta::Meta;
use common_lib::pagination::{ListArguments, Paging};
use common_lib::SvcError;
use store::dao::{self, FilterOp, ResourceDao};
use store::Transaction;

use crate::{Fossil, KIND};

const ALLOWED_FIELDS: &[&str] = &[
    "id",
    "discovery_location",
    "estimated_age",
    "fossil_type",
    "excavator_name",
    "created_at",
    "updated_at",
];

type Row = (
    String,
    String,
    Option<i32>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn no_txn() -> SvcError {
    SvcError::general_error("no open transaction for fossils DAO operation")
}

fn row_to_fossil(row: Row) -> Fossil {
    Fossil {
        meta: Meta {
            id: row.0,
            created_at: row.5,
            updated_at: row.6,
        },
        discovery_location: row.1,
        estimated_age: row.2,
        fossil_type: row.3,
        excavator_name: row.4,
    }
}

const SELECT_COLUMNS: &str =
    "id, discovery_location, estimated_age, fossil_type, excavator_name, created_at, updated_at";

pub struct PgFossilDao;

impl PgFossilDao {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PgFossilDao {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceDao<Fossil> for PgFossilDao {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Fossil, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let row: Row = sqlx::query_as(&format!("SELECT {} FROM fossils WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_one(&mut **conn)
            .await
            .map_err(|e| store::error::classify_sqlx_error(KIND, id, e))?;
        Ok(row_to_fossil(row))
    }

    async fn create(&self, ctx: &RequestContext, resource: Fossil) -> Result<Fossil, SvcError> {
        let meta = Meta::new_created(resource.meta.id);
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        sqlx::query(
            r#"
            INSERT INTO fossils (id, discovery_location, estimated_age, fossil_type, excavator_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&meta.id)
        .bind(&resource.discovery_location)
        .bind(resource.estimated_age)
        .bind(&resource.fossil_type)
        .bind(&resource.excavator_name)
        .bind(meta.created_at)
        .bind(meta.updated_at)
        .execute(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, &meta.id, e))?;
        Ok(Fossil {
            meta,
            discovery_location: resource.discovery_location,
            estimated_age: resource.estimated_age,
            fossil_type: resource.fossil_type,
            excavator_name: resource.excavator_name,
        })
    }

    async fn replace(&self, ctx: &RequestContext, resource: Fossil) -> Result<Fossil, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let row: Row = sqlx::query_as(&format!(
            r#"
            UPDATE fossils
            SET discovery_location = $2, estimated_age = $3, fossil_type = $4, excavator_name = $5, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(&resource.meta.id)
        .bind(&resource.discovery_location)
        .bind(resource.estimated_age)
        .bind(&resource.fossil_type)
        .bind(&resource.excavator_name)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, &resource.meta.id, e))?;
        Ok(row_to_fossil(row))
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        sqlx::query("DELETE FROM fossils WHERE id = $1")
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(|e| store::error::classify_sqlx_error(KIND, id, e))?;
        Ok(())
    }

    async fn find_by_ids(&self, ctx: &RequestContext, ids: &[String]) -> Result<Vec<Fossil>, SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;
        let rows: Vec<Row> = sqlx::query_as(&format!(
            "SELECT {} FROM fossils WHERE id = ANY($1)",
            SELECT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, "find_by_ids", e))?;
        Ok(rows.into_iter().map(row_to_fossil).collect())
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        args: &ListArguments,
    ) -> Result<(Vec<Fossil>, Paging), SvcError> {
        let txn = ctx.txn_as::<Transaction>().ok_or_else(no_txn)?;
        let mut guard = txn.lock().await;
        let conn = guard.as_mut().ok_or_else(no_txn)?;

        let order_by = dao::order_by_clause(args.order_by.as_deref(), ALLOWED_FIELDS, "id");

        let (where_clause, bind_value) = match &args.search {
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
                sqlx::query_scalar(&format!("SELECT count(*) FROM fossils {}", where_clause))
                    .bind(v)
                    .fetch_one(&mut **conn)
                    .await
            }
            None => sqlx::query_scalar("SELECT count(*) FROM fossils").fetch_one(&mut **conn).await,
        }
        .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

        let rows: Vec<Row> = match &bind_value {
            Some(v) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM fossils {} {} LIMIT $2 OFFSET $3",
                    SELECT_COLUMNS, where_clause, order_by
                ))
                .bind(v)
                .bind(args.size() as i64)
                .bind(args.offset() as i64)
                .fetch_all(&mut **conn)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM fossils {} LIMIT $1 OFFSET $2",
                    SELECT_COLUMNS, order_by
                ))
                .bind(args.size() as i64)
                .bind(args.offset() as i64)
                .fetch_all(&mut **conn)
                .await
            }
        }
        .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

        Ok((
            rows.into_iter().map(row_to_fossil).collect(),
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
) -> Result<(Vec<Fossil>, Paging), SvcError> {
    let total: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM fossils WHERE {} = ANY($1)", field))
        .bind(values)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

    let rows: Vec<Row> = sqlx::query_as(&format!(
        "SELECT {} FROM fossils WHERE {} = ANY($1) {} LIMIT $2 OFFSET $3",
        SELECT_COLUMNS, field, order_by
    ))
    .bind(values)
    .bind(args.size() as i64)
    .bind(args.offset() as i64)
    .fetch_all(&mut **conn)
    .await
    .map_err(|e| store::error::classify_sqlx_error(KIND, "list", e))?;

    Ok((
        rows.into_iter().map(row_to_fossil).collect(),
        Paging::new(args, total as u64),
    ))
}
