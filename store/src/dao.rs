//! The generic per-kind persistence contract (spec §4.5) plus the small
//! pieces every concrete DAO needs to implement `list` safely: an allow-list
//! aware `ORDER BY` builder and a minimal search-filter parser for the
//! `search` query parameter's filter DSL (`id in ('a','b')`, `field = 'x'`).

use async_trait::async_trait;
use common_lib::pagination::{ListArguments, Paging};
use common_lib::{RequestContext, SvcError};

/// Persistence primitives a resource kind must implement over its own table.
#[async_trait]
pub trait ResourceDao<T>: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn get(&self, ctx: &RequestContext, id: &str) -> Result<T, SvcError>;

    /// Sets `id` if empty.
    async fn create(&self, ctx: &RequestContext, resource: T) -> Result<T, SvcError>;

    /// Full-object overwrite; `updated_at` is refreshed by the store.
    async fn replace(&self, ctx: &RequestContext, resource: T) -> Result<T, SvcError>;

    /// Idempotent: deleting a nonexistent id is not an error.
    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), SvcError>;

    async fn find_by_ids(&self, ctx: &RequestContext, ids: &[String]) -> Result<Vec<T>, SvcError>;

    async fn list(
        &self,
        ctx: &RequestContext,
        args: &ListArguments,
    ) -> Result<(Vec<T>, Paging), SvcError>;
}

/// A single `field op values` predicate parsed from the `search` DSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub field: String,
    pub op: FilterOp,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    In,
}

/// Parses one `field = 'value'` or `field in ('a', 'b', ...)` predicate.
/// Rejects any field not present in `allowed_fields` with `ValidationError`.
pub fn parse_search(search: &str, allowed_fields: &[&str]) -> Result<SearchFilter, SvcError> {
    let search = search.trim();
    let lower = search.to_ascii_lowercase();

    let (field, op, rest) = if let Some(idx) = lower.find(" in ") {
        (search[..idx].trim(), FilterOp::In, search[idx + 4..].trim())
    } else if let Some(idx) = search.find('=') {
        (search[..idx].trim(), FilterOp::Eq, search[idx + 1..].trim())
    } else {
        return Err(SvcError::validation(format!(
            "unsupported search expression: '{}'",
            search
        )));
    };

    if !allowed_fields.contains(&field) {
        return Err(SvcError::validation(format!(
            "search field '{}' is not filterable",
            field
        )));
    }

    let values = match op {
        FilterOp::Eq => vec![unquote(rest)?],
        FilterOp::In => {
            let inner = rest
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| {
                    SvcError::validation(format!("malformed 'in' expression: '{}'", search))
                })?;
            inner
                .split(',')
                .map(|v| unquote(v.trim()))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(SearchFilter {
        field: field.to_string(),
        op,
        values,
    })
}

fn unquote(value: &str) -> Result<String, SvcError> {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        Ok(value[1..value.len() - 1].to_string())
    } else {
        Err(SvcError::validation(format!(
            "expected a quoted string literal, got '{}'",
            value
        )))
    }
}

/// Builds a safe `ORDER BY <col> ASC` clause. Falls back to `default_field`
/// when `order_by` is absent or not in `allowed_fields`.
pub fn order_by_clause(order_by: Option<&str>, allowed_fields: &[&str], default_field: &str) -> String {
    let field = order_by
        .filter(|f| allowed_fields.contains(f))
        .unwrap_or(default_field);
    format!("ORDER BY {} ASC", field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_eq_filter() {
        let filter = parse_search("species = 'Trex'", &["species", "id"]).unwrap();
        assert_eq!(filter.field, "species");
        assert_eq!(filter.op, FilterOp::Eq);
        assert_eq!(filter.values, vec!["Trex".to_string()]);
    }

    #[test]
    fn parses_in_filter() {
        let filter = parse_search("id in ('a', 'b')", &["id"]).unwrap();
        assert_eq!(filter.op, FilterOp::In);
        assert_eq!(filter.values, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_unknown_field() {
        let err = parse_search("secret = 'x'", &["id"]).unwrap_err();
        assert_eq!(err.kind(), common_lib::ErrorKind::ValidationError);
    }

    #[test]
    fn order_by_falls_back_to_default() {
        assert_eq!(
            order_by_clause(Some("nope"), &["id"], "id"),
            "ORDER BY id ASC"
        );
        assert_eq!(
            order_by_clause(Some("id"), &["id"], "created_at"),
            "ORDER BY id ASC"
        );
        assert_eq!(order_by_clause(None, &["id"], "id"), "ORDER BY id ASC");
    }
}
