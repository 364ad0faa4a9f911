//! Query-string shape for `GET /<kinds>` (spec §6): `page`, `size`, `search`
//! (filter DSL), `orderBy`, `fields` (comma-separated response projection
//! whitelist, applied by [`project_fields`] to each presenter's serialized
//! form). `meta` fields (`kind`, `id`, `href`) always survive projection.

use common_lib::pagination::ListArguments;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub search: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
    pub fields: Option<String>,
}

impl From<ListQuery> for ListArguments {
    fn from(q: ListQuery) -> Self {
        let fields = q.fields.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        ListArguments::new(q.page.unwrap_or(0), q.size.unwrap_or(0), q.search, q.order_by, fields)
    }
}

/// Narrows a presenter's serialized object down to `fields`, always keeping
/// `kind`/`id`/`href`. Absent or empty `fields` leaves the object untouched.
pub fn project_fields<T: Serialize>(presenter: &T, fields: Option<&[String]>) -> Value {
    let value = serde_json::to_value(presenter).expect("presenter types are always serializable");
    let Some(fields) = fields else {
        return value;
    };
    if fields.is_empty() {
        return value;
    }
    let Value::Object(map) = value else {
        return value;
    };
    let kept: Map<String, Value> = map
        .into_iter()
        .filter(|(k, _)| k == "kind" || k == "id" || k == "href" || fields.iter().any(|f| f == k))
        .collect();
    Value::Object(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        kind: &'static str,
        id: String,
        href: String,
        species: String,
        notes: String,
    }

    fn sample() -> Sample {
        Sample {
            kind: "Dinosaur",
            id: "abc".to_string(),
            href: "/dinosaurs/abc".to_string(),
            species: "Trex".to_string(),
            notes: "big".to_string(),
        }
    }

    #[test]
    fn no_fields_keeps_everything() {
        let value = project_fields(&sample(), None);
        assert!(value.get("notes").is_some());
    }

    #[test]
    fn fields_narrows_to_whitelist_plus_meta() {
        let fields = vec!["species".to_string()];
        let value = project_fields(&sample(), Some(&fields));
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("kind"));
        assert!(obj.contains_key("id"));
        assert!(obj.contains_key("href"));
        assert!(obj.contains_key("species"));
        assert!(!obj.contains_key("notes"));
    }
}
