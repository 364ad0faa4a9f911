//! List-endpoint pagination shared by every resource (spec §4.5, §4.6).

use serde::{Deserialize, Serialize};

/// Smallest page size a caller may request.
pub const MIN_PAGE_SIZE: u32 = 1;
/// Largest page size a caller may request; larger requests are clamped down.
pub const MAX_PAGE_SIZE: u32 = 500;
/// Page size used when the caller omits one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Caller-supplied list parameters, already clamped to valid ranges.
#[derive(Debug, Clone, Deserialize)]
pub struct ListArguments {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_size")]
    size: u32,
    pub search: Option<String>,
    pub order_by: Option<String>,
    pub fields: Option<Vec<String>>,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ListArguments {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
            search: None,
            order_by: None,
            fields: None,
        }
    }
}

impl ListArguments {
    /// Builds list arguments from already-unpacked fields (spec §4.11); used
    /// by the gRPC frontend, which has no query-string `Deserialize` to rely
    /// on. `page`/`size` of `0` take the same defaults as an omitted REST
    /// query parameter.
    pub fn new(
        page: u32,
        size: u32,
        search: Option<String>,
        order_by: Option<String>,
        fields: Option<Vec<String>>,
    ) -> Self {
        Self {
            page: if page == 0 { default_page() } else { page },
            size: if size == 0 { default_size() } else { size },
            search,
            order_by,
            fields,
        }
    }

    /// Page number, clamped to at least 1.
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Page size, clamped to `[MIN_PAGE_SIZE, MAX_PAGE_SIZE]`.
    pub fn size(&self) -> u32 {
        self.size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Row offset for the clamped page/size pair.
    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.size() as u64
    }
}

/// Paging metadata echoed back alongside a list response.
#[derive(Debug, Clone, Serialize)]
pub struct Paging {
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

impl Paging {
    pub fn new(args: &ListArguments, total: u64) -> Self {
        Self {
            page: args.page(),
            size: args.size(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_below_one() {
        let args = ListArguments {
            page: 0,
            ..Default::default()
        };
        assert_eq!(args.page(), 1);
    }

    #[test]
    fn clamps_size_to_max() {
        let args = ListArguments {
            size: 10_000,
            ..Default::default()
        };
        assert_eq!(args.size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn clamps_size_to_min() {
        let args = ListArguments {
            size: 0,
            ..Default::default()
        };
        assert_eq!(args.size(), MIN_PAGE_SIZE);
    }

    #[test]
    fn offset_follows_page_and_size() {
        let args = ListArguments {
            page: 3,
            size: 20,
            ..Default::default()
        };
        assert_eq!(args.offset(), 40);
    }
}
