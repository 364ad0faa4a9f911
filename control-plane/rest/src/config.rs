//! Per-process REST wiring state shared by every kind's route module.

/// Versioned base path prepended to every `href` in a response body
/// (spec §6: `/api/<service>/v1`).
#[derive(Clone)]
pub struct RestConfig {
    pub base_path: String,
}

impl RestConfig {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn href(&self, kinds: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_path, kinds, id)
    }
}
