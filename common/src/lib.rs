pub mod context;
pub mod error;
pub mod id;
pub mod meta;
pub mod pagination;

pub use context::RequestContext;
pub use error::{ErrorKind, SvcError};
pub use meta::Meta;

/// Helper to convert from `Vec<F>` into `Vec<T>`.
pub trait IntoVec<T>: Sized {
    /// Performs the conversion.
    fn into_vec(self) -> Vec<T>;
}

impl<F: Into<T>, T> IntoVec<T> for Vec<F> {
    fn into_vec(self) -> Vec<T> {
        self.into_iter().map(Into::into).collect()
    }
}

/// Maximum length accepted for any plain string field on a resource payload.
pub const MAX_STRING_FIELD_LEN: usize = 255;
