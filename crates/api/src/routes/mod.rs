//! Route handlers

pub mod datasets;
pub mod models;
pub mod predictions;

/// Default page size for listings
pub(crate) fn default_limit() -> usize {
    50
}

/// Largest page a listing returns
pub(crate) const MAX_LIMIT: usize = 500;
