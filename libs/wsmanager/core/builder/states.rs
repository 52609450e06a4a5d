/// Type-state markers for the builder pattern
///
/// These types track at compile time whether the URL has been set,
/// so `build()` cannot be called on a builder without one.

/// Marker trait for URL state
pub trait UrlState {}

/// URL has not been set
pub struct NoUrl;
impl UrlState for NoUrl {}

/// URL has been set
pub struct HasUrl;
impl UrlState for HasUrl {}
