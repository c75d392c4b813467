/// Product catalog
///
/// Categories and the products filed under them.

pub mod categories;
pub mod products;

use serde::Serialize;

pub use categories::Category;
pub use products::{Product, ProductChanges, ProductFilter, ProductSort};

/// One page of a paginated listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub items: Vec<T>,
}
