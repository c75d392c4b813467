mod auth;
mod catalog;
mod health_check;
mod orders;

pub use auth::{get_current_user, login, logout, logout_all, refresh, register};
pub use catalog::{
    add_category, create_product, delete_product, get_product, list_categories, list_products,
    update_product,
};
pub use health_check::health_check;
pub use orders::{get_order, list_orders, place_order};
