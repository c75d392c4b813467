pub mod auth;
pub mod catalog;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod orders;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod users;
pub mod validators;
