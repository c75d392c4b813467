use std::net::TcpListener;
use std::str::FromStr;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::auth::TokenIssuer;
use crate::configuration::DatabaseSettings;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    add_category, create_product, delete_product, get_current_user, get_order, get_product,
    health_check, list_categories, list_orders, list_products, login, logout, logout_all,
    place_order, refresh, register, update_product,
};

/// Open the connection pool described by `settings`.
///
/// An in-memory database lives only as long as its connection, so it is
/// pinned to a single connection that is never recycled.
pub async fn get_connection_pool(settings: &DatabaseSettings) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&settings.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if settings.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(settings.max_connections)
    };

    pool_options.connect_with(options).await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn run(
    listener: TcpListener,
    connection: SqlitePool,
    issuer: TokenIssuer,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let issuer = web::Data::new(issuer);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(connection.clone())
            .app_data(issuer.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/token", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            .route("/categories", web::get().to(list_categories))
            .route("/products", web::get().to(list_products))
            .route("/products/{product_id}", web::get().to(get_product))
            // Authenticated routes
            .service(
                web::scope("/auth/me")
                    .wrap(JwtMiddleware::new(issuer.clone()))
                    .route("", web::get().to(get_current_user)),
            )
            .service(
                web::scope("/auth/logout-all")
                    .wrap(JwtMiddleware::new(issuer.clone()))
                    .route("", web::post().to(logout_all)),
            )
            .service(
                web::scope("/orders")
                    .wrap(JwtMiddleware::new(issuer.clone()))
                    .route("", web::post().to(place_order))
                    .route("", web::get().to(list_orders))
                    .route("/{order_id}", web::get().to(get_order)),
            )
            // Admin routes; handlers check the role claim
            .service(
                web::scope("/admin")
                    .wrap(JwtMiddleware::new(issuer.clone()))
                    .route("/categories", web::post().to(add_category))
                    .route("/products", web::post().to(create_product))
                    .route("/products/{product_id}", web::put().to(update_product))
                    .route("/products/{product_id}", web::delete().to(delete_product)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let pool = get_connection_pool(&settings)
        .await
        .expect("Failed to open in-memory database");
    run_migrations(&pool).await.expect("Failed to migrate database");
    pool
}

/// File-backed pool with several connections, for tests that need real
/// concurrent writers. The database lives inside `dir`.
#[cfg(test)]
pub(crate) async fn file_test_pool(dir: &std::path::Path) -> SqlitePool {
    let settings = DatabaseSettings {
        url: format!("sqlite://{}", dir.join("shoply.db").display()),
        max_connections: 5,
    };
    let pool = get_connection_pool(&settings)
        .await
        .expect("Failed to open file database");
    run_migrations(&pool).await.expect("Failed to migrate database");
    pool
}
