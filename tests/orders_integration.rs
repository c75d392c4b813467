mod common;

use common::{spawn_app, TestApp};
use serde_json::{json, Value};

async fn create_product(app: &TestApp, token: &str, name: &str, price_cents: i64) -> String {
    let response = app
        .client
        .post(app.url("/admin/products"))
        .bearer_auth(token)
        .json(&json!({ "name": name, "price_cents": price_cents }))
        .send()
        .await
        .unwrap();
    assert_eq!(201, response.status().as_u16());
    let product: Value = response.json().await.unwrap();
    product["id"].as_str().unwrap().to_string()
}

async fn place_order(app: &TestApp, token: &str, items: Value) -> reqwest::Response {
    app.client
        .post(app.url("/orders"))
        .bearer_auth(token)
        .json(&json!({ "items": items }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn orders_require_authentication() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/orders")).send().await.unwrap();
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn placing_an_order_snapshots_unit_prices() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let cable = create_product(&app, &admin, "Cable", 500).await;
    let charger = create_product(&app, &admin, "Charger", 2_500).await;

    let pair = app.signed_in_user("buyer@x.com").await;
    let token = pair["access_token"].as_str().unwrap();

    let response = place_order(
        &app,
        token,
        json!([
            { "product_id": cable, "quantity": 3 },
            { "product_id": charger, "quantity": 1 }
        ]),
    )
    .await;
    assert_eq!(201, response.status().as_u16());
    let order: Value = response.json().await.unwrap();
    assert_eq!(order["total_cents"], 4_000);
    assert_eq!(order["items"][0]["unit_price_cents"], 500);

    let response = app
        .client
        .put(app.url(&format!("/admin/products/{}", cable)))
        .bearer_auth(&admin)
        .json(&json!({ "price_cents": 700 }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = app
        .client
        .get(app.url("/orders"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let orders: Value = response.json().await.unwrap();
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["items"][0]["unit_price_cents"], 500);
    assert_eq!(orders[0]["total_cents"], 4_000);
}

#[tokio::test]
async fn invalid_orders_are_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let cable = create_product(&app, &admin, "Cable", 500).await;
    let pair = app.signed_in_user("buyer@x.com").await;
    let token = pair["access_token"].as_str().unwrap();

    let response = place_order(&app, token, json!([])).await;
    assert_eq!(400, response.status().as_u16());

    let response = place_order(&app, token, json!([{ "product_id": cable, "quantity": 0 }])).await;
    assert_eq!(400, response.status().as_u16());

    let response = place_order(
        &app,
        token,
        json!([{ "product_id": cable, "quantity": 4_611_686_018_427_387_903_i64 }]),
    )
    .await;
    assert_eq!(400, response.status().as_u16());

    let response = place_order(
        &app,
        token,
        json!([{ "product_id": uuid::Uuid::new_v4(), "quantity": 1 }]),
    )
    .await;
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn users_cannot_read_each_others_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let cable = create_product(&app, &admin, "Cable", 500).await;

    let owner = app.signed_in_user("owner@x.com").await;
    let other = app.signed_in_user("other@x.com").await;

    let order: Value = place_order(
        &app,
        owner["access_token"].as_str().unwrap(),
        json!([{ "product_id": cable, "quantity": 1 }]),
    )
    .await
    .json()
    .await
    .unwrap();
    let path = format!("/orders/{}", order["id"].as_str().unwrap());

    let response = app
        .client
        .get(app.url(&path))
        .bearer_auth(other["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());

    let response = app
        .client
        .get(app.url(&path))
        .bearer_auth(owner["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
}
