mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{address, TestApp};
use serde_json::json;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-bytes";

async fn seeded_app() -> TestApp {
    let app = TestApp::new().await;
    let (status, body) = app.post("/api/v1/categories/seed", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    app
}

#[tokio::test]
async fn health_endpoints_report_up() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alive"], true);

    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/health/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "luxus-brecho-api");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/api/v1/products/999")
        .header("x-request-id", "req-luxus-1")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["request_id"], "req-luxus-1");
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn category_and_product_crud_over_http() {
    let app = TestApp::new().await;

    let (status, category) = app
        .post(
            "/api/v1/categories",
            json!({ "nome": "Casual", "descricao": "Everyday wear" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{category}");
    assert_eq!(category["name"], "Casual");
    assert_eq!(category["active"], true);

    let (status, product) = app
        .post(
            "/api/v1/products",
            json!({
                "titulo": "T-Shirt",
                "descricao": "Plain cotton tee size M",
                "preco": 29.90,
                "categoria": "Casual",
                "imagem": "http://x/img.jpg",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    assert_eq!(product["id"], 1);
    assert_eq!(product["status"], "disponivel");
    assert_eq!(product["preco"], 29.9);

    let (status, listed) = app.get("/api/v1/products?status=disponivel&page=1&page_size=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["pagination"]["total"], 1);
    assert_eq!(listed["pagination"]["page_size"], 5);
    assert_eq!(listed["items"][0]["titulo"], "T-Shirt");

    let (status, updated) = app
        .put("/api/v1/products/1", json!({ "preco": "35,00" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["preco"], 35.0);

    let (status, categories) = app.get("/api/v1/categories?active=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories["items"].as_array().unwrap().len(), 1);

    let (status, _) = app.delete("/api/v1/categories/1").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.delete("/api/v1/products/1").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get("/api/v1/products/category/Casual").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_errors_list_every_field() {
    let app = seeded_app().await;
    let (status, body) = app
        .post("/api/v1/products", json!({ "titulo": "", "preco": "caro" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    for field in ["titulo", "descricao", "preco", "categoria", "imagem"] {
        assert!(errors.contains_key(field), "missing {field}: {body}");
    }
}

#[tokio::test]
async fn product_with_image_is_served_back() {
    let app = seeded_app().await;

    let (status, product) = app
        .multipart(
            Method::POST,
            "/api/v1/products/with-image",
            &[
                ("titulo", "Vestido Midi"),
                ("descricao", "Vestido midi estampado"),
                ("preco", "79.90"),
                ("categoria", "Social"),
            ],
            &[("imagem", "vestido.png", PNG_BYTES)],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    let url = product["imagem"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/products/misc/"), "{url}");
    assert!(url.ends_with(".png"));

    let (status, _) = app.get(&url).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .multipart(
            Method::POST,
            "/api/v1/products/with-image",
            &[("titulo", "Sem categoria")],
            &[("imagem", "x.png", PNG_BYTES)],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let stored = std::fs::read_dir(app.images.root().join("products/misc"))
        .unwrap()
        .count();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn image_endpoints_upload_and_delete() {
    let app = TestApp::new().await;

    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/v1/images/upload",
            &[("product_id", "12")],
            &[("file", "foto.JPG", PNG_BYTES)],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/products/12/"));

    let (status, _) = app
        .multipart(
            Method::POST,
            "/api/v1/images/upload",
            &[],
            &[("file", "script.exe", PNG_BYTES)],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/v1/images/upload-multiple",
            &[],
            &[("a", "a.png", PNG_BYTES), ("b", "b.webp", PNG_BYTES)],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["urls"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .request(Method::DELETE, "/api/v1/images", Some(json!({ "url": url })), &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (_, body) = app
        .request(
            Method::DELETE,
            "/api/v1/images",
            Some(json!({ "url": "/uploads/../Cargo.toml" })),
            &[],
        )
        .await;
    assert_eq!(body["deleted"], false);
}

#[tokio::test]
async fn product_images_can_be_listed_and_inspected() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/v1/images/product/21").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["images"], json!([]));

    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/v1/images/upload",
            &[("product_id", "21")],
            &[("file", "frente.png", PNG_BYTES)],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let url = body["url"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/v1/images/product/21").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product_id"], 21);
    assert_eq!(body["total"], 1);
    assert_eq!(body["images"][0], url.as_str());

    let (status, body) = app
        .post("/api/v1/images/info", json!({ "image_url": url }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["size"], PNG_BYTES.len());
    assert_eq!(body["content_type"], "image/png");

    let (status, _) = app
        .post("/api/v1/images/info", json!({ "image_url": "ftp://fora/x.png" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/v1/images/info",
            json!({ "image_url": "/uploads/products/21/nada.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn account_lifecycle_over_http() {
    let app = TestApp::new().await;

    let (status, user) = app
        .post(
            "/api/v1/users",
            json!({ "nome": "Lúcia", "email": "lucia@example.com", "senha": "lucia123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");
    assert!(user.get("senha_hash").is_none());
    assert!(user.get("token_confirmacao").is_none());
    assert_eq!(user["tipo"], "Cliente");

    let login = json!({ "email": "lucia@example.com", "password": "lucia123" });
    let (status, _) = app.post("/api/v1/users/auth", login.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.emails.last_confirmation_token("lucia@example.com").unwrap();
    let (status, confirmed) = app
        .get(&format!("/api/v1/users/confirm-email/{token}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["ativo"], true);

    let (status, session) = app.post("/api/v1/users/auth", login).await;
    assert_eq!(status, StatusCode::OK, "{session}");
    assert_eq!(session["token_type"], "Bearer");
    assert!(session["access_token"].as_str().is_some());
    assert_eq!(session["user"]["email"], "lucia@example.com");

    let id = user["id"].as_i64().unwrap();
    let (status, _) = app
        .put(
            &format!("/api/v1/users/{id}/change-password"),
            json!({ "senha_atual": "lucia123", "nova_senha": "nova4567" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/api/v1/users/forgot-password", json!({ "email": "ninguem@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, types) = app.get("/api/v1/users/types").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(types, json!(["Administrador", "Cliente"]));

    let (status, summary) = app.get("/api/v1/users/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["clientes"], 1);
}

#[tokio::test]
async fn checkout_over_http() {
    let app = seeded_app().await;
    let product_id = app.create_product("Camisa Polo", 29.9, "Casual").await;

    let (status, cart) = app
        .post("/api/v1/cart/5/add", json!({ "product_id": product_id }))
        .await;
    assert_eq!(status, StatusCode::OK, "{cart}");
    assert_eq!(cart["total_items"], 1);

    let (status, placement) = app
        .post("/api/v1/orders/user/5", json!({ "endereco": address() }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{placement}");
    assert_eq!(placement["order"]["total"], 29.9);
    assert_eq!(placement["order"]["status"], "confirmado");
    assert_eq!(placement["order"]["endereco"]["cep"], "01001000");
    assert_eq!(placement["order"]["items"][0]["product_id"], product_id);
    assert_eq!(placement["dropped_items"], json!([]));

    let (_, cart) = app.get("/api/v1/cart/5").await;
    assert_eq!(cart["items"], json!([]));

    let (_, product) = app.get(&format!("/api/v1/products/{product_id}")).await;
    assert_eq!(product["status"], "vendido");

    let order_id = placement["order"]["id"].as_i64().unwrap();
    let (status, order) = app
        .put(
            &format!("/api/v1/orders/{order_id}/status"),
            json!({ "status": "enviado" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "enviado");

    let (status, _) = app
        .post(&format!("/api/v1/orders/{order_id}/cancel"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, again) = app
        .post(
            "/api/v1/orders/user/6",
            json!({ "items": [{ "product_id": product_id }], "endereco": address() }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{again}");

    let (status, orders) = app.get("/api/v1/orders/user/5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders["pagination"]["total"], 1);
}

#[tokio::test]
async fn favorites_require_the_caller_header() {
    let app = seeded_app().await;
    let product_id = app.create_product("Blusa Seda", 60.0, "Social").await;

    let (status, _) = app.get("/api/v1/favorites").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/api/v1/favorites", None, &[("x-user-id", "abc")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .as_user(3, Method::POST, "/api/v1/favorites", Some(json!({ "product_id": product_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .as_user(3, Method::POST, "/api/v1/favorites", Some(json!({ "product_id": product_id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, check) = app
        .as_user(3, Method::GET, &format!("/api/v1/favorites/check/{product_id}"), None)
        .await;
    assert_eq!(check["favorito"], true);

    let (_, count) = app
        .as_user(3, Method::GET, &format!("/api/v1/favorites/count/{product_id}"), None)
        .await;
    assert_eq!(count["total"], 1);

    let (status, toggled) = app
        .as_user(3, Method::POST, "/api/v1/favorites/toggle", Some(json!({ "product_id": product_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["favorito"], false);

    let (status, _) = app
        .as_user(3, Method::DELETE, &format!("/api/v1/favorites/{product_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
