use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{
    app,
    config::Config,
    db::seed,
    services::advisor::StaticAdvisor,
    store::{EntityStore, InMemoryStore},
    AppState,
};

fn test_app_with(config: Config) -> Router {
    let store: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new(seed::demo()));
    app(AppState::new(config, store, Arc::new(StaticAdvisor::new())))
}

fn test_app() -> Router {
    test_app_with(Config::default())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn login(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_matches_name_and_opens_farmer_session() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "  fatou DIOP " })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], "user2");
    assert_eq!(body["session"]["activeRole"], "farmer");
    assert_eq!(body["session"]["activeProject"]["id"], "proj3");
    assert_eq!(body["session"]["activeView"], "dashboard");
}

#[tokio::test]
async fn unknown_name_falls_back_to_first_user_in_demo_mode() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "nobody" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], "user1");
}

#[tokio::test]
async fn unknown_name_is_rejected_without_demo_mode() {
    let app = test_app_with(Config {
        demo_login: false,
        ..Config::default()
    });
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "nobody" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn protected_routes_require_a_live_token() {
    let app = test_app();

    let (status, _) = send(&app, Method::GET, "/api/listings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/listings", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app, "Adama Gueye").await;
    let (status, body) = send(&app, Method::GET, "/api/listings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["listings"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn current_user_is_resolved_from_the_token() {
    let app = test_app();
    let token = login(&app, "awa ndiaye").await;

    let (status, me) = send(&app, Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], "user4");
    assert_eq!(me["name"], "Awa Ndiaye");
    assert_eq!(me["roles"], json!(["seller"]));
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = test_app();
    let token = login(&app, "Moussa Sow").await;

    let (status, session) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["currentUser"], Value::Null);

    let (status, _) = send(&app, Method::GET, "/api/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_project_shows_up_for_owner_and_open_sessions() {
    let app = test_app();
    let token = login(&app, "Fatou Diop").await;

    let (status, project) = send(
        &app,
        Method::POST,
        "/api/projects",
        Some(&token),
        Some(json!({ "name": "Louga Millet", "location": "Louga, Senegal", "farmSize": 45 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["name"], "Louga Millet");
    assert_eq!(project["crops"], json!([]));

    let (_, body) = send(&app, Method::GET, "/api/projects", Some(&token), None).await;
    let projects = body["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[1]["id"], project["id"]);

    let (_, session) = send(&app, Method::GET, "/api/session", Some(&token), None).await;
    assert_eq!(
        session["currentUser"]["projects"].as_array().unwrap().len(),
        2
    );
    assert_eq!(session["activeProject"]["id"], "proj3");
}

#[tokio::test]
async fn invalid_project_is_a_validation_error() {
    let app = test_app();
    let token = login(&app, "Fatou Diop").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/projects",
        Some(&token),
        Some(json!({ "name": "Empty", "location": "Louga", "farmSize": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn crop_moves_forward_to_harvest_then_can_be_listed() {
    let app = test_app();
    let token = login(&app, "Moussa Sow").await;

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/projects/proj4/listable-crops",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // crop7 is still Planting
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/listings",
        Some(&token),
        Some(json!({ "projectId": "proj4", "cropId": "crop7", "quantity": 10, "pricePerTon": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    for expected in ["Growing", "Harvesting", "Harvested"] {
        let (status, crop) = send(
            &app,
            Method::POST,
            "/api/projects/proj4/crops/crop7/advance",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(crop["status"], expected);
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/projects/proj4/crops/crop7/advance",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listing) = send(
        &app,
        Method::POST,
        "/api/listings",
        Some(&token),
        Some(json!({ "projectId": "proj4", "cropId": "crop7", "quantity": 70, "pricePerTon": 500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["status"], "Listed");
    assert_eq!(listing["cropType"], "Cotton");
    assert_eq!(listing["farmer"]["id"], "user3");
}

#[tokio::test]
async fn second_purchase_of_a_listing_conflicts() {
    let app = test_app();
    let awa = login(&app, "Awa Ndiaye").await;
    let moussa = login(&app, "Moussa Sow").await;

    let (status, sold) = send(
        &app,
        Method::POST,
        "/api/listings/harvest4/purchase",
        Some(&awa),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sold["status"], "Sold");
    assert_eq!(sold["buyer"]["id"], "user4");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/listings/harvest4/purchase",
        Some(&moussa),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "not_available");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/listings/harvest99/purchase",
        Some(&moussa),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn sellers_cannot_buy_their_own_harvest() {
    let app = test_app();
    let token = login(&app, "Adama Gueye").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/listings/harvest2/purchase",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn farmers_without_seller_role_cannot_buy() {
    let app = test_app();
    let token = login(&app, "Fatou Diop").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/listings/harvest2/purchase",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn farmer_dashboard_reflects_sales_of_active_project() {
    let app = test_app();
    let adama = login(&app, "Adama Gueye").await;

    let (status, dashboard) = send(&app, Method::GET, "/api/dashboard", Some(&adama), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["role"], "farmer");
    assert_eq!(dashboard["projectId"], "proj1");
    assert_eq!(dashboard["financials"]["totalRevenue"], 7200.0);
    assert_eq!(dashboard["financials"]["totalInvestment"], 1700.0);
    assert_eq!(dashboard["financials"]["netProfit"], 5500.0);

    let awa = login(&app, "Awa Ndiaye").await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/listings/harvest2/purchase",
        Some(&awa),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, dashboard) = send(&app, Method::GET, "/api/dashboard", Some(&adama), None).await;
    assert_eq!(dashboard["financials"]["totalRevenue"], 18600.0);
}

#[tokio::test]
async fn switching_to_seller_clears_project_and_changes_dashboard() {
    let app = test_app();
    let token = login(&app, "Adama Gueye").await;

    let (status, session) = send(
        &app,
        Method::POST,
        "/api/session/role",
        Some(&token),
        Some(json!({ "role": "seller" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["activeRole"], "seller");
    assert_eq!(session["activeProject"], Value::Null);

    let (_, dashboard) = send(&app, Method::GET, "/api/dashboard", Some(&token), None).await;
    assert_eq!(dashboard["role"], "seller");
    assert_eq!(dashboard["financials"]["totalRevenue"], 28100.0);
    assert_eq!(dashboard["purchases"]["count"], 1);
    assert_eq!(dashboard["market"]["listedCount"], 2);
}

#[tokio::test]
async fn recommendation_defaults_to_active_project_location() {
    let app = test_app();
    let token = login(&app, "Adama Gueye").await;

    let (status, body) = send(&app, Method::GET, "/api/recommendation", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "Kaolack, Senegal");
    assert!(body["text"].as_str().unwrap().contains("Kaolack"));

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/recommendation?location=Dakar",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["text"].as_str().unwrap().contains("Dakar"));
}

#[tokio::test]
async fn recommendation_needs_a_location_for_sellers() {
    let app = test_app();
    let token = login(&app, "Awa Ndiaye").await;

    let (status, body) = send(&app, Method::GET, "/api/recommendation", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}
