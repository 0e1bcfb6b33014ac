use super::*;
use axum::http::{Method, StatusCode};
use serde_json::json;

fn titles(items: &serde_json::Value) -> Vec<String> {
    items
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p["title"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn subscribe_body(contact: &str, method: &str) -> serde_json::Value {
    json!({
        "product": {"title": "Running Shoes", "url": "https://www.amazon.in/dp/RS1", "site": "amazon"},
        "keyword": "shoes",
        "discount": "40%",
        "method": method,
        "contact": contact,
    })
}

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    let (status, body) = make_request(&app, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sources"], json!(["amazon", "flipkart", "nykaa"]));

    let (status, _) = make_request(&app, Method::GET, "/api/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_scrape_returns_all_sections() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    let (status, body) = make_request(&app, Method::POST, "/api/scrape", Some(json!({"keyword": "shoes"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["keyword"], "shoes");
    assert_eq!(body["count_all"], 4);
    // The keyword is the title query: Amazon's "Office Chair" is left out.
    assert_eq!(titles(&body["items"]), vec!["Running Shoes", "Trail Shoes", "Matte Lipstick"]);
    assert_eq!(
        titles(&body["top_deals"]),
        vec!["Running Shoes", "Matte Lipstick", "Trail Shoes", "Office Chair"]
    );
    assert_eq!(titles(&body["trending"]).len(), 4);
    assert!(titles(&body["most_viewed"]).is_empty());
    assert_eq!(body["site_errors"], json!({}));

    let first = &body["items"][0];
    assert_eq!(first["site"], "amazon");
    assert_eq!(first["price"], 999.0);
    assert_eq!(first["price_text"], "999");
    assert_eq!(first["original_price_text"], "1,999");
    assert_eq!(first["discount_percent"], 50);

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 3);
    assert!(sources.iter().all(|s| s["status"] == "ok"));
    Ok(())
}

#[tokio::test]
async fn test_scrape_applies_filters() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    // Amazon titles must contain the query; the other stores bypass it.
    let (status, body) = make_request(
        &app,
        Method::POST,
        "/scrape",
        Some(json!({
            "keyword": "shoes",
            "query": "SHOES",
            "discount": "30%",
            "view_counts": {"https://www.nykaa.com/p/ML1": 3, "https://www.amazon.in/dp/OC1": 9},
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count_all"], 4);
    assert_eq!(titles(&body["items"]), vec!["Running Shoes", "Matte Lipstick"]);
    assert_eq!(titles(&body["most_viewed"]), vec!["Office Chair", "Matte Lipstick"]);

    let (_, body) = make_request(
        &app,
        Method::POST,
        "/scrape",
        Some(json!({
            "keyword": "shoes",
            "site": "flipkart",
        })),
    )
    .await?;
    assert_eq!(titles(&body["items"]), vec!["Trail Shoes"]);

    let (_, body) = make_request(
        &app,
        Method::POST,
        "/scrape",
        Some(json!({
            "keyword": "shoes",
            "saved_only": true,
            "saved_urls": ["https://www.nykaa.com/p/ML1"],
        })),
    )
    .await?;
    assert_eq!(titles(&body["items"]), vec!["Matte Lipstick"]);
    // Ranked sections cover every result, saved or not.
    assert_eq!(
        titles(&body["top_deals"]),
        vec!["Running Shoes", "Matte Lipstick", "Trail Shoes", "Office Chair"]
    );
    assert_eq!(titles(&body["trending"])[0], "Running Shoes");
    Ok(())
}

#[tokio::test]
async fn test_scrape_keyword_filters_strict_titles() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    let (_, body) = make_request(&app, Method::POST, "/scrape", Some(json!({"keyword": "shoes"}))).await?;
    assert!(!titles(&body["items"]).iter().any(|t| t == "Office Chair"));

    // An explicit query replaces the keyword.
    let (_, body) = make_request(
        &app,
        Method::POST,
        "/scrape",
        Some(json!({"keyword": "shoes", "query": "chair"})),
    )
    .await?;
    assert_eq!(titles(&body["items"]), vec!["Office Chair", "Trail Shoes", "Matte Lipstick"]);
    Ok(())
}

#[tokio::test]
async fn test_scrape_rejects_bad_input() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    let (status, body) = make_request(&app, Method::POST, "/scrape", Some(json!({"keyword": "  "}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Keyword is required");

    let (status, body) = make_request(&app, Method::POST, "/scrape", Some(json!({"keyword": 5}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/scrape",
        Some(json!({"keyword": "shoes", "max_products": 500})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/scrape",
        Some(json!({"keyword": "shoes", "discount": "lots"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_scrape_all_sources_failing() -> anyhow::Result<()> {
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(FailingSource(Site::Amazon)),
        Arc::new(FailingSource(Site::Flipkart)),
    ];
    let app = create_test_app(sources, get_test_config(), AlertRegistry::in_memory().await?)
        .await?
        .router();

    let (status, body) = make_request(&app, Method::POST, "/scrape", Some(json!({"keyword": "shoes"}))).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "ALL_SOURCES_FAILED");
    Ok(())
}

#[tokio::test]
async fn test_subscribe_list_and_delete() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/api/subscribe",
        Some(subscribe_body("me@example.com", "Email")),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let alert = &body["alert"];
    assert_eq!(alert["keyword"], "shoes");
    assert_eq!(alert["min_discount"], 40);
    assert_eq!(alert["method"], "Email");
    assert_eq!(alert["product_site"], "amazon");
    assert_eq!(alert["fired"], false);
    let id = alert["id"].as_str().unwrap().to_string();

    let (status, body) = make_request(&app, Method::GET, "/api/alerts", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(body["alerts"][0]["id"], id.as_str());

    let (status, body) = make_request(&app, Method::POST, "/api/alerts/delete", Some(json!({"id": id}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);

    // Deleting again is still a success.
    let (status, body) = make_request(&app, Method::POST, "/api/alerts/delete", Some(json!({"id": id}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted"], 0);

    let (_, body) = make_request(&app, Method::GET, "/alerts", None).await?;
    assert!(body["alerts"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_subscribe_accepts_any_threshold() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    let mut request = subscribe_body("+91 98765 43210", "WhatsApp");
    request["discount"] = json!("Any");
    let (status, body) = make_request(&app, Method::POST, "/subscribe", Some(request)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alert"]["method"], "WhatsApp");
    assert!(body["alert"]["min_discount"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_subscribe_rejects_invalid_requests() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    for request in [
        subscribe_body("me@example.com", "Pigeon"),
        subscribe_body("not-an-address", "Email"),
        subscribe_body("call me", "SMS"),
        subscribe_body("", "Email"),
        json!({"keyword": "shoes", "method": "Email"}),
    ] {
        let (status, body) = make_request(&app, Method::POST, "/subscribe", Some(request)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some());
    }

    let (_, body) = make_request(&app, Method::GET, "/alerts", None).await?;
    assert!(body["alerts"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_delete_requires_id() -> anyhow::Result<()> {
    let app = create_test_app_state().await?.router();

    let (status, body) = make_request(&app, Method::POST, "/alerts/delete", Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Alert id is required");
    Ok(())
}
