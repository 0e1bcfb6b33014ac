use super::*;
use axum::http::{Method, StatusCode};
use dealscope::models::{SearchStatus, SourceStatus};
use dealscope::SearchRequest;
use serde_json::json;

fn sources_with_slow_nykaa() -> Vec<Arc<dyn SourceAdapter>> {
    let mut sources = default_sources();
    sources[2] = Arc::new(FixedSource::slow(Site::Nykaa, Duration::from_secs(5)));
    sources
}

#[tokio::test]
async fn test_slow_source_is_reported_not_fatal() -> anyhow::Result<()> {
    let app = create_test_app(sources_with_slow_nykaa(), get_test_config(), AlertRegistry::in_memory().await?).await?;

    let result = app.deals().search(SearchRequest::new("shoes")).await?;
    assert_eq!(result.status, SearchStatus::Partial);
    assert_eq!(result.products.len(), 3);
    assert!(result.products.iter().all(|p| p.site != Site::Nykaa));

    let nykaa = &result.sources[2];
    assert_eq!(nykaa.site, Site::Nykaa);
    assert_eq!(nykaa.status, SourceStatus::TimedOut);
    assert!(nykaa.elapsed_ms < 5_000);

    let errors = result.site_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, Site::Nykaa);
    Ok(())
}

#[tokio::test]
async fn test_partial_result_over_http() -> anyhow::Result<()> {
    let app = create_test_app(sources_with_slow_nykaa(), get_test_config(), AlertRegistry::in_memory().await?)
        .await?
        .router();

    let (status, body) = make_request(&app, Method::POST, "/api/scrape", Some(json!({"keyword": "shoes"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count_all"], 3);
    assert!(body["site_errors"]["nykaa"].as_str().unwrap().contains("timed out"));
    assert_eq!(body["sources"][2]["status"], "timed_out");
    Ok(())
}

#[tokio::test]
async fn test_all_sources_failing_is_failed_status() -> anyhow::Result<()> {
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(FailingSource(Site::Amazon)),
        Arc::new(FailingSource(Site::Flipkart)),
        Arc::new(FixedSource::slow(Site::Nykaa, Duration::from_secs(5))),
    ];
    let app = create_test_app(sources, get_test_config(), AlertRegistry::in_memory().await?).await?;

    let result = app.deals().search(SearchRequest::new("shoes")).await?;
    assert_eq!(result.status, SearchStatus::Failed);
    assert!(result.products.is_empty());
    assert_eq!(result.sources[0].status, SourceStatus::Failed);
    assert_eq!(result.sources[2].status, SourceStatus::TimedOut);
    Ok(())
}

#[tokio::test]
async fn test_request_deadline_aborts_search() -> anyhow::Result<()> {
    let mut config = get_test_config();
    config.search.source_timeout_ms = 10_000;
    config.search.request_timeout_ms = 200;

    let app = create_test_app(sources_with_slow_nykaa(), config, AlertRegistry::in_memory().await?).await?;

    let err = app.deals().search(SearchRequest::new("shoes")).await.unwrap_err();
    assert!(matches!(err, AppError::SearchTimeout { after_ms: 200 }));

    let (status, body) = make_request(&app.router(), Method::POST, "/scrape", Some(json!({"keyword": "shoes"}))).await?;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "SEARCH_TIMEOUT");
    Ok(())
}

#[tokio::test]
async fn test_budget_is_shared_and_merged_in_priority_order() -> anyhow::Result<()> {
    let many = |site: Site, prefix: &str| -> Arc<dyn SourceAdapter> {
        Arc::new(FixedSource::new(
            site,
            (0..10)
                .map(|i| {
                    listing(
                        site,
                        &format!("{} {}", prefix, i),
                        &format!("https://{}.example/{}", prefix, i),
                        "₹100",
                        None,
                    )
                })
                .collect(),
        ))
    };
    let sources = vec![many(Site::Amazon, "amz"), many(Site::Flipkart, "fk"), many(Site::Nykaa, "nyk")];
    let app = create_test_app(sources, get_test_config(), AlertRegistry::in_memory().await?).await?;

    let mut request = SearchRequest::new("anything");
    request.max_products = Some(7);
    let result = app.deals().search(request).await?;

    // ceil(7 / 3) = 3 from each, then the merged nine are cut to seven.
    assert_eq!(result.products.len(), 7);
    assert!(result.sources.iter().all(|s| s.listings == 3));
    let titles: Vec<&str> = result.products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["amz 0", "amz 1", "amz 2", "fk 0", "fk 1", "fk 2", "nyk 0"]);
    Ok(())
}

#[tokio::test]
async fn test_shared_listings_do_not_shrink_the_result() -> anyhow::Result<()> {
    let shared = listing(Site::Amazon, "Shared Shoes", "https://shop.example/shared", "₹100", None);
    let amazon: Arc<dyn SourceAdapter> = Arc::new(FixedSource::new(
        Site::Amazon,
        vec![
            shared.clone(),
            listing(Site::Amazon, "amz 1", "https://shop.example/a1", "₹100", None),
        ],
    ));
    let flipkart: Arc<dyn SourceAdapter> = Arc::new(FixedSource::new(
        Site::Flipkart,
        vec![
            RawListing { site: Site::Flipkart, ..shared },
            listing(Site::Flipkart, "fk 1", "https://shop.example/f1", "₹100", None),
            listing(Site::Flipkart, "fk 2", "https://shop.example/f2", "₹100", None),
        ],
    ));
    let app = create_test_app(vec![amazon, flipkart], get_test_config(), AlertRegistry::in_memory().await?).await?;

    let mut request = SearchRequest::new("shoes");
    request.max_products = Some(3);
    let result = app.deals().search(request).await?;

    let titles: Vec<&str> = result.products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Shared Shoes", "amz 1", "fk 1"]);
    Ok(())
}
