use super::*;
use dealscope::config::{FetchEngine, SourceConfig};
use dealscope::models::{SearchStatus, SourceStatus};
use dealscope::scraper::build_fetcher;
use dealscope::SearchRequest;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AMAZON_PAGE: &str = r#"<html><head><title>Amazon.in : shoes</title></head><body>
    <div class="s-result-item" data-component-type="s-search-result">
        <h2><a class="a-link-normal" href="/dp/RS1?ref=sr_1"><span>Campus Running Shoes</span></a></h2>
        <img class="s-image" src="https://m.media-amazon.com/images/I/rs1.jpg">
        <span class="a-price"><span class="a-offscreen">₹1,199</span></span>
        <span class="a-price a-text-price"><span class="a-offscreen">₹2,399</span></span>
    </div>
</body></html>"#;

const FLIPKART_PAGE: &str = r#"<html><head><title>Shoes - Buy Products Online</title></head><body>
    <div data-id="SHO1">
        <a href="/sparx-shoes/p/itm1?pid=SHO1">
            <img src="https://rukminim2.flixcart.com/image/sho1.jpeg">
            <div>Sparx Men Walking Shoes For Men</div>
            <div>₹800</div>
            <div>20% off</div>
        </a>
    </div>
</body></html>"#;

const NYKAA_PAGE: &str = r#"<html><head><title>Search results</title></head><body>
    <div class="css-1rd7vky">
        <a href="/shoe-cleaner/p/9"><img src="https://images-static.nykaa.com/9.jpg"></a>
        <div class="css-xrzmfa">Shoe Cleaner Foam</div>
        <span class="css-17x46n5">MRP:₹500</span>
        <span class="css-111z9ua">₹400</span>
    </div>
</body></html>"#;

fn http_config(base_url: &str) -> AppConfig {
    let mut config = get_test_config();
    config.scraper.engine = FetchEngine::Http;
    config.scraper.max_pages = 1;
    config.scraper.navigation_timeout_ms = 2_000;
    config.search.source_timeout_ms = 5_000;
    config.search.request_timeout_ms = 10_000;
    config.sources = [Site::Amazon, Site::Flipkart, Site::Nykaa]
        .into_iter()
        .map(|site| SourceConfig {
            base_url: Some(base_url.to_string()),
            ..SourceConfig::new(site)
        })
        .collect();
    config
}

async fn manager_for(config: AppConfig) -> anyhow::Result<DealManager> {
    let fetcher = build_fetcher(&config.scraper)?;
    let plugins = PluginManager::new();
    plugins.initialize_default_plugins(&config, fetcher).await?;
    Ok(DealManager::new(config, plugins, AlertRegistry::in_memory().await?))
}

async fn mount_page(server: &MockServer, page_path: &str, query: (&str, &str), html: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .and(query_param(query.0, query.1))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_across_all_stores_over_http() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, "/s", ("k", "shoes"), AMAZON_PAGE).await;
    mount_page(&server, "/search", ("q", "shoes"), FLIPKART_PAGE).await;
    mount_page(&server, "/search/result/", ("q", "shoes"), NYKAA_PAGE).await;

    let manager = manager_for(http_config(&server.uri())).await?;
    let result = manager.search(SearchRequest::new("shoes")).await?;

    assert_eq!(result.status, SearchStatus::Complete);
    let titles: Vec<&str> = result.products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Campus Running Shoes", "Sparx Men Walking Shoes For Men", "Shoe Cleaner Foam"]
    );

    let amazon = &result.products[0];
    assert_eq!(amazon.url.as_deref(), Some(format!("{}/dp/RS1?ref=sr_1", server.uri()).as_str()));
    assert_eq!(amazon.discount_percent, Some(50));

    // Original price derived from the badge: 800 / 0.8
    let flipkart = &result.products[1];
    assert_eq!(flipkart.original_price_text.as_deref(), Some("1,000"));
    assert_eq!(flipkart.discount_percent, Some(20));
    assert_eq!(flipkart.url.as_deref(), Some(format!("{}/sparx-shoes/p/itm1", server.uri()).as_str()));

    let nykaa = &result.products[2];
    assert_eq!(nykaa.price_text, "400");
    assert_eq!(nykaa.discount_percent, Some(20));
    Ok(())
}

#[tokio::test]
async fn test_blocked_store_is_not_retried() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, "/s", ("k", "shoes"), AMAZON_PAGE).await;
    mount_page(&server, "/search/result/", ("q", "shoes"), NYKAA_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = http_config(&server.uri());
    config.scraper.retry_attempts = 3;
    let manager = manager_for(config).await?;
    let result = manager.search(SearchRequest::new("shoes")).await?;

    assert_eq!(result.status, SearchStatus::Partial);
    assert_eq!(result.products.len(), 2);

    let flipkart = &result.sources[1];
    assert_eq!(flipkart.site, Site::Flipkart);
    assert_eq!(flipkart.status, SourceStatus::Failed);
    assert!(flipkart.error.as_deref().unwrap().contains("blocked"));
    Ok(())
}
