use anyhow::Result;
use serde_json::json;
use subroute_packages::core::PackageError;
use subroute_packages::gallery::{Gallery, NugetGallery};
use subroute_packages::models::PackageIdentity;
use subroute_packages::version::VersionRange;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{FeedVersion, TestFeed, diagnostics};

fn identity(text: &str) -> PackageIdentity {
    text.parse().expect("valid identity")
}

async fn gallery(feed: &TestFeed) -> Result<std::sync::Arc<NugetGallery>> {
    let temp = TempDir::new()?;
    Ok(feed.gallery(&feed.config(temp.path())))
}

#[tokio::test]
async fn test_find_package_reads_dependency_groups() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish(
        "Foo",
        &[FeedVersion::new("1.0.0")
            .depends_on("Bar", "[1.0.0, )")
            .depends_for(None, "Baz", "[2.0.0]")
            .depends_for(Some("net8.0"), "Modern", "8.0.0")],
    )
    .await;
    let gallery = gallery(&feed).await?;

    let package = gallery.find_package(&identity("Foo@1.0.0")).await?;

    let deps: Vec<String> = package.dependencies().iter().map(ToString::to_string).collect();
    assert_eq!(deps.len(), 2);
    assert!(deps[0].starts_with("Bar"));
    assert!(deps[1].starts_with("Baz"));
    assert_eq!(package.description(), "Foo description");
    Ok(())
}

#[tokio::test]
async fn test_separately_stored_pages_are_fetched() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish_paged("Big", &[FeedVersion::new("1.0.0"), FeedVersion::new("1.1.0")]).await;
    let gallery = gallery(&feed).await?;

    let package = gallery.find_package(&identity("Big@1.1.0")).await?;
    let best = gallery.find_best_match("Big", &VersionRange::parse("1.0")?).await?;

    assert_eq!(package.identity(), &identity("Big@1.1.0"));
    assert_eq!(best, identity("Big@1.1.0"));
    assert!(feed.requested_paths().await.iter().any(|p| p.ends_with("/page/0.json")));
    Ok(())
}

#[tokio::test]
async fn test_best_match_skips_unlisted_and_prerelease() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish(
        "Foo",
        &[
            FeedVersion::new("1.0.0"),
            FeedVersion::new("1.1.0"),
            FeedVersion::new("1.2.0").unlisted(),
            FeedVersion::new("1.3.0-beta.1"),
        ],
    )
    .await;
    let gallery = gallery(&feed).await?;

    let best = gallery.find_best_match("Foo", &VersionRange::parse("[1.0.0, 2.0.0)")?).await?;
    assert_eq!(best, identity("Foo@1.1.0"));

    // Exact lookups still see unlisted versions.
    assert!(gallery.find_package(&identity("Foo@1.2.0")).await.is_ok());

    let none = gallery.find_best_match("Foo", &VersionRange::parse("[3.0.0, )")?).await;
    assert!(matches!(none, Err(PackageError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_service_index_is_read_once() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish("Foo", &[FeedVersion::new("1.0.0")]).await;
    let gallery = gallery(&feed).await?;

    gallery.find_package(&identity("Foo@1.0.0")).await?;
    gallery.find_best_match("Foo", &VersionRange::any()).await?;
    gallery.download(&identity("Foo@1.0.0")).await?;

    let index_reads =
        feed.requested_paths().await.iter().filter(|p| p.as_str() == "/v3/index.json").count();
    assert_eq!(index_reads, 1);
    Ok(())
}

#[tokio::test]
async fn test_http_status_mapping() -> Result<()> {
    let feed = TestFeed::start().await;
    for (id, status) in [("throttled", 429), ("broken", 502), ("forbidden", 403)] {
        Mock::given(method("GET"))
            .and(path(format!("/registration/{id}/index.json")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&feed.server)
            .await;
    }
    let gallery = gallery(&feed).await?;

    let throttled = gallery.find_package(&identity("Throttled@1.0.0")).await;
    let broken = gallery.find_package(&identity("Broken@1.0.0")).await;
    let forbidden = gallery.find_package(&identity("Forbidden@1.0.0")).await;
    let missing = gallery.download(&identity("Missing@1.0.0")).await;

    assert!(matches!(throttled, Err(PackageError::Unavailable { .. })));
    assert!(matches!(broken, Err(PackageError::Unavailable { .. })));
    assert!(matches!(forbidden, Err(PackageError::Protocol { .. })));
    assert_eq!(missing, Err(PackageError::not_found("Missing@1.0.0")));
    Ok(())
}

#[tokio::test]
async fn test_malformed_responses_are_protocol_errors() -> Result<()> {
    let feed = TestFeed::start().await;
    Mock::given(method("GET"))
        .and(path("/registration/garbled/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&feed.server)
        .await;
    feed.mount_json(
        "/registration/badrange/index.json",
        json!({"items": [{
            "@id": "page",
            "items": [{"catalogEntry": {
                "id": "BadRange",
                "version": "1.0.0",
                "dependencyGroups": [{"dependencies": [{"id": "X", "range": "[oops"}]}]
            }}]
        }]}),
    )
    .await;
    let gallery = gallery(&feed).await?;

    let garbled = gallery.find_package(&identity("Garbled@1.0.0")).await;
    let bad_range = gallery.find_package(&identity("BadRange@1.0.0")).await;

    assert!(matches!(garbled, Err(PackageError::Protocol { .. })));
    assert!(matches!(bad_range, Err(PackageError::Protocol { .. })));
    Ok(())
}

#[tokio::test]
async fn test_incomplete_service_index_is_a_protocol_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": []})))
        .mount(&server)
        .await;
    let gallery = NugetGallery::new(&format!("{}/v3/index.json", server.uri()), &[], diagnostics())?;

    let err = gallery.search("foo", 0, 10).await.expect_err("no search service");

    assert!(matches!(err, PackageError::Protocol { .. }), "{err}");
    Ok(())
}
