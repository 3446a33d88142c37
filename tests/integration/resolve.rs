use anyhow::Result;
use subroute_packages::cache::{LocalCache, MARKER_FILE};
use subroute_packages::core::PackageError;
use subroute_packages::models::PackageIdentity;
use subroute_packages::resolver::DependencyResolver;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{FeedVersion, TestFeed, diagnostics};

fn resolver(feed: &TestFeed, temp: &TempDir) -> Result<DependencyResolver> {
    let config = feed.config(temp.path());
    let cache = LocalCache::new(config.resolved_cache_dir()?, diagnostics());
    Ok(DependencyResolver::new(feed.gallery(&config), cache, diagnostics())
        .with_retry_policy(config.retry.clone()))
}

fn identity(text: &str) -> PackageIdentity {
    text.parse().expect("valid identity")
}

#[tokio::test]
async fn test_resolves_transitive_graph_into_cache() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish(
        "App",
        &[FeedVersion::new("1.0.0")
            .depends_on("Json", "[12.0.0, 14.0.0)")
            .depends_on("Logging", "[2.0.0]")
            .depends_for(Some(".NETStandard2.0"), "NetStandardOnly", "1.0.0")],
    )
    .await;
    feed.publish(
        "Json",
        &[FeedVersion::new("12.0.1"), FeedVersion::new("13.0.3"), FeedVersion::new("14.0.0")],
    )
    .await;
    feed.publish("Logging", &[FeedVersion::new("2.0.0").depends_on("Json", "[12.0.0, 14.0.0)")])
        .await;

    let temp = TempDir::new()?;
    let resolver = resolver(&feed, &temp)?;

    let resolution = resolver.resolve_one(&identity("App@1.0.0"), &CancellationToken::new()).await?;

    let resolved: Vec<String> =
        resolution.packages().iter().map(|p| p.identity().to_string()).collect();
    assert_eq!(resolved, ["App@1.0.0", "Json@13.0.3", "Logging@2.0.0"]);

    for package in resolution.packages() {
        let dir = resolution.path_of(package.identity()).expect("cached path");
        assert!(dir.join(MARKER_FILE).is_file());
        assert!(dir.join(format!("lib/net45/{}.dll", package.identity().id())).is_file());
        assert!(!dir.join("_rels").exists());
    }
    assert_eq!(resolution.packages()[0].title(), "App title");

    let requested = feed.requested_paths().await;
    assert!(!requested.iter().any(|p| p.contains("netstandardonly")));
    assert_eq!(requested.iter().filter(|p| p.ends_with("json.13.0.3.nupkg")).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_package_is_not_found_without_cache_dir() -> Result<()> {
    let feed = TestFeed::start().await;
    let temp = TempDir::new()?;
    let resolver = resolver(&feed, &temp)?;

    let err = resolver
        .resolve_one(&identity("Foo@1.0.0"), &CancellationToken::new())
        .await
        .expect_err("Foo is not published");

    assert_eq!(err, PackageError::not_found("Foo@1.0.0"));
    assert!(!resolver.cache().entry_path(&identity("Foo@1.0.0")).exists());
    assert!(!resolver.cache().root().exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_version_of_known_package_is_not_found() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish("Foo", &[FeedVersion::new("2.0.0")]).await;
    let temp = TempDir::new()?;

    let err = resolver(&feed, &temp)?
        .resolve_one(&identity("Foo@1.0.0"), &CancellationToken::new())
        .await
        .expect_err("only 2.0.0 is published");

    assert_eq!(err, PackageError::not_found("Foo@1.0.0"));
    Ok(())
}

#[tokio::test]
async fn test_transient_server_errors_are_retried() -> Result<()> {
    let feed = TestFeed::start().await;
    Mock::given(method("GET"))
        .and(path("/registration/foo/index.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&feed.server)
        .await;
    feed.publish("Foo", &[FeedVersion::new("1.0.0")]).await;
    let temp = TempDir::new()?;

    let resolution = resolver(&feed, &temp)?
        .resolve_one(&identity("Foo@1.0.0"), &CancellationToken::new())
        .await?;

    assert_eq!(resolution.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_persistent_outage_surfaces_unavailable() -> Result<()> {
    let feed = TestFeed::start().await;
    Mock::given(method("GET"))
        .and(path("/registration/foo/index.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&feed.server)
        .await;
    let temp = TempDir::new()?;

    let err = resolver(&feed, &temp)?
        .resolve_one(&identity("Foo@1.0.0"), &CancellationToken::new())
        .await
        .expect_err("gallery is down");

    assert!(matches!(err, PackageError::Unavailable { .. }), "{err}");
    Ok(())
}

#[tokio::test]
async fn test_second_resolution_is_served_from_cache() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish("Foo", &[FeedVersion::new("1.0.0")]).await;
    let temp = TempDir::new()?;
    let resolver = resolver(&feed, &temp)?;
    let cancel = CancellationToken::new();

    let first = resolver.resolve_one(&identity("Foo@1.0.0"), &cancel).await?;
    let second = resolver.resolve_one(&identity("Foo@1.0.0"), &cancel).await?;

    assert_eq!(first, second);
    let downloads =
        feed.requested_paths().await.iter().filter(|p| p.ends_with(".nupkg")).count();
    assert_eq!(downloads, 1);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_resolution_leaves_no_entry() -> Result<()> {
    let feed = TestFeed::start().await;
    Mock::given(method("GET"))
        .and(path("/registration/slow/index.json"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
        .mount(&feed.server)
        .await;
    let temp = TempDir::new()?;
    let resolver = resolver(&feed, &temp)?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = resolver
        .resolve_one(&identity("Slow@1.0.0"), &cancel)
        .await
        .expect_err("cancelled");

    assert_eq!(err, PackageError::Cancelled);
    assert!(!resolver.cache().has(&identity("Slow@1.0.0")));
    Ok(())
}

#[tokio::test]
async fn test_dependency_id_casing_does_not_duplicate_packages() -> Result<()> {
    let feed = TestFeed::start().await;
    feed.publish(
        "App",
        &[FeedVersion::new("1.0.0").depends_on("json", "[13.0.3]").depends_on("Logging", "[2.0.0]")],
    )
    .await;
    feed.publish("Logging", &[FeedVersion::new("2.0.0").depends_on("Json", "[13.0.3]")]).await;
    feed.publish("Json", &[FeedVersion::new("13.0.3")]).await;
    let temp = TempDir::new()?;
    let resolver = resolver(&feed, &temp)?;

    let resolution = resolver.resolve_one(&identity("App@1.0.0"), &CancellationToken::new()).await?;

    let resolved: Vec<String> =
        resolution.packages().iter().map(|p| p.identity().to_string()).collect();
    assert_eq!(resolved, ["App@1.0.0", "Json@13.0.3", "Logging@2.0.0"]);

    let mut dirs: Vec<String> = std::fs::read_dir(resolver.cache().root())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    dirs.sort();
    assert_eq!(dirs, ["App.1.0.0", "Json.13.0.3", "Logging.2.0.0"]);

    let json_downloads =
        feed.requested_paths().await.iter().filter(|p| p.ends_with("json.13.0.3.nupkg")).count();
    assert_eq!(json_downloads, 1);
    Ok(())
}
