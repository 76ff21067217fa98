//! Metadata resolution against the persistent cache: schema invalidation,
//! sticky failures, and cache hits that never touch the network.

mod common;

use mockito::Matcher;
use nufetch::domain::{PackageName, SemVer, CACHE_VERSION};
use nufetch::infrastructure::disk_cache::MetadataCache;
use nufetch::AcquireError;

fn filter_query(name: &str, normalized: &str) -> Matcher {
    Matcher::UrlEncoded(
        "$filter".into(),
        format!("Id eq '{name}' and NormalizedVersion eq '{normalized}'"),
    )
}

#[tokio::test]
async fn fetched_metadata_is_cached_and_served_without_network() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server = mockito::Server::new_async().await;

    let entry = server
        .mock("GET", "/Packages")
        .match_query(filter_query("FooBar", "1.2.3"))
        .with_status(200)
        .with_body(common::entry_document(
            "FooBar",
            "1.2.3",
            &format!("{}/download/FooBar/1.2.3", server.url()),
            "",
            "2016-03-01T10:00:00",
            "Newtonsoft.Json:9.0.1:net45",
        ))
        .expect(1)
        .create_async()
        .await;

    let name = PackageName::new("FooBar");
    let version = SemVer::parse("1.2.3").unwrap();

    let first = nufetch::get_details_from_nuget(&env, false, None, &server.url(), &name, &version)
        .await
        .unwrap();
    let second = nufetch::get_details_from_nuget(&env, false, None, &server.url(), &name, &version)
        .await
        .unwrap();

    entry.assert_async().await;
    assert_eq!(first, second);
    assert_eq!(first.package_name, "FooBar");
    assert_eq!(first.dependencies.len(), 1);

    // Successive reads serve byte-identical payloads.
    let cache = MetadataCache::new(env.cache_root());
    let cache_file = cache.cache_file(&name, &version, &server.url());
    let bytes = std::fs::read(&cache_file).unwrap();
    let third = nufetch::get_details_from_nuget(&env, false, None, &server.url(), &name, &version)
        .await
        .unwrap();
    assert_eq!(third, first);
    assert_eq!(std::fs::read(&cache_file).unwrap(), bytes);
}

#[tokio::test]
async fn outdated_schema_triggers_a_refetch() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server = mockito::Server::new_async().await;

    let name = PackageName::new("FooBar");
    let version = SemVer::parse("1.2.3").unwrap();
    let cache = MetadataCache::new(env.cache_root());
    let cache_file = cache.cache_file(&name, &version, &server.url());

    // An entry from an earlier schema generation.
    let stale = serde_json::json!({
        "cache_version": "1.0",
        "package_name": "FooBar",
        "source_url": server.url(),
        "download": { "Remote": "http://stale/download" },
        "license_url": "",
        "unlisted": false,
        "dependencies": []
    });
    std::fs::write(&cache_file, serde_json::to_vec(&stale).unwrap()).unwrap();

    let entry = server
        .mock("GET", "/Packages")
        .match_query(filter_query("FooBar", "1.2.3"))
        .with_status(200)
        .with_body(common::entry_document(
            "FooBar",
            "1.2.3",
            &format!("{}/download/FooBar/1.2.3", server.url()),
            "",
            "2016-03-01T10:00:00",
            "",
        ))
        .expect(1)
        .create_async()
        .await;

    let metadata = nufetch::get_details_from_nuget(&env, false, None, &server.url(), &name, &version)
        .await
        .unwrap();

    entry.assert_async().await;
    assert_eq!(metadata.cache_version, CACHE_VERSION);
    let rewritten: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&cache_file).unwrap()).unwrap();
    assert_eq!(rewritten["cache_version"], CACHE_VERSION);
}

#[tokio::test]
async fn failures_stick_until_forced() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server = mockito::Server::new_async().await;

    let failing = server
        .mock("GET", Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let name = PackageName::new("FooBar");
    let version = SemVer::parse("1.2.3").unwrap();
    let cache = MetadataCache::new(env.cache_root());
    let marker = MetadataCache::error_file(&cache.cache_file(&name, &version, &server.url()));

    // First attempt fails over the wire and records the marker.
    let err = nufetch::get_details_from_nuget(&env, false, None, &server.url(), &name, &version)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquireError::Feed(_)));
    assert!(marker.exists());

    // Second attempt is rejected by the marker alone.
    failing.remove_async().await;
    let err = nufetch::get_details_from_nuget(&env, false, None, &server.url(), &name, &version)
        .await
        .unwrap_err();
    assert!(matches!(err, AcquireError::StickyFailure { .. }));

    // Forcing retries, succeeds, and clears the marker.
    server
        .mock("GET", "/Packages")
        .match_query(filter_query("FooBar", "1.2.3"))
        .with_status(200)
        .with_body(common::entry_document(
            "FooBar",
            "1.2.3",
            &format!("{}/download/FooBar/1.2.3", server.url()),
            "",
            "2016-03-01T10:00:00",
            "",
        ))
        .create_async()
        .await;

    let metadata = nufetch::get_details_from_nuget(&env, true, None, &server.url(), &name, &version)
        .await
        .unwrap();
    assert_eq!(metadata.package_name, "FooBar");
    assert!(!marker.exists());
}

#[tokio::test]
async fn unlisted_flag_comes_from_the_sentinel_date() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/Packages")
        .match_query(filter_query("Hidden", "2.0.0"))
        .with_status(200)
        .with_body(common::entry_document(
            "Hidden",
            "2.0.0",
            &format!("{}/download/Hidden/2.0.0", server.url()),
            "",
            "1900-01-01T00:00:00",
            "",
        ))
        .create_async()
        .await;

    let metadata = nufetch::get_details_from_nuget(
        &env,
        false,
        None,
        &server.url(),
        &PackageName::new("Hidden"),
        &SemVer::parse("2.0.0").unwrap(),
    )
    .await
    .unwrap();
    assert!(metadata.unlisted);
}
