//! Version listing across feed protocol variants.

mod common;

use mockito::Matcher;
use nufetch::domain::{PackageName, PackageSource, SemVer};
use nufetch::infrastructure::feeds::V2Variant;

#[tokio::test]
async fn odata_pagination_follows_next_links() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server = mockito::Server::new_async().await;

    let page_two_url = format!("{}/Packages?$skiptoken=1", server.url());
    let first = server
        .mock("GET", "/Packages")
        .match_query(Matcher::UrlEncoded(
            "$filter".into(),
            "Id eq 'FooBar'".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/atom+xml")
        .with_body(common::feed_page(&["1.0.0"], Some(&page_two_url)))
        .create_async()
        .await;
    let second = server
        .mock("GET", "/Packages")
        .match_query(Matcher::UrlEncoded("$skiptoken".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/atom+xml")
        .with_body(common::feed_page(&["1.0.1"], None))
        .create_async()
        .await;

    let sources = [PackageSource::remote(server.url())];
    let mut versions =
        nufetch::get_versions(&env, &sources, &PackageName::new("FooBar")).await.unwrap();
    versions.sort();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(
        versions,
        vec![SemVer::parse("1.0.0").unwrap(), SemVer::parse("1.0.1").unwrap()]
    );
}

#[tokio::test]
async fn json_endpoint_wins_when_odata_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server = mockito::Server::new_async().await;

    let versions_mock = server
        .mock("GET", "/package-versions/NUnit")
        .match_query(Matcher::UrlEncoded("includePrerelease".into(), "true".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"["3.13.3", "4.0.0-beta.1"]"#)
        .create_async()
        .await;

    let sources = [PackageSource::remote(server.url())];
    let versions = nufetch::get_versions(&env, &sources, &PackageName::new("NUnit")).await.unwrap();

    versions_mock.assert_async().await;
    assert_eq!(versions.len(), 2);

    // The winning variant now owns the endpoint.
    assert_eq!(
        env.memo().bound_variant("", &server.url()),
        Some(V2Variant::JsonVersions)
    );
}

#[tokio::test]
async fn versions_from_all_sources_are_unioned_and_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server_a = mockito::Server::new_async().await;
    let mut server_b = mockito::Server::new_async().await;

    server_a
        .mock("GET", "/package-versions/Pkg")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"["1.0.0", "2.0.0"]"#)
        .create_async()
        .await;
    server_b
        .mock("GET", "/package-versions/Pkg")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"["2.0.0.0", "3.0.0"]"#)
        .create_async()
        .await;

    let sources = [
        PackageSource::remote(server_a.url()),
        PackageSource::remote(server_b.url()),
    ];
    let versions = nufetch::get_versions(&env, &sources, &PackageName::new("Pkg")).await.unwrap();

    // 2.0.0 and 2.0.0.0 are the same version.
    assert_eq!(versions.len(), 3);
}

#[tokio::test]
async fn no_versions_anywhere_is_an_error_listing_the_sources() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let server = mockito::Server::new_async().await;

    let sources = [PackageSource::remote(server.url())];
    let err = nufetch::get_versions(&env, &sources, &PackageName::new("Ghost")).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Ghost"));
    assert!(message.contains(&server.url()));
}

#[tokio::test]
async fn bound_endpoint_skips_other_variants() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/package-versions/Pkg")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"["1.0.0"]"#)
        .create_async()
        .await;

    let sources = [PackageSource::remote(server.url())];
    let name = PackageName::new("Pkg");
    nufetch::get_versions(&env, &sources, &name).await.unwrap();

    // With the endpoint bound, OData mocks must never be consulted again.
    let odata = server
        .mock("GET", "/Packages")
        .match_query(Matcher::Any)
        .expect(0)
        .with_status(200)
        .with_body(common::feed_page(&["9.9.9"], None))
        .create_async()
        .await;

    let versions = nufetch::get_versions(&env, &sources, &name).await.unwrap();
    odata.assert_async().await;
    assert_eq!(versions, vec![SemVer::parse("1.0.0").unwrap()]);
}
