//! The local-directory adapter: filename listing and the layered archive
//! lookup.

mod common;

use nufetch::domain::{DownloadLink, PackageName, PackageSource, SemVer};
use nufetch::AcquireError;

#[tokio::test]
async fn listing_matches_archives_by_name_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let packages = dir.path().join("packages");
    let nested = packages.join("nested");
    std::fs::create_dir_all(&nested).unwrap();

    common::write_nupkg(&packages, "Foo.Bar.1.0.0.nupkg", &[("f", "x")]);
    common::write_nupkg(&nested, "foo.bar.2.0.0-beta.nupkg", &[("f", "x")]);
    // Another package that happens to share a prefix must not match.
    common::write_nupkg(&packages, "Foo.Bar.Extras.1.0.0.nupkg", &[("f", "x")]);

    let sources = [PackageSource::local(&packages)];
    let mut versions =
        nufetch::get_versions(&env, &sources, &PackageName::new("Foo.Bar")).await.unwrap();
    versions.sort();

    assert_eq!(
        versions,
        vec![
            SemVer::parse("1.0.0").unwrap(),
            SemVer::parse("2.0.0-beta").unwrap()
        ]
    );
}

#[tokio::test]
async fn missing_directory_fails_the_whole_listing() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let sources = [PackageSource::local(dir.path().join("absent"))];

    let err = nufetch::get_versions(&env, &sources, &PackageName::new("Foo")).await.unwrap_err();
    assert!(matches!(err, AcquireError::MissingLocalSource { .. }));
}

#[tokio::test]
async fn metadata_comes_from_the_embedded_nuspec() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let packages = dir.path().join("packages");
    std::fs::create_dir_all(&packages).unwrap();

    let manifest = common::nuspec(
        "Foo.Bar",
        "1.0.0-beta",
        r#"<group targetFramework="net45"><dependency id="Newtonsoft.Json" version="9.0.1"/></group>"#,
    );
    let archive = common::write_nupkg(
        &packages,
        "Foo.Bar.1.0.0-beta.nupkg",
        &[("Foo.Bar.nuspec", &manifest)],
    );

    let sources = [PackageSource::local(&packages)];
    let details = nufetch::get_package_details(
        &env,
        false,
        &sources,
        &PackageName::new("Foo.Bar"),
        &SemVer::parse("1.0.0-beta").unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(details.name, PackageName::new("Foo.Bar"));
    assert_eq!(details.download, DownloadLink::LocalFile(archive));
    assert_eq!(details.license_url, "https://example.com/license");
    assert!(!details.unlisted);
    assert_eq!(details.direct_dependencies.len(), 1);
    assert_eq!(
        details.direct_dependencies[0].name,
        PackageName::new("Newtonsoft.Json")
    );
}

#[tokio::test]
async fn lookup_falls_through_exact_names_before_failing() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let packages = dir.path().join("packages");
    std::fs::create_dir_all(&packages).unwrap();

    common::write_nupkg(
        &packages,
        "Foo.Bar.1.0.0-beta.nupkg",
        &[("Foo.Bar.nuspec", &common::nuspec("Foo.Bar", "1.0.0-beta", ""))],
    );

    let sources = [PackageSource::local(&packages)];
    let name = PackageName::new("Foo.Bar");

    // The beta archive resolves by its exact file name.
    assert!(nufetch::get_package_details(
        &env,
        false,
        &sources,
        &name,
        &SemVer::parse("1.0.0-beta").unwrap()
    )
    .await
    .is_ok());

    // The release version matches nothing, not even in the recursive scan.
    let err = nufetch::get_package_details(
        &env,
        false,
        &sources,
        &name,
        &SemVer::parse("1.0.0").unwrap(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AcquireError::DetailsUnavailable { .. }));
}

#[tokio::test]
async fn sloppy_archive_names_are_found_by_the_recursive_scan() {
    let dir = tempfile::tempdir().unwrap();
    let env = common::test_env(dir.path());
    let packages = dir.path().join("packages");
    let sub = packages.join("mirrored");
    std::fs::create_dir_all(&sub).unwrap();

    // Extra prefix and a dash delimiter, but the trailing version token is
    // exactly the requested version.
    common::write_nupkg(
        &sub,
        "mirror-foo.bar-1.2.3.0.nupkg",
        &[("Foo.Bar.nuspec", &common::nuspec("Foo.Bar", "1.2.3.0", ""))],
    );

    let sources = [PackageSource::local(&packages)];
    let details = nufetch::get_package_details(
        &env,
        false,
        &sources,
        &PackageName::new("Foo.Bar"),
        &SemVer::parse("1.2.3.0").unwrap(),
    )
    .await
    .unwrap();
    assert!(matches!(details.download, DownloadLink::LocalFile(_)));
}
