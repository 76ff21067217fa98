//! Shared fixtures for the integration tests: environments rooted in temp
//! directories, OData document builders, and archive builders.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nufetch::config::{CacheConfig, Config, NuGetEnv};

/// An environment whose cache lives under `dir`.
pub fn test_env(dir: &Path) -> Arc<NuGetEnv> {
    let config = Config {
        cache: CacheConfig {
            root: Some(dir.join("nuget-cache")),
        },
        ..Config::default()
    };
    NuGetEnv::new(config).expect("test environment")
}

/// An OData feed page listing `versions`, optionally chained to `next`.
pub fn feed_page(versions: &[&str], next: Option<&str>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
"#,
    );
    for version in versions {
        xml.push_str(&format!(
            "  <entry><m:properties><d:Version>{version}</d:Version></m:properties></entry>\n"
        ));
    }
    if let Some(next) = next {
        xml.push_str(&format!("  <link rel=\"next\" href=\"{next}\"/>\n"));
    }
    xml.push_str("</feed>");
    xml
}

/// A single-entry OData document carrying full package metadata.
pub fn entry_document(
    id: &str,
    version: &str,
    download_url: &str,
    license_url: &str,
    published: &str,
    dependencies: &str,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <entry>
    <title type="text">{id}</title>
    <content type="application/zip" src="{download_url}"/>
    <m:properties>
      <d:Id>{id}</d:Id>
      <d:Version>{version}</d:Version>
      <d:Published m:type="Edm.DateTime">{published}</d:Published>
      <d:LicenseUrl>{license_url}</d:LicenseUrl>
      <d:Dependencies>{dependencies}</d:Dependencies>
    </m:properties>
  </entry>
</feed>"#
    )
}

/// Write a `.nupkg` archive with the given entries into `dir`.
pub fn write_nupkg(dir: &Path, file_name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(file_name);
    let file = std::fs::File::create(&path).expect("create archive");
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(content.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish archive");
    path
}

/// A minimal nuspec manifest for archive fixtures.
pub fn nuspec(id: &str, version: &str, dependencies: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>{id}</id>
    <version>{version}</version>
    <licenseUrl>https://example.com/license</licenseUrl>
    <dependencies>{dependencies}</dependencies>
  </metadata>
</package>"#
    )
}
