//! The cached package-metadata entity.

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::framework::FrameworkRestriction;
use super::package::PackageName;
use super::requirement::VersionRequirement;

/// Schema version written into every cached metadata file. Entries carrying a
/// different value are discarded and refetched.
pub const CACHE_VERSION: &str = "2.0";

/// Feeds mark unlisted packages by backdating `Published` to this sentinel.
pub static UNLISTED_SENTINEL: Lazy<DateTime<Utc>> =
    Lazy::new(|| Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap());

/// Where the package archive can be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadLink {
    /// A URL served by a remote feed.
    Remote(String),
    /// An archive already on disk; nothing to download.
    LocalFile(PathBuf),
}

impl DownloadLink {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalFile(_))
    }
}

/// A direct dependency as declared by the package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: PackageName,
    pub requirement: VersionRequirement,
    pub restrictions: Vec<FrameworkRestriction>,
}

/// Authoritative metadata for one `(package, version)` as reported by a feed,
/// persisted as JSON in the metadata cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Schema tag; see [`CACHE_VERSION`].
    pub cache_version: String,
    /// The feed's authoritative casing, which may differ from the request.
    pub package_name: String,
    /// The feed (or directory) that answered.
    pub source_url: String,
    pub download: DownloadLink,
    /// Empty when the feed reports no license.
    pub license_url: String,
    /// True when the feed soft-deleted this version.
    pub unlisted: bool,
    pub dependencies: Vec<Dependency>,
}

impl PackageMetadata {
    pub fn has_current_schema(&self) -> bool {
        self.cache_version == CACHE_VERSION
    }
}

/// De-duplicate dependency declarations, merging the framework restrictions
/// of entries that name the same package under the same requirement. Order of
/// first appearance is preserved.
pub fn optimize_dependencies(dependencies: Vec<Dependency>) -> Vec<Dependency> {
    let mut result: Vec<Dependency> = Vec::with_capacity(dependencies.len());
    for dep in dependencies {
        if let Some(existing) = result
            .iter_mut()
            .find(|d| d.name == dep.name && d.requirement == dep.requirement)
        {
            for restriction in dep.restrictions {
                if !existing.restrictions.contains(&restriction) {
                    existing.restrictions.push(restriction);
                }
            }
        } else {
            result.push(dep);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, req: &str, restrictions: &[FrameworkRestriction]) -> Dependency {
        Dependency {
            name: PackageName::new(name),
            requirement: VersionRequirement::parse(req).unwrap(),
            restrictions: restrictions.to_vec(),
        }
    }

    #[test]
    fn optimize_merges_same_name_and_requirement() {
        let merged = optimize_dependencies(vec![
            dep("A", "1.0", &[FrameworkRestriction::Exactly("net45".into())]),
            dep("a", "1.0", &[FrameworkRestriction::Exactly("net46".into())]),
            dep("B", "0", &[]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged[0].restrictions,
            vec![
                FrameworkRestriction::Exactly("net45".into()),
                FrameworkRestriction::Exactly("net46".into()),
            ]
        );
    }

    #[test]
    fn optimize_keeps_distinct_requirements_apart() {
        let kept = optimize_dependencies(vec![dep("A", "1.0", &[]), dep("A", "2.0", &[])]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn optimize_drops_duplicate_restrictions() {
        let merged = optimize_dependencies(vec![
            dep("A", "0", &[FrameworkRestriction::Exactly("net45".into())]),
            dep("A", "0", &[FrameworkRestriction::Exactly("net45".into())]),
        ]);
        assert_eq!(merged[0].restrictions.len(), 1);
    }

    #[test]
    fn metadata_serialization_is_stable() {
        let meta = PackageMetadata {
            cache_version: CACHE_VERSION.into(),
            package_name: "Foo.Bar".into(),
            source_url: "http://feed/api/v2".into(),
            download: DownloadLink::Remote("http://feed/package/Foo.Bar/1.0.0".into()),
            license_url: String::new(),
            unlisted: false,
            dependencies: vec![dep("Baz", "[1.0,2.0)", &[])],
        };
        let a = serde_json::to_string(&meta).unwrap();
        let b = serde_json::to_string(&serde_json::from_str::<PackageMetadata>(&a).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
