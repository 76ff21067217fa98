//! Domain layer: the value objects the acquisition core trades in.
//!
//! Everything here is pure data with no I/O: package identity, version
//! arithmetic, requirement ranges, framework restrictions, feed sources, and
//! the cached metadata entity.

pub mod framework;
pub mod metadata;
pub mod package;
pub mod requirement;
pub mod source;
pub mod version;

pub use framework::FrameworkRestriction;
pub use metadata::{optimize_dependencies, Dependency, DownloadLink, PackageMetadata, CACHE_VERSION};
pub use package::PackageName;
pub use requirement::VersionRequirement;
pub use source::{normalize_feed_url, Credentials, PackageSource};
pub use version::SemVer;
