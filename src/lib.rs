//! nufetch - NuGet package acquisition core
//!
//! The acquisition half of a .NET dependency manager: given configured
//! package sources and a `(name, version)` request, this crate enumerates
//! versions, resolves metadata, downloads archives into a persistent cache,
//! and installs them into per-package folders. Constraint solving, lockfile
//! handling and project-file edits live in the consuming tools.
//!
//! # Modules
//!
//! - [`domain`] — value objects: names, versions, requirements, sources
//! - [`application`] — the public operations and error types
//! - [`infrastructure`] — feed adapters, wire parsers, disk cache, archive handling
//! - [`config`] — typed configuration and the [`NuGetEnv`] environment record
//! - [`logging`] — tracing initialization
//!
//! # Usage
//!
//! ```rust,ignore
//! use nufetch::{Config, NuGetEnv, PackageName, PackageSource};
//!
//! let env = NuGetEnv::new(Config::from_env())?;
//! let sources = [PackageSource::remote("https://api.nuget.org/v3/index.json")];
//! let versions = nufetch::get_versions(&env, &sources, &PackageName::new("NUnit")).await?;
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use application::{
    analyzer_files, download_package, get_details_from_nuget, get_package_details, get_versions,
    lib_files, targets_files, AcquireError, FeedError, PackageDetails,
};
pub use config::{Config, DefaultLayout, InstallLayout, NoProxy, NuGetEnv, ProxyProvider};
pub use domain::{
    Credentials, Dependency, DownloadLink, FrameworkRestriction, PackageMetadata, PackageName,
    PackageSource, SemVer, VersionRequirement,
};
pub use logging::init_tracing;
