//! Application layer: the public acquisition operations and their errors.

pub mod details;
pub mod errors;
pub mod install;
pub mod versions;

pub use details::{get_details_from_nuget, get_package_details, PackageDetails};
pub use errors::{AcquireError, FeedError};
pub use install::{analyzer_files, download_package, lib_files, targets_files};
pub use versions::get_versions;
