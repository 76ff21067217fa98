//! OData Atom decoding for V2 feeds.
//!
//! Two document shapes matter: version-listing pages (a `<feed>` of entries
//! whose `properties/Version` we collect, chained by `link rel="next"`) and a
//! single package entry carrying the full metadata. Namespace prefixes vary
//! between servers (`d:Id`, `m:properties`, bare `Id`), so all element
//! matching runs on local names.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::application::errors::FeedError;
use crate::domain::framework::extract_framework;
use crate::domain::metadata::{optimize_dependencies, UNLISTED_SENTINEL};
use crate::domain::{
    Dependency, DownloadLink, FrameworkRestriction, PackageMetadata, PackageName, SemVer,
    VersionRequirement, CACHE_VERSION,
};

/// Content types a feed may use for the package download element.
const DOWNLOAD_CONTENT_TYPES: [&str; 2] = ["application/zip", "binary/octet-stream"];

/// One page of a version listing: the versions it carries and the `next`
/// links that continue it.
#[derive(Debug, Default, PartialEq)]
pub struct VersionPage {
    pub versions: Vec<String>,
    pub next_links: Vec<String>,
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Option<String> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| local_name(a.key.as_ref()) == key)
        .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
}

/// Parse a version-listing page.
pub fn parse_version_page(xml: &str, url: &str) -> Result<VersionPage, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = VersionPage::default();
    let mut buf = Vec::new();
    let mut in_properties = false;
    let mut in_version = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()).as_str() {
                "properties" => in_properties = true,
                "Version" if in_properties => in_version = true,
                "link" => collect_next_link(&e, &mut page.next_links),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == "link" {
                    collect_next_link(&e, &mut page.next_links);
                }
            }
            Ok(Event::Text(t)) => {
                if in_version {
                    let text = reader.decoder().decode(t.as_ref()).unwrap_or_default();
                    let text = text.trim();
                    if !text.is_empty() {
                        page.versions.push(text.to_string());
                    }
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()).as_str() {
                "properties" => in_properties = false,
                "Version" => in_version = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::protocol(url, format!("bad feed XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(page)
}

fn collect_next_link(element: &BytesStart<'_>, links: &mut Vec<String>) {
    if attribute(element, "rel").as_deref() == Some("next") {
        if let Some(href) = attribute(element, "href") {
            links.push(href);
        }
    }
}

/// Decode a single OData entry into [`PackageMetadata`].
///
/// The entry is taken from `feed/entry` when the document is a feed, or from
/// a bare root `entry`; only the first entry of a feed is considered.
pub fn parse_entry(
    xml: &str,
    feed_url: &str,
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageMetadata, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut in_entry = false;
    let mut entry_seen = false;
    let mut in_properties = false;
    let mut current_property: Option<String> = None;
    let mut in_title = false;

    let mut title: Option<String> = None;
    let mut official_id: Option<String> = None;
    let mut published_raw: Option<String> = None;
    let mut license_url = String::new();
    let mut dependencies_raw = String::new();
    let mut download_src: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "entry" if !entry_seen => {
                        in_entry = true;
                        entry_seen = true;
                    }
                    "title" if in_entry && !in_properties => in_title = true,
                    "properties" if in_entry => in_properties = true,
                    "content" if in_entry => read_content(&e, &mut download_src),
                    _ if in_properties => current_property = Some(local),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if in_entry && local_name(e.name().as_ref()) == "content" {
                    read_content(&e, &mut download_src);
                }
            }
            Ok(Event::Text(t)) => {
                let text = reader.decoder().decode(t.as_ref()).unwrap_or_default();
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if in_title {
                    title = Some(text.to_string());
                } else if let Some(property) = current_property.as_deref() {
                    match property {
                        "Id" => official_id = Some(text.to_string()),
                        "Published" => published_raw = Some(text.to_string()),
                        "LicenseUrl" => license_url = text.to_string(),
                        "Dependencies" => dependencies_raw = text.to_string(),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "entry" => in_entry = false,
                    "title" => in_title = false,
                    "properties" => in_properties = false,
                    _ => {
                        if current_property.as_deref() == Some(local.as_str()) {
                            current_property = None;
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::protocol(feed_url, format!("bad entry XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if !entry_seen {
        return Err(FeedError::NotFound {
            url: feed_url.to_string(),
            name: name.as_str().to_string(),
            version: version.to_string(),
        });
    }

    let official_name = official_id.or(title).ok_or_else(|| {
        FeedError::protocol(feed_url, "entry has neither properties/Id nor title")
    })?;

    let download_url = download_src.ok_or_else(|| {
        FeedError::protocol(feed_url, "entry has no downloadable content element")
    })?;

    let published = published_raw
        .as_deref()
        .and_then(parse_feed_date)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let dependencies = parse_dependency_list(&dependencies_raw)
        .map_err(|message| FeedError::protocol(feed_url, message))?;

    Ok(PackageMetadata {
        cache_version: CACHE_VERSION.to_string(),
        package_name: official_name,
        source_url: feed_url.to_string(),
        download: DownloadLink::Remote(download_url),
        license_url,
        unlisted: published == *UNLISTED_SENTINEL,
        dependencies: optimize_dependencies(dependencies),
    })
}

fn read_content(element: &BytesStart<'_>, download_src: &mut Option<String>) {
    let content_type = attribute(element, "type").unwrap_or_default();
    if DOWNLOAD_CONTENT_TYPES.contains(&content_type.as_str()) {
        if let Some(src) = attribute(element, "src") {
            *download_src = Some(src);
        }
    }
}

/// Feeds emit `Published` either as RFC 3339 or as a naive ISO timestamp;
/// both are accepted, anything else falls back to the epoch minimum.
fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse the `|`-separated dependency grammar:
/// `name:versionSpec:frameworkSpec` per token, everything after the first
/// colon optional. Empty tokens are discarded; an empty version spec means
/// "any version"; an unrecognizable framework spec drops the restriction.
pub fn parse_dependency_list(raw: &str) -> Result<Vec<Dependency>, String> {
    let mut dependencies = Vec::new();
    for token in raw.split('|') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let mut fields = token.splitn(3, ':');
        let name = fields.next().unwrap_or_default().trim();
        if name.is_empty() {
            continue;
        }
        let version_spec = fields.next().unwrap_or_default().trim();
        let framework_spec = fields.next().unwrap_or_default().trim();

        let requirement = VersionRequirement::parse(version_spec)
            .map_err(|e| format!("dependency '{token}': {e}"))?;

        let restrictions = if framework_spec.is_empty() {
            Vec::new()
        } else if framework_spec.to_lowercase().starts_with("portable") {
            vec![FrameworkRestriction::Portable(framework_spec.to_string())]
        } else {
            match extract_framework(framework_spec) {
                Some(framework) => vec![FrameworkRestriction::Exactly(framework)],
                None => Vec::new(),
            }
        };

        dependencies.push(Dependency {
            name: PackageName::new(name),
            requirement,
            restrictions,
        });
    }
    Ok(dependencies)
}
