//! Minimal nuspec manifest decoding.
//!
//! Local archives are their own source of truth: identity, license and the
//! dependency graph come out of the `.nuspec` embedded in the archive. Both
//! the flat `<dependency>` list and the grouped form with `targetFramework`
//! attributes occur in the wild.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::domain::framework::extract_framework;
use crate::domain::{Dependency, FrameworkRestriction, PackageName, VersionRequirement};

/// What the local adapter needs from a manifest.
#[derive(Debug, Default)]
pub struct NuspecManifest {
    pub id: Option<String>,
    pub license_url: String,
    pub dependencies: Vec<Dependency>,
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
        .find(|a| a.key.as_ref() == key.as_bytes())
        .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
}

pub fn parse_nuspec(content: &str) -> Result<NuspecManifest, String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut manifest = NuspecManifest::default();
    let mut buf = Vec::new();
    let mut in_metadata = false;
    let mut in_dependencies = false;
    let mut current_element = String::new();
    let mut group_restrictions: Vec<FrameworkRestriction> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "metadata" => in_metadata = true,
                    "dependencies" if in_metadata => in_dependencies = true,
                    "group" if in_dependencies => {
                        group_restrictions = attribute(&e, "targetFramework")
                            .and_then(|fw| extract_framework(&fw))
                            .map(|fw| vec![FrameworkRestriction::Exactly(fw)])
                            .unwrap_or_default();
                    }
                    "dependency" if in_dependencies => {
                        if let Some(dep) = read_dependency(&e, &group_restrictions)? {
                            manifest.dependencies.push(dep);
                        }
                    }
                    _ => current_element = name,
                }
            }
            Ok(Event::Empty(e)) => {
                if in_dependencies && local_name(e.name().as_ref()) == "dependency" {
                    if let Some(dep) = read_dependency(&e, &group_restrictions)? {
                        manifest.dependencies.push(dep);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if !in_metadata {
                    continue;
                }
                let text = reader.decoder().decode(t.as_ref()).unwrap_or_default();
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match current_element.as_str() {
                    "id" => manifest.id = Some(text.to_string()),
                    "licenseUrl" => manifest.license_url = text.to_string(),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "metadata" => in_metadata = false,
                    "dependencies" => in_dependencies = false,
                    "group" => group_restrictions = Vec::new(),
                    _ => current_element.clear(),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("nuspec XML error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(manifest)
}

fn read_dependency(
    element: &BytesStart<'_>,
    group_restrictions: &[FrameworkRestriction],
) -> Result<Option<Dependency>, String> {
    let Some(id) = attribute(element, "id") else {
        return Ok(None);
    };
    let version_spec = attribute(element, "version").unwrap_or_default();
    let requirement = VersionRequirement::parse(&version_spec)
        .map_err(|e| format!("dependency '{id}': {e}"))?;
    Ok(Some(Dependency {
        name: PackageName::new(id),
        requirement,
        restrictions: group_restrictions.to_vec(),
    }))
}
