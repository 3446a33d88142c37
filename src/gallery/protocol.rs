//! NuGet v3 wire types.
//!
//! Only the fields the client reads are modelled; everything else in the
//! gallery's JSON is ignored.

use serde::Deserialize;

/// `index.json`: the list of services a feed offers.
#[derive(Debug, Deserialize)]
pub struct ServiceIndex {
    #[serde(default)]
    pub resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
}

impl ServiceIndex {
    /// First resource whose type is one of `kinds`, in preference order.
    pub fn find(&self, kinds: &[&str]) -> Option<&str> {
        kinds.iter().find_map(|kind| {
            self.resources.iter().find(|r| r.kind == *kind).map(|r| r.id.as_str())
        })
    }

    /// First resource whose type starts with `prefix` (any version suffix).
    pub fn find_prefixed(&self, prefix: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.kind == prefix || r.kind.starts_with(&format!("{prefix}/")))
            .map(|r| r.id.as_str())
    }
}

/// `{registrations}/{id}/index.json`
#[derive(Debug, Deserialize)]
pub struct RegistrationIndex {
    #[serde(default)]
    pub items: Vec<RegistrationPage>,
}

/// A page of registration leaves. Large packages omit `items` and the page
/// must be fetched from its `@id`.
#[derive(Debug, Deserialize)]
pub struct RegistrationPage {
    #[serde(rename = "@id")]
    pub id: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationLeaf {
    pub catalog_entry: CatalogEntry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub version: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub listed: Option<bool>,
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
}

impl CatalogEntry {
    /// Unlisted packages can still be fetched by exact identity but never
    /// satisfy a range.
    pub fn is_listed(&self) -> bool {
        self.listed.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    pub target_framework: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyEntry {
    pub id: String,
    pub range: Option<String>,
}

/// Search query service response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub total_hits: u64,
    #[serde(default)]
    pub data: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub version: String,
    pub title: Option<String>,
    pub description: Option<String>,
}
