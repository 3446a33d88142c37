//! NuGet v3 gallery client.
//!
//! The client starts from a feed's service index and discovers three
//! services from it, once per client:
//!
//! | Service | Used for |
//! |---|---|
//! | `RegistrationsBaseUrl` | metadata, dependency groups, version lists |
//! | `PackageBaseAddress/3.0.0` | `.nupkg` downloads |
//! | `SearchQueryService` | keyword search |
//!
//! Status mapping: 404 becomes `NotFound`; connection errors, timeouts, 408,
//! 429 and 5xx become `Unavailable`; any other non-success status or an
//! undecodable body becomes `Protocol`.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use reqwest::{Client, Response, StatusCode};
use semver::Version;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use url::Url;

use super::protocol::{
    CatalogEntry, DependencyGroup, RegistrationIndex, RegistrationLeaf, RegistrationPage,
    SearchResponse, ServiceIndex,
};
use super::{Gallery, SearchPage};
use crate::config::Config;
use crate::core::{PackageError, Result};
use crate::diagnostics::SharedDiagnostics;
use crate::models::{Dependency, PackageIdentity, ResolvedPackage};
use crate::version::{VersionRange, parse_version};

const REGISTRATION_TYPES: &[&str] =
    &["RegistrationsBaseUrl/3.6.0", "RegistrationsBaseUrl/3.4.0", "RegistrationsBaseUrl"];
const PACKAGE_BASE_TYPES: &[&str] = &["PackageBaseAddress/3.0.0"];
const SEARCH_TYPE: &str = "SearchQueryService";

#[derive(Debug, Clone)]
struct Endpoints {
    registrations: Url,
    package_base: Url,
    search: Url,
}

/// [`Gallery`] implementation for NuGet v3 feeds.
///
/// # Examples
///
/// ```rust,no_run
/// use subroute_packages::config::Config;
/// use subroute_packages::diagnostics::TracingDiagnostics;
/// use subroute_packages::gallery::{Gallery, NugetGallery};
/// use subroute_packages::models::PackageIdentity;
///
/// # async fn example() -> anyhow::Result<()> {
/// let gallery = NugetGallery::from_config(&Config::default(), TracingDiagnostics::shared())?;
/// let identity: PackageIdentity = "Newtonsoft.Json@13.0.3".parse()?;
/// let package = gallery.find_package(&identity).await?;
/// println!("{} has {} dependencies", package.identity(), package.dependencies().len());
/// # Ok(())
/// # }
/// ```
pub struct NugetGallery {
    client: Client,
    source: Url,
    /// Normalized target frameworks; empty means every dependency group applies.
    target_frameworks: Vec<String>,
    endpoints: OnceCell<Endpoints>,
    diagnostics: SharedDiagnostics,
}

impl NugetGallery {
    /// Client for `source` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `source` is not a valid URL.
    pub fn new(
        source: &str,
        target_frameworks: &[String],
        diagnostics: SharedDiagnostics,
    ) -> Result<Self> {
        let config = Config {
            source: source.to_string(),
            target_frameworks: target_frameworks.to_vec(),
            ..Config::default()
        };
        Self::from_config(&config, diagnostics)
    }

    /// Client configured from [`Config`]: source, target frameworks, timeout
    /// and user agent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the source URL is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &Config, diagnostics: SharedDiagnostics) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PackageError::invalid_argument(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(&config.source, &config.target_frameworks, client, diagnostics)
    }

    /// Client using a caller-provided `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `source` is not a valid URL.
    pub fn with_client(
        source: &str,
        target_frameworks: &[String],
        client: Client,
        diagnostics: SharedDiagnostics,
    ) -> Result<Self> {
        let source = Url::parse(source).map_err(|e| {
            PackageError::invalid_argument(format!("invalid gallery source '{source}': {e}"))
        })?;
        Ok(Self {
            client,
            source,
            target_frameworks: target_frameworks.iter().map(|tf| normalize_framework(tf)).collect(),
            endpoints: OnceCell::new(),
            diagnostics,
        })
    }

    /// The service index this client was pointed at.
    #[must_use]
    pub fn source(&self) -> &Url {
        &self.source
    }

    fn report(&self, err: &PackageError) {
        self.diagnostics.error(&err.to_string());
    }

    async fn endpoints(&self) -> Result<&Endpoints> {
        self.endpoints
            .get_or_try_init(|| async {
                self.diagnostics.verbose(&format!("reading service index {}", self.source));
                let index: ServiceIndex = self
                    .get_json(self.source.clone(), "reading the service index")
                    .await?
                    .ok_or_else(|| {
                        PackageError::protocol(format!("no service index at {}", self.source))
                    })?;

                let missing = |kind: &str| {
                    PackageError::protocol(format!(
                        "service index {} does not offer {kind}",
                        self.source
                    ))
                };
                let registrations =
                    index.find(REGISTRATION_TYPES).ok_or_else(|| missing("RegistrationsBaseUrl"))?;
                let package_base =
                    index.find(PACKAGE_BASE_TYPES).ok_or_else(|| missing("PackageBaseAddress"))?;
                let search = index.find_prefixed(SEARCH_TYPE).ok_or_else(|| missing(SEARCH_TYPE))?;

                Ok(Endpoints {
                    registrations: base_url(registrations)?,
                    package_base: base_url(package_base)?,
                    search: parse_url(search)?,
                })
            })
            .await
    }

    /// GET `url`; `Ok(None)` for 404.
    async fn get(&self, url: Url, operation: &str) -> Result<Option<Response>> {
        tracing::debug!(target: "subroute_packages::gallery", "GET {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PackageError::unavailable(operation, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            return Err(PackageError::unavailable(operation, format!("HTTP {status} from {url}")));
        }
        if !status.is_success() {
            return Err(PackageError::protocol(format!(
                "HTTP {status} from {url} while {operation}"
            )));
        }
        Ok(Some(response))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, operation: &str) -> Result<Option<T>> {
        let Some(response) = self.get(url, operation).await? else {
            return Ok(None);
        };
        response.json::<T>().await.map(Some).map_err(|e| {
            if e.is_decode() {
                PackageError::protocol(format!("malformed response while {operation}: {e}"))
            } else {
                PackageError::unavailable(operation, e)
            }
        })
    }

    /// All registration leaves of a package, or `None` if the gallery does not
    /// know the id. When `wanted` is given, pages whose bounds exclude it are
    /// not fetched.
    async fn registration_leaves(
        &self,
        id: &str,
        wanted: Option<&Version>,
        operation: &str,
    ) -> Result<Option<Vec<RegistrationLeaf>>> {
        let endpoints = self.endpoints().await?;
        let url = join(&endpoints.registrations, &format!("{}/index.json", id.to_lowercase()))?;
        let Some(index) = self.get_json::<RegistrationIndex>(url, operation).await? else {
            return Ok(None);
        };

        let mut leaves = Vec::new();
        let mut remote_pages = Vec::new();
        for page in index.items {
            if let Some(wanted) = wanted
                && !page_may_contain(&page, wanted)
            {
                continue;
            }
            match page.items {
                Some(items) => leaves.extend(items),
                None => remote_pages.push(page.id),
            }
        }

        let fetched =
            try_join_all(remote_pages.iter().map(|page| self.fetch_page(page, operation))).await?;
        leaves.extend(fetched.into_iter().flatten());
        Ok(Some(leaves))
    }

    async fn fetch_page(&self, page_url: &str, operation: &str) -> Result<Vec<RegistrationLeaf>> {
        let page = self
            .get_json::<RegistrationPage>(parse_url(page_url)?, operation)
            .await?
            .ok_or_else(|| PackageError::protocol(format!("registration page {page_url} is missing")))?;
        Ok(page.items.unwrap_or_default())
    }

    fn group_applies(&self, group: &DependencyGroup) -> bool {
        match group.target_framework.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(framework) => {
                self.target_frameworks.is_empty()
                    || self.target_frameworks.contains(&normalize_framework(framework))
            }
        }
    }

    /// Dependencies from every applicable group, first occurrence of an id wins.
    fn dependencies_of(
        &self,
        entry: &CatalogEntry,
        identity: &PackageIdentity,
    ) -> Result<Vec<Dependency>> {
        let mut seen = HashSet::new();
        let mut dependencies = Vec::new();
        for group in entry.dependency_groups.iter().filter(|g| self.group_applies(g)) {
            for dep in &group.dependencies {
                if !seen.insert(dep.id.to_lowercase()) {
                    continue;
                }
                let range = VersionRange::parse(dep.range.as_deref().unwrap_or_default())
                    .and_then(|range| Dependency::new(&dep.id, range))
                    .map_err(|e| {
                        PackageError::protocol(format!(
                            "{identity} declares an invalid dependency on {}: {e}",
                            dep.id
                        ))
                    })?;
                dependencies.push(range);
            }
        }
        Ok(dependencies)
    }

    async fn lookup(&self, identity: &PackageIdentity) -> Result<ResolvedPackage> {
        let operation = format!("looking up {identity}");
        self.diagnostics.verbose(&operation);

        let leaves = self
            .registration_leaves(identity.id(), Some(identity.version()), &operation)
            .await?
            .ok_or_else(|| PackageError::not_found(identity))?;

        let entry = leaves
            .into_iter()
            .map(|leaf| leaf.catalog_entry)
            .find(|entry| parse_version(&entry.version).is_ok_and(|v| &v == identity.version()))
            .ok_or_else(|| PackageError::not_found(identity))?;

        let dependencies = self.dependencies_of(&entry, identity)?;
        Ok(ResolvedPackage::new(
            published_identity(&entry.id, identity),
            entry.title.unwrap_or_default(),
            entry.description.unwrap_or_default(),
            dependencies,
        ))
    }

    async fn best_match(&self, id: &str, range: &VersionRange) -> Result<PackageIdentity> {
        let operation = format!("matching {id}@{range}");
        self.diagnostics.verbose(&operation);

        let not_found = || PackageError::not_found(format!("{id}@{range}"));
        let leaves = self.registration_leaves(id, None, &operation).await?.ok_or_else(not_found)?;

        let listed: Vec<(&str, Version)> = leaves
            .iter()
            .map(|leaf| &leaf.catalog_entry)
            .filter(|entry| entry.is_listed())
            .filter_map(|entry| Some((entry.id.as_str(), parse_version(&entry.version).ok()?)))
            .collect();

        let best = range.best_match(listed.iter().map(|(_, v)| v)).ok_or_else(not_found)?;
        let requested = PackageIdentity::from_parts(id, best.clone())?;
        let published = listed.iter().find(|(_, v)| v == best).map_or(id, |(p, _)| *p);
        Ok(published_identity(published, &requested))
    }

    async fn fetch_archive(&self, identity: &PackageIdentity) -> Result<Bytes> {
        let operation = format!("downloading {identity}");
        self.diagnostics.verbose(&operation);

        let endpoints = self.endpoints().await?;
        let id = identity.id().to_lowercase();
        let version = identity.version().to_string().to_lowercase();
        let url = join(&endpoints.package_base, &format!("{id}/{version}/{id}.{version}.nupkg"))?;

        let response =
            self.get(url, &operation).await?.ok_or_else(|| PackageError::not_found(identity))?;
        response.bytes().await.map_err(|e| PackageError::unavailable(operation, e))
    }

    async fn query(&self, keyword: &str, skip: u64, take: u64) -> Result<SearchPage> {
        let operation = format!("searching for '{keyword}'");
        self.diagnostics.verbose(&operation);

        let endpoints = self.endpoints().await?;
        let mut url = endpoints.search.clone();
        url.query_pairs_mut()
            .append_pair("q", keyword)
            .append_pair("skip", &skip.to_string())
            .append_pair("take", &take.to_string())
            .append_pair("prerelease", "false")
            .append_pair("semVerLevel", "2.0.0");

        let response: SearchResponse = self
            .get_json(url, &operation)
            .await?
            .ok_or_else(|| PackageError::protocol("search service returned 404"))?;

        let mut packages = Vec::with_capacity(response.data.len());
        for hit in response.data {
            match PackageIdentity::new(&hit.id, &hit.version) {
                Ok(identity) => packages.push(ResolvedPackage::new(
                    identity,
                    hit.title.unwrap_or_default(),
                    hit.description.unwrap_or_default(),
                    Vec::new(),
                )),
                Err(e) => self.diagnostics.warning(&format!("skipping search hit {}: {e}", hit.id)),
            }
        }

        Ok(SearchPage {
            packages,
            total_count: response.total_hits,
        })
    }
}

#[async_trait]
impl Gallery for NugetGallery {
    async fn find_package(&self, identity: &PackageIdentity) -> Result<ResolvedPackage> {
        self.lookup(identity).await.inspect_err(|e| self.report(e))
    }

    async fn find_best_match(&self, id: &str, range: &VersionRange) -> Result<PackageIdentity> {
        self.best_match(id, range).await.inspect_err(|e| self.report(e))
    }

    async fn download(&self, identity: &PackageIdentity) -> Result<Bytes> {
        self.fetch_archive(identity).await.inspect_err(|e| self.report(e))
    }

    async fn search(&self, keyword: &str, skip: u64, take: u64) -> Result<SearchPage> {
        self.query(keyword, skip, take).await.inspect_err(|e| self.report(e))
    }
}

/// `.NETFramework,Version=v4.5` and `.NETFramework4.5` compare equal.
fn normalize_framework(name: &str) -> String {
    name.trim().to_lowercase().replace(",version=v", "").replace(",version=", "")
}

/// `requested` spelled the way the gallery publishes it. Falls back to the
/// requested spelling when the catalog id is missing or names another package.
fn published_identity(catalog_id: &str, requested: &PackageIdentity) -> PackageIdentity {
    PackageIdentity::from_parts(catalog_id, requested.version().clone())
        .ok()
        .filter(|published| published == requested)
        .unwrap_or_else(|| requested.clone())
}

fn page_may_contain(page: &RegistrationPage, wanted: &Version) -> bool {
    let lower = page.lower.as_deref().and_then(|v| parse_version(v).ok());
    let upper = page.upper.as_deref().and_then(|v| parse_version(v).ok());
    lower.is_none_or(|l| wanted >= &l) && upper.is_none_or(|u| wanted <= &u)
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| PackageError::protocol(format!("invalid URL '{raw}': {e}")))
}

/// Parse a service base address, making sure relative joins append to it.
fn base_url(raw: &str) -> Result<Url> {
    if raw.ends_with('/') {
        parse_url(raw)
    } else {
        parse_url(&format!("{raw}/"))
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path).map_err(|e| PackageError::protocol(format!("invalid URL {base}{path}: {e}")))
}
