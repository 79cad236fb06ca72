// ABOUTME: Site configuration: which selectors to use on which site.
// ABOUTME: Loaded from JSON files and matched against page URLs by host name.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::mapping::FieldMapping;

/// A saved field mapping for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    pub site_name: String,
    pub site_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_url: Option<String>,
    #[serde(default)]
    pub field_mappings: FieldMapping,
}

impl SiteConfig {
    /// Reads a single config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = read(path)?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads a file holding either one config object or an array of them.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>, ConfigError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            Many(Vec<SiteConfig>),
            One(Box<SiteConfig>),
        }

        let path = path.as_ref();
        let raw = read(path)?;
        let parsed: OneOrMany = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(match parsed {
            OneOrMany::Many(configs) => configs,
            OneOrMany::One(config) => vec![*config],
        })
    }

    /// Whether `page_url` belongs to this site.
    ///
    /// Host names match when either contains the other, so `www.shop.com`
    /// and `shop.com` are the same site.
    pub fn matches_url(&self, page_url: &Url) -> bool {
        let Some(page_host) = page_url.host_str() else {
            return false;
        };
        let Some(site_host) = host_of(&self.site_url) else {
            return false;
        };
        page_host.contains(site_host.as_str()) || site_host.contains(page_host)
    }

    /// The list selector for bulk crawls, when configured.
    pub fn list_selector(&self) -> Option<&str> {
        self.field_mappings.list_selector()
    }
}

/// Finds the first config whose site matches `page_url`.
pub fn find_for_url<'a>(configs: &'a [SiteConfig], page_url: &Url) -> Option<&'a SiteConfig> {
    configs.iter().find(|c| c.matches_url(page_url))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Host of a configured site URL. A bare host name is accepted too.
fn host_of(site_url: &str) -> Option<String> {
    let site_url = site_url.trim();
    let parsed = Url::parse(site_url).or_else(|_| Url::parse(&format!("https://{}", site_url)));
    parsed
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|h| !h.is_empty())
}
