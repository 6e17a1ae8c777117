//! Dataset catalog: the startup-provided mapping of dataset keys to sources.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::CatalogError;

/// A named, independently loaded collection of records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dataset {
    pub key: String,
    pub title: String,
    /// Source path, relative to wherever the record source is rooted.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavLink {
    pub name: String,
    pub href: String,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    title: String,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    #[serde(deserialize_with = "modules_in_file_order")]
    modules: Vec<(String, RawModule)>,
    #[serde(default)]
    default_set: Option<String>,
    #[serde(default)]
    links: Vec<NavLink>,
}

/// `modules` is a JSON object whose key order is the display order.
fn modules_in_file_order<'de, D>(d: D) -> Result<Vec<(String, RawModule)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Entries;

    impl<'de> Visitor<'de> for Entries {
        type Value = Vec<(String, RawModule)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of dataset keys to { title, path }")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, RawModule>()? {
                out.push(entry);
            }
            Ok(out)
        }
    }

    d.deserialize_map(Entries)
}

#[derive(Debug, Clone)]
pub struct Catalog {
    datasets: Vec<Dataset>,
    default_key: String,
    links: Vec<NavLink>,
}

impl Catalog {
    /// Datasets keep the order given; a repeated key keeps its first entry.
    /// Without an explicit default, the first dataset is used.
    pub fn new(datasets: Vec<Dataset>, default_key: Option<String>, links: Vec<NavLink>) -> Result<Self, CatalogError> {
        let mut datasets = datasets;
        let mut seen = BTreeSet::new();
        datasets.retain(|d| seen.insert(d.key.clone()));
        let first = datasets.first().ok_or(CatalogError::Empty)?.key.clone();
        let default_key = match default_key {
            Some(k) if datasets.iter().any(|d| d.key == k) => k,
            Some(k) => return Err(CatalogError::UnknownDefault(k)),
            None => first,
        };
        Ok(Self { datasets, default_key, links })
    }

    /// Parse the `meta.json` shape: `{ modules: { key: { title, path } }, defaultSet, links }`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_slice(bytes)?;
        let datasets = raw
            .modules
            .into_iter()
            .map(|(key, m)| Dataset { key, title: m.title, path: m.path })
            .collect();
        Self::new(datasets, raw.default_set, raw.links)
    }

    pub fn datasets(&self) -> &[Dataset] { &self.datasets }
    pub fn links(&self) -> &[NavLink] { &self.links }

    pub fn get(&self, key: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.key == key)
    }

    pub fn default_dataset(&self) -> &Dataset {
        // `new` guarantees the default key is present
        self.get(&self.default_key).unwrap_or(&self.datasets[0])
    }

    /// Resolve a possibly absent or unknown key to a dataset of this catalog.
    pub fn resolve(&self, key: Option<&str>) -> &Dataset {
        key.and_then(|k| self.get(k)).unwrap_or_else(|| self.default_dataset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = r#"{
        "modules": {
            "system": { "title": "NixOS", "path": "system.json" },
            "home": { "title": "Home Manager", "path": "home.json" }
        },
        "defaultSet": "system",
        "links": [ { "name": "Source", "href": "https://example.org" } ]
    }"#;

    #[test]
    fn parses_meta_json() {
        let c = Catalog::from_json(META.as_bytes()).unwrap();
        let keys: Vec<&str> = c.datasets().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["system", "home"]);
        assert_eq!(c.default_dataset().key, "system");
        assert_eq!(c.get("home").map(|d| d.path.as_str()), Some("home.json"));
        assert_eq!(c.links().len(), 1);
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let c = Catalog::from_json(META.as_bytes()).unwrap();
        assert_eq!(c.resolve(Some("home")).key, "home");
        assert_eq!(c.resolve(Some("nope")).key, "system");
        assert_eq!(c.resolve(None).key, "system");
    }

    #[test]
    fn missing_default_uses_first_listed_module() {
        let c = Catalog::from_json(br#"{ "modules": { "b": { "title": "B", "path": "b" }, "a": { "title": "A", "path": "a" } } }"#).unwrap();
        assert_eq!(c.default_dataset().key, "b");
        let keys: Vec<&str> = c.datasets().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn repeated_keys_keep_first_entry() {
        let ds = |k: &str, t: &str| Dataset { key: k.into(), title: t.into(), path: format!("{k}.json") };
        let c = Catalog::new(vec![ds("z", "Z1"), ds("a", "A"), ds("z", "Z2")], None, Vec::new()).unwrap();
        let keys: Vec<&str> = c.datasets().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(c.get("z").map(|d| d.title.as_str()), Some("Z1"));
    }

    #[test]
    fn rejects_empty_and_unknown_default() {
        assert!(matches!(Catalog::from_json(br#"{ "modules": {} }"#), Err(CatalogError::Empty)));
        assert!(matches!(
            Catalog::from_json(br#"{ "modules": { "a": { "title": "A", "path": "a" } }, "defaultSet": "z" }"#),
            Err(CatalogError::UnknownDefault(k)) if k == "z"
        ));
        assert!(matches!(Catalog::from_json(b"not json"), Err(CatalogError::Parse(_))));
    }
}
