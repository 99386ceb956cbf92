//! Candidate-URL discovery collaborator.
//!
//! Source-specific scraping lives outside this crate; the orchestrator
//! sees one `UrlDiscovery` per listing source. The in-tree implementation
//! reads a pre-scraped extraction plan (JSON) so runs can be driven from
//! the CLI without the scraping subsystem.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{HarvestError, SourceError};
use crate::types::Property;

/// Supplies candidate photo URLs for one listing source.
#[async_trait]
pub trait UrlDiscovery: Send + Sync {
    /// Source identifier (stable, used in stats and hash records).
    fn source(&self) -> &str;

    /// Candidate URLs for a property, in source order.
    async fn discover_urls(&self, property: &Property) -> Result<Vec<String>, SourceError>;
}

/// Discovery backed by a pre-scraped plan file: property key -> URLs,
/// one instance per source.
pub struct PlanFileDiscovery {
    source: String,
    urls: BTreeMap<String, Vec<String>>,
}

#[async_trait]
impl UrlDiscovery for PlanFileDiscovery {
    fn source(&self) -> &str {
        &self.source
    }

    async fn discover_urls(&self, property: &Property) -> Result<Vec<String>, SourceError> {
        Ok(self.urls.get(&property.key).cloned().unwrap_or_default())
    }
}

/// Parsed extraction plan: the property list plus one discovery per source
/// named anywhere in the file.
pub struct ExtractionPlan {
    pub properties: Vec<Property>,
    pub discoveries: Vec<Arc<dyn UrlDiscovery>>,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    properties: Vec<PlanProperty>,
}

#[derive(Debug, Deserialize)]
struct PlanProperty {
    key: String,
    #[serde(default)]
    sources: BTreeMap<String, Vec<String>>,
}

impl ExtractionPlan {
    /// Load a plan from a JSON file:
    ///
    /// ```json
    /// {
    ///   "properties": [
    ///     {"key": "123-main-st",
    ///      "sources": {"mls": ["https://..."], "portal": ["https://..."]}}
    ///   ]
    /// }
    /// ```
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let content = std::fs::read_to_string(path)?;
        let plan: PlanFile = serde_json::from_str(&content)?;
        Ok(Self::from_plan(plan))
    }

    fn from_plan(plan: PlanFile) -> Self {
        let mut by_source: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        let mut properties = Vec::with_capacity(plan.properties.len());

        for property in plan.properties {
            for (source, urls) in &property.sources {
                by_source
                    .entry(source.clone())
                    .or_default()
                    .insert(property.key.clone(), urls.clone());
            }
            properties.push(Property::new(property.key));
        }

        let discoveries = by_source
            .into_iter()
            .map(|(source, urls)| {
                Arc::new(PlanFileDiscovery { source, urls }) as Arc<dyn UrlDiscovery>
            })
            .collect();

        Self {
            properties,
            discoveries,
        }
    }
}
