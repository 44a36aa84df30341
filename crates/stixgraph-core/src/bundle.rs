//! Bundle loading: read a STIX document and classify its objects.

use std::path::Path;

use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::types::ThreatObject;

/// Counts gathered while classifying a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub entities: usize,
    pub relationships: usize,
    pub ignored: usize,
    pub retired_skipped: usize,
}

/// A parsed STIX bundle: classified objects in document order.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub objects: Vec<ThreatObject>,
    pub summary: LoadSummary,
}

/// Options controlling which classified objects are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Drop revoked or deprecated objects before they reach the graph.
    pub skip_retired: bool,
}

impl Bundle {
    /// Read and parse a bundle file.
    pub fn from_path(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let bundle = Self::from_json_str(&raw, options)?;
        tracing::info!(
            path = %path.display(),
            entities = bundle.summary.entities,
            relationships = bundle.summary.relationships,
            ignored = bundle.summary.ignored,
            "Loaded bundle"
        );
        Ok(bundle)
    }

    /// Parse a bundle from a JSON string.
    pub fn from_json_str(raw: &str, options: LoadOptions) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        Self::from_value(&value, options)
    }

    /// Classify every element of the document's `objects` array.
    pub fn from_value(value: &serde_json::Value, options: LoadOptions) -> Result<Self> {
        let elements = value
            .get("objects")
            .and_then(|v| v.as_array())
            .ok_or(CoreError::MissingObjects)?;

        let mut summary = LoadSummary::default();
        let mut objects = Vec::with_capacity(elements.len());

        for element in elements {
            let Some(obj) = ThreatObject::classify(element) else {
                summary.ignored += 1;
                continue;
            };
            if options.skip_retired && obj.is_retired() {
                summary.retired_skipped += 1;
                continue;
            }
            match &obj {
                ThreatObject::Entity(_) => summary.entities += 1,
                ThreatObject::Relationship(_) => summary.relationships += 1,
            }
            objects.push(obj);
        }

        Ok(Self { objects, summary })
    }
}
