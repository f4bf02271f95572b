//! Confidence-scored keyword accumulation
//!
//! Keywords are grouped by namespace. A duplicate text keeps the highest
//! confidence ever offered for it and the suggestable flag is sticky, so the
//! order in which processors add keywords never lowers a score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace used by [`crate::document::AssetDocument::add_keywords`]
pub const DEFAULT_KEYWORD_NAMESPACE: &str = "keywords";

/// One keyword entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    /// Always within [0, 1]
    pub confidence: f64,
    /// Offered to users as a search suggestion
    pub suggest: bool,
}

/// Per-namespace keyword sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordAccumulator {
    buckets: BTreeMap<String, BTreeMap<String, Keyword>>,
}

impl KeywordAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge words into `namespace`
    ///
    /// Confidence is clamped into [0, 1] on entry (NaN counts as 0). Words are
    /// trimmed; empty words are ignored.
    pub fn add<I, S>(&mut self, namespace: &str, confidence: f64, suggest: bool, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        for word in words {
            let text = word.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            let bucket = self.buckets.entry(namespace.to_string()).or_default();
            bucket
                .entry(text.to_string())
                .and_modify(|existing| {
                    existing.confidence = existing.confidence.max(confidence);
                    existing.suggest |= suggest;
                })
                .or_insert_with(|| Keyword {
                    text: text.to_string(),
                    confidence,
                    suggest,
                });
        }
    }

    /// Merge every entry of `other` using the same max/sticky rules
    pub fn merge(&mut self, other: &KeywordAccumulator) {
        for (namespace, bucket) in &other.buckets {
            for keyword in bucket.values() {
                self.add(
                    namespace,
                    keyword.confidence,
                    keyword.suggest,
                    [keyword.text.as_str()],
                );
            }
        }
    }

    pub fn get(&self, namespace: &str, text: &str) -> Option<&Keyword> {
        self.buckets.get(namespace)?.get(text.trim())
    }

    pub fn confidence(&self, namespace: &str, text: &str) -> Option<f64> {
        self.get(namespace, text).map(|k| k.confidence)
    }

    /// Keywords of one namespace, ordered by text
    pub fn namespace(&self, namespace: &str) -> Vec<&Keyword> {
        self.buckets
            .get(namespace)
            .map(|b| b.values().collect())
            .unwrap_or_default()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(BTreeMap::is_empty)
    }

    /// `{ namespace: [ {text, confidence, suggest}, ... ] }`
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .buckets
            .iter()
            .map(|(ns, bucket)| {
                let entries = bucket
                    .values()
                    .filter_map(|k| serde_json::to_value(k).ok())
                    .collect();
                (ns.clone(), serde_json::Value::Array(entries))
            })
            .collect();
        serde_json::Value::Object(map)
    }

    /// Inverse of [`KeywordAccumulator::to_json`]; malformed entries are skipped
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut acc = Self::new();
        if let Some(map) = value.as_object() {
            for (ns, entries) in map {
                for entry in entries.as_array().into_iter().flatten() {
                    if let Ok(keyword) = serde_json::from_value::<Keyword>(entry.clone()) {
                        acc.add(ns, keyword.confidence, keyword.suggest, [keyword.text]);
                    }
                }
            }
        }
        acc
    }
}
