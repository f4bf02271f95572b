//! Media-kind dispatch
//!
//! Decides which processors see which documents. Never touches the document.

use std::collections::BTreeSet;

use crate::document::AssetDocument;
use crate::types::Processor;

/// Declared extension in document form: lowercase, no leading dot
fn normalize_extension(declared: &str) -> String {
    declared.trim_start_matches('.').to_ascii_lowercase()
}

/// Whether `processor` should run on `document`
///
/// Empty extension or kind sets accept everything. Extension matching is
/// case-insensitive and ignores a leading dot; the kind comes from
/// `source.superType` when present.
pub fn is_applicable(processor: &dyn Processor, document: &AssetDocument) -> bool {
    let extensions = processor.supported_extensions();
    if !extensions.is_empty() {
        let ext = document.extension();
        if !extensions.iter().any(|e| normalize_extension(e) == ext) {
            return false;
        }
    }

    let kinds = processor.supported_kinds();
    kinds.is_empty() || kinds.contains(&document.super_type())
}

/// Union of all declared extension sets, lowercased
///
/// `None` means every extension is accepted, which is the case as soon as one
/// processor declares an empty set.
pub fn supported_extensions<'a, I>(processors: I) -> Option<BTreeSet<String>>
where
    I: IntoIterator<Item = &'a dyn Processor>,
{
    let mut union = BTreeSet::new();
    for processor in processors {
        let declared = processor.supported_extensions();
        if declared.is_empty() {
            return None;
        }
        union.extend(declared.iter().map(|e| normalize_extension(e)));
    }
    if union.is_empty() {
        None
    } else {
        Some(union)
    }
}
