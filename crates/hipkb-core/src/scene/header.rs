//! Header metadata extraction.
//!
//! A handful of well-known members carry the save version, save time, and
//! freeform `key = value` metadata. Different Houdini releases disagree on
//! spelling, so both historical variants of each key are recognized.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:houdini_version|_HIP_SAVEVERSION)\s*=?\s*["']?(\d+\.\d+(?:\.\d+)?)"#)
        .expect("version regex must compile")
});

static SAVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:_HIP_SAVETIME|hip_savetime)\s*=?\s*["']?([^"'\n]+)"#)
        .expect("save-time regex must compile")
});

static KEY_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\w+)\s*=\s*(?:"([^"]*)"|(.*))$"#).expect("key-value regex must compile")
});

/// Whether a normalized member name is one of the header carriers.
pub fn is_header_name(name: &str) -> bool {
    matches!(name, ".hip" | "Houdini" | ".OPfallbacks" | "houdini.hip") || name.ends_with(".def")
}

/// First Houdini version mentioned in `text`, if any.
pub fn find_version(text: &str) -> Option<String> {
    VERSION_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// First save timestamp mentioned in `text`, if any.
pub fn find_save_time(text: &str) -> Option<String> {
    SAVE_TIME_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

/// Collect `identifier = value` lines into `metadata`, last write wins.
pub fn collect_metadata(text: &str, metadata: &mut BTreeMap<String, String>) {
    for line in text.lines() {
        let line = line.trim();
        if let Some(caps) = KEY_VALUE_RE.captures(line) {
            let key = caps[1].to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            metadata.insert(key, value);
        }
    }
}
