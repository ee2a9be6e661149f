//! Content-signature scanning (spec §4.L): "If the event carries a file
//! blob, run the blob through a compiled pattern set; each match emits an
//! Alert tagged with the pattern id and severity high."
//!
//! Patterns are loaded from `RULES_DIR/yara/*.yml` — the prototype shells
//! out to the `yara` library, which is not part of this workspace's
//! dependency stack; patterns here are plain regexes compiled once at load,
//! which covers the same "named pattern matches a blob" contract without
//! fabricating a YARA binding.

use regex::Regex;
use siem_core::{Error, ErrorCode, Result};
use std::path::Path;

#[derive(Debug, Clone, serde::Deserialize)]
struct RawSignature {
    id: String,
    pattern: String,
}

pub struct Signature {
    pub id: String,
    regex: Regex,
}

impl Signature {
    pub fn matches(&self, blob: &[u8]) -> bool {
        match std::str::from_utf8(blob) {
            Ok(text) => self.regex.is_match(text),
            Err(_) => false,
        }
    }
}

pub fn load_signatures(rules_dir: &str) -> Result<Vec<Signature>> {
    let dir = Path::new(rules_dir).join("yara");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut signatures = Vec::new();
    for entry in std::fs::read_dir(&dir)
        .map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))?
    {
        let entry = entry.map_err(|e| Error::new(ErrorCode::RuleCompilationError, e.to_string()))?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yml" || e == "yaml")
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::new(ErrorCode::RuleCompilationError, format!("{}: {e}", path.display())))?;
        let raw: RawSignature = serde_yaml::from_str(&contents)
            .map_err(|e| Error::new(ErrorCode::RuleCompilationError, format!("{}: {e}", path.display())))?;
        let regex = Regex::new(&raw.pattern)
            .map_err(|e| Error::new(ErrorCode::RuleCompilationError, format!("{}: {e}", raw.id)))?;
        signatures.push(Signature { id: raw.id, regex });
    }
    signatures.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(signatures)
}

/// Scans `blob` against every compiled signature, returning the ids of every
/// pattern that matched, in load order.
pub fn scan(signatures: &[Signature], blob: &[u8]) -> Vec<String> {
    signatures
        .iter()
        .filter(|sig| sig.matches(blob))
        .map(|sig| sig.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_reports_only_matching_pattern_ids() {
        let signatures = vec![
            Signature {
                id: "eicar".to_string(),
                regex: Regex::new("EICAR-STANDARD-ANTIVIRUS-TEST-FILE").unwrap(),
            },
            Signature {
                id: "powershell-encoded".to_string(),
                regex: Regex::new("-enc ").unwrap(),
            },
        ];
        let hits = scan(&signatures, b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*");
        assert_eq!(hits, vec!["eicar".to_string()]);
    }
}
