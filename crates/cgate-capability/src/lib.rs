// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cgate-capability
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Builtins removed from every capability document before rules run.
///
/// Each of these lets a rule observe or touch the world outside its inputs,
/// which would make evaluations non-reproducible.
pub const DENIED_BUILTINS: &[&str] = &["opa.runtime", "http.send", "net.lookup_ip_addr"];

/// One builtin entry in a capability document.
///
/// Only the name matters to the filter; declarations and other fields are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Builtin {
    /// Builtin function name (e.g. `"http.send"`).
    pub name: String,

    /// Remaining declaration fields, passed through verbatim.
    #[serde(flatten)]
    pub decl: BTreeMap<String, serde_json::Value>,
}

impl Builtin {
    /// A builtin entry with just a name and no declaration payload.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decl: BTreeMap::new(),
        }
    }
}

/// A rule-engine capability document.
///
/// Mirrors the engine's own JSON shape: a list of available builtins plus an
/// `allow_net` host allowlist. Fields this crate does not interpret are
/// preserved via the flattened `extra` map so a restricted document stays
/// valid for whatever engine version produced the baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDocument {
    /// Builtin functions rules may call.
    #[serde(default)]
    pub builtins: Vec<Builtin>,

    /// Hosts rules may reach. `Some(vec![String::new()])` denies all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_net: Option<Vec<String>>,

    /// Engine fields carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CapabilityDocument {
    /// The baseline document assumed when the runner does not supply one.
    ///
    /// The inventory lists the builtins the evaluation pipeline cares about
    /// either way: the deny-listed ones (so restriction is observable) and
    /// the common pure builtins rule bundles lean on.
    #[must_use]
    pub fn baseline() -> Self {
        let names = [
            "count",
            "concat",
            "contains",
            "endswith",
            "json.unmarshal",
            "lower",
            "regex.match",
            "sprintf",
            "startswith",
            "time.now_ns",
            "time.parse_rfc3339_ns",
            "trim_prefix",
            "opa.runtime",
            "http.send",
            "net.lookup_ip_addr",
        ];
        Self {
            builtins: names.into_iter().map(Builtin::named).collect(),
            allow_net: None,
            extra: BTreeMap::new(),
        }
    }

    /// Apply the sandbox restriction in place: drop the deny-listed
    /// builtins and deny all outbound network access.
    pub fn restrict(&mut self) {
        self.builtins
            .retain(|b| !DENIED_BUILTINS.contains(&b.name.as_str()));
        self.allow_net = Some(vec![String::new()]);
    }

    /// A restricted copy of this document.
    #[must_use]
    pub fn restricted(&self) -> Self {
        let mut doc = self.clone();
        doc.restrict();
        doc
    }

    /// Serialize to the JSON bytes handed to the rule engine.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails (a document
    /// holding non-serializable extra values).
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn restrict_removes_denied_builtins() {
        let mut doc = CapabilityDocument::baseline();
        doc.restrict();

        let names: Vec<&str> = doc.builtins.iter().map(|b| b.name.as_str()).collect();
        for denied in DENIED_BUILTINS {
            assert!(!names.contains(denied), "{denied} must be removed");
        }
        assert!(names.contains(&"json.unmarshal"));
    }

    #[test]
    fn restrict_denies_all_network_access() {
        let mut doc = CapabilityDocument::baseline();
        doc.restrict();
        assert_eq!(doc.allow_net, Some(vec![String::new()]));
    }

    #[test]
    fn restrict_is_idempotent() {
        let once = CapabilityDocument::baseline().restricted();
        let twice = once.restricted();
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_fields_round_trip() {
        let raw = json!({
            "builtins": [
                {"name": "http.send", "decl": {"type": "function"}},
                {"name": "count", "decl": {"type": "function"}},
            ],
            "future_keywords": ["in", "every"],
            "wasm_abi_versions": [{"version": 1, "minor_version": 2}],
        });

        let doc: CapabilityDocument =
            serde_json::from_value(raw).expect("parse engine document");
        let restricted = doc.restricted();

        assert_eq!(restricted.builtins.len(), 1);
        assert_eq!(restricted.builtins[0].name, "count");
        // The declaration payload and unknown top-level fields survive.
        assert!(restricted.builtins[0].decl.contains_key("decl"));
        assert!(restricted.extra.contains_key("future_keywords"));
        assert!(restricted.extra.contains_key("wasm_abi_versions"));
    }

    #[test]
    fn bytes_are_valid_json() {
        let bytes = CapabilityDocument::baseline()
            .restricted()
            .to_bytes()
            .expect("serialize");
        let back: serde_json::Value =
            serde_json::from_slice(&bytes).expect("parse emitted bytes");
        assert_eq!(back["allow_net"], json!([""]));
    }
}
