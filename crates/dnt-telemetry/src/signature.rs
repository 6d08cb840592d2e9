//! Signature table identifying vendor telemetry artifacts by name or path.
//!
//! There is no vendor-supplied identifier to key on, so artifacts are
//! re-detected on every enumeration by testing names against an ordered
//! pattern list. All comparisons are ASCII case-insensitive.

use crate::types::ArtifactKind;
use serde::{Deserialize, Serialize};

/// How a pattern value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    /// Whole service name / task name equals the value.
    Exact,
    /// Service name / task name contains the value.
    Contains,
    /// Full task path (or service name) starts with the value.
    PathPrefix,
}

/// One identification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePattern {
    pub kind: ArtifactKind,
    pub match_mode: MatchMode,
    pub value: String,
}

impl SignaturePattern {
    pub fn new(kind: ArtifactKind, match_mode: MatchMode, value: impl Into<String>) -> Self {
        Self {
            kind,
            match_mode,
            value: value.into(),
        }
    }

    /// `name` is the service name or leaf task name, `path` the full task path
    /// (equal to `name` for services).
    pub fn matches(&self, name: &str, path: &str) -> bool {
        let value = self.value.to_ascii_lowercase();
        match self.match_mode {
            MatchMode::Exact => name.eq_ignore_ascii_case(&self.value),
            MatchMode::Contains => name.to_ascii_lowercase().contains(&value),
            MatchMode::PathPrefix => path.to_ascii_lowercase().starts_with(&value),
        }
    }
}

/// Ordered, immutable pattern table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureSet {
    patterns: Vec<SignaturePattern>,
}

impl SignatureSet {
    pub fn new(patterns: Vec<SignaturePattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[SignaturePattern] {
        &self.patterns
    }

    pub fn for_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &SignaturePattern> {
        self.patterns.iter().filter(move |p| p.kind == kind)
    }

    /// First pattern of `kind` matching the object, in table order.
    pub fn first_match(&self, kind: ArtifactKind, name: &str, path: &str) -> Option<&SignaturePattern> {
        self.for_kind(kind).find(|p| p.matches(name, path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for SignatureSet {
    /// Known NVIDIA telemetry artifacts.
    ///
    /// Task names carry a per-install GUID suffix (`NvTmMon_{B2FE1952-...}`),
    /// hence the substring rules.
    fn default() -> Self {
        use ArtifactKind::*;
        use MatchMode::*;
        Self::new(vec![
            SignaturePattern::new(Service, Exact, "NvTelemetryContainer"),
            SignaturePattern::new(ScheduledTask, Contains, "NvTmRep"),
            SignaturePattern::new(ScheduledTask, Contains, "NvTmMon"),
            SignaturePattern::new(ScheduledTask, Contains, "NvProfileUpdater"),
            SignaturePattern::new(ScheduledTask, PathPrefix, "\\NVIDIA\\Telemetry\\"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_is_case_insensitive() {
        let p = SignaturePattern::new(ArtifactKind::Service, MatchMode::Exact, "NvTelemetryContainer");
        assert!(p.matches("nvtelemetrycontainer", "nvtelemetrycontainer"));
        assert!(!p.matches("NvTelemetryContainer2", "NvTelemetryContainer2"));
    }

    #[test]
    fn test_contains_and_prefix() {
        let c = SignaturePattern::new(ArtifactKind::ScheduledTask, MatchMode::Contains, "NvTmMon");
        assert!(c.matches("NVTMMON_{B2FE1952-0186-46C3-BAEC-A80AA35AC5B8}", "\\x"));
        assert!(!c.matches("NvTm", "\\NvTmMon"));

        let p = SignaturePattern::new(ArtifactKind::ScheduledTask, MatchMode::PathPrefix, "\\NVIDIA\\");
        assert!(p.matches("Anything", "\\nvidia\\Anything"));
        assert!(!p.matches("Anything", "\\Other\\NVIDIA\\Anything"));
    }

    #[test]
    fn test_first_match_respects_order_and_kind() {
        let set = SignatureSet::default();
        let hit = set
            .first_match(ArtifactKind::ScheduledTask, "NvTmRepOnLogon_{X}", "\\NvTmRepOnLogon_{X}")
            .unwrap();
        assert_eq!(hit.value, "NvTmRep");
        assert!(set
            .first_match(ArtifactKind::Service, "NvTmRep", "NvTmRep")
            .is_none());
        assert!(set
            .first_match(ArtifactKind::ScheduledTask, "NvTelemetryContainer", "\\NvTelemetryContainer")
            .is_none());
    }

    #[test]
    fn test_serde_is_a_plain_list() {
        let set = SignatureSet::new(vec![SignaturePattern::new(
            ArtifactKind::Service,
            MatchMode::Exact,
            "a",
        )]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"[{"kind":"service","matchMode":"exact","value":"a"}]"#);
    }
}
