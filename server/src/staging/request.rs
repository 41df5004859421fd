//! Staging request sets.
//!
//! Operators declare intent as an ordered list of request sets in a JSON
//! file. Each set carries two control fields naming the target data class
//! and the staging tier, plus any number of structured-metadata selectors.
//! Compilation validates a set as a whole: one bad field rejects the set,
//! sibling sets still apply.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use sdms::metadata::{MetaValue, StructuredMetadata, METADATA_NAMESPACE, QUERY_FIELDS};
use sdms::staging::{DataClass, StageTier};

use crate::error::{ServerError, ServerResult};

/// Control field naming the staging tier.
///
/// Operators' request files spell the tier field `stageTarget`, a
/// spelling predating the target/tier split. Kept for compatibility
/// with existing request files.
pub const CONTROL_TIER: &str = "stageTarget";

/// Control field naming the target data class.
pub const CONTROL_TARGET: &str = "target";

/// The staging request file.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestFile {
    pub sets: Vec<BTreeMap<String, Value>>,
}

/// One compiled staging directive.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDirective {
    /// The data class the directive selects from.
    pub target: DataClass,

    /// The tier selected files should be staged onto.
    pub tier: StageTier,

    /// Namespaced-field selectors, all of which must match.
    pub selector: BTreeMap<String, Value>,
}

impl StageDirective {
    /// Whether the directive selects a record with this metadata.
    pub fn matches(&self, metadata: &StructuredMetadata) -> bool {
        self.selector.iter().all(|(key, expected)| {
            let bare = key
                .strip_prefix(METADATA_NAMESPACE)
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(key);

            match metadata.get(bare) {
                Some(actual) => value_matches(actual, expected),
                None => false,
            }
        })
    }
}

fn value_matches(actual: &MetaValue, expected: &Value) -> bool {
    match actual {
        MetaValue::Str(s) => expected.as_str() == Some(s.as_str()),
        MetaValue::Int(n) => expected.as_i64() == Some(*n),
        MetaValue::Float(f) => expected.as_f64() == Some(*f),
    }
}

fn control_field<'a>(
    set: &'a BTreeMap<String, Value>,
    field: &'static str,
) -> ServerResult<&'a str> {
    set.get(field)
        .and_then(Value::as_str)
        .ok_or(ServerError::MissingControlField { field })
}

/// Compiles one request set into a directive.
pub fn compile_set(set: &BTreeMap<String, Value>) -> ServerResult<StageDirective> {
    let tier: StageTier = control_field(set, CONTROL_TIER)?.parse()?;
    let target: DataClass = control_field(set, CONTROL_TARGET)?.parse()?;

    let mut selector = BTreeMap::new();
    for (key, value) in set {
        if key == CONTROL_TIER || key == CONTROL_TARGET {
            continue;
        }

        let namespaced = if key.starts_with(METADATA_NAMESPACE) {
            key.clone()
        } else if QUERY_FIELDS.contains(&key.as_str()) {
            format!("{METADATA_NAMESPACE}.{key}")
        } else {
            return Err(ServerError::UnknownQueryField { key: key.clone() });
        };

        selector.insert(namespaced, value.clone());
    }

    Ok(StageDirective {
        target,
        tier,
        selector,
    })
}

/// Loads and compiles the staging request file.
///
/// Rejected sets are reported by content so operators can fix them; the
/// surviving sets still apply.
pub async fn load_directives(path: &Path) -> ServerResult<Vec<StageDirective>> {
    let bytes = tokio::fs::read(path).await?;
    let file: RequestFile = serde_json::from_slice(&bytes)?;

    let mut directives = Vec::new();
    for set in &file.sets {
        match compile_set(set) {
            Ok(directive) => directives.push(directive),
            Err(e) => tracing::warn!("Rejecting request set {:?}: {}", set, e),
        }
    }

    Ok(directives)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn set(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_compile_rewrites_bare_fields() {
        let directive = compile_set(&set(json!({
            "target": "picoDst",
            "stageTarget": "XRD",
            "runyear": "Run10",
            "starDetails.day": 149,
        })))
        .unwrap();

        assert_eq!(DataClass::PicoDst, directive.target);
        assert_eq!(StageTier::Xrd, directive.tier);
        assert_eq!(
            Some(&json!("Run10")),
            directive.selector.get("starDetails.runyear")
        );
        assert_eq!(Some(&json!(149)), directive.selector.get("starDetails.day"));
    }

    #[test]
    fn test_compile_rejects_unknown_tier_and_target() {
        let err = compile_set(&set(json!({
            "target": "picoDst",
            "stageTarget": "Tape",
        })))
        .unwrap_err();
        assert_eq!("UnknownStageTier", err.name());

        let err = compile_set(&set(json!({
            "target": "microDst",
            "stageTarget": "XRD",
        })))
        .unwrap_err();
        assert_eq!("UnknownDataClass", err.name());
    }

    #[test]
    fn test_compile_rejects_unknown_field() {
        let err = compile_set(&set(json!({
            "target": "picoDst",
            "stageTarget": "XRD",
            "flavour": "strange",
        })))
        .unwrap_err();
        assert_eq!("UnknownQueryField", err.name());
    }

    #[test]
    fn test_compile_requires_control_fields() {
        let err = compile_set(&set(json!({"stageTarget": "XRD"}))).unwrap_err();
        assert_eq!("MissingControlField", err.name());

        // control fields must be strings, not numbers
        let err = compile_set(&set(json!({
            "target": "picoDst",
            "stageTarget": 1,
        })))
        .unwrap_err();
        assert_eq!("MissingControlField", err.name());
    }

    #[test]
    fn test_directive_matching() {
        let directive = compile_set(&set(json!({
            "target": "picoDst",
            "stageTarget": "XRD",
            "runyear": "Run10",
            "day": 149,
        })))
        .unwrap();

        let schema = sdms::metadata::PathSchema::parse("runyear/day%d/runnumber%d").unwrap();
        let matching = schema
            .resolve("Run10/149/11149081/a.picoDst.root", ".picoDst.root")
            .unwrap();
        let wrong_day = schema
            .resolve("Run10/150/11150042/a.picoDst.root", ".picoDst.root")
            .unwrap();

        assert!(directive.matches(&matching));
        assert!(!directive.matches(&wrong_day));
    }

    #[test]
    fn test_sibling_sets_survive_a_rejection() {
        let file: RequestFile = serde_json::from_value(json!({
            "sets": [
                {"target": "picoDst", "stageTarget": "Tape"},
                {"target": "picoDst", "stageTarget": "XRD", "runyear": "Run10"},
            ]
        }))
        .unwrap();

        let directives: Vec<_> = file.sets.iter().filter_map(|s| compile_set(s).ok()).collect();

        assert_eq!(1, directives.len());
        assert_eq!(StageTier::Xrd, directives[0].tier);
    }
}
