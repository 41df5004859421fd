//! Structured path metadata.
//!
//! ## Path Layout
//!
//! Canonical relative paths encode their selection metadata positionally:
//! each directory level corresponds to one declared schema field, and the
//! final segment is the file name. A schema is declared compactly as
//!
//! ```text
//! runyear/system/energy/trigger/production/day%d/runnumber%d
//! ```
//!
//! where a trailing `%d` (integer) or `%f` (float) overrides the default
//! string type. Resolving `Run10/AuAu/11GeV/all/P10ih/149/11149081/<file>`
//! against that schema yields `runyear = "Run10"`, ..., `day = 149`,
//! `runnumber = 11149081`.
//!
//! The file name additionally carries the DAQ stream and the pico
//! production type (`st_physics_adc_11149081_raw_2520001.picoDst.root`
//! carries stream `st_physics_adc` and pico type `raw`). Extracting them
//! requires the already-resolved run number and is best effort: a file
//! name that does not split cleanly leaves both unset.
//!
//! Resolution is a pure function of (path, schema, class suffix); repeated
//! resolution of the same path always yields identical metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SdmsError, SdmsResult};

/// Namespace prefix of structured-metadata fields in staging selectors.
pub const METADATA_NAMESPACE: &str = "starDetails";

/// The fixed structured-metadata query vocabulary.
///
/// These are the bare field names a staging request set may select on;
/// they are the schema field universe plus the derived `stream`.
pub const QUERY_FIELDS: &[&str] = &[
    "runyear",
    "system",
    "energy",
    "trigger",
    "production",
    "day",
    "runnumber",
    "stream",
];

/// The declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form text.
    Str,
    /// Signed integer.
    Int,
    /// Floating-point number.
    Float,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Float => "float",
        })
    }
}

/// One named, typed field of a path schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
}

/// An ordered, typed path schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSchema {
    fields: Vec<SchemaField>,
}

/// A single resolved metadata value.
///
/// The variant order matters: serde tries untagged variants in
/// declaration order, and an integer must not deserialize as a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Structured metadata resolved from one canonical relative path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredMetadata(pub BTreeMap<String, MetaValue>);

impl StructuredMetadata {
    /// Looks up a field by bare name.
    pub fn get(&self, field: &str) -> Option<&MetaValue> {
        self.0.get(field)
    }

    /// Returns the resolved run number, if the schema declared one.
    pub fn run_number(&self) -> Option<i64> {
        match self.get("runnumber") {
            Some(MetaValue::Int(n)) => Some(*n),
            _ => None,
        }
    }
}

impl PathSchema {
    /// Parses a compact schema declaration.
    pub fn parse(decl: &str) -> SdmsResult<Self> {
        let mut fields = Vec::new();

        for segment in decl.split('/') {
            if segment.is_empty() {
                return Err(SdmsError::InvalidSchema {
                    decl: decl.to_owned(),
                    reason: "empty field name",
                });
            }

            let field = match segment.split_once('%') {
                Some((name, marker)) => {
                    let kind = match marker {
                        "s" => FieldKind::Str,
                        "d" => FieldKind::Int,
                        "f" => FieldKind::Float,
                        _ => {
                            return Err(SdmsError::InvalidSchema {
                                decl: decl.to_owned(),
                                reason: "unknown type marker",
                            })
                        }
                    };

                    if name.is_empty() {
                        return Err(SdmsError::InvalidSchema {
                            decl: decl.to_owned(),
                            reason: "empty field name",
                        });
                    }

                    SchemaField {
                        name: name.to_owned(),
                        kind,
                    }
                }
                None => SchemaField {
                    name: segment.to_owned(),
                    kind: FieldKind::Str,
                },
            };

            fields.push(field);
        }

        Ok(Self { fields })
    }

    /// The declared fields, in path order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Resolves a canonical relative path into structured metadata.
    ///
    /// The final path segment is the file name: it is not zipped against
    /// the schema and only feeds the stream/pico-type extraction. The
    /// directory segment count must equal the declared field count.
    pub fn resolve(&self, rel_path: &str, class_suffix: &str) -> SdmsResult<StructuredMetadata> {
        let segments: Vec<&str> = rel_path.split('/').collect();

        if segments.len() != self.fields.len() + 1 {
            return Err(SdmsError::SchemaMismatch {
                path: rel_path.to_owned(),
                expected: self.fields.len(),
                found: segments.len().saturating_sub(1),
            });
        }

        let mut map = BTreeMap::new();
        for (field, segment) in self.fields.iter().zip(&segments) {
            let value = match field.kind {
                FieldKind::Str => MetaValue::Str((*segment).to_owned()),
                FieldKind::Int => {
                    MetaValue::Int(segment.parse().map_err(|_| SdmsError::TypeCoercion {
                        field: field.name.clone(),
                        value: (*segment).to_owned(),
                        kind: field.kind,
                    })?)
                }
                FieldKind::Float => {
                    MetaValue::Float(segment.parse().map_err(|_| SdmsError::TypeCoercion {
                        field: field.name.clone(),
                        value: (*segment).to_owned(),
                        kind: field.kind,
                    })?)
                }
            };

            map.insert(field.name.clone(), value);
        }

        let mut metadata = StructuredMetadata(map);
        extract_stream(&mut metadata, segments[self.fields.len()], class_suffix);

        Ok(metadata)
    }
}

impl FromStr for PathSchema {
    type Err = SdmsError;

    fn from_str(decl: &str) -> SdmsResult<Self> {
        Self::parse(decl)
    }
}

/// Best-effort extraction of the DAQ stream and pico production type.
///
/// The file name must be `<stream>_<runnumber>_<suffix>.<classSuffix>`
/// with the stream anchored at the start and beginning with `st_`. The
/// pico type is the first token of the stripped suffix when the suffix
/// has exactly two `_`-separated tokens, the whole stripped suffix
/// otherwise. Anything that does not split cleanly leaves both unset.
fn extract_stream(metadata: &mut StructuredMetadata, file_name: &str, class_suffix: &str) {
    let run_number = match metadata.run_number() {
        Some(n) => n,
        None => return,
    };

    let pattern = match Regex::new(&format!("(st_.*)_{}", run_number)) {
        Ok(pattern) => pattern,
        Err(_) => return,
    };

    let captures = match pattern.captures(file_name) {
        Some(captures) => captures,
        None => return,
    };

    let (matched, stream) = match (captures.get(0), captures.get(1)) {
        (Some(matched), Some(stream)) if matched.start() == 0 => (matched, stream),
        _ => return,
    };

    let rest = &file_name[matched.end()..];
    if !rest.starts_with('_') || !rest.ends_with(class_suffix) {
        return;
    }

    let stripped = &rest[1..rest.len() - class_suffix.len()];
    if stripped.is_empty() {
        return;
    }

    let parts: Vec<&str> = stripped.split('_').collect();
    let pico_type = if parts.len() == 2 { parts[0] } else { stripped };

    metadata
        .0
        .insert("stream".to_owned(), MetaValue::Str(stream.as_str().to_owned()));
    metadata
        .0
        .insert("picoType".to_owned(), MetaValue::Str(pico_type.to_owned()));
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_SCHEMA: &str = "runyear/system/energy/trigger/production/day%d/runnumber%d";

    #[test]
    fn test_schema_parse() {
        let schema = PathSchema::parse(FULL_SCHEMA).unwrap();

        assert_eq!(7, schema.fields().len());
        assert_eq!("runyear", schema.fields()[0].name);
        assert_eq!(FieldKind::Str, schema.fields()[0].kind);
        assert_eq!("day", schema.fields()[5].name);
        assert_eq!(FieldKind::Int, schema.fields()[5].kind);

        PathSchema::parse("a//b").unwrap_err();
        PathSchema::parse("a%x/b").unwrap_err();
        PathSchema::parse("%d").unwrap_err();
    }

    #[test]
    fn test_resolve_short_schema() {
        let schema = PathSchema::parse("runyear/day%d/runnumber%d").unwrap();
        let metadata = schema
            .resolve("Run10/149/11149081/file.picoDst.root", ".picoDst.root")
            .unwrap();

        assert_eq!(
            Some(&MetaValue::Str("Run10".to_owned())),
            metadata.get("runyear")
        );
        assert_eq!(Some(&MetaValue::Int(149)), metadata.get("day"));
        assert_eq!(Some(&MetaValue::Int(11149081)), metadata.get("runnumber"));

        // `file` is not a stream name, so the enrichment stays unset
        assert_eq!(None, metadata.get("stream"));
        assert_eq!(None, metadata.get("picoType"));
    }

    #[test]
    fn test_resolve_full_path() {
        let schema = PathSchema::parse(FULL_SCHEMA).unwrap();
        let metadata = schema
            .resolve(
                "Run10/AuAu/11GeV/all/P10ih/149/11149081/st_physics_adc_11149081_raw_2520001.picoDst.root",
                ".picoDst.root",
            )
            .unwrap();

        assert_eq!(
            Some(&MetaValue::Str("AuAu".to_owned())),
            metadata.get("system")
        );
        assert_eq!(
            Some(&MetaValue::Str("P10ih".to_owned())),
            metadata.get("production")
        );
        assert_eq!(Some(11149081), metadata.run_number());
        assert_eq!(
            Some(&MetaValue::Str("st_physics_adc".to_owned())),
            metadata.get("stream")
        );
        assert_eq!(
            Some(&MetaValue::Str("raw".to_owned())),
            metadata.get("picoType")
        );
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let schema = PathSchema::parse(FULL_SCHEMA).unwrap();
        let path =
            "Run10/AuAu/11GeV/all/P10ih/149/11149081/st_physics_adc_11149081_raw_2520001.picoDst.root";

        let first = schema.resolve(path, ".picoDst.root").unwrap();
        let second = schema.resolve(path, ".picoDst.root").unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_segment_count_mismatch() {
        let schema = PathSchema::parse(FULL_SCHEMA).unwrap();

        let err = schema
            .resolve("Run10/AuAu/11GeV/file.picoDst.root", ".picoDst.root")
            .unwrap_err();
        assert_eq!("SchemaMismatch", err.name());

        let err = schema.resolve("Run10", ".picoDst.root").unwrap_err();
        assert_eq!("SchemaMismatch", err.name());
    }

    #[test]
    fn test_resolve_coercion_failure() {
        let schema = PathSchema::parse("runyear/day%d/runnumber%d").unwrap();

        let err = schema
            .resolve("Run10/notaday/11149081/file.picoDst.root", ".picoDst.root")
            .unwrap_err();

        match err {
            SdmsError::TypeCoercion { field, value, .. } => {
                assert_eq!("day", field);
                assert_eq!("notaday", value);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_stream_requires_leading_match() {
        let schema = PathSchema::parse("runyear/runnumber%d").unwrap();

        // stream not anchored at the start of the file name
        let metadata = schema
            .resolve("Run10/11149081/xst_physics_11149081_raw_1.picoDst.root", ".picoDst.root")
            .unwrap();
        assert_eq!(None, metadata.get("stream"));
    }

    #[test]
    fn test_pico_type_takes_whole_suffix_when_not_two_tokens() {
        let schema = PathSchema::parse("runyear/runnumber%d").unwrap();

        let metadata = schema
            .resolve(
                "Run10/11149081/st_physics_11149081_raw_extra_1.picoDst.root",
                ".picoDst.root",
            )
            .unwrap();

        assert_eq!(
            Some(&MetaValue::Str("st_physics".to_owned())),
            metadata.get("stream")
        );
        assert_eq!(
            Some(&MetaValue::Str("raw_extra_1".to_owned())),
            metadata.get("picoType")
        );
    }

    #[test]
    fn test_metadata_serde_round_trip() {
        let schema = PathSchema::parse(FULL_SCHEMA).unwrap();
        let metadata = schema
            .resolve(
                "Run10/AuAu/11GeV/all/P10ih/149/11149081/st_physics_adc_11149081_raw_2520001.picoDst.root",
                ".picoDst.root",
            )
            .unwrap();

        let json = serde_json::to_string(&metadata).unwrap();
        let back: StructuredMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(metadata, back);
        assert_eq!(Some(&MetaValue::Int(149)), back.get("day"));
    }
}
