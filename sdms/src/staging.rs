//! Staging tiers and data classes.
//!
//! Both enumerations are fixed: data classes because every class needs a
//! catalog suffix convention agreed with production, staging tiers because
//! each tier is backed by provisioned hardware. Configuration selects from
//! them but cannot extend them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SdmsError, SdmsResult};

/// A class of data files tracked by the catalog.
///
/// The data class doubles as the staging *target*: staging request sets and
/// replica catalogs are partitioned by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataClass {
    /// Compact event trees for physics analysis.
    #[serde(rename = "picoDst")]
    PicoDst,

    /// Jet-specific derived trees.
    #[serde(rename = "picoDstJet")]
    PicoDstJet,
}

impl DataClass {
    /// All recognized data classes.
    pub fn all() -> &'static [DataClass] {
        &[Self::PicoDst, Self::PicoDstJet]
    }

    /// Returns the catalog name of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PicoDst => "picoDst",
            Self::PicoDstJet => "picoDstJet",
        }
    }

    /// File suffix recognizing members of this class, e.g. `.picoDst.root`.
    pub fn file_suffix(&self) -> String {
        format!(".{}.root", self.as_str())
    }
}

impl FromStr for DataClass {
    type Err = SdmsError;

    fn from_str(name: &str) -> SdmsResult<Self> {
        Self::all()
            .iter()
            .find(|class| class.as_str() == name)
            .copied()
            .ok_or_else(|| SdmsError::UnknownDataClass {
                name: name.to_owned(),
            })
    }
}

impl fmt::Display for DataClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A disk tier files can be staged onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageTier {
    /// Fast disk served through XRootD.
    #[serde(rename = "XRD")]
    Xrd,

    /// Generic disk space.
    #[serde(rename = "Disk")]
    Disk,
}

impl StageTier {
    /// All recognized staging tiers.
    pub fn all() -> &'static [StageTier] {
        &[Self::Xrd, Self::Disk]
    }

    /// Returns the catalog name of the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xrd => "XRD",
            Self::Disk => "Disk",
        }
    }
}

impl FromStr for StageTier {
    type Err = SdmsError;

    fn from_str(name: &str) -> SdmsResult<Self> {
        Self::all()
            .iter()
            .find(|tier| tier.as_str() == name)
            .copied()
            .ok_or_else(|| SdmsError::UnknownStageTier {
                name: name.to_owned(),
            })
    }
}

impl fmt::Display for StageTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_class_round_trip() {
        for class in DataClass::all() {
            assert_eq!(*class, class.as_str().parse().unwrap());
        }

        "picodst".parse::<DataClass>().unwrap_err();
        "".parse::<DataClass>().unwrap_err();
    }

    #[test]
    fn test_stage_tier_round_trip() {
        for tier in StageTier::all() {
            assert_eq!(*tier, tier.as_str().parse().unwrap());
        }

        "xrd".parse::<StageTier>().unwrap_err();
        "Tape".parse::<StageTier>().unwrap_err();
    }

    #[test]
    fn test_file_suffix() {
        assert_eq!(".picoDst.root", DataClass::PicoDst.file_suffix());
    }

    #[test]
    fn test_serde_names_match_catalog_names() {
        let json: String = serde_json::to_string(&DataClass::PicoDstJet).unwrap();
        assert_eq!("\"picoDstJet\"", json);

        let tier: StageTier = serde_json::from_str("\"XRD\"").unwrap();
        assert_eq!(StageTier::Xrd, tier);
    }
}
