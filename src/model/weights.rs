use std::path::Path;

use serde::{Deserialize, Serialize};

/// Category weights and per-tool sub-weights of the composite rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankWeights {
    pub aff_w: f64,
    pub pro_w: f64,
    pub imm_w: f64,
    /// Accepted but not applied: allele counts enter the rank unweighted.
    pub num_all_w: f64,
    pub aff_flurry: f64,
    pub aff_netmhc: f64,
    /// Reserved for a NetCTL affinity source; not applied.
    pub aff_netctl: f64,
    pub pro_flurry: f64,
    /// Reserved for a NetMHC processing source; not applied.
    pub pro_netmhc: f64,
    pub vaxijen_w: f64,
    pub iedb_w: f64,
    /// Reserved for PRIME immunogenicity; not applied.
    pub prime_w: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WeightProfile {
    /// Defaults of the ranking function.
    #[default]
    Function,
    /// Values seeded by the weights form: sub-weights follow `aff_w`.
    Dashboard,
}

impl RankWeights {
    pub fn function_v1() -> Self {
        Self {
            aff_w: 0.3,
            pro_w: 0.1,
            imm_w: 0.3,
            num_all_w: 0.3,
            aff_flurry: 1.0,
            aff_netmhc: 1.0,
            aff_netctl: 0.2,
            pro_flurry: 1.0,
            pro_netmhc: 1.0,
            vaxijen_w: 1.0,
            iedb_w: 1.0,
            prime_w: 1.0,
        }
    }

    pub fn dashboard_v1() -> Self {
        let aff_w = 0.3;
        Self {
            aff_w,
            pro_w: 0.1,
            imm_w: 0.3,
            num_all_w: 0.1,
            aff_flurry: aff_w,
            aff_netmhc: aff_w,
            aff_netctl: 0.2,
            pro_flurry: aff_w,
            pro_netmhc: aff_w,
            vaxijen_w: aff_w,
            iedb_w: aff_w,
            prime_w: aff_w,
        }
    }

    pub fn for_profile(profile: WeightProfile) -> Self {
        match profile {
            WeightProfile::Function => Self::function_v1(),
            WeightProfile::Dashboard => Self::dashboard_v1(),
        }
    }

    pub fn as_pairs(&self) -> [(&'static str, f64); 12] {
        [
            ("aff_w", self.aff_w),
            ("pro_w", self.pro_w),
            ("imm_w", self.imm_w),
            ("num_all_w", self.num_all_w),
            ("aff_flurry", self.aff_flurry),
            ("aff_netmhc", self.aff_netmhc),
            ("aff_netctl", self.aff_netctl),
            ("pro_flurry", self.pro_flurry),
            ("pro_netmhc", self.pro_netmhc),
            ("vaxijen_w", self.vaxijen_w),
            ("iedb_w", self.iedb_w),
            ("prime_w", self.prime_w),
        ]
    }
}

impl Default for RankWeights {
    fn default() -> Self {
        Self::function_v1()
    }
}

/// Partial weights, layered over a profile. Shared by the weights file, the
/// command line and session requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, clap::Args)]
#[serde(deny_unknown_fields)]
pub struct RankWeightsPatch {
    /// Overall binding affinity weight
    #[arg(long)]
    pub aff_w: Option<f64>,
    /// Overall processing score weight
    #[arg(long)]
    pub pro_w: Option<f64>,
    /// Overall immunogenicity/antigenicity weight
    #[arg(long)]
    pub imm_w: Option<f64>,
    /// Number of binding alleles weight (not applied)
    #[arg(long)]
    pub num_all_w: Option<f64>,
    /// MHCflurry binding affinity weight
    #[arg(long)]
    pub aff_flurry: Option<f64>,
    /// NetMHC (IEDB) binding affinity weight
    #[arg(long)]
    pub aff_netmhc: Option<f64>,
    /// NetCTL affinity weight (reserved)
    #[arg(long)]
    pub aff_netctl: Option<f64>,
    /// MHCflurry processing score weight
    #[arg(long)]
    pub pro_flurry: Option<f64>,
    /// NetMHC processing score weight (reserved)
    #[arg(long)]
    pub pro_netmhc: Option<f64>,
    /// VaxiJen antigenicity weight
    #[arg(long)]
    pub vaxijen_w: Option<f64>,
    /// IEDB immunogenicity weight
    #[arg(long, alias = "iedbimm-w")]
    #[serde(alias = "iedbimm_w")]
    pub iedb_w: Option<f64>,
    /// PRIME weight (reserved)
    #[arg(long)]
    pub prime_w: Option<f64>,
}

impl RankWeightsPatch {
    pub fn from_json_file(path: &Path) -> Result<Self, WeightsError> {
        let text = std::fs::read_to_string(path).map_err(|source| WeightsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| WeightsError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn apply(&self, weights: &mut RankWeights) {
        let slots: [(Option<f64>, &mut f64); 12] = [
            (self.aff_w, &mut weights.aff_w),
            (self.pro_w, &mut weights.pro_w),
            (self.imm_w, &mut weights.imm_w),
            (self.num_all_w, &mut weights.num_all_w),
            (self.aff_flurry, &mut weights.aff_flurry),
            (self.aff_netmhc, &mut weights.aff_netmhc),
            (self.aff_netctl, &mut weights.aff_netctl),
            (self.pro_flurry, &mut weights.pro_flurry),
            (self.pro_netmhc, &mut weights.pro_netmhc),
            (self.vaxijen_w, &mut weights.vaxijen_w),
            (self.iedb_w, &mut weights.iedb_w),
            (self.prime_w, &mut weights.prime_w),
        ];
        for (value, slot) in slots {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeightsError {
    #[error("failed to read weights file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid weights file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Profile, then weights file, then individual overrides.
pub fn resolve_weights(
    profile: WeightProfile,
    file: Option<&Path>,
    overrides: &RankWeightsPatch,
) -> Result<RankWeights, WeightsError> {
    let mut weights = RankWeights::for_profile(profile);
    if let Some(path) = file {
        RankWeightsPatch::from_json_file(path)?.apply(&mut weights);
    }
    overrides.apply(&mut weights);
    Ok(weights)
}
