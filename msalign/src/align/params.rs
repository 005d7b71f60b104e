use serde::{Serialize, Deserialize};

use crate::algorithm::scoring::ToleranceOpts;
use crate::algorithm::stable_marriage::ProposerSide;
use crate::error::{AlignError, Result};

/// Knobs of the social graph used by the socially stable matching.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialOpts {
    pub top_k: usize,      // nearest candidates linked per row
    pub threshold: f64,    // min co-clustering probability for a friend
}

impl Default for SocialOpts {
    fn default() -> Self {
        Self { top_k: 10, threshold: 0.75 }
    }
}

fn default_gap_penalty() -> f64 {
    -1.0
}

/// Row-to-row matching strategy applied at every fold step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum MatchingMethod {
    /// Greedy heaviest-edge matching.
    #[default]
    ApproxMaxWeight,
    StableMarriage {
        #[serde(default)]
        proposer: ProposerSide,
    },
    SociallyStable(SocialOpts),
    /// Retention-time ordered global alignment; needs a pairwise library.
    SequenceAlignment {
        #[serde(default = "default_gap_penalty")]
        gap_penalty: f64,
    },
}

impl MatchingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            MatchingMethod::ApproxMaxWeight => "approx_max_weight",
            MatchingMethod::StableMarriage { .. } => "stable_marriage",
            MatchingMethod::SociallyStable(_) => "socially_stable",
            MatchingMethod::SequenceAlignment { .. } => "sequence_alignment",
        }
    }

    #[inline]
    pub fn needs_library(&self) -> bool {
        matches!(self, MatchingMethod::SequenceAlignment { .. })
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            MatchingMethod::SociallyStable(opts) => {
                if opts.top_k == 0 {
                    return Err(AlignError::invalid("top_k", "must be at least 1"));
                }
                if !(0.0..=1.0).contains(&opts.threshold) {
                    return Err(AlignError::invalid(
                        "threshold",
                        format!("must lie in [0, 1], got {}", opts.threshold),
                    ));
                }
            }
            MatchingMethod::SequenceAlignment { gap_penalty } => {
                if !gap_penalty.is_finite() || *gap_penalty > 0.0 {
                    return Err(AlignError::invalid(
                        "gap_penalty",
                        format!("must be finite and <= 0, got {}", gap_penalty),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parameters of a whole alignment run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignParams {
    pub tolerance: ToleranceOpts,
    /// Weight of the geometric score when blending with co-clustering evidence.
    pub alpha: f64,
    /// Blend scores with row co-clustering when a grouping prior is available.
    pub use_grouping: bool,
    /// Multiply scores by pairwise library weights when a library is available.
    pub use_library_weight: bool,
    pub method: MatchingMethod,
}

impl Default for AlignParams {
    fn default() -> Self {
        AlignParams {
            tolerance: ToleranceOpts::default(),
            alpha: 0.5,
            use_grouping: false,
            use_library_weight: false,
            method: MatchingMethod::default(),
        }
    }
}

impl AlignParams {
    pub fn with_method(mut self, method: MatchingMethod) -> Self {
        self.method = method;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.tolerance.validate()?;
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(AlignError::invalid("alpha", format!("must lie in [0, 1], got {}", self.alpha)));
        }
        self.method.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = AlignParams::default();
        assert_eq!(p.alpha, 0.5);
        assert_eq!(p.method, MatchingMethod::ApproxMaxWeight);
        assert!(p.validate().is_ok());
        assert_eq!(SocialOpts::default().top_k, 10);
    }

    #[test]
    fn test_partial_json() {
        let p: AlignParams = serde_json::from_str(
            r#"{"alpha": 0.25, "method": {"name": "sequence_alignment"}, "tolerance": {"mass_tol": 10.0, "ppm": true, "rt_tol": null}}"#,
        )
        .unwrap();
        assert_eq!(p.alpha, 0.25);
        assert_eq!(p.method, MatchingMethod::SequenceAlignment { gap_penalty: -1.0 });
        assert!(p.tolerance.ppm);
        assert_eq!(p.tolerance.rt_tol, None);
        assert!(p.method.needs_library());
    }

    #[test]
    fn test_social_method_json() {
        let m: MatchingMethod = serde_json::from_str(r#"{"name": "socially_stable", "top_k": 3}"#).unwrap();
        assert_eq!(m, MatchingMethod::SociallyStable(SocialOpts { top_k: 3, threshold: 0.75 }));
        let m: MatchingMethod = serde_json::from_str(r#"{"name": "stable_marriage", "proposer": "incoming"}"#).unwrap();
        assert_eq!(m, MatchingMethod::StableMarriage { proposer: ProposerSide::Incoming });
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let p = AlignParams { alpha: -0.1, ..Default::default() };
        assert!(matches!(p.validate(), Err(AlignError::InvalidParameter { name: "alpha", .. })));

        let p = AlignParams::default().with_method(MatchingMethod::SequenceAlignment { gap_penalty: 2.0 });
        assert!(matches!(p.validate(), Err(AlignError::InvalidParameter { name: "gap_penalty", .. })));

        let p = AlignParams::default().with_method(MatchingMethod::SociallyStable(SocialOpts { top_k: 0, threshold: 0.5 }));
        assert!(p.validate().is_err());
    }
}
