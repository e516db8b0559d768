//! Evaluation configuration.

use std::path::Path;

use burn::prelude::*;

use crate::error::{EvalError, EvalResult};

/// Configuration of a per-class accuracy evaluation.
#[derive(Config, Debug)]
pub struct EvaluationConfig {
    /// Number of classes the model predicts, background included.
    pub class_count: usize,
    /// Label value excluded from the report (usually background).
    #[config(default = 0)]
    pub ignore_class: usize,
    /// When set, hard predictions come from `probability > score_threshold`
    /// for each class instead of the per-pixel argmax.
    #[config(default = "None")]
    pub score_threshold: Option<f64>,
}

impl EvaluationConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidConfiguration`] if no class would be
    /// evaluated, the ignore class is out of range, or the score threshold is
    /// not a probability.
    pub fn validate(&self) -> EvalResult<()> {
        if self.class_count < 2 {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "class_count must be at least 2 (background plus one class), got {}",
                    self.class_count
                ),
            });
        }

        if self.ignore_class >= self.class_count {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "ignore_class {} is out of range for {} classes",
                    self.ignore_class, self.class_count
                ),
            });
        }

        if let Some(threshold) = self.score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(EvalError::InvalidConfiguration {
                    reason: format!("score_threshold must lie in [0, 1], got {threshold}"),
                });
            }
        }

        Ok(())
    }

    /// Loads a configuration written by `save` and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidConfiguration`] if the file cannot be read
    /// or parsed, or the configuration does not validate.
    pub fn from_file(path: impl AsRef<Path>) -> EvalResult<Self> {
        let path = path.as_ref();
        let config = Self::load(path).map_err(|err| EvalError::InvalidConfiguration {
            reason: format!("cannot load {}: {err}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Class indices that get a report row, in ascending order.
    pub fn evaluated_classes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.class_count).filter(move |&class| class != self.ignore_class)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[test]
    fn defaults_ignore_background() {
        let config = EvaluationConfig::new(4);

        assert_eq!(config.ignore_class, 0);
        assert_eq!(config.score_threshold, None);
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluated_classes().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn custom_ignore_class_is_skipped() {
        let config = EvaluationConfig::new(4).with_ignore_class(2);

        assert_eq!(config.evaluated_classes().collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[rstest]
    #[case(EvaluationConfig::new(1), "class_count must be at least 2")]
    #[case(EvaluationConfig::new(3).with_ignore_class(3), "ignore_class 3 is out of range")]
    #[case(
        EvaluationConfig::new(3).with_score_threshold(Some(1.5)),
        "score_threshold must lie in [0, 1]"
    )]
    fn rejects_inconsistent_configuration(#[case] config: EvaluationConfig, #[case] expected: &str) {
        match config.validate() {
            Err(EvalError::InvalidConfiguration { reason }) => {
                assert!(reason.contains(expected), "unexpected reason: {reason}");
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evaluation.json");
        let config = EvaluationConfig::new(14).with_score_threshold(Some(0.7));

        config.save(&path).unwrap();
        let loaded = EvaluationConfig::load(&path).unwrap();

        assert_eq!(loaded.class_count, 14);
        assert_eq!(loaded.ignore_class, 0);
        assert_eq!(loaded.score_threshold, Some(0.7));
    }

    #[test]
    fn from_file_validates_what_it_loads() {
        let dir = tempfile::tempdir().unwrap();
        let valid = dir.path().join("valid.json");
        let invalid = dir.path().join("invalid.json");
        EvaluationConfig::new(5).with_ignore_class(4).save(&valid).unwrap();
        EvaluationConfig::new(3).with_ignore_class(7).save(&invalid).unwrap();

        let loaded = EvaluationConfig::from_file(&valid).unwrap();
        assert_eq!(loaded.evaluated_classes().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        match EvaluationConfig::from_file(&invalid) {
            Err(EvalError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("ignore_class 7"), "unexpected reason: {reason}");
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");

        match EvaluationConfig::from_file(&missing) {
            Err(EvalError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("missing.json"), "unexpected reason: {reason}");
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }
}
