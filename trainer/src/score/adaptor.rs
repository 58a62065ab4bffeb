use crate::data::{Trial, props};

/// Rewrites the handler-scoped points of the leaf it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointAdaptor {
    /// Multiply every present value.
    Factor(i64),
    /// Zero all values, e.g. for practice leaves.
    Nullable,
}

impl PointAdaptor {
    pub fn adapt(&self, scope_id: &str, trials: &mut [Trial]) {
        for trial in trials {
            for name in [props::MIN_POINTS, props::POINTS, props::MAX_POINTS] {
                match self {
                    PointAdaptor::Factor(factor) => {
                        if let Some(value) = trial.int(scope_id, name) {
                            trial.set(scope_id, name, value * factor);
                        }
                    }
                    PointAdaptor::Nullable => trial.set(scope_id, name, 0),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_scales_only_present_values() {
        let mut trials = vec![Trial::new("t").with("h", props::POINTS, 3)];
        PointAdaptor::Factor(4).adapt("h", &mut trials);
        assert_eq!(trials[0].int("h", props::POINTS), Some(12));
        assert_eq!(trials[0].int("h", props::MAX_POINTS), None);
    }

    #[test]
    fn nullable_zeroes_everything() {
        let mut trials = vec![Trial::new("t").with_points("h", 1, 2, 3)];
        PointAdaptor::Nullable.adapt("h", &mut trials);
        for name in [props::MIN_POINTS, props::POINTS, props::MAX_POINTS] {
            assert_eq!(trials[0].int("h", name), Some(0));
        }
    }
}
