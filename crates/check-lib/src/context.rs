//! Per-evaluation context handed to check functions

use crate::levels::{Levels, LevelsParam, LevelsPredictor};
use crate::value_store::{ItemValueStore, StoreScope};
use std::sync::Arc;

/// Everything a check function may consult besides its sections
#[derive(Debug)]
pub struct CheckContext {
    /// Evaluation timestamp (seconds since the epoch)
    pub now: f64,
    pub host: String,
    /// Value store view scoped to the evaluated service
    pub value_store: ItemValueStore,
    predictor: Option<Arc<dyn LevelsPredictor>>,
}

impl CheckContext {
    pub fn new(host: impl Into<String>, now: f64, value_store: ItemValueStore) -> Self {
        Self {
            now,
            host: host.into(),
            value_store,
            predictor: None,
        }
    }

    /// Context with an empty value store that is not persisted anywhere
    pub fn detached(check: &str, item: Option<&str>, now: f64) -> Self {
        Self::new(
            "localhost",
            now,
            ItemValueStore::detached(StoreScope::new("localhost", check, item)),
        )
    }

    pub fn with_predictor(mut self, predictor: Option<Arc<dyn LevelsPredictor>>) -> Self {
        self.predictor = predictor;
        self
    }

    /// Resolve configured levels for `metric`
    ///
    /// `reference` is what percentage levels are relative to.
    pub fn levels(&self, param: &LevelsParam, metric: &str, reference: Option<f64>) -> Levels {
        Levels::resolve(param, reference, metric, self.predictor.clone())
    }

    pub fn into_value_store(self) -> ItemValueStore {
        self.value_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::BaselinePredictor;

    #[test]
    fn test_levels_use_context_predictor() {
        let predictor: Arc<dyn LevelsPredictor> =
            Arc::new(BaselinePredictor::default().with_curve("load1", vec![2.0]));
        let ctx = CheckContext::detached("cpu_loads", None, 0.0).with_predictor(Some(predictor));

        let levels = ctx.levels(
            &LevelsParam::Predictive(Default::default()),
            "load1",
            None,
        );
        match levels {
            Levels::Predictive(p) => {
                assert_eq!(p.metric, "load1");
                assert!(p.predictor.is_some());
            }
            other => panic!("unexpected levels {:?}", other),
        }
    }

    #[test]
    fn test_percentage_levels_need_reference() {
        let ctx = CheckContext::detached("mem_used", None, 0.0);
        let levels = ctx.levels(&LevelsParam::Percentage(80.0, 90.0), "mem_used", Some(100.0));
        assert!(matches!(
            levels,
            Levels::PercentageRelative { reference, .. } if reference == 100.0
        ));
    }
}
