use std::sync::{Arc, Mutex};

use argmin::core::{observers::Observe, Error, State, KV};

/// Records the best loss after every optimizer iteration.
///
/// Clones share one buffer, so a copy handed to an argmin `Executor` can be read
/// back through the original once the run is over.
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    history: Arc<Mutex<Vec<f64>>>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded losses
    pub fn values(&self) -> Vec<f64> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.history.lock().map(|history| history.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<I> Observe<I> for LossHistory
where
    I: State<Float = f64>,
{
    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), Error> {
        let cost = state.get_best_cost();
        tracing::debug!("Iteration {}: best loss {:.6e}", state.get_iter(), cost);
        self.history
            .lock()
            .map_err(|_| anyhow::anyhow!("loss history lock poisoned"))?
            .push(cost);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argmin::core::{observers::ObserverMode, CostFunction, Executor};
    use argmin::solver::neldermead::NelderMead;

    struct Bowl;

    impl CostFunction for Bowl {
        type Param = Vec<f64>;
        type Output = f64;

        fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
            Ok((x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2))
        }
    }

    #[test]
    fn test_history_records_every_iteration() {
        let history = LossHistory::new();
        let simplex = vec![vec![0.0, 0.0], vec![0.1, 0.0], vec![0.0, 0.1]];
        let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex);
        let res = Executor::new(Bowl, solver)
            .configure(|state| state.max_iters(40))
            .add_observer(history.clone(), ObserverMode::Always)
            .run()
            .unwrap();

        let values = history.values();
        assert!(!values.is_empty());
        assert!(values.len() as u64 <= res.state.get_iter() + 1);
        assert!(values.windows(2).all(|w| w[1] <= w[0]));
        assert!(values.last().unwrap() < &1.0);
    }
}
