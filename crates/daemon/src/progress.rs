use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

struct Board {
    units: HashMap<String, f64>,
    reported: f64,
}

/// Overall progress of a unit tree: the unweighted mean of every registered unit's fraction.
///
/// Units are keyed by id, so reports may arrive in any order and from any task. The published value
/// never decreases, even when a late registration pulls the mean down.
#[derive(Clone)]
pub struct ProgressBoard {
    board: Arc<Mutex<Board>>,
    tx: Arc<watch::Sender<f64>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0.0);
        ProgressBoard {
            board: Arc::new(Mutex::new(Board {
                units: HashMap::new(),
                reported: 0.0,
            })),
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.tx.subscribe()
    }

    pub fn register(&self, unit: &str) {
        let mut board = self.board.lock().unwrap_or_else(|e| e.into_inner());
        board.units.entry(unit.to_string()).or_insert(0.0);
    }

    /// Record `fraction` for `unit`. A unit's own fraction only moves forward.
    pub fn report(&self, unit: &str, fraction: f64) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let mut board = self.board.lock().unwrap_or_else(|e| e.into_inner());
        let slot = board.units.entry(unit.to_string()).or_insert(0.0);
        *slot = slot.max(fraction);

        let mean = board.units.values().sum::<f64>() / board.units.len() as f64;
        if mean > board.reported {
            board.reported = mean;
            self.tx.send_replace(mean);
        }
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overall(board: &ProgressBoard) -> f64 {
        *board.subscribe().borrow()
    }

    #[test]
    fn mean_over_registered_units() {
        let board = ProgressBoard::new();
        board.register("root");
        board.register("root.0.1");
        board.report("root.0.1", 1.0);
        assert_eq!(overall(&board), 0.5);
        board.report("root", 0.5);
        assert_eq!(overall(&board), 0.75);
    }

    #[test]
    fn order_of_reports_does_not_matter() {
        let a = ProgressBoard::new();
        let b = ProgressBoard::new();
        for unit in ["x", "y", "z"] {
            a.register(unit);
            b.register(unit);
        }
        a.report("x", 0.3);
        a.report("z", 0.9);
        b.report("z", 0.9);
        b.report("x", 0.3);
        assert_eq!(overall(&a), overall(&b));
    }

    #[test]
    fn published_value_never_decreases() {
        let board = ProgressBoard::new();
        let rx = board.subscribe();
        board.report("root", 0.8);
        board.register("late");
        board.report("root", 0.2);
        assert_eq!(*rx.borrow(), 0.8);
        board.report("late", 1.0);
        assert_eq!(overall(&board), 0.9);
        board.report("root", 7.0);
        assert_eq!(overall(&board), 1.0);
    }

    #[tokio::test]
    async fn concurrent_reports_settle_at_one() {
        let board = ProgressBoard::new();
        let units: Vec<String> = (0..8).map(|i| format!("unit-{}", i)).collect();
        for unit in &units {
            board.register(unit);
        }
        let tasks: Vec<_> = units
            .into_iter()
            .map(|unit| {
                let board = board.clone();
                tokio::spawn(async move {
                    for step in 1..=10 {
                        board.report(&unit, step as f64 / 10.0);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(overall(&board), 1.0);
    }
}
