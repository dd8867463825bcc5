/// What the schedule decided after observing one epoch's validation loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleDecision {
    /// Validation loss improved by more than the tolerance.
    Improved,
    /// No improvement yet, but patience is not exhausted.
    Waiting,
    /// Patience ran out; the learning rate was halved to this value.
    Halved(f64),
    /// Halving would drop below the floor; training should stop.
    BelowFloor,
}

/// Halves the learning rate when validation loss plateaus.
///
/// The rate only ever decreases. A NaN loss never counts as improvement,
/// so a diverging run walks the rate down to the floor and stops.
#[derive(Debug, Clone)]
pub struct PlateauSchedule {
    learning_rate: f64,
    patience: usize,
    tolerance: f64,
    min_learning_rate: f64,
    best_loss: f64,
    epochs_without_improvement: usize,
}

impl PlateauSchedule {
    pub fn new(learning_rate: f64, patience: usize, tolerance: f64, min_learning_rate: f64) -> PlateauSchedule {
        PlateauSchedule {
            learning_rate,
            patience: patience.max(1),
            tolerance,
            min_learning_rate,
            best_loss: f64::INFINITY,
            epochs_without_improvement: 0,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn observe(&mut self, validation_loss: f64) -> ScheduleDecision {
        if validation_loss < self.best_loss - self.tolerance {
            self.best_loss = validation_loss;
            self.epochs_without_improvement = 0;
            return ScheduleDecision::Improved;
        }
        if validation_loss < self.best_loss {
            self.best_loss = validation_loss;
        }

        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement < self.patience {
            return ScheduleDecision::Waiting;
        }

        self.epochs_without_improvement = 0;
        let halved = self.learning_rate / 2.0;
        if halved < self.min_learning_rate {
            return ScheduleDecision::BelowFloor;
        }
        self.learning_rate = halved;
        ScheduleDecision::Halved(halved)
    }
}
