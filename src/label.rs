//! Mapping of admission attributes to discrete task labels.

use qu::ick_use::*;

use crate::Label;

/// How a numeric admission attribute becomes a label.
///
/// New tasks add a schedule here instead of branching inside the pipeline.
#[derive(Debug, Clone)]
pub enum LabelSchedule {
    /// Ordered `(upper bound, label)` pairs, right-inclusive, with a catch-all label for
    /// values above the last bound.
    Buckets {
        bounds: Vec<(f64, Label)>,
        catch_all: Label,
    },
    /// The attribute already is the label (e.g. a 0/1 flag).
    Identity,
}

impl LabelSchedule {
    /// Build a bucketed schedule, checking the bounds are strictly ascending.
    pub fn buckets(bounds: Vec<(f64, Label)>, catch_all: Label) -> Result<Self> {
        ensure!(
            bounds.windows(2).all(|w| w[0].0 < w[1].0),
            "bucket bounds must be strictly ascending"
        );
        Ok(LabelSchedule::Buckets { bounds, catch_all })
    }

    /// The length-of-stay schedule: <=3 days -> 0, <=7 -> 1, <=14 -> 2, <=21 -> 3, else 4.
    pub fn los_weeks() -> Self {
        LabelSchedule::Buckets {
            bounds: vec![(3.0, 0), (7.0, 1), (14.0, 2), (21.0, 3)],
            catch_all: 4,
        }
    }

    /// Assign a label to a value. Total over all finite reals; a value exactly on a bound
    /// belongs to the lower bucket.
    pub fn assign(&self, value: f64) -> Label {
        match self {
            LabelSchedule::Buckets { bounds, catch_all } => bounds
                .iter()
                .find(|(bound, _)| value <= *bound)
                .map(|(_, label)| *label)
                .unwrap_or(*catch_all),
            LabelSchedule::Identity => value as Label,
        }
    }
}
