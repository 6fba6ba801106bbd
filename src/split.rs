//! Patient-wise stratified train/val/test splitting.
//!
//! All records of a patient land in exactly one subset, label ratios are approximately
//! preserved, and the whole assignment is a pure function of the seed.

use qu::ick_use::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Label, LabeledNote, PatientId};

pub const TRAIN_RATIO: f64 = 0.7;
pub const VAL_RATIO: f64 = 0.1;
pub const TEST_RATIO: f64 = 0.2;

/// Label classes smaller than this are sampled as part of the largest class.
const MIN_STRATUM: usize = 5;

/// The sampling primitive injected into the splitter: put one label class of patients into
/// the order it will be cut up in.
pub trait Sampler {
    fn arrange(&mut self, class: &mut Vec<PatientId>);
}

/// Production sampler: a seeded Fisher-Yates shuffle. Same seed, same order.
pub struct ShuffleSampler {
    rng: StdRng,
}

impl ShuffleSampler {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for ShuffleSampler {
    fn arrange(&mut self, class: &mut Vec<PatientId>) {
        class.shuffle(&mut self.rng);
    }
}

/// The three disjoint outputs of a split.
#[derive(Debug, Default)]
pub struct Split {
    pub train: Vec<LabeledNote>,
    pub val: Vec<LabeledNote>,
    pub test: Vec<LabeledNote>,
}

pub struct PatientWiseSplitter<S> {
    sampler: S,
}

impl PatientWiseSplitter<ShuffleSampler> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(ShuffleSampler::seeded(seed))
    }
}

impl<S: Sampler> PatientWiseSplitter<S> {
    pub fn new(sampler: S) -> Self {
        Self { sampler }
    }

    pub fn split(mut self, records: Vec<LabeledNote>) -> Split {
        if records.is_empty() {
            return Split::default();
        }

        // Collapse to unique (patient, first-seen label) pairs, in first-seen order.
        let mut patient_label: BTreeMap<PatientId, Label> = BTreeMap::new();
        let mut order: Vec<PatientId> = Vec::new();
        for rec in &records {
            patient_label.entry(rec.patient_id).or_insert_with(|| {
                order.push(rec.patient_id);
                rec.label
            });
        }

        // Group into label classes, preserving first-seen patient order within a class.
        let mut classes: BTreeMap<Label, Vec<PatientId>> = BTreeMap::new();
        for pid in &order {
            classes.entry(patient_label[pid]).or_default().push(*pid);
        }

        // Classes too small to stratify ride along with the largest class (smallest label on
        // ties). Records keep their true label; only the sampling key changes.
        let majority = *classes
            .iter()
            .max_by_key(|(label, pats)| (pats.len(), std::cmp::Reverse(**label)))
            .map(|(label, _)| label)
            .expect("at least one label class");
        let small: Vec<Label> = classes
            .iter()
            .filter(|(label, pats)| **label != majority && pats.len() < MIN_STRATUM)
            .map(|(label, _)| *label)
            .collect();
        for label in small {
            let pats = classes
                .remove(&label)
                .expect("inconsistent label class map");
            event!(
                Level::WARN,
                "label class {} has only {} patients; sampling it with class {}",
                label,
                pats.len(),
                majority
            );
            classes
                .get_mut(&majority)
                .expect("majority class present")
                .extend(pats);
        }

        // Two-stage cut per class: 80/20 into train+val vs test, then the 80 into 70/10.
        let mut train_pats = BTreeSet::new();
        let mut val_pats = BTreeSet::new();
        let mut test_pats = BTreeSet::new();
        for (_, mut pats) in classes {
            self.sampler.arrange(&mut pats);
            let n = pats.len();
            let n_test = (n as f64 * TEST_RATIO).round() as usize;
            let rest = n - n_test;
            let n_val = (rest as f64 * (VAL_RATIO / (TRAIN_RATIO + VAL_RATIO))).round() as usize;
            for (idx, pid) in pats.into_iter().enumerate() {
                if idx < n_test {
                    test_pats.insert(pid);
                } else if idx < n_test + n_val {
                    val_pats.insert(pid);
                } else {
                    train_pats.insert(pid);
                }
            }
        }
        event!(
            Level::INFO,
            "patient split: {} train / {} val / {} test",
            train_pats.len(),
            val_pats.len(),
            test_pats.len()
        );

        // Expand each patient set back to record level.
        let mut split = Split::default();
        for rec in records {
            if train_pats.contains(&rec.patient_id) {
                split.train.push(rec);
            } else if val_pats.contains(&rec.patient_id) {
                split.val.push(rec);
            } else {
                debug_assert!(test_pats.contains(&rec.patient_id));
                split.test.push(rec);
            }
        }
        split
    }
}
