//! The two dataset-extraction pipelines.
//!
//! Both read NOTEEVENTS.csv and ADMISSIONS.csv from the MIMIC directory, join notes to
//! admissions on the admission id, derive a label, and write a patient-wise 70/10/20 split.

use itertools::Itertools;
use qu::ick_use::*;
use std::{collections::BTreeMap, path::Path};

use crate::{
    filter::NoteFilter, label::LabelSchedule, redact::RuleSet, split::PatientWiseSplitter,
    write::DatasetWriter, Admissions, Label, LabeledNote, Note, NoteEvents,
};

pub const NOTES_FILE: &str = "NOTEEVENTS.csv";
pub const ADMISSIONS_FILE: &str = "ADMISSIONS.csv";

/// Length-of-stay task: 5-class classification of the stay duration, written as
/// `LOS_WEEKS[_adm]` with label column `LOS_label`.
///
/// Stays that ended in death are excluded; predicting length of stay for them is a
/// different problem (and the mortality task covers it).
pub fn los_task(mimic_dir: &Path, save_dir: &Path, seed: u64, admission_only: bool) -> Result {
    let filter = NoteFilter::new(admission_only);
    let task_name = filter.task_name("LOS_WEEKS");

    let (notes, admissions) = load_tables(mimic_dir, &filter)?;

    let schedule = LabelSchedule::los_weeks();
    let labeled = join_notes(notes, &admissions, |adm| {
        if adm.expire_flag {
            None
        } else {
            Some(schedule.assign(adm.los_days()))
        }
    });
    event!(
        Level::INFO,
        "{} labeled records after join, label counts {:?}",
        labeled.len(),
        label_counts(&labeled)
    );

    let split = PatientWiseSplitter::seeded(seed).split(labeled);
    DatasetWriter::new(save_dir).write_split(&task_name, "LOS_label", &split)
}

/// In-hospital mortality task: binary classification of the expire flag, written as
/// `MP_IN[_adm]` with label column `HOSPITAL_EXPIRE_FLAG`.
pub fn mp_task(mimic_dir: &Path, save_dir: &Path, seed: u64, admission_only: bool) -> Result {
    let filter = NoteFilter::new(admission_only);
    let task_name = filter.task_name("MP_IN");

    let (notes, admissions) = load_tables(mimic_dir, &filter)?;

    let schedule = LabelSchedule::Identity;
    let labeled = join_notes(notes, &admissions, |adm| {
        Some(schedule.assign(adm.expire_flag as u8 as f64))
    });
    event!(Level::INFO, "{} labeled records after join", labeled.len());

    let labeled = RuleSet::death_mentions().filter_records(labeled);
    event!(
        Level::INFO,
        "{} records after death-mention redaction, label counts {:?}",
        labeled.len(),
        label_counts(&labeled)
    );

    let split = PatientWiseSplitter::seeded(seed).split(labeled);
    DatasetWriter::new(save_dir).write_split(&task_name, "HOSPITAL_EXPIRE_FLAG", &split)
}

fn load_tables(mimic_dir: &Path, filter: &NoteFilter) -> Result<(Vec<Note>, Admissions)> {
    let notes = NoteEvents::load_orig(mimic_dir.join(NOTES_FILE))?;
    let admissions = Admissions::load_orig(mimic_dir.join(ADMISSIONS_FILE))?;
    event!(
        Level::INFO,
        "loaded {} notes and {} admissions",
        notes.len(),
        admissions.len()
    );

    let notes = filter.apply(&notes, &admissions);
    event!(Level::INFO, "{} notes after filtering", notes.len());
    Ok((notes, admissions))
}

/// Left join of notes with a per-admission label. Notes whose admission is unknown, or for
/// which `label` returns `None`, are filtered out rather than treated as errors.
fn join_notes(
    notes: Vec<Note>,
    admissions: &Admissions,
    label: impl Fn(&crate::Admission) -> Option<Label>,
) -> Vec<LabeledNote> {
    notes
        .into_iter()
        .filter_map(|note| {
            let adm = admissions.find_by_id(note.admission_id)?;
            let label = label(adm)?;
            Some(LabeledNote {
                row_id: note.row_id,
                patient_id: note.patient_id,
                admission_id: note.admission_id,
                text: note.text,
                label,
            })
        })
        .collect()
}

fn label_counts(records: &[LabeledNote]) -> BTreeMap<Label, usize> {
    records.iter().counts_by(|r| r.label).into_iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Admission;
    use chrono::NaiveDate;

    fn admission(admission_id: u64, days: u32, expire_flag: bool) -> Admission {
        Admission {
            row_id: admission_id,
            patient_id: admission_id,
            admission_id,
            admit_time: NaiveDate::from_ymd_opt(2150, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            discharge_time: NaiveDate::from_ymd_opt(2150, 1, 1 + days)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            admission_type: "EMERGENCY".into(),
            expire_flag,
        }
    }

    fn note(row_id: u64, admission_id: u64) -> Note {
        Note {
            row_id,
            patient_id: row_id,
            admission_id,
            chart_date: None,
            text: "text".into(),
        }
    }

    #[test]
    fn join_drops_unmatched_and_expired_admissions() {
        let admissions = Admissions::new(vec![
            admission(1, 2, false),
            admission(2, 10, true),
            admission(3, 20, false),
        ]);
        let notes = vec![note(1, 1), note(2, 2), note(3, 3), note(4, 99)];
        let schedule = LabelSchedule::los_weeks();
        let labeled = join_notes(notes, &admissions, |adm| {
            if adm.expire_flag {
                None
            } else {
                Some(schedule.assign(adm.los_days()))
            }
        });
        assert_eq!(labeled.len(), 2);
        assert_eq!(labeled[0].label, 0);
        assert_eq!(labeled[1].label, 3);
    }

    #[test]
    fn mp_labels_are_the_expire_flag() {
        let admissions = Admissions::new(vec![admission(1, 2, false), admission(2, 2, true)]);
        let schedule = LabelSchedule::Identity;
        let labeled = join_notes(vec![note(1, 1), note(2, 2)], &admissions, |adm| {
            Some(schedule.assign(adm.expire_flag as u8 as f64))
        });
        assert_eq!(
            labeled.iter().map(|r| r.label).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }
}
