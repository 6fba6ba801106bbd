pub mod filter;
pub mod label;
pub mod redact;
pub mod split;
pub mod task;
mod util;
pub mod write;

pub use anyhow::{Context, Error};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::{collections::BTreeMap, ops::Deref, path::Path, sync::Arc};

use crate::util::{bool_01, mimic_datetime, opt_bool_01, opt_mimic_date, optional_id};

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
pub type PatientId = u64;
pub type AdmissionId = u64;
pub type RowId = u64;
pub type Label = u8;

/// A row in the NOTEEVENTS dataset.
///
/// In this and future datastructures, `patient_id` (SUBJECT_ID) always identifies the same
/// patient, and `admission_id` (HADM_ID) the same hospital stay.
///
/// `admission_id` is optional here because outpatient notes have no admission attached; such
/// rows never survive [`filter::NoteFilter`].
#[derive(Debug, Clone, Deserialize)]
pub struct NoteEvent {
    #[serde(rename = "ROW_ID")]
    pub row_id: RowId,
    #[serde(rename = "SUBJECT_ID")]
    pub patient_id: PatientId,
    #[serde(rename = "HADM_ID", deserialize_with = "optional_id")]
    pub admission_id: Option<AdmissionId>,
    #[serde(rename = "CHARTDATE", deserialize_with = "opt_mimic_date")]
    pub chart_date: Option<NaiveDate>,
    #[serde(rename = "CATEGORY")]
    pub category: ArcStr,
    #[serde(rename = "ISERROR", deserialize_with = "opt_bool_01", default)]
    pub is_error: Option<bool>,
    #[serde(rename = "TEXT")]
    pub text: ArcStr,
}

/// The parsed NOTEEVENTS table.
pub struct NoteEvents {
    els: Vec<NoteEvent>,
}

impl NoteEvents {
    pub fn new(els: Vec<NoteEvent>) -> Self {
        Self { els }
    }

    pub fn load_orig(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(load_orig(path)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> + '_ {
        self.els.iter()
    }
}

impl Deref for NoteEvents {
    type Target = [NoteEvent];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}

/// A row in the ADMISSIONS dataset.
///
/// Read-only source of truth for label derivation. `discharge_time >= admit_time` is not
/// validated; a reversed pair propagates as a negative length of stay.
#[derive(Debug, Clone, Deserialize)]
pub struct Admission {
    #[serde(rename = "ROW_ID")]
    pub row_id: RowId,
    #[serde(rename = "SUBJECT_ID")]
    pub patient_id: PatientId,
    #[serde(rename = "HADM_ID")]
    pub admission_id: AdmissionId,
    #[serde(rename = "ADMITTIME", deserialize_with = "mimic_datetime")]
    pub admit_time: NaiveDateTime,
    #[serde(rename = "DISCHTIME", deserialize_with = "mimic_datetime")]
    pub discharge_time: NaiveDateTime,
    #[serde(rename = "ADMISSION_TYPE")]
    pub admission_type: ArcStr,
    #[serde(rename = "HOSPITAL_EXPIRE_FLAG", deserialize_with = "bool_01")]
    pub expire_flag: bool,
}

impl Admission {
    /// Length of stay in days, rounded to one decimal place.
    pub fn los_days(&self) -> f64 {
        let secs = (self.discharge_time - self.admit_time).num_seconds();
        (secs as f64 / (24.0 * 60.0 * 60.0) * 10.0).round() / 10.0
    }

    pub fn is_newborn(&self) -> bool {
        self.admission_type.eq_ignore_ascii_case("NEWBORN")
    }
}

/// The parsed ADMISSIONS table, with a pre-built index for the `admission_id` field.
pub struct Admissions {
    els: Vec<Admission>,
    id_idx: BTreeMap<AdmissionId, usize>,
}

impl Admissions {
    pub fn new(els: Vec<Admission>) -> Self {
        let mut this = Self {
            els,
            id_idx: BTreeMap::new(),
        };
        this.rebuild_index();
        this
    }

    pub fn load_orig(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(load_orig(path)?))
    }

    pub fn find_by_id(&self, id: AdmissionId) -> Option<&Admission> {
        let idx = self.id_idx.get(&id)?;
        self.els.get(*idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Admission> + '_ {
        self.els.iter()
    }

    fn rebuild_index(&mut self) {
        self.id_idx = self
            .els
            .iter()
            .enumerate()
            .map(|(idx, el)| (el.admission_id, idx))
            .collect();
    }
}

impl Deref for Admissions {
    type Target = [Admission];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}

/// A note that survived [`filter::NoteFilter`]: admission id resolved, text trimmed to the
/// task-relevant sections.
#[derive(Debug, Clone)]
pub struct Note {
    pub row_id: RowId,
    pub patient_id: PatientId,
    pub admission_id: AdmissionId,
    pub chart_date: Option<NaiveDate>,
    pub text: ArcStr,
}

/// A note joined with its task label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledNote {
    pub row_id: RowId,
    pub patient_id: PatientId,
    pub admission_id: AdmissionId,
    pub text: ArcStr,
    pub label: Label,
}

/// Load a source table into memory.
fn load_orig<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| format!("while loading \"{}\"", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn admission(admit: (u32, u32), discharge: (u32, u32)) -> Admission {
        Admission {
            row_id: 1,
            patient_id: 1,
            admission_id: 1,
            admit_time: NaiveDate::from_ymd_opt(2150, 1, admit.0)
                .unwrap()
                .and_hms_opt(admit.1, 0, 0)
                .unwrap(),
            discharge_time: NaiveDate::from_ymd_opt(2150, 1, discharge.0)
                .unwrap()
                .and_hms_opt(discharge.1, 0, 0)
                .unwrap(),
            admission_type: "EMERGENCY".into(),
            expire_flag: false,
        }
    }

    #[test]
    fn los_days_rounds_to_one_decimal() {
        // 3 days 12 hours
        assert_eq!(admission((1, 0), (4, 12)).los_days(), 3.5);
        // 2 days 1 hour
        assert_eq!(admission((1, 0), (3, 1)).los_days(), 2.0);
    }

    #[test]
    fn reversed_times_give_negative_los() {
        assert!(admission((4, 0), (1, 0)).los_days() < 0.0);
    }
}
