//! Selection of the note records eligible for a task.
//!
//! Only one discharge summary per admission enters a task, and with `admission_only` set the
//! text is rebuilt from the sections that are already known at admission time.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::{AdmissionId, Admissions, Note, NoteEvents};

/// The sections of a discharge summary that are known at admission time, as
/// (canonical header, search pattern) pairs.
const ADMISSION_SECTIONS: [(&str, &str); 8] = [
    ("CHIEF COMPLAINT", "chief complaint:"),
    ("PRESENT ILLNESS", "present illness:"),
    ("MEDICAL HISTORY", "medical history:"),
    ("MEDICATION ON ADMISSION", "medications on admission:"),
    ("ALLERGIES", "allergies:"),
    ("PHYSICAL EXAM", "physical exam:"),
    ("FAMILY HISTORY", "family history:"),
    ("SOCIAL HISTORY", "social history:"),
];

/// A section runs from its header to the first blank line followed by another header-like
/// line (non-empty, ending in a colon).
static SECTION_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    ADMISSION_SECTIONS
        .iter()
        .map(|(header, needle)| {
            let re = Regex::new(&format!(r"(?is){}(.+?)\n\n[^\n]+?:", regex::escape(needle)))
                .unwrap();
            (*header, re)
        })
        .collect()
});

/// Restricts the NOTEEVENTS table to the records a task can use.
pub struct NoteFilter {
    admission_only: bool,
}

impl NoteFilter {
    pub fn new(admission_only: bool) -> Self {
        Self { admission_only }
    }

    /// The task identifier gains an `_adm` suffix when only admission-time text is kept.
    pub fn task_name(&self, base: &str) -> String {
        if self.admission_only {
            format!("{}_adm", base)
        } else {
            base.to_string()
        }
    }

    pub fn apply(&self, notes: &NoteEvents, admissions: &Admissions) -> Vec<Note> {
        let mut kept: Vec<Note> = Vec::new();
        for note in notes.iter() {
            let Some(admission_id) = note.admission_id else {
                continue;
            };
            if note.is_error == Some(true) || note.text.trim().is_empty() {
                continue;
            }
            if !note.category.trim().eq_ignore_ascii_case("discharge summary") {
                continue;
            }
            let Some(admission) = admissions.find_by_id(admission_id) else {
                continue;
            };
            if admission.is_newborn() {
                continue;
            }
            kept.push(Note {
                row_id: note.row_id,
                patient_id: note.patient_id,
                admission_id,
                chart_date: note.chart_date,
                text: note.text.clone(),
            });
        }

        // One note per admission: latest chart date wins, with later rows breaking ties.
        kept.sort_by_key(|n| (n.admission_id, n.chart_date));
        let mut latest: BTreeMap<AdmissionId, Note> = BTreeMap::new();
        for note in kept {
            latest.insert(note.admission_id, note);
        }
        let mut out: Vec<Note> = latest.into_values().collect();

        if self.admission_only {
            out = out
                .into_iter()
                .filter_map(|mut note| {
                    let text = admission_sections(&note.text)?;
                    note.text = text.into();
                    Some(note)
                })
                .collect();
        }
        out
    }
}

/// Rebuild a note text from its admission-time sections.
///
/// Returns `None` when chief complaint, present illness and medical history are all absent,
/// since the note then carries no usable admission information.
fn admission_sections(text: &str) -> Option<String> {
    let sections: Vec<(&str, String)> = SECTION_RES
        .iter()
        .map(|(header, re)| {
            let content = re
                .captures(text)
                .map(|c| c[1].replace('\n', " ").trim().to_string())
                .unwrap_or_default();
            (*header, content)
        })
        .collect();
    if sections[..3].iter().all(|(_, content)| content.is_empty()) {
        return None;
    }
    Some(
        sections
            .iter()
            .map(|(header, content)| format!("{}: {}", header, content))
            .join("\n\n"),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Admission, NoteEvent};
    use chrono::NaiveDate;

    fn admission(admission_id: u64, admission_type: &str) -> Admission {
        Admission {
            row_id: admission_id,
            patient_id: 1,
            admission_id,
            admit_time: NaiveDate::from_ymd_opt(2150, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            discharge_time: NaiveDate::from_ymd_opt(2150, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            admission_type: admission_type.into(),
            expire_flag: false,
        }
    }

    fn note(row_id: u64, admission_id: Option<u64>, day: u32, category: &str) -> NoteEvent {
        NoteEvent {
            row_id,
            patient_id: 1,
            admission_id,
            chart_date: NaiveDate::from_ymd_opt(2150, 1, day),
            category: category.into(),
            is_error: None,
            text: "some text".into(),
        }
    }

    #[test]
    fn keeps_latest_discharge_summary_per_admission() {
        let notes = NoteEvents::new(vec![
            note(1, Some(10), 2, "Discharge summary"),
            note(2, Some(10), 5, "Discharge summary"),
            note(3, Some(10), 3, "Discharge summary"),
            note(4, Some(10), 6, "Nursing"),
            note(5, None, 6, "Discharge summary"),
        ]);
        let admissions = Admissions::new(vec![admission(10, "EMERGENCY")]);
        let kept = NoteFilter::new(false).apply(&notes, &admissions);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].row_id, 2);
    }

    #[test]
    fn drops_newborn_admissions_and_unknown_admissions() {
        let notes = NoteEvents::new(vec![
            note(1, Some(10), 2, "Discharge summary"),
            note(2, Some(11), 2, "Discharge summary"),
            note(3, Some(99), 2, "Discharge summary"),
        ]);
        let admissions = Admissions::new(vec![
            admission(10, "NEWBORN"),
            admission(11, "ELECTIVE"),
        ]);
        let kept = NoteFilter::new(false).apply(&notes, &admissions);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].admission_id, 11);
    }

    #[test]
    fn admission_sections_rebuilds_canonical_text() {
        let text = "Chief Complaint: chest\npain\n\nHistory of Present Illness: started \
                    yesterday\n\nDischarge Diagnosis: angina\n\nFollowup: none\n\nEND:";
        let rebuilt = admission_sections(text).unwrap();
        assert!(rebuilt.starts_with("CHIEF COMPLAINT: chest pain\n\n"));
        assert!(rebuilt.contains("PRESENT ILLNESS: started yesterday"));
        // sections that never appear come out empty rather than failing
        assert!(rebuilt.contains("SOCIAL HISTORY: "));
        assert!(!rebuilt.contains("Discharge Diagnosis"));
    }

    #[test]
    fn admission_sections_requires_a_main_section() {
        assert!(admission_sections("Allergies: penicillin\n\nPLAN: rest\n\nX:").is_none());
    }

    #[test]
    fn task_name_suffix() {
        assert_eq!(NoteFilter::new(false).task_name("MP_IN"), "MP_IN");
        assert_eq!(NoteFilter::new(true).task_name("MP_IN"), "MP_IN_adm");
    }
}
