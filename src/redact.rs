//! Death-mention redaction for the mortality task.
//!
//! Some notes spell out the patient's death, which would leak the label. Mentions inside the
//! PHYSICAL EXAM and MEDICATION ON ADMISSION sections are administrative and can simply be
//! deleted; a mention anywhere else means the death is elaborated in the text, so the whole
//! record is dropped.

use itertools::Itertools;
use once_cell::sync::Lazy;
use qu::ick_use::*;
use regex::Regex;
use std::borrow::Cow;

use crate::LabeledNote;

/// A death phrase as it appears inside a protected section, where the leading
/// "patient"/"pt" is optional.
const DEATH_PHRASE: &str =
    r"(?:patient|pt)?\s+(?:had\s|has\s)?(?:expired|died|passed away|deceased)";

/// The same phrase outside a protected section, where "patient"/"pt" is required.
const DEATH_PHRASE_UNSCOPED: &str =
    r"(?:patient|pt)\s+(?:had\s|has\s)?(?:expired|died|passed away|deceased)";

/// Stage 1 rule: delete every match of `phrase` occurring inside one of `sections`.
///
/// A section is its header line; the match may not cross a newline, and standard
/// leftmost-first non-overlapping regex semantics are normative for the edge cases
/// (overlapping headers, phrases on a section boundary, empty sections).
pub struct ScopedRule {
    re: Regex,
}

impl ScopedRule {
    pub fn new(sections: &[&str], phrase: &str) -> Result<Self> {
        let sections = sections.iter().map(|s| regex::escape(s)).join("|");
        let re = Regex::new(&format!(r"(?i)((?:{}):[^\n]*?)({})", sections, phrase))?;
        Ok(Self { re })
    }

    /// Delete the phrase, keep the rest of the section.
    fn rewrite<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.re.replace_all(text, "${1}")
    }
}

/// The declarative two-stage rule set: section-scoped rewrites, then record-level
/// rejections.
pub struct RuleSet {
    scoped: Vec<ScopedRule>,
    reject: Vec<Regex>,
}

static DEATH_MENTIONS: Lazy<RuleSet> = Lazy::new(|| RuleSet {
    scoped: vec![ScopedRule::new(
        &["PHYSICAL EXAM", "MEDICATION ON ADMISSION"],
        DEATH_PHRASE,
    )
    .expect("invalid built-in scoped rule")],
    reject: vec![
        Regex::new(&format!("(?i){}", DEATH_PHRASE_UNSCOPED)).unwrap(),
        // also matches "she expired"
        Regex::new("(?i)he expired").unwrap(),
        Regex::new("(?i)pronounced expired").unwrap(),
        Regex::new("(?i)time of death").unwrap(),
    ],
});

impl RuleSet {
    /// The built-in death-mention rules.
    pub fn death_mentions() -> &'static RuleSet {
        &DEATH_MENTIONS
    }

    /// Apply both stages to a batch of records, dropping the rejected ones.
    ///
    /// Stage 1 runs on every record, including ones stage 2 goes on to reject; the order is
    /// part of the contract.
    pub fn filter_records(&self, records: Vec<LabeledNote>) -> Vec<LabeledNote> {
        records
            .into_iter()
            .filter_map(|mut rec| {
                for rule in &self.scoped {
                    if let Cow::Owned(rewritten) = rule.rewrite(&rec.text) {
                        rec.text = rewritten.into();
                    }
                }
                if self.reject.iter().any(|re| re.is_match(&rec.text)) {
                    None
                } else {
                    Some(rec)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rec(text: &str) -> LabeledNote {
        LabeledNote {
            row_id: 1,
            patient_id: 1,
            admission_id: 1,
            text: text.into(),
            label: 0,
        }
    }

    fn apply_one(text: &str) -> Option<String> {
        let out = RuleSet::death_mentions().filter_records(vec![rec(text)]);
        out.into_iter().next().map(|r| r.text.to_string())
    }

    #[test]
    fn mention_in_physical_exam_is_rewritten_and_kept() {
        let out = apply_one("PHYSICAL EXAM: patient expired\n\nPLAN: continue care").unwrap();
        assert!(out.contains("PLAN: continue care"));
        assert!(!out.contains("expired"));
    }

    #[test]
    fn mention_in_medication_section_is_rewritten_and_kept() {
        let out =
            apply_one("MEDICATION ON ADMISSION: none, pt passed away prior\n\nPLAN: none")
                .unwrap();
        assert!(!out.contains("passed away"));
        assert!(out.contains("MEDICATION ON ADMISSION: none,"));
    }

    #[test]
    fn mention_in_other_section_drops_the_record() {
        assert_eq!(apply_one("CHIEF COMPLAINT: patient expired yesterday"), None);
        assert_eq!(apply_one("HOSPITAL COURSE: pt had died overnight"), None);
    }

    #[test]
    fn literal_phrases_drop_the_record_anywhere() {
        assert_eq!(apply_one("he expired at 3pm"), None);
        assert_eq!(apply_one("She EXPIRED at 3pm"), None);
        assert_eq!(apply_one("patient was pronounced expired"), None);
        assert_eq!(apply_one("Time of Death: 03:12"), None);
    }

    #[test]
    fn mention_in_both_protected_and_open_sections_still_drops() {
        let text = "PHYSICAL EXAM: patient expired\n\nHOSPITAL COURSE: patient died at home";
        assert_eq!(apply_one(text), None);
    }

    #[test]
    fn clean_text_passes_through_unchanged() {
        let text = "CHIEF COMPLAINT: chest pain\n\nPLAN: discharge home";
        assert_eq!(apply_one(text).as_deref(), Some(text));
    }
}
