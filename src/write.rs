//! Persistence of the three split tables.
//!
//! A task run either produces all three files or none: each split is staged to a `.tmp`
//! sibling first, and the renames into place only happen once every stage succeeded.

use qu::ick_use::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{split::Split, util::path_exists, LabeledNote};

pub struct DatasetWriter {
    save_dir: PathBuf,
}

impl DatasetWriter {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    /// Write `{task_name}_{train,val,test}.csv` under the save directory, all or nothing.
    pub fn write_split(&self, task_name: &str, label_column: &str, split: &Split) -> Result {
        fs::create_dir_all(&self.save_dir)
            .with_context(|| format!("creating \"{}\"", self.save_dir.display()))?;

        let parts: [(&str, &[LabeledNote]); 3] = [
            ("train", &split.train),
            ("val", &split.val),
            ("test", &split.test),
        ];

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(parts.len());
        for (part, records) in parts {
            let target = self.save_dir.join(format!("{}_{}.csv", task_name, part));
            let tmp = self.save_dir.join(format!("{}_{}.csv.tmp", task_name, part));
            if let Err(e) = write_records(&tmp, label_column, records) {
                for (tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                let _ = fs::remove_file(&tmp);
                return Err(e).with_context(|| format!("writing {} split", part));
            }
            staged.push((tmp, target));
        }

        // Commit point: everything staged cleanly, move into place.
        for (tmp, target) in &staged {
            if path_exists(target)? {
                event!(
                    Level::WARN,
                    "overwriting existing file at \"{}\"",
                    target.display()
                );
            }
            fs::rename(tmp, target)
                .with_context(|| format!("moving split into \"{}\"", target.display()))?;
        }
        Ok(())
    }
}

fn write_records(path: &Path, label_column: &str, records: &[LabeledNote]) -> Result {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["ROW_ID", "SUBJECT_ID", "HADM_ID", "TEXT", label_column])?;
    for rec in records {
        writer.write_record([
            rec.row_id.to_string(),
            rec.patient_id.to_string(),
            rec.admission_id.to_string(),
            rec.text.to_string(),
            rec.label.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
