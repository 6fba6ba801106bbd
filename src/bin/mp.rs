use clap::Parser;
use mimic_outcome_tasks::task;
use qu::ick_use::*;
use std::path::PathBuf;

/// Extract the in-hospital mortality dataset from a MIMIC directory.
#[derive(Parser)]
struct Opt {
    /// Directory containing NOTEEVENTS.csv and ADMISSIONS.csv.
    mimic_dir: PathBuf,
    /// Directory the split files are written to.
    save_dir: PathBuf,
    /// Seed for the patient-wise split.
    #[clap(long, default_value_t = 123)]
    seed: u64,
    /// Restrict note text to admission-time sections (adds the `_adm` task suffix).
    #[clap(long)]
    admission_only: bool,
}

#[qu::ick]
fn main(opt: Opt) -> Result {
    task::mp_task(&opt.mimic_dir, &opt.save_dir, opt.seed, opt.admission_only)
}
