// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use fabrique::unstable::Program;
use serde::Deserialize;
use walkdir::WalkDir;

#[derive(Deserialize)]
struct Case {
    note: String,
    program: Program,
    #[serde(flatten)]
    expectations: serde_yaml::Mapping,
}

#[derive(Deserialize)]
struct CaseFile {
    cases: Vec<Case>,
}

const RESULTS: &[&str] = &["want_values", "want_builds", "want_rules", "want_files"];

fn check_file(path: &std::path::Path) -> Result<usize> {
    let file: CaseFile = serde_yaml::from_str(&std::fs::read_to_string(path)?)?;
    for case in &file.cases {
        if case.note.is_empty() {
            bail!("{}: case without a note", path.display());
        }
        if case.program.values.is_empty() {
            bail!("{}: case '{}' has an empty program", path.display(), case.note);
        }
        let has = |key: &str| case.expectations.contains_key(key);
        let wants_result = RESULTS.iter().any(|k| has(k));
        if wants_result == has("error") {
            bail!(
                "{}: case '{}' must expect either a result or an error",
                path.display(),
                case.note
            );
        }
    }
    Ok(file.cases.len())
}

#[test]
fn case_files_are_well_formed() -> Result<()> {
    let mut total = 0;
    for entry in WalkDir::new("tests/interpreter/cases") {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        total += check_file(path)?;
    }
    assert!(total > 0, "no interpreter cases found");
    Ok(())
}
