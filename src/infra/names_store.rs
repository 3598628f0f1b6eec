// ============================================================
// Layer 6 — Word Lists
// ============================================================
// Plain one-per-line lists: phrase lists for the lexicon
// builder and the first-name lists used to tag PERSON
// entities:
//
//   <dir>/female_names.txt
//   <dir>/male_names.txt
//
// One name per line; blank lines and surrounding whitespace are
// ignored. The lists are optional: if either file is missing,
// gender tagging is disabled with a warning rather than failing
// the whole build.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::data::entities::GenderNames;

pub const FEMALE_NAMES_FILE: &str = "female_names.txt";
pub const MALE_NAMES_FILE: &str = "male_names.txt";

/// One entry per non-blank line; also used for phrase lists.
pub fn load_word_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Cannot read word list '{}'", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Load both lists from `dir`; `Ok(None)` when either file is absent.
pub fn load_gender_names(dir: impl AsRef<Path>) -> Result<Option<GenderNames>> {
    let dir = dir.as_ref();
    let female = dir.join(FEMALE_NAMES_FILE);
    let male = dir.join(MALE_NAMES_FILE);

    if !female.exists() || !male.exists() {
        tracing::warn!(
            "Gender name lists not found in '{}', gender tagging disabled",
            dir.display()
        );
        return Ok(None);
    }

    let names = GenderNames::new(load_word_list(&female)?, load_word_list(&male)?);
    tracing::info!("Loaded {} gendered first names", names.len());
    Ok(Some(names))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Gender;
    use tempfile::tempdir;

    #[test]
    fn test_loads_both_lists() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(FEMALE_NAMES_FILE), "Alice\n\n  Mary \n").unwrap();
        fs::write(dir.path().join(MALE_NAMES_FILE), "Bob\n").unwrap();

        let names = load_gender_names(dir.path()).unwrap().unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names.detect("Mary Jones"), Some(Gender::Female));
        assert_eq!(names.detect("Bob"), Some(Gender::Male));
    }

    #[test]
    fn test_missing_list_disables_gender() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(FEMALE_NAMES_FILE), "Alice\n").unwrap();
        assert!(load_gender_names(dir.path()).unwrap().is_none());
    }
}
