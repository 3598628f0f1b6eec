// ============================================================
// Layer 6 — Annotator Resources
// ============================================================
// Builds the in-crate annotator from files on disk:
//
//   gazetteer.tsv      surface<TAB>LABEL per line, e.g.
//                        Bob Smith	PERSON
//                        Paris	GPE
//   annotations.json   {"<text>": Annotation, ...} as dumped by
//                      an external tagger
//
// Texts present in the annotation dump are served verbatim;
// everything else falls through to the rule annotator with the
// gazetteer.

use anyhow::{bail, Context, Result};
use std::{collections::HashMap, fs, path::Path};

use crate::data::annotator::{RuleAnnotator, ScriptedAnnotator};
use crate::domain::token::Annotation;

/// Parse a gazetteer TSV into (surface, label) pairs.
pub fn load_gazetteer(path: impl AsRef<Path>) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Cannot read gazetteer '{}'", path.display()))?;

    let mut entries = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('\t') {
            Some((surface, label)) if !surface.trim().is_empty() && !label.trim().is_empty() => {
                entries.push((surface.trim().to_string(), label.trim().to_string()));
            }
            _ => bail!("{}:{}: expected 'surface<TAB>LABEL'", path.display(), line_no + 1),
        }
    }
    Ok(entries)
}

/// Parse an annotation dump.
pub fn load_annotations(path: impl AsRef<Path>) -> Result<HashMap<String, Annotation>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read annotations '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed annotations file '{}'", path.display()))
}

/// Assemble the annotator from optional resource files.
pub fn build_annotator(gazetteer: Option<&Path>, annotations: Option<&Path>) -> Result<ScriptedAnnotator> {
    let mut rules = RuleAnnotator::new();
    if let Some(path) = gazetteer {
        rules = rules.with_gazetteer(load_gazetteer(path)?);
        tracing::info!("Loaded gazetteer with {} entries", rules.gazetteer_len());
    }

    let annotator = match annotations {
        Some(path) => ScriptedAnnotator::from_annotations(load_annotations(path)?, rules),
        None => ScriptedAnnotator::new(rules),
    };
    if annotator.num_scripts() > 0 {
        tracing::info!("Loaded {} pre-computed annotations", annotator.num_scripts());
    }
    Ok(annotator)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::Annotator;
    use tempfile::tempdir;

    #[test]
    fn test_gazetteer_parsing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gazetteer.tsv");
        fs::write(&path, "# people\nBob Smith\tPERSON\n\nParis\tGPE\n").unwrap();
        let entries = load_gazetteer(&path).unwrap();
        assert_eq!(
            entries,
            vec![
                ("Bob Smith".to_string(), "PERSON".to_string()),
                ("Paris".to_string(), "GPE".to_string())
            ]
        );
    }

    #[test]
    fn test_bad_gazetteer_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gazetteer.tsv");
        fs::write(&path, "no tab here\n").unwrap();
        assert!(load_gazetteer(&path).is_err());
    }

    #[test]
    fn test_build_annotator_from_files() {
        let dir = tempdir().unwrap();
        let gaz = dir.path().join("gazetteer.tsv");
        fs::write(&gaz, "Tom\tPERSON\n").unwrap();

        let ann = json_annotation();
        let dump = dir.path().join("annotations.json");
        fs::write(&dump, ann).unwrap();

        let a = build_annotator(Some(gaz.as_path()), Some(dump.as_path())).unwrap();
        assert_eq!(a.annotate("scripted").unwrap().tokens[0].text, "SCRIPTED");
        let fallback = a.annotate("Tom ran").unwrap();
        assert_eq!(fallback.entities.len(), 1);
    }

    fn json_annotation() -> String {
        r#"{"scripted": {"tokens": [{"text": "SCRIPTED", "lemma": "scripted", "pos": "X", "tag": "XX",
            "dep": "ROOT", "head": 0, "ent_type": null}], "entities": []}}"#
            .to_string()
    }
}
