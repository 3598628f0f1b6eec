// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Loads story documents from a directory (or a single file).
//
// Supported formats:
//   .txt   — one story per block; blocks are separated by
//            one or more blank lines
//   .docx  — one story per file; paragraph texts are joined
//            with newlines
//
// How .docx files work:
//   A .docx file is a ZIP archive of XML parts. docx-rs parses
//   it into a typed tree:
//     Document → Paragraph → Run → Text
//   We walk that tree and concatenate the Text leaves.
//
// Files are visited in name order so that lexicon building,
// which is sensitive to first-seen order, is reproducible.
//
// Reference: docx-rs crate documentation

use anyhow::{Context, Result};
use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::document::Document;
use crate::domain::traits::DocumentSource;

/// Loads `.txt` and `.docx` stories from a path.
pub struct CorpusLoader {
    path: PathBuf,
}

impl CorpusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_file(path: &Path) -> Result<Vec<Document>> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("txt") => load_txt(path),
            Some("docx") => Ok(vec![load_docx(path)?]),
            _ => Ok(Vec::new()),
        }
    }
}

impl DocumentSource for CorpusLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        if self.path.is_file() {
            let docs = Self::load_file(&self.path)?;
            tracing::info!("Loaded {} stories from {}", docs.len(), self.path.display());
            return Ok(docs);
        }

        if !self.path.exists() {
            tracing::warn!(
                "Corpus path '{}' does not exist, returning empty corpus",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.path)
            .with_context(|| format!("Cannot read directory '{}'", self.path.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        files.sort();

        let mut docs = Vec::new();
        for path in files {
            match Self::load_file(&path) {
                Ok(loaded) => {
                    tracing::debug!("Loaded: {} ({} stories)", path.display(), loaded.len());
                    docs.extend(loaded);
                }
                // One unreadable file should not sink the whole corpus
                Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} stories", docs.len());
        Ok(docs)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Split a text file into blank-line separated stories.
fn load_txt(path: &Path) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    let name = file_name(path);

    let mut docs = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in raw.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                let source = format!("{name}#{}", docs.len());
                docs.push(Document::new(source, block.join("\n")));
                block.clear();
            }
        } else {
            block.push(line.trim_end());
        }
    }
    Ok(docs)
}

/// Parse a single .docx file into one story.
fn load_docx(path: &Path) -> Result<Document> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let docx = read_docx(&bytes)
        .map_err(|e| anyhow::anyhow!("docx-rs parse error in '{}': {:?}", path.display(), e))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    Ok(Document::new(file_name(path), paragraphs.join("\n")))
}

/// Concatenate the text runs of one paragraph.
fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let RunChild::Text(t) = rc {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};
    use tempfile::tempdir;

    #[test]
    fn test_txt_blocks_become_stories() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("stories.txt"),
            "Tom woke up.\nHe ate.\n\n\nAnn ran.\n\n",
        )
        .unwrap();

        let docs = CorpusLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "Tom woke up.\nHe ate.");
        assert_eq!(docs[0].source, "stories.txt#0");
        assert_eq!(docs[1].text, "Ann ran.");
    }

    #[test]
    fn test_files_load_in_name_order_and_others_ignored() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "Second.").unwrap();
        fs::write(dir.path().join("a.txt"), "First.").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let docs = CorpusLoader::new(dir.path()).load_all().unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["First.", "Second."]);
    }

    #[test]
    fn test_docx_paragraphs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("story.docx");
        let file = fs::File::create(&path).unwrap();
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Once upon a time.")))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("The end.")))
            .build()
            .pack(file)
            .unwrap();

        let docs = CorpusLoader::new(&path).load_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Once upon a time.\nThe end.");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let docs = CorpusLoader::new("/definitely/not/here").load_all().unwrap();
        assert!(docs.is_empty());
    }
}
