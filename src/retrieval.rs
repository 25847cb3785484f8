//! Keyword retrieval over curated Java reference notes.
//!
//! Each prompt gets the few notes that share the most terms with the active
//! exercise and the student's input. Scoring is plain term overlap with tags
//! counted double; there are no embeddings and no external index.

use std::collections::HashSet;

use serde::Deserialize;

/// One short piece of Java reference material.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ReferenceNote {
  pub title: String,
  pub text: String,
  #[serde(default)]
  pub tags: Vec<String>,
}

#[derive(Clone, Debug)]
struct IndexedNote {
  note: ReferenceNote,
  terms: HashSet<String>,
  tags: HashSet<String>,
}

#[derive(Clone, Debug)]
pub struct NoteIndex {
  notes: Vec<IndexedNote>,
  top_k: usize,
}

const STOPWORDS: [&str; 12] = ["the", "and", "for", "that", "with", "this", "from", "into", "your", "are", "you", "int"];

/// Lowercased alphanumeric words of three or more characters, minus stopwords.
fn terms(text: &str) -> HashSet<String> {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| w.len() >= 3)
    .map(str::to_lowercase)
    .filter(|w| !STOPWORDS.contains(&w.as_str()))
    .collect()
}

impl NoteIndex {
  pub fn new(notes: Vec<ReferenceNote>, top_k: usize) -> Self {
    let notes = notes
      .into_iter()
      .map(|note| IndexedNote {
        terms: terms(&format!("{} {}", note.title, note.text)),
        tags: note.tags.iter().map(|t| t.to_lowercase()).collect(),
        note,
      })
      .collect();
    Self { notes, top_k }
  }

  /// Best `top_k` notes for `query`, highest score first; ties by title.
  /// Notes sharing no term with the query are never returned.
  pub fn search(&self, query: &str) -> Vec<&ReferenceNote> {
    if self.top_k == 0 {
      return vec![];
    }
    let query = terms(query);
    let mut scored: Vec<(usize, &ReferenceNote)> = self
      .notes
      .iter()
      .map(|n| {
        let score = query
          .iter()
          .map(|t| usize::from(n.terms.contains(t)) + 2 * usize::from(n.tags.contains(t)))
          .sum();
        (score, &n.note)
      })
      .filter(|(score, _)| *score > 0)
      .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.title.cmp(&b.1.title)));
    scored.into_iter().take(self.top_k).map(|(_, n)| n).collect()
  }
}
