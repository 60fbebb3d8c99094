use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A single search/replace pair for in-memory editing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Edit {
    /// Exact text to replace. Multi-line allowed.
    #[serde(default)]
    pub search: String,
    /// Replacement text. Multi-line allowed.
    #[serde(default)]
    pub replace: String,
}

impl Edit {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Replaced { occurrences: usize },
    SkippedEmptySearch,
    SkippedNotFound,
}

impl EditOutcome {
    pub fn is_skipped(self) -> bool {
        !matches!(self, Self::Replaced { .. })
    }
}

/// Per-pair outcomes of one [`TextEditor::apply_edits`] call, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditReport {
    pub outcomes: Vec<EditOutcome>,
}

impl EditReport {
    pub fn replaced_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_skipped()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }
}

/// Stateful in-memory editor. Each call continues from the document left by
/// the previous one.
#[derive(Debug, Clone, Default)]
pub struct TextEditor {
    document: String,
}

impl TextEditor {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn set_document(&mut self, document: impl Into<String>) {
        self.document = document.into();
    }

    pub fn into_document(self) -> String {
        self.document
    }

    /// Applies `edits` in order. Misses are skipped and logged, never raised.
    pub fn apply_edits(&mut self, edits: &[Edit]) -> EditReport {
        let mut result = std::mem::take(&mut self.document);
        let mut outcomes = Vec::with_capacity(edits.len());

        for (idx, edit) in edits.iter().enumerate() {
            let number = idx + 1;
            if edit.search.is_empty() {
                warn!(edit = number, "edit has empty search string; skipping");
                outcomes.push(EditOutcome::SkippedEmptySearch);
                continue;
            }

            match replace_literal(&result, &edit.search, &edit.replace) {
                Some((replaced, occurrences)) => {
                    debug!(
                        edit = number,
                        occurrences,
                        search = %edit.search,
                        replace = %edit.replace,
                        "edit applied"
                    );
                    result = replaced;
                    outcomes.push(EditOutcome::Replaced { occurrences });
                }
                None => {
                    warn!(edit = number, "search string not found in current document; skipping");
                    outcomes.push(EditOutcome::SkippedNotFound);
                }
            }
        }

        self.document = result;
        EditReport { outcomes }
    }
}

/// Pure form of [`TextEditor::apply_edits`].
pub fn edit_document(document: &str, edits: &[Edit]) -> String {
    let mut editor = TextEditor::new(document);
    editor.apply_edits(edits);
    editor.into_document()
}

/// Literal, case-sensitive replacement of every non-overlapping occurrence.
/// Returns `None` when `search` is empty or does not occur.
pub(crate) fn replace_literal(
    content: &str,
    search: &str,
    replace: &str,
) -> Option<(String, usize)> {
    if search.is_empty() {
        return None;
    }
    let occurrences = content.matches(search).count();
    if occurrences == 0 {
        return None;
    }
    Some((content.replace(search, replace), occurrences))
}

#[cfg(test)]
mod tests {
    use super::{Edit, EditOutcome, TextEditor, edit_document, replace_literal};

    #[test]
    fn empty_search_leaves_document_untouched() {
        for doc in ["", "abc", "line one\nline two\n", "X"] {
            assert_eq!(edit_document(doc, &[Edit::new("", "X")]), doc);
        }
    }

    #[test]
    fn replaces_every_occurrence() {
        assert_eq!(edit_document("abcabc", &[Edit::new("abc", "Z")]), "ZZ");
    }

    #[test]
    fn missing_search_is_not_an_error() {
        assert_eq!(edit_document("abc", &[Edit::new("xyz", "Z")]), "abc");
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(edit_document("Foo foo", &[Edit::new("foo", "bar")]), "Foo bar");
    }

    #[test]
    fn later_pairs_see_earlier_results() {
        let edits = [Edit::new("alpha", "beta"), Edit::new("beta", "gamma")];
        assert_eq!(edit_document("alpha", &edits), "gamma");
    }

    #[test]
    fn overlapping_candidates_are_scanned_left_to_right() {
        assert_eq!(edit_document("aaa", &[Edit::new("aa", "b")]), "ba");
    }

    #[test]
    fn report_records_each_outcome() {
        let mut editor = TextEditor::new("one two two");
        let report = editor.apply_edits(&[
            Edit::new("", "x"),
            Edit::new("two", "2"),
            Edit::new("three", "3"),
        ]);

        assert_eq!(
            report.outcomes,
            vec![
                EditOutcome::SkippedEmptySearch,
                EditOutcome::Replaced { occurrences: 2 },
                EditOutcome::SkippedNotFound,
            ]
        );
        assert_eq!(report.replaced_count(), 1);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(editor.document(), "one 2 2");
    }

    #[test]
    fn editor_state_carries_across_calls() {
        let mut editor = TextEditor::new("v1");
        editor.apply_edits(&[Edit::new("v1", "v2")]);
        editor.apply_edits(&[Edit::new("v2", "v3")]);
        assert_eq!(editor.into_document(), "v3");
    }

    #[test]
    fn replace_literal_ignores_regex_syntax() {
        assert_eq!(
            replace_literal("a.b a+b", "a.b", "X"),
            Some(("X a+b".to_string(), 1))
        );
        assert_eq!(replace_literal("axb", "a.b", "X"), None);
    }
}
