use std::collections::BTreeSet;

use crate::tree::FileEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    paths: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether membership changed.
    pub fn toggle(&mut self, path: &str, included: bool) -> bool {
        if included {
            self.paths.insert(path.to_string())
        } else {
            self.paths.remove(path)
        }
    }

    pub fn select_all<'a, I>(&mut self, files: I)
    where
        I: IntoIterator<Item = &'a FileEntry>,
    {
        self.paths = files
            .into_iter()
            .filter(|entry| entry.is_file())
            .map(|entry| entry.path.clone())
            .collect();
    }

    pub fn deselect_all(&mut self) {
        self.paths.clear();
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::flatten;

    use super::*;

    fn tree() -> Vec<FileEntry> {
        vec![
            FileEntry::directory(
                "src",
                vec![
                    FileEntry::file("src/a.ts", None),
                    FileEntry::file("src/b.ts", None),
                ],
            ),
            FileEntry::file("README.md", None),
        ]
    }

    #[test]
    fn toggle_is_a_no_op_when_already_in_requested_state() {
        let mut selection = SelectionSet::new();
        assert!(selection.toggle("src/a.ts", true));
        assert!(!selection.toggle("src/a.ts", true));
        assert!(selection.is_selected("src/a.ts"));

        assert!(selection.toggle("src/a.ts", false));
        assert!(!selection.toggle("src/a.ts", false));
        assert!(selection.is_empty());
    }

    #[test]
    fn select_all_then_deselect_all_is_empty() {
        let roots = tree();
        let mut selection = SelectionSet::new();

        selection.select_all(flatten(&roots));
        assert_eq!(selection.len(), 3);
        assert!(!selection.is_selected("src"));

        selection.deselect_all();
        assert!(selection.is_empty());
    }

    #[test]
    fn select_all_replaces_previous_members_and_skips_directories() {
        let roots = tree();
        let mut selection = SelectionSet::new();
        selection.toggle("stale/path.rs", true);

        selection.select_all(roots.iter());

        assert!(!selection.is_selected("stale/path.rs"));
        assert!(!selection.is_selected("src"));
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["README.md"]);
    }
}
