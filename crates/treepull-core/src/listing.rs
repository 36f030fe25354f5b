use std::cmp::Ordering;

use crate::category::{Category, categorize};
use crate::tree::{FileEntry, flatten};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Path,
    Category,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Path => "path",
            Self::Category => "category",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            column: SortColumn::Name,
            direction: SortDirection::Asc,
        }
    }
}

impl SortState {
    /// Same column flips the direction; a different column starts ascending.
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == column {
            self.direction = self.direction.flipped();
        } else {
            self.column = column;
            self.direction = SortDirection::Asc;
        }
    }
}

/// Case-insensitive comparison first; among strings that only differ in
/// case, lowercase sorts before uppercase.
pub fn locale_cmp(left: &str, right: &str) -> Ordering {
    let folded = left
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase));

    folded.then_with(|| left.chars().map(case_key).cmp(right.chars().map(case_key)))
}

fn case_key(character: char) -> (u8, char) {
    (u8::from(character.is_uppercase()), character)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub name: String,
    pub path: String,
    pub category: Category,
}

impl FileRow {
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            name: entry.name.clone(),
            path: entry.path.clone(),
            category: categorize(&entry.path),
        }
    }

    fn sort_key(&self, column: SortColumn) -> &str {
        match column {
            SortColumn::Name => &self.name,
            SortColumn::Path => &self.path,
            SortColumn::Category => self.category.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQuery {
    pub text: String,
    pub category: Option<Category>,
}

impl FileQuery {
    pub fn matches(&self, row: &FileRow) -> bool {
        if let Some(category) = self.category
            && row.category != category
        {
            return false;
        }

        let needle = self.text.trim().to_lowercase();
        needle.is_empty()
            || row.name.to_lowercase().contains(&needle)
            || row.path.to_lowercase().contains(&needle)
    }
}

/// Ordering of two rows under `column` and `direction`. Equal keys compare
/// equal in both directions, so stable sorts keep their input order.
pub fn compare_rows(
    left: &FileRow,
    right: &FileRow,
    column: SortColumn,
    direction: SortDirection,
) -> Ordering {
    let ordering = locale_cmp(left.sort_key(column), right.sort_key(column));
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

pub fn sort_rows(rows: &mut [FileRow], sort: SortState) {
    rows.sort_by(|left, right| compare_rows(left, right, sort.column, sort.direction));
}

/// Whole-list stable sort of flattened files.
pub fn sort_files<'a>(
    files: &[&'a FileEntry],
    column: SortColumn,
    direction: SortDirection,
) -> Vec<&'a FileEntry> {
    let mut keyed: Vec<(FileRow, &'a FileEntry)> = files
        .iter()
        .map(|entry| (FileRow::from_entry(entry), *entry))
        .collect();

    keyed.sort_by(|(left, _), (right, _)| compare_rows(left, right, column, direction));

    keyed.into_iter().map(|(_, entry)| entry).collect()
}

/// Flattened, filtered and sorted display rows for a snapshot's contents.
pub fn build_rows(roots: &[FileEntry], query: &FileQuery, sort: SortState) -> Vec<FileRow> {
    let mut rows: Vec<FileRow> = flatten(roots)
        .into_iter()
        .map(FileRow::from_entry)
        .filter(|row| query.matches(row))
        .collect();
    sort_rows(&mut rows, sort);
    rows
}
