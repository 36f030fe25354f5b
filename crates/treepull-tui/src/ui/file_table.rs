use crossterm::event::{Event, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Margin, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{
    Cell, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState, Table, TableState,
};
use treepull_core::category::Category;
use treepull_core::listing::{FileQuery, FileRow, SortColumn, SortState, build_rows};
use treepull_core::tree::FileEntry;
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

use crate::theme;

const CATEGORY_CYCLE: [Option<Category>; 6] = [
    None,
    Some(Category::Backend),
    Some(Category::Component),
    Some(Category::Util),
    Some(Category::Page),
    Some(Category::Other),
];

#[derive(Debug, Clone)]
pub(crate) struct FileTableRender<'a> {
    pub(crate) title: Line<'a>,
    pub(crate) empty_message: &'a str,
    pub(crate) header_style: Style,
    pub(crate) highlight_style: Style,
}

/// Filter text, category filter and sort order over a snapshot's files,
/// plus the cursor into the resulting rows.
#[derive(Debug, Default)]
pub(crate) struct FileTableState {
    rows: Vec<FileRow>,
    selected: usize,
    query: Input,
    category: Option<Category>,
    sort: SortState,
}

impl FileTableState {
    pub(crate) fn refresh(&mut self, roots: &[FileEntry]) {
        self.rows = build_rows(roots, &self.file_query(), self.sort);
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }

    pub(crate) fn file_query(&self) -> FileQuery {
        FileQuery {
            text: self.query.value().to_string(),
            category: self.category,
        }
    }

    /// Returns whether the filter text changed.
    pub(crate) fn on_filter_key(&mut self, key: KeyEvent) -> bool {
        self.query.handle_event(&Event::Key(key)).is_some()
    }

    pub(crate) fn toggle_sort(&mut self, column: SortColumn) {
        self.sort.toggle(column);
    }

    pub(crate) fn sort(&self) -> SortState {
        self.sort
    }

    pub(crate) fn cycle_category(&mut self) {
        let position = CATEGORY_CYCLE
            .iter()
            .position(|candidate| *candidate == self.category)
            .unwrap_or(0);
        self.category = CATEGORY_CYCLE[(position + 1) % CATEGORY_CYCLE.len()];
        self.selected = 0;
    }

    pub(crate) fn category(&self) -> Option<Category> {
        self.category
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub(crate) fn move_down(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    pub(crate) fn selected_row(&self) -> Option<&FileRow> {
        self.rows.get(self.selected)
    }

    pub(crate) fn rows(&self) -> &[FileRow] {
        &self.rows
    }

    #[cfg(test)]
    pub(crate) fn selected(&self) -> usize {
        self.selected
    }

    pub(crate) fn render_filter(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        title: Line<'_>,
        show_cursor: bool,
    ) {
        let width = area.width.saturating_sub(2) as usize;
        let scroll = self.query.visual_scroll(width);
        let paragraph = Paragraph::new(self.query.value())
            .scroll((0, scroll as u16))
            .block(theme::chrome(title));
        frame.render_widget(paragraph, area);

        if !show_cursor || width == 0 {
            return;
        }

        let visual = self.query.visual_cursor();
        let relative = visual.saturating_sub(scroll).min(width.saturating_sub(1));
        frame.set_cursor_position((area.x + 1 + relative as u16, area.y + 1));
    }

    pub(crate) fn render_table<F>(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        render: FileTableRender<'_>,
        is_marked: F,
    ) where
        F: Fn(&str) -> bool,
    {
        if self.rows.is_empty() {
            let empty = Paragraph::new(render.empty_message).block(theme::chrome(render.title));
            frame.render_widget(empty, area);
            return;
        }

        let header = Row::new(["", "Name", "Path", "Category"]).style(render.header_style);
        let rows = self.rows.iter().map(|row| {
            let mark = if is_marked(&row.path) { "[x]" } else { "[ ]" };
            Row::new(vec![
                Cell::from(mark),
                Cell::from(row.name.as_str()),
                Cell::from(row.path.as_str()),
                Cell::from(row.category.as_str()).style(theme::category(row.category)),
            ])
        });
        let widths = [
            Constraint::Length(3),
            Constraint::Length(28),
            Constraint::Min(24),
            Constraint::Length(10),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(theme::chrome(render.title))
            .row_highlight_style(render.highlight_style)
            .highlight_symbol(">> ");

        let mut state = TableState::new();
        state.select(Some(self.selected));
        frame.render_stateful_widget(table, area, &mut state);

        let viewport = area.height.saturating_sub(3) as usize;
        let mut scrollbar_state = ScrollbarState::new(self.rows.len())
            .position(self.selected)
            .viewport_content_length(viewport);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None),
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}
