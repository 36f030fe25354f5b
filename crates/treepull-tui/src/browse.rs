use std::collections::VecDeque;

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Color;
use ratatui::text::{Line, Text};
use ratatui::widgets::{List, ListItem, ListState, Paragraph};
use tracing::debug;
use treepull_app::App;
use treepull_core::controller::FetchController;
use treepull_core::lifecycle::{Notice, NoticeLevel, Operation};
use treepull_core::listing::SortColumn;
use treepull_core::names::parse_repo_url;
use treepull_core::snapshot::RepositorySnapshot;
use treepull_core::time::display_timestamp;
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

use crate::keymap;
use crate::theme;
use crate::ui::file_table::{FileTableRender, FileTableState};
use crate::ui::loading::{LoadingState, render_loading_modal};
use crate::ui::modal::{render_error_modal, render_notice_modal};
use crate::ui::text::{
    compact_hint, count_label, focus_line, key_hint_height, key_hint_paragraph, label_value_line,
    wrapped_paragraph,
};

const CREATED_FILES_SHOWN: usize = 10;

pub(crate) trait BrowseOps {
    fn forget(&self, url: &str) -> Result<()>;
}

impl BrowseOps for App {
    fn forget(&self, url: &str) -> Result<()> {
        App::forget(self, url).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BrowseSignal {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartFocus {
    Url,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Overlay {
    Notice(Notice),
    Error(String),
}

/// The whole interactive session: a start screen (URL input and history)
/// while no snapshot is loaded, and the file browser once one is.
pub(crate) struct BrowseScreen {
    controller: FetchController,
    url_input: Input,
    start_focus: StartFocus,
    history_selected: usize,
    files: FileTableState,
    filter_focused: bool,
    pending_snapshot: Option<String>,
    was_loading: bool,
    overlays: VecDeque<Overlay>,
    loading: LoadingState,
}

impl BrowseScreen {
    pub(crate) fn new(controller: FetchController, initial_url: Option<String>) -> Self {
        let mut screen = Self {
            controller,
            url_input: Input::default(),
            start_focus: StartFocus::Url,
            history_selected: 0,
            files: FileTableState::default(),
            filter_focused: false,
            pending_snapshot: None,
            was_loading: false,
            overlays: VecDeque::new(),
            loading: LoadingState::default(),
        };
        screen.controller.request_history();

        if let Some(url) = initial_url {
            screen.url_input = Input::new(url.clone());
            screen.submit_url(&url);
        }

        screen
    }

    pub(crate) fn on_tick(&mut self) {
        self.controller.poll();
        self.loading.next_frame();
        self.sync();
    }

    pub(crate) fn on_key(&mut self, key: KeyEvent, ops: &dyn BrowseOps) -> BrowseSignal {
        let signal = self.handle_key(key, ops);
        self.sync();
        signal
    }

    fn handle_key(&mut self, key: KeyEvent, ops: &dyn BrowseOps) -> BrowseSignal {
        if !self.overlays.is_empty() {
            if keymap::is_confirm(key) || keymap::is_back(key) {
                self.overlays.pop_front();
            }
            return BrowseSignal::Continue;
        }

        if self.is_busy() {
            if keymap::is_back(key) {
                debug!("in-flight request abandoned");
                self.pending_snapshot = None;
                self.controller.reset();
                self.files.clear();
            }
            return BrowseSignal::Continue;
        }

        if self.controller.state().snapshot().is_some() {
            self.on_files_key(key)
        } else {
            self.on_start_key(key, ops)
        }
    }

    fn is_busy(&self) -> bool {
        let state = self.controller.state();
        state.is_loading() || state.is_pulling() || self.pending_snapshot.is_some()
    }

    /// Applies the follow-ups of whatever completed since the last call.
    fn sync(&mut self) {
        if let Some(url) = self.pending_snapshot.clone()
            && !self.controller.state().has_pending(Operation::Branches)
        {
            self.pending_snapshot = None;
            self.controller.request_snapshot(&url);
        }

        let loading = self.controller.state().is_loading();
        if self.was_loading && !loading {
            match self.controller.state().error() {
                Some(error) => self.overlays.push_back(Overlay::Error(error.to_string())),
                None => {
                    self.controller.request_history();
                }
            }
        }
        self.was_loading = self.controller.state().is_loading();

        let created = self.controller.state().last_created_files().to_vec();
        for notice in self.controller.state_mut().take_notices() {
            self.overlays
                .push_back(Overlay::Notice(with_created_files(notice, &created)));
        }

        match self.controller.state().snapshot() {
            Some(snapshot) => self.files.refresh(&snapshot.contents),
            None => self.files.refresh(&[]),
        }

        let history_len = self.controller.state().history().len();
        if self.history_selected >= history_len {
            self.history_selected = history_len.saturating_sub(1);
        }
    }

    fn on_start_key(&mut self, key: KeyEvent, ops: &dyn BrowseOps) -> BrowseSignal {
        if matches!(key.code, KeyCode::Tab) {
            self.start_focus = match self.start_focus {
                StartFocus::Url => StartFocus::History,
                StartFocus::History => StartFocus::Url,
            };
            return BrowseSignal::Continue;
        }

        match self.start_focus {
            StartFocus::Url => {
                if keymap::is_back(key) {
                    return BrowseSignal::Quit;
                }
                if keymap::is_confirm(key) {
                    let url = self.url_input.value().to_string();
                    self.submit_url(&url);
                    return BrowseSignal::Continue;
                }
                self.url_input.handle_event(&Event::Key(key));
            }
            StartFocus::History => {
                if keymap::is_back(key) || keymap::is_quit(key) {
                    return BrowseSignal::Quit;
                }
                if keymap::is_up(key) {
                    self.history_selected = self.history_selected.saturating_sub(1);
                } else if keymap::is_down(key) {
                    if self.history_selected + 1 < self.controller.state().history().len() {
                        self.history_selected += 1;
                    }
                } else if keymap::is_confirm(key) {
                    self.open_history();
                } else if keymap::is_char(key, 'd') {
                    self.forget_history(ops);
                }
            }
        }

        BrowseSignal::Continue
    }

    fn on_files_key(&mut self, key: KeyEvent) -> BrowseSignal {
        if self.filter_focused {
            if keymap::is_back(key) || matches!(key.code, KeyCode::Tab) {
                self.filter_focused = false;
            } else {
                self.files.on_filter_key(key);
            }
            return BrowseSignal::Continue;
        }

        if keymap::is_quit(key) {
            return BrowseSignal::Quit;
        }

        if keymap::is_back(key) {
            self.controller.reset();
            self.files.clear();
            self.controller.request_history();
            return BrowseSignal::Continue;
        }

        if keymap::is_focus_switch(key) {
            self.filter_focused = true;
        } else if keymap::is_up(key) {
            self.files.move_up();
        } else if keymap::is_down(key) {
            self.files.move_down();
        } else if keymap::is_toggle(key) {
            self.toggle_current();
        } else if keymap::is_char(key, 'a') {
            self.controller.state_mut().select_all();
        } else if keymap::is_char(key, 'n') {
            self.controller.state_mut().deselect_all();
        } else if keymap::is_char(key, '1') {
            self.files.toggle_sort(SortColumn::Name);
        } else if keymap::is_char(key, '2') {
            self.files.toggle_sort(SortColumn::Path);
        } else if keymap::is_char(key, '3') {
            self.files.toggle_sort(SortColumn::Category);
        } else if keymap::is_char(key, 'c') {
            self.files.cycle_category();
        } else if keymap::is_char(key, 'b') {
            self.cycle_branch();
        } else if keymap::is_char(key, 'r') {
            self.refetch();
        } else if keymap::is_char(key, 'p') {
            // A rejected pull queues its own notice.
            let _ = self.controller.request_pull();
        }

        BrowseSignal::Continue
    }

    fn submit_url(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() {
            return;
        }

        if let Err(error) = parse_repo_url(url) {
            self.overlays.push_back(Overlay::Error(error.to_string()));
            return;
        }

        debug!(url, "repository submitted");
        self.controller.request_branches(url);
        self.pending_snapshot = Some(url.to_string());
    }

    fn open_history(&mut self) {
        let Some(url) = self
            .controller
            .state()
            .history()
            .get(self.history_selected)
            .map(|entry| entry.url().to_string())
        else {
            return;
        };

        if self.controller.state_mut().select_history(&url) {
            self.files.clear();
            self.controller.request_branches(&url);
        }
    }

    fn forget_history(&mut self, ops: &dyn BrowseOps) {
        let Some(url) = self
            .controller
            .state()
            .history()
            .get(self.history_selected)
            .map(|entry| entry.url().to_string())
        else {
            return;
        };

        match ops.forget(&url) {
            Ok(()) => {
                self.controller.request_history();
            }
            Err(error) => self.overlays.push_back(Overlay::Error(format!("{error:#}"))),
        }
    }

    fn toggle_current(&mut self) {
        let Some(path) = self.files.selected_row().map(|row| row.path.clone()) else {
            return;
        };
        let included = !self.controller.state().is_selected(&path);
        self.controller.state_mut().toggle(&path, included);
    }

    /// Moves to the branch after the one currently shown and refetches.
    fn cycle_branch(&mut self) {
        let state = self.controller.state();
        let (Some(url), Some(snapshot)) = (state.url(), state.snapshot()) else {
            return;
        };
        let branches = state.branches();
        if branches.is_empty() {
            self.overlays.push_back(Overlay::Notice(Notice {
                level: NoticeLevel::Warning,
                message: "No branches were discovered for this repository".to_string(),
            }));
            return;
        }

        let current = snapshot
            .branch
            .as_deref()
            .unwrap_or_else(|| state.selected_branch());
        let next = branches
            .iter()
            .position(|branch| branch == current)
            .map(|index| (index + 1) % branches.len())
            .unwrap_or(0);
        let branch = branches[next].clone();
        let url = url.to_string();

        self.controller.state_mut().select_branch(&branch);
        self.controller.request_snapshot(&url);
    }

    /// Refetches the branch currently shown, which may differ from the
    /// discovered default after opening a history entry.
    fn refetch(&mut self) {
        let state = self.controller.state();
        let Some(url) = state.url().map(str::to_string) else {
            return;
        };
        let shown = state.snapshot().and_then(|snapshot| snapshot.branch.clone());
        if let Some(branch) = shown {
            self.controller.state_mut().select_branch(&branch);
        }
        self.controller.request_snapshot(&url);
    }

    pub(crate) fn render(&self, frame: &mut Frame<'_>) {
        match self.controller.state().snapshot() {
            Some(snapshot) => self.render_files(frame, snapshot),
            None => self.render_start(frame),
        }

        if self.is_busy() {
            render_loading_modal(
                frame,
                "Working",
                &self.busy_message(),
                "Esc: cancel",
                &self.loading,
            );
        }

        match self.overlays.front() {
            Some(Overlay::Notice(notice)) => {
                render_notice_modal(frame, notice, "Enter/Esc: continue");
            }
            Some(Overlay::Error(message)) => {
                render_error_modal(frame, message, 80, 50, "Enter/Esc: continue");
            }
            None => {}
        }
    }

    fn busy_message(&self) -> String {
        let state = self.controller.state();
        if state.is_pulling() {
            return format!(
                "Pulling {}...",
                count_label(state.selection().len(), "selected file")
            );
        }
        if let Some(url) = &self.pending_snapshot {
            return format!("Discovering branches of {url}...");
        }
        format!(
            "Fetching {} ({})...",
            state.url().unwrap_or_default(),
            state.selected_branch()
        )
    }

    fn render_start(&self, frame: &mut Frame<'_>) {
        let area = frame.area();
        let key_text = match self.start_focus {
            StartFocus::Url => compact_hint(
                area.width,
                "Type: repository URL    Enter: fetch    Tab: history    Esc: quit",
                "Enter: fetch    Tab: history    Esc: quit",
                "Enter fetch | Tab history | Esc quit",
            ),
            StartFocus::History => compact_hint(
                area.width,
                "Enter: open    Up/Down or j/k: move    d: forget    Tab: URL    Esc/q: quit",
                "Enter: open    j/k: move    d: forget    Tab: URL    Esc/q: quit",
                "Enter open | j/k | d forget | Tab URL | q quit",
            ),
        };
        let footer_height = key_hint_height(area.width, key_text);
        let [header, input_area, body, footer] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(footer_height),
            ])
            .areas(area);

        let header_text = Text::from(vec![
            Line::from("treepull"),
            focus_line("Enter a repository URL or open one from history"),
        ]);
        frame.render_widget(
            wrapped_paragraph(header_text).block(theme::chrome("Repository")),
            header,
        );

        self.render_url_input(frame, input_area);
        self.render_history(frame, body);

        let hints = key_hint_paragraph(key_text).block(theme::key_block());
        frame.render_widget(hints, footer);
    }

    fn render_url_input(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.start_focus == StartFocus::Url;
        let title = if focused {
            focus_line("Repository URL")
        } else {
            Line::from("Repository URL (Tab to focus)")
        };

        let width = area.width.saturating_sub(2) as usize;
        let scroll = self.url_input.visual_scroll(width);
        let paragraph = Paragraph::new(self.url_input.value())
            .scroll((0, scroll as u16))
            .block(theme::chrome(title));
        frame.render_widget(paragraph, area);

        if focused && width > 0 {
            let visual = self.url_input.visual_cursor();
            let relative = visual.saturating_sub(scroll).min(width.saturating_sub(1));
            frame.set_cursor_position((area.x + 1 + relative as u16, area.y + 1));
        }
    }

    fn render_history(&self, frame: &mut Frame<'_>, area: Rect) {
        let history = self.controller.state().history();
        let title = if self.start_focus == StartFocus::History {
            focus_line("History")
        } else {
            Line::from("History (Tab to focus)")
        };

        if history.is_empty() {
            let empty = Paragraph::new("No repositories fetched yet.").block(theme::chrome(title));
            frame.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem<'_>> = history.iter().map(history_item).collect();
        let list = List::new(items)
            .block(theme::chrome(title))
            .highlight_style(theme::table_highlight(Color::Cyan));

        let mut state = ListState::default();
        if self.start_focus == StartFocus::History {
            state.select(Some(self.history_selected));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_files(&self, frame: &mut Frame<'_>, snapshot: &RepositorySnapshot) {
        let state = self.controller.state();
        let area = frame.area();
        let key_text = if self.filter_focused {
            compact_hint(
                area.width,
                "Type: filter    Backspace: delete    Tab/Esc: list focus",
                "Type filter    Backspace delete    Tab/Esc: list",
                "Type filter | Tab/Esc list",
            )
        } else {
            compact_hint(
                area.width,
                "Space: toggle    a/n: all/none    1/2/3: sort    c: category    /: filter    b: branch    r: refetch    p: pull    Esc: back    q: quit",
                "Space toggle  a/n all/none  1/2/3 sort  c category  / filter  b branch  p pull  Esc back",
                "Space | a/n | 1/2/3 | c | / | b | p pull | Esc",
            )
        };
        let footer_height = key_hint_height(area.width, key_text);
        let [header, filter_area, body, footer] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5),
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(footer_height),
            ])
            .areas(area);

        let branch = snapshot
            .branch
            .clone()
            .unwrap_or_else(|| state.selected_branch().to_string());
        let truncated = if snapshot.truncated {
            " (truncated by fetch limits)"
        } else {
            ""
        };
        let header_text = Text::from(vec![
            label_value_line("repository", snapshot.identity.full_name.clone()),
            label_value_line(
                "branch",
                format!(
                    "{branch} of {} known",
                    state.branches().len().max(1)
                ),
            ),
            label_value_line(
                "files",
                format!(
                    "{} shown of {}, {} selected{truncated}",
                    self.files.rows().len(),
                    snapshot.file_count(),
                    state.selection().len()
                ),
            ),
        ]);
        frame.render_widget(
            wrapped_paragraph(header_text).block(theme::chrome(focus_line("Repository"))),
            header,
        );

        let category = self
            .files
            .category()
            .map(|category| category.as_str())
            .unwrap_or("all");
        let filter_title = if self.filter_focused {
            focus_line(format!("Filter (category: {category})"))
        } else {
            Line::from(format!("Filter (/ to focus, category: {category})"))
        };
        self.files
            .render_filter(frame, filter_area, filter_title, self.filter_focused);

        let sort = self.files.sort();
        let title = format!(
            "Files sorted by {} {}",
            sort.column.as_str(),
            sort.direction.as_str()
        );
        self.files.render_table(
            frame,
            body,
            FileTableRender {
                title: if self.filter_focused {
                    Line::from(title)
                } else {
                    focus_line(title)
                },
                empty_message: "No files match the current filter.",
                header_style: theme::table_header(Color::Cyan),
                highlight_style: theme::table_highlight(Color::Cyan),
            },
            |path| state.is_selected(path),
        );

        let hints = key_hint_paragraph(key_text).block(theme::key_block());
        frame.render_widget(hints, footer);
    }
}

fn history_item(entry: &RepositorySnapshot) -> ListItem<'static> {
    let branch = entry.branch.as_deref().unwrap_or("-");
    ListItem::new(format!(
        "{}  [{branch}]  {}  {}",
        entry.identity.full_name,
        count_label(entry.file_count(), "file"),
        display_timestamp(&entry.fetched_at)
    ))
}

fn with_created_files(notice: Notice, created: &[String]) -> Notice {
    if notice.level != NoticeLevel::Info || created.is_empty() {
        return notice;
    }

    let mut message = notice.message;
    message.push('\n');
    for path in created.iter().take(CREATED_FILES_SHOWN) {
        message.push('\n');
        message.push_str(path);
    }
    if created.len() > CREATED_FILES_SHOWN {
        message.push_str(&format!(
            "\n... and {} more",
            created.len() - CREATED_FILES_SHOWN
        ));
    }

    Notice {
        level: notice.level,
        message,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::{Arc, Mutex};

    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use treepull_core::controller::FetchController;
    use treepull_core::lifecycle::NoticeLevel;
    use treepull_core::snapshot::{RepoIdentity, RepositorySnapshot};
    use treepull_core::transport::{PullOutcome, RepoTransport};
    use treepull_core::tree::FileEntry;

    use super::{BrowseOps, BrowseScreen, BrowseSignal, Overlay};

    const URL: &str = "https://github.com/octo/demo";

    fn snapshot(url: &str, branch: &str, paths: &[&str]) -> RepositorySnapshot {
        RepositorySnapshot {
            branch: Some(branch.to_string()),
            fetched_at: "2026-01-02T03:04:05Z".to_string(),
            truncated: false,
            identity: RepoIdentity {
                name: "demo".to_string(),
                full_name: "octo/demo".to_string(),
                description: None,
                stars: None,
                forks: None,
                language: None,
                owner_avatar: None,
                html_url: url.to_string(),
            },
            contents: paths
                .iter()
                .map(|path| FileEntry::file(path, Some(format!("blob:{path}"))))
                .collect(),
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        branches: Vec<String>,
        trees: BTreeMap<String, Vec<&'static str>>,
        history: Vec<RepositorySnapshot>,
        fail_fetch: bool,
        fetch_gate: Mutex<Option<Receiver<()>>>,
        fetches: Mutex<Vec<String>>,
        pulled: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn demo() -> Self {
            let mut trees = BTreeMap::new();
            trees.insert(
                "main".to_string(),
                vec!["README.md", "src/components/Button.tsx", "src/apis/users.py"],
            );
            trees.insert("dev".to_string(), vec!["DEV.md"]);
            Self {
                branches: vec!["main".to_string(), "dev".to_string()],
                trees,
                ..Self::default()
            }
        }

        fn gated(self) -> (Self, Sender<()>) {
            let (sender, receiver) = mpsc::channel();
            *self.fetch_gate.lock().expect("gate lock") = Some(receiver);
            (self, sender)
        }

        fn fetches(&self) -> Vec<String> {
            self.fetches.lock().expect("fetch log").clone()
        }
    }

    impl RepoTransport for FakeTransport {
        fn list_branches(&self, _url: &str) -> Result<Vec<String>> {
            Ok(self.branches.clone())
        }

        fn fetch_snapshot(&self, url: &str, branch: &str) -> Result<RepositorySnapshot> {
            if let Some(gate) = self.fetch_gate.lock().expect("gate lock").take() {
                let _ = gate.recv();
            }
            self.fetches.lock().expect("fetch log").push(branch.to_string());
            if self.fail_fetch {
                return Err(anyhow!("repository not found"));
            }
            let paths = self
                .trees
                .get(branch)
                .ok_or_else(|| anyhow!("branch '{branch}' not found"))?;
            Ok(snapshot(url, branch, paths))
        }

        fn pull_files(&self, files: &[FileEntry]) -> Result<PullOutcome> {
            let paths: Vec<String> = files.iter().map(|file| file.path.clone()).collect();
            self.pulled.lock().expect("pull log").extend(paths.clone());
            Ok(PullOutcome::created(
                paths.iter().map(|path| format!("pulled/{path}")).collect(),
            ))
        }

        fn list_history(&self) -> Result<Vec<RepositorySnapshot>> {
            Ok(self.history.clone())
        }
    }

    #[derive(Default)]
    struct FakeOps {
        forgotten: RefCell<Vec<String>>,
    }

    impl BrowseOps for FakeOps {
        fn forget(&self, url: &str) -> Result<()> {
            self.forgotten.borrow_mut().push(url.to_string());
            Ok(())
        }
    }

    fn screen_with(transport: Arc<FakeTransport>, initial_url: Option<&str>) -> BrowseScreen {
        let controller = FetchController::new(transport, "main");
        let mut screen = BrowseScreen::new(controller, initial_url.map(str::to_string));
        settle(&mut screen);
        screen
    }

    fn settle(screen: &mut BrowseScreen) {
        loop {
            screen.controller.wait_idle();
            screen.sync();
            if screen.controller.in_flight() == 0 {
                break;
            }
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(screen: &mut BrowseScreen, ops: &FakeOps, code: KeyCode) -> BrowseSignal {
        let signal = screen.on_key(key(code), ops);
        settle(screen);
        signal
    }

    fn type_text(screen: &mut BrowseScreen, ops: &FakeOps, text: &str) {
        for character in text.chars() {
            press(screen, ops, KeyCode::Char(character));
        }
    }

    fn render_output(screen: &BrowseScreen, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal
            .draw(|frame| screen.render(frame))
            .expect("render browse screen");
        format!("{}", terminal.backend())
    }

    #[test]
    fn submitting_a_url_discovers_branches_then_shows_files() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(Arc::clone(&transport), None);

        type_text(&mut screen, &ops, URL);
        press(&mut screen, &ops, KeyCode::Enter);

        let state = screen.controller.state();
        assert_eq!(state.branches(), ["main", "dev"]);
        assert_eq!(transport.fetches(), vec!["main"]);
        assert_eq!(screen.files.rows().len(), 3);

        let output = render_output(&screen, 140, 30);
        assert!(output.contains("octo/demo"));
        assert!(output.contains("Button.tsx"));
        assert!(output.contains("3 shown of 3, 0 selected"));
    }

    #[test]
    fn initial_url_is_fetched_immediately() {
        let transport = Arc::new(FakeTransport::demo());
        let screen = screen_with(Arc::clone(&transport), Some(URL));

        assert!(screen.controller.state().snapshot().is_some());
        assert_eq!(transport.fetches(), vec!["main"]);
    }

    #[test]
    fn invalid_url_shows_error_until_dismissed() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(Arc::clone(&transport), None);

        type_text(&mut screen, &ops, "nope");
        press(&mut screen, &ops, KeyCode::Enter);

        assert!(matches!(screen.overlays.front(), Some(Overlay::Error(message)) if message.contains("invalid repository URL")));
        assert!(render_output(&screen, 120, 30).contains("invalid repository URL"));
        assert!(transport.fetches().is_empty());

        press(&mut screen, &ops, KeyCode::Enter);
        assert!(screen.overlays.is_empty());
    }

    #[test]
    fn fetch_failure_is_reported_and_stays_on_start_screen() {
        let transport = Arc::new(FakeTransport {
            fail_fetch: true,
            ..FakeTransport::demo()
        });
        let screen = screen_with(transport, Some(URL));

        assert!(screen.controller.state().snapshot().is_none());
        assert!(matches!(screen.overlays.front(), Some(Overlay::Error(message)) if message.contains("repository not found")));
        assert!(render_output(&screen, 120, 30).contains("Repository URL"));
    }

    #[test]
    fn toggled_files_are_pulled_and_reported() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(Arc::clone(&transport), Some(URL));

        // Rows sort by name: Button.tsx, README.md, users.py.
        press(&mut screen, &ops, KeyCode::Char('j'));
        press(&mut screen, &ops, KeyCode::Char(' '));
        assert!(screen.controller.state().is_selected("README.md"));

        press(&mut screen, &ops, KeyCode::Char('p'));

        assert_eq!(
            *transport.pulled.lock().expect("pull log"),
            vec!["README.md".to_string()]
        );
        let Some(Overlay::Notice(notice)) = screen.overlays.front() else {
            panic!("expected pull notice");
        };
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(notice.message.starts_with("Pulled 1 file(s)"));
        assert!(notice.message.contains("pulled/README.md"));
    }

    #[test]
    fn pull_without_selection_shows_warning() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(Arc::clone(&transport), Some(URL));

        press(&mut screen, &ops, KeyCode::Char('p'));

        let Some(Overlay::Notice(notice)) = screen.overlays.front() else {
            panic!("expected rejection notice");
        };
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.message.contains("no files are selected"));
        assert!(transport.pulled.lock().expect("pull log").is_empty());
    }

    #[test]
    fn select_all_and_none_follow_snapshot_files() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(transport, Some(URL));

        press(&mut screen, &ops, KeyCode::Char('a'));
        assert_eq!(screen.controller.state().selection().len(), 3);
        assert!(render_output(&screen, 140, 30).contains("[x]"));

        press(&mut screen, &ops, KeyCode::Char('n'));
        assert_eq!(screen.controller.state().selection().len(), 0);
    }

    #[test]
    fn filter_focus_routes_typing_to_the_filter() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(transport, Some(URL));

        press(&mut screen, &ops, KeyCode::Char('/'));
        type_text(&mut screen, &ops, "py");
        assert_eq!(screen.files.rows().len(), 1);

        press(&mut screen, &ops, KeyCode::Esc);
        assert!(!screen.filter_focused);
        assert!(screen.controller.state().snapshot().is_some());
    }

    #[test]
    fn branch_cycle_refetches_next_branch() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(Arc::clone(&transport), Some(URL));

        press(&mut screen, &ops, KeyCode::Char('b'));

        assert_eq!(transport.fetches(), vec!["main", "dev"]);
        assert_eq!(screen.controller.state().selected_branch(), "dev");
        assert_eq!(screen.files.rows().len(), 1);
    }

    #[test]
    fn esc_in_file_browser_returns_to_history() {
        let transport = Arc::new(FakeTransport {
            history: vec![snapshot(URL, "main", &["README.md"])],
            ..FakeTransport::demo()
        });
        let ops = FakeOps::default();
        let mut screen = screen_with(transport, Some(URL));

        press(&mut screen, &ops, KeyCode::Esc);

        assert!(screen.controller.state().snapshot().is_none());
        let output = render_output(&screen, 120, 30);
        assert!(output.contains("History"));
        assert!(output.contains("octo/demo  [main]  1 file"));
    }

    #[test]
    fn opening_history_loads_snapshot_without_fetching() {
        let transport = Arc::new(FakeTransport {
            history: vec![snapshot(URL, "main", &["README.md", "docs/guide.md"])],
            ..FakeTransport::demo()
        });
        let ops = FakeOps::default();
        let mut screen = screen_with(Arc::clone(&transport), None);

        press(&mut screen, &ops, KeyCode::Tab);
        press(&mut screen, &ops, KeyCode::Enter);

        assert!(transport.fetches().is_empty());
        assert_eq!(screen.files.rows().len(), 2);
        assert_eq!(screen.controller.state().url(), Some(URL));
    }

    #[test]
    fn refetch_after_opening_history_keeps_the_shown_branch() {
        let transport = Arc::new(FakeTransport {
            history: vec![snapshot(URL, "dev", &["DEV.md"])],
            ..FakeTransport::demo()
        });
        let ops = FakeOps::default();
        let mut screen = screen_with(Arc::clone(&transport), None);

        press(&mut screen, &ops, KeyCode::Tab);
        press(&mut screen, &ops, KeyCode::Enter);
        assert_eq!(screen.controller.state().selected_branch(), "main");

        press(&mut screen, &ops, KeyCode::Char('r'));

        assert_eq!(transport.fetches(), vec!["dev"]);
        assert_eq!(screen.files.rows().len(), 1);
    }

    #[test]
    fn forgetting_history_goes_through_ops() {
        let transport = Arc::new(FakeTransport {
            history: vec![snapshot(URL, "main", &["README.md"])],
            ..FakeTransport::demo()
        });
        let ops = FakeOps::default();
        let mut screen = screen_with(transport, None);

        press(&mut screen, &ops, KeyCode::Tab);
        press(&mut screen, &ops, KeyCode::Char('d'));

        assert_eq!(*ops.forgotten.borrow(), vec![URL.to_string()]);
    }

    #[test]
    fn esc_while_fetching_discards_the_late_snapshot() {
        let (transport, release) = FakeTransport::demo().gated();
        let transport = Arc::new(transport);
        let ops = FakeOps::default();
        let controller = FetchController::new(Arc::clone(&transport) as Arc<dyn RepoTransport>, "main");
        let mut screen = BrowseScreen::new(controller, Some(URL.to_string()));

        // History listing and branch discovery settle; the fetch is held.
        while screen.pending_snapshot.is_some() {
            screen.controller.wait();
            screen.sync();
        }
        assert!(screen.is_busy());
        assert!(render_output(&screen, 120, 30).contains("Fetching"));

        screen.on_key(key(KeyCode::Esc), &ops);
        release.send(()).expect("release fetch");
        settle(&mut screen);

        assert!(screen.controller.state().snapshot().is_none());
        assert!(screen.overlays.is_empty());
        assert_eq!(transport.fetches(), vec!["main"]);
    }

    #[test]
    fn q_quits_from_file_browser() {
        let transport = Arc::new(FakeTransport::demo());
        let ops = FakeOps::default();
        let mut screen = screen_with(transport, Some(URL));

        assert_eq!(press(&mut screen, &ops, KeyCode::Char('q')), BrowseSignal::Quit);
    }
}
