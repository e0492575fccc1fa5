//! Interactive comment thread.
//!
//! The collapse set, reply target and drafts live in [`ThreadViewState`];
//! this module only tracks the cursor and which composer has focus.

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self as ct_event, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use devtask_core::api::{ApiError, Backend};
use devtask_core::model::{Comment, CommentId};
use devtask_core::thread::{ThreadRow, ThreadViewState, count_all, find, organize_comments};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Which composer has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Thread,
    Reply,
    Root,
}

/// Result of handling one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Submit,
    Quit,
}

pub struct ThreadApp {
    title: String,
    roots: Vec<Comment>,
    state: ThreadViewState,
    cursor: usize,
    focus: Focus,
    flash: Option<String>,
    error: Option<String>,
}

impl ThreadApp {
    pub fn new(title: impl Into<String>, state: ThreadViewState) -> Self {
        Self {
            title: title.into(),
            roots: Vec::new(),
            state,
            cursor: 0,
            focus: Focus::Thread,
            flash: None,
            error: None,
        }
    }

    pub const fn focus(&self) -> Focus {
        self.focus
    }

    pub const fn state(&self) -> &ThreadViewState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Refetch the thread, keeping collapse state for comments that remain.
    pub fn reload<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<(), ApiError> {
        let flat = backend.list_comments(self.state.task_id())?;
        self.roots = organize_comments(&flat);
        self.state.prune(&self.roots);
        if self.focus == Focus::Reply && self.state.replying_to().is_none() {
            self.focus = Focus::Thread;
        }
        self.clamp_cursor();
        Ok(())
    }

    fn rows(&self) -> Vec<ThreadRow<'_>> {
        self.state.visible_rows(&self.roots)
    }

    fn selected_id(&self) -> Option<CommentId> {
        self.rows().get(self.cursor).map(|r| r.comment.id.clone())
    }

    fn clamp_cursor(&mut self) {
        let len = self.rows().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn move_down(&mut self) {
        if self.cursor + 1 < self.rows().len() {
            self.cursor += 1;
        }
    }

    fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.state.toggle_collapse(&id);
            self.clamp_cursor();
        }
    }

    fn start_reply(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if let Some(target) = find(&self.roots, &id) {
            self.state.initiate_reply(target);
            self.focus = Focus::Reply;
            self.error = None;
        }
    }

    fn draft_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            Focus::Reply => Some(self.state.reply_draft_mut()),
            Focus::Root => Some(self.state.root_draft_mut()),
            Focus::Thread => None,
        }
    }

    fn draft(&self) -> &str {
        match self.focus {
            Focus::Reply => self.state.reply_draft(),
            Focus::Root | Focus::Thread => self.state.root_draft(),
        }
    }

    /// Send the focused draft.
    ///
    /// Validation and backend failures are shown in the status line and the
    /// draft is kept. An expired session is returned to the caller.
    pub fn submit<B: Backend + ?Sized>(&mut self, backend: &B) -> Result<(), ApiError> {
        let draft = match self.focus {
            Focus::Reply => self.state.submit_reply(),
            Focus::Root => self.state.submit_root(),
            Focus::Thread => return Ok(()),
        };
        let new_comment = match draft {
            Ok(c) => c,
            Err(err) => {
                self.error = Some(err.to_string());
                return Ok(());
            }
        };

        let created = backend.create_comment(&new_comment);
        self.state.complete_submit(created.is_ok());
        match created {
            Ok(comment) => {
                tracing::debug!(comment = %comment.id, "comment posted from thread view");
                self.focus = Focus::Thread;
                self.error = None;
                self.flash = Some(if comment.is_reply() {
                    "Reply posted".to_string()
                } else {
                    "Comment posted".to_string()
                });
                match self.reload(backend) {
                    Err(err) if !err.is_unauthorized() => {
                        self.error = Some(format!("posted, but refresh failed: {err}"));
                        Ok(())
                    }
                    other => other,
                }
            }
            Err(err) if err.is_unauthorized() => Err(err),
            Err(err) => {
                self.error = Some(err.to_string());
                Ok(())
            }
        }
    }
}

/// Route one key press.
pub fn handle_key(app: &mut ThreadApp, key: KeyEvent) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    app.flash = None;

    if app.focus == Focus::Thread {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
            KeyCode::Char('j') | KeyCode::Down => app.move_down(),
            KeyCode::Char('k') | KeyCode::Up => app.move_up(),
            KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected(),
            KeyCode::Char('r') => app.start_reply(),
            KeyCode::Char('c') => {
                app.focus = Focus::Root;
                app.error = None;
            }
            _ => {}
        }
        return KeyAction::None;
    }

    if ctrl && key.code == KeyCode::Char('s') {
        return KeyAction::Submit;
    }
    match key.code {
        KeyCode::Esc => {
            // A reply draft is dropped on cancel; the root draft is kept.
            if app.focus == Focus::Reply {
                app.state.cancel_reply();
            }
            app.focus = Focus::Thread;
            app.error = None;
        }
        KeyCode::Enter => push_char(app, '\n'),
        KeyCode::Tab => push_char(app, '\t'),
        KeyCode::Backspace => {
            if let Some(draft) = app.draft_mut() {
                draft.pop();
            }
        }
        KeyCode::Char(ch) if !ctrl => push_char(app, ch),
        _ => {}
    }
    KeyAction::None
}

fn push_char(app: &mut ThreadApp, ch: char) {
    if let Some(draft) = app.draft_mut() {
        draft.push(ch);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn row_item(row: &ThreadRow<'_>) -> ListItem<'static> {
    let indent = "  ".repeat(row.depth);
    let marker = match (row.has_replies(), row.collapsed) {
        (false, _) => "•",
        (true, false) => "▾",
        (true, true) => "▸",
    };
    let mut header = vec![
        Span::raw(format!("{indent}{marker} ")),
        Span::styled(
            row.comment.author_name().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", row.comment.created_at.format("%Y-%m-%d %H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if row.collapsed {
        header.push(Span::styled(
            format!("  ({} hidden)", row.reply_count),
            Style::default().fg(Color::Yellow),
        ));
    }
    if row.is_reply_target {
        header.push(Span::styled("  ↩ replying", Style::default().fg(Color::Cyan)));
    }

    let mut lines = vec![Line::from(header)];
    lines.extend(
        row.comment
            .content
            .lines()
            .map(|l| Line::from(format!("{indent}  {l}"))),
    );
    ListItem::new(lines)
}

fn render_composer(frame: &mut ratatui::Frame<'_>, app: &ThreadApp, area: Rect) {
    frame.render_widget(Clear, area);
    let title = match app.focus {
        Focus::Reply => {
            let name = app
                .state
                .replying_to()
                .and_then(|id| find(&app.roots, id))
                .map_or("comment", Comment::author_name);
            format!(" Reply to {name} ")
        }
        Focus::Root | Focus::Thread => " New comment ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(Color::Green))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let mut text: Vec<Line<'static>> = app
        .draft()
        .split('\n')
        .map(|l| Line::from(l.to_string()))
        .collect();
    if let Some(last) = text.last_mut() {
        last.push_span(Span::styled("▏", Style::default().fg(Color::Cyan)));
    }
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), chunks[0]);

    let busy = if app.state.is_submitting() { "  sending…" } else { "" };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Ctrl+S", Style::default().fg(Color::Cyan)),
            Span::styled(" submit  ", Style::default().fg(Color::DarkGray)),
            Span::styled("Esc", Style::default().fg(Color::Cyan)),
            Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
            Span::styled(busy, Style::default().fg(Color::Yellow)),
        ])),
        chunks[1],
    );
}

fn footer(app: &ThreadApp) -> Line<'static> {
    if let Some(err) = &app.error {
        return Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    if let Some(flash) = &app.flash {
        return Line::from(Span::styled(flash.clone(), Style::default().fg(Color::Green)));
    }
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));
    let label = |l: &'static str| Span::styled(l, Style::default().fg(Color::DarkGray));
    Line::from(vec![
        key("j/k"),
        label(" move  "),
        key("space"),
        label(" collapse  "),
        key("r"),
        label(" reply  "),
        key("c"),
        label(" comment  "),
        key("q"),
        label(" quit"),
    ])
}

pub fn render(frame: &mut ratatui::Frame<'_>, app: &ThreadApp) {
    let area = frame.area();
    let composer_height = if app.focus == Focus::Thread { 0 } else { 8 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(composer_height),
            Constraint::Length(1),
        ])
        .split(area);

    let rows = app.rows();
    let items: Vec<ListItem<'static>> = rows.iter().map(row_item).collect();
    let heading = format!(" {} · {} comments ", app.title, count_all(&app.roots));
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_set(border::ROUNDED)
                .title(heading),
        )
        .highlight_style(Style::default().bg(Color::DarkGray));
    let mut list_state = ListState::default();
    if !rows.is_empty() {
        list_state.select(Some(app.cursor));
    }
    frame.render_stateful_widget(list, chunks[0], &mut list_state);
    if rows.is_empty() {
        let inner = chunks[0].inner(ratatui::layout::Margin::new(2, 1));
        frame.render_widget(
            Paragraph::new("No comments yet. Press c to start the thread.")
                .style(Style::default().fg(Color::DarkGray)),
            inner,
        );
    }

    if app.focus != Focus::Thread {
        render_composer(frame, app, chunks[1]);
    }
    frame.render_widget(Paragraph::new(footer(app)), chunks[2]);
}

// ---------------------------------------------------------------------------
// Terminal loop
// ---------------------------------------------------------------------------

/// Run the thread view until the user quits.
///
/// # Errors
///
/// Terminal I/O failures, or an [`ApiError::Unauthorized`] from the backend
/// (converted to `anyhow`), which ends the view.
pub fn run_thread_tui<B: Backend + ?Sized>(app: &mut ThreadApp, backend: &B) -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run_loop(&mut terminal, app, backend);

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop<B: Backend + ?Sized>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut ThreadApp,
    backend: &B,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        if !ct_event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = ct_event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match handle_key(app, key) {
            KeyAction::Quit => return Ok(()),
            KeyAction::Submit => {
                terminal.draw(|frame| render(frame, app))?;
                app.submit(backend)?;
            }
            KeyAction::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Focus, KeyAction, ThreadApp, handle_key, render};
    use chrono::{TimeZone, Utc};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use devtask_core::api::{ApiError, Backend};
    use devtask_core::memory::InMemoryBackend;
    use devtask_core::model::{Comment, CommentId, TaskId, User};
    use devtask_core::thread::ThreadViewState;
    use ratatui::{Terminal, backend::TestBackend};

    fn ada() -> User {
        User::new("u1", "ada@example.com").with_full_name("Ada Lovelace")
    }

    fn comment(id: &str, parent: Option<&str>, t: i64) -> Comment {
        Comment {
            id: id.into(),
            task_id: "t1".into(),
            user_id: "u1".into(),
            content: format!("body {id}"),
            parent_comment_id: parent.map(CommentId::from),
            created_at: Utc.timestamp_opt(t, 0).unwrap(),
            user: Some(ada()),
            replies: Vec::new(),
        }
    }

    fn setup() -> (InMemoryBackend, ThreadApp) {
        let backend = InMemoryBackend::new(User::new("u2", "bob@example.com"));
        backend.insert_comment(comment("1", None, 10));
        backend.insert_comment(comment("2", Some("1"), 20));
        backend.insert_comment(comment("3", None, 30));
        let mut app = ThreadApp::new("Write docs", ThreadViewState::new(TaskId::from("t1")));
        app.reload(&backend).unwrap();
        (backend, app)
    }

    fn press(app: &mut ThreadApp, code: KeyCode) -> KeyAction {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut ThreadApp, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn ctrl_s(app: &mut ThreadApp) -> KeyAction {
        handle_key(app, KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL))
    }

    #[test]
    fn space_collapses_selected_comment() {
        let (_backend, mut app) = setup();
        assert_eq!(app.rows().len(), 3);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.state().is_collapsed(&CommentId::from("1")));
        assert_eq!(app.rows().len(), 2);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.rows().len(), 3);
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let (_backend, mut app) = setup();
        for _ in 0..10 {
            press(&mut app, KeyCode::Char('j'));
        }
        assert_eq!(app.selected_id(), Some(CommentId::from("3")));
        for _ in 0..10 {
            press(&mut app, KeyCode::Up);
        }
        assert_eq!(app.selected_id(), Some(CommentId::from("1")));
    }

    #[test]
    fn reply_is_seeded_and_posted_under_target() {
        let (backend, mut app) = setup();
        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.focus(), Focus::Reply);
        assert_eq!(app.state().reply_draft(), "@Ada Lovelace ");

        type_text(&mut app, "done");
        assert_eq!(ctrl_s(&mut app), KeyAction::Submit);
        app.submit(&backend).unwrap();

        assert_eq!(app.focus(), Focus::Thread);
        assert!(app.state().replying_to().is_none());
        let flat = backend.list_comments(&TaskId::from("t1")).unwrap();
        let posted = flat.last().unwrap();
        assert_eq!(posted.content, "@Ada Lovelace done");
        assert_eq!(posted.parent_comment_id, Some(CommentId::from("1")));
        assert_eq!(app.rows().len(), 4);
    }

    #[test]
    fn escape_drops_reply_but_keeps_root_draft() {
        let (_backend, mut app) = setup();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "half written");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.focus(), Focus::Thread);
        assert_eq!(app.state().root_draft(), "half written");

        press(&mut app, KeyCode::Char('r'));
        press(&mut app, KeyCode::Esc);
        assert!(app.state().replying_to().is_none());
        assert_eq!(app.state().reply_draft(), "");
    }

    #[test]
    fn empty_root_comment_shows_error_and_sends_nothing() {
        let (backend, mut app) = setup();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "   ");
        app.submit(&backend).unwrap();
        assert!(app.error().is_some());
        assert_eq!(app.focus(), Focus::Root);
        assert_eq!(backend.call_count("create_comment"), 0);
    }

    #[test]
    fn failed_post_keeps_draft_for_retry() {
        let (backend, mut app) = setup();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "hello");
        backend.fail_next("create_comment");
        app.submit(&backend).unwrap();
        assert!(app.error().is_some());
        assert_eq!(app.state().root_draft(), "hello");
        assert!(!app.state().is_submitting());

        app.submit(&backend).unwrap();
        assert!(app.error().is_none());
        assert_eq!(app.state().root_draft(), "");
    }

    #[test]
    fn refresh_failure_after_post_stays_in_view() {
        let (backend, mut app) = setup();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "hello");
        backend.fail_next("list_comments");
        app.submit(&backend).unwrap();

        assert_eq!(app.focus(), Focus::Thread);
        assert!(app.error().unwrap().contains("refresh failed"));
        assert_eq!(app.state().root_draft(), "");
        assert_eq!(backend.list_comments(&TaskId::from("t1")).unwrap().len(), 4);

        app.reload(&backend).unwrap();
        assert_eq!(app.rows().len(), 4);
    }

    #[test]
    fn expired_session_on_refresh_ends_the_view() {
        let (backend, mut app) = setup();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "hello");
        backend.fail_next_with("list_comments", ApiError::Unauthorized("expired".into()));
        assert!(app.submit(&backend).unwrap_err().is_unauthorized());
    }

    #[test]
    fn expired_session_ends_the_view() {
        let (backend, mut app) = setup();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "hello");
        backend.fail_next_with("create_comment", ApiError::Unauthorized("expired".into()));
        assert!(app.submit(&backend).unwrap_err().is_unauthorized());
    }

    #[test]
    fn q_quits_only_from_thread_focus() {
        let (_backend, mut app) = setup();
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(press(&mut app, KeyCode::Char('q')), KeyAction::None);
        assert_eq!(app.state().root_draft(), "q");
        press(&mut app, KeyCode::Esc);
        assert_eq!(press(&mut app, KeyCode::Char('q')), KeyAction::Quit);
    }

    fn screen(app: &ThreadApp) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = usize::from(buffer.area.width);
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_thread_with_indented_reply() {
        let (_backend, app) = setup();
        let out = screen(&app);
        assert!(out.contains("Write docs · 3 comments"));
        assert!(out.contains("▾ Ada Lovelace"));
        assert!(out.contains("    body 2"));
        assert!(out.contains("q quit"));
    }

    #[test]
    fn renders_reply_composer_with_target() {
        let (_backend, mut app) = setup();
        press(&mut app, KeyCode::Char('r'));
        let out = screen(&app);
        assert!(out.contains("Reply to Ada Lovelace"));
        assert!(out.contains("@Ada Lovelace"));
        assert!(out.contains("Ctrl+S submit"));
        assert!(out.contains("↩ replying"));
    }
}
