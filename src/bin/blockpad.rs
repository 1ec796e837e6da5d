use std::{
    cell::Cell,
    env, fs, io,
    path::{Path, PathBuf},
    rc::Rc,
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste,
        EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::Style,
    text::{Line, Span, Text},
    widgets::{Block as WidgetBlock, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use blockpad::editor::{PlacementOutcome, VerticalDirection, to_plain_text};
use blockpad::editor_display::EditorDisplay;
use blockpad::exchange::{DocumentFormat, read_blocks, write_blocks};
use blockpad::render::RenderResult;
use blockpad::theme::Theme;
use blockpad::{Block, BlockEditor, EditorEvent};

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const MOUSE_SCROLL_LINES: usize = 3;
/// Frames drawn back to back while a caret placement settles.
const MAX_SETTLE_FRAMES: usize = 4;

fn main() -> Result<()> {
    init_logging();
    run()
}

/// Logs go to a file, and only when `BLOCKPAD_LOG` is set, so they never
/// end up on the alternate screen.
fn init_logging() {
    let Ok(filter) = env::var("BLOCKPAD_LOG") else {
        return;
    };
    let path = env::var("BLOCKPAD_LOG_FILE").unwrap_or_else(|_| "blockpad.log".to_string());
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        eprintln!("blockpad: cannot open log file {path}");
        return;
    };
    if tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .is_err()
    {
        eprintln!("blockpad: a tracing subscriber is already installed");
    }
}

fn editor_wrap_configuration(width: usize) -> (usize, usize) {
    if width == 0 {
        return (1, 0);
    }
    if width < 60 {
        let padding = 2.min(width / 4);
        let wrap_width = width.saturating_sub(padding + 1).max(1);
        return (wrap_width, padding);
    }
    let mut left_padding = width.saturating_sub(100) / 2 + 4;
    let max_padding = width.saturating_sub(1) / 2;
    if left_padding > max_padding {
        left_padding = max_padding;
    }
    let wrap_width = width.saturating_sub(left_padding.saturating_mul(2)).max(1);
    (wrap_width, left_padding)
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(path_arg) = args.next() else {
        eprintln!("Usage: blockpad <file.json|file.md|file.ftml>");
        return Ok(());
    };
    let path = PathBuf::from(path_arg);

    let (blocks, format, initial_status) = load_blocks(&path)?;
    let mut app = App::new(blocks, path, format, initial_status);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )
    .context("failed to initialize terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )
    .ok();
    terminal.show_cursor().ok();

    res
}

fn load_blocks(path: &Path) -> Result<(Vec<Block>, DocumentFormat, Option<String>)> {
    let format = DocumentFormat::from_path(path);
    if !path.exists() {
        return Ok((Vec::new(), format, Some("New document".to_string())));
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    match read_blocks(&content, format) {
        Ok(blocks) => {
            info!(path = %path.display(), blocks = blocks.len(), format = format.label(), "loaded");
            Ok((blocks, format, None))
        }
        Err(err) => {
            warn!(path = %path.display(), "parse failed: {err:#}");
            let message = format!("Parse error: {err:#}. Starting with empty document.");
            Ok((Vec::new(), format, Some(message)))
        }
    }
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    while !app.should_quit() {
        if needs_redraw {
            for _ in 0..MAX_SETTLE_FRAMES {
                terminal
                    .draw(|frame| app.draw(frame))
                    .context("failed to draw frame")?;
                // A placed caret changes what the next frame shows.
                if !app.settle_caret() {
                    break;
                }
            }
            needs_redraw = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt)?;
            needs_redraw = true;
        }

        if last_tick.elapsed() >= tick_rate {
            let had_message_before = app.has_status_message();
            app.on_tick();
            last_tick = Instant::now();
            if had_message_before && !app.has_status_message() {
                needs_redraw = true;
            }
        }
    }

    Ok(())
}

struct App {
    display: EditorDisplay,
    theme: Theme,
    file_path: PathBuf,
    document_format: DocumentFormat,
    scroll_top: usize,
    should_quit: bool,
    dirty: Rc<Cell<bool>>,
    status_message: Option<(String, Instant)>,
    text_area: Rect,
    /// Block index a gutter drag started on.
    drag_from: Option<usize>,
}

impl App {
    fn new(
        blocks: Vec<Block>,
        path: PathBuf,
        format: DocumentFormat,
        initial_status: Option<String>,
    ) -> Self {
        let mut editor = BlockEditor::new(Vec::new());
        editor.load(blocks);
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        editor.subscribe(move |_| flag.set(true));

        Self {
            display: EditorDisplay::new(editor),
            theme: Theme::default(),
            file_path: path,
            document_format: format,
            scroll_top: 0,
            should_quit: false,
            dirty,
            status_message: initial_status.map(|msg| (msg, Instant::now())),
            text_area: Rect::default(),
            drag_from: None,
        }
    }

    fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn has_status_message(&self) -> bool {
        self.status_message.is_some()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Returns true when another frame is needed.
    fn settle_caret(&mut self) -> bool {
        self.display.place_pending_caret() != PlacementOutcome::Idle
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);
        let text_area = vertical[0];
        let status_area = vertical[1];
        self.text_area = text_area;

        let width = text_area.width.max(1) as usize;
        let (wrap_width, left_padding) = editor_wrap_configuration(width);
        let render = self
            .display
            .render_document(wrap_width, left_padding, &self.theme);

        self.display
            .update_after_render(text_area, render.total_lines);
        let viewport_height = text_area.height as usize;
        self.adjust_scroll(&render, viewport_height);

        let paragraph = Paragraph::new(Text::from(render.lines.clone()))
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(self.theme.background))
            .block(WidgetBlock::default().borders(Borders::NONE))
            .scroll((self.scroll_top as u16, 0));
        frame.render_widget(paragraph, text_area);

        if let Some(cursor) = self.display.last_cursor_visual()
            && cursor.line >= self.scroll_top
            && cursor.line < self.scroll_top + viewport_height
            && text_area.width > 0
        {
            let cursor_y = text_area.y + (cursor.line - self.scroll_top) as u16;
            let cursor_x = text_area.x + cursor.column.min(text_area.width - 1);
            frame.set_cursor_position(Position::new(cursor_x, cursor_y));
        }

        let status_line = self.status_line(status_area.width as usize);
        let status_widget = Paragraph::new(status_line)
            .block(WidgetBlock::default().borders(Borders::NONE))
            .style(self.theme.status_bar_style());
        frame.render_widget(status_widget, status_area);

        if self.display.slash_menu().is_open() {
            self.render_slash_menu(frame, text_area);
        }
    }

    fn render_slash_menu(&self, frame: &mut Frame, area: Rect) {
        let menu = self.display.slash_menu();
        let Some(anchor) = menu.anchor() else {
            return;
        };
        if area.width < 3 || area.height < 3 {
            return;
        }

        let label_width = menu
            .items()
            .iter()
            .map(|kind| kind.label().chars().count())
            .max()
            .unwrap_or(0) as u16;
        let width = (label_width + 4).min(area.width);
        let height = (menu.items().len() as u16 + 2).min(area.height);

        // Below the caret when it fits, above it otherwise.
        let max_x = area.x + area.width - width;
        let x = anchor.x.clamp(area.x, max_x);
        let bottom = area.y + area.height;
        let y = if anchor.y + height <= bottom {
            anchor.y
        } else {
            anchor.y.saturating_sub(height + 1).max(area.y)
        };
        let popup_area = Rect::new(x, y, width, height);

        frame.render_widget(Clear, popup_area);

        let items: Vec<ListItem> = menu
            .items()
            .iter()
            .map(|kind| ListItem::new(Line::from(kind.label())))
            .collect();
        let mut state = ListState::default();
        state.select(menu.highlighted());

        let list = List::new(items)
            .highlight_style(self.theme.menu_selected_style())
            .style(self.theme.menu_style())
            .block(
                WidgetBlock::default()
                    .title("Turn into")
                    .borders(Borders::ALL)
                    .style(self.theme.menu_style())
                    .border_style(self.theme.menu_border_style()),
            );

        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    fn status_line(&mut self, terminal_width: usize) -> Line<'static> {
        self.prune_status_message();

        let position = self.cursor_position_text();
        if let Some((message, _)) = &self.status_message {
            return Line::from(vec![
                Span::raw(format!("{position} ")),
                Span::raw(message.clone()),
            ]);
        }

        let filename = self.file_path.display().to_string();
        let marker = if self.dirty.get() { "*" } else { "" };
        let block_label = self
            .display
            .current_block()
            .map(|block| block.kind.label())
            .unwrap_or_default();
        let selected = self.display.selection().len();

        let all_shortcuts = ["^L:Select", "^K:Check", "^E:Export", "/:Turn into", "^S:Save", "^Q:Quit"];

        let mut spans = vec![
            Span::raw(position),
            Span::raw(" "),
            Span::styled(format!("{filename}{marker}"), self.theme.filename_style()),
        ];
        if !block_label.is_empty() {
            spans.push(Span::raw(format!(" {block_label}")));
        }
        spans.push(Span::raw(format!(
            ", {} blocks, {} words",
            self.display.blocks().len(),
            self.display.word_count()
        )));
        if selected > 0 {
            spans.push(Span::raw(format!(", {selected} selected")));
        }

        let left_width: usize = spans.iter().map(|span| span.content.chars().count()).sum();
        let min_padding = 1;
        let mut shortcuts_to_show = Vec::new();
        let mut shortcuts_width = 0;
        for shortcut in all_shortcuts.iter().rev() {
            let test_width = if shortcuts_to_show.is_empty() {
                shortcut.chars().count()
            } else {
                shortcuts_width + 1 + shortcut.chars().count()
            };
            if left_width + min_padding + test_width <= terminal_width {
                shortcuts_to_show.insert(0, *shortcut);
                shortcuts_width = test_width;
            } else {
                break;
            }
        }

        if !shortcuts_to_show.is_empty() {
            let padding = terminal_width
                .saturating_sub(left_width)
                .saturating_sub(shortcuts_width)
                .max(min_padding);
            spans.push(Span::raw(" ".repeat(padding)));
            spans.push(Span::raw(shortcuts_to_show.join(" ")));
        }

        Line::from(spans)
    }

    fn cursor_position_text(&self) -> String {
        let Some(caret) = self.display.caret_location() else {
            return "?:?".to_string();
        };
        let index = self
            .display
            .store()
            .index_of(&caret.block)
            .map(|index| index + 1)
            .unwrap_or(0);
        format!("{}:{}", index, caret.offset + 1)
    }

    fn prune_status_message(&mut self) {
        if let Some((_, instant)) = &self.status_message
            && instant.elapsed() > STATUS_TIMEOUT
        {
            self.status_message = None;
        }
    }

    fn adjust_scroll(&mut self, render: &RenderResult, viewport_height: usize) {
        let viewport = viewport_height.max(1);
        let max_scroll = render.total_lines.saturating_sub(viewport);
        if self.scroll_top > max_scroll {
            self.scroll_top = max_scroll;
        }
        if self.display.cursor_following()
            && let Some(cursor) = self.display.last_cursor_visual()
        {
            self.scroll_top = self.scroll_top_for_cursor(cursor.line, viewport, max_scroll);
        }
    }

    fn scroll_top_for_cursor(&self, cursor_line: usize, viewport: usize, max_scroll: usize) -> usize {
        let mut scroll = self.scroll_top.min(max_scroll);
        let margin = if viewport >= 3 { 1 } else { 0 };
        let top_limit = scroll.saturating_add(margin);
        let bottom_offset = viewport.saturating_sub(1).saturating_sub(margin);
        let bottom_limit = scroll.saturating_add(bottom_offset);
        if cursor_line < top_limit {
            scroll = cursor_line.saturating_sub(margin);
        } else if cursor_line > bottom_limit {
            scroll = cursor_line.saturating_sub(bottom_offset);
        }
        scroll.min(max_scroll)
    }

    fn scroll_by_lines(&mut self, delta: isize) {
        if delta == 0 {
            return;
        }
        self.display.set_cursor_following(false);
        let viewport = self.display.last_view_height().max(1);
        let max_scroll = self.display.last_total_lines().saturating_sub(viewport) as isize;
        let new_scroll = (self.scroll_top as isize + delta).clamp(0, max_scroll.max(0));
        self.scroll_top = new_scroll as usize;
    }

    /// Screen cell right below the caret, where the slash menu pops up.
    fn menu_anchor(&self) -> (u16, u16) {
        let Some(cursor) = self.display.last_cursor_visual() else {
            return (self.text_area.x, self.text_area.y);
        };
        let row = cursor.line.saturating_sub(self.scroll_top) as u16;
        (
            self.text_area.x + cursor.column,
            self.text_area.y + row + 1,
        )
    }

    fn handle_slash_menu_key(&mut self, code: KeyCode) -> bool {
        if !self.display.slash_menu().is_open() {
            return false;
        }
        let event = match code {
            KeyCode::Up => EditorEvent::SlashMove { delta: -1 },
            KeyCode::Down => EditorEvent::SlashMove { delta: 1 },
            KeyCode::Enter | KeyCode::Tab => EditorEvent::SlashConfirm,
            KeyCode::Esc => EditorEvent::SlashClose,
            _ => {
                // Any other key abandons the menu and is handled as usual.
                self.display.handle(EditorEvent::SlashClose);
                return false;
            }
        };
        self.display.handle(event);
        true
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        if self.handle_slash_menu_key(code) {
            return Ok(());
        }

        let has_selection = !self.display.selection().is_empty();
        match (code, modifiers) {
            (KeyCode::Char('q'), m) | (KeyCode::Char('c'), m)
                if m.contains(KeyModifiers::CONTROL) =>
            {
                self.should_quit = true;
            }
            (KeyCode::Char('s'), m) if m.contains(KeyModifiers::CONTROL) => {
                if let Err(err) = self.save() {
                    warn!("save failed: {err:#}");
                    self.set_status(format!("Save failed: {err:#}"));
                }
            }
            (KeyCode::Char('e'), m) if m.contains(KeyModifiers::CONTROL) => {
                if let Err(err) = self.export_plain_text() {
                    self.set_status(format!("Export failed: {err:#}"));
                }
            }
            (KeyCode::Char('k'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.display.toggle_checked();
            }
            (KeyCode::Char('l'), m) if m.contains(KeyModifiers::CONTROL) => {
                self.display.toggle_selection();
            }
            (KeyCode::Esc, _) => {
                self.display.handle(EditorEvent::SelectionClear);
            }
            (KeyCode::Enter, m) if m.contains(KeyModifiers::SHIFT) => {
                self.display.insert_newline();
            }
            (KeyCode::Enter, _) => {
                self.display.enter();
            }
            (KeyCode::Backspace, _) | (KeyCode::Delete, _) if has_selection => {
                self.display.handle(EditorEvent::DeleteSelected);
            }
            (KeyCode::Backspace, _) => {
                self.display.backspace();
            }
            (KeyCode::Delete, _) => {
                self.display.delete();
            }
            (KeyCode::Left, m) if m.contains(KeyModifiers::CONTROL) => {
                self.display.move_word_left();
            }
            (KeyCode::Right, m) if m.contains(KeyModifiers::CONTROL) => {
                self.display.move_word_right();
            }
            (KeyCode::Left, _) => {
                self.display.move_left();
            }
            (KeyCode::Right, _) => {
                self.display.move_right();
            }
            (KeyCode::Up, m) if m.contains(KeyModifiers::ALT) => {
                self.display.move_current_block(VerticalDirection::Up);
            }
            (KeyCode::Down, m) if m.contains(KeyModifiers::ALT) => {
                self.display.move_current_block(VerticalDirection::Down);
            }
            (KeyCode::Up, m) if m.contains(KeyModifiers::SHIFT) => {
                self.display.extend_selection(VerticalDirection::Up);
            }
            (KeyCode::Down, m) if m.contains(KeyModifiers::SHIFT) => {
                self.display.extend_selection(VerticalDirection::Down);
            }
            (KeyCode::Up, _) => self.display.move_cursor_vertical(-1),
            (KeyCode::Down, _) => self.display.move_cursor_vertical(1),
            (KeyCode::PageUp, _) => self.display.move_page(-1),
            (KeyCode::PageDown, _) => self.display.move_page(1),
            (KeyCode::Home, _) => self.display.move_to_visual_line_start(),
            (KeyCode::End, _) => self.display.move_to_visual_line_end(),
            (KeyCode::Char(ch), m)
                if !m.contains(KeyModifiers::CONTROL) && !m.contains(KeyModifiers::ALT) =>
            {
                if self.display.insert_char(ch) && ch == '/' && self.display.at_slash_trigger() {
                    let (x, y) = self.menu_anchor();
                    self.display.open_slash_menu(x, y);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_mouse_event(&mut self, event: MouseEvent) {
        if self.display.slash_menu().is_open() {
            if matches!(event.kind, MouseEventKind::Down(_)) {
                self.display.handle(EditorEvent::SlashClose);
            }
            return;
        }

        match event.kind {
            MouseEventKind::ScrollUp => {
                self.scroll_by_lines(-(MOUSE_SCROLL_LINES as isize));
            }
            MouseEventKind::ScrollDown => {
                self.scroll_by_lines(MOUSE_SCROLL_LINES as isize);
            }
            MouseEventKind::Down(MouseButton::Left) => self.handle_mouse_down(event),
            MouseEventKind::Up(MouseButton::Left) => self.handle_mouse_up(event),
            _ => {}
        }
    }

    fn handle_mouse_down(&mut self, event: MouseEvent) {
        if self.display.in_gutter(event.column) {
            self.drag_from = self
                .display
                .block_index_at_row(event.row, self.scroll_top);
            debug!(from = ?self.drag_from, "drag started");
            return;
        }
        if let Some(display) = self
            .display
            .pointer_from_mouse(event.column, event.row, self.scroll_top)
        {
            self.display.focus_display(&display);
        }
    }

    fn handle_mouse_up(&mut self, event: MouseEvent) {
        let Some(from) = self.drag_from.take() else {
            return;
        };
        let Some(to) = self
            .display
            .block_index_at_row(event.row, self.scroll_top)
        else {
            return;
        };
        if from != to {
            self.display.handle(EditorEvent::DragDrop { from, to });
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) => self.handle_key(code, modifiers)?,
            Event::Paste(text) => {
                self.display.paste(text, None);
            }
            Event::Mouse(mouse_event) => self.handle_mouse_event(mouse_event),
            _ => {}
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        self.prune_status_message();
    }

    fn save(&mut self) -> Result<()> {
        let contents = write_blocks(self.display.blocks(), self.document_format)?;
        fs::write(&self.file_path, contents)
            .with_context(|| format!("failed to write {}", self.file_path.display()))?;
        info!(path = %self.file_path.display(), format = self.document_format.label(), "saved");
        self.dirty.set(false);
        self.set_status("Saved");
        Ok(())
    }

    fn export_plain_text(&mut self) -> Result<()> {
        let path = self.file_path.with_extension("txt");
        if path == self.file_path {
            anyhow::bail!("refusing to overwrite {}", path.display());
        }
        fs::write(&path, to_plain_text(self.display.blocks()))
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.set_status(format!("Exported {}", path.display()));
        Ok(())
    }
}
