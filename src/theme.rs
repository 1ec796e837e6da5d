use ratatui::style::{Color, Modifier, Style};

/// Colours used by the renderer and the terminal front end.
#[derive(Clone, Debug)]
pub struct Theme {
    /// Background color for the editor
    pub background: Color,

    pub status_bar_fg: Color,
    pub status_bar_bg: Color,

    /// Color for the current file name in the status bar
    pub filename_color: Color,

    /// Blocks in the bulk selection set
    pub selection_fg: Color,
    pub selection_bg: Color,

    /// A block that holds focus without a text caret (dividers, images)
    pub focused_block_fg: Color,
    pub focused_block_bg: Color,

    pub heading_color: Color,
    pub list_marker_color: Color,
    pub quote_color: Color,
    pub code_fg: Color,
    pub code_bg: Color,
    pub checked_color: Color,
    pub divider_color: Color,
    pub image_color: Color,

    /// Drag handle shown in the left gutter
    pub handle_color: Color,

    pub menu_fg: Color,
    pub menu_bg: Color,
    pub menu_border: Color,
    pub menu_selected_fg: Color,
    pub menu_selected_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Reset,
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            filename_color: Color::LightYellow,
            selection_fg: Color::White,
            selection_bg: Color::LightBlue,
            focused_block_fg: Color::Black,
            focused_block_bg: Color::Gray,
            heading_color: Color::Reset,
            list_marker_color: Color::Cyan,
            quote_color: Color::Gray,
            code_fg: Color::LightGreen,
            code_bg: Color::Reset,
            checked_color: Color::DarkGray,
            divider_color: Color::DarkGray,
            image_color: Color::Magenta,
            handle_color: Color::DarkGray,
            menu_fg: Color::White,
            menu_bg: Color::Black,
            menu_border: Color::Gray,
            menu_selected_fg: Color::Black,
            menu_selected_bg: Color::White,
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_bar_style(&self) -> Style {
        Style::default()
            .fg(self.status_bar_fg)
            .bg(self.status_bar_bg)
    }

    pub fn filename_style(&self) -> Style {
        Style::default().fg(self.filename_color)
    }

    pub fn selection_style(&self) -> Style {
        Style::default().fg(self.selection_fg).bg(self.selection_bg)
    }

    pub fn focused_block_style(&self) -> Style {
        Style::default()
            .fg(self.focused_block_fg)
            .bg(self.focused_block_bg)
    }

    pub fn heading_style(&self) -> Style {
        Style::default()
            .fg(self.heading_color)
            .add_modifier(Modifier::BOLD)
    }

    pub fn list_marker_style(&self) -> Style {
        Style::default().fg(self.list_marker_color)
    }

    pub fn quote_style(&self) -> Style {
        Style::default()
            .fg(self.quote_color)
            .add_modifier(Modifier::ITALIC)
    }

    pub fn code_style(&self) -> Style {
        Style::default().fg(self.code_fg).bg(self.code_bg)
    }

    /// Text of a ticked checklist item
    pub fn checked_style(&self) -> Style {
        Style::default()
            .fg(self.checked_color)
            .add_modifier(Modifier::CROSSED_OUT)
    }

    pub fn divider_style(&self) -> Style {
        Style::default().fg(self.divider_color)
    }

    pub fn image_style(&self) -> Style {
        Style::default().fg(self.image_color)
    }

    pub fn handle_style(&self) -> Style {
        Style::default().fg(self.handle_color)
    }

    pub fn menu_style(&self) -> Style {
        Style::default().fg(self.menu_fg).bg(self.menu_bg)
    }

    pub fn menu_border_style(&self) -> Style {
        Style::default().fg(self.menu_border)
    }

    pub fn menu_selected_style(&self) -> Style {
        Style::default()
            .fg(self.menu_selected_fg)
            .bg(self.menu_selected_bg)
    }
}
