//! `ratatui` rendering: a bordered map pane plus a one-line status bar.

use crate::app::App;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", app.config.source),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }
    app.resize(inner.width as usize, inner.height as usize);
    app.draw();

    let widget = MapWidget {
        glyphs: app.renderer.canvas().cell_glyphs(),
        cell_width: app.renderer.canvas().cell_width(),
        cell_height: app.renderer.canvas().cell_height(),
    };
    frame.render_widget(widget, inner);
}

/// Renders a `Canvas::cell_glyphs()` grid directly into the buffer,
/// row-by-row, via `ratatui`'s own `set_char`/styled-cell API.
struct MapWidget {
    glyphs: Vec<(String, Option<u8>, Option<u8>)>,
    cell_width: usize,
    cell_height: usize,
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for row in 0..self.cell_height.min(area.height as usize) {
            for col in 0..self.cell_width.min(area.width as usize) {
                let (glyph, fg, bg) = &self.glyphs[row * self.cell_width + col];
                let Some(ch) = glyph.chars().next() else { continue };
                let x = area.x + col as u16;
                let y = area.y + row as u16;
                let mut style = Style::default();
                if let Some(fg) = fg {
                    style = style.fg(Color::Indexed(*fg));
                }
                if let Some(bg) = bg {
                    style = style.bg(Color::Indexed(*bg));
                }
                buf[(x, y)].set_char(ch).set_style(style);
            }
        }
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(" | hjkl:pan +/-:zoom q:quit", Style::default().fg(Color::DarkGray)),
    ];

    if let Some(notice) = &app.notice {
        spans.push(Span::styled(format!("  ! {notice}"), Style::default().fg(Color::Red)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
