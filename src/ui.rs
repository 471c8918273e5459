use crate::app::{App, SearchBox, DROPDOWN_ROWS};
use crate::charts::widgets::{put, truncate, ACCENT, MUTED};
use crate::charts::ChartKind;
use crate::data::LoadState;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};

const SIDEBAR_WIDTH: u16 = 24;

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Chart
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let (nav, body) = if app.sidebar_open {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(10)])
            .split(chunks[0]);
        (Some(cols[0]), cols[1])
    } else {
        (None, chunks[0])
    };

    if let Some(nav) = nav {
        render_nav(app, nav, frame.buffer_mut());
    }
    render_chart(app, body, frame.buffer_mut());
    render_status_bar(frame, app, chunks[1]);
}

fn render_nav(app: &App, area: Rect, buf: &mut Buffer) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MUTED))
        .title(Span::styled(
            " tui-raise ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    let active = app.active_kind();
    for (row, (kind, state)) in app.tabs().enumerate() {
        if row as u16 >= inner.height {
            break;
        }
        let hotkey = (row + 1) % 10;
        let marker = match state {
            Some(Err(_)) => "!",
            _ => " ",
        };
        let style = if kind == active {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else if matches!(state, Some(Err(_))) {
            Style::default().fg(MUTED)
        } else {
            Style::default()
        };
        let text = format!("{hotkey} {} {marker}", kind.label());
        put(buf, inner, 0, row as u16, &text, style);
    }
}

fn render_chart(app: &App, area: Rect, buf: &mut Buffer) {
    let kind = app.active_kind();
    let title = match app.active_chart() {
        Some(LoadState::Loaded(chart)) => chart.title().to_string(),
        _ => kind.label().to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MUTED))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    let mut inner = block.inner(area);
    block.render(area, buf);

    let search_line = app.search.as_ref().map(|_| Rect { height: 1, ..inner });
    if search_line.is_some() {
        inner.y += 1;
        inner.height = inner.height.saturating_sub(1);
    }

    match app.active_chart() {
        Some(LoadState::Loaded(chart)) => chart.render(inner, buf),
        Some(LoadState::Failed(msg)) => render_error(kind, msg, inner, buf),
        None => {}
    }

    if let (Some(line), Some(search)) = (search_line, app.search.as_ref()) {
        render_search(search, line, buf);
    }
}

/// Inline error for a chart whose sources failed to load
fn render_error(kind: ChartKind, message: &str, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::styled(
            format!("⚠ {} unavailable", kind.label()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Line::default(),
        Line::styled(message.to_string(), Style::default().fg(Color::Red)),
    ];
    Paragraph::new(lines).wrap(Wrap { trim: true }).render(area, buf);
}

fn render_search(search: &SearchBox, line: Rect, buf: &mut Buffer) {
    Clear.render(line, buf);
    let prompt = Line::from(vec![
        Span::styled("/ ", Style::default().fg(ACCENT)),
        Span::raw(search.text.as_str()),
        Span::styled("▏", Style::default().fg(ACCENT)),
    ]);
    Paragraph::new(prompt).render(line, buf);

    if search.suggestions.is_empty() {
        return;
    }

    let rows = search.suggestions.len().min(DROPDOWN_ROWS) as u16;
    let width = search
        .suggestions
        .iter()
        .take(DROPDOWN_ROWS)
        .map(|s| s.chars().count() as u16)
        .max()
        .unwrap_or(0)
        .saturating_add(4)
        .min(line.width);
    let dropdown = Rect {
        x: line.x,
        y: line.y + 1,
        width,
        height: (rows + 2).min(buf.area.bottom().saturating_sub(line.y + 1)),
    };
    Clear.render(dropdown, buf);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MUTED));
    let inner = block.inner(dropdown);
    block.render(dropdown, buf);

    for (i, name) in search.suggestions.iter().take(DROPDOWN_ROWS).enumerate() {
        let style = if search.selected == Some(i) {
            Style::default().fg(Color::Black).bg(ACCENT)
        } else {
            Style::default()
        };
        let text = truncate(name, inner.width as usize);
        put(buf, inner, 0, i as u16, &text, style);
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (status, keys) = match app.active_chart() {
        Some(LoadState::Loaded(chart)) => (chart.status(), chart.keys()),
        Some(LoadState::Failed(_)) => ("unavailable".to_string(), ""),
        None => (String::new(), ""),
    };
    let hints = if app.search.is_some() {
        " | ↑↓ pick  enter confirm  esc cancel  ⌫ on empty: drop term"
    } else {
        " | tab/1-0 chart  s sidebar  r reset  q quit"
    };

    let mut spans = vec![
        Span::styled(" ", Style::default()),
        Span::styled(status, Style::default().fg(Color::Yellow)),
    ];
    if !keys.is_empty() && app.search.is_none() {
        spans.push(Span::styled(" | ", Style::default().fg(MUTED)));
        spans.push(Span::styled(keys, Style::default().fg(Color::Cyan)));
    }
    spans.push(Span::styled(hints, Style::default().fg(MUTED)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::data::{Sources, Table};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    fn app(start: ChartKind) -> App {
        let works = Table::from_csv("works.csv", "type,title\narticle,a\nreview,b\n").unwrap();
        App::new(Sources::from_tables(Some(works), None, None), Config::default(), start)
    }

    #[test]
    fn test_shell_shows_nav_and_status() {
        let text = screen(&app(ChartKind::Waffle));
        assert!(text.contains("tui-raise"));
        assert!(text.contains("Co-authorship"));
        assert!(text.contains("2 types, 2 works"));
    }

    #[test]
    fn test_failed_chart_renders_inline_error() {
        let text = screen(&app(ChartKind::Bubble));
        assert!(text.contains("Researchers unavailable"));
    }

    #[test]
    fn test_search_dropdown_is_drawn() {
        let mut app = app(ChartKind::Waffle);
        app.on_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE));
        app.on_key(KeyEvent::new(KeyCode::Char('/'), KeyModifiers::NONE));
        app.on_key(KeyEvent::new(KeyCode::Char('v'), KeyModifiers::NONE));
        let text = screen(&app);
        assert!(!text.contains("tui-raise"));
        assert!(text.contains("/ v"));
        assert!(text.contains("review"));
    }
}
