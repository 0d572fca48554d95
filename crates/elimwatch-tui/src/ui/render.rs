use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, AppState, LoginFocus, Tab};

use super::styles;
use super::tabs::{roster, teams};

/// Logo in the style of the overlay headers ("ELIMWATCH").
const LOGO: [&str; 3] = [
    "╔═╗╦  ╦╔╦╗╦ ╦╔═╗╔╦╗╔═╗╦ ╦",
    "║╣ ║  ║║║║║║║╠═╣ ║ ║  ╠═╣",
    "╚═╝╩═╝╩╩ ╩╚╩╝╩ ╩ ╩ ╚═╝╩ ╩",
];

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(2), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame, app);
    }

    if matches!(app.state, AppState::LoggingIn) {
        render_login_overlay(frame, app);
    }

    if matches!(app.state, AppState::Inspecting) {
        render_inspect_overlay(frame, app);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Elimwatch";
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + help_hint.len() as u16 + 2)
                as usize,
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    // Second line: who is watching, with their own live status
    let user_line = match &app.metadata.profile {
        Some(profile) => Line::from(vec![
            Span::styled(format!("  {}", profile.display_line()), styles::list_item_style()),
            Span::raw("  "),
            Span::styled(
                profile.status.display(),
                styles::state_style(&profile.status.state),
            ),
        ]),
        None => Line::from(Span::styled("  not signed in", styles::muted_style())),
    };

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(vec![title_line, user_line]).block(block);
    frame.render_widget(paragraph, area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let main_tabs = [
        ("[1] Teams", app.current_tab == Tab::Teams),
        ("[2] Roster", app.current_tab == Tab::Roster),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (i, (label, selected)) in main_tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        if *selected {
            spans.push(Span::styled(*label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(*label, styles::muted_style()));
        }
    }

    // Current sort on the right
    let (column, ascending) = match app.current_tab {
        Tab::Teams => (app.team_sort_column.title(), app.team_sort_ascending),
        Tab::Roster => (app.player_sort_column.title(), app.player_sort_ascending),
    };
    let sort_text = format!(
        "sort: {} {}  [s] column [S] direction",
        column,
        if ascending { "▲" } else { "▼" }
    );

    let main_width: usize = spans.iter().map(|s| s.content.len()).sum();
    let padding = (area.width as usize).saturating_sub(main_width + sort_text.chars().count() + 2);
    spans.push(Span::raw(" ".repeat(padding)));
    spans.push(Span::styled(sort_text, styles::muted_style()));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Teams => teams::render(frame, app, area),
        Tab::Roster => roster::render(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let now = Utc::now();
    let shortcuts = "[r]efresh | [q]uit";

    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else {
        let standings = format!(
            "standings {} (next {})",
            app.coordinator.metadata_age(now),
            countdown_label(app.metadata_refresh_in(now))
        );
        let roster = match app.coordinator.selected_team() {
            Some(team_id) => format!(
                "roster {} (next {})",
                app.coordinator.roster_age(team_id, now),
                countdown_label(app.roster_refresh_in(now))
            ),
            None => "roster --".to_string(),
        };
        format!(" {} | {} ", standings, roster)
    };

    let right_text = format!(" {} ", shortcuts);

    // Filter summary sits in the middle while the roster tab is up
    let center_text = if app.current_tab == Tab::Roster {
        format!("filters: {}", app.filters.summary())
    } else {
        String::new()
    };

    let width = area.width as usize;

    if center_text.is_empty() {
        let padding_len = width
            .saturating_sub(left_text.chars().count())
            .saturating_sub(right_text.chars().count());
        let status_line = Line::from(vec![
            Span::styled(left_text, styles::muted_style()),
            Span::raw(" ".repeat(padding_len)),
            Span::styled(right_text, styles::muted_style()),
        ]);
        let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
        frame.render_widget(paragraph, area);
    } else {
        // Center the filter summary absolutely, regardless of the sides
        let center_start = (width.saturating_sub(center_text.chars().count())) / 2;
        let left_pad = center_start.saturating_sub(left_text.chars().count());
        let right_start = center_start + center_text.chars().count();
        let right_pad = width
            .saturating_sub(right_start)
            .saturating_sub(right_text.chars().count());

        let status_line = Line::from(vec![
            Span::styled(left_text, styles::muted_style()),
            Span::raw(" ".repeat(left_pad)),
            Span::styled(center_text, styles::highlight_style()),
            Span::raw(" ".repeat(right_pad)),
            Span::styled(right_text, styles::muted_style()),
        ]);
        let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
        frame.render_widget(paragraph, area);
    }
}

fn countdown_label(secs: Option<i64>) -> String {
    match secs {
        Some(s) => format!("{}s", s),
        None => "--".to_string(),
    }
}

fn render_help_overlay(frame: &mut Frame, _app: &App) {
    let area = centered_rect_fixed(52, 28, frame.area());

    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let mut help_text = logo_lines(11);
    help_text.push(Line::from(Span::styled(
        format!("                 version {}", version),
        styles::muted_style(),
    )));
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(" Navigation", styles::highlight_style())));
    for (key, desc) in [
        ("1/2, Tab  ", "Switch tabs"),
        ("↑/↓, j/k  ", "Navigate list"),
        ("PgUp/PgDn ", "Jump ten rows"),
        ("Enter     ", "Watch team under cursor"),
        ("Esc       ", "Close overlay"),
    ] {
        help_text.push(help_line(key, desc));
    }
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(" Roster filters", styles::highlight_style())));
    for (key, desc) in [
        ("o         ", "Okay players only"),
        ("t         ", "Include traveling"),
        ("a         ", "Include abroad"),
        ("[ / ]     ", "Level lower bound down/up"),
        ("{ / }     ", "Level upper bound down/up"),
        ("i         ", "Inspect raw record"),
    ] {
        help_text.push(help_line(key, desc));
    }
    help_text.push(Line::from(""));
    help_text.push(Line::from(Span::styled(" Actions", styles::highlight_style())));
    for (key, desc) in [
        ("s / S     ", "Sort column / direction"),
        ("r         ", "Refresh current tab now"),
        ("L         ", "Forget keys, sign in again"),
        ("q         ", "Quit"),
    ] {
        help_text.push(help_line(key, desc));
    }
    help_text.push(Line::from(""));
    help_text.push(Line::from(vec![
        Span::styled("       Press ", styles::muted_style()),
        Span::styled("?", styles::help_key_style()),
        Span::styled(" or ", styles::muted_style()),
        Span::styled("Esc", styles::help_key_style()),
        Span::styled(" to close", styles::muted_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(help_text).block(block);

    frame.render_widget(paragraph, area);
}

fn help_line(key: &str, desc: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {}", key), styles::help_key_style()),
        Span::styled(desc.to_string(), styles::help_desc_style()),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 16 } else { 14 };
    let area = centered_rect_fixed(46, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = logo_lines(9);
    lines.push(Line::from(""));

    lines.push(key_field_line(
        "API key:   ",
        &app.login_api_key,
        app.login_focus == LoginFocus::ApiKey,
    ));
    lines.push(key_field_line(
        "Stats key: ",
        &app.login_stats_key,
        app.login_focus == LoginFocus::StatsKey,
    ));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "   Stats key optional, fills the Est column",
        styles::muted_style(),
    )));
    lines.push(Line::from(""));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    if button_focused {
        lines.push(Line::from(vec![
            Span::raw("            ["),
            Span::styled(" ▶ Accept ◀ ", button_style),
            Span::raw("]"),
        ]));
    } else {
        lines.push(Line::from(vec![
            Span::raw("            ["),
            Span::styled("   Accept   ", button_style),
            Span::raw("]"),
        ]));
    }

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "   Enter submits, Esc cancels",
        styles::muted_style(),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block);

    frame.render_widget(paragraph, area);
}

/// Key fields render masked; the key itself never appears on screen.
fn key_field_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let field_style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let masked: String = "*".repeat(value.chars().count().min(24));
    let display = format!("{:<24}", masked);
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{}[", label), styles::muted_style()),
        Span::styled(format!("{}{}", display, cursor), field_style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_inspect_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(64, 24, frame.area());

    frame.render_widget(Clear, area);

    let text = app.inspect_text.as_deref().unwrap_or("");

    let block = Block::default()
        .title(" Raw record - [Esc] close ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 9, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = logo_lines(9);
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "   Are you sure you want to quit?",
        styles::highlight_style(),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("   Press ", styles::muted_style()),
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(" to quit, ", styles::muted_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" to cancel", styles::muted_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    let paragraph = Paragraph::new(lines).block(block);

    frame.render_widget(paragraph, area);
}

fn logo_lines(indent: usize) -> Vec<Line<'static>> {
    LOGO.iter()
        .map(|row| {
            Line::from(Span::styled(
                format!("{}{}", " ".repeat(indent), row),
                styles::title_style(),
            ))
        })
        .collect()
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
