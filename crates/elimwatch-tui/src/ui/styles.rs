// Allow dead code: style functions defined for consistent UI
#![allow(dead_code)]

use ratatui::style::{Color, Modifier, Style};

use elimwatch_core::models::PlayerState;

// Color palette
pub const PRIMARY: Color = Color::Rgb(64, 128, 192);
pub const SECONDARY: Color = Color::Rgb(96, 160, 96);
pub const ACCENT: Color = Color::Rgb(192, 160, 64);
pub const ERROR: Color = Color::Rgb(192, 64, 64);
pub const MUTED: Color = Color::Rgb(128, 128, 128);
pub const HIGHLIGHT: Color = Color::Rgb(48, 48, 64);

// Status colors
pub const OKAY: Color = Color::Rgb(96, 176, 96);
pub const HOSPITAL: Color = Color::Rgb(216, 136, 48);
pub const TRAVEL: Color = Color::Rgb(96, 144, 208);

// Styles
pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn success_style() -> Style {
    Style::default().fg(SECONDARY)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

pub fn tab_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(PRIMARY)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default().fg(Color::White)
    }
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

pub fn status_bar_style() -> Style {
    Style::default().bg(Color::Rgb(32, 32, 40)).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default()
        .fg(ACCENT)
        .add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}

/// Color for a player's activity state cell.
pub fn state_style(state: &PlayerState) -> Style {
    match state {
        PlayerState::Okay => Style::default().fg(OKAY),
        PlayerState::Hospital { .. } => Style::default().fg(HOSPITAL),
        PlayerState::Traveling { .. } | PlayerState::Abroad { .. } => {
            Style::default().fg(TRAVEL)
        }
        PlayerState::Unknown => Style::default().fg(Color::White),
    }
}

/// Hospital countdowns shift color as release approaches.
pub fn countdown_style(remaining_secs: i64) -> Style {
    if remaining_secs < 10 {
        Style::default().fg(ERROR).add_modifier(Modifier::BOLD)
    } else if remaining_secs < 60 {
        Style::default().fg(HOSPITAL)
    } else {
        Style::default().fg(OKAY)
    }
}

/// Knocked-out teams stay listed but fade back.
pub fn eliminated_style() -> Style {
    Style::default().fg(MUTED).add_modifier(Modifier::DIM)
}
