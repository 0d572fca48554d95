use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{can_add_key_char, App, AppState, LoginFocus, Tab, PAGE_SCROLL_SIZE};

/// Handle a key event. Returns Ok(true) when the app should exit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Overlays swallow input before anything global runs
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::Inspecting => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('i') | KeyCode::Char('q')) {
                app.close_inspect();
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        _ => {}
    }

    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Char('1') => app.current_tab = Tab::Teams,
        KeyCode::Char('2') => app.current_tab = Tab::Roster,
        KeyCode::Tab => app.current_tab = app.current_tab.next(),
        KeyCode::BackTab => app.current_tab = app.current_tab.prev(),
        KeyCode::Char('r') => app.force_refresh(),
        KeyCode::Char('L') => app.logout(),
        KeyCode::Char('s') => app.cycle_sort(),
        KeyCode::Char('S') => app.flip_sort(),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::Home => app.move_selection(isize::MIN),
        KeyCode::End => app.move_selection(isize::MAX),
        KeyCode::Enter => {
            if app.current_tab == Tab::Teams {
                app.select_team_at_cursor();
            }
        }
        _ => {
            if app.current_tab == Tab::Roster {
                handle_roster_key(app, key);
            }
        }
    }

    Ok(false)
}

fn handle_roster_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('o') => app.toggle_okay_only(),
        KeyCode::Char('t') => app.toggle_traveling(),
        KeyCode::Char('a') => app.toggle_abroad(),
        KeyCode::Char('i') => app.inspect_selected_player(),
        KeyCode::Char('[') => app.lower_level_min(),
        KeyCode::Char(']') => app.raise_level_min(),
        KeyCode::Char('{') => app.lower_level_max(),
        KeyCode::Char('}') => app.raise_level_max(),
        _ => {}
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        // Cached data stays browsable without keys, so Esc just closes the form
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.login_error = None;
        }
        KeyCode::Tab | KeyCode::Down => {
            app.login_focus = match app.login_focus {
                LoginFocus::ApiKey => LoginFocus::StatsKey,
                LoginFocus::StatsKey => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::ApiKey,
            };
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.login_focus = match app.login_focus {
                LoginFocus::ApiKey => LoginFocus::Button,
                LoginFocus::StatsKey => LoginFocus::ApiKey,
                LoginFocus::Button => LoginFocus::StatsKey,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::ApiKey => app.login_focus = LoginFocus::StatsKey,
            LoginFocus::StatsKey => app.login_focus = LoginFocus::Button,
            LoginFocus::Button => {
                let _ = app.attempt_login().await;
            }
        },
        KeyCode::Backspace => {
            match app.login_focus {
                LoginFocus::ApiKey => {
                    app.login_api_key.pop();
                }
                LoginFocus::StatsKey => {
                    app.login_stats_key.pop();
                }
                LoginFocus::Button => {}
            }
            app.login_error = None;
        }
        KeyCode::Char(c) => {
            let field = match app.login_focus {
                LoginFocus::ApiKey => Some(&mut app.login_api_key),
                LoginFocus::StatsKey => Some(&mut app.login_stats_key),
                LoginFocus::Button => None,
            };
            if let Some(field) = field {
                if can_add_key_char(field.chars().count(), c) {
                    field.push(c);
                    app.login_error = None;
                }
            }
        }
        _ => {}
    }

    Ok(false)
}
