use chrono::Utc;
use ratatui::{
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use elimwatch_core::models::{PlayerRecord, PlayerSortColumn};
use elimwatch_core::utils::format_hms;

use crate::app::App;
use crate::ui::styles;

/// Render the Roster tab - the watched team's members as a sortable,
/// filterable table with live hospital countdowns.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if app.coordinator.selected_team().is_none() {
        render_no_selection(frame, area);
        return;
    }

    let players = app.visible_players();
    let now_epoch = Utc::now().timestamp();

    let sort_indicator = |col: PlayerSortColumn| {
        if app.player_sort_column == col {
            if app.player_sort_ascending {
                " ▲"
            } else {
                " ▼"
            }
        } else {
            ""
        }
    };

    let header_cells = [
        Cell::from("ID"),
        Cell::from(format!("Name{}", sort_indicator(PlayerSortColumn::Name))),
        Cell::from(format!("Lvl{}", sort_indicator(PlayerSortColumn::Level))),
        Cell::from(format!("Status{}", sort_indicator(PlayerSortColumn::Status))),
        Cell::from(format!(
            "Last Action{}",
            sort_indicator(PlayerSortColumn::LastAction)
        )),
        Cell::from(format!("Attacks{}", sort_indicator(PlayerSortColumn::Attacks))),
        Cell::from(format!("Score{}", sort_indicator(PlayerSortColumn::Score))),
        Cell::from(format!("Est{}", sort_indicator(PlayerSortColumn::Estimate))),
        Cell::from("Hospital"),
    ];

    let header = Row::new(header_cells)
        .style(styles::title_style())
        .height(1);

    let rows: Vec<Row> = players
        .iter()
        .map(|player| {
            Row::new(vec![
                Cell::from(player.id.to_string()),
                Cell::from(player.name.clone()),
                Cell::from(format!("{:>3}", player.level)),
                Cell::from(Span::styled(
                    player.status.display(),
                    styles::state_style(&player.status.state),
                )),
                Cell::from(player.last_action.clone()),
                Cell::from(format!("{:>7}", player.attacks)),
                Cell::from(format!("{:>7}", player.score)),
                Cell::from(player.estimate.label.clone()),
                hospital_cell(player, now_epoch),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Length(9),  // ID
        Constraint::Fill(2),    // Name
        Constraint::Length(5),  // Lvl
        Constraint::Fill(3),    // Status
        Constraint::Length(16), // Last Action
        Constraint::Length(8),  // Attacks
        Constraint::Length(8),  // Score
        Constraint::Length(7),  // Est
        Constraint::Length(10), // Hospital
    ];

    let team_name = app.selected_team_name().unwrap_or("unknown team");
    let title = format!(
        " Roster - {} ({} of {}) ",
        team_name,
        players.len(),
        app.roster.len()
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.player_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

/// Countdown to hospital release, colored by urgency. Overdue stays are
/// shown with a leading minus until the next refresh clears them.
fn hospital_cell(player: &PlayerRecord, now_epoch: i64) -> Cell<'static> {
    match player.hospital_remaining(now_epoch) {
        Some(remaining) => {
            let text = if remaining < 0 {
                format!("-{}", format_hms(remaining.unsigned_abs()))
            } else {
                format_hms(remaining as u64)
            };
            Cell::from(Span::styled(text, styles::countdown_style(remaining)))
        }
        None => Cell::from(Span::styled("-", styles::muted_style())),
    }
}

fn render_no_selection(frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("  No team selected", styles::highlight_style())),
        Line::from(""),
        Line::from(Span::styled(
            "  Pick one on the Teams tab with Enter.",
            styles::muted_style(),
        )),
    ])
    .block(
        Block::default()
            .title(" Roster ")
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(paragraph, area);
}
