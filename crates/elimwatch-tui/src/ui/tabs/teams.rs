use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use elimwatch_core::models::TeamSortColumn;

use crate::app::App;
use crate::ui::styles;

/// Render the Teams tab - the elimination standings as a sortable table.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let teams = app.sorted_teams();

    let sort_indicator = |col: TeamSortColumn| {
        if app.team_sort_column == col {
            if app.team_sort_ascending {
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
        Cell::from(format!("Name{}", sort_indicator(TeamSortColumn::Name))),
        Cell::from(format!("Members{}", sort_indicator(TeamSortColumn::Members))),
        Cell::from(format!("Score{}", sort_indicator(TeamSortColumn::Score))),
        Cell::from(format!("Wins{}", sort_indicator(TeamSortColumn::Wins))),
        Cell::from(format!("Losses{}", sort_indicator(TeamSortColumn::Losses))),
        Cell::from(format!("Lives{}", sort_indicator(TeamSortColumn::Lives))),
        Cell::from(format!("Pos{}", sort_indicator(TeamSortColumn::Position))),
        Cell::from("Eliminated"),
    ];

    let header = Row::new(header_cells)
        .style(styles::title_style())
        .height(1);

    let watched = app.coordinator.selected_team();

    let rows: Vec<Row> = teams
        .iter()
        .map(|team| {
            let style = if team.eliminated {
                styles::eliminated_style()
            } else {
                styles::list_item_style()
            };

            // Mark the watched team so it stands out after sorting
            let name = if watched == Some(team.id) {
                format!("{} *", team.name)
            } else {
                team.name.clone()
            };

            Row::new(vec![
                Cell::from(team.id.to_string()),
                Cell::from(name),
                Cell::from(format!("{:>7}", team.participants)),
                Cell::from(format!("{:>8}", team.score)),
                Cell::from(format!("{:>5}", team.wins)),
                Cell::from(format!("{:>6}", team.losses)),
                Cell::from(format!("{:>5}", team.lives)),
                Cell::from(format!("{:>3}", team.position)),
                Cell::from(if team.eliminated { "yes" } else { "" }),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(8),  // ID
        Constraint::Fill(1),    // Name
        Constraint::Length(8),  // Members
        Constraint::Length(9),  // Score
        Constraint::Length(6),  // Wins
        Constraint::Length(7),  // Losses
        Constraint::Length(6),  // Lives
        Constraint::Length(5),  // Pos
        Constraint::Length(10), // Eliminated
    ];

    let title = format!(" Standings ({} teams) - [Enter] watch ", teams.len());

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
    state.select(Some(app.team_selection));

    frame.render_stateful_widget(table, area, &mut state);
}
