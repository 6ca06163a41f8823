use crate::client::chart;
use crate::client::state::{DashboardState, BURST_HISTORY_CAPACITY, DEVICE_COLUMNS};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table};
use ratatui::Frame;

// Virtual canvas height for the burst chart, in the same unit space as
// the polyline geometry.
const CHART_HEIGHT: f64 = 100.0;

pub fn draw(f: &mut Frame, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),    // devices + alerts/score
            Constraint::Length(10), // burst chart
            Constraint::Length(1),  // key hints
        ])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[0]);

    draw_devices(f, state, columns[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(columns[1]);
    draw_score(f, state, side[0]);
    draw_alerts(f, state, side[1]);

    draw_chart(f, state, chunks[1]);
    draw_hints(f, chunks[2]);
}

fn draw_devices(f: &mut Frame, state: &DashboardState, area: Rect) {
    let header = Row::new(DEVICE_COLUMNS.to_vec()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    let rows = state
        .device_rows()
        .into_iter()
        .map(|cells| Row::new(cells.to_vec()));
    let widths = [
        Constraint::Length(17),
        Constraint::Length(15),
        Constraint::Length(16),
        Constraint::Min(10),
        Constraint::Length(11),
        Constraint::Length(11),
        Constraint::Length(10),
    ];
    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Devices "),
    );
    f.render_widget(table, area);
}

fn draw_score(f: &mut Frame, state: &DashboardState, area: Rect) {
    let score = Paragraph::new(Line::from(Span::styled(
        state.score_text(),
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Security Score "),
    );
    f.render_widget(score, area);
}

fn draw_alerts(f: &mut Frame, state: &DashboardState, area: Rect) {
    let items: Vec<ListItem> = state
        .alerts()
        .map(|alert| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    alert.kind.to_uppercase(),
                    Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(": "),
                Span::raw(alert.desc.clone()),
            ]))
        })
        .collect();
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Alerts "),
    );
    f.render_widget(list, area);
}

fn draw_chart(f: &mut Frame, state: &DashboardState, area: Rect) {
    let samples = state.burst_history().samples();
    let points = chart::polyline(CHART_HEIGHT, &samples);
    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Burst anomalies "),
        )
        .x_bounds([0.0, chart::x_extent(BURST_HISTORY_CAPACITY)])
        .y_bounds([0.0, CHART_HEIGHT])
        .paint(move |ctx| {
            for pair in points.windows(2) {
                // Polyline points are screen-space (y down); the canvas
                // y axis points up.
                ctx.draw(&CanvasLine {
                    x1: pair[0].0,
                    y1: CHART_HEIGHT - pair[0].1,
                    x2: pair[1].0,
                    y2: CHART_HEIGHT - pair[1].1,
                    color: Color::Cyan,
                });
            }
        });
    f.render_widget(canvas, area);
}

fn draw_hints(f: &mut Frame, area: Rect) {
    let hints = Paragraph::new(Line::from(Span::styled(
        " q: quit ",
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(hints, area);
}
