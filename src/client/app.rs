use crate::client::net;
use crate::client::state::{ClientEvent, DashboardState};
use crate::client::ui;
use crate::config::DashboardConfig;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run the dashboard against a backend. Network tasks feed one channel;
/// the render loop owns the terminal and all state.
pub async fn run(base_url: String, config: DashboardConfig) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel::<ClientEvent>();
    let client = reqwest::Client::new();

    let mut tasks = net::spawn_snapshot(client.clone(), base_url.clone(), tx.clone());
    tasks.push(net::spawn_push(client.clone(), base_url.clone(), tx.clone()));
    tasks.push(net::spawn_poller(
        client,
        base_url,
        config.poll_interval,
        config.skip_if_inflight,
        tx,
    ));

    let state = DashboardState::new(&config);
    let result = tokio::task::spawn_blocking(move || ui_loop(state, rx)).await?;

    for task in tasks {
        task.abort();
    }
    result
}

fn ui_loop(mut state: DashboardState, mut rx: UnboundedReceiver<ClientEvent>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut state, &mut rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &mut DashboardState,
    rx: &mut UnboundedReceiver<ClientEvent>,
) -> Result<()> {
    loop {
        while let Ok(event) = rx.try_recv() {
            state.apply(event);
        }

        terminal.draw(|f| ui::draw(f, state))?;

        if event::poll(INPUT_POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return Ok(());
                }
            }
        }
    }
}
