use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arbsense_dashboard::app::{Dashboard, InputMode};
use arbsense_dashboard::config::Config;
use arbsense_dashboard::error::Result;
use arbsense_dashboard::reconciler::Tab;
use arbsense_dashboard::types::Side;
use arbsense_dashboard::ui;

const TICK: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // The terminal owns stdout, so logs go to a file.
    let log_file = match OpenOptions::new().create(true).append(true).open(&cfg.log_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Cannot open log file {}: {e}", cfg.log_file);
            std::process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        eprintln!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(api = %cfg.api_url, wallet = ?cfg.wallet_rpc_url, "Starting dashboard");
    let mut app = Dashboard::start(&cfg).await?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    app.shutdown();
    info!("Dashboard closed");
    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut Dashboard,
) -> Result<()> {
    loop {
        app.drain_events();
        terminal.draw(|f| ui::render(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.mode {
            InputMode::Browse => {
                if !handle_browse_key(app, key) {
                    return Ok(());
                }
            }
            InputMode::Amount(_) => handle_amount_key(app, key),
            InputMode::CreateBet(_) => handle_form_key(app, key),
        }
    }
}

/// Returns false when the user asked to quit.
fn handle_browse_key(app: &mut Dashboard, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return false,
        KeyCode::Right | KeyCode::Tab | KeyCode::Char('l') => app.next_tab(),
        KeyCode::Left | KeyCode::BackTab | KeyCode::Char('h') => app.prev_tab(),
        KeyCode::Char(c @ '1'..='7') => {
            let idx = c as usize - '1' as usize;
            app.tab = Tab::ALL[idx];
        }
        KeyCode::Char('r') | KeyCode::Char('R') => app.request_refresh(),
        KeyCode::Char('c') | KeyCode::Char('C') => app.connect_wallet(),
        _ if app.tab == Tab::FunBets => match key.code {
            KeyCode::Down | KeyCode::Char('j') => app.select_next_bet(),
            KeyCode::Up | KeyCode::Char('k') => app.select_prev_bet(),
            KeyCode::Char('a') | KeyCode::Char('A') => app.place_selected_bet(Side::A),
            KeyCode::Char('b') | KeyCode::Char('B') => app.place_selected_bet(Side::B),
            KeyCode::Char('e') | KeyCode::Char('E') => app.begin_amount_edit(),
            KeyCode::Char('n') | KeyCode::Char('N') => app.begin_create_bet(),
            _ => {}
        },
        _ => {}
    }
    true
}

fn handle_amount_key(app: &mut Dashboard, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.commit_amount(),
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Backspace => {
            if let InputMode::Amount(raw) = &mut app.mode {
                raw.pop();
            }
        }
        KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
            if let InputMode::Amount(raw) = &mut app.mode {
                raw.push(c);
            }
        }
        _ => {}
    }
}

fn handle_form_key(app: &mut Dashboard, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_bet_form(),
        KeyCode::Esc => app.cancel_input(),
        _ => {
            let InputMode::CreateBet(form) = &mut app.mode else {
                return;
            };
            match key.code {
                KeyCode::Tab => form.next_field(),
                KeyCode::Up | KeyCode::Down => form.toggle_category(),
                KeyCode::Backspace => form.backspace(),
                KeyCode::Char(c) => form.push(c),
                _ => {}
            }
        }
    }
}
