use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs},
    Frame,
};

use crate::app::{BetForm, Dashboard, FormField, InputMode, Notice};
use crate::reconciler::{wallet_summary, Tab, TableSection};
use crate::types::ConnectionStatus;
use crate::wallet::units::short_tx_hash;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

pub fn render(f: &mut Frame, app: &mut Dashboard) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(3), // tabs
            Constraint::Min(0),    // body
            Constraint::Length(1), // notice
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_tabs(f, app, chunks[1]);
    if app.tab == Tab::FunBets {
        render_fun_bets(f, app, chunks[2]);
    } else {
        render_sections(f, app, chunks[2]);
    }
    render_notice(f, app, chunks[3]);
    render_footer(f, app, chunks[4]);
}

fn render_header(f: &mut Frame, app: &mut Dashboard, area: Rect) {
    let live = app.live();
    let stats = app.header();

    let (status_text, status_color) = match live.status {
        ConnectionStatus::Connected => ("● live", Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting", Color::Yellow),
        ConnectionStatus::Disconnected => ("✗ disconnected", Color::Red),
    };

    let line = Line::from(vec![
        Span::styled(
            " ArbSense  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} markets", stats.markets_scanned),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::raw(format!("{} platforms", stats.platforms)),
        Span::raw("  │  "),
        Span::raw(format!("{} AI matches", stats.ai_matches)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} opps", stats.opportunities),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  │  "),
        Span::raw(format!("{} time-value", stats.time_value_spreads)),
        Span::raw("  │  "),
        Span::styled(
            format!("avg spread {:.2}%", stats.average_spread_pct),
            Style::default().fg(Color::Yellow),
        ),
    ]);

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_tabs(f: &mut Frame, app: &Dashboard, area: Rect) {
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(format!("{} {}", i + 1, t.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, area);
}

// ---------------------------------------------------------------------------
// Snapshot tabs
// ---------------------------------------------------------------------------

fn render_sections(f: &mut Frame, app: &mut Dashboard, area: Rect) {
    let view = app.tab_view();
    if view.sections.is_empty() {
        return;
    }
    let n = view.sections.len() as u32;
    let areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..n).map(|_| Constraint::Ratio(1, n)))
        .split(area);

    for (section, area) in view.sections.iter().zip(areas.iter()) {
        render_section(f, section, *area, None);
    }
}

fn render_section(f: &mut Frame, section: &TableSection, area: Rect, state: Option<&mut TableState>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", section.title),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    if section.rows.is_empty() {
        let empty = Paragraph::new(Span::styled(
            section.empty_message,
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(
        section
            .header
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .height(1);

    let rows: Vec<Row> = section
        .rows
        .iter()
        .map(|r| {
            let style = if r.highlight {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            Row::new(r.cells.iter().map(|c| Cell::from(truncate(c, 60)))).style(style)
        })
        .collect();

    let widths = column_widths(section.header.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    match state {
        Some(state) => f.render_stateful_widget(table, area, state),
        None => f.render_widget(table, area),
    }
}

/// First column gets the room; the rest share what is left.
fn column_widths(n: usize) -> Vec<Constraint> {
    (0..n)
        .map(|i| if i == 0 { Constraint::Percentage(30) } else { Constraint::Fill(1) })
        .collect()
}

// ---------------------------------------------------------------------------
// Fun Bets
// ---------------------------------------------------------------------------

fn render_fun_bets(f: &mut Frame, app: &mut Dashboard, area: Rect) {
    let form_height = if matches!(app.mode, InputMode::CreateBet(_)) { 6 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(form_height),
        ])
        .split(area);

    render_wallet_panel(f, app, chunks[0]);

    let view = app.tab_view();
    let mut state = TableState::default();
    state.select(Some(app.selected_bet));
    if let Some(section) = view.sections.first() {
        render_section(f, section, chunks[1], Some(&mut state));
    }

    if let InputMode::CreateBet(form) = &app.mode {
        render_bet_form(f, form, chunks[2]);
    }
}

fn render_wallet_panel(f: &mut Frame, app: &Dashboard, area: Rect) {
    let wallet = app.wallet();
    let summary = wallet_summary(&wallet.address, &wallet.balance_display, app.target.currency_symbol);
    let wallet_color = if wallet.connected { Color::Green } else { Color::DarkGray };

    let amount = match &app.mode {
        InputMode::Amount(raw) => Span::styled(
            format!("{raw}_"),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ),
        _ => Span::styled(
            format!("{} {}", app.amount, app.target.currency_symbol),
            Style::default().fg(Color::Yellow),
        ),
    };

    let tx_line = match app.last_tx() {
        Some(hash) => Line::from(vec![
            Span::raw(" Last tx: "),
            Span::styled(short_tx_hash(&hash), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(app.target.tx_url(&hash), Style::default().fg(Color::DarkGray)),
        ]),
        None => Line::from(Span::styled(" No bets sent yet", Style::default().fg(Color::DarkGray))),
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(format!(" {summary}"), Style::default().fg(wallet_color)),
            Span::raw("  │  "),
            Span::raw(app.target.chain_name),
            Span::raw("  │  amount: "),
            amount,
        ]),
        tx_line,
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " WALLET ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(paragraph, area);
}

fn render_bet_form(f: &mut Frame, form: &BetForm, area: Rect) {
    let field = |label: &str, value: &str, active: bool| {
        let style = if active {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        let cursor = if active { "_" } else { "" };
        Line::from(vec![
            Span::styled(format!(" {label:<9}"), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{value}{cursor}"), style),
        ])
    };

    let lines = vec![
        field("Title", &form.title, form.field == FormField::Title),
        field("Option A", &form.option_a, form.field == FormField::OptionA),
        field("Option B", &form.option_b, form.field == FormField::OptionB),
        Line::from(vec![
            Span::styled(" Type     ", Style::default().fg(Color::DarkGray)),
            Span::styled(form.category.to_string(), Style::default().fg(Color::Cyan)),
        ]),
    ];
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" NEW BET  [tab] field  [↑↓] type  [enter] create  [esc] cancel "),
    );
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_notice(f: &mut Frame, app: &Dashboard, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let color = match notice {
        Notice::Info(_) => Color::Green,
        Notice::Error(_) => Color::Red,
    };
    let paragraph = Paragraph::new(Span::styled(format!(" {}", notice.text()), Style::default().fg(color)));
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, app: &Dashboard, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let mut spans = vec![
        key(" [q] "),
        Span::raw("quit  "),
        key("[←→ / 1-7] "),
        Span::raw("tabs  "),
        key("[r] "),
        Span::raw("refresh  "),
        key("[c] "),
        Span::raw("connect wallet  "),
    ];
    if app.tab == Tab::FunBets {
        spans.extend([
            key("[↑↓] "),
            Span::raw("select  "),
            key("[a/b] "),
            Span::raw("bet  "),
            key("[e] "),
            Span::raw("amount  "),
            key("[n] "),
            Span::raw("new bet"),
        ]);
    }
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
