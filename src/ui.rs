use crate::player::PlayerControl;
use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use netradio::{RadioEngine, StationRecord, StreamState};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph},
    Terminal,
};
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Clone, Copy, PartialEq, Eq)]
enum View {
    MyStations,
    Catalog,
}

pub struct UIState {
    view: View,
    list: ListState,
    last_volume_change: Instant,
    saved_volume: Option<f32>,
    notice: Option<(String, Instant)>,
}

impl UIState {
    fn new(view: View) -> Self {
        let mut list = ListState::default();
        list.select(Some(0));
        Self {
            view,
            list,
            last_volume_change: Instant::now(),
            saved_volume: None,
            notice: None,
        }
    }

    fn notify(&mut self, msg: impl Into<String>) {
        self.notice = Some((msg.into(), Instant::now()));
    }

    fn selected(&self) -> usize {
        self.list.selected().unwrap_or(0)
    }

    fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.list.select(Some(0));
            return;
        }
        let next = (self.selected() as isize + delta).rem_euclid(len as isize);
        self.list.select(Some(next as usize));
    }
}

/// Rows of the current view: (label, station)
fn entries(engine: &RadioEngine, view: View) -> Vec<(String, StationRecord)> {
    match view {
        View::MyStations => engine
            .stations()
            .stations()
            .iter()
            .map(|s| (s.name.clone(), s.clone()))
            .collect(),
        View::Catalog => {
            let catalog = engine.catalog();
            catalog
                .countries()
                .iter()
                .flat_map(|c| {
                    catalog
                        .stations_for(&c.code)
                        .map(move |s| (format!("[{}] {}", c.code, s.name), StationRecord::from(s)))
                })
                .collect()
        }
    }
}

fn state_style(state: StreamState) -> Style {
    match state {
        StreamState::Playing => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        StreamState::Connecting | StreamState::Buffering => Style::default().fg(Color::Yellow),
        StreamState::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        StreamState::Stopped => Style::default().fg(Color::Gray),
    }
}

fn key_help(key: &'static str, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            key,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(what),
    ])
}

pub async fn run_ui(engine: &mut RadioEngine, control: Arc<PlayerControl>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let start_view = if engine.stations().is_empty() {
        View::Catalog
    } else {
        View::MyStations
    };
    let mut ui_state = UIState::new(start_view);

    loop {
        engine.update();
        let np = engine.metadata();
        let state = engine.state();
        let rows = entries(engine, ui_state.view);
        let playing_url = engine.current_url().map(str::to_string);

        terminal.draw(|f| {
            let size = f.size();

            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
                .split(size);

            let items: Vec<ListItem> = rows
                .iter()
                .map(|(label, station)| {
                    let style = if playing_url.as_deref() == Some(station.url.as_str()) {
                        Style::default().fg(Color::Green)
                    } else {
                        Style::default()
                    };
                    ListItem::new(Span::styled(label.clone(), style))
                })
                .collect();
            let title = match ui_state.view {
                View::MyStations => format!(" My Stations ({}) ", rows.len()),
                View::Catalog => format!(
                    " Catalog ({} countries) ",
                    engine.catalog().countries().len()
                ),
            };
            let left = List::new(items)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .title(title)
                        .border_style(Style::default().fg(Color::Magenta)),
                )
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
                .highlight_symbol("▶ ");
            f.render_stateful_widget(left, chunks[0], &mut ui_state.list);

            let paused = control.is_paused();
            let current_volume = control.volume();
            let volume_bar = generate_pretty_volume_bar(current_volume);
            let volume_recently_changed =
                ui_state.last_volume_change.elapsed() < Duration::from_secs(2);

            let mut lines = vec![];

            let mut status = vec![
                Span::raw("Status: "),
                Span::styled(state.to_string(), state_style(state)),
            ];
            if paused && state.is_active() {
                status.push(Span::styled(" (paused)", Style::default().fg(Color::Yellow)));
            }
            lines.push(Line::from(status));
            if state == StreamState::Error {
                lines.push(Line::from(Span::styled(
                    engine.error(),
                    Style::default().fg(Color::Red),
                )));
            }
            lines.push(Line::from(""));

            let field = |label: &'static str, value: &str, color: Color| {
                Line::from(vec![
                    Span::styled(label, Style::default().fg(color)),
                    Span::styled(
                        if value.is_empty() { "-" } else { value }.to_string(),
                        Style::default()
                            .fg(Color::White)
                            .add_modifier(Modifier::BOLD),
                    ),
                ])
            };
            lines.push(field("Station: ", &np.station_name, Color::Cyan));
            lines.push(field("Title:   ", &np.title, Color::Cyan));
            lines.push(field("Artist:  ", &np.artist, Color::Cyan));
            let format = match (np.content_type.is_empty(), np.bitrate) {
                (true, 0) => String::new(),
                (_, 0) => np.content_type.clone(),
                _ => format!("{} {} kbps", np.content_type, np.bitrate),
            };
            lines.push(field("Format:  ", format.trim(), Color::Cyan));
            lines.push(Line::from(""));

            lines.push(Line::from(vec![
                Span::styled("Buffer: ", Style::default().fg(Color::Magenta)),
                Span::raw(generate_buffer_bar(engine.buffer_level())),
            ]));
            lines.push(Line::from(vec![
                if volume_recently_changed {
                    Span::styled("🔊 ", Style::default().fg(Color::Yellow))
                } else {
                    Span::raw("")
                },
                Span::styled("Volume: ", Style::default().fg(Color::Magenta)),
                Span::styled(
                    format!("{:.0}%", current_volume * 100.0),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::from(volume_bar));
            lines.push(Line::from(""));

            if let Some((msg, at)) = &ui_state.notice {
                if at.elapsed() < Duration::from_secs(3) {
                    lines.push(Line::from(Span::styled(
                        msg.clone(),
                        Style::default().fg(Color::Yellow),
                    )));
                    lines.push(Line::from(""));
                }
            }

            lines.push(Line::from(Span::styled(
                "─── Controls ───",
                Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
            )));
            lines.push(key_help("  Enter", " : play selected"));
            lines.push(key_help("    Tab", " : my stations / catalog"));
            lines.push(key_help("    a/d", " : add to / delete from my stations"));
            lines.push(key_help("      s", " : stop"));
            lines.push(key_help("  Space", " : pause/resume"));
            lines.push(key_help("    +/-", " : volume up/down"));
            lines.push(key_help("      m", " : mute/unmute"));
            lines.push(Line::from(vec![
                Span::styled(
                    "      q",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" : quit"),
            ]));

            let right = Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .title(" ☆ Now Playing ☆ ")
                    .title_alignment(Alignment::Center)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            f.render_widget(right, chunks[1]);
        })?;

        if crossterm::event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') => {
                        engine.stop();
                        break;
                    }
                    KeyCode::Up => ui_state.move_selection(-1, rows.len()),
                    KeyCode::Down => ui_state.move_selection(1, rows.len()),
                    KeyCode::Tab => {
                        ui_state.view = match ui_state.view {
                            View::MyStations => View::Catalog,
                            View::Catalog => View::MyStations,
                        };
                        ui_state.list.select(Some(0));
                    }
                    KeyCode::Enter => {
                        if let Some((_, station)) = rows.get(ui_state.selected()) {
                            if let Err(e) = engine.play(&station.url) {
                                warn!(url = %station.url, error = %e, "play failed");
                            }
                        }
                    }
                    KeyCode::Char('s') => engine.stop(),
                    KeyCode::Char('a') => {
                        if let Some((_, station)) = rows.get(ui_state.selected()) {
                            if engine.stations().contains_url(&station.url) {
                                ui_state.notify("Already in my stations");
                            } else {
                                match engine.stations_mut().add(station.clone()) {
                                    Ok(()) => ui_state.notify(format!("Added {}", station.name)),
                                    Err(e) => ui_state.notify(e.to_string()),
                                }
                            }
                        }
                    }
                    KeyCode::Char('d') if ui_state.view == View::MyStations => {
                        if let Some(removed) = engine.stations_mut().remove(ui_state.selected()) {
                            ui_state.notify(format!("Removed {}", removed.name));
                            let last = engine.stations().len().saturating_sub(1);
                            ui_state.list.select(Some(ui_state.selected().min(last)));
                        }
                    }
                    KeyCode::Char(' ') => {
                        if control.is_paused() {
                            control.play();
                        } else {
                            control.pause();
                        }
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        let new_vol = (control.volume() + 0.1).min(2.0);
                        control.set_volume(new_vol);
                        ui_state.last_volume_change = Instant::now();
                    }
                    KeyCode::Char('-') => {
                        let new_vol = (control.volume() - 0.1).max(0.0);
                        control.set_volume(new_vol);
                        ui_state.last_volume_change = Instant::now();
                    }
                    KeyCode::Char('m') => {
                        let current_volume = control.volume();
                        if current_volume > 0.0 {
                            ui_state.saved_volume = Some(current_volume);
                            control.set_volume(0.0);
                        } else {
                            let restore_volume = ui_state.saved_volume.unwrap_or(0.5);
                            control.set_volume(restore_volume);
                        }
                        ui_state.last_volume_change = Instant::now();
                    }
                    _ => {}
                }
            }
        }
    }

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn generate_buffer_bar(level: f32) -> String {
    let bar_length = 20;
    let filled = ((level.clamp(0.0, 1.0) * bar_length as f32).round() as usize).min(bar_length);
    format!(
        "│{}{}│ {:>3.0}%",
        "█".repeat(filled),
        "·".repeat(bar_length - filled),
        level * 100.0
    )
}

fn generate_pretty_volume_bar(volume: f32) -> String {
    let vol_percent = (volume * 100.0) as usize;
    let bar_length = 20;
    let filled = (vol_percent * bar_length / 100).min(bar_length);

    let mut bar = String::new();
    bar.push('│');

    for i in 0..bar_length {
        if i < filled {
            if volume == 0.0 {
                bar.push('✗');
            } else if i < bar_length * 60 / 100 {
                bar.push('▓');
            } else if i < bar_length * 80 / 100 {
                bar.push('▒');
            } else {
                bar.push('░');
            }
        } else {
            bar.push('·');
        }
    }

    bar.push('│');

    if volume == 0.0 {
        bar.push_str(" 🔇");
    } else if vol_percent < 30 {
        bar.push_str(" 🔈");
    } else if vol_percent < 70 {
        bar.push_str(" 🔉");
    } else {
        bar.push_str(" 🔊");
    }

    bar
}
