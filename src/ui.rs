use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

use crate::app::{App, Screen};
use crate::evaluator::{LetterStatus, MAX_GUESSES, WORD_LENGTH};
use crate::game::{Game, GameStatus};
use crate::progression::{is_level_unlocked, progress_summary};
use crate::store::KeyValueStore;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
const KEYBOARD_ROWS: [&str; 3] = ["QWERTYUIOP", "ASDFGHJKL", "ZXCVBNM"];

fn status_style(status: LetterStatus) -> Style {
    let bg = match status {
        LetterStatus::Correct => Color::Green,
        LetterStatus::Present => Color::Yellow,
        LetterStatus::Absent => Color::DarkGray,
    };
    Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD)
}

impl<S: KeyValueStore> Widget for &App<S> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2), // title
                Constraint::Min(1),    // body
                Constraint::Length(1), // message
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(Span::styled("RETRO WORDLE", bold_style.fg(Color::Magenta)))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let legend = match self.screen() {
            Screen::SessionSelect => {
                render_session_select(self, chunks[1], buf);
                "type a session id, (enter) select / (esc)ape"
            }
            Screen::LevelSelect => {
                render_level_select(self, chunks[1], buf);
                "(←/→) choose / (enter) play / (1-3) jump / (esc) sessions"
            }
            Screen::Playing => match self.game() {
                Some(game) => {
                    render_game(self, game, chunks[1], buf);
                    match game.status() {
                        GameStatus::Playing => "type a word, (enter) guess / (esc) levels",
                        GameStatus::Won => "(n)ext level / (r)etry / (esc) levels",
                        GameStatus::Lost => "(r)etry / (esc) levels",
                    }
                }
                None => "",
            },
            Screen::SessionComplete => {
                render_session_complete(self, chunks[1], buf);
                "(enter) levels / (r)eplay session / (esc) sessions"
            }
        };

        if let Some(message) = self.message() {
            Paragraph::new(Span::styled(message.to_string(), bold_style.fg(Color::Yellow)))
                .alignment(Alignment::Center)
                .render(chunks[2], buf);
        }

        Paragraph::new(Span::styled(legend, italic_style))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }
}

fn render_session_select<S: KeyValueStore>(app: &App<S>, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::from("ENTER SESSION ID"),
        Line::from(""),
        Line::from(vec![
            Span::styled(app.session_input().to_string(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered_rows(area, 3), buf);
}

fn render_level_select<S: KeyValueStore>(app: &App<S>, area: Rect, buf: &mut Buffer) {
    let Some(session) = app.session() else {
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            session.session_name.to_uppercase(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            progress_summary(session),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(""),
    ];

    for level in &session.levels {
        let unlocked = is_level_unlocked(level.level_number, session);
        let marker = if level.level_number == app.selected_level() { "> " } else { "  " };
        let state = if level.completed {
            match level.best_score {
                Some(best) => format!("CLEARED  best {best}/{MAX_GUESSES}"),
                None => "CLEARED".to_string(),
            }
        } else if unlocked {
            "OPEN".to_string()
        } else {
            "LOCKED".to_string()
        };
        let style = match (level.completed, unlocked) {
            (true, _) => Style::default().fg(Color::Green),
            (false, true) => Style::default().add_modifier(Modifier::BOLD),
            (false, false) => Style::default().add_modifier(Modifier::DIM),
        };
        lines.push(Line::from(Span::styled(
            format!("{marker}LEVEL {}  {state}", level.level_number),
            style,
        )));
    }

    let stats = app.stats();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(
            "played {}   win {}%   streak {}   max {}",
            stats.games_played,
            stats.win_percentage(),
            stats.current_streak,
            stats.max_streak
        ),
        Style::default().add_modifier(Modifier::ITALIC),
    )));

    let height = lines.len() as u16;
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered_rows(area, height), buf);
}

fn render_game<S: KeyValueStore>(app: &App<S>, game: &Game, area: Rect, buf: &mut Buffer) {
    let empty_style = Style::default().add_modifier(Modifier::DIM);
    let typed_style = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = Vec::with_capacity(MAX_GUESSES + 8);
    lines.push(Line::from(Span::styled(
        format!("LEVEL {}", app.current_level()),
        Style::default().fg(Color::Cyan),
    )));
    lines.push(Line::from(""));

    let evaluations = game.evaluations();
    for row in 0..MAX_GUESSES {
        let spans: Vec<Span> = if let Some(guess) = game.guesses().get(row) {
            guess
                .chars()
                .zip(evaluations[row])
                .map(|(c, status)| Span::styled(format!(" {c} "), status_style(status)))
                .collect()
        } else if row == game.current_row() && !game.is_over() {
            let typed = game.current_guess();
            (0..WORD_LENGTH)
                .map(|i| match typed.chars().nth(i) {
                    Some(c) => Span::styled(format!(" {c} "), typed_style),
                    None => Span::styled(" _ ", empty_style),
                })
                .collect()
        } else {
            (0..WORD_LENGTH).map(|_| Span::styled(" · ", empty_style)).collect()
        };
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    let hints = game.letter_hints();
    for row in KEYBOARD_ROWS {
        let spans: Vec<Span> = row
            .chars()
            .map(|c| match hints.get(&c) {
                Some(status) => Span::styled(format!(" {c} "), status_style(*status)),
                None => Span::raw(format!(" {c} ")),
            })
            .collect();
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    let result = match game.status() {
        GameStatus::Won => Some(Span::styled(
            format!("YOU WIN!  {}/{MAX_GUESSES}", game.guesses().len()),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        GameStatus::Lost => Some(Span::styled(
            format!("GAME OVER  the word was {}", game.target()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        GameStatus::Playing if app.reveal_target() => Some(Span::styled(
            format!("target: {}", game.target()),
            Style::default().add_modifier(Modifier::DIM),
        )),
        GameStatus::Playing => None,
    };
    if let Some(result) = result {
        lines.push(Line::from(result));
    }

    let height = lines.len() as u16;
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(centered_rows(area, height), buf);
}

fn render_session_complete<S: KeyValueStore>(app: &App<S>, area: Rect, buf: &mut Buffer) {
    let mut lines = vec![Line::from(Span::styled(
        "SESSION COMPLETE!",
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
    ))];
    if let Some(session) = app.session() {
        lines.push(Line::from(session.session_name.to_uppercase()));
        lines.push(Line::from(progress_summary(session)));
    }
    if let Some(game) = app.game() {
        lines.push(Line::from(""));
        lines.extend(game.share_text().lines().map(|l| Line::from(l.to_string())));
    }

    let height = lines.len() as u16;
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered_rows(area, height), buf);
}

/// Vertically centre `height` rows inside `area`.
fn centered_rows(area: Rect, height: u16) -> Rect {
    let height = height.min(area.height);
    Rect {
        y: area.y + (area.height - height) / 2,
        height,
        ..area
    }
}
