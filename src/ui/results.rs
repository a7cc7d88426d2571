use itertools::Itertools;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use kanji_cockpit::{
    answer::strip_annotations,
    kanji::KanjiEntry,
    mission::{EndReason, Verdict},
};

use super::{bold, dim, HORIZONTAL_MARGIN, VERTICAL_MARGIN};
use crate::App;

fn headline(verdict: Verdict, reason: Option<EndReason>) -> (&'static str, Color) {
    match (verdict, reason) {
        (_, Some(EndReason::Abandoned)) => ("MISSION ABORTED", Color::Yellow),
        (Verdict::Win, _) => ("MISSION COMPLETE", Color::Green),
        (Verdict::Loss, _) => ("MISSION FAILED", Color::Red),
        (Verdict::Ongoing, _) => ("IN PROGRESS", Color::Gray),
    }
}

fn reason_text(reason: Option<EndReason>) -> &'static str {
    match reason {
        Some(EndReason::TargetReached) => "target reached",
        Some(EndReason::PoolCleared) => "every kanji of the level cleared",
        Some(EndReason::ErrorBudgetSpent) => "error budget spent",
        Some(EndReason::EmptyPool) => "no kanji available at this level",
        Some(EndReason::Abandoned) => "mission abandoned",
        None => "",
    }
}

fn answers(list: &[String]) -> String {
    let joined = list
        .iter()
        .map(|a| strip_annotations(a))
        .filter(|a| !a.is_empty())
        .unique()
        .join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

fn missed_lines(kanji: &KanjiEntry) -> Vec<Line<'static>> {
    vec![
        Line::from(vec![
            Span::styled("last missed  ", dim()),
            Span::styled(kanji.character.clone(), bold().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::styled("meaning   ", dim()),
            Span::raw(answers(&kanji.meanings)),
        ]),
        Line::from(vec![
            Span::styled("on'yomi   ", dim()),
            Span::raw(answers(&kanji.on_yomi)),
        ]),
        Line::from(vec![
            Span::styled("kun'yomi  ", dim()),
            Span::raw(answers(&kanji.kun_yomi)),
        ]),
    ]
}

pub fn render_results(app: &App, f: &mut Frame) {
    let view = app.game.view();
    let (title, color) = headline(view.verdict, view.end_reason);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3), // headline
            Constraint::Length(6), // stats
            Constraint::Min(5),    // last missed
            Constraint::Length(1), // legend
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(title, bold().fg(color))),
            Line::from(Span::styled(reason_text(view.end_reason), dim())),
        ])
        .alignment(Alignment::Center),
        chunks[0],
    );

    let state = app.game.mission();
    let stats = vec![
        Line::from(vec![
            Span::styled("score     ", dim()),
            Span::styled(view.score.to_string(), bold()),
        ]),
        Line::from(vec![
            Span::styled("accuracy  ", dim()),
            Span::raw(format!("{:.1}%", state.accuracy())),
        ]),
        Line::from(vec![
            Span::styled("hits      ", dim()),
            Span::raw(format!("{} of {} attempts", view.successes, view.attempts)),
        ]),
        Line::from(vec![
            Span::styled("cleared   ", dim()),
            Span::raw(format!("{} / {} at {}", view.cleared, view.pool_size, view.level)),
        ]),
        Line::from(vec![
            Span::styled("settings  ", dim()),
            Span::raw(format!("{} · {}", view.mode, view.speed)),
        ]),
    ];
    f.render_widget(
        Paragraph::new(stats).block(Block::default().borders(Borders::TOP).border_style(dim())),
        chunks[1],
    );

    let missed = match app.game.last_missed() {
        Some(kanji) => missed_lines(kanji),
        None => vec![Line::from(Span::styled("no kanji reached the cockpit", dim()))],
    };
    f.render_widget(
        Paragraph::new(missed)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::TOP).border_style(dim())),
        chunks[2],
    );

    f.render_widget(
        Paragraph::new(Span::styled("(r)etry / (l)earn / (q)uit", Style::default().fg(Color::Gray)))
            .alignment(Alignment::Center),
        chunks[3],
    );
}
