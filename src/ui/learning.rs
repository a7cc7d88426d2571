use itertools::Itertools;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use kanji_cockpit::{
    answer::strip_annotations,
    kanji::{Browser, KanjiEntry},
};

use super::{bold, dim, HORIZONTAL_MARGIN, VERTICAL_MARGIN};
use crate::App;

fn joined(list: &[String], sep: &str) -> String {
    let text = list
        .iter()
        .map(|a| strip_annotations(a))
        .filter(|a| !a.is_empty())
        .unique()
        .join(sep);
    if text.is_empty() {
        "...".to_string()
    } else {
        text
    }
}

fn details(kanji: Option<&KanjiEntry>, browser: &Browser) -> Vec<Line<'static>> {
    let field = |label: &'static str, value: String, color: Color| {
        Line::from(vec![
            Span::styled(label, dim()),
            Span::styled(value, Style::default().fg(color)),
        ])
    };

    let Some(k) = kanji else {
        return vec![
            Line::from(Span::styled("no kanji match", dim())),
            Line::from(Span::styled(format!("N° 0 / {}", browser.len()), dim())),
        ];
    };

    let mut meta = vec![format!("level {}", k.group)];
    if let Some(d) = k.difficulty {
        meta.push(format!("difficulty {d}"));
    }
    if let Some(s) = k.strokes {
        meta.push(format!("strokes {s}"));
    }
    if let Some(f) = k.frequency {
        meta.push(format!("frequency {f}"));
    }
    meta.push(format!("N° {} / {}", browser.position(), browser.len()));

    vec![
        field("meaning   ", k.meanings.join(", "), Color::LightYellow),
        field("on'yomi   ", joined(&k.on_yomi, " / "), Color::LightBlue),
        field("kun'yomi  ", joined(&k.kun_yomi, " / "), Color::LightMagenta),
        Line::default(),
        Line::from(Span::styled(meta.join(" · "), dim())),
    ]
}

pub fn render_learning(app: &App, f: &mut Frame) {
    let browser = &app.browser;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Length(3), // search
            Constraint::Min(7),    // card
            Constraint::Length(1), // legend
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("learn  ", bold().fg(Color::Cyan)),
            Span::styled("level ", dim()),
            Span::styled(browser.level().to_string(), bold()),
        ])),
        chunks[0],
    );

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(browser.query().to_string(), bold()),
            Span::styled("▏", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" search {} ", browser.mode())),
        ),
        chunks[1],
    );

    let card = Block::default().borders(Borders::ALL).border_style(dim());
    let inner = card.inner(chunks[2]);
    f.render_widget(card, chunks[2]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(12), Constraint::Min(10)])
        .split(inner);

    let current = browser.current();
    let glyph = current.map_or_else(|| "?".to_string(), |k| k.character.clone());
    f.render_widget(
        Paragraph::new(vec![
            Line::default(),
            Line::from(Span::styled(glyph, bold().fg(Color::White))),
        ])
        .alignment(Alignment::Center),
        columns[0],
    );
    f.render_widget(
        Paragraph::new(details(current, browser)).wrap(Wrap { trim: true }),
        columns[1],
    );

    f.render_widget(
        Paragraph::new(Span::styled(
            "←/→ prev/next · home/end first/last · ↑/↓ level · tab search by · esc back",
            Style::default().fg(Color::Gray),
        ))
        .alignment(Alignment::Center),
        chunks[3],
    );
}
