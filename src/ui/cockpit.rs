use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use unicode_width::UnicodeWidthStr;

use kanji_cockpit::{
    game::FrameView,
    round::{PhaseTag, RoundView},
    trajectory::Point,
};

use super::{bold, centered, dim, HORIZONTAL_MARGIN, PALETTE, VERTICAL_MARGIN};
use crate::App;

pub fn render_cockpit(app: &App, f: &mut Frame) {
    let view = app.game.view();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // hud
            Constraint::Min(6),    // viewport
            Constraint::Length(3), // input
        ])
        .split(f.area());

    f.render_widget(Paragraph::new(hud_line(&view)), chunks[0]);

    let viewport = Block::default()
        .borders(Borders::ALL)
        .title(" cockpit ")
        .border_style(dim());
    let inner = viewport.inner(chunks[1]);
    f.render_widget(viewport, chunks[1]);

    let buf = f.buffer_mut();
    draw_cockpit_line(buf, inner, app.explosion.flash > 0.0);
    match &view.round {
        Some(round) => draw_kanji(buf, inner, round),
        None if !view.paused => {
            buf.set_string(
                inner.x + inner.width.saturating_sub(8) / 2,
                inner.y + inner.height / 2,
                "stand by",
                dim(),
            );
        }
        None => {}
    }
    for p in &app.explosion.particles {
        if let Some((x, y)) = to_cell(inner, Point::new(p.x, p.y)) {
            let mut style = Style::default().fg(PALETTE[p.color_index % PALETTE.len()]);
            if p.life() < 0.3 {
                style = style.add_modifier(Modifier::DIM);
            }
            buf.set_string(x, y, p.symbol.to_string(), style);
        }
    }

    f.render_widget(input_widget(app, &view), chunks[2]);

    if view.paused {
        render_pause_overlay(f, chunks[1]);
    }
}

fn hud_line(view: &FrameView) -> Line<'static> {
    let hits = match view.target {
        Some(target) => format!("{}/{}", view.successes, target),
        None => format!("{}/{}", view.cleared, view.pool_size),
    };
    let errors = match view.error_budget {
        Some(budget) => format!("{}/{}", view.failures, budget),
        None => format!("{}/∞", view.failures),
    };
    let seconds = view
        .round
        .as_ref()
        .filter(|r| r.phase == PhaseTag::Falling)
        .map(|r| format!("{}s", r.seconds_remaining))
        .unwrap_or_else(|| "-".to_string());

    let low_time = view
        .round
        .as_ref()
        .is_some_and(|r| r.phase == PhaseTag::Falling && r.seconds_remaining <= 1);

    Line::from(vec![
        Span::styled("score ", dim()),
        Span::styled(view.score.to_string(), bold()),
        Span::styled("  hits ", dim()),
        Span::styled(hits, bold().fg(Color::Green)),
        Span::styled("  errors ", dim()),
        Span::styled(errors, bold().fg(Color::Red)),
        Span::styled(format!("  {} · {}  ", view.level, view.speed), dim()),
        Span::styled(
            seconds,
            if low_time {
                bold().fg(Color::Red)
            } else {
                bold()
            },
        ),
    ])
}

/// Map a normalised point to a buffer cell, leaving room for a wide glyph
fn to_cell(inner: Rect, p: Point) -> Option<(u16, u16)> {
    if inner.width < 2 || inner.height == 0 || !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
        return None;
    }
    let x = inner.x + (p.x * f64::from(inner.width - 2)).round() as u16;
    let y = inner.y + (p.y * f64::from(inner.height - 1)).round() as u16;
    Some((x, y))
}

fn draw_cockpit_line(buf: &mut Buffer, inner: Rect, hit: bool) {
    if inner.height == 0 {
        return;
    }
    let style = if hit {
        bold().fg(Color::Red).add_modifier(Modifier::REVERSED)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let y = inner.y + inner.height - 1;
    buf.set_string(inner.x, y, "═".repeat(inner.width as usize), style);
}

fn draw_kanji(buf: &mut Buffer, inner: Rect, round: &RoundView) {
    let style = match round.phase {
        PhaseTag::Falling => bold().fg(Color::White),
        // dissolves halfway through the explosion
        PhaseTag::Exploding if round.resolution > 0.5 => return,
        PhaseTag::Exploding => bold().fg(Color::Yellow),
        PhaseTag::Missed => bold().fg(Color::Red).add_modifier(Modifier::REVERSED),
        PhaseTag::Idle => return,
    };
    if let Some((x, y)) = to_cell(inner, round.position) {
        let x = x.min(inner.right().saturating_sub(round.character.width() as u16));
        buf.set_string(x, y, &round.character, style);
    }
}

fn input_widget<'a>(app: &'a App, view: &FrameView) -> Paragraph<'a> {
    let mut spans = vec![
        Span::styled(app.input.as_str(), bold()),
        Span::styled("▏", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ];
    if let Some(wrong) = &app.feedback {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(format!("✗ {wrong}"), Style::default().fg(Color::Red)));
    }

    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", view.mode.prompt())),
    )
}

fn render_pause_overlay(f: &mut Frame, area: Rect) {
    let rect = centered(area, 50, 4);
    f.render_widget(Clear, rect);
    let text = vec![
        Line::from(Span::styled("PAUSED", bold().fg(Color::Yellow))),
        Line::from(Span::styled("tab resume · l learn · m end mission · q quit", dim())),
    ];
    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        rect,
    );
}
