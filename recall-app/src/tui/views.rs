use crate::tui::theme::*;
use recall_core::{Card, SessionStats, Subject};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

pub enum RightPane<'a> {
    Idle,
    Card {
        card: &'a Card,
        reveal: bool,
        position: usize,
        total: usize,
        stats: SessionStats,
    },
    Summary(SessionStats),
}

pub fn draw_ui(
    f: &mut Frame,
    area: Rect,
    subjects: &[Subject],
    sel: usize,
    right: RightPane,
    status: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);
    draw_subjects(f, chunks[0], subjects, sel);
    draw_right(f, chunks[1], right);

    let foot = match status {
        Some(msg) => Paragraph::new(Line::from(Span::raw(msg.to_string()).style(warn_style()))),
        None => Paragraph::new(Line::from(vec![
            Span::raw(" ↑/k ↓/j select  "),
            Span::raw(" Enter start  "),
            Span::raw(" space reveal  "),
            Span::raw(" 1-4 rate  "),
            Span::raw(" Esc back  "),
            Span::raw(" q quit "),
        ]))
        .style(footer_style()),
    };
    let fh = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(1),
        width: area.width,
        height: 1,
    };
    f.render_widget(foot, fh);
}

fn draw_subjects(f: &mut Frame, area: Rect, subjects: &[Subject], sel: usize) {
    let items: Vec<_> = subjects
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let line = if i == sel {
                Line::from(s.name.clone()).style(selected_style())
            } else {
                Line::from(s.name.clone())
            };
            ListItem::new(line)
        })
        .collect();

    let title = Paragraph::new(Line::from(vec![Span::raw("Subjects").style(title_style())]));
    let th = Rect { x: area.x, y: area.y, width: area.width, height: 1 };
    f.render_widget(title, th);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(2),
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL));
    f.render_widget(list, list_area);
}

fn draw_right(f: &mut Frame, area: Rect, pane: RightPane) {
    let block = Block::default().title("Review").borders(Borders::ALL);
    match pane {
        RightPane::Idle => {
            let p = Paragraph::new("Press Enter to review the cards due in the selected subject.")
                .wrap(Wrap { trim: true })
                .block(block);
            f.render_widget(p, area);
        }
        RightPane::Summary(stats) => {
            let text = if stats.reviewed == 0 {
                vec![Line::from("Nothing due. Come back later.")]
            } else {
                vec![
                    Line::from(Span::raw("Session complete").style(title_style())),
                    Line::from(""),
                    Line::from(format!("Reviewed: {}", stats.reviewed)),
                    Line::from(format!("Correct:  {}", stats.correct)),
                    Line::from(format!("Accuracy: {:.0}%", stats.accuracy() * 100.0)),
                ]
            };
            let p = Paragraph::new(text).wrap(Wrap { trim: true }).block(block);
            f.render_widget(p, area);
        }
        RightPane::Card { card, reveal, position, total, stats } => {
            f.render_widget(block, area);
            let inner = Rect {
                x: area.x + 1,
                y: area.y + 1,
                width: area.width.saturating_sub(2),
                height: area.height.saturating_sub(3),
            };

            let mut text = vec![
                Line::from(
                    Span::raw(format!(
                        "{position}/{total}  reviewed {}  correct {}",
                        stats.reviewed, stats.correct
                    ))
                    .style(progress_style()),
                ),
                Line::from(""),
                Line::from(vec![Span::raw("Q: ").style(title_style()), Span::raw(&card.front)]),
                Line::from(""),
            ];
            if reveal {
                text.push(Line::from(vec![
                    Span::raw("A: ").style(title_style()),
                    Span::raw(&card.back),
                ]));
                text.push(Line::from(""));
                text.push(Line::from(
                    Span::raw("1 again   2 hard   3 good   4 easy").style(progress_style()),
                ));
            } else {
                text.push(Line::from(Span::raw("space to reveal").style(progress_style())));
            }
            f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
        }
    }
}
