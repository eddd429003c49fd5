use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use recall_core::Rating;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Back,
    Up,
    Down,
    Enter,
    Reveal,
    Rate(Rating),
    None,
}

pub fn map_event(ev: Event) -> Action {
    if let Event::Key(KeyEvent { code, kind, .. }) = ev {
        if kind == KeyEventKind::Release {
            return Action::None;
        }
        match code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Esc => Action::Back,
            KeyCode::Up | KeyCode::Char('k') => Action::Up,
            KeyCode::Down | KeyCode::Char('j') => Action::Down,
            KeyCode::Enter => Action::Enter,
            KeyCode::Char(' ') => Action::Reveal,
            KeyCode::Char('1') | KeyCode::Char('a') => Action::Rate(Rating::Again),
            KeyCode::Char('2') | KeyCode::Char('h') => Action::Rate(Rating::Hard),
            KeyCode::Char('3') | KeyCode::Char('g') => Action::Rate(Rating::Good),
            KeyCode::Char('4') | KeyCode::Char('e') => Action::Rate(Rating::Easy),
            _ => Action::None,
        }
    } else {
        Action::None
    }
}
