use crate::tui::{
    inputs::{map_event, Action},
    views::{self, RightPane},
};
use crossterm::{
    event::{self},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use recall_core::{
    Rating, Repository, ReviewSession, SessionConfig, SessionStats, Subject, SystemClock,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{stdout, Stdout};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::warn;

pub struct TuiApp {
    pub repo: Arc<dyn Repository>,
    pub rt: Arc<Runtime>,
    config: SessionConfig,
    subjects: Vec<Subject>,
    sel: usize,
    session: Option<ReviewSession>,
    summary: Option<SessionStats>,
    status: Option<String>,
}

impl TuiApp {
    pub fn new(repo: Arc<dyn Repository>, rt: Arc<Runtime>, config: SessionConfig) -> Self {
        Self {
            repo,
            rt,
            config,
            subjects: vec![],
            sel: 0,
            session: None,
            summary: None,
            status: None,
        }
    }

    fn load_subjects(&mut self) {
        let mut v = match self.rt.block_on(self.repo.list_subjects()) {
            Ok(v) => v,
            Err(e) => {
                self.status = Some(format!("could not load subjects: {e}"));
                Vec::new()
            }
        };
        v.sort_by_key(|s| s.created_at);
        self.subjects = v;
        self.sel = self.sel.min(self.subjects.len().saturating_sub(1));
    }

    fn start_session(&mut self) {
        self.summary = None;
        self.status = None;
        let Some(subject) = self.subjects.get(self.sel) else {
            return;
        };
        let started = self.rt.block_on(ReviewSession::start(
            self.repo.clone(),
            SystemClock,
            Some(subject.id),
            self.config,
        ));
        match started {
            Ok(s) if s.is_empty() => self.summary = Some(SessionStats::default()),
            Ok(s) => self.session = Some(s),
            Err(e) => self.status = Some(format!("could not load due cards: {e}")),
        }
    }

    fn rate(&mut self, rating: Rating) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_revealed() {
            return;
        }
        match self.rt.block_on(session.rate(rating)) {
            Ok(out) => {
                self.status = (!out.persisted)
                    .then(|| "last card could not be saved; continuing".to_string());
                if let Some(stats) = out.summary {
                    self.session = None;
                    self.summary = Some(stats);
                }
            }
            Err(e) => {
                warn!(error = %e, "rating rejected");
                self.status = Some(format!("{e}; press a rating to retry"));
            }
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        self.load_subjects();

        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.mainloop(&mut terminal);

        disable_raw_mode().ok();
        let mut out: Stdout = std::io::stdout();
        execute!(out, LeaveAlternateScreen).ok();
        terminal.show_cursor().ok();

        res
    }

    fn mainloop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
        loop {
            terminal.draw(|f| {
                let right = match (&self.session, self.summary) {
                    (Some(s), _) => match s.current_card() {
                        Some(card) => RightPane::Card {
                            card,
                            reveal: s.is_revealed(),
                            position: s.position().unwrap_or(s.len()),
                            total: s.len(),
                            stats: s.stats(),
                        },
                        None => RightPane::Summary(s.stats()),
                    },
                    (None, Some(stats)) => RightPane::Summary(stats),
                    (None, None) => RightPane::Idle,
                };
                views::draw_ui(f, f.size(), &self.subjects, self.sel, right, self.status.as_deref());
            })?;

            if event::poll(std::time::Duration::from_millis(100))? {
                let in_review = self.session.is_some();
                match map_event(event::read()?) {
                    Action::Quit => break,
                    Action::Back => {
                        // Abandoning keeps whatever was already rated.
                        if let Some(s) = self.session.take() {
                            self.summary = Some(s.stats());
                        }
                    }
                    Action::Up => {
                        if !in_review {
                            self.sel = self.sel.saturating_sub(1);
                        }
                    }
                    Action::Down => {
                        if !in_review && self.sel + 1 < self.subjects.len() {
                            self.sel += 1;
                        }
                    }
                    Action::Enter => {
                        if !in_review {
                            self.start_session();
                        }
                    }
                    Action::Reveal => {
                        if let Some(s) = self.session.as_mut() {
                            s.reveal().ok();
                        }
                    }
                    Action::Rate(r) => self.rate(r),
                    Action::None => {}
                }
            }
        }
        Ok(())
    }
}
