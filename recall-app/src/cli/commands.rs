use crate::api::server as api_server;
use crate::cli::opts::*;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Local, Utc};
use recall_core::{
    filter_by_text, sort_by_due, Calendar, Card, CoreError, PersistencePolicy, Rating,
    RateOutcome, Repository, ReviewSession, SessionConfig, SessionStats, Subject, SubjectId,
    SystemClock,
};
use recall_json::paths::data_root;
use recall_json::JsonStore;
use recall_sqlite::SqliteRepo;
use std::collections::HashMap;
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn run_cli(args: Cli) -> Result<()> {
    let repo = open_repo(args.store, args.db_path.clone()).await?;
    match args.cmd {
        Command::Subject(cmd) => subject_cmd(repo, cmd).await,
        Command::Card(cmd) => card_cmd(repo, cmd).await,
        Command::Due(cmd) => due_cmd(repo, cmd).await,
        Command::Review(cmd) => review_cmd(repo, cmd, args.calendar).await,
        Command::Export(cmd) => export_cmd(repo, cmd).await,
        Command::Import(cmd) => import_cmd(repo, cmd).await,
        Command::Api(api) => {
            let addr: std::net::SocketAddr = api.addr.parse()?;
            api_server::run(repo, addr, args.calendar.into()).await
        }
        Command::Tui(_) => bail!("the TUI is started from main on its own runtime"),
    }
}

pub async fn open_repo(store: StoreKind, db_path: Option<PathBuf>) -> Result<Arc<dyn Repository>> {
    match store {
        StoreKind::Json => {
            let s = JsonStore::open_default().await?;
            info!(path = %s.path().display(), "using json store");
            Ok(Arc::new(s))
        }
        StoreKind::Sqlite => {
            let p = db_path.unwrap_or_else(|| data_root().join("recall.sqlite3"));
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let s = SqliteRepo::open_file(&p).await?;
            info!(path = %p.display(), "using sqlite store");
            Ok(Arc::new(s))
        }
    }
}

pub fn session_config(
    calendar: impl Into<Calendar>,
    strict: bool,
    max: Option<usize>,
) -> SessionConfig {
    SessionConfig {
        persistence: if strict {
            PersistencePolicy::Strict
        } else {
            PersistencePolicy::BestEffort
        },
        calendar: calendar.into(),
        max_cards: max,
    }
}

async fn subject_cmd(repo: Arc<dyn Repository>, cmd: SubjectCmd) -> Result<()> {
    match cmd {
        SubjectCmd::Add { name } => {
            let s = repo.create_subject(&name).await?;
            println!("{}", s.id);
        }
        SubjectCmd::List => {
            let mut v = repo.list_subjects().await?;
            v.sort_by_key(|s| s.created_at);
            for s in v {
                println!("{}\t{}", s.id, s.name);
            }
        }
        SubjectCmd::Rm { subject } => {
            let s = resolve_subject(&*repo, &subject).await?;
            repo.delete_subject(s.id).await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn card_cmd(repo: Arc<dyn Repository>, cmd: CardCmd) -> Result<()> {
    match cmd {
        CardCmd::Add(a) => {
            let subject = resolve_subject(&*repo, &a.subject).await?;
            let c = repo.add_card(subject.id, &a.front, &a.back).await?;
            println!("{}", c.id);
        }
        CardCmd::List { subject, query } => {
            let subject_id = optional_subject(&*repo, subject).await?;
            let mut cards = repo.list_cards(subject_id).await?;
            if let Some(q) = query {
                cards = filter_by_text(&cards, &q);
            }
            cards.sort_by_key(|c| c.created_at);
            for c in cards {
                println!(
                    "{}\t{}\t{}\tsubject={}\tinterval={}\tease={:.2}\tdue={}",
                    c.id,
                    c.front,
                    c.back,
                    c.subject_id,
                    c.interval,
                    c.ease_factor,
                    local_time(c.next_review_at)
                );
            }
        }
        CardCmd::Rm { card_id } => {
            let id = parse_uuid(&card_id)?;
            repo.delete_card(id).await?;
            println!("ok");
        }
        CardCmd::Edit(e) => {
            let id = parse_uuid(&e.card_id)?;
            if e.front.is_none() && e.back.is_none() {
                bail!("nothing to edit: pass --front and/or --back");
            }
            let card = repo.get_card(id).await?;
            let front = e.front.unwrap_or(card.front);
            let back = e.back.unwrap_or(card.back);
            repo.update_card_content(id, &front, &back).await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn due_cmd(repo: Arc<dyn Repository>, cmd: DueCmd) -> Result<()> {
    let subject_id = optional_subject(&*repo, cmd.subject).await?;
    let mut due = repo.fetch_due_cards(subject_id, Utc::now()).await?;
    if let Some(max) = cmd.max {
        due.truncate(max);
    }
    if due.is_empty() {
        println!("no cards due");
        return Ok(());
    }
    for c in due {
        println!(
            "{}\t{}\tinterval={}\tease={:.2}\tdue={}",
            c.id,
            c.front,
            c.interval,
            c.ease_factor,
            local_time(c.next_review_at)
        );
    }
    Ok(())
}

async fn review_cmd(repo: Arc<dyn Repository>, cmd: ReviewCmd, calendar: CalendarKind) -> Result<()> {
    let subject_id = optional_subject(&*repo, cmd.subject).await?;
    let config = session_config(calendar, cmd.strict, Some(cmd.max));
    let mut session = ReviewSession::start(repo, SystemClock, subject_id, config).await?;
    if session.is_empty() {
        println!("no cards due");
        return Ok(());
    }

    let total = session.len();
    while let Some(card) = session.current_card() {
        let (id, front, back) = (card.id, card.front.clone(), card.back.clone());
        let pos = session.position().unwrap_or(total);
        println!("\n[{pos}/{total}] {id}");
        println!("Q: {front}");
        if !session.is_revealed() {
            prompt_enter("[enter=show]")?;
            session.reveal()?;
        }
        println!("A: {back}");
        println!("[1=again, 2=hard, 3=good, 4=easy, q=quit]");
        let rating = loop {
            let line = read_line("rating> ")?;
            match line.trim().to_lowercase().as_str() {
                "q" | "quit" => {
                    print_summary(session.stats(), false);
                    return Ok(());
                }
                other => match other.parse::<Rating>() {
                    Ok(r) => break r,
                    Err(e) => println!("{e}"),
                },
            }
        };

        match session.rate(rating).await {
            Ok(out) => {
                report_rating(&out);
                if let Some(stats) = out.summary {
                    print_summary(stats, true);
                }
            }
            Err(e @ CoreError::Persistence { .. }) => {
                println!("not saved: {e}");
                println!("rate again to retry, or q to stop");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn report_rating(out: &RateOutcome) {
    if out.schedule.interval == 0 {
        println!("→ again in 1 minute");
    } else {
        println!("→ next due in {} day(s)", out.schedule.interval);
    }
    if !out.persisted {
        println!("(warning: schedule for this card could not be saved)");
    }
}

fn print_summary(stats: SessionStats, finished: bool) {
    let head = if finished { "session complete" } else { "session stopped" };
    println!(
        "\n{head}: reviewed {}, correct {} ({:.0}%)",
        stats.reviewed,
        stats.correct,
        stats.accuracy() * 100.0
    );
}

async fn export_cmd(repo: Arc<dyn Repository>, cmd: ExportCmd) -> Result<()> {
    match cmd {
        ExportCmd::Json { path } => {
            let mut subjects = repo.list_subjects().await?;
            subjects.sort_by_key(|s| s.created_at);
            let mut cards = repo.list_cards(None).await?;
            sort_by_due(&mut cards);
            let bundle = ExportBundle { version: 1, subjects, cards };
            let s = serde_json::to_string_pretty(&bundle)?;
            std::fs::write(&path, s)?;
            println!("wrote {}", path.display());
        }
        ExportCmd::Csv { path, subject } => {
            let subject_id = optional_subject(&*repo, subject).await?;
            let mut cards = repo.list_cards(subject_id).await?;
            sort_by_due(&mut cards);
            let names: HashMap<SubjectId, String> = repo
                .list_subjects()
                .await?
                .into_iter()
                .map(|s| (s.id, s.name))
                .collect();

            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(CSV_HEADER)?;
            for c in cards {
                let name = names
                    .get(&c.subject_id)
                    .cloned()
                    .unwrap_or_else(|| c.subject_id.to_string());
                wtr.write_record(card_to_record(&name, &c))?;
            }
            wtr.flush()?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

async fn import_cmd(repo: Arc<dyn Repository>, cmd: ImportCmd) -> Result<()> {
    let mut imported = 0usize;
    let mut skipped = 0usize;
    match cmd {
        ImportCmd::Json { path } => {
            let data = std::fs::read_to_string(&path)?;
            let bundle: ExportBundle = serde_json::from_str(&data)?;
            let mut subject_map = HashMap::new();
            for s in &bundle.subjects {
                let local = ensure_subject_by_name(&*repo, &s.name).await?;
                subject_map.insert(s.id, local.id);
            }
            for mut c in bundle.cards {
                let Some(sid) = subject_map.get(&c.subject_id) else {
                    warn!(card = %c.id, "card references unknown subject; skipped");
                    skipped += 1;
                    continue;
                };
                c.subject_id = *sid;
                if !c.has_usable_ease() {
                    warn!(card = %c.id, ease_factor = c.ease_factor, "unusable ease; imported as new");
                    c.reset_schedule(Utc::now());
                }
                match repo.import_card(&c).await {
                    Ok(()) => imported += 1,
                    Err(CoreError::Conflict(_)) => skipped += 1,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        ImportCmd::Csv { path, subject } => {
            let mut rdr = csv::Reader::from_path(&path)?;
            let target = match subject {
                Some(sel) => Some(resolve_subject(&*repo, &sel).await?),
                None => None,
            };
            for rec in rdr.records() {
                let rec = rec?;
                let subject = match &target {
                    Some(s) => s.clone(),
                    None => ensure_subject_by_name(&*repo, rec.get(0).unwrap_or("").trim()).await?,
                };
                let card = card_from_record(&rec, subject.id)?;
                repo.import_card(&card).await?;
                imported += 1;
            }
        }
    }
    println!("imported {imported}, skipped {skipped}");
    Ok(())
}

// ===== CSV =====
const CSV_HEADER: [&str; 6] = ["subject", "front", "back", "interval", "ease_factor", "next_review_at"];

fn card_to_record(subject: &str, c: &Card) -> [String; 6] {
    [
        subject.to_string(),
        c.front.clone(),
        c.back.clone(),
        c.interval.to_string(),
        c.ease_factor.to_string(),
        c.next_review_at.to_rfc3339(),
    ]
}

/// Schedule columns are optional; missing or unusable ones leave the card new.
fn card_from_record(rec: &csv::StringRecord, subject_id: SubjectId) -> Result<Card> {
    let front = rec.get(1).unwrap_or("").trim();
    let back = rec.get(2).unwrap_or("").trim();
    if front.is_empty() {
        bail!("csv row without a front: {:?}", rec);
    }
    let now = Utc::now();
    let mut card = Card::new_at(subject_id, front, back, now);
    let interval = rec.get(3).and_then(|s| s.trim().parse::<u32>().ok());
    let ease = rec.get(4).and_then(|s| s.trim().parse::<f64>().ok());
    let due = rec
        .get(5)
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|d| d.with_timezone(&Utc));
    if let (Some(interval), Some(ease), Some(due)) = (interval, ease, due) {
        card.interval = interval;
        card.ease_factor = ease;
        card.next_review_at = due;
        if !card.has_usable_ease() {
            card.reset_schedule(now);
        }
    }
    Ok(card)
}

// ===== Helpers =====
fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| anyhow!("invalid uuid"))
}

fn local_time(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub async fn resolve_subject<R: Repository + ?Sized>(repo: &R, sel: &str) -> Result<Subject> {
    if let Ok(id) = Uuid::parse_str(sel) {
        if let Ok(s) = repo.get_subject(id).await {
            return Ok(s);
        }
    }
    let subjects = repo.list_subjects().await?;
    if let Some(s) = subjects.into_iter().find(|s| s.name.eq_ignore_ascii_case(sel)) {
        return Ok(s);
    }
    bail!("subject not found: {}", sel)
}

async fn optional_subject<R: Repository + ?Sized>(
    repo: &R,
    sel: Option<String>,
) -> Result<Option<SubjectId>> {
    match sel {
        Some(sel) => Ok(Some(resolve_subject(repo, &sel).await?.id)),
        None => Ok(None),
    }
}

async fn ensure_subject_by_name<R: Repository + ?Sized>(repo: &R, name: &str) -> Result<Subject> {
    if name.is_empty() {
        bail!("missing subject name");
    }
    let subjects = repo.list_subjects().await?;
    if let Some(s) = subjects.into_iter().find(|s| s.name.eq_ignore_ascii_case(name)) {
        return Ok(s);
    }
    Ok(repo.create_subject(name).await?)
}

fn prompt_enter(label: &str) -> Result<()> {
    print!("{label}");
    stdout().flush().ok();
    let mut s = String::new();
    stdin().read_line(&mut s)?;
    Ok(())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    stdout().flush().ok();
    let mut s = String::new();
    if stdin().read_line(&mut s)? == 0 {
        bail!("input closed");
    }
    Ok(s)
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ExportBundle {
    version: u32,
    subjects: Vec<Subject>,
    cards: Vec<Card>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recall_core::MemoryRepo;

    #[test]
    fn csv_record_keeps_schedule() {
        let sid = Uuid::new_v4();
        let mut c = Card::new(sid, "ciao", "hello");
        c.interval = 6;
        c.ease_factor = 2.35;
        c.next_review_at = Utc.with_ymd_and_hms(2025, 4, 2, 9, 0, 0).unwrap();

        let rec = csv::StringRecord::from(card_to_record("Italian", &c).to_vec());
        let back = card_from_record(&rec, sid).unwrap();
        assert_eq!(back.front, "ciao");
        assert_eq!(back.interval, 6);
        assert_eq!(back.ease_factor, 2.35);
        assert_eq!(back.next_review_at, c.next_review_at);
    }

    #[test]
    fn csv_record_without_valid_schedule_is_new() {
        let sid = Uuid::new_v4();
        let rec = csv::StringRecord::from(vec!["Italian", "grazie", "thanks", "3", "0.9", ""]);
        let card = card_from_record(&rec, sid).unwrap();
        assert_eq!(card.interval, 0);
        assert_eq!(card.ease_factor, recall_core::EASE_DEFAULT);

        let empty = csv::StringRecord::from(vec!["Italian", "", "x"]);
        assert!(card_from_record(&empty, sid).is_err());
    }

    #[test]
    fn session_config_maps_flags() {
        let c = session_config(CalendarKind::Utc, true, Some(3));
        assert_eq!(c.persistence, PersistencePolicy::Strict);
        assert_eq!(c.calendar, recall_core::Calendar::Utc);
        assert_eq!(c.max_cards, Some(3));
        assert_eq!(
            session_config(CalendarKind::Local, false, None).persistence,
            PersistencePolicy::BestEffort
        );
    }

    #[tokio::test]
    async fn json_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");

        let src: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        let s = src.create_subject("Latin").await.unwrap();
        src.add_card(s.id, "amo", "I love").await.unwrap();
        export_cmd(src.clone(), ExportCmd::Json { path: path.clone() }).await.unwrap();

        let dst: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        dst.create_subject("latin").await.unwrap();
        import_cmd(dst.clone(), ImportCmd::Json { path: path.clone() }).await.unwrap();
        // second import hits the same card ids and is skipped
        import_cmd(dst.clone(), ImportCmd::Json { path }).await.unwrap();

        assert_eq!(dst.list_subjects().await.unwrap().len(), 1);
        let cards = dst.list_cards(None).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].back, "I love");
    }

    #[tokio::test]
    async fn json_import_resets_cards_with_unusable_ease() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let subject = Subject::new("Greek");
        let due = Utc.with_ymd_and_hms(2031, 1, 5, 7, 0, 0).unwrap();

        let mut kept = Card::new(subject.id, "alpha", "a");
        kept.interval = 12;
        kept.ease_factor = 2.1;
        kept.next_review_at = due;
        let mut broken = Card::new(subject.id, "beta", "b");
        broken.interval = 30;
        broken.ease_factor = 0.7;
        broken.next_review_at = due;

        let bundle = ExportBundle { version: 1, subjects: vec![subject], cards: vec![kept.clone(), broken.clone()] };
        std::fs::write(&path, serde_json::to_string(&bundle).unwrap()).unwrap();

        let repo: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        import_cmd(repo.clone(), ImportCmd::Json { path }).await.unwrap();

        let kept = repo.get_card(kept.id).await.unwrap();
        assert_eq!((kept.interval, kept.ease_factor, kept.next_review_at), (12, 2.1, due));
        let broken = repo.get_card(broken.id).await.unwrap();
        assert_eq!(broken.interval, 0);
        assert_eq!(broken.ease_factor, recall_core::EASE_DEFAULT);
        assert!(broken.next_review_at < due);
    }

    #[test]
    fn csv_record_with_unusable_ease_is_new() {
        let sid = Uuid::new_v4();
        let rec = csv::StringRecord::from(vec![
            "Greek", "gamma", "g", "40", "inf", "2031-01-05T07:00:00Z",
        ]);
        let card = card_from_record(&rec, sid).unwrap();
        assert_eq!(card.interval, 0);
        assert_eq!(card.ease_factor, recall_core::EASE_DEFAULT);
        assert!(card.next_review_at <= Utc::now());
    }

    #[tokio::test]
    async fn resolve_subject_by_id_or_name() {
        let repo = MemoryRepo::new();
        let s = repo.create_subject("Economics").await.unwrap();
        assert_eq!(resolve_subject(&repo, "economics").await.unwrap().id, s.id);
        assert_eq!(resolve_subject(&repo, &s.id.to_string()).await.unwrap().id, s.id);
        assert!(resolve_subject(&repo, "law").await.is_err());
    }
}
