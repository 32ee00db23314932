use std::error::Error;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use chrono::{DateTime, Utc};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::events::{EventBus, StoreEvent};
use crate::io::config_io;
use crate::io::kv::FileStore;
use crate::io::lock::FileLock;
use crate::logging;
use crate::model::config::Config;
use crate::model::item::ItemId;
use crate::model::list::ListId;
use crate::ops::recap_ops;
use crate::store::TaskListStore;

type CmdResult = Result<(), Box<dyn Error>>;

/// Everything a command needs to reach the data directory
struct Session {
    data_dir: PathBuf,
    config: Config,
    json: bool,
}

/// An opened store plus the receiver used to notice failed writes
struct Opened {
    store: TaskListStore<FileStore>,
    events: Receiver<StoreEvent>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let config = config_io::read_config(&config_io::config_path())?;
    let data_dir = config_io::resolve_data_dir(cli.data_dir.as_deref(), &config);
    std::fs::create_dir_all(&data_dir)
        .map_err(|e| format!("cannot create data directory {}: {}", data_dir.display(), e))?;

    // Logging is best effort; a bad level or unwritable log dir never blocks a command.
    let _logger = match logging::init_logging(&config.log.level, &data_dir) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("warning: {}", e);
            None
        }
    };

    let session = Session {
        data_dir,
        config,
        json: cli.json,
    };

    match cli.command {
        // Read commands
        Commands::List(args) => cmd_list(&session, args),
        Commands::Progress => cmd_progress(&session),
        Commands::Recap(RecapCmd {
            action: RecapAction::Draft,
        }) => cmd_recap_draft(&session),
        Commands::Recap(RecapCmd {
            action: RecapAction::List,
        }) => cmd_recap_list(&session),

        // Write commands
        Commands::Add(args) => cmd_add(&session, args),
        Commands::Section(args) => cmd_section(&session, args),
        Commands::Edit(args) => cmd_edit(&session, args),
        Commands::Rm(args) => cmd_rm(&session, args),
        Commands::Done(args) => cmd_done(&session, args),
        Commands::Restore(args) => cmd_restore(&session, args),
        Commands::Mv(args) => cmd_mv(&session, args),
        Commands::Recap(RecapCmd {
            action: RecapAction::Save(args),
        }) => cmd_recap_save(&session, args),
        Commands::Recap(RecapCmd {
            action: RecapAction::Edit(args),
        }) => cmd_recap_edit(&session, args),
        Commands::Recap(RecapCmd {
            action: RecapAction::Rm(args),
        }) => cmd_recap_rm(&session, args),
        Commands::Target(args) => cmd_target(&session, args),
        Commands::Name(args) => cmd_name(&session, args),
        Commands::Sample(args) => cmd_sample(&session, args),
        Commands::Reset(args) => cmd_reset(&session, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl Session {
    fn open(&self) -> Result<Opened, Box<dyn Error>> {
        let backend = FileStore::open(&self.data_dir)?;
        let bus = EventBus::new();
        let events = bus.subscribe();
        let store = TaskListStore::open(backend, bus, &self.config.defaults);
        Ok(Opened { store, events })
    }
}

impl Opened {
    /// A one-shot process loses any change that did not reach disk, so
    /// surface the first failed write as the command's error.
    fn finish(self) -> CmdResult {
        for event in self.events.try_iter() {
            if let StoreEvent::PersistenceFailed(message) = event {
                return Err(format!("change was not saved: {}", message).into());
            }
        }
        Ok(())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parsed form of an item argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemRef {
    /// 0-based position in a list
    Position(ListId, usize),
    Id(ItemId),
}

fn parse_item_ref(s: &str) -> Result<ItemRef, String> {
    let s = s.trim();
    if let Some((list, Some(index))) = parse_position(s) {
        return Ok(ItemRef::Position(list, index));
    }
    s.parse::<ItemId>()
        .map(ItemRef::Id)
        .map_err(|_| format!("invalid item reference '{}' (expected a1, c2 or an id)", s))
}

/// `a3` → (Active, Some(2)); `a` / `active` → (Active, None)
fn parse_position(s: &str) -> Option<(ListId, Option<usize>)> {
    if let Some(list) = ListId::parse_list(s) {
        return Some((list, None));
    }
    let (prefix, digits) = s.split_at_checked(1)?;
    let list = ListId::parse_list(prefix)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: usize = digits.parse().ok()?;
    if n == 0 {
        return None;
    }
    Some((list, Some(n - 1)))
}

/// Resolve an item argument to its id and current location.
fn resolve_item(
    store: &TaskListStore<FileStore>,
    reference: &str,
) -> Result<(ItemId, ListId, usize), Box<dyn Error>> {
    match parse_item_ref(reference)? {
        ItemRef::Position(list, index) => {
            let items = store.lists().list(list);
            let item = items.get(index).ok_or_else(|| {
                format!(
                    "no item at {} ({} list has {} items)",
                    reference,
                    list,
                    items.len()
                )
            })?;
            Ok((item.id, list, index))
        }
        ItemRef::Id(id) => {
            let (list, index) = store
                .lists()
                .locate(id)
                .ok_or_else(|| format!("item not found: {}", id))?;
            Ok((id, list, index))
        }
    }
}

/// Print where an item now lives (`a3`), or its JSON form.
fn report_item(session: &Session, store: &TaskListStore<FileStore>, id: ItemId) -> CmdResult {
    let Some((list, index)) = store.lists().locate(id) else {
        return Ok(());
    };
    let item = &store.lists().list(list)[index];
    if session.json {
        print_json(&item_to_json(list, index, item))
    } else {
        println!("{}", format_item_line(list, index, item));
        Ok(())
    }
}

fn join_words(words: &[String]) -> String {
    words.join(" ")
}

/// Recap argument: a 1-based position in newest-first order, or an RFC 3339 date.
fn resolve_recap(store: &TaskListStore<FileStore>, reference: &str) -> Result<DateTime<Utc>, Box<dyn Error>> {
    let reference = reference.trim();
    if !reference.is_empty() && reference.chars().all(|c| c.is_ascii_digit()) {
        let n: usize = reference.parse()?;
        let recaps = store.recaps();
        if n == 0 || n > recaps.len() {
            return Err(format!("no recap {} ({} saved)", n, recaps.len()).into());
        }
        return Ok(recaps[recaps.len() - n].date);
    }
    let date = DateTime::parse_from_rfc3339(reference)
        .map_err(|e| format!("invalid recap reference '{}': {}", reference, e))?
        .with_timezone(&Utc);
    Ok(date)
}

/// Destructive commands over a non-empty list need `--yes`.
fn confirm(args: &ConfirmArgs, store: &TaskListStore<FileStore>, verb: &str) -> CmdResult {
    let count = store.lists().len();
    if count > 0 && !args.yes {
        return Err(format!(
            "{} would discard {} item{}; pass --yes to confirm",
            verb,
            count,
            if count == 1 { "" } else { "s" }
        )
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(session: &Session, args: ListArgs) -> CmdResult {
    let only = match args.list.as_deref() {
        Some(name) => Some(ListId::parse_list(name).ok_or_else(|| format!("unknown list: {}", name))?),
        None => None,
    };
    let show = |list: ListId| only.is_none_or(|o| o == list);
    let opened = session.open()?;
    let store = &opened.store;

    if session.json {
        let json = ListsJson {
            active: show(ListId::Active).then(|| list_to_json(ListId::Active, store.active())),
            completed: show(ListId::Completed)
                .then(|| list_to_json(ListId::Completed, store.completed())),
            progress: store.progress(),
        };
        return print_json(&json);
    }

    if let Some(name) = store.display_name() {
        println!("{}'s day", name);
    }
    for list in [ListId::Active, ListId::Completed] {
        if show(list) {
            for line in format_list(list, store.lists().list(list)) {
                println!("{}", line);
            }
        }
    }
    println!("{}", format_progress(&store.progress()));
    Ok(())
}

fn cmd_progress(session: &Session) -> CmdResult {
    let opened = session.open()?;
    let progress = opened.store.progress();
    if session.json {
        return print_json(&progress);
    }
    println!("{}", format_progress(&progress));
    Ok(())
}

fn cmd_recap_draft(session: &Session) -> CmdResult {
    let opened = session.open()?;
    let draft = opened.store.recap_draft();
    if session.json {
        return print_json(&serde_json::json!({ "text": draft }));
    }
    if !draft.is_empty() {
        println!("{}", draft);
    }
    Ok(())
}

fn cmd_recap_list(session: &Session) -> CmdResult {
    let opened = session.open()?;
    let newest_first = opened.store.recaps().iter().rev().enumerate();
    if session.json {
        let json: Vec<RecapJson> = newest_first.map(|(i, r)| recap_to_json(i + 1, r)).collect();
        return print_json(&json);
    }
    if opened.store.recaps().is_empty() {
        println!("no recaps yet");
        return Ok(());
    }
    for (i, recap) in newest_first {
        for line in format_recap(i + 1, recap) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(session: &Session, args: AddArgs) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let id = opened.store.add_task(&join_words(&args.text))?;
    report_item(session, &opened.store, id)?;
    opened.finish()
}

fn cmd_section(session: &Session, args: SectionArgs) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let id = opened.store.add_section(&join_words(&args.label));
    report_item(session, &opened.store, id)?;
    opened.finish()
}

fn cmd_edit(session: &Session, args: EditArgs) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let (id, _, _) = resolve_item(&opened.store, &args.item)?;
    opened.store.start_edit(id)?;
    opened.store.commit_edit(id, join_words(&args.text))?;
    report_item(session, &opened.store, id)?;
    opened.finish()
}

fn cmd_rm(session: &Session, args: ItemArg) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let (id, _, _) = resolve_item(&opened.store, &args.item)?;
    let removed = opened.store.delete_item(id)?;
    if session.json {
        print_json(&serde_json::json!({ "deleted": removed.id, "text": removed.text }))?;
    } else {
        println!("deleted: {}", removed.text);
    }
    opened.finish()
}

fn cmd_done(session: &Session, args: ItemArg) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let (id, list, _) = resolve_item(&opened.store, &args.item)?;
    if list == ListId::Completed {
        return Err(format!("{} is already completed; use `dl restore`", args.item).into());
    }
    opened.store.toggle_complete(id)?;
    report_item(session, &opened.store, id)?;
    if !session.json {
        println!("{}", format_progress(&opened.store.progress()));
    }
    opened.finish()
}

fn cmd_restore(session: &Session, args: ItemArg) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let (id, _, _) = resolve_item(&opened.store, &args.item)?;
    opened.store.restore(id)?;
    report_item(session, &opened.store, id)?;
    opened.finish()
}

fn cmd_mv(session: &Session, args: MvArgs) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let (id, from_list, from) = resolve_item(&opened.store, &args.item)?;
    let (to_list, position) = parse_position(args.dest.trim())
        .ok_or_else(|| format!("invalid destination '{}' (expected a3, c1, a or c)", args.dest))?;

    if to_list == from_list {
        let last = opened.store.lists().list(to_list).len().saturating_sub(1);
        opened.store.reorder(from_list, from, Some(position.unwrap_or(last)))?;
    } else {
        let end = opened.store.lists().list(to_list).len();
        opened
            .store
            .move_between_lists(from_list, from, to_list, Some(position.unwrap_or(end)))?;
    }
    report_item(session, &opened.store, id)?;
    opened.finish()
}

fn cmd_recap_save(session: &Session, args: RecapSaveArgs) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let mood = recap_ops::parse_mood(&args.mood)?;
    let text = args.text.unwrap_or_else(|| opened.store.recap_draft());
    let archived = opened.store.completed().len();
    let recap = opened.store.save_recap(&text, mood)?;
    if session.json {
        print_json(&recap_to_json(1, recap))?;
    } else {
        println!(
            "saved recap {} ({}, {} task{} archived)",
            format_recap_date(recap.date),
            recap.mood,
            archived,
            if archived == 1 { "" } else { "s" }
        );
    }
    opened.finish()
}

fn cmd_recap_edit(session: &Session, args: RecapEditArgs) -> CmdResult {
    if args.text.is_none() && args.mood.is_none() {
        return Err("nothing to change: pass --text and/or --mood".into());
    }
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let date = resolve_recap(&opened.store, &args.recap)?;
    let existing = opened
        .store
        .recaps()
        .iter()
        .find(|r| r.date == date)
        .ok_or_else(|| format!("no recap dated {}", format_recap_date(date)))?
        .clone();
    let mood = match args.mood.as_deref() {
        Some(m) => recap_ops::parse_mood(m)?,
        None => existing.mood,
    };
    let text = args.text.unwrap_or(existing.text);
    opened.store.edit_recap(date, text, mood)?;
    if !session.json {
        println!("updated recap {}", format_recap_date(date));
    }
    opened.finish()
}

fn cmd_recap_rm(session: &Session, args: RecapRefArg) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let date = resolve_recap(&opened.store, &args.recap)?;
    let removed = opened.store.delete_recap(date)?;
    if !session.json {
        println!("deleted recap {}", format_recap_date(removed.date));
    }
    opened.finish()
}

fn cmd_target(session: &Session, args: TargetArgs) -> CmdResult {
    let Some(value) = args.value else {
        let opened = session.open()?;
        print_settings(session, &opened.store)?;
        if !session.json {
            let choices: Vec<String> = recap_ops::TARGET_CHOICES.iter().map(|c| c.to_string()).collect();
            println!("usual targets: {}", choices.join(", "));
        }
        return Ok(());
    };
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    opened.store.set_target_tasks(value)?;
    print_settings(session, &opened.store)?;
    opened.finish()
}

fn cmd_name(session: &Session, args: NameArgs) -> CmdResult {
    if !args.clear && args.name.is_empty() {
        let opened = session.open()?;
        return print_settings(session, &opened.store);
    }
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    let name = if args.clear { String::new() } else { join_words(&args.name) };
    opened.store.set_display_name(&name);
    print_settings(session, &opened.store)?;
    opened.finish()
}

fn print_settings(session: &Session, store: &TaskListStore<FileStore>) -> CmdResult {
    if session.json {
        return print_json(&SettingsJson {
            target_tasks: store.target_tasks(),
            display_name: store.display_name().map(str::to_string),
        });
    }
    println!("target: {}", store.target_tasks());
    println!("name: {}", store.display_name().unwrap_or("(not set)"));
    Ok(())
}

fn cmd_sample(session: &Session, args: ConfirmArgs) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    confirm(&args, &opened.store, "loading the sample")?;
    opened.store.load_sample();
    if !session.json {
        println!(
            "loaded sample: {} active, {} completed",
            opened.store.active().len(),
            opened.store.completed().len()
        );
    }
    opened.finish()
}

fn cmd_reset(session: &Session, args: ConfirmArgs) -> CmdResult {
    let _lock = FileLock::acquire_default(&session.data_dir)?;
    let mut opened = session.open()?;
    confirm(&args, &opened.store, "reset")?;
    opened.store.reset_all();
    if !session.json {
        println!("lists cleared");
    }
    opened.finish()
}
