use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dl", about = concat!("daylist v", env!("CARGO_PKG_VERSION"), " - today's tasks and an end-of-day recap"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'D', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the active and completed lists
    List(ListArgs),
    /// Add a task to the end of the active list
    Add(AddArgs),
    /// Add a section header to the end of the active list
    Section(SectionArgs),
    /// Change the text of a task or section
    Edit(EditArgs),
    /// Delete a task or section
    Rm(ItemArg),
    /// Mark an active task completed
    Done(ItemArg),
    /// Move a completed task back to the end of the active list
    Restore(ItemArg),
    /// Move an item within or between lists
    Mv(MvArgs),
    /// Save, list, edit or delete daily recaps
    Recap(RecapCmd),
    /// Show or set the daily target
    Target(TargetArgs),
    /// Show, set or clear the display name
    Name(NameArgs),
    /// Replace both lists with demo data
    Sample(ConfirmArgs),
    /// Empty both lists (recaps are kept)
    Reset(ConfirmArgs),
    /// Show progress toward the daily target
    Progress,
}

// ---------------------------------------------------------------------------
// Item args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Only show one list (active, completed)
    pub list: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct SectionArgs {
    /// Section label (default: "New section")
    pub label: Vec<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Item reference: a1 / c2 (position in a list) or a numeric id
    pub item: String,
    /// New text (may be empty)
    #[arg(num_args = 0..)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct ItemArg {
    /// Item reference: a1 / c2 (position in a list) or a numeric id
    pub item: String,
}

#[derive(Args)]
pub struct MvArgs {
    /// Item reference: a1 / c2 (position in a list) or a numeric id
    pub item: String,
    /// Destination: a3 / c1 (position), or a / c alone for the end of that list
    pub dest: String,
}

#[derive(Args)]
pub struct ConfirmArgs {
    /// Skip confirmation
    #[arg(long)]
    pub yes: bool,
}

// ---------------------------------------------------------------------------
// Recaps
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecapCmd {
    #[command(subcommand)]
    pub action: RecapAction,
}

#[derive(Subcommand)]
pub enum RecapAction {
    /// Archive the completed list as today's recap
    Save(RecapSaveArgs),
    /// Print the recap text prefilled from the completed list
    Draft,
    /// List saved recaps, newest first
    List,
    /// Change a saved recap's text or mood
    Edit(RecapEditArgs),
    /// Delete a saved recap
    Rm(RecapRefArg),
}

#[derive(Args)]
pub struct RecapSaveArgs {
    /// Mood for the day (bad, neutral, good)
    #[arg(long)]
    pub mood: String,
    /// Recap text (default: one line per completed task)
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Args)]
pub struct RecapEditArgs {
    /// Recap reference: position in `dl recap list` or its RFC 3339 date
    pub recap: String,
    /// New text
    #[arg(long)]
    pub text: Option<String>,
    /// New mood (bad, neutral, good)
    #[arg(long)]
    pub mood: Option<String>,
}

#[derive(Args)]
pub struct RecapRefArg {
    /// Recap reference: position in `dl recap list` or its RFC 3339 date
    pub recap: String,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TargetArgs {
    /// New target (at least 1); omit to show the current one
    pub value: Option<u32>,
}

#[derive(Args)]
pub struct NameArgs {
    /// New display name; omit to show the current one
    pub name: Vec<String>,
    /// Forget the stored name
    #[arg(long, conflicts_with = "name")]
    pub clear: bool,
}
