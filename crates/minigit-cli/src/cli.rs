use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::{history, plumbing, refs_cmd, stage};

/// A minimal, file-backed, Git-compatible version control engine.
#[derive(Parser)]
#[command(name = "minigit")]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new repository in the given directory (default: `.`)
    Init { path: Option<PathBuf> },

    /// Stage file contents
    Add { paths: Vec<PathBuf> },

    /// Record staged changes as a new commit
    Commit {
        #[arg(short = 'm', long)]
        message: String,
    },

    /// Show working-tree and staging status
    Status,

    /// Show commit history reachable from HEAD
    Log {
        #[arg(default_value = "HEAD")]
        rev: String,
    },

    /// Show a commit and its diff against its first parent
    Show { rev: String },

    /// Show changes between the working tree and the index, or the index and HEAD
    Diff {
        #[arg(long)]
        cached: bool,
    },

    /// List, create, or delete branches
    Branch {
        name: Option<String>,
        #[arg(short = 'd', long)]
        delete: bool,
    },

    /// Create a lightweight tag
    Tag {
        name: String,
        #[arg(default_value = "HEAD")]
        rev: String,
    },

    /// Switch the working tree and HEAD to a revision
    Checkout { rev: String },

    /// Merge a revision into the current branch
    Merge {
        rev: String,
        #[arg(short = 'm', long)]
        message: Option<String>,
    },

    /// Resolve a revision expression to an object id
    RevParse { rev: String },

    /// Print an object's type or contents
    CatFile {
        #[arg(short = 't', conflicts_with = "pretty")]
        show_type: bool,
        #[arg(short = 'p')]
        pretty: bool,
        rev: String,
    },

    /// Hash file contents as an object, optionally writing it
    HashObject {
        path: PathBuf,
        #[arg(short = 'w', long)]
        write: bool,
    },

    /// List files in the index
    LsFiles,

    /// List the entries of a tree object
    LsTree { rev: String },

    /// Directly set a ref to an object id
    UpdateRef { name: String, rev: String },

    /// Read or write HEAD's symbolic indirection
    SymbolicRef { target: Option<String> },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Init { path } => stage::init(path),
            Commands::Add { paths } => stage::add(&paths),
            Commands::Commit { message } => stage::commit(&message),
            Commands::Status => stage::status(),
            Commands::Log { rev } => history::log(&rev),
            Commands::Show { rev } => history::show(&rev),
            Commands::Diff { cached } => history::diff(cached),
            Commands::Branch { name, delete } => refs_cmd::branch(name, delete),
            Commands::Tag { name, rev } => refs_cmd::tag(&name, &rev),
            Commands::Checkout { rev } => refs_cmd::checkout(&rev),
            Commands::Merge { rev, message } => refs_cmd::merge(&rev, message),
            Commands::RevParse { rev } => plumbing::rev_parse(&rev),
            Commands::CatFile { show_type, pretty, rev } => plumbing::cat_file(&rev, show_type, pretty),
            Commands::HashObject { path, write } => plumbing::hash_object(&path, write),
            Commands::LsFiles => plumbing::ls_files(),
            Commands::LsTree { rev } => plumbing::ls_tree(&rev),
            Commands::UpdateRef { name, rev } => refs_cmd::update_ref(&name, &rev),
            Commands::SymbolicRef { target } => refs_cmd::symbolic_ref(target),
        }
    }
}
