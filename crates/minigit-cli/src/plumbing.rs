use std::path::Path;

use anyhow::Result;
use minigit_core::{ObjectKind, Repository};

use crate::open_repo;

pub fn rev_parse(rev: &str) -> Result<()> {
    let repo = open_repo()?;
    println!("{}", repo.resolve_rev(rev)?);
    Ok(())
}

pub fn cat_file(rev: &str, show_type: bool, pretty: bool) -> Result<()> {
    let repo = open_repo()?;
    let id = repo.resolve_rev(rev)?;
    let (kind, payload) = repo.read_object(id)?;
    if show_type {
        println!("{kind}");
    } else if pretty {
        match kind {
            ObjectKind::Blob => std::io::Write::write_all(&mut std::io::stdout(), &payload)?,
            ObjectKind::Tree => {
                for entry in Repository::parse_tree(&payload)? {
                    println!("{} {} {}\t{}", entry.mode.as_tree_str(), tree_entry_kind(&entry.mode), entry.id, entry.name);
                }
            }
            ObjectKind::Commit => {
                let commit = Repository::parse_commit(&payload)?;
                println!("tree {}", commit.tree);
                for parent in &commit.parents {
                    println!("parent {parent}");
                }
                println!("author {}", commit.author);
                println!("committer {}", commit.committer);
                println!();
                print!("{}", commit.message);
            }
            ObjectKind::Tag => {
                let tag = Repository::parse_tag(&payload)?;
                println!("object {}", tag.object);
                println!("type {}", tag.target_kind);
                println!("tag {}", tag.tag);
                println!("tagger {}", tag.tagger);
                println!();
                print!("{}", tag.message);
            }
        }
    }
    Ok(())
}

fn tree_entry_kind(mode: &minigit_core::EntryMode) -> &'static str {
    if mode.is_tree() { "tree" } else { "blob" }
}

pub fn hash_object(path: &Path, write: bool) -> Result<()> {
    let content = std::fs::read(path)?;
    if write {
        let repo = open_repo()?;
        let id = repo.write_object(ObjectKind::Blob, &content)?;
        println!("{id}");
    } else {
        println!("{}", Repository::hash_object(ObjectKind::Blob, &content));
    }
    Ok(())
}

pub fn ls_files() -> Result<()> {
    let repo = open_repo()?;
    for entry in repo.read_index()?.sorted_entries() {
        println!("{}", entry.path);
    }
    Ok(())
}

pub fn ls_tree(rev: &str) -> Result<()> {
    let repo = open_repo()?;
    let id = repo.resolve_rev(rev)?;
    let tree = repo.tree_of(id)?;
    let (_, payload) = repo.read_object(tree)?;
    for entry in Repository::parse_tree(&payload)? {
        println!("{} {} {}\t{}", entry.mode.as_tree_str(), tree_entry_kind(&entry.mode), entry.id, entry.name);
    }
    Ok(())
}
