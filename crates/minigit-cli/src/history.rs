use anyhow::Result;
use minigit_core::diff::DiffEngine;
use minigit_core::{ObjectId, ObjectKind, Repository};

use crate::diff_engine::UnifiedDiff;
use crate::open_repo;

pub fn log(rev: &str) -> Result<()> {
    let repo = open_repo()?;
    let mut current = Some(repo.resolve_rev(rev)?);
    while let Some(id) = current {
        let (kind, payload) = repo.read_object(id)?;
        if kind != ObjectKind::Commit {
            break;
        }
        let commit = Repository::parse_commit(&payload)?;
        println!("commit {id}");
        println!("Author: {} <{}>", commit.author.name, commit.author.email);
        println!();
        for line in commit.message.lines() {
            println!("    {line}");
        }
        println!();
        current = commit.parents.first().copied();
    }
    Ok(())
}

pub fn show(rev: &str) -> Result<()> {
    let repo = open_repo()?;
    let id = repo.resolve_rev(rev)?;
    let (kind, payload) = repo.read_object(id)?;
    if kind != ObjectKind::Commit {
        println!("{id} ({kind})");
        return Ok(());
    }
    let commit = Repository::parse_commit(&payload)?;
    println!("commit {id}");
    println!("Author: {} <{}>", commit.author.name, commit.author.email);
    println!();
    for line in commit.message.lines() {
        println!("    {line}");
    }
    println!();

    let engine = UnifiedDiff;
    let new_files = repo.walk_tree(commit.tree)?;
    let old_files = match commit.parents.first() {
        Some(parent) => repo.walk_tree(repo.tree_of(*parent)?)?,
        None => std::collections::BTreeMap::new(),
    };
    print_tree_diff(&repo, &engine, &old_files, &new_files)?;
    Ok(())
}

pub fn diff(cached: bool) -> Result<()> {
    let repo = open_repo()?;
    let index = repo.read_index()?;
    let engine = UnifiedDiff;

    if cached {
        let head_files = match repo.resolve_ref("HEAD") {
            Ok(id) => repo.walk_tree(repo.tree_of(id)?)?,
            Err(_) => std::collections::BTreeMap::new(),
        };
        let mut staged = std::collections::BTreeMap::new();
        for entry in index.sorted_entries() {
            staged.insert(entry.path.clone(), (entry.id, entry.mode));
        }
        print_tree_diff(&repo, &engine, &head_files, &staged)?;
    } else {
        for entry in index.sorted_entries() {
            let absolute = repo.workdir().join(&entry.path);
            let Ok(disk_content) = std::fs::read(&absolute) else {
                continue;
            };
            let (_, indexed_content) = repo.read_object(entry.id)?;
            if disk_content == indexed_content {
                continue;
            }
            let script = engine.diff(&indexed_content, &disk_content);
            print!("{}", engine.format(&script, &entry.path, &entry.path));
        }
    }
    Ok(())
}

fn print_tree_diff(
    repo: &Repository,
    engine: &UnifiedDiff,
    old: &std::collections::BTreeMap<String, (ObjectId, minigit_core::EntryMode)>,
    new: &std::collections::BTreeMap<String, (ObjectId, minigit_core::EntryMode)>,
) -> Result<()> {
    let mut paths: Vec<&String> = old.keys().chain(new.keys()).collect();
    paths.sort();
    paths.dedup();
    for path in paths {
        let old_entry = old.get(path);
        let new_entry = new.get(path);
        if old_entry.map(|e| e.0) == new_entry.map(|e| e.0) {
            continue;
        }
        let old_content = match old_entry {
            Some((id, _)) => repo.read_object(*id)?.1,
            None => Vec::new(),
        };
        let new_content = match new_entry {
            Some((id, _)) => repo.read_object(*id)?.1,
            None => Vec::new(),
        };
        let script = engine.diff(&old_content, &new_content);
        print!("{}", engine.format(&script, path, path));
    }
    Ok(())
}
