use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use minigit_core::{Commit, ObjectKind, Repository};

use crate::open_repo;

pub fn init(path: Option<PathBuf>) -> Result<()> {
    let target = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&target)?;
    let repo = Repository::init(&target)?;
    println!("Initialized empty repository in {}", repo.git_dir().display());
    Ok(())
}

pub fn add(paths: &[PathBuf]) -> Result<()> {
    let repo = open_repo()?;
    let mut index = repo.read_index()?;
    for path in paths {
        for file in walk_files(path)? {
            let relative = file
                .strip_prefix(repo.workdir())
                .unwrap_or(&file)
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            let entry = repo.stage_file(&relative, &file)?;
            index.upsert(entry);
        }
    }
    repo.write_index(&index)?;
    Ok(())
}

fn walk_files(path: &Path) -> Result<Vec<PathBuf>> {
    let absolute = std::fs::canonicalize(path).with_context(|| format!("no such file: {}", path.display()))?;
    let mut out = Vec::new();
    collect(&absolute, &mut out)?;
    Ok(out)
}

fn collect(path: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if path.file_name().is_some_and(|n| n == minigit_core::repo::GIT_DIR_NAME) {
        return Ok(());
    }
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            collect(&entry?.path(), out)?;
        }
    } else if path.is_file() {
        out.push(path.to_path_buf());
    }
    Ok(())
}

pub fn commit(message: &str) -> Result<()> {
    let repo = open_repo()?;
    let index = repo.read_index()?;
    if index.is_empty() {
        bail!("nothing to commit, the index is empty");
    }
    let tree = repo.build_root_tree(&index)?;

    let parents = match repo.resolve_ref("HEAD") {
        Ok(id) => vec![id],
        Err(minigit_core::Error::RefNotFound(_)) => vec![],
        Err(e) => return Err(e.into()),
    };

    let author = minigit_core::identity::author(repo.git_dir())?;
    let committer = minigit_core::identity::committer(repo.git_dir())?;
    let commit = Commit {
        tree,
        parents,
        author,
        committer,
        message: message.to_owned(),
    };
    let id = repo.write_object(ObjectKind::Commit, &Repository::serialize_commit(&commit))?;

    match repo.current_branch()? {
        Some(branch) => repo.update_branch(&branch, id)?,
        None => repo.set_head_detached(id)?,
    }
    tracing::info!(%id, "created commit");
    println!("{id}");
    Ok(())
}

pub fn status() -> Result<()> {
    let repo = open_repo()?;
    let index = repo.read_index()?;
    match repo.current_branch()? {
        Some(branch) => println!("On branch {branch}"),
        None => println!("HEAD detached"),
    }

    let head_files = match repo.resolve_ref("HEAD") {
        Ok(id) => repo.walk_tree(repo.tree_of(id)?)?,
        Err(_) => std::collections::BTreeMap::new(),
    };

    for entry in index.sorted_entries() {
        match head_files.get(&entry.path) {
            Some((id, _)) if *id == entry.id => {}
            Some(_) => println!("  modified: {}", entry.path),
            None => println!("  new file: {}", entry.path),
        }
    }
    for path in head_files.keys() {
        if !index.contains(path) {
            println!("  deleted:  {path}");
        }
    }
    Ok(())
}
