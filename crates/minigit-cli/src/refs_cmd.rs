use anyhow::{Result, bail};
use minigit_core::{MergeOutcome, ShortName};

use crate::open_repo;

pub fn branch(name: Option<String>, delete: bool) -> Result<()> {
    let repo = open_repo()?;
    match name {
        None => {
            let current = repo.current_branch()?;
            for branch in repo.list_branches()? {
                let marker = if Some(&branch) == current.as_ref() { "* " } else { "  " };
                println!("{marker}{branch}");
            }
        }
        Some(name) if delete => {
            repo.delete_branch(&ShortName::new(&name)?)?;
        }
        Some(name) => {
            let head = repo.resolve_ref("HEAD")?;
            repo.create_branch(&ShortName::new(&name)?, head)?;
        }
    }
    Ok(())
}

pub fn tag(name: &str, rev: &str) -> Result<()> {
    let repo = open_repo()?;
    let id = repo.resolve_rev(rev)?;
    repo.create_tag(&ShortName::new(name)?, id)?;
    Ok(())
}

pub fn checkout(rev: &str) -> Result<()> {
    let repo = open_repo()?;
    let id = repo.resolve_rev(rev)?;
    let tree = repo.tree_of(id)?;
    repo.project_tree(tree)?;

    if let Ok(name) = ShortName::new(rev) {
        let branch_ref = format!("refs/heads/{name}");
        if repo.ref_exists(&branch_ref) {
            repo.set_head_to_branch(&name)?;
            return Ok(());
        }
    }
    repo.set_head_detached(id)?;
    Ok(())
}

pub fn merge(rev: &str, message: Option<String>) -> Result<()> {
    let repo = open_repo()?;
    let theirs = repo.resolve_rev(rev)?;
    let message = message.unwrap_or_else(|| format!("Merge branch '{rev}'"));

    match repo.merge(theirs, rev, &message)? {
        MergeOutcome::AlreadyUpToDate => println!("Already up to date."),
        MergeOutcome::FastForward { to } => {
            repo.project_tree(repo.tree_of(to)?)?;
            println!("Fast-forward to {to}");
        }
        MergeOutcome::Merged { commit } => {
            repo.project_tree(repo.tree_of(commit)?)?;
            println!("Merge commit {commit}");
        }
        MergeOutcome::Conflicted { paths } => {
            // The engine already wrote marker files to the working tree and
            // left conflicted paths unstaged; nothing left to project here.
            bail!("merge conflict in {} file(s): {}", paths.len(), paths.join(", "));
        }
    }
    Ok(())
}

pub fn update_ref(name: &str, rev: &str) -> Result<()> {
    let repo = open_repo()?;
    let id = repo.resolve_rev(rev)?;
    repo.write_ref_direct(name, id)?;
    Ok(())
}

pub fn symbolic_ref(target: Option<String>) -> Result<()> {
    let repo = open_repo()?;
    match target {
        Some(target) => repo.write_ref_symbolic("HEAD", &target)?,
        None => match repo.read_ref_file("HEAD")? {
            minigit_core::RefTarget::Symbolic(target) => println!("{target}"),
            minigit_core::RefTarget::Direct(id) => bail!("HEAD is detached at {id}"),
        },
    }
    Ok(())
}
