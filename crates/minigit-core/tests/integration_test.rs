//! End-to-end scenarios against a from-scratch repository: no `git`
//! binary, no external VCS library — just [`minigit_core::Repository`].

use minigit_core::merge::MergeOutcome;
use minigit_core::{Commit, EntryMode, Error, Identity, ObjectKind, Repository, ShortName, TreeEntry};
use tempfile::TempDir;

fn ident(name: &str) -> Identity {
    Identity {
        name: name.to_owned(),
        email: format!("{name}@example.com"),
        timestamp: 1_700_000_000,
        tz_offset: "+0000".to_owned(),
    }
}

fn commit_tree(repo: &Repository, tree: minigit_core::ObjectId, parents: Vec<minigit_core::ObjectId>) -> minigit_core::ObjectId {
    let commit = Commit {
        tree,
        parents,
        author: ident("Ada"),
        committer: ident("Ada"),
        message: "a commit\n".to_owned(),
    };
    repo.write_object(ObjectKind::Commit, &Repository::serialize_commit(&commit)).unwrap()
}

fn single_file_tree(repo: &Repository, name: &str, content: &[u8]) -> minigit_core::ObjectId {
    let blob = repo.write_object(ObjectKind::Blob, content).unwrap();
    repo.write_object(
        ObjectKind::Tree,
        &Repository::serialize_tree(&[TreeEntry {
            name: name.to_owned(),
            mode: EntryMode::Regular,
            id: blob,
        }]),
    )
    .unwrap()
}

#[test]
fn init_stage_commit_known_blob_hash() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    std::fs::write(dir.path().join("hello.txt"), b"hello\n").unwrap();
    let entry = repo.stage_file("hello.txt", &dir.path().join("hello.txt")).unwrap();
    assert_eq!(entry.id.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");

    let mut index = repo.read_index().unwrap();
    index.upsert(entry);
    repo.write_index(&index).unwrap();

    let tree = repo.build_root_tree(&index).unwrap();
    let commit_id = commit_tree(&repo, tree, vec![]);
    repo.update_branch(&ShortName::new("main").unwrap(), commit_id).unwrap();

    assert_eq!(repo.resolve_rev("HEAD").unwrap(), commit_id);
    let resolved_blob = repo.resolve_rev("HEAD:hello.txt").unwrap();
    assert_eq!(resolved_blob.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
}

#[test]
fn short_id_disambiguation() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let id = repo.write_object(ObjectKind::Blob, b"distinctive content for prefix test").unwrap();
    let hex = id.to_hex();

    assert_eq!(repo.expand_short(&hex[..6]).unwrap(), id);
    assert!(matches!(repo.expand_short("ffffffff"), Err(Error::NotFound { .. })));
    assert!(matches!(repo.expand_short("ab"), Err(Error::BackendError { .. })));
}

#[test]
fn fast_forward_merge_moves_branch_without_new_commit() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let tree1 = single_file_tree(&repo, "f.txt", b"v1\n");
    let c1 = commit_tree(&repo, tree1, vec![]);
    let tree2 = single_file_tree(&repo, "f.txt", b"v2\n");
    let c2 = commit_tree(&repo, tree2, vec![c1]);

    let main = ShortName::new("main").unwrap();
    repo.update_branch(&main, c1).unwrap();

    let outcome = repo.merge(c2, "feature", "ff").unwrap();
    assert!(matches!(outcome, MergeOutcome::FastForward { to } if to == c2));
    assert_eq!(repo.resolve_rev("main").unwrap(), c2);
}

#[test]
fn clean_merge_of_disjoint_changes() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let base_tree = single_file_tree(&repo, "shared.txt", b"shared\n");
    let base = commit_tree(&repo, base_tree, vec![]);

    let shared_blob = repo.write_object(ObjectKind::Blob, b"shared\n").unwrap();
    let a_blob = repo.write_object(ObjectKind::Blob, b"feature a\n").unwrap();
    let ours_tree = repo
        .write_object(
            ObjectKind::Tree,
            &Repository::serialize_tree(&[
                TreeEntry { name: "shared.txt".into(), mode: EntryMode::Regular, id: shared_blob },
                TreeEntry { name: "a.txt".into(), mode: EntryMode::Regular, id: a_blob },
            ]),
        )
        .unwrap();
    let ours = commit_tree(&repo, ours_tree, vec![base]);

    let b_blob = repo.write_object(ObjectKind::Blob, b"feature b\n").unwrap();
    let theirs_tree = repo
        .write_object(
            ObjectKind::Tree,
            &Repository::serialize_tree(&[
                TreeEntry { name: "shared.txt".into(), mode: EntryMode::Regular, id: shared_blob },
                TreeEntry { name: "b.txt".into(), mode: EntryMode::Regular, id: b_blob },
            ]),
        )
        .unwrap();
    let theirs = commit_tree(&repo, theirs_tree, vec![base]);

    let main = ShortName::new("main").unwrap();
    repo.update_branch(&main, ours).unwrap();

    let outcome = repo.merge(theirs, "feature-b", "merge feature-b").unwrap();
    let MergeOutcome::Merged { commit } = outcome else {
        panic!("expected a clean merge, got a conflict or fast-forward");
    };
    let files = repo.walk_tree(repo.tree_of(commit).unwrap()).unwrap();
    assert_eq!(files.len(), 3);

    repo.project_tree(repo.tree_of(commit).unwrap()).unwrap();
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "feature a\n");
    assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "feature b\n");
}

#[test]
fn conflicting_merge_leaves_markers_and_merge_state() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let base_tree = single_file_tree(&repo, "f.txt", b"x\n");
    let base = commit_tree(&repo, base_tree, vec![]);
    let ours_tree = single_file_tree(&repo, "f.txt", b"y\n");
    let ours = commit_tree(&repo, ours_tree, vec![base]);
    let theirs_tree = single_file_tree(&repo, "f.txt", b"z\n");
    let theirs = commit_tree(&repo, theirs_tree, vec![base]);

    let main = ShortName::new("main").unwrap();
    repo.update_branch(&main, ours).unwrap();

    let outcome = repo.merge(theirs, "feature", "merge conflict").unwrap();
    let MergeOutcome::Conflicted { paths } = outcome else {
        panic!("expected a conflict");
    };
    assert_eq!(paths, vec!["f.txt".to_owned()]);
    assert!(repo.git_dir().join("MERGE_HEAD").is_file());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
        "<<<<<<< HEAD\ny\n=======\nz\n>>>>>>> feature\n"
    );
    assert!(!repo.read_index().unwrap().contains("f.txt"));

    repo.abort_merge().unwrap();
    assert!(!repo.git_dir().join("MERGE_HEAD").is_file());
    assert!(matches!(repo.abort_merge(), Err(Error::NotInMerge)));
}

#[test]
fn checkout_refuses_to_clobber_dirty_working_tree() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let tree1 = single_file_tree(&repo, "f.txt", b"v1\n");
    repo.project_tree(tree1).unwrap();

    std::fs::write(dir.path().join("f.txt"), b"uncommitted edit\n").unwrap();

    let tree2 = single_file_tree(&repo, "f.txt", b"v2\n");
    assert!(matches!(repo.project_tree(tree2), Err(Error::WouldClobber(_))));
    assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "uncommitted edit\n");
}

#[test]
fn ref_rename_and_branch_listing() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let tree = single_file_tree(&repo, "f.txt", b"x\n");
    let c = commit_tree(&repo, tree, vec![]);

    for name in ["main", "dev", "release"] {
        repo.update_branch(&ShortName::new(name).unwrap(), c).unwrap();
    }
    let names: Vec<String> = repo.list_branches().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["dev", "main", "release"]);

    repo.delete_branch(&ShortName::new("dev").unwrap()).unwrap();
    let names: Vec<String> = repo.list_branches().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["main", "release"]);
}

#[test]
fn revision_grammar_across_a_chain() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let tree = single_file_tree(&repo, "f.txt", b"x\n");
    let c1 = commit_tree(&repo, tree, vec![]);
    let c2 = commit_tree(&repo, tree, vec![c1]);
    let c3 = commit_tree(&repo, tree, vec![c2]);
    repo.update_branch(&ShortName::new("main").unwrap(), c3).unwrap();

    assert_eq!(repo.resolve_rev("main").unwrap(), c3);
    assert_eq!(repo.resolve_rev("main^").unwrap(), c2);
    assert_eq!(repo.resolve_rev("main^^").unwrap(), c1);
    assert_eq!(repo.resolve_rev("main~2").unwrap(), c1);
    assert_eq!(repo.resolve_rev(&c3.to_hex()[..10]).unwrap(), c3);
}
