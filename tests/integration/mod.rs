//! Integration tests for arbor
//!
//! Runs whole command sequences through the repository facade: the merge
//! scenarios, fast-forwards, merge preconditions and history queries.

use ::arbor::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

/// A repository in a temporary directory plus file helpers
pub struct RepoHarness {
    pub temp_dir: TempDir,
    pub repo: Repository,
}

impl RepoHarness {
    /// Fresh repository with default settings
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let repo = RepositoryBuilder::new()
            .compression_strategy(CompressionStrategy::Fast)
            .init(temp_dir.path().to_path_buf())
            .unwrap();
        Self { temp_dir, repo }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) {
        fs::write(self.path(name), content).unwrap();
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Write, stage and commit a set of files
    pub fn commit_files(&mut self, files: &[(&str, &str)], message: &str) -> String {
        for (name, content) in files {
            self.write(name, content);
            self.repo.add(name).unwrap();
        }
        self.repo.commit(message).unwrap()
    }

    /// Stage removals and commit
    pub fn commit_removals(&mut self, names: &[&str], message: &str) -> String {
        for name in names {
            self.repo.rm(name).unwrap();
        }
        self.repo.commit(message).unwrap()
    }

    /// Common base on master, then a `feature` branch; leaves master active
    pub fn fork(&mut self, base: &[(&str, &str)]) -> String {
        let base = self.commit_files(base, "base");
        self.repo.create_branch("feature").unwrap();
        base
    }
}

#[test]
fn test_clean_merge() {
    let mut h = RepoHarness::new();
    h.fork(&[("a.txt", "a1\n"), ("b.txt", "b1\n")]);

    h.commit_files(&[("a.txt", "a2\n")], "change a on master");
    h.repo.checkout_branch("feature").unwrap();
    let feature_tip = h.commit_files(&[("b.txt", "b2\n")], "change b on feature");
    h.repo.checkout_branch("master").unwrap();

    let master_tip = h.repo.head().unwrap();
    let outcome = h.repo.merge("feature").unwrap();
    assert!(!outcome.had_conflict());

    assert_eq!(h.read("a.txt"), "a2\n");
    assert_eq!(h.read("b.txt"), "b2\n");

    let merge_hash = h.repo.head().unwrap();
    let merge = h.repo.store().get_commit(&merge_hash).unwrap();
    assert_eq!(merge.parent.as_deref(), Some(master_tip.as_str()));
    assert_eq!(merge.second_parent.as_deref(), Some(feature_tip.as_str()));
    assert!(merge.display_format(&merge_hash).contains(&format!(
        "Merge: {} {}\n",
        &master_tip[..7],
        &feature_tip[..7]
    )));
    assert!(h.repo.index().is_empty());
}

#[test]
fn test_content_conflict_markers() {
    let mut h = RepoHarness::new();
    h.fork(&[("f.txt", "base\n")]);

    h.commit_files(&[("f.txt", "ours\n")], "ours");
    h.repo.checkout_branch("feature").unwrap();
    h.commit_files(&[("f.txt", "theirs\n")], "theirs");
    h.repo.checkout_branch("master").unwrap();

    let outcome = h.repo.merge("feature").unwrap();
    assert!(outcome.had_conflict());

    let expected = "<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>>\n";
    assert_eq!(h.read("f.txt"), expected);

    // The conflicted content is what the merge commit records
    let snapshot = h.repo.head_snapshot().unwrap();
    let blob = h.repo.store().get_blob(snapshot.get("f.txt").unwrap()).unwrap();
    assert_eq!(blob, expected.as_bytes());
    assert!(h.repo.status().unwrap().is_clean());
}

#[test]
fn test_removal_wins_over_unchanged_other() {
    let mut h = RepoHarness::new();
    h.fork(&[("gone.txt", "x\n"), ("keep.txt", "k\n")]);

    h.commit_removals(&["gone.txt"], "remove on master");
    h.repo.checkout_branch("feature").unwrap();
    h.commit_files(&[("keep.txt", "k2\n")], "unrelated change");
    h.repo.checkout_branch("master").unwrap();

    let outcome = h.repo.merge("feature").unwrap();
    assert!(!outcome.had_conflict());
    assert!(!h.exists("gone.txt"));
    assert!(!h.repo.head_snapshot().unwrap().contains("gone.txt"));
    assert_eq!(h.read("keep.txt"), "k2\n");
}

#[test]
fn test_divergent_addition_conflicts() {
    let mut h = RepoHarness::new();
    h.fork(&[("base.txt", "b\n")]);

    h.commit_files(&[("new.txt", "mine\n")], "add on master");
    h.repo.checkout_branch("feature").unwrap();
    h.commit_files(&[("new.txt", "yours\n")], "add on feature");
    h.repo.checkout_branch("master").unwrap();

    let outcome = h.repo.merge("feature").unwrap();
    assert!(outcome.had_conflict());
    assert_eq!(h.read("new.txt"), "<<<<<<< HEAD\nmine\n=======\nyours\n>>>>>>>\n");
}

#[test]
fn test_other_side_removal_applied() {
    let mut h = RepoHarness::new();
    h.fork(&[("shared.txt", "s\n"), ("other.txt", "o\n")]);

    h.commit_files(&[("other.txt", "o2\n")], "touch other on master");
    h.repo.checkout_branch("feature").unwrap();
    h.commit_removals(&["shared.txt"], "remove on feature");
    h.repo.checkout_branch("master").unwrap();

    let outcome = h.repo.merge("feature").unwrap();
    assert!(!outcome.had_conflict());
    assert!(!h.exists("shared.txt"));
    assert!(!h.repo.head_snapshot().unwrap().contains("shared.txt"));
}

#[test]
fn test_modify_delete_conflict() {
    let mut h = RepoHarness::new();
    h.fork(&[("f.txt", "base\n")]);

    h.commit_files(&[("f.txt", "edited\n")], "edit on master");
    h.repo.checkout_branch("feature").unwrap();
    h.commit_removals(&["f.txt"], "remove on feature");
    h.repo.checkout_branch("master").unwrap();

    let outcome = h.repo.merge("feature").unwrap();
    assert!(outcome.had_conflict());
    assert_eq!(h.read("f.txt"), "<<<<<<< HEAD\nedited\n=======\n>>>>>>>\n");
}

#[test]
fn test_fast_forward() {
    let mut h = RepoHarness::new();
    h.fork(&[("a.txt", "1\n")]);

    h.repo.checkout_branch("feature").unwrap();
    let tip = h.commit_files(&[("a.txt", "2\n"), ("b.txt", "new\n")], "ahead");
    h.repo.checkout_branch("master").unwrap();
    assert!(!h.exists("b.txt"));

    let outcome = h.repo.merge("feature").unwrap();
    assert_eq!(outcome, MergeOutcome::FastForwarded { commit: tip.clone() });
    assert_eq!(h.repo.current_branch().unwrap(), "master");
    assert_eq!(h.repo.head().unwrap(), tip);
    assert_eq!(h.read("a.txt"), "2\n");
    assert_eq!(h.read("b.txt"), "new\n");
}

#[test]
fn test_already_merged() {
    let mut h = RepoHarness::new();
    h.fork(&[("a.txt", "1\n")]);
    let tip = h.commit_files(&[("a.txt", "2\n")], "ahead on master");

    assert_eq!(h.repo.merge("feature").unwrap(), MergeOutcome::AlreadyMerged);
    assert_eq!(h.repo.head().unwrap(), tip);
    assert_eq!(h.read("a.txt"), "2\n");
}

#[test]
fn test_merge_preconditions() {
    let mut h = RepoHarness::new();
    h.fork(&[("a.txt", "1\n")]);

    assert!(matches!(h.repo.merge("nope"), Err(ArborError::BranchNotFound(_))));
    assert!(matches!(h.repo.merge("master"), Err(ArborError::MergeWithSelf(_))));

    h.write("a.txt", "staged\n");
    h.repo.add("a.txt").unwrap();
    assert!(matches!(h.repo.merge("feature"), Err(ArborError::UncommittedChanges)));
    h.repo.commit("stage it").unwrap();

    h.write("stray.txt", "untracked\n");
    assert!(matches!(
        h.repo.merge("feature"),
        Err(ArborError::UntrackedFileInTheWay(name)) if name == "stray.txt"
    ));
}

#[test]
fn test_merge_commits_directly() {
    let mut h = RepoHarness::new();
    h.fork(&[("a.txt", "1\n"), ("b.txt", "1\n")]);
    let head = h.commit_files(&[("a.txt", "2\n")], "master");
    h.repo.checkout_branch("feature").unwrap();
    let other = h.commit_files(&[("b.txt", "2\n")], "feature");
    h.repo.checkout_branch("master").unwrap();

    let worktree = FsWorkingDirectory::new(h.temp_dir.path().to_path_buf());
    let mut index = Index::new();
    let result = merge::merge_commits(h.repo.store(), &worktree, &mut index, &head, &other).unwrap();

    assert!(!result.had_conflict);
    assert_eq!(result.updated, vec!["b.txt"]);
    assert_eq!(index.staged_additions(), vec!["b.txt"]);
    assert_eq!(h.read("b.txt"), "2\n");
}

#[test]
fn test_merge_back_then_fast_forward() {
    let mut h = RepoHarness::new();
    h.fork(&[("a.txt", "0\n"), ("b.txt", "0\n")]);

    h.commit_files(&[("a.txt", "1\n")], "master 1");
    h.repo.checkout_branch("feature").unwrap();
    h.commit_files(&[("b.txt", "1\n")], "feature 1");

    // Merge each way so both branches hold a merge commit
    h.repo.merge("master").unwrap();
    h.repo.checkout_branch("master").unwrap();
    let outcome = h.repo.merge("feature").unwrap();
    assert!(matches!(outcome, MergeOutcome::FastForwarded { .. }));

    assert_eq!(h.read("a.txt"), "1\n");
    assert_eq!(h.read("b.txt"), "1\n");
    assert!(h.repo.verify().unwrap().is_valid());
}

#[test]
fn test_history_queries() -> anyhow::Result<()> {
    let mut h = RepoHarness::new();
    let first = h.commit_files(&[("a.txt", "1\n")], "same message");
    let second = h.commit_files(&[("a.txt", "2\n")], "same message");
    h.repo.create_branch("side")?;
    h.repo.checkout_branch("side")?;
    let side = h.commit_files(&[("a.txt", "3\n")], "side work");
    h.repo.checkout_branch("master")?;

    let log: Vec<_> = h.repo.log()?.into_iter().map(|(hash, _)| hash).collect();
    assert_eq!(log.len(), 3);
    assert_eq!(&log[..2], &[second.clone(), first.clone()]);

    let global: Vec<_> = h.repo.global_log()?.into_iter().map(|(hash, _)| hash).collect();
    assert_eq!(global.len(), 4);
    assert!(global.contains(&side));

    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(h.repo.find("same message")?, expected);
    assert!(h.repo.find("no such message")?.is_empty());

    info!("history queries covered {} commits", global.len());
    Ok(())
}

#[test]
fn test_state_survives_reopen() {
    let mut h = RepoHarness::new();
    h.commit_files(&[("a.txt", "1\n")], "one");
    h.write("b.txt", "staged\n");
    h.repo.add("b.txt").unwrap();
    let head = h.repo.head().unwrap();

    let root = h.temp_dir.path().to_path_buf();
    let reopened = Repository::open(root.clone(), root.join(DEFAULT_STORAGE_DIR)).unwrap();
    assert_eq!(reopened.head().unwrap(), head);
    assert_eq!(reopened.index().staged_additions(), vec!["b.txt"]);
    assert_eq!(reopened.config().compression_strategy, "fast");
}

#[test]
fn test_failed_merge_leaves_index_empty() {
    let mut h = RepoHarness::new();
    h.fork(&[("a.txt", "a1\n")]);
    h.commit_files(&[("m.txt", "master\n")], "master work");

    h.repo.checkout_branch("feature").unwrap();
    h.commit_files(&[("a.txt", "a2\n"), ("new.txt", "new\n")], "feature work");
    h.repo.checkout_branch("master").unwrap();

    // a.txt is staged before new.txt's blob turns out to be missing
    let missing = hash_data(b"new\n");
    fs::remove_file(h.repo.store().object_path(ObjectKind::Blob, &missing)).unwrap();

    let err = h.repo.merge("feature").unwrap_err();
    assert!(matches!(err, ArborError::NotFound { kind: ObjectKind::Blob, .. }));
    assert!(h.repo.index().is_empty());

    // A retry hits the same missing object rather than a stale index
    let err = h.repo.merge("feature").unwrap_err();
    assert!(matches!(err, ArborError::NotFound { .. }), "unexpected error: {}", err);
}
