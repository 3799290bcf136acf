//! Full mirror loop against a bare repository on disk: real git, real
//! filesystem notifications, `ls-remote` as the revision source.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use gitmirror_core::{
    CommitIdentity, Remote, RepositoryMirror, RevisionSourceKind, SyncSettings,
};
use gitmirror_daemon::Coordinator;
use gitmirror_git::{GitCli, LsRemote};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_AUTHOR_NAME", "Upstream")
        .env("GIT_AUTHOR_EMAIL", "upstream@example.com")
        .env("GIT_COMMITTER_NAME", "Upstream")
        .env("GIT_COMMITTER_EMAIL", "upstream@example.com")
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn upstream(root: &Path) -> PathBuf {
    let bare = root.join("upstream.git");
    std::fs::create_dir_all(&bare).expect("mkdir bare");
    git(&bare, &["init", "--bare"]);
    git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).expect("mkdir seed");
    git(&seed, &["init"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(seed.join("README.md"), "seed\n").expect("write");
    git(&seed, &["add", "-A"]);
    git(&seed, &["commit", "-m", "seed"]);
    git(&seed, &["remote", "add", "origin", bare.to_str().expect("utf8")]);
    git(&seed, &["push", "origin", "main"]);
    bare
}

fn upstream_revision(bare: &Path) -> String {
    git(bare, &["rev-parse", "refs/heads/main"]).trim().to_owned()
}

async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn local_and_remote_edits_flow_both_ways() {
    if !git_available() {
        return;
    }
    let root = TempDir::new().expect("tempdir");
    let bare = upstream(root.path());
    let seed_rev = upstream_revision(&bare);

    // An empty directory lets the watcher attach before the first clone lands.
    let local = root.path().join("mirror");
    std::fs::create_dir_all(&local).expect("mkdir mirror");

    let identity = CommitIdentity {
        name: "GitSync".to_owned(),
        email: "gitsync@local".to_owned(),
    };
    let settings = SyncSettings {
        identity: identity.clone(),
        commit_message: "GitSync: auto sync".to_owned(),
        pull_before_push: true,
        exclusive_sync: true,
        credential: None,
        revision_source: RevisionSourceKind::LsRemote,
        api_base_url: "https://api.github.com".to_owned(),
    };
    let mirror = RepositoryMirror {
        remote: Remote::parse(bare.to_str().expect("utf8")).expect("remote"),
        local_path: local.clone(),
        branch: "main".to_owned(),
        poll_interval: Duration::from_secs(1),
        debounce: Duration::from_secs(1),
    };

    let coordinator = Coordinator::start(
        &settings,
        &[mirror],
        Arc::new(GitCli::new().with_committer(identity)),
        Arc::new(LsRemote::new(None)),
    );

    assert!(
        wait_until(Duration::from_secs(30), || local.join("README.md").exists()).await,
        "initial clone never appeared"
    );
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Local edit travels upstream.
    std::fs::write(local.join("notes.txt"), "written locally\n").expect("write");
    assert!(
        wait_until(Duration::from_secs(30), || upstream_revision(&bare) != seed_rev).await,
        "local edit was never pushed"
    );
    let tree = git(&bare, &["ls-tree", "--name-only", "refs/heads/main"]);
    assert!(tree.lines().any(|name| name == "notes.txt"), "tree: {tree}");

    // Upstream edit travels down.
    let other = root.path().join("other");
    git(
        root.path(),
        &["clone", bare.to_str().expect("utf8"), other.to_str().expect("utf8")],
    );
    std::fs::write(other.join("from-upstream.txt"), "remote\n").expect("write");
    git(&other, &["add", "-A"]);
    git(&other, &["commit", "-m", "remote edit"]);
    git(&other, &["push", "origin", "main"]);

    assert!(
        wait_until(Duration::from_secs(30), || local
            .join("from-upstream.txt")
            .exists())
        .await,
        "upstream edit was never pulled"
    );

    coordinator.stop();
    tokio::time::timeout(Duration::from_secs(30), coordinator.join())
        .await
        .expect("tasks stop");
}
