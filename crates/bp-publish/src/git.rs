//! Git publisher driving the `git` CLI against a hosted or local remote

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bp_credentials::SecretToken;

use crate::adapter::{RepositoryPublisher, Result};
use crate::config::GitConfig;
use crate::error::PublishError;
use crate::task::{CommitRef, PublishTask, RepoSlug};
use crate::workdir::WorkDir;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// Config every git child runs with, regardless of the host's git setup.
/// Published bytes must land in the repository unchanged.
const PINNED_CONFIG: &[(&str, &str)] = &[
    ("core.autocrlf", "false"),
    ("core.safecrlf", "false"),
    ("core.attributesFile", NULL_DEVICE),
    ("commit.gpgsign", "false"),
];

/// Written to `.git/info/attributes`, which outranks any `.gitattributes`
/// in the target repository.
const RAW_ATTRIBUTES: &str = "* -text -ident -filter -working-tree-encoding\n";

/// Where target repositories live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteHost {
    /// `https://<host>/<owner>/<name>.git`, fetched and pushed as
    /// `https://<token>@<host>/<owner>/<name>.git`.
    Https { host: String },
    /// Bare repositories on disk at `<root>/<owner>/<name>.git`. The token is
    /// still required but not transmitted.
    Local { root: PathBuf },
}

impl RemoteHost {
    /// The `origin` URL recorded in the working clone. Never carries the token.
    fn remote_url(&self, slug: &RepoSlug) -> String {
        match self {
            RemoteHost::Https { host } => {
                format!("https://{}/{}/{}.git", host, slug.owner(), slug.name())
            }
            RemoteHost::Local { root } => root
                .join(slug.owner())
                .join(format!("{}.git", slug.name()))
                .display()
                .to_string(),
        }
    }

    /// A `url.<authenticated>.insteadOf` entry that makes git talk to the
    /// token-bearing URL. It reaches git through the environment only, so
    /// the token stays off command lines and out of `.git/config`.
    fn credential_rewrite(
        &self,
        slug: &RepoSlug,
        token: &SecretToken,
    ) -> Option<(String, String)> {
        match self {
            RemoteHost::Https { host } => Some((
                format!(
                    "url.https://{}@{}/{}/{}.git.insteadOf",
                    token.expose(),
                    host,
                    slug.owner(),
                    slug.name()
                ),
                self.remote_url(slug),
            )),
            RemoteHost::Local { .. } => None,
        }
    }
}

/// Author and committer identity for published commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Publisher that clones, commits and pushes with the `git` binary.
///
/// Each publish runs in its own [`WorkDir`]. Instead of `git clone` the
/// working tree is built with `init` + `ls-remote` + `fetch`, so that an
/// empty remote, a missing branch and an existing branch all go through one
/// path.
pub struct GitPublisher {
    remote: RemoteHost,
    identity: GitIdentity,
    /// Commit message; `{file}` and `{key}` are substituted.
    message_template: String,
    work_root: Option<PathBuf>,
    git_binary: PathBuf,
}

impl GitPublisher {
    pub fn new(remote: RemoteHost, identity: GitIdentity) -> Self {
        Self {
            remote,
            identity,
            message_template: crate::config::DEFAULT_COMMIT_MESSAGE.to_string(),
            work_root: None,
            git_binary: PathBuf::from("git"),
        }
    }

    pub fn from_config(config: &GitConfig) -> Self {
        Self::new(
            config.remote_host(),
            GitIdentity {
                name: config.author_name.clone(),
                email: config.author_email.clone(),
            },
        )
        .with_message_template(config.commit_message.clone())
        .with_work_root(config.work_root.clone())
    }

    pub fn with_message_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    pub fn with_work_root(mut self, work_root: Option<PathBuf>) -> Self {
        self.work_root = work_root;
        self
    }

    pub fn with_git_binary(mut self, git_binary: impl Into<PathBuf>) -> Self {
        self.git_binary = git_binary.into();
        self
    }

    fn commit_message(&self, task: &PublishTask) -> String {
        self.message_template
            .replace("{file}", task.target_file_name())
            .replace("{key}", &task.source_object_key)
    }
}

impl RepositoryPublisher for GitPublisher {
    fn publish(&self, task: &PublishTask, deadline: Instant) -> Result<CommitRef> {
        let workdir = WorkDir::acquire(self.work_root.as_deref())?;
        let mut config: Vec<(String, String)> = PINNED_CONFIG
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        config.extend(self.remote.credential_rewrite(&task.target_repo, &task.credential));
        let git = GitSession {
            binary: self.git_binary.as_path(),
            dir: workdir.path(),
            token: &task.credential,
            config: &config,
            deadline,
        };
        let branch_ref = format!("refs/heads/{}", task.target_branch);

        git.local(&["init", "-q"])?;
        write_raw_attributes(workdir.path())?;
        let url = self.remote.remote_url(&task.target_repo);
        git.local(&["remote", "add", "origin", &url])?;

        // Pick the base: the branch itself, else the remote default, else
        // nothing (empty repository, branch starts unborn).
        let listing = git.remote(Stage::Clone, &["ls-remote", "origin"])?;
        let refs = parse_ls_remote(&listing);
        let branch_exists = refs.iter().any(|r| r == &branch_ref);
        let base = if branch_exists {
            Some(branch_ref.as_str())
        } else if refs.iter().any(|r| r == "HEAD") {
            Some("HEAD")
        } else {
            None
        };

        match base {
            Some(refname) => {
                tracing::debug!(base = refname, "fetching base");
                git.remote(Stage::Clone, &["fetch", "-q", "origin", refname])?;
                git.local(&["checkout", "-q", "-B", &task.target_branch, "FETCH_HEAD"])?;
            }
            None => {
                tracing::debug!("remote is empty; starting branch from scratch");
                git.local(&["symbolic-ref", "HEAD", &branch_ref])?;
            }
        }

        workdir.write_file(&task.target_path, &task.source_bytes)?;
        git.local(&["add", "--", &task.target_path])?;

        // `diff --cached --quiet` exits 0 when the index matches HEAD.
        let diff = git.run(&["diff", "--cached", "--quiet"])?;
        if diff.status.success() {
            let head = git.local(&["rev-parse", "HEAD"])?;
            if branch_exists {
                tracing::info!(commit = %head, "content unchanged; skipping commit");
                return Ok(CommitRef {
                    commit_id: head,
                    branch: task.target_branch.clone(),
                    created: false,
                    content_sha256: task.content_sha256(),
                });
            }

            // The new branch's base already holds these bytes; the branch
            // itself still has to be created on the remote.
            let refspec = format!("HEAD:{}", branch_ref);
            git.remote(Stage::Push, &["push", "--porcelain", "origin", &refspec])?;
            tracing::info!(
                commit = %head,
                branch = %task.target_branch,
                "created branch at existing head"
            );
            return Ok(CommitRef {
                commit_id: head,
                branch: task.target_branch.clone(),
                created: true,
                content_sha256: task.content_sha256(),
            });
        }
        if diff.status.code() != Some(1) {
            return Err(git.local_failure(&["diff", "--cached", "--quiet"], &diff));
        }

        let message = self.commit_message(task);
        let user_name = format!("user.name={}", self.identity.name);
        let user_email = format!("user.email={}", self.identity.email);
        git.local(&[
            "-c",
            &user_name,
            "-c",
            &user_email,
            "commit",
            "-q",
            "--no-verify",
            "-m",
            &message,
        ])?;
        let commit_id = git.local(&["rev-parse", "HEAD"])?;

        let refspec = format!("HEAD:{}", branch_ref);
        git.remote(Stage::Push, &["push", "--porcelain", "origin", &refspec])?;

        tracing::info!(commit = %commit_id, branch = %task.target_branch, "pushed commit");

        if let Err(e) = workdir.close() {
            tracing::warn!(error = %e, "failed to remove working directory");
        }

        Ok(CommitRef {
            commit_id,
            branch: task.target_branch.clone(),
            created: true,
            content_sha256: task.content_sha256(),
        })
    }

    fn name(&self) -> &str {
        "git"
    }
}

/// Which part of the sequence a remote command belongs to; only pushes can
/// be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Clone,
    Push,
}

struct GitOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Git commands for one publish: one working directory, one token to scrub,
/// one deadline.
struct GitSession<'a> {
    binary: &'a Path,
    dir: &'a Path,
    token: &'a SecretToken,
    /// Passed as `GIT_CONFIG_KEY_<n>`/`GIT_CONFIG_VALUE_<n>` pairs.
    config: &'a [(String, String)],
    deadline: Instant,
}

impl GitSession<'_> {
    /// Run a command that only touches the local repository.
    fn local(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(self.local_failure(args, &output));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Run a command that talks to the remote; failures are classified.
    fn remote(&self, stage: Stage, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            let combined = format!("{}\n{}", output.stderr, output.stdout);
            let detail = format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                self.token.redact(combined.trim())
            );
            return Err(classify_remote_failure(stage, &combined, detail));
        }
        Ok(output.stdout)
    }

    fn local_failure(&self, args: &[&str], output: &GitOutput) -> PublishError {
        let message = format!(
            "git {} failed: {}",
            args.iter()
                .find(|a| !a.starts_with('-') && !a.contains('='))
                .copied()
                .unwrap_or_default(),
            self.token.redact(output.stderr.trim())
        );
        PublishError::LocalIO {
            path: self.dir.to_path_buf(),
            source: std::io::Error::other(message),
        }
    }

    /// Build a git invocation isolated from the host's git configuration.
    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(self.binary);
        command
            .args(args)
            .current_dir(self.dir)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", NULL_DEVICE)
            .env("GIT_CONFIG_COUNT", self.config.len().to_string())
            .env("LC_ALL", "C");
        for (index, (key, value)) in self.config.iter().enumerate() {
            command
                .env(format!("GIT_CONFIG_KEY_{}", index), key)
                .env(format!("GIT_CONFIG_VALUE_{}", index), value);
        }
        command
    }

    /// Spawn git and wait for it, killing it if the deadline passes.
    fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let command_name = args
            .iter()
            .find(|a| !a.starts_with('-') && !a.contains('='))
            .copied()
            .unwrap_or("git");

        if Instant::now() >= self.deadline {
            return Err(PublishError::Unreachable(format!(
                "deadline passed before git {}",
                command_name
            )));
        }

        let mut child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PublishError::LocalIO {
                path: self.binary.to_path_buf(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty child can't
        // block on a full pipe while we poll.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= self.deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(command = command_name, "git timed out; killed");
                    return Err(PublishError::Unreachable(format!(
                        "git {} timed out",
                        command_name
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(PublishError::LocalIO {
                        path: self.dir.to_path_buf(),
                        source,
                    })
                }
            }
        };

        Ok(GitOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout.join().unwrap_or_default()).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned(),
        })
    }
}

fn write_raw_attributes(dir: &Path) -> Result<()> {
    let info = dir.join(".git").join("info");
    fs::create_dir_all(&info).map_err(|source| PublishError::LocalIO {
        path: info.clone(),
        source,
    })?;
    let path = info.join("attributes");
    fs::write(&path, RAW_ATTRIBUTES).map_err(|source| PublishError::LocalIO { path, source })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Ref names from `git ls-remote` output (`<sha>\t<ref>` per line).
fn parse_ls_remote(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(_, refname)| refname.trim().to_string())
        .collect()
}

const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "could not read username",
    "could not read password",
    "invalid username or password",
    "bad credentials",
    "the requested url returned error: 401",
    "the requested url returned error: 403",
    "permission denied (publickey)",
];

const REJECT_MARKERS: &[&str] = &[
    "[rejected]",
    "[remote rejected]",
    "non-fast-forward",
    "fetch first",
    "protected branch",
    "pre-receive hook declined",
];

/// Map a failed remote command onto the publish error taxonomy.
fn classify_remote_failure(stage: Stage, output: &str, detail: String) -> PublishError {
    let lowered = output.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        return PublishError::Unauthorized(detail);
    }
    if stage == Stage::Push && REJECT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return PublishError::PushRejected(detail);
    }
    PublishError::Unreachable(detail)
}
