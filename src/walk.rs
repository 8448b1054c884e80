//! Path ingestion: resolve user-supplied paths into work items.
//!
//! Sources, in precedence order: the `-list` file, command-line paths, then
//! standard input (only when the first two supplied nothing). Every error
//! below run level is logged and skipped; the walk never aborts.
//!
//! Archives are expanded here, on the submitting thread, so member bytes
//! flow into the pool as ready work items; plain files are submitted by
//! name and the worker reads them.

use crate::archive::ArchiveReader;
use crate::classify::{archive_kind, is_compressed, is_subject, visible};
use crate::config::Config;
use crate::decompress::decompress;
use crate::pool::Pool;
use crate::scan::WorkItem;
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct Walker<'a> {
    cfg: &'a Config,
    pool: &'a mut Pool,
}

impl<'a> Walker<'a> {
    pub fn new(cfg: &'a Config, pool: &'a mut Pool) -> Self {
        Self { cfg, pool }
    }

    /// Feed the pool from every configured path source.
    pub fn run(&mut self) {
        let mut walked = false;

        if !self.cfg.list.is_empty() {
            debug!("processing files listed in {}", self.cfg.list);
            self.list(&self.cfg.list.clone());
            walked = true;
        }

        if !self.cfg.paths.is_empty() {
            debug!("processing files listed on the command line");
            for path in self.cfg.paths.clone() {
                self.file(&path);
            }
            walked = true;
        }

        if !walked {
            debug!("processing files listed on standard input");
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(name) if !name.is_empty() => self.file(&name),
                    Ok(_) => {}
                    Err(err) => {
                        debug!("reading standard input: {err}");
                        break;
                    }
                }
            }
        }
    }

    /// Expand a list-of-names file, one path per line. Lists do not nest.
    fn list(&mut self, name: &str) {
        let file = match fs::File::open(name) {
            Ok(file) => file,
            Err(err) => {
                debug!("{name}: {err}");
                return;
            }
        };
        for line in io::BufReader::new(file).lines() {
            match line {
                Ok(path) if !path.is_empty() => self.file(&path),
                Ok(_) => {}
                Err(err) => {
                    debug!("{name}: {err}");
                    return;
                }
            }
        }
    }

    /// Route one user-level path: archive, plain file, or directory.
    fn file(&mut self, name: &str) {
        if !visible(name, self.cfg.visible_only) {
            return;
        }
        let meta = match fs::symlink_metadata(name) {
            Ok(meta) => meta,
            Err(err) => {
                debug!("{name}: {err}");
                return;
            }
        };

        if meta.is_file() {
            if archive_kind(name).is_some() {
                self.archive(name);
            } else if is_subject(name, self.cfg.subject_only) {
                self.submit(name.to_string(), None);
            } else {
                debug!("skipping file with unrecognized extension: {name}");
            }
        } else if meta.is_dir() {
            if self.cfg.recursive {
                debug!("processing files in and under directory {name}");
                self.dir_recursive(name);
            } else {
                debug!("processing files in directory {name}");
                self.dir_flat(name);
            }
        }
    }

    /// Expand an archive's members into in-memory work items. Member
    /// display names keep the archive's original spelling:
    /// `pkg.tar.gz::a.go`.
    fn archive(&mut self, name: &str) {
        let data = if is_compressed(name) {
            match decompress(name, None) {
                Ok((_, bytes)) => Some(bytes),
                Err(err) => {
                    debug!("{name}: {err}");
                    return;
                }
            }
        } else {
            None
        };

        // The suffix survived `archive_kind` in the caller.
        let Some(kind) = archive_kind(name) else {
            return;
        };
        debug!("processing {:?} archive {name}", kind);

        let mut reader = match ArchiveReader::open(kind, name, data) {
            Ok(reader) => reader,
            Err(err) => {
                debug!("{name}: {err}");
                return;
            }
        };
        loop {
            match reader.next_member() {
                Ok(Some((member, bytes))) => {
                    let member_display = format!("{name}::{member}");
                    if !is_subject(&member, self.cfg.subject_only) {
                        debug!("skipping member with unrecognized extension: {member_display}");
                        continue;
                    }
                    self.submit(member_display, Some(bytes));
                }
                Ok(None) => break,
                Err(err) => {
                    debug!("{name}: {err}");
                    break;
                }
            }
        }
    }

    /// Immediate children only. A `.gitignore` in the directory is honored
    /// as a set of literal basenames, nothing more.
    fn dir_flat(&mut self, name: &str) {
        let dir = Path::new(name);
        let ignored: HashSet<String> = match fs::read_to_string(dir.join(".gitignore")) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => HashSet::new(),
        };

        let mut children = match read_dir_sorted(dir) {
            Ok(children) => children,
            Err(err) => {
                debug!("{name}: {err}");
                return;
            }
        };
        for child in children.drain(..) {
            let base = child
                .file_name()
                .map(|b| b.to_string_lossy().into_owned())
                .unwrap_or_default();
            if ignored.contains(&base) {
                debug!("skipping ignored file {}", child.display());
                continue;
            }
            let full = child.to_string_lossy().into_owned();
            if !visible(&full, self.cfg.visible_only)
                || !is_subject(&full, self.cfg.subject_only)
            {
                continue;
            }
            if child.is_file() {
                self.submit(full, None);
            }
        }
    }

    /// Depth-first walk with an explicit stack. Invisible directories are
    /// pruned whole; files pass the same filters as flat enumeration.
    fn dir_recursive(&mut self, name: &str) {
        let mut stack: Vec<PathBuf> = vec![PathBuf::from(name)];
        while let Some(path) = stack.pop() {
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    debug!("{}: {}", path.display(), err);
                    continue;
                }
            };
            let text = path.to_string_lossy();

            if meta.is_dir() {
                if !visible(&text, self.cfg.visible_only) {
                    debug!("skipping hidden directory {text}");
                    continue;
                }
                match read_dir_sorted(&path) {
                    Ok(mut children) => {
                        // Reverse so the stack pops in lexical order.
                        children.reverse();
                        stack.extend(children);
                    }
                    Err(err) => debug!("{text}: {err}"),
                }
            } else if meta.is_file()
                && visible(&text, self.cfg.visible_only)
                && is_subject(&text, self.cfg.subject_only)
            {
                self.submit(text.into_owned(), None);
            }
        }
    }

    fn submit(&mut self, name: String, source: Option<Vec<u8>>) {
        self.pool.submit(WorkItem { name, source });
    }
}

/// Directory children sorted by name, for deterministic submission order.
fn read_dir_sorted(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        match entry {
            Ok(entry) => children.push(entry.path()),
            Err(err) => debug!("{}: {}", dir.display(), err),
        }
    }
    children.sort();
    Ok(children)
}
