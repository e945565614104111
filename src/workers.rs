//! Fork-join worker pool for parallel import compilation
//!
//! Every `@import` spawns one task that lexes and syntax-checks its file
//! while the importing file is still being scanned. Completions drain over
//! a channel at a single join point; there is no cancellation, and join
//! order never matters because each result is keyed by file path.

use crate::error::{CompileError, CompileErrorKind, Result};
use crate::importer::{resolve_import, FileHierarchy};
use crate::lexer::Lexer;
use crate::parser::{pre_parse, Parser};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

type WorkerMessage = std::result::Result<(PathBuf, Vec<crate::lexer::Token>), CompileError>;

struct PoolShared {
    sender: Sender<WorkerMessage>,
    root: PathBuf,
    // Files currently being lexed somewhere; guards against relexing the
    // same template twice concurrently.
    in_flight: Mutex<HashSet<PathBuf>>,
    spawned: AtomicUsize,
}

pub struct ImportWorkerPool {
    shared: Arc<PoolShared>,
    receiver: Receiver<WorkerMessage>,
}

impl ImportWorkerPool {
    pub fn new(root: PathBuf) -> Self {
        let (sender, receiver) = channel();
        Self {
            shared: Arc::new(PoolShared {
                sender,
                root,
                in_flight: Mutex::new(HashSet::new()),
                spawned: AtomicUsize::new(0),
            }),
            receiver,
        }
    }

    /// Schedule one resolved import. The circularity check runs against the
    /// scheduling branch's own hierarchy before the dedup check, so a
    /// direct-line cycle always errors even when the file is already being
    /// lexed elsewhere.
    pub fn schedule(&self, resolved: PathBuf, hierarchy: FileHierarchy, line: usize) -> Result<()> {
        schedule_on(&self.shared, resolved, hierarchy, line)
    }

    /// Block until every outstanding worker has completed, then hand back
    /// the lexed token streams keyed by canonical path. The first worker
    /// failure is surfaced only here.
    pub fn join(self) -> Result<HashMap<PathBuf, Vec<crate::lexer::Token>>> {
        let mut results = HashMap::new();
        let mut first_error: Option<CompileError> = None;
        let mut received = 0usize;

        while received < self.shared.spawned.load(Ordering::SeqCst) {
            // Senders outlive this loop via the worker threads, so a recv
            // failure means a worker panicked; treat its file as missing.
            let message = match self.receiver.recv() {
                Ok(message) => message,
                Err(_) => {
                    return Err(CompileError::new(
                        CompileErrorKind::MissingImportFile,
                        self.shared.root.clone(),
                        0,
                    ))
                }
            };
            received += 1;
            match message {
                Ok((path, tokens)) => {
                    results.insert(path, tokens);
                }
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(results),
        }
    }
}

fn schedule_on(
    shared: &Arc<PoolShared>,
    resolved: PathBuf,
    mut hierarchy: FileHierarchy,
    line: usize,
) -> Result<()> {
    hierarchy.push(resolved.clone(), line)?;

    {
        let mut in_flight = shared.in_flight.lock().expect("import registry poisoned");
        if !in_flight.insert(resolved.clone()) {
            // Already being lexed on another branch; its result will be
            // keyed under the same path.
            return Ok(());
        }
    }

    shared.spawned.fetch_add(1, Ordering::SeqCst);
    let shared = Arc::clone(shared);
    thread::spawn(move || {
        let message = run_worker(&shared, &resolved, hierarchy, line)
            .map(|tokens| (resolved.clone(), tokens));
        shared
            .in_flight
            .lock()
            .expect("import registry poisoned")
            .remove(&resolved);
        // The pool may already have been dropped after a join error.
        let _ = shared.sender.send(message);
    });

    Ok(())
}

/// Lex and syntax-check one imported file to completion. No tree is built
/// here; parsing happens once, after the join, on the spliced stream.
fn run_worker(
    shared: &Arc<PoolShared>,
    path: &PathBuf,
    hierarchy: FileHierarchy,
    line: usize,
) -> Result<Vec<crate::lexer::Token>> {
    let importing = hierarchy
        .current()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| path.clone());

    let source = fs::read_to_string(path).map_err(|_| {
        CompileError::new(CompileErrorKind::MissingImportFile, importing, line)
    })?;

    let file_name = path.display().to_string();
    let mut lexer = Lexer::new(&source, file_name.clone());
    let tokens = lexer
        .tokenize_with_imports(&mut |import_path, import_line| {
            let nested = resolve_import(import_path, &shared.root, path, import_line)?;
            schedule_on(shared, nested, hierarchy.clone(), import_line)
        })
        .map_err(|e| e.with_file(path.clone()))?;

    Parser::new(pre_parse(tokens.clone()), file_name).check()?;

    log::debug!("import worker finished: {}", path.display());
    Ok(tokens)
}
