//! The operator control surface (§10.6): a Unix-domain-socket,
//! newline-delimited-JSON server over `hound_core::control::{Request,
//! Response}`. Deliberately narrower than the out-of-scope HTTP/JSON
//! query API — status, reindex, shutdown, plus `Search` as a debug
//! convenience for the `hound` CLI.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hound_core::control::{MatchRecord, Request, Response};
use hound_core::{Error, Result};
use hound_searcher::{QueryEngine, SearchRequest, SearcherRegistry};

pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
    registry: Arc<SearcherRegistry>,
    result_limit: usize,
    shutdown: Arc<AtomicBool>,
}

impl ControlServer {
    pub fn bind(
        socket_path: &Path,
        registry: Arc<SearcherRegistry>,
        result_limit: usize,
        shutdown: Arc<AtomicBool>,
    ) -> Result<ControlServer> {
        if socket_path.exists() {
            if UnixStream::connect(socket_path).is_ok() {
                return Err(Error::Other(format!(
                    "houndd already running (socket live at {})",
                    socket_path.display()
                )));
            }
            let _ = std::fs::remove_file(socket_path);
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;

        Ok(ControlServer {
            listener,
            socket_path: socket_path.to_path_buf(),
            registry,
            result_limit,
            shutdown,
        })
    }

    /// Accepts connections until `shutdown` is observed true — set either
    /// by a `Shutdown` request handled on this same loop, or by the
    /// caller after a signal.
    pub fn run(&self) {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    let _ = stream.set_nonblocking(false);
                    self.handle_client(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(e) => {
                    tracing::error!(error = %e, "control socket accept failed");
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    fn handle_client(&self, mut stream: UnixStream) {
        let mut reader = BufReader::new(match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to clone control stream");
                return;
            }
        });
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {}
            Ok(_) => {
                let response = match Request::from_json(&line) {
                    Ok(request) => self.handle_request(request),
                    Err(e) => Response::Error {
                        message: format!("invalid request: {e}"),
                    },
                };
                self.send(&mut stream, &response);
            }
            Err(e) => tracing::error!(error = %e, "failed to read control request"),
        }
    }

    fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Status => Response::Status {
                build: hound_core::build_info::CURRENT.clone(),
                repos: self
                    .registry
                    .statuses()
                    .into_iter()
                    .map(|s| hound_core::control::RepoStatus {
                        name: s.name,
                        state: s.state.as_str().to_string(),
                        last_indexed_revision: s.last_indexed_revision,
                        last_error: s.last_error,
                    })
                    .collect(),
            },
            Request::Reindex { repo } => match self.registry.trigger_reindex(repo.as_deref()) {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error { message: e.to_string() },
            },
            Request::Shutdown => {
                tracing::info!("shutdown requested over control socket");
                self.shutdown.store(true, Ordering::SeqCst);
                Response::Ok
            }
            Request::Search {
                pattern,
                files,
                repos,
                ignore_case,
                limit,
                max_files_per_repo,
                context_lines,
                timeout_ms,
            } => {
                let engine = QueryEngine::new(&self.registry, self.result_limit);
                let limit = limit.map(|l| l.min(self.result_limit));
                let request = SearchRequest {
                    pattern,
                    files,
                    repos,
                    ignore_case,
                    limit,
                    max_files_per_repo,
                    context_lines,
                    timeout: timeout_ms.map(Duration::from_millis),
                    // The control socket is a single blocking request/response
                    // round trip with no live channel back to the caller, so
                    // there is nothing to cancel early over this transport.
                    cancel: None,
                };
                match engine.search(&request) {
                    Ok(response) => Response::SearchResults {
                        repos: response
                            .repos
                            .into_iter()
                            .map(|(repo, files)| {
                                let files = files
                                    .into_iter()
                                    .map(|(path, matches)| (path, matches.into_iter().map(to_record).collect()))
                                    .collect();
                                (repo, files)
                            })
                            .collect(),
                        errors: response.errors.into_iter().collect(),
                        truncated: response.truncated,
                    },
                    Err(e) => Response::Error { message: e.to_string() },
                }
            }
        }
    }

    fn send(&self, stream: &mut UnixStream, response: &Response) {
        let Ok(mut json) = response.to_json() else {
            tracing::error!("failed to serialize control response");
            return;
        };
        json.push('\n');
        if let Err(e) = stream.write_all(json.as_bytes()) {
            tracing::error!(error = %e, "failed to write control response");
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn to_record(m: hound_index::confirm::Match) -> MatchRecord {
    MatchRecord {
        line_number: m.line_number,
        byte_start: m.byte_start,
        byte_end: m.byte_end,
        line_text: m.line_text,
        before: m.before,
        after: m.after,
    }
}
