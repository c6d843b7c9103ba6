use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hound_core::{Error, Result};
use hound_index::{candidates, confirm, file_table::FileId, query_lower};
use rayon::prelude::*;

use crate::registry::SearcherRegistry;

/// One cross-repo search request (§4.5, §10.6's `Search`).
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub pattern: String,
    /// Restricts matches to files whose path matches this regex, if set
    /// (§4.5: "`files` (optional regex over path)").
    pub files: Option<String>,
    /// Restricts the search to these repos; `None` means every repo the
    /// registry knows about.
    pub repos: Option<Vec<String>>,
    pub ignore_case: bool,
    /// Caps the total number of matches returned across all repos; `None`
    /// falls back to the server's configured `result_limit` (§5).
    pub limit: Option<usize>,
    /// Caps the number of distinct matching files reported per repo;
    /// `None` means unbounded (§4.5 Input, §4.5 Bounding).
    pub max_files_per_repo: Option<usize>,
    pub context_lines: u32,
    /// Per-query deadline, relative to the moment `search` starts (§5):
    /// "Per-query deadline is enforced by the engine; on deadline, partial
    /// results are returned with a `truncated=true` flag." `None` means no
    /// deadline.
    pub timeout: Option<Duration>,
    /// Cooperative cancellation, honored between candidate confirmations
    /// (§5). `None` means the query cannot be canceled early.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SearchRequest {
    fn default() -> SearchRequest {
        SearchRequest {
            pattern: String::new(),
            files: None,
            repos: None,
            ignore_case: false,
            limit: None,
            max_files_per_repo: None,
            context_lines: 0,
            timeout: None,
            cancel: None,
        }
    }
}

/// The aggregated result of a cross-repo search (§4.5, §5): matches are
/// grouped `repo -> file path -> matches`, ordered `(repo_name ASC,
/// file_path ASC)` by construction (`BTreeMap` iteration order), and
/// `truncated` tells the caller whether `limit`, `max_files_per_repo`, the
/// deadline, or cancellation cut the result short.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub repos: BTreeMap<String, BTreeMap<String, Vec<confirm::Match>>>,
    pub errors: BTreeMap<String, String>,
    pub truncated: bool,
}

/// Runs one query against every `Searcher` in a registry and assembles a
/// single deterministically-ordered response (§4.5). This is the only
/// component that knows about more than one repo at a time.
pub struct QueryEngine<'a> {
    registry: &'a SearcherRegistry,
    default_limit: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(registry: &'a SearcherRegistry, default_limit: usize) -> QueryEngine<'a> {
        QueryEngine { registry, default_limit }
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let regex = build_regex(&request.pattern, request.ignore_case)?;
        let query = query_lower::lower(&request.pattern, request.ignore_case)?;
        let files_regex = request
            .files
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
            .map_err(|e| Error::QueryInvalid(format!("files: {e}")))?;

        let repo_names: Vec<String> = match &request.repos {
            Some(names) => names.clone(),
            None => self.registry.names(),
        };

        let limit = request.limit.unwrap_or(self.default_limit);
        let deadline = request.timeout.map(|d| Instant::now() + d);

        // Each repo is searched independently and in parallel (§4.5); a
        // repo whose Searcher is not Ready reports its own error without
        // failing the whole request.
        let per_repo: Vec<(String, Result<(Vec<(String, FileId, Vec<confirm::Match>)>, bool)>)> = repo_names
            .par_iter()
            .map(|name| {
                let result = self.search_one_repo(
                    name,
                    &query,
                    &regex,
                    files_regex.as_ref(),
                    request.context_lines,
                    request.max_files_per_repo,
                    deadline,
                    request.cancel.as_deref(),
                );
                (name.clone(), result)
            })
            .collect();

        let mut repos: BTreeMap<String, BTreeMap<String, Vec<confirm::Match>>> = BTreeMap::new();
        let mut errors: BTreeMap<String, String> = BTreeMap::new();
        let mut ordered: Vec<(String, String, Vec<confirm::Match>)> = Vec::new();
        let mut truncated = false;

        for (name, result) in per_repo {
            match result {
                Ok((matches, repo_truncated)) => {
                    truncated |= repo_truncated;
                    for (path, _file_id, file_matches) in matches {
                        ordered.push((name.clone(), path, file_matches));
                    }
                }
                Err(e) => {
                    errors.insert(name, e.to_string());
                }
            }
        }

        // (repo_name ASC, file_path ASC): the per-repo results are already
        // path-sorted, so a stable sort by repo name alone preserves that.
        ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut remaining = limit;
        for (repo, path, file_matches) in ordered {
            if remaining == 0 {
                truncated = true;
                break;
            }
            let mut file_matches = file_matches;
            if file_matches.len() > remaining {
                file_matches.truncate(remaining);
                truncated = true;
            }
            remaining -= file_matches.len();
            repos.entry(repo).or_default().insert(path, file_matches);
        }

        Ok(SearchResponse { repos, errors, truncated })
    }

    #[allow(clippy::too_many_arguments)]
    fn search_one_repo(
        &self,
        name: &str,
        query: &query_lower::TrigramQuery,
        regex: &regex::bytes::Regex,
        files_regex: Option<&regex::Regex>,
        context_lines: u32,
        max_files_per_repo: Option<usize>,
        deadline: Option<Instant>,
        cancel: Option<&AtomicBool>,
    ) -> Result<(Vec<(String, FileId, Vec<confirm::Match>)>, bool)> {
        let searcher = self
            .registry
            .get(name)
            .ok_or_else(|| Error::Other(format!("unknown repo {name}")))?;
        let reader = searcher.current()?;

        let mut candidate_files: Vec<(String, FileId)> = match candidates::evaluate(query, &reader) {
            candidates::CandidateSet::All => reader
                .files()
                .iter()
                .map(|f| (f.path.clone(), f.id))
                .collect(),
            candidates::CandidateSet::Some(ids) => ids
                .into_iter()
                .filter_map(|id| reader.files().get(id as usize).map(|f| (f.path.clone(), FileId(id))))
                .collect(),
        };

        if let Some(files_regex) = files_regex {
            candidate_files.retain(|(path, _)| files_regex.is_match(path));
        }

        // Sort by path up front so truncation (done by the caller once all
        // repos are merged) yields alphabetical order rather than an order
        // that merely tracks FileId assignment (§5, §8).
        candidate_files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::new();
        let mut truncated = false;
        for (path, file_id) in candidate_files {
            if let Some(cap) = max_files_per_repo {
                if out.len() >= cap {
                    truncated = true;
                    break;
                }
            }
            // Cancellation and the deadline are both honored between
            // candidate confirmations, never mid-scan (§5).
            if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
                truncated = true;
                break;
            }
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                truncated = true;
                break;
            }

            let matches = confirm::confirm_file(&reader, file_id, regex, context_lines, None)?;
            if !matches.is_empty() {
                out.push((path, file_id, matches));
            }
        }
        Ok((out, truncated))
    }
}

fn build_regex(pattern: &str, ignore_case: bool) -> Result<regex::bytes::Regex> {
    regex::bytes::RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| Error::QueryInvalid(format!("{pattern}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearcherRegistry;
    use hound_vcs::LocalPathDriver;
    use std::collections::BTreeMap as Map;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn wait_for<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn spawn_registry(repos: &[(&str, &std::path::Path)]) -> SearcherRegistry {
        let dbpath = tempfile::tempdir().unwrap();
        // Leak so the registry's Searchers keep a valid dbpath for the
        // duration of the test; tempdir cleans up the rest of the process.
        let dbpath = Box::leak(Box::new(dbpath)).path().to_path_buf();

        let mut config = hound_core::Config::default();
        config.dbpath = dbpath;
        let mut drivers: Map<String, Arc<dyn hound_vcs::VcsDriver>> = Map::new();
        for (name, source) in repos {
            config.repos.insert(
                name.to_string(),
                hound_core::config::RepoConfig {
                    url: "local".to_string(),
                    display_name: None,
                    ms_between_poll: 10_000_000,
                    vcs: "local".to_string(),
                    url_pattern: Default::default(),
                    exclude_dot_files: false,
                    enable_poll_updates: true,
                    enable_push_updates: false,
                    auto_generated_files: Vec::new(),
                    max_file_bytes: 5 * 1024 * 1024,
                },
            );
            drivers.insert(name.to_string(), Arc::new(LocalPathDriver::new(*source)));
        }
        let registry = SearcherRegistry::spawn(&config, drivers).unwrap();
        for name in registry.names() {
            let searcher = registry.get(&name).unwrap();
            assert!(wait_for(Duration::from_secs(5), || {
                searcher.state() == crate::SearcherState::Ready
            }));
        }
        registry
    }

    #[test]
    fn finds_matches_across_two_repos_in_order() {
        let source_a = tempfile::tempdir().unwrap();
        std::fs::write(source_a.path().join("a.txt"), b"needle in a haystack").unwrap();
        let source_b = tempfile::tempdir().unwrap();
        std::fs::write(source_b.path().join("b.txt"), b"another needle here").unwrap();

        let registry = spawn_registry(&[("zzz-repo", source_a.path()), ("aaa-repo", source_b.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let response = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                ..Default::default()
            })
            .unwrap();

        let names: Vec<&String> = response.repos.keys().collect();
        assert_eq!(names, vec![&"aaa-repo".to_string(), &"zzz-repo".to_string()]);
        assert!(!response.truncated);
    }

    #[test]
    fn limit_truncates_and_sets_flag() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"x x x").unwrap();
        std::fs::write(source.path().join("b.txt"), b"x x x").unwrap();

        let registry = spawn_registry(&[("repo1", source.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let response = engine
            .search(&SearchRequest {
                pattern: "x".to_string(),
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();

        assert!(response.truncated);
        let total: usize = response
            .repos
            .values()
            .flat_map(|files| files.values())
            .map(|matches| matches.len())
            .sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn unready_repo_reports_error_without_failing_request() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"needle").unwrap();
        let registry = spawn_registry(&[("repo1", source.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let response = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                repos: Some(vec!["repo1".to_string(), "missing-repo".to_string()]),
                ..Default::default()
            })
            .unwrap();

        assert!(response.repos.contains_key("repo1"));
        assert!(response.errors.contains_key("missing-repo"));
    }

    #[test]
    fn files_regex_restricts_candidates() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.rs"), b"needle").unwrap();
        std::fs::write(source.path().join("a.txt"), b"needle").unwrap();

        let registry = spawn_registry(&[("repo1", source.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let response = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                files: Some(r"\.rs$".to_string()),
                ..Default::default()
            })
            .unwrap();

        let files = &response.repos["repo1"];
        assert_eq!(files.keys().collect::<Vec<_>>(), vec![&"a.rs".to_string()]);
    }

    #[test]
    fn files_regex_matches_path_segments_not_just_basename() {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("src")).unwrap();
        std::fs::write(source.path().join("src/a.rs"), b"needle").unwrap();
        std::fs::write(source.path().join("a.rs"), b"needle").unwrap();

        let registry = spawn_registry(&[("repo1", source.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let response = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                files: Some(r"^src/".to_string()),
                ..Default::default()
            })
            .unwrap();

        let files = &response.repos["repo1"];
        assert_eq!(files.keys().collect::<Vec<_>>(), vec![&"src/a.rs".to_string()]);
    }

    #[test]
    fn invalid_files_regex_is_query_invalid() {
        let registry = spawn_registry(&[]);
        let engine = QueryEngine::new(&registry, 5000);

        let err = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                files: Some("(unclosed".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::QueryInvalid(_)));
    }

    #[test]
    fn max_files_per_repo_caps_distinct_files_and_truncates() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"needle").unwrap();
        std::fs::write(source.path().join("b.txt"), b"needle").unwrap();
        std::fs::write(source.path().join("c.txt"), b"needle").unwrap();

        let registry = spawn_registry(&[("repo1", source.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let response = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                max_files_per_repo: Some(2),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(response.repos["repo1"].len(), 2);
        assert!(response.truncated);
    }

    #[test]
    fn expired_deadline_truncates_without_failing() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"needle").unwrap();

        let registry = spawn_registry(&[("repo1", source.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let response = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                // Already expired: the engine must not process any
                // candidate and must still report success with
                // `truncated = true` (§5).
                timeout: Some(Duration::from_secs(0)),
                ..Default::default()
            })
            .unwrap();

        assert!(response.truncated);
        assert!(response.repos.get("repo1").map(|f| f.is_empty()).unwrap_or(true));
    }

    #[test]
    fn canceled_token_truncates_without_failing() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"needle").unwrap();

        let registry = spawn_registry(&[("repo1", source.path())]);
        let engine = QueryEngine::new(&registry, 5000);

        let cancel = Arc::new(AtomicBool::new(true));
        let response = engine
            .search(&SearchRequest {
                pattern: "needle".to_string(),
                cancel: Some(cancel),
                ..Default::default()
            })
            .unwrap();

        assert!(response.truncated);
        assert!(response.repos.get("repo1").map(|f| f.is_empty()).unwrap_or(true));
    }
}
