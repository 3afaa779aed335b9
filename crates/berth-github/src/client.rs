//! GitHub API client and the ref-resolution strategy chain.

use crate::error::{Error, Result};
use crate::ref_cache::{RefCache, RefEntry, RefKey};
use berth_cache::{Clock, SystemClock, TtlCache};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com/";

/// Environment variable to override the API base URL.
pub const API_ENV: &str = "BERTH_GITHUB_API";

/// Environment variable disabling the persistent ref cache. Any non-empty
/// value counts.
pub const DISABLE_CACHE_ENV: &str = "BERTH_DISABLE_GITHUB_CACHE";

/// Default lifetime for branch resolutions: 5 minutes.
pub const DEFAULT_BRANCH_TTL: Duration = Duration::from_secs(5 * 60);

/// Token environment variables, in priority order after the per-call token.
const TOKEN_ENVS: [&str; 3] = ["GITHUB_TOKEN", "GH_TOKEN", "BERTH_GITHUB_TOKEN"];

/// Options for a single resolution.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Read and write caches (default true). When false both the in-memory
    /// and the persistent tier are bypassed entirely.
    pub cache: bool,
    /// Lifetime for branch resolutions in the in-memory tier (default
    /// [`DEFAULT_BRANCH_TTL`]). The persistent tier uses its own configured
    /// TTL.
    pub ttl: Option<Duration>,
    /// Explicit token, taking priority over the token env vars.
    pub token: Option<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            cache: true,
            ttl: None,
            token: None,
        }
    }
}

/// How a ref was resolved. Tags and commits are immutable; branches move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Tag,
    Branch,
    Commit,
}

#[derive(Debug)]
struct Resolved {
    sha: String,
    kind: RefKind,
}

/// GitHub API client with cached ref resolution.
#[derive(Debug)]
pub struct GitHubClient {
    base_url: Url,
    http: Client,
    refs: Arc<RefCache>,
    persistent: Option<TtlCache>,
    branch_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl GitHubClient {
    /// Create a client for the given API base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Url {
            url: base_url.to_string(),
            detail: e.to_string(),
        })?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("berth/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            http,
            refs: Arc::new(RefCache::new()),
            persistent: None,
            branch_ttl: DEFAULT_BRANCH_TTL,
            clock: Arc::new(SystemClock),
        })
    }

    /// Create a client using the API URL from [`API_ENV`] or the default.
    ///
    /// # Errors
    /// Returns an error if the client cannot be created.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(API_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(&url)
    }

    /// Share an existing in-memory ref cache.
    #[must_use]
    pub fn with_ref_cache(mut self, refs: Arc<RefCache>) -> Self {
        self.refs = refs;
        self
    }

    /// Attach a persistent tier, typically a [`TtlCache`] with its own
    /// `github-ref` prefix. [`DISABLE_CACHE_ENV`] turns the tier off at
    /// runtime without removing it.
    #[must_use]
    pub fn with_persistent_cache(mut self, cache: TtlCache) -> Self {
        self.persistent = Some(cache);
        self
    }

    /// Set the default branch-resolution lifetime.
    #[must_use]
    pub fn with_branch_ttl(mut self, ttl: Duration) -> Self {
        self.branch_ttl = ttl;
        self
    }

    /// Replace the time source (default [`SystemClock`]).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The in-memory ref cache.
    #[must_use]
    pub fn ref_cache(&self) -> &RefCache {
        &self.refs
    }

    /// Resolve `gitref` in `owner/repo` to a commit SHA.
    ///
    /// Strategies run in order: tag (with annotated-tag dereference), branch
    /// head, literal commit. A strategy 404 moves to the next strategy; any
    /// other failure aborts the chain. When everything misses the result is
    /// [`Error::RefNotResolved`].
    ///
    /// With `options.cache` (the default), hits are served from the
    /// in-memory tier, then the persistent tier; successful resolutions
    /// populate both. Branch resolutions expire after `options.ttl` (or the
    /// client's branch TTL); tag and commit resolutions are kept without
    /// expiry.
    ///
    /// # Errors
    /// Returns transport errors, rate-limit errors, non-404 API errors,
    /// cache errors, and `Error::RefNotResolved` when no strategy matches.
    pub async fn resolve_ref_to_sha(
        &self,
        owner: &str,
        repo: &str,
        gitref: &str,
        options: &ResolveOptions,
    ) -> Result<String> {
        let key = RefKey::new(owner, repo, gitref);
        let now = self.clock.now_ms();
        let ttl = options.ttl.unwrap_or(self.branch_ttl);

        if options.cache {
            if let Some(sha) = self.refs.get(&key, now) {
                debug!(owner, repo, gitref, "ref cache hit");
                return Ok(sha);
            }

            if let Some(cache) = self.persistent_tier() {
                if let Some(value) = cache.get(&persistent_key(owner, repo, gitref))? {
                    if let Some(sha) = value.as_str() {
                        debug!(owner, repo, gitref, "persistent ref cache hit");
                        // Warm the in-memory tier; the persistent record
                        // does not say whether the ref was a branch, so the
                        // entry gets the conservative branch lifetime.
                        self.refs.set(
                            key,
                            RefEntry {
                                sha: sha.to_string(),
                                expires_at_ms: Some(
                                    now.saturating_add(ttl.as_millis() as u64),
                                ),
                            },
                        );
                        return Ok(sha.to_string());
                    }
                }
            }
        }

        let token = resolve_token(options.token.as_deref());
        let resolved = self
            .resolve_uncached(owner, repo, gitref, token.as_deref())
            .await?;

        if options.cache {
            let expires_at_ms = match resolved.kind {
                RefKind::Branch => Some(now.saturating_add(ttl.as_millis() as u64)),
                RefKind::Tag | RefKind::Commit => None,
            };
            self.refs.set(
                key,
                RefEntry {
                    sha: resolved.sha.clone(),
                    expires_at_ms,
                },
            );

            if let Some(cache) = self.persistent_tier() {
                cache.set(
                    &persistent_key(owner, repo, gitref),
                    Value::String(resolved.sha.clone()),
                )?;
            }
        }

        Ok(resolved.sha)
    }

    async fn resolve_uncached(
        &self,
        owner: &str,
        repo: &str,
        gitref: &str,
        token: Option<&str>,
    ) -> Result<Resolved> {
        if let Some(sha) = self.resolve_tag(owner, repo, gitref, token).await? {
            return Ok(Resolved {
                sha,
                kind: RefKind::Tag,
            });
        }
        debug!(owner, repo, gitref, "not a tag, trying branch");

        if let Some(sha) = self.resolve_branch(owner, repo, gitref, token).await? {
            return Ok(Resolved {
                sha,
                kind: RefKind::Branch,
            });
        }
        debug!(owner, repo, gitref, "not a branch, trying commit");

        if let Some(sha) = self.resolve_commit(owner, repo, gitref, token).await? {
            return Ok(Resolved {
                sha,
                kind: RefKind::Commit,
            });
        }

        debug!(owner, repo, gitref, "ref did not resolve");
        Err(Error::ref_not_resolved(owner, repo, gitref))
    }

    async fn resolve_tag(
        &self,
        owner: &str,
        repo: &str,
        gitref: &str,
        token: Option<&str>,
    ) -> Result<Option<String>> {
        let path = format!("repos/{owner}/{repo}/git/ref/tags/{gitref}");
        let Some(body) = self.get_json(&path, token).await? else {
            return Ok(None);
        };

        let object_type = body.pointer("/object/type").and_then(Value::as_str);
        let sha = body.pointer("/object/sha").and_then(Value::as_str);

        match (object_type, sha) {
            (Some("commit"), Some(sha)) => Ok(Some(sha.to_string())),
            (Some("tag"), Some(tag_sha)) => {
                // Annotated tag: the ref points at a tag object, which in
                // turn points at the commit.
                self.deref_annotated_tag(owner, repo, tag_sha, token).await
            }
            _ => Ok(None),
        }
    }

    async fn deref_annotated_tag(
        &self,
        owner: &str,
        repo: &str,
        tag_sha: &str,
        token: Option<&str>,
    ) -> Result<Option<String>> {
        let path = format!("repos/{owner}/{repo}/git/tags/{tag_sha}");
        let Some(body) = self.get_json(&path, token).await? else {
            return Ok(None);
        };
        Ok(body
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    async fn resolve_branch(
        &self,
        owner: &str,
        repo: &str,
        gitref: &str,
        token: Option<&str>,
    ) -> Result<Option<String>> {
        let path = format!("repos/{owner}/{repo}/git/ref/heads/{gitref}");
        let Some(body) = self.get_json(&path, token).await? else {
            return Ok(None);
        };
        Ok(body
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    async fn resolve_commit(
        &self,
        owner: &str,
        repo: &str,
        gitref: &str,
        token: Option<&str>,
    ) -> Result<Option<String>> {
        let path = format!("repos/{owner}/{repo}/commits/{gitref}");
        let Some(body) = self.get_json(&path, token).await? else {
            return Ok(None);
        };
        Ok(body
            .get("sha")
            .and_then(Value::as_str)
            .map(ToString::to_string))
    }

    /// GET an API path as JSON. A 404 is `Ok(None)`; a 403/429 with
    /// `x-ratelimit-remaining: 0` is [`Error::RateLimited`]; any other
    /// non-success status is [`Error::Api`].
    async fn get_json(&self, path: &str, token: Option<&str>) -> Result<Option<Value>> {
        let url = self.base_url.join(path).map_err(|e| Error::Url {
            url: format!("{}{path}", self.base_url),
            detail: e.to_string(),
        })?;

        let mut request = self
            .http
            .get(url.as_str())
            .header(ACCEPT, "application/vnd.github.v3+json");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let remaining = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok());
            if remaining == Some("0") {
                let reset = response
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(Error::RateLimited { reset });
            }
        }

        if !status.is_success() {
            return Err(Error::api(status));
        }

        Ok(Some(response.json().await?))
    }

    fn persistent_tier(&self) -> Option<&TtlCache> {
        if persistent_cache_disabled() {
            return None;
        }
        self.persistent.as_ref()
    }
}

/// Whether [`DISABLE_CACHE_ENV`] is set to a non-empty value.
#[must_use]
pub fn persistent_cache_disabled() -> bool {
    std::env::var_os(DISABLE_CACHE_ENV).is_some_and(|v| !v.is_empty())
}

/// Resolve the token to send: the explicit one first, then the env vars in
/// [`TOKEN_ENVS`] order. Empty values are skipped. No token means
/// unauthenticated requests.
fn resolve_token(explicit: Option<&str>) -> Option<String> {
    if let Some(token) = explicit {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    for env in TOKEN_ENVS {
        if let Ok(value) = std::env::var(env) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

fn persistent_key(owner: &str, repo: &str, gitref: &str) -> String {
    format!("{owner}/{repo}#{gitref}")
}
