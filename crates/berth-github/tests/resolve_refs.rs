//! Integration tests for ref resolution against a mock GitHub API.
//!
//! These tests spin up an axum server per scenario to avoid network calls,
//! counting requests to verify which strategies and cache tiers ran.

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use berth_cache::{FixedClock, TtlCache};
use berth_github::{Error, GitHubClient, ResolveOptions, DEFAULT_BRANCH_TTL, DISABLE_CACHE_ENV};
use berth_store::ContentStore;
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::tempdir;

const COMMIT_SHA: &str = "1111111111111111111111111111111111111111";
const TAG_OBJECT_SHA: &str = "2222222222222222222222222222222222222222";
const BRANCH_SHA: &str = "3333333333333333333333333333333333333333";

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

/// Bind the router on an OS-assigned port and return the base URL.
async fn serve(router: Router) -> String {
    init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn tag_ref_body(object_type: &str, sha: &str) -> Value {
    json!({
        "ref": "refs/tags/v1.0.0",
        "object": { "type": object_type, "sha": sha }
    })
}

fn branch_ref_body(sha: &str) -> Value {
    json!({
        "ref": "refs/heads/main",
        "object": { "type": "commit", "sha": sha }
    })
}

/// Router where the tag ref endpoint answers with a lightweight tag.
fn commit_tag_router(hits: &Arc<AtomicUsize>) -> Router {
    let h = hits.clone();
    Router::new().route(
        "/repos/:owner/:repo/git/ref/tags/:gitref",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Json(tag_ref_body("commit", COMMIT_SHA))
            }
        }),
    )
}

/// Router where tags 404 and the branch head answers.
fn branch_router(hits: &Arc<AtomicUsize>) -> Router {
    let tag_hits = hits.clone();
    let head_hits = hits.clone();
    Router::new()
        .route(
            "/repos/:owner/:repo/git/ref/tags/:gitref",
            get(move || {
                let h = tag_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND
                }
            }),
        )
        .route(
            "/repos/:owner/:repo/git/ref/heads/:gitref",
            get(move || {
                let h = head_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Json(branch_ref_body(BRANCH_SHA))
                }
            }),
        )
}

#[tokio::test]
async fn test_commit_tag_resolves_in_one_call() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(commit_tag_router(&hits)).await;

    let client = GitHubClient::new(&base).unwrap();
    let sha = client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(sha, COMMIT_SHA);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_annotated_tag_dereferences_to_commit() {
    let hits = Arc::new(AtomicUsize::new(0));
    let ref_hits = hits.clone();
    let obj_hits = hits.clone();
    let router = Router::new()
        .route(
            "/repos/:owner/:repo/git/ref/tags/:gitref",
            get(move || {
                let h = ref_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Json(tag_ref_body("tag", TAG_OBJECT_SHA))
                }
            }),
        )
        .route(
            "/repos/:owner/:repo/git/tags/:sha",
            get(move || {
                let h = obj_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "sha": TAG_OBJECT_SHA,
                        "object": { "type": "commit", "sha": COMMIT_SHA }
                    }))
                }
            }),
        );
    let base = serve(router).await;

    let client = GitHubClient::new(&base).unwrap();
    let sha = client
        .resolve_ref_to_sha("acme", "widgets", "v2.0.0", &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(sha, COMMIT_SHA);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_branch_after_tag_miss() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(branch_router(&hits)).await;

    let client = GitHubClient::new(&base).unwrap();
    let sha = client
        .resolve_ref_to_sha("acme", "widgets", "main", &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(sha, BRANCH_SHA);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_literal_commit_sha_resolves() {
    let hits = Arc::new(AtomicUsize::new(0));
    let tag_hits = hits.clone();
    let head_hits = hits.clone();
    let commit_hits = hits.clone();
    let router = Router::new()
        .route(
            "/repos/:owner/:repo/git/ref/tags/:gitref",
            get(move || {
                let h = tag_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND
                }
            }),
        )
        .route(
            "/repos/:owner/:repo/git/ref/heads/:gitref",
            get(move || {
                let h = head_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND
                }
            }),
        )
        .route(
            "/repos/:owner/:repo/commits/:gitref",
            get(move || {
                let h = commit_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "sha": COMMIT_SHA }))
                }
            }),
        );
    let base = serve(router).await;

    let client = GitHubClient::new(&base).unwrap();
    let sha = client
        .resolve_ref_to_sha("acme", "widgets", COMMIT_SHA, &ResolveOptions::default())
        .await
        .unwrap();

    // A literal SHA resolves to itself
    assert_eq!(sha, COMMIT_SHA);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unresolvable_ref_errors() {
    // No routes at all: every strategy sees a 404
    let base = serve(Router::new()).await;

    let client = GitHubClient::new(&base).unwrap();
    let err = client
        .resolve_ref_to_sha("acme", "widgets", "nope", &ResolveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RefNotResolved { .. }));
    assert_eq!(err.to_string(), "failed to resolve ref nope for acme/widgets");
    // Nothing gets cached for a failed resolution
    assert_eq!(client.ref_cache().len(), 0);
}

#[tokio::test]
async fn test_rate_limit_surfaces_reset() {
    let router = Router::new().route(
        "/repos/:owner/:repo/git/ref/tags/:gitref",
        get(|| async {
            (
                StatusCode::FORBIDDEN,
                [
                    ("x-ratelimit-remaining", "0"),
                    ("x-ratelimit-reset", "1700000000"),
                ],
                "API rate limit exceeded",
            )
        }),
    );
    let base = serve(router).await;

    let client = GitHubClient::new(&base).unwrap();
    let err = client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("rate limit exceeded"));
    assert!(matches!(
        err,
        Error::RateLimited {
            reset: Some(1_700_000_000)
        }
    ));
}

#[tokio::test]
async fn test_rate_limit_429_without_reset_header() {
    let router = Router::new().route(
        "/repos/:owner/:repo/git/ref/tags/:gitref",
        get(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("x-ratelimit-remaining", "0")],
                "slow down",
            )
        }),
    );
    let base = serve(router).await;

    let client = GitHubClient::new(&base).unwrap();
    let err = client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RateLimited { reset: None }));
    assert_eq!(err.to_string(), "GitHub API rate limit exceeded");
}

#[tokio::test]
async fn test_plain_403_aborts_chain_as_api_error() {
    let hits = Arc::new(AtomicUsize::new(0));
    let head_hits = hits.clone();
    let router = Router::new()
        .route(
            "/repos/:owner/:repo/git/ref/tags/:gitref",
            get(|| async { (StatusCode::FORBIDDEN, "forbidden") }),
        )
        .route(
            "/repos/:owner/:repo/git/ref/heads/:gitref",
            get(move || {
                let h = head_hits.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Json(branch_ref_body(BRANCH_SHA))
                }
            }),
        );
    let base = serve(router).await;

    let client = GitHubClient::new(&base).unwrap();
    let err = client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap_err();

    // A 403 without the exhausted rate-limit header is a plain API error,
    // and the later strategies never run
    assert!(matches!(err, Error::Api { status: 403, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_memory_cache_serves_second_resolve() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(commit_tag_router(&hits)).await;

    let client = GitHubClient::new(&base).unwrap();
    for _ in 0..3 {
        let sha = client
            .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(sha, COMMIT_SHA);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(client.ref_cache().len(), 1);
}

#[tokio::test]
async fn test_cache_false_bypasses_reads_and_writes() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(commit_tag_router(&hits)).await;

    let client = GitHubClient::new(&base).unwrap();
    let no_cache = ResolveOptions {
        cache: false,
        ..ResolveOptions::default()
    };

    client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &no_cache)
        .await
        .unwrap();
    client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &no_cache)
        .await
        .unwrap();

    // Every uncached resolve hit the network, and nothing was stored
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(client.ref_cache().len(), 0);

    // A cached resolve now has to fetch once more, then sticks
    client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();
    client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(client.ref_cache().len(), 1);
}

#[tokio::test]
async fn test_branch_entry_expires() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(branch_router(&hits)).await;

    let clock = Arc::new(FixedClock::at(1_000));
    let client = GitHubClient::new(&base).unwrap().with_clock(clock.clone());

    client
        .resolve_ref_to_sha("acme", "widgets", "main", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // Within the TTL the cached entry answers
    client
        .resolve_ref_to_sha("acme", "widgets", "main", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // Past the TTL the branch is re-resolved
    clock.advance(DEFAULT_BRANCH_TTL.as_millis() as u64 + 1);
    client
        .resolve_ref_to_sha("acme", "widgets", "main", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_tag_entry_never_expires() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(commit_tag_router(&hits)).await;

    let clock = Arc::new(FixedClock::at(1_000));
    let client = GitHubClient::new(&base).unwrap().with_clock(clock.clone());

    client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();

    // Years later the tag resolution is still served from memory
    clock.advance(1_000 * 60 * 60 * 24 * 365);
    let sha = client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(sha, COMMIT_SHA);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ttl_override_applies_to_branches() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(branch_router(&hits)).await;

    let clock = Arc::new(FixedClock::at(1_000));
    let client = GitHubClient::new(&base).unwrap().with_clock(clock.clone());
    let options = ResolveOptions {
        ttl: Some(Duration::from_millis(1_000)),
        ..ResolveOptions::default()
    };

    client
        .resolve_ref_to_sha("acme", "widgets", "main", &options)
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    clock.advance(999);
    client
        .resolve_ref_to_sha("acme", "widgets", "main", &options)
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    clock.advance(1);
    client
        .resolve_ref_to_sha("acme", "widgets", "main", &options)
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
#[serial]
async fn test_persistent_tier_shared_between_clients() {
    std::env::remove_var(DISABLE_CACHE_ENV);

    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(commit_tag_router(&hits)).await;

    let dir = tempdir().unwrap();
    let store = Arc::new(ContentStore::at(dir.path()).unwrap());
    let tier = |store: &Arc<ContentStore>| TtlCache::new(store.clone()).with_prefix("github-ref");

    let first = GitHubClient::new(&base)
        .unwrap()
        .with_persistent_cache(tier(&store));
    let sha = first
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(sha, COMMIT_SHA);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // A fresh client with an empty in-memory cache reads the shared store
    let second = GitHubClient::new(&base)
        .unwrap()
        .with_persistent_cache(tier(&store));
    let sha = second
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(sha, COMMIT_SHA);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    // The persistent hit warms the in-memory tier too
    assert_eq!(second.ref_cache().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_disable_env_bypasses_persistent_tier() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = serve(commit_tag_router(&hits)).await;

    let dir = tempdir().unwrap();
    let store = Arc::new(ContentStore::at(dir.path()).unwrap());

    std::env::set_var(DISABLE_CACHE_ENV, "1");

    let first = GitHubClient::new(&base)
        .unwrap()
        .with_persistent_cache(TtlCache::new(store.clone()).with_prefix("github-ref"));
    first
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // With the tier disabled, a fresh client cannot see the first result
    let second = GitHubClient::new(&base)
        .unwrap()
        .with_persistent_cache(TtlCache::new(store.clone()).with_prefix("github-ref"));
    second
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // The in-memory tier is unaffected by the flag
    second
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    std::env::remove_var(DISABLE_CACHE_ENV);
}

#[tokio::test]
async fn test_request_headers_sent() {
    let router = Router::new().route(
        "/repos/:owner/:repo/git/ref/tags/:gitref",
        get(move |headers: HeaderMap| async move {
            let accept_ok = headers.get("accept").and_then(|v| v.to_str().ok())
                == Some("application/vnd.github.v3+json");
            let ua_ok = headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ua| ua.starts_with("berth/"));
            let auth_ok = headers.get("authorization").and_then(|v| v.to_str().ok())
                == Some("Bearer per-call-token");

            if accept_ok && ua_ok && auth_ok {
                Json(tag_ref_body("commit", COMMIT_SHA)).into_response()
            } else {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }),
    );
    let base = serve(router).await;

    let client = GitHubClient::new(&base).unwrap();
    let options = ResolveOptions {
        token: Some("per-call-token".to_string()),
        ..ResolveOptions::default()
    };
    let sha = client
        .resolve_ref_to_sha("acme", "widgets", "v1.0.0", &options)
        .await
        .unwrap();

    assert_eq!(sha, COMMIT_SHA);
}
