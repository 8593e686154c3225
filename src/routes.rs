use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::fetcher::Fetcher;
use crate::registry::{Feed, FeedRegistry, RegistryError, SharedRegistry};
use crate::store::Page;

pub struct AppState {
    pub registry: SharedRegistry,
    pub fetcher: Arc<Fetcher>,
    pub page_size: usize,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/feed/", get(default_feed))
        .route("/feed/*path", get(feed_or_entry))
        .route("/entries/*feed_url", get(entries))
        .route("/add_feed", post(add_feed))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Feed data handed to templates, detached from the registry lock.
pub struct FeedSummary {
    pub url: String,
    pub title: String,
    pub href: String,
    pub show_images: bool,
    pub unread: usize,
    pub total: usize,
    pub last_fetched: Option<String>,
    pub last_error: Option<String>,
}

impl From<&Feed> for FeedSummary {
    fn from(feed: &Feed) -> Self {
        Self {
            url: feed.url.clone(),
            title: feed.title.clone(),
            href: feed.href.clone(),
            show_images: feed.show_images,
            unread: feed.entries.unread_count(),
            total: feed.entries.len(),
            last_fetched: feed
                .last_fetched
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            last_error: feed.last_error.clone(),
        }
    }
}

// Template structs
#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate {
    pub feeds: Vec<FeedSummary>,
    pub feed: FeedSummary,
    pub page: Page,
}

#[derive(Template)]
#[template(path = "entries.html")]
pub struct EntriesTemplate {
    pub feed: FeedSummary,
    pub page: Page,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        (status, format!("Error: {}", message)).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

// Route handlers
pub async fn index() -> &'static str {
    "Hello from htmx-feeds!"
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

pub async fn default_feed(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    render_feed(&state, None).await
}

/// `/feed/{url}` renders a feed, `/feed/{url}/entry/{link}` marks an entry
/// read. Both share one wildcard, so the split happens here.
///
/// Rendered links percent-encode both URLs, so the decoded wildcard holds
/// them verbatim. Hand-typed raw URLs work too as long as they carry no
/// percent-escapes.
pub async fn feed_or_entry(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    // The query string belongs to whichever URL sits at the end of the path
    let target = match query {
        Some(q) => format!("{}?{}", path, q),
        None => path,
    };

    let entry_target = {
        let registry = state.registry.read().await;
        split_entry_path(&registry, &target)
    };

    match entry_target {
        Some((feed_url, entry_link)) => {
            let link = state
                .registry
                .write()
                .await
                .mark_read(&feed_url, &entry_link)?;
            info!("Marked entry read: {}", link);
            Ok(Redirect::to(&link).into_response())
        }
        None => Ok(render_feed(&state, Some(&target)).await?.into_response()),
    }
}

/// Find the first `/entry/` boundary whose left side is a registered feed.
pub fn split_entry_path(registry: &FeedRegistry, target: &str) -> Option<(String, String)> {
    if registry.contains(target) {
        return None;
    }

    const MARKER: &str = "/entry/";
    target.match_indices(MARKER).find_map(|(i, _)| {
        let feed_url = &target[..i];
        let entry_link = &target[i + MARKER.len()..];
        (registry.contains(feed_url) && !entry_link.is_empty())
            .then(|| (feed_url.to_string(), entry_link.to_string()))
    })
}

async fn render_feed(
    state: &AppState,
    url: Option<&str>,
) -> Result<HtmlTemplate<FeedTemplate>, AppError> {
    // Reject unknown feeds before paying for a refresh
    state.registry.read().await.resolve(url)?;

    state.fetcher.refresh_all().await;

    let registry = state.registry.read().await;
    let feed = registry.resolve(url)?;
    let page = registry.page(&feed.url, 0, state.page_size)?;

    Ok(HtmlTemplate(FeedTemplate {
        feeds: registry.list().iter().map(FeedSummary::from).collect(),
        feed: FeedSummary::from(feed),
        page,
    }))
}

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: usize,
}

pub async fn entries(
    State(state): State<Arc<AppState>>,
    Path(feed_url): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let registry = state.registry.read().await;
    let page = registry
        .page(&feed_url, query.page, state.page_size)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let feed = registry.get(&feed_url)?;

    Ok(HtmlTemplate(EntriesTemplate {
        feed: FeedSummary::from(feed),
        page,
    }))
}

#[derive(Deserialize)]
pub struct AddFeedForm {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Checkbox: present when ticked
    #[serde(rename = "showImages", default)]
    pub show_images: Option<String>,
}

pub async fn add_feed(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AddFeedForm>,
) -> Result<Redirect, AppError> {
    let url = form.url.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("Feed URL is required".to_string()));
    }
    let title = match form.title.trim() {
        "" => url,
        title => title,
    };

    let url = state
        .registry
        .write()
        .await
        .add_feed(url, title, form.show_images.is_some());
    info!("Added feed '{}' ({})", title, url);

    Ok(Redirect::to(&format!("/feed/{}", urlencoding::encode(&url))))
}
