use crate::error::BotError;
use crate::links::LinkFormatter;
use crate::menu::{self, Screen};
use crate::scraper::{Provider, QualityLink, ScraperClient, SearchHit};
use crate::storage::{Session, SessionStore};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{info, warn};

/* ====== State machine ====== */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavState {
    #[default]
    Idle,
    ResultsShown,
    DetailsShown,
    QualityShown,
    Delivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Direct,
    Watch,
}

/// Inline button payloads:
///   hit:<n>         pick the n-th search hit
///   q:<label>       pick a quality of the selected movie
///   action:direct   show the direct link
///   action:watch    show the watch-online link
///   nav:results | nav:details | nav:new | nav:cancel
///   noop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Hit(usize),
    Quality(String),
    Deliver(Delivery),
    Results,
    Details,
    NewSearch,
    Cancel,
    Noop,
}

impl Callback {
    pub fn parse(data: &str) -> Option<Self> {
        let cb = match data.split_once(':') {
            Some(("hit", n)) => Callback::Hit(n.parse().ok()?),
            Some(("q", label)) if !label.is_empty() => Callback::Quality(label.to_string()),
            Some(("action", "direct")) => Callback::Deliver(Delivery::Direct),
            Some(("action", "watch")) => Callback::Deliver(Delivery::Watch),
            Some(("nav", "results")) => Callback::Results,
            Some(("nav", "details")) => Callback::Details,
            Some(("nav", "new")) => Callback::NewSearch,
            Some(("nav", "cancel")) => Callback::Cancel,
            None if data == "noop" => Callback::Noop,
            _ => return None,
        };
        Some(cb)
    }

    pub fn payload(&self) -> String {
        match self {
            Callback::Hit(n) => format!("hit:{n}"),
            Callback::Quality(label) => format!("q:{}", callback_label(label)),
            Callback::Deliver(Delivery::Direct) => "action:direct".to_string(),
            Callback::Deliver(Delivery::Watch) => "action:watch".to_string(),
            Callback::Results => "nav:results".to_string(),
            Callback::Details => "nav:details".to_string(),
            Callback::NewSearch => "nav:new".to_string(),
            Callback::Cancel => "nav:cancel".to_string(),
            Callback::Noop => "noop".to_string(),
        }
    }
}

impl NavState {
    /// Target state of a button press, or `StaleSelection` when the button
    /// does not belong to the screen the chat is on.
    pub fn next(self, cb: &Callback) -> Result<NavState, BotError> {
        use NavState::*;
        let next = match (self, cb) {
            (_, Callback::NewSearch | Callback::Cancel) => Idle,
            (_, Callback::Noop) => self,
            (ResultsShown, Callback::Hit(_)) => DetailsShown,
            (DetailsShown, Callback::Quality(_)) => QualityShown,
            (QualityShown | Delivered, Callback::Deliver(_)) => Delivered,
            (ResultsShown | DetailsShown | QualityShown | Delivered, Callback::Results) => ResultsShown,
            (QualityShown | Delivered, Callback::Details) => DetailsShown,
            _ => return Err(BotError::StaleSelection),
        };
        Ok(next)
    }
}

/* ====== Qualities ====== */

// Telegram limits callback data to 64 bytes; "q:" takes two of them.
const MAX_LABEL_BYTES: usize = 60;

/// Label as it travels in a `q:` payload.
pub fn callback_label(label: &str) -> &str {
    if label.len() <= MAX_LABEL_BYTES {
        return label;
    }
    let mut end = MAX_LABEL_BYTES;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    &label[..end]
}

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(480|720|1080|2160)p\b|\b4k\b").expect("resolution regex"));

/// 480p < 720p < 1080p < 4K; `None` for labels without a known resolution.
fn resolution_rank(label: &str) -> Option<u8> {
    let caps = RESOLUTION.captures(label)?;
    Some(match caps.get(1).map(|m| m.as_str()) {
        Some("480") => 0,
        Some("720") => 1,
        Some("1080") => 2,
        _ => 3,
    })
}

/// Keeps the first link of every label and orders them by resolution.
/// Labels are compared in their payload form, so every button resolves to
/// exactly one link. Labels without a known resolution go last, sorted
/// case-insensitively.
pub fn rank_qualities(links: Vec<QualityLink>) -> Vec<QualityLink> {
    let mut seen = HashSet::new();
    let mut out: Vec<QualityLink> = links
        .into_iter()
        .filter(|l| seen.insert(callback_label(&l.label).to_string()))
        .collect();
    out.sort_by_cached_key(|l| {
        let rank = resolution_rank(&l.label);
        (rank.is_none(), rank, l.label.to_lowercase())
    });
    out
}

/* ====== Search merge ====== */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub hits: Vec<SearchHit>,
    pub failed: Vec<Provider>,
}

/// Concatenates provider results in the given order. A failed provider only
/// shrinks the list; the search fails when nothing was found at all.
pub fn merge_results(
    query: &str,
    outcomes: Vec<(Provider, Result<Vec<SearchHit>, BotError>)>,
) -> Result<Merged, BotError> {
    let mut hits = Vec::new();
    let mut failed = Vec::new();
    let mut first_failure = None;

    for (provider, outcome) in outcomes {
        match outcome {
            Ok(found) => {
                info!(provider = %provider, count = found.len(), "provider results");
                hits.extend(found);
            }
            Err(BotError::NotFound { .. }) => info!(provider = %provider, count = 0, "provider results"),
            Err(err) => {
                warn!(provider = %provider, error = %err, "provider search failed");
                failed.push(provider);
                first_failure.get_or_insert(err);
            }
        }
    }

    if hits.is_empty() {
        return Err(first_failure.unwrap_or_else(|| BotError::NotFound { query: query.to_string() }));
    }
    Ok(Merged { hits, failed })
}

/* ====== Controller ====== */

/// Drives one chat through search, details, quality and delivery screens.
pub struct Navigator<S> {
    scraper: ScraperClient,
    store: S,
    links: LinkFormatter,
    result_limit: usize,
}

impl<S: SessionStore> Navigator<S> {
    pub fn new(scraper: ScraperClient, store: S, links: LinkFormatter, result_limit: usize) -> Self {
        Self { scraper, store, links, result_limit }
    }

    /// Queries both providers concurrently; latency is that of the slower one.
    pub async fn search_all(&self, query: &str) -> Result<Merged, BotError> {
        let (hd, dm) = tokio::join!(
            self.scraper.search(Provider::HdHub4U, query),
            self.scraper.search(Provider::DesireMovies, query),
        );
        merge_results(query, vec![(Provider::HdHub4U, hd), (Provider::DesireMovies, dm)])
    }

    /// New search rendered into message `menu_id`. Any failure leaves the chat idle.
    pub async fn search(&self, chat_id: i64, menu_id: i32, query: &str) -> Screen {
        info!(chat_id, query, "search");
        match self.search_into_session(chat_id, menu_id, query).await {
            Ok(screen) => screen,
            Err(err) => {
                self.store.clear(chat_id).await;
                menu::error_screen(&err, false)
            }
        }
    }

    async fn search_into_session(&self, chat_id: i64, menu_id: i32, query: &str) -> Result<Screen, BotError> {
        let merged = self.search_all(query).await?;
        let mut session = Session::new(chat_id, query);
        session.state = NavState::ResultsShown;
        session.menu_id = Some(menu_id);
        session.last_hits = merged.hits;
        session.failed = merged.failed;
        let screen = menu::results(&session, self.result_limit);
        self.store.put(chat_id, session).await;
        Ok(screen)
    }

    /// Screen for a button press on message `menu_id`; `None` leaves the message as is.
    pub async fn on_callback(&self, chat_id: i64, menu_id: i32, data: &str) -> Option<Screen> {
        match self.apply_callback(chat_id, menu_id, data).await {
            Ok(screen) => screen,
            Err(BotError::StaleSelection) => {
                info!(chat_id, data, "stale selection");
                self.store.clear(chat_id).await;
                Some(menu::error_screen(&BotError::StaleSelection, false))
            }
            Err(err) => {
                warn!(chat_id, data, error = %err, "callback failed");
                Some(menu::error_screen(&err, true))
            }
        }
    }

    /// Placeholder shown while a picked hit is being fetched. `None` when the
    /// press is not a hit pick that resolves against the chat's current menu.
    pub async fn loading(&self, chat_id: i64, menu_id: i32, data: &str) -> Option<Screen> {
        let Some(Callback::Hit(index)) = Callback::parse(data) else { return None };
        let session = self.store.get(chat_id).await?;
        if session.menu_id != Some(menu_id) || session.state != NavState::ResultsShown {
            return None;
        }
        session.last_hits.get(index).map(menu::fetching)
    }

    pub async fn cancel(&self, chat_id: i64) {
        self.store.clear(chat_id).await;
    }

    async fn apply_callback(&self, chat_id: i64, menu_id: i32, data: &str) -> Result<Option<Screen>, BotError> {
        let cb = Callback::parse(data).ok_or(BotError::StaleSelection)?;
        match cb {
            Callback::Noop => return Ok(None),
            Callback::NewSearch => {
                self.store.clear(chat_id).await;
                return Ok(Some(menu::new_search_prompt()));
            }
            Callback::Cancel => {
                self.store.clear(chat_id).await;
                return Ok(Some(menu::cancelled()));
            }
            _ => {}
        }

        let mut session = self.store.get(chat_id).await.ok_or(BotError::StaleSelection)?;
        if session.menu_id != Some(menu_id) {
            return Err(BotError::StaleSelection);
        }
        let next = session.state.next(&cb)?;

        let screen = match cb {
            Callback::Hit(index) => {
                let hit = session.last_hits.get(index).cloned().ok_or(BotError::StaleSelection)?;
                let (details, links) = tokio::try_join!(
                    self.scraper.details(hit.provider, &hit.source_url),
                    self.scraper.magic_links(hit.provider, &hit.source_url),
                )?;
                let details = details.with_fallback(&hit);
                session.qualities = rank_qualities(links);
                session.selected_quality = None;
                let screen = menu::details(&details, &session.qualities);
                session.selected_movie = Some(details);
                screen
            }
            Callback::Quality(label) => {
                let quality = session
                    .qualities
                    .iter()
                    .find(|q| callback_label(&q.label) == label)
                    .cloned()
                    .ok_or(BotError::StaleSelection)?;
                let movie = session.selected_movie.as_ref().ok_or(BotError::StaleSelection)?;
                let screen = menu::quality(movie, &quality);
                session.selected_quality = Some(quality);
                screen
            }
            Callback::Deliver(kind) => {
                let movie = session.selected_movie.as_ref().ok_or(BotError::StaleSelection)?;
                let quality = session.selected_quality.as_ref().ok_or(BotError::StaleSelection)?;
                let watch_url = self.links.build_watch_url(&quality.direct_url);
                menu::delivered(movie, quality, kind, &watch_url)
            }
            Callback::Results => menu::results(&session, self.result_limit),
            Callback::Details => {
                let movie = session.selected_movie.as_ref().ok_or(BotError::StaleSelection)?;
                let screen = menu::details(movie, &session.qualities);
                session.selected_quality = None;
                screen
            }
            Callback::Noop | Callback::NewSearch | Callback::Cancel => return Ok(None),
        };

        session.state = next;
        self.store.put(chat_id, session).await;
        Ok(Some(screen))
    }
}
