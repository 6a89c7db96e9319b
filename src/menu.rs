use crate::error::BotError;
use crate::nav::{Callback, Delivery};
use crate::scraper::{MovieDetails, Provider, QualityLink, SearchHit};
use crate::storage::Session;
use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use unicode_segmentation::UnicodeSegmentation;

const PLOT_LIMIT: usize = 300;

/// Message body (HTML) plus its inline keyboard.
#[derive(Debug, Clone)]
pub struct Screen {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Screen {
    fn new(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        let keyboard = (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows));
        Self { text: text.into(), keyboard }
    }
}

/* ====== Static texts ====== */

pub fn welcome() -> Screen {
    let text = "🎬 <b>Welcome to Movie Scraper Bot!</b>\n\n\
        I can help you find and download movies with direct links from:\n\
        🟢 <b>HdHub4U</b>\n\
        🔵 <b>DesireMovies</b>\n\n\
        <b>Commands:</b>\n\
        🔍 /search &lt;movie_name&gt; - Search for movies\n\
        📋 /help - Show help message\n\n\
        <b>Features:</b>\n\
        ✅ Direct download links (480p, 720p, 1080p, 4K)\n\
        ✅ Watch online without downloading\n\n\
        <i>Send me a movie name to get started!</i>";
    Screen::new(
        text,
        vec![vec![InlineKeyboardButton::switch_inline_query_current_chat("🔍 Search Movies", "")]],
    )
}

pub fn help() -> &'static str {
    "🎬 <b>Movie Scraper Bot - Help</b>\n\n\
     <b>Movie Sources:</b>\n\
     🟢 <b>HdHub4U</b> - Bollywood, Hollywood, South Indian movies\n\
     🔵 <b>DesireMovies</b> - Dual audio, Hindi dubbed movies\n\n\
     <b>How to use:</b>\n\
     1️⃣ Type <code>/search movie_name</code> or just send the name\n\
     2️⃣ Pick a movie from the results (🟢 = HdHub4U, 🔵 = DesireMovies)\n\
     3️⃣ Choose a quality: 480p, 720p, 1080p or 4K\n\
     4️⃣ Tap \"📥 Direct Link\" to download or \"▶️ Watch Online\" to stream\n\n\
     <b>Commands:</b>\n\
     /start - Start the bot\n\
     /search - Search for movies\n\
     /cancel - Forget the current search\n\
     /help - Show this help message\n\n\
     <b>Note:</b> Some links may require a download manager."
}

pub fn search_usage() -> &'static str {
    "❌ <b>Please provide a movie name!</b>\n\n\
     Usage: <code>/search movie_name</code>\n\
     Example: <code>/search inception</code>"
}

pub fn searching(query: &str) -> String {
    format!(
        "🔍 <b>Searching for:</b> <code>{}</code>\n🌐 <b>Sources:</b> HdHub4U &amp; DesireMovies\n\nPlease wait...",
        html_escape(query)
    )
}

pub fn new_search_prompt() -> Screen {
    Screen::new(
        "🔍 <b>Start a new search</b>\n\nType: <code>/search movie_name</code>\nExample: <code>/search inception</code>",
        vec![],
    )
}

pub fn cancelled() -> Screen {
    Screen::new("❌ Search cancelled. Send /search to try again.", vec![])
}

/* ====== Navigation screens ====== */

pub fn results(session: &Session, limit: usize) -> Screen {
    let hits = &session.last_hits;
    let mut text = format!(
        "🎬 <b>Found {} results for:</b> <code>{}</code>\n\n",
        hits.len(),
        html_escape(&session.query)
    );
    for provider in Provider::ALL {
        let count = hits.iter().filter(|h| h.provider == provider).count();
        text.push_str(&format!("{} <b>{}:</b> {} results\n", provider.badge(), provider.name(), count));
    }
    for provider in &session.failed {
        text.push_str(&format!(
            "⚠️ <i>{} did not respond, results may be incomplete.</i>\n",
            provider.name()
        ));
    }
    if hits.len() > limit {
        text.push_str(&format!("<i>Showing the first {limit}.</i>\n"));
    }
    text.push_str("\nSelect a movie:");

    let mut rows: Vec<Vec<InlineKeyboardButton>> = hits
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, h)| vec![InlineKeyboardButton::callback(hit_title(h), Callback::Hit(i).payload())])
        .collect();
    rows.push(vec![button("❌ Cancel", Callback::Cancel)]);
    Screen::new(text, rows)
}

pub fn fetching(hit: &SearchHit) -> Screen {
    Screen::new(
        format!(
            "🎬 <b>Fetching details for:</b> <code>{}</code>\n{} <b>Source:</b> {}\n\nPlease wait...",
            html_escape(&hit.title),
            hit.provider.badge(),
            hit.provider.name()
        ),
        vec![],
    )
}

pub fn details(movie: &MovieDetails, qualities: &[QualityLink]) -> Screen {
    let plot = match movie.plot.as_deref() {
        Some(p) => html_escape(&clip(p, PLOT_LIMIT)),
        None => "No description available.".to_string(),
    };
    let rating = match movie.rating.as_deref() {
        Some(r) => format!("{}/10", html_escape(r)),
        None => "N/A".to_string(),
    };
    let text = format!(
        "🎬 <b>{}</b>\n{} <b>Source:</b> {}\n\n\
         📅 <b>Year:</b> {}\n⭐ <b>Rating:</b> {}\n⏱ <b>Duration:</b> {}\n🎭 <b>Genre:</b> {}\n\n\
         📝 <b>Plot:</b>\n{}\n\n<b>Select quality below:</b>",
        html_escape(&movie.title),
        movie.provider.badge(),
        movie.provider.name(),
        or_na(&movie.year),
        rating,
        or_na(&movie.duration),
        or_na(&movie.genre),
        plot,
    );

    let mut rows: Vec<Vec<InlineKeyboardButton>> = qualities
        .iter()
        .map(|q| vec![button(format!("🎞 {}", quality_title(q)), Callback::Quality(q.label.clone()))])
        .collect();
    if rows.is_empty() {
        rows.push(vec![button("❌ No download links available", Callback::Noop)]);
    }
    rows.push(vec![
        button("🔙 Back to Results", Callback::Results),
        button("🔍 New Search", Callback::NewSearch),
    ]);
    Screen::new(text, rows)
}

pub fn quality(movie: &MovieDetails, quality: &QualityLink) -> Screen {
    let text = format!(
        "🎬 <b>{}</b>\n🎞 <b>Quality:</b> {}\n📦 <b>Size:</b> {}\n\nHow do you want to get it?",
        html_escape(&movie.title),
        html_escape(&quality.label),
        or_na(&quality.size),
    );
    Screen::new(
        text,
        vec![
            vec![
                button("📥 Direct Link", Callback::Deliver(Delivery::Direct)),
                button("▶️ Watch Online", Callback::Deliver(Delivery::Watch)),
            ],
            back_row(),
        ],
    )
}

pub fn delivered(movie: &MovieDetails, quality: &QualityLink, kind: Delivery, watch_url: &str) -> Screen {
    let heading = format!("<b>{}</b> [{}]", html_escape(&movie.title), html_escape(&quality.label));
    let (text, open, other) = match kind {
        Delivery::Direct => (
            format!(
                "📥 <b>Direct link</b> for {heading}\n\n<code>{}</code>\n\n<i>Some links may require a download manager.</i>",
                html_escape(&quality.direct_url)
            ),
            url_button("📥 Download", &quality.direct_url),
            button("▶️ Watch Online", Callback::Deliver(Delivery::Watch)),
        ),
        Delivery::Watch => (
            format!("▶️ <b>Watch online</b>: {heading}\n\n{}", html_escape(watch_url)),
            url_button("▶️ Open Player", watch_url),
            button("📥 Direct Link", Callback::Deliver(Delivery::Direct)),
        ),
    };

    let mut rows = Vec::new();
    if let Some(open) = open {
        rows.push(vec![open]);
    }
    rows.push(vec![other]);
    rows.push(back_row());
    Screen::new(text, rows)
}

pub fn error_screen(err: &BotError, back_to_results: bool) -> Screen {
    let text = match err {
        BotError::Upstream { provider, .. } => format!(
            "❌ <b>Could not get data from {}.</b>\nPlease try again later.",
            provider.name()
        ),
        BotError::NotFound { query } => format!(
            "❌ <b>No results found for:</b> <code>{}</code>\n\n\
             🌐 <b>Searched:</b> HdHub4U &amp; DesireMovies\n\nTry searching with a different name.",
            html_escape(query)
        ),
        BotError::StaleSelection => {
            "⌛ <b>This menu has expired.</b>\nSend /search &lt;movie_name&gt; to search again.".to_string()
        }
    };
    let rows = if back_to_results {
        vec![vec![
            button("🔙 Back to Results", Callback::Results),
            button("🔍 New Search", Callback::NewSearch),
        ]]
    } else {
        vec![]
    };
    Screen::new(text, rows)
}

/* ====== Helpers ====== */

fn button(text: impl Into<String>, cb: Callback) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), cb.payload())
}

fn url_button(text: &str, url: &str) -> Option<InlineKeyboardButton> {
    Url::parse(url).ok().map(|u| InlineKeyboardButton::url(text.to_string(), u))
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![
        button("🔙 Qualities", Callback::Details),
        button("🔍 New Search", Callback::NewSearch),
    ]
}

fn hit_title(h: &SearchHit) -> String {
    let mut s = format!("{} {} ({})", h.provider.badge(), h.title, h.year.as_deref().unwrap_or("N/A"));
    if let Some(q) = &h.quality {
        s.push_str(&format!(" [{q}]"));
    }
    s
}

fn quality_title(q: &QualityLink) -> String {
    match &q.size {
        Some(size) => format!("{} ({})", q.label, size),
        None => q.label.clone(),
    }
}

fn or_na(v: &Option<String>) -> String {
    v.as_deref().map(html_escape).unwrap_or_else(|| "N/A".to_string())
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn clip(s: &str, max: usize) -> String {
    if s.graphemes(true).count() <= max {
        s.to_string()
    } else {
        s.graphemes(true).take(max).collect::<String>() + "…"
    }
}
