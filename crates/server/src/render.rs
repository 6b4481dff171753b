//! HTML rendering for the public pages.
//!
//! The detail page is split in two so the shell can be flushed before the
//! view count is known.

use maud::{html, Markup, PreEscaped, DOCTYPE};
use shared::domain::Startup;
use site_api::{DetailPage, ListPage, ProfilePage, ViewCount, NO_DETAILS};
use url::form_urlencoded;

const VIEWS_SLOT_ID: &str = "startup-views";
const VIEWS_VALUE_ID: &str = "startup-views-value";

/// Where a streamed document is cut between its head and tail.
const STREAM_SPLIT: &str = "<!--stream-->";

const SWAP_VIEWS_SCRIPT: &str = "(function(){\
var t=document.getElementById('startup-views-value');\
var s=document.getElementById('startup-views');\
if(t&&s){s.replaceChildren(t.content.cloneNode(true));}})();";

fn query_value(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Percent-encodes one path segment. `byte_serialize` writes a space as `+`
/// and a literal `+` as `%2B`, so any remaining `+` was a space.
fn path_segment(raw: &str) -> String {
    query_value(raw).replace('+', "%20")
}

fn startup_href(startup: &Startup) -> String {
    format!("/startup/{}", path_segment(startup.id.as_str()))
}

fn document(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
            }
            body {
                header.navbar { a href="/" { "Pitch Directory" } }
                main { (body) }
            }
        }
    }
}

fn format_date(startup: &Startup) -> String {
    startup.created_at.format("%B %-d, %Y").to_string()
}

fn author_link(startup: &Startup) -> Markup {
    html! {
        @match &startup.author {
            Some(author) => a.author href=(format!("/user/{}", path_segment(author.id.as_str()))) {
                (author.name.as_deref().unwrap_or("Unknown author"))
            },
            None => span.author { "Unknown author" },
        }
    }
}

fn category_link(startup: &Startup) -> Markup {
    html! {
        @if let Some(category) = startup.category.as_deref() {
            a.category href=(format!("/?query={}", query_value(&category.to_lowercase()))) {
                (category)
            }
        }
    }
}

pub(crate) fn startup_card(startup: &Startup) -> Markup {
    html! {
        li.startup-card {
            p.date { (format_date(startup)) }
            p.card-views { (ViewCount(startup.views).label()) }
            (author_link(startup))
            h3 { a href=(startup_href(startup)) { (startup.title) } }
            @if let Some(description) = startup.description.as_deref() {
                p.description { (description) }
            }
            @if let Some(image) = startup.image.as_deref() {
                img src=(image) alt="";
            }
            (category_link(startup))
            a.details href=(startup_href(startup)) { "Details" }
        }
    }
}

fn card_list(startups: &[Startup], empty_text: &str) -> Markup {
    html! {
        @if startups.is_empty() {
            p.no-results { (empty_text) }
        } @else {
            ul.card-grid {
                @for startup in startups { (startup_card(startup)) }
            }
        }
    }
}

pub(crate) fn list_page(page: &ListPage) -> String {
    document(
        "Pitch Directory",
        html! {
            section.hero {
                h1 { "Pitch your startup, connect with entrepreneurs" }
                form.search-form action="/" method="get" {
                    input name="query" value=(page.query.as_deref().unwrap_or_default())
                        placeholder="Search startups";
                }
            }
            section.startups {
                p.heading { (page.heading()) }
                (card_list(&page.startups, "No startups found"))
            }
        },
    )
    .into_string()
}

fn detail_body(page: &DetailPage) -> Markup {
    let startup = &page.startup;
    html! {
        section.hero {
            p.date { (format_date(startup)) }
            h1 { (startup.title) }
            @if let Some(description) = startup.description.as_deref() {
                p.description { (description) }
            }
        }
        article.startup {
            @if let Some(image) = startup.image.as_deref() {
                img.thumbnail src=(image) alt="";
            }
            div.meta { (author_link(startup)) (category_link(startup)) }
            h3 { "Pitch Details" }
            @match page.pitch_html.as_deref() {
                Some(pitch) => div.prose { (PreEscaped(pitch)) },
                None => p.no-results { (NO_DETAILS) },
            }
        }
        @if !page.editor_picks.is_empty() {
            section.editor-picks {
                p.heading { "Editor Picks" }
                (card_list(&page.editor_picks, ""))
            }
        }
        div.view-container id=(VIEWS_SLOT_ID) {
            div.skeleton.view-skeleton {}
        }
        (PreEscaped(STREAM_SPLIT))
    }
}

/// Splits the rendered detail document at the stream point: the shell up to
/// the view counter slot, and the closing tags that follow it.
fn detail_document(page: &DetailPage) -> (String, String) {
    let rendered = document(&page.startup.title, detail_body(page)).into_string();
    match rendered.split_once(STREAM_SPLIT) {
        Some((shell, tail)) => (shell.to_string(), tail.to_string()),
        None => (rendered, String::new()),
    }
}

/// Everything up to the view counter. The counter slot carries a skeleton
/// until [`views_fragment`] replaces it.
pub(crate) fn detail_shell(page: &DetailPage) -> String {
    detail_document(page).0
}

fn document_tail() -> String {
    let rendered = document("", html! { (PreEscaped(STREAM_SPLIT)) }).into_string();
    rendered
        .split_once(STREAM_SPLIT)
        .map(|(_, tail)| tail.to_string())
        .unwrap_or_default()
}

fn fill_views_slot(content: Markup) -> String {
    let swap = html! {
        template id=(VIEWS_VALUE_ID) { (content) }
        script { (PreEscaped(SWAP_VIEWS_SCRIPT)) }
    };
    swap.into_string() + &document_tail()
}

/// Swaps the counter into the slot left by [`detail_shell`] and closes the
/// document.
pub(crate) fn views_fragment(count: &ViewCount) -> String {
    fill_views_slot(html! {
        div.view-text { span.font-black { (count.label()) } }
    })
}

/// Used when the counter could not be read after the shell went out.
pub(crate) fn views_unavailable() -> String {
    fill_views_slot(html! {})
}

pub(crate) fn profile_page(page: &ProfilePage) -> String {
    let author = &page.author;
    let name = author.name.as_deref().unwrap_or("Unknown author");
    document(
        name,
        html! {
            section.profile {
                h3 { (name) }
                @if let Some(image) = author.image.as_deref() {
                    img.profile-image src=(image) alt="";
                }
                @if let Some(username) = author.username.as_deref() {
                    p.username { "@" (username) }
                }
                @if let Some(bio) = author.bio.as_deref() {
                    p.bio { (bio) }
                }
            }
            section.startups {
                p.heading { "Startups" }
                (card_list(&page.startups, "No posts yet"))
            }
        },
    )
    .into_string()
}

pub(crate) fn error_page(title: &str, message: &str) -> String {
    document(
        title,
        html! {
            section.error {
                h1 { (title) }
                p { (message) }
            }
        },
    )
    .into_string()
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
