//! Attack-surface extraction from a single page of markup.
//!
//! Everything here is synchronous and returns owned data; the parsed document
//! never outlives the call.

use crate::form::{Form, HttpMethod, InputKind};
use crate::normalize::{canonicalize, resolve_link};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// How far above a control's parent the pseudo-form container search may climb.
const MAX_CONTAINER_CLIMB: usize = 3;

static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("valid selector"));
static CONTROL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input, textarea, select").expect("valid selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static INLINE_SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script:not([src])").expect("valid selector"));

static SCRIPT_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["'](https?://[^"'\s<>]+)["']"#).expect("valid regex"));
static API_LITERAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](/api/[^"']+|/rest/[^"']+|/auth/[^"']+)["']"#).expect("valid regex")
});

/// What one page contributes to the crawl.
#[derive(Debug, Default, Clone)]
pub struct PageExtract {
    pub forms: Vec<Form>,
    /// Canonical same-origin links, document order, no repeats.
    pub links: Vec<String>,
    /// Canonical same-origin API paths quoted somewhere in the page.
    pub api_literals: Vec<String>,
}

pub fn extract_page(page_url: &Url, markup: &str, origin_host: &str) -> PageExtract {
    if markup.trim().is_empty() {
        return PageExtract::default();
    }

    let Some(page) = canonicalize(page_url) else {
        return PageExtract::default();
    };

    let document = Html::parse_document(markup);

    let mut forms = extract_declared_forms(&document, page_url, &page, origin_host);
    forms.extend(extract_pseudo_forms(&document, &page));

    PageExtract {
        forms,
        links: extract_links(&document, page_url, origin_host),
        api_literals: extract_api_literals(markup, page_url, origin_host),
    }
}

fn control_name<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    el.value()
        .attr("name")
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn control_kind(el: &ElementRef) -> InputKind {
    InputKind::from_element(el.value().name(), el.value().attr("type"))
}

fn extract_declared_forms(
    document: &Html,
    page_url: &Url,
    page: &str,
    origin_host: &str,
) -> Vec<Form> {
    let mut forms = Vec::new();

    for form_el in document.select(&FORM_SELECTOR) {
        let action = form_el.value().attr("action").map(str::trim).unwrap_or("");
        let url = if action.is_empty() || action.starts_with('#') {
            page.to_string()
        } else {
            match resolve_link(page_url, action, origin_host) {
                Some(url) => url,
                None => {
                    debug!("Skipping form with out-of-scope action {:?} on {}", action, page);
                    continue;
                }
            }
        };

        let mut inputs = BTreeMap::new();
        for control in form_el.select(&CONTROL_SELECTOR) {
            if let Some(name) = control_name(&control) {
                inputs
                    .entry(name.to_string())
                    .or_insert_with(|| control_kind(&control));
            }
        }

        if inputs.is_empty() {
            continue;
        }

        forms.push(Form {
            url,
            method: HttpMethod::from_attr(form_el.value().attr("method")),
            inputs,
            origin_url: page.to_string(),
            inferred: false,
        });
    }

    forms
}

fn inside_form(el: &ElementRef) -> bool {
    el.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| e.name() == "form")
    })
}

fn is_document_root(el: &ElementRef) -> bool {
    matches!(el.value().name(), "body" | "html")
}

fn is_under(el: &ElementRef, container: &ElementRef) -> bool {
    el.ancestors().any(|node| node.id() == container.id())
}

/// Parent and up to `MAX_CONTAINER_CLIMB` ancestors above it, stopping below body.
fn container_window<'a>(el: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    std::iter::successors(el.parent().and_then(ElementRef::wrap), |c| {
        c.parent().and_then(ElementRef::wrap)
    })
    .take(MAX_CONTAINER_CLIMB + 1)
    .take_while(|c| !is_document_root(c))
    .collect()
}

/// Group loose controls into pseudo-forms.
///
/// Candidate containers are claimed deepest first, and a container holding a
/// control that is already grouped is never claimed. Whatever is left is
/// grouped by immediate parent; controls sitting directly in body stand alone.
fn extract_pseudo_forms(document: &Html, page: &str) -> Vec<Form> {
    let loose: Vec<ElementRef> = document
        .select(&CONTROL_SELECTOR)
        .filter(|el| control_name(el).is_some() && !inside_form(el))
        .collect();
    let windows: Vec<Vec<ElementRef>> = loose.iter().map(container_window).collect();

    let controls_under = |container: &ElementRef| -> Vec<usize> {
        loose
            .iter()
            .enumerate()
            .filter(|(_, el)| is_under(el, container))
            .map(|(j, _)| j)
            .collect()
    };

    let mut candidates: Vec<ElementRef> = Vec::new();
    for window in &windows {
        if let Some(container) = window.iter().find(|c| controls_under(c).len() >= 2)
            && !candidates.iter().any(|c| c.id() == container.id())
        {
            candidates.push(*container);
        }
    }
    candidates.sort_by_key(|c| Reverse(c.ancestors().count()));

    let mut grouped = vec![false; loose.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for container in &candidates {
        let under = controls_under(container);
        if under.iter().any(|&j| grouped[j]) {
            continue;
        }
        let members: Vec<usize> = under
            .into_iter()
            .filter(|&j| windows[j].iter().any(|c| c.id() == container.id()))
            .collect();
        if members.len() < 2 {
            continue;
        }
        for &j in &members {
            grouped[j] = true;
        }
        groups.push(members);
    }

    let mut by_parent = HashMap::new();
    for (j, el) in loose.iter().enumerate() {
        if grouped[j] {
            continue;
        }
        let parent = el
            .parent()
            .and_then(ElementRef::wrap)
            .filter(|p| !is_document_root(p));
        match parent {
            Some(parent) => {
                let index = *by_parent.entry(parent.id()).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[index].push(j);
            }
            None => groups.push(vec![j]),
        }
    }

    // document order of each group's first control
    groups.sort_by_key(|members| members[0]);

    let mut forms = Vec::new();
    for members in groups {
        let mut inputs = BTreeMap::new();
        for j in members {
            if let Some(name) = control_name(&loose[j]) {
                inputs
                    .entry(name.to_string())
                    .or_insert_with(|| control_kind(&loose[j]));
            }
        }

        if !inputs.values().any(InputKind::is_interactive) {
            debug!("Discarding non-interactive control group on {}", page);
            continue;
        }

        forms.push(Form {
            url: page.to_string(),
            method: HttpMethod::Post,
            inputs,
            origin_url: page.to_string(),
            inferred: true,
        });
    }

    forms
}

fn extract_links(document: &Html, page_url: &Url, origin_host: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let anchors = document
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string);

    let script_urls = document
        .select(&INLINE_SCRIPT_SELECTOR)
        .flat_map(|script| {
            let text: String = script.text().collect();
            SCRIPT_URL_PATTERN
                .captures_iter(&text)
                .map(|caps| caps[1].to_string())
                .collect::<Vec<_>>()
        });

    for href in anchors.chain(script_urls) {
        if let Some(link) = resolve_link(page_url, &href, origin_host)
            && seen.insert(link.clone())
        {
            links.push(link);
        }
    }

    links
}

fn extract_api_literals(markup: &str, page_url: &Url, origin_host: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    API_LITERAL_PATTERN
        .captures_iter(markup)
        .filter_map(|caps| resolve_link(page_url, &caps[1], origin_host))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
