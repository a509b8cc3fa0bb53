//! Upstream producer scraping item links from the simulator pages.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lol_html::{EndTagHandler, RewriteStrSettings, element, rewrite_str, text};
use reqwest::{Client, Url};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::producer::{Produced, Producer, ProducerError};
use crate::cache::CacheKey;
use crate::domain::GearRecord;
use crate::infra::error::InfraError;

use super::fallback::fallback_records;

const UNKNOWN_SLOT: &str = "unknown";
const UNKNOWN_ITEM: &str = "Unknown Item";

const ITEM_SLOTS: [&str; 17] = [
    "head", "neck", "shoulder", "back", "chest", "wrist", "hands", "waist", "legs", "feet",
    "finger1", "finger2", "trinket1", "trinket2", "mainhand", "offhand", "ranged",
];

/// An item link found on a page, before it is tied to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    pub slot: String,
    pub item_id: String,
    pub item_name: String,
    pub source_url: String,
}

/// Link seen during the rewrite; the name is settled once the page is done.
struct PendingItem {
    slot: String,
    item_id: String,
    source_url: String,
    link_text: String,
    tooltip_name: String,
}

impl PendingItem {
    fn finish(self) -> ExtractedItem {
        let item_name = [self.link_text.trim(), self.tooltip_name.trim()]
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_ITEM)
            .to_string();
        ExtractedItem {
            slot: self.slot,
            item_id: self.item_id,
            item_name,
            source_url: self.source_url,
        }
    }
}

#[derive(Default)]
struct ExtractState {
    slot_stack: Vec<String>,
    items: Vec<PendingItem>,
    in_item_link: bool,
}

/// Collect wowhead item links from `html`.
///
/// Links are resolved against `page_url`. The slot comes from the nearest
/// enclosing element that carries a `data-slot` attribute or a class naming a
/// slot.
pub fn extract_items(html: &str, page_url: &Url) -> Result<Vec<ExtractedItem>, String> {
    let state = Rc::new(RefCell::new(ExtractState::default()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("[data-slot], [class*=\"slot\"]", {
                    let state = Rc::clone(&state);
                    move |el| {
                        let slot = ["class", "data-slot"]
                            .into_iter()
                            .filter_map(|name| el.get_attribute(name))
                            .find_map(|hint| match_slot(&hint))
                            .unwrap_or(UNKNOWN_SLOT)
                            .to_string();

                        if let Some(handlers) = el.end_tag_handlers() {
                            state.borrow_mut().slot_stack.push(slot);
                            let state = Rc::clone(&state);
                            let pop_slot: EndTagHandler<'static> = Box::new(move |_end| {
                                state.borrow_mut().slot_stack.pop();
                                Ok(())
                            });
                            handlers.push(pop_slot);
                        }
                        Ok(())
                    }
                }),
                element!("a[href*=\"wowhead.com\"]", {
                    let state = Rc::clone(&state);
                    move |el| {
                        let Some(href) = el.get_attribute("href") else {
                            return Ok(());
                        };
                        let Some(item_id) = parse_item_id(&href).map(str::to_string) else {
                            state.borrow_mut().in_item_link = false;
                            return Ok(());
                        };
                        let source_url = page_url
                            .join(&href)
                            .map(String::from)
                            .unwrap_or(href);
                        let tooltip_name = el.get_attribute("data-wowhead").unwrap_or_default();

                        {
                            let mut state = state.borrow_mut();
                            let slot = state
                                .slot_stack
                                .last()
                                .cloned()
                                .unwrap_or_else(|| UNKNOWN_SLOT.to_string());
                            state.items.push(PendingItem {
                                slot,
                                item_id,
                                source_url,
                                link_text: String::new(),
                                tooltip_name,
                            });
                            state.in_item_link = true;
                        }

                        if let Some(handlers) = el.end_tag_handlers() {
                            let state = Rc::clone(&state);
                            let close_link: EndTagHandler<'static> = Box::new(move |_end| {
                                state.borrow_mut().in_item_link = false;
                                Ok(())
                            });
                            handlers.push(close_link);
                        }
                        Ok(())
                    }
                }),
                text!("a[href*=\"wowhead.com\"]", {
                    let state = Rc::clone(&state);
                    move |chunk| {
                        let mut state = state.borrow_mut();
                        if !state.in_item_link {
                            return Ok(());
                        }
                        if let Some(item) = state.items.last_mut() {
                            item.link_text.push_str(chunk.as_str());
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| err.to_string())?;

    let items = std::mem::take(&mut state.borrow_mut().items);
    Ok(items.into_iter().map(PendingItem::finish).collect())
}

/// Pull the numeric id out of `item=<n>` or `item/<n>`.
pub fn parse_item_id(href: &str) -> Option<&str> {
    href.match_indices("item").find_map(|(index, marker)| {
        let rest = &href[index + marker.len()..];
        let rest = rest.strip_prefix('=').or_else(|| rest.strip_prefix('/'))?;
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .map_or(rest, |end| &rest[..end]);
        (!digits.is_empty()).then_some(digits)
    })
}

/// Known slot named in `hint`, falling back to the first slot whose name
/// without trailing digits appears.
fn match_slot(hint: &str) -> Option<&'static str> {
    let hint = hint.to_ascii_lowercase();
    ITEM_SLOTS
        .iter()
        .copied()
        .find(|slot| hint.contains(slot))
        .or_else(|| {
            ITEM_SLOTS.iter().copied().find(|slot| {
                let stem = slot.trim_end_matches(|c: char| c.is_ascii_digit());
                hint.contains(stem)
            })
        })
}

pub struct PageProducer {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl PageProducer {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("gearcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn page_url(&self, key: &CacheKey) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("{}/", key.category()))
    }

    async fn scrape(&self, key: &CacheKey) -> Result<Vec<GearRecord>, String> {
        let url = self.page_url(key).map_err(|err| err.to_string())?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| format!("request failed: {err}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("upstream responded with {status}"));
        }
        let body = response
            .text()
            .await
            .map_err(|err| format!("failed to read body: {err}"))?;

        let produced_at = OffsetDateTime::now_utc();
        let items = extract_items(&body, &url)?;
        Ok(items
            .into_iter()
            .map(|item| {
                GearRecord::new(
                    key,
                    item.slot,
                    item.item_name,
                    item.item_id,
                    item.source_url,
                    produced_at,
                )
            })
            .collect())
    }
}

#[async_trait]
impl Producer for PageProducer {
    async fn produce(&self, key: &CacheKey) -> Result<Produced, ProducerError> {
        let started = Instant::now();
        let reason = match tokio::time::timeout(self.timeout, self.scrape(key)).await {
            Ok(Ok(records)) if !records.is_empty() => {
                debug!(
                    target = "gearcache::infra::producer",
                    key = %key,
                    records = records.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scraped upstream page"
                );
                return Ok(Produced::upstream(records));
            }
            Ok(Ok(_)) => "no item links found".to_string(),
            Ok(Err(reason)) => reason,
            Err(_) => format!("timed out after {} ms", self.timeout.as_millis()),
        };

        warn!(
            target = "gearcache::infra::producer",
            key = %key,
            reason = %reason,
            "Upstream scrape failed, serving fallback data"
        );
        Ok(Produced::fallback(
            fallback_records(key, OffsetDateTime::now_utc()),
            reason,
        ))
    }

    fn describe(&self) -> &'static str {
        "upstream"
    }
}
