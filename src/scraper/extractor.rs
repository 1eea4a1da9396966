use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::warn;

use crate::scraper::ScraperConfig;

/// Fragments must be longer than this many characters to be kept.
pub const MIN_FRAGMENT_CHARS: usize = 50;

/// Readable text pulled out of a page by either strategy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractedContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Boilerplate removal and prioritized-selector text extraction
#[derive(Clone)]
pub struct ContentExtractor {
    config: ScraperConfig,
    remove: Vec<Selector>,
    content: Vec<Selector>,
}

impl ContentExtractor {
    pub fn new(config: ScraperConfig) -> Self {
        let remove = parse_selectors(&config.remove_selectors);
        let content = parse_selectors(&config.content_selectors);
        Self {
            config,
            remove,
            content,
        }
    }

    /// Static strategy: extract from already-fetched markup without running scripts.
    pub fn extract_html(&self, html: &str) -> ExtractedContent {
        let mut document = Html::parse_document(html);
        let title = document_title(&document);

        self.strip_boilerplate(&mut document);

        ExtractedContent {
            title,
            text: self.collect_fragments(&document),
        }
    }

    fn strip_boilerplate(&self, document: &mut Html) {
        let root = document.root_element();
        let doomed: Vec<_> = self
            .remove
            .iter()
            .flat_map(|selector| root.select(selector).map(|el| el.id()))
            .collect();

        for id in doomed {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    /// Walks only attached nodes: `Html::select` would still visit detached boilerplate.
    fn collect_fragments(&self, document: &Html) -> String {
        let root = document.root_element();
        let mut seen = HashSet::new();
        let mut taken = HashSet::new();
        let mut fragments = Vec::new();

        for selector in &self.content {
            for element in root.select(selector) {
                if taken.contains(&element.id())
                    || element.ancestors().any(|a| taken.contains(&a.id()))
                {
                    continue;
                }

                // A container contributes only the text outside fragments already taken
                let text = element
                    .descendants()
                    .filter(|node| {
                        !node
                            .ancestors()
                            .take_while(|a| a.id() != element.id())
                            .any(|a| taken.contains(&a.id()))
                    })
                    .filter_map(|node| node.value().as_text())
                    .flat_map(|t| t.split_whitespace())
                    .collect::<Vec<_>>()
                    .join(" ");

                if text.chars().count() <= MIN_FRAGMENT_CHARS {
                    continue;
                }
                if !seen.insert(text.clone()) {
                    continue;
                }

                taken.insert(element.id());
                fragments.push(text);
            }
        }

        fragments.join("\n\n")
    }

    /// Generate JavaScript that performs the same extraction inside a rendered page
    ///
    /// This JS runs in the browser context and:
    /// 1. Removes boilerplate elements
    /// 2. Collects de-duplicated fragments from the content selectors in order
    /// 3. Falls back to all paragraphs when no selector yields anything
    pub fn extraction_script(&self) -> String {
        let remove_selectors = js_array(&self.config.remove_selectors);
        let content_selectors = js_array(&self.config.content_selectors);
        let min = MIN_FRAGMENT_CHARS;

        format!(
            r#"
            (() => {{
                const clean = (el) => (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim();

                const removeSelectors = [{remove_selectors}];
                for (const selector of removeSelectors) {{
                    try {{
                        document.querySelectorAll(selector).forEach(el => el.remove());
                    }} catch (e) {{}}
                }}

                const contentSelectors = [{content_selectors}];
                const seen = new Set();
                const taken = [];
                const fragments = [];
                const outside = (el) => {{
                    const walker = document.createTreeWalker(el, NodeFilter.SHOW_TEXT);
                    const parts = [];
                    while (walker.nextNode()) {{
                        const node = walker.currentNode;
                        if (!taken.some(t => t.contains(node))) parts.push(node.textContent);
                    }}
                    return parts.join(' ').replace(/\s+/g, ' ').trim();
                }};
                for (const selector of contentSelectors) {{
                    let elements = [];
                    try {{
                        elements = document.querySelectorAll(selector);
                    }} catch (e) {{
                        continue;
                    }}
                    for (const el of elements) {{
                        if (taken.some(t => t.contains(el))) continue;
                        const text = taken.some(t => el.contains(t)) ? outside(el) : clean(el);
                        if (text.length <= {min} || seen.has(text)) continue;
                        seen.add(text);
                        taken.push(el);
                        fragments.push(text);
                    }}
                }}

                if (fragments.length === 0) {{
                    for (const p of document.querySelectorAll('p')) {{
                        const text = clean(p);
                        if (text.length > {min}) fragments.push(text);
                    }}
                }}

                return {{
                    title: document.title || null,
                    text: fragments.join('\n\n')
                }};
            }})()
            "#
        )
    }
}

fn parse_selectors(raw: &[String]) -> Vec<Selector> {
    raw.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Ignoring invalid selector {:?}: {:?}", s, e);
                None
            }
        })
        .collect()
}

fn js_array(selectors: &[String]) -> String {
    selectors
        .iter()
        .map(|s| format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalized_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn document_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        document
            .select(&selector)
            .map(|el| normalized_text(&el))
            .find(|t| !t.is_empty())
    })
}
