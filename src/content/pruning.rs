//! Relevance pruning of rendered pages.
//!
//! Every element is scored top-down from a weighted mix of text density,
//! link density, tag weight, class/id hints and text length. Elements scoring
//! under the threshold are removed along with their subtree; survivors have
//! their children scored in turn. What is left of `<body>` is the page's main
//! content, which is what the extraction model gets to see.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dom::{DomElement, DomNode, NON_CONTENT_TAGS, parse_body};

/// Navigation and boilerplate tags removed before scoring.
const EXCLUDED_TAGS: &[&str] = &["nav", "footer", "header", "aside", "form", "iframe"];

static NEGATIVE_PATTERNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:nav|footer|header|sidebar|ads|comment|promo|advert|social|share)")
        .unwrap()
});

const WEIGHT_TEXT_DENSITY: f64 = 0.4;
const WEIGHT_LINK_DENSITY: f64 = 0.2;
const WEIGHT_TAG: f64 = 0.2;
const WEIGHT_CLASS_ID: f64 = 0.1;
const WEIGHT_TEXT_LENGTH: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    /// Remove anything scoring under the threshold.
    #[default]
    Fixed,
    /// Scale the threshold per element by tag importance, text ratio and
    /// link ratio.
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct PruningContentFilter {
    pub threshold: f64,
    pub threshold_type: ThresholdType,
    /// Elements with fewer words than this are always removed.
    pub min_word_threshold: Option<usize>,
}

impl Default for PruningContentFilter {
    fn default() -> Self {
        Self {
            threshold: 0.48,
            threshold_type: ThresholdType::Fixed,
            min_word_threshold: None,
        }
    }
}

struct Metrics {
    text_len: usize,
    tag_len: usize,
    link_text_len: usize,
}

impl PruningContentFilter {
    pub fn new(threshold: f64, threshold_type: ThresholdType) -> Self {
        Self {
            threshold,
            threshold_type,
            ..Self::default()
        }
    }

    /// Prune `html` and return the surviving top-level blocks of `<body>`.
    pub fn filter_content(&self, html: &str) -> Vec<DomElement> {
        let skip: Vec<&str> = NON_CONTENT_TAGS
            .iter()
            .chain(EXCLUDED_TAGS)
            .copied()
            .collect();
        let mut body = parse_body(html, &skip);

        if !self.prune(&mut body) {
            debug!("Entire body pruned");
            return Vec::new();
        }

        let blocks: Vec<DomElement> = body
            .children
            .into_iter()
            .filter_map(|c| match c {
                DomNode::Element(e) if !e.stripped_text().is_empty() => Some(e),
                _ => None,
            })
            .collect();
        debug!(blocks = blocks.len(), "Pruned content");
        blocks
    }

    /// Returns false when `el` itself should be removed.
    fn prune(&self, el: &mut DomElement) -> bool {
        let metrics = Metrics::of(el);
        let score = self.composite_score(el, &metrics);
        let threshold = match self.threshold_type {
            ThresholdType::Fixed => self.threshold,
            ThresholdType::Dynamic => self.dynamic_threshold(el, &metrics),
        };
        if score < threshold {
            return false;
        }

        el.children.retain_mut(|child| match child {
            DomNode::Element(e) => self.prune(e),
            DomNode::Text(_) => true,
        });
        true
    }

    fn dynamic_threshold(&self, el: &DomElement, m: &Metrics) -> f64 {
        let text_ratio = ratio(m.text_len, m.tag_len, 0.0);
        let link_ratio = ratio(m.link_text_len, m.text_len, 1.0);

        let mut threshold = self.threshold;
        if tag_importance(&el.name) > 1.0 {
            threshold *= 0.8;
        }
        if text_ratio > 0.4 {
            threshold *= 0.9;
        }
        if link_ratio > 0.6 {
            threshold *= 1.2;
        }
        threshold
    }

    fn composite_score(&self, el: &DomElement, m: &Metrics) -> f64 {
        if let Some(min_words) = self.min_word_threshold {
            let words = el.stripped_text().matches(' ').count() + 1;
            if words < min_words {
                return -1.0;
            }
        }

        let text_density = ratio(m.text_len, m.tag_len, 0.0);
        let link_density = 1.0 - ratio(m.link_text_len, m.text_len, 0.0);
        let class_score = class_id_weight(el).max(0.0);
        let length_score = ((m.text_len + 1) as f64).ln();

        let score = WEIGHT_TEXT_DENSITY * text_density
            + WEIGHT_LINK_DENSITY * link_density
            + WEIGHT_TAG * tag_weight(&el.name)
            + WEIGHT_CLASS_ID * class_score
            + WEIGHT_TEXT_LENGTH * length_score;
        let total = WEIGHT_TEXT_DENSITY
            + WEIGHT_LINK_DENSITY
            + WEIGHT_TAG
            + WEIGHT_CLASS_ID
            + WEIGHT_TEXT_LENGTH;
        score / total
    }
}

impl Metrics {
    fn of(el: &DomElement) -> Self {
        let link_text_len = el
            .elements()
            .filter(|c| c.name == "a")
            .map(|a| a.text().trim().chars().count())
            .sum();
        Self {
            text_len: el.stripped_text().chars().count(),
            tag_len: el.inner_html_len(),
            link_text_len,
        }
    }
}

fn ratio(num: usize, den: usize, empty: f64) -> f64 {
    if den == 0 {
        empty
    } else {
        num as f64 / den as f64
    }
}

fn tag_weight(name: &str) -> f64 {
    match name {
        "div" => 0.5,
        "p" => 1.0,
        "article" => 1.5,
        "section" => 1.0,
        "span" => 0.3,
        "li" | "ul" | "ol" => 0.5,
        "h1" => 1.2,
        "h2" => 1.1,
        "h3" => 1.0,
        "h4" => 0.9,
        "h5" => 0.8,
        "h6" => 0.7,
        _ => 0.5,
    }
}

fn tag_importance(name: &str) -> f64 {
    match name {
        "article" => 1.5,
        "main" | "h1" => 1.4,
        "section" | "h2" => 1.3,
        "p" | "h3" => 1.2,
        "span" => 0.6,
        _ => 0.7,
    }
}

fn class_id_weight(el: &DomElement) -> f64 {
    let mut score = 0.0;
    if let Some(class) = el.attr("class") {
        let joined = class.split_whitespace().collect::<Vec<_>>().join(" ");
        if NEGATIVE_PATTERNS.is_match(&joined) {
            score -= 0.5;
        }
    }
    if let Some(id) = el.attr("id") {
        if NEGATIVE_PATTERNS.is_match(id) {
            score -= 0.5;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<nav><a href="/">Home</a><a href="/about">About</a></nav>
<header><h1>Site name</h1></header>
<article>
  <h1>Squirro reports nearly 60% growth</h1>
  <p>The GenAI platform company said on Thursday that its annual recurring revenue grew by nearly sixty percent over the previous year, driven by enterprise adoption across banking and insurance customers.</p>
  <p>Executives attributed the growth to retrieval augmented generation products that let analysts query internal documents without moving data out of regulated environments.</p>
</article>
<div class="share-links"><a href="/x">Share on X</a><a href="/fb">Share on Facebook</a></div>
<footer><p>Copyright 2025</p></footer>
</body></html>"#;

    fn texts(blocks: &[DomElement]) -> String {
        blocks.iter().map(|b| b.text()).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_excluded_tags_never_survive() {
        let blocks = PruningContentFilter::new(0.0, ThresholdType::Fixed).filter_content(PAGE);
        let all = texts(&blocks);
        assert!(all.contains("annual recurring revenue"));
        assert!(!all.contains("Copyright"));
        assert!(!all.contains("Site name"));
        assert!(!all.contains("About"));
    }

    #[test]
    fn test_link_heavy_share_block_is_pruned() {
        let blocks = PruningContentFilter::new(0.8, ThresholdType::Fixed).filter_content(PAGE);
        let all = texts(&blocks);
        assert!(all.contains("Squirro reports nearly 60% growth"));
        assert!(all.contains("retrieval augmented generation"));
        assert!(!all.contains("Share on"));
    }

    #[test]
    fn test_very_high_threshold_prunes_everything() {
        let blocks = PruningContentFilter::new(10.0, ThresholdType::Fixed).filter_content(PAGE);
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_min_word_threshold_drops_short_blocks() {
        let filter = PruningContentFilter {
            threshold: 0.0,
            threshold_type: ThresholdType::Fixed,
            min_word_threshold: Some(3),
        };
        let blocks = filter.filter_content(
            "<body><p>Two words</p><p>This paragraph has plenty of words in it.</p></body>",
        );
        let all = texts(&blocks);
        assert!(!all.contains("Two words"));
        assert!(all.contains("plenty of words"));
    }

    #[test]
    fn test_dynamic_threshold_is_lower_for_important_tags() {
        let filter = PruningContentFilter::new(0.5, ThresholdType::Dynamic);
        let body = parse_body("<body><article><p>Some dense article text.</p></article></body>", &[]);
        let article = body.elements().next().unwrap();
        let m = Metrics::of(article);
        assert!(filter.dynamic_threshold(article, &m) < 0.5);
    }

    #[test]
    fn test_class_id_weight_matches_prefix_only() {
        let body = parse_body(
            r#"<body><div class="sidebar left"></div><div class="main sidebar"></div><div id="comments"></div></body>"#,
            &[],
        );
        let weights: Vec<f64> = body.elements().map(class_id_weight).collect();
        assert_eq!(weights, vec![-0.5, 0.0, -0.5]);
    }
}
