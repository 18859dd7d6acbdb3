//! LLM-assisted article extraction.
//!
//! For each URL the page is rendered in the shared browser, reduced to
//! pruned ("fit") markdown, and handed to the hosted model together with a
//! fixed instruction and the [`Blog`] schema. The first element of the
//! returned JSON array becomes the exported record.
//!
//! # Failure handling
//!
//! Nothing is retried. A failed render or model call yields a record with
//! every content field null and the cause in `error`; a reply that is not
//! valid JSON yields the same shape with a `"JSON decode error: ..."` message.

use futures::future::join_all;
use serde_json::Value;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::api::AskAsync;
use crate::browser::PageRenderer;
use crate::config::ExtractSettings;
use crate::content::markdown::{MarkdownGenerator, MarkdownResult};
use crate::content::pruning::PruningContentFilter;
use crate::models::{ArticleRecord, Blog};
use crate::utils::{strip_code_fences, truncate_for_log};

/// Rough tokens-per-word ratio used to size chunks.
const TOKENS_PER_WORD: f64 = 1.3;

/// Asks the model to fill the [`Blog`] schema from page markdown.
#[derive(Debug)]
pub struct ExtractionStrategy<A> {
    asker: A,
    instruction: String,
    schema: Value,
    apply_chunking: bool,
    chunk_token_threshold: usize,
}

impl<A> ExtractionStrategy<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(asker: A, settings: &ExtractSettings) -> Self {
        Self {
            asker,
            instruction: settings.instruction.clone(),
            schema: Blog::json_schema(),
            apply_chunking: settings.apply_chunking,
            chunk_token_threshold: settings.chunk_token_threshold,
        }
    }

    fn build_prompt(&self, url: &str, content: &str) -> String {
        format!(
            "{instruction}\n\n\
             Return a JSON array of objects matching this JSON schema:\n{schema}\n\n\
             URL: {url}\n\n\
             Page content (markdown):\n<content>\n{content}\n</content>",
            instruction = self.instruction.trim(),
            schema = self.schema,
        )
    }

    /// Run extraction over `markdown` and return the model output as JSON
    /// text: an array when the model answered with objects, otherwise the
    /// value it sent.
    ///
    /// A reply that cannot be parsed is returned verbatim so the caller can
    /// report the decode error.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn extract(&self, url: &str, markdown: &str) -> Result<String, Box<dyn Error>> {
        let mut chunks = if self.apply_chunking {
            chunk_markdown(markdown, self.chunk_token_threshold)
        } else {
            vec![markdown.to_string()]
        };
        if chunks.is_empty() {
            chunks.push(String::new());
        }
        debug!(chunks = chunks.len(), "Sending markdown to model");

        let mut items = Vec::new();
        let mut first_other = None;
        for chunk in &chunks {
            let reply = self.asker.ask(&self.build_prompt(url, chunk)).await?;
            match normalize_reply(&reply) {
                Some(Value::Array(mut blocks)) => items.append(&mut blocks),
                Some(other) if chunks.len() == 1 => return Ok(other.to_string()),
                None if chunks.len() == 1 => return Ok(reply),
                Some(other) => {
                    warn!(reply = %truncate_for_log(&reply, 200), "Skipping non-list chunk reply");
                    first_other.get_or_insert(other.to_string());
                }
                None => {
                    warn!(reply = %truncate_for_log(&reply, 200), "Skipping unparseable chunk reply");
                    first_other.get_or_insert(reply);
                }
            }
        }

        match (items.is_empty(), first_other) {
            (true, Some(raw)) => Ok(raw),
            _ => Ok(Value::Array(items).to_string()),
        }
    }
}

/// Parse a model reply.
///
/// A lone object is wrapped into a one-element array; any other valid JSON
/// is returned as is. Returns `None` for invalid JSON.
fn normalize_reply(reply: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(strip_code_fences(reply)) {
        Ok(obj @ Value::Object(_)) => Some(Value::Array(vec![obj])),
        Ok(other) => Some(other),
        Err(_) => None,
    }
}

/// Split markdown on paragraph boundaries into chunks of at most
/// `token_threshold` estimated tokens. A single oversized paragraph becomes
/// its own chunk.
pub fn chunk_markdown(markdown: &str, token_threshold: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut tokens = 0.0;

    for para in markdown.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_tokens = para.split_whitespace().count() as f64 * TOKENS_PER_WORD;
        if !current.is_empty() && tokens + para_tokens > token_threshold as f64 {
            chunks.push(std::mem::take(&mut current));
            tokens = 0.0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
        tokens += para_tokens;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Outcome of crawling one URL.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub url: String,
    pub success: bool,
    pub markdown: Option<MarkdownResult>,
    pub extracted_content: Option<String>,
    pub error_message: Option<String>,
}

impl CrawlResult {
    fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            error_message: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Render, convert and extract, sharing one renderer across URLs.
pub struct Crawler<'r, R, A> {
    renderer: &'r R,
    generator: MarkdownGenerator,
    strategy: ExtractionStrategy<A>,
}

impl<'r, R, A> Crawler<'r, R, A>
where
    R: PageRenderer,
    A: AskAsync<Response = String>,
{
    pub fn new(renderer: &'r R, strategy: ExtractionStrategy<A>, settings: &ExtractSettings) -> Self {
        let mut filter =
            PruningContentFilter::new(settings.pruning.threshold, settings.pruning.threshold_type);
        filter.min_word_threshold = settings.pruning.min_word_threshold;
        Self {
            renderer,
            generator: MarkdownGenerator::new(Some(filter)),
            strategy,
        }
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn crawl(&self, url: &str) -> CrawlResult {
        let t0 = Instant::now();
        let html = match self.renderer.render(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Render failed");
                return CrawlResult::failed(url, e);
            }
        };

        let markdown = self.generator.generate(&html);
        debug!(
            raw_bytes = markdown.raw_markdown.len(),
            fit_bytes = markdown.fit_markdown.len(),
            preview = %truncate_for_log(&markdown.fit_markdown, 200),
            "Generated markdown"
        );

        let extraction = self.strategy.extract(url, &markdown.fit_markdown).await;
        match extraction {
            Ok(extracted) => {
                info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Crawl complete");
                CrawlResult {
                    url: url.to_string(),
                    success: true,
                    markdown: Some(markdown),
                    extracted_content: Some(extracted),
                    error_message: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Model extraction failed");
                CrawlResult {
                    markdown: Some(markdown),
                    ..CrawlResult::failed(url, e)
                }
            }
        }
    }
}

/// Build the exported record from a crawl outcome.
pub fn record_from_crawl(result: &CrawlResult) -> ArticleRecord {
    let url = result.url.as_str();
    if !result.success {
        let message = result
            .error_message
            .clone()
            .unwrap_or_else(|| "Unknown error".to_string());
        return ArticleRecord::failed(url, message);
    }
    match &result.extracted_content {
        Some(extracted) => record_from_extraction(url, extracted),
        None => ArticleRecord::failed(url, "JSON decode error: no extracted content"),
    }
}

/// Build a record from the extraction output (a JSON array string).
///
/// Fields come from the first array element; the URL is always the one that
/// was requested.
pub fn record_from_extraction(url: &str, extracted: &str) -> ArticleRecord {
    let data = match serde_json::from_str::<Value>(extracted) {
        Ok(data) => data,
        Err(e) => return ArticleRecord::failed(url, format!("JSON decode error: {e}")),
    };

    let first = match data {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) if first.is_object() => first,
            Some(_) => {
                return ArticleRecord::failed(url, "JSON decode error: first element is not an object");
            }
            None => return ArticleRecord::failed(url, "JSON decode error: empty result list"),
        },
        _ => return ArticleRecord::from_blog(url, Blog::default()),
    };

    match serde_json::from_value::<Blog>(first) {
        Ok(blog) => ArticleRecord::from_blog(url, blog),
        Err(e) => ArticleRecord::failed(url, format!("JSON decode error: {e}")),
    }
}

/// Extract every URL concurrently and return the records in input order.
#[instrument(level = "info", skip_all, fields(count = urls.len()))]
pub async fn run_bulk_extraction<R, A>(crawler: &Crawler<'_, R, A>, urls: &[String]) -> Vec<ArticleRecord>
where
    R: PageRenderer,
    A: AskAsync<Response = String>,
{
    let results = join_all(urls.iter().map(|url| crawler.crawl(url))).await;

    let mut records = Vec::with_capacity(results.len());
    for (idx, result) in results.iter().enumerate() {
        if let Some(markdown) = &result.markdown {
            debug!(
                url = %result.url,
                preview = %truncate_for_log(&markdown.raw_markdown, 300),
                "Raw markdown"
            );
        }
        let record = record_from_crawl(result);
        let pretty = serde_json::to_string_pretty(&record).unwrap_or_default();
        info!(result = idx + 1, total = urls.len(), record = %pretty, "Extraction result");
        records.push(record);
    }
    let failed = records.iter().filter(|r| r.is_error()).count();
    info!(total = records.len(), failed, "Finished extracting URLs");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::StaticRenderer;
    use crate::models::RecordError;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replies from a queue and records every prompt it was sent.
    #[derive(Default)]
    struct CannedAsker {
        replies: RefCell<VecDeque<Result<String, String>>>,
        prompts: RefCell<Vec<String>>,
    }

    impl CannedAsker {
        fn replying(replies: &[&str]) -> Self {
            Self {
                replies: RefCell::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                ..Self::default()
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                replies: RefCell::new(VecDeque::from([Err(message.to_string())])),
                ..Self::default()
            }
        }
    }

    impl AskAsync for CannedAsker {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.prompts.borrow_mut().push(text.to_string());
            match self.replies.borrow_mut().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(e.into()),
                None => Err("no canned reply left".into()),
            }
        }
    }

    const SAMPLE_MARKDOWN: &str = "# Tech billionaires bet on AI tutors\n\nFirst paragraph of the story.\n\nSecond paragraph.";

    const ARTICLE_HTML: &str = r#"<html><body>
<nav><a href="/">Home</a><a href="/world">World</a></nav>
<article>
  <h1>Tech billionaires bet on AI tutors</h1>
  <p>Investors say artificial intelligence tutors could become better than the most expensive private teachers within a few years, according to several founders interviewed this week.</p>
</article>
</body></html>"#;

    const URL: &str = "https://news.example.com/ai-tutors.html";

    #[tokio::test]
    async fn test_stubbed_reply_becomes_first_element() {
        let asker = CannedAsker::replying(&[
            r#"[{"url": "ignored", "title": "Tech billionaires bet on AI tutors", "date": "05-06-25", "author": "staff", "content": "First paragraph of the story.\n\nSecond paragraph."},
                {"title": "A second block"}]"#,
        ]);
        let strategy = ExtractionStrategy::new(asker, &ExtractSettings::default());

        let extracted = strategy.extract(URL, SAMPLE_MARKDOWN).await.unwrap();
        let record = record_from_extraction(URL, &extracted);

        assert_eq!(record.url, URL);
        assert_eq!(record.title.as_deref(), Some("Tech billionaires bet on AI tutors"));
        assert_eq!(record.date.as_deref(), Some("05-06-25"));
        assert_eq!(record.author.as_deref(), Some("staff"));
        assert_eq!(
            record.content.as_deref(),
            Some("First paragraph of the story.\n\nSecond paragraph.")
        );
        assert_eq!(record.error, None);

        let prompts = strategy.asker.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(SAMPLE_MARKDOWN));
        assert!(prompts[0].contains(URL));
        assert!(prompts[0].contains("The original article body, not summarized."));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_json_decode_error() {
        let asker = CannedAsker::replying(&[r#"{"title": "unterminated"#]);
        let strategy = ExtractionStrategy::new(asker, &ExtractSettings::default());

        let extracted = strategy.extract(URL, SAMPLE_MARKDOWN).await.unwrap();
        let record = record_from_extraction(URL, &extracted);

        assert!(record.title.is_none());
        assert!(record.date.is_none());
        assert!(record.author.is_none());
        assert!(record.content.is_none());
        match record.error {
            Some(RecordError::Message(msg)) => assert!(msg.contains("JSON decode error")),
            other => panic!("unexpected error field: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_object_reply_in_code_fence_is_wrapped() {
        let asker = CannedAsker::replying(&["```json\n{\"title\": \"Fenced\"}\n```"]);
        let strategy = ExtractionStrategy::new(asker, &ExtractSettings::default());

        let extracted = strategy.extract(URL, SAMPLE_MARKDOWN).await.unwrap();
        assert_eq!(extracted, r#"[{"title":"Fenced"}]"#);
    }

    #[tokio::test]
    async fn test_scalar_reply_yields_nulls_without_error() {
        let asker = CannedAsker::replying(&[r#""sorry, no article here""#]);
        let strategy = ExtractionStrategy::new(asker, &ExtractSettings::default());

        let extracted = strategy.extract(URL, SAMPLE_MARKDOWN).await.unwrap();
        let record = record_from_extraction(URL, &extracted);

        assert_eq!(extracted, r#""sorry, no article here""#);
        assert!(record.title.is_none());
        assert!(record.content.is_none());
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_record_uses_requested_url_and_stringifies_scalars() {
        let record = record_from_extraction(
            URL,
            r#"[{"url": "https://elsewhere.example", "title": "T", "date": 2025}]"#,
        );
        assert_eq!(record.url, URL);
        assert_eq!(record.title.as_deref(), Some("T"));
        assert_eq!(record.date.as_deref(), Some("2025"));
        assert!(record.author.is_none());
    }

    #[test]
    fn test_empty_array_is_decode_error() {
        let record = record_from_extraction(URL, "[]");
        assert!(matches!(record.error, Some(RecordError::Message(ref m)) if m.starts_with("JSON decode error")));
    }

    #[test]
    fn test_non_array_json_yields_nulls_without_error() {
        let record = record_from_extraction(URL, r#""just a string""#);
        assert!(record.title.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_unsuccessful_crawl_without_message_is_unknown_error() {
        let result = CrawlResult {
            url: URL.to_string(),
            ..CrawlResult::default()
        };
        let record = record_from_crawl(&result);
        assert_eq!(record.error, Some(RecordError::Message("Unknown error".to_string())));
    }

    #[test]
    fn test_chunk_markdown_respects_threshold() {
        let para = "word ".repeat(10);
        let markdown = vec![para.trim(); 5].join("\n\n");
        // 10 words ≈ 13 tokens per paragraph; two fit under 30.
        let chunks = chunk_markdown(&markdown, 30);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].split("\n\n").count(), 2);
        assert_eq!(chunks[2].split("\n\n").count(), 1);
    }

    #[test]
    fn test_chunk_markdown_keeps_oversized_paragraph_whole() {
        let big = "token ".repeat(100);
        let chunks = chunk_markdown(&format!("small\n\n{}", big.trim()), 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].split_whitespace().count(), 100);
    }

    #[tokio::test]
    async fn test_chunked_extraction_concatenates_results() {
        let asker = CannedAsker::replying(&[r#"[{"title": "A"}]"#, r#"{"title": "B"}"#]);
        let settings = ExtractSettings {
            apply_chunking: true,
            chunk_token_threshold: 3,
            ..ExtractSettings::default()
        };
        let strategy = ExtractionStrategy::new(asker, &settings);

        let extracted = strategy.extract(URL, "one two\n\nthree four").await.unwrap();
        assert_eq!(extracted, r#"[{"title":"A"},{"title":"B"}]"#);
        assert_eq!(strategy.asker.prompts.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_sends_pruned_markdown() {
        let renderer = StaticRenderer::default().with_page(URL, ARTICLE_HTML);
        let asker = CannedAsker::replying(&[r#"[{"title": "Tech billionaires bet on AI tutors"}]"#]);
        let settings = ExtractSettings::default();
        let crawler = Crawler::new(&renderer, ExtractionStrategy::new(asker, &settings), &settings);

        let result = crawler.crawl(URL).await;

        assert!(result.success);
        let markdown = result.markdown.unwrap();
        assert!(markdown.fit_markdown.contains("# Tech billionaires bet on AI tutors"));
        assert!(!markdown.fit_markdown.contains("World"));
        let prompt = &crawler.strategy.asker.prompts.borrow()[0];
        assert!(prompt.contains("expensive private teachers"));
        assert!(!prompt.contains("[World](/world)"));
    }

    #[tokio::test]
    async fn test_model_failure_is_reported_in_record() {
        let renderer = StaticRenderer::default().with_page(URL, ARTICLE_HTML);
        let settings = ExtractSettings::default();
        let crawler = Crawler::new(
            &renderer,
            ExtractionStrategy::new(CannedAsker::failing("model API returned 503"), &settings),
            &settings,
        );

        let record = record_from_crawl(&crawler.crawl(URL).await);
        assert_eq!(
            record.error,
            Some(RecordError::Message("model API returned 503".to_string()))
        );
        assert!(record.content.is_none());
    }

    #[tokio::test]
    async fn test_bulk_extraction_keeps_input_order() {
        let ok_url = "https://news.example.com/ok";
        let down_url = "https://news.example.com/down";
        let renderer = StaticRenderer::default()
            .with_page(ok_url, ARTICLE_HTML)
            .with_failure(down_url);
        let settings = ExtractSettings::default();
        let asker = CannedAsker::replying(&[r#"[{"title": "OK"}]"#]);
        let crawler = Crawler::new(&renderer, ExtractionStrategy::new(asker, &settings), &settings);

        let urls = vec![down_url.to_string(), ok_url.to_string()];
        let records = run_bulk_extraction(&crawler, &urls).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, down_url);
        assert!(records[0].is_error());
        assert!(matches!(&records[0].error, Some(RecordError::Message(m)) if m.contains("ERR_CONNECTION_REFUSED")));
        assert_eq!(records[1].url, ok_url);
        assert_eq!(records[1].title.as_deref(), Some("OK"));
    }
}
