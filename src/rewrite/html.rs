// src/rewrite/html.rs
// =============================================================================
// This module localizes the references in an HTML page.
//
// For every <a href>, <link href>, <script src> and <img src> on the page:
// 1. Resolve the attribute against the page URL
// 2. Skip it if it points to another host (external references stay as-is)
// 3. Map it to a local path and download it there
// 4. Point the attribute at that local path (relative to the output root)
//
// The page goes through `lol_html` twice, with the same element visitor:
// - the first pass only collects references in document order, so we can
//   decide what to download (this needs async IO, so it happens before any
//   rewriting)
// - the second pass streams the original text through and swaps only the
//   attribute values we decided on, leaving everything else untouched
//
// Both passes read attribute values through one helper that decodes HTML
// entities, so they always agree on what an attribute points to.
//
// Rust concepts:
// - Enums with methods: ElementKind knows its tag and attribute
// - Lifetimes: Rewriter borrows the crawl state instead of owning it
// - Closures: lol_html calls our handler for each matching element
// =============================================================================

use anyhow::{anyhow, Context, Result};
use html_escape::decode_html_entities;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, text, HandlerResult, HtmlRewriter, Settings};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use url::Url;

use crate::fetch::{self, Fetcher};
use crate::mapper::{self, SiteScope};
use crate::output::OutputRoot;

// Prefixes of references that never point at a downloadable resource
const SKIPPED_PREFIXES: [&str; 4] = ["mailto:", "tel:", "javascript:", "data:"];

/// Attribute that carries an element's reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceAttr {
    Href,
    Src,
}

impl ReferenceAttr {
    pub fn name(self) -> &'static str {
        match self {
            ReferenceAttr::Href => "href",
            ReferenceAttr::Src => "src",
        }
    }
}

/// Elements whose reference gets localized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// `<a href>`
    Anchor,
    /// `<link href>`: stylesheets, but also icons and preloads
    StylesheetLink,
    /// `<script src>`
    Script,
    /// `<img src>`
    Image,
}

impl ElementKind {
    pub fn attr(self) -> ReferenceAttr {
        match self {
            ElementKind::Anchor | ElementKind::StylesheetLink => ReferenceAttr::Href,
            ElementKind::Script | ElementKind::Image => ReferenceAttr::Src,
        }
    }

    // CSS selector matching this kind of element when it carries its attribute
    fn selector(self) -> &'static str {
        match self {
            ElementKind::Anchor => "a[href]",
            ElementKind::StylesheetLink => "link[href]",
            ElementKind::Script => "script[src]",
            ElementKind::Image => "img[src]",
        }
    }
}

// A reference found on a page, already resolved to an absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ElementKind,
    pub url: Url,
}

// What rewriting a page produced
#[derive(Debug, Clone, Default)]
pub struct RewrittenDocument {
    /// The page with its same-origin references pointing at local files
    pub html: String,
    /// Same-origin anchor targets, in document order
    pub anchors: Vec<Url>,
    /// Number of resources downloaded while rewriting
    pub localized: usize,
    /// Number of resources that could not be downloaded
    pub failures: usize,
}

// Rewrites pages for one crawl
//
// Borrows everything from the crawl session: the site scope, the output
// directory, the fetcher, and the set of pages already saved (those are not
// downloaded again, which would overwrite their rewritten copy).
pub struct Rewriter<'a> {
    scope: &'a SiteScope,
    output: &'a OutputRoot,
    fetcher: &'a dyn Fetcher,
    saved_pages: &'a HashSet<String>,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        scope: &'a SiteScope,
        output: &'a OutputRoot,
        fetcher: &'a dyn Fetcher,
        saved_pages: &'a HashSet<String>,
    ) -> Self {
        Self {
            scope,
            output,
            fetcher,
            saved_pages,
        }
    }

    // Localizes every same-origin reference in `html`
    //
    // Parameters:
    //   html: the page text
    //   base: the page URL (for resolving relative references)
    //
    // Downloads happen one at a time, in document order. A failed download is
    // logged and counted; the attribute is rewritten anyway.
    pub async fn rewrite(&self, html: &str, base: &Url) -> Result<RewrittenDocument> {
        let mut document = RewrittenDocument::default();
        let mut replacements: HashMap<String, String> = HashMap::new();
        let mut requested: HashSet<String> = HashSet::new();

        for reference in extract_references(html, base)? {
            if !self.scope.contains(&reference.url) {
                debug!(url = %reference.url, "Skipping external reference");
                continue;
            }

            let path = self.output.local_path(&reference.url);
            let Some(relative) = mapper::relative_reference(&path, self.output.path()) else {
                continue;
            };

            if reference.kind == ElementKind::Anchor {
                document.anchors.push(reference.url.clone());
            }
            replacements.insert(mapper::resource_key(&reference.url), relative);

            let key = mapper::page_key(&reference.url);
            if self.saved_pages.contains(&key) && path.exists() {
                debug!(url = %reference.url, "Already saved, not downloading again");
                continue;
            }
            if !requested.insert(key) {
                continue;
            }

            if let Err(e) = self.output.make_room(&path).await {
                warn!(url = %reference.url, path = %path.display(), error = %e, "Cannot prepare local path");
                document.failures += 1;
                continue;
            }

            if fetch::download(self.fetcher, &reference.url, &path).await {
                document.localized += 1;
            } else {
                document.failures += 1;
            }
        }

        document.html = retarget_references(html, base, &replacements)?;
        Ok(document)
    }
}

// Returns the page's references in document order
//
// Elements without their reference attribute, and references that are empty,
// fragment-only or use a non-fetchable scheme, are skipped.
pub fn extract_references(html: &str, base: &Url) -> Result<Vec<Reference>> {
    let mut references = Vec::new();

    visit_references(html, &mut |kind: ElementKind, el: &mut Element<'_, '_>| {
        if let Some(url) = reference_url(el, kind, base) {
            references.push(Reference { kind, url });
        }
        Ok(())
    })?;

    Ok(references)
}

// Reads an element's reference attribute (entities decoded) and resolves it
fn reference_url(el: &Element<'_, '_>, kind: ElementKind, base: &Url) -> Option<Url> {
    let raw = el.get_attribute(kind.attr().name())?;
    resolve_reference(base, &decode_html_entities(&raw))
}

// Resolves an attribute value against the page URL
//
// Examples:
//   base = "https://example.com/docs/page"
//   "/about"          -> Some("https://example.com/about")
//   "../img/a.png"    -> Some("https://example.com/img/a.png")
//   "#section"        -> None (same page)
//   "mailto:x@y.com"  -> None (not a resource)
fn resolve_reference(base: &Url, value: &str) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }

    let lowered = value.to_ascii_lowercase();
    if SKIPPED_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix)) {
        return None;
    }

    let mut url = base.join(value).ok()?;
    url.set_fragment(None);
    Some(url)
}

// Streams `html` through lol_html, replacing the attribute of every element
// whose resolved reference has an entry in `replacements`
fn retarget_references(
    html: &str,
    base: &Url,
    replacements: &HashMap<String, String>,
) -> Result<String> {
    if replacements.is_empty() {
        return Ok(html.to_string());
    }

    visit_references(html, &mut |kind: ElementKind, el: &mut Element<'_, '_>| {
        let Some(url) = reference_url(el, kind, base) else {
            return Ok(());
        };
        if let Some(relative) = replacements.get(&mapper::resource_key(&url)) {
            el.set_attribute(kind.attr().name(), relative)?;
        }
        Ok(())
    })
}

// Streams `html` through lol_html, calling `visit` for every element of one
// of our kinds that carries its reference attribute, and returns the output
//
// The content of <noscript> may reach us as raw text rather than markup, so
// it is buffered and run through this same function before being emitted.
fn visit_references<F>(html: &str, visit: &mut F) -> Result<String>
where
    F: FnMut(ElementKind, &mut Element<'_, '_>) -> HandlerResult,
{
    let visit = RefCell::new(visit);
    let noscript = RefCell::new(String::new());
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!(ElementKind::Anchor.selector(), |el| {
                    (**visit.borrow_mut())(ElementKind::Anchor, el)
                }),
                element!(ElementKind::StylesheetLink.selector(), |el| {
                    (**visit.borrow_mut())(ElementKind::StylesheetLink, el)
                }),
                element!(ElementKind::Script.selector(), |el| {
                    (**visit.borrow_mut())(ElementKind::Script, el)
                }),
                element!(ElementKind::Image.selector(), |el| {
                    (**visit.borrow_mut())(ElementKind::Image, el)
                }),
                text!("noscript", |chunk| {
                    noscript.borrow_mut().push_str(chunk.as_str());
                    if !chunk.last_in_text_node() {
                        chunk.remove();
                        return Ok(());
                    }

                    let content = std::mem::take(&mut *noscript.borrow_mut());
                    let mut guard = visit.borrow_mut();
                    let rewritten = visit_references(&content, &mut **guard)?;
                    chunk.replace(&rewritten, ContentType::Html);
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| anyhow!("HTML rewrite error: {}", e))?;
    rewriter
        .end()
        .map_err(|e| anyhow!("HTML rewrite finalization error: {}", e))?;

    String::from_utf8(output).context("Invalid UTF-8 in rewritten HTML")
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why stream the page twice?
//    - Deciding what to download needs .await (network IO)
//    - lol_html calls our handlers synchronously while streaming
//    - So the first pass only collects references, we download them, and the
//      second pass rewrites with a ready-made lookup table
//
// 2. What does the lookup table key on?
//    - The resolved URL without query and fragment
//    - Every URL with the same key maps to the same local file, so both
//      passes agree on the new attribute value
//
// 3. Why a RefCell around the visitor?
//    - Each lol_html handler is its own closure, but all of them call the
//      same visitor, which needs &mut access
//    - RefCell hands out that &mut access at runtime, one handler at a time
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use tempfile::TempDir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn setup() -> (TempDir, OutputRoot, SiteScope) {
        let dir = TempDir::new().unwrap();
        let output = OutputRoot::new(dir.path().join("site"));
        let scope = SiteScope::new(&url("http://example.com/")).unwrap();
        (dir, output, scope)
    }

    #[test]
    fn test_extract_references_in_document_order() {
        let html = r#"
            <html><head>
                <link rel="stylesheet" href="/css/app.css">
                <script src="/js/app.js"></script>
            </head><body>
                <a href="/about">About</a>
                <img src="logo.png">
                <img alt="no source">
            </body></html>
        "#;
        let refs = extract_references(html, &url("http://example.com/")).unwrap();

        let found: Vec<(ElementKind, &str)> = refs.iter().map(|r| (r.kind, r.url.as_str())).collect();
        assert_eq!(
            found,
            vec![
                (ElementKind::StylesheetLink, "http://example.com/css/app.css"),
                (ElementKind::Script, "http://example.com/js/app.js"),
                (ElementKind::Anchor, "http://example.com/about"),
                (ElementKind::Image, "http://example.com/logo.png"),
            ]
        );
    }

    #[test]
    fn test_extract_skips_non_resources() {
        let html = r##"
            <a href="#top">Top</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:123">Call</a>
            <a href="JavaScript:void(0)">Nothing</a>
            <img src="data:image/png;base64,AAAA">
            <a href="">Empty</a>
        "##;
        assert!(extract_references(html, &url("http://example.com/")).unwrap().is_empty());
    }

    #[test]
    fn test_extract_resolves_relative_and_drops_fragment() {
        let html = r#"<a href="../guide/start#install">Start</a>"#;
        let refs = extract_references(html, &url("http://example.com/docs/page")).unwrap();
        assert_eq!(refs[0].url.as_str(), "http://example.com/guide/start");
    }

    #[test]
    fn test_element_kinds_use_their_attribute() {
        assert_eq!(ElementKind::Anchor.attr(), ReferenceAttr::Href);
        assert_eq!(ElementKind::StylesheetLink.attr(), ReferenceAttr::Href);
        assert_eq!(ElementKind::Script.attr(), ReferenceAttr::Src);
        assert_eq!(ElementKind::Image.attr(), ReferenceAttr::Src);
    }

    #[tokio::test]
    async fn test_localizes_same_origin_assets() {
        let (_dir, output, scope) = setup();
        let fetcher = StaticFetcher::new()
            .with("http://example.com/css/app.css", "body {}")
            .with("http://example.com/js/app.js", "console.log(1)")
            .with("http://example.com/img/logo.png", vec![0x89, 0x50, 0x4e, 0x47]);
        let saved = HashSet::new();
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<html><head><link rel="stylesheet" href="/css/app.css"><script src="/js/app.js"></script></head><body><img src="/img/logo.png" alt="Logo"></body></html>"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/")).await.unwrap();

        assert!(doc.html.contains(r#"href="css/app.css""#));
        assert!(doc.html.contains(r#"src="js/app.js""#));
        assert!(doc.html.contains(r#"src="img/logo.png""#));
        assert!(doc.html.contains(r#"alt="Logo""#));
        assert_eq!(doc.localized, 3);
        assert_eq!(doc.failures, 0);
        assert!(doc.anchors.is_empty());

        assert_eq!(
            std::fs::read_to_string(output.path().join("css/app.css")).unwrap(),
            "body {}"
        );
        assert!(output.path().join("js/app.js").exists());
        assert!(output.path().join("img/logo.png").exists());
    }

    #[tokio::test]
    async fn test_external_references_are_untouched_and_not_fetched() {
        let (_dir, output, scope) = setup();
        let fetcher = StaticFetcher::new();
        let saved = HashSet::new();
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<p>Hi</p><img src="https://cdn.other.com/x.png"><a href="https://other.org/page">Out</a>"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/")).await.unwrap();

        assert_eq!(doc.html, html);
        assert!(fetcher.requests().is_empty());
        assert!(doc.anchors.is_empty());
    }

    #[tokio::test]
    async fn test_anchor_is_localized_and_reported() {
        let (_dir, output, scope) = setup();
        let fetcher = StaticFetcher::new().with("http://example.com/about", "<h1>About</h1>");
        let saved = HashSet::new();
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<a href="/about">About us</a>"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/")).await.unwrap();

        assert_eq!(doc.html, r#"<a href="about.html">About us</a>"#);
        assert_eq!(doc.anchors, vec![url("http://example.com/about")]);
        assert_eq!(
            std::fs::read_to_string(output.path().join("about.html")).unwrap(),
            "<h1>About</h1>"
        );
    }

    #[test]
    fn test_extract_decodes_entities() {
        let html = r#"<img src="/tom&amp;jerry.png"><a href="/search?q=a&amp;b=c">Search</a>"#;
        let refs = extract_references(html, &url("http://example.com/")).unwrap();

        assert_eq!(refs[0].url.as_str(), "http://example.com/tom&jerry.png");
        assert_eq!(refs[1].url.as_str(), "http://example.com/search?q=a&b=c");
    }

    #[test]
    fn test_extract_finds_references_inside_noscript() {
        let html = r#"<noscript><img src="/ns.png"></noscript><img src="/after.png">"#;
        let refs = extract_references(html, &url("http://example.com/")).unwrap();

        let found: Vec<&str> = refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            found,
            vec!["http://example.com/ns.png", "http://example.com/after.png"]
        );
    }

    #[tokio::test]
    async fn test_entity_in_path_is_downloaded_and_rewritten() {
        let (_dir, output, scope) = setup();
        let fetcher = StaticFetcher::new().with("http://example.com/tom&jerry.png", "png");
        let saved = HashSet::new();
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<img src="/tom&amp;jerry.png">"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/")).await.unwrap();

        assert_eq!(fetcher.requests(), vec!["http://example.com/tom&jerry.png".to_string()]);
        assert!(output.path().join("tom&jerry.png").exists());
        assert!(!doc.html.contains("/tom"), "not rewritten: {}", doc.html);
        assert!(doc.html.contains(r#"src="tom&"#), "unexpected value: {}", doc.html);
    }

    #[tokio::test]
    async fn test_noscript_image_is_localized() {
        let (_dir, output, scope) = setup();
        let fetcher = StaticFetcher::new().with("http://example.com/ns.png", "png");
        let saved = HashSet::new();
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<body><noscript><img src="/ns.png" alt="fallback"></noscript><p>Hi</p></body>"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/")).await.unwrap();

        assert_eq!(fetcher.request_count("http://example.com/ns.png"), 1);
        assert!(output.path().join("ns.png").exists());
        assert!(doc.html.contains(r#"src="ns.png""#), "not rewritten: {}", doc.html);
        assert!(doc.html.contains("<noscript>"));
        assert!(doc.html.contains("</noscript><p>Hi</p></body>"));
    }

    #[tokio::test]
    async fn test_failed_download_still_rewrites_attribute() {
        let (_dir, output, scope) = setup();
        let fetcher = StaticFetcher::new();
        let saved = HashSet::new();
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<img src="/missing.png">"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/")).await.unwrap();

        assert_eq!(doc.html, r#"<img src="missing.png">"#);
        assert_eq!(doc.localized, 0);
        assert_eq!(doc.failures, 1);
        assert!(!output.path().join("missing.png").exists());
    }

    #[tokio::test]
    async fn test_repeated_reference_is_downloaded_once() {
        let (_dir, output, scope) = setup();
        let fetcher = StaticFetcher::new().with("http://example.com/logo.png", "png");
        let saved = HashSet::new();
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<img src="/logo.png"><img src="logo.png#again">"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/")).await.unwrap();

        assert_eq!(fetcher.request_count("http://example.com/logo.png"), 1);
        assert_eq!(doc.html, r#"<img src="logo.png"><img src="logo.png">"#);
    }

    #[tokio::test]
    async fn test_saved_pages_are_not_downloaded_again() {
        let (_dir, output, scope) = setup();
        std::fs::create_dir_all(output.path()).unwrap();
        std::fs::write(output.path().join("index.html"), "rewritten home").unwrap();

        let fetcher = StaticFetcher::new().with("http://example.com/", "raw home");
        let mut saved = HashSet::new();
        saved.insert("http://example.com/".to_string());
        let rewriter = Rewriter::new(&scope, &output, &fetcher, &saved);

        let html = r#"<a href="/">Home</a>"#;
        let doc = rewriter.rewrite(html, &url("http://example.com/about")).await.unwrap();

        assert_eq!(doc.html, r#"<a href="index.html">Home</a>"#);
        assert!(fetcher.requests().is_empty());
        assert_eq!(
            std::fs::read_to_string(output.path().join("index.html")).unwrap(),
            "rewritten home"
        );
    }
}
