//! Legal code parser: splits a flat text file into fine-bearing articles.
//!
//! A line starting with the heading marker opens a new article; every
//! following line up to the next heading is its body. `\r\n` is read as
//! `\n`. Lines keep their own terminators when joined, so body lines end up
//! separated by blank lines.

use std::path::Path;

use finelaw_core::config::ParserConfig;
use finelaw_core::error::{FineLawError, Result};
use serde::{Deserialize, Serialize};

/// One article of the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Heading line without its line terminator. Stores built from raw
    /// heading lines (terminator included) embed slightly different inputs,
    /// though the rendered context is the same.
    pub title: String,
    /// Body lines joined with `\n`.
    pub text: String,
    /// Heuristic article number, see [`article_number`].
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    pub heading_marker: String,
    pub fine_keyword: String,
    pub include_trailing_article: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::from(&ParserConfig::default())
    }
}

impl From<&ParserConfig> for ParserOptions {
    fn from(config: &ParserConfig) -> Self {
        Self {
            heading_marker: config.heading_marker.clone(),
            fine_keyword: config.fine_keyword.clone(),
            include_trailing_article: config.include_trailing_article,
        }
    }
}

/// Read and parse a UTF-8 code file.
pub fn parse_file(path: &Path, options: &ParserOptions) -> Result<Vec<Article>> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8(bytes)
        .map_err(|e| FineLawError::Decode(format!("{} is not valid UTF-8: {e}", path.display())))?;
    Ok(parse_str(&content, options))
}

/// Split text into articles, keeping only those that mention the fine keyword.
///
/// Unless `include_trailing_article` is set, the article after the last
/// heading is never finalized and therefore never returned.
pub fn parse_str(content: &str, options: &ParserOptions) -> Vec<Article> {
    let content = content.replace("\r\n", "\n");
    let mut articles = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;
    let mut headings = 0usize;

    for line in content.split_inclusive('\n') {
        if line.starts_with(options.heading_marker.as_str()) {
            headings += 1;
            if let Some((title, body)) = current.take() {
                push_if_fined(&mut articles, title, &body, options);
            }
            current = Some((line, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if options.include_trailing_article {
        if let Some((title, body)) = current.take() {
            push_if_fined(&mut articles, title, &body, options);
        }
    }

    tracing::info!(
        "📜 Parsed {} headings, kept {} articles mentioning '{}'",
        headings,
        articles.len(),
        options.fine_keyword
    );
    articles
}

fn push_if_fined(articles: &mut Vec<Article>, title: &str, body: &[&str], options: &ParserOptions) {
    let text = body.join("\n");
    if !text.contains(options.fine_keyword.as_str()) {
        return;
    }
    let number = article_number(&text);
    articles.push(Article {
        title: title.trim_end_matches('\n').to_string(),
        text,
        number,
    });
}

/// First two whitespace-separated tokens, trailing periods stripped.
///
/// `"Статья 12.1. Управление ..."` → `"Статья 12.1"`. Not guaranteed to be
/// a real article number when the body does not start with one.
pub fn article_number(text: &str) -> String {
    let head: Vec<&str> = text.split_whitespace().take(2).collect();
    head.join(" ").trim_end_matches('.').to_string()
}
