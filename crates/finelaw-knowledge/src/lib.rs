//! # FineLaw Knowledge
//!
//! Turns a legal code text file into a queryable article index.
//!
//! ## How it works
//! ```text
//! koap.txt
//!   ↓ parser: split on "Статья", keep articles mentioning "штраф"
//! Vec<Article>
//!   ↓ store: embed titles once, persist to <save_path>/finelaw.sqlite3
//! KnowledgeStore
//!   ↓ retrieve("превышение скорости", 3)
//! "Статья 12.9. ...\nтекст\n\nСтатья ...\n"
//! ```

pub mod embedding;
pub mod parser;
pub mod search;
pub mod store;

pub use embedding::HttpEmbedder;
pub use parser::{Article, ParserOptions, parse_file, parse_str};
pub use search::{SearchResult, render_context};
pub use store::KnowledgeStore;
