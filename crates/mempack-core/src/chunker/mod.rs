//! Semantic chunker.
//!
//! Deliberately NOT built on a parser-generator or AST library: each
//! supported language is a small hand-written, line-oriented state
//! machine that recognizes top-level declarations by column and keyword,
//! tracking only paren/brace depth to find where a span ends. Any file
//! that yields zero semantic chunks falls back to greedy line-mode
//! packing, so every file produces at least one chunk.

mod python;
mod typescript;

use crate::tokenizer::TokenCounter;
use crate::types::{ChunkType, SemanticChunk};

/// Split `content` into semantic chunks.
///
/// `path` is used only for extension-based language dispatch. `max_tokens`
/// bounds line-mode packing; `overlap_tokens` controls how much trailing
/// context carries into the next line-mode chunk. Oversized semantic
/// chunks (a function body bigger than `max_tokens`) are kept whole --
/// this chunker never splits a recognized declaration.
#[must_use]
pub fn chunk_file(
    path: &std::path::Path,
    content: &str,
    max_tokens: usize,
    overlap_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<SemanticChunk> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let semantic = match ext {
        "py" => python::chunk(content),
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => typescript::chunk(content),
        _ => Vec::new(),
    };

    if semantic.is_empty() {
        line_mode_chunk(content, max_tokens, overlap_tokens, counter)
    } else {
        semantic
    }
}

/// Greedy line-mode fallback: accumulate whole lines until the next line
/// would exceed `max_tokens`, emit, then step back `overlap_tokens` worth
/// of trailing lines before resuming. Always makes forward progress, even
/// when a single line alone exceeds `max_tokens`.
fn line_mode_chunk(
    content: &str,
    max_tokens: usize,
    overlap_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<SemanticChunk> {
    let lines: Vec<&str> = content.split('\n').collect();
    let n = lines.len();
    if n == 0 || (n == 1 && lines[0].is_empty()) {
        return Vec::new();
    }

    let line_tokens: Vec<usize> = lines.iter().map(|l| counter.count(l.as_bytes())).collect();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < n {
        let mut idx = start;
        let mut used = 0usize;
        while idx < n {
            let candidate = used + line_tokens[idx];
            if candidate > max_tokens && idx > start {
                break;
            }
            used = candidate;
            idx += 1;
        }
        let end = idx;

        let body = lines[start..end].join("\n");
        chunks.push(SemanticChunk {
            chunk_type: ChunkType::Line,
            symbol_name: String::new(),
            start_line: start + 1,
            end_line: end,
            body,
        });

        if end >= n {
            break;
        }

        let mut back = end;
        let mut overlap = 0usize;
        while back > start && overlap < overlap_tokens {
            back -= 1;
            overlap += line_tokens[back];
        }
        start = if back <= start { end } else { back };
    }

    chunks
}

/// True if `line` is empty once surrounding whitespace is stripped.
fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// True if `line` is a `#`-prefixed comment, ignoring leading whitespace.
fn is_py_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Leading-whitespace width, in bytes (tabs counted as one column; this
/// chunker only needs to distinguish column 0 from anything indented).
fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Parse a leading identifier (`[A-Za-z_][A-Za-z0-9_]*`) from `s`.
fn parse_identifier(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Net bracket depth contributed by `line`: `(`, `{`, `[` each +1; their
/// closing counterparts each -1. Does not account for brackets inside
/// string or comment literals -- acceptable for the declarations this
/// chunker targets, which rarely carry unbalanced brackets in strings.
fn bracket_delta(line: &str) -> i64 {
    let mut delta = 0i64;
    for c in line.chars() {
        match c {
            '(' | '{' | '[' => delta += 1,
            ')' | '}' | ']' => delta -= 1,
            _ => {}
        }
    }
    delta
}
