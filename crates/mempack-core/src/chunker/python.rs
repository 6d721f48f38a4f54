//! Python chunking mode: recognizes top-level `def`, `async def`,
//! and `class` statements, grouping any immediately preceding decorator
//! block (including multi-line decorators with parenthesized arguments)
//! into the same chunk.

use super::{bracket_delta, indent_width, is_blank, is_py_comment, parse_identifier};
use crate::types::{ChunkType, SemanticChunk};

/// Chunk a Python source file.
#[must_use]
pub fn chunk(content: &str) -> Vec<SemanticChunk> {
    let lines: Vec<&str> = content.split('\n').collect();
    let n = lines.len();
    let mut chunks = Vec::new();

    let mut i = 0usize;
    let mut decorator_start: Option<usize> = None;

    while i < n {
        let line = lines[i];

        if indent_width(line) == 0 && line.trim_start().starts_with('@') {
            if decorator_start.is_none() {
                decorator_start = Some(i);
            }
            i = consume_decorator(&lines, i);
            continue;
        }

        if indent_width(line) == 0 && is_blank(line) {
            if decorator_start.is_some() {
                i += 1;
                continue;
            }
            i += 1;
            continue;
        }

        if indent_width(line) == 0 {
            if let Some((chunk_type, rest)) = match_declaration(line) {
                let symbol_name = parse_identifier(rest);
                let start = decorator_start.take().unwrap_or(i);

                let mut j = i + 1;
                while j < n {
                    let candidate = lines[j];
                    if indent_width(candidate) == 0 && !is_blank(candidate) && !is_py_comment(candidate) {
                        break;
                    }
                    j += 1;
                }

                let body = lines[start..j].join("\n");
                chunks.push(SemanticChunk {
                    chunk_type,
                    symbol_name,
                    start_line: start + 1,
                    end_line: j,
                    body,
                });

                i = j;
                continue;
            }
        }

        decorator_start = None;
        i += 1;
    }

    chunks
}

/// Match a top-level `def`, `async def`, or `class` introduction, returning
/// the chunk type and the remainder of the line after the keyword.
fn match_declaration(line: &str) -> Option<(ChunkType, &str)> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("async def ") {
        Some((ChunkType::Function, rest))
    } else if let Some(rest) = trimmed.strip_prefix("def ") {
        Some((ChunkType::Function, rest))
    } else if let Some(rest) = trimmed.strip_prefix("class ") {
        Some((ChunkType::Class, rest))
    } else {
        None
    }
}

/// Consume a (possibly multi-line) decorator statement starting at line
/// `i`, returning the index of the first line after it.
fn consume_decorator(lines: &[&str], i: usize) -> usize {
    let mut depth = bracket_delta(lines[i]);
    let mut j = i + 1;
    while depth > 0 && j < lines.len() {
        depth += bracket_delta(lines[j]);
        j += 1;
    }
    j
}
