//! TypeScript/JavaScript chunking mode: recognizes top-level
//! `interface`, `class`, `function`, and arrow-function-assigned `const`
//! declarations, grouping any immediately preceding decorator block the
//! same way the Python mode does. Spans close on balanced paren/brace
//! depth, so multi-line signatures and bodies are handled uniformly.

use super::{bracket_delta, indent_width, is_blank, parse_identifier};
use crate::types::{ChunkType, SemanticChunk};

/// Chunk a TypeScript or JavaScript source file.
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
            i += 1;
            continue;
        }

        if indent_width(line) == 0 {
            if let Some((chunk_type, name)) = match_declaration(line) {
                let start = decorator_start.take().unwrap_or(i);

                let mut depth: i64 = 0;
                let mut seen_open = false;
                let mut j = i;
                loop {
                    depth += bracket_delta(lines[j]);
                    if has_open_bracket(lines[j]) {
                        seen_open = true;
                    }
                    let at_end = (seen_open && depth == 0) || j + 1 >= n;
                    if at_end {
                        break;
                    }
                    j += 1;
                }

                let body = lines[start..=j].join("\n");
                chunks.push(SemanticChunk {
                    chunk_type,
                    symbol_name: name,
                    start_line: start + 1,
                    end_line: j + 1,
                    body,
                });

                i = j + 1;
                continue;
            }
        }

        decorator_start = None;
        i += 1;
    }

    chunks
}

/// Strip a leading `export` and/or `default` keyword.
fn strip_export_default(line: &str) -> &str {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
    line.strip_prefix("default ").unwrap_or(line).trim_start()
}

/// Match a top-level declaration, returning its chunk type and symbol name.
fn match_declaration(line: &str) -> Option<(ChunkType, String)> {
    let rest = strip_export_default(line);

    if let Some(tail) = rest.strip_prefix("interface ") {
        return Some((ChunkType::Interface, parse_identifier(tail)));
    }
    if let Some(tail) = rest.strip_prefix("abstract class ") {
        return Some((ChunkType::Class, parse_identifier(tail)));
    }
    if let Some(tail) = rest.strip_prefix("class ") {
        return Some((ChunkType::Class, parse_identifier(tail)));
    }
    if let Some(tail) = rest.strip_prefix("async function ") {
        return Some((ChunkType::Function, parse_identifier(tail)));
    }
    if let Some(tail) = rest.strip_prefix("function ") {
        return Some((ChunkType::Function, parse_identifier(tail)));
    }

    for kw in ["const ", "let ", "var "] {
        if let Some(tail) = rest.strip_prefix(kw) {
            let name = parse_identifier(tail);
            if !name.is_empty() && looks_like_arrow_assignment(tail) {
                return Some((ChunkType::Function, name));
            }
        }
    }

    None
}

/// Heuristic: does this `const NAME ... = ...` declaration look like it
/// assigns an arrow function, possibly with a type annotation and an
/// `async` keyword before the parameter list? Only inspects the
/// declaration's own line; multi-line arrow signatures (parameter list or
/// `=>` on a later line) are accepted on the strength of the `=` being
/// present with no value following it yet.
fn looks_like_arrow_assignment(tail: &str) -> bool {
    match tail.find('=') {
        Some(pos) => {
            let after_eq = &tail[pos + 1..];
            let after_eq = after_eq.trim_start();
            if after_eq.is_empty() {
                // `const name =` with the signature on a following line.
                true
            } else {
                let after_eq = after_eq.strip_prefix("async").unwrap_or(after_eq).trim_start();
                after_eq.starts_with('(') || after_eq.contains("=>")
            }
        }
        None => false,
    }
}

/// True if `line` contains any opening bracket character.
fn has_open_bracket(line: &str) -> bool {
    line.contains('(') || line.contains('{') || line.contains('[')
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
