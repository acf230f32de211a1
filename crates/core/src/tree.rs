//! Generic indentation-based block tree, the layer beneath the typed changelog
//! model. Mirrors the two-space block-mapped grammar of §4.1/§6: mappings are
//! `key: value` or `key:` followed by a deeper block, sequences are `- item`
//! lines. Every parsed node remembers its absolute start line and how many
//! source lines it consumed, so the typed layer can slice out raw text for
//! opaque/unknown content and for byte-identical round-tripping of untouched
//! blocks.

use crate::error::{MalformedDocument, SourceLocation};

pub(crate) const INDENT_STEP: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Scalar(String),
    Map(Vec<MapEntry>),
    List(Vec<Parsed>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MapEntry {
    pub(crate) key: String,
    pub(crate) value: Parsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Parsed {
    pub(crate) node: Node,
    /// 0-indexed absolute line where this node's own text begins.
    pub(crate) start_line: usize,
    /// Number of source lines this node's subtree occupies, including its
    /// own header line (a `key:` or `- ` line).
    pub(crate) consumed: usize,
}

impl Parsed {
    pub(crate) fn raw_lines<'a>(&self, lines: &[&'a str]) -> Vec<&'a str> {
        lines[self.start_line..self.start_line + self.consumed].to_vec()
    }
}

impl Node {
    pub(crate) fn as_map(&self) -> Option<&[MapEntry]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub(crate) fn as_list(&self) -> Option<&[Parsed]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

impl MapEntry {
    pub(crate) fn find<'a>(entries: &'a [MapEntry], key: &str) -> Option<&'a Parsed> {
        entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }
}

/// Parses the whole document as a top-level mapping at indent 0.
pub(crate) fn parse_document(lines: &[&str]) -> crate::error::Result<Parsed> {
    let (entries, consumed) = parse_mapping(lines, 0, 0)?;
    Ok(Parsed {
        node: Node::Map(entries),
        start_line: 0,
        consumed,
    })
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|ch| *ch == ' ').count()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn starts_list_item(content: &str) -> bool {
    content.starts_with('-') && (content.len() == 1 || content.as_bytes()[1] == b' ')
}

/// Parses a block at `indent`, dispatching to mapping or list form based on
/// the first non-blank line. An empty block (immediate dedent) yields an
/// empty mapping.
fn parse_block(lines: &[&str], start: usize, indent: usize) -> crate::error::Result<(Node, usize)> {
    let mut pos = start;
    while pos < lines.len() && is_blank(lines[pos]) {
        pos += 1;
    }

    if pos >= lines.len() {
        return Ok((Node::Map(Vec::new()), pos - start));
    }

    let cur_indent = leading_spaces(lines[pos]);
    if cur_indent < indent {
        return Ok((Node::Map(Vec::new()), pos - start));
    }
    if cur_indent > indent {
        return Err(MalformedDocument::BadIndentation {
            location: SourceLocation::new(pos + 1),
        }
        .into());
    }

    let content = lines[pos][cur_indent..].trim_start();
    if starts_list_item(content) {
        let (items, consumed) = parse_list(lines, start, indent)?;
        Ok((Node::List(items), consumed))
    } else {
        let (entries, consumed) = parse_mapping(lines, start, indent)?;
        Ok((Node::Map(entries), consumed))
    }
}

fn parse_mapping(
    lines: &[&str],
    start: usize,
    indent: usize,
) -> crate::error::Result<(Vec<MapEntry>, usize)> {
    let mut entries: Vec<MapEntry> = Vec::new();
    let mut pos = start;

    loop {
        while pos < lines.len() && is_blank(lines[pos]) {
            pos += 1;
        }
        if pos >= lines.len() {
            break;
        }

        let cur_indent = leading_spaces(lines[pos]);
        if cur_indent < indent {
            break;
        }
        if cur_indent % INDENT_STEP != 0 || cur_indent > indent {
            return Err(MalformedDocument::BadIndentation {
                location: SourceLocation::new(pos + 1),
            }
            .into());
        }

        let content = &lines[pos][cur_indent..];
        if starts_list_item(content) {
            break;
        }

        let Some(colon) = content.find(':') else {
            return Err(MalformedDocument::BadIndentation {
                location: SourceLocation::new(pos + 1),
            }
            .into());
        };
        let key = content[..colon].trim().to_string();
        let rest = content[colon + 1..].trim();
        let entry_start = pos;

        if entries.iter().any(|entry| entry.key == key) {
            return Err(MalformedDocument::DuplicateKey {
                key,
                location: SourceLocation::new(pos + 1),
            }
            .into());
        }

        let value = if rest.is_empty() {
            let (node, inner_consumed) = parse_block(lines, pos + 1, indent + INDENT_STEP)?;
            Parsed {
                node,
                start_line: entry_start,
                consumed: inner_consumed + 1,
            }
        } else {
            Parsed {
                node: Node::Scalar(unquote(rest)),
                start_line: entry_start,
                consumed: 1,
            }
        };

        pos += value.consumed;
        entries.push(MapEntry { key, value });
    }

    Ok((entries, pos - start))
}

fn parse_list(
    lines: &[&str],
    start: usize,
    indent: usize,
) -> crate::error::Result<(Vec<Parsed>, usize)> {
    let mut items: Vec<Parsed> = Vec::new();
    let mut pos = start;

    loop {
        while pos < lines.len() && is_blank(lines[pos]) {
            pos += 1;
        }
        if pos >= lines.len() {
            break;
        }

        let cur_indent = leading_spaces(lines[pos]);
        if cur_indent < indent {
            break;
        }
        if cur_indent % INDENT_STEP != 0 || cur_indent > indent {
            return Err(MalformedDocument::BadIndentation {
                location: SourceLocation::new(pos + 1),
            }
            .into());
        }

        let content = &lines[pos][cur_indent..];
        if !starts_list_item(content) {
            break;
        }

        let item_start = pos;
        let rest = content[1..].trim_start();
        let item_indent = indent + INDENT_STEP;

        let (node, consumed) = if rest.is_empty() {
            let (node, inner_consumed) = parse_block(lines, pos + 1, item_indent)?;
            (node, inner_consumed + 1)
        } else if let Some(colon) = rest.find(':') {
            let key = rest[..colon].trim().to_string();
            let value_rest = rest[colon + 1..].trim();

            let (first_node, first_consumed) = if value_rest.is_empty() {
                // The nested block sits one step deeper than the key itself,
                // and the key sits one step deeper than the dash.
                let (node, inner_consumed) = parse_block(lines, pos + 1, item_indent + INDENT_STEP)?;
                (node, inner_consumed + 1)
            } else {
                (Node::Scalar(unquote(value_rest)), 1)
            };

            let mut entries = vec![MapEntry {
                key,
                value: Parsed {
                    node: first_node,
                    start_line: item_start,
                    consumed: first_consumed,
                },
            }];

            let (siblings, sibling_consumed) =
                parse_mapping(lines, pos + first_consumed, item_indent)?;
            for sibling in &siblings {
                if entries.iter().any(|entry| entry.key == sibling.key) {
                    return Err(MalformedDocument::DuplicateKey {
                        key: sibling.key.clone(),
                        location: SourceLocation::new(item_start + 1),
                    }
                    .into());
                }
            }
            entries.extend(siblings);

            (Node::Map(entries), first_consumed + sibling_consumed)
        } else {
            (Node::Scalar(unquote(rest)), 1)
        };

        pos += consumed;
        items.push(Parsed {
            node,
            start_line: item_start,
            consumed,
        });
    }

    Ok((items, pos - start))
}

/// Strips one layer of matching surrounding quotes from a scalar on read.
pub(crate) fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Quotes a scalar for serialization if it contains whitespace, a colon, or a
/// leading special character (§4.1).
pub(crate) fn quote_if_needed(value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value.contains(' ')
        || value.contains(':')
        || value
            .chars()
            .next()
            .is_some_and(|ch| !ch.is_ascii_alphanumeric() && ch != '_' && ch != '-');

    if needs_quoting {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_string()
    }
}
