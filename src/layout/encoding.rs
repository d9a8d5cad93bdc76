//! Compact textual layout encoding.
//!
//! ```text
//! member      ::= name ':' typename lengthDecl? alignDecl? offsetDecl?
//! lengthDecl  ::= '[' integer ']'
//! alignDecl   ::= ':' integer
//! offsetDecl  ::= '@' integer
//! typename    ::= identifier | '*'
//! ```
//!
//! Members are terminated by `;`, a newline, or the end of input. The scanner looks for
//! non-overlapping member matches and silently skips any text in between, so malformed
//! declarations vanish instead of raising errors.

use ahash::AHashSet;

use crate::config::OffsetBaseline;

use super::align::{check_alignment, check_length, checked_align_up};
use super::error::{LayoutError, LayoutResult};
use super::member::MemberDeclaration;
use super::registry::TypeRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RawMember<'a> {
    name: &'a str,
    type_name: &'a str,
    length: Option<usize>,
    alignment: Option<usize>,
    offset: Option<usize>,
}

/// Parses `text` using the registry's configured offset baseline.
pub fn parse(registry: &TypeRegistry, text: &str) -> LayoutResult<Vec<MemberDeclaration>> {
    parse_with(registry, text, registry.config().offset_baseline)
}

pub fn parse_with(
    registry: &TypeRegistry,
    text: &str,
    baseline: OffsetBaseline,
) -> LayoutResult<Vec<MemberDeclaration>> {
    let raw_members = scan(text);
    if raw_members.is_empty() {
        return Err(LayoutError::EmptyEncoding);
    }

    let mut seen = AHashSet::with_capacity(raw_members.len());
    let mut members = Vec::with_capacity(raw_members.len());
    let mut running = 0usize;
    for raw in raw_members {
        if !seen.insert(raw.name) {
            return Err(LayoutError::DuplicateMember(raw.name.to_owned()));
        }
        let info = registry.lookup(raw.type_name)?;
        let length = check_length(raw.name, raw.length.unwrap_or(1))?;
        let alignment = check_alignment(raw.name, raw.alignment.unwrap_or(info.alignment))?;
        let offset = match raw.offset {
            Some(offset) => offset,
            None => checked_align_up(running, alignment)
                .ok_or_else(|| LayoutError::Overflow(raw.name.to_owned()))?,
        };
        let member = MemberDeclaration::new(raw.name, info, length, alignment, offset)?;
        if raw.offset.is_none() || baseline == OffsetBaseline::LastMember {
            running = member.end();
        }
        members.push(member);
    }
    Ok(members)
}

/// Renders members with explicit lengths, alignments, and offsets so that parsing the result
/// reproduces them exactly.
pub fn render(members: &[MemberDeclaration]) -> String {
    members
        .iter()
        .map(render_member)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_member(member: &MemberDeclaration) -> String {
    format!(
        "{}:{}[{}]:{}@{}",
        member.name, member.type_name, member.length, member.alignment, member.offset
    )
}

fn scan(text: &str) -> Vec<RawMember<'_>> {
    let bytes = text.as_bytes();
    let mut members = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match match_member(text, pos) {
            Some((member, end)) => {
                members.push(member);
                pos = end.max(pos + 1);
            }
            None => pos += 1,
        }
    }
    members
}

fn match_member(text: &str, start: usize) -> Option<(RawMember<'_>, usize)> {
    let bytes = text.as_bytes();
    let name_end = identifier(bytes, start)?;
    let mut pos = skip_whitespace(bytes, name_end);
    if bytes.get(pos) != Some(&b':') {
        return None;
    }
    pos = skip_whitespace(bytes, pos + 1);
    let type_start = pos;
    let type_end = if bytes.get(pos) == Some(&b'*') {
        pos + 1
    } else {
        identifier(bytes, pos)?
    };
    pos = type_end;

    let mut length = None;
    if let Some((value, next)) = bracketed(bytes, pos) {
        length = Some(value);
        pos = next;
    }
    let mut alignment = None;
    if let Some((value, next)) = prefixed(bytes, pos, b':') {
        alignment = Some(value);
        pos = next;
    }
    let mut offset = None;
    if let Some((value, next)) = prefixed(bytes, pos, b'@') {
        offset = Some(value);
        pos = next;
    }

    let end = terminator(bytes, pos)?;
    let member = RawMember {
        name: &text[start..name_end],
        type_name: &text[type_start..type_end],
        length,
        alignment,
        offset,
    };
    Some((member, end))
}

fn identifier(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first == b'_' || first.is_ascii_alphabetic()) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && (bytes[end] == b'_' || bytes[end].is_ascii_alphanumeric()) {
        end += 1;
    }
    Some(end)
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn integer(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == start {
        return None;
    }
    let digits = std::str::from_utf8(&bytes[start..end]).ok()?;
    digits.parse().ok().map(|value| (value, end))
}

/// `\s* '[' \s* integer \s* ']'`
fn bracketed(bytes: &[u8], pos: usize) -> Option<(usize, usize)> {
    let open = skip_whitespace(bytes, pos);
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let (value, after) = integer(bytes, skip_whitespace(bytes, open + 1))?;
    let close = skip_whitespace(bytes, after);
    (bytes.get(close) == Some(&b']')).then_some((value, close + 1))
}

/// `\s* marker \s* integer`
fn prefixed(bytes: &[u8], pos: usize, marker: u8) -> Option<(usize, usize)> {
    let at = skip_whitespace(bytes, pos);
    if bytes.get(at) != Some(&marker) {
        return None;
    }
    integer(bytes, skip_whitespace(bytes, at + 1))
}

/// `\s* (';' | end-of-line | end-of-input)`, returning where scanning resumes.
fn terminator(bytes: &[u8], pos: usize) -> Option<usize> {
    let end = skip_whitespace(bytes, pos);
    if end == bytes.len() {
        Some(end)
    } else if bytes[end] == b';' {
        Some(end + 1)
    } else if bytes[pos..end].contains(&b'\n') {
        Some(end)
    } else {
        None
    }
}
