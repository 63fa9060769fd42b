//! Common parser combinators for CQL declarations

use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{alt, delimited, not, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::ModalResult;
use winnow::prelude::*;
use winnow::stream::Stream;
use winnow::token::{any, literal, one_of, take_till, take_while};

pub type Input<'a> = &'a str;
pub type PResult<T> = ModalResult<T>;

/// Keywords that can only start a top-level declaration
pub const DECLARATION_KEYWORDS: &[&str] = &[
    "library",
    "using",
    "include",
    "codesystem",
    "valueset",
    "code",
    "concept",
    "parameter",
    "context",
    "define",
    "public",
    "private",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Optional whitespace
pub fn ws(input: &mut Input<'_>) -> PResult<()> {
    multispace0.void().parse_next(input)
}

/// Mandatory whitespace
pub fn ws1(input: &mut Input<'_>) -> PResult<()> {
    multispace1.void().parse_next(input)
}

/// Exact text
pub fn lit<'a>(text: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    literal(text)
}

/// A keyword not followed by an identifier character
pub fn keyword<'a>(kw: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    terminated(literal(kw), not(one_of(is_ident_char)))
}

/// A keyword surrounded by optional whitespace
pub fn padded_keyword<'a>(
    kw: &'static str,
) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    delimited(multispace0, keyword(kw), multispace0)
}

/// Unquoted identifier
pub fn simple_identifier(input: &mut Input<'_>) -> PResult<String> {
    (one_of(is_ident_start), take_while(0.., is_ident_char))
        .take()
        .map(str::to_string)
        .parse_next(input)
}

/// `"quoted identifier"` or `` `quoted identifier` ``
pub fn quoted_identifier(input: &mut Input<'_>) -> PResult<String> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('`', take_till(0.., '`'), '`'),
    ))
    .map(str::to_string)
    .parse_next(input)
}

/// Quoted or unquoted identifier
pub fn identifier(input: &mut Input<'_>) -> PResult<String> {
    alt((quoted_identifier, simple_identifier)).parse_next(input)
}

/// Dotted identifier such as `Common.Helpers`, joined back with dots
pub fn qualified_identifier(input: &mut Input<'_>) -> PResult<String> {
    let first = identifier(input)?;
    let rest: Vec<String> = repeat(0.., preceded('.', identifier)).parse_next(input)?;
    Ok(std::iter::once(first).chain(rest).collect::<Vec<_>>().join("."))
}

fn string_char(input: &mut Input<'_>) -> PResult<char> {
    any.parse_next(input)
}

/// Single-quoted string literal with `\` escapes
pub fn string_literal(input: &mut Input<'_>) -> PResult<String> {
    lit("'").parse_next(input)?;
    let mut out = String::new();
    loop {
        match string_char(input)? {
            '\'' => return Ok(out),
            '\\' => out.push(string_char(input)?),
            c => out.push(c),
        }
    }
}

/// `version '<x>'` clause
pub fn version_clause(input: &mut Input<'_>) -> PResult<Option<String>> {
    opt(preceded((ws, keyword("version"), ws), string_literal)).parse_next(input)
}

/// Byte offset of the next line that starts a top-level declaration
///
/// The first line is never considered, so the result is past the current
/// declaration's head, or the input length when nothing follows.
pub fn next_declaration_offset(input: &str) -> usize {
    let mut offset = match input.find('\n') {
        Some(i) => i + 1,
        None => return input.len(),
    };
    while offset < input.len() {
        let line = &input[offset..];
        let trimmed = line.trim_start_matches([' ', '\t', '\r']);
        let starts_declaration = DECLARATION_KEYWORDS.iter().any(|kw| {
            trimmed.starts_with(kw)
                && !trimmed[kw.len()..].starts_with(is_ident_char)
        });
        if starts_declaration {
            return offset + (line.len() - trimmed.len());
        }
        offset = match line.find('\n') {
            Some(i) => offset + i + 1,
            None => input.len(),
        };
    }
    input.len()
}

/// Everything up to the next top-level declaration
pub fn rest_of_declaration<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    let end = next_declaration_offset(input);
    Ok(input.next_slice(end))
}
