//! A pure tokeniser over the line-oriented definition-file format:
//! prefix lines (`kilo- = 1000`), base lines (`meter = [length]`) and
//! derived lines (`inch = 0.0254 * meter, in, inches`). It performs no
//! semantic validation — cross-references, dimension existence and
//! duplicate names are all the registry's problem, not this module's.

use std::collections::HashMap;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::errors::UnitsError;

#[derive(Parser)]
#[grammar = "definitions.pest"]
struct DefinitionsParser;

/// One syntactically-valid line from a definition file.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionLine {
    /// `<prefix_name>- = <number>`
    Prefix { name: String, factor: f64 },
    /// `<base_name> = [<dimension_tag>]`
    Base {
        name: String,
        dimension_tag: String,
        aliases: Vec<String>,
        modifiers: HashMap<String, f64>,
    },
    /// `<name> = <expression> [, <alias>]* [, <key>: <value>]*`
    Derived {
        name: String,
        value_expr: String,
        aliases: Vec<String>,
        modifiers: HashMap<String, f64>,
    },
}

impl DefinitionLine {
    pub fn name(&self) -> &str {
        match self {
            DefinitionLine::Prefix { name, .. } => name,
            DefinitionLine::Base { name, .. } => name,
            DefinitionLine::Derived { name, .. } => name,
        }
    }
}

/// Streams `(line_number, DefinitionLine)` tuples out of a definition
/// file's text. Blank lines and `#`-comments are skipped silently.
/// Malformed lines surface as `Err((line_number, UnitsError))` so the
/// caller can report-and-skip without losing already-parsed lines.
pub fn read_definitions(
    text: &str,
) -> impl Iterator<Item = (usize, Result<DefinitionLine, UnitsError>)> + '_ {
    text.lines().enumerate().filter_map(|(idx, raw_line)| {
        let line_number = idx + 1;
        let trimmed = strip_comment(raw_line).trim();
        if trimmed.is_empty() {
            return None;
        }
        Some((line_number, parse_line(trimmed)))
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(at) => &line[..at],
        None => line,
    }
}

fn parse_line(line: &str) -> Result<DefinitionLine, UnitsError> {
    let mut pairs = DefinitionsParser::parse(Rule::line_entry, line).map_err(|e| UnitsError::Parse {
        message: e.to_string(),
    })?;

    let line_entry = pairs.next().expect("line_entry always produces one pair");
    let definition_line = line_entry
        .into_inner()
        .find(|p| p.as_rule() == Rule::definition_line)
        .expect("line_entry always wraps a definition_line");

    let inner = definition_line
        .into_inner()
        .next()
        .expect("definition_line always wraps one alternative");

    match inner.as_rule() {
        Rule::prefix_line => parse_prefix_line(inner),
        Rule::base_line => parse_base_line(inner),
        Rule::derived_line => parse_derived_line(inner),
        _ => unreachable!("definition_line only derives prefix/base/derived"),
    }
}

fn parse_prefix_line(pair: Pair<Rule>) -> Result<DefinitionLine, UnitsError> {
    let mut name = String::new();
    let mut factor = 0.0;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::prefix_name => {
                let raw = p.as_str();
                name = raw.trim_end_matches('-').to_string();
            }
            Rule::number => {
                factor = parse_number(p.as_str())?;
            }
            _ => unreachable!(),
        }
    }

    Ok(DefinitionLine::Prefix { name, factor })
}

fn parse_base_line(pair: Pair<Rule>) -> Result<DefinitionLine, UnitsError> {
    let mut name = String::new();
    let mut dimension_tag = String::new();
    let mut aliases = Vec::new();
    let mut modifiers = HashMap::new();
    let mut seen_name = false;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::identifier if !seen_name => {
                name = p.as_str().to_string();
                seen_name = true;
            }
            Rule::bracket_tag => {
                dimension_tag = p
                    .into_inner()
                    .next()
                    .expect("bracket_tag wraps one identifier")
                    .as_str()
                    .to_string();
            }
            Rule::alias => aliases.push(p.as_str().to_string()),
            Rule::modifier => {
                let mut inner = p.into_inner();
                let key = inner.next().unwrap().as_str().to_string();
                let value = parse_number(inner.next().unwrap().as_str())?;
                modifiers.insert(key, value);
            }
            _ => unreachable!(),
        }
    }

    Ok(DefinitionLine::Base {
        name,
        dimension_tag,
        aliases,
        modifiers,
    })
}

fn parse_derived_line(pair: Pair<Rule>) -> Result<DefinitionLine, UnitsError> {
    let mut name = String::new();
    let mut value_expr = String::new();
    let mut aliases = Vec::new();
    let mut modifiers = HashMap::new();
    let mut seen_name = false;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::identifier if !seen_name => {
                name = p.as_str().to_string();
                seen_name = true;
            }
            Rule::expression_text => value_expr = p.as_str().trim().to_string(),
            Rule::alias => aliases.push(p.as_str().to_string()),
            Rule::modifier => {
                let mut inner = p.into_inner();
                let key = inner.next().unwrap().as_str().to_string();
                let value = parse_number(inner.next().unwrap().as_str())?;
                modifiers.insert(key, value);
            }
            _ => unreachable!(),
        }
    }

    Ok(DefinitionLine::Derived {
        name,
        value_expr,
        aliases,
        modifiers,
    })
}

fn parse_number(text: &str) -> Result<f64, UnitsError> {
    text.parse::<f64>().map_err(|e| UnitsError::Parse {
        message: format!("invalid number '{}': {}", text, e),
    })
}
