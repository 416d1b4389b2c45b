//! Code block highlighting for comrak.
//!
//! syntect parses the block and every region is labelled with a highlight
//! token class (`hljs-keyword`, `hljs-string`, ...) derived from its scope
//! stack. Regions with no matching scope are emitted as plain escaped text.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write};

use comrak::adapters::SyntaxHighlighterAdapter;
use lazy_static::lazy_static;
use syntect::easy::ScopeRegionIterator;
use syntect::parsing::{ParseState, Scope, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Token classes a highlighted span may carry.
pub const HIGHLIGHT_TOKEN_CLASSES: &[&str] = &[
    "hljs-addition",
    "hljs-attr",
    "hljs-attribute",
    "hljs-built_in",
    "hljs-bullet",
    "hljs-char",
    "hljs-code",
    "hljs-comment",
    "hljs-deletion",
    "hljs-doctag",
    "hljs-emphasis",
    "hljs-formula",
    "hljs-keyword",
    "hljs-link",
    "hljs-literal",
    "hljs-meta",
    "hljs-name",
    "hljs-number",
    "hljs-operator",
    "hljs-params",
    "hljs-property",
    "hljs-punctuation",
    "hljs-quote",
    "hljs-regexp",
    "hljs-section",
    "hljs-selector-attr",
    "hljs-selector-class",
    "hljs-selector-id",
    "hljs-selector-pseudo",
    "hljs-selector-tag",
    "hljs-string",
    "hljs-strong",
    "hljs-subst",
    "hljs-symbol",
    "hljs-tag",
    "hljs-template-tag",
    "hljs-template-variable",
    "hljs-title",
    "hljs-type",
    "hljs-variable",
];

// First matching prefix wins, so more specific scopes come first.
const SCOPE_TOKENS: &[(&str, &str)] = &[
    ("comment.block.documentation", "hljs-doctag"),
    ("punctuation.definition.comment", "hljs-comment"),
    ("comment", "hljs-comment"),
    ("string.regexp", "hljs-regexp"),
    ("string.other.math", "hljs-formula"),
    ("punctuation.definition.string", "hljs-string"),
    ("string", "hljs-string"),
    ("constant.character.escape", "hljs-char"),
    ("constant.character", "hljs-char"),
    ("constant.numeric", "hljs-number"),
    ("constant.language", "hljs-literal"),
    ("constant.other.symbol", "hljs-symbol"),
    ("constant.other.placeholder", "hljs-subst"),
    ("constant", "hljs-literal"),
    ("keyword.operator", "hljs-operator"),
    ("keyword", "hljs-keyword"),
    ("storage.type", "hljs-type"),
    ("storage", "hljs-keyword"),
    ("entity.name.tag.css", "hljs-selector-tag"),
    ("entity.name.tag", "hljs-name"),
    ("entity.name.section", "hljs-section"),
    ("entity.name", "hljs-title"),
    ("entity.other.attribute-name.class", "hljs-selector-class"),
    ("entity.other.attribute-name.id", "hljs-selector-id"),
    ("entity.other.attribute-name", "hljs-attr"),
    ("entity.other.pseudo-class", "hljs-selector-pseudo"),
    ("entity.other.pseudo-element", "hljs-selector-pseudo"),
    ("entity.other.inherited-class", "hljs-title"),
    ("support.type.property-name", "hljs-attribute"),
    ("support.function", "hljs-built_in"),
    ("support.class", "hljs-built_in"),
    ("support.type", "hljs-type"),
    ("support.constant", "hljs-literal"),
    ("variable.parameter", "hljs-params"),
    ("variable.other.member", "hljs-property"),
    ("variable.other.property", "hljs-property"),
    ("variable.function", "hljs-title"),
    ("variable", "hljs-variable"),
    ("meta.preprocessor", "hljs-meta"),
    ("meta.annotation", "hljs-meta"),
    ("meta.template.expression", "hljs-template-variable"),
    ("punctuation.definition.template-expression", "hljs-template-tag"),
    ("punctuation.definition.list_item", "hljs-bullet"),
    ("punctuation.definition.tag", "hljs-tag"),
    ("punctuation.separator.key-value.css", "hljs-punctuation"),
    ("meta.attribute-selector.css", "hljs-selector-attr"),
    ("punctuation", "hljs-punctuation"),
    ("meta.tag", "hljs-tag"),
    ("markup.heading", "hljs-section"),
    ("markup.bold", "hljs-strong"),
    ("markup.italic", "hljs-emphasis"),
    ("markup.inserted", "hljs-addition"),
    ("markup.deleted", "hljs-deletion"),
    ("markup.quote", "hljs-quote"),
    ("markup.underline.link", "hljs-link"),
    ("markup.raw", "hljs-code"),
];

lazy_static! {
    static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref SCOPE_TABLE: Vec<(Scope, &'static str)> = SCOPE_TOKENS
        .iter()
        .map(|(scope, token)| (Scope::new(scope).expect("Invalid SCOPE_TOKENS entry"), *token))
        .collect();
}

/// comrak adapter that wraps code tokens in classed `<span>`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenHighlighter;

impl TokenHighlighter {
    pub fn new() -> Self {
        Self
    }

    /// Look a fence language up by file extension, then by syntax name.
    pub fn find_syntax(&self, lang: &str) -> Option<&'static SyntaxReference> {
        let lang = lang.trim();
        if lang.is_empty() {
            return None;
        }
        SYNTAX_SET
            .find_syntax_by_token(lang)
            .or_else(|| SYNTAX_SET.find_syntax_by_token(&lang.to_lowercase()))
    }

    /// Highlight `code`. Missing or unknown languages come back as escaped text.
    pub fn highlight(&self, lang: Option<&str>, code: &str) -> String {
        let Some(syntax) = lang.and_then(|lang| self.find_syntax(lang)) else {
            log::trace!("No syntax for code block language {:?}", lang);
            return escape_html(code);
        };

        or_plain(highlight_tokens(syntax, code), &syntax.name, code)
    }
}

/// Highlighted HTML, or the escaped source when parsing failed.
fn or_plain<E: std::fmt::Display>(result: Result<String, E>, syntax: &str, code: &str) -> String {
    match result {
        Ok(html) => html,
        Err(e) => {
            log::warn!("Failed to highlight {} block: {}", syntax, e);
            escape_html(code)
        }
    }
}

/// Escape `&`, `<`, `>` and `"` the way comrak escapes its own output.
fn escape_html(text: &str) -> String {
    let mut escaped = Vec::with_capacity(text.len());
    // Writes into a Vec do not fail
    let _ = comrak::html::escape(&mut escaped, text.as_bytes());
    String::from_utf8_lossy(&escaped).into_owned()
}

impl SyntaxHighlighterAdapter for TokenHighlighter {
    fn write_highlighted(
        &self,
        output: &mut dyn Write,
        lang: Option<&str>,
        code: &str,
    ) -> io::Result<()> {
        output.write_all(self.highlight(lang, code).as_bytes())
    }

    fn write_pre_tag(
        &self,
        output: &mut dyn Write,
        attributes: HashMap<String, String>,
    ) -> io::Result<()> {
        write_opening_tag(output, "pre", attributes)
    }

    fn write_code_tag(
        &self,
        output: &mut dyn Write,
        attributes: HashMap<String, String>,
    ) -> io::Result<()> {
        write_opening_tag(output, "code", attributes)
    }
}

fn write_opening_tag(
    output: &mut dyn Write,
    tag: &str,
    attributes: HashMap<String, String>,
) -> io::Result<()> {
    let mut attributes: Vec<(String, String)> = attributes.into_iter().collect();
    attributes.sort();

    write!(output, "<{}", tag)?;
    for (name, value) in &attributes {
        write!(output, " {}=\"{}\"", name, escape_html(value))?;
    }
    write!(output, ">")
}

fn highlight_tokens(syntax: &SyntaxReference, code: &str) -> Result<String, syntect::Error> {
    let mut state = ParseState::new(syntax);
    let mut stack = ScopeStack::new();
    let mut writer = TokenWriter::default();

    for line in LinesWithEndings::from(code) {
        let ops = state.parse_line(line, &SYNTAX_SET)?;
        for (text, op) in ScopeRegionIterator::new(&ops, line) {
            stack.apply(op)?;
            if !text.is_empty() {
                writer.push(token_class(&stack), text);
            }
        }
    }

    Ok(writer.finish())
}

/// Token class of the innermost scope that has one.
pub fn token_class(stack: &ScopeStack) -> Option<&'static str> {
    stack.as_slice().iter().rev().find_map(|scope| {
        SCOPE_TABLE
            .iter()
            .find(|(prefix, _)| prefix.is_prefix_of(*scope))
            .map(|(_, token)| *token)
    })
}

/// Accumulates adjacent regions with the same class into one span.
#[derive(Default)]
struct TokenWriter {
    html: String,
    class: Option<&'static str>,
    run: String,
}

impl TokenWriter {
    fn push(&mut self, class: Option<&'static str>, text: &str) {
        if class != self.class {
            self.flush();
            self.class = class;
        }
        self.run.push_str(text);
    }

    fn flush(&mut self) {
        if self.run.is_empty() {
            return;
        }
        let _ = match self.class {
            Some(class) => write!(
                self.html,
                "<span class=\"{}\">{}</span>",
                class,
                escape_html(&self.run)
            ),
            None => write!(self.html, "{}", escape_html(&self.run)),
        };
        self.run.clear();
    }

    fn finish(mut self) -> String {
        self.flush();
        self.html
    }
}
