//!
//! # DSN Reading Module
//!
//! Facilities for reading Specctra DSN board-designs and sessions from file or string.
//! Includes the core Lexer and Parser classes.
//!

// Standard Lib Imports
use std::io::Read;
use std::str::{Chars, FromStr};

// Crates.io Imports
use chrono::{Month, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

// Local imports
use crate::data::*;
use crate::tree::{DsnTree, ElemKey};
use crate::utils::EnumStr;
use crate::{DsnError, DsnResult};

/// Parse a board design from file `fname`
pub fn parse_design_file(fname: impl AsRef<std::path::Path>) -> DsnResult<DsnTree> {
    parse_design_bytes(&read_source(fname)?)
}
/// Parse a board design from string `src`
pub fn parse_design_str(src: &str) -> DsnResult<DsnTree> {
    DsnParser::new(src)?.parse_design()
}
/// Parse a board design from raw bytes
pub fn parse_design_bytes(bytes: &[u8]) -> DsnResult<DsnTree> {
    let (src, encoding) = decode(bytes.to_vec());
    let mut tree = parse_design_str(&src)?;
    tree.encoding = encoding;
    Ok(tree)
}
/// Parse a session from file `fname`
pub fn parse_session_file(fname: impl AsRef<std::path::Path>) -> DsnResult<DsnTree> {
    parse_session_bytes(&read_source(fname)?)
}
/// Parse a session from string `src`
pub fn parse_session_str(src: &str) -> DsnResult<DsnTree> {
    DsnParser::new(src)?.parse_session()
}
/// Parse a session from raw bytes
pub fn parse_session_bytes(bytes: &[u8]) -> DsnResult<DsnTree> {
    let (src, encoding) = decode(bytes.to_vec());
    let mut tree = parse_session_str(&src)?;
    tree.encoding = encoding;
    Ok(tree)
}
/// Read the full content of file `fname`
fn read_source(fname: impl AsRef<std::path::Path>) -> DsnResult<Vec<u8>> {
    let mut file = std::fs::File::open(fname)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}
/// Decode source bytes as UTF-8, falling back to Latin-1
fn decode(bytes: Vec<u8>) -> (String, Encoding) {
    match String::from_utf8(bytes) {
        Ok(s) => (s, Encoding::Utf8),
        Err(e) => {
            let s = e.into_bytes().into_iter().map(char::from).collect();
            (s, Encoding::Latin1)
        }
    }
}

/// # Reader Options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReadOptions {
    /// Maximum construct nesting depth.
    /// Deeper input fails with [DsnParseErrorType::TooDeep].
    pub max_depth: usize,
}
impl Default for ReadOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// # Dsn Lexer / Tokenizer
///
/// Breaks input string `self.src` into an iteration of [Token]s,
/// consisting of source-locations and type-annotations.
///
/// Operates lazily, producing a single [Token] with each call to `next_token`.
/// The parser adjusts the lexer's quoting settings between calls,
/// so no token is read ahead.
///
pub struct DsnLexer<'src> {
    /// Source string
    src: &'src str,
    /// Source-string character iterator
    chars: Chars<'src>,
    /// Peekable next character
    next_char: Option<char>,
    /// Active Lexeme start byte-index
    start: usize,
    /// Active byte index
    pos: usize,
    /// Active line number
    line: usize,
    /// Byte index at the beginning of the current line
    linestart: usize,
    /// Boolean indication of beginning-of-line,
    /// i.e. whether any semantic content has been encountered on the current line.
    at_bol: bool,
    /// Active string delimiter. `None` disables quoted strings.
    quote: Option<char>,
    /// Whether quoted strings may contain spaces
    space_in_quoted_tokens: bool,
    /// Set after a `string_quote` symbol, so that the next character is read as the new quote
    quote_def_pending: bool,
    /// Type of the most recently emitted [Token]
    last: Option<TokenType>,
    /// End byte-index of the most recently emitted [Token]
    last_stop: usize,
}
impl<'src> DsnLexer<'src> {
    pub fn new(src: &'src str) -> Self {
        let mut chars = src.chars();
        let next_char = chars.next();
        Self {
            src,
            chars,
            next_char,
            start: 0,
            pos: 0,
            line: 1,
            linestart: 0,
            at_bol: true,
            quote: Some('"'),
            space_in_quoted_tokens: false,
            quote_def_pending: false,
            last: None,
            last_stop: 0,
        }
    }
    /// Set the string delimiter, returning the prior one
    pub fn set_quote(&mut self, quote: Option<char>) -> Option<char> {
        std::mem::replace(&mut self.quote, quote)
    }
    pub fn quote(&self) -> Option<char> {
        self.quote
    }
    pub fn set_space_in_quoted_tokens(&mut self, on: bool) {
        self.space_in_quoted_tokens = on;
    }
    /// Get and return our next character, updating our position along the way
    fn next_char(&mut self) -> Option<char> {
        let rv = self.next_char?;
        self.pos += rv.len_utf8();
        self.next_char = self.chars.next();
        Some(rv)
    }
    /// Peek at our next character, without advancing.
    fn peek_char(&self) -> Option<char> {
        self.next_char
    }
    /// Accept a character if it meets predicate-function `f`
    fn accept(&mut self, f: impl Fn(char) -> bool) -> bool {
        match self.peek_char() {
            Some(ch) if f(ch) => {
                self.next_char();
                true
            }
            _ => false,
        }
    }
    /// Accept a single-character match
    fn accept_char(&mut self, c: char) -> bool {
        self.accept(|a| a == c)
    }
    /// Get our next [Token]. Returns a [TokenType::End] token, repeatedly, at end of input.
    pub fn next_token(&mut self) -> DsnResult<Token> {
        self.skip_blanks();
        self.start = self.pos;
        let tok = self.lex_one()?;
        self.last = Some(tok.ttype);
        self.last_stop = tok.loc.stop;
        Ok(tok)
    }
    /// Skip white-space, newlines and comments
    fn skip_blanks(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                self.next_char();
                self.line += 1;
                self.linestart = self.pos;
                self.at_bol = true;
            } else if c.is_whitespace() {
                self.next_char();
            } else if c == '#' && self.at_bol && !self.quote_def_pending {
                // Comment lines run to the end of line
                while self.accept(|c| c != '\n') {}
            } else {
                break;
            }
        }
    }
    /// Emit a [Token] of [TokenType] `ttype`
    /// Uses the current Lexer location as its span, and updates the Lexer start-position upon creation.
    fn emit(&mut self, ttype: TokenType) -> Token {
        let loc = SourceLocation {
            start: self.start,
            stop: self.pos,
            line: self.line,
            col: self.start - self.linestart + 1,
        };
        self.start = self.pos;
        Token { loc, ttype }
    }
    /// Lex the next [Token]
    fn lex_one(&mut self) -> DsnResult<Token> {
        let c = match self.peek_char() {
            None => return Ok(self.emit(TokenType::End)),
            Some(c) => c,
        };
        self.at_bol = false;
        if self.quote_def_pending {
            self.quote_def_pending = false;
            self.next_char();
            return Ok(self.emit(TokenType::QuoteDef));
        }
        if self.accept_char('(') {
            return Ok(self.emit(TokenType::LParen));
        }
        if self.accept_char(')') {
            return Ok(self.emit(TokenType::RParen));
        }
        // A pin-reference dash directly follows its quoted component, with no blank between
        if c == '-' && self.last == Some(TokenType::String) && self.start == self.last_stop {
            self.next_char();
            return Ok(self.emit(TokenType::Dash));
        }
        if Some(c) == self.quote {
            self.next_char();
            return self.lex_string(c);
        }
        if c.is_control() {
            return self.fail();
        }
        self.lex_word()
    }
    /// Lex a quoted string. The opening quote has been read.
    fn lex_string(&mut self, quote: char) -> DsnResult<Token> {
        loop {
            match self.peek_char() {
                None | Some('\n') | Some('\r') => return self.fail(),
                Some(c) if c == quote => {
                    self.next_char();
                    break;
                }
                Some(' ') if !self.space_in_quoted_tokens => break,
                Some(_) => {
                    self.next_char();
                }
            }
        }
        Ok(self.emit(TokenType::String))
    }
    /// Lex a bare word, either a [TokenType::Number] or [TokenType::Symbol]
    fn lex_word(&mut self) -> DsnResult<Token> {
        while self.accept(|c| !c.is_whitespace() && c != '(' && c != ')') {
            continue;
        }
        let txt = &self.src[self.start..self.pos];
        if is_number(txt) {
            return Ok(self.emit(TokenType::Number));
        }
        if txt.eq_ignore_ascii_case(DsnKey::StringQuote.to_str()) {
            self.quote_def_pending = true;
        }
        Ok(self.emit(TokenType::Symbol))
    }
    /// Error-Generation Helper
    /// Collect our current position and content into a [DsnError::Lex]
    fn fail<T>(&self) -> DsnResult<T> {
        Err(DsnError::Lex {
            next_char: self.peek_char(),
            line: self.line,
            col: self.pos - self.linestart + 1,
            pos: self.pos,
        })
    }
}
/// Iterator protocol for [DsnLexer]
/// Not used during parsing, but often handy for testing.
/// Stops after the first error.
impl<'s> Iterator for DsnLexer<'s> {
    type Item = DsnResult<Token>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.last == Some(TokenType::End) {
            return None;
        }
        match self.next_token() {
            Ok(t) if t.ttype == TokenType::End => None,
            Ok(t) => Some(Ok(t)),
            Err(e) => {
                self.last = Some(TokenType::End);
                Some(Err(e))
            }
        }
    }
}
/// Boolean indication of whether `txt` lexes as a number
fn is_number(txt: &str) -> bool {
    match txt.chars().next() {
        Some(c) if c.is_ascii_digit() || "+-.".contains(c) => (),
        _ => return false,
    }
    txt.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) && txt.parse::<f64>().is_ok()
}
/// Strip the quotes from string-token text
fn unquote(raw: &str) -> &str {
    let mut chars = raw.chars();
    match chars.next() {
        Some(q) => {
            let rest = chars.as_str();
            rest.strip_suffix(q).unwrap_or(rest)
        }
        None => raw,
    }
}

/// Location of a [Token] in the source string
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Start byte index (inclusive)
    pub start: usize,
    /// End byte index (exclusive)
    pub stop: usize,
    /// Line number, starting at one
    pub line: usize,
    /// Column, starting at one
    pub col: usize,
}
/// Lexer Token
/// Provides indices into the source-string for the start and end of the source text,
/// as well as the line number and type-tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Source Location
    pub loc: SourceLocation,
    /// Token Type
    pub ttype: TokenType,
}
impl Token {
    /// Return a sub-string of input-string `src` over our locations
    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.loc.start..self.loc.stop]
    }
}
/// Token Types Enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    LParen,
    RParen,
    /// Bare word, which may coincide with a [DsnKey]
    Symbol,
    /// Quoted string
    String,
    Number,
    /// Single-character quote definition following `string_quote`
    QuoteDef,
    /// Dash between the quoted halves of a pin reference
    Dash,
    End,
}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DsnParseErrorType {
    /// Invalid Token
    InvalidToken { expected: TokenType },
    /// Unknown keyword
    InvalidKey,
    /// Invalid Value
    InvalidValue,
    /// Syntax Error: missing keyword or identifier at a required location
    RequiredWord { expected: String },
    /// Known keyword which is not allowed where it appears, or appears twice
    Unexpected,
    /// Nesting deeper than [ReadOptions::max_depth]
    TooDeep,
    /// All other errors
    Other,
}

/// Dsn Parser
/// Transforms input string of lifetime 'src into a [DsnTree]
pub struct DsnParser<'src> {
    /// Source string
    src: &'src str,
    /// Lexer
    lex: DsnLexer<'src>,
    /// Current Token
    tok: Token,
    /// Context Stack
    ctx: Vec<DsnKey>,
    /// Options
    options: ReadOptions,
    /// Tree under construction
    tree: DsnTree,
}
impl<'src> DsnParser<'src> {
    /// Construct a [DsnParser] of input-text `src`
    pub fn new(src: &'src str) -> DsnResult<Self> {
        Self::with_options(src, ReadOptions::default())
    }
    /// Construct a [DsnParser] of input-text `src`, with [ReadOptions] `options`
    pub fn with_options(src: &'src str, options: ReadOptions) -> DsnResult<Self> {
        let tok = Token {
            loc: SourceLocation::default(),
            ttype: TokenType::End,
        };
        Ok(Self {
            src,
            lex: DsnLexer::new(src),
            tok,
            ctx: Vec::new(),
            options,
            tree: DsnTree::design(""),
        })
    }
    /// Parse a board design, `(pcb <name> ...)`
    pub fn parse_design(mut self) -> DsnResult<DsnTree> {
        debug!("Parsing DSN design");
        self.need_left()?;
        let key = self.need_key()?;
        if key != DsnKey::Pcb {
            return self.fail(DsnParseErrorType::RequiredWord {
                expected: DsnKey::Pcb.to_str().into(),
            });
        }
        self.enter(key)?;
        let name = self.need_symbol()?;
        self.tree = DsnTree::design(name);
        let root = self.tree.root;
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Parser => {
                    self.singleton(root, &[key])?;
                    self.parse_parser(root)?;
                }
                DsnKey::Unit | DsnKey::Resolution => {
                    self.singleton(root, &[key])?;
                    self.parse_unit_res(root, key)?;
                }
                DsnKey::Structure => {
                    self.singleton(root, &[key])?;
                    self.parse_structure(root, key)?;
                }
                DsnKey::Placement => {
                    self.singleton(root, &[key])?;
                    self.parse_placement(root)?;
                }
                DsnKey::Library => {
                    self.singleton(root, &[key])?;
                    self.parse_library(root, key)?;
                }
                DsnKey::Network => {
                    self.singleton(root, &[key])?;
                    self.parse_network(root)?;
                }
                DsnKey::Wiring => {
                    self.singleton(root, &[key])?;
                    self.parse_wiring(root)?;
                }
                _ => self.unexpected()?,
            }
        }
        self.leave();
        debug!(nodes = self.tree.len(), "Parsed DSN design");
        Ok(self.tree)
    }
    /// Parse a session, `(session <id> ...)`.
    /// Sessions written with the board's `pcb` outer keyword are accepted too.
    pub fn parse_session(mut self) -> DsnResult<DsnTree> {
        debug!("Parsing DSN session");
        self.need_left()?;
        let key = self.need_key()?;
        if key != DsnKey::Session && key != DsnKey::Pcb {
            return self.fail(DsnParseErrorType::RequiredWord {
                expected: DsnKey::Session.to_str().into(),
            });
        }
        self.enter(key)?;
        let id = self.need_symbol()?;
        let mut session = Session {
            id,
            base_design: String::new(),
        };
        self.tree = DsnTree::session(session.id.clone(), "");
        let root = self.tree.root;
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::BaseDesign => {
                    session.base_design = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::History => {
                    self.singleton(root, &[key])?;
                    self.parse_history(root)?;
                }
                DsnKey::Structure => {
                    self.singleton(root, &[key])?;
                    self.parse_structure(root, key)?;
                }
                DsnKey::Placement => {
                    self.singleton(root, &[key])?;
                    self.parse_placement(root)?;
                }
                DsnKey::WasIs => {
                    self.singleton(root, &[key])?;
                    self.parse_was_is(root)?;
                }
                DsnKey::Routes => {
                    self.singleton(root, &[key])?;
                    self.parse_routes(root)?;
                }
                _ => self.unexpected()?,
            }
        }
        self.set(root, session);
        self.leave();
        debug!(nodes = self.tree.len(), "Parsed DSN session");
        Ok(self.tree)
    }
    /// Parse the `parser` descriptor, applying its quoting settings to the lexer as they arrive
    fn parse_parser(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Parser)?;
        let mut cfg = ParserConfig::default();
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::StringQuote => {
                    if self.advance()? != TokenType::QuoteDef {
                        return self.fail(DsnParseErrorType::InvalidToken {
                            expected: TokenType::QuoteDef,
                        });
                    }
                    let quote = self.raw().chars().next();
                    if let Some(q) = quote {
                        cfg.string_quote = q;
                    }
                    self.lex.set_quote(quote);
                    self.need_right()?;
                }
                DsnKey::SpaceInQuotedTokens => {
                    cfg.space_in_quoted_tokens = self.need_on_off()?;
                    self.lex.set_space_in_quoted_tokens(cfg.space_in_quoted_tokens);
                    self.need_right()?;
                }
                DsnKey::HostCad => {
                    cfg.host_cad = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::HostVersion => {
                    cfg.host_version = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::Constant => {
                    cfg.const_id1 = self.need_symbol()?;
                    cfg.const_id2 = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::WriteResolution => self.skip_expr()?,
                DsnKey::RoutesInclude => loop {
                    match self.advance()? {
                        TokenType::RParen => break,
                        TokenType::Symbol => match self.cur_key()? {
                            DsnKey::Testpoint => cfg.routes_include_testpoint = true,
                            DsnKey::Guides | DsnKey::Guide => cfg.routes_include_guides = true,
                            DsnKey::ImageConductor => cfg.routes_include_image_conductor = true,
                            _ => self.unexpected()?,
                        },
                        _ => self.fail(DsnParseErrorType::InvalidToken {
                            expected: TokenType::Symbol,
                        })?,
                    }
                },
                DsnKey::WiresInclude => {
                    if self.need_key()? != DsnKey::Testpoint {
                        self.unexpected()?;
                    }
                    cfg.wires_include_testpoint = true;
                    self.need_right()?;
                }
                DsnKey::CaseSensitive => {
                    cfg.case_sensitive = self.need_on_off()?;
                    self.need_right()?;
                }
                DsnKey::ViaRotateFirst => {
                    cfg.via_rotate_first = self.need_on_off()?;
                    self.need_right()?;
                }
                DsnKey::GeneratedByFreeroute => {
                    cfg.generated_by_freeroute = true;
                    self.need_right()?;
                }
                _ => self.unexpected()?,
            }
        }
        self.add(parent, DsnKey::Parser, cfg);
        self.leave();
        Ok(())
    }
    /// Parse a `unit` or `resolution` descriptor
    fn parse_unit_res(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        let units = self.need_enum::<DsnUnits>()?;
        let unit_res = if tag == DsnKey::Resolution {
            UnitRes::resolution(units, self.need_int()?)
        } else {
            UnitRes::unit(units)
        };
        self.need_right()?;
        self.add(parent, tag, unit_res);
        Ok(())
    }
    /// Parse a `structure` or session `structure_out`
    fn parse_structure(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        self.enter(tag)?;
        let node = self.add(parent, tag, Elem::Structure);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Unit | DsnKey::Resolution => {
                    self.singleton(node, &[DsnKey::Unit, DsnKey::Resolution])?;
                    self.parse_unit_res(node, key)?;
                }
                DsnKey::Layer => self.parse_layer(node)?,
                DsnKey::LayerNoiseWeight => {
                    self.singleton(node, &[key])?;
                    self.parse_layer_noise_weight(node)?;
                }
                DsnKey::Boundary => {
                    let tag = if self.tree.child_tagged(node, DsnKey::Boundary).is_some() {
                        DsnKey::PlaceBoundary
                    } else {
                        DsnKey::Boundary
                    };
                    self.singleton(node, &[tag])?;
                    self.parse_boundary(node, tag)?;
                }
                DsnKey::PlaceBoundary => {
                    self.singleton(node, &[key])?;
                    self.parse_boundary(node, key)?;
                }
                DsnKey::Region => self.parse_region(node)?,
                DsnKey::SnapAngle => self.parse_stringprop(node, key)?,
                DsnKey::Via => {
                    self.singleton(node, &[key])?;
                    self.parse_via(node)?;
                }
                DsnKey::Control => {
                    self.singleton(node, &[key])?;
                    self.parse_control(node)?;
                }
                DsnKey::Rule | DsnKey::PlaceRule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                DsnKey::Grid => self.parse_grid(node)?,
                k if k.is_in(&DsnKey::KEEPOUTS) => self.parse_keepout(node, k)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    fn parse_layer(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Layer)?;
        let mut layer = Layer {
            name: self.need_symbol()?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Layer, Layer::default());
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Type => {
                    layer.layer_type = self.need_enum()?;
                    self.need_right()?;
                }
                DsnKey::Property => {
                    let mut props = self.parse_properties()?;
                    layer.properties.append(&mut props);
                }
                DsnKey::Direction => {
                    let txt = self.need_symbol()?;
                    layer.direction = Some(match txt.to_ascii_lowercase().as_str() {
                        "hori" => LayerDirection::Horizontal,
                        "vert" => LayerDirection::Vertical,
                        _ => match LayerDirection::parse(&txt) {
                            Some(d) => d,
                            None => self.fail(DsnParseErrorType::InvalidValue)?,
                        },
                    });
                    self.need_right()?;
                }
                DsnKey::Rule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                DsnKey::Cost => {
                    let cost = match self.advance()? {
                        TokenType::Number => LayerCost::Value(self.cur_int()?),
                        _ => LayerCost::Level(self.cur_enum()?),
                    };
                    layer.cost = Some(cost);
                    if let Some(key) = self.next_item()? {
                        if key != DsnKey::Type {
                            self.unexpected()?;
                        }
                        layer.cost_type = Some(self.need_enum()?);
                        self.need_right()?;
                        self.need_right()?;
                    }
                }
                DsnKey::UseNet => loop {
                    match self.advance()? {
                        TokenType::RParen => break,
                        _ => layer.use_net.push(self.cur_symbol()?),
                    }
                },
                _ => self.unexpected()?,
            }
        }
        self.set(node, layer);
        self.leave();
        Ok(())
    }
    /// Parse a list of user properties, `(property (<name> <value>)*)`
    fn parse_properties(&mut self) -> DsnResult<Vec<Property>> {
        let mut props = Vec::new();
        loop {
            match self.advance()? {
                TokenType::RParen => break,
                TokenType::LParen => {
                    let name = self.need_symbol()?;
                    let value = self.need_symbol()?;
                    self.need_right()?;
                    props.push(Property { name, value });
                }
                _ => self.fail(DsnParseErrorType::InvalidToken {
                    expected: TokenType::LParen,
                })?,
            }
        }
        Ok(props)
    }
    fn parse_layer_noise_weight(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::LayerNoiseWeight)?;
        let node = self.add(parent, DsnKey::LayerNoiseWeight, Elem::LayerNoiseWeight);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::LayerPair => {
                    let pair = LayerPair {
                        layer_id0: self.need_symbol()?,
                        layer_id1: self.need_symbol()?,
                        layer_weight: self.need_number()?,
                    };
                    self.need_right()?;
                    self.add(node, key, pair);
                }
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    /// Parse a `boundary` or `place_boundary`: either a single rectangle or a list of paths
    fn parse_boundary(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        self.enter(tag)?;
        let node = self.add(parent, tag, Elem::Boundary);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Rect => {
                    self.singleton(node, &[DsnKey::Rect, DsnKey::Path])?;
                    self.parse_shape(node, key)?;
                }
                DsnKey::Path | DsnKey::PolylinePath => {
                    self.singleton(node, &[DsnKey::Rect])?;
                    self.parse_shape(node, key)?;
                }
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    /// Boolean indication of whether `key` introduces a shape descriptor
    fn is_shape(key: DsnKey) -> bool {
        key.is_in(&DsnKey::SHAPES) || key == DsnKey::Circ || key == DsnKey::PolylinePath
    }
    /// Parse a shape descriptor: `rect`, `circle`, `path`, `polygon` or `qarc`.
    /// The abbreviations `circ` and `polyline_path` are stored as `circle` and `path`.
    fn parse_shape(&mut self, parent: ElemKey, key: DsnKey) -> DsnResult<()> {
        match key {
            DsnKey::Rect => {
                let rect = Rect {
                    layer_id: self.need_symbol()?,
                    point0: self.need_point()?,
                    point1: self.need_point()?,
                };
                self.need_right()?;
                self.add(parent, DsnKey::Rect, rect);
            }
            DsnKey::Circle | DsnKey::Circ => {
                let mut circle = Circle {
                    layer_id: self.need_symbol()?,
                    diameter: self.need_number()?,
                    ..Default::default()
                };
                if self.advance()? == TokenType::Number {
                    let x = self.cur_number()?;
                    let y = self.need_number()?;
                    circle.vertex = DsnPoint::new(x, y);
                    self.need_right()?;
                } else if self.cur() != TokenType::RParen {
                    self.fail(DsnParseErrorType::InvalidToken {
                        expected: TokenType::RParen,
                    })?;
                }
                self.add(parent, DsnKey::Circle, circle);
            }
            DsnKey::Path | DsnKey::PolylinePath | DsnKey::Polygon => {
                let tag = if key == DsnKey::Polygon {
                    DsnKey::Polygon
                } else {
                    DsnKey::Path
                };
                let mut path = Path {
                    layer_id: self.need_symbol()?,
                    aperture_width: self.need_number()?,
                    ..Default::default()
                };
                loop {
                    match self.advance()? {
                        TokenType::RParen => break,
                        TokenType::Number => {
                            let x = self.cur_number()?;
                            let y = self.need_number()?;
                            path.points.push(DsnPoint::new(x, y));
                        }
                        TokenType::LParen => {
                            if self.need_key()? != DsnKey::ApertureType {
                                self.unexpected()?;
                            }
                            path.aperture_type = self.need_enum()?;
                            self.need_right()?;
                        }
                        _ => self.fail(DsnParseErrorType::InvalidToken {
                            expected: TokenType::Number,
                        })?,
                    }
                }
                self.add(parent, tag, path);
            }
            DsnKey::Qarc => {
                let qarc = Qarc {
                    layer_id: self.need_symbol()?,
                    aperture_width: self.need_number()?,
                    vertex: [self.need_point()?, self.need_point()?, self.need_point()?],
                };
                self.need_right()?;
                self.add(parent, DsnKey::Qarc, qarc);
            }
            _ => self.unexpected()?,
        }
        Ok(())
    }
    /// Parse a shape descriptor into `parent`, failing if it already has one
    fn parse_single_shape(&mut self, parent: ElemKey, key: DsnKey) -> DsnResult<()> {
        self.singleton(parent, &DsnKey::SHAPES)?;
        self.parse_shape(parent, key)
    }
    fn parse_window(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Window)?;
        let node = self.add(parent, DsnKey::Window, Elem::Window);
        while let Some(key) = self.next_item()? {
            match key {
                k if Self::is_shape(k) => self.parse_single_shape(node, k)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    /// Parse a keepout-family descriptor or copper `plane`.
    /// An optional name precedes the nested items.
    fn parse_keepout(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        self.enter(tag)?;
        let node = self.add(parent, tag, Keepout::default());
        let mut keepout = Keepout::default();
        self.advance()?;
        if self.is_symbol() {
            keepout.name = self.text();
            self.advance()?;
        }
        while let Some(key) = self.cur_item()? {
            match key {
                DsnKey::SequenceNumber => {
                    keepout.sequence_number = Some(self.need_int()?);
                    self.need_right()?;
                }
                DsnKey::Rule | DsnKey::PlaceRule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                DsnKey::Window => self.parse_window(node)?,
                k if Self::is_shape(k) => self.parse_single_shape(node, k)?,
                _ => self.unexpected()?,
            }
            self.advance()?;
        }
        self.set(node, keepout);
        self.leave();
        Ok(())
    }
    /// Parse the structure-level `via` list of padstacks, and its optional spares
    fn parse_via(&mut self, parent: ElemKey) -> DsnResult<()> {
        let mut via = Via::default();
        loop {
            match self.advance()? {
                TokenType::RParen => break,
                TokenType::LParen => {
                    if self.need_key()? != DsnKey::Spare {
                        self.unexpected()?;
                    }
                    loop {
                        match self.advance()? {
                            TokenType::RParen => break,
                            _ => via.spares.push(self.cur_symbol()?),
                        }
                    }
                }
                _ => via.padstacks.push(self.cur_symbol()?),
            }
        }
        self.add(parent, DsnKey::Via, via);
        Ok(())
    }
    fn parse_control(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Control)?;
        let node = self.add(parent, DsnKey::Control, Control::default());
        let mut control = Control::default();
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::ViaAtSmd => {
                    control.via_at_smd = self.need_on_off()?;
                    match self.advance()? {
                        TokenType::RParen => (),
                        TokenType::Symbol if self.raw().eq_ignore_ascii_case("grid") => {
                            control.via_at_smd_grid_on = self.need_on_off()?;
                            self.need_right()?;
                        }
                        _ => self.unexpected()?,
                    }
                }
                k if k.is_in(&DsnKey::CONTROL_PROPS) => self.parse_tokprop(node, k)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, control);
        self.leave();
        Ok(())
    }
    /// Parse a keyword-valued property, e.g. `(off_grid on)`
    fn parse_tokprop(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        let value = self.need_symbol()?;
        self.need_right()?;
        self.add(parent, tag, TokProp { value });
        Ok(())
    }
    /// Parse a string-valued property, e.g. `(region_net GND)`
    fn parse_stringprop(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        let value = self.need_symbol()?;
        self.need_right()?;
        self.add(parent, tag, StringProp { value });
        Ok(())
    }
    /// Parse a `region`, with optional leading id
    fn parse_region(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Region)?;
        let node = self.add(parent, DsnKey::Region, Region::default());
        let mut region = Region::default();
        self.advance()?;
        if self.is_symbol() {
            region.region_id = self.text();
            self.advance()?;
        }
        const REGION_KIDS: [DsnKey; 3] = [
            DsnKey::RegionNet,
            DsnKey::RegionClass,
            DsnKey::RegionClassClass,
        ];
        while let Some(key) = self.cur_item()? {
            match key {
                DsnKey::Rect | DsnKey::Polygon => {
                    self.singleton(node, &[DsnKey::Rect, DsnKey::Polygon])?;
                    self.parse_shape(node, key)?;
                }
                DsnKey::RegionNet | DsnKey::RegionClass => {
                    self.singleton(node, &REGION_KIDS)?;
                    self.parse_stringprop(node, key)?;
                }
                DsnKey::RegionClassClass => {
                    self.singleton(node, &REGION_KIDS)?;
                    self.parse_class_class(node, key)?;
                }
                DsnKey::Rule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                _ => self.unexpected()?,
            }
            self.advance()?;
        }
        self.set(node, region);
        self.leave();
        Ok(())
    }
    /// Parse a `class_class` or `region_class_class`
    fn parse_class_class(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        self.enter(tag)?;
        let node = self.add(parent, tag, Elem::ClassClass);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Classes => {
                    self.singleton(node, &[key])?;
                    let mut classes = Classes::default();
                    loop {
                        match self.advance()? {
                            TokenType::RParen => break,
                            _ => classes.class_ids.push(self.cur_symbol()?),
                        }
                    }
                    self.add(node, key, classes);
                }
                DsnKey::Rule => self.parse_rule(node, key)?,
                DsnKey::LayerRule => self.parse_layer_rule(node)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    /// Parse a `layer_rule`: layer ids followed by a single rule
    fn parse_layer_rule(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::LayerRule)?;
        let node = self.add(parent, DsnKey::LayerRule, LayerRule::default());
        let mut layer_rule = LayerRule::default();
        loop {
            match self.advance()? {
                TokenType::RParen => break,
                TokenType::LParen => {
                    if self.need_key()? != DsnKey::Rule {
                        self.unexpected()?;
                    }
                    self.singleton(node, &[DsnKey::Rule])?;
                    self.parse_rule(node, DsnKey::Rule)?;
                }
                _ => layer_rule.layer_ids.push(self.cur_symbol()?),
            }
        }
        self.set(node, layer_rule);
        self.leave();
        Ok(())
    }
    fn parse_grid(&mut self, parent: ElemKey) -> DsnResult<()> {
        let mut grid = Grid {
            grid_type: self.need_enum()?,
            dimension: self.need_number()?,
            ..Default::default()
        };
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Direction => grid.direction = Some(self.need_enum()?),
                DsnKey::Offset => grid.offset = self.need_number()?,
                DsnKey::ImageType => grid.image_type = Some(self.need_enum()?),
                _ => self.unexpected()?,
            }
            self.need_right()?;
        }
        self.add(parent, DsnKey::Grid, grid);
        Ok(())
    }
    /// Parse a rule descriptor into pass-through text
    fn parse_rule(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        self.enter(tag)?;
        let rules = self.parse_text_exprs()?;
        self.add(parent, tag, Rule { rules });
        self.leave();
        Ok(())
    }
    /// Read the remainder of the current construct as pass-through text,
    /// one string per top-level sub-expression, e.g. `(width 250)`.
    /// Quoted strings are re-quoted with the active quote character.
    fn parse_text_exprs(&mut self) -> DsnResult<Vec<String>> {
        let quote = self.lex.quote().unwrap_or('"');
        let mut exprs = Vec::new();
        let mut builder = String::new();
        let mut nesting = 1usize;
        let mut prev = self.cur();
        loop {
            let tt = self.advance()?;
            match tt {
                TokenType::End => return self.unexpected(),
                TokenType::LParen => nesting += 1,
                TokenType::RParen => nesting -= 1,
                _ => (),
            }
            if nesting == 0 {
                break;
            }
            if self.ctx.len() + nesting > self.options.max_depth {
                return self.fail(DsnParseErrorType::TooDeep);
            }
            let glued = prev == TokenType::LParen
                || tt == TokenType::RParen
                || (tt == TokenType::LParen && nesting <= 2)
                || tt == TokenType::Dash
                || prev == TokenType::Dash;
            if !glued && !builder.is_empty() {
                builder.push(' ');
            }
            if tt == TokenType::String {
                builder.push(quote);
                builder.push_str(unquote(self.raw()));
                builder.push(quote);
            } else {
                builder.push_str(self.raw());
            }
            if nesting == 1 {
                exprs.push(std::mem::take(&mut builder));
            }
            prev = tt;
        }
        Ok(exprs)
    }
    fn parse_placement(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Placement)?;
        let node = self.add(parent, DsnKey::Placement, Placement::default());
        let mut placement = Placement::default();
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Unit | DsnKey::Resolution => {
                    self.singleton(node, &[DsnKey::Unit, DsnKey::Resolution])?;
                    self.parse_unit_res(node, key)?;
                }
                DsnKey::PlaceControl => {
                    while let Some(key) = self.next_item()? {
                        if key != DsnKey::FlipStyle {
                            self.unexpected()?;
                        }
                        placement.flip_style = Some(self.need_enum()?);
                        self.need_right()?;
                    }
                }
                DsnKey::Component => self.parse_component(node)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, placement);
        self.leave();
        Ok(())
    }
    fn parse_component(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Component)?;
        let image_id = self.need_symbol()?;
        let node = self.add(parent, DsnKey::Component, Component { image_id });
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Place => self.parse_place(node)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    /// Parse a `place`: `(place <id> [<x> <y> <side> <rotation>] ...)`
    fn parse_place(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Place)?;
        let mut place = Place {
            component_id: self.need_symbol()?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Place, Place::default());
        if self.advance()? == TokenType::Number {
            let x = self.cur_number()?;
            let y = self.need_number()?;
            place.vertex = Some(DsnPoint::new(x, y));
            place.side = self.need_enum()?;
            place.rotation = self.need_number()?;
            self.advance()?;
        }
        while let Some(key) = self.cur_item()? {
            match key {
                DsnKey::Mirror => {
                    place.mirror = Some(self.need_enum()?);
                    self.need_right()?;
                }
                DsnKey::Status => {
                    place.status = Some(self.need_enum()?);
                    self.need_right()?;
                }
                DsnKey::LogicalPart => {
                    place.logical_part = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::LockType => {
                    place.lock_type = Some(self.need_enum()?);
                    self.need_right()?;
                }
                DsnKey::Pn => {
                    place.part_number = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::Property => {
                    let mut props = self.parse_properties()?;
                    place.properties.append(&mut props);
                }
                DsnKey::Rule | DsnKey::PlaceRule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                DsnKey::Region => {
                    self.singleton(node, &[key])?;
                    self.parse_region(node)?;
                }
                _ => self.unexpected()?,
            }
            self.advance()?;
        }
        self.set(node, place);
        self.leave();
        Ok(())
    }
    /// Parse a `library` or session `library_out`
    fn parse_library(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        self.enter(tag)?;
        let node = self.add(parent, tag, Library::default());
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Unit | DsnKey::Resolution => {
                    self.singleton(node, &[DsnKey::Unit, DsnKey::Resolution])?;
                    self.parse_unit_res(node, key)?;
                }
                DsnKey::Image => self.parse_image(node)?,
                DsnKey::Padstack => self.parse_padstack(node)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    fn parse_image(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Image)?;
        let mut image = Image {
            image_id: self.need_symbol()?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Image, Image::default());
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Side => {
                    image.side = self.need_enum()?;
                    self.need_right()?;
                }
                DsnKey::Unit | DsnKey::Resolution => {
                    self.singleton(node, &[DsnKey::Unit, DsnKey::Resolution])?;
                    self.parse_unit_res(node, key)?;
                }
                DsnKey::Outline => self.parse_shape_node(node, key)?,
                DsnKey::Pin => self.parse_pin(node)?,
                DsnKey::Rule | DsnKey::PlaceRule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                // Image properties are not retained
                DsnKey::Property | DsnKey::ImageProperty => self.skip_expr()?,
                k if k.is_in(&DsnKey::KEEPOUTS) => self.parse_keepout(node, k)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, image);
        self.leave();
        Ok(())
    }
    /// Parse a `shape` or `outline`, holding a single shape descriptor and optional windows
    fn parse_shape_node(&mut self, parent: ElemKey, tag: DsnKey) -> DsnResult<()> {
        self.enter(tag)?;
        let node = self.add(parent, tag, Shape::default());
        let mut shape = Shape::default();
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Connect => {
                    shape.connect = self.need_on_off()?;
                    self.need_right()?;
                }
                DsnKey::Window => self.parse_window(node)?,
                k if Self::is_shape(k) => self.parse_single_shape(node, k)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, shape);
        self.leave();
        Ok(())
    }
    /// Parse an image `pin`: `(pin <padstack> [(rotate <r>)] <pin_id> <x> <y>)`
    fn parse_pin(&mut self, parent: ElemKey) -> DsnResult<()> {
        let mut pin = Pin {
            padstack_id: self.need_symbol()?,
            ..Default::default()
        };
        if self.advance()? == TokenType::LParen {
            if self.need_key()? != DsnKey::Rotate {
                self.unexpected()?;
            }
            pin.rotation = self.need_number()?;
            self.need_right()?;
            self.advance()?;
        }
        pin.pin_id = self.cur_symbol()?;
        pin.vertex = self.need_point()?;
        self.need_right()?;
        self.add(parent, DsnKey::Pin, pin);
        Ok(())
    }
    fn parse_padstack(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Padstack)?;
        let mut padstack = Padstack {
            padstack_id: self.need_symbol()?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Padstack, Padstack::default());
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Unit | DsnKey::Resolution => {
                    self.singleton(node, &[DsnKey::Unit, DsnKey::Resolution])?;
                    self.parse_unit_res(node, key)?;
                }
                DsnKey::Shape => self.parse_shape_node(node, key)?,
                DsnKey::Attach => {
                    padstack.attach = self.need_on_off()?;
                    if let Some(key) = self.next_item()? {
                        if key != DsnKey::UseVia {
                            self.unexpected()?;
                        }
                        padstack.via_id = self.need_symbol()?;
                        self.need_right()?;
                        self.need_right()?;
                    }
                }
                DsnKey::Rotate => {
                    padstack.rotate = self.need_on_off()?;
                    self.need_right()?;
                }
                DsnKey::Absolute => {
                    padstack.absolute = self.need_on_off()?;
                    self.need_right()?;
                }
                DsnKey::Rule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                _ => self.unexpected()?,
            }
        }
        self.set(node, padstack);
        self.leave();
        Ok(())
    }
    fn parse_network(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Network)?;
        let node = self.add(parent, DsnKey::Network, Elem::Network);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Net => self.parse_net(node)?,
                DsnKey::Class => self.parse_class(node)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    fn parse_net(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Net)?;
        let mut net = Net {
            net_id: self.need_symbol()?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Net, Net::default());
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Unassigned => {
                    net.unassigned = true;
                    self.need_right()?;
                }
                DsnKey::NetNumber => {
                    net.net_number = Some(self.need_int()?);
                    self.need_right()?;
                }
                DsnKey::Pins | DsnKey::Order => {
                    net.pins_type = if key == DsnKey::Pins {
                        PinsType::Pins
                    } else {
                        PinsType::Order
                    };
                    while self.advance()? != TokenType::RParen {
                        net.pins.push(self.cur_pin_ref()?);
                    }
                }
                DsnKey::CompOrder => {
                    self.singleton(node, &[key])?;
                    self.parse_comp_order(node)?;
                }
                DsnKey::Type => {
                    net.net_type = Some(self.need_enum()?);
                    self.need_right()?;
                }
                DsnKey::Rule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                DsnKey::LayerRule => self.parse_layer_rule(node)?,
                DsnKey::Fromto => self.parse_fromto(node)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, net);
        self.leave();
        Ok(())
    }
    /// Parse a net `class`: its id, member net ids, and nested descriptors
    fn parse_class(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Class)?;
        let mut class = Class {
            class_id: self.need_symbol()?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Class, Class::default());
        loop {
            match self.advance()? {
                TokenType::RParen => break,
                TokenType::LParen => match self.need_key()? {
                    DsnKey::Circuit => {
                        let mut exprs = self.parse_text_exprs()?;
                        class.circuit.append(&mut exprs);
                    }
                    DsnKey::Rule => {
                        self.singleton(node, &[DsnKey::Rule])?;
                        self.parse_rule(node, DsnKey::Rule)?;
                    }
                    DsnKey::LayerRule => self.parse_layer_rule(node)?,
                    DsnKey::Topology => {
                        self.singleton(node, &[DsnKey::Topology])?;
                        self.parse_topology(node)?;
                    }
                    _ => self.unexpected()?,
                },
                _ => class.net_ids.push(self.cur_symbol()?),
            }
        }
        self.set(node, class);
        self.leave();
        Ok(())
    }
    fn parse_topology(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Topology)?;
        let node = self.add(parent, DsnKey::Topology, Elem::Topology);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Fromto => self.parse_fromto(node)?,
                DsnKey::CompOrder => self.parse_comp_order(node)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    fn parse_comp_order(&mut self, parent: ElemKey) -> DsnResult<()> {
        let mut comp_order = CompOrder::default();
        while self.advance()? != TokenType::RParen {
            comp_order.placement_ids.push(self.cur_symbol()?);
        }
        self.add(parent, DsnKey::CompOrder, comp_order);
        Ok(())
    }
    /// Parse a `fromto`.
    /// Its two endpoints are read with quoting disabled, so that each is a single token kept verbatim.
    fn parse_fromto(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Fromto)?;
        let old = self.lex.set_quote(None);
        let from_text = self.need_symbol();
        let to_text = self.need_symbol();
        self.lex.set_quote(old);
        let mut fromto = Fromto {
            from_text: from_text?,
            to_text: to_text?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Fromto, Fromto::default());
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Type => {
                    fromto.fromto_type = Some(self.need_enum()?);
                    self.need_right()?;
                }
                DsnKey::Net => {
                    fromto.net_id = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::Rule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                DsnKey::LayerRule => self.parse_layer_rule(node)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, fromto);
        self.leave();
        Ok(())
    }
    fn parse_wiring(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Wiring)?;
        let node = self.add(parent, DsnKey::Wiring, Elem::Wiring);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Unit | DsnKey::Resolution => {
                    self.singleton(node, &[DsnKey::Unit, DsnKey::Resolution])?;
                    self.parse_unit_res(node, key)?;
                }
                DsnKey::Wire => self.parse_wire(node)?,
                DsnKey::Via => self.parse_wire_via(node)?,
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    fn parse_wire(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Wire)?;
        let node = self.add(parent, DsnKey::Wire, Wire::default());
        let mut wire = Wire::default();
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Net => {
                    wire.net_id = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::Turret => {
                    wire.turret = Some(self.need_int()?);
                    self.need_right()?;
                }
                DsnKey::Type => {
                    wire.wire_type = Some(self.need_enum()?);
                    self.need_right()?;
                }
                DsnKey::Attr => {
                    wire.attr = Some(self.need_enum()?);
                    self.need_right()?;
                }
                DsnKey::Shield => {
                    wire.shield = self.need_symbol()?;
                    self.need_right()?;
                }
                DsnKey::Supply => {
                    wire.supply = true;
                    self.need_right()?;
                }
                DsnKey::Window => self.parse_window(node)?,
                DsnKey::Connect => {
                    self.singleton(node, &[key])?;
                    let terms = self.parse_text_exprs()?;
                    self.add(node, key, Connect { terms });
                }
                k if Self::is_shape(k) => self.parse_single_shape(node, k)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, wire);
        self.leave();
        Ok(())
    }
    /// Parse a routed via: `(via <padstack> <x> <y> ... )`
    fn parse_wire_via(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Via)?;
        let mut via = WireVia {
            padstack_id: self.need_symbol()?,
            ..Default::default()
        };
        loop {
            match self.advance()? {
                TokenType::RParen => break,
                TokenType::Number => {
                    let x = self.cur_number()?;
                    let y = self.need_number()?;
                    via.vertexes.push(DsnPoint::new(x, y));
                }
                TokenType::LParen => match self.need_key()? {
                    DsnKey::Net => {
                        via.net_id = self.need_symbol()?;
                        self.need_right()?;
                    }
                    DsnKey::ViaNumber => {
                        via.via_number = Some(self.need_int()?);
                        self.need_right()?;
                    }
                    DsnKey::Type => {
                        via.via_type = Some(self.need_enum()?);
                        self.need_right()?;
                    }
                    DsnKey::Attr => {
                        let attr: ViaAttr = self.need_enum()?;
                        if attr == ViaAttr::VirtualPin {
                            via.virtual_pin_name = self.need_symbol()?;
                        }
                        via.attr = Some(attr);
                        self.need_right()?;
                    }
                    DsnKey::Contact => {
                        while self.advance()? != TokenType::RParen {
                            via.contact_layers.push(self.cur_symbol()?);
                        }
                    }
                    DsnKey::Supply => {
                        via.supply = true;
                        self.need_right()?;
                    }
                    _ => self.unexpected()?,
                },
                _ => self.fail(DsnParseErrorType::InvalidToken {
                    expected: TokenType::Number,
                })?,
            }
        }
        self.add(parent, DsnKey::Via, via);
        self.leave();
        Ok(())
    }
    fn parse_history(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::History)?;
        let node = self.add(parent, DsnKey::History, History::default());
        let mut history = History::default();
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Ancestor => self.parse_ancestor(node)?,
                DsnKey::SelfKey => {
                    while let Some(key) = self.next_item()? {
                        match key {
                            DsnKey::CreatedTime => history.time_stamp = self.parse_time()?,
                            DsnKey::Comment => {
                                history.comments.push(self.need_symbol()?);
                                self.need_right()?;
                            }
                            _ => self.unexpected()?,
                        }
                    }
                }
                _ => self.unexpected()?,
            }
        }
        self.set(node, history);
        self.leave();
        Ok(())
    }
    fn parse_ancestor(&mut self, parent: ElemKey) -> DsnResult<()> {
        let mut ancestor = Ancestor {
            filename: self.need_symbol()?,
            ..Default::default()
        };
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::CreatedTime => ancestor.time_stamp = self.parse_time()?,
                DsnKey::Comment => {
                    ancestor.comment = self.need_symbol()?;
                    self.need_right()?;
                }
                _ => self.unexpected()?,
            }
        }
        self.add(parent, DsnKey::Ancestor, ancestor);
        Ok(())
    }
    /// Parse a time stamp, `<month> <day> <hour> : <minute> : <second> <year>`, and its closing paren
    fn parse_time(&mut self) -> DsnResult<NaiveDateTime> {
        let month = match Month::from_str(&self.need_symbol()?) {
            Ok(m) => m,
            Err(_) => return self.fail(DsnParseErrorType::InvalidValue),
        };
        let day = self.need_int()?;
        let hour = self.need_int()?;
        self.need_colon()?;
        let minute = self.need_int()?;
        self.need_colon()?;
        let second = self.need_int()?;
        let year = self.need_int()?;
        self.need_right()?;
        let stamp = NaiveDate::from_ymd_opt(year, month.number_from_month(), day as u32)
            .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32));
        match stamp {
            Some(t) => Ok(t),
            None => self.fail(DsnParseErrorType::InvalidValue),
        }
    }
    fn need_colon(&mut self) -> DsnResult<()> {
        if self.need_symbol()? != ":" {
            return self.fail(DsnParseErrorType::RequiredWord {
                expected: ":".into(),
            });
        }
        Ok(())
    }
    fn parse_was_is(&mut self, parent: ElemKey) -> DsnResult<()> {
        let mut was_is = WasIs::default();
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Pins => {
                    self.advance()?;
                    let was = self.cur_pin_ref()?;
                    self.advance()?;
                    let is = self.cur_pin_ref()?;
                    self.need_right()?;
                    was_is.pin_pairs.push(PinPair { was, is });
                }
                _ => self.unexpected()?,
            }
        }
        self.add(parent, DsnKey::WasIs, was_is);
        Ok(())
    }
    fn parse_routes(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Routes)?;
        let node = self.add(parent, DsnKey::Routes, Elem::Route);
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::Resolution => {
                    self.singleton(node, &[key])?;
                    self.parse_unit_res(node, key)?;
                }
                DsnKey::Parser => {
                    self.singleton(node, &[key])?;
                    self.parse_parser(node)?;
                }
                DsnKey::StructureOut => {
                    self.singleton(node, &[key])?;
                    self.parse_structure(node, key)?;
                }
                DsnKey::LibraryOut => {
                    self.singleton(node, &[key])?;
                    self.parse_library(node, key)?;
                }
                DsnKey::NetworkOut => {
                    while let Some(key) = self.next_item()? {
                        match key {
                            DsnKey::Net => self.parse_net_out(node)?,
                            _ => self.unexpected()?,
                        }
                    }
                }
                _ => self.unexpected()?,
            }
        }
        self.leave();
        Ok(())
    }
    /// Parse a routed net of a session's `network_out`
    fn parse_net_out(&mut self, parent: ElemKey) -> DsnResult<()> {
        self.enter(DsnKey::Net)?;
        let mut net_out = NetOut {
            net_id: self.need_symbol()?,
            ..Default::default()
        };
        let node = self.add(parent, DsnKey::Net, NetOut::default());
        while let Some(key) = self.next_item()? {
            match key {
                DsnKey::NetNumber => {
                    net_out.net_number = Some(self.need_int()?);
                    self.need_right()?;
                }
                DsnKey::Rule => {
                    self.singleton(node, &[key])?;
                    self.parse_rule(node, key)?;
                }
                DsnKey::Wire => self.parse_wire(node)?,
                DsnKey::Via => self.parse_wire_via(node)?,
                DsnKey::SupplyPin => self.parse_supply_pin(node)?,
                _ => self.unexpected()?,
            }
        }
        self.set(node, net_out);
        self.leave();
        Ok(())
    }
    fn parse_supply_pin(&mut self, parent: ElemKey) -> DsnResult<()> {
        let mut supply_pin = SupplyPin::default();
        loop {
            match self.advance()? {
                TokenType::RParen => break,
                TokenType::LParen => {
                    if self.need_key()? != DsnKey::Net {
                        self.unexpected()?;
                    }
                    supply_pin.net_id = self.need_symbol()?;
                    self.need_right()?;
                }
                _ => supply_pin.pin_refs.push(self.cur_pin_ref()?),
            }
        }
        self.add(parent, DsnKey::SupplyPin, supply_pin);
        Ok(())
    }
    /// Read a `component-pin` reference starting at the current token.
    /// Bare references such as `U2-14` lex as a single symbol, and are split at the first dash.
    /// Quoted references such as `"U2"-"14"` lex as string, dash, and any symbol.
    fn cur_pin_ref(&mut self) -> DsnResult<PinRef> {
        let pin_def = || DsnParseErrorType::RequiredWord {
            expected: "<component_id>-<pin_id>".into(),
        };
        match self.cur() {
            TokenType::String => {
                let component_id = self.text();
                if self.advance()? != TokenType::Dash {
                    return self.fail(pin_def());
                }
                self.advance()?;
                let pin_id = self.cur_symbol()?;
                Ok(PinRef::new(component_id, pin_id))
            }
            TokenType::Symbol | TokenType::Number => match self.raw().split_once('-') {
                Some((component_id, pin_id)) => Ok(PinRef::new(component_id, pin_id)),
                None => self.fail(pin_def()),
            },
            _ => self.fail(pin_def()),
        }
    }
    /// Skip the remainder of the current construct, through its closing paren
    fn skip_expr(&mut self) -> DsnResult<()> {
        let mut nesting = 1usize;
        while nesting > 0 {
            match self.advance()? {
                TokenType::LParen => nesting += 1,
                TokenType::RParen => nesting -= 1,
                TokenType::End => return self.unexpected(),
                _ => (),
            }
        }
        Ok(())
    }
    /// Add a new node to the tree under construction
    #[inline(always)]
    fn add(&mut self, parent: ElemKey, tag: DsnKey, elem: impl Into<Elem>) -> ElemKey {
        self.tree.add_child(parent, tag, elem)
    }
    /// Set the payload of `node`, once its scalar fields are complete
    fn set(&mut self, node: ElemKey, elem: impl Into<Elem>) {
        if let Some(n) = self.tree.get_mut(node) {
            n.elem = elem.into();
        }
    }
    /// Fail if `parent` already holds a child tagged with any of `tags`
    fn singleton(&self, parent: ElemKey, tags: &[DsnKey]) -> DsnResult<()> {
        if self.tree.children_tagged_any(parent, tags).is_empty() {
            Ok(())
        } else {
            self.fail_msg(DsnParseErrorType::Unexpected, "duplicate descriptor")
        }
    }
    /// Push `key` onto the context stack, enforcing the nesting limit
    fn enter(&mut self, key: DsnKey) -> DsnResult<()> {
        self.ctx.push(key);
        if self.ctx.len() > self.options.max_depth {
            return self.fail(DsnParseErrorType::TooDeep);
        }
        trace!(?key, depth = self.ctx.len(), "Parsing");
        Ok(())
    }
    fn leave(&mut self) {
        self.ctx.pop();
    }
    /// Advance the lexer, and return the new current token-type
    #[inline(always)]
    fn advance(&mut self) -> DsnResult<TokenType> {
        self.tok = self.lex.next_token()?;
        Ok(self.tok.ttype)
    }
    #[inline(always)]
    fn cur(&self) -> TokenType {
        self.tok.ttype
    }
    /// Raw source text of the current token
    #[inline(always)]
    fn raw(&self) -> &'src str {
        self.tok.substr(self.src)
    }
    /// Text of the current token, with quotes removed
    fn text(&self) -> String {
        match self.cur() {
            TokenType::String => unquote(self.raw()).to_string(),
            _ => self.raw().to_string(),
        }
    }
    /// Boolean indication of whether the current token can serve as an identifier.
    /// Numbers are accepted, as many designs use numeric pin and net names.
    fn is_symbol(&self) -> bool {
        matches!(
            self.cur(),
            TokenType::Symbol | TokenType::String | TokenType::Number
        )
    }
    /// Assert the next token is of type `ttype`
    fn expect(&mut self, ttype: TokenType) -> DsnResult<()> {
        if self.advance()? != ttype {
            return self.fail(DsnParseErrorType::InvalidToken { expected: ttype });
        }
        Ok(())
    }
    #[inline(always)]
    fn need_left(&mut self) -> DsnResult<()> {
        self.expect(TokenType::LParen)
    }
    #[inline(always)]
    fn need_right(&mut self) -> DsnResult<()> {
        self.expect(TokenType::RParen)
    }
    fn need_symbol(&mut self) -> DsnResult<String> {
        self.advance()?;
        self.cur_symbol()
    }
    fn cur_symbol(&self) -> DsnResult<String> {
        if !self.is_symbol() {
            return self.fail(DsnParseErrorType::InvalidToken {
                expected: TokenType::Symbol,
            });
        }
        Ok(self.text())
    }
    fn need_number(&mut self) -> DsnResult<f64> {
        self.advance()?;
        self.cur_number()
    }
    fn cur_number(&self) -> DsnResult<f64> {
        if self.cur() != TokenType::Number {
            return self.fail(DsnParseErrorType::InvalidToken {
                expected: TokenType::Number,
            });
        }
        match self.raw().parse::<f64>() {
            Ok(v) => Ok(v),
            Err(_) => self.fail(DsnParseErrorType::InvalidValue),
        }
    }
    fn need_int(&mut self) -> DsnResult<i32> {
        self.advance()?;
        self.cur_int()
    }
    fn cur_int(&self) -> DsnResult<i32> {
        let v = self.cur_number()?;
        if v.fract() != 0.0 || v < i32::MIN as f64 || v > i32::MAX as f64 {
            return self.fail(DsnParseErrorType::InvalidValue);
        }
        Ok(v as i32)
    }
    fn need_point(&mut self) -> DsnResult<DsnPoint> {
        let x = self.need_number()?;
        let y = self.need_number()?;
        Ok(DsnPoint::new(x, y))
    }
    /// Interpret the current token as a [DsnKey]
    fn cur_key(&self) -> DsnResult<DsnKey> {
        if self.cur() != TokenType::Symbol {
            return self.fail(DsnParseErrorType::InvalidToken {
                expected: TokenType::Symbol,
            });
        }
        match DsnKey::parse(self.raw()) {
            Some(key) => Ok(key),
            None => self.fail(DsnParseErrorType::InvalidKey),
        }
    }
    fn need_key(&mut self) -> DsnResult<DsnKey> {
        self.advance()?;
        self.cur_key()
    }
    /// Parse an enumerated string-value of type <T>
    fn need_enum<T: EnumStr>(&mut self) -> DsnResult<T> {
        self.advance()?;
        self.cur_enum()
    }
    fn cur_enum<T: EnumStr>(&self) -> DsnResult<T> {
        if !self.is_symbol() {
            return self.fail(DsnParseErrorType::InvalidToken {
                expected: TokenType::Symbol,
            });
        }
        match T::parse(&self.text()) {
            Some(t) => Ok(t),
            None => self.fail(DsnParseErrorType::InvalidValue),
        }
    }
    fn need_on_off(&mut self) -> DsnResult<bool> {
        Ok(self.need_enum::<OnOff>()?.is_on())
    }
    /// Interpret the current token as the start of a nested item.
    /// Returns `None` on a closing paren, or the item's [DsnKey] on an opening paren.
    fn cur_item(&mut self) -> DsnResult<Option<DsnKey>> {
        match self.cur() {
            TokenType::RParen => Ok(None),
            TokenType::LParen => Ok(Some(self.need_key()?)),
            _ => self.fail(DsnParseErrorType::InvalidToken {
                expected: TokenType::LParen,
            }),
        }
    }
    /// Advance, and interpret the new token as with [DsnParser::cur_item]
    fn next_item(&mut self) -> DsnResult<Option<DsnKey>> {
        self.advance()?;
        self.cur_item()
    }
    fn unexpected<T>(&self) -> DsnResult<T> {
        self.fail(DsnParseErrorType::Unexpected)
    }
    /// Error-Generation Helper
    fn fail<T>(&self, tp: DsnParseErrorType) -> DsnResult<T> {
        Err(DsnError::Parse {
            tp,
            msg: None,
            state: self.state(),
        })
    }
    /// Error-Generation Helper
    fn fail_msg<T>(&self, tp: DsnParseErrorType, msg: impl Into<String>) -> DsnResult<T> {
        Err(DsnError::Parse {
            tp,
            msg: Some(msg.into()),
            state: self.state(),
        })
    }
    /// Extract the state of the parser. Generally for error reporting.
    fn state(&self) -> ParserState {
        let token = match self.cur() {
            TokenType::End => "EOF",
            _ => self.raw(),
        }
        .to_string();
        // Sort out the content on the current token's line
        const MAX_CHARS_IN_LINE: usize = 200;
        let linestart = self.tok.loc.start + 1 - self.tok.loc.col.max(1);
        let line_content: String = self.src[linestart..]
            .chars()
            .take_while(|c| *c != '\n')
            .take(MAX_CHARS_IN_LINE)
            .collect();
        ParserState {
            ctx: self.ctx.clone(),
            token,
            line_content,
            line_num: self.tok.loc.line,
            col: self.tok.loc.col,
            pos: self.tok.loc.start,
        }
    }
}
/// State of the parser, generally exposed when providing error info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserState {
    /// Stack of constructs being parsed
    pub ctx: Vec<DsnKey>,
    /// Text of the offending token
    pub token: String,
    pub line_content: String,
    pub line_num: usize,
    pub col: usize,
    pub pos: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> DsnResult<Vec<(TokenType, String)>> {
        let lex = DsnLexer::new(src);
        lex.map(|t| t.map(|t| (t.ttype, t.substr(src).to_string())))
            .collect()
    }

    #[test]
    fn it_lexes() -> DsnResult<()> {
        use TokenType::*;
        let toks = tokens("(pcb \"my board\" (unit mil) -1.5e+02)")?;
        let expected = vec![
            (LParen, "("),
            (Symbol, "pcb"),
            (String, "\"my"),
            (Symbol, "board\""),
            (LParen, "("),
            (Symbol, "unit"),
            (Symbol, "mil"),
            (RParen, ")"),
            (Number, "-1.5e+02"),
            (RParen, ")"),
        ];
        let expected: Vec<_> = expected
            .into_iter()
            .map(|(t, s)| (t, s.to_string()))
            .collect();
        assert_eq!(toks, expected);
        Ok(())
    }
    #[test]
    fn it_lexes_spaces_in_quotes() -> DsnResult<()> {
        let src = "\"my board\" x";
        let mut lex = DsnLexer::new(src);
        lex.set_space_in_quoted_tokens(true);
        let tok = lex.next_token()?;
        assert_eq!(tok.ttype, TokenType::String);
        assert_eq!(tok.substr(src), "\"my board\"");
        assert_eq!(lex.next_token()?.ttype, TokenType::Symbol);
        assert_eq!(lex.next_token()?.ttype, TokenType::End);
        assert_eq!(lex.next_token()?.ttype, TokenType::End);
        Ok(())
    }
    #[test]
    fn it_lexes_quote_defs() -> DsnResult<()> {
        use TokenType::*;
        let toks = tokens("(string_quote \")\n(string_quote ')")?;
        let types: Vec<_> = toks.iter().map(|t| t.0).collect();
        assert_eq!(
            types,
            vec![LParen, Symbol, QuoteDef, RParen, LParen, Symbol, QuoteDef, RParen]
        );
        assert_eq!(toks[2].1, "\"");
        assert_eq!(toks[6].1, "'");
        Ok(())
    }
    #[test]
    fn it_lexes_pin_refs() -> DsnResult<()> {
        use TokenType::*;
        let toks = tokens("U2-14 \"U2\"-\"14\" \"R 1\"-3")?;
        let types: Vec<_> = toks.iter().map(|t| t.0).collect();
        assert_eq!(types, vec![Symbol, String, Dash, String, String, Symbol]);
        Ok(())
    }
    #[test]
    fn it_lexes_negatives_after_strings() -> DsnResult<()> {
        use TokenType::*;
        let src = "\"my layer\" -10 \"R1\"\t-2.5";
        let mut lex = DsnLexer::new(src);
        lex.set_space_in_quoted_tokens(true);
        let toks = lex
            .map(|t| t.map(|t| (t.ttype, t.substr(src).to_string())))
            .collect::<DsnResult<Vec<_>>>()?;
        assert_eq!(
            toks,
            vec![
                (String, "\"my layer\"".to_string()),
                (Number, "-10".to_string()),
                (String, "\"R1\"".to_string()),
                (Number, "-2.5".to_string()),
            ]
        );
        Ok(())
    }
    #[test]
    fn it_skips_comments() -> DsnResult<()> {
        use TokenType::*;
        let src = "# leading comment\n  # indented comment\n(a#b)\n";
        let toks = tokens(src)?;
        assert_eq!(
            toks,
            vec![
                (LParen, "(".to_string()),
                (Symbol, "a#b".to_string()),
                (RParen, ")".to_string())
            ]
        );
        Ok(())
    }
    #[test]
    fn it_fails_unterminated_strings() {
        let src = "(pcb\n  \"unterminated\n)";
        let toks: Vec<_> = DsnLexer::new(src).collect();
        let err = toks.into_iter().find_map(|t| t.err());
        match err {
            Some(DsnError::Lex {
                line,
                col,
                next_char,
                ..
            }) => {
                assert_eq!(line, 2);
                assert_eq!(col, 16);
                assert_eq!(next_char, Some('\n'));
            }
            other => panic!("Expected a lex error, got {:?}", other),
        }
    }
    #[test]
    fn it_reads_rule_text() -> DsnResult<()> {
        let src = r#"(pcb b (structure
            (rule (width 250) (clearance 200 (type smd_smd)) (clearance "1 0"))
        ))"#;
        let tree = parse_design_str(src)?;
        let structure = tree.children(tree.root)[0];
        let rule = tree.child_tagged(structure, DsnKey::Rule).unwrap();
        let rule = tree.elem(rule).unwrap().as_rule().unwrap();
        assert_eq!(
            rule.rules,
            vec![
                "(width 250)",
                "(clearance 200 (type smd_smd))",
                "(clearance \"1\" 0\")",
            ]
        );
        Ok(())
    }
    #[test]
    fn it_reports_positions() {
        let src = "(pcb b\n  (structure\n    (layer F.Cu (type signal) (bogus 1))\n  )\n)";
        match parse_design_str(src) {
            Err(DsnError::Parse { tp, state, .. }) => {
                assert_eq!(tp, DsnParseErrorType::InvalidKey);
                assert_eq!(state.line_num, 3);
                assert_eq!(state.col, 32);
                assert_eq!(state.token, "bogus");
                assert_eq!(state.line_content, "    (layer F.Cu (type signal) (bogus 1))");
                assert_eq!(
                    state.ctx,
                    vec![DsnKey::Pcb, DsnKey::Structure, DsnKey::Layer]
                );
            }
            other => panic!("Expected a parse error, got {:?}", other),
        }
    }
    #[test]
    fn it_rejects_misplaced_keys() {
        // `pins` is a known keyword, but not a structure item
        let src = "(pcb b (structure (pins a)))";
        match parse_design_str(src) {
            Err(DsnError::Parse { tp, .. }) => assert_eq!(tp, DsnParseErrorType::Unexpected),
            other => panic!("Expected a parse error, got {:?}", other),
        }
        // Duplicate singletons
        let src = "(pcb b (structure (unit mil) (unit mm)))";
        assert!(parse_design_str(src).is_err());
    }
    #[test]
    fn it_guards_depth() -> DsnResult<()> {
        let src = "(pcb b (structure (region r1 (region_class_class (classes a b)))))";
        parse_design_str(src)?;

        let opts = ReadOptions { max_depth: 3 };
        match DsnParser::with_options(src, opts)?.parse_design() {
            Err(DsnError::Parse { tp, .. }) => assert_eq!(tp, DsnParseErrorType::TooDeep),
            other => panic!("Expected a depth error, got {:?}", other),
        }

        // Deeply nested rule text is bounded the same way
        let mut src = String::from("(pcb b (structure (rule ");
        src.push_str(&"(".repeat(100));
        src.push_str(&")".repeat(100));
        src.push_str(")))");
        assert!(parse_design_str(&src).is_err());
        Ok(())
    }
    #[test]
    fn it_takes_a_second_boundary_as_place_boundary() -> DsnResult<()> {
        let src = "(pcb b (structure (boundary (rect pcb 0 0 10 10)) (boundary (rect pcb 1 1 9 9))))";
        let tree = parse_design_str(src)?;
        let structure = tree.children(tree.root)[0];
        assert!(tree.child_tagged(structure, DsnKey::Boundary).is_some());
        assert!(tree
            .child_tagged(structure, DsnKey::PlaceBoundary)
            .is_some());

        let src = format!(
            "(pcb b (structure {}))",
            "(boundary (rect pcb 0 0 10 10))".repeat(3)
        );
        assert!(parse_design_str(&src).is_err());
        Ok(())
    }
    #[test]
    fn it_switches_quote_chars() -> DsnResult<()> {
        let src = "(pcb b (parser (string_quote ') (space_in_quoted_tokens on)) (network (net 'my net' (pins 'U 1'-2 R3-1))))";
        let tree = parse_design_str(src)?;
        let network = tree.child_tagged(tree.root, DsnKey::Network).unwrap();
        let net = tree.children(network)[0];
        let net = tree.elem(net).unwrap().as_net().unwrap();
        assert_eq!(net.net_id, "my net");
        assert_eq!(net.pins, vec![PinRef::new("U 1", "2"), PinRef::new("R3", "1")]);

        let parser = tree.child_tagged(tree.root, DsnKey::Parser).unwrap();
        let parser = tree.elem(parser).unwrap().as_parser().unwrap();
        assert_eq!(parser.string_quote, '\'');
        assert!(parser.space_in_quoted_tokens);
        Ok(())
    }
    #[test]
    fn it_reads_fromto_verbatim() -> DsnResult<()> {
        let src = r#"(pcb b (network (net N1 (pins U1-1 U2-1) (fromto "U1"-"1" U2-1 (type fix)))))"#;
        let tree = parse_design_str(src)?;
        let network = tree.child_tagged(tree.root, DsnKey::Network).unwrap();
        let net = tree.children(network)[0];
        let fromto = tree.child_tagged(net, DsnKey::Fromto).unwrap();
        let fromto = tree.elem(fromto).unwrap().as_fromto().unwrap();
        assert_eq!(fromto.from_text, "\"U1\"-\"1\"");
        assert_eq!(fromto.to_text, "U2-1");
        assert_eq!(fromto.fromto_type, Some(FromtoType::Fix));
        Ok(())
    }
    #[test]
    fn it_accepts_abbreviations() -> DsnResult<()> {
        let src = "(pcb b (structure (layer L1 (direction hori)) (layer L2 (direction VERT)))
            (library (image A (outline (circ signal 100)) (outline (polyline_path signal 0 0 0 1 1)))))";
        let tree = parse_design_str(src)?;
        let structure = tree.child_tagged(tree.root, DsnKey::Structure).unwrap();
        let layers = tree.children_tagged(structure, DsnKey::Layer);
        let dir = |k: ElemKey| tree.elem(k).unwrap().as_layer().unwrap().direction;
        assert_eq!(dir(layers[0]), Some(LayerDirection::Horizontal));
        assert_eq!(dir(layers[1]), Some(LayerDirection::Vertical));

        let lib = tree.child_tagged(tree.root, DsnKey::Library).unwrap();
        let image = tree.children(lib)[0];
        let outlines = tree.children_tagged(image, DsnKey::Outline);
        assert!(tree.child_tagged(outlines[0], DsnKey::Circle).is_some());
        assert!(tree.child_tagged(outlines[1], DsnKey::Path).is_some());
        Ok(())
    }
}
