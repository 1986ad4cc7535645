//! Grammar and pronunciation dictionary loading
//!
//! Vosk takes a flat list of allowed phrases, so JSGF rules are expanded
//! into every sentence they accept. Only finite grammars can be expanded:
//! `*` and `+` repetition are rejected.

use crate::error::ConfigError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Upper bound on expanded sentences per grammar
pub const MAX_PHRASES: usize = 10_000;

lazy_static! {
    static ref GRAMMAR_DECL: Regex =
        Regex::new(r"(?m)^\s*grammar\s+([A-Za-z0-9_.\-]+)\s*;").expect("static regex");
    static ref RULE_DEF: Regex =
        Regex::new(r"(?s)(public\s+)?<([^<>\s]+)>\s*=\s*([^;]*);").expect("static regex");
    static ref BLOCK_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").expect("static regex");
    static ref LINE_COMMENT: Regex = Regex::new(r"(?m)//.*$").expect("static regex");
}

/// A parsed, fully expanded JSGF grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub name: String,
    pub phrases: Vec<String>,
}

impl Grammar {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingGrammar(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source, path)
    }

    pub fn parse(source: &str, path: &Path) -> Result<Self, ConfigError> {
        let malformed = |reason: String| ConfigError::MalformedGrammar {
            path: path.to_path_buf(),
            reason,
        };

        let stripped = BLOCK_COMMENT.replace_all(source, " ");
        let stripped = LINE_COMMENT.replace_all(&stripped, "");

        let name = GRAMMAR_DECL
            .captures(&stripped)
            .map(|c| c[1].to_string())
            .ok_or_else(|| malformed("missing 'grammar <name>;' declaration".into()))?;

        let mut rules: HashMap<String, Expr> = HashMap::new();
        let mut public = Vec::new();
        for cap in RULE_DEF.captures_iter(&stripped) {
            let rule = cap[2].to_string();
            let expr = Parser::new(&cap[3])
                .parse()
                .map_err(|e| malformed(format!("rule <{rule}>: {e}")))?;
            if cap.get(1).is_some() {
                public.push(rule.clone());
            }
            if rules.insert(rule.clone(), expr).is_some() {
                return Err(malformed(format!("rule <{rule}> defined twice")));
            }
        }

        if public.is_empty() {
            return Err(malformed("no public rule".into()));
        }

        let mut expander = Expander {
            rules: &rules,
            visiting: HashSet::new(),
        };
        let mut seen = HashSet::new();
        let mut phrases = Vec::new();
        for rule in &public {
            for words in expander.expand_rule(rule).map_err(malformed)? {
                let phrase = words.join(" ");
                if !phrase.is_empty() && seen.insert(phrase.clone()) {
                    phrases.push(phrase);
                }
            }
        }

        if phrases.is_empty() {
            return Err(malformed("grammar accepts no phrases".into()));
        }

        Ok(Self { name, phrases })
    }

    /// Distinct words used by any phrase
    pub fn words(&self) -> BTreeSet<&str> {
        self.phrases
            .iter()
            .flat_map(|p| p.split_whitespace())
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Word(String),
    Ref(String),
    Seq(Vec<Expr>),
    Alt(Vec<Expr>),
    Opt(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Ref(String),
    Bar,
    Open,
    Close,
    OpenOpt,
    CloseOpt,
}

fn tokenize(body: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Bar);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '[' => {
                chars.next();
                tokens.push(Token::OpenOpt);
            }
            ']' => {
                chars.next();
                tokens.push(Token::CloseOpt);
            }
            '*' | '+' => return Err(format!("repetition '{c}' cannot be expanded")),
            '<' => {
                chars.next();
                let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                if name.is_empty() {
                    return Err("empty rule reference".into());
                }
                tokens.push(Token::Ref(name));
            }
            // Weights: /1.5/
            '/' => {
                chars.next();
                let closed = chars.by_ref().any(|c| c == '/');
                if !closed {
                    return Err("unterminated weight".into());
                }
            }
            // Tags: {anything}
            '{' => {
                chars.next();
                let closed = chars.by_ref().any(|c| c == '}');
                if !closed {
                    return Err("unterminated tag".into());
                }
            }
            '"' => {
                chars.next();
                let quoted: String = chars.by_ref().take_while(|&c| c != '"').collect();
                for word in quoted.split_whitespace() {
                    tokens.push(Token::Word(word.to_lowercase()));
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || "|()[]<>/{}*+\"".contains(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word.to_lowercase()));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    error: Option<String>,
}

impl Parser {
    fn new(body: &str) -> Self {
        match tokenize(body) {
            Ok(tokens) => Self {
                tokens,
                pos: 0,
                error: None,
            },
            Err(e) => Self {
                tokens: Vec::new(),
                pos: 0,
                error: Some(e),
            },
        }
    }

    fn parse(mut self) -> Result<Expr, String> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let expr = self.alternation()?;
        match self.tokens.get(self.pos) {
            None => Ok(expr),
            Some(tok) => Err(format!("unexpected {tok:?}")),
        }
    }

    fn alternation(&mut self) -> Result<Expr, String> {
        let mut alts = vec![self.sequence()?];
        while self.tokens.get(self.pos) == Some(&Token::Bar) {
            self.pos += 1;
            alts.push(self.sequence()?);
        }
        Ok(if alts.len() == 1 {
            alts.remove(0)
        } else {
            Expr::Alt(alts)
        })
    }

    fn sequence(&mut self) -> Result<Expr, String> {
        let mut items = Vec::new();
        while let Some(tok) = self.tokens.get(self.pos).cloned() {
            match tok {
                Token::Word(w) => {
                    self.pos += 1;
                    items.push(Expr::Word(w));
                }
                Token::Ref(r) => {
                    self.pos += 1;
                    items.push(Expr::Ref(r));
                }
                Token::Open => {
                    self.pos += 1;
                    let inner = self.alternation()?;
                    self.expect(Token::Close)?;
                    items.push(inner);
                }
                Token::OpenOpt => {
                    self.pos += 1;
                    let inner = self.alternation()?;
                    self.expect(Token::CloseOpt)?;
                    items.push(Expr::Opt(Box::new(inner)));
                }
                Token::Bar | Token::Close | Token::CloseOpt => break,
            }
        }
        if items.is_empty() {
            return Err("empty alternative".into());
        }
        Ok(Expr::Seq(items))
    }

    fn expect(&mut self, want: Token) -> Result<(), String> {
        match self.tokens.get(self.pos) {
            Some(tok) if *tok == want => {
                self.pos += 1;
                Ok(())
            }
            Some(tok) => Err(format!("expected {want:?}, found {tok:?}")),
            None => Err(format!("expected {want:?} before end of rule")),
        }
    }
}

struct Expander<'a> {
    rules: &'a HashMap<String, Expr>,
    visiting: HashSet<String>,
}

impl Expander<'_> {
    fn expand_rule(&mut self, name: &str) -> Result<Vec<Vec<String>>, String> {
        let rules = self.rules;
        let expr = rules
            .get(name)
            .ok_or_else(|| format!("undefined rule <{name}>"))?;
        if !self.visiting.insert(name.to_string()) {
            return Err(format!("rule <{name}> is recursive"));
        }
        let out = self.expand(expr);
        self.visiting.remove(name);
        out
    }

    fn expand(&mut self, expr: &Expr) -> Result<Vec<Vec<String>>, String> {
        let out = match expr {
            Expr::Word(w) => vec![vec![w.clone()]],
            Expr::Ref(r) => match r.as_str() {
                "NULL" => vec![Vec::new()],
                "VOID" => Vec::new(),
                _ => self.expand_rule(r)?,
            },
            Expr::Opt(inner) => {
                let mut out = vec![Vec::new()];
                out.extend(self.expand(inner)?);
                out
            }
            Expr::Alt(alts) => {
                let mut out = Vec::new();
                for alt in alts {
                    out.extend(self.expand(alt)?);
                    if out.len() > MAX_PHRASES {
                        return Err(too_many());
                    }
                }
                out
            }
            Expr::Seq(items) => {
                let mut out: Vec<Vec<String>> = vec![Vec::new()];
                for item in items {
                    let tails = self.expand(item)?;
                    if out.len().saturating_mul(tails.len()) > MAX_PHRASES {
                        return Err(too_many());
                    }
                    let mut next = Vec::with_capacity(out.len() * tails.len());
                    for head in &out {
                        for tail in &tails {
                            let mut words = head.clone();
                            words.extend(tail.iter().cloned());
                            next.push(words);
                        }
                    }
                    out = next;
                }
                out
            }
        };
        if out.len() > MAX_PHRASES {
            return Err(too_many());
        }
        Ok(out)
    }
}

fn too_many() -> String {
    format!("expands to more than {MAX_PHRASES} phrases")
}

/// Pronunciation dictionary: the set of words the decoder can spell out.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    path: PathBuf,
    words: HashSet<String>,
}

impl Dictionary {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingDictionary(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source, path)
    }

    /// Parse `word PH ON EMES` lines; `word(2)` marks an alternate
    /// pronunciation, `;;;` starts a comment.
    pub fn parse(source: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut words = HashSet::new();
        for (idx, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(";;;") || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            if parts.next().is_none() {
                return Err(ConfigError::MalformedDictionary {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: format!("'{word}' has no pronunciation"),
                });
            }
            let base = match word.find('(') {
                Some(open) if word.ends_with(')') => &word[..open],
                _ => word,
            };
            words.insert(base.to_lowercase());
        }
        if words.is_empty() {
            return Err(ConfigError::MalformedDictionary {
                path: path.to_path_buf(),
                line: 0,
                reason: "no entries".into(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            words,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Every grammar word must be pronounceable.
    pub fn check(&self, grammar: &Grammar) -> Result<(), ConfigError> {
        match grammar.words().into_iter().find(|w| !self.contains(w)) {
            Some(word) => Err(ConfigError::WordNotInDictionary {
                word: word.to_string(),
            }),
            None => Ok(()),
        }
    }
}
