//! Model formulas in the `response ~ term + term` notation
//!
//! Supported right-hand side syntax:
//!
//! - `age` - main effect
//! - `I(age^2)` - power of a numeric column
//! - `sex:hours_per_week` - interaction
//! - `sex*hours_per_week` - main effects plus their interaction
//! - `.` - every column except the response
//! - `0`, `-1` - drop the intercept; `1` keeps it

use std::fmt;
use thiserror::Error;

/// Errors raised while parsing a formula
#[derive(Error, Debug, PartialEq)]
pub enum FormulaError {
    #[error("Formula has no '~'")]
    MissingTilde,

    #[error("Formula has no response before '~'")]
    MissingResponse,

    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("Formula ends unexpectedly")]
    UnexpectedEnd,

    #[error("Invalid power term: {0}")]
    InvalidPower(String),

    #[error("Only '- 1' removal is supported, found '- {0}'")]
    UnsupportedRemoval(String),
}

/// One variable inside a term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Factor {
    /// Column used as-is
    Variable(String),
    /// Numeric column raised to `degree`
    Power { name: String, degree: u32 },
}

impl Factor {
    /// Name of the underlying column
    pub fn column(&self) -> &str {
        match self {
            Factor::Variable(name) => name,
            Factor::Power { name, .. } => name,
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::Variable(name) => write!(f, "{}", name),
            Factor::Power { name, degree } => write!(f, "I({}^{})", name, degree),
        }
    }
}

/// Product of one or more factors
#[derive(Debug, Clone, Eq)]
pub struct Term {
    pub factors: Vec<Factor>,
}

impl PartialEq for Term {
    /// Terms are equal when they contain the same factors in any order
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.factors.clone();
        let mut b = other.factors.clone();
        a.sort();
        b.sort();
        a == b
    }
}

impl Term {
    pub fn single(factor: Factor) -> Self {
        Self {
            factors: vec![factor],
        }
    }

    /// Interaction order
    pub fn order(&self) -> usize {
        self.factors.len()
    }

    /// Label in formula notation, e.g. `sex:hours_per_week`
    pub fn label(&self) -> String {
        self.factors
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Parsed model formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub response: String,
    pub terms: Vec<Term>,
    pub intercept: bool,
    /// Number of terms preceding a `.` on the right-hand side
    pub dot_at: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Plus,
    Minus,
    Star,
    Colon,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) | Token::Number(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Colon => write!(f, ":"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(input: &str, offset: usize) -> Result<Vec<(Token, usize)>, FormulaError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let pos = offset + i;
        let simple = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            ':' => Some(Token::Colon),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };

        if let Some(token) = simple {
            tokens.push((token, pos));
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            tokens.push((Token::Number(chars[start..i].iter().collect()), pos));
        } else if c.is_alphabetic() || c == '_' || c == '.' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
            {
                i += 1;
            }
            tokens.push((Token::Ident(chars[start..i].iter().collect()), pos));
        } else {
            return Err(FormulaError::UnexpectedToken {
                token: c.to_string(),
                position: pos,
            });
        }
    }

    Ok(tokens)
}

/// Right-hand side item before expansion
enum Item {
    Terms(Vec<Term>),
    Dot,
    Intercept(bool),
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), FormulaError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(FormulaError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), FormulaError> {
        let (token, position) = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(FormulaError::UnexpectedToken {
                token: token.to_string(),
                position,
            })
        }
    }

    fn items(&mut self) -> Result<Vec<Item>, FormulaError> {
        let mut items = Vec::new();
        let mut first = true;

        loop {
            let negate = match self.peek().cloned() {
                None if first => return Err(FormulaError::UnexpectedEnd),
                None => break,
                Some(Token::Plus) if !first => {
                    self.pos += 1;
                    false
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    true
                }
                Some(_) if first => false,
                Some(_) => {
                    let (token, position) = self.next()?;
                    return Err(FormulaError::UnexpectedToken {
                        token: token.to_string(),
                        position,
                    });
                }
            };
            first = false;

            if negate {
                let (token, position) = self.next()?;
                match token {
                    Token::Number(n) if n == "1" => items.push(Item::Intercept(false)),
                    Token::Number(n) => return Err(FormulaError::UnsupportedRemoval(n)),
                    Token::Ident(name) => return Err(FormulaError::UnsupportedRemoval(name)),
                    other => {
                        return Err(FormulaError::UnexpectedToken {
                            token: other.to_string(),
                            position,
                        })
                    }
                }
                continue;
            }

            items.push(self.item()?);
        }

        Ok(items)
    }

    fn item(&mut self) -> Result<Item, FormulaError> {
        match self.peek().cloned() {
            Some(Token::Number(_)) => {
                let (token, position) = self.next()?;
                match token {
                    Token::Number(n) if n == "0" => Ok(Item::Intercept(false)),
                    Token::Number(n) if n == "1" => Ok(Item::Intercept(true)),
                    other => Err(FormulaError::UnexpectedToken {
                        token: other.to_string(),
                        position,
                    }),
                }
            }
            Some(Token::Ident(name)) if name == "." => {
                self.pos += 1;
                Ok(Item::Dot)
            }
            _ => Ok(Item::Terms(self.product()?)),
        }
    }

    /// `interaction ('*' interaction)*`, expanded to all sub-interactions
    fn product(&mut self) -> Result<Vec<Term>, FormulaError> {
        let mut operands = vec![self.interaction()?];
        while self.peek() == Some(&Token::Star) {
            self.pos += 1;
            operands.push(self.interaction()?);
        }

        let n = operands.len();
        let mut terms: Vec<Term> = Vec::new();
        for mask in 1u32..(1 << n) {
            let mut factors: Vec<Factor> = Vec::new();
            for (i, operand) in operands.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    for f in operand {
                        if !factors.contains(f) {
                            factors.push(f.clone());
                        }
                    }
                }
            }
            let term = Term { factors };
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        // Lower-order terms first, stable within an order
        terms.sort_by_key(|t| t.order());
        Ok(terms)
    }

    /// `factor (':' factor)*`
    fn interaction(&mut self) -> Result<Vec<Factor>, FormulaError> {
        let mut factors = vec![self.factor()?];
        while self.peek() == Some(&Token::Colon) {
            self.pos += 1;
            let f = self.factor()?;
            if !factors.contains(&f) {
                factors.push(f);
            }
        }
        Ok(factors)
    }

    fn factor(&mut self) -> Result<Factor, FormulaError> {
        let (token, position) = self.next()?;
        match token {
            Token::Ident(name) if name == "I" && self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let (inner, inner_pos) = self.next()?;
                let Token::Ident(column) = inner else {
                    return Err(FormulaError::InvalidPower(format!(
                        "expected a column name at position {}",
                        inner_pos
                    )));
                };
                self.expect(Token::Caret)?;
                let (exp, _) = self.next()?;
                let degree = match exp {
                    Token::Number(n) => n
                        .parse::<u32>()
                        .map_err(|_| FormulaError::InvalidPower(format!("I({}^{})", column, n)))?,
                    other => {
                        return Err(FormulaError::InvalidPower(format!(
                            "I({}^{})",
                            column, other
                        )))
                    }
                };
                self.expect(Token::RParen)?;
                match degree {
                    0 | 1 => Err(FormulaError::InvalidPower(format!(
                        "I({}^{}): degree must be at least 2",
                        column, degree
                    ))),
                    _ => Ok(Factor::Power {
                        name: column,
                        degree,
                    }),
                }
            }
            Token::Ident(name) if name != "." => Ok(Factor::Variable(name)),
            other => Err(FormulaError::UnexpectedToken {
                token: other.to_string(),
                position,
            }),
        }
    }
}

impl Formula {
    /// Parse `response ~ rhs`
    pub fn parse(input: &str) -> Result<Self, FormulaError> {
        let (lhs, rhs) = input.split_once('~').ok_or(FormulaError::MissingTilde)?;

        let response = lhs.trim();
        if response.is_empty() {
            return Err(FormulaError::MissingResponse);
        }
        if let Some(bad) = response
            .chars()
            .find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '.'))
        {
            return Err(FormulaError::UnexpectedToken {
                token: bad.to_string(),
                position: lhs.find(bad).unwrap_or(0),
            });
        }

        let offset = lhs.len() + 1;
        let mut parser = Parser {
            tokens: tokenize(rhs, offset)?,
            pos: 0,
        };

        let mut terms: Vec<Term> = Vec::new();
        let mut intercept = true;
        let mut dot_at = None;

        for item in parser.items()? {
            match item {
                Item::Terms(expanded) => {
                    for term in expanded {
                        if !terms.contains(&term) {
                            terms.push(term);
                        }
                    }
                }
                Item::Dot => {
                    dot_at.get_or_insert(terms.len());
                }
                Item::Intercept(keep) => intercept = keep,
            }
        }

        Ok(Self {
            response: response.to_string(),
            terms,
            intercept,
            dot_at,
        })
    }

    /// Terms with `.` replaced by the given columns (the response excluded)
    pub fn expand(&self, columns: &[String]) -> Vec<Term> {
        let Some(at) = self.dot_at else {
            return self.terms.clone();
        };

        let mut terms: Vec<Term> = self.terms[..at].to_vec();
        for column in columns {
            if column == &self.response {
                continue;
            }
            let term = Term::single(Factor::Variable(column.clone()));
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        for term in &self.terms[at..] {
            if !terms.contains(term) {
                terms.push(term.clone());
            }
        }
        terms
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.terms.iter().map(|t| t.label()).collect();
        if let Some(at) = self.dot_at {
            parts.insert(at, ".".to_string());
        }
        if !self.intercept {
            parts.push("0".to_string());
        }
        if parts.is_empty() {
            parts.push("1".to_string());
        }
        write!(f, "{} ~ {}", self.response, parts.join(" + "))
    }
}
