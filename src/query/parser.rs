//! Query expression parser
//!
//! ```text
//! expr     := term (" " term)*
//! term     := selector " " operator " " operand
//! selector := attribute-name | "?" | "!" | "~" N
//! operator := "==" | "!=" | "<" | "<=" | ">" | ">="
//! operand  := "\"" glob "\"" | integer
//! ```
//!
//! A bare operand that is not an integer compiles to a term that never
//! holds.
//!
//! Inside a quoted operand `\"` stands for a literal quote and `\\` for a
//! backslash.

use crate::error::{Result, XmlError};

/// What a term compares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Value of the named attribute (empty if absent)
    Attribute(String),
    /// `?`: the element name
    Name,
    /// `!`: `/`-joined names from the query origin down to the element
    Path,
    /// `~N`: text of the N-th content (empty if absent or binary)
    Content(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Case-insensitive glob
    Pattern(String),
    Number(i64),
    /// Bare operand that is not an integer; never holds
    Invalid(String),
}

/// One `selector operator operand` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub selector: Selector,
    pub op: CompareOp,
    pub operand: Operand,
}

/// A compiled expression: every term must hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub terms: Vec<Term>,
}

impl Query {
    /// Compile an expression
    pub fn parse(expr: &str) -> Result<Query> {
        let tokens = tokenize(expr)?;
        if tokens.len() % 3 != 0 {
            return Err(XmlError::Query {
                message: "incomplete term; expected selector, operator and operand".into(),
                term: tokens.len() / 3,
            });
        }

        let terms = tokens
            .chunks_exact(3)
            .enumerate()
            .map(|(index, chunk)| parse_term(index, &chunk[0], &chunk[1], &chunk[2]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Query { terms })
    }
}

#[derive(Debug)]
enum Token {
    Bare(String),
    Quoted(String),
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped) => text.push(escaped),
                        None => text.push('\\'),
                    },
                    _ => text.push(c),
                }
            }
            if !closed {
                return Err(XmlError::Query {
                    message: "unterminated quoted operand".into(),
                    term: tokens.len() / 3,
                });
            }
            tokens.push(Token::Quoted(text));
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                text.push(c);
                chars.next();
            }
            tokens.push(Token::Bare(text));
        }
    }
    Ok(tokens)
}

fn parse_term(index: usize, selector: &Token, op: &Token, operand: &Token) -> Result<Term> {
    let fail = |message: String| XmlError::Query {
        message,
        term: index,
    };

    let selector = match selector {
        Token::Bare(s) if s == "?" => Selector::Name,
        Token::Bare(s) if s == "!" => Selector::Path,
        Token::Bare(s) if s.starts_with('~') => {
            let n = s[1..]
                .parse::<usize>()
                .map_err(|_| fail(format!("bad content index in selector {s:?}")))?;
            Selector::Content(n)
        }
        Token::Bare(s) => Selector::Attribute(s.clone()),
        Token::Quoted(s) => return Err(fail(format!("selector cannot be quoted: {s:?}"))),
    };

    let op = match op {
        Token::Bare(s) => {
            CompareOp::parse(s).ok_or_else(|| fail(format!("unknown operator {s:?}")))?
        }
        Token::Quoted(s) => return Err(fail(format!("operator cannot be quoted: {s:?}"))),
    };

    let operand = match operand {
        Token::Quoted(s) => Operand::Pattern(s.clone()),
        Token::Bare(s) => match s.parse::<i64>() {
            Ok(n) => Operand::Number(n),
            Err(_) => Operand::Invalid(s.clone()),
        },
    };

    Ok(Term {
        selector,
        op,
        operand,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terms() {
        let q = Query::parse(r#"a == "x*" ? != "skip" ~0 >= -3 ! == "root/*""#).unwrap();
        assert_eq!(q.terms.len(), 4);
        assert_eq!(q.terms[0].selector, Selector::Attribute("a".into()));
        assert_eq!(q.terms[0].operand, Operand::Pattern("x*".into()));
        assert_eq!(q.terms[1].selector, Selector::Name);
        assert_eq!(q.terms[1].op, CompareOp::Ne);
        assert_eq!(q.terms[2].selector, Selector::Content(0));
        assert_eq!(q.terms[2].operand, Operand::Number(-3));
        assert_eq!(q.terms[3].selector, Selector::Path);
    }

    #[test]
    fn test_quoted_operand_with_spaces_and_escapes() {
        let q = Query::parse(r#"title == "say \"hi\" now""#).unwrap();
        assert_eq!(q.terms[0].operand, Operand::Pattern("say \"hi\" now".into()));
    }

    #[test]
    fn test_empty_expression_has_no_terms() {
        assert!(Query::parse("   ").unwrap().terms.is_empty());
    }

    #[test]
    fn test_bare_non_integer_operand_compiles() {
        let q = Query::parse("n < abc a == 1x").unwrap();
        assert_eq!(q.terms[0].operand, Operand::Invalid("abc".into()));
        assert_eq!(q.terms[1].operand, Operand::Invalid("1x".into()));
    }

    #[test]
    fn test_errors() {
        let cases = [
            ("a ==", 0),
            ("a == \"x\" b", 1),
            ("a ~= \"x\"", 0),
            ("a == \"x", 0),
            ("~z == 1", 0),
            ("a == 1 \"b\" == 2", 1),
        ];
        for (expr, term) in cases {
            match Query::parse(expr) {
                Err(XmlError::Query { term: t, .. }) => assert_eq!(t, term, "{expr}"),
                other => panic!("{expr}: unexpected {other:?}"),
            }
        }
    }
}
