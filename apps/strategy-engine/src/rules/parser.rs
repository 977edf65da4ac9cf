//! Recursive-descent parser for rule text.
//!
//! ```text
//! or      := and ( ("or" | "||") and )*
//! and     := unary ( ("and" | "&&") unary )*
//! unary   := ("not" | "!") unary | "(" or ")" | compare
//! compare := metric op number
//! ```

use super::ast::{CmpOp, Metric, Rule};
use super::error::RuleError;

/// Deepest `not` / parenthesis nesting accepted.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Op(CmpOp),
    And,
    Or,
    Not,
    Open,
    Close,
}

/// Parse rule text.
pub(super) fn parse(input: &str) -> Result<Rule, RuleError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(RuleError::Parse {
            position: 0,
            message: "empty rule".to_string(),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let rule = parser.or()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(RuleError::Parse {
            position: *offset,
            message: format!("unexpected {token:?} after complete rule"),
        });
    }
    Ok(rule)
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, RuleError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'(' => {
                tokens.push((start, Token::Open));
                i += 1;
            }
            b')' => {
                tokens.push((start, Token::Close));
                i += 1;
            }
            b'<' | b'>' | b'=' | b'!' => {
                let two = bytes.get(i + 1) == Some(&b'=');
                let token = match (c, two) {
                    (b'<', true) => Token::Op(CmpOp::Le),
                    (b'<', false) => Token::Op(CmpOp::Lt),
                    (b'>', true) => Token::Op(CmpOp::Ge),
                    (b'>', false) => Token::Op(CmpOp::Gt),
                    (b'=', true) => Token::Op(CmpOp::Eq),
                    (b'!', true) => Token::Op(CmpOp::Ne),
                    (b'!', false) => Token::Not,
                    _ => {
                        return Err(RuleError::Parse {
                            position: start,
                            message: "expected '=='".to_string(),
                        });
                    }
                };
                tokens.push((start, token));
                i += if two { 2 } else { 1 };
            }
            b'&' | b'|' => {
                if bytes.get(i + 1) != Some(&c) {
                    return Err(RuleError::Parse {
                        position: start,
                        message: format!("expected '{0}{0}'", c as char),
                    });
                }
                tokens.push((start, if c == b'&' { Token::And } else { Token::Or }));
                i += 2;
            }
            b'0'..=b'9' | b'-' | b'+' | b'.' => {
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit()
                        || matches!(bytes[i], b'.' | b'e' | b'E')
                        || (matches!(bytes[i], b'-' | b'+') && matches!(bytes[i - 1], b'e' | b'E')))
                {
                    i += 1;
                }
                let text = &input[start..i];
                let value = text.parse::<f64>().map_err(|_| RuleError::Parse {
                    position: start,
                    message: format!("invalid number '{text}'"),
                })?;
                tokens.push((start, Token::Number(value)));
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &input[start..i];
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push((start, token));
            }
            _ => {
                return Err(RuleError::Parse {
                    position: start,
                    message: format!("unexpected character '{}'", input[start..].chars().next().unwrap_or('?')),
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(offset, _)| *offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::Parse {
            position: self.offset(),
            message: message.into(),
        }
    }

    fn or(&mut self) -> Result<Rule, RuleError> {
        let mut terms = vec![self.and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Rule::Any(terms)
        })
    }

    fn and(&mut self) -> Result<Rule, RuleError> {
        let mut terms = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Rule::All(terms)
        })
    }

    fn unary(&mut self) -> Result<Rule, RuleError> {
        if !matches!(self.peek(), Some(Token::Not | Token::Open)) {
            return self.compare();
        }
        if self.depth == MAX_DEPTH {
            return Err(self.error("rule nested too deeply"));
        }
        self.depth += 1;
        let rule = self.nested();
        self.depth -= 1;
        rule
    }

    fn nested(&mut self) -> Result<Rule, RuleError> {
        if self.next() == Some(Token::Not) {
            return Ok(Rule::Not(Box::new(self.unary()?)));
        }
        let inner = self.or()?;
        if self.peek() != Some(&Token::Close) {
            return Err(self.error("expected ')'"));
        }
        self.pos += 1;
        Ok(inner)
    }

    fn compare(&mut self) -> Result<Rule, RuleError> {
        let offset = self.offset();
        let metric = match self.next() {
            Some(Token::Ident(name)) => name.parse::<Metric>()?,
            _ => {
                return Err(RuleError::Parse {
                    position: offset,
                    message: "expected metric name".to_string(),
                });
            }
        };
        let offset = self.offset();
        let Some(Token::Op(op)) = self.next() else {
            return Err(RuleError::Parse {
                position: offset,
                message: "expected comparison operator".to_string(),
            });
        };
        let offset = self.offset();
        let Some(Token::Number(value)) = self.next() else {
            return Err(RuleError::Parse {
                position: offset,
                message: "expected number".to_string(),
            });
        };
        Ok(Rule::compare(metric, op, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_comparison() {
        assert_eq!(
            parse("term_slope >= 0").unwrap(),
            Rule::compare(Metric::TermSlope, CmpOp::Ge, 0.0)
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let rule = parse("iv < 0.5 or iv > 1 and dte >= 7").unwrap();
        assert_eq!(
            rule,
            Rule::Any(vec![
                Rule::compare(Metric::Iv, CmpOp::Lt, 0.5),
                Rule::All(vec![
                    Rule::compare(Metric::Iv, CmpOp::Gt, 1.0),
                    Rule::compare(Metric::Dte, CmpOp::Ge, 7.0),
                ]),
            ])
        );
    }

    #[test]
    fn symbolic_operators_and_parens() {
        let rule = parse("!(skew > 0.05) && (delta >= -0.3 || delta <= -0.5)").unwrap();
        assert!(matches!(rule, Rule::All(ref terms) if terms.len() == 2));
        assert!(matches!(rule, Rule::All(ref terms) if matches!(terms[0], Rule::Not(_))));
    }

    #[test]
    fn scientific_and_negative_numbers() {
        assert_eq!(
            parse("gamma < 5e-3").unwrap(),
            Rule::compare(Metric::Gamma, CmpOp::Lt, 0.005)
        );
        assert_eq!(
            parse("theta >= -0.25").unwrap(),
            Rule::compare(Metric::Theta, CmpOp::Ge, -0.25)
        );
    }

    #[test]
    fn rejects_unknown_metric() {
        assert_eq!(
            parse("gamme < 1"),
            Err(RuleError::UnknownMetric {
                name: "gamme".to_string()
            })
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(parse(""), Err(RuleError::Parse { .. })));
        assert!(matches!(parse("iv <"), Err(RuleError::Parse { position: 4, .. })));
        assert!(matches!(parse("(iv < 1"), Err(RuleError::Parse { .. })));
        assert!(matches!(parse("iv < 1 iv"), Err(RuleError::Parse { position: 7, .. })));
        assert!(matches!(parse("iv = 1"), Err(RuleError::Parse { position: 3, .. })));
        assert!(matches!(parse("iv < 1 & dte > 2"), Err(RuleError::Parse { .. })));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let negations = format!("{}delta > 0", "not ".repeat(200_000));
        assert!(matches!(
            parse(&negations),
            Err(RuleError::Parse { ref message, .. }) if message == "rule nested too deeply"
        ));

        let parens = format!("{}iv < 1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(
            parse(&parens),
            Err(RuleError::Parse { ref message, .. }) if message == "rule nested too deeply"
        ));
    }

    #[test]
    fn moderate_nesting_parses() {
        let rule = format!("{}iv < 1{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert_eq!(parse(&rule).unwrap(), Rule::compare(Metric::Iv, CmpOp::Lt, 1.0));
        assert!(matches!(parse("not not iv < 1").unwrap(), Rule::Not(_)));
    }
}
