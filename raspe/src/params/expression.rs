//! Boolean search-expression expansion.
//!
//! Search portals generally accept one plain phrase per query, so a
//! research question such as `(doença OU doenças) E rara` is expanded into
//! every phrase that together covers it: `OU` unions alternatives and `E`
//! takes the cartesian product, joining the parts with a space.

use crate::errors::ValidationError;

const AND: &str = "E";
const OR: &str = "OU";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Word(String),
}

fn tokenize(expression: &str) -> Vec<Token> {
    let spaced = expression.replace('(', " ( ").replace(')', " ) ");
    spaced
        .split_whitespace()
        .map(|raw| match raw {
            "(" => Token::Open,
            ")" => Token::Close,
            AND => Token::And,
            OR => Token::Or,
            word => Token::Word(word.to_string()),
        })
        .collect()
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    expression: &'a str,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::invalid_expression(self.expression, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> Result<Vec<String>, ValidationError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            left.extend(self.parse_and()?);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Vec<String>, ValidationError> {
        let mut left = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_primary()?;
            left = left
                .iter()
                .flat_map(|l| right.iter().map(move |r| format!("{l} {r}")))
                .collect();
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Vec<String>, ValidationError> {
        match self.peek() {
            Some(Token::Open) => {
                self.pos += 1;
                if self.peek() == Some(&Token::Close) {
                    return Err(self.error("empty parentheses"));
                }
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error("unbalanced parentheses"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Word(_)) => {
                // Adjacent words without an operator form one phrase.
                let mut words = Vec::new();
                while let Some(Token::Word(word)) = self.peek() {
                    words.push(word.clone());
                    self.pos += 1;
                }
                Ok(vec![words.join(" ")])
            }
            Some(Token::Close) => Err(self.error("unbalanced parentheses")),
            Some(Token::And | Token::Or) => Err(self.error("operator without operand")),
            None => Err(self.error("expression ends with an operator")),
        }
    }
}

/// Expands a boolean search expression into the sorted, de-duplicated list
/// of plain search phrases it is equivalent to.
///
/// ```
/// let terms = raspe::params::expand("(doença OU doenças) E (rara OU raras)").unwrap();
/// assert_eq!(terms, ["doença rara", "doença raras", "doenças rara", "doenças raras"]);
/// ```
pub fn expand(expression: &str) -> Result<Vec<String>, ValidationError> {
    let tokens = tokenize(expression);
    if tokens.is_empty() {
        return Err(ValidationError::invalid_expression(expression, "expression is empty"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        expression,
    };
    let mut terms = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unbalanced parentheses"));
    }

    terms.sort();
    terms.dedup();
    Ok(terms)
}
