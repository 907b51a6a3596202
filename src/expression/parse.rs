//! Expression parser
//!
//! A small recursive descent parser producing [`Expression`] values. Input is
//! either a formula (`=Func(arg, ...)`), a quoted string, a number, one of the
//! keywords `true`/`false`/`null`, a reference `[#target!column#]`, or an
//! attribute path with an optional `:AGGREGATOR` suffix.

use super::error::ExpressionError;
use super::formula::{Formula, Function};
use super::path::{is_identifier_char, AttributePath};
use super::{Expression, Reference};
use crate::meta_model::AggregateFunction;
use crate::value::Value;

/// Separator between an attribute path and its aggregator
pub const AGGREGATOR_SEPARATOR: char = ':';

pub(crate) fn parse_expression(input: &str) -> Result<Expression, ExpressionError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let (body, is_formula) = match trimmed.strip_prefix('=') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };
    let mut parser = Parser::new(body, is_formula);
    let expression = parser.term()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(parser.unexpected(c));
    }
    Ok(expression)
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
    /// Function calls are only allowed after a leading `=`
    allow_calls: bool,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, allow_calls: bool) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
            allow_calls,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
    }

    fn unexpected(&self, found: char) -> ExpressionError {
        ExpressionError::UnexpectedCharacter {
            input: self.input.to_string(),
            position: self.pos,
            found,
        }
    }

    fn end(&self) -> ExpressionError {
        ExpressionError::UnexpectedEnd {
            input: self.input.to_string(),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ExpressionError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(self.end()),
        }
    }

    fn term(&mut self) -> Result<Expression, ExpressionError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.end()),
            Some(q @ ('\'' | '"')) => self.string(q),
            Some('[') => self.reference(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if is_identifier_char(c) => self.word(),
            Some(c) => Err(self.unexpected(c)),
        }
    }

    fn string(&mut self, quote: char) -> Result<Expression, ExpressionError> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ExpressionError::UnterminatedString {
                        input: self.input.to_string(),
                    })
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => text.push(c),
                        None => {
                            return Err(ExpressionError::UnterminatedString {
                                input: self.input.to_string(),
                            })
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Expression::Constant(Value::String(text)));
                }
                Some(c) => text.push(c),
            }
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<Expression, ExpressionError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self
            .peek()
            .map(|c| c.is_ascii_digit() || c == '.')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Expression::Constant(Value::Int(i)));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Ok(Expression::Constant(Value::Float(f)));
        }
        self.pos = start;
        match self.peek() {
            Some(c) => Err(self.unexpected(c)),
            None => Err(self.end()),
        }
    }

    fn reference(&mut self) -> Result<Expression, ExpressionError> {
        self.expect('[')?;
        self.expect('#')?;
        let target = self.take_until('!')?;
        self.expect('!')?;
        let column = self.take_until('#')?;
        self.expect('#')?;
        self.expect(']')?;
        Ok(Expression::Reference(Reference {
            target: target.trim().to_string(),
            column: column.trim().to_string(),
        }))
    }

    fn take_until(&mut self, stop: char) -> Result<String, ExpressionError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == stop {
                return Ok(self.chars[start..self.pos].iter().collect());
            }
            self.pos += 1;
        }
        Err(self.end())
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().map(is_identifier_char).unwrap_or(false) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn word(&mut self) -> Result<Expression, ExpressionError> {
        let word = self.identifier();
        let after_word = self.pos;
        self.skip_whitespace();
        if self.peek() == Some('(') {
            if !self.allow_calls {
                return Err(self.unexpected('('));
            }
            return self.call(&word);
        }
        self.pos = after_word;

        match word.as_str() {
            "true" => return Ok(Expression::Constant(Value::Bool(true))),
            "false" => return Ok(Expression::Constant(Value::Bool(false))),
            "null" => return Ok(Expression::Constant(Value::Null)),
            _ => {}
        }

        let path = AttributePath::parse(&word)?;
        if self.peek() != Some(AGGREGATOR_SEPARATOR) {
            return Ok(Expression::Attribute(path));
        }
        self.pos += 1;
        let name = self.identifier();
        let function = name
            .parse::<AggregateFunction>()
            .map_err(|source| ExpressionError::InvalidAggregator {
                input: self.input.to_string(),
                source,
            })?;
        Ok(Expression::Aggregate { path, function })
    }

    fn call(&mut self, name: &str) -> Result<Expression, ExpressionError> {
        let function: Function = name.parse()?;
        self.expect('(')?;
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
        } else {
            loop {
                args.push(self.term()?);
                self.skip_whitespace();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some(')') => {
                        self.pos += 1;
                        break;
                    }
                    Some(c) => return Err(self.unexpected(c)),
                    None => return Err(self.end()),
                }
            }
        }
        Ok(Expression::Formula(Formula::new(function, args)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attribute_and_aggregate() {
        let expr = parse_expression("CUSTOMER__NAME").unwrap();
        assert!(matches!(expr, Expression::Attribute(ref p) if p.relations == vec!["CUSTOMER"]));

        let expr = parse_expression("POSITIONS__AMOUNT:sum").unwrap();
        match expr {
            Expression::Aggregate { path, function } => {
                assert_eq!(path.to_string(), "POSITIONS__AMOUNT");
                assert_eq!(function, AggregateFunction::Sum);
            }
            other => panic!("Expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_constants() {
        assert_eq!(parse_expression("'it\\'s'").unwrap(), Expression::Constant(Value::from("it's")));
        assert_eq!(parse_expression("42").unwrap(), Expression::Constant(Value::Int(42)));
        assert_eq!(parse_expression("-1.5").unwrap(), Expression::Constant(Value::Float(-1.5)));
        assert_eq!(parse_expression("null").unwrap(), Expression::Constant(Value::Null));
    }

    #[test]
    fn test_parse_formula() {
        let expr = parse_expression("=Concat(NAME, ' / ', Upper(CUSTOMER__NAME))").unwrap();
        let Expression::Formula(formula) = expr else {
            panic!("Expected formula");
        };
        assert_eq!(formula.function, Function::Concat);
        assert_eq!(formula.args.len(), 3);
        assert!(matches!(formula.args[2], Expression::Formula(_)));
    }

    #[test]
    fn test_parse_reference() {
        let expr = parse_expression("[#orders_table!UID#]").unwrap();
        assert_eq!(
            expr,
            Expression::Reference(Reference {
                target: "orders_table".to_string(),
                column: "UID".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_errors_never_partial() {
        assert!(matches!(parse_expression("  "), Err(ExpressionError::Empty)));
        assert!(matches!(parse_expression("AMOUNT:MEDIAN"), Err(ExpressionError::InvalidAggregator { .. })));
        assert!(matches!(parse_expression("=Frobnicate(A)"), Err(ExpressionError::UnknownFunction(_))));
        assert!(matches!(parse_expression("=Concat(A"), Err(ExpressionError::UnexpectedEnd { .. })));
        assert!(matches!(parse_expression("'open"), Err(ExpressionError::UnterminatedString { .. })));
        assert!(matches!(parse_expression("A B"), Err(ExpressionError::UnexpectedCharacter { .. })));
        // Calls require a leading '='
        assert!(matches!(parse_expression("Upper(A)"), Err(ExpressionError::UnexpectedCharacter { .. })));
        assert!(matches!(parse_expression("=Divide(A)"), Err(ExpressionError::WrongArity { .. })));
    }
}
