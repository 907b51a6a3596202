//! Built-in formula functions

use chrono::{Local, Utc};
use std::fmt;
use std::str::FromStr;

use super::error::ExpressionError;
use super::Expression;
use crate::value::Value;

/// A formula: a function applied to argument expressions
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub function: Function,
    pub args: Vec<Expression>,
}

impl Formula {
    /// Build a formula, checking the argument count
    pub fn new(function: Function, args: Vec<Expression>) -> Result<Self, ExpressionError> {
        let (min, max) = function.arity();
        if args.len() < min || max.map(|m| args.len() > m).unwrap_or(false) {
            let expected = match max {
                Some(m) if m == min => min.to_string(),
                Some(m) => format!("{}..{}", min, m),
                None => format!("at least {}", min),
            };
            return Err(ExpressionError::WrongArity {
                function: function.to_string(),
                expected,
                found: args.len(),
            });
        }
        Ok(Self { function, args })
    }

    /// Whether the formula may be evaluated on total rows
    pub fn emits_totals(&self) -> bool {
        self.function.emits_totals()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match arg {
                Expression::Formula(inner) => write!(f, "{}", inner)?,
                other => write!(f, "{}", other)?,
            }
        }
        write!(f, ")")
    }
}

/// Functions available in formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Concat,
    Add,
    Subtract,
    Multiply,
    Divide,
    Coalesce,
    Upper,
    Lower,
    Round,
    If,
    Now,
    Today,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Function::Concat => "Concat",
            Function::Add => "Add",
            Function::Subtract => "Subtract",
            Function::Multiply => "Multiply",
            Function::Divide => "Divide",
            Function::Coalesce => "Coalesce",
            Function::Upper => "Upper",
            Function::Lower => "Lower",
            Function::Round => "Round",
            Function::If => "If",
            Function::Now => "Now",
            Function::Today => "Today",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Function {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "concat" => Ok(Function::Concat),
            "add" => Ok(Function::Add),
            "subtract" => Ok(Function::Subtract),
            "multiply" => Ok(Function::Multiply),
            "divide" => Ok(Function::Divide),
            "coalesce" => Ok(Function::Coalesce),
            "upper" => Ok(Function::Upper),
            "lower" => Ok(Function::Lower),
            "round" => Ok(Function::Round),
            "if" => Ok(Function::If),
            "now" => Ok(Function::Now),
            "today" => Ok(Function::Today),
            _ => Err(ExpressionError::UnknownFunction(s.to_string())),
        }
    }
}

impl Function {
    /// Minimum and optional maximum number of arguments
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Concat | Function::Coalesce => (1, None),
            Function::Add | Function::Multiply => (2, None),
            Function::Subtract | Function::Divide => (2, Some(2)),
            Function::Upper | Function::Lower => (1, Some(1)),
            Function::Round => (1, Some(2)),
            Function::If => (3, Some(3)),
            Function::Now | Function::Today => (0, Some(0)),
        }
    }

    /// Arithmetic functions are meaningful on total rows (e.g. a ratio of two
    /// sums); text and clock functions are not.
    pub fn emits_totals(&self) -> bool {
        matches!(
            self,
            Function::Add
                | Function::Subtract
                | Function::Multiply
                | Function::Divide
                | Function::Round
                | Function::Coalesce
        )
    }

    /// Apply the function to already evaluated arguments
    pub fn evaluate(&self, args: &[Value]) -> Result<Value, ExpressionError> {
        match self {
            Function::Concat => Ok(Value::String(args.iter().map(Value::to_text).collect())),
            Function::Coalesce => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
            Function::Upper => Ok(map_text(&args[0], |s| s.to_uppercase())),
            Function::Lower => Ok(map_text(&args[0], |s| s.to_lowercase())),
            Function::Add => self.arithmetic(args, |a, b| a.checked_add(b), |a, b| a + b),
            Function::Multiply => self.arithmetic(args, |a, b| a.checked_mul(b), |a, b| a * b),
            Function::Subtract => self.arithmetic(args, |a, b| a.checked_sub(b), |a, b| a - b),
            Function::Divide => {
                if args.iter().any(Value::is_null) {
                    return Ok(Value::Null);
                }
                let a = self.number(&args[0])?;
                let b = self.number(&args[1])?;
                if b == 0.0 {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Float(a / b))
                }
            }
            Function::Round => {
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                let x = self.number(&args[0])?;
                let digits = match args.get(1) {
                    Some(d) => d.as_i64().ok_or_else(|| self.failure(format!("'{}' is not a digit count", d)))?,
                    None => 0,
                };
                let factor = 10f64.powi(digits as i32);
                let rounded = (x * factor).round() / factor;
                if digits <= 0 {
                    Ok(Value::Int(rounded as i64))
                } else {
                    Ok(Value::Float(rounded))
                }
            }
            Function::If => {
                let condition = match &args[0] {
                    Value::Null => false,
                    other => other
                        .as_bool()
                        .ok_or_else(|| self.failure(format!("'{}' is not a condition", other)))?,
                };
                Ok(if condition { args[1].clone() } else { args[2].clone() })
            }
            Function::Now => Ok(Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())),
            Function::Today => Ok(Value::String(Local::now().date_naive().format("%Y-%m-%d").to_string())),
        }
    }

    fn arithmetic(
        &self,
        args: &[Value],
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, ExpressionError> {
        if args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        if args.iter().all(|v| matches!(v, Value::Int(_))) {
            let mut acc = args[0].as_i64().unwrap_or_default();
            let mut overflow = false;
            for arg in &args[1..] {
                match int_op(acc, arg.as_i64().unwrap_or_default()) {
                    Some(v) => acc = v,
                    None => {
                        overflow = true;
                        break;
                    }
                }
            }
            if !overflow {
                return Ok(Value::Int(acc));
            }
        }
        let mut acc = self.number(&args[0])?;
        for arg in &args[1..] {
            acc = float_op(acc, self.number(arg)?);
        }
        Ok(Value::Float(acc))
    }

    fn number(&self, value: &Value) -> Result<f64, ExpressionError> {
        value
            .as_f64()
            .ok_or_else(|| self.failure(format!("'{}' is not a number", value)))
    }

    fn failure(&self, message: String) -> ExpressionError {
        ExpressionError::Evaluation {
            function: self.to_string(),
            message,
        }
    }
}

fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::String(f(&other.to_text())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_check() {
        assert!(Formula::new(Function::Divide, vec![Expression::Constant(Value::Int(1))]).is_err());
        assert!(Formula::new(Function::Now, vec![]).is_ok());
        let err = Formula::new(Function::Upper, vec![]).unwrap_err();
        assert!(matches!(err, ExpressionError::WrongArity { found: 0, .. }));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(Function::Add.evaluate(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(
            Function::Multiply.evaluate(&[Value::Int(2), Value::Float(1.5)]).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(Function::Subtract.evaluate(&[Value::Int(2), Value::Null]).unwrap(), Value::Null);
        assert_eq!(Function::Divide.evaluate(&[Value::Int(1), Value::Int(0)]).unwrap(), Value::Null);
        assert_eq!(Function::Divide.evaluate(&[Value::Int(1), Value::Int(4)]).unwrap(), Value::Float(0.25));
        assert!(Function::Add.evaluate(&[Value::from("x"), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(
            Function::Concat
                .evaluate(&[Value::from("a"), Value::Null, Value::Int(1)])
                .unwrap(),
            Value::from("a1")
        );
        assert_eq!(Function::Upper.evaluate(&[Value::from("acme")]).unwrap(), Value::from("ACME"));
        assert_eq!(Function::Coalesce.evaluate(&[Value::Null, Value::from("b")]).unwrap(), Value::from("b"));
    }

    #[test]
    fn test_round_and_if() {
        assert_eq!(Function::Round.evaluate(&[Value::Float(2.456), Value::Int(2)]).unwrap(), Value::Float(2.46));
        assert_eq!(Function::Round.evaluate(&[Value::Float(2.5)]).unwrap(), Value::Int(3));
        assert_eq!(
            Function::If
                .evaluate(&[Value::Bool(false), Value::from("y"), Value::from("n")])
                .unwrap(),
            Value::from("n")
        );
    }

    #[test]
    fn test_emits_totals() {
        assert!(Function::Divide.emits_totals());
        assert!(!Function::Concat.emits_totals());
        assert!(!Function::Now.emits_totals());
    }
}
