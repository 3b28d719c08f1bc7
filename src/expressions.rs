use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// Variable bindings used while instantiating an aperture macro, `$1` is stored under `1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroContext {
    variables: HashMap<u32, f64>,
}

impl MacroContext {
    /// Binds `parameters` to `$1..$n`.
    pub fn from_parameters(parameters: &[f64]) -> Self {
        let variables = parameters
            .iter()
            .enumerate()
            .map(|(index, value)| ((index + 1) as u32, *value))
            .collect();

        Self {
            variables,
        }
    }

    pub fn put(&mut self, number: u32, value: f64) -> Result<(), ExpressionEvaluationError> {
        if number == 0 {
            return Err(ExpressionEvaluationError::InvalidVariable(number));
        }
        self.variables.insert(number, value);
        Ok(())
    }

    pub fn get(&self, number: u32) -> Result<f64, ExpressionEvaluationError> {
        self.variables
            .get(&number)
            .copied()
            .ok_or(ExpressionEvaluationError::UndefinedVariable(number))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionEvaluationError {
    #[error("Undefined variable: ${0}")]
    UndefinedVariable(u32),
    #[error("Invalid variable: ${0}")]
    InvalidVariable(u32),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unexpected input after expression: {0}")]
    TrailingInput(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Variable(u32),
    Plus,
    Minus,
    Multiply,
    Divide,
    Open,
    Close,
}

/// Evaluates a macro arithmetic expression, e.g. `$1x2+0.5`.
///
/// Multiplication is written `x` or `X`, `*` is tolerated as well.
pub fn evaluate_expression(expression: &str, context: &MacroContext) -> Result<f64, ExpressionEvaluationError> {
    let tokens = tokenize(expression)?;
    let mut evaluator = Evaluator {
        tokens: &tokens,
        index: 0,
        context,
    };

    let value = evaluator.sum()?;
    match evaluator.peek() {
        None => Ok(value),
        Some(_) => Err(ExpressionEvaluationError::TrailingInput(expression.to_string())),
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ExpressionEvaluationError> {
    let mut tokens = vec![];
    let mut chars = expression.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            'x' | 'X' | '*' => {
                chars.next();
                tokens.push(Token::Multiply);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Divide);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '$' => {
                chars.next();
                let digits = take_while(&mut chars, |c| c.is_ascii_digit());
                let number = digits
                    .parse::<u32>()
                    .map_err(|_| ExpressionEvaluationError::InvalidNumber(format!("${}", digits)))?;
                tokens.push(Token::Variable(number));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let digits = take_while(&mut chars, |c| c.is_ascii_digit() || c == '.');
                let value = digits
                    .parse::<f64>()
                    .map_err(|_| ExpressionEvaluationError::InvalidNumber(digits.clone()))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(ExpressionEvaluationError::UnexpectedCharacter(other)),
        }
    }

    Ok(tokens)
}

fn take_while(chars: &mut Peekable<Chars>, predicate: impl Fn(char) -> bool) -> String {
    let mut result = String::new();
    while let Some(&c) = chars.peek() {
        if !predicate(c) {
            break;
        }
        result.push(c);
        chars.next();
    }
    result
}

struct Evaluator<'a> {
    tokens: &'a [Token],
    index: usize,
    context: &'a MacroContext,
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.index).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.index += 1;
        token
    }

    fn sum(&mut self) -> Result<f64, ExpressionEvaluationError> {
        let mut value = self.product()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    value += self.product()?;
                }
                Some(Token::Minus) => {
                    self.next();
                    value -= self.product()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn product(&mut self) -> Result<f64, ExpressionEvaluationError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Multiply) => {
                    self.next();
                    value *= self.unary()?;
                }
                Some(Token::Divide) => {
                    self.next();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExpressionEvaluationError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExpressionEvaluationError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.next();
                self.unary()
            }
            _ => self.operand(),
        }
    }

    fn operand(&mut self) -> Result<f64, ExpressionEvaluationError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Variable(number)) => self.context.get(number),
            Some(Token::Open) => {
                let value = self.sum()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    Some(_) => Err(ExpressionEvaluationError::UnexpectedCharacter('(')),
                    None => Err(ExpressionEvaluationError::UnexpectedEnd),
                }
            }
            Some(Token::Close) => Err(ExpressionEvaluationError::UnexpectedCharacter(')')),
            Some(_) | None => Err(ExpressionEvaluationError::UnexpectedEnd),
        }
    }
}
