//! Restricted arithmetic evaluator for the `calc` command.
//!
//! Two passes. [`validate`] scans the raw string once, tracking parenthesis
//! depth and the identifier typed just before each `(`, and rejects anything
//! outside the whitelist. [`evaluate`] then runs a small recursive-descent
//! parser over numbers, `+ - * / % ^`, parentheses, the functions
//! `cos exp log sin tan` and the constants `PI`, `π`, `E`. Nothing else is
//! nameable, so there is no way to reach anything outside the expression.

use thiserror::Error;

/// Functions that may appear in front of `(`.
pub const FUNCTIONS: &[&str] = &["cos", "exp", "log", "sin", "tan"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is not a function")]
    NotAFunction(String),

    #[error("{0} closing parenthesis missing")]
    Unclosed(i64),

    #[error("invalid closing parenthesis")]
    InvalidClosing,

    #[error("invalid character: {0}")]
    InvalidCharacter(char),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Scan state for one validation pass.
#[derive(Debug, Default)]
struct ParenthesisContext {
    open_count: i64,
    qualifier: String,
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit()
        || c.is_ascii_alphabetic()
        || c.is_whitespace()
        || c == 'π'
        || "+-*/%^().".contains(c)
}

/// Check grouping balance and function names without evaluating anything.
pub fn validate(expr: &str) -> Result<(), ValidationError> {
    let mut ctx = ParenthesisContext::default();
    let mut went_negative = false;

    for c in expr.chars() {
        if !is_allowed(c) {
            return Err(ValidationError::InvalidCharacter(c));
        }
        match c {
            '(' => {
                if !ctx.qualifier.is_empty() && !FUNCTIONS.contains(&ctx.qualifier.as_str()) {
                    return Err(ValidationError::NotAFunction(ctx.qualifier));
                }
                ctx.qualifier.clear();
                ctx.open_count += 1;
            }
            ')' => {
                ctx.qualifier.clear();
                ctx.open_count -= 1;
                if ctx.open_count < 0 {
                    went_negative = true;
                }
            }
            c if c.is_ascii_alphabetic() || c == 'π' => ctx.qualifier.push(c),
            _ => ctx.qualifier.clear(),
        }
    }

    if went_negative {
        return Err(ValidationError::InvalidClosing);
    }
    match ctx.open_count {
        0 => Ok(()),
        n if n > 0 => Err(ValidationError::Unclosed(n)),
        _ => Err(ValidationError::InvalidClosing),
    }
}

/// Validate, then evaluate `expr` to a finite number.
pub fn evaluate(expr: &str) -> Result<f64, EvalError> {
    validate(expr)?;
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(EvalError::Evaluation("empty expression".into()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(EvalError::Evaluation(format!("unexpected {tok}")));
    }
    if !value.is_finite() {
        return Err(EvalError::Evaluation("result is not a finite number".into()));
    }
    Ok(value)
}

/// Render a result the way people expect to read it: integers without `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {n}"),
            Token::Ident(s) => write!(f, "symbol {s}"),
            Token::Op(c) => write!(f, "operator {c}"),
            Token::Open => write!(f, "'('"),
            Token::Close => write!(f, "')'"),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Op('^'));
                i += 2;
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::Evaluation(format!("malformed number {text}")))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_ascii_alphabetic() || c == 'π' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == 'π') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ValidationError::InvalidCharacter(other).into()),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) if ops.contains(c) => {
                let c = *c;
                self.pos += 1;
                Some(c)
            }
            _ => None,
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, EvalError> {
        let mut acc = self.unary()?;
        while let Some(op) = self.eat_op(&['*', '/', '%']) {
            let rhs = self.unary()?;
            acc = match op {
                '*' => acc * rhs,
                '/' => acc / rhs,
                _ => acc % rhs,
            };
        }
        Ok(acc)
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<f64, EvalError> {
        match self.eat_op(&['+', '-']) {
            Some('-') => Ok(-self.unary()?),
            Some(_) => self.unary(),
            None => self.power(),
        }
    }

    // power := primary ('^' unary)?   right-associative, binds tighter than unary minus
    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.primary()?;
        if self.eat_op(&['^']).is_some() {
            let exp = self.unary()?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, EvalError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let v = self.expr()?;
                self.expect_close()?;
                Ok(v)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::Open) {
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect_close()?;
                    apply_function(&name, arg)
                } else {
                    constant(&name)
                }
            }
            Some(tok) => Err(EvalError::Evaluation(format!("unexpected {tok}"))),
            None => Err(EvalError::Evaluation("unexpected end of expression".into())),
        }
    }

    fn expect_close(&mut self) -> Result<(), EvalError> {
        match self.next() {
            Some(Token::Close) => Ok(()),
            Some(tok) => Err(EvalError::Evaluation(format!("expected ')', found {tok}"))),
            None => Err(EvalError::Evaluation("expected ')'".into())),
        }
    }
}

fn apply_function(name: &str, arg: f64) -> Result<f64, EvalError> {
    match name {
        "cos" => Ok(arg.cos()),
        "exp" => Ok(arg.exp()),
        "log" => Ok(arg.ln()),
        "sin" => Ok(arg.sin()),
        "tan" => Ok(arg.tan()),
        other => Err(ValidationError::NotAFunction(other.to_string()).into()),
    }
}

fn constant(name: &str) -> Result<f64, EvalError> {
    match name {
        "PI" | "π" => Ok(std::f64::consts::PI),
        "E" => Ok(std::f64::consts::E),
        other => Err(EvalError::Evaluation(format!("unknown symbol {other}"))),
    }
}
