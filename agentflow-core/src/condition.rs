//! Condition expression evaluator for workflow `condition`/`while` nodes.
//!
//! A hand-written tokenizer plus recursive-descent parser over the grammar:
//!
//! ```text
//! or      := and  ( "||" and )*
//! and     := cmp  ( "&&" cmp )*
//! cmp     := unary ( ("=="|"!="|">"|"<"|">="|"<=") unary )?
//! unary   := "!" unary | primary
//! primary := number | string | ident (".ident")* | "(" or ")" | "true" | "false"
//! ```
//!
//! An unknown identifier resolves to `nil`, and `nil` is always falsy.
//! There is no separate
//! "bare identifier is truthy" fallback — that legacy behavior conflicts
//! with nil-as-false and is not carried forward.

use serde_json::Value;
use std::fmt;

/// Errors raised while tokenizing or parsing a condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionError(pub String);

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition expression error: {}", self.0)
    }
}

impl std::error::Error for ConditionError {}

type Result<T> = std::result::Result<T, ConditionError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Op(&'static str),
    LParen,
    RParen,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    prev_significant: Option<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            prev_significant: None,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&c) = self.chars.peek() else {
                break;
            };
            let tok = match c {
                '(' => {
                    self.chars.next();
                    Token::LParen
                }
                ')' => {
                    self.chars.next();
                    Token::RParen
                }
                '"' => self.read_string()?,
                '&' => self.read_two('&', "&&")?,
                '|' => self.read_two('|', "||")?,
                '=' => self.read_eq()?,
                '!' => self.read_bang()?,
                '<' => self.read_lt_gt('<')?,
                '>' => self.read_lt_gt('>')?,
                '-' if self.negative_number_allowed(&tokens) => self.read_number()?,
                c if c.is_ascii_digit() => self.read_number()?,
                c if c.is_alphabetic() || c == '_' => self.read_ident(),
                other => {
                    return Err(ConditionError(format!("unexpected character '{other}'")))
                }
            };
            self.prev_significant = Some(tok.clone());
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn negative_number_allowed(&self, tokens: &[Token]) -> bool {
        match tokens.last() {
            None => true,
            Some(Token::Op(_)) | Some(Token::LParen) => true,
            _ => false,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn read_string(&mut self) -> Result<Token> {
        self.chars.next(); // opening quote
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some('"') => break,
                Some('\\') => match self.chars.next() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some(other) => s.push(other),
                    None => return Err(ConditionError("unterminated escape".into())),
                },
                Some(c) => s.push(c),
                None => return Err(ConditionError("unterminated string literal".into())),
            }
        }
        Ok(Token::Str(s))
    }

    fn read_two(&mut self, expect: char, op: &'static str) -> Result<Token> {
        self.chars.next();
        if self.chars.next() == Some(expect) {
            Ok(Token::Op(op))
        } else {
            Err(ConditionError(format!("expected '{op}'")))
        }
    }

    fn read_eq(&mut self) -> Result<Token> {
        self.chars.next();
        if self.chars.peek() == Some(&'=') {
            self.chars.next();
            Ok(Token::Op("=="))
        } else {
            Err(ConditionError("expected '=='".into()))
        }
    }

    fn read_bang(&mut self) -> Result<Token> {
        self.chars.next();
        if self.chars.peek() == Some(&'=') {
            self.chars.next();
            Ok(Token::Op("!="))
        } else {
            Ok(Token::Op("!"))
        }
    }

    fn read_lt_gt(&mut self, c: char) -> Result<Token> {
        self.chars.next();
        if self.chars.peek() == Some(&'=') {
            self.chars.next();
            Ok(Token::Op(if c == '<' { "<=" } else { ">=" }))
        } else {
            Ok(Token::Op(if c == '<' { "<" } else { ">" }))
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let mut s = String::new();
        if self.chars.peek() == Some(&'-') {
            s.push('-');
            self.chars.next();
        }
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
            s.push(self.chars.next().unwrap());
        }
        s.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ConditionError(format!("invalid number literal '{s}'")))
    }

    fn read_ident(&mut self) -> Token {
        let mut s = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_' || *c == '.')
        {
            s.push(self.chars.next().unwrap());
        }
        match s.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Ident(s),
        }
    }
}

/// A compiled condition expression. Parse once, evaluate many times.
#[derive(Debug, Clone)]
pub struct Expr(ExprNode);

#[derive(Debug, Clone)]
enum ExprNode {
    Number(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Not(Box<ExprNode>),
    Cmp(&'static str, Box<ExprNode>, Box<ExprNode>),
    And(Box<ExprNode>, Box<ExprNode>),
    Or(Box<ExprNode>, Box<ExprNode>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if &t == want => Ok(()),
            other => Err(ConditionError(format!("expected {want:?}, found {other:?}"))),
        }
    }

    fn parse_or(&mut self) -> Result<ExprNode> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Op("||"))) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = ExprNode::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ExprNode> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::Op("&&"))) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = ExprNode::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<ExprNode> {
        let lhs = self.parse_unary()?;
        if let Some(Token::Op(op)) = self.peek() {
            if matches!(*op, "==" | "!=" | ">" | "<" | ">=" | "<=") {
                let op = *op;
                self.advance();
                let rhs = self.parse_unary()?;
                return Ok(ExprNode::Cmp(op, Box::new(lhs), Box::new(rhs)));
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ExprNode> {
        if matches!(self.peek(), Some(Token::Op("!"))) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(ExprNode::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ExprNode> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(ExprNode::Number(n)),
            Some(Token::Str(s)) => Ok(ExprNode::Str(s)),
            Some(Token::True) => Ok(ExprNode::Bool(true)),
            Some(Token::False) => Ok(ExprNode::Bool(false)),
            Some(Token::Ident(name)) => Ok(ExprNode::Var(name)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(ConditionError(format!("unexpected token {other:?}"))),
        }
    }
}

impl Expr {
    /// Parses a condition expression. The expression is validated
    /// syntactically but variables are resolved lazily at `eval` time.
    pub fn parse(src: &str) -> Result<Self> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        let node = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(ConditionError(format!(
                "unexpected trailing tokens at position {}",
                parser.pos
            )));
        }
        Ok(Expr(node))
    }

    /// Evaluates the expression against a variable map, returning its
    /// truthiness.
    pub fn eval(&self, vars: &Value) -> bool {
        truthy(&eval_node(&self.0, vars))
    }
}

/// Looks up a dot-path (`a.b.c`) in a JSON variable map. Missing segments
/// resolve to `Value::Null`, never an error.
fn resolve_path<'a>(vars: &'a Value, path: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    let mut cur = vars;
    for seg in path.split('.') {
        match cur.get(seg) {
            Some(v) => cur = v,
            None => return &NULL,
        }
    }
    cur
}

fn eval_node(node: &ExprNode, vars: &Value) -> Value {
    match node {
        ExprNode::Number(n) => Value::from(*n),
        ExprNode::Str(s) => Value::String(s.clone()),
        ExprNode::Bool(b) => Value::Bool(*b),
        ExprNode::Var(name) => resolve_path(vars, name).clone(),
        ExprNode::Not(inner) => Value::Bool(!truthy(&eval_node(inner, vars))),
        ExprNode::And(l, r) => {
            Value::Bool(truthy(&eval_node(l, vars)) && truthy(&eval_node(r, vars)))
        }
        ExprNode::Or(l, r) => {
            Value::Bool(truthy(&eval_node(l, vars)) || truthy(&eval_node(r, vars)))
        }
        ExprNode::Cmp(op, l, r) => {
            let lv = eval_node(l, vars);
            let rv = eval_node(r, vars);
            Value::Bool(compare(*op, &lv, &rv))
        }
    }
}

/// Truthiness: `false`, `0`, empty/`"false"`/`"0"` strings, and `nil`
/// are false; everything else is true.
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !(s.is_empty() || s == "false" || s == "0"),
        _ => true,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn render(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "nil".to_string(),
        other => other.to_string(),
    }
}

/// Comparison coercion: numeric if both sides parse as floats,
/// otherwise string comparison. `nil == nil` is true; `nil` is unequal to
/// anything else under `==` and sorts before everything under ordering ops.
fn compare(op: &str, l: &Value, r: &Value) -> bool {
    if l.is_null() || r.is_null() {
        return match op {
            "==" => l.is_null() && r.is_null(),
            "!=" => !(l.is_null() && r.is_null()),
            "<" => l.is_null() && !r.is_null(),
            "<=" => l.is_null(),
            ">" => !l.is_null() && r.is_null(),
            ">=" => r.is_null(),
            _ => false,
        };
    }
    if let (Some(lf), Some(rf)) = (as_f64(l), as_f64(r)) {
        return match op {
            "==" => lf == rf,
            "!=" => lf != rf,
            "<" => lf < rf,
            "<=" => lf <= rf,
            ">" => lf > rf,
            ">=" => lf >= rf,
            _ => false,
        };
    }
    let (ls, rs) = (render(l), render(r));
    match op {
        "==" => ls == rs,
        "!=" => ls != rs,
        "<" => ls < rs,
        "<=" => ls <= rs,
        ">" => ls > rs,
        ">=" => ls >= rs,
        _ => false,
    }
}

/// Convenience one-shot: parse and evaluate in a single call.
pub fn evaluate(src: &str, vars: &Value) -> Result<bool> {
    Ok(Expr::parse(src)?.eval(vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_expression_over_nested_field_and_string_equality() {
        let vars = json!({"result": {"score": 0.9}, "status": "active"});
        assert!(evaluate(r#"result.score > 0.8 && status == "active""#, &vars).unwrap());

        let vars2 = json!({"result": {"score": 0.9}, "status": "inactive"});
        assert!(!evaluate(r#"result.score > 0.8 && status == "active""#, &vars2).unwrap());
    }

    #[test]
    fn nil_equality_and_ordering() {
        let vars = json!({});
        assert!(evaluate("missing == missing", &vars).unwrap());
        assert!(!evaluate(r#"missing == "x""#, &vars).unwrap());
        assert!(evaluate("missing < 5", &vars).unwrap());
    }

    #[test]
    fn negative_numbers_and_parens() {
        let vars = json!({"x": -3});
        assert!(!evaluate("(x < 0) && !(x == -3)", &vars).unwrap());
        assert!(evaluate("x == -3", &vars).unwrap());
    }

    #[test]
    fn string_escapes() {
        let vars = json!({"s": "a\"b"});
        assert!(evaluate(r#"s == "a\"b""#, &vars).unwrap());
    }

    #[test]
    fn truthiness_rules() {
        let vars = json!({"a": 0, "b": "false", "c": "", "d": "hello"});
        assert!(!evaluate("a", &vars).unwrap());
        assert!(!evaluate("b", &vars).unwrap());
        assert!(!evaluate("c", &vars).unwrap());
        assert!(evaluate("d", &vars).unwrap());
    }

    #[test]
    fn unknown_identifier_is_falsy_not_truthy() {
        let vars = json!({});
        assert!(!evaluate("some_unknown_flag", &vars).unwrap());
    }

    #[test]
    fn malformed_expression_errors() {
        assert!(Expr::parse("a ==").is_err());
        assert!(Expr::parse("((a)").is_err());
    }
}
