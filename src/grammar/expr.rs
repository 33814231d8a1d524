//! Computed mapping expressions.
//!
//! Mappings may name a column directly (`"hwy"`) or compute values from
//! columns (`"unemploy / pop"`, `"factor(cyl)"`, `"reorder(class, hwy)"`).
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := number | string | ident | ident '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! Identifiers may be wrapped in backticks to reference names with spaces.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::numeric;

use super::data::{days_to_year, DataFrame};
use super::series::Series;

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl BinaryOp {
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Numeric literal.
    Number(f32),
    /// Quoted string literal; evaluates to a single-level discrete series.
    Text(String),
    /// Column reference.
    Column(String),
    /// Unary minus.
    Neg(Box<Node>),
    /// Binary arithmetic.
    Binary(BinaryOp, Box<Node>, Box<Node>),
    /// Function call.
    Call(String, Vec<Node>),
}

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    source: String,
    root: Node,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f32),
    Ident(String),
    Text(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl Expr {
    /// Parse an expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExpression`] on a syntax error.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { source, tokens, pos: 0 };
        let root = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(Self { source: source.to_string(), root })
    }

    /// Source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// `true` when the expression is a bare column reference.
    #[must_use]
    pub fn is_column(&self) -> bool {
        matches!(self.root, Node::Column(_))
    }

    /// Column names referenced by the expression.
    #[must_use]
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_columns(&self.root, &mut out);
        out
    }

    /// Evaluate against a data frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] for a missing column, or
    /// [`Error::InvalidExpression`] for type errors and unknown functions.
    pub fn evaluate(&self, data: &DataFrame) -> Result<Series> {
        for column in self.columns() {
            if !data.has_column(&column) {
                return Err(Error::unknown_column(&column, data.columns()));
            }
        }
        self.eval(&self.root, data)
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidExpression { expr: self.source.clone(), reason: reason.into() }
    }

    fn eval(&self, node: &Node, data: &DataFrame) -> Result<Series> {
        let n = data.nrow();
        match node {
            Node::Number(v) => Ok(Series::constant(*v, n)),
            Node::Text(s) => Ok(Series::from_labels(&vec![s.as_str(); n])),
            Node::Column(name) => Ok(Series::from_column(data.column(name)?)),
            Node::Neg(inner) => {
                let values = self.numeric(inner, data)?;
                Ok(Series::continuous(values.iter().map(|v| -v).collect()))
            }
            Node::Binary(op, lhs, rhs) => {
                let a = self.numeric(lhs, data)?;
                let b = self.numeric(rhs, data)?;
                Ok(Series::continuous(a.iter().zip(&b).map(|(&x, &y)| op.apply(x, y)).collect()))
            }
            Node::Call(name, args) => self.call(name, args, data),
        }
    }

    fn numeric(&self, node: &Node, data: &DataFrame) -> Result<Vec<f32>> {
        match self.eval(node, data)? {
            Series::Continuous { values, .. } => Ok(values),
            Series::Discrete { .. } => {
                Err(self.invalid("arithmetic on a discrete value; map it directly instead"))
            }
        }
    }

    fn arity(&self, name: &str, args: &[Node], expected: usize) -> Result<()> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(self.invalid(format!("{name}() takes {expected} argument(s), got {}", args.len())))
        }
    }

    fn call(&self, name: &str, args: &[Node], data: &DataFrame) -> Result<Series> {
        let unary = |f: fn(f32) -> f32| -> Result<Series> {
            self.arity(name, args, 1)?;
            let values = self.numeric(&args[0], data)?;
            Ok(Series::continuous(values.into_iter().map(f).collect()))
        };
        match name {
            "log" => unary(f32::ln),
            "log10" => unary(f32::log10),
            "sqrt" => unary(f32::sqrt),
            "abs" => unary(f32::abs),
            "exp" => unary(f32::exp),
            "year" => {
                self.arity(name, args, 1)?;
                match self.eval(&args[0], data)? {
                    Series::Continuous { values, temporal: true } => Ok(Series::continuous(
                        values.iter().map(|&d| days_to_year(d).unwrap_or(f32::NAN)).collect(),
                    )),
                    _ => Err(self.invalid("year() requires a date-time column")),
                }
            }
            "factor" => {
                self.arity(name, args, 1)?;
                Ok(self.eval(&args[0], data)?.into_discrete())
            }
            "reorder" => {
                self.arity(name, args, 2)?;
                let (codes, levels) = match self.eval(&args[0], data)?.into_discrete() {
                    Series::Discrete { codes, levels, .. } => (codes, levels),
                    Series::Continuous { .. } => return Err(self.invalid("reorder() needs a discrete value")),
                };
                let by = self.numeric(&args[1], data)?;
                Ok(reorder_by_mean(&codes, &levels, &by))
            }
            other => Err(self.invalid(format!("unknown function '{other}'"))),
        }
    }
}

/// Reorder levels by the mean of `by` within each level. Ties and levels
/// without finite values keep their original relative order.
fn reorder_by_mean(codes: &[u32], levels: &[String], by: &[f32]) -> Series {
    let mut buckets: Vec<Vec<f32>> = vec![Vec::new(); levels.len()];
    for (&code, &value) in codes.iter().zip(by) {
        if let Some(bucket) = buckets.get_mut(code as usize) {
            bucket.push(value);
        }
    }
    let means: Vec<f32> =
        buckets.iter().map(|b| numeric::mean(b).unwrap_or(f32::INFINITY)).collect();
    let mut order: Vec<usize> = (0..levels.len()).collect();
    order.sort_by(|&a, &b| means[a].total_cmp(&means[b]));
    let reordered: Vec<String> = order.iter().map(|&i| levels[i].clone()).collect();
    let labels: Vec<&str> = codes.iter().map(|&c| levels[c as usize].as_str()).collect();
    Series::with_declared_levels(&labels, reordered)
}

fn collect_columns(node: &Node, out: &mut BTreeSet<String>) {
    match node {
        Node::Column(name) => {
            out.insert(name.clone());
        }
        Node::Neg(inner) => collect_columns(inner, out),
        Node::Binary(_, lhs, rhs) => {
            collect_columns(lhs, out);
            collect_columns(rhs, out);
        }
        Node::Call(_, args) => args.iter().for_each(|a| collect_columns(a, out)),
        Node::Number(_) | Node::Text(_) => {}
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let invalid = |reason: String| Error::InvalidExpression { expr: source.to_string(), reason };
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '`' | '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| invalid(format!("unterminated {c} quote")))?;
                let text: String = chars[i + 1..i + 1 + end].iter().collect();
                tokens.push(if c == '`' { Token::Ident(text) } else { Token::Text(text) });
                i += end + 2;
            }
            c if c.is_ascii_digit() || c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    i += 1;
                    if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f32>().map_err(|_| invalid(format!("bad number '{text}'")))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(invalid(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> Error {
        Error::InvalidExpression { expr: self.source.to_string(), reason: reason.to_string() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<()> {
        if self.next().as_ref() == Some(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn expr(&mut self) -> Result<Node> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = if *op == '+' { BinaryOp::Add } else { BinaryOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            let op = if *op == '*' { BinaryOp::Mul } else { BinaryOp::Div };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node> {
        if self.peek() == Some(&Token::Op('-')) {
            self.pos += 1;
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Number(v)) => Ok(Node::Number(v)),
            Some(Token::Text(s)) => Ok(Node::Text(s)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Node::Column(name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    args.push(self.expr()?);
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.expr()?);
                    }
                }
                self.expect(&Token::RParen, "')' after arguments")?;
                Ok(Node::Call(name, args))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(_) => Err(self.error("unexpected token")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn economics() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_column_f32("unemploy", &[10.0, 30.0]).unwrap();
        df.add_column_f32("pop", &[100.0, 200.0]).unwrap();
        df.add_column_datetime(
            "date",
            &[
                NaiveDate::from_ymd_opt(1967, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
                NaiveDate::from_ymd_opt(2015, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            ],
        )
        .unwrap();
        df
    }

    #[test]
    fn test_parse_precedence() {
        let expr = Expr::parse("a + b * 2").unwrap();
        assert!(matches!(expr.root(), Node::Binary(BinaryOp::Add, _, rhs) if matches!(**rhs, Node::Binary(BinaryOp::Mul, _, _))));
    }

    #[test]
    fn test_columns_exclude_function_names() {
        let expr = Expr::parse("reorder(class, hwy)").unwrap();
        let cols: Vec<String> = expr.columns().into_iter().collect();
        assert_eq!(cols, vec!["class", "hwy"]);
    }

    #[test]
    fn test_ratio() {
        let series = Expr::parse("unemploy / pop").unwrap().evaluate(&economics()).unwrap();
        assert_eq!(series.values().unwrap(), &[0.1, 0.15]);
    }

    #[test]
    fn test_year_of_datetime() {
        let series = Expr::parse("year(date)").unwrap().evaluate(&economics()).unwrap();
        assert_eq!(series.values().unwrap(), &[1967.0, 2015.0]);
    }

    #[test]
    fn test_unary_and_parens() {
        let series = Expr::parse("-(pop - 50) / 10").unwrap().evaluate(&economics()).unwrap();
        assert_eq!(series.values().unwrap(), &[-5.0, -15.0]);
    }

    #[test]
    fn test_factor_turns_discrete() {
        let series = Expr::parse("factor(pop)").unwrap().evaluate(&economics()).unwrap();
        assert_eq!(series.levels().unwrap(), ["100", "200"]);
    }

    #[test]
    fn test_reorder_by_mean() {
        let mut df = DataFrame::new();
        df.add_column_str("class", &["suv", "compact", "suv", "compact", "midsize"]).unwrap();
        df.add_column_f32("hwy", &[17.0, 29.0, 19.0, 27.0, 27.0]).unwrap();
        let series = Expr::parse("reorder(class, hwy)").unwrap().evaluate(&df).unwrap();
        assert_eq!(series.levels().unwrap(), ["suv", "midsize", "compact"]);
        assert_eq!(series.label(1), "compact");
    }

    #[test]
    fn test_unknown_column() {
        let err = Expr::parse("unemploy / people").unwrap().evaluate(&economics()).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "people"));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["a +", "(a", "a b", "f(a,", "a $ b", "'open"] {
            assert!(matches!(Expr::parse(bad), Err(Error::InvalidExpression { .. })), "{bad}");
        }
    }

    #[test]
    fn test_unknown_function() {
        let err = Expr::parse("cube(pop)").unwrap().evaluate(&economics()).unwrap_err();
        assert!(err.to_string().contains("unknown function 'cube'"));
    }

    #[test]
    fn test_arithmetic_on_discrete_rejected() {
        let err = Expr::parse("factor(pop) + 1").unwrap().evaluate(&economics()).unwrap_err();
        assert!(matches!(err, Error::InvalidExpression { .. }));
    }

    #[test]
    fn test_string_literal_is_single_level() {
        let series = Expr::parse("'blue'").unwrap().evaluate(&economics()).unwrap();
        assert_eq!(series.levels().unwrap(), ["blue"]);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_backtick_identifier() {
        let df = DataFrame::new().with_column("my col", crate::grammar::data::Column::continuous(&[])).unwrap();
        let expr = Expr::parse("`my col` * 2").unwrap();
        assert!(expr.columns().contains("my col"));
        assert!(expr.evaluate(&df).unwrap().is_empty());
    }
}
