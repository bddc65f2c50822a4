// Formula parser - converts formula strings into AST
// Supports: numbers, cell refs (A1), parentheses, unary +/-, basic math (+, -, *, /)

use std::fmt;

use crate::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Reference to a cell inside the sheet bounds
    CellRef(Position),
    /// Reference-shaped token that addresses no valid cell (e.g. `ZZZZ1`).
    /// Kept verbatim so the formula re-renders as written; evaluates to #REF!.
    InvalidRef(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl Op {
    fn symbol(self) -> char {
        match self {
            Op::Add => '+',
            Op::Sub => '-',
            Op::Mul => '*',
            Op::Div => '/',
        }
    }
}

/// Formula text could not be turned into an expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaParseError {
    /// Byte offset into the expression text where parsing failed.
    pub offset: usize,
    pub message: String,
}

impl FormulaParseError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self { offset, message: message.into() }
    }
}

impl fmt::Display for FormulaParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for FormulaParseError {}

/// Deepest expression tree accepted, counting parentheses, unary signs and
/// chained operators. Keeps parsing, evaluation and rendering off the
/// limits of the call stack.
pub const MAX_DEPTH: usize = 512;

/// Parse an expression (the text after the leading `=`).
pub fn parse(input: &str) -> Result<Expr, FormulaParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FormulaParseError::new(0, "Empty formula"));
    }
    let parser = Parser { tokens: &tokens, end: input.len() };
    let parsed = parser.add_sub(0, 0)?;
    if parsed.next < tokens.len() {
        return Err(FormulaParseError::new(tokens[parsed.next].offset, "Unexpected token"));
    }
    Ok(parsed.expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    CellRef(Position),
    InvalidRef(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, FormulaParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let simple = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(token) = simple {
            tokens.push(Spanned { token, offset });
            chars.next();
            continue;
        }

        match c {
            ' ' | '\t' => {
                chars.next();
            }
            'A'..='Z' | 'a'..='z' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned { token: classify_ident(&ident, offset)?, offset });
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Optional exponent: e, E followed by an optionally signed integer
                if let Some(&(_, e)) = chars.peek() {
                    if e == 'e' || e == 'E' {
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        let mut exp = String::from("e");
                        if let Some(&(_, sign)) = lookahead.peek() {
                            if sign == '+' || sign == '-' {
                                exp.push(sign);
                                lookahead.next();
                            }
                        }
                        let mut has_digits = false;
                        while let Some(&(_, d)) = lookahead.peek() {
                            if d.is_ascii_digit() {
                                exp.push(d);
                                lookahead.next();
                                has_digits = true;
                            } else {
                                break;
                            }
                        }
                        if has_digits {
                            num_str.push_str(&exp);
                            chars = lookahead;
                        }
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| FormulaParseError::new(offset, format!("Invalid number: {}", num_str)))?;
                if !num.is_finite() {
                    return Err(FormulaParseError::new(offset, format!("Number out of range: {}", num_str)));
                }
                tokens.push(Spanned { token: Token::Number(num), offset });
            }
            _ => return Err(FormulaParseError::new(offset, format!("Unexpected character: {}", c))),
        }
    }

    Ok(tokens)
}

/// Uppercase letters followed by digits is a cell reference, valid or not.
/// Anything else is an identifier, and there are no functions or names.
fn classify_ident(ident: &str, offset: usize) -> Result<Token, FormulaParseError> {
    let letters = ident.bytes().take_while(|b| b.is_ascii_uppercase()).count();
    let digits = &ident[letters..];
    let ref_shaped = letters > 0 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    if !ref_shaped {
        return Err(FormulaParseError::new(offset, format!("Unknown identifier: {}", ident)));
    }

    let pos = Position::from_a1(ident);
    if pos.is_valid() {
        Ok(Token::CellRef(pos))
    } else {
        Ok(Token::InvalidRef(ident.to_string()))
    }
}

/// A subtree plus the index of the first token after it.
struct Parsed {
    expr: Expr,
    next: usize,
    height: usize,
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    /// Offset reported for errors at end of input
    end: usize,
}

impl Parser<'_> {
    fn offset_at(&self, pos: usize) -> usize {
        self.tokens.get(pos).map_or(self.end, |t| t.offset)
    }

    fn too_deep(&self, pos: usize) -> FormulaParseError {
        FormulaParseError::new(self.offset_at(pos), format!("Expression nested deeper than {}", MAX_DEPTH))
    }

    fn binary(&self, op: Op, left: Parsed, right: Parsed) -> Result<Parsed, FormulaParseError> {
        let height = left.height.max(right.height) + 1;
        if height > MAX_DEPTH {
            return Err(self.too_deep(right.next));
        }
        Ok(Parsed {
            expr: Expr::BinaryOp { op, left: Box::new(left.expr), right: Box::new(right.expr) },
            next: right.next,
            height,
        })
    }

    fn add_sub(&self, pos: usize, depth: usize) -> Result<Parsed, FormulaParseError> {
        let mut left = self.mul_div(pos, depth)?;

        while let Some(spanned) = self.tokens.get(left.next) {
            let op = match spanned.token {
                Token::Plus => Op::Add,
                Token::Minus => Op::Sub,
                _ => break,
            };
            let right = self.mul_div(left.next + 1, depth)?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn mul_div(&self, pos: usize, depth: usize) -> Result<Parsed, FormulaParseError> {
        let mut left = self.unary(pos, depth)?;

        while let Some(spanned) = self.tokens.get(left.next) {
            let op = match spanned.token {
                Token::Star => Op::Mul,
                Token::Slash => Op::Div,
                _ => break,
            };
            let right = self.unary(left.next + 1, depth)?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    // Unary +/- binds tighter than * and /
    fn unary(&self, pos: usize, depth: usize) -> Result<Parsed, FormulaParseError> {
        let op = match self.tokens.get(pos).map(|t| &t.token) {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Minus,
            _ => return self.primary(pos, depth),
        };
        if depth >= MAX_DEPTH {
            return Err(self.too_deep(pos));
        }
        let operand = self.unary(pos + 1, depth + 1)?;
        Ok(Parsed {
            expr: Expr::Unary { op, operand: Box::new(operand.expr) },
            next: operand.next,
            height: operand.height + 1,
        })
    }

    fn primary(&self, pos: usize, depth: usize) -> Result<Parsed, FormulaParseError> {
        let Some(spanned) = self.tokens.get(pos) else {
            return Err(FormulaParseError::new(self.end, "Unexpected end of expression"));
        };

        let leaf = |expr| Ok(Parsed { expr, next: pos + 1, height: 1 });
        match &spanned.token {
            Token::Number(n) => leaf(Expr::Number(*n)),
            Token::CellRef(p) => leaf(Expr::CellRef(*p)),
            Token::InvalidRef(s) => leaf(Expr::InvalidRef(s.clone())),
            Token::LParen => {
                if depth >= MAX_DEPTH {
                    return Err(self.too_deep(pos));
                }
                let inner = self.add_sub(pos + 1, depth + 1)?;
                match self.tokens.get(inner.next) {
                    Some(Spanned { token: Token::RParen, .. }) => Ok(Parsed { next: inner.next + 1, ..inner }),
                    Some(other) => Err(FormulaParseError::new(other.offset, "Expected closing parenthesis")),
                    None => Err(FormulaParseError::new(self.end, "Missing closing parenthesis")),
                }
            }
            _ => Err(FormulaParseError::new(spanned.offset, "Unexpected token")),
        }
    }
}

// =============================================================================
// Rendering - canonical text with minimal parentheses
// =============================================================================

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::BinaryOp { op: Op::Add | Op::Sub, .. } => 1,
        Expr::BinaryOp { op: Op::Mul | Op::Div, .. } => 2,
        Expr::Unary { .. } => 3,
        Expr::Number(_) | Expr::CellRef(_) | Expr::InvalidRef(_) => 4,
    }
}

/// Render an expression back to formula text (without the leading `=`).
pub fn render(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Number(n) => out.push_str(&n.to_string()),
        Expr::CellRef(p) => out.push_str(&p.to_string()),
        Expr::InvalidRef(s) => out.push_str(s),
        Expr::Unary { op, operand } => {
            out.push(match op {
                UnaryOp::Plus => '+',
                UnaryOp::Minus => '-',
            });
            write_child(operand, precedence(operand) < precedence(expr), out);
        }
        Expr::BinaryOp { op, left, right } => {
            let own = precedence(expr);
            write_child(left, precedence(left) < own, out);
            out.push(op.symbol());
            // Parsing groups left first, so an equal-precedence right
            // operand keeps its parentheses: a-(b-c), and a+(b+c) since f64
            // addition is not associative
            write_child(right, precedence(right) <= own, out);
        }
    }
}

fn write_child(expr: &Expr, parens: bool, out: &mut String) {
    if parens {
        out.push('(');
        write_expr(expr, out);
        out.push(')');
    } else {
        write_expr(expr, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(input: &str) -> String {
        render(&parse(input).unwrap())
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
        assert_eq!(parse("1.5e3").unwrap(), Expr::Number(1500.0));
        assert_eq!(parse(".5").unwrap(), Expr::Number(0.5));
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse("B2").unwrap(), Expr::CellRef(Position::new(1, 1)));
        assert_eq!(parse("ZZZZ1").unwrap(), Expr::InvalidRef("ZZZZ1".to_string()));
        assert_eq!(parse("A0").unwrap(), Expr::InvalidRef("A0".to_string()));
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1+2*3").unwrap();
        match expr {
            Expr::BinaryOp { op: Op::Add, right, .. } => {
                assert!(matches!(*right, Expr::BinaryOp { op: Op::Mul, .. }));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_unary_binds_tighter_than_mul() {
        let expr = parse("-1*2").unwrap();
        assert!(matches!(expr, Expr::BinaryOp { op: Op::Mul, .. }));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "1+", "(1", "1)", "1 2", "SUM(A1)", "a1", "A1:B2", "1..2", "#", "1e999"] {
            assert!(parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_error_offset() {
        let err = parse("1 + $").unwrap_err();
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_render_drops_redundant_parens() {
        assert_eq!(rendered("(1+2)"), "1+2");
        assert_eq!(rendered("(1+2)+3"), "1+2+3");
        assert_eq!(rendered("(1*2)+3"), "1*2+3");
        assert_eq!(rendered("1+(2*3)"), "1+2*3");
        assert_eq!(rendered(" A1 +  B2 "), "A1+B2");
    }

    #[test]
    fn test_render_keeps_required_parens() {
        assert_eq!(rendered("(1+2)*3"), "(1+2)*3");
        assert_eq!(rendered("1-(2-3)"), "1-(2-3)");
        assert_eq!(rendered("1/(2*3)"), "1/(2*3)");
        assert_eq!(rendered("1/(2/3)"), "1/(2/3)");
        assert_eq!(rendered("1+(2+3)"), "1+(2+3)");
        assert_eq!(rendered("1*(2*3)"), "1*(2*3)");
        assert_eq!(rendered("1+(2-3)"), "1+(2-3)");
        assert_eq!(rendered("-(1+2)"), "-(1+2)");
        assert_eq!(rendered("-(1*2)"), "-(1*2)");
        assert_eq!(rendered("--1"), "--1");
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        let deep = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        let err = parse(&deep).unwrap_err();
        assert!(err.message.contains("nested deeper"), "{}", err);

        let signs = format!("{}1", "-".repeat(200_000));
        assert!(parse(&signs).is_err());

        let chain = vec!["1"; 200_000].join("+");
        assert!(parse(&chain).is_err());
    }

    #[test]
    fn test_nesting_up_to_limit_parses() {
        let nested = format!("{}1{}", "(".repeat(MAX_DEPTH - 1), ")".repeat(MAX_DEPTH - 1));
        assert_eq!(parse(&nested).unwrap(), Expr::Number(1.0));

        let chain = vec!["1"; MAX_DEPTH].join("+");
        assert!(parse(&chain).is_ok());
    }

    #[test]
    fn test_render_reparses_to_same_tree() {
        for input in ["1+2*3-4/5", "(A1+B2)/(C3-1)", "-(-A1)", "+1.25e2*ZZZZ9", "1-(2+3)-(4-5)", "0.1+(0.2+0.3)", "A1*(B1*C1)"] {
            let tree = parse(input).unwrap();
            assert_eq!(parse(&render(&tree)).unwrap(), tree, "{input}");
        }
    }
}
