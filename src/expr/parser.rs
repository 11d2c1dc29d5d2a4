//! Recursive descent parser for calculation expressions
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | power
//! power   := primary ('^' unary)?
//! primary := number | call | name | '(' expr ')'
//! ```
//!
//! `+`, `-`, `*` and `/` associate to the left, `^` to the right.
//! Unary minus over a literal folds into a negative constant; over
//! anything else it becomes a call to the built-in `neg` function so
//! the tree needs no dedicated unary node.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{opt, recognize},
    multi::many0,
    sequence::{delimited, pair},
    IResult, Parser,
};
use thiserror::Error;

use super::ast::{named_constant, BinOp, Expr};

/// Error that can occur during expression parsing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Failed to parse expression: {message}")]
    Parse { message: String },
}

impl Expr {
    /// Parse an expression from a string.
    ///
    /// The whole input must be consumed; trailing characters are an
    /// error. Malformed text yields `ExprError::Parse` and never
    /// panics.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramcalc_rs::expr::Expr;
    ///
    /// let expr = Expr::parse("a + b * 2").unwrap();
    /// assert_eq!(expr.variables(), vec!["a".to_string(), "b".to_string()]);
    ///
    /// assert!(Expr::parse("a +* b").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) => {
                // Make sure the entire input was consumed
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExprError::Parse {
                        message: format!("Unexpected trailing characters: '{}'", remainder),
                    })
                }
            }
            Err(e) => Err(ExprError::Parse {
                message: format!("{:?}", e),
            }),
        }
    }
}

// Parser functions using nom

/// Parse an identifier (symbol, constant or function name)
fn identifier(input: &str) -> IResult<&str, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let (input, matched) = parser.parse(input)?;
    Ok((input, matched.to_string()))
}

/// Parse a numeric literal.
///
/// Hand-rolled rather than `nom`'s `double` so that identifiers such
/// as `inf` are left for the name parser instead of being read as
/// IEEE specials.
fn number(input: &str) -> IResult<&str, Expr> {
    let mut literal = recognize(pair(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(recognize(pair(
            one_of("eE"),
            pair(opt(one_of("+-")), digit1),
        ))),
    ));

    let (rest, text) = literal.parse(input)?;
    match text.parse::<f64>() {
        Ok(value) => Ok((rest, Expr::Constant(value))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

/// Parse a comma-separated list of expressions (for call arguments)
fn args_list(input: &str) -> IResult<&str, Vec<Expr>> {
    let (input, first) = expr_parser(input)?;
    let mut res = vec![first];

    let mut remainder = input;
    loop {
        let mut comma_parser = delimited(
            multispace0::<&str, nom::error::Error<&str>>,
            char::<&str, nom::error::Error<&str>>(','),
            multispace0::<&str, nom::error::Error<&str>>,
        );

        // Try to parse a comma
        match comma_parser.parse(remainder) {
            Ok((after_comma, _)) => {
                // Try to parse an expression after the comma
                match expr_parser(after_comma) {
                    Ok((after_expr, expr)) => {
                        res.push(expr);
                        remainder = after_expr;
                    }
                    Err(_) => break,
                }
            }
            Err(_) => break,
        }
    }

    Ok((remainder, res))
}

/// Parse a function call
fn function_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let mut space_parser = multispace0::<&str, nom::error::Error<&str>>;
    let (input, _) = space_parser.parse(input)?;
    let mut open_paren_parser = char::<&str, nom::error::Error<&str>>('(');
    let (input, _) = open_paren_parser.parse(input)?;
    let mut space_parser2 = multispace0::<&str, nom::error::Error<&str>>;
    let (input, _) = space_parser2.parse(input)?;

    // Handle empty arguments case
    let mut close_paren_parser = char::<&str, nom::error::Error<&str>>(')');
    if let Ok((input, _)) = close_paren_parser.parse(input) {
        return Ok((input, Expr::Call(name, vec![])));
    }

    // Handle non-empty arguments case
    let (input, args) = args_list(input)?;
    let (input, _) = multispace0.parse(input)?;

    let mut close_paren_parser = char::<&str, nom::error::Error<&str>>(')');
    let (input, _) = close_paren_parser.parse(input)?;

    Ok((input, Expr::Call(name, args)))
}

/// Parse a bare identifier as a named constant or a parameter symbol
fn name(input: &str) -> IResult<&str, Expr> {
    let (input, ident) = identifier(input)?;
    let expr = if named_constant(&ident).is_some() {
        Expr::NamedConstant(ident)
    } else {
        Expr::Variable(ident)
    };
    Ok((input, expr))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('(').parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char::<_, nom::error::Error<_>>(')').parse(input)?;
    Ok((input, expr))
}

/// Parse a primary expression (number, call, name, or parenthesized expression)
fn primary(input: &str) -> IResult<&str, Expr> {
    let number_result = number(input);
    if let Ok(result) = number_result {
        return Ok(result);
    }

    let call_result = function_call(input);
    if let Ok(result) = call_result {
        return Ok(result);
    }

    let name_result = name(input);
    if let Ok(result) = name_result {
        return Ok(result);
    }

    parens(input)
}

/// Parse a unary expression (-expr)
fn unary(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0.parse(input)?;

    let mut neg_parser = char::<_, nom::error::Error<_>>('-');
    if let Ok((after_neg, _)) = neg_parser.parse(input) {
        let (remaining, inner) = unary(after_neg)?;
        // Negative literals stay literals; everything else goes
        // through the built-in neg function.
        let expr = match inner {
            Expr::Constant(value) => Expr::Constant(-value),
            other => Expr::Call("neg".to_string(), vec![other]),
        };
        return Ok((remaining, expr));
    }

    power(input)
}

/// Parse a power expression (expr ^ expr), right-associative
fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = primary(input)?;
    let (input, _) = multispace0.parse(input)?;

    let mut op_parser = char::<_, nom::error::Error<_>>('^');
    match op_parser.parse(input) {
        Ok((after_op, _)) => {
            let (remaining, exponent) = unary(after_op)?;
            Ok((
                remaining,
                Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a multiplicative expression (expr * expr, expr / expr)
fn term(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = unary(input)?;

    loop {
        let (rest, _) = multispace0.parse(input)?;
        let mut op_parser = one_of::<_, _, nom::error::Error<&str>>("*/");
        match op_parser.parse(rest) {
            Ok((after_op, op)) => {
                let (after_rhs, rhs) = unary(after_op)?;
                let op = if op == '*' { BinOp::Mul } else { BinOp::Div };
                acc = Expr::Binary(op, Box::new(acc), Box::new(rhs));
                input = after_rhs;
            }
            Err(_) => return Ok((input, acc)),
        }
    }
}

/// Parse an additive expression (expr + expr, expr - expr)
fn expr_parser(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0.parse(input)?;
    let (mut input, mut acc) = term(input)?;

    loop {
        let (rest, _) = multispace0.parse(input)?;
        let mut op_parser = one_of::<_, _, nom::error::Error<&str>>("+-");
        match op_parser.parse(rest) {
            Ok((after_op, op)) => {
                let (after_rhs, rhs) = term(after_op)?;
                let op = if op == '+' { BinOp::Add } else { BinOp::Sub };
                acc = Expr::Binary(op, Box::new(acc), Box::new(rhs));
                input = after_rhs;
            }
            Err(_) => return Ok((input, acc)),
        }
    }
}
