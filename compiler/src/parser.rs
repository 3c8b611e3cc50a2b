// Parser for .stencil source files.
//
// Parses a token stream (from the lexer) into an AST using chumsky
// combinators. Binary operators are left-associative with `* /` binding
// tighter than `+ -`, so the AST nesting follows source order exactly and
// downstream phases never need to reassociate.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::expr::BinOp;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a stencil source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

fn binary(lhs: Expr, (op, rhs): (BinOp, Expr)) -> Expr {
    let span: SimpleSpan = (lhs.span.start()..rhs.span.end()).into();
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    }
}

// ── Main parser builder ──

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    let number = select! {
        Token::Number(n) = e => (n, e.span()),
    };

    // ── Point reference: grid(dim, dim+1, dim-2) ──

    let sign = choice((just(Token::Plus).to(1.0), just(Token::Minus).to(-1.0)));

    let index = ident
        .clone()
        .then(sign.then(number.clone()).or_not())
        .map_with(|(dim, offset), e| IndexExpr {
            dim,
            offset: offset.map_or(0.0, |(s, (n, _))| s * n),
            span: e.span(),
        });

    let point = ident
        .clone()
        .then(
            index
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map_with(|(grid, indices), e| PointExpr {
            grid,
            indices,
            span: e.span(),
        });

    // ── Expression ──

    let expr = {
        let point = point.clone();
        let number = number.clone();
        recursive(move |expr| {
            let atom = choice((
                number.map(|(n, span)| Expr {
                    kind: ExprKind::Number(n),
                    span,
                }),
                point.map(|p| {
                    let span = p.span;
                    Expr {
                        kind: ExprKind::Point(p),
                        span,
                    }
                }),
                expr.delimited_by(just(Token::LParen), just(Token::RParen)),
            ));

            let unary = just(Token::Minus)
                .map_with(|_, e| -> SimpleSpan { e.span() })
                .repeated()
                .foldr(atom, |minus, operand: Expr| {
                    let span: SimpleSpan = (minus.start()..operand.span.end()).into();
                    Expr {
                        kind: ExprKind::Neg(Box::new(operand)),
                        span,
                    }
                });

            let product_op = choice((
                just(Token::Star).to(BinOp::Mul),
                just(Token::Slash).to(BinOp::Div),
            ));
            let sum_op = choice((
                just(Token::Plus).to(BinOp::Add),
                just(Token::Minus).to(BinOp::Sub),
            ));

            let product = unary
                .clone()
                .foldl(product_op.then(unary).repeated(), binary);
            product
                .clone()
                .foldl(sum_op.then(product).repeated(), binary)
        })
    };

    // ── Statements ──

    let solution_stmt = just(Token::Solution)
        .ignore_then(ident.clone())
        .map(StatementKind::Solution);

    let set_stmt = just(Token::Set)
        .ignore_then(ident.clone())
        .then_ignore(just(Token::Equals))
        .then(number)
        .map(|(name, (value, value_span))| {
            StatementKind::Set(SetStmt {
                name,
                value,
                value_span,
            })
        });

    let step_stmt = just(Token::Step)
        .ignore_then(ident.clone())
        .map(StatementKind::Step);

    let domain_stmt = just(Token::Domain)
        .ignore_then(
            ident
                .clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(StatementKind::Domain);

    let grid_stmt = just(Token::Grid)
        .ignore_then(ident.clone())
        .then(
            ident
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|(name, dims)| StatementKind::Grid(GridDecl { name, dims }));

    let equation_stmt = point
        .then_ignore(just(Token::Equals))
        .then(expr)
        .map(|(lhs, rhs)| StatementKind::Equation(EquationStmt { lhs, rhs }));

    // ── Statement dispatch ──

    let statement = choice((
        solution_stmt,
        set_stmt,
        step_stmt,
        domain_stmt,
        grid_stmt,
        equation_stmt,
    ))
    .then_ignore(just(Token::Semi))
    .map_with(|kind, e| Statement {
        kind,
        span: e.span(),
    });

    // ── Program ──

    statement
        .repeated()
        .collect::<Vec<_>>()
        .map_with(|statements, e| Program {
            statements,
            span: e.span(),
        })
}

// ── Tests ──
