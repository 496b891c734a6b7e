use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use chumsky::prelude::*;

#[derive(Debug, Clone)]
pub(crate) enum Statement {
    Invalid,
    Empty,
    VarDecl {
        name: String,
        range: Vec<String>,
        evidence: Option<String>,
    },
    FactorDecl {
        name: String,
        scope: Vec<String>,
        values: Option<Vec<f64>>,
    },
    QueryDecl {
        target: String,
        evidence: Vec<(String, String)>,
    },
}

fn parser() -> impl Parser<char, Vec<Statement>, Error = Simple<char>> {
    let pad = just(' ').or(just('\t')).repeated();
    let op = |c| just(c).delimited_by(pad, pad);
    let ident = pad.ignore_then(text::ident()).then_ignore(pad);
    let kw = |s| text::keyword::<_, _, Simple<char>>(s).delimited_by(pad, pad);
    let number = pad
        .ignore_then(
            filter(|c: &char| c.is_ascii_digit() || ".+-eE".contains(*c))
                .repeated()
                .at_least(1)
                .collect::<String>()
                .try_map(|s: String, span| {
                    s.parse::<f64>()
                        .map_err(|_| Simple::custom(span, format!("invalid number {s}")))
                }),
        )
        .then_ignore(pad);
    let range = ident
        .separated_by(op(','))
        .at_least(1)
        .delimited_by(op('['), op(']'));
    let var_decl = kw("VAR")
        .ignore_then(ident)
        .then(range)
        .then(op('=').ignore_then(ident).or_not())
        .map(|((name, range), evidence)| Statement::VarDecl {
            name,
            range,
            evidence,
        });
    let scope = ident
        .separated_by(op(','))
        .at_least(1)
        .delimited_by(op('('), op(')'));
    let values = number
        .separated_by(op(','))
        .allow_trailing()
        .delimited_by(op('['), op(']'));
    let factor_decl = kw("FACTOR")
        .ignore_then(ident)
        .then(scope)
        .then(values.or_not())
        .map(|((name, scope), values)| Statement::FactorDecl {
            name,
            scope,
            values,
        });
    let binding = ident.then_ignore(op('=')).then(ident);
    let query_decl = kw("QUERY")
        .ignore_then(ident)
        .then(
            op('|')
                .ignore_then(binding.separated_by(op(',')).at_least(1))
                .or_not(),
        )
        .map(|(target, evidence)| Statement::QueryDecl {
            target,
            evidence: evidence.unwrap_or_default(),
        });
    let comment = op('#').then_ignore(filter(|c| *c != '\n' && *c != '\r').repeated());
    var_decl
        .or(factor_decl)
        .or(query_decl)
        .or(pad.at_least(0).to(Statement::Empty))
        .then_ignore(comment.or_not())
        .recover_with(skip_until(['\n', '\r'], |_| Statement::Invalid))
        .separated_by(text::newline())
        .allow_leading()
        .allow_trailing()
        .then_ignore(end())
}

/// Parse the factor graph description in src, and return the statements if no
/// error, otherwise the error is a rendered report.
pub(crate) fn parse(src: &str) -> Result<Vec<Statement>, String> {
    let (stmts, errs) = parser().parse_recovery_verbose(src);
    if errs.is_empty() {
        return Ok(stmts.unwrap());
    }
    let mut err_str = Vec::new();
    for e in errs {
        let msg = if let chumsky::error::SimpleReason::Custom(msg) = e.reason() {
            msg.clone()
        } else {
            format!(
                "Unexpected token, expected {}",
                if e.expected().len() == 0 {
                    "something else".to_string()
                } else {
                    e.expected()
                        .map(|expected| match expected {
                            Some(expected) => expected.to_string(),
                            None => "end of input".to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                },
            )
        };
        let report = Report::build(ReportKind::Error, (), e.span().start)
            .with_message(msg)
            .with_label(
                Label::new(e.span())
                    .with_message(match e.reason() {
                        chumsky::error::SimpleReason::Custom(msg) => msg.clone(),
                        _ => format!(
                            "Unexpected {}",
                            e.found()
                                .map(|c| format!("token {}", c.fg(Color::Red)))
                                .unwrap_or_else(|| "end of input".to_string())
                        ),
                    })
                    .with_color(Color::Red),
            );
        report
            .finish()
            .write(Source::from(&src), &mut err_str)
            .unwrap();
    }
    Err(String::from_utf8_lossy(&err_str).into_owned())
}
