//! Library sources populate a kernel while it is being built.
//!
//! A [`DeclarationSource`] reads a small declaration file, one entry per
//! line, and declares types and function signatures. Behaviors are attached
//! afterwards with `install_func`.
//!
//! ```text
//! -- comment
//! type Point
//! fn add(int, int) -> int
//! fn print(any)
//! fn list(any...) -> List
//! stateful fn variable(any) -> any
//! ```

use anyhow::{Context, anyhow, bail};
use chumsky::prelude::*;
use std::path::Path;

use crate::function::Signature;
use crate::ids::TermId;
use crate::kernel::KernelBuilder;
use crate::value::Value;

pub trait LibrarySource {
    fn name(&self) -> &str;

    fn populate(&self, builder: &mut KernelBuilder) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration<'src> {
    Type(&'src str),
    Function {
        name: &'src str,
        inputs: Vec<&'src str>,
        variadic: bool,
        output: Option<&'src str>,
        stateful: bool,
    },
}

fn declaration<'src>()
-> impl Parser<'src, &'src str, Declaration<'src>, extra::Err<Rich<'src, char>>> {
    let space = text::inline_whitespace();
    let gap = text::inline_whitespace().at_least(1);
    let name = text::ascii::ident().padded_by(space.clone());

    let inputs = name
        .clone()
        .separated_by(just(','))
        .collect::<Vec<_>>()
        .then(just("...").padded_by(space.clone()).or_not())
        .delimited_by(just('('), just(')'));

    let function = just("stateful")
        .then_ignore(gap.clone())
        .or_not()
        .then_ignore(just("fn").then_ignore(gap.clone()))
        .then(name.clone())
        .then(inputs)
        .then(
            just("->")
                .padded_by(space.clone())
                .ignore_then(name.clone())
                .or_not(),
        )
        .map(
            |(((stateful, name), (inputs, ellipsis)), output)| Declaration::Function {
                name,
                inputs,
                variadic: ellipsis.is_some(),
                output,
                stateful: stateful.is_some(),
            },
        );

    let ty = just("type")
        .then_ignore(gap)
        .ignore_then(name)
        .map(Declaration::Type);

    choice((ty, function)).padded_by(space).then_ignore(end())
}

/// Parses one declaration line.
pub fn parse_declaration(line: &str) -> anyhow::Result<Declaration<'_>> {
    declaration().parse(line).into_result().map_err(|errors| {
        anyhow!(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        )
    })
}

/// Declarations read from text
#[derive(Debug, Clone)]
pub struct DeclarationSource {
    name: String,
    text: String,
}

impl DeclarationSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, text))
    }

    /// Declarations in file order, skipping blanks and `--` comments.
    pub fn declarations(&self) -> anyhow::Result<Vec<Declaration<'_>>> {
        let mut declarations = Vec::new();
        for (index, line) in self.text.lines().enumerate() {
            let line = match line.find("--") {
                Some(comment) => &line[..comment],
                None => line,
            };
            if line.trim().is_empty() {
                continue;
            }
            let declaration = parse_declaration(line)
                .with_context(|| format!("{}:{}: `{}`", self.name, index + 1, line.trim()))?;
            declarations.push(declaration);
        }
        Ok(declarations)
    }
}

impl LibrarySource for DeclarationSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn populate(&self, builder: &mut KernelBuilder) -> anyhow::Result<()> {
        for declaration in self.declarations()? {
            match declaration {
                Declaration::Type(name) => {
                    builder
                        .create_type(name)
                        .with_context(|| format!("type `{name}`"))?;
                }
                Declaration::Function {
                    name,
                    inputs,
                    variadic,
                    output,
                    stateful,
                } => {
                    let types: &KernelBuilder = builder;
                    let inputs = inputs
                        .iter()
                        .map(|ty| resolve_type(types, ty))
                        .collect::<anyhow::Result<Vec<_>>>()
                        .with_context(|| format!("function `{name}`"))?;
                    let output = output
                        .map(|ty| resolve_type(types, ty))
                        .transpose()
                        .with_context(|| format!("function `{name}`"))?;

                    let mut signature = Signature::new(inputs, output);
                    signature.stateful = stateful;
                    signature.variadic = variadic;
                    builder
                        .declare_function(name, signature)
                        .with_context(|| format!("function `{name}`"))?;
                }
            }
        }
        Ok(())
    }
}

fn resolve_type(builder: &KernelBuilder, name: &str) -> anyhow::Result<TermId> {
    let id = builder.get_named_term(name)?;
    let is_type = builder
        .unit()
        .term(id)?
        .value
        .as_ref()
        .and_then(Value::as_type)
        .is_some();
    if !is_type {
        bail!("`{name}` is not a type");
    }
    Ok(id)
}
