// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fabrique::{Build, Engine, EvalErrors, Value, Visitor};

fn parse_argument(text: &str) -> Result<(String, Value)> {
    let (name, value) = match text.split_once('=') {
        Some(kv) => kv,
        None => bail!("argument `{text}` must be of the form name=value"),
    };
    let value = match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        v => match v.parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::from(v),
        },
    };
    Ok((name.to_string(), value))
}

fn make_engine(
    files: &[String],
    fail_fast: bool,
    srcroot: Option<String>,
    buildroot: Option<String>,
    no_mkdir: bool,
    args: &[String],
) -> Result<Engine> {
    let mut engine = Engine::new();
    for file in files {
        engine
            .add_program_from_file(file)
            .with_context(|| format!("Failed to load {file}"))?;
    }

    engine.set_fail_fast(fail_fast);
    engine.set_generate_directories(!no_mkdir);
    if let Some(srcroot) = srcroot {
        engine.set_srcroot(srcroot);
    }
    if let Some(buildroot) = buildroot {
        engine.set_buildroot(buildroot);
    }

    let mut arguments = BTreeMap::new();
    for a in args {
        let (name, value) = parse_argument(a)?;
        arguments.insert(name, value);
    }
    engine.set_arguments(arguments);
    Ok(engine)
}

// Attach the text of every description an error points at, when it can be
// read, so that the report shows the offending lines.
fn report(mut engine: Engine, error: anyhow::Error) -> Result<()> {
    let errors = match error.downcast_ref::<EvalErrors>() {
        Some(errors) => errors.clone(),
        None => return Err(error),
    };

    for e in &errors.errors {
        let file = e.span().file.to_string();
        if let Ok(contents) = std::fs::read_to_string(&file) {
            engine.add_source(file, contents)?;
        }
    }
    eprintln!("{}", engine.render_errors(&errors));
    bail!("{} errors", errors.errors.len())
}

struct OrderPrinter;

impl Visitor for OrderPrinter {
    fn visit_build(&mut self, build: &Build) -> Result<()> {
        println!("{}", build.description());
        Ok(())
    }
}

#[derive(Subcommand)]
enum FabriqueCommand {
    /// Evaluate build descriptions and print the dependency graph as JSON.
    Eval {
        /// AST files. json or yaml.
        #[arg(required(true))]
        files: Vec<String>,

        /// Stop at the first failing declaration.
        #[arg(long)]
        fail_fast: bool,

        #[arg(long)]
        srcroot: Option<String>,

        #[arg(long)]
        buildroot: Option<String>,

        /// Do not add mkdir builds for output directories.
        #[arg(long)]
        no_mkdir: bool,

        /// Value of the `args` record. name=value.
        #[arg(long = "arg", short = 'D', value_name = "name=value")]
        args: Vec<String>,
    },

    /// Print build descriptions in the order a backend would emit them.
    Order {
        /// AST files. json or yaml.
        #[arg(required(true))]
        files: Vec<String>,
    },

    /// Parse an AST file and print it.
    Ast {
        /// AST file. json or yaml.
        file: String,
    },
}

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: FabriqueCommand,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        FabriqueCommand::Eval {
            files,
            fail_fast,
            srcroot,
            buildroot,
            no_mkdir,
            args,
        } => {
            let engine = make_engine(&files, fail_fast, srcroot, buildroot, no_mkdir, &args)?;
            match engine.build_dag() {
                Ok(dag) => {
                    println!("{}", serde_json::to_string_pretty(&dag)?);
                    Ok(())
                }
                Err(e) => report(engine, e),
            }
        }
        FabriqueCommand::Order { files } => {
            let engine = make_engine(&files, false, None, None, false, &[])?;
            match engine.build_dag() {
                Ok(dag) => dag.accept(&mut OrderPrinter),
                Err(e) => report(engine, e),
            }
        }
        FabriqueCommand::Ast { file } => {
            let program = fabrique::unstable::Program::from_file(&file)?;
            println!("{program:#?}");
            Ok(())
        }
    }
}
