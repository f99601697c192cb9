use clap::{Parser as ClapParser, Subcommand};
use std::io::{self, Read};
use tarragon::{
    LexerOptions, Registry,
    cli::{self, CheckOptions, CheckResult, CliError},
};

#[derive(ClapParser)]
#[command(name = "tarragon")]
#[command(about = "Tarragon - tokenize, parse and evaluate template expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and evaluate an expression
    Check {
        /// The expression to evaluate
        expression: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't evaluate
        #[arg(long)]
        syntax_only: bool,

        /// Drop malformed fragments instead of failing
        #[arg(long)]
        lenient: bool,

        /// Print the functions and keys the evaluation touched
        #[arg(long)]
        hints: bool,
    },

    /// Print the token stream of an expression
    Tokens {
        expression: String,

        #[arg(long)]
        lenient: bool,

        /// Keep quotes in the content of string tokens
        #[arg(long)]
        keep_quotes: bool,
    },

    /// Print the expression tree
    Tree {
        expression: String,

        #[arg(long)]
        lenient: bool,
    },

    /// List registered functions
    Functions,

    /// Show usage of a single function
    Doc {
        /// Function name or alias (use 'tarragon functions' to list them)
        name: String,
    },
}

/// Enable with `RUST_LOG=tarragon=debug` or `RUST_LOG=tarragon=trace`
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let registry = Registry::with_builtins();

    let result = match cli.command {
        Commands::Check {
            expression,
            input,
            pretty,
            syntax_only,
            lenient,
            hints,
        } => run_check(
            &registry,
            CheckOptions {
                expression,
                input,
                syntax_only,
                lenient,
            },
            pretty,
            hints,
        ),
        Commands::Tokens {
            expression,
            lenient,
            keep_quotes,
        } => cli::render_tokens(
            &expression,
            LexerOptions {
                lenient,
                include_quotes: keep_quotes,
            },
        )
        .map(|text| print!("{text}")),
        Commands::Tree {
            expression,
            lenient,
        } => cli::render_tree(&registry, &expression, lenient).map(|text| print!("{text}")),
        Commands::Functions => {
            print!("{}", cli::function_list(&registry));
            Ok(())
        }
        Commands::Doc { name } => cli::function_doc(&registry, &name).map(|text| print!("{text}")),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run_check(
    registry: &Registry,
    mut options: CheckOptions,
    pretty: bool,
    show_hints: bool,
) -> Result<(), CliError> {
    if options.input.is_none() && !options.syntax_only && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.input = (!buffer.trim().is_empty()).then_some(buffer);
    }

    match cli::execute_check(registry, &options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Success { output, hints } => {
            let json = if pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{json}");
            if show_hints {
                eprintln!("functions: {:?}", hints.used_functions);
                eprintln!("resolved:  {:?}", hints.resolved_keys);
                eprintln!("missing:   {:?}", hints.missing_keys);
            }
        }
    }
    Ok(())
}
