use anyhow::{Context, Error};
use clap::Parser;
use logicblocks_subserver::{util::logging, web::uri_cursor::pattern::Pattern};
use serde_json::json;

#[derive(Debug, Parser)]
#[clap(about = "Compiles path patterns and matches them against paths")]
struct Arguments {
    #[arg(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: ArgumentsSubcommand,
}

#[derive(Debug, Parser)]
enum ArgumentsSubcommand {
    Check(ArgumentsSubcommandCheck),
    Match(ArgumentsSubcommandMatch),
}

#[derive(Debug, Parser)]
#[clap(name = "check")]
struct ArgumentsSubcommandCheck {
    #[arg(required = true)]
    patterns: Vec<String>,
}

#[derive(Debug, Parser)]
#[clap(name = "match")]
struct ArgumentsSubcommandMatch {
    pattern: String,

    /// Remaining path, without leading separator.
    path: String,
}

fn main() -> Result<(), Error> {
    let arguments = Arguments::parse();

    logging::configure(module_path!(), arguments.verbose);

    match arguments.subcommand {
        ArgumentsSubcommand::Check(subcommand_arguments) => {
            let mut valid = true;
            for source in &subcommand_arguments.patterns {
                match Pattern::new(source) {
                    Ok(pattern) => {
                        let capture_names = pattern.capture_names().collect::<Vec<_>>();
                        println!("{source}: ok {capture_names:?}");
                    }
                    Err(error) => {
                        println!("{source}: {}", error.kind);
                        valid = false;
                    }
                }
            }
            anyhow::ensure!(valid, "some patterns are invalid");
        }
        ArgumentsSubcommand::Match(subcommand_arguments) => {
            let pattern = Pattern::new(&subcommand_arguments.pattern).context("pattern")?;
            let path = subcommand_arguments.path.as_str();

            let output = match pattern.match_prefix(path) {
                Some(pattern_match) => {
                    let remaining = &path[pattern_match.prefix.len()..];
                    json!({
                        "prefix": pattern_match.prefix,
                        "remaining": remaining,
                        "parameters": pattern_match.parameters,
                    })
                }
                None => serde_json::Value::Null,
            };
            let output = serde_json::to_string_pretty(&output).context("to_string_pretty")?;
            println!("{output}");
        }
    }

    Ok(())
}
