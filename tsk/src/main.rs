use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::exit;
use tokscope::config::Config;
use tokscope::{tab, HostContext, TokenizeOutput, TokscopeError};
use tracing::*;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Globals {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// The model manifest describing the text encoders and their tokenizers.
    ///
    /// Overrides the `model` in the config file.
    #[arg(short, long, value_name = "MANIFEST", env = "TOKSCOPE_MODEL", global = true)]
    model: Option<PathBuf>,

    /// Number of undecodable pending tokens after which the oldest is shown as an error
    #[arg(long, value_name = "COUNT", global = true)]
    overflow_threshold: Option<NonZeroUsize>,

    /// How to print the rendered tokens
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Html, global = true)]
    format: OutputFormat,

    /// Turn debugging information on
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The span markup followed by the token summary
    Html,

    /// The full result as JSON, including each span
    Json,

    /// A standalone HTML page with both panes
    Page,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize prompt text with the model's tokenizer and render the tokens
    Text {
        /// The prompt.  Read from stdin if not given.
        text: Option<String>,
    },

    /// Render a comma-separated list of token ids, such as "9061, 631, 736"
    Ids { ids: String },

    /// Show which encoder and tokenizer shape would be used, or why none fits
    Inspect,
}

impl Commands {
    fn execute(self, globals: &Globals) -> anyhow::Result<()> {
        let config = match &globals.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        let model_path = globals
            .model
            .clone()
            .or_else(|| config.model.clone())
            .context("No model manifest given; use --model or set TOKSCOPE_MODEL")?;
        let ctx = HostContext::load(&model_path)?;

        let mut options = config.render_options();
        if let Some(threshold) = globals.overflow_threshold {
            options.overflow_threshold = threshold;
        }

        use Commands::*;
        match self {
            Text { text } => {
                let text = match text {
                    Some(text) => text,
                    None => {
                        debug!("No prompt given, reading stdin");
                        let mut text = String::new();
                        std::io::stdin().read_to_string(&mut text)?;
                        text
                    }
                };

                print_output(globals.format, tokscope::tokenize_text(&ctx, text, &options))?;
            }
            Ids { ids } => {
                print_output(globals.format, tokscope::tokenize_ids(&ctx, ids, &options))?;
            }
            Inspect => match tokscope::adapter::resolve_tokenizer(ctx.model()) {
                Ok(resolved) => {
                    println!(
                        "{} ({}): {} vocabulary entries",
                        resolved.candidate,
                        resolved.adapter.shape(),
                        resolved.adapter.vocabulary().len()
                    );
                }
                Err(e) => {
                    if let TokscopeError::NoCompatibleTokenizer { rejected } = &e {
                        for rejection in rejected {
                            println!("{rejection}");
                        }
                    }
                    return Err(e.into());
                }
            },
        }

        Ok(())
    }
}

fn print_output(
    format: OutputFormat,
    output: tokscope::Result<TokenizeOutput>,
) -> anyhow::Result<()> {
    let output = match output {
        Ok(output) => output,
        Err(e) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": e }));
            }
            return Err(e.into());
        }
    };

    match format {
        OutputFormat::Html => {
            println!("{}", output.markup);
            print!("{}", output.summary);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Page => print!("{}", tab::render_page(&output)),
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let default_log_directive = match cli.globals.debug {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // Log events go to stderr as JSON, so stdout carries only the rendered tokens
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_directive.into())
                .from_env_lossy(),
        )
        .json()
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    if let Some(config_path) = cli.globals.config.as_deref() {
        debug!("Value for config: {}", config_path.display());
    }

    if let Err(e) = cli.command.execute(&cli.globals) {
        error!("{:#}", e);
        exit(1);
    } else {
        debug!("command executed successfully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MODEL: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../tokscope/test_data/tiny/model.json"
    );

    /// Verify that there aren't any invalid attributes in the CLI specification that can only be
    /// detected at runtime
    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn parse_ids_command() {
        let cli = Cli::try_parse_from([
            "tsk",
            "ids",
            "9061, 631, 736",
            "--format",
            "json",
            "--overflow-threshold",
            "3",
            "-dd",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Ids { ref ids } if ids == "9061, 631, 736"));
        assert!(cli.globals.format == OutputFormat::Json);
        assert_eq!(Some(3), cli.globals.overflow_threshold.map(NonZeroUsize::get));
        assert_eq!(2, cli.globals.debug);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(Cli::try_parse_from(["tsk", "inspect", "--overflow-threshold", "0"]).is_err());
    }

    #[test]
    fn execute_against_test_model() {
        let cli = Cli::try_parse_from(["tsk", "--model", TEST_MODEL, "ids", "513, 127"]).unwrap();
        cli.command.execute(&cli.globals).unwrap();

        let cli = Cli::try_parse_from(["tsk", "--model", TEST_MODEL, "ids", "513, x"]).unwrap();
        let e = cli.command.execute(&cli.globals).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<TokscopeError>(),
            Some(TokscopeError::InputFormat { .. })
        ));
    }
}
