use clap::Parser;
use flowchat::{config::RuntimeConfig, FlowError, FlowRuntime, FlowSource, Message, SessionStatus, StartRequest};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the flow script
    #[arg(short, long, default_value = "data/carrier.flow")]
    flow: PathBuf,

    /// Path to config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Consult the language model when a state falls through
    #[arg(long)]
    use_llm: bool,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        println!("bot> {}", message.text);
    }
}

async fn run(cli: &Cli) -> Result<(), FlowError> {
    let config = if cli.config.exists() {
        RuntimeConfig::from_file(&cli.config)?
    } else {
        RuntimeConfig::default()
    };
    info!("config loaded.");
    debug!("config: {:?}", config);

    let runtime = FlowRuntime::from_config(config);
    let started = runtime
        .start(StartRequest {
            flow: FlowSource::Path(cli.flow.to_string_lossy().into_owned()),
            use_llm: cli.use_llm,
        })
        .await?;
    print_messages(&started.messages);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let snapshot = runtime.inspect(&started.session_id).await?;
        if snapshot.status != SessionStatus::AwaitingInput {
            println!("(session {})", snapshot.status.to_string().to_lowercase());
            break;
        }

        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let response = runtime.send(&started.session_id, line.trim()).await?;
        print_messages(&response.messages);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
