//! AgentForge entry point
//!
//! ```bash
//! # Serve the HTTP API
//! agentforge serve --port 8080
//!
//! # Forge an agent from local files and chat with it
//! agentforge forge --name Helper --intro "Hi there, I can help!" \
//!     --tone friendly --length short --expertise "tech support" \
//!     --boundaries "no legal advice" --training-file faq.txt --chat
//!
//! # Judge a response against a parameters summary
//! agentforge scope --parameters "Tone: friendly" --prompt "Refunds?" --response "..."
//!
//! # Answer a question from a context file
//! agentforge ask --context-file faq.txt --question "When do you open?"
//! ```
//!
//! Action results are printed as JSON. The exit code is 1 when the action
//! failed. Ctrl-C cancels the call in flight.

use agentforge_api::handler::{create_router, AppState};
use agentforge_core::actions::{AVATAR_UNREADABLE, TRAINING_FILE_UNREADABLE};
use agentforge_core::contracts::{ActionResult, AnswerQuestionInput, EvaluateScopeInput};
use agentforge_core::{
    init_tracing, AgentForm, AgentSession, ForgeActions, ForgeConfig, LogFormat,
    MetricsRegistry, TrainingSource, UploadedFile,
};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "agentforge")]
#[command(about = "AgentForge - forge, test and chat with LLM agent personas")]
#[command(version)]
struct Cli {
    /// Path to a TOML or YAML config file
    #[arg(short, long, global = true, env = "AGENTFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log format (pretty or json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Base URL of the OpenAI-compatible backend
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Model name sent to the backend
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Forge an agent and print its description
    Forge(ForgeArgs),

    /// Judge whether a response stays within an agent's parameters
    Scope {
        /// Parameters summary, e.g. "Tone: friendly, Expertise: billing"
        #[arg(long)]
        parameters: String,

        /// The user prompt
        #[arg(long)]
        prompt: String,

        /// The agent response to judge
        #[arg(long)]
        response: String,
    },

    /// Answer a question from context data
    Ask {
        /// Plain-text file holding the context data
        #[arg(long, conflicts_with = "context")]
        context_file: Option<PathBuf>,

        /// Context data given inline
        #[arg(long)]
        context: Option<String>,

        /// The question to answer
        #[arg(short, long)]
        question: String,
    },
}

#[derive(Args)]
struct ForgeArgs {
    /// Agent name
    #[arg(long)]
    name: String,

    /// Introductory message, 10 to 500 characters
    #[arg(long)]
    intro: String,

    /// Tone of the agent
    #[arg(long)]
    tone: String,

    /// Response length (short, medium or long)
    #[arg(long, default_value = "medium")]
    length: String,

    /// Areas of expertise
    #[arg(long)]
    expertise: String,

    /// Knowledge boundaries
    #[arg(long)]
    boundaries: String,

    /// Avatar image (png, jpeg or webp)
    #[arg(long)]
    avatar: Option<PathBuf>,

    /// Plain-text training data file
    #[arg(long, conflicts_with = "training_text")]
    training_file: Option<PathBuf>,

    /// Training data given inline
    #[arg(long)]
    training_text: Option<String>,

    /// Chat with the agent after forging it
    #[arg(long)]
    chat: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(&config.logging)?;
    config.validate()?;

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());

    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            serve(&config, shutdown).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Forge(args) => {
            let actions = actions(&config)?;
            forge(&actions, args, &shutdown).await
        }

        Commands::Scope {
            parameters,
            prompt,
            response,
        } => {
            let input = EvaluateScopeInput {
                parameters,
                prompt,
                agent_response: response,
            };
            let result = actions(&config)?.evaluate_scope(&input, &shutdown).await;
            print_result(&result)
        }

        Commands::Ask {
            context_file,
            context,
            question,
        } => {
            let context_data = match context_file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => context.unwrap_or_default(),
            };
            let input = AnswerQuestionInput {
                context_data,
                question,
            };
            let result = actions(&config)?
                .answer_from_context(&input, &shutdown)
                .await;
            print_result(&result)
        }
    }
}

/// File or defaults, then environment, then command-line flags
fn load_config(cli: &Cli) -> anyhow::Result<ForgeConfig> {
    let mut config = match &cli.config {
        Some(path) => ForgeConfig::from_file(path)?,
        None => ForgeConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(url) = &cli.backend_url {
        config.backend.base_url = url.clone();
    }
    if let Some(model) = &cli.model {
        config.backend.model = model.clone();
    }
    Ok(config)
}

fn actions(config: &ForgeConfig) -> anyhow::Result<ForgeActions> {
    let metrics = MetricsRegistry::new()?;
    Ok(agentforge_core::build_actions(config, metrics.actions())?)
}

fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            shutdown.cancel();
        }
    });
}

async fn serve(config: &ForgeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let router = create_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        address = %addr,
        version = agentforge_core::VERSION,
        model = %config.backend.model,
        "Starting AgentForge API"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("AgentForge API stopped");
    Ok(())
}

async fn forge(
    actions: &ForgeActions,
    args: ForgeArgs,
    shutdown: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let avatar = match args.avatar.as_deref() {
        Some(path) => match read_upload(path) {
            Some(file) => Some(file),
            None => return print_result(&ActionResult::<()>::failure(AVATAR_UNREADABLE)),
        },
        None => None,
    };

    let training = match (args.training_file.as_deref(), args.training_text) {
        (Some(path), _) => match read_upload(path) {
            Some(file) => TrainingSource::Uploaded(file),
            None => return print_result(&ActionResult::<()>::failure(TRAINING_FILE_UNREADABLE)),
        },
        (None, text) => TrainingSource::Pasted(text.unwrap_or_default()),
    };

    let form = AgentForm {
        agent_name: args.name,
        avatar,
        introductory_message: args.intro,
        tone: args.tone,
        response_length: args.length,
        areas_of_expertise: args.expertise,
        knowledge_boundaries: args.boundaries,
        training,
    };

    // The session is local, so Ctrl-C is the only cancellation source
    let mut session = AgentSession::new();
    session.begin_forge();
    let result = actions.forge_agent_from_form(&form, shutdown).await;
    session.finish_forge(&result);

    let code = print_result(&result)?;
    if args.chat && result.is_success() {
        chat_loop(actions, &mut session, shutdown).await?;
    }
    Ok(code)
}

fn read_upload(path: &Path) -> Option<UploadedFile> {
    UploadedFile::from_path(path)
        .map_err(|e| tracing::warn!(error = %e, path = %path.display(), "Failed to read upload"))
        .ok()
}

/// Read questions from stdin until EOF, `/quit` or Ctrl-C
async fn chat_loop(
    actions: &ForgeActions,
    session: &mut AgentSession,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    if let Some(intro) = session.transcript().messages().first() {
        println!("\n{}", intro.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !shutdown.is_cancelled() {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.cancelled() => None,
        };
        let Some(line) = line else { break };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/quit" {
            break;
        }

        let turn = session.begin_chat_turn(question)?;
        let result = actions.chat_turn(&turn.input, shutdown).await;
        session.finish_turn(turn.handle, &result);

        match &result {
            ActionResult::Success(answer) => println!("{}", answer.answer),
            ActionResult::Failure(error) => eprintln!("{}", error),
        }
    }

    session.close();
    Ok(())
}

fn print_result<T: Serialize>(result: &ActionResult<T>) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
