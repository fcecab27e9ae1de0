//! `repolens ask`: Single-question or interactive chat about one repository.

use repolens_agent::{LoopOutcome, RequestHandler};
use repolens_config::AppConfig;
use repolens_core::RepoLocator;
use repolens_core::message::ConversationTurn;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    repo: &str,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Err(e) = config.require_credentials() {
        eprintln!();
        eprintln!("  ERROR: {e}");
        eprintln!();
        eprintln!("  Set these environment variables:");
        eprintln!("    OPENAI_KEY      = 'sk-...'     (LLM API key)");
        eprintln!("    GITHUB_API_KEY  = 'ghp_...'    (GitHub access token)");
        eprintln!();
        eprintln!("  Or add them to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err(e.into());
    }

    let handler = RequestHandler::from_config(&config)?;

    if let Some(question) = message {
        eprint!("  Thinking...");
        let outcome = handler.ask_repo(repo, &question, &[]).await;
        eprint!("\r              \r");
        println!("{}", render(&outcome?));
        return Ok(());
    }

    let repo = RepoLocator::parse(repo)?;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        repolens — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Repository: {repo}");
    println!("  Model:      {}", config.llm.model);
    println!("  Tools:      {}", tool_names(&handler));
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    chat(&handler, &repo, stdin, &mut stdout).await?;

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

fn tool_names(handler: &RequestHandler) -> String {
    handler
        .catalog()
        .descriptors()
        .iter()
        .map(|d| d.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The REPL. Each question is a fresh request carrying the turns so far
/// as chat history. Returns the history on exit.
pub async fn chat<R, W>(
    handler: &RequestHandler,
    repo: &RepoLocator,
    input: R,
    out: &mut W,
) -> std::io::Result<Vec<ConversationTurn>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut lines = input.lines();

    loop {
        write!(out, "  You > ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let outcome = handler.ask(repo.clone(), question, &history).await;
        let answer = render(&outcome);

        writeln!(out)?;
        for line in answer.lines() {
            writeln!(out, "  Assistant > {line}")?;
        }
        writeln!(out)?;

        history.push(ConversationTurn::user(question));
        history.push(ConversationTurn::assistant(outcome.answer));
    }

    Ok(history)
}

fn render(outcome: &LoopOutcome) -> String {
    if outcome.incomplete {
        format!("{}\n\n(incomplete answer)", outcome.answer)
    } else {
        outcome.answer.clone()
    }
}
