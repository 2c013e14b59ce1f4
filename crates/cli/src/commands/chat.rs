//! `colloquy chat`. Interactive or single-message chat mode.

use colloquy_agent::{ChatContext, LengthLimiter, ReplyOptions};
use colloquy_config::{AppConfig, LimiterConfig};
use colloquy_core::provider::ChatReply;
use colloquy_providers::CohereClient;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Flags of the `chat` command.
pub struct ChatArgs {
    pub message: Option<String>,
    pub preamble: Option<String>,
    pub max_chars: Option<usize>,
    pub max_words: Option<usize>,
    pub model: Option<String>,
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early, with a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    COLLOQUY_API_KEY=...   (recommended)");
        eprintln!("    CohereKey=...");
        eprintln!("    COHERE_API_KEY=...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let client = CohereClient::from_config(&config).await?;
    let chat_model = client
        .registry()
        .default_model(colloquy_providers::Endpoint::Chat)
        .unwrap_or("(unresolved)")
        .to_string();

    let limiter = limiter_for(&config.limiter, args.max_chars, args.max_words);
    let budget = describe_budget(&limiter);
    let context = ChatContext::new(Arc::new(client)).with_limiter(limiter);

    let preamble = args.preamble.or(config.default_preamble.clone());
    let id = context.create_conversation(preamble).await;
    tracing::debug!(conversation = %id, "Conversation started");
    let options = ReplyOptions {
        model: args.model.clone(),
        ..ReplyOptions::default()
    };

    if let Some(msg) = args.message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = context.reply(&id, &msg, options).await;
        eprint!("\r              \r");
        print_reply(&reply?, "");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Colloquy: Interactive Chat");
    println!();
    println!("  Model:     {}", args.model.as_deref().unwrap_or(&chat_model));
    println!("  Budget:    {budget}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if matches!(line, "exit" | "quit") {
            break;
        }
        if !line.is_empty() {
            eprint!("  ...");
            let reply = context.reply(&id, line, options.clone()).await;
            eprint!("\r     \r");
            match reply {
                Ok(reply) => {
                    println!();
                    print_reply(&reply, "  Assistant > ");
                    println!();
                }
                Err(e) => {
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// The configured budgets, overridden by any flags given.
fn limiter_for(
    config: &LimiterConfig,
    max_chars: Option<usize>,
    max_words: Option<usize>,
) -> LengthLimiter {
    let mut limiter = LengthLimiter::from_config(config);
    if let Some(chars) = max_chars {
        limiter.max_chars = chars;
    }
    if let Some(words) = max_words {
        limiter.max_words = words;
    }
    limiter
}

fn describe_budget(limiter: &LengthLimiter) -> String {
    match (limiter.max_chars, limiter.max_words) {
        (0, 0) => "unbounded".into(),
        (chars, 0) => format!("{chars} characters"),
        (0, words) => format!("{words} words"),
        (chars, words) => format!("{chars} characters, {words} words"),
    }
}

fn print_reply(reply: &ChatReply, prefix: &str) {
    if let Some(text) = &reply.text {
        for line in text.lines() {
            println!("{prefix}{line}");
        }
    } else if let Some(queries) = &reply.search_queries {
        for query in queries {
            println!("{prefix}search: {}", query.text);
        }
    }
}
