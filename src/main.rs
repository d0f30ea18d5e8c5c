mod book;
mod compose;
mod config;
mod imagen;
mod llm;
mod manuscript;
mod prompts;
mod repair;
mod revalidate;
mod session;
mod theme;
mod workflow;

use anyhow::{Context, Result};
use config::Config;
use llm::ChatErrorKind;
use session::StorySession;
use workflow::BookBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM and image settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let llm = llm::create_llm(&config)?;
    let mut session = StorySession::new(llm);

    println!("Welcome to the Storyteller Lab!");
    println!("Chat with the storyteller to shape your picture book.\n");

    let greeting = session
        .start()
        .await
        .context("Failed to reach the chat model")?;
    println!("Storyteller: {}\n", greeting);

    while !session.is_complete() {
        let input = inquire::Text::new("You:").prompt()?;
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if session.awaiting_start_command() && !input.eq_ignore_ascii_case("START STORY") {
            println!("The storyteller is waiting for you to type 'START STORY'.\n");
            continue;
        }

        match session.send(input).await {
            Ok(reply) => println!("Storyteller: {}\n", reply),
            Err(e) => match llm::classify_chat_error(&e) {
                ChatErrorKind::Overloaded => {
                    println!("The model is experiencing high traffic right now. Please wait a moment and try again.\n");
                }
                ChatErrorKind::RateLimited => {
                    println!("Rate limit reached. Please wait a minute and try again.\n");
                }
                ChatErrorKind::Other => {
                    println!("The storyteller ran into a problem: {:#}. Please try again.\n", e);
                }
            },
        }
    }

    println!("The manuscript is finished!");
    println!("  Title:     {}", session.title_or_default());
    println!("  Character: {}\n", session.profile_or_default());

    let build = inquire::Confirm::new("Build the picture book now?")
        .with_default(true)
        .prompt()?;
    if !build {
        println!("Skipping the build. Goodbye!");
        return Ok(());
    }

    let manuscript = session
        .manuscript()
        .map(str::to_string)
        .context("Session completed without a manuscript")?;
    let profile = session.profile_or_default().to_string();
    let title = session.title_or_default().to_string();

    let builder_llm = llm::create_llm(&config)?;
    let images = imagen::create_image_client(&config)?;
    let builder = BookBuilder::new(config, builder_llm, images);
    let output = builder.run(&manuscript, &profile, &title).await?;

    println!("Your book is ready: {:?}", output);
    Ok(())
}
