use std::error::Error;

use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

mod banner;
mod cli;
mod config;
mod handlers;
mod llm;
mod state;
mod utils;

use cli::{parse_cli_args, run_cli};
use config::CONFIG;
use handlers::media::message_has_image;
use handlers::{access, commands};
use state::AppState;
use utils::logging::{init_logging, ConsoleMode};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
    Login(String),
    Logout,
    Apikey(String),
    Fields,
    Set(String),
    Prompt,
    Reset,
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let cli_command = parse_cli_args(&args)?;
    let console_mode = if cli_command.is_some() {
        ConsoleMode::Cli
    } else {
        ConsoleMode::Bot
    };
    let _guards = init_logging(console_mode);

    if let Some(command) = cli_command {
        run_cli(command).await?;
        return Ok(());
    }

    if CONFIG.bot_token.trim().is_empty() {
        return Err("BOT_TOKEN is required unless running a CLI subcommand".into());
    }
    if CONFIG.gemini_api_key.trim().is_empty() {
        warn!("GEMINI_API_KEY is not set; each chat must provide /apikey before analyzing");
    }
    warn!("Access is guarded by a shared demo password only; do not expose sensitive data");

    let bot = Bot::new(CONFIG.bot_token.clone());
    info!("Starting banner prompt bot with model {}", CONFIG.gemini_model);

    let state = AppState::new();

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter(|msg: Message| message_has_image(&msg)).endpoint(handle_upload))
        .endpoint(ignore_message);

    Dispatcher::builder(bot, message_handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    state: AppState,
    message: Message,
    command: Command,
) -> HandlerResult {
    match command {
        Command::Start => commands::start_handler(bot, message).await?,
        Command::Help => commands::help_handler(bot, message).await?,
        Command::Login(password) => access::login_handler(bot, state, message, password).await?,
        Command::Logout => access::logout_handler(bot, state, message).await?,
        Command::Apikey(key) => commands::apikey_handler(bot, state, message, key).await?,
        Command::Fields => commands::fields_handler(bot, state, message).await?,
        Command::Set(args) => commands::set_handler(bot, state, message, args).await?,
        Command::Prompt => commands::prompt_handler(bot, state, message).await?,
        Command::Reset => commands::reset_handler(bot, state, message).await?,
    }
    Ok(())
}

// The dispatcher runs one chat's updates in order.
async fn handle_upload(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    if let Err(err) = commands::upload_handler(bot, state, message).await {
        error!("upload handler failed: {err}");
    }
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
