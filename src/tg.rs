use crate::menu::{self, Screen};
use crate::nav::Navigator;
use crate::storage::SessionStore;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    prelude::*,
    types::{CallbackQuery, ChatId, MessageId, ParseMode},
    utils::command::BotCommands,
    ApiError, RequestError,
};

/* ====== Commands ====== */
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Commands:")]
enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "search for movies")]
    Search(String),
    #[command(description = "show help")]
    Help,
    #[command(description = "forget the current search")]
    Cancel,
}

pub async fn run<S: SessionStore + 'static>(bot: Bot, nav: Arc<Navigator<S>>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!(error = %e, "could not register bot commands");
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint({
                            let nav = nav.clone();
                            move |bot: Bot, msg: Message, cmd: Command| {
                                let nav = nav.clone();
                                async move { on_command(bot, msg, cmd, &nav).await }
                            }
                        }),
                )
                .branch({
                    let nav = nav.clone();
                    dptree::endpoint(move |bot: Bot, msg: Message| {
                        let nav = nav.clone();
                        async move { on_search_text(bot, msg, &nav).await }
                    })
                }),
        )
        .branch(Update::filter_callback_query().endpoint({
            let nav = nav.clone();
            move |bot: Bot, q: CallbackQuery| {
                let nav = nav.clone();
                async move { on_callback(bot, q, &nav).await }
            }
        }));

    tracing::info!("Starting movie scraper bot");
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn on_command<S: SessionStore>(
    bot: Bot,
    msg: Message,
    cmd: Command,
    nav: &Navigator<S>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            let screen = menu::welcome();
            send_screen(&bot, msg.chat.id, screen).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, menu::help()).parse_mode(ParseMode::Html).await?;
        }
        Command::Search(query) => run_search(&bot, msg.chat.id, query.trim(), nav).await?,
        Command::Cancel => {
            nav.cancel(msg.chat.id.0).await;
            bot.send_message(msg.chat.id, "❌ Operation cancelled. Send /search to find movies.")
                .await?;
        }
    }
    Ok(())
}

/* ====== Free text is an implicit search ====== */
async fn on_search_text<S: SessionStore>(bot: Bot, msg: Message, nav: &Navigator<S>) -> ResponseResult<()> {
    let Some(text) = msg.text() else { return Ok(()); };
    let query = text.trim();
    // unknown commands fall through the command filter
    if query.is_empty() || query.starts_with('/') {
        return Ok(());
    }
    run_search(&bot, msg.chat.id, query, nav).await
}

async fn run_search<S: SessionStore>(
    bot: &Bot,
    chat: ChatId,
    query: &str,
    nav: &Navigator<S>,
) -> ResponseResult<()> {
    if query.is_empty() {
        bot.send_message(chat, menu::search_usage()).parse_mode(ParseMode::Html).await?;
        return Ok(());
    }
    // the placeholder becomes the menu message that every later step edits
    let pending = bot
        .send_message(chat, menu::searching(query))
        .parse_mode(ParseMode::Html)
        .await?;
    let screen = nav.search(chat.0, pending.id.0, query).await;
    edit_screen(bot, chat, pending.id, screen).await
}

/* ====== Callback buttons ====== */
async fn on_callback<S: SessionStore>(bot: Bot, q: CallbackQuery, nav: &Navigator<S>) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;
    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let chat = message.chat().id;
    // details and links can take a while; show which movie is being fetched
    if let Some(loading) = nav.loading(chat.0, message.id().0, data).await {
        edit_screen(&bot, chat, message.id(), loading).await?;
    }
    if let Some(screen) = nav.on_callback(chat.0, message.id().0, data).await {
        edit_screen(&bot, chat, message.id(), screen).await?;
    }
    Ok(())
}

/* ====== Rendering ====== */
async fn send_screen(bot: &Bot, chat: ChatId, screen: Screen) -> ResponseResult<()> {
    let req = bot.send_message(chat, screen.text).parse_mode(ParseMode::Html);
    match screen.keyboard {
        Some(kb) => req.reply_markup(kb).await?,
        None => req.await?,
    };
    Ok(())
}

async fn edit_screen(bot: &Bot, chat: ChatId, id: MessageId, screen: Screen) -> ResponseResult<()> {
    let req = bot.edit_message_text(chat, id, screen.text).parse_mode(ParseMode::Html);
    let res = match screen.keyboard {
        Some(kb) => req.reply_markup(kb).await,
        None => req.await,
    };
    match res {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e),
    }
}
