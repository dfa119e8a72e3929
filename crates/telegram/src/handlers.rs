//! Inbound message handling: debounce, command dispatch, link intake.
//!
//! The decision logic lives in `courier_core`; this module is the glue that
//! extracts sender and text from a Telegram update, runs the gates, and turns
//! verdicts into replies. Rendering is kept in plain functions so it can be
//! tested without a network.

use std::sync::Arc;

use {
    async_trait::async_trait,
    teloxide::{Bot, prelude::*, types::ChatId},
    tokio::time::Instant,
    tracing::{debug, warn},
};

use courier_core::{
    RelayState, UserId,
    inbound::{self, TextVerdict},
    limits::DAILY_JOB_LIMIT,
    queue::{JobQueue, RelayJob},
    roles::{RemoveOutcome, Role, RoleStore, Secrets},
    transport::{ReplyContext, TransportResult},
};

use crate::{error::Result, transport::map_error};

/// Shared context for the polling loop's handler calls.
pub struct BotContext {
    pub bot: Bot,
    pub state: Arc<RelayState>,
    pub queue: JobQueue,
    pub secrets: Secrets,
    pub workers: usize,
}

/// Reply handle back into the originating private chat.
pub struct TelegramReply {
    bot: Bot,
    chat: ChatId,
}

#[async_trait]
impl ReplyContext for TelegramReply {
    async fn reply(&self, text: &str) -> TransportResult<()> {
        self.bot
            .send_message(self.chat, text)
            .await
            .map_err(map_error)?;
        Ok(())
    }
}

/// Slash commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Users,
    Remove(Option<UserId>),
    Unknown,
}

impl Command {
    /// Parse a command-pattern message. Returns `None` for free text.
    /// A `@botname` suffix on the command word is tolerated.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let mut parts = trimmed.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next()?;
        Some(match name {
            "/start" => Self::Start,
            "/help" => Self::Help,
            "/status" => Self::Status,
            "/users" => Self::Users,
            "/remove" => {
                Self::Remove(parts.next().and_then(|s| s.parse::<i64>().ok()).map(UserId))
            },
            _ => Self::Unknown,
        })
    }
}

/// Handle one inbound Telegram message from the polling loop.
pub async fn handle_message(ctx: &BotContext, msg: Message) -> Result<()> {
    if !msg.chat.is_private() {
        debug!(chat_id = msg.chat.id.0, "ignoring non-private chat");
        return Ok(());
    }
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    if from.is_bot {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };

    let user = UserId(i64::try_from(from.id.0).unwrap_or_default());
    let name = display_name(from);
    let now = Instant::now();

    if let Some(command) = Command::parse(text) {
        if !ctx.state.gate().allow_command(user, now) {
            debug!(user = %user, "command debounced");
            return Ok(());
        }
        if ctx.state.roles().is_blocked(user) {
            return Ok(());
        }
        return handle_command(ctx, msg.chat.id, user, command).await;
    }

    if !ctx.state.gate().allow_message(user, now) {
        debug!(user = %user, "message dropped by flood gate");
        return Ok(());
    }

    let verdict = {
        let mut roles = ctx.state.roles();
        inbound::classify_text(&mut roles, &ctx.secrets, user, &name, text)
    };
    handle_verdict(ctx, msg.chat.id, user, verdict).await
}

async fn handle_command(
    ctx: &BotContext,
    chat: ChatId,
    user: UserId,
    command: Command,
) -> Result<()> {
    let text = {
        let mut roles = ctx.state.roles();
        let role = roles.role(user);
        match command {
            Command::Start => start_text(role),
            Command::Help => help_text(role),
            Command::Status => {
                if role == Role::Unauthorized {
                    locked_text()
                } else {
                    status_text(&roles, user, role, ctx.queue.depth(), ctx.workers)
                }
            },
            Command::Users => {
                if roles.is_owner(user) {
                    users_text(&roles)
                } else {
                    owner_only_text()
                }
            },
            Command::Remove(target) => match target {
                Some(target) => remove_text(roles.remove_user(user, target), target),
                None => "Usage: /remove <user id>".to_string(),
            },
            Command::Unknown => "❓ Unknown command. Try /help.".to_string(),
        }
    };
    send(ctx, chat, &text).await
}

async fn handle_verdict(
    ctx: &BotContext,
    chat: ChatId,
    user: UserId,
    verdict: TextVerdict,
) -> Result<()> {
    if let TextVerdict::Relay {
        channel,
        message_id,
    } = verdict
    {
        let reply = Arc::new(TelegramReply {
            bot: ctx.bot.clone(),
            chat,
        });
        let key = channel.job_key(message_id);
        ctx.queue.enqueue(RelayJob {
            channel,
            message_id,
            user,
            reply,
        })?;
        debug!(user = %user, %key, depth = ctx.queue.depth(), "job enqueued");
        return send(ctx, chat, &enqueue_ack(ctx.queue.depth())).await;
    }

    match verdict_text(&verdict) {
        Some(text) => send(ctx, chat, &text).await,
        None => Ok(()),
    }
}

async fn send(ctx: &BotContext, chat: ChatId, text: &str) -> Result<()> {
    if let Err(e) = ctx.bot.send_message(chat, text).await {
        warn!(chat_id = chat.0, error = %e, "failed to send reply");
    }
    Ok(())
}

fn display_name(user: &teloxide::types::User) -> String {
    let mut name = user.first_name.clone();
    if let Some(last) = &user.last_name {
        name.push(' ');
        name.push_str(last);
    }
    let name = name.trim().to_string();
    if name.is_empty() {
        user.username.clone().unwrap_or_else(|| "Unknown".into())
    } else {
        name
    }
}

fn locked_text() -> String {
    "🔒 This is a private bot. Send the access password to continue.".to_string()
}

fn owner_only_text() -> String {
    "❌ This command is restricted to owners.".to_string()
}

fn start_text(role: Role) -> String {
    match role {
        Role::Unauthorized => locked_text(),
        _ => format!(
            "👋 Welcome back! Role: {}.\n\n\
             Send a message link like https://t.me/channel/123 and I'll \
             forward the content to you. See /help for commands.",
            role.as_str()
        ),
    }
}

fn help_text(role: Role) -> String {
    if role == Role::Unauthorized {
        return locked_text();
    }
    let mut text = String::from(
        "📖 Commands\n\n\
         /start - welcome message\n\
         /help - this help\n\
         /status - your usage and the queue\n\n\
         Send a message link (https://t.me/channel/123) to have its \
         content forwarded to you.",
    );
    if role == Role::Owner {
        text.push_str(
            "\n\nOwner commands:\n\
             /users - list admins and owners\n\
             /remove <user id> - revoke a user's access",
        );
    }
    text
}

fn status_text(
    roles: &RoleStore,
    user: UserId,
    role: Role,
    queue_depth: usize,
    workers: usize,
) -> String {
    let (processed, today) = roles
        .record(user)
        .map_or((0, 0), |r| (r.messages_processed, r.daily_count));
    let quota = if role == Role::Owner {
        format!("{today} (unlimited)")
    } else {
        format!("{today}/{DAILY_JOB_LIMIT}")
    };
    let (users, admins, owners) = roles.counts();
    format!(
        "📊 Status\n\n\
         Role: {}\n\
         Queue: {queue_depth} pending, {workers} workers\n\
         Messages processed: {processed}\n\
         Today: {quota}\n\
         Known users: {users} (admins: {admins}, owners: {owners})",
        role.as_str()
    )
}

fn users_text(roles: &RoleStore) -> String {
    let mut text = String::from("👥 Users\n\nOwners:\n");
    for (id, name) in roles.owner_roster() {
        text.push_str(&format!("  • {id} ({name})\n"));
    }
    text.push_str("\nAdmins:\n");
    for (id, name) in roles.admin_roster() {
        text.push_str(&format!("  • {id} ({name})\n"));
    }
    let (users, _, _) = roles.counts();
    text.push_str(&format!("\nTotal known users: {users}"));
    text
}

fn remove_text(outcome: RemoveOutcome, target: UserId) -> String {
    match outcome {
        RemoveOutcome::Removed => format!("✅ User {target} removed."),
        RemoveOutcome::NotFound => format!("❌ User {target} not found."),
        RemoveOutcome::NotOwner => owner_only_text(),
        RemoveOutcome::SelfRemovalForbidden => {
            "❌ You cannot revoke your own owner access.".to_string()
        },
    }
}

fn enqueue_ack(depth: usize) -> String {
    format!("✅ Link received! Your request is queued (position {depth}).")
}

/// Reply text for a classification verdict, or `None` for silent drops.
/// `Relay` is handled separately because it enqueues.
fn verdict_text(verdict: &TextVerdict) -> Option<String> {
    match verdict {
        TextVerdict::Blocked | TextVerdict::SilentIgnore | TextVerdict::Relay { .. } => None,
        TextVerdict::Authenticated(role) => Some(format!(
            "✅ Access granted. Role: {}.\n\n\
             Send a message link like https://t.me/channel/123 and I'll \
             forward the content to you.",
            role.as_str()
        )),
        TextVerdict::QuotaExhausted => Some(format!(
            "⚠️ You have reached your daily limit of {DAILY_JOB_LIMIT} links. Try again tomorrow."
        )),
        TextVerdict::ChannelHint { channel } => Some(format!(
            "ℹ️ That's a channel link. Send a link to a specific message, \
             e.g. https://t.me/{channel}/123."
        )),
        TextVerdict::InvalidLink => {
            Some("❌ Could not parse that link. Expected https://t.me/channel/123.".to_string())
        },
        TextVerdict::NotALink => Some(
            "Send a Telegram message link (https://t.me/channel/123) and I'll \
             forward the message to you."
                .to_string(),
        ),
    }
}
