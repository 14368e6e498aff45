use anyhow::{anyhow, Result};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, InputFile, ReplyParameters};
use tracing::{error, info, warn};
use url::Url;

use crate::config::{
    REPLY_ADJUSTED_HEADER, REPLY_CROP_HEADER, REPLY_NO_CROP_NOTICE, REPLY_PIPELINE_FAILURE,
    REPLY_SEND_PHOTO_PROMPT,
};
use crate::state::{AppState, PhotoCritique};
use crate::utils::media::download_media;
use crate::utils::telegram::ChatActionHeartbeat;
use crate::utils::timing::{complete_command_timer, start_command_timer};

/// One outbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMessage {
    Text(String),
    Image(String),
}

/// Critique first, then the crop suggestion (or a notice that there is
/// none), then the adjusted image.
pub fn build_reply_plan(outcome: &PhotoCritique) -> Vec<ReplyMessage> {
    let mut plan = vec![ReplyMessage::Text(outcome.critique.clone())];
    match &outcome.artifacts.annotated_url {
        Some(url) => {
            plan.push(ReplyMessage::Text(REPLY_CROP_HEADER.to_string()));
            plan.push(ReplyMessage::Image(url.clone()));
        }
        None => plan.push(ReplyMessage::Text(REPLY_NO_CROP_NOTICE.to_string())),
    }
    plan.push(ReplyMessage::Text(REPLY_ADJUSTED_HEADER.to_string()));
    plan.push(ReplyMessage::Image(outcome.artifacts.adjusted_url.clone()));
    plan
}

/// Largest size of a photo message, or an image sent as a file.
pub fn photo_file(message: &Message) -> Option<(FileId, u32)> {
    if let Some(largest) = message.photo().and_then(|sizes| sizes.last()) {
        return Some((largest.file.id.clone(), largest.file.size));
    }
    let document = message.document()?;
    let is_image = document
        .mime_type
        .as_ref()
        .is_some_and(|mime| mime.essence_str().starts_with("image/"));
    is_image.then(|| (document.file.id.clone(), document.file.size))
}

pub async fn get_file_url(bot: &Bot, file_id: &FileId) -> Result<String> {
    let file = bot.get_file(file_id.clone()).await?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    ))
}

async fn download_photo(bot: &Bot, file_id: &FileId) -> Result<Vec<u8>> {
    let url = get_file_url(bot, file_id).await?;
    download_media(&url)
        .await
        .ok_or_else(|| anyhow!("photo download failed"))
}

/// Lets Telegram fetch the image by URL; if it cannot reach the URL (e.g. a
/// local deployment), the bytes are fetched here and uploaded instead.
async fn send_image(bot: &Bot, chat_id: ChatId, url: &str) -> Result<()> {
    let parsed = Url::parse(url)?;
    match bot.send_photo(chat_id, InputFile::url(parsed)).await {
        Ok(_) => Ok(()),
        Err(err) => {
            warn!("send_photo by URL failed for {url}: {err}; uploading bytes");
            let bytes = download_media(url)
                .await
                .ok_or_else(|| anyhow!("could not fetch {url} for upload"))?;
            bot.send_photo(chat_id, InputFile::memory(bytes).file_name("photo.jpg"))
                .await?;
            Ok(())
        }
    }
}

async fn send_reply_plan(bot: &Bot, message: &Message, plan: &[ReplyMessage]) -> Result<()> {
    let chat_id = message.chat.id;
    for (index, reply) in plan.iter().enumerate() {
        match reply {
            ReplyMessage::Text(text) if index == 0 => {
                bot.send_message(chat_id, text.clone())
                    .reply_parameters(ReplyParameters::new(message.id))
                    .await?;
            }
            ReplyMessage::Text(text) => {
                bot.send_message(chat_id, text.clone()).await?;
            }
            ReplyMessage::Image(url) => send_image(bot, chat_id, url).await?,
        }
    }
    Ok(())
}

pub async fn send_photo_prompt(bot: Bot, message: Message) -> Result<()> {
    bot.send_message(message.chat.id, REPLY_SEND_PHOTO_PROMPT)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

async fn reply_failure(bot: &Bot, message: &Message) -> Result<()> {
    bot.send_message(message.chat.id, REPLY_PIPELINE_FAILURE)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

pub async fn photo_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let Some((file_id, file_size)) = photo_file(&message) else {
        return Ok(());
    };
    let mut timer = start_command_timer("photo", &message);

    if file_size as usize > state.max_upload_bytes {
        warn!(
            "Photo of {} bytes exceeds limit {}",
            file_size, state.max_upload_bytes
        );
        reply_failure(&bot, &message).await?;
        complete_command_timer(&mut timer, "rejected", Some("too large".to_string()));
        return Ok(());
    }

    let heartbeat =
        ChatActionHeartbeat::start(bot.clone(), message.chat.id, ChatAction::UploadPhoto);

    let image_bytes = match download_photo(&bot, &file_id).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to download photo: {err}");
            drop(heartbeat);
            reply_failure(&bot, &message).await?;
            complete_command_timer(&mut timer, "error", Some("download".to_string()));
            return Ok(());
        }
    };

    let outcome = state.critique_photo(&image_bytes).await;
    drop(heartbeat);

    match outcome {
        Ok(outcome) => {
            info!(
                "[{}] Replying to chat {} with critique",
                outcome.request_id, message.chat.id
            );
            let sent = send_reply_plan(&bot, &message, &build_reply_plan(&outcome)).await;
            // Telegram has fetched or been sent every image by now.
            state.release_artifacts(&outcome.artifacts).await;
            sent?;
            complete_command_timer(&mut timer, "success", Some(outcome.request_id));
        }
        Err(err) => {
            error!("Photo analysis failed ({}): {err}", err.kind());
            reply_failure(&bot, &message).await?;
            complete_command_timer(&mut timer, "error", Some(err.kind().to_string()));
        }
    }
    Ok(())
}
