use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::MentorMessage;
use crate::db::types::MentorRole;
use crate::schemas::dashboard::ProgressResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct MentorMessageCreate {
    #[validate(length(min = 1, max = 2000, message = "message must have 1 to 2000 characters"))]
    pub(crate) message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MentorMessageResponse {
    pub(crate) id: String,
    pub(crate) role: MentorRole,
    pub(crate) content: String,
    pub(crate) created_at: String,
}

impl MentorMessageResponse {
    pub(crate) fn from_db(message: MentorMessage) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            created_at: format_primitive(message.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MentorExchangeResponse {
    pub(crate) question: MentorMessageResponse,
    pub(crate) reply: MentorMessageResponse,
    pub(crate) model: String,
    pub(crate) progress: ProgressResponse,
}
