use crate::db::models::{MentorMessage, UserStats};
use crate::db::types::MentorRole;
use crate::services::llm::{ChatMessage, Completion, LlmClient, LlmError};

const MENTOR_SYSTEM_PROMPT: &str = "Você é o Mentor ENEM, um tutor paciente e motivador. \
Responda em português do Brasil, de forma clara e objetiva, com exemplos quando ajudar. \
Foque em conteúdos do ENEM, técnicas de redação, organização dos estudos e bem-estar durante a \
preparação. Se a pergunta fugir desse escopo, redirecione gentilmente a conversa para os estudos.";

/// Short description of the student appended to the system prompt.
pub(crate) fn student_context(full_name: &str, stats: &UserStats) -> String {
    let mut context = format!(
        "Estudante: {full_name}. Nível {}, {} XP, sequência de {} dia(s).",
        stats.level, stats.xp, stats.streak_days
    );
    if stats.scored_count > 0 {
        context.push_str(&format!(" Média das notas: {:.0}.", stats.average_score));
    }
    context
}

/// System prompt, then `history` oldest first, then the new message.
pub(crate) fn build_conversation(
    context: Option<&str>,
    history: &[MentorMessage],
    message: &str,
) -> Vec<ChatMessage> {
    let system = match context {
        Some(context) => format!("{MENTOR_SYSTEM_PROMPT}\n\n{context}"),
        None => MENTOR_SYSTEM_PROMPT.to_string(),
    };

    let mut conversation = Vec::with_capacity(history.len() + 2);
    conversation.push(ChatMessage::system(system));
    conversation.extend(history.iter().map(|entry| match entry.role {
        MentorRole::User => ChatMessage::user(entry.content.clone()),
        MentorRole::Assistant => ChatMessage::assistant(entry.content.clone()),
    }));
    conversation.push(ChatMessage::user(message));
    conversation
}

pub(crate) async fn reply(
    llm: &LlmClient,
    context: Option<&str>,
    history: &[MentorMessage],
    message: &str,
) -> Result<Completion<String>, LlmError> {
    let conversation = build_conversation(context, history, message);
    llm.complete_text(&conversation).await
}
