// src/ai/openai.rs

use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl, ReasoningEffort, ResponseFormat,
    },
};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    Examiner, GeneratedQuestion, GenerationPrompt, ImageInput, MarkingRequest, parse, prompt,
};
use crate::{
    config::AiConfig, error::AppError, models::attempt::MarkResult, utils::imaging::to_data_url,
};

fn text_part(text: String) -> ChatCompletionRequestUserMessageContentPart {
    ChatCompletionRequestUserMessageContentPart::Text(ChatCompletionRequestMessageContentPartText {
        text,
    })
}

fn image_part(image: &ImageInput) -> ChatCompletionRequestUserMessageContentPart {
    ChatCompletionRequestUserMessageContentPart::ImageUrl(
        ChatCompletionRequestMessageContentPartImage {
            image_url: ImageUrl {
                url: to_data_url(&image.bytes, &image.content_type),
                detail: Some(ImageDetail::Auto),
            },
        },
    )
}

fn system_message(text: String) -> Result<ChatCompletionRequestMessage, AppError> {
    let message = ChatCompletionRequestSystemMessageArgs::default()
        .content(text)
        .build()?;
    Ok(ChatCompletionRequestMessage::System(message))
}

fn user_message(
    content: ChatCompletionRequestUserMessageContent,
) -> Result<ChatCompletionRequestMessage, AppError> {
    let message = ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()?;
    Ok(ChatCompletionRequestMessage::User(message))
}

/// Maps the configured effort name. Unknown names are ignored with a warning.
fn parse_reasoning_effort(value: &str) -> Option<ReasoningEffort> {
    match value.trim().to_ascii_lowercase().as_str() {
        "minimal" => Some(ReasoningEffort::Minimal),
        "low" => Some(ReasoningEffort::Low),
        "medium" => Some(ReasoningEffort::Medium),
        "high" => Some(ReasoningEffort::High),
        other => {
            warn!("Ignoring unknown reasoning effort '{}'", other);
            None
        }
    }
}

/// The user turn of a marking request: question, mark scheme, then the answer.
fn marking_parts(request: &MarkingRequest) -> Vec<ChatCompletionRequestUserMessageContentPart> {
    let mut parts = vec![text_part(prompt::marking_question_intro(request))];
    if let Some(image) = &request.question_image {
        parts.push(image_part(image));
    }
    if let Some(image) = &request.mark_scheme_image {
        parts.push(text_part("Mark scheme:".to_string()));
        parts.push(image_part(image));
    }
    parts.push(text_part(prompt::marking_answer_intro(request)));
    if let Some(drawing) = &request.drawing {
        parts.push(image_part(drawing));
    }
    parts
}

/// Examiner backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiExaminer {
    client: Client<OpenAIConfig>,
    model: String,
    reasoning_effort: Option<ReasoningEffort>,
    max_completion_tokens: u32,
    timeout: Duration,
}

impl OpenAiExaminer {
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, AppError> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(config.base_url.as_str().trim_end_matches('/'));

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            reasoning_effort: config
                .reasoning_effort
                .as_deref()
                .and_then(parse_reasoning_effort),
            max_completion_tokens: config.max_completion_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn build_request(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<CreateChatCompletionRequest, AppError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.max_completion_tokens)
            .response_format(ResponseFormat::JsonObject);
        if let Some(effort) = &self.reasoning_effort {
            args.reasoning_effort(effort.clone());
        }
        Ok(args.build()?)
    }

    /// Sends one chat completion and returns the reply text.
    async fn chat(&self, messages: Vec<ChatCompletionRequestMessage>) -> Result<String, AppError> {
        debug!("Calling chat completions, model: {}", self.model);
        let request = self.build_request(messages)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                warn!("Chat completions timed out after {:?}", self.timeout);
                AppError::Upstream("The AI service timed out, please try again".to_string())
            })??;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::Upstream("The AI service returned an empty reply".to_string()))?;

        debug!("Chat completions succeeded");
        Ok(content)
    }
}

#[async_trait]
impl Examiner for OpenAiExaminer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_question(
        &self,
        request: &GenerationPrompt,
    ) -> Result<GeneratedQuestion, AppError> {
        let messages = vec![
            system_message(prompt::generation_system_prompt())?,
            user_message(prompt::generation_user_prompt(request).into())?,
        ];

        let content = self.chat(messages).await?;
        parse::parse_generated(
            &content,
            &format!("{}: {}", request.subject, request.topic),
            request.max_marks,
        )
    }

    async fn mark_attempt(&self, request: &MarkingRequest) -> Result<MarkResult, AppError> {
        let messages = vec![
            system_message(prompt::marking_system_prompt(request))?,
            user_message(ChatCompletionRequestUserMessageContent::Array(marking_parts(
                request,
            )))?,
        ];

        let content = self.chat(messages).await?;
        parse::parse_mark(&content, request.max_marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn examiner(effort: Option<&str>) -> OpenAiExaminer {
        let mut config = crate::config::Config::for_tests("s").ai;
        config.reasoning_effort = effort.map(str::to_string);
        OpenAiExaminer::new(&config, "key".into()).unwrap()
    }

    #[test]
    fn marking_parts_interleave_text_and_images() {
        let request = MarkingRequest {
            question_text: Some("A ball is dropped.".into()),
            drawing: Some(ImageInput {
                bytes: vec![0x89, 0x50],
                content_type: "image/png".into(),
            }),
            max_marks: 3,
            ..Default::default()
        };
        let message = user_message(ChatCompletionRequestUserMessageContent::Array(
            marking_parts(&request),
        ))
        .unwrap();

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][2]["type"], "image_url");
        assert_eq!(
            json["content"][2]["image_url"]["url"],
            "data:image/png;base64,iVA="
        );
    }

    #[test]
    fn request_asks_for_json_with_configured_effort() {
        let examiner = examiner(Some("minimal"));
        let request = examiner
            .build_request(vec![system_message("Be brief.".into()).unwrap()])
            .unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["reasoning_effort"], "minimal");
        assert_eq!(json["max_completion_tokens"], 500);
    }

    #[test]
    fn unknown_effort_is_left_out() {
        assert!(parse_reasoning_effort("turbo").is_none());
        assert!(matches!(
            parse_reasoning_effort(" High "),
            Some(ReasoningEffort::High)
        ));

        let request = examiner(Some("turbo"))
            .build_request(vec![system_message("Be brief.".into()).unwrap()])
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("reasoning_effort").is_none());
    }
}
