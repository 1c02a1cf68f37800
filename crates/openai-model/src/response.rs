use turnloop_model::{ErrorKind, ModelResponse, Role, ToolCallRequest};

use crate::Error;
use crate::proto::{ChatCompletion, ResponseMessage};

/// The assistant message of a chat completion.
#[derive(Clone, Debug)]
pub struct OpenAIResponse {
    id: String,
    role: Role,
    message: ResponseMessage,
}

impl OpenAIResponse {
    /// Parses the body of a chat completion response.
    pub(crate) fn from_body(body: &str) -> Result<Self, Error> {
        let completion = serde_json::from_str::<ChatCompletion>(body)
            .map_err(|err| {
                Error::new(
                    format!("undecodable completion: {err}"),
                    ErrorKind::InvalidResponse,
                )
            })?;
        trace!("got completion `{}`", completion.id);

        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(Error::new(
                "completion has no choices",
                ErrorKind::InvalidResponse,
            ));
        };
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(Error::new(
                "completion was stopped by the content filter",
                ErrorKind::Moderated,
            ));
        }

        let role = match choice.message.role.as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "user" => Role::User,
            "tool" => Role::Tool,
            other => {
                return Err(Error::new(
                    format!("unknown message role `{other}`"),
                    ErrorKind::InvalidResponse,
                ));
            }
        };
        Ok(Self {
            id: completion.id,
            role,
            message: choice.message,
        })
    }

    /// Returns the id of the completion.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl ModelResponse for OpenAIResponse {
    #[inline]
    fn role(&self) -> Role {
        self.role
    }

    #[inline]
    fn content(&self) -> Option<&str> {
        self.message.content.as_deref()
    }

    fn tool_call_requests(&self) -> Vec<ToolCallRequest> {
        let Some(tool_calls) = &self.message.tool_calls else {
            return vec![];
        };
        tool_calls
            .iter()
            .map(|call| ToolCallRequest {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
            })
            .collect()
    }
}
