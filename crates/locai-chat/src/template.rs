use locai_core::types::{Message, Role};

/// Prompt layout for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatTemplate {
    /// `<|user|>` / `<|assistant|>` turns closed by `<|end|>`.
    #[default]
    Phi3,
    Plain,
}

impl ChatTemplate {
    /// Render prior `history` plus the new user `prompt`, ending on an open assistant turn.
    pub fn render(&self, history: &[Message], prompt: &str) -> String {
        let mut out = String::new();
        match self {
            Self::Phi3 => {
                for message in history {
                    let tag = match message.role { Role::User => "<|user|>", Role::Assistant => "<|assistant|>" };
                    out.push_str(&format!("{tag}\n{}<|end|>\n", message.content));
                }
                out.push_str(&format!("<|user|>\n{prompt}<|end|>\n<|assistant|>"));
            }
            Self::Plain => {
                for message in history {
                    let name = match message.role { Role::User => "User", Role::Assistant => "Assistant" };
                    out.push_str(&format!("{name}: {}\n", message.content));
                }
                out.push_str(&format!("User: {prompt}\nAssistant:"));
            }
        }
        out
    }

    pub fn stop_sequences(&self) -> Vec<String> {
        match self {
            Self::Phi3 => vec!["<|end|>".to_string()],
            Self::Plain => vec!["\nUser:".to_string()],
        }
    }
}
