#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

/// Image shown under a bot reply, e.g. the picture of a matched product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub image: Option<ImageRef>,
}

/// History and registered customer of a single chat session.
#[derive(Debug, Default)]
pub struct ConversationState {
    turns: Vec<Turn>,
    customer_name: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user_message(&mut self, message: &str) {
        self.turns.push(Turn {
            role: Role::User,
            text: message.to_string(),
            image: None,
        });
    }

    pub fn add_bot_message(&mut self, message: &str, image: Option<ImageRef>) {
        self.turns.push(Turn {
            role: Role::Bot,
            text: message.to_string(),
            image,
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn set_customer_name(&mut self, name: impl Into<String>) {
        self.customer_name = Some(name.into());
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.customer_name = None;
    }
}
