/// Who the assistant speaks for; feeds the model persona and the banner.
pub struct StoreContext {
    pub store_name: String,
}

impl StoreContext {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
        }
    }

    pub fn bot_name(&self) -> String {
        format!("{}'s Bot", self.store_name)
    }

    pub fn system_instruction(&self) -> String {
        format!(
            "You are {}, a friendly and knowledgeable customer support chatbot for an online clothing store. \
             You can help customers with product information, order tracking, return policies, promotions, \
             fashion tips, sizing advice, and general fashion-related questions. \
             Respond clearly, professionally, and with a touch of personality that suits an online clothing brand.",
            self.bot_name()
        )
    }

    pub fn title(&self) -> String {
        format!("{}'s Online Clothing Store Chatbot", self.store_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_names_the_store() {
        let context = StoreContext::new("Ricchy");
        assert_eq!(context.bot_name(), "Ricchy's Bot");
        assert!(context.system_instruction().starts_with("You are Ricchy's Bot, a friendly"));
        assert_eq!(context.title(), "Ricchy's Online Clothing Store Chatbot");
    }
}
