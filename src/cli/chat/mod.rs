pub mod context;
pub mod prompt;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use color_print::cformat;
use context::StoreContext;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use eyre::Result;
use prompt::generate_prompt;
use rustyline::error::ReadlineError;
use tracing::{debug, error, warn};

use crate::conversation_state::{ConversationState, Role, Turn};
use crate::gemini_client::Generate;
use crate::router::{PersistenceRequest, Router};
use crate::store::{PersistenceSink, ProductCatalog};

const HELP_TEXT: &str = "
/clear        Start a new conversation
/history      Show the conversation so far
/help         Show this help dialogue
/quit         Quit the application

Tip: say \"my name is ...\" so we know who we're talking to.
";

/// External collaborators the chat loop talks to.
pub struct Services {
    pub generator: Arc<dyn Generate>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub sink: Arc<dyn PersistenceSink>,
}

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    conversation_state: ConversationState,
    store_context: StoreContext,
    router: Router,
    services: Services,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        store_context: StoreContext,
        router: Router,
        services: Services,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            conversation_state: ConversationState::new(),
            store_context,
            router,
            services,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.interactive {
            self.print_welcome()?;
        }

        // Handle non-interactive mode (single message)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        let started = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(
            self.output,
            "{}",
            cformat!(
                "\n<bold>🤖 {}</bold>\n\nHi, I'm {}. Ask me about our products, sizing, orders or returns.\n/help for commands, /quit to leave.\n\n<dim>Chat started on: {}</dim>\n",
                self.store_context.title(),
                self.store_context.bot_name(),
                started
            )
        )?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;
        let history = prompt::history_path();
        if let Some(path) = &history {
            if rl.load_history(path).is_err() {
                debug!("No line history at {}", path.display());
            }
        }

        loop {
            let prompt_text = generate_prompt(self.conversation_state.customer_name());
            match rl.readline(&prompt_text) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        if let Some(path) = &history {
            if let Err(e) = rl.save_history(path) {
                warn!("Could not save line history to {}: {}", path.display(), e);
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        let input = input.trim();
        match input {
            "" | "/quit" => {}
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.conversation_state.clear();
                if self.interactive {
                    execute!(self.output, Clear(ClearType::All), MoveTo(0, 0))?;
                }
                writeln!(self.output, "Conversation cleared.")?;
            }
            "/history" => {
                let turns = self.conversation_state.turns().to_vec();
                if turns.is_empty() {
                    writeln!(self.output, "No messages yet.")?;
                }
                for turn in &turns {
                    self.render_turn(turn)?;
                }
            }
            _ => {
                self.process_chat_input(input).await?;
            }
        }

        Ok(())
    }

    async fn process_chat_input(&mut self, input: &str) -> Result<()> {
        let catalog = match self.services.catalog.list_products().await {
            Ok(products) => products,
            Err(e) => {
                warn!("Could not read the product catalog, continuing without it: {}", e);
                Vec::new()
            }
        };

        let response = self
            .router
            .route(
                input,
                &mut self.conversation_state,
                &catalog,
                self.services.generator.as_ref(),
            )
            .await;

        if let Some(turn) = self.conversation_state.turns().last().cloned() {
            self.render_turn(&turn)?;
        }

        if let Err(e) = self.services.sink.apply(&response.persistence).await {
            let what = match &response.persistence {
                PersistenceRequest::RegisterCustomer { .. } => "customer",
                PersistenceRequest::LogMessage { .. } => "message",
            };
            error!("Failed to save {}: {}", what, e);
        }

        Ok(())
    }

    fn render_turn(&mut self, turn: &Turn) -> Result<()> {
        let line = match turn.role {
            Role::User => cformat!("<green><bold>You:</bold></green> {}", turn.text),
            Role::Bot => cformat!(
                "<cyan><bold>{}:</bold></cyan> {}",
                self.store_context.bot_name(),
                turn.text
            ),
        };
        writeln!(self.output, "{}", line)?;

        if let Some(image) = &turn.image {
            writeln!(self.output, "{}", cformat!("  <dim>[{}] {}</dim>", image.caption, image.url))?;
        }

        writeln!(self.output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::store::{CustomerRecord, MessageRecord, Product, StoreError};

    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl SharedOutput {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct EchoModel;

    #[async_trait]
    impl Generate for EchoModel {
        async fn generate(&self, prompt: &str) -> eyre::Result<String> {
            Ok(format!("echo: {}", prompt))
        }
    }

    struct FixedCatalog(Option<Vec<Product>>);

    #[async_trait]
    impl ProductCatalog for FixedCatalog {
        async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
            self.0.clone().ok_or_else(|| StoreError::Io {
                path: "catalog.json".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "offline"),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        customers: Mutex<Vec<CustomerRecord>>,
        messages: Mutex<Vec<MessageRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl PersistenceSink for RecordingSink {
        async fn register_customer(&self, record: CustomerRecord) -> Result<(), StoreError> {
            self.customers.lock().unwrap().push(record);
            Ok(())
        }

        async fn log_message(&self, record: MessageRecord) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Status {
                    url: "messages".to_string(),
                    status: 503,
                    body: "down".to_string(),
                });
            }
            self.messages.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn catalog() -> Vec<Product> {
        vec![Product {
            name: "Blue Shirt".to_string(),
            description: "A soft blue cotton shirt.".to_string(),
            image_url: Some("https://img.example/blue.png".to_string()),
        }]
    }

    fn chat(products: Option<Vec<Product>>, sink: Arc<RecordingSink>) -> (ChatContext, SharedOutput) {
        let output = SharedOutput::default();
        let context = ChatContext::new(
            Box::new(output.clone()),
            None,
            false,
            StoreContext::new("Ricchy"),
            Router::default(),
            Services {
                generator: Arc::new(EchoModel),
                catalog: Arc::new(FixedCatalog(products)),
                sink,
            },
        );
        (context, output)
    }

    #[tokio::test]
    async fn routes_messages_and_persists_each() {
        let sink = Arc::new(RecordingSink::default());
        let (mut chat, output) = chat(Some(catalog()), sink.clone());

        chat.handle_input("  my name is alice  ").await.unwrap();
        chat.handle_input("show me the blue shirt").await.unwrap();
        chat.handle_input("when do you open?").await.unwrap();

        assert_eq!(chat.conversation_state.turns().len(), 6);
        assert_eq!(chat.conversation_state.customer_name(), Some("Alice"));

        let customers = sink.customers.lock().unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].customer_name, "Alice");

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].customer_name, "Alice");
        assert_eq!(messages[1].bot_response, "echo: when do you open?");

        let text = output.text();
        assert!(text.contains("A soft blue cotton shirt."));
        assert!(text.contains("https://img.example/blue.png"));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let sink = Arc::new(RecordingSink::default());
        let (mut chat, _) = chat(Some(catalog()), sink.clone());

        chat.handle_input("   ").await.unwrap();

        assert!(chat.conversation_state.turns().is_empty());
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_failure_falls_through_to_model() {
        let sink = Arc::new(RecordingSink::default());
        let (mut chat, _) = chat(None, sink.clone());

        chat.handle_input("show me the blue shirt").await.unwrap();

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages[0].bot_response, "echo: show me the blue shirt");
    }

    #[tokio::test]
    async fn sink_failure_does_not_end_the_chat() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let (mut chat, output) = chat(Some(Vec::new()), sink);

        chat.handle_input("hello").await.unwrap();

        assert_eq!(chat.conversation_state.turns().len(), 2);
        assert!(output.text().contains("echo: hello"));
    }

    #[tokio::test]
    async fn clear_forgets_history_and_name() {
        let sink = Arc::new(RecordingSink::default());
        let (mut chat, _) = chat(Some(Vec::new()), sink);

        chat.handle_input("my name is bob").await.unwrap();
        chat.handle_input("/clear").await.unwrap();

        assert!(chat.conversation_state.turns().is_empty());
        assert_eq!(chat.conversation_state.customer_name(), None);
    }

    #[tokio::test]
    async fn history_replays_both_sides() {
        let sink = Arc::new(RecordingSink::default());
        let (mut chat, output) = chat(Some(Vec::new()), sink);

        chat.handle_input("hello").await.unwrap();
        chat.handle_input("/history").await.unwrap();

        let text = output.text();
        assert!(text.contains("You:"));
        assert_eq!(text.matches("echo: hello").count(), 2);
    }

    #[tokio::test]
    async fn single_input_mode_routes_once() {
        let sink = Arc::new(RecordingSink::default());
        let output = SharedOutput::default();
        let mut chat = ChatContext::new(
            Box::new(output.clone()),
            Some("hi there".to_string()),
            false,
            StoreContext::new("Ricchy"),
            Router::default(),
            Services {
                generator: Arc::new(EchoModel),
                catalog: Arc::new(FixedCatalog(Some(Vec::new()))),
                sink: sink.clone(),
            },
        );

        chat.run().await.unwrap();
        assert_eq!(sink.messages.lock().unwrap().len(), 1);
        assert!(output.text().contains("echo: hi there"));
    }

    #[tokio::test]
    async fn single_input_quit_is_a_command_not_a_message() {
        let sink = Arc::new(RecordingSink::default());
        let output = SharedOutput::default();
        let mut chat = ChatContext::new(
            Box::new(output.clone()),
            Some(" /quit ".to_string()),
            false,
            StoreContext::new("Ricchy"),
            Router::default(),
            Services {
                generator: Arc::new(EchoModel),
                catalog: Arc::new(FixedCatalog(Some(Vec::new()))),
                sink: sink.clone(),
            },
        );

        chat.run().await.unwrap();
        assert!(chat.conversation_state.turns().is_empty());
        assert!(sink.messages.lock().unwrap().is_empty());
        assert!(sink.customers.lock().unwrap().is_empty());
        assert!(!output.text().contains("echo:"));
    }
}
