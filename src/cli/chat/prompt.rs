use std::path::PathBuf;

use rustyline::{Config, Editor, Result};

pub fn generate_prompt(customer_name: Option<&str>) -> String {
    match customer_name {
        Some(name) if !name.is_empty() => format!("{}> ", name),
        _ => "> ".to_string(),
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(false)
        .build();
    Editor::with_config(config)
}

pub fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ricchy_chat_history"))
}
