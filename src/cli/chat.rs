use std::io::{self, Write};

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::ai::chat::{Session, error_banner};
use crate::core::AppConfig;
use crate::gemini::GeminiClient;

pub async fn run() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load config")?;
    let model = GeminiClient::new(
        &config.gemini_api_hostname,
        &config.google_api_key,
        &config.gemini_model,
    );

    let mut rl = DefaultEditor::new().context("Failed to start line editor")?;
    let mut session = Session::start(&model);

    for msg in session.messages() {
        println!("{}\n", msg.text);
    }

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                // Print fragments as they arrive
                let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                let printer = tokio::spawn(async move {
                    let mut stdout = io::stdout();
                    while let Some(fragment) = rx.recv().await {
                        print!("{}", fragment);
                        let _ = stdout.flush();
                    }
                });

                let result = session.next_turn(line, &tx).await;
                drop(tx);
                printer.await.context("Printer task failed")?;

                match result {
                    Ok(_) => println!("\n"),
                    Err(e) => {
                        tracing::error!("Turn failed: {}", e);
                        eprintln!("\n{}\n", error_banner(&e));
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
