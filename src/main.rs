use std::fs;
use std::io::{self, BufRead, Write};

use tracing_subscriber::EnvFilter;

use medara::config::{self, AppSettings};
use medara::db::sqlite::open_database;
use medara::pipeline::consult::{
    ConsultationOrchestrator, LlmFactExtractor, LlmFlowClassifier, NullGateway,
    PersistenceGateway, SqliteGateway,
};
use medara::pipeline::OllamaClient;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = AppSettings::from_env();

    if let Err(e) = fs::create_dir_all(config::app_data_dir()) {
        tracing::warn!(error = %e, "could not create app data directory");
    }

    // A missing database degrades saving, never the conversation itself
    let connection = match open_database(&settings.db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            tracing::warn!(error = %e, "database unavailable, consultations will not be saved");
            None
        }
    };

    let llm = OllamaClient::new(
        &settings.llm.base_url,
        &settings.llm.model,
        settings.llm.timeout_secs,
    );

    match llm.is_model_available() {
        Ok(true) => tracing::info!(model = llm.model(), "Ollama model ready"),
        Ok(false) => {
            tracing::warn!(model = llm.model(), "model not present in Ollama, pull it first")
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not reach Ollama, replies will degrade to templates")
        }
    }

    let extractor = LlmFactExtractor::new(&llm);
    let classifier = LlmFlowClassifier::new(&llm);

    let sqlite_gateway = connection.as_ref().map(SqliteGateway::new);
    let null_gateway = NullGateway;
    let gateway: &dyn PersistenceGateway = match &sqlite_gateway {
        Some(gateway) => gateway,
        None => &null_gateway,
    };

    let mut orchestrator = ConsultationOrchestrator::new(&extractor, &classifier, &llm, gateway)
        .with_extraction_cadence(settings.intake.extract_every_n_turns);

    match orchestrator.start_conversation() {
        Ok(greeting) => {
            println!("\n{greeting}\n");
            println!("(commands: summary, missing, extract, export, quit)\n");
        }
        Err(e) => {
            tracing::error!(error = %e, "could not start consultation");
            return;
        }
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();

    loop {
        print!("you> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "failed to read input");
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" => {
                println!("Leaving the consultation.");
                break;
            }
            "summary" => {
                println!("\n{}\n", orchestrator.record().summary());
                continue;
            }
            "missing" => {
                let missing = orchestrator.record().missing_required_fields();
                if missing.is_empty() {
                    println!("All required information has been gathered.");
                } else {
                    println!("Still missing: {}", missing.join(", "));
                }
                continue;
            }
            "extract" => {
                if orchestrator.trigger_extraction() {
                    println!("Extraction completed.");
                } else {
                    println!("Extraction did not run; too little conversation or the model is unavailable.");
                }
                continue;
            }
            "export" => {
                match orchestrator.record().to_json() {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("Could not export record: {e}"),
                }
                continue;
            }
            _ => {}
        }

        match orchestrator.process_user_input(input) {
            Ok(outcome) => {
                println!("\ndr> {}\n", outcome.reply);
                if outcome.conversation_ended {
                    match outcome.save_outcome {
                        Some(save) if save.success => {
                            println!("Consultation saved (id {}).", save.id.unwrap_or_default());
                        }
                        Some(save) => println!("Consultation not saved: {}", save.message),
                        None => {}
                    }
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                break;
            }
        }
    }
}
