use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use clinic_assist::config::AssistantConfig;
use clinic_assist::llm::{LlmConfig, create_provider};
use clinic_assist::review::CliReviewGate;
use clinic_assist::safety::{Moderator, PiiMasker};
use clinic_assist::server::api_routes;
use clinic_assist::store::{JsonScheduleStore, ScheduleStore};
use clinic_assist::workflow::WorkflowEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AssistantConfig::from_env()?;

    let api_key = config.api_key().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...  (or OPENAI_API_KEY)");
        std::process::exit(1);
    });

    eprintln!("🏥 Clinic Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Data:  {}", config.data_path.display());

    // LLM provider
    let llm_config = LlmConfig {
        backend: config.backend,
        api_key,
        model: config.model.clone(),
    };
    let llm = create_provider(&llm_config)?;

    // Schedule store
    let store = Arc::new(
        JsonScheduleStore::open(&config.data_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open schedule data at {}: {}",
                    config.data_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    // Safety layer: PII masking seeded with the names the store knows about.
    let known_names = store.patient_names().await?;
    let masker = PiiMasker::new(known_names);
    let moderator = Moderator::default_rules();

    let engine = Arc::new(WorkflowEngine::new(llm, store, moderator, masker)
        .with_max_llm_calls(config.max_llm_calls));

    // Optional HTTP front end
    if let Some(port) = config.http_port {
        let app = api_routes(Arc::clone(&engine));
        eprintln!("   API:   http://0.0.0.0:{}/api/requests", port);
        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
                Ok(listener) => {
                    tracing::info!(port, "HTTP API started");
                    axum::serve(listener, app).await.ok();
                }
                Err(e) => {
                    tracing::error!(port, error = %e, "Failed to bind HTTP API port");
                }
            }
        });
    }

    eprintln!();
    eprintln!("   Type a request below. Type 'quit' to exit.");
    eprintln!("   Example requests:");
    eprintln!("     - I need to reschedule appointment APT-1001 to 2026-03-15 at 14:00");
    eprintln!("     - Cancel my appointment APT-1002");
    eprintln!("     - What prep do I need for appointment APT-1001?");
    eprintln!("     - I'm having severe chest pain and difficulty breathing");
    eprintln!();

    let gate = CliReviewGate::new();
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        eprint!("  Patient: ");
        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            eprintln!("\n  Goodbye!\n");
            break;
        }

        match engine.run(input, &gate).await {
            Ok(outcome) => {
                let sep = "═".repeat(60);
                eprintln!("\n{}", sep);
                eprintln!("  Run ID:  {}", outcome.run_id);
                eprintln!("  Status:  {}", outcome.status);
                eprintln!(
                    "  Route:   {}",
                    outcome.route.map(|r| r.label()).unwrap_or("-")
                );
                eprintln!("  Review:  {}", outcome.review_action);
                eprintln!("  LLM:     {} call(s)", outcome.llm_calls);
                eprintln!("  Trace:   {}", outcome.trace_summary());
                eprintln!("{}", sep);
                eprintln!("  Response to patient:\n");
                println!("{}\n", outcome.final_response);
            }
            Err(e) => {
                eprintln!("\n  ✗ Error during run: {}\n", e);
            }
        }
    }

    Ok(())
}
