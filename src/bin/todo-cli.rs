use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use todo_service::http::TracedClient;
use todo_service::lifecycle::Shutdown;
use todo_service::telemetry::{
    AlwaysOn, Attributes, Baggage, LogExporter, Telemetry, TelemetrySink,
};

#[derive(Parser)]
#[command(name = "todo-cli")]
#[command(about = "Client CLI for the todo service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "dev-token")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List todos
    List,
    /// Create a todo
    Create {
        name: String,
        #[arg(long)]
        reminder_ms: Option<u64>,
    },
    /// Mark a todo completed
    Complete { id: String },
    /// Delete a todo
    Delete { id: String },
    /// Check service health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Every CLI invocation is its own trace; the service joins it through
    // the injected headers.
    let sink = TelemetrySink::new(256, 64);
    let sink_shutdown = Shutdown::new();
    let sink_worker = tokio::spawn(
        sink.clone()
            .run(Box::new(LogExporter), sink_shutdown.subscribe()),
    );
    let telemetry = Telemetry::new(
        "todo-cli",
        Attributes::new(),
        Arc::new(AlwaysOn),
        sink.clone(),
    );
    let client = TracedClient::new(telemetry);
    let baggage = Baggage::new().with("client.name", "todo-cli");

    match cli.command {
        Commands::List => {
            let res = client
                .send(
                    "GET /todos",
                    None,
                    &baggage,
                    client
                        .http()
                        .get(format!("{}/todos", cli.url))
                        .bearer_auth(&cli.token),
                )
                .await?;
            print_response(res).await?;
        }
        Commands::Create { name, reminder_ms } => {
            let mut body = json!({ "name": name });
            if let Some(reminder_ms) = reminder_ms {
                body["reminder_date_ms"] = json!(reminder_ms);
            }
            let res = client
                .send(
                    "POST /todos",
                    None,
                    &baggage,
                    client
                        .http()
                        .post(format!("{}/todos", cli.url))
                        .bearer_auth(&cli.token)
                        .json(&body),
                )
                .await?;
            print_response(res).await?;
        }
        Commands::Complete { id } => {
            let res = client
                .send(
                    "PUT /todos/{id}",
                    None,
                    &baggage,
                    client
                        .http()
                        .put(format!("{}/todos/{}", cli.url, id))
                        .bearer_auth(&cli.token)
                        .json(&json!({ "completed": true })),
                )
                .await?;
            print_response(res).await?;
        }
        Commands::Delete { id } => {
            let res = client
                .send(
                    "DELETE /todos/{id}",
                    None,
                    &baggage,
                    client
                        .http()
                        .delete(format!("{}/todos/{}", cli.url, id))
                        .bearer_auth(&cli.token),
                )
                .await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client
                .send(
                    "GET /health",
                    None,
                    &baggage,
                    client.http().get(format!("{}/health", cli.url)),
                )
                .await?;
            print_response(res).await?;
        }
    }

    sink_shutdown.trigger();
    let _ = sink_worker.await;
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
