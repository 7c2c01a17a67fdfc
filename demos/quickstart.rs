use std::sync::Arc;

use dataset_session::context::AnalysisKind;
use dataset_session::error::ApiError;
use dataset_session::upload::{UploadedFile, ADS_FIELD, SALES_FIELD};
use dataset_session::{
    ReasoningService, SessionBackendConfig, SessionResult, Workspace, WorkspaceConfig,
};
use tracing_subscriber::EnvFilter;

const ADS: &str = "date,campaign,spend,clicks,purchases\n\
2024-03-01,spring-sale,120.50,340,12\n\
2024-03-01,retargeting,45.00,88,6\n\
2024-03-02,spring-sale,131.20,362,\n\
2024-03-02,retargeting,47.80,91,7\n";

const SALES: &str = "order_id,date,product,total\n\
1001,2024-03-01,running shoes,89.99\n\
1002,2024-03-01,socks,12.50\n\
1003,2024-03-02,running shoes,89.99\n";

#[cfg(feature = "anthropic")]
fn reasoner() -> Arc<dyn ReasoningService> {
    use dataset_session::anthropic::{AnthropicClient, AnthropicConfig};

    let Some(config) = AnthropicConfig::from_env() else {
        println!("ANTHROPIC_API_KEY not set; using the offline stub");
        return offline();
    };
    match AnthropicClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            println!("Anthropic client unavailable ({err}); using the offline stub");
            offline()
        }
    }
}

#[cfg(not(feature = "anthropic"))]
fn reasoner() -> Arc<dyn ReasoningService> {
    offline()
}

fn offline() -> Arc<dyn ReasoningService> {
    Arc::new(|prompt: &str, max_tokens: u32, _temperature: f32| {
        Ok::<_, ApiError>(format!(
            "(offline) received {} prompt characters, budget {max_tokens} tokens",
            prompt.chars().count()
        ))
    })
}

fn run_demo() -> SessionResult<()> {
    println!("== Dataset session demo ==");
    let config = WorkspaceConfig {
        backend: SessionBackendConfig::InMemory,
        ..WorkspaceConfig::from_env()?
    };
    let workspace = Workspace::from_config(config, reasoner())?;

    let ads = UploadedFile::new(ADS_FIELD, "meta_ads.csv", ADS.as_bytes().to_vec());
    let sales = UploadedFile::new(SALES_FIELD, "sales.csv", SALES.as_bytes().to_vec());
    let outcome = workspace.upload(None, Some(&ads), Some(&sales))?;
    let session = outcome.session.to_string();
    println!(
        "Session {session}: {} ad rows, {} sales rows",
        outcome.ads.rows, outcome.sales.rows
    );

    let summary = workspace.data_summary(Some(&session))?;
    println!("Ad columns: {}", summary.ads.column_names.join(", "));

    let answer = workspace.ask(
        Some(&session),
        "Which campaign has the lowest cost per purchase?",
    )?;
    println!("Answer: {}", answer.text);

    let analysis = workspace.analyze(Some(&session), AnalysisKind::PerformanceSummary)?;
    println!("{} analysis: {}", analysis.kind, analysis.text);

    workspace.clear(Some(&session))?;
    println!("Session cleared");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run_demo() {
        eprintln!("demo failed: {}", err.client_message());
        std::process::exit(1);
    }
}
