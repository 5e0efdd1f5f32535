use anyhow::Context;
use clap::Parser;
use statsimi_client::adapters::script::{self, Command};
use statsimi_client::domain::ports::{ConfigProvider, MarkerRenderer};
use statsimi_client::utils::error::ErrorCategory;
use statsimi_client::utils::{logger, validation::Validate};
use statsimi_client::{
    CliConfig, ClientError, HttpClassifier, MarkerController, TerminalRenderer, TomlConfig,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting statsimi-client");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let provider: Box<dyn ConfigProvider> = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            let mut config = TomlConfig::from_file(path)
                .with_context(|| format!("failed to load config file '{}'", path))?;
            config.apply_cli_overrides(&cli);
            exit_on_invalid(config.validate());
            Box::new(config)
        }
        None => {
            exit_on_invalid(cli.validate());
            Box::new(cli.clone())
        }
    };

    tracing::info!("🔗 Classifier endpoint: {}", provider.api_endpoint());

    let classifier = Arc::new(HttpClassifier::from_config(provider.as_ref())?);
    let mut controller =
        MarkerController::from_config(provider.as_ref(), classifier, TerminalRenderer::stdout());

    controller.seed(&provider.initial_stations())?;

    match &cli.script {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read script '{}'", path))?;
            let commands = match script::parse_script(&content) {
                Ok(commands) => commands,
                Err(e) => {
                    eprintln!("❌ {}: {}", path, e);
                    std::process::exit(1);
                }
            };
            tracing::info!("Running {} commands from {}", commands.len(), path);
            for command in commands {
                run_command(&mut controller, command).await;
            }
        }
        None => run_interactive(&mut controller).await?,
    }

    controller.settle().await;
    print_status(&controller);
    tracing::info!(
        "✅ Done, {} classification requests sent",
        controller.requests_sent()
    );

    Ok(())
}

/// Reads commands from stdin and applies answers as soon as they arrive.
async fn run_interactive<R: MarkerRenderer>(
    controller: &mut MarkerController<R>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0;

    loop {
        let pending = controller.pending() > 0;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                line_no += 1;
                match script::parse_line(line_no, &line) {
                    Ok(Some(command)) => run_command(controller, command).await,
                    Ok(None) => {}
                    Err(e) => eprintln!("❌ {}", e),
                }
            }
            _ = controller.next_completion(), if pending => {}
        }
    }

    Ok(())
}

async fn run_command<R: MarkerRenderer>(controller: &mut MarkerController<R>, command: Command) {
    match command.run(controller).await {
        Ok(Some(snapshot)) => match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => tracing::error!("Failed to format status: {}", e),
        },
        Ok(None) => {}
        Err(e) => {
            tracing::error!("❌ {}", e);
            tracing::info!("💡 Suggestion: {}", e.recovery_suggestion());
        }
    }
}

fn print_status<R: MarkerRenderer>(controller: &MarkerController<R>) {
    let indicator = controller.indicator();
    let text = match indicator.text() {
        "" => "-",
        text => text,
    };
    println!("final indicator: {}", text);
}

fn exit_on_invalid(result: statsimi_client::Result<()>) {
    if let Err(e) = result {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &ClientError) -> i32 {
    match error.category() {
        ErrorCategory::Configuration | ErrorCategory::Input => 1,
        ErrorCategory::Network | ErrorCategory::Service => 2,
        ErrorCategory::System => 3,
    }
}
