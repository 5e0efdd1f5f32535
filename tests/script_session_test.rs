use anyhow::Result;
use httpmock::prelude::*;
use statsimi_client::adapters::script::parse_script;
use statsimi_client::domain::ports::ConfigProvider;
use statsimi_client::utils::validation::Validate;
use statsimi_client::{HttpClassifier, Indicator, MarkerController, TerminalRenderer, TomlConfig};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// 用 TOML 設定檔與指令腳本跑一次完整流程
#[tokio::test]
async fn test_script_session_with_toml_config() -> Result<()> {
    let server = MockServer::start();
    let hbf = server.mock(|when, then| {
        when.method(GET)
            .path("/api")
            .query_param("name1", "Freiburg Hbf")
            .query_param("name2", "Freiburg Hauptbahnhof");
        then.status(200).json_body(serde_json::json!({"res": 0.97}));
    });
    let other = server.mock(|when, then| {
        when.method(GET)
            .path("/api")
            .query_param("name1", "Freiburg Hbf")
            .query_param("name2", "Hauptbahnhof");
        then.status(200).json_body(serde_json::json!({"res": 0.2}));
    });

    let mut config_file = NamedTempFile::new()?;
    write!(
        config_file,
        r#"
[service]
endpoint = "{}"
timeout_seconds = 5

[map]
center = [47.99770, 7.84120]
zoom = 17
default_label = "Hbf Freiburg"

[[stations]]
latitude = 47.99770
longitude = 7.84120
label = "Freiburg Hbf"
"#,
        server.url("/api")
    )?;

    let config = TomlConfig::from_file(config_file.path())?;
    config.validate()?;

    let classifier = Arc::new(HttpClassifier::from_config(&config)?);
    let mut controller =
        MarkerController::from_config(&config, classifier, TerminalRenderer::new(Vec::new()));
    controller.seed(&config.initial_stations())?;

    let commands = parse_script(
        r#"
# second station from a map click, labeled with the configured default
click 47.99780 7.84135
wait
label 2 Freiburg Hauptbahnhof
wait
drag 2
move 2 47.99790 7.84140
label 2 Hauptbahnhof
wait
status
"#,
    )?;

    let mut snapshots = Vec::new();
    for command in commands {
        if let Some(snapshot) = command.run(&mut controller).await? {
            snapshots.push(snapshot);
        }
    }

    // 點擊產生的預設標籤請求沒有對應的 mock，伺服器回 404，指示器維持原狀
    hbf.assert_hits(1);
    other.assert_hits(1);
    assert_eq!(controller.indicator(), Indicator::NotSimilar);

    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0]["indicator"], "not_similar");
    assert_eq!(snapshots[0]["slots"][1]["label"], "Hauptbahnhof");
    assert_eq!(snapshots[0]["slots"][1]["dragging"], true);

    let output = String::from_utf8(controller.renderer().get_ref().clone())?;
    assert!(output.starts_with("map centred on 47.99770, 7.84120 at zoom 17\n"));
    assert!(output.contains("[pop1] + \"Freiburg Hbf\" at 47.99770, 7.84120"));
    assert!(output.contains("[pop2] + \"Hbf Freiburg\" at 47.99780, 7.84135"));
    assert!(output.contains("[pop2] > 47.99790, 7.84140"));
    assert!(output.contains("indicator: Similar (simi)"));
    assert!(output.ends_with("indicator: Not similar (notsimi)\n"));

    Ok(())
}

#[tokio::test]
async fn test_third_click_is_ignored() -> Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/api");
        then.status(200).json_body(serde_json::json!({"res": 0.4}));
    });

    let classifier = Arc::new(HttpClassifier::new(server.url("/api"))?);
    let mut controller = MarkerController::new(
        classifier,
        TerminalRenderer::new(Vec::new()),
        Default::default(),
    );

    let commands = parse_script("click 48.0 7.8\nclick 48.001 7.801\nclick 48.002 7.802\nwait\n")?;
    for command in commands {
        command.run(&mut controller).await?;
    }

    api_mock.assert_hits(1);
    assert_eq!(controller.state().marker_count(), 2);
    assert_eq!(controller.indicator(), Indicator::NotSimilar);
    Ok(())
}
