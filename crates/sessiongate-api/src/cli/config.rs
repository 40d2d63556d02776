//! `sgate config`: show the configuration the server would run with.

use std::path::Path;

use anyhow::Result;
use console::style;

use sessiongate_infra::config::{load_gateway_config, render_gateway_config};

pub async fn show_config(data_dir: &Path, json: bool) -> Result<()> {
    let config = load_gateway_config(data_dir).await;

    if json {
        let out = serde_json::json!({
            "data_dir": data_dir.display().to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} sessiongate v{}",
        style("⚙").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "  {}",
        style(format!("{}", data_dir.join("config.toml").display())).dim()
    );
    println!();
    for line in render_gateway_config(&config)?.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
