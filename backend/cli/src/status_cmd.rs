//! `focusmate status`: probe a running server's health endpoint.

use anyhow::Result;

use focusmate_llm::{GatewaySettings, HttpGateway};

pub async fn run(addr: &str) -> Result<()> {
    let url = format!("http://{addr}/api/health");
    let gateway = HttpGateway::new(GatewaySettings::default())?;

    match gateway.probe(&url).await {
        Ok(()) => println!("FocusMate is running at {addr}"),
        Err(e) => println!("FocusMate is not reachable at {addr}: {}", e.user_message()),
    }
    Ok(())
}
