//! Serve command: register scripts and start the WebSocket server.

use std::path::Path;
use std::sync::Arc;

use rill_core::{EchoCompiler, PercentParser, ScriptRegistry};
use rill_server::ServerConfig;

use crate::demo;

/// Start the server. Files are registered under their stem; with no
/// scripts, or with `--demo`, the built-in demo script is registered.
pub async fn execute(
    scripts: &[String],
    host: &str,
    port: u16,
    include_demo: bool,
) -> anyhow::Result<()> {
    let registry = Arc::new(ScriptRegistry::new(
        Arc::new(PercentParser),
        Arc::new(EchoCompiler),
    ));

    for script in scripts {
        let path = Path::new(script);
        if !path.exists() {
            anyhow::bail!("script not found: {script}");
        }
        registry.register(path)?;
    }
    if include_demo || scripts.is_empty() {
        registry.add(demo::script());
    }

    let config = ServerConfig {
        host: host.to_string(),
        port,
    };

    println!("rill server - reactive scripts");
    println!("  ws://{}:{}/ws/<script>", config.host, config.port);
    for name in registry.names() {
        println!("    - {name}");
    }
    println!("Press Ctrl+C to stop");

    rill_server::serve(registry, config).await?;
    Ok(())
}
