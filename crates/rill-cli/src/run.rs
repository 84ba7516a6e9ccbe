//! Run command: one headless full run, printing the final ordered snapshot.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rill_core::{
    EchoCompiler, Error, PercentParser, RunCallback, RunOutcome, Script, ScriptRunner,
    SessionContext, WidgetState, WidgetStore,
};

struct HeadlessCallbacks {
    retired: tokio::sync::mpsc::UnboundedSender<RunOutcome>,
    errors: Mutex<Vec<String>>,
}

impl RunCallback for HeadlessCallbacks {
    fn on_widget_published(&self, _state: &WidgetState) {}

    fn on_run_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_run_finished(&self, outcome: RunOutcome) {
        let _ = self.retired.send(outcome);
    }
}

/// Execute the script once and print the resulting widget states as JSON.
pub async fn execute(script: &str) -> anyhow::Result<()> {
    let path = Path::new(script);
    if !path.exists() {
        anyhow::bail!("script not found: {script}");
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let callbacks = Arc::new(HeadlessCallbacks {
        retired: tx,
        errors: Mutex::new(Vec::new()),
    });
    let store = Arc::new(WidgetStore::new());
    let session = Arc::new(SessionContext::new(store.clone(), callbacks.clone()));

    let script = Arc::new(Script::from_path(path)?);
    let runner = ScriptRunner::new(
        script,
        Arc::new(PercentParser),
        Arc::new(EchoCompiler),
        session,
    );
    runner.run(None);

    let outcome = rx.recv().await;
    if outcome == Some(RunOutcome::Failed) {
        for error in callbacks.errors.lock().unwrap().iter() {
            eprintln!("error: {error}");
        }
        anyhow::bail!("script run failed");
    }

    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    Ok(())
}
