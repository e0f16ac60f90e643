pub mod server;

// The match over `Action` lives in its own module; `mod.rs` only declares
// the variants.
mod run;

/// Everything the `sesamo` binary can be asked to do. Serving the auth API
/// is the only action today.
#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
