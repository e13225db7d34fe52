pub mod server;

use crate::custodia::ServerConfig;
use anyhow::Result;

pub enum Action {
    Server(ServerConfig),
}

impl Action {
    /// Run the selected action to completion.
    ///
    /// # Errors
    /// Returns whatever the action fails with.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Server(config) => server::execute(config).await,
        }
    }
}
