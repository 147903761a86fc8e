use filedrop_api::setup;
use filedrop_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = setup::initialize_app(config).await?;

    // Cleanup runs beside the server and stops with it
    let cleanup = setup::services::start_cleanup(&state.config, state.storage.clone());

    setup::server::start_server(&state.config, router).await?;

    if let Some(handle) = cleanup {
        handle.abort();
    }

    Ok(())
}
