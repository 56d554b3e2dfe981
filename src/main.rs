use anyhow::Context;
use provision_kernel::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load provisioning settings")?;

    provision_telemetry::init(&settings.telemetry)
        .with_context(|| "failed to initialize telemetry")?;

    tracing::info!(
        env = ?settings.environment,
        mongo = %settings.mongo.redacted_uri(),
        "provisioning application user"
    );

    let outcome = provision_app::provision(&settings).await?;
    println!("{outcome}");

    Ok(())
}
