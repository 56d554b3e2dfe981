use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use provision_kernel::Settings;

/// Exit status of `check` when the user does not exist. Errors exit with 1.
const ABSENT_EXIT_CODE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "provision-cli", version, about = "Provision the application database user")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the application user unless it already exists.
    Ensure(TargetArgs),
    /// Report whether the application user exists. Exits 2 when it does not.
    Check(TargetArgs),
    /// Print the resolved target without connecting.
    Config {
        /// Emit JSON instead of plain lines.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Overrides applied on top of the loaded settings.
#[derive(Debug, Args)]
struct TargetArgs {
    /// Database the user is created in.
    #[arg(long)]
    database: Option<String>,
    /// Name of the application user.
    #[arg(long)]
    user: Option<String>,
    /// Password for a newly created user.
    #[arg(long)]
    password: Option<String>,
    /// Full connection string; replaces the host/port settings.
    #[arg(long)]
    uri: Option<String>,
}

impl TargetArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(database) = self.database {
            settings.app_user.database = database;
        }
        if let Some(user) = self.user {
            settings.app_user.name = user;
        }
        if let Some(password) = self.password {
            settings.app_user.password = password;
        }
        if let Some(uri) = self.uri {
            settings.mongo.uri = Some(uri);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load provisioning settings")?;

    provision_telemetry::init(&settings.telemetry)
        .with_context(|| "failed to initialize telemetry")?;

    match cli.command {
        Command::Ensure(target) => {
            target.apply(&mut settings);
            let outcome = provision_app::provision(&settings).await?;
            println!("{outcome}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Check(target) => {
            target.apply(&mut settings);
            check(&settings).await
        }
        Command::Config { json, target } => {
            target.apply(&mut settings);
            print_config(&settings, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn check(settings: &Settings) -> anyhow::Result<ExitCode> {
    let spec = settings
        .app_user
        .user_spec()
        .with_context(|| "invalid application user settings")?;

    let db = provision_db::connect(&settings.mongo, spec.database_name())
        .await
        .with_context(|| format!("failed to connect to {}", settings.mongo.redacted_uri()))?;

    let found = provision_app::check_user(&db, &spec)
        .await
        .with_context(|| format!("failed to look up user {}", spec.target()))?;

    match found {
        Some(info) => {
            tracing::debug!(roles = ?info.roles, "user found");
            println!("User {} exists", spec.target());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("User {} not found", spec.target());
            Ok(ExitCode::from(ABSENT_EXIT_CODE))
        }
    }
}

fn print_config(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let spec = settings
        .app_user
        .user_spec()
        .with_context(|| "invalid application user settings")?;

    let roles: Vec<String> = spec.roles().iter().map(ToString::to_string).collect();

    if json {
        let rendered = serde_json::json!({
            "environment": settings.environment.as_str(),
            "target": spec.target(),
            "roles": roles,
            "mongo": settings.mongo.redacted_uri(),
        });
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        println!("environment: {}", settings.environment.as_str());
        println!("target: {}", spec.target());
        println!("roles: {}", roles.join(", "));
        println!("mongo: {}", settings.mongo.redacted_uri());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn absent_exit_code_differs_from_error_exit() {
        // `main` returning `Err` exits with 1.
        assert_ne!(ABSENT_EXIT_CODE, 1);
        assert_ne!(ABSENT_EXIT_CODE, 0);
    }

    #[test]
    fn overrides_replace_settings() {
        let cli = Cli::parse_from([
            "provision-cli",
            "ensure",
            "--database",
            "inventory",
            "--user",
            "svc",
            "--uri",
            "mongodb://root:pw@db:27017/",
        ]);
        let Command::Ensure(target) = cli.command else {
            panic!("expected ensure");
        };

        let mut settings = Settings::default();
        target.apply(&mut settings);

        assert_eq!(settings.app_user.database, "inventory");
        assert_eq!(settings.app_user.name, "svc");
        assert_eq!(settings.app_user.password, "verystrongpassword");
        assert_eq!(
            settings.mongo.redacted_uri(),
            "mongodb://root:****@db:27017/"
        );
    }
}
