//! Rock Blast - command-line entry point

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rockblast::api::{self, AppContext, CommandResult, PredictInput};
use rockblast::constants::{APP_NAME, APP_VERSION};
use rockblast::logic::config::ClientConfig;
use rockblast::logic::export::{ExportFormat, ExportScope};
use rockblast::logic::settings::AccountUpdate;

#[derive(Parser)]
#[command(name = "rockblast", version, about = "Rock blast prediction client")]
struct Cli {
    /// Prediction backend URL
    #[arg(long, global = true, env = "ROCKBLAST_API_URL")]
    api_url: Option<String>,

    /// Directory holding the local store
    #[arg(long, global = true, env = "ROCKBLAST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Signin {
        email: String,
        #[arg(long, env = "ROCKBLAST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        username: String,
        email: String,
        #[arg(long, env = "ROCKBLAST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the local session
    Logout,
    /// Show the signed-in user's profile
    Profile,
    /// Submit blast parameters for prediction
    Predict(PredictArgs),
    /// Show one prediction
    Show { id: String },
    /// Change input fields and recalculate
    Edit {
        id: String,
        /// `field=value` pairs, e.g. "Burden (m)=3.5"
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Delete a prediction
    Delete { id: String },
    /// List recently created or viewed predictions
    Recents {
        /// Reconcile with the server history first
        #[arg(long)]
        sync: bool,
    },
    /// List all predictions stored on the server
    History,
    /// Export a prediction to a file
    Export {
        id: String,
        /// inputs, results or prediction
        #[arg(long, default_value = "prediction")]
        scope: String,
        /// json, csv or excel; defaults to the saved preference
        #[arg(long)]
        format: Option<String>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Display and export preferences
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Account management
    #[command(subcommand)]
    Account(AccountCommand),
}

#[derive(Args)]
struct PredictArgs {
    /// JSON file with blast parameters
    #[arg(long)]
    params: Option<PathBuf>,
    /// `field=value` overrides
    #[arg(long = "set")]
    overrides: Vec<String>,
    /// Custom prediction id instead of a generated one
    #[arg(long)]
    id: Option<String>,
    /// Start from the reference scenario
    #[arg(long)]
    sample: bool,
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    /// Change settings, e.g. `theme=dark language=fr`
    Set {
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Push the local copy to the server
    Save,
}

#[derive(Subcommand)]
enum AccountCommand {
    Update {
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        current_password: String,
        #[arg(long, default_value = "")]
        new_password: String,
        #[arg(long, default_value = "")]
        confirm_password: String,
    },
    /// Download all account data as JSON
    ExportData {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    LogoutAll,
    Delete {
        /// Required, the account cannot be restored
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("{} v{}", APP_NAME, APP_VERSION);

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(run(config, cli.command)) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(notice) => {
            if notice.sign_in_required {
                log::warn!("Run `rockblast signin <email>` to start a new session");
            }
            Err(notice.into())
        }
    }
}

async fn run(config: ClientConfig, command: Command) -> CommandResult {
    let ctx = AppContext::open(config)?;

    match command {
        Command::Signin { email, password } => api::signin(&ctx, &email, &password).await,
        Command::Signup { username, email, password } => api::signup(&ctx, &username, &email, &password).await,
        Command::Logout => api::logout(&ctx),
        Command::Profile => api::profile(&ctx).await,
        Command::Predict(args) => {
            let input = PredictInput {
                params_file: args.params,
                overrides: args.overrides,
                custom_id: args.id,
                sample: args.sample,
            };
            api::predict(&ctx, input).await
        }
        Command::Show { id } => api::show(&ctx, &id).await,
        Command::Edit { id, fields } => api::edit(&ctx, &id, &fields).await,
        Command::Delete { id } => api::delete(&ctx, &id).await,
        Command::Recents { sync } => api::recents(&ctx, sync).await,
        Command::History => api::history(&ctx).await,
        Command::Export { id, scope, format, out } => {
            let scope: ExportScope = scope.parse()?;
            let format = format.map(|f| f.parse::<ExportFormat>()).transpose()?;
            api::export(&ctx, &id, scope, format, &out).await
        }
        Command::Settings(SettingsCommand::Show) => api::settings_show(&ctx).await,
        Command::Settings(SettingsCommand::Set { assignments }) => api::settings_set(&ctx, &assignments).await,
        Command::Settings(SettingsCommand::Save) => api::settings_save(&ctx).await,
        Command::Account(AccountCommand::Update {
            name,
            email,
            current_password,
            new_password,
            confirm_password,
        }) => {
            let update = AccountUpdate {
                name,
                email,
                old_password: current_password,
                new_password,
                confirm_password,
            };
            api::account_update(&ctx, update).await
        }
        Command::Account(AccountCommand::ExportData { out }) => api::account_export_data(&ctx, &out).await,
        Command::Account(AccountCommand::LogoutAll) => api::account_logout_all(&ctx).await,
        Command::Account(AccountCommand::Delete { yes }) => {
            if !yes {
                return Err(api::Notice::new(
                    "Confirmation Required",
                    "Pass --yes to permanently delete the account",
                ));
            }
            api::account_delete(&ctx).await
        }
    }
}
