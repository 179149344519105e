//! Command handlers
//!
//! Each handler runs one user action against the services and returns the
//! text to print. Failures come back as a `Notice`.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::notice::Notice;
use crate::logic::config::ClientConfig;
use crate::logic::export::{self, writers::cell_text, ExportFormat, ExportScope};
use crate::logic::gateway::ApiClient;
use crate::logic::prediction::{BlastParameters, PredictionLookup, PredictionRecord, PredictionService, RecentsSync};
use crate::logic::recents::{RecentPredictionEntry, RecentsCache};
use crate::logic::session::{Session, User};
use crate::logic::settings::{language_name, AccountService, AccountUpdate, SettingsSource, SettingsSync, UserSettings};
use crate::logic::storage::LocalStore;

pub type CommandResult<T = String> = Result<T, Notice>;

/// Services wired over one local store
pub struct AppContext {
    pub config: ClientConfig,
    pub store: Arc<LocalStore>,
    pub session: Arc<Session>,
    pub api: Arc<ApiClient>,
    pub predictions: PredictionService,
    pub accounts: AccountService,
}

impl AppContext {
    /// Open the store under the configured data directory
    pub fn open(config: ClientConfig) -> CommandResult<Self> {
        let store = Arc::new(LocalStore::open(config.store_path())?);
        Self::with_store(config, store)
    }

    pub fn with_store(config: ClientConfig, store: Arc<LocalStore>) -> CommandResult<Self> {
        let session = Arc::new(Session::restore(store.clone()));
        let api = Arc::new(ApiClient::new(&config, session.clone())?);
        let recents = Arc::new(RecentsCache::new(store.clone()));

        Ok(Self {
            predictions: PredictionService::new(api.clone(), recents),
            accounts: AccountService::new(api.clone()),
            config,
            store,
            session,
            api,
        })
    }

    pub fn settings(&self) -> SettingsSync {
        SettingsSync::new(self.api.clone(), self.store.clone())
    }

    fn require_session(&self) -> CommandResult<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(Notice::authentication_required())
        }
    }
}

// ============================================================================
// ACCOUNT
// ============================================================================

pub async fn signin(ctx: &AppContext, email: &str, password: &str) -> CommandResult {
    let user = ctx.accounts.signin(email, password).await?;
    settings_after_signin(ctx).await;
    Ok(format!("Signed in as {} <{}>", user.username, user.email))
}

pub async fn signup(ctx: &AppContext, username: &str, email: &str, password: &str) -> CommandResult {
    let user = ctx.accounts.signup(username, email, password).await?;
    settings_after_signin(ctx).await;
    Ok(format!("Account created, signed in as {}", user.username))
}

pub fn logout(ctx: &AppContext) -> CommandResult {
    ctx.accounts.logout()?;
    Ok("Logged out".to_string())
}

pub async fn profile(ctx: &AppContext) -> CommandResult {
    ctx.require_session()?;
    let user = ctx.accounts.profile().await?;
    if let Err(e) = ctx.session.set_user(user.clone()) {
        log::warn!("Failed to cache profile: {}", e);
    }
    Ok(render_user(&user))
}

pub async fn account_update(ctx: &AppContext, update: AccountUpdate) -> CommandResult {
    ctx.require_session()?;
    ctx.accounts.update_account(&update).await?;
    Ok("Account updated".to_string())
}

pub async fn account_export_data(ctx: &AppContext, dir: &Path) -> CommandResult {
    ctx.require_session()?;
    let path = ctx.accounts.export_user_data(dir).await?;
    Ok(format!("User data saved to {}", path.display()))
}

pub async fn account_logout_all(ctx: &AppContext) -> CommandResult {
    ctx.require_session()?;
    ctx.accounts.logout_all_devices().await?;
    Ok("Logged out from all devices".to_string())
}

pub async fn account_delete(ctx: &AppContext) -> CommandResult {
    ctx.require_session()?;
    ctx.accounts.delete_account().await?;
    Ok("Account deleted".to_string())
}

/// Settings are loaded once per session start
async fn settings_after_signin(ctx: &AppContext) {
    let mut settings = ctx.settings();
    let source = settings.start_session().await;
    log::debug!("Settings after sign-in came from {:?}", source);
}

// ============================================================================
// PREDICTIONS
// ============================================================================

/// Parameters for a new prediction: an optional JSON file plus overrides
#[derive(Debug, Clone, Default)]
pub struct PredictInput {
    pub params_file: Option<PathBuf>,
    pub overrides: Vec<String>,
    pub custom_id: Option<String>,
    pub sample: bool,
}

pub async fn predict(ctx: &AppContext, input: PredictInput) -> CommandResult {
    ctx.require_session()?;

    if input.sample && input.params_file.is_none() && input.overrides.is_empty() && input.custom_id.is_none() {
        let lookup = ctx.predictions.predict_default().await?;
        return Ok(render_lookup(&lookup));
    }

    let params = build_parameters(&input)?;
    let lookup = ctx
        .predictions
        .predict(params, input.custom_id.as_deref())
        .await?;

    Ok(format!("Calculation complete\n\n{}", render_lookup(&lookup)))
}

pub async fn show(ctx: &AppContext, id: &str) -> CommandResult {
    ctx.require_session()?;
    let lookup = ctx.predictions.fetch(id).await?;
    Ok(render_lookup(&lookup))
}

pub async fn edit(ctx: &AppContext, id: &str, assignments: &[String]) -> CommandResult {
    ctx.require_session()?;

    let mut fields = Map::new();
    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        fields.insert(key, value);
    }

    let lookup = ctx.predictions.update(id, fields).await?;
    Ok(format!("Prediction updated\n\n{}", render_lookup(&lookup)))
}

pub async fn delete(ctx: &AppContext, id: &str) -> CommandResult {
    ctx.require_session()?;
    ctx.predictions.delete(id).await?;
    Ok(format!("Prediction {} deleted", id.trim()))
}

pub async fn recents(ctx: &AppContext, sync: bool) -> CommandResult {
    if sync {
        ctx.require_session()?;
        match ctx.predictions.sync_recents().await {
            RecentsSync::Replaced(count) => log::info!("Recents replaced with {} server entries", count),
            RecentsSync::KeptLocal => log::info!("Showing locally cached recents"),
        }
    }

    let entries = ctx.predictions.recents().list();
    if entries.is_empty() {
        return Ok("No recent predictions".to_string());
    }
    Ok(entries.iter().map(render_recent).collect::<Vec<_>>().join("\n"))
}

pub async fn history(ctx: &AppContext) -> CommandResult {
    ctx.require_session()?;
    let records = ctx.predictions.history().await?;
    if records.is_empty() {
        return Ok("No predictions yet".to_string());
    }

    Ok(records
        .iter()
        .map(|record| {
            format!(
                "{:<38} {:<12} {} outputs",
                record.id,
                record.rock_type().unwrap_or("-"),
                record.predictions.values().map(|m| m.len()).sum::<usize>()
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Export one record; the format falls back to the saved preference
pub async fn export(
    ctx: &AppContext,
    id: &str,
    scope: ExportScope,
    format: Option<ExportFormat>,
    dir: &Path,
) -> CommandResult {
    ctx.require_session()?;

    let format = match format {
        Some(format) => format,
        None => {
            let mut settings = ctx.settings();
            settings.load().await;
            settings.settings().export_format()
        }
    };

    let record = ctx.predictions.fetch(id).await?.into_record();
    let path = export::write_to_dir(&record, format, scope, dir)?;
    Ok(format!("Exported {} to {}", scope.label(), path.display()))
}

// ============================================================================
// SETTINGS
// ============================================================================

pub async fn settings_show(ctx: &AppContext) -> CommandResult {
    let mut settings = ctx.settings();
    let source = settings.load().await;
    let note = match source {
        SettingsSource::Server => "",
        SettingsSource::LocalCopy => " (local copy)",
        SettingsSource::Defaults => " (defaults)",
    };
    Ok(format!("Settings{}\n{}", note, render_settings(settings.settings())))
}

/// Apply `key=value` changes and save them
pub async fn settings_set(ctx: &AppContext, assignments: &[String]) -> CommandResult {
    ctx.require_session()?;

    let mut settings = ctx.settings();
    settings.load().await;
    for assignment in assignments {
        let (key, value) = split_assignment(assignment)?;
        settings.set(key, value)?;
    }

    if !settings.is_dirty() {
        return Ok("No changes".to_string());
    }

    settings.save().await?;
    let language = settings.settings().language.clone();
    Ok(format!(
        "Settings saved\n{}\nLanguage: {}",
        render_settings(settings.settings()),
        language_name(&language)
    ))
}

/// Push the local copy to the server
pub async fn settings_save(ctx: &AppContext) -> CommandResult {
    ctx.require_session()?;
    let mut settings = ctx.settings();
    if settings.load_local() == SettingsSource::Defaults {
        return Err(Notice::new("Nothing To Save", "No local settings to save"));
    }
    settings.save().await?;
    Ok("Settings saved".to_string())
}

// ============================================================================
// HELPERS
// ============================================================================

fn build_parameters(input: &PredictInput) -> CommandResult<BlastParameters> {
    let mut fields = match &input.params_file {
        Some(path) => read_params_file(path)?,
        None if input.sample => match serde_json::to_value(BlastParameters::sample()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };

    for assignment in &input.overrides {
        let (key, value) = parse_assignment(assignment)?;
        fields.insert(key, value);
    }

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| Notice::new("Invalid Input", format!("Invalid blast parameters: {}", e)))
}

fn read_params_file(path: &Path) -> CommandResult<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Notice::new("Invalid Input", format!("Cannot read {}: {}", path.display(), e)))?;
    match serde_json::from_str(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Notice::new("Invalid Input", format!("{} must hold a JSON object", path.display()))),
        Err(e) => Err(Notice::new("Invalid Input", format!("{}: {}", path.display(), e))),
    }
}

fn split_assignment(assignment: &str) -> CommandResult<(&str, &str)> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(Notice::new(
            "Invalid Input",
            format!("Expected key=value, got '{}'", assignment),
        )),
    }
}

/// `key=value`; numeric values are sent as numbers
pub fn parse_assignment(assignment: &str) -> CommandResult<(String, Value)> {
    let (key, raw) = split_assignment(assignment)?;
    let value = match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

pub fn render_lookup(lookup: &PredictionLookup) -> String {
    match lookup {
        PredictionLookup::Found(record) => render_record(record),
        PredictionLookup::NoPredictionData { id, input_data } => {
            let mut lines = vec![format!("No prediction data found for {}", id)];
            if !input_data.is_empty() {
                lines.push(String::new());
                lines.push("Input parameters:".to_string());
                lines.extend(
                    input_data
                        .iter()
                        .filter(|(key, _)| key.as_str() != "id")
                        .map(|(key, value)| format!("  {:<32} {}", key, cell_text(value))),
                );
            }
            lines.join("\n")
        }
    }
}

fn render_record(record: &PredictionRecord) -> String {
    let mut lines = vec![format!("Prediction {}", record.id)];

    lines.push(String::new());
    lines.push("Input parameters:".to_string());
    for (key, value) in record.display_inputs() {
        lines.push(format!("  {:<32} {}", key, cell_text(value)));
    }

    lines.push(String::new());
    lines.push("Predictions:".to_string());
    for (metric, models) in &record.predictions {
        lines.push(format!("  {}", metric));
        for (model, value) in models {
            lines.push(format!("    {:<16} {:.2}", model, value));
        }
    }

    lines.join("\n")
}

fn render_recent(entry: &RecentPredictionEntry) -> String {
    format!(
        "{:<38} {:<12} {}{}",
        entry.id,
        if entry.rock_type.is_empty() { "-" } else { entry.rock_type.as_str() },
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        if entry.custom_id { "  (custom id)" } else { "" }
    )
}

fn render_user(user: &User) -> String {
    let mut lines = vec![
        format!("Username: {}", user.username),
        format!("Email:    {}", user.email),
    ];
    let name = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !name.is_empty() {
        lines.push(format!("Name:     {}", name));
    }
    if let Some(bio) = &user.bio {
        lines.push(format!("Bio:      {}", bio));
    }
    lines.join("\n")
}

fn render_settings(settings: &UserSettings) -> String {
    [
        ("emailNotifications", settings.email_notifications.to_string()),
        ("pushNotifications", settings.push_notifications.to_string()),
        ("language", settings.language.clone()),
        ("theme", settings.theme.clone()),
        ("dataExportFormat", settings.data_export_format.clone()),
        ("dataRetention", settings.data_retention.clone()),
        ("autoSave", settings.auto_save.to_string()),
    ]
    .iter()
    .map(|(key, value)| format!("  {:<20} {}", key, value))
    .collect::<Vec<_>>()
    .join("\n")
}
