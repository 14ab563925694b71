use std::env;

/// Application settings.
///
/// Read once at startup from the environment (the binary loads `.env` first
/// via dotenv). Connector toggles gate provisioning at fan-out time - a
/// disabled connector simply never appears in the registry.
#[derive(Clone, Debug)]
pub struct Settings {
  /// Human name reported by `GET /`
  pub app_name: String,
  /// Verbose logging
  pub debug: bool,
  /// Crate version reported by `GET /`
  pub version: String,
  /// Provision AzureAD accounts & group memberships
  pub azure_ad_enabled: bool,
  /// Provision GitHub accounts & team memberships
  pub github_enabled: bool,
  /// Provision Slack accounts & channel memberships
  pub slack_enabled: bool,
  /// Reserved - no Jira adapter exists yet
  pub jira_enabled: bool,
  /// Departments with a birthright policy entry
  pub birthright_departments: Vec<String>,
}

impl Default for Settings {
  fn default() -> Self {
    Self { app_name: "idgov".to_string(),
           debug: true,
           version: env!("CARGO_PKG_VERSION").to_string(),
           azure_ad_enabled: true,
           github_enabled: true,
           slack_enabled: true,
           jira_enabled: true,
           birthright_departments: vec!["Engineering".to_string(),
                                        "Sales".to_string(),
                                        "Marketing".to_string(),
                                        "HR".to_string()] }
  }
}

impl Settings {
  /// Read settings from the environment, falling back to defaults.
  pub fn from_env() -> Self {
    let defaults = Self::default();

    Self { app_name: defaults.app_name,
           version: defaults.version,
           debug: env_bool("DEBUG", defaults.debug),
           azure_ad_enabled: env_bool("AZURE_AD_ENABLED", defaults.azure_ad_enabled),
           github_enabled: env_bool("GITHUB_ENABLED", defaults.github_enabled),
           slack_enabled: env_bool("SLACK_ENABLED", defaults.slack_enabled),
           jira_enabled: env_bool("JIRA_ENABLED", defaults.jira_enabled),
           birthright_departments: env::var("BIRTHRIGHT_DEPARTMENTS").map(|raw| {
                                                                       raw.split(',')
                                                                          .map(|d| d.trim().to_string())
                                                                          .filter(|d| !d.is_empty())
                                                                          .collect()
                                                                     })
                                                                     .unwrap_or(defaults.birthright_departments) }
  }
}

fn env_bool(key: &str, default: bool) -> bool {
  env::var(key).ok()
               .map(|raw| matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
               .unwrap_or(default)
}
