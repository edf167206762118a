//! Local CLI settings: site config and cluster aliases.

use super::display::TableRenderer;
use super::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Show only the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

#[derive(Parser, Debug)]
pub struct AliasCommand {
    #[command(subcommand)]
    pub action: AliasAction,
}

#[derive(Subcommand, Debug)]
pub enum AliasAction {
    /// List aliases
    List,
    /// Point an alias at a cluster ID
    Set {
        alias: String,
        cluster_id: String,

        /// Replace an existing alias
        #[arg(long)]
        force: bool,
    },
    /// Remove an alias
    Remove { alias: String },
}

impl AliasCommand {
    pub fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let mut aliases = ctx.aliases()?;
        match &self.action {
            AliasAction::List => {
                println!("{}", TableRenderer::new().render_aliases(aliases.iter()));
            }
            AliasAction::Set {
                alias,
                cluster_id,
                force,
            } => {
                let id = Uuid::parse_str(cluster_id)
                    .map_err(|_| anyhow::anyhow!("{} is not a valid cluster ID", cluster_id))?;
                aliases.set(alias, &id.to_string(), *force)?;
                aliases.save()?;
                println!("Alias {} -> {}", alias, id);
            }
            AliasAction::Remove { alias } => {
                let target = aliases.remove(alias)?;
                aliases.save()?;
                println!("Removed alias {} (was {})", alias, target);
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the active site
    Show,
    /// Set the API key of the active site
    ApiKey { key: String },
    /// Set the server URL of the active site
    CloudUrl { url: String },
}

impl ConfigCommand {
    pub fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let paths = ctx.config_paths()?;
        let mut config = ctx.load_config()?;
        let site = ctx.site.as_deref();

        let name = match &self.action {
            ConfigAction::Show => {
                let (name, settings) = config.site(site)?;
                let rows = [
                    ("Config file", paths.config_file.display().to_string()),
                    ("Site", name),
                    ("Cloud URL", settings.cloud_url),
                    ("API key", mask_secret(&settings.api_key)),
                ];
                println!("{}", TableRenderer::new().render_properties(&rows));
                return Ok(());
            }
            ConfigAction::ApiKey { key } => {
                config.update_site(site, |s| s.api_key = key.clone())?
            }
            ConfigAction::CloudUrl { url } => {
                url::Url::parse(url)
                    .map_err(|e| anyhow::anyhow!("invalid URL {}: {}", url, e))?;
                config.update_site(site, |s| s.cloud_url = url.clone())?
            }
        };
        config.write(&paths.config_file)?;
        println!("Updated site {} in {}", name, paths.config_file.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::CliConfig;
    use tokio_util::sync::CancellationToken;

    const ID: &str = "6f7c6cd9-2f2b-4c57-9c3a-1c3c2d7c8e11";

    fn context(dir: &std::path::Path) -> Context {
        Context::new(None, false, CancellationToken::new()).with_config_dir(dir)
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "<unset>");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
    }

    #[test]
    fn test_alias_set_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let set = AliasCommand::parse_from(["alias", "set", "prod", ID]);
        set.execute(&ctx).unwrap();
        assert_eq!(ctx.cluster_id("prod").unwrap(), ID);

        let bad = AliasCommand::parse_from(["alias", "set", "lab", "not-a-uuid"]);
        assert!(bad.execute(&ctx).is_err());

        let remove = AliasCommand::parse_from(["alias", "remove", "prod"]);
        remove.execute(&ctx).unwrap();
        assert!(ctx.cluster_id("prod").is_err());
    }

    #[test]
    fn test_config_api_key_updates_default_site() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        CliConfig::template()
            .write(&dir.path().join("config.toml"))
            .unwrap();

        ConfigCommand::parse_from(["config", "api-key", "secret"])
            .execute(&ctx)
            .unwrap();
        let (_, site) = ctx.load_config().unwrap().site(None).unwrap();
        assert_eq!(site.api_key, "secret");
    }

    #[test]
    fn test_first_run_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = context(dir.path()).load_config().unwrap_err();
        assert!(err.downcast_ref::<super::super::TemplateCreated>().is_some());
        assert!(dir.path().join("config.toml").exists());
    }
}
