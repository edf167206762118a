use super::api::{
    AnalyticsCommand, ClustersCommand, CustomersCommand, DbStatusCommand, DiagsCommand,
    EventsCommand, IntegrationsCommand, ServerVersionCommand, StatusCommand, UsageReportCommand,
};
use super::config::{AliasCommand, ConfigCommand};
use super::local::LocalCommand;
use super::Context;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "homecli",
    version,
    about = "Query a Weka Home server and install Weka Home on a local k3s node"
)]
pub struct CliArgs {
    /// Site from the config file; defaults to "default_site"
    #[arg(long, global = true)]
    pub site: Option<String>,

    /// Verbose logging; installer steps keep partial state on failure
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// List or show clusters
    Clusters(ClustersCommand),

    /// List or show customers
    Customers(CustomersCommand),

    /// List events of a cluster
    Events(EventsCommand),

    /// List or download diagnostics files of a cluster
    Diags(DiagsCommand),

    /// List, show or test integrations
    Integrations(IntegrationsCommand),

    /// Show server status
    Status(StatusCommand),

    /// Show server version
    ServerVersion(ServerVersionCommand),

    /// Show database status
    DbStatus(DbStatusCommand),

    /// Show analytics of a cluster
    Analytics(AnalyticsCommand),

    /// Show the latest usage report of a cluster
    UsageReport(UsageReportCommand),

    /// Manage cluster aliases
    Alias(AliasCommand),

    /// Show or change the site configuration
    Config(ConfigCommand),

    /// Install, upgrade or configure Weka Home on this node
    Local(LocalCommand),
}

impl Commands {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Commands::Clusters(cmd) => cmd.execute(ctx).await,
            Commands::Customers(cmd) => cmd.execute(ctx).await,
            Commands::Events(cmd) => cmd.execute(ctx).await,
            Commands::Diags(cmd) => cmd.execute(ctx).await,
            Commands::Integrations(cmd) => cmd.execute(ctx).await,
            Commands::Status(cmd) => cmd.execute(ctx).await,
            Commands::ServerVersion(cmd) => cmd.execute(ctx).await,
            Commands::DbStatus(cmd) => cmd.execute(ctx).await,
            Commands::Analytics(cmd) => cmd.execute(ctx).await,
            Commands::UsageReport(cmd) => cmd.execute(ctx).await,
            Commands::Alias(cmd) => cmd.execute(ctx),
            Commands::Config(cmd) => cmd.execute(ctx),
            Commands::Local(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from(["homecli", "clusters", "list", "--site", "lab", "--debug"]);
        assert_eq!(args.site.as_deref(), Some("lab"));
        assert!(args.debug);
    }
}
