//! Commands that query the Home API.

use super::display::TableRenderer;
use super::Context;
use crate::domain::api::{DiagsQueryOptions, EventQueryOptions};
use crate::infrastructure::api::RequestOptions;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

fn parse_json(input: &str) -> Result<Value, String> {
    serde_json::from_str(input).map_err(|e| format!("invalid JSON: {}", e))
}

fn within_limit(count: usize, limit: Option<usize>) -> bool {
    limit.map_or(true, |limit| count < limit)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser, Debug)]
pub struct ClustersCommand {
    #[command(subcommand)]
    pub action: ClustersAction,
}

#[derive(Subcommand, Debug)]
pub enum ClustersAction {
    /// List clusters
    List {
        /// Only clusters seen in the last day, not muted and monitored
        #[arg(long)]
        active: bool,

        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one cluster
    Get {
        /// Cluster ID or alias
        cluster: String,
    },
}

impl ClustersCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let client = ctx.api_client()?;
        let renderer = TableRenderer::new();
        match &self.action {
            ClustersAction::List { active, limit } => {
                let mut query = if *active {
                    client.query_active_clusters().await?
                } else {
                    client.query_clusters(RequestOptions::new()).await?
                };
                let mut clusters = Vec::new();
                while within_limit(clusters.len(), *limit) {
                    match query.next_cluster().await? {
                        Some(cluster) => clusters.push(cluster),
                        None => break,
                    }
                }
                println!("{}", renderer.render_clusters(&clusters));
            }
            ClustersAction::Get { cluster } => {
                let id = ctx.cluster_id(cluster)?;
                let cluster = client.get_cluster(&id).await?;
                println!("{}", renderer.render_cluster(&cluster));
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct CustomersCommand {
    #[command(subcommand)]
    pub action: CustomersAction,
}

#[derive(Subcommand, Debug)]
pub enum CustomersAction {
    /// List customers
    List,
    /// Show one customer
    Get { id: String },
}

impl CustomersCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let client = ctx.api_client()?;
        let renderer = TableRenderer::new();
        let customers = match &self.action {
            CustomersAction::List => {
                let mut query = client.query_customers().await?;
                let mut customers = Vec::new();
                while let Some(customer) = query.next_customer().await? {
                    customers.push(customer);
                }
                customers
            }
            CustomersAction::Get { id } => vec![client.get_customer(id).await?],
        };
        println!("{}", renderer.render_customers(&customers));
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct EventsCommand {
    /// Cluster ID or alias
    pub cluster: String,

    /// Include internal events
    #[arg(long)]
    pub internal: bool,

    /// Order by ingest time instead of event time
    #[arg(long)]
    pub sort_by_ingest: bool,

    /// Lowest severity to show (DEBUG, INFO, MINOR, MAJOR, CRITICAL)
    #[arg(long)]
    pub min_severity: Option<String>,

    /// Start of the time range, RFC 3339
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// End of the time range, RFC 3339
    #[arg(long)]
    pub until: Option<DateTime<Utc>>,

    #[arg(long, default_value = "100")]
    pub limit: usize,
}

impl EventsCommand {
    pub fn query_options(&self) -> EventQueryOptions {
        EventQueryOptions {
            with_internal_events: self.internal,
            sort_by_ingest_time: self.sort_by_ingest,
            min_severity: self.min_severity.as_ref().map(|s| s.to_ascii_uppercase()),
            start_time: self.since,
            end_time: self.until,
            ..Default::default()
        }
    }

    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let client = ctx.api_client()?;
        let cluster_id = ctx.cluster_id(&self.cluster)?;
        let mut query = client
            .query_events(&cluster_id, &self.query_options())
            .await?;

        let mut events = Vec::new();
        while events.len() < self.limit {
            match query.next_event().await? {
                Some(event) => events.push(event),
                None => break,
            }
        }
        println!("{}", TableRenderer::new().render_events(&events));
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct DiagsCommand {
    #[command(subcommand)]
    pub action: DiagsAction,
}

#[derive(Subcommand, Debug)]
pub enum DiagsAction {
    /// List uploaded diagnostics files
    List {
        /// Cluster ID or alias
        cluster: String,

        #[arg(long)]
        topic: Option<String>,

        #[arg(long)]
        topic_id: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },
    /// Download diagnostics files
    Download {
        /// Cluster ID or alias
        cluster: String,

        #[arg(required = true)]
        names: Vec<String>,

        /// Directory to write the files to
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,
    },
    /// Download every diagnostics file uploaded under a topic ID
    DownloadBatch {
        /// Cluster ID or alias
        cluster: String,

        topic_id: String,

        #[arg(long)]
        topic: Option<String>,

        /// Directory to write the files to
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,
    },
}

impl DiagsCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let client = ctx.api_client()?;
        match &self.action {
            DiagsAction::List {
                cluster,
                topic,
                topic_id,
                limit,
            } => {
                let cluster_id = ctx.cluster_id(cluster)?;
                let options = DiagsQueryOptions {
                    topic: topic.clone(),
                    topic_id: topic_id.clone(),
                    ..Default::default()
                };
                let mut query = client.query_diags(&cluster_id, &options).await?;
                let mut diags = Vec::new();
                while within_limit(diags.len(), *limit) {
                    match query.next_diag().await? {
                        Some(diag) => diags.push(diag),
                        None => break,
                    }
                }
                println!("{}", TableRenderer::new().render_diags(&diags));
            }
            DiagsAction::Download {
                cluster,
                names,
                output,
            } => {
                let cluster_id = ctx.cluster_id(cluster)?;
                std::fs::create_dir_all(output)?;
                if let [name] = names.as_slice() {
                    client.download_diag(&cluster_id, name, output).await?;
                } else {
                    client.download_diags(&cluster_id, names, output).await?;
                }
                println!("Downloaded {} file(s) to {}", names.len(), output.display());
            }
            DiagsAction::DownloadBatch {
                cluster,
                topic_id,
                topic,
                output,
            } => {
                let cluster_id = ctx.cluster_id(cluster)?;
                let options = DiagsQueryOptions {
                    topic: topic.clone(),
                    topic_id: Some(topic_id.clone()),
                    ..Default::default()
                };
                std::fs::create_dir_all(output)?;
                let count = client
                    .download_diags_matching(&cluster_id, &options, output)
                    .await?;
                if count == 0 {
                    println!(
                        "No files found for topic: {} topic-id: {}",
                        topic.as_deref().unwrap_or(""),
                        topic_id
                    );
                } else {
                    println!("Downloaded {} file(s) to {}", count, output.display());
                }
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct IntegrationsCommand {
    #[command(subcommand)]
    pub action: IntegrationsAction,
}

#[derive(Subcommand, Debug)]
pub enum IntegrationsAction {
    /// List integrations
    List,
    /// Show one integration
    Get { id: i64 },
    /// Send a test notification through an integration
    Test {
        id: i64,

        /// Request body, as JSON
        #[arg(long, value_parser = parse_json, default_value = "{}")]
        body: Value,
    },
}

impl IntegrationsCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let client = ctx.api_client()?;
        let renderer = TableRenderer::new();
        match &self.action {
            IntegrationsAction::List => {
                let mut query = client.query_integrations(RequestOptions::new()).await?;
                let mut integrations = Vec::new();
                while let Some(integration) = query.next_integration().await? {
                    integrations.push(integration);
                }
                println!("{}", renderer.render_integrations(&integrations));
            }
            IntegrationsAction::Get { id } => {
                let integration = client.get_integration(*id).await?;
                println!("{}", renderer.render_integrations(&[integration]));
            }
            IntegrationsAction::Test { id, body } => {
                print_json(&client.test_integration(*id, body.clone()).await?)?;
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let status = ctx.api_client()?.get_server_status().await?;
        let rows = [
            ("Active", status.active.to_string()),
            ("Version", status.version),
        ];
        println!("{}", TableRenderer::new().render_properties(&rows));
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct ServerVersionCommand {}

impl ServerVersionCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        println!("{}", ctx.api_client()?.get_server_version().await?.version);
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct DbStatusCommand {}

impl DbStatusCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        print_json(&ctx.api_client()?.get_db_status().await?)
    }
}

#[derive(Parser, Debug)]
pub struct AnalyticsCommand {
    /// Cluster ID or alias
    pub cluster: String,
}

impl AnalyticsCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let cluster_id = ctx.cluster_id(&self.cluster)?;
        print_json(&ctx.api_client()?.get_cluster_analytics(&cluster_id).await?)
    }
}

#[derive(Parser, Debug)]
pub struct UsageReportCommand {
    /// Cluster ID or alias
    pub cluster: String,
}

impl UsageReportCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let cluster_id = ctx.cluster_id(&self.cluster)?;
        print_json(&ctx.api_client()?.get_latest_usage_report(&cluster_id).await?)
    }
}
