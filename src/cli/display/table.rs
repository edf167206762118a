use super::colors::ColorTheme;
use super::icons::StatusIcon;
use crate::domain::api::{Cluster, Customer, Diag, Event, Integration};
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn base_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).set_alignment(CellAlignment::Left)),
        );
    table
}

fn titled(title: &str, count: usize, unit: &str, table: &Table) -> String {
    let mut output = format!(
        "╭─ {} {} ─╮\n",
        title,
        format!("[{} {}]", count, unit).bright_black()
    );
    output.push_str(&table.to_string());
    output.push('\n');
    output
}

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
    now: DateTime<Utc>,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
            now: Utc::now(),
        }
    }

    /// Pin "now" for cluster freshness.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn render_clusters(&self, clusters: &[Cluster]) -> String {
        if clusters.is_empty() {
            return "No clusters found".to_string();
        }

        let mut table = base_table(&["ID", "NAME", "VERSION", "LAST SEEN", "STATUS"]);
        for cluster in clusters {
            let (icon, status) =
                StatusIcon::cluster_status(cluster.muted, cluster.last_seen, self.now);
            let color = match icon {
                StatusIcon::SUCCESS => self.theme.success,
                StatusIcon::WARNING => self.theme.warning,
                StatusIcon::ERROR => self.theme.error,
                _ => self.theme.muted,
            };
            table.add_row(vec![
                Cell::new(&cluster.id),
                Cell::new(&cluster.name),
                Cell::new(&cluster.version),
                Cell::new(timestamp(cluster.last_seen)),
                Cell::new(format!("{} {}", icon, status)).fg(color),
            ]);
        }

        let mut output = titled("Clusters", clusters.len(), "clusters", &table);
        output.push_str(&format!(
            "Legend: {} Active  {} Stale  {} Silent  {} Muted\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::WARNING.yellow(),
            StatusIcon::ERROR.red(),
            StatusIcon::MUTED.bright_black()
        ));
        output
    }

    /// Single cluster as a two-column property table.
    pub fn render_cluster(&self, cluster: &Cluster) -> String {
        let (icon, status) = StatusIcon::cluster_status(cluster.muted, cluster.last_seen, self.now);
        let mut table = base_table(&["FIELD", "VALUE"]);
        let rows = [
            ("ID", cluster.id.clone()),
            ("Name", cluster.name.clone()),
            ("Customer", cluster.customer_id.clone()),
            ("Version", cluster.version.clone()),
            ("Release", cluster.software_release.clone()),
            ("Created", timestamp(cluster.created_at)),
            ("Last seen", timestamp(cluster.last_seen)),
            ("Last event", timestamp(cluster.last_event)),
            ("Status", format!("{} {}", icon, status)),
        ];
        for (field, value) in rows {
            table.add_row(vec![Cell::new(field).fg(self.theme.info), Cell::new(value)]);
        }
        table.to_string()
    }

    pub fn render_customers(&self, customers: &[Customer]) -> String {
        if customers.is_empty() {
            return "No customers found".to_string();
        }
        let mut table = base_table(&["ID", "NAME", "MONITORED", "UPDATED"]);
        for customer in customers {
            let monitored = if customer.monitored {
                Cell::new("yes").fg(self.theme.success)
            } else {
                Cell::new("no").fg(self.theme.muted)
            };
            table.add_row(vec![
                Cell::new(&customer.id),
                Cell::new(&customer.name),
                monitored,
                Cell::new(timestamp(customer.updated_at)),
            ]);
        }
        titled("Customers", customers.len(), "customers", &table)
    }

    pub fn render_events(&self, events: &[Event]) -> String {
        if events.is_empty() {
            return "No events found".to_string();
        }
        let mut table = base_table(&["TIME", "SEVERITY", "TYPE", "CATEGORY", "NODE", "ENTITY"]);
        for event in events {
            table.add_row(vec![
                Cell::new(timestamp(event.time)),
                Cell::new(&event.severity).fg(self.theme.severity_color(&event.severity)),
                Cell::new(&event.event_type),
                Cell::new(&event.category),
                Cell::new(&event.node_id),
                Cell::new(&event.entity),
            ]);
        }
        titled("Events", events.len(), "events", &table)
    }

    pub fn render_diags(&self, diags: &[Diag]) -> String {
        if diags.is_empty() {
            return "No diags found".to_string();
        }
        let mut table = base_table(&["FILE", "HOST", "TOPIC", "UPLOADED", "COMPLETE"]);
        for diag in diags {
            let complete = if diag.completed {
                Cell::new(StatusIcon::SUCCESS).fg(self.theme.success)
            } else {
                Cell::new(StatusIcon::WARNING).fg(self.theme.warning)
            };
            table.add_row(vec![
                Cell::new(&diag.file_name),
                Cell::new(&diag.host_name),
                Cell::new(&diag.topic),
                Cell::new(timestamp(diag.upload_time)),
                complete.set_alignment(CellAlignment::Center),
            ]);
        }
        titled("Diags", diags.len(), "files", &table)
    }

    pub fn render_integrations(&self, integrations: &[Integration]) -> String {
        if integrations.is_empty() {
            return "No integrations found".to_string();
        }
        let mut table = base_table(&["ID", "NAME", "TYPE", "RULE", "DESTINATIONS"]);
        for integration in integrations {
            table.add_row(vec![
                Cell::new(integration.id),
                Cell::new(&integration.name),
                Cell::new(&integration.configuration.kind),
                Cell::new(&integration.configuration.rule.rule_type),
                Cell::new(integration.configuration.destinations.join(", ")),
            ]);
        }
        titled("Integrations", integrations.len(), "integrations", &table)
    }

    pub fn render_aliases<'a>(&self, aliases: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let mut table = base_table(&["ALIAS", "CLUSTER"]);
        let mut count = 0;
        for (alias, cluster) in aliases {
            table.add_row(vec![Cell::new(alias).fg(Color::Cyan), Cell::new(cluster)]);
            count += 1;
        }
        if count == 0 {
            return "No aliases defined".to_string();
        }
        titled("Aliases", count, "aliases", &table)
    }

    /// Two-column property table.
    pub fn render_properties(&self, rows: &[(&str, String)]) -> String {
        let mut table = base_table(&["FIELD", "VALUE"]);
        for (field, value) in rows {
            table.add_row(vec![Cell::new(field).fg(self.theme.info), Cell::new(value)]);
        }
        table.to_string()
    }
}
