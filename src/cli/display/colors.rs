use comfy_table::Color as TableColor;
use colored::{ColoredString, Colorize};

/// Event severities, lowest first.
pub const SEVERITIES: [&str; 5] = ["DEBUG", "INFO", "MINOR", "MAJOR", "CRITICAL"];

#[derive(Debug, Clone, Copy)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    pub fn severity_color(&self, severity: &str) -> TableColor {
        match severity.to_ascii_uppercase().as_str() {
            "CRITICAL" => self.error,
            "MAJOR" => TableColor::Magenta,
            "MINOR" => self.warning,
            "INFO" => self.info,
            _ => self.muted,
        }
    }
}

/// Severity for plain terminal output.
pub fn colored_severity(severity: &str) -> ColoredString {
    match severity.to_ascii_uppercase().as_str() {
        "CRITICAL" => severity.red().bold(),
        "MAJOR" => severity.magenta(),
        "MINOR" => severity.yellow(),
        "INFO" => severity.cyan(),
        _ => severity.bright_black(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_color() {
        let theme = ColorTheme::default();
        assert_eq!(theme.severity_color("CRITICAL"), TableColor::Red);
        assert_eq!(theme.severity_color("minor"), TableColor::Yellow);
        assert_eq!(theme.severity_color("INFO"), TableColor::Cyan);
        assert_eq!(theme.severity_color("whatever"), TableColor::DarkGrey);
    }
}
