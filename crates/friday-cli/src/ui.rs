// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Terminal output shared by the commands.

use std::path::Path;

use console::style;
use friday::dev::DevSummary;
use friday::diagnostic::{self, Diagnostic, Severity};
use friday::paths::display_path;
use indicatif::{ProgressBar, ProgressStyle};

/// Prints a green check line.
pub fn success(message: impl AsRef<str>) {
    println!("{} {}", style("✓").green(), message.as_ref());
}

/// Prints a red cross line to stderr.
pub fn failure(message: impl AsRef<str>) {
    eprintln!("{} {}", style("✗").red(), style(message.as_ref()).red());
}

/// Prints a bulleted list of paths.
pub fn list<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        eprintln!("  {} {}", style("•").dim(), display_path(path));
    }
}

/// Progress bar for a tree build; the length is set by the first update.
pub fn build_progress() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Renders the "Friday is running" banner for `project`.
pub fn dev_banner(project: &str, summary: &DevSummary) -> String {
    let mut lines = Vec::new();

    let mut heading = style(format!("Friday is running {}:", project))
        .green()
        .bold()
        .to_string();
    if summary.port_substituted() {
        if let (Some(used), Some(requested)) = (summary.used_port, summary.requested_port) {
            heading.push_str(&format!(
                " {}",
                style(format!(
                    "(on port {}, because {} is already in use.)",
                    used, requested
                ))
                .red()
            ));
        }
    }
    lines.push(heading);
    lines.push(String::new());
    lines.push(format!(
        "• {} {}",
        style("Local:           ").bold(),
        style(&summary.local_url).cyan()
    ));
    if let Some(url) = &summary.network_url {
        lines.push(format!("• {} {}", style("On Your Network: ").bold(), style(url).cyan()));
    }
    lines.push(String::new());

    let watched: Vec<String> = summary.watched.iter().map(|p| display_path(p)).collect();
    if watched.is_empty() {
        lines.push(style("Not watching for file changes").dim().to_string());
    } else {
        lines.push(
            style(format!("And watching for file changes: {}", watched.join(", ")))
                .dim()
                .to_string(),
        );
    }

    let width = lines
        .iter()
        .map(|l| console::measure_text_width(l))
        .max()
        .unwrap_or(0);
    let border = style(format!("+{}+", "-".repeat(width + 4))).green();

    let mut out = format!("{}\n", border);
    for line in &lines {
        let pad = width - console::measure_text_width(line);
        out.push_str(&format!(
            "{}  {}{}  {}\n",
            style("|").green(),
            line,
            " ".repeat(pad),
            style("|").green()
        ));
    }
    out.push_str(&format!("{}\n", border));
    out
}

/// Prints diagnostics with code frames, followed by the problem summary.
pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        let location = match &d.filename {
            Some(file) if d.has_location() => {
                format!("{}:{}:{}", display_path(file), d.line, d.column)
            }
            Some(file) => display_path(file),
            None => String::new(),
        };
        let label = match d.severity {
            Severity::Error => style("error").red().bold(),
            Severity::Warning => style("warning").yellow().bold(),
        };
        let code = d.code.map(|c| format!(" TS{}", c)).unwrap_or_default();

        eprintln!();
        if location.is_empty() {
            eprintln!("{}{}: {}", label, style(code).dim(), d.message);
        } else {
            eprintln!(
                "{} - {}{}: {}",
                style(location).cyan(),
                label,
                style(code).dim(),
                d.message
            );
        }
        if let Some(frame) = d.read_code_frame() {
            eprintln!();
            eprint!("{}", frame);
        }
    }

    if !diagnostics.is_empty() {
        eprintln!();
        failure(diagnostic::summary(diagnostics));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use friday::endpoint::Endpoint;
    use std::path::PathBuf;

    fn summary(requested: u16, used: u16) -> DevSummary {
        DevSummary {
            endpoint: Endpoint::tcp("0.0.0.0", used),
            local_url: format!("http://localhost:{}", used),
            network_url: Some(format!("http://192.168.1.20:{}", used)),
            requested_port: Some(requested),
            used_port: Some(used),
            watched: vec![PathBuf::from("/p/dist")],
        }
    }

    #[test]
    fn test_banner_mentions_url_and_watch_paths() {
        console::set_colors_enabled(false);
        let banner = dev_banner("my-service", &summary(3000, 3000));
        assert!(banner.contains("Friday is running my-service:"));
        assert!(banner.contains("http://localhost:3000"));
        assert!(banner.contains("On Your Network:  http://192.168.1.20:3000"));
        assert!(banner.contains("And watching for file changes:"));
        assert!(!banner.contains("already in use"));
    }

    #[test]
    fn test_banner_reports_port_substitution() {
        console::set_colors_enabled(false);
        let mut summary = summary(3000, 53211);
        summary.network_url = None;
        let banner = dev_banner("my-service", &summary);
        assert!(!banner.contains("On Your Network"));
        assert!(banner.contains("(on port 53211, because 3000 is already in use.)"));
    }
}
