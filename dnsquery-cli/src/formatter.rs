//! Output formatters for a finished resolution.
use dnsquery::dns::resolver::{Resolution, ResolverConfig, ResourceRecord};
use std::fmt::Write;

/// Trait for formatting resolution results.
///
/// A `ResultFormatter` defines how a [`Resolution`] is turned into the text printed on stdout.
pub trait ResultFormatter {
    type Output;

    fn format(&self, config: &ResolverConfig, resolution: &Resolution) -> Self::Output;
}

/// dig-like output with zone-file records, optionally preceded by the iterative trace.
#[derive(Debug, Default)]
pub struct ZoneFormatter {
    pub show_trace: bool,
}

/// Formats the resolution as a JSON document.
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl ResultFormatter for ZoneFormatter {
    type Output = String;

    fn format(&self, config: &ResolverConfig, resolution: &Resolution) -> Self::Output {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "; <<>> dnsquery {} <<>> {} {}",
            env!("CARGO_PKG_VERSION"),
            fqdn(&config.name),
            config.record_type
        );
        let _ = writeln!(
            out,
            ";; SERVER: {}#{}",
            resolution.server.ip(),
            resolution.server.port()
        );
        let _ = writeln!(out, ";; STATUS: {:?}", resolution.status);

        if self.show_trace && !resolution.steps.is_empty() {
            let _ = writeln!(out, "\n;; TRACE:");
            for (index, step) in resolution.steps.iter().enumerate() {
                let _ = writeln!(
                    out,
                    ";; {:>2} {:<8} {:<30} {:<5} @{}#{}  answer {} authority {} additional {}",
                    index + 1,
                    step.phase.to_string(),
                    fqdn(&step.name),
                    step.record_type.to_string(),
                    step.server.ip(),
                    step.server.port(),
                    step.answers,
                    step.authority,
                    step.additional
                );
            }
        }

        for (title, records) in [
            ("ANSWER", &resolution.answer),
            ("AUTHORITY", &resolution.authority),
            ("ADDITIONAL", &resolution.additional),
        ] {
            if records.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n;; {title} SECTION:");
            for record in records {
                let _ = writeln!(out, "{}", zone_line(record));
            }
        }

        out
    }
}

impl ResultFormatter for JsonFormatter {
    type Output = serde_json::Result<String>;

    fn format(&self, config: &ResolverConfig, resolution: &Resolution) -> Self::Output {
        let document = serde_json::json!({
            "name": config.name,
            "record_type": config.record_type,
            "mode": config.mode,
            "resolution": serde_json::to_value(resolution)?,
        });
        serde_json::to_string_pretty(&document)
    }
}

fn fqdn(name: &str) -> String {
    if name.is_empty() || name == "." {
        ".".to_string()
    } else if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// `owner TTL CLASS TYPE RDATA`
fn zone_line(record: &ResourceRecord) -> String {
    let class = match record.class {
        1 => "IN".to_string(),
        other => format!("CLASS{other}"),
    };
    format!(
        "{}\t{}\t{}\t{}\t{}",
        fqdn(&record.name),
        record.ttl,
        class,
        record.record_type,
        record.rdata
    )
}
