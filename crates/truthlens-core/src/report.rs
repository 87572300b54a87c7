use std::fmt::Write;

use crate::heuristics::Severity;
use crate::orchestrator::Analysis;

/// Format styles supported by the presentation adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Render a completed analysis.
pub fn render_analysis(analysis: &Analysis, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(analysis),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(analysis)?),
    }
}

fn render_human(analysis: &Analysis) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "Trust Score: {} ({})",
        analysis.score(),
        analysis.tier.label
    )?;
    writeln!(out, "{}", analysis.tier.description)?;
    writeln!(out, "Verdict: {}", analysis.verdict.label)?;
    writeln!(out)?;

    writeln!(out, "AI Analysis:")?;
    if analysis.verdict.reasons.is_empty() {
        writeln!(out, "  (no reasons given)")?;
    }
    for reason in &analysis.verdict.reasons {
        writeln!(out, "  - {}", single_line(reason))?;
    }

    writeln!(out)?;
    writeln!(out, "Heuristics (score {}):", analysis.heuristics.score)?;
    for flag in &analysis.heuristics.flags {
        writeln!(
            out,
            "  {} {}",
            severity_marker(flag.severity),
            flag.message
        )?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Evidence & Sources ({} links, {} trusted):",
        analysis.sources.len(),
        analysis.trusted_count
    )?;
    if analysis.sources.is_empty() {
        writeln!(out, "  No direct web sources found.")?;
    }
    for source in &analysis.sources {
        let marker = if source.trusted { "*" } else { "-" };
        writeln!(
            out,
            "  {marker} {domain:<24} {url}",
            domain = source.domain,
            url = source.url
        )?;
    }

    Ok(out)
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Good => "[ok]",
        Severity::Warn => "[!!]",
        Severity::Bad => "[xx]",
    }
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::{Flag, HeuristicReport};
    use crate::orchestrator::Claim;
    use crate::search::SearchResult;
    use crate::tier::tier_for;
    use crate::verdict::{Verdict, VerdictLabel};

    fn sample_analysis(sources: Vec<SearchResult>) -> Analysis {
        Analysis {
            claim: Claim::parse("India is in Iceland").unwrap(),
            heuristics: HeuristicReport {
                score: 100,
                flags: vec![Flag {
                    severity: Severity::Warn,
                    message: "Short claim detected.".into(),
                }],
            },
            verdict: Verdict {
                label: VerdictLabel::False,
                reasons: vec!["India is in South Asia.\nIceland is in Europe.".into()],
                score: 0,
                confidence: 100,
            },
            trusted_count: sources.iter().filter(|s| s.trusted).count(),
            sources,
            tier: *tier_for(0),
        }
    }

    fn wiki_source() -> SearchResult {
        SearchResult {
            title: "India".into(),
            url: "https://en.wikipedia.org/wiki/India".into(),
            domain: "en.wikipedia.org".into(),
            snippet: "India is a country in South Asia.".into(),
            published_date: None,
            trusted: true,
        }
    }

    #[test]
    fn human_report_contains_score_tier_and_sources() {
        let output =
            render_analysis(&sample_analysis(vec![wiki_source()]), OutputFormat::Human).unwrap();
        assert!(output.contains("Trust Score: 0 (Fabricated (Fake))"));
        assert!(output.contains("Verdict: False"));
        assert!(output.contains("  - India is in South Asia. Iceland is in Europe."));
        assert!(output.contains("[!!] Short claim detected."));
        assert!(output.contains("1 links, 1 trusted"));
        assert!(output.contains("en.wikipedia.org"));
    }

    #[test]
    fn human_report_notes_missing_sources() {
        let output = render_analysis(&sample_analysis(Vec::new()), OutputFormat::Human).unwrap();
        assert!(output.contains("No direct web sources found."));
    }

    #[test]
    fn json_report_serializes() {
        let analysis = sample_analysis(vec![wiki_source()]);
        let output = render_analysis(&analysis, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["claim"], "India is in Iceland");
        assert_eq!(value["verdict"]["label"], "False");
        assert_eq!(value["verdict"]["score"], 0);
        assert_eq!(value["tier"]["label"], "Fabricated (Fake)");
        assert_eq!(value["heuristics"]["flags"][0]["severity"], "warn");
        assert!(value["sources"].is_array());
    }
}
