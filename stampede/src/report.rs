use core::{
    fmt::{self, Display, Formatter},
    time::Duration,
};
use std::{fs, io, path::Path};

use anyhow::{Context, Error};
use crossterm::style::Stylize;

use crate::engine::Results;

const RULE_WIDTH: usize = 60;

/// Prints the report to stdout.
///
/// Rendering is a pure function of the results plus the color flag; there is
/// no process-wide formatting state.
pub fn print(results: &Results, color: bool) {
    if color {
        print_colored(results);
    } else {
        print!("{}", TextReport(results));
    }
}

/// Writes the plain-text report to the given file.
pub fn save_to_file(results: &Results, path: &Path) -> io::Result<()> {
    fs::write(path, TextReport(results).to_string())
}

/// Writes the report as pretty-printed JSON to the given file.
pub fn write_json(results: &Results, path: &Path) -> Result<(), Error> {
    let data = serde_json::to_vec_pretty(results)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

/// Plain-text report renderer.
pub struct TextReport<'a>(pub &'a Results);

impl Display for TextReport<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let results = self.0;
        let m = &results.metrics;
        let p = &results.percentiles;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(fmt, "\n{rule}")?;
        writeln!(fmt, "\tLOAD TEST RESULTS")?;
        writeln!(fmt, "{rule}\n")?;

        writeln!(fmt, "Summary:")?;
        writeln!(fmt, "  Duration:        {}", format_duration(results.duration))?;
        writeln!(fmt, "  Total Requests:  {}", format_count(m.total_requests))?;
        writeln!(
            fmt,
            "  Successful:      {} ({})",
            format_count(m.successful_requests),
            format_percent(rate(m.successful_requests, m.total_requests)),
        )?;
        writeln!(
            fmt,
            "  Failed:          {} ({})",
            format_count(m.failed_requests),
            format_percent(rate(m.failed_requests, m.total_requests)),
        )?;
        writeln!(fmt, "  Requests/sec:    {:.2}\n", results.requests_per_second)?;

        if m.successful_requests > 0 {
            writeln!(fmt, "Latency:")?;
            if let Some(mean) = m.mean_latency() {
                writeln!(fmt, "  Average:  {}", format_latency(mean.as_micros() as u64))?;
            }
            if let Some(min) = m.min_latency {
                writeln!(fmt, "  Min:      {}", format_latency(min.as_micros() as u64))?;
            }
            if let Some(max) = m.max_latency {
                writeln!(fmt, "  Max:      {}", format_latency(max.as_micros() as u64))?;
            }
            writeln!(fmt, "  p50:      {}", format_latency(p.p50))?;
            writeln!(fmt, "  p75:      {}", format_latency(p.p75))?;
            writeln!(fmt, "  p90:      {}", format_latency(p.p90))?;
            writeln!(fmt, "  p95:      {}", format_latency(p.p95))?;
            writeln!(fmt, "  p99:      {}", format_latency(p.p99))?;
            writeln!(fmt, "  p99.9:    {}\n", format_latency(p.p999))?;
        }

        writeln!(fmt, "Status Codes:")?;
        for (code, count) in sorted_codes(results) {
            writeln!(
                fmt,
                "  {code}:  {} ({})",
                format_count(count),
                format_percent(rate(count, m.total_requests)),
            )?;
        }
        writeln!(fmt, "\n{rule}")?;

        Ok(())
    }
}

fn print_colored(results: &Results) {
    let m = &results.metrics;
    let p = &results.percentiles;
    let rule = "=".repeat(RULE_WIDTH);

    println!("\n{}", rule.as_str().cyan().bold());
    println!("{}", "\tLOAD TEST RESULTS".cyan().bold());
    println!("{}\n", rule.as_str().cyan().bold());

    println!("{}", "Summary:".bold());
    println!("  Duration:        {}", format_duration(results.duration).magenta());
    println!("  Total Requests:  {}", format_count(m.total_requests).blue());
    println!(
        "  Successful:      {} ({})",
        format_count(m.successful_requests).green(),
        format_percent(rate(m.successful_requests, m.total_requests)).green(),
    );
    let failed = format_count(m.failed_requests);
    let failure_rate = format_percent(rate(m.failed_requests, m.total_requests));
    if m.failed_requests > 0 {
        println!("  Failed:          {} ({})", failed.red(), failure_rate.red());
    } else {
        println!("  Failed:          {} ({})", failed.green(), failure_rate.green());
    }
    println!(
        "  Requests/sec:    {}\n",
        format!("{:.2}", results.requests_per_second).yellow(),
    );

    if m.successful_requests > 0 {
        println!("{}", "Latency:".bold());
        if let Some(mean) = m.mean_latency() {
            println!("  Average:  {}", format_latency(mean.as_micros() as u64).yellow());
        }
        if let Some(min) = m.min_latency {
            println!("  Min:      {}", format_latency(min.as_micros() as u64).green());
        }
        if let Some(max) = m.max_latency {
            println!("  Max:      {}", format_latency(max.as_micros() as u64).red());
        }
        println!("  p50:      {}", format_latency(p.p50).blue());
        println!("  p75:      {}", format_latency(p.p75).blue());
        println!("  p90:      {}", format_latency(p.p90).yellow());
        println!("  p95:      {}", format_latency(p.p95).yellow());
        println!("  p99:      {}", format_latency(p.p99).red());
        println!("  p99.9:    {}\n", format_latency(p.p999).red());
    }

    println!("{}", "Status Codes:".bold());
    for (code, count) in sorted_codes(results) {
        let styled = match code {
            200..=299 => format!("{code}").green(),
            300..=399 => format!("{code}").blue(),
            400..=499 => format!("{code}").yellow(),
            _ => format!("{code}").red(),
        };

        println!(
            "  {styled}:  {} ({})",
            format_count(count),
            format_percent(rate(count, m.total_requests)),
        );
    }
    println!("\n{}", rule.as_str().cyan().bold());
}

fn sorted_codes(results: &Results) -> Vec<(u16, u64)> {
    let mut codes: Vec<(u16, u64)> = results
        .metrics
        .status_codes
        .iter()
        .map(|(&code, &count)| (code, count))
        .collect();
    codes.sort_unstable_by_key(|&(code, _)| code);

    codes
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }

    part as f64 * 100.0 / total as f64
}

fn format_duration(duration: Duration) -> String {
    let us = duration.as_micros() as f64;

    if us >= 1_000_000.0 {
        format!("{:.3}s", us / 1_000_000.0)
    } else if us >= 1_000.0 {
        format!("{:.3}ms", us / 1_000.0)
    } else {
        format!("{us:.3}µs")
    }
}

/// Latencies below one millisecond stay in microseconds.
fn format_latency(us: u64) -> String {
    if us >= 1_000 {
        format!("{:.2}ms", us as f64 / 1_000.0)
    } else {
        format!("{us}µs")
    }
}

fn format_count(v: u64) -> String {
    let digits = v.to_string();

    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

fn format_percent(v: f64) -> String {
    format!("{v:.2}%")
}
