use chrono::DateTime;
use console::style;
use std::fs;
use std::io::{self, Write};

use crate::plan::TestPlan;
use crate::results::{HarEntry, PerformanceResult, RushResult, SprintResult, Trace};

fn format_ms(seconds: f64) -> String {
    format!("{} ms", (seconds * 1000.0).round() as i64)
}

pub fn print_sprint(plan: &TestPlan, result: &SprintResult) {
    println!("Transaction time {}", style(format_ms(result.duration)).green());
    println!();
    for step in &result.steps {
        if let Some(request) = &step.request {
            if let Some(path) = &plan.dump_header {
                warn_on_error(dump_header(request, path, "> "));
            }
            println!("> {} {}", request.method, request.url);
            if plan.verbose {
                print_content(request);
            }
        }
        if let Some(response) = &step.response {
            if let Some(path) = &plan.dump_header {
                warn_on_error(dump_header(response, path, "< "));
            }
            println!(
                "< {} {} in {}",
                response.status,
                response.message,
                style(format_ms(step.duration)).green()
            );
            if plan.verbose {
                print_content(response);
            }
        }
        println!();
    }
}

fn warn_on_error(result: io::Result<()>) {
    if let Err(error) = result {
        println!("{}", style(error).red());
    }
}

/// Writes the request/response line and headers to `path`; `-` prints them
/// to the console with the direction symbol instead.
fn dump_header(trace: &Trace, path: &str, symbol: &str) -> io::Result<()> {
    if path == "-" {
        println!("{}{}", symbol, trace.line);
        for (name, value) in &trace.headers {
            println!("{}{}: {}", symbol, name, value);
        }
        println!();
        return Ok(());
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", trace.line)?;
    for (name, value) in &trace.headers {
        writeln!(file, "{}: {}", name, value)?;
    }
    writeln!(file)
}

fn print_content(trace: &Trace) {
    if !trace.content.is_empty() {
        println!("{}", trace.content);
        println!();
    }
}

pub fn print_rush(result: &RushResult) {
    let hits: u64 = result.timeline.iter().map(|point| point.hits()).sum();
    let errors: u64 = result.timeline.iter().map(|point| point.errors).sum();
    let timeouts: u64 = result.timeline.iter().map(|point| point.timeouts).sum();
    let peak = result
        .timeline
        .iter()
        .map(|point| point.volume)
        .max()
        .unwrap_or(0);

    println!(
        "rush from {} peaked at {} concurrent users",
        result.region, peak
    );
    println!(
        "{} hits, {} errors, {} timeouts over {} samples",
        style(hits).green(),
        if errors > 0 {
            style(errors).red()
        } else {
            style(errors).green()
        },
        timeouts,
        result.timeline.len()
    );
}

/// Timeline rows: timestamp, volume, duration, hits, timeouts.
pub fn write_rush_csv<W: Write>(out: &mut W, result: &RushResult) -> io::Result<()> {
    for point in &result.timeline {
        writeln!(
            out,
            "{},{},{},{},{}",
            point.timestamp,
            point.volume,
            point.duration,
            point.hits(),
            point.timeouts
        )?;
    }
    Ok(())
}

pub fn print_performance(result: &PerformanceResult) {
    let entries = result.entries();
    println!();
    print!("{}", style("  Started ").yellow());
    print!("{}", style(" Duration ").yellow());
    print!("{}", style(" Response ").green());
    println!("{}", style(" URL ").magenta());

    let offsets = start_offsets(&entries);
    for (entry, offset) in entries.iter().zip(offsets) {
        print!("{:>9} ", offset);
        print!("{:>9} ", entry.time.round() as i64);
        let status = format!("{:>9} ", entry.response.status);
        if entry.response.status >= 400 {
            print!("{}", style(status).red());
        } else {
            print!("{}", style(status).green());
        }
        println!(" {}", entry.request.url);
    }
    println!();

    if let Some(load_time) = result.analysis.load_time {
        println!("Load time: {} msec", style(load_time).green());
    }
    let problems = &result.analysis.problems;
    if problems.is_empty() {
        println!("No problems found");
    } else {
        println!(
            "Found {}",
            style(format!("{} problems", problems.len())).red()
        );
        for problem in problems {
            println!("  * {} ({} URLs)", problem.message, problem.urls.len());
        }
    }
}

/// Millisecond offset of each entry from the earliest one. Entries without
/// a parseable start time sit at offset 0.
fn start_offsets(entries: &[HarEntry]) -> Vec<i64> {
    let starts: Vec<_> = entries
        .iter()
        .map(|entry| {
            entry
                .started
                .as_deref()
                .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        })
        .collect();
    let origin = starts.iter().flatten().min().copied();
    starts
        .iter()
        .map(|start| match (start, origin) {
            (Some(start), Some(origin)) => (*start - origin).num_milliseconds(),
            _ => 0,
        })
        .collect()
}

pub fn save_har(result: &PerformanceResult, path: &str) -> io::Result<()> {
    let text = serde_json::to_string_pretty(&result.har)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, text)
}
