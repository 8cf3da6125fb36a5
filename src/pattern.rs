use lazy_static::lazy_static;
use regex::Regex;
use std::collections::VecDeque;

use crate::error::InvalidPatternError;
use crate::plan::{Affinity, Interval, RegionLoad, TestPlan};

lazy_static! {
    static ref RE_INTERVAL: Regex = Regex::new(r"^(\d+)-(\d+):(\d+)$").unwrap();
    static ref RE_DIGITS: Regex = Regex::new(r"^\d+$").unwrap();
    static ref RE_MR_END: Regex = Regex::new(r"\]:(\d+)$").unwrap();
    static ref RE_MR_WHOLE: Regex = Regex::new(r"^\[([^\]]+)\]:(\d+)$").unwrap();
}

/// Compiles one `-p` value onto the plan's pattern container.
///
/// A value containing `[` opens the multi-region form, which may have been
/// split across several argv tokens on whitespace that was meant to be
/// literal; the remaining tokens are consumed until the closing
/// `]:<duration>` marker shows up. Everything else is a comma-separated
/// list of `start-end:duration` intervals, where a bare integer continues
/// the previous interval at its end level.
pub fn compile(
    value: String,
    argv: &mut VecDeque<String>,
    plan: &mut TestPlan,
) -> Result<(), InvalidPatternError> {
    if value.contains('[') {
        return compile_regions(value, argv, plan);
    }

    for entry in value.split(',') {
        let interval = match RE_INTERVAL.captures(entry) {
            Some(caps) => Interval {
                iterations: 1,
                start: number(&caps[1])?,
                end: number(&caps[2])?,
                duration: number(&caps[3])?,
                affinity: None,
            },
            None => {
                // a bare duration holds the previous interval's end level;
                // without a previous interval there is nothing to hold
                let last_end = plan
                    .pattern
                    .as_ref()
                    .and_then(|pattern| pattern.intervals.last())
                    .map(|interval| interval.end)
                    .ok_or(InvalidPatternError)?;
                if !RE_DIGITS.is_match(entry) {
                    return Err(InvalidPatternError);
                }
                Interval {
                    iterations: 1,
                    start: last_end,
                    end: last_end,
                    duration: number(entry)?,
                    affinity: None,
                }
            }
        };
        plan.pattern_mut().intervals.push(interval);
    }
    Ok(())
}

fn compile_regions(
    mut value: String,
    argv: &mut VecDeque<String>,
    plan: &mut TestPlan,
) -> Result<(), InvalidPatternError> {
    // still open: pull tokens until the ]:duration marker terminates the
    // form; running dry falls through to the shape check below
    while !RE_MR_END.is_match(&value) {
        match argv.pop_front() {
            Some(next) => value.push_str(&next),
            None => break,
        }
    }

    let caps = RE_MR_WHOLE.captures(&value).ok_or(InvalidPatternError)?;
    let duration = number(&caps[2])?;

    let mut regions = Vec::new();
    let mut total_start = 0u64;
    let mut total_end = 0u64;
    for clause in caps[1].split(',') {
        // trailing :-separated fields beyond the range are tolerated
        let mut parts = clause.splitn(3, ':');
        let region = parts.next().ok_or(InvalidPatternError)?;
        let range = parts.next().ok_or(InvalidPatternError)?;

        let mut bounds = range.splitn(3, '-');
        let start = number(bounds.next().ok_or(InvalidPatternError)?)?;
        let end = number(bounds.next().ok_or(InvalidPatternError)?)?;

        total_start += start;
        total_end += end;
        regions.push(RegionLoad {
            region: region.to_string(),
            start,
            end,
        });
    }

    plan.pattern_mut().intervals.push(Interval {
        iterations: 1,
        start: total_start,
        end: total_end,
        duration,
        affinity: Some(Affinity { regions }),
    });
    Ok(())
}

fn number(text: &str) -> Result<u64, InvalidPatternError> {
    text.parse().map_err(|_| InvalidPatternError)
}
