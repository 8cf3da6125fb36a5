use lazy_static::lazy_static;
use regex::Regex;
use std::collections::VecDeque;
use std::fs;

use crate::error::ParseError;
use crate::pattern;
use crate::plan::{Content, ExtractKind, Extraction, SslVersion, Step, TestPlan, Variable};

/// Combined body fragments per step must stay below this.
pub const MAX_CONTENT_BYTES: usize = 20 * 1024;

lazy_static! {
    static ref RE_DQ_STRING: Regex =
        Regex::new(r#"^"[^"\\\r\n]*(?:\\.[^"\\\r\n]*)*""#).unwrap();
    static ref RE_SQ_STRING: Regex =
        Regex::new(r"^'[^'\\\r\n]*(?:\\.[^'\\\r\n]*)*'").unwrap();
    static ref RE_XTRACT_NAME: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z_0-9]*$").unwrap();
    static ref RE_VARIABLE_NAME: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9]*$").unwrap();
    static ref RE_VAR_LIST: Regex = Regex::new(r"^(?:list)?\[([^\]]+)\]$").unwrap();
    static ref RE_VAR_ALPHA: Regex = Regex::new(r"^(?:a|alpha)$").unwrap();
    static ref RE_VAR_ALPHA_RANGE: Regex =
        Regex::new(r"^(?:a|alpha)\[(\d+),(\d+)(?:,(\d+))?\]$").unwrap();
    static ref RE_VAR_NUMBER: Regex = Regex::new(r"^(?:n|number)$").unwrap();
    static ref RE_VAR_NUMBER_RANGE: Regex =
        Regex::new(r"^(?:n|number)\[(-?\d+),(-?\d+)(?:,(\d+))?\]$").unwrap();
    static ref RE_VAR_UDID: Regex = Regex::new(r"^(?:u|udid)$").unwrap();
    static ref RE_VAR_UUID: Regex = Regex::new(r"^uuid$").unwrap();
}

/// Splits a raw command string into shell-like tokens. Quoted sections keep
/// embedded whitespace, surrounding quotes are stripped, and escapes inside
/// quotes are left as written. Never fails: an unterminated quote is just
/// consumed as ordinary non-whitespace text.
pub fn tokenize(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = command;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(quoted) = RE_DQ_STRING
            .find(rest)
            .or_else(|| RE_SQ_STRING.find(rest))
        {
            tokens.push(rest[1..quoted.end() - 1].to_string());
            rest = &rest[quoted.end()..];
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(rest[..end].to_string());
            rest = &rest[end..];
        }
    }
    tokens
}

/// Compiles a full command string into a test plan.
pub fn parse(command: &str) -> Result<TestPlan, ParseError> {
    parse_args(tokenize(command))
}

/// Compiles an already-split token list into a test plan. Tokens are
/// consumed flag by flag until a bare URL closes the current step; leftover
/// tokens start the next step.
pub fn parse_args<I>(argv: I) -> Result<TestPlan, ParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut argv: VecDeque<String> = argv.into_iter().collect();
    let mut plan = TestPlan::default();

    while !argv.is_empty() {
        let mut builder = StepBuilder::default();

        while argv.front().map_or(false, |token| token.starts_with('-')) {
            let key = argv.pop_front().unwrap();
            dispatch_flag(&key, &mut argv, &mut plan, &mut builder)?;
        }

        if builder.content_bytes() >= MAX_CONTENT_BYTES {
            return Err(ParseError::ContentTooLarge);
        }

        if plan.help {
            // help short-circuits; the pending step is discarded
            return Ok(plan);
        }

        let url = argv.pop_front().ok_or(ParseError::NoUrl)?;
        plan.steps.push(builder.close(url));
    }

    if plan.steps.is_empty() {
        return Err(ParseError::NoUrl);
    }
    Ok(plan)
}

/// Accumulates per-step flag values until a URL token closes the step.
#[derive(Default)]
struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    fn push_data(&mut self, fragment: String) {
        self.step
            .content
            .get_or_insert_with(Content::default)
            .data
            .push(fragment);
    }

    fn content_bytes(&self) -> usize {
        self.step.content.as_ref().map_or(0, Content::byte_len)
    }

    fn close(mut self, url: String) -> Step {
        self.step.url = url;
        self.step
    }
}

fn shift(key: &str, argv: &mut VecDeque<String>) -> Result<String, ParseError> {
    argv.pop_front()
        .ok_or_else(|| ParseError::MissingValue(key.to_string()))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        flag: key.to_string(),
        value: value.to_string(),
    })
}

fn dispatch_flag(
    key: &str,
    argv: &mut VecDeque<String>,
    plan: &mut TestPlan,
    builder: &mut StepBuilder,
) -> Result<(), ParseError> {
    match key {
        "-A" | "--user-agent" => builder.step.user_agent = Some(shift(key, argv)?),
        "-b" | "--cookie" => builder.step.cookies.push(shift(key, argv)?),
        "-d" | "--data" => {
            let value = shift(key, argv)?;
            let fragment = match value.strip_prefix('@') {
                Some(path) => fs::read_to_string(path).map_err(|source| ParseError::BodyFile {
                    path: path.to_string(),
                    source,
                })?,
                None => value,
            };
            builder.push_data(fragment);
        }
        "-D" | "--dump-header" => {
            // "-" means stdout and is the one value allowed to look like a flag
            let value = if argv.front().map_or(false, |token| token == "-") {
                argv.pop_front().unwrap()
            } else {
                shift(key, argv)?
            };
            plan.dump_header = Some(value);
        }
        "-e" | "--referer" => builder.step.referer = Some(shift(key, argv)?),
        "-h" | "--help" => plan.help = true,
        "-H" | "--header" => builder.step.headers.push(shift(key, argv)?),
        "-p" | "--pattern" => {
            let value = shift(key, argv)?;
            pattern::compile(value, argv, plan)?;
        }
        "-r" | "--region" => plan.region = Some(shift(key, argv)?),
        "-k" | "--keepalive" => plan.keepalive = true,
        "-s" | "--status" => {
            let value = shift(key, argv)?;
            builder.step.status = Some(parse_number(key, &value)?);
        }
        "-T" | "--timeout" => {
            let value = shift(key, argv)?;
            builder.step.timeout = Some(parse_number(key, &value)?);
        }
        "-u" | "--user" => builder.step.user = Some(shift(key, argv)?),
        "-X" | "--request" => builder.step.request = Some(shift(key, argv)?),
        "--har" => plan.har = true,
        "-c" | "--screenshot" => {
            if !plan.har {
                return Err(ParseError::ScreenshotWithoutHar);
            }
            plan.screenshot_file = Some(shift(key, argv)?);
        }
        "-R" | "--dump-har" => {
            if !plan.har {
                return Err(ParseError::DumpHarWithoutHar);
            }
            plan.har_file = Some(shift(key, argv)?);
        }
        "-V" | "--verbose" => plan.verbose = true,
        "-1" | "--tlsv1" => builder.step.ssl = Some(SslVersion::Tlsv1),
        "-2" | "--sslv2" => builder.step.ssl = Some(SslVersion::Sslv2),
        "-3" | "--sslv3" => builder.step.ssl = Some(SslVersion::Sslv3),
        "-o" | "--output" => plan.output = Some(shift(key, argv)?),
        _ if key.starts_with("-x:c") || key.starts_with("--xtract:cookie") => {
            let name = shift(key, argv)?;
            if !RE_XTRACT_NAME.is_match(&name) {
                return Err(ParseError::ExtractName(name));
            }
            builder.step.xtracts.insert(
                name,
                Extraction {
                    kind: ExtractKind::Cookie,
                },
            );
        }
        _ => {
            let name = key
                .strip_prefix("--variable:")
                .or_else(|| key.strip_prefix("-v:"));
            match name {
                Some(name) => {
                    let name = name.to_string();
                    let args = shift(key, argv)?;
                    if !RE_VARIABLE_NAME.is_match(&name) {
                        return Err(ParseError::VariableName(name));
                    }
                    let variable = parse_variable(&name, &args)?;
                    // last declaration for a name wins
                    builder.step.variables.insert(name, variable);
                }
                None => return Err(ParseError::UnknownOption(key.to_string())),
            }
        }
    }
    Ok(())
}

fn parse_variable(name: &str, args: &str) -> Result<Variable, ParseError> {
    let invalid = || ParseError::VariableArgs {
        name: name.to_string(),
        args: args.to_string(),
    };

    if let Some(caps) = RE_VAR_LIST.captures(args) {
        return Ok(Variable::List {
            entries: split_list(&caps[1]),
        });
    }
    if RE_VAR_ALPHA.is_match(args) {
        return Ok(Variable::Alpha {
            min: None,
            max: None,
            count: None,
        });
    }
    if let Some(caps) = RE_VAR_ALPHA_RANGE.captures(args) {
        return Ok(Variable::Alpha {
            min: Some(caps[1].parse().map_err(|_| invalid())?),
            max: Some(caps[2].parse().map_err(|_| invalid())?),
            count: Some(match caps.get(3) {
                Some(count) => count.as_str().parse().map_err(|_| invalid())?,
                None => 1000,
            }),
        });
    }
    if RE_VAR_NUMBER.is_match(args) {
        return Ok(Variable::Number {
            min: None,
            max: None,
            count: None,
        });
    }
    if let Some(caps) = RE_VAR_NUMBER_RANGE.captures(args) {
        return Ok(Variable::Number {
            min: Some(caps[1].parse().map_err(|_| invalid())?),
            max: Some(caps[2].parse().map_err(|_| invalid())?),
            count: Some(match caps.get(3) {
                Some(count) => count.as_str().parse().map_err(|_| invalid())?,
                None => 1000,
            }),
        });
    }
    if RE_VAR_UDID.is_match(args) {
        return Ok(Variable::Udid);
    }
    if RE_VAR_UUID.is_match(args) {
        return Ok(Variable::Uuid);
    }
    Err(invalid())
}

/// Splits a list body on commas, honoring `\,` as a literal comma.
fn split_list(expr: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = expr.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() == Some(&',') {
            current.push(',');
            chars.next();
        } else if ch == ',' {
            entries.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        entries.push(current);
    }
    entries
}
