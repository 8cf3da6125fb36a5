use anyhow::{anyhow, Result};
use console::style;

use crate::api::{Context, HttpTransport, Transport};
use crate::credentials::{CredentialStore, Credentials};
use crate::job::LoadTest;
use crate::output;
use crate::parser;
use crate::results::TestResult;

/// Parses the curl-style tokens, submits the plan and tracks the job until
/// it settles, printing the mode-specific result.
pub async fn run_curl(host: Option<String>, tokens: Vec<String>) -> Result<()> {
    // a single token may be a whole quoted command line
    let plan = if tokens.len() == 1 {
        parser::parse(&tokens[0])?
    } else {
        parser::parse_args(tokens)?
    };

    if plan.help {
        print_help();
        return Ok(());
    }

    let credentials = stored_or_fresh_credentials(host.clone()).await?;
    let ctx = Context::new(host, credentials.user, credentials.api_key);
    let transport = HttpTransport::new(&ctx)?;

    let test = LoadTest::new(plan);
    let plan = test.plan().clone();
    let mode = test.mode();
    let job = test.queue(&transport).await?;
    println!(
        "{} job {} queued in {}",
        mode,
        style(job.job_id()).green(),
        job.region()
    );

    let result = tokio::select! {
        result = job.await_result() => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", style("aborting...").yellow());
            job.abort().await;
            std::process::exit(130);
        }
    };

    match result {
        TestResult::Sprint(sprint) => output::print_sprint(&plan, &sprint),
        TestResult::Rush(rush) => {
            output::print_rush(&rush);
            if let Some(path) = &plan.output {
                let mut file = std::fs::File::create(path)?;
                output::write_rush_csv(&mut file, &rush)?;
                println!("timeline written to {path}");
            }
        }
        TestResult::Performance(performance) => {
            output::print_performance(&performance);
            if let Some(path) = &plan.har_file {
                output::save_har(&performance, path)?;
                println!("har written to {path}");
            }
            if let Some(path) = &plan.screenshot_file {
                let bytes = performance.fetch_screenshot(&transport).await?;
                std::fs::write(path, bytes)?;
                println!("screenshot written to {path}");
            }
        }
    }

    Ok(())
}

/// Drops any stored credentials and stores a freshly verified pair.
pub async fn run_init(
    host: Option<String>,
    user: Option<String>,
    api_key: Option<String>,
) -> Result<()> {
    let store = credential_store()?;
    store.clear();
    login(host, &store, user, api_key).await?;
    println!("You are now ready to run load tests!");
    println!(
        "Try {} to learn more about the command line.",
        style("barrage curl --help").green()
    );
    Ok(())
}

fn credential_store() -> Result<CredentialStore> {
    CredentialStore::new().ok_or_else(|| anyhow!("cannot locate a home directory"))
}

async fn stored_or_fresh_credentials(host: Option<String>) -> Result<Credentials> {
    let store = credential_store()?;
    match store.read() {
        Some(credentials) => Ok(credentials),
        None => login(host, &store, None, None).await,
    }
}

/// Verifies a user id / API key pair against the service and persists the
/// canonical key it returns. Exits with code 1 when the service says no.
async fn login(
    host: Option<String>,
    store: &CredentialStore,
    user: Option<String>,
    api_key: Option<String>,
) -> Result<Credentials> {
    let (user, api_key) = match (user, api_key) {
        (Some(user), Some(api_key)) => (user, api_key),
        _ => prompt_credentials()?,
    };

    let ctx = Context::new(host, user.clone(), api_key);
    let transport = HttpTransport::new(&ctx)?;
    let response = transport.login().await?;

    let api_key = match (response.api_key, response.error) {
        (Some(api_key), None) => api_key,
        _ => {
            eprintln!("{}", style("Authentication failed").red());
            std::process::exit(1);
        }
    };

    let credentials = Credentials { user, api_key };
    if let Err(error) = store.write(&credentials) {
        tracing::warn!(%error, "could not persist credentials");
    }
    Ok(credentials)
}

fn prompt_credentials() -> Result<(String, String)> {
    println!(
        "Enter your barrage credentials. You can find these in {}.",
        style("Settings/API-Key").green()
    );
    let user = prompt("User-ID: ")?;
    let api_key = prompt("API-Key: ")?;
    Ok((user, api_key))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn print_help() {
    println!(
        r#"usage: barrage curl [options...] <url> [[options...] <url>]...

Compiles a curl-style command line into a load test and runs it remotely.
Multiple URLs build a multi-step transaction.

 -A, --user-agent <agent>    User-Agent to send to the target
 -b, --cookie <name=value>   Cookie to send to the target (repeatable)
 -c, --screenshot <file>     Save a screenshot (requires --har)
 -d, --data <data|@file>     Body fragment for a PUT or POST (repeatable)
 -D, --dump-header <file>    Write request/response headers to a file, or
                             to the console when the file is '-'
 -e, --referer <url>         Referer URL
 -h, --help                  Show this help
 -H, --header <header>       Custom request header (repeatable)
 -k, --keepalive             Reuse connections between steps
 -o, --output <file>         Write the rush timeline as CSV
 -p, --pattern <ramp>        Load ramp: 'start-end:duration' intervals
                             separated by commas, a bare duration to hold
                             the last level, or a multi-region form
                             '[region:start-end,...]:duration'
 -r, --region <region>       Region to run the test from
 -R, --dump-har <file>       Save the HAR document (requires --har)
 -s, --status <code>         Assert on the response status code
 -T, --timeout <ms>          Connect/response timeout in milliseconds
 -u, --user <user:password>  Basic authentication credentials
 -v:<name> <generator>       Variable generator for the step: 'list[a,b]',
                             'alpha', 'a[min,max[,count]]', 'number',
                             'n[min,max[,count]]', 'udid' or 'uuid'
 -V, --verbose               Print request/response contents
 -x:c <name>                 Extract a response cookie by name
                             (alias --xtract:cookie)
 -X, --request <method>      Request method (GET, HEAD, PUT, POST)
 -1, --tlsv1                 Pin TLSv1
 -2, --sslv2                 Pin SSLv2
 -3, --sslv3                 Pin SSLv3
     --har                   Run a browser-level performance test
"#
    );
}
