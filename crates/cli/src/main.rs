use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kron_api::{InProcApi, KronApi, KronError, NormalizedObject};
use kron_core::{project_fields, PolicyConfig};
use serde_json::Value as Json;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kronctl", version, about = "Kron CLI: CronJobs, their Jobs and Pods")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: install namespace, else "default")
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    /// Comma separated namespaces this CLI may touch (overrides KRON_ALLOW_NAMESPACES)
    #[arg(long = "allow-namespaces", global = true)]
    allow_namespaces: Option<String>,

    /// Restrict access to the install namespace only (or set KRON_NAMESPACE_ONLY)
    #[arg(long = "namespace-only", global = true, action = ArgAction::SetTrue)]
    namespace_only: bool,

    /// Namespace Kron is installed in (overrides KRON_NAMESPACE)
    #[arg(long = "install-namespace", global = true)]
    install_namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json, Yaml }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Kind { Cronjob, Job }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Namespaces you may browse
    Namespaces,
    /// List CronJobs (all permitted namespaces unless --ns is given)
    Ls,
    /// Show one CronJob
    Get { name: String },
    /// List Jobs, optionally only those of a CronJob
    Jobs {
        cronjob: Option<String>,
        /// Attach each Job's Pods
        #[arg(long = "pods", action = ArgAction::SetTrue)]
        pods: bool,
        /// Comma separated metadata fields to project (json/yaml output)
        #[arg(long = "fields", value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// List Pods, optionally only those of a Job
    Pods {
        job: Option<String>,
        /// Comma separated metadata fields to project (json/yaml output)
        #[arg(long = "fields", value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Print the last 1000 log lines of a Pod
    Logs { pod: String },
    /// Flip a CronJob's suspend flag
    Suspend { name: String },
    /// Run a CronJob now as a manually triggered Job
    Trigger { cronjob: String },
    /// Create or update a CronJob from a YAML/JSON manifest
    Apply {
        #[arg(short = 'f', long = "file")]
        file: std::path::PathBuf,
    },
    /// Copy a CronJob under a new name
    Clone { name: String, new_name: String },
    /// Delete a CronJob or a Job
    Delete {
        #[arg(value_enum)]
        kind: Kind,
        name: String,
    },
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Namespaces => "namespaces",
            Commands::Ls => "ls",
            Commands::Get { .. } => "get",
            Commands::Jobs { .. } => "jobs",
            Commands::Pods { .. } => "pods",
            Commands::Logs { .. } => "logs",
            Commands::Suspend { .. } => "suspend",
            Commands::Trigger { .. } => "trigger",
            Commands::Apply { .. } => "apply",
            Commands::Clone { .. } => "clone",
            Commands::Delete { .. } => "delete",
        }
    }
}

fn init_tracing() {
    let env = std::env::var("KRON_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KRON_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KRON_METRICS_ADDR; expected host:port");
        }
    }
}

/// Outcome of a command other than success.
enum Failure {
    Absent(String),
    Api(KronError),
    Other(anyhow::Error),
}

impl From<KronError> for Failure {
    fn from(e: KronError) -> Self {
        Failure::Api(e)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Failure::Other(e)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Failure::Other(e.into())
    }
}

impl From<serde_yaml::Error> for Failure {
    fn from(e: serde_yaml::Error) -> Self {
        Failure::Other(e.into())
    }
}

impl Failure {
    fn exit_code(&self) -> u8 {
        match self {
            Failure::Absent(_) => 2,
            Failure::Api(KronError::Denied { .. }) => 3,
            Failure::Api(KronError::Invalid(_)) => 4,
            Failure::Api(_) | Failure::Other(_) => 1,
        }
    }

    fn report(&self) {
        match self {
            Failure::Absent(what) => eprintln!("not found: {what}"),
            Failure::Api(KronError::Remote(env)) => {
                eprintln!("remote error {} {}: {}", env.status, env.reason, env.message);
                if let Ok(body) = serde_json::to_string(env) {
                    eprintln!("{body}");
                }
            }
            Failure::Api(e) => eprintln!("error: {e}"),
            Failure::Other(e) => eprintln!("error: {e:#}"),
        }
    }
}

type CmdResult = std::result::Result<(), Failure>;

fn found<T>(value: Option<T>, what: impl Into<String>) -> std::result::Result<T, Failure> {
    value.ok_or_else(|| Failure::Absent(what.into()))
}

fn print_value(output: Output, value: &Json) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Output::Human | Output::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn print_object(output: Output, obj: &NormalizedObject) -> Result<()> {
    print_value(output, obj.as_value())
}

fn str_at<'a>(obj: &'a NormalizedObject, path: &str) -> &'a str {
    obj.pointer(path).and_then(Json::as_str).unwrap_or("-")
}

fn print_listing(output: Output, items: &[NormalizedObject], fields: &[String]) -> Result<()> {
    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    let rows = if fields.is_empty() {
        Json::Array(items.iter().map(|o| o.as_value().clone()).collect())
    } else {
        Json::Array(project_fields(items, &fields).into_iter().map(Json::Object).collect())
    };
    print_value(output, &rows)
}

async fn run(cli: Cli) -> CmdResult {
    let mut cfg = PolicyConfig::from_env();
    if let Some(csv) = cli.allow_namespaces.clone() {
        cfg.allow_namespaces = Some(csv);
    }
    cfg.namespace_only |= cli.namespace_only;
    if let Some(ns) = cli.install_namespace.clone().filter(|s| !s.trim().is_empty()) {
        cfg.namespace = Some(ns);
    }
    let policy = cfg.resolve().context("resolving namespace policy")?;
    let api = InProcApi::connect(policy).await?;
    let ns = cli.namespace.clone().or_else(|| cfg.namespace.clone()).unwrap_or_else(|| "default".to_string());
    let out = cli.output;
    metrics::counter!("kron_cli_commands_total", 1u64, "cmd" => cli.command.label());

    match cli.command {
        Commands::Namespaces => {
            let names = api.list_namespaces().await?;
            match out {
                Output::Human => names.iter().for_each(|n| println!("{n}")),
                _ => print_value(out, &serde_json::to_value(&names)?)?,
            }
        }
        Commands::Ls => {
            let scope = cli.namespace.as_deref();
            info!(ns = ?scope, "ls invoked");
            let refs = api.list_cronjobs(scope).await?;
            match out {
                Output::Human => {
                    println!("{:<20} NAME", "NAMESPACE");
                    for r in &refs {
                        println!("{:<20} {}", r.namespace.as_deref().unwrap_or("-"), r.name);
                    }
                }
                _ => print_value(out, &serde_json::to_value(&refs)?)?,
            }
        }
        Commands::Get { name } => {
            let cj = found(api.get_cronjob(&ns, &name).await?, format!("cronjob {ns}/{name}"))?;
            print_object(out, &cj)?;
        }
        Commands::Jobs { cronjob, pods, fields } => {
            let owner = cronjob.as_deref();
            let jobs = if pods { api.list_jobs_with_pods(&ns, owner).await? } else { api.list_jobs(&ns, owner).await? };
            match out {
                Output::Human => {
                    println!("{:<40} {:<14} {:<9} {:<7} PODS", "NAME", "AGE", "SUCCEEDED", "FAILED");
                    for j in &jobs {
                        let count = |p: &str| j.pointer(p).and_then(Json::as_i64).unwrap_or(0);
                        let pod_names: Vec<&str> = j
                            .pointer("/pods")
                            .and_then(Json::as_array)
                            .map(|ps| ps.iter().filter_map(|p| p.pointer("/metadata/name").and_then(Json::as_str)).collect())
                            .unwrap_or_default();
                        println!(
                            "{:<40} {:<14} {:<9} {:<7} {}",
                            j.name().unwrap_or("-"),
                            str_at(j, "/status/age"),
                            count("/status/succeeded"),
                            count("/status/failed"),
                            if pods { pod_names.join(",") } else { "-".to_string() }
                        );
                    }
                }
                _ => print_listing(out, &jobs, &fields)?,
            }
        }
        Commands::Pods { job, fields } => {
            let pods = api.list_pods(&ns, job.as_deref()).await?;
            match out {
                Output::Human => {
                    println!("{:<50} {:<10} AGE", "NAME", "PHASE");
                    for p in &pods {
                        println!("{:<50} {:<10} {}", p.name().unwrap_or("-"), str_at(p, "/status/phase"), str_at(p, "/status/age"));
                    }
                }
                _ => print_listing(out, &pods, &fields)?,
            }
        }
        Commands::Logs { pod } => {
            let text = api.pod_logs(&ns, &pod).await?;
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
        }
        Commands::Suspend { name } => {
            let cj = found(api.toggle_suspend(&ns, &name).await?, format!("cronjob {ns}/{name}"))?;
            match out {
                Output::Human => {
                    let suspended = cj.pointer("/spec/suspend").and_then(Json::as_bool).unwrap_or(false);
                    println!("cronjob {ns}/{name} {}", if suspended { "suspended" } else { "resumed" });
                }
                _ => print_object(out, &cj)?,
            }
        }
        Commands::Trigger { cronjob } => {
            let job = found(api.trigger(&ns, &cronjob).await?, format!("cronjob {ns}/{cronjob}"))?;
            match out {
                Output::Human => println!("job {ns}/{} created", job.name().unwrap_or("-")),
                _ => print_object(out, &job)?,
            }
        }
        Commands::Apply { file } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            // YAML is a superset of JSON; one parser covers both.
            let spec: Json = serde_yaml::from_str(&text)?;
            let cj = api.upsert_cronjob(&ns, spec).await?;
            match out {
                Output::Human => println!("cronjob {ns}/{} applied", cj.name().unwrap_or("-")),
                _ => print_object(out, &cj)?,
            }
        }
        Commands::Clone { name, new_name } => {
            let cj = found(api.clone_cronjob(&ns, &name, &new_name).await?, format!("cronjob {ns}/{name}"))?;
            match out {
                Output::Human => println!("cronjob {ns}/{} created from {name}", cj.name().unwrap_or("-")),
                _ => print_object(out, &cj)?,
            }
        }
        Commands::Delete { kind, name } => {
            let (label, deleted) = match kind {
                Kind::Cronjob => ("cronjob", api.delete_cronjob(&ns, &name).await?),
                Kind::Job => ("job", api.delete_job(&ns, &name).await?),
            };
            let obj = found(deleted, format!("{label} {ns}/{name}"))?;
            match out {
                Output::Human => println!("{label} {ns}/{name} deleted"),
                _ => print_object(out, &obj)?,
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cmd = cli.command.label();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(f) => {
            if let Failure::Api(e) = &f {
                error!(cmd, http_status = e.http_status(), error = %e, "command failed");
            }
            f.report();
            ExitCode::from(f.exit_code())
        }
    }
}
