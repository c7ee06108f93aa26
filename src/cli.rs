// Command line interface for `bl`: argument definitions and one handler
// per subcommand. Handlers return the process exit code; errors bubble up
// to `main` as `anyhow::Error`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;

use crate::api::{ApiClient, AppQuery, DatatypeQuery, ProjectQuery};
use crate::auth::{AuthRequest, Claims, LoginMethod, TokenStore};
use crate::run::{run_app, AppRun, InputBinding};
use crate::ui;
use crate::upload::{parse_file_args, upload_dataset, upload_metadata, Upload};
use crate::wait::{wait_task, WaitOptions};

/// Command line client for the brainlife neuroimaging platform
#[derive(Parser, Debug)]
#[command(name = "bl", version)]
pub struct Cli {
    /// Brainlife host (default: $BL_HOST or brainlife.io)
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "brainlife=debug")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session token
    Login(LoginArgs),

    /// Show who the stored token belongs to
    Whoami,

    /// Projects
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Datatypes
    #[command(subcommand)]
    Datatype(DatatypeCommand),

    /// Apps
    #[command(subcommand)]
    App(AppCommand),

    /// Tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Datasets
    #[command(subcommand)]
    Data(DataCommand),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Log in through LDAP instead of a local account
    #[arg(long)]
    pub ldap: bool,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// Days until the session expires
    #[arg(long, default_value_t = 7)]
    pub ttl: u64,
}

/// Paging and output flags shared by the query commands.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Skip N results
    #[arg(short, long)]
    pub skip: Option<u32>,

    /// Number of results to show
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Query projects
    Query {
        /// Filter by id
        #[arg(short, long)]
        id: Option<String>,
        /// Filter by name or description
        #[arg(short, long)]
        query: Option<String>,
        #[command(flatten)]
        args: QueryArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum DatatypeCommand {
    /// Query datatypes
    Query {
        /// Filter by id
        #[arg(short, long)]
        id: Option<String>,
        /// Datatype name or id
        #[arg(short, long)]
        query: Option<String>,
        #[command(flatten)]
        args: QueryArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppCommand {
    /// Query apps
    Query {
        /// Filter by id
        #[arg(short, long)]
        id: Option<String>,
        /// Filter by name
        #[arg(short, long)]
        query: Option<String>,
        /// Require an input of this datatype (name or id)
        #[arg(long)]
        input_datatype: Vec<String>,
        /// Require an output of this datatype (name or id)
        #[arg(long)]
        output_datatype: Vec<String>,
        #[command(flatten)]
        args: QueryArgs,
    },

    /// Run an app on datasets
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// App id
    #[arg(long)]
    pub id: String,

    /// Project the outputs are archived to
    #[arg(long)]
    pub project: String,

    /// Input binding `<field>:<dataset id>`; repeat for multi inputs
    #[arg(long = "input", required = true)]
    pub inputs: Vec<InputBinding>,

    /// App config as a JSON object
    #[arg(long)]
    pub config: Option<String>,

    /// Preferred resource (id or name)
    #[arg(long)]
    pub resource: Option<String>,

    /// Tag put on every archived output
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Run under an existing instance
    #[arg(long)]
    pub instance: Option<String>,

    /// Wait for the task and its outputs
    #[arg(long)]
    pub wait: bool,

    /// Output the submitted task as JSON
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Wait for a task to finish and its outputs to be archived
    Wait {
        id: String,
        /// Seconds between polls
        #[arg(long, default_value_t = 3)]
        interval: u64,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DataCommand {
    /// Upload a dataset; give each file as `--<file id> <path>`
    Upload(UploadArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Project id or name
    #[arg(short, long)]
    pub project: String,

    /// Datatype name or id
    #[arg(short, long)]
    pub datatype: String,

    /// Datatype tag; repeatable
    #[arg(long = "datatype_tag")]
    pub datatype_tags: Vec<String>,

    /// Dataset tag; repeatable
    #[arg(short = 't', long = "tag")]
    pub tags: Vec<String>,

    /// Description of the dataset
    #[arg(short = 'n', long)]
    pub description: Option<String>,

    /// (metadata) subject of the uploaded dataset
    #[arg(short, long)]
    pub subject: String,

    /// (metadata) session of the uploaded dataset
    #[arg(short = 'e', long)]
    pub session: Option<String>,

    /// (metadata) run of the uploaded dataset
    #[arg(short, long)]
    pub run: Option<String>,

    /// Sidecar JSON file with additional metadata
    #[arg(short, long)]
    pub meta: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Datatype files as `--<file id> <path>`. Everything from the first
    /// file flag on lands here, so a trailing `-j`/`--json` is picked out
    /// again by the handler.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "FILES")]
    pub files: Vec<String>,
}

fn authed(host: Option<&str>) -> Result<ApiClient> {
    let api = ApiClient::for_host(host)?;
    api.ensure_auth()?;
    Ok(api)
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let host = cli.host.as_deref();
    match cli.command {
        Commands::Login(args) => login(host, args),
        Commands::Whoami => whoami(host),
        Commands::Project(ProjectCommand::Query { id, query, args }) => {
            let api = authed(host)?;
            let projects = api.query_projects(&ProjectQuery {
                id,
                search: query,
                skip: args.skip,
                limit: args.limit,
                ..Default::default()
            })?;
            if projects.is_empty() {
                eprintln!("No projects found");
                return Ok(ExitCode::FAILURE);
            }
            if args.json {
                ui::print_json(&projects)?;
            } else {
                ui::print_projects(&projects);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Datatype(DatatypeCommand::Query { id, query, args }) => {
            let api = authed(host)?;
            let datatypes = api.query_datatypes(&DatatypeQuery {
                id,
                search: query,
                skip: args.skip,
                limit: args.limit,
                ..Default::default()
            })?;
            if datatypes.is_empty() {
                eprintln!("No datatypes found");
                return Ok(ExitCode::FAILURE);
            }
            if args.json {
                ui::print_json(&datatypes)?;
            } else {
                ui::print_datatypes(&datatypes);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::App(AppCommand::Query {
            id,
            query,
            input_datatype,
            output_datatype,
            args,
        }) => {
            let api = authed(host)?;
            let apps = api.query_apps(&AppQuery {
                id,
                name: query,
                input_datatypes: input_datatype,
                output_datatypes: output_datatype,
                skip: args.skip,
                limit: args.limit,
                ..Default::default()
            })?;
            if apps.is_empty() {
                eprintln!("No apps found");
                return Ok(ExitCode::FAILURE);
            }
            if args.json {
                ui::print_json(&apps)?;
            } else {
                ui::print_apps(&apps);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::App(AppCommand::Run(args)) => app_run(host, args),
        Commands::Task(TaskCommand::Wait { id, interval, timeout }) => {
            let api = authed(host)?;
            let mut opts = WaitOptions::default().interval(Duration::from_secs(interval));
            if let Some(secs) = timeout {
                opts = opts.timeout(Duration::from_secs(secs));
            }
            let spinner = ui::spinner(format!("Waiting for task {id}"));
            let datasets = wait_task(&api, &id, &opts);
            spinner.finish_and_clear();
            ui::print_dataset_urls(api.services(), &datasets?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Data(DataCommand::Upload(args)) => data_upload(host, args),
    }
}

fn login(host: Option<&str>, args: LoginArgs) -> Result<ExitCode> {
    let api = ApiClient::for_host(host)?;
    let (username, password) = ui::credentials(args.username, args.password)?;
    let method = if args.ldap { LoginMethod::Ldap } else { LoginMethod::Local };

    let spinner = ui::spinner("Logging in...");
    let result = api.login(method, &AuthRequest::new(username, password, args.ttl));
    spinner.finish_and_clear();

    let token = result.context("login failed")?;
    let store = TokenStore::for_host(api.services().host());
    store.save(&token)?;
    info!(path = %store.path().display(), "token saved");
    println!("Login successful");
    Ok(ExitCode::SUCCESS)
}

fn whoami(host: Option<&str>) -> Result<ExitCode> {
    let api = authed(host)?;
    let token = api.token().unwrap_or_default();
    let claims = Claims::decode(token)?;
    println!("User: {}", claims.username().unwrap_or("(unknown)"));
    match claims.sub.as_str() {
        Some(sub) => println!("Subject: {sub}"),
        None => println!("Subject: {}", claims.sub),
    }
    if !claims.gids.is_empty() {
        let gids: Vec<String> = claims.gids.iter().map(i64::to_string).collect();
        println!("Groups: {}", gids.join(", "));
    }
    if let Some(exp) = claims.exp.and_then(|e| Utc.timestamp_opt(e, 0).single()) {
        println!("Expires: {}", exp.to_rfc3339());
    }
    Ok(ExitCode::SUCCESS)
}

fn app_run(host: Option<&str>, args: RunArgs) -> Result<ExitCode> {
    let config: Map<String, Value> = match &args.config {
        Some(raw) => match serde_json::from_str::<Value>(raw).context("--config is not valid JSON")? {
            Value::Object(map) => map,
            _ => bail!("--config must be a JSON object"),
        },
        None => Map::new(),
    };
    let api = authed(host)?;

    let run = AppRun {
        app_id: args.id,
        project_id: args.project,
        inputs: args.inputs,
        config,
        resource: args.resource,
        tags: args.tags,
        instance_id: args.instance,
    };
    let task = run_app(&api, &run)?;
    if args.json {
        ui::print_json(&task)?;
    } else {
        ui::print_task(&task);
    }

    if args.wait {
        let spinner = ui::spinner(format!("Waiting for task {}", task.id));
        let datasets = wait_task(&api, &task.id, &WaitOptions::default());
        spinner.finish_and_clear();
        ui::print_dataset_urls(api.services(), &datasets?);
    }
    Ok(ExitCode::SUCCESS)
}

fn data_upload(host: Option<&str>, args: UploadArgs) -> Result<ExitCode> {
    let api = authed(host)?;

    let Some(datatype) = api
        .query_datatypes(&DatatypeQuery {
            search: Some(args.datatype.clone()),
            ..Default::default()
        })?
        .into_iter()
        .next()
    else {
        eprintln!("No datatypes found for {}", args.datatype);
        return Ok(ExitCode::FAILURE);
    };
    let (trailing_json, file_args) = split_json_flag(&args.files);
    let json = args.json || trailing_json;
    let files = parse_file_args(&datatype, &file_args)?;

    let meta = upload_metadata(
        args.meta.as_deref(),
        &args.subject,
        args.session.as_deref(),
        args.run.as_deref(),
    )?;
    let mut tags = args.tags;
    if let Some(run) = &args.run {
        tags.push(format!("run-{run}"));
    }

    let project = api
        .find_project(&args.project)
        .with_context(|| format!("No project found for {}", args.project))?;

    let upload = Upload {
        project,
        datatype,
        files,
        description: args.description,
        tags,
        datatype_tags: args.datatype_tags,
        meta,
    };

    let spinner = ui::spinner("Uploading...");
    let datasets = upload_dataset(&api, &upload, &WaitOptions::default());
    spinner.finish_and_clear();
    let datasets = datasets?;

    if json {
        ui::print_json(&datasets)?;
    } else {
        ui::print_dataset_urls(api.services(), &datasets);
    }
    Ok(ExitCode::SUCCESS)
}

/// Remove `-j`/`--json` given among the trailing file flags. The token
/// after a bare `--<file id>` is a path and is kept as is.
fn split_json_flag(args: &[String]) -> (bool, Vec<String>) {
    let mut json = false;
    let mut files = Vec::with_capacity(args.len());
    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-j" | "--json" => json = true,
            flag if flag.starts_with("--") && !flag.contains('=') => {
                files.push(arg.clone());
                files.extend(rest.next().cloned());
            }
            _ => files.push(arg.clone()),
        }
    }
    (json, files)
}
