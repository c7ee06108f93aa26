// UI layer: terminal prompts, progress spinners and the plain-text
// renderings of warehouse records. Everything here writes to the terminal
// and nothing talks to the network, so commands stay free to choose
// between this and `--json` output.

use std::time::Duration;

use anyhow::Result;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::config::{Service, ServiceConfig};
use crate::model::{App, DataType, Dataset, Project, Task};

/// Ask for whatever login credential was not given on the command line.
pub fn credentials(username: Option<String>, password: Option<String>) -> Result<(String, String)> {
    let username = match username {
        Some(u) => u,
        None => Input::new().with_prompt("Username").interact_text()?,
    };
    // `Password` hides input in terminal for passwords.
    let password = match password {
        Some(p) => p,
        None => Password::new().with_prompt("Password").interact()?,
    };
    Ok((username, password))
}

/// A spinner on stderr, so stdout stays clean for piping.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_datatypes(datatypes: &[DataType]) {
    for dt in datatypes {
        println!("Id: {}", dt.id);
        println!("Name: {}", dt.name);
        println!("Description: {}", dt.description.as_deref().unwrap_or_default());
        println!("Files:");
        for file in &dt.files {
            let required = if file.required { "(required) " } else { "" };
            println!("  {required}{}: {}", file.field, file.name);
        }
        println!();
    }
}

pub fn print_projects(projects: &[Project]) {
    for project in projects {
        println!("Id: {}", project.id);
        println!("Name: {}", project.name);
        println!("Description: {}", project.description.as_deref().unwrap_or_default());
        println!("Group: {}", project.group);
        if let Some(access) = &project.access {
            println!("Access: {access}");
        }
        println!();
    }
}

pub fn print_apps(apps: &[App]) {
    for app in apps {
        println!("Id: {}", app.id);
        println!("Name: {}", app.name.trim());
        println!("Description: {}", app.description.as_deref().unwrap_or_default().trim());
        println!("Repository: {}", app.github);
        if let Some(doi) = &app.doi {
            println!("DOI: {doi}");
        }
        println!("Inputs:");
        for input in &app.inputs {
            let mut flags = Vec::new();
            if input.optional {
                flags.push("optional");
            }
            if input.multi {
                flags.push("multi");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            println!("  {}: {}{flags}", input.field, input.datatype);
        }
        println!("Outputs:");
        for output in &app.outputs {
            println!("  {}: {}", output.field, output.datatype);
        }
        println!();
    }
}

pub fn print_task(task: &Task) {
    println!("Task: {}", task.id);
    println!("Name: {}", task.name);
    println!("Status: {}", task.status);
    if let Some(msg) = &task.status_msg {
        println!("Message: {msg}");
    }
}

/// Where a dataset can be viewed on the web UI.
pub fn dataset_url(services: &ServiceConfig, dataset: &Dataset) -> String {
    format!(
        "{}/project/{}#object:{}",
        services.url(Service::Main),
        dataset.project,
        dataset.id
    )
}

pub fn print_dataset_urls(services: &ServiceConfig, datasets: &[Dataset]) {
    for dataset in datasets {
        println!("{}", dataset_url(services, dataset));
    }
}
