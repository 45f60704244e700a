// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// clap is a popular Rust library for parsing command-line arguments.
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// There is only one thing this tool does, so there are no subcommands:
//
//   travis-pyversion --python-version 3.8
//   travis-pyversion --username octocat --python-version 3.12 --forks
//
// Anything left out on a terminal is asked for interactively (the token
// without echo). Without a terminal a missing Python version is an error.
//
// Rust concepts:
// - Structs: Custom data types that group related data
// - Derive macros: Automatically generate code for our types
// - Option<T>: flags the user may leave out
// - Trait objects: `&dyn Prompt` lets tests answer prompts without a terminal
// =============================================================================

use std::io;

use clap::Parser;
use dialoguer::{Input, Password};
use thiserror::Error;

use crate::github::RepoType;
use crate::pipeline::DEFAULT_CONCURRENCY;

// Environment variables that may hold the login name, checked in this order
const USERNAME_VARS: [&str; 4] = ["LOGNAME", "USER", "LNAME", "USERNAME"];

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
#[derive(Parser, Debug)]
#[command(
    name = "travis-pyversion",
    version,
    about = "Check which of a GitHub user's repositories declare a Python version in .travis.yml",
    long_about = "travis-pyversion lists a GitHub user's public repositories, reads each one's \
                  .travis.yml and reports whether the given Python version is declared. \
                  Matching repositories are printed on stdout, the others on stderr."
)]
pub struct Cli {
    /// GitHub username (defaults to your login name)
    #[arg(long)]
    pub username: Option<String>,

    /// Python version to look for, e.g. 3.8 (asked for on a terminal if left out)
    #[arg(long, value_name = "X.Y")]
    pub python_version: Option<String>,

    /// GitHub token (optional, requests are anonymous without it and may
    /// hit the rate limit)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Which repositories to list
    #[arg(long, value_enum, default_value_t = RepoType::Owner)]
    pub repo_type: RepoType,

    /// Also check forked repositories
    #[arg(long)]
    pub forks: bool,

    /// Maximum number of requests in flight at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Print results as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "GITHUB_API_URL", default_value = crate::github::DEFAULT_API_URL)]
    pub api_url: String,

    /// Base URL serving raw repository files
    #[arg(long, default_value = crate::github::DEFAULT_RAW_URL)]
    pub raw_url: String,
}

/// Errors while working out who and what to check
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no --username given and no login name found in the environment")]
    MissingUsername,

    #[error("--python-version is required when not running on a terminal")]
    MissingPythonVersion,

    #[error("could not read answer: {0}")]
    Prompt(#[from] io::Error),
}

/// Asks the user for a value on the terminal
pub trait Prompt {
    /// Reads a line, offering `default` when given
    fn text(&self, label: &str, default: Option<&str>) -> io::Result<String>;

    /// Reads a line without echoing it
    fn secret(&self, label: &str) -> io::Result<String>;
}

/// Prompts on stderr with dialoguer, so stdout stays clean
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn text(&self, label: &str, default: Option<&str>) -> io::Result<String> {
        let mut input = Input::<String>::new().with_prompt(label);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().map_err(into_io)
    }

    fn secret(&self, label: &str) -> io::Result<String> {
        Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()
            .map_err(into_io)
    }
}

fn into_io(error: dialoguer::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error)
}

/// The values a run needs, after flags, environment and prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInputs {
    pub username: String,
    pub python_version: String,
    pub token: Option<String>,
}

impl Cli {
    /// Fills in what the flags left out.
    ///
    /// With a `prompt` (stdin is a terminal) missing values are asked for.
    /// Without one the username falls back to the login name, the token is
    /// left empty and a missing Python version is an error.
    pub fn resolve_inputs(&self, prompt: Option<&dyn Prompt>) -> Result<RunInputs, InputError> {
        self.resolve_inputs_with(prompt, |var| std::env::var(var).ok())
    }

    fn resolve_inputs_with(
        &self,
        prompt: Option<&dyn Prompt>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<RunInputs, InputError> {
        let username = match (non_empty(&self.username), prompt) {
            (Some(name), _) => name,
            (None, Some(prompt)) => {
                let default = login_name(&lookup);
                non_empty(&Some(prompt.text("GitHub username", default.as_deref())?))
                    .ok_or(InputError::MissingUsername)?
            }
            (None, None) => login_name(&lookup).ok_or(InputError::MissingUsername)?,
        };

        let python_version = match (non_empty(&self.python_version), prompt) {
            (Some(version), _) => version,
            (None, Some(prompt)) => non_empty(&Some(prompt.text("Python version", None)?))
                .ok_or(InputError::MissingPythonVersion)?,
            (None, None) => return Err(InputError::MissingPythonVersion),
        };

        let token = match (non_empty(&self.token), prompt) {
            (Some(token), _) => Some(token),
            (None, Some(prompt)) => non_empty(&Some(
                prompt.secret("GitHub token (leave empty for anonymous fetching)")?,
            )),
            (None, None) => None,
        };

        Ok(RunInputs {
            username,
            python_version,
            token,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// Looks up the login name the same way most Unix tools do
fn login_name(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    USERNAME_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .find(|value| !value.is_empty())
}
