//! CLI entry point for the tracker client.
//!
//! One command per invocation: reads go through the sync layer like any
//! bound view would, writes through the mutation layer. Results are printed
//! as JSON on stdout; logs and warnings go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use tracker_core::TrackerConfig;
use tracker_graph::mutations::{
    AddTaskComment, CreateOrganization, CreateProject, CreateTask, UpdateProject, UpdateTask,
};
use tracker_graph::Mutation;
use tracker_sync::{
    MutationHooks, OrganizationBySlug, Organizations, ProjectById, ProjectStatsQuery, Projects,
    QueryState, SyncClient, TaskById,
};

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Multi-tenant project and task tracker client")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Organization slug to act as (default: from config).
    #[arg(long, global = true)]
    org: Option<String>,

    /// Config file prefix (default: tracker).
    #[arg(short, long, default_value = "tracker", global = true)]
    config: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List all projects.
    Projects,
    /// Show a project with its tasks.
    Project { id: String },
    /// Show a task with its project and comments.
    Task { id: String },
    /// Show aggregate project statistics.
    Stats,
    /// List all organizations.
    Orgs,
    /// Show an organization by slug.
    Org { slug: String },
    /// Create an organization.
    CreateOrg {
        #[arg(long)]
        name: String,
        #[arg(long)]
        contact_email: String,
    },
    /// Create a project in the current organization.
    CreateProject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// YYYY-MM-DD.
        #[arg(long)]
        due_date: Option<String>,
    },
    /// Update a project.
    UpdateProject {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// ACTIVE, COMPLETED or ON_HOLD.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        due_date: Option<String>,
    },
    /// Create a task in a project.
    CreateTask {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee_email: Option<String>,
    },
    /// Update a task.
    UpdateTask {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// TODO, IN_PROGRESS or DONE.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        assignee_email: Option<String>,
    },
    /// Comment on a task.
    Comment {
        #[arg(long)]
        task_id: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        author_email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.log_json {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let config = TrackerConfig::load(&cli.config)?;
    let client = SyncClient::connect(&config)?;
    if let Some(org) = &cli.org {
        client.switch_tenant(org)?;
    }

    match cli.command {
        Command::Projects => emit(client.fetch(Projects).await),
        Command::Project { id } => emit(client.fetch(ProjectById(id)).await),
        Command::Task { id } => emit(client.fetch(TaskById(id)).await),
        Command::Stats => emit(client.fetch(ProjectStatsQuery).await),
        Command::Orgs => emit(client.fetch(Organizations).await),
        Command::Org { slug } => emit(client.fetch(OrganizationBySlug(slug)).await),
        Command::CreateOrg { name, contact_email } => {
            write(
                &client,
                Mutation::CreateOrganization(CreateOrganization {
                    name,
                    contact_email,
                }),
            )
            .await
        }
        Command::CreateProject {
            name,
            description,
            due_date,
        } => {
            write(
                &client,
                Mutation::CreateProject(CreateProject {
                    name,
                    description,
                    due_date,
                    organization_slug: None,
                }),
            )
            .await
        }
        Command::UpdateProject {
            id,
            name,
            description,
            status,
            due_date,
        } => {
            let status = status.map(|s| s.parse()).transpose()?;
            write(
                &client,
                Mutation::UpdateProject(UpdateProject {
                    id,
                    name,
                    description,
                    status,
                    due_date,
                }),
            )
            .await
        }
        Command::CreateTask {
            project_id,
            title,
            description,
            assignee_email,
        } => {
            write(
                &client,
                Mutation::CreateTask(CreateTask {
                    project_id,
                    title,
                    description,
                    assignee_email,
                }),
            )
            .await
        }
        Command::UpdateTask {
            id,
            title,
            description,
            status,
            assignee_email,
        } => {
            let status = status.map(|s| s.parse()).transpose()?;
            write(
                &client,
                Mutation::UpdateTask(UpdateTask {
                    id,
                    title,
                    description,
                    status,
                    assignee_email,
                }),
            )
            .await
        }
        Command::Comment {
            task_id,
            content,
            author_email,
        } => {
            write(
                &client,
                Mutation::AddTaskComment(AddTaskComment {
                    task_id,
                    content,
                    author_email,
                }),
            )
            .await
        }
    }
}

fn emit<T: Serialize>(state: QueryState<T>) -> anyhow::Result<()> {
    match state {
        QueryState::Loaded { data, errors, .. } => {
            for error in errors.iter() {
                eprintln!("warning: {error}");
            }
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        QueryState::NotFound => anyhow::bail!("not found"),
        QueryState::Failed(errors) => Err(errors.into()),
        QueryState::Loading => anyhow::bail!("request did not complete"),
    }
}

async fn write(client: &SyncClient, mutation: Mutation) -> anyhow::Result<()> {
    let entity = client.mutate(mutation, MutationHooks::new()).await?;
    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}
