use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::fs;

const API_URL: &str = "http://localhost:3000";
const SESSION_FILE: &str = ".study-session";

#[derive(Parser)]
#[command(name = "study")]
#[command(about = "A CLI tool for browsing and administering the study portal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new account")]
    Signup {
        #[arg(short, long, help = "Account email")]
        email: String,

        #[arg(short, long, help = "Display name")]
        name: String,

        #[arg(short, long, help = "Account password")]
        password: String,
    },

    #[command(about = "Log in and store a session token")]
    Login {
        #[arg(short, long, help = "Account email")]
        email: String,

        #[arg(short, long, help = "Account password")]
        password: String,
    },

    #[command(about = "Log out and drop the stored session")]
    Logout,

    #[command(about = "Show the logged-in account")]
    Whoami,

    #[command(about = "List branches")]
    Branches,

    #[command(about = "List subjects for a branch, or global subjects")]
    Subjects {
        #[arg(short, long, help = "Branch slug")]
        branch_slug: Option<String>,

        #[arg(short, long, help = "List global subjects instead")]
        global: bool,
    },

    #[command(about = "List files of a subject")]
    Files {
        #[arg(short, long, help = "Subject slug")]
        subject_slug: String,
    },

    #[command(about = "Search files by name")]
    Search {
        #[arg(short, long, help = "Search text")]
        query: String,
    },

    #[command(about = "Create a branch (admin)")]
    CreateBranch {
        #[arg(short, long, help = "Branch name")]
        name: String,

        #[arg(short, long, help = "Unique short name, e.g. CST")]
        short_name: String,
    },

    #[command(about = "Create a subject (admin)")]
    CreateSubject {
        #[arg(short, long, help = "Subject name")]
        name: String,

        #[arg(short, long, help = "Unique course code")]
        course_code: String,

        #[arg(short, long, help = "Branch ids (comma-separated)")]
        branches: Option<String>,

        #[arg(short, long, help = "Visible regardless of branch")]
        global: bool,
    },

    #[command(about = "Delete a branch (admin)")]
    DeleteBranch {
        #[arg(short, long, help = "Branch ID")]
        id: String,
    },

    #[command(about = "Delete a subject (admin)")]
    DeleteSubject {
        #[arg(short, long, help = "Subject ID")]
        id: String,
    },

    #[command(about = "Delete a file (admin)")]
    DeleteFile {
        #[arg(short, long, help = "File ID")]
        id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    email: String,
    display_name: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    email: String,
    display_name: String,
    role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Branch {
    id: String,
    name: String,
    short_name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subject {
    id: String,
    name: String,
    course_code: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    file_name: String,
    relative_path: String,
    file_size: String,
    likes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    file_name: String,
    subject_details: SubjectSummary,
    branch_details: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SubjectSummary {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBranchRequest {
    name: String,
    short_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubjectRequest {
    name: String,
    course_code: String,
    branches: Vec<String>,
    is_global: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Signup { email, name, password } => signup(email, name, password).await,
        Commands::Login { email, password } => login(email, password).await,
        Commands::Logout => logout().await,
        Commands::Whoami => whoami().await,
        Commands::Branches => list_branches().await,
        Commands::Subjects { branch_slug, global } => list_subjects(branch_slug, global).await,
        Commands::Files { subject_slug } => list_files(subject_slug).await,
        Commands::Search { query } => search(query).await,
        Commands::CreateBranch { name, short_name } => create_branch(name, short_name).await,
        Commands::CreateSubject {
            name,
            course_code,
            branches,
            global,
        } => create_subject(name, course_code, branches, global).await,
        Commands::DeleteBranch { id } => delete_entity("branches", "Branch", id).await,
        Commands::DeleteSubject { id } => delete_entity("subjects", "Subject", id).await,
        Commands::DeleteFile { id } => delete_entity("files", "File", id).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn api_url() -> String {
    std::env::var("STUDY_API_URL").unwrap_or_else(|_| API_URL.to_string())
}

fn read_token() -> Result<String> {
    let token = fs::read_to_string(SESSION_FILE)
        .context("Not logged in. Run `study login` first.")?;
    Ok(token.trim().to_string())
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("{}: {}", status, body)
    }
}

async fn signup(email: String, name: String, password: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/auth/signup", api_url()))
        .json(&SignupRequest {
            email,
            display_name: name,
            password,
        })
        .send()
        .await?;

    let user: UserInfo = expect_success(response).await?.json().await?;
    println!("✅ Account created for {} <{}>", user.display_name, user.email);
    Ok(())
}

async fn login(email: String, password: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/auth/login", api_url()))
        .json(&LoginRequest { email, password })
        .send()
        .await?;

    let result: LoginResponse = expect_success(response).await?.json().await?;
    fs::write(SESSION_FILE, &result.token).context("Failed to store session token")?;

    println!("✅ Logged in as {} <{}>", result.user.display_name, result.user.email);
    Ok(())
}

async fn logout() -> Result<()> {
    if let Ok(token) = read_token() {
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/api/auth/logout", api_url()))
            .bearer_auth(&token)
            .send()
            .await?;
        expect_success(response).await?;
    }

    let _ = fs::remove_file(SESSION_FILE);
    println!("✅ Logged out");
    Ok(())
}

async fn whoami() -> Result<()> {
    let token = read_token()?;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/auth/current_user", api_url()))
        .bearer_auth(&token)
        .send()
        .await?;

    let user: UserInfo = expect_success(response).await?.json().await?;
    println!("👤 {} <{}> ({})", user.display_name, user.email, user.role);
    Ok(())
}

async fn list_branches() -> Result<()> {
    let client = reqwest::Client::new();
    let response = client.get(format!("{}/api/branches", api_url())).send().await?;
    let branches: Vec<Branch> = expect_success(response).await?.json().await?;

    if branches.is_empty() {
        println!("📭 No branches found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Short"),
        Cell::new("Slug"),
    ]));
    for branch in branches {
        table.add_row(Row::new(vec![
            Cell::new(&branch.id[..8]),
            Cell::new(&branch.name),
            Cell::new(&branch.short_name),
            Cell::new(&branch.slug),
        ]));
    }
    table.printstd();
    Ok(())
}

async fn list_subjects(branch_slug: Option<String>, global: bool) -> Result<()> {
    let url = if global {
        format!("{}/api/subjects?global=true", api_url())
    } else if let Some(slug) = branch_slug {
        format!("{}/api/subjects?branchSlug={}", api_url(), slug)
    } else {
        bail!("Provide --branch-slug or --global");
    };

    let client = reqwest::Client::new();
    let response = client.get(url).send().await?;
    let subjects: Vec<Subject> = expect_success(response).await?.json().await?;

    if subjects.is_empty() {
        println!("📭 No subjects found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Course Code"),
        Cell::new("Slug"),
    ]));
    for subject in subjects {
        table.add_row(Row::new(vec![
            Cell::new(&subject.id[..8]),
            Cell::new(&subject.name),
            Cell::new(&subject.course_code),
            Cell::new(&subject.slug),
        ]));
    }
    table.printstd();
    Ok(())
}

async fn list_files(subject_slug: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/files?subjectSlug={}", api_url(), subject_slug))
        .send()
        .await?;
    let files: Vec<FileInfo> = expect_success(response).await?.json().await?;

    if files.is_empty() {
        println!("📭 No files found for this subject.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("File"),
        Cell::new("Path"),
        Cell::new("Size"),
        Cell::new("Likes"),
    ]));
    for file in files {
        table.add_row(Row::new(vec![
            Cell::new(&file.file_name),
            Cell::new(&file.relative_path),
            Cell::new(&file.file_size),
            Cell::new(&file.likes.to_string()),
        ]));
    }
    table.printstd();
    Ok(())
}

async fn search(query: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/search", api_url()))
        .query(&[("q", &query)])
        .send()
        .await?;
    let hits: Vec<SearchHit> = expect_success(response).await?.json().await?;

    if hits.is_empty() {
        println!("📭 No files matched \"{}\".", query);
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("File"),
        Cell::new("Subject"),
        Cell::new("Branches"),
    ]));
    for hit in hits {
        table.add_row(Row::new(vec![
            Cell::new(&hit.file_name),
            Cell::new(&hit.subject_details.name),
            Cell::new(&hit.branch_details.join(", ")),
        ]));
    }
    table.printstd();
    Ok(())
}

async fn create_branch(name: String, short_name: String) -> Result<()> {
    let token = read_token()?;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/admin/branches", api_url()))
        .bearer_auth(&token)
        .json(&CreateBranchRequest { name, short_name })
        .send()
        .await?;

    let branch: Branch = expect_success(response).await?.json().await?;
    println!("✅ Branch created: {} (slug: {})", branch.name, branch.slug);
    Ok(())
}

async fn create_subject(
    name: String,
    course_code: String,
    branches: Option<String>,
    global: bool,
) -> Result<()> {
    let token = read_token()?;
    let branch_ids: Vec<String> = branches
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/admin/subjects", api_url()))
        .bearer_auth(&token)
        .json(&CreateSubjectRequest {
            name,
            course_code,
            branches: branch_ids,
            is_global: global,
        })
        .send()
        .await?;

    let subject: Subject = expect_success(response).await?.json().await?;
    println!("✅ Subject created: {} (slug: {})", subject.name, subject.slug);
    Ok(())
}

async fn delete_entity(kind: &str, label: &str, id: String) -> Result<()> {
    let token = read_token()?;
    let client = reqwest::Client::new();
    let response = client
        .delete(format!("{}/api/admin/{}/{}", api_url(), kind, id))
        .bearer_auth(&token)
        .send()
        .await?;

    expect_success(response).await?;
    println!("✅ {} {} removed", label, id);
    Ok(())
}
