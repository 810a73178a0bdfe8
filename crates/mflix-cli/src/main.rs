//! Mflix CLI
//!
//! Command-line client for the mflix record service.

mod api;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use api::Client;
use mflix_types::PersonInput;

#[derive(Parser)]
#[command(name = "mflix")]
#[command(version, about = "Client for the mflix record service", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "MFLIX_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Access key sent with every request
    #[arg(long, env = "MFLIX_ACCESS_KEY")]
    access_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Person records
    #[command(subcommand)]
    Person(PersonCommands),

    /// Movie records
    #[command(subcommand)]
    Movie(MovieCommands),
}

#[derive(Subcommand)]
enum PersonCommands {
    /// List all persons
    List,

    /// Insert a person
    Insert {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Birth date, YYYY-MM-DD
        #[arg(long)]
        birth_date: Option<NaiveDate>,
    },

    /// Fetch one person by id
    Get { id: String },

    /// Delete a person by id
    Delete { id: String },

    /// Delete a person by email
    DeleteByEmail { email: String },

    /// Search persons by name or email substring
    Search { query: String },

    /// Export all persons
    Export {
        #[arg(value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MovieCommands {
    /// List movies, paginated
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },

    /// Fetch one movie by id
    Get { id: String },

    /// Search movies by title, genre and/or year
    Search {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        year: Option<i32>,
    },

    /// Genre counts across the collection
    Genres,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = Client::new(cli.server, cli.access_key);

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{} (version {})",
                "server is up".green(),
                health["version"].as_str().unwrap_or("unknown")
            );
        }

        Commands::Person(cmd) => run_person(&client, cmd).await?,
        Commands::Movie(cmd) => run_movie(&client, cmd).await?,
    }

    Ok(())
}

async fn run_person(client: &Client, cmd: PersonCommands) -> Result<()> {
    match cmd {
        PersonCommands::List => {
            let persons = client.person_list().await?;
            if persons.is_empty() {
                println!("{}", "no persons".dimmed());
            }
            for p in persons {
                println!("{}  {} <{}>", p.id.dimmed(), p.name.bold(), p.email);
            }
        }

        PersonCommands::Insert {
            name,
            email,
            password,
            phone,
            address,
            birth_date,
        } => {
            let created = client
                .person_insert(&PersonInput {
                    name,
                    email,
                    password,
                    phone,
                    address,
                    birth_date,
                })
                .await?;
            println!(
                "{} {}",
                "inserted".green(),
                created["id"].as_str().unwrap_or("?")
            );
        }

        PersonCommands::Get { id } => {
            let person = client.person_get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&person)?);
        }

        PersonCommands::Delete { id } => {
            client.person_delete(&id).await?;
            println!("{} {}", "deleted".green(), id);
        }

        PersonCommands::DeleteByEmail { email } => {
            client.person_delete_by_email(&email).await?;
            println!("{} {}", "deleted".green(), email);
        }

        PersonCommands::Search { query } => {
            let hits = client.person_search(&query).await?;
            println!("{} match(es)", hits.len());
            for p in hits {
                println!("{}  {} <{}>", p.id.dimmed(), p.name.bold(), p.email);
            }
        }

        PersonCommands::Export { format, output } => {
            let body = client.person_export(format.as_str()).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &body)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{} {}", "wrote".green(), path.display());
                }
                None => print!("{}", body),
            }
        }
    }

    Ok(())
}

async fn run_movie(client: &Client, cmd: MovieCommands) -> Result<()> {
    match cmd {
        MovieCommands::List { page, page_size } => {
            let movies = client.movie_list(page, page_size).await?;
            for m in movies {
                print_movie_line(&m);
            }
        }

        MovieCommands::Get { id } => {
            let movie = client.movie_get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&movie)?);
        }

        MovieCommands::Search { title, genre, year } => {
            let movies = client
                .movie_search(title.as_deref(), genre.as_deref(), year)
                .await?;
            println!("{} match(es)", movies.len());
            for m in movies {
                print_movie_line(&m);
            }
        }

        MovieCommands::Genres => {
            let counts = client.movie_genres().await?;
            for c in counts {
                println!("{:>6}  {}", c.count, c.genre.bold());
            }
        }
    }

    Ok(())
}

fn print_movie_line(movie: &mflix_types::Movie) {
    let year = movie
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "----".to_string());
    println!(
        "{}  {} ({})  [{}]",
        movie.id.as_deref().unwrap_or("?").dimmed(),
        movie.title.bold(),
        year,
        movie.genres.join(", ")
    );
}
