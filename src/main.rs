//! odb - command-line front end for odbgraph.

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use odbgraph::{Connection, ConnectionConfig, Direction, Document, EdgeRef, Vertex, VertexRef};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("odbgraph")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("odbgraph.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Config file (explicit or default) overlaid with command-line flags.
fn load_config(cli: &Cli) -> Result<ConnectionConfig> {
    let default_path = ConnectionConfig::default_path();
    let mut config = match &cli.config {
        Some(path) => ConnectionConfig::load(path)?,
        None if default_path.exists() => ConnectionConfig::load(&default_path)?,
        None => {
            let Some(database) = cli.database.clone() else {
                bail!("No database given; pass --database or create {}", default_path.display());
            };
            ConnectionConfig::new("localhost", database, "admin", "admin")
        }
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(user) = &cli.user {
        config.username = user.clone();
    }
    if let Some(password) = &cli.password {
        config.password = password.clone();
    }
    Ok(config)
}

/// Values are JSON when they parse as JSON, strings otherwise.
fn parse_pairs(pairs: &[String]) -> Vec<Value> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            if i % 2 == 0 {
                Value::String(raw.clone())
            } else {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
        })
        .collect()
}

fn format_props(doc: &Document) -> String {
    if doc.properties().is_empty() {
        String::new()
    } else {
        Value::Object(doc.properties().clone()).to_string()
    }
}

fn print_vertex(vertex: &VertexRef) {
    let v = vertex.borrow();
    println!(
        "{} {} v{} {}",
        v.rid.cyan(),
        v.class.bold(),
        v.version,
        format_props(&v.doc).dimmed()
    );
}

fn print_edge(edge: &EdgeRef) {
    let e = edge.borrow();
    println!(
        "{} {} {} {} {} {}",
        e.rid.cyan(),
        e.class.bold(),
        e.from_rid(),
        "→".blue(),
        e.to_rid(),
        format_props(&e.doc).dimmed()
    );
}

fn select_one(conn: &mut Connection, rid: &str) -> Result<VertexRef> {
    match conn.select_vertexes(rid, None, "")?.into_iter().next() {
        Some(vertex) => Ok(vertex),
        None => bail!("Vertex not found: {}", rid),
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli).context("Failed to load connection config")?;
    let mut conn = Connection::new(config).context("Failed to create connection")?;
    conn.connect().context("Failed to connect")?;

    match cli.command {
        Command::Ping => {
            println!("{} Connected to {}", "✓".green(), conn.config().base_url());
        }

        Command::Sql { text } => {
            let records = conn.command(&text).context("Command failed")?;
            if records.is_empty() {
                println!("{}", "No records".dimmed());
            }
            for record in records {
                println!("{}", Value::Object(record));
            }
        }

        Command::Vertexes {
            target,
            limit,
            condition,
        } => {
            let vertexes = conn
                .select_vertexes(&target, limit, condition.as_deref().unwrap_or(""))
                .context("Failed to select vertexes")?;
            if vertexes.is_empty() {
                println!("{}", "No vertexes found".dimmed());
            }
            vertexes.iter().for_each(print_vertex);
        }

        Command::Edges {
            target,
            limit,
            condition,
        } => {
            let edges = conn
                .select_edges(&target, limit, condition.as_deref().unwrap_or(""))
                .context("Failed to select edges")?;
            if edges.is_empty() {
                println!("{}", "No edges found".dimmed());
            }
            edges.iter().for_each(print_edge);
        }

        Command::Neighbors { rid, direction, class } => {
            let dirn: Direction = direction.parse()?;
            let vertex = select_one(&mut conn, &rid)?;
            let edges = conn
                .vertex_edges(&vertex, dirn, None, class.as_deref())
                .context("Failed to resolve edges")?;

            print_vertex(&vertex);
            println!("{} {} edge(s) {}:", "→".blue(), edges.len(), dirn);
            for edge in &edges {
                print!("  ");
                print_edge(edge);
            }
        }

        Command::CreateVertex { class, pairs } => {
            let vertex = Vertex::new(class).into_ref();
            if !pairs.is_empty() {
                vertex.borrow_mut().set_props_list(&parse_pairs(&pairs))?;
            }
            conn.insert_vertex(&vertex).context("Failed to create vertex")?;
            println!("{} Created: {}", "✓".green(), vertex.borrow().rid.cyan());
        }

        Command::Set { rid, pairs } => {
            let vertex = select_one(&mut conn, &rid)?;
            vertex.borrow_mut().set_props_list(&parse_pairs(&pairs))?;
            conn.update_vertex(&vertex).context("Failed to update vertex")?;
            println!("{} Updated: {} (version {})", "✓".green(), rid.cyan(), vertex.borrow().version);
        }

        Command::DeleteVertex { rids } => {
            let refs: Vec<&str> = rids.iter().map(|s| s.as_str()).collect();
            conn.delete_vertexes(&refs).context("Failed to delete vertexes")?;
            println!("{} Deleted {} vertex(es)", "✓".green(), refs.len());
        }

        Command::DeleteEdge { rids } => {
            let refs: Vec<&str> = rids.iter().map(|s| s.as_str()).collect();
            conn.delete_edges(&refs).context("Failed to delete edges")?;
            println!("{} Deleted {} edge(s)", "✓".green(), refs.len());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
