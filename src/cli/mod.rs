//! GI-016: CLI subcommands: init, validate, synth, graph, vars, schema, completions.

use crate::compose::compose;
use crate::core::{output, parser, preflight, resolver, synth, types};
use clap::{CommandFactory, Parser, Subcommand};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "goban-infra",
    version,
    about = "Declarative Google Cloud infrastructure for the Go session platform"
)]
pub struct Cli {
    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a template infra.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate infra.yaml and build every stack without writing
    Validate {
        /// Path to infra.yaml
        #[arg(short, long, default_value = parser::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Synthesize Terraform JSON for every stack
    Synth {
        /// Path to infra.yaml
        #[arg(short, long, default_value = parser::DEFAULT_CONFIG_FILE)]
        file: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = output::DEFAULT_OUT_DIR)]
        out: PathBuf,

        /// Require every declared variable to be set as TF_VAR_<name>
        #[arg(long)]
        check_vars: bool,
    },

    /// Show declaration order and dependency edges per stack
    Graph {
        /// Path to infra.yaml
        #[arg(short, long, default_value = parser::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// List declared input variables per stack
    Vars {
        /// Path to infra.yaml
        #[arg(short, long, default_value = parser::DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Print the JSON Schema of infra.yaml
    Schema,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth {
            file,
            out,
            check_vars,
        } => cmd_synth(&file, &out, check_vars),
        Commands::Graph { file } => cmd_graph(&file),
        Commands::Vars { file } => cmd_vars(&file),
        Commands::Schema => cmd_schema(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "goban-infra", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join(parser::DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    let template = parser::config_template()?;
    std::fs::write(&config_path, template)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized goban-infra project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::load_and_validate(file)?;
    let app = compose(&config).map_err(|e| e.to_string())?;
    app.validate().map_err(|e| e.to_string())?;

    let declarations: usize = app.stacks().map(|s| s.declarations().count()).sum();
    println!(
        "OK: {} ({} stacks, {} declarations)",
        config.name,
        app.stacks().count(),
        declarations
    );
    Ok(())
}

fn cmd_synth(file: &Path, out: &Path, check_vars: bool) -> Result<(), String> {
    let config = parser::load_and_validate(file)?;
    let app = compose(&config).map_err(|e| e.to_string())?;

    if check_vars {
        let mut unique: IndexMap<&str, &types::Variable> = IndexMap::new();
        for var in app.stacks().flat_map(|s| s.variables()) {
            unique.entry(var.name.as_str()).or_insert(var);
        }
        let checked = preflight::check_variables(unique.values().copied(), preflight::env_lookup)
            .map_err(|e| e.to_string())?;
        println!("Variables: {} set", checked);
    }

    let synthesized = app.synth().map_err(|e| e.to_string())?;
    // A corrupt previous manifest only loses the change report.
    let previous = output::load_manifest(out).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring previous manifest");
        None
    });
    output::write_atomic(out, &synthesized).map_err(|e| e.to_string())?;

    print!("{}", synthesized.summary());
    println!("Wrote {}", out.display());
    for stack in &synthesized.stacks {
        println!("  {}: {}", stack.id, change_label(previous.as_ref(), stack));
    }
    Ok(())
}

fn change_label(previous: Option<&serde_json::Value>, stack: &synth::SynthesizedStack) -> &'static str {
    match previous.and_then(|m| output::previous_hash(m, &stack.id)) {
        None => "new",
        Some(hash) if hash == stack.hash => "unchanged",
        Some(_) => "changed",
    }
}

fn cmd_graph(file: &Path) -> Result<(), String> {
    let config = parser::load_and_validate(file)?;
    let app = compose(&config).map_err(|e| e.to_string())?;

    for stack in app.stacks() {
        let order = resolver::build_declaration_order(stack).map_err(|e| e.to_string())?;
        println!("Stack: {}", stack.id());
        for (i, address) in order.iter().enumerate() {
            println!("  {}. {}", i + 1, address);
        }
        let edges = resolver::edges(stack);
        if !edges.is_empty() {
            println!("  edges:");
            for edge in &edges {
                println!("    {} -> {} ({})", edge.from, edge.to, edge.kind);
            }
        }
    }
    Ok(())
}

fn cmd_vars(file: &Path) -> Result<(), String> {
    let config = parser::load_and_validate(file)?;
    let app = compose(&config).map_err(|e| e.to_string())?;

    for stack in app.stacks() {
        println!("Stack: {}", stack.id());
        for var in stack.variables() {
            let sensitive = if var.sensitive { ", sensitive" } else { "" };
            println!(
                "  {} ({}{}) <- {}",
                var.name,
                var.var_type,
                sensitive,
                var.env_key()
            );
        }
    }
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(types::InfraConfig);
    let json =
        serde_json::to_string_pretty(&schema).map_err(|e| format!("serialize error: {}", e))?;
    println!("{}", json);
    Ok(())
}
