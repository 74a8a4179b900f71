use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use log::{debug, info};

use crate::config::Settings;
use crate::entities::{AttrValue, Attrs, Document, LayerId, LayerStore};

/// Edit a layer document from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Layer document to operate on
    #[arg(short = 'd', long = "doc", value_name = "FILE", default_value = "layers.json")]
    pub doc: PathBuf,

    /// Settings file (JSON); defaults are used if it does not exist
    #[arg(short = 's', long = "settings", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new document holding one layer
    Init {
        /// Attributes of the first layer (key=value)
        #[arg(value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },
    /// Print layers in order
    List,
    /// Add a layer
    Add {
        /// Insert position (default: end)
        #[arg(long = "at", value_name = "N")]
        at: Option<usize>,
        #[arg(value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },
    /// Delete a layer (id or index)
    Delete { layer: String },
    /// Move the layer at OLD to NEW
    Move { old: usize, new: usize },
    /// Make a layer current (id or index)
    Select { layer: String },
    /// Merge attributes into a layer
    Set {
        layer: String,
        #[arg(value_name = "KEY=VALUE", required = true)]
        attrs: Vec<String>,
    },
    /// Toggle a layer's visibility
    Toggle { layer: String },
    /// Duplicate a layer
    Copy { layer: String },
    /// Add a layer from a JSON attribute file
    Import { file: PathBuf },
}

/// Parse `key=value`; the value is typed loosely (number, bool, text).
pub fn parse_assignment(raw: &str) -> Result<(String, AttrValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected KEY=VALUE, got {:?}", raw))?;
    if key.is_empty() {
        bail!("Empty attribute name in {:?}", raw);
    }
    Ok((key.to_string(), AttrValue::parse_loose(value)))
}

fn parse_attrs(raw: &[String]) -> Result<Attrs> {
    let mut attrs = Attrs::new();
    for item in raw {
        let (key, value) = parse_assignment(item)?;
        attrs.set(key, value);
    }
    Ok(attrs)
}

/// Resolve a layer by full id or by list index.
pub fn resolve_layer(store: &LayerStore, token: &str) -> Result<LayerId> {
    if let Ok(idx) = token.parse::<usize>() {
        return store
            .all_layers()
            .get(idx)
            .map(|l| l.id)
            .ok_or_else(|| anyhow!("No layer at index {} ({} layers)", idx, store.count()));
    }
    let id: LayerId = token.parse().with_context(|| format!("Invalid layer id: {}", token))?;
    if store.layer(id).is_none() {
        bail!("Layer not found: {}", id);
    }
    Ok(id)
}

/// One line per layer: index, current marker, visibility, id, name, attrs.
pub fn format_layers(store: &LayerStore) -> String {
    let current = store.current_id();
    let mut out = String::new();
    for layer in store.all_layers() {
        let marker = if layer.id == current { '*' } else { ' ' };
        let eye = if layer.visible { "on " } else { "off" };
        let attrs = serde_json::to_string(&layer.attrs).unwrap_or_default();
        out.push_str(&format!(
            "{:>3} {} {} {} {:<16} {}\n",
            layer.order,
            marker,
            eye,
            layer.id,
            layer.name(),
            attrs
        ));
    }
    out
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path),
        None => {
            let mut settings = Settings::default();
            settings.apply_env();
            Ok(settings)
        }
    }
}

/// Execute a parsed command line.
pub fn run(args: &Args) -> Result<()> {
    if let Command::Init { attrs } = &args.command {
        let settings = load_settings(args.settings.as_deref())?;
        let doc = Document::new(parse_attrs(attrs)?, settings);
        let path = doc.to_json(&args.doc)?;
        info!("Created {}", path.display());
        print!("{}", format_layers(&doc.store));
        return Ok(());
    }

    let mut doc = Document::from_json(&args.doc)?;
    if let Some(path) = &args.settings {
        doc.settings = Settings::load(path)?;
        doc.store.apply_settings(&doc.settings);
    }
    debug!("Loaded {} layers from {}", doc.store.count(), args.doc.display());

    let revision = doc.store.revision();
    match &args.command {
        Command::Init { .. } => unreachable!("handled above"),
        Command::List => {}
        Command::Add { at, attrs } => {
            let id = doc.store.add_layer(parse_attrs(attrs)?, *at);
            println!("{}", id);
        }
        Command::Delete { layer } => {
            let id = resolve_layer(&doc.store, layer)?;
            doc.store.delete_layer(id)?;
        }
        Command::Move { old, new } => doc.store.move_layer(*old, *new)?,
        Command::Select { layer } => {
            let id = resolve_layer(&doc.store, layer)?;
            doc.store.set_current_layer(id)?;
        }
        Command::Set { layer, attrs } => {
            let id = resolve_layer(&doc.store, layer)?;
            doc.store.update_layer(id, &parse_attrs(attrs)?);
        }
        Command::Toggle { layer } => {
            let id = resolve_layer(&doc.store, layer)?;
            doc.store.toggle_layer_visible(id);
        }
        Command::Copy { layer } => {
            let id = resolve_layer(&doc.store, layer)?;
            println!("{}", doc.store.copy_layer(id)?);
        }
        Command::Import { file } => {
            println!("{}", doc.import_layer_file(file)?);
        }
    }

    if doc.store.revision() != revision {
        doc.to_json(&args.doc)?;
    }
    print!("{}", format_layers(&doc.store));
    Ok(())
}
