use std::path::Path;

use blockcat_core::config::{AnomalyPolicy, BackendKind, EngineConfig};
use blockcat_core::error::{CategoryError, Result};
use blockcat_core::path::SEGMENT_SEPARATOR;
use blockcat_core::{
    AggregatedNode, BlockStatus, CategoryCatalog, CategoryId, CategoryPath, CategoryRow,
    LookupKey, SqliteCategoryStore, open_catalog,
};
use tracing::info;

use crate::presentation::cli::StoreArgs;

fn config_from_args(args: &StoreArgs) -> Result<EngineConfig> {
    let mut cfg = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(db) = &args.db {
        cfg.store.path = db.clone();
    }
    if args.snapshot {
        cfg.store.backend = BackendKind::Snapshot;
    }
    if args.strict {
        cfg.anomalies = AnomalyPolicy::Reject;
    }
    Ok(cfg)
}

fn catalog_from_args(args: &StoreArgs) -> Result<CategoryCatalog> {
    open_catalog(&config_from_args(args)?)
}

fn store_from_args(args: &StoreArgs) -> Result<SqliteCategoryStore> {
    let cfg = config_from_args(args)?;
    SqliteCategoryStore::open(&cfg.store.open_params())
}

/// `id:<n>` names a category by row id; anything else is an `A > B` path,
/// so numeric category names stay addressable.
fn resolve_node(catalog: &CategoryCatalog, node: &str) -> Result<LookupKey> {
    match node.trim().strip_prefix("id:") {
        Some(id) => {
            let id = id.trim().parse::<i64>().map_err(|_| {
                CategoryError::InvalidInput(format!("\"{node}\" is not a category id"))
            })?;
            catalog.key_for(CategoryId(id))
        }
        None => node.parse(),
    }
}

fn print_node(n: &AggregatedNode) {
    println!(
        "{:<6} {:<40} urls={:<6} blocks={}",
        n.id, n.display_name, n.totals.blocked_url_count_total, n.totals.block_count_total
    );
}

/// One import line: `id \t display name \t path [\t blocked urls \t blocks]`.
/// Blank lines and `#` comments yield `None`.
fn parse_import_line(line: &str, lineno: usize) -> Result<Option<CategoryRow>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }
    let bad = |what: &str| CategoryError::InvalidInput(format!("line {lineno}: {what}"));

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 || fields.len() > 5 {
        return Err(bad("expected 3 to 5 tab-separated fields"));
    }
    let id = fields[0]
        .trim()
        .parse::<i64>()
        .map_err(|_| bad("id is not an integer"))?;
    let count = |i: usize| -> Result<u64> {
        match fields.get(i) {
            Some(v) => v.trim().parse().map_err(|_| bad("count is not a non-negative integer")),
            None => Ok(0),
        }
    };
    // keep blank segments so gaps are caught by validation
    let path = CategoryPath::from_segments(fields[2].split('>').map(str::trim))
        .map_err(|e| bad(&e.to_string()))?;

    let row = CategoryRow {
        id: CategoryId(id),
        display_name: fields[1].trim().to_string(),
        path,
        blocked_url_count: count(3)?,
        block_count: count(4)?,
    };
    row.validate().map_err(|e| bad(&e.to_string()))?;
    Ok(Some(row))
}

pub fn handle_init(args: &StoreArgs) -> Result<()> {
    let cfg = config_from_args(args)?;
    SqliteCategoryStore::open(&cfg.store.open_params())?;
    eprintln!("init: schema ready in {}", cfg.store.path.display());
    Ok(())
}

pub fn handle_import(args: &StoreArgs, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)?;
    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if let Some(row) = parse_import_line(line, i + 1)? {
            rows.push(row);
        }
    }
    store_from_args(args)?.insert_rows(&rows)?;
    info!(rows = rows.len(), file = %file.display(), "imported categories");
    eprintln!("import: {} rows from {}", rows.len(), file.display());
    Ok(())
}

pub fn handle_link(args: &StoreArgs, url: &str, category: i64) -> Result<()> {
    store_from_args(args)?.link_url(url, CategoryId(category))
}

pub fn handle_status(args: &StoreArgs, url: &str, network: &str, status: &str) -> Result<()> {
    let status: BlockStatus = status.parse()?;
    store_from_args(args)?.record_status(url, network, status)
}

pub fn handle_top(args: &StoreArgs) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    for n in catalog.top_level()? {
        print_node(&n);
    }
    Ok(())
}

pub fn handle_children(args: &StoreArgs, node: &str) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    let key = resolve_node(&catalog, node)?;
    for n in catalog.children_of(&key)? {
        print_node(&n);
    }
    Ok(())
}

pub fn handle_parent(args: &StoreArgs, node: &str) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    let key = resolve_node(&catalog, node)?;
    let resolved = catalog.resolve_parent(&key)?;
    println!("{}", resolved.parent);
    if let Some(anomaly) = resolved.anomaly {
        eprintln!("warning: {anomaly}");
    }
    Ok(())
}

pub fn handle_trail(args: &StoreArgs, node: &str) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    let key = resolve_node(&catalog, node)?;
    let trail: Vec<String> = catalog
        .ancestors(&key)?
        .into_iter()
        .map(|n| format!("{} ({})", n.name, n.id))
        .chain(key.name().map(str::to_owned))
        .collect();
    println!("{}", trail.join(SEGMENT_SEPARATOR));
    Ok(())
}

pub fn handle_counts(args: &StoreArgs, node: &str) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    let key = resolve_node(&catalog, node)?;
    let c = catalog.counts_for(&key)?;
    println!(
        "{key}: urls={} blocks={}",
        c.blocked_url_count_total, c.block_count_total
    );
    Ok(())
}

pub fn handle_show(args: &StoreArgs, id: i64) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    let row = catalog.load(CategoryId(id))?;
    println!("id:           {}", row.id);
    println!("display name: {}", row.display_name);
    println!("path:         {}", row.lookup_key());
    println!("depth:        {}", row.depth());
    println!("urls:         {}", row.blocked_url_count);
    println!("blocks:       {}", row.block_count);
    Ok(())
}

pub fn handle_sites(args: &StoreArgs, id: i64) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    for url in catalog.sites_of(CategoryId(id))? {
        println!("{url}");
    }
    Ok(())
}

pub fn handle_blocks(args: &StoreArgs, id: i64) -> Result<()> {
    let catalog = catalog_from_args(args)?;
    for b in catalog.blocks_of(CategoryId(id))? {
        println!("{:<4} {}", b.networks, b.url);
    }
    Ok(())
}
