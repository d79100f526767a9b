//! Development harness for the evaluation core: loads a flat memory
//! image plus a JSON type catalogue, evaluates a dotted/indexed
//! expression against it, and prints the rendered result.
//!
//! This is not a shipped REPL - it exists so the core can be exercised
//! against a real file without embedding it in a larger debugger.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use typedobj_core::program::ByteOrder;
use typedobj_core::types::json::type_from_spelling;
use typedobj_core::{Program, ProgramObject, Segment, Type, TypeCatalogue};

/// Evaluate a C-style expression against a flat memory image.
#[derive(Debug, Parser)]
struct Args {
    /// Path to the flat memory image (the whole file is treated as one
    /// segment mapped at `--base-address`).
    #[arg(long)]
    image: PathBuf,

    /// Path to a JSON type catalogue (see `TypeCatalogue::from_json`).
    #[arg(long)]
    catalogue: PathBuf,

    /// Path to a JSON array of `{"name", "type", "address"}` symbol
    /// entries, used to resolve the expression's root identifier.
    #[arg(long)]
    symbols: Option<PathBuf>,

    /// Target pointer width in bytes.
    #[arg(long, default_value_t = 8)]
    pointer_width: u8,

    /// Treat the image as big-endian (little-endian is the default).
    #[arg(long)]
    big_endian: bool,

    /// Virtual address the image's first byte is mapped at.
    #[arg(long, value_parser = parse_hex, default_value = "0")]
    base_address: u64,

    /// Type spelling for `--address`-rooted expressions (ignored when
    /// resolving the root through `--symbols`).
    #[arg(long)]
    root_type: Option<String>,

    /// Root address for expressions with no leading symbol name; the
    /// expression is then just the chain (`.member[0]`).
    #[arg(long, value_parser = parse_hex)]
    address: Option<u64>,

    /// The expression to evaluate: `var.member[0]` or `.member[0]` when
    /// rooted with `--address`.
    expression: String,
}

fn parse_hex(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}

#[derive(Debug, serde::Deserialize)]
struct SymbolEntry {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    address: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let image = fs::read(&args.image).with_context(|| format!("reading image {:?}", args.image))?;
    let catalogue_json =
        fs::read_to_string(&args.catalogue).with_context(|| format!("reading catalogue {:?}", args.catalogue))?;
    let catalogue = TypeCatalogue::from_json(&catalogue_json, args.pointer_width)
        .context("parsing type catalogue")?;

    let byte_order = if args.big_endian { ByteOrder::Big } else { ByteOrder::Little };
    let segment = Segment::new(args.base_address, image.len() as u64, 0);
    let reader = typedobj_core::CoreReader::new(&image, vec![segment]);
    let mut program = Program::new(reader, catalogue, byte_order);

    let symbols = load_symbols(&args, program.catalogue())?;
    if let Some(table) = symbols {
        program = program.with_resolver(Box::new(move |name| table.get(name).cloned()));
    }

    let root = resolve_root(&program, &args)?;
    let (_, chain) = split_root(&args.expression);
    let result = apply_chain(root, chain)?;

    println!("{result}");
    Ok(())
}

fn load_symbols(args: &Args, catalogue: &TypeCatalogue) -> Result<Option<HashMap<String, (Type, u64)>>> {
    let Some(path) = &args.symbols else { return Ok(None) };
    let json = fs::read_to_string(path).with_context(|| format!("reading symbols {path:?}"))?;
    let entries: Vec<SymbolEntry> = serde_json::from_str(&json).context("parsing symbols JSON")?;
    let mut table = HashMap::with_capacity(entries.len());
    for entry in entries {
        let ty = type_from_spelling(catalogue, &entry.ty)
            .map_err(|e| anyhow!("symbol '{}': {e}", entry.name))?;
        let address = parse_hex(&entry.address).with_context(|| format!("symbol '{}' address", entry.name))?;
        table.insert(entry.name, (ty, address));
    }
    Ok(Some(table))
}

fn resolve_root<'a, 'p>(program: &'p Program<'a>, args: &Args) -> Result<ProgramObject<'a, 'p>> {
    if let Some(address) = args.address {
        let spelling = args
            .root_type
            .as_deref()
            .ok_or_else(|| anyhow!("--root-type is required when rooting an expression at --address"))?;
        let ty = type_from_spelling(program.catalogue(), spelling)?;
        return Ok(program.object(ty, Some(address), None)?);
    }
    let (name, _) = split_root(&args.expression);
    if name.is_empty() {
        return Err(anyhow!("expression must start with a symbol name, or pass --address"));
    }
    Ok(program.variable(name)?)
}

/// Splits `expr` into its leading identifier (the root symbol name, if
/// any) and the remainder (the `.member`/`[index]` chain).
fn split_root(expr: &str) -> (&str, &str) {
    let idx = expr.find(['.', '[']).unwrap_or(expr.len());
    (&expr[..idx], &expr[idx..])
}

fn apply_chain<'a, 'p>(mut obj: ProgramObject<'a, 'p>, chain: &str) -> Result<ProgramObject<'a, 'p>> {
    let mut rest = chain;
    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix('.') {
            let end = r.find(['.', '[']).unwrap_or(r.len());
            let name = &r[..end];
            obj = obj.attr_(name)?;
            rest = &r[end..];
        } else if let Some(r) = rest.strip_prefix('[') {
            let end = r.find(']').ok_or_else(|| anyhow!("unterminated '[' in expression"))?;
            let index: i64 = r[..end].trim().parse().with_context(|| format!("invalid index '{}'", &r[..end]))?;
            obj = obj.index(index)?;
            rest = &r[end + 1..];
        } else {
            return Err(anyhow!("unexpected token in expression: '{rest}'"));
        }
    }
    Ok(obj)
}
